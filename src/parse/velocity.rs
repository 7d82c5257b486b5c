// Velocity parser - numbers or dynamics names

use crate::error::{EditError, EditResult};

/// Dynamics names and their conventional MIDI velocities
pub const VELOCITY_NAMES: [(&str, u8); 8] = [
    ("ppp", 16),
    ("pp", 33),
    ("p", 49),
    ("mp", 64),
    ("mf", 80),
    ("f", 96),
    ("ff", 112),
    ("fff", 127),
];

/// Parse a velocity: `"80"` or a dynamics name like `"mf"`
pub fn parse_velocity(s: &str) -> EditResult<u8> {
    let stripped = s.trim().to_lowercase();

    if let Some((_, value)) = VELOCITY_NAMES.iter().find(|(name, _)| *name == stripped) {
        return Ok(*value);
    }

    let value: i32 = stripped
        .parse()
        .map_err(|_| EditError::InvalidVelocity(s.to_string()))?;
    if !(0..=127).contains(&value) {
        return Err(EditError::InvalidVelocity(s.to_string()));
    }
    Ok(value as u8)
}
