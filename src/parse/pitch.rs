// Pitch parser - note-name strings to MIDI numbers

use crate::error::{EditError, EditResult};

/// A parsed pitch: spelled name plus its MIDI number
///
/// Middle C = C4 = MIDI 60.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pitch {
    pub name: char,
    /// "", "#", "b", "##" or "bb"
    pub accidental: String,
    pub octave: i8,
    pub midi_number: u8,
}

impl std::fmt::Display for Pitch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}{}", self.name, self.accidental, self.octave)
    }
}

// Semitone offsets for natural notes, C-based
fn note_offset(name: char) -> Option<i32> {
    match name {
        'C' => Some(0),
        'D' => Some(2),
        'E' => Some(4),
        'F' => Some(5),
        'G' => Some(7),
        'A' => Some(9),
        'B' => Some(11),
        _ => None,
    }
}

fn accidental_offset(acc: &str) -> Option<i32> {
    match acc {
        "" => Some(0),
        "#" => Some(1),
        "b" => Some(-1),
        "##" => Some(2),
        "bb" => Some(-2),
        _ => None,
    }
}

// MIDI number mod 12 -> spelled note, preferring sharps for black keys
const MIDI_TO_NOTE: [(char, &str); 12] = [
    ('C', ""),
    ('C', "#"),
    ('D', ""),
    ('D', "#"),
    ('E', ""),
    ('F', ""),
    ('F', "#"),
    ('G', ""),
    ('G', "#"),
    ('A', ""),
    ('A', "#"),
    ('B', ""),
];

/// Parse a pitch string: `"C4"`, `"D#5"`, `"Bb3"`, `"F##4"`, `"midi:60"`
pub fn parse_pitch(s: &str) -> EditResult<Pitch> {
    if let Some(raw) = s.strip_prefix("midi:") {
        let midi: i32 = raw
            .parse()
            .map_err(|_| EditError::InvalidPitch(s.to_string()))?;
        if !(0..=127).contains(&midi) {
            return Err(EditError::InvalidPitch(s.to_string()));
        }
        return Ok(pitch_from_midi(midi as u8));
    }

    let mut chars = s.chars();
    let name = chars
        .next()
        .ok_or_else(|| EditError::InvalidPitch(s.to_string()))?
        .to_ascii_uppercase();
    if !name.is_ascii_alphabetic() {
        return Err(EditError::InvalidPitch(s.to_string()));
    }
    let rest: &str = &s[1..];

    // Longest accidental first so "##" isn't read as "#"
    let (accidental, octave_str) = ["##", "bb", "#", "b"]
        .iter()
        .find_map(|acc| rest.strip_prefix(acc).map(|tail| (*acc, tail)))
        .unwrap_or(("", rest));

    let octave: i8 = octave_str
        .parse()
        .map_err(|_| EditError::InvalidPitch(s.to_string()))?;

    let note = note_offset(name).ok_or_else(|| EditError::InvalidPitch(s.to_string()))?;
    let acc = accidental_offset(accidental).ok_or_else(|| EditError::InvalidPitch(s.to_string()))?;

    let midi = (octave as i32 + 1) * 12 + note + acc;
    if !(0..=127).contains(&midi) {
        return Err(EditError::InvalidPitch(s.to_string()));
    }

    Ok(Pitch {
        name,
        accidental: accidental.to_string(),
        octave,
        midi_number: midi as u8,
    })
}

/// Build a Pitch from a raw MIDI number, using sharps for black keys
pub fn pitch_from_midi(midi_number: u8) -> Pitch {
    let (name, accidental) = MIDI_TO_NOTE[(midi_number % 12) as usize];
    Pitch {
        name,
        accidental: accidental.to_string(),
        octave: (midi_number / 12) as i8 - 1,
        midi_number,
    }
}

/// Display name for a MIDI number, e.g. 61 -> "C#4"
pub fn pitch_name(midi_number: u8) -> String {
    pitch_from_midi(midi_number).to_string()
}
