// Duration parser - duration strings to tick counts

use crate::error::{EditError, EditResult};

// Base names as multipliers of a quarter note
const DURATION_NAMES: [(&str, f64); 6] = [
    ("whole", 4.0),
    ("half", 2.0),
    ("quarter", 1.0),
    ("eighth", 0.5),
    ("sixteenth", 0.25),
    ("32nd", 0.125),
];

const DURATION_ALIASES: [(&str, &str); 6] = [
    ("1n", "whole"),
    ("2n", "half"),
    ("4n", "quarter"),
    ("8n", "eighth"),
    ("16n", "sixteenth"),
    ("32n", "32nd"),
];

/// Parse a duration string into a tick count
///
/// Supported forms:
/// - Named: `"whole"`, `"half"`, `"quarter"`, `"eighth"`, `"sixteenth"`, `"32nd"`
/// - Numeric aliases: `"1n"` .. `"32n"`
/// - Modifiers: `"dotted-quarter"` (1.5x), `"triplet-eighth"` (2/3x)
/// - Raw ticks: `"ticks:360"`
pub fn parse_duration(s: &str, ppqn: u16) -> EditResult<u64> {
    if let Some(raw) = s.strip_prefix("ticks:") {
        return raw
            .parse::<u64>()
            .map_err(|_| EditError::InvalidDuration(s.to_string()));
    }

    let (modifier, base_name) = if let Some(rest) = s.strip_prefix("dotted-") {
        (Some(1.5), rest)
    } else if let Some(rest) = s.strip_prefix("triplet-") {
        (Some(2.0 / 3.0), rest)
    } else {
        (None, s)
    };

    let base_name = DURATION_ALIASES
        .iter()
        .find(|(alias, _)| *alias == base_name)
        .map(|(_, name)| *name)
        .unwrap_or(base_name);

    let multiplier = DURATION_NAMES
        .iter()
        .find(|(name, _)| *name == base_name)
        .map(|(_, m)| *m)
        .ok_or_else(|| EditError::InvalidDuration(s.to_string()))?;

    let mut ticks = multiplier * ppqn as f64;
    if let Some(factor) = modifier {
        ticks *= factor;
    }
    Ok(ticks.round() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_named_durations() {
        assert_eq!(parse_duration("whole", 480).unwrap(), 1920);
        assert_eq!(parse_duration("half", 480).unwrap(), 960);
        assert_eq!(parse_duration("quarter", 480).unwrap(), 480);
        assert_eq!(parse_duration("eighth", 480).unwrap(), 240);
        assert_eq!(parse_duration("sixteenth", 480).unwrap(), 120);
        assert_eq!(parse_duration("32nd", 480).unwrap(), 60);
    }

    #[test]
    fn test_numeric_aliases() {
        assert_eq!(parse_duration("4n", 480).unwrap(), 480);
        assert_eq!(parse_duration("8n", 480).unwrap(), 240);
        assert_eq!(parse_duration("1n", 480).unwrap(), 1920);
    }

    #[test]
    fn test_modifiers() {
        assert_eq!(parse_duration("dotted-quarter", 480).unwrap(), 720);
        assert_eq!(parse_duration("triplet-eighth", 480).unwrap(), 160);
        assert_eq!(parse_duration("dotted-8n", 480).unwrap(), 360);
    }

    #[test]
    fn test_raw_ticks() {
        assert_eq!(parse_duration("ticks:360", 480).unwrap(), 360);
    }

    #[test]
    fn test_unknown_duration() {
        for bad in ["3n", "quaver", "ticks:abc", ""] {
            assert!(
                matches!(
                    parse_duration(bad, 480),
                    Err(EditError::InvalidDuration(_))
                ),
                "expected failure for {:?}",
                bad
            );
        }
    }
}
