// Chord parser - chord symbols to pitch sets

use crate::error::{EditError, EditResult};
use crate::parse::pitch::{pitch_from_midi, Pitch};

// Quality name -> semitone intervals from the root
const CHORD_INTERVALS: [(&str, &[i32]); 21] = [
    ("maj", &[0, 4, 7]),
    ("min", &[0, 3, 7]),
    ("m", &[0, 3, 7]),
    ("7", &[0, 4, 7, 10]),
    ("maj7", &[0, 4, 7, 11]),
    ("min7", &[0, 3, 7, 10]),
    ("m7", &[0, 3, 7, 10]),
    ("dim", &[0, 3, 6]),
    ("aug", &[0, 4, 8]),
    ("sus2", &[0, 2, 7]),
    ("sus4", &[0, 5, 7]),
    ("add9", &[0, 4, 7, 14]),
    ("min7b5", &[0, 3, 6, 10]),
    ("m7b5", &[0, 3, 6, 10]),
    ("dim7", &[0, 3, 6, 9]),
    ("9", &[0, 4, 7, 10, 14]),
    ("min9", &[0, 3, 7, 10, 14]),
    ("m9", &[0, 3, 7, 10, 14]),
    ("6", &[0, 4, 7, 9]),
    ("min6", &[0, 3, 7, 9]),
    ("m6", &[0, 3, 7, 9]),
];

fn root_semitone(name: char, accidental: &str) -> Option<i32> {
    let base = match name {
        'C' => 0,
        'D' => 2,
        'E' => 4,
        'F' => 5,
        'G' => 7,
        'A' => 9,
        'B' => 11,
        _ => return None,
    };
    let shift = match accidental {
        "" => 0,
        "#" => 1,
        "b" => -1,
        _ => return None,
    };
    Some(base + shift)
}

/// Parse a chord symbol into its pitch set
///
/// Examples: `"Cmaj"`, `"Am7"`, `"F#dim"`, `"Dm/F"` (slash bass).
/// An empty quality defaults to major. The bass of a slash chord is
/// placed below the root and replaces any chord tone of the same
/// pitch class.
pub fn parse_chord(s: &str, octave: i8) -> EditResult<Vec<Pitch>> {
    let (chord_part, slash_bass) = match s.rsplit_once('/') {
        Some((chord, bass)) => (chord, Some(bass)),
        None => (s, None),
    };

    let (root_name, root_accidental, remainder) =
        extract_root(chord_part).ok_or_else(|| EditError::InvalidChord(s.to_string()))?;
    let root = root_semitone(root_name, root_accidental)
        .ok_or_else(|| EditError::InvalidChord(s.to_string()))?;

    let intervals =
        match_quality(remainder).ok_or_else(|| EditError::InvalidChord(s.to_string()))?;

    let root_midi = (octave as i32 + 1) * 12 + root;
    let mut pitches = Vec::with_capacity(intervals.len());
    for interval in intervals {
        let midi = root_midi + interval;
        if !(0..=127).contains(&midi) {
            return Err(EditError::InvalidChord(s.to_string()));
        }
        pitches.push(pitch_from_midi(midi as u8));
    }

    if let Some(bass) = slash_bass {
        let (bass_name, bass_accidental, bass_rest) =
            extract_root(bass).ok_or_else(|| EditError::InvalidChord(s.to_string()))?;
        if !bass_rest.is_empty() {
            return Err(EditError::InvalidChord(s.to_string()));
        }
        let bass_semitone = root_semitone(bass_name, bass_accidental)
            .ok_or_else(|| EditError::InvalidChord(s.to_string()))?;
        let mut bass_midi = (octave as i32 + 1) * 12 + bass_semitone;
        if bass_midi >= root_midi {
            bass_midi -= 12;
        }
        if !(0..=127).contains(&bass_midi) {
            return Err(EditError::InvalidChord(s.to_string()));
        }
        let bass_pc = bass_midi.rem_euclid(12) as u8;
        pitches.retain(|p| p.midi_number % 12 != bass_pc);
        pitches.insert(0, pitch_from_midi(bass_midi as u8));
    }

    Ok(pitches)
}

/// Split a chord string into root name, accidental and quality remainder
fn extract_root(s: &str) -> Option<(char, &str, &str)> {
    let mut chars = s.char_indices();
    let (_, first) = chars.next()?;
    if !first.is_ascii_alphabetic() {
        return None;
    }
    let name = first.to_ascii_uppercase();
    let rest = &s[1..];
    if let Some(tail) = rest.strip_prefix('#') {
        Some((name, "#", tail))
    } else if let Some(tail) = rest.strip_prefix('b') {
        Some((name, "b", tail))
    } else {
        Some((name, "", rest))
    }
}

/// Match the quality string against known chord types, exact match only
fn match_quality(remainder: &str) -> Option<&'static [i32]> {
    if remainder.is_empty() {
        return CHORD_INTERVALS
            .iter()
            .find(|(name, _)| *name == "maj")
            .map(|(_, iv)| *iv);
    }
    let quality = match remainder {
        "minor" => "min",
        other => other,
    };
    CHORD_INTERVALS
        .iter()
        .find(|(name, _)| *name == quality)
        .map(|(_, iv)| *iv)
}
