// Conductor-track entries: tempo, time signature, key signature, markers

/// A tempo change at an absolute tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TempoChange {
    pub tick: u64,
    pub bpm: f64,
}

/// A time-signature change at an absolute tick
///
/// The denominator is the actual note value (4, not its power of two).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeSignatureChange {
    pub tick: u64,
    pub numerator: u8,
    pub denominator: u8,
}

/// A key-signature change at an absolute tick
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeySignatureChange {
    pub tick: u64,
    /// Key name, e.g. "C", "G", "Bb"
    pub key: String,
    pub mode: KeyMode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyMode {
    Major,
    Minor,
}

impl std::fmt::Display for KeyMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KeyMode::Major => write!(f, "major"),
            KeyMode::Minor => write!(f, "minor"),
        }
    }
}

/// A text marker at an absolute tick
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Marker {
    pub tick: u64,
    pub text: String,
}

/// Time-signature map with the implicit 4/4-at-tick-0 default applied
///
/// Returns a tick-sorted list guaranteed to start at tick 0.
pub fn effective_time_signatures(sigs: &[TimeSignatureChange]) -> Vec<TimeSignatureChange> {
    let mut result: Vec<TimeSignatureChange> = sigs.to_vec();
    result.sort_by_key(|ts| ts.tick);
    if result.first().map(|ts| ts.tick != 0).unwrap_or(true) {
        result.insert(
            0,
            TimeSignatureChange {
                tick: 0,
                numerator: 4,
                denominator: 4,
            },
        );
    }
    result
}

/// Tempo map with the implicit 120bpm-at-tick-0 default applied
pub fn effective_tempo_map(tempos: &[TempoChange]) -> Vec<TempoChange> {
    let mut result: Vec<TempoChange> = tempos.to_vec();
    result.sort_by(|a, b| a.tick.cmp(&b.tick));
    if result.first().map(|t| t.tick != 0).unwrap_or(true) {
        result.insert(0, TempoChange { tick: 0, bpm: 120.0 });
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effective_time_signatures_empty() {
        let sigs = effective_time_signatures(&[]);
        assert_eq!(sigs.len(), 1);
        assert_eq!(sigs[0].tick, 0);
        assert_eq!((sigs[0].numerator, sigs[0].denominator), (4, 4));
    }

    #[test]
    fn test_effective_time_signatures_missing_tick_zero() {
        let sigs = effective_time_signatures(&[TimeSignatureChange {
            tick: 1920,
            numerator: 3,
            denominator: 4,
        }]);
        assert_eq!(sigs.len(), 2);
        assert_eq!(sigs[0].tick, 0);
        assert_eq!(sigs[1].tick, 1920);
    }

    #[test]
    fn test_effective_tempo_map_sorts() {
        let tempos = effective_tempo_map(&[
            TempoChange {
                tick: 960,
                bpm: 90.0,
            },
            TempoChange {
                tick: 0,
                bpm: 140.0,
            },
        ]);
        assert_eq!(tempos[0].bpm, 140.0);
        assert_eq!(tempos[1].tick, 960);
    }
}
