// Position conversion: measure.beat text, absolute ticks, seconds

use crate::error::{EditError, EditResult};
use crate::parse::duration::parse_duration;
use crate::timeline::meta::{
    effective_tempo_map, effective_time_signatures, TempoChange, TimeSignatureChange,
};

/// Ticks for one beat given the time-signature denominator
///
/// denominator 4 -> quarter note -> ppqn ticks, 8 -> eighth -> ppqn/2.
pub fn ticks_per_beat(ppqn: u16, denominator: u8) -> u64 {
    ppqn as u64 * 4 / denominator as u64
}

fn ticks_per_measure(ppqn: u16, numerator: u8, denominator: u8) -> u64 {
    numerator as u64 * ticks_per_beat(ppqn, denominator)
}

/// Convert a position string to an absolute tick
///
/// Accepted forms:
/// - `"M.B"`: 1-based measure and beat (`"1.1"` = tick 0)
/// - `"M.B.T"`: with a sub-beat tick offset (`"1.1.120"` = tick 120 in 4/4)
/// - `"tick:N"`: raw absolute tick
/// - `"+DUR"` / `"-DUR"`: a duration relative to `reference_tick`
/// - `"end"`: the song end, when `song_end_tick` is known
pub fn position_to_ticks(
    text: &str,
    time_sigs: &[TimeSignatureChange],
    ppqn: u16,
    reference_tick: Option<u64>,
    song_end_tick: Option<u64>,
) -> EditResult<u64> {
    if let Some(raw) = text.strip_prefix("tick:") {
        return raw
            .parse::<u64>()
            .map_err(|_| EditError::InvalidPosition(text.to_string()));
    }

    if text == "end" {
        return song_end_tick.ok_or_else(|| EditError::MissingReference(text.to_string()));
    }

    if let Some(dur) = text.strip_prefix('+') {
        let reference =
            reference_tick.ok_or_else(|| EditError::MissingReference(text.to_string()))?;
        let offset = parse_duration(dur, ppqn)
            .map_err(|_| EditError::InvalidPosition(text.to_string()))?;
        return Ok(reference + offset);
    }
    if let Some(dur) = text.strip_prefix('-') {
        let reference =
            reference_tick.ok_or_else(|| EditError::MissingReference(text.to_string()))?;
        let offset = parse_duration(dur, ppqn)
            .map_err(|_| EditError::InvalidPosition(text.to_string()))?;
        return Ok(reference.saturating_sub(offset));
    }

    let parts: Vec<&str> = text.split('.').collect();
    if parts.len() < 2 || parts.len() > 3 {
        return Err(EditError::InvalidPosition(text.to_string()));
    }
    let measure: u64 = parts[0]
        .parse()
        .map_err(|_| EditError::InvalidPosition(text.to_string()))?;
    let beat: u64 = parts[1]
        .parse()
        .map_err(|_| EditError::InvalidPosition(text.to_string()))?;
    let sub_ticks: u64 = if parts.len() == 3 {
        parts[2]
            .parse()
            .map_err(|_| EditError::InvalidPosition(text.to_string()))?
    } else {
        0
    };
    if measure < 1 || beat < 1 {
        return Err(EditError::InvalidPosition(text.to_string()));
    }

    let sigs = effective_time_signatures(time_sigs);
    let target_measure_0 = measure - 1;
    let mut accumulated_tick = 0u64;
    let mut current_measure_0 = 0u64;

    for (i, sig) in sigs.iter().enumerate() {
        let next_tick = sigs.get(i + 1).map(|s| s.tick);
        let tpm = ticks_per_measure(ppqn, sig.numerator, sig.denominator);

        // Whole measures that fit under this signature before the next one
        let measures_in_segment = next_tick.map(|next| (next - sig.tick) / tpm);

        match measures_in_segment {
            Some(m) if current_measure_0 + m <= target_measure_0 => {
                accumulated_tick = sig.tick + m * tpm;
                current_measure_0 += m;
            }
            _ => {
                let measures_needed = target_measure_0 - current_measure_0;
                accumulated_tick = sig.tick + measures_needed * tpm;
                let beat_ticks = ticks_per_beat(ppqn, sig.denominator);
                return Ok(accumulated_tick + (beat - 1) * beat_ticks + sub_ticks);
            }
        }
    }

    Ok(accumulated_tick)
}

/// Convert an absolute tick to a `"M.B"` / `"M.B.T"` position string
pub fn ticks_to_position(tick: u64, time_sigs: &[TimeSignatureChange], ppqn: u16) -> String {
    let sigs = effective_time_signatures(time_sigs);
    let mut current_measure_0 = 0u64;

    for (i, sig) in sigs.iter().enumerate() {
        let next_tick = sigs.get(i + 1).map(|s| s.tick);
        let tpm = ticks_per_measure(ppqn, sig.numerator, sig.denominator);

        if let Some(next) = next_tick {
            if tick >= next {
                current_measure_0 += (next - sig.tick) / tpm;
                continue;
            }
        }

        let offset = tick - sig.tick;
        let measures_here = offset / tpm;
        let remainder = offset % tpm;
        let beat_ticks = ticks_per_beat(ppqn, sig.denominator);
        let beat_0 = remainder / beat_ticks;
        let sub = remainder % beat_ticks;

        let measure_1 = current_measure_0 + measures_here + 1;
        let beat_1 = beat_0 + 1;

        return if sub != 0 {
            format!("{}.{}.{}", measure_1, beat_1, sub)
        } else {
            format!("{}.{}", measure_1, beat_1)
        };
    }

    "1.1".to_string()
}

/// Convert an absolute tick to seconds using the tempo map
pub fn ticks_to_seconds(tick: u64, tempo_map: &[TempoChange], ppqn: u16) -> f64 {
    let tempos = effective_tempo_map(tempo_map);
    let mut seconds = 0.0;

    for (i, tc) in tempos.iter().enumerate() {
        let next_tick = tempos.get(i + 1).map(|t| t.tick);
        let secs_per_tick = 60.0 / (tc.bpm * ppqn as f64);

        match next_tick {
            Some(next) if tick >= next => {
                seconds += (next - tc.tick) as f64 * secs_per_tick;
            }
            _ => {
                seconds += (tick - tc.tick) as f64 * secs_per_tick;
                return seconds;
            }
        }
    }

    seconds
}

/// Convert seconds to the nearest absolute tick using the tempo map
pub fn seconds_to_ticks(seconds: f64, tempo_map: &[TempoChange], ppqn: u16) -> u64 {
    let tempos = effective_tempo_map(tempo_map);
    let mut remaining = seconds;

    for (i, tc) in tempos.iter().enumerate() {
        let secs_per_tick = 60.0 / (tc.bpm * ppqn as f64);
        let next_tick = tempos.get(i + 1).map(|t| t.tick);

        if let Some(next) = next_tick {
            let segment_duration = (next - tc.tick) as f64 * secs_per_tick;
            if remaining > segment_duration {
                remaining -= segment_duration;
                continue;
            }
        }

        let ticks_in_segment = remaining / secs_per_tick;
        return tc.tick + ticks_in_segment.round() as u64;
    }

    0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sig(tick: u64, numerator: u8, denominator: u8) -> TimeSignatureChange {
        TimeSignatureChange {
            tick,
            numerator,
            denominator,
        }
    }

    #[test]
    fn test_position_to_ticks_origin() {
        assert_eq!(position_to_ticks("1.1", &[], 480, None, None).unwrap(), 0);
    }

    #[test]
    fn test_position_to_ticks_second_measure() {
        assert_eq!(
            position_to_ticks("2.1", &[sig(0, 4, 4)], 480, None, None).unwrap(),
            1920
        );
    }

    #[test]
    fn test_position_to_ticks_beat_and_sub() {
        assert_eq!(
            position_to_ticks("1.3", &[sig(0, 4, 4)], 480, None, None).unwrap(),
            960
        );
        assert_eq!(
            position_to_ticks("2.1.120", &[sig(0, 4, 4)], 480, None, None).unwrap(),
            2040
        );
    }

    #[test]
    fn test_position_to_ticks_raw_tick() {
        assert_eq!(
            position_to_ticks("tick:960", &[], 480, None, None).unwrap(),
            960
        );
    }

    #[test]
    fn test_position_to_ticks_time_signature_change() {
        // 4/4 for two measures (3840 ticks), then 3/4
        let sigs = [sig(0, 4, 4), sig(3840, 3, 4)];
        // Measure 3 starts at the signature change
        assert_eq!(
            position_to_ticks("3.1", &sigs, 480, None, None).unwrap(),
            3840
        );
        // Measure 4 = 3840 + one 3/4 measure (1440)
        assert_eq!(
            position_to_ticks("4.1", &sigs, 480, None, None).unwrap(),
            5280
        );
    }

    #[test]
    fn test_position_to_ticks_compound_meter() {
        // 6/8: a beat is an eighth note (240 ticks at ppqn 480)
        assert_eq!(
            position_to_ticks("1.4", &[sig(0, 6, 8)], 480, None, None).unwrap(),
            720
        );
        // One 6/8 measure = 1440 ticks
        assert_eq!(
            position_to_ticks("2.1", &[sig(0, 6, 8)], 480, None, None).unwrap(),
            1440
        );
    }

    #[test]
    fn test_position_to_ticks_relative() {
        assert_eq!(
            position_to_ticks("+quarter", &[], 480, Some(960), None).unwrap(),
            1440
        );
        assert_eq!(
            position_to_ticks("-half", &[], 480, Some(1920), None).unwrap(),
            960
        );
        // Relative below zero clamps at zero
        assert_eq!(
            position_to_ticks("-whole", &[], 480, Some(480), None).unwrap(),
            0
        );
    }

    #[test]
    fn test_position_to_ticks_relative_without_reference() {
        let err = position_to_ticks("+quarter", &[], 480, None, None).unwrap_err();
        assert!(matches!(err, EditError::MissingReference(_)));
    }

    #[test]
    fn test_position_to_ticks_end() {
        assert_eq!(
            position_to_ticks("end", &[], 480, None, Some(7680)).unwrap(),
            7680
        );
        assert!(matches!(
            position_to_ticks("end", &[], 480, None, None),
            Err(EditError::MissingReference(_))
        ));
    }

    #[test]
    fn test_position_to_ticks_rejects_zero_based() {
        assert!(matches!(
            position_to_ticks("0.1", &[], 480, None, None),
            Err(EditError::InvalidPosition(_))
        ));
        assert!(matches!(
            position_to_ticks("1.0", &[], 480, None, None),
            Err(EditError::InvalidPosition(_))
        ));
    }

    #[test]
    fn test_position_to_ticks_malformed() {
        for bad in ["", "1", "x.y", "1.2.3.4", "tick:abc"] {
            assert!(
                matches!(
                    position_to_ticks(bad, &[], 480, None, None),
                    Err(EditError::InvalidPosition(_))
                ),
                "expected failure for {:?}",
                bad
            );
        }
    }

    #[test]
    fn test_ticks_to_position_round_trip() {
        let sigs = [sig(0, 4, 4)];
        assert_eq!(ticks_to_position(0, &sigs, 480), "1.1");
        assert_eq!(ticks_to_position(1920, &sigs, 480), "2.1");
        assert_eq!(ticks_to_position(2040, &sigs, 480), "2.1.120");
    }

    #[test]
    fn test_ticks_to_position_after_signature_change() {
        let sigs = [sig(0, 4, 4), sig(3840, 3, 4)];
        assert_eq!(ticks_to_position(3840, &sigs, 480), "3.1");
        assert_eq!(ticks_to_position(5280 + 480, &sigs, 480), "4.2");
    }

    #[test]
    fn test_ticks_to_seconds_constant_tempo() {
        // One quarter note at 120bpm = 0.5s
        assert!((ticks_to_seconds(480, &[], 480) - 0.5).abs() < 1e-9);
        assert!((ticks_to_seconds(1920, &[], 480) - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_ticks_to_seconds_tempo_change() {
        let tempos = [
            TempoChange { tick: 0, bpm: 120.0 },
            TempoChange {
                tick: 1920,
                bpm: 60.0,
            },
        ];
        // First measure at 120bpm = 2s, then one beat at 60bpm = 1s
        let secs = ticks_to_seconds(2400, &tempos, 480);
        assert!((secs - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_seconds_to_ticks_inverse() {
        let tempos = [
            TempoChange { tick: 0, bpm: 120.0 },
            TempoChange {
                tick: 1920,
                bpm: 90.0,
            },
        ];
        for tick in [0u64, 480, 1920, 2400, 3840] {
            let secs = ticks_to_seconds(tick, &tempos, 480);
            assert_eq!(seconds_to_ticks(secs, &tempos, 480), tick);
        }
    }
}
