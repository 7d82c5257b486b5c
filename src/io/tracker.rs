// Tracker codec - compact step-grid text view over derived notes
//
// Output only emits steps that contain events, one line per step,
// with simultaneous events grouped. Token format: [PITCH_vVEL_STEPS]
// where STEPS is the note length in grid steps. Import reads the
// exact same syntax, so render -> import round-trips.

use crate::error::{EditError, EditResult};
use crate::parse::pitch::{parse_pitch, pitch_name};
use crate::timeline::event::Note;
use crate::timeline::meta::TimeSignatureChange;
use crate::timeline::position::ticks_to_position;

/// Grid resolution for rendering and import
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Quarter,
    Eighth,
    Sixteenth,
    ThirtySecond,
}

impl Resolution {
    /// Parse a resolution name (`"quarter"`, `"4n"`, `"8th"`, ...)
    pub fn parse(s: &str) -> EditResult<Self> {
        match s.to_lowercase().as_str() {
            "quarter" | "4n" => Ok(Resolution::Quarter),
            "8th" | "8n" => Ok(Resolution::Eighth),
            "16th" | "16n" => Ok(Resolution::Sixteenth),
            "32nd" | "32n" => Ok(Resolution::ThirtySecond),
            _ => Err(EditError::InvalidDuration(s.to_string())),
        }
    }

    pub fn ticks_per_step(&self, ppqn: u16) -> u64 {
        match self {
            Resolution::Quarter => ppqn as u64,
            Resolution::Eighth => ppqn as u64 / 2,
            Resolution::Sixteenth => ppqn as u64 / 4,
            Resolution::ThirtySecond => ppqn as u64 / 8,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Resolution::Quarter => "quarter",
            Resolution::Eighth => "8th",
            Resolution::Sixteenth => "16th",
            Resolution::ThirtySecond => "32nd",
        }
    }
}

/// Coarsest resolution where every note start and end aligns to the
/// grid (with one tick of tolerance); 16th when nothing aligns
pub fn auto_detect_resolution(notes: &[Note], ppqn: u16) -> Resolution {
    if notes.is_empty() {
        return Resolution::Sixteenth;
    }
    let candidates = [
        Resolution::Quarter,
        Resolution::Eighth,
        Resolution::Sixteenth,
        Resolution::ThirtySecond,
    ];
    for resolution in candidates {
        let tps = resolution.ticks_per_step(ppqn);
        if tps == 0 {
            continue;
        }
        let aligned = notes.iter().all(|n| {
            let start_rem = n.start_tick % tps;
            let end_rem = n.end_tick() % tps;
            start_rem.min(tps - start_rem) <= 1 && end_rem.min(tps - end_rem) <= 1
        });
        if aligned {
            return resolution;
        }
    }
    Resolution::Sixteenth
}

/// Render notes in `start_tick..end_tick` as tracker text
pub fn render(
    notes: &[Note],
    track_name: &str,
    time_sigs: &[TimeSignatureChange],
    ppqn: u16,
    start_tick: u64,
    end_tick: u64,
    resolution: Option<Resolution>,
) -> String {
    let in_range: Vec<&Note> = notes
        .iter()
        .filter(|n| n.end_tick() > start_tick && n.start_tick < end_tick)
        .collect();

    if in_range.is_empty() {
        return format!("No notes on {} in range.", track_name);
    }

    let resolution = resolution.unwrap_or_else(|| {
        let owned: Vec<Note> = in_range.iter().map(|n| (*n).clone()).collect();
        auto_detect_resolution(&owned, ppqn)
    });
    let tps = resolution.ticks_per_step(ppqn);

    // One token per note at its start step
    let mut sorted: Vec<&Note> = in_range
        .iter()
        .filter(|n| n.start_tick >= start_tick)
        .copied()
        .collect();
    sorted.sort_by_key(|n| (n.start_tick, n.pitch));

    let mut steps: Vec<(u64, Vec<String>)> = Vec::new();
    for note in sorted {
        let step = (note.start_tick - start_tick) / tps;
        let dur_steps =
            ((note.duration_ticks as f64 / tps as f64).round() as u64).max(1);
        let token = format!("[{}_v{}_{}]", pitch_name(note.pitch), note.velocity, dur_steps);
        match steps.last_mut() {
            Some((s, tokens)) if *s == step => tokens.push(token),
            _ => steps.push((step, vec![token])),
        }
    }

    if steps.is_empty() {
        return format!("No notes on {} in range.", track_name);
    }

    let start_pos = ticks_to_position(start_tick, time_sigs, ppqn);
    let end_pos = ticks_to_position(end_tick, time_sigs, ppqn);
    let mut lines = vec![
        format!("[Resolution: {}]", resolution.label()),
        format!("[Track: {} | Range: {}-{}]", track_name, start_pos, end_pos),
    ];
    for (step, tokens) in steps {
        lines.push(format!("Step {:02}: {}", step + 1, tokens.join(", ")));
    }
    lines.join("\n")
}

/// Parse a `[C4_v100_4]` token into (midi, velocity, duration steps)
pub fn parse_event_token(token: &str) -> EditResult<(u8, u8, u64)> {
    let inner = token
        .trim()
        .strip_prefix('[')
        .and_then(|t| t.strip_suffix(']'))
        .ok_or_else(|| EditError::InvalidArgument(format!("Invalid event token: {}", token)))?;

    let mut parts = inner.split('_');
    let pitch_str = parts.next().unwrap_or("");
    let vel_str = parts.next().unwrap_or("");
    let dur_str = parts.next().unwrap_or("");
    if parts.next().is_some() || !vel_str.starts_with('v') {
        return Err(EditError::InvalidArgument(format!(
            "Invalid event token: {}",
            token
        )));
    }

    let pitch = parse_pitch(pitch_str)?.midi_number;
    let velocity: u8 = vel_str[1..]
        .parse()
        .map_err(|_| EditError::InvalidArgument(format!("Invalid event token: {}", token)))?;
    let duration_steps: u64 = dur_str
        .parse()
        .map_err(|_| EditError::InvalidArgument(format!("Invalid event token: {}", token)))?;
    if duration_steps == 0 {
        return Err(EditError::InvalidArgument(format!(
            "Invalid event token: {}",
            token
        )));
    }
    Ok((pitch, velocity, duration_steps))
}

/// Parse a `Step 03: [C4_v100_4], [D5_v80_2]` line
///
/// Step numbers are 1-indexed as displayed.
pub fn parse_step_line(line: &str) -> EditResult<(u64, Vec<(u8, u8, u64)>)> {
    let rest = line
        .trim()
        .strip_prefix("Step")
        .ok_or_else(|| EditError::InvalidArgument(format!("Invalid step line: {}", line)))?;
    let (number, tokens) = rest
        .split_once(':')
        .ok_or_else(|| EditError::InvalidArgument(format!("Invalid step line: {}", line)))?;
    let step: u64 = number
        .trim()
        .parse()
        .map_err(|_| EditError::InvalidArgument(format!("Invalid step line: {}", line)))?;
    if step == 0 {
        return Err(EditError::InvalidArgument(format!(
            "Invalid step line: {}",
            line
        )));
    }

    let mut events = Vec::new();
    for token in tokens.split(',') {
        let token = token.trim();
        if !token.is_empty() {
            events.push(parse_event_token(token)?);
        }
    }
    Ok((step, events))
}

/// Parse a whole tracker block into notes ready for `add_note`
///
/// Header lines (in square brackets) and blank lines are skipped.
/// Returns `(pitch, velocity, absolute_tick, duration_ticks)` tuples
/// sorted by tick then pitch; step 1 sits at `start_tick`.
pub fn parse_block(
    text: &str,
    start_tick: u64,
    ticks_per_step: u64,
) -> EditResult<Vec<(u8, u8, u64, u64)>> {
    let mut results = Vec::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('[') {
            continue;
        }
        let (step, events) = parse_step_line(line)?;
        let step_tick = start_tick + (step - 1) * ticks_per_step;
        for (pitch, velocity, dur_steps) in events {
            results.push((pitch, velocity, step_tick, dur_steps * ticks_per_step));
        }
    }
    results.sort_by_key(|r| (r.2, r.0));
    Ok(results)
}
