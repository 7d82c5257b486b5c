// Selector-based editing verbs: remove, move, copy, transpose,
// velocity, quantize, modify, repeat, crescendo/decrescendo
//
// Every verb follows the same shape: resolve a note set, apply a pure
// per-note transform, re-add, and let the index re-derive.

use crate::command::{Command, Session};
use crate::error::{EditError, EditResult};
use crate::history::{LogEvent, NoteSnapshot};
use crate::index::SelectorResolver;
use crate::parse::duration::parse_duration;
use crate::parse::pitch::parse_pitch;
use crate::parse::velocity::parse_velocity;
use crate::timeline::event::Note;
use crate::timeline::position::ticks_to_position;

/// Resolve the command's selectors into a non-empty note set
fn resolve_selected(cmd: &Command, session: &Session) -> EditResult<Vec<Note>> {
    let resolver = SelectorResolver::new(&session.document, &session.index, &session.log);
    let notes = resolver.resolve(&cmd.selectors)?;
    if notes.is_empty() {
        return Err(EditError::NoMatch);
    }
    Ok(notes)
}

fn position_display(session: &Session, tick: u64) -> String {
    ticks_to_position(
        tick,
        &session.document.time_signatures,
        session.document.ppqn,
    )
}

pub fn op_remove(cmd: &Command, session: &mut Session) -> EditResult<String> {
    let notes = resolve_selected(cmd, session)?;

    let mut count = 0;
    for note in &notes {
        if let Some(removed) = session
            .document
            .remove_note_at(&note.track, note.pitch, note.start_tick)?
        {
            session.log.append(LogEvent::NoteRemoved {
                note: NoteSnapshot::from(&removed),
            });
            count += 1;
        }
    }
    Ok(format!("Removed {} note(s)", count))
}

pub fn op_move(cmd: &Command, session: &mut Session) -> EditResult<String> {
    let notes = resolve_selected(cmd, session)?;
    let to_str = cmd
        .param_str("to")
        .ok_or_else(|| EditError::InvalidArgument("Missing to: parameter".into()))?;
    let to_tick = session.resolve_position(to_str)?;

    let min_tick = notes.iter().map(|n| n.start_tick).min().unwrap();
    let delta = to_tick as i64 - min_tick as i64;

    for note in &notes {
        session
            .document
            .remove_note_at(&note.track, note.pitch, note.start_tick)?;
    }
    for note in &notes {
        let new_tick = (note.start_tick as i64 + delta).max(0) as u64;
        session.document.add_note(
            &note.track,
            note.pitch,
            new_tick,
            note.duration_ticks,
            note.velocity,
            Some(note.channel),
        )?;
        let mut after = NoteSnapshot::from(note);
        after.start_tick = new_tick;
        session.log.append(LogEvent::NoteModified {
            before: NoteSnapshot::from(note),
            after,
        });
    }
    session.last_tick = to_tick;

    Ok(format!(
        "Moved {} note(s) to {}",
        notes.len(),
        position_display(session, to_tick)
    ))
}

pub fn op_copy(cmd: &Command, session: &mut Session) -> EditResult<String> {
    let notes = resolve_selected(cmd, session)?;
    let to_str = cmd
        .param_str("to")
        .ok_or_else(|| EditError::InvalidArgument("Missing to: parameter".into()))?;
    let to_tick = session.resolve_position(to_str)?;

    let min_tick = notes.iter().map(|n| n.start_tick).min().unwrap();
    let delta = to_tick as i64 - min_tick as i64;

    for note in &notes {
        let new_tick = (note.start_tick as i64 + delta).max(0) as u64;
        let added = session.document.add_note(
            &note.track,
            note.pitch,
            new_tick,
            note.duration_ticks,
            note.velocity,
            Some(note.channel),
        )?;
        session.log.append(LogEvent::NoteAdded {
            note: NoteSnapshot::from(&added),
        });
    }
    session.last_tick = to_tick;

    Ok(format!(
        "Copied {} note(s) to {}",
        notes.len(),
        position_display(session, to_tick)
    ))
}

pub fn op_transpose(cmd: &Command, session: &mut Session) -> EditResult<String> {
    let notes = resolve_selected(cmd, session)?;
    let semitones_str = cmd
        .target
        .as_deref()
        .or_else(|| cmd.args.first().map(String::as_str))
        .ok_or_else(|| EditError::InvalidArgument("Missing semitone count".into()))?;
    let semitones: i32 = semitones_str.parse().map_err(|_| {
        EditError::InvalidArgument(format!("Invalid semitone value: {}", semitones_str))
    })?;

    for note in &notes {
        session
            .document
            .remove_note_at(&note.track, note.pitch, note.start_tick)?;
    }
    let mut kept = 0;
    for note in &notes {
        let new_pitch = note.pitch as i32 + semitones;
        if (0..=127).contains(&new_pitch) {
            session.document.add_note(
                &note.track,
                new_pitch as u8,
                note.start_tick,
                note.duration_ticks,
                note.velocity,
                Some(note.channel),
            )?;
            let mut after = NoteSnapshot::from(note);
            after.pitch = new_pitch as u8;
            session.log.append(LogEvent::NoteModified {
                before: NoteSnapshot::from(note),
                after,
            });
            kept += 1;
        } else {
            // Transposed out of MIDI range: the note is dropped
            session.log.append(LogEvent::NoteRemoved {
                note: NoteSnapshot::from(note),
            });
        }
    }

    let direction = if semitones >= 0 { "up" } else { "down" };
    Ok(format!(
        "Transposed {} note(s) {} {} semitones",
        kept,
        direction,
        semitones.abs()
    ))
}

pub fn op_velocity(cmd: &Command, session: &mut Session) -> EditResult<String> {
    let notes = resolve_selected(cmd, session)?;
    let delta_str = cmd
        .target
        .as_deref()
        .or_else(|| cmd.args.first().map(String::as_str))
        .ok_or_else(|| EditError::InvalidArgument("Missing velocity delta".into()))?;
    let delta: i32 = delta_str.parse().map_err(|_| {
        EditError::InvalidArgument(format!("Invalid velocity delta: {}", delta_str))
    })?;

    for note in &notes {
        session
            .document
            .remove_note_at(&note.track, note.pitch, note.start_tick)?;
    }
    for note in &notes {
        let new_velocity = (note.velocity as i32 + delta).clamp(1, 127) as u8;
        session.document.add_note(
            &note.track,
            note.pitch,
            note.start_tick,
            note.duration_ticks,
            new_velocity,
            Some(note.channel),
        )?;
        let mut after = NoteSnapshot::from(note);
        after.velocity = new_velocity;
        session.log.append(LogEvent::NoteModified {
            before: NoteSnapshot::from(note),
            after,
        });
    }

    Ok(format!(
        "Adjusted velocity of {} note(s) by {:+}",
        notes.len(),
        delta
    ))
}

pub fn op_quantize(cmd: &Command, session: &mut Session) -> EditResult<String> {
    let notes = resolve_selected(cmd, session)?;
    let grid_str = cmd.param_str("grid").unwrap_or("quarter");
    let grid_ticks = parse_duration(grid_str, session.document.ppqn)?;
    if grid_ticks == 0 {
        return Err(EditError::InvalidDuration(grid_str.to_string()));
    }

    for note in &notes {
        session
            .document
            .remove_note_at(&note.track, note.pitch, note.start_tick)?;
    }
    for note in &notes {
        let steps = (note.start_tick as f64 / grid_ticks as f64).round() as u64;
        let new_tick = steps * grid_ticks;
        session.document.add_note(
            &note.track,
            note.pitch,
            new_tick,
            note.duration_ticks,
            note.velocity,
            Some(note.channel),
        )?;
        let mut after = NoteSnapshot::from(note);
        after.start_tick = new_tick;
        session.log.append(LogEvent::NoteModified {
            before: NoteSnapshot::from(note),
            after,
        });
    }

    Ok(format!("Quantized {} note(s) to {}", notes.len(), grid_str))
}

pub fn op_modify(cmd: &Command, session: &mut Session) -> EditResult<String> {
    let notes = resolve_selected(cmd, session)?;

    // Parse every requested change upfront so a bad literal fails
    // before any mutation
    let new_pitch = cmd.param_str("pitch").map(parse_pitch).transpose()?;
    let new_velocity = cmd.param_str("vel").map(parse_velocity).transpose()?;
    let new_duration = cmd
        .param_str("dur")
        .map(|d| parse_duration(d, session.document.ppqn))
        .transpose()?;
    let new_tick = cmd
        .param_str("at")
        .map(|p| session.resolve_position(p))
        .transpose()?;
    let new_channel = cmd.resolve_channel()?;

    if new_pitch.is_none()
        && new_velocity.is_none()
        && new_duration.is_none()
        && new_tick.is_none()
        && new_channel.is_none()
    {
        return Err(EditError::InvalidArgument(
            "No modification specified".into(),
        ));
    }

    for note in &notes {
        session
            .document
            .remove_note_at(&note.track, note.pitch, note.start_tick)?;
    }
    for note in &notes {
        let after = NoteSnapshot {
            track: note.track.clone(),
            pitch: new_pitch.as_ref().map(|p| p.midi_number).unwrap_or(note.pitch),
            start_tick: new_tick.unwrap_or(note.start_tick),
            duration_ticks: new_duration.unwrap_or(note.duration_ticks),
            velocity: new_velocity.unwrap_or(note.velocity),
            channel: new_channel.unwrap_or(note.channel),
        };
        session.document.add_note(
            &after.track,
            after.pitch,
            after.start_tick,
            after.duration_ticks,
            after.velocity,
            Some(after.channel),
        )?;
        session.log.append(LogEvent::NoteModified {
            before: NoteSnapshot::from(note),
            after,
        });
    }

    Ok(format!("Modified {} note(s)", notes.len()))
}

pub fn op_repeat(cmd: &Command, session: &mut Session) -> EditResult<String> {
    let notes = resolve_selected(cmd, session)?;
    let count: usize = match cmd.param_str("count") {
        Some(raw) => raw
            .parse()
            .map_err(|_| EditError::InvalidArgument(format!("Invalid count: {}", raw)))?,
        None => 1,
    };
    if count == 0 {
        return Err(EditError::InvalidArgument("Count must be at least 1".into()));
    }

    let min_tick = notes.iter().map(|n| n.start_tick).min().unwrap();
    let max_end = notes.iter().map(|n| n.end_tick()).max().unwrap();
    let span = max_end - min_tick;

    let start_tick = match cmd.param_str("to") {
        Some(to_str) => session.resolve_position(to_str)?,
        None => max_end,
    };
    let base_offset = start_tick as i64 - min_tick as i64;

    let mut added = 0;
    for i in 0..count {
        let offset = base_offset + (i as u64 * span) as i64;
        for note in &notes {
            let new_tick = (note.start_tick as i64 + offset).max(0) as u64;
            let new_note = session.document.add_note(
                &note.track,
                note.pitch,
                new_tick,
                note.duration_ticks,
                note.velocity,
                Some(note.channel),
            )?;
            session.log.append(LogEvent::NoteAdded {
                note: NoteSnapshot::from(&new_note),
            });
            added += 1;
        }
    }

    Ok(format!(
        "Repeated {} note(s) x{} ({} added)",
        notes.len(),
        count,
        added
    ))
}

pub fn op_crescendo(cmd: &Command, session: &mut Session) -> EditResult<String> {
    let mut notes = resolve_selected(cmd, session)?;
    let from_str = cmd
        .param_str("from")
        .ok_or_else(|| EditError::InvalidArgument("Missing from: parameter".into()))?;
    let to_str = cmd
        .param_str("to")
        .ok_or_else(|| EditError::InvalidArgument("Missing to: parameter".into()))?;
    let from_velocity = parse_velocity(from_str)? as f64;
    let to_velocity = parse_velocity(to_str)? as f64;

    notes.sort_by_key(|n| n.start_tick);
    let total = notes.len();

    for note in &notes {
        session
            .document
            .remove_note_at(&note.track, note.pitch, note.start_tick)?;
    }
    for (i, note) in notes.iter().enumerate() {
        let new_velocity = if total == 1 {
            to_velocity
        } else {
            from_velocity + (to_velocity - from_velocity) * i as f64 / (total - 1) as f64
        };
        let new_velocity = (new_velocity.round() as i32).clamp(1, 127) as u8;
        session.document.add_note(
            &note.track,
            note.pitch,
            note.start_tick,
            note.duration_ticks,
            new_velocity,
            Some(note.channel),
        )?;
        let mut after = NoteSnapshot::from(note);
        after.velocity = new_velocity;
        session.log.append(LogEvent::NoteModified {
            before: NoteSnapshot::from(note),
            after,
        });
    }

    let label = if cmd.verb == "decrescendo" {
        "Decrescendo"
    } else {
        "Crescendo"
    };
    Ok(format!(
        "{} applied to {} note(s) ({} -> {})",
        label, total, from_str, to_str
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::{Selector, SelectorKind};

    fn session() -> Session {
        let mut session = Session::new("Test", 480, 120.0, (4, 4), None);
        session.apply(&Command::new("track").arg("add").arg("Piano"));
        session.apply(&Command::new("track").arg("add").arg("Bass"));
        for (track, pitch, at) in [
            ("Piano", "C4", "1.1"),
            ("Piano", "E4", "1.2"),
            ("Piano", "G4", "1.3"),
            ("Bass", "C2", "1.1"),
        ] {
            let response = session.apply(
                &Command::new("note")
                    .target(track)
                    .arg(pitch)
                    .param("at", at)
                    .param("vel", "80"),
            );
            assert!(response.ok, "{}", response);
        }
        session
    }

    fn piano_selector() -> Selector {
        Selector::new(SelectorKind::Track("Piano".into()))
    }

    #[test]
    fn test_remove_selected() {
        let mut s = session();
        let response = s.apply(&Command::new("remove").selector(piano_selector()));
        assert!(response.ok, "{}", response);
        assert_eq!(response.message, "Removed 3 note(s)");
        assert_eq!(s.index.all().len(), 1);
    }

    #[test]
    fn test_remove_without_selectors() {
        let mut s = session();
        let response = s.apply(&Command::new("remove"));
        assert!(!response.ok);
        assert!(response.message.contains("No selectors"));
    }

    #[test]
    fn test_no_match_is_reported() {
        let mut s = session();
        let response = s.apply(
            &Command::new("remove").selector(Selector::new(SelectorKind::Pitch("C7".into()))),
        );
        assert!(!response.ok);
        assert_eq!(response.message, "No notes matched selectors");
    }

    #[test]
    fn test_move_preserves_spacing() {
        let mut s = session();
        let response = s.apply(
            &Command::new("move")
                .selector(piano_selector())
                .param("to", "2.1"),
        );
        assert!(response.ok, "{}", response);

        let ticks: Vec<u64> = s
            .index
            .by_track("Piano")
            .iter()
            .map(|n| n.start_tick)
            .collect();
        assert_eq!(ticks, vec![1920, 2400, 2880]);
        // Bass untouched
        assert_eq!(s.index.by_track("Bass")[0].start_tick, 0);
    }

    #[test]
    fn test_copy_doubles_notes() {
        let mut s = session();
        let response = s.apply(
            &Command::new("copy")
                .selector(piano_selector())
                .param("to", "3.1"),
        );
        assert!(response.ok, "{}", response);
        assert_eq!(s.index.by_track("Piano").len(), 6);
    }

    #[test]
    fn test_transpose_up() {
        let mut s = session();
        let response = s.apply(
            &Command::new("transpose")
                .target("+12")
                .selector(piano_selector()),
        );
        assert!(response.ok, "{}", response);
        let pitches: Vec<u8> = s
            .index
            .by_track("Piano")
            .iter()
            .map(|n| n.pitch)
            .collect();
        assert_eq!(pitches, vec![72, 76, 79]);
    }

    #[test]
    fn test_transpose_drops_out_of_range() {
        let mut s = session();
        let response = s.apply(
            &Command::new("transpose")
                .target("+70")
                .selector(piano_selector()),
        );
        assert!(response.ok, "{}", response);
        // C4+70=130, E4+70=134, G4+70=137: all dropped
        assert!(s.index.by_track("Piano").is_empty());
        assert!(response.message.starts_with("Transposed 0"));
    }

    #[test]
    fn test_velocity_clamps() {
        let mut s = session();
        let response = s.apply(
            &Command::new("velocity")
                .target("+100")
                .selector(piano_selector()),
        );
        assert!(response.ok, "{}", response);
        assert!(s.index.by_track("Piano").iter().all(|n| n.velocity == 127));
    }

    #[test]
    fn test_quantize_snaps_to_grid() {
        let mut s = session();
        s.apply(
            &Command::new("note")
                .target("Piano")
                .arg("A4")
                .param("at", "tick:500"),
        );
        let response = s.apply(
            &Command::new("quantize")
                .selector(Selector::new(SelectorKind::Pitch("A4".into())))
                .param("grid", "quarter"),
        );
        assert!(response.ok, "{}", response);
        assert_eq!(s.index.by_pitch(69)[0].start_tick, 480);
    }

    #[test]
    fn test_modify_multiple_fields() {
        let mut s = session();
        let response = s.apply(
            &Command::new("modify")
                .selector(Selector::new(SelectorKind::Pitch("C4".into())))
                .param("vel", "ff")
                .param("dur", "half"),
        );
        assert!(response.ok, "{}", response);
        let note = &s.index.by_pitch(60)[0];
        assert_eq!(note.velocity, 112);
        assert_eq!(note.duration_ticks, 960);
    }

    #[test]
    fn test_modify_requires_a_change() {
        let mut s = session();
        let response = s.apply(&Command::new("modify").selector(piano_selector()));
        assert!(!response.ok);
    }

    #[test]
    fn test_repeat_appends_after_span() {
        let mut s = session();
        let response = s.apply(
            &Command::new("repeat")
                .selector(piano_selector())
                .param("count", "2"),
        );
        assert!(response.ok, "{}", response);
        // 3 originals + 2 copies of 3
        assert_eq!(s.index.by_track("Piano").len(), 9);
        // First repetition starts where the selection ended
        let span_end = 480 * 3; // last note ends at 1.4
        assert!(s
            .index
            .by_track("Piano")
            .iter()
            .any(|n| n.start_tick == span_end as u64));
    }

    #[test]
    fn test_crescendo_interpolates() {
        let mut s = session();
        let response = s.apply(
            &Command::new("crescendo")
                .selector(piano_selector())
                .param("from", "p")
                .param("to", "ff"),
        );
        assert!(response.ok, "{}", response);
        let velocities: Vec<u8> = s
            .index
            .by_track("Piano")
            .iter()
            .map(|n| n.velocity)
            .collect();
        assert_eq!(velocities.first(), Some(&49));
        assert_eq!(velocities.last(), Some(&112));
        assert!(velocities[1] > 49 && velocities[1] < 112);
    }
}
