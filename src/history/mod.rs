// History - cursor-based undo/redo log with named checkpoints

use std::collections::HashMap;

use crate::error::{EditError, EditResult};
use crate::timeline::event::Note;
use crate::timeline::meta::KeyMode;
use crate::timeline::track::Track;
use crate::timeline::TimelineDocument;

/// Plain value snapshot of a derived note
///
/// Unlike [`Note`] it carries no event-list indices, so it stays valid
/// after unrelated edits move events around.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteSnapshot {
    pub track: String,
    pub pitch: u8,
    pub start_tick: u64,
    pub duration_ticks: u64,
    pub velocity: u8,
    pub channel: u8,
}

impl From<&Note> for NoteSnapshot {
    fn from(note: &Note) -> Self {
        Self {
            track: note.track.clone(),
            pitch: note.pitch,
            start_tick: note.start_tick,
            duration_ticks: note.duration_ticks,
            velocity: note.velocity,
            channel: note.channel,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackFlag {
    Mute,
    Solo,
}

/// One reversible log entry
///
/// Each variant carries enough state to invert the mutation it
/// records; `reverse` and `replay` match exhaustively over this enum.
#[derive(Debug, Clone, PartialEq)]
pub enum LogEvent {
    NoteAdded {
        note: NoteSnapshot,
    },
    NoteRemoved {
        note: NoteSnapshot,
    },
    NoteModified {
        before: NoteSnapshot,
        after: NoteSnapshot,
    },
    ControlChangeAdded {
        track: String,
        controller: u8,
        value: u8,
        tick: u64,
        channel: u8,
    },
    PitchBendAdded {
        track: String,
        value: i16,
        tick: u64,
        channel: u8,
    },
    TrackAdded {
        index: usize,
        track: Track,
    },
    TrackRemoved {
        index: usize,
        track: Track,
    },
    TrackFlagChanged {
        track: String,
        flag: TrackFlag,
        old: bool,
        new: bool,
    },
    ProgramChanged {
        track: String,
        old_program: u8,
        new_program: u8,
        old_bank: (Option<u8>, Option<u8>),
        new_bank: (Option<u8>, Option<u8>),
    },
    TempoChanged {
        tick: u64,
        previous: Option<f64>,
        bpm: f64,
    },
    TimeSignatureChanged {
        tick: u64,
        previous: Option<(u8, u8)>,
        numerator: u8,
        denominator: u8,
    },
    KeySignatureChanged {
        tick: u64,
        previous: Option<(String, KeyMode)>,
        key: String,
        mode: KeyMode,
    },
    MarkerAdded {
        tick: u64,
        text: String,
    },
    TitleChanged {
        old: String,
        new: String,
    },
    /// Synthetic marker recording a named checkpoint position
    Checkpoint {
        name: String,
    },
}

impl LogEvent {
    pub fn is_checkpoint(&self) -> bool {
        matches!(self, LogEvent::Checkpoint { .. })
    }

    /// Short human-readable label for history listings
    pub fn describe(&self) -> String {
        match self {
            LogEvent::NoteAdded { note } => {
                format!("add note {} @{} on {}", note.pitch, note.start_tick, note.track)
            }
            LogEvent::NoteRemoved { note } => {
                format!("remove note {} @{} on {}", note.pitch, note.start_tick, note.track)
            }
            LogEvent::NoteModified { before, after } => format!(
                "modify note {} @{} on {} -> {} @{}",
                before.pitch, before.start_tick, before.track, after.pitch, after.start_tick
            ),
            LogEvent::ControlChangeAdded {
                track,
                controller,
                value,
                ..
            } => format!("cc{}={} on {}", controller, value, track),
            LogEvent::PitchBendAdded { track, value, .. } => {
                format!("bend {} on {}", value, track)
            }
            LogEvent::TrackAdded { track, .. } => format!("add track '{}'", track.name),
            LogEvent::TrackRemoved { track, .. } => format!("remove track '{}'", track.name),
            LogEvent::TrackFlagChanged {
                track, flag, new, ..
            } => {
                let flag = match flag {
                    TrackFlag::Mute => "mute",
                    TrackFlag::Solo => "solo",
                };
                format!("{} '{}' = {}", flag, track, new)
            }
            LogEvent::ProgramChanged {
                track, new_program, ..
            } => format!("program {} on '{}'", new_program, track),
            LogEvent::TempoChanged { bpm, tick, .. } => format!("tempo {:.0} @{}", bpm, tick),
            LogEvent::TimeSignatureChanged {
                numerator,
                denominator,
                tick,
                ..
            } => format!("time-sig {}/{} @{}", numerator, denominator, tick),
            LogEvent::KeySignatureChanged { key, mode, tick, .. } => {
                format!("key-sig {} {} @{}", key, mode, tick)
            }
            LogEvent::MarkerAdded { text, tick } => format!("marker '{}' @{}", text, tick),
            LogEvent::TitleChanged { new, .. } => format!("title '{}'", new),
            LogEvent::Checkpoint { name } => format!("checkpoint '{}'", name),
        }
    }
}

/// Linear event log with cursor-based undo/redo and named checkpoints
///
/// The cursor sits one past the last applied event. Checkpoints map a
/// name to the cursor at creation time; a matching Checkpoint marker
/// is appended to the log itself so the history is self-describing.
#[derive(Debug, Default)]
pub struct UndoLog {
    events: Vec<LogEvent>,
    cursor: usize,
    checkpoints: HashMap<String, usize>,
}

impl UndoLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Applied events (everything before the cursor)
    pub fn applied(&self) -> &[LogEvent] {
        &self.events[..self.cursor]
    }

    /// Append an event at the cursor, truncating any redo tail
    ///
    /// Checkpoints whose position falls inside the discarded tail are
    /// dropped; the error only surfaces when such a checkpoint is
    /// later dereferenced.
    pub fn append(&mut self, event: LogEvent) {
        self.truncate_tail();
        self.events.push(event);
        self.cursor += 1;
    }

    /// Record the current position under `name`
    pub fn checkpoint(&mut self, name: &str) {
        self.append(LogEvent::Checkpoint {
            name: name.to_string(),
        });
        self.checkpoints.insert(name.to_string(), self.cursor);
    }

    fn truncate_tail(&mut self) {
        if self.cursor < self.events.len() {
            self.events.truncate(self.cursor);
            let cursor = self.cursor;
            self.checkpoints.retain(|_, pos| *pos <= cursor);
        }
    }

    /// Move the cursor back over `count` real events
    ///
    /// Checkpoint markers are passed over without counting. Returns
    /// the traversed events most-recent-first.
    pub fn undo(&mut self, count: usize) -> Vec<LogEvent> {
        let mut reversed = Vec::new();
        while reversed.len() < count && self.cursor > 0 {
            self.cursor -= 1;
            let event = &self.events[self.cursor];
            if !event.is_checkpoint() {
                reversed.push(event.clone());
            }
        }
        reversed
    }

    /// Undo back to, but not past, the named checkpoint
    pub fn undo_to(&mut self, name: &str) -> EditResult<Vec<LogEvent>> {
        let position = *self
            .checkpoints
            .get(name)
            .ok_or_else(|| EditError::CheckpointNotFound(name.to_string()))?;
        Ok(self.rewind_to(position))
    }

    /// Move the cursor back to `position`, returning the real events
    /// traversed most-recent-first
    pub(crate) fn rewind_to(&mut self, position: usize) -> Vec<LogEvent> {
        let mut reversed = Vec::new();
        while self.cursor > position {
            self.cursor -= 1;
            let event = &self.events[self.cursor];
            if !event.is_checkpoint() {
                reversed.push(event.clone());
            }
        }
        reversed
    }

    /// Replay up to `count` real events forward, in chronological order
    pub fn redo(&mut self, count: usize) -> Vec<LogEvent> {
        let mut replayed = Vec::new();
        while replayed.len() < count && self.cursor < self.events.len() {
            let event = self.events[self.cursor].clone();
            self.cursor += 1;
            if !event.is_checkpoint() {
                replayed.push(event);
            }
        }
        replayed
    }

    /// Last `count` non-checkpoint events at or before the cursor,
    /// chronological
    pub fn recent(&self, count: usize) -> Vec<LogEvent> {
        let mut collected: Vec<LogEvent> = self.events[..self.cursor]
            .iter()
            .rev()
            .filter(|ev| !ev.is_checkpoint())
            .take(count)
            .cloned()
            .collect();
        collected.reverse();
        collected
    }
}

/// Invert one event against the document
pub fn reverse(event: &LogEvent, doc: &mut TimelineDocument) -> EditResult<()> {
    match event {
        LogEvent::NoteAdded { note } => {
            doc.remove_note_at(&note.track, note.pitch, note.start_tick)?;
        }
        LogEvent::NoteRemoved { note } => {
            restore_note(doc, note)?;
        }
        LogEvent::NoteModified { before, after } => {
            doc.remove_note_at(&after.track, after.pitch, after.start_tick)?;
            restore_note(doc, before)?;
        }
        LogEvent::ControlChangeAdded {
            track,
            controller,
            tick,
            ..
        } => {
            doc.remove_control_change_at(track, *controller, *tick)?;
        }
        LogEvent::PitchBendAdded { track, tick, .. } => {
            doc.remove_pitch_bend_at(track, *tick)?;
        }
        LogEvent::TrackAdded { track, .. } => {
            doc.remove_track(&track.name)?;
        }
        LogEvent::TrackRemoved { index, track } => {
            doc.insert_track(*index, track.clone());
        }
        LogEvent::TrackFlagChanged {
            track, flag, old, ..
        } => {
            if let Some(t) = doc.track_mut(track) {
                match flag {
                    TrackFlag::Mute => t.mute = *old,
                    TrackFlag::Solo => t.solo = *old,
                }
            }
        }
        LogEvent::ProgramChanged {
            track,
            old_program,
            old_bank,
            ..
        } => {
            if let Some(t) = doc.track_mut(track) {
                t.program = *old_program;
                t.bank_msb = old_bank.0;
                t.bank_lsb = old_bank.1;
            }
        }
        LogEvent::TempoChanged { tick, previous, .. } => match previous {
            Some(bpm) => {
                doc.set_tempo(*bpm, *tick);
            }
            None => {
                doc.remove_tempo_at(*tick);
            }
        },
        LogEvent::TimeSignatureChanged { tick, previous, .. } => match previous {
            Some((num, den)) => {
                doc.set_time_signature(*num, *den, *tick);
            }
            None => {
                doc.remove_time_signature_at(*tick);
            }
        },
        LogEvent::KeySignatureChanged { tick, previous, .. } => match previous {
            Some((key, mode)) => {
                doc.set_key_signature(key, *mode, *tick);
            }
            None => {
                doc.remove_key_signature_at(*tick);
            }
        },
        LogEvent::MarkerAdded { tick, text } => {
            doc.remove_marker(text, *tick);
        }
        LogEvent::TitleChanged { old, .. } => {
            doc.set_title(old);
        }
        LogEvent::Checkpoint { .. } => {}
    }
    Ok(())
}

/// Re-apply one event forward against the document
pub fn replay(event: &LogEvent, doc: &mut TimelineDocument) -> EditResult<()> {
    match event {
        LogEvent::NoteAdded { note } => {
            restore_note(doc, note)?;
        }
        LogEvent::NoteRemoved { note } => {
            doc.remove_note_at(&note.track, note.pitch, note.start_tick)?;
        }
        LogEvent::NoteModified { before, after } => {
            doc.remove_note_at(&before.track, before.pitch, before.start_tick)?;
            restore_note(doc, after)?;
        }
        LogEvent::ControlChangeAdded {
            track,
            controller,
            value,
            tick,
            channel,
        } => {
            doc.add_control_change(track, *controller, *value, *tick, Some(*channel))?;
        }
        LogEvent::PitchBendAdded {
            track,
            value,
            tick,
            channel,
        } => {
            doc.add_pitch_bend(track, *value, *tick, Some(*channel))?;
        }
        LogEvent::TrackAdded { index, track } => {
            doc.insert_track(*index, track.clone());
        }
        LogEvent::TrackRemoved { track, .. } => {
            doc.remove_track(&track.name)?;
        }
        LogEvent::TrackFlagChanged {
            track, flag, new, ..
        } => {
            if let Some(t) = doc.track_mut(track) {
                match flag {
                    TrackFlag::Mute => t.mute = *new,
                    TrackFlag::Solo => t.solo = *new,
                }
            }
        }
        LogEvent::ProgramChanged {
            track,
            new_program,
            new_bank,
            ..
        } => {
            if let Some(t) = doc.track_mut(track) {
                t.program = *new_program;
                t.bank_msb = new_bank.0;
                t.bank_lsb = new_bank.1;
            }
        }
        LogEvent::TempoChanged { tick, bpm, .. } => {
            doc.set_tempo(*bpm, *tick);
        }
        LogEvent::TimeSignatureChanged {
            tick,
            numerator,
            denominator,
            ..
        } => {
            doc.set_time_signature(*numerator, *denominator, *tick);
        }
        LogEvent::KeySignatureChanged {
            tick, key, mode, ..
        } => {
            doc.set_key_signature(key, *mode, *tick);
        }
        LogEvent::MarkerAdded { tick, text } => {
            doc.add_marker(text, *tick);
        }
        LogEvent::TitleChanged { new, .. } => {
            doc.set_title(new);
        }
        LogEvent::Checkpoint { .. } => {}
    }
    Ok(())
}

fn restore_note(doc: &mut TimelineDocument, note: &NoteSnapshot) -> EditResult<()> {
    doc.add_note(
        &note.track,
        note.pitch,
        note.start_tick,
        note.duration_ticks,
        note.velocity,
        Some(note.channel),
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn note_event(pitch: u8) -> LogEvent {
        LogEvent::NoteAdded {
            note: NoteSnapshot {
                track: "Piano".into(),
                pitch,
                start_tick: 0,
                duration_ticks: 480,
                velocity: 80,
                channel: 0,
            },
        }
    }

    #[test]
    fn test_append_advances_cursor() {
        let mut log = UndoLog::new();
        log.append(note_event(60));
        log.append(note_event(62));
        assert_eq!(log.cursor(), 2);
        assert_eq!(log.len(), 2);
    }

    #[test]
    fn test_undo_returns_most_recent_first() {
        let mut log = UndoLog::new();
        log.append(note_event(60));
        log.append(note_event(62));

        let undone = log.undo(2);
        assert_eq!(undone.len(), 2);
        assert!(matches!(
            &undone[0],
            LogEvent::NoteAdded { note } if note.pitch == 62
        ));
        assert_eq!(log.cursor(), 0);
    }

    #[test]
    fn test_redo_chronological() {
        let mut log = UndoLog::new();
        log.append(note_event(60));
        log.append(note_event(62));
        log.undo(2);

        let redone = log.redo(2);
        assert!(matches!(
            &redone[0],
            LogEvent::NoteAdded { note } if note.pitch == 60
        ));
        assert_eq!(log.cursor(), 2);
    }

    #[test]
    fn test_append_after_undo_truncates_tail() {
        let mut log = UndoLog::new();
        log.append(note_event(60));
        log.append(note_event(62));
        log.undo(1);
        log.append(note_event(64));

        assert_eq!(log.len(), 2);
        assert!(log.redo(1).is_empty());
    }

    #[test]
    fn test_checkpoint_markers_not_counted() {
        let mut log = UndoLog::new();
        log.append(note_event(60));
        log.checkpoint("v1");
        log.append(note_event(62));

        // One undo skips the marker and reverses both real events? No:
        // a single step reverses only the newest real event.
        let undone = log.undo(1);
        assert_eq!(undone.len(), 1);
        assert!(matches!(
            &undone[0],
            LogEvent::NoteAdded { note } if note.pitch == 62
        ));

        // The next undo passes the marker without counting it
        let undone = log.undo(1);
        assert_eq!(undone.len(), 1);
        assert!(matches!(
            &undone[0],
            LogEvent::NoteAdded { note } if note.pitch == 60
        ));
        assert_eq!(log.cursor(), 0);
    }

    #[test]
    fn test_undo_to_checkpoint() {
        let mut log = UndoLog::new();
        log.append(note_event(60));
        log.checkpoint("v1");
        log.append(note_event(62));
        log.append(note_event(64));

        let undone = log.undo_to("v1").unwrap();
        assert_eq!(undone.len(), 2);
        assert!(matches!(
            &undone[0],
            LogEvent::NoteAdded { note } if note.pitch == 64
        ));
        // Cursor rests exactly at the checkpoint position
        let more = log.undo_to("v1").unwrap();
        assert!(more.is_empty());
    }

    #[test]
    fn test_unknown_checkpoint() {
        let mut log = UndoLog::new();
        assert_eq!(
            log.undo_to("nope").unwrap_err(),
            EditError::CheckpointNotFound("nope".into())
        );
    }

    #[test]
    fn test_checkpoint_dropped_by_truncation() {
        let mut log = UndoLog::new();
        log.append(note_event(60));
        log.checkpoint("v1");
        log.append(note_event(62));

        // Rewind past the checkpoint, then branch off
        log.undo(2);
        log.append(note_event(64));

        assert_eq!(
            log.undo_to("v1").unwrap_err(),
            EditError::CheckpointNotFound("v1".into())
        );
    }

    #[test]
    fn test_recent_skips_checkpoints() {
        let mut log = UndoLog::new();
        log.append(note_event(60));
        log.checkpoint("v1");
        log.append(note_event(62));
        log.append(note_event(64));

        let recent = log.recent(2);
        assert_eq!(recent.len(), 2);
        assert!(matches!(
            &recent[0],
            LogEvent::NoteAdded { note } if note.pitch == 62
        ));
        assert!(matches!(
            &recent[1],
            LogEvent::NoteAdded { note } if note.pitch == 64
        ));
    }

    #[test]
    fn test_reverse_and_replay_note() {
        let mut doc = TimelineDocument::new("Test", 480);
        doc.add_track("Piano", None, 0, None, None).unwrap();
        let note = doc.add_note("Piano", 60, 0, 480, 80, None).unwrap();
        let event = LogEvent::NoteAdded {
            note: NoteSnapshot::from(&note),
        };

        reverse(&event, &mut doc).unwrap();
        assert!(doc.all_notes().is_empty());

        replay(&event, &mut doc).unwrap();
        let notes = doc.all_notes();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].pitch, 60);
    }

    #[test]
    fn test_reverse_tempo_restores_previous() {
        let mut doc = TimelineDocument::new("Test", 480);
        let previous = doc.set_tempo(120.0, 0);
        assert_eq!(previous, None);
        let previous = doc.set_tempo(90.0, 0);
        let event = LogEvent::TempoChanged {
            tick: 0,
            previous,
            bpm: 90.0,
        };

        reverse(&event, &mut doc).unwrap();
        assert_eq!(doc.tempo_map[0].bpm, 120.0);
    }

    #[test]
    fn test_reverse_track_removal_restores_position() {
        let mut doc = TimelineDocument::new("Test", 480);
        doc.add_track("A", None, 0, None, None).unwrap();
        doc.add_track("B", None, 0, None, None).unwrap();
        doc.add_track("C", None, 0, None, None).unwrap();

        let (index, track) = doc.remove_track("B").unwrap();
        let event = LogEvent::TrackRemoved { index, track };
        reverse(&event, &mut doc).unwrap();

        let names: Vec<&str> = doc.tracks.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["A", "B", "C"]);
    }
}
