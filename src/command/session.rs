// Session - owns the document/index/log triad and applies commands

use log::{error, warn};

use crate::command::response::{BatchResponse, CommandResponse};
use crate::command::{verb, Command};
use crate::error::{EditError, EditResult};
use crate::history::{self, UndoLog};
use crate::index::EventIndex;
use crate::io::smf;
use crate::io::tracker;
use crate::timeline::meta::KeyMode;
use crate::timeline::position::position_to_ticks;
use crate::timeline::TimelineDocument;

/// One editing session: a document, its index, its undo log, and the
/// reference tick used by relative positions
///
/// Commands apply strictly in submission order; the triad is owned by
/// exactly one session, so no locking is involved.
pub struct Session {
    pub document: TimelineDocument,
    pub index: EventIndex,
    pub log: UndoLog,
    /// Tick written by the most recent placing command, used as the
    /// reference for `+DUR` / `-DUR` positions
    pub last_tick: u64,
}

impl Session {
    /// Start a session over an empty document
    pub fn new(
        title: &str,
        ppqn: u16,
        tempo: f64,
        time_signature: (u8, u8),
        key: Option<(&str, KeyMode)>,
    ) -> Self {
        let mut document = TimelineDocument::new(title, ppqn);
        document.set_tempo(tempo, 0);
        document.set_time_signature(time_signature.0, time_signature.1, 0);
        if let Some((key, mode)) = key {
            document.set_key_signature(key, mode, 0);
        }
        Self::from_document(document)
    }

    /// Start a session over an existing document
    pub fn from_document(document: TimelineDocument) -> Self {
        let mut index = EventIndex::new();
        index.rebuild(&document);
        Self {
            document,
            index,
            log: UndoLog::new(),
            last_tick: 0,
        }
    }

    /// Load a session from SMF bytes (fresh log, rebuilt index)
    pub fn load(bytes: &[u8]) -> EditResult<Self> {
        Ok(Self::from_document(smf::load(bytes)?))
    }

    /// Serialise the current document to SMF bytes
    pub fn save(&self) -> EditResult<Vec<u8>> {
        smf::save(&self.document)
    }

    /// Apply one command and rebuild the index
    pub fn apply(&mut self, command: &Command) -> CommandResponse {
        let response = match verb::lookup(&command.verb) {
            Some(spec) => match (spec.handler)(command, self) {
                Ok(message) => CommandResponse::success(message),
                Err(err) => CommandResponse::failure(&err),
            },
            None => CommandResponse::failure(&EditError::InvalidArgument(format!(
                "Unknown verb: '{}'",
                command.verb
            ))),
        };
        self.index.rebuild(&self.document);
        response
    }

    /// Apply a batch atomically
    ///
    /// On the first failure every already-applied command in the batch
    /// is rolled back before the error is reported, and the remaining
    /// commands are not attempted. A state digest closes the batch.
    pub fn apply_batch(&mut self, commands: &[Command]) -> BatchResponse {
        let saved_cursor = self.log.cursor();
        let mut responses = Vec::with_capacity(commands.len());
        let mut ok = true;

        for command in commands {
            let response = self.apply(command);
            let failed = !response.ok;
            responses.push(response);
            if failed {
                warn!(
                    "batch failed at '{}', rolling back {} event(s)",
                    command.verb,
                    self.log.cursor().saturating_sub(saved_cursor)
                );
                self.rollback_to(saved_cursor);
                ok = false;
                break;
            }
        }

        BatchResponse {
            ok,
            responses,
            digest: self.document.digest(),
        }
    }

    /// Execute a read-only query (`tracks`, `events`, `stats`, ...)
    pub fn query(&self, command: &Command) -> CommandResponse {
        match crate::command::queries::run(command, self) {
            Ok(message) => CommandResponse::success(message),
            Err(err) => CommandResponse::failure(&err),
        }
    }

    /// Import a tracker-format block into a track
    ///
    /// Step 1 of the block lands at `at`; every imported note is
    /// logged so the import undoes as one group of note additions.
    pub fn import_tracker(
        &mut self,
        track_name: &str,
        text: &str,
        at: &str,
        resolution: tracker::Resolution,
    ) -> EditResult<usize> {
        self.document.resolve_track(track_name)?;
        let start_tick = self.resolve_position(at)?;
        let ticks_per_step = resolution.ticks_per_step(self.document.ppqn);
        let notes = tracker::parse_block(text, start_tick, ticks_per_step)?;

        let mut added = 0;
        for (pitch, velocity, tick, duration) in notes {
            let note = self
                .document
                .add_note(track_name, pitch, tick, duration, velocity, None)?;
            self.log.append(history::LogEvent::NoteAdded {
                note: history::NoteSnapshot::from(&note),
            });
            added += 1;
        }
        self.index.rebuild(&self.document);
        Ok(added)
    }

    /// Resolve a position literal against the current document state
    pub(crate) fn resolve_position(&self, text: &str) -> EditResult<u64> {
        position_to_ticks(
            text,
            &self.document.time_signatures,
            self.document.ppqn,
            Some(self.last_tick),
            Some(self.document.song_end_tick()),
        )
    }

    /// Rewind the log to `cursor`, reversing each traversed event
    fn rollback_to(&mut self, cursor: usize) {
        let events = self.log.rewind_to(cursor);
        for event in &events {
            if let Err(err) = history::reverse(event, &mut self.document) {
                // A reversal that no longer applies is an internal
                // invariant violation, not a user error
                error!("rollback failed to reverse {:?}: {}", event, err);
            }
        }
        self.index.rebuild(&self.document);
    }

    /// Undo `count` events, reversing them against the document
    pub fn undo(&mut self, count: usize) -> EditResult<usize> {
        let events = self.log.undo(count);
        for event in &events {
            history::reverse(event, &mut self.document)?;
        }
        self.index.rebuild(&self.document);
        Ok(events.len())
    }

    /// Undo back to the named checkpoint
    pub fn undo_to(&mut self, name: &str) -> EditResult<usize> {
        let events = self.log.undo_to(name)?;
        for event in &events {
            history::reverse(event, &mut self.document)?;
        }
        self.index.rebuild(&self.document);
        Ok(events.len())
    }

    /// Redo `count` previously undone events
    pub fn redo(&mut self, count: usize) -> EditResult<usize> {
        let events = self.log.redo(count);
        for event in &events {
            history::replay(event, &mut self.document)?;
        }
        self.index.rebuild(&self.document);
        Ok(events.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session_with_piano() -> Session {
        let mut session = Session::new("Test", 480, 120.0, (4, 4), None);
        session.apply(&Command::new("track").arg("add").arg("Piano"));
        session
    }

    #[test]
    fn test_new_session_seeds_conductor() {
        let session = Session::new("Test", 480, 100.0, (3, 4), Some(("G", KeyMode::Major)));
        assert_eq!(session.document.tempo_map[0].bpm, 100.0);
        assert_eq!(session.document.time_signatures[0].numerator, 3);
        assert_eq!(session.document.key_signatures[0].key, "G");
    }

    #[test]
    fn test_unknown_verb() {
        let mut session = session_with_piano();
        let response = session.apply(&Command::new("frobnicate"));
        assert!(!response.ok);
        assert!(response.message.contains("frobnicate"));
    }

    #[test]
    fn test_batch_rollback_restores_state() {
        let mut session = session_with_piano();
        let batch = [
            Command::new("note").target("Piano").arg("C4").param("at", "1.1"),
            Command::new("note").target("BadTrack").arg("E4").param("at", "1.2"),
        ];
        let response = session.apply_batch(&batch);

        assert!(!response.ok);
        assert_eq!(response.responses.len(), 2);
        assert!(response.responses[0].ok);
        assert!(!response.responses[1].ok);
        // Full rollback: the first note is gone again
        assert_eq!(session.index.all().len(), 0);
        assert!(response.digest.contains("0n"));
    }

    #[test]
    fn test_batch_success_reports_digest() {
        let mut session = session_with_piano();
        let batch = [
            Command::new("note").target("Piano").arg("C4").param("at", "1.1"),
            Command::new("note").target("Piano").arg("E4").param("at", "1.2"),
        ];
        let response = session.apply_batch(&batch);
        assert!(response.ok);
        assert_eq!(response.digest, "[1t 2n tempo:120 4/4]");
    }

    #[test]
    fn test_import_tracker_block() {
        let mut session = session_with_piano();
        let block = "\
[Resolution: quarter]
Step 01: [C4_v100_4]
Step 05: [E4_v90_2]";
        let added = session
            .import_tracker("Piano", block, "1.1", tracker::Resolution::Quarter)
            .unwrap();
        assert_eq!(added, 2);

        let notes = session.index.all().to_vec();
        assert_eq!(notes.len(), 2);
        assert_eq!(notes[0].start_tick, 0);
        assert_eq!(notes[0].duration_ticks, 1920);
        assert_eq!(notes[1].start_tick, 1920);
        // Tracker import participates in undo
        session.undo(2).unwrap();
        assert!(session.index.all().is_empty());
    }
}
