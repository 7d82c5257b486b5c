// EventIndex - multi-index over derived notes

use std::collections::HashMap;

use crate::timeline::event::Note;
use crate::timeline::TimelineDocument;

/// Four views over the current note set: full, by track, by pitch, by
/// channel
///
/// The index is fully rebuilt after every mutation rather than patched
/// incrementally; with one rebuild per command the cost is linear in
/// the document and the index can never drift from it.
#[derive(Debug, Default)]
pub struct EventIndex {
    all: Vec<Note>,
    by_track: HashMap<String, Vec<Note>>,
    by_pitch: HashMap<u8, Vec<Note>>,
    by_channel: HashMap<u8, Vec<Note>>,
}

impl EventIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Re-derive every note and repopulate all four views
    pub fn rebuild(&mut self, document: &TimelineDocument) {
        self.all.clear();
        self.by_track.clear();
        self.by_pitch.clear();
        self.by_channel.clear();

        for track in &document.tracks {
            let notes = track.paired_notes();
            self.by_track
                .entry(track.name.clone())
                .or_default()
                .extend(notes.iter().cloned());
            for note in &notes {
                self.by_pitch.entry(note.pitch).or_default().push(note.clone());
                self.by_channel
                    .entry(note.channel)
                    .or_default()
                    .push(note.clone());
            }
            self.all.extend(notes);
        }
    }

    pub fn all(&self) -> &[Note] {
        &self.all
    }

    pub fn by_track(&self, name: &str) -> &[Note] {
        self.by_track.get(name).map(|v| v.as_slice()).unwrap_or(&[])
    }

    pub fn by_pitch(&self, pitch: u8) -> &[Note] {
        self.by_pitch
            .get(&pitch)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    pub fn by_channel(&self, channel: u8) -> &[Note] {
        self.by_channel
            .get(&channel)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// Notes with velocity in `lo..=hi`
    pub fn by_velocity_range(&self, lo: u8, hi: u8) -> Vec<Note> {
        self.all
            .iter()
            .filter(|n| (lo..=hi).contains(&n.velocity))
            .cloned()
            .collect()
    }

    pub fn note_count(&self) -> usize {
        self.all.len()
    }
}
