// TimelineDocument - the editable multi-track document

use crate::error::{EditError, EditResult};
use crate::timeline::bridge::{insert_at_tick, remove_at, to_absolute};
use crate::timeline::event::{EventKind, Note};
use crate::timeline::meta::{
    KeyMode, KeySignatureChange, Marker, TempoChange, TimeSignatureChange,
};
use crate::timeline::track::Track;

/// The document: title, resolution, instrument tracks and conductor maps
///
/// The tempo/time-signature/key/marker lists form the conductor track;
/// they are kept tick-sorted at all times and behave as if an implicit
/// 120bpm / 4:4 entry exists at tick 0 even when absent. Instrument
/// tracks are ordered and carry unique names.
#[derive(Debug, Clone, PartialEq)]
pub struct TimelineDocument {
    pub title: String,
    /// Ticks per quarter note
    pub ppqn: u16,
    pub tracks: Vec<Track>,
    pub tempo_map: Vec<TempoChange>,
    pub time_signatures: Vec<TimeSignatureChange>,
    pub key_signatures: Vec<KeySignatureChange>,
    pub markers: Vec<Marker>,
}

impl TimelineDocument {
    /// Creates an empty document (implicit 120bpm / 4:4 defaults apply)
    pub fn new(title: impl Into<String>, ppqn: u16) -> Self {
        Self {
            title: title.into(),
            ppqn,
            tracks: Vec::new(),
            tempo_map: Vec::new(),
            time_signatures: Vec::new(),
            key_signatures: Vec::new(),
            markers: Vec::new(),
        }
    }

    // -- Track CRUD ---------------------------------------------------------

    pub fn track(&self, name: &str) -> Option<&Track> {
        self.tracks.iter().find(|t| t.name == name)
    }

    pub fn track_mut(&mut self, name: &str) -> Option<&mut Track> {
        self.tracks.iter_mut().find(|t| t.name == name)
    }

    /// Resolve a track name or fail with a fuzzy-matched suggestion
    pub fn resolve_track(&self, name: &str) -> EditResult<usize> {
        self.tracks
            .iter()
            .position(|t| t.name == name)
            .ok_or_else(|| EditError::TrackNotFound {
                name: name.to_string(),
                suggestion: self.suggest_track(name),
            })
    }

    /// Create a new instrument track
    ///
    /// Without an explicit channel the lowest free channel is assigned,
    /// skipping the percussion channel (9).
    pub fn add_track(
        &mut self,
        name: &str,
        channel: Option<u8>,
        program: u8,
        bank_msb: Option<u8>,
        bank_lsb: Option<u8>,
    ) -> EditResult<&Track> {
        if self.track(name).is_some() {
            return Err(EditError::DuplicateTrack(name.to_string()));
        }
        let channel = channel.unwrap_or_else(|| self.next_free_channel());
        let mut track = Track::new(name, channel, program);
        track.bank_msb = bank_msb;
        track.bank_lsb = bank_lsb;
        self.tracks.push(track);
        Ok(&self.tracks[self.tracks.len() - 1])
    }

    /// Remove a track, returning its former index and the track itself
    pub fn remove_track(&mut self, name: &str) -> EditResult<(usize, Track)> {
        let index = self.resolve_track(name)?;
        Ok((index, self.tracks.remove(index)))
    }

    /// Re-insert a previously removed track at its former position
    pub(crate) fn insert_track(&mut self, index: usize, track: Track) {
        let index = index.min(self.tracks.len());
        self.tracks.insert(index, track);
    }

    /// Lowest channel not used by any track, skipping 9 (percussion)
    pub fn next_free_channel(&self) -> u8 {
        let used: Vec<u8> = self.tracks.iter().map(|t| t.channel).collect();
        for ch in (0u8..16).filter(|&c| c != 9) {
            if !used.contains(&ch) {
                return ch;
            }
        }
        0
    }

    // -- Note CRUD ----------------------------------------------------------

    /// Insert a note-on/note-off pair and return the derived Note
    pub fn add_note(
        &mut self,
        track_name: &str,
        pitch: u8,
        start_tick: u64,
        duration_ticks: u64,
        velocity: u8,
        channel: Option<u8>,
    ) -> EditResult<Note> {
        if pitch > 127 {
            return Err(EditError::InvalidPitch(format!("midi:{}", pitch)));
        }
        if velocity == 0 || velocity > 127 {
            return Err(EditError::InvalidVelocity(velocity.to_string()));
        }
        let index = self.resolve_track(track_name)?;
        let track = &mut self.tracks[index];
        let channel = channel.unwrap_or(track.channel);

        insert_at_tick(
            &mut track.events,
            EventKind::NoteOn {
                channel,
                pitch,
                velocity,
            },
            start_tick,
        );
        insert_at_tick(
            &mut track.events,
            EventKind::NoteOff { channel, pitch },
            start_tick + duration_ticks,
        );

        track
            .paired_notes()
            .into_iter()
            .find(|n| n.pitch == pitch && n.start_tick == start_tick && n.velocity == velocity)
            .ok_or_else(|| {
                // Inserting both halves guarantees a pair exists
                EditError::NoMatch
            })
    }

    /// Remove the first note matching pitch and start tick
    ///
    /// The note-off is removed before the note-on (higher index first,
    /// so the lower index stays valid). Returns the removed Note, or
    /// None when nothing matched.
    pub fn remove_note_at(
        &mut self,
        track_name: &str,
        pitch: u8,
        start_tick: u64,
    ) -> EditResult<Option<Note>> {
        let index = self.resolve_track(track_name)?;
        let track = &mut self.tracks[index];

        let found = track
            .paired_notes()
            .into_iter()
            .find(|n| n.pitch == pitch && n.start_tick == start_tick);
        match found {
            Some(note) => {
                remove_at(&mut track.events, note.off_index)?;
                remove_at(&mut track.events, note.on_index)?;
                Ok(Some(note))
            }
            None => Ok(None),
        }
    }

    /// Derived notes from every track, sorted by onset then pitch
    pub fn all_notes(&self) -> Vec<Note> {
        let mut notes: Vec<Note> = self
            .tracks
            .iter()
            .flat_map(|t| t.paired_notes())
            .collect();
        notes.sort_by_key(|n| (n.start_tick, n.pitch));
        notes
    }

    // -- Controller / pitch-bend events -------------------------------------

    pub fn add_control_change(
        &mut self,
        track_name: &str,
        controller: u8,
        value: u8,
        tick: u64,
        channel: Option<u8>,
    ) -> EditResult<()> {
        if controller > 127 || value > 127 {
            return Err(EditError::InvalidArgument(format!(
                "Controller and value must be 0-127 (got cc{}={})",
                controller, value
            )));
        }
        let index = self.resolve_track(track_name)?;
        let track = &mut self.tracks[index];
        let channel = channel.unwrap_or(track.channel);
        insert_at_tick(
            &mut track.events,
            EventKind::ControlChange {
                channel,
                controller,
                value,
            },
            tick,
        );
        Ok(())
    }

    /// Remove the first controller event matching at `tick`
    pub fn remove_control_change_at(
        &mut self,
        track_name: &str,
        controller: u8,
        tick: u64,
    ) -> EditResult<bool> {
        let index = self.resolve_track(track_name)?;
        let track = &mut self.tracks[index];
        let position = to_absolute(&track.events).into_iter().position(|(t, kind)| {
            t == tick && matches!(kind, EventKind::ControlChange { controller: c, .. } if c == controller)
        });
        match position {
            Some(i) => {
                remove_at(&mut track.events, i)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn add_pitch_bend(
        &mut self,
        track_name: &str,
        value: i16,
        tick: u64,
        channel: Option<u8>,
    ) -> EditResult<()> {
        if !(-8192..=8191).contains(&value) {
            return Err(EditError::InvalidArgument(format!(
                "Pitch bend must be -8192..8191 (got {})",
                value
            )));
        }
        let index = self.resolve_track(track_name)?;
        let track = &mut self.tracks[index];
        let channel = channel.unwrap_or(track.channel);
        insert_at_tick(
            &mut track.events,
            EventKind::PitchBend { channel, value },
            tick,
        );
        Ok(())
    }

    /// Remove the first pitch-bend event at `tick`
    pub fn remove_pitch_bend_at(&mut self, track_name: &str, tick: u64) -> EditResult<bool> {
        let index = self.resolve_track(track_name)?;
        let track = &mut self.tracks[index];
        let position = to_absolute(&track.events)
            .into_iter()
            .position(|(t, kind)| t == tick && matches!(kind, EventKind::PitchBend { .. }));
        match position {
            Some(i) => {
                remove_at(&mut track.events, i)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    // -- Conductor data -----------------------------------------------------

    /// Set the tempo at `tick`, returning the bpm previously at that tick
    pub fn set_tempo(&mut self, bpm: f64, tick: u64) -> Option<f64> {
        let previous = self
            .tempo_map
            .iter()
            .position(|t| t.tick == tick)
            .map(|i| self.tempo_map.remove(i).bpm);
        self.tempo_map.push(TempoChange { tick, bpm });
        self.tempo_map.sort_by_key(|t| t.tick);
        previous
    }

    /// Remove the tempo entry at `tick`, returning its bpm
    pub fn remove_tempo_at(&mut self, tick: u64) -> Option<f64> {
        self.tempo_map
            .iter()
            .position(|t| t.tick == tick)
            .map(|i| self.tempo_map.remove(i).bpm)
    }

    pub fn set_time_signature(
        &mut self,
        numerator: u8,
        denominator: u8,
        tick: u64,
    ) -> Option<(u8, u8)> {
        let previous = self
            .time_signatures
            .iter()
            .position(|ts| ts.tick == tick)
            .map(|i| {
                let old = self.time_signatures.remove(i);
                (old.numerator, old.denominator)
            });
        self.time_signatures.push(TimeSignatureChange {
            tick,
            numerator,
            denominator,
        });
        self.time_signatures.sort_by_key(|ts| ts.tick);
        previous
    }

    pub fn remove_time_signature_at(&mut self, tick: u64) -> Option<(u8, u8)> {
        self.time_signatures
            .iter()
            .position(|ts| ts.tick == tick)
            .map(|i| {
                let old = self.time_signatures.remove(i);
                (old.numerator, old.denominator)
            })
    }

    pub fn set_key_signature(
        &mut self,
        key: &str,
        mode: KeyMode,
        tick: u64,
    ) -> Option<(String, KeyMode)> {
        let previous = self
            .key_signatures
            .iter()
            .position(|ks| ks.tick == tick)
            .map(|i| {
                let old = self.key_signatures.remove(i);
                (old.key, old.mode)
            });
        self.key_signatures.push(KeySignatureChange {
            tick,
            key: key.to_string(),
            mode,
        });
        self.key_signatures.sort_by_key(|ks| ks.tick);
        previous
    }

    pub fn remove_key_signature_at(&mut self, tick: u64) -> Option<(String, KeyMode)> {
        self.key_signatures
            .iter()
            .position(|ks| ks.tick == tick)
            .map(|i| {
                let old = self.key_signatures.remove(i);
                (old.key, old.mode)
            })
    }

    pub fn add_marker(&mut self, text: &str, tick: u64) {
        self.markers.push(Marker {
            tick,
            text: text.to_string(),
        });
        self.markers.sort_by_key(|m| m.tick);
    }

    pub fn remove_marker(&mut self, text: &str, tick: u64) -> bool {
        match self
            .markers
            .iter()
            .position(|m| m.tick == tick && m.text == text)
        {
            Some(i) => {
                self.markers.remove(i);
                true
            }
            None => false,
        }
    }

    pub fn set_title(&mut self, title: &str) -> String {
        std::mem::replace(&mut self.title, title.to_string())
    }

    // -- Derived state ------------------------------------------------------

    /// Maximum note-end tick across all tracks
    pub fn song_end_tick(&self) -> u64 {
        self.tracks
            .iter()
            .flat_map(|t| t.paired_notes())
            .map(|n| n.end_tick())
            .max()
            .unwrap_or(0)
    }

    /// Compact state fingerprint appended to mutation responses
    ///
    /// Example: `[2t 5n tempo:120 4/4]`
    pub fn digest(&self) -> String {
        let n_tracks = self.tracks.len();
        let n_notes: usize = self.tracks.iter().map(|t| t.note_count()).sum();
        let tempo = self.tempo_map.first().map(|t| t.bpm).unwrap_or(120.0);
        let (num, den) = self
            .time_signatures
            .first()
            .map(|ts| (ts.numerator, ts.denominator))
            .unwrap_or((4, 4));

        let mut parts = vec![
            format!("{}t", n_tracks),
            format!("{}n", n_notes),
            format!("tempo:{:.0}", tempo),
            format!("{}/{}", num, den),
        ];
        if let Some(ks) = self.key_signatures.first() {
            parts.push(format!("{} {}", ks.key, ks.mode));
        }
        format!("[{}]", parts.join(" "))
    }

    /// Fuzzy-match a track name for error suggestions
    fn suggest_track(&self, name: &str) -> Option<String> {
        if self.tracks.is_empty() {
            return None;
        }
        let best = self
            .tracks
            .iter()
            .map(|t| (similarity(name, &t.name), &t.name))
            .max_by(|a, b| a.0.partial_cmp(&b.0).unwrap())?;
        if best.0 >= 0.4 {
            Some(format!("Did you mean '{}'?", best.1))
        } else {
            let names: Vec<&str> = self.tracks.iter().map(|t| t.name.as_str()).collect();
            Some(format!("Available tracks: {}", names.join(", ")))
        }
    }
}

/// Normalised similarity in 0.0..=1.0 based on edit distance
fn similarity(a: &str, b: &str) -> f64 {
    let a_lower = a.to_lowercase();
    let b_lower = b.to_lowercase();
    let max_len = a_lower.chars().count().max(b_lower.chars().count());
    if max_len == 0 {
        return 1.0;
    }
    1.0 - levenshtein(&a_lower, &b_lower) as f64 / max_len as f64
}

fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let mut row: Vec<usize> = (0..=b.len()).collect();
    for (i, ca) in a.iter().enumerate() {
        let mut prev = row[0];
        row[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = if ca == cb { prev } else { prev + 1 };
            prev = row[j + 1];
            row[j + 1] = cost.min(row[j] + 1).min(row[j + 1] + 1);
        }
    }
    row[b.len()]
}
