// Instrument track: metadata plus the delta-encoded event sequence

use std::collections::HashMap;

use crate::timeline::bridge;
use crate::timeline::event::{EventKind, Note, TrackEvent};

/// One instrument track of the document
///
/// The event sequence is delta-encoded and always terminated by a
/// single end marker. Conductor data (tempo, time signatures, key,
/// markers, title) lives on the document itself, not on a track.
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    /// Unique label within the document
    pub name: String,
    /// Default channel for new events (0-15; 9 is the percussion channel)
    pub channel: u8,
    /// GM program number (0-127)
    pub program: u8,
    /// Bank Select MSB (CC#0), if any
    pub bank_msb: Option<u8>,
    /// Bank Select LSB (CC#32), if any
    pub bank_lsb: Option<u8>,
    pub mute: bool,
    pub solo: bool,
    pub events: Vec<TrackEvent>,
}

impl Track {
    /// Creates an empty track holding only the end marker
    pub fn new(name: impl Into<String>, channel: u8, program: u8) -> Self {
        Self {
            name: name.into(),
            channel,
            program,
            bank_msb: None,
            bank_lsb: None,
            mute: false,
            solo: false,
            events: vec![TrackEvent::new(0, EventKind::EndOfTrack)],
        }
    }

    /// Pair note-ons with note-offs into derived Notes
    ///
    /// Handles note-on with velocity 0 as a note-off, and overlapping
    /// notes on the same pitch+channel by FIFO pairing (oldest-on with
    /// oldest-off). Results are sorted by onset tick, then pitch.
    pub fn paired_notes(&self) -> Vec<Note> {
        let mut pending: HashMap<(u8, u8), Vec<(usize, u64, u8)>> = HashMap::new();
        let mut results = Vec::new();

        let mut abs_tick = 0u64;
        for (idx, ev) in self.events.iter().enumerate() {
            abs_tick += ev.delta as u64;
            match ev.kind {
                EventKind::NoteOn {
                    channel,
                    pitch,
                    velocity,
                } if velocity > 0 => {
                    pending
                        .entry((pitch, channel))
                        .or_default()
                        .push((idx, abs_tick, velocity));
                }
                EventKind::NoteOff { channel, pitch }
                | EventKind::NoteOn {
                    channel,
                    pitch,
                    velocity: 0,
                } => {
                    if let Some(queue) = pending.get_mut(&(pitch, channel)) {
                        if !queue.is_empty() {
                            let (on_idx, on_tick, velocity) = queue.remove(0);
                            results.push(Note {
                                track: self.name.clone(),
                                on_index: on_idx,
                                off_index: idx,
                                start_tick: on_tick,
                                duration_ticks: abs_tick - on_tick,
                                pitch,
                                velocity,
                                channel,
                            });
                        }
                    }
                }
                _ => {}
            }
        }

        results.sort_by_key(|n| (n.start_tick, n.pitch));
        results
    }

    /// Number of sounding note-ons (cheap note-count estimate)
    pub fn note_count(&self) -> usize {
        self.events
            .iter()
            .filter(|ev| matches!(ev.kind, EventKind::NoteOn { velocity, .. } if velocity > 0))
            .count()
    }

    /// Absolute tick of the last event before the end marker
    pub fn last_event_tick(&self) -> u64 {
        let abs = bridge::to_absolute(&self.events);
        abs.iter()
            .rev()
            .find(|(_, kind)| !kind.is_end_of_track())
            .map(|(tick, _)| *tick)
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timeline::bridge::insert_at_tick;

    fn track_with_note(pitch: u8, start: u64, duration: u64) -> Track {
        let mut track = Track::new("Test", 0, 0);
        insert_at_tick(
            &mut track.events,
            EventKind::NoteOn {
                channel: 0,
                pitch,
                velocity: 100,
            },
            start,
        );
        insert_at_tick(
            &mut track.events,
            EventKind::NoteOff { channel: 0, pitch },
            start + duration,
        );
        track
    }

    #[test]
    fn test_new_track_has_end_marker() {
        let track = Track::new("Piano", 0, 0);
        assert_eq!(track.events.len(), 1);
        assert!(track.events[0].kind.is_end_of_track());
    }

    #[test]
    fn test_pair_simple_note() {
        let track = track_with_note(60, 480, 240);
        let notes = track.paired_notes();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].pitch, 60);
        assert_eq!(notes[0].start_tick, 480);
        assert_eq!(notes[0].duration_ticks, 240);
        assert_eq!(notes[0].velocity, 100);
    }

    #[test]
    fn test_pair_velocity_zero_as_off() {
        let mut track = Track::new("Test", 0, 0);
        insert_at_tick(
            &mut track.events,
            EventKind::NoteOn {
                channel: 0,
                pitch: 60,
                velocity: 90,
            },
            0,
        );
        insert_at_tick(
            &mut track.events,
            EventKind::NoteOn {
                channel: 0,
                pitch: 60,
                velocity: 0,
            },
            480,
        );
        let notes = track.paired_notes();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].duration_ticks, 480);
    }

    #[test]
    fn test_pair_overlapping_same_pitch_fifo() {
        let mut track = Track::new("Test", 0, 0);
        // Two overlapping C4s: on@0, on@240, off@480, off@960
        insert_at_tick(
            &mut track.events,
            EventKind::NoteOn {
                channel: 0,
                pitch: 60,
                velocity: 100,
            },
            0,
        );
        insert_at_tick(
            &mut track.events,
            EventKind::NoteOn {
                channel: 0,
                pitch: 60,
                velocity: 80,
            },
            240,
        );
        insert_at_tick(
            &mut track.events,
            EventKind::NoteOff {
                channel: 0,
                pitch: 60,
            },
            480,
        );
        insert_at_tick(
            &mut track.events,
            EventKind::NoteOff {
                channel: 0,
                pitch: 60,
            },
            960,
        );

        let notes = track.paired_notes();
        assert_eq!(notes.len(), 2);
        // Oldest on pairs with oldest off
        assert_eq!(notes[0].start_tick, 0);
        assert_eq!(notes[0].duration_ticks, 480);
        assert_eq!(notes[1].start_tick, 240);
        assert_eq!(notes[1].duration_ticks, 720);
    }

    #[test]
    fn test_pairing_separates_channels() {
        let mut track = Track::new("Test", 0, 0);
        insert_at_tick(
            &mut track.events,
            EventKind::NoteOn {
                channel: 0,
                pitch: 60,
                velocity: 100,
            },
            0,
        );
        insert_at_tick(
            &mut track.events,
            EventKind::NoteOff {
                channel: 1,
                pitch: 60,
            },
            480,
        );
        // Off on a different channel pairs with nothing
        assert!(track.paired_notes().is_empty());
    }

    #[test]
    fn test_last_event_tick_skips_end_marker() {
        let track = track_with_note(60, 0, 480);
        assert_eq!(track.last_event_tick(), 480);
    }
}
