// Stored track events and the derived Note view

/// One channel event in a track's delta-encoded sequence
///
/// Pitch bend values are centred on zero (-8192..=8191), matching the
/// wire format's 14-bit range shifted by 8192.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    NoteOn { channel: u8, pitch: u8, velocity: u8 },
    NoteOff { channel: u8, pitch: u8 },
    ControlChange { channel: u8, controller: u8, value: u8 },
    PitchBend { channel: u8, value: i16 },
    /// Terminal end marker; always the last event of a track
    EndOfTrack,
}

impl EventKind {
    /// Pitch for note events, used as a deterministic sort tie-breaker
    pub fn pitch(&self) -> Option<u8> {
        match self {
            EventKind::NoteOn { pitch, .. } | EventKind::NoteOff { pitch, .. } => Some(*pitch),
            _ => None,
        }
    }

    pub fn is_end_of_track(&self) -> bool {
        matches!(self, EventKind::EndOfTrack)
    }
}

/// A stored event: time offset from the previous event plus its payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackEvent {
    /// Ticks since the previous event in the same track
    pub delta: u32,
    pub kind: EventKind,
}

impl TrackEvent {
    pub fn new(delta: u32, kind: EventKind) -> Self {
        Self { delta, kind }
    }
}

/// A note derived by pairing a note-on with its note-off
///
/// Notes are never stored; they are re-derived from the raw event
/// sequence after every mutation. The `on_index`/`off_index` fields
/// point back into the owning track's event list so a note can be
/// removed precisely even when identical notes overlap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Note {
    /// Name of the owning track
    pub track: String,
    /// Index of the note-on in the track's event list
    pub on_index: usize,
    /// Index of the note-off in the track's event list
    pub off_index: usize,
    /// Absolute tick of the note-on
    pub start_tick: u64,
    /// Note-off tick minus note-on tick
    pub duration_ticks: u64,
    /// MIDI note number (0-127, 60 = middle C)
    pub pitch: u8,
    /// Velocity of the note-on (1-127)
    pub velocity: u8,
    /// MIDI channel (0-15)
    pub channel: u8,
}

impl Note {
    /// Absolute tick at which the note ends
    pub fn end_tick(&self) -> u64 {
        self.start_tick + self.duration_ticks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_pitch_accessor() {
        let on = EventKind::NoteOn {
            channel: 0,
            pitch: 60,
            velocity: 100,
        };
        let off = EventKind::NoteOff {
            channel: 0,
            pitch: 62,
        };
        let cc = EventKind::ControlChange {
            channel: 0,
            controller: 7,
            value: 100,
        };
        assert_eq!(on.pitch(), Some(60));
        assert_eq!(off.pitch(), Some(62));
        assert_eq!(cc.pitch(), None);
    }

    #[test]
    fn test_note_end_tick() {
        let note = Note {
            track: "Piano".into(),
            on_index: 0,
            off_index: 1,
            start_tick: 480,
            duration_ticks: 240,
            pitch: 60,
            velocity: 80,
            channel: 0,
        };
        assert_eq!(note.end_tick(), 720);
    }
}
