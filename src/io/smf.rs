// Standard MIDI File codec built on midly
//
// File track 0 is the conductor (title, tempo, time signature, key
// signature, markers); tracks 1.. are instrument tracks. A document
// track's delta sequence maps one-to-one onto an SMF track body.

use log::debug;
use midly::num::{u14, u15, u24, u28, u4, u7};
use midly::{Format, Header, MetaMessage, MidiMessage, Smf, Timing, TrackEventKind};

use crate::error::{EditError, EditResult};
use crate::timeline::event::{EventKind, TrackEvent};
use crate::timeline::meta::{KeyMode, Marker, TempoChange};
use crate::timeline::track::Track;
use crate::timeline::TimelineDocument;

/// Serialise the document to SMF format 1 bytes
pub fn save(doc: &TimelineDocument) -> EditResult<Vec<u8>> {
    let mut tracks: Vec<Vec<midly::TrackEvent<'_>>> = Vec::with_capacity(doc.tracks.len() + 1);
    tracks.push(build_conductor_track(doc));
    for track in &doc.tracks {
        tracks.push(build_instrument_track(track));
    }

    let smf = Smf {
        header: Header {
            format: Format::Parallel,
            timing: Timing::Metrical(u15::new(doc.ppqn)),
        },
        tracks,
    };

    let mut out = Vec::new();
    smf.write(&mut out)
        .map_err(|e| EditError::MalformedFile(e.to_string()))?;
    debug!(
        "saved '{}': {} tracks, {} bytes",
        doc.title,
        doc.tracks.len(),
        out.len()
    );
    Ok(out)
}

/// Parse SMF bytes into a document
pub fn load(bytes: &[u8]) -> EditResult<TimelineDocument> {
    let smf = Smf::parse(bytes).map_err(|e| EditError::MalformedFile(e.to_string()))?;

    let ppqn = match smf.header.timing {
        Timing::Metrical(t) => t.as_int(),
        Timing::Timecode(..) => {
            return Err(EditError::MalformedFile(
                "SMPTE timing is not supported".into(),
            ));
        }
    };

    let mut doc = TimelineDocument::new("Untitled", ppqn);

    for (track_index, smf_track) in smf.tracks.iter().enumerate() {
        read_track(&mut doc, track_index, smf_track);
    }

    debug!(
        "loaded '{}': {} tracks, ppqn {}",
        doc.title,
        doc.tracks.len(),
        doc.ppqn
    );
    Ok(doc)
}

fn build_conductor_track(doc: &TimelineDocument) -> Vec<midly::TrackEvent<'_>> {
    let mut timed: Vec<(u64, MetaMessage<'_>)> = Vec::new();

    for TempoChange { tick, bpm } in &doc.tempo_map {
        let us_per_quarter = (60_000_000.0 / bpm).round() as u32;
        timed.push((*tick, MetaMessage::Tempo(u24::new(us_per_quarter))));
    }
    for ts in &doc.time_signatures {
        timed.push((
            ts.tick,
            MetaMessage::TimeSignature(ts.numerator, ts.denominator.ilog2() as u8, 24, 8),
        ));
    }
    for ks in &doc.key_signatures {
        if let Some(sharps) = key_to_sharps(&ks.key, ks.mode) {
            timed.push((
                ks.tick,
                MetaMessage::KeySignature(sharps, ks.mode == KeyMode::Minor),
            ));
        }
    }
    for Marker { tick, text } in &doc.markers {
        timed.push((*tick, MetaMessage::Marker(text.as_bytes())));
    }

    timed.sort_by_key(|(tick, _)| *tick);

    let mut events = vec![midly::TrackEvent {
        delta: u28::new(0),
        kind: TrackEventKind::Meta(MetaMessage::TrackName(doc.title.as_bytes())),
    }];
    let mut prev = 0u64;
    for (tick, meta) in timed {
        events.push(midly::TrackEvent {
            delta: u28::new((tick - prev) as u32),
            kind: TrackEventKind::Meta(meta),
        });
        prev = tick;
    }
    events.push(midly::TrackEvent {
        delta: u28::new(0),
        kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
    });
    events
}

fn build_instrument_track(track: &Track) -> Vec<midly::TrackEvent<'_>> {
    let channel = u4::new(track.channel);
    let mut events = vec![midly::TrackEvent {
        delta: u28::new(0),
        kind: TrackEventKind::Meta(MetaMessage::TrackName(track.name.as_bytes())),
    }];

    // Bank select before program change
    if let Some(msb) = track.bank_msb {
        events.push(midly::TrackEvent {
            delta: u28::new(0),
            kind: TrackEventKind::Midi {
                channel,
                message: MidiMessage::Controller {
                    controller: u7::new(0),
                    value: u7::new(msb),
                },
            },
        });
    }
    if let Some(lsb) = track.bank_lsb {
        events.push(midly::TrackEvent {
            delta: u28::new(0),
            kind: TrackEventKind::Midi {
                channel,
                message: MidiMessage::Controller {
                    controller: u7::new(32),
                    value: u7::new(lsb),
                },
            },
        });
    }
    events.push(midly::TrackEvent {
        delta: u28::new(0),
        kind: TrackEventKind::Midi {
            channel,
            message: MidiMessage::ProgramChange {
                program: u7::new(track.program),
            },
        },
    });

    for ev in &track.events {
        let delta = u28::new(ev.delta);
        let kind = match ev.kind {
            EventKind::NoteOn {
                channel,
                pitch,
                velocity,
            } => TrackEventKind::Midi {
                channel: u4::new(channel),
                message: MidiMessage::NoteOn {
                    key: u7::new(pitch),
                    vel: u7::new(velocity),
                },
            },
            EventKind::NoteOff { channel, pitch } => TrackEventKind::Midi {
                channel: u4::new(channel),
                message: MidiMessage::NoteOff {
                    key: u7::new(pitch),
                    vel: u7::new(0),
                },
            },
            EventKind::ControlChange {
                channel,
                controller,
                value,
            } => TrackEventKind::Midi {
                channel: u4::new(channel),
                message: MidiMessage::Controller {
                    controller: u7::new(controller),
                    value: u7::new(value),
                },
            },
            EventKind::PitchBend { channel, value } => TrackEventKind::Midi {
                channel: u4::new(channel),
                message: MidiMessage::PitchBend {
                    bend: midly::PitchBend(u14::new((value as i32 + 8192) as u16)),
                },
            },
            EventKind::EndOfTrack => TrackEventKind::Meta(MetaMessage::EndOfTrack),
        };
        events.push(midly::TrackEvent { delta, kind });
    }
    events
}

/// Absorb one SMF track into the document
///
/// Conductor metas land in the document maps wherever they appear (so
/// format 0 files read correctly); channel events become an instrument
/// track.
fn read_track(doc: &mut TimelineDocument, track_index: usize, smf_track: &[midly::TrackEvent]) {
    let mut abs_tick = 0u64;
    let mut channel_events: Vec<(u64, EventKind)> = Vec::new();
    let mut name: Option<String> = None;
    let mut channel: Option<u8> = None;
    let mut program = 0u8;
    let mut bank_msb: Option<u8> = None;
    let mut bank_lsb: Option<u8> = None;

    for ev in smf_track {
        abs_tick += ev.delta.as_int() as u64;
        match ev.kind {
            TrackEventKind::Meta(meta) => match meta {
                MetaMessage::TrackName(raw) => {
                    let text = String::from_utf8_lossy(raw).to_string();
                    if track_index == 0 && doc.tracks.is_empty() && name.is_none() {
                        doc.title = text.clone();
                    }
                    name = Some(text);
                }
                MetaMessage::Tempo(us_per_quarter) => {
                    let bpm = 60_000_000.0 / us_per_quarter.as_int() as f64;
                    doc.set_tempo(bpm, abs_tick);
                }
                MetaMessage::TimeSignature(numerator, denominator_pow2, _, _) => {
                    doc.set_time_signature(numerator, 1u8 << denominator_pow2, abs_tick);
                }
                MetaMessage::KeySignature(sharps, minor) => {
                    let (key, mode) = sharps_to_key(sharps, minor);
                    doc.set_key_signature(&key, mode, abs_tick);
                }
                MetaMessage::Marker(raw) => {
                    doc.add_marker(&String::from_utf8_lossy(raw), abs_tick);
                }
                _ => {}
            },
            TrackEventKind::Midi {
                channel: ch,
                message,
            } => {
                let ch = ch.as_int();
                if channel.is_none() {
                    channel = Some(ch);
                }
                match message {
                    MidiMessage::NoteOn { key, vel } => channel_events.push((
                        abs_tick,
                        EventKind::NoteOn {
                            channel: ch,
                            pitch: key.as_int(),
                            velocity: vel.as_int(),
                        },
                    )),
                    MidiMessage::NoteOff { key, .. } => channel_events.push((
                        abs_tick,
                        EventKind::NoteOff {
                            channel: ch,
                            pitch: key.as_int(),
                        },
                    )),
                    MidiMessage::Controller { controller, value } => match controller.as_int() {
                        0 => bank_msb = Some(value.as_int()),
                        32 => bank_lsb = Some(value.as_int()),
                        cc => channel_events.push((
                            abs_tick,
                            EventKind::ControlChange {
                                channel: ch,
                                controller: cc,
                                value: value.as_int(),
                            },
                        )),
                    },
                    MidiMessage::ProgramChange { program: p } => {
                        program = p.as_int();
                    }
                    MidiMessage::PitchBend { bend } => channel_events.push((
                        abs_tick,
                        EventKind::PitchBend {
                            channel: ch,
                            value: bend.0.as_int() as i16 - 8192,
                        },
                    )),
                    _ => {}
                }
            }
            _ => {}
        }
    }

    // Pure conductor tracks carry no channel data and no instrument
    if channel_events.is_empty() && track_index == 0 {
        return;
    }
    if channel_events.is_empty() && name.is_none() && program == 0 {
        return;
    }

    let mut track = Track::new(
        unique_track_name(doc, name, track_index),
        channel.unwrap_or(0),
        program,
    );
    track.bank_msb = bank_msb;
    track.bank_lsb = bank_lsb;
    track.events = delta_encode_in_order(channel_events, abs_tick);
    doc.tracks.push(track);
}

/// Delta-encode events already in tick order, preserving same-tick
/// ordering, and close the track with an end marker at `end_tick`
fn delta_encode_in_order(pairs: Vec<(u64, EventKind)>, end_tick: u64) -> Vec<TrackEvent> {
    let mut events = Vec::with_capacity(pairs.len() + 1);
    let mut prev = 0u64;
    for (tick, kind) in pairs {
        events.push(TrackEvent::new((tick - prev) as u32, kind));
        prev = tick;
    }
    events.push(TrackEvent::new(
        end_tick.saturating_sub(prev) as u32,
        EventKind::EndOfTrack,
    ));
    events
}

fn unique_track_name(doc: &TimelineDocument, name: Option<String>, track_index: usize) -> String {
    let base = name.unwrap_or_else(|| format!("Track {}", track_index));
    if doc.track(&base).is_none() {
        return base;
    }
    let mut counter = 2;
    loop {
        let candidate = format!("{} {}", base, counter);
        if doc.track(&candidate).is_none() {
            return candidate;
        }
        counter += 1;
    }
}

// Circle-of-fifths order shared by both key tables
const MAJOR_KEYS: [&str; 15] = [
    "Cb", "Gb", "Db", "Ab", "Eb", "Bb", "F", "C", "G", "D", "A", "E", "B", "F#", "C#",
];
const MINOR_KEYS: [&str; 15] = [
    "Ab", "Eb", "Bb", "F", "C", "G", "D", "A", "E", "B", "F#", "C#", "G#", "D#", "A#",
];

fn key_to_sharps(key: &str, mode: KeyMode) -> Option<i8> {
    let table = match mode {
        KeyMode::Major => &MAJOR_KEYS,
        KeyMode::Minor => &MINOR_KEYS,
    };
    table
        .iter()
        .position(|k| *k == key)
        .map(|i| i as i8 - 7)
}

fn sharps_to_key(sharps: i8, minor: bool) -> (String, KeyMode) {
    let (table, mode) = if minor {
        (&MINOR_KEYS, KeyMode::Minor)
    } else {
        (&MAJOR_KEYS, KeyMode::Major)
    };
    let index = (sharps.clamp(-7, 7) + 7) as usize;
    (table[index].to_string(), mode)
}
