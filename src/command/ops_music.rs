// Music-creation verbs: note, chord, track, cc, bend, mute, solo, program

use crate::command::{Command, Session};
use crate::error::{EditError, EditResult};
use crate::history::{LogEvent, NoteSnapshot, TrackFlag};
use crate::parse::chord::parse_chord;
use crate::parse::duration::parse_duration;
use crate::parse::pitch::parse_pitch;
use crate::parse::velocity::parse_velocity;
use crate::timeline::position::ticks_to_position;

pub fn op_note(cmd: &Command, session: &mut Session) -> EditResult<String> {
    let track_name = cmd.require_target()?;
    session.document.resolve_track(track_name)?;

    let pitch = parse_pitch(cmd.require_arg(0, "pitch")?)?;
    let start_tick = session.resolve_position(cmd.param_str("at").unwrap_or("1.1"))?;
    let duration = parse_duration(
        cmd.param_str("dur").unwrap_or("quarter"),
        session.document.ppqn,
    )?;
    let velocity = parse_velocity(cmd.param_str("vel").unwrap_or("80"))?;
    let channel = cmd.resolve_channel()?;

    let note = session.document.add_note(
        track_name,
        pitch.midi_number,
        start_tick,
        duration,
        velocity,
        channel,
    )?;
    session.log.append(LogEvent::NoteAdded {
        note: NoteSnapshot::from(&note),
    });
    session.last_tick = start_tick;

    let position = ticks_to_position(
        start_tick,
        &session.document.time_signatures,
        session.document.ppqn,
    );
    Ok(format!(
        "Added {} at {} (vel:{}, dur:{}) on {}",
        pitch, position, velocity, duration, track_name
    ))
}

pub fn op_chord(cmd: &Command, session: &mut Session) -> EditResult<String> {
    let track_name = cmd.require_target()?;
    session.document.resolve_track(track_name)?;

    let symbol = cmd.require_arg(0, "chord symbol")?;
    let octave: i8 = match cmd.param_str("octave") {
        Some(raw) => raw
            .parse()
            .map_err(|_| EditError::InvalidArgument(format!("Invalid octave: {}", raw)))?,
        None => 4,
    };
    let pitches = parse_chord(symbol, octave)?;
    let start_tick = session.resolve_position(cmd.param_str("at").unwrap_or("1.1"))?;
    let duration = parse_duration(
        cmd.param_str("dur").unwrap_or("quarter"),
        session.document.ppqn,
    )?;
    let velocity = parse_velocity(cmd.param_str("vel").unwrap_or("80"))?;
    let channel = cmd.resolve_channel()?;

    for pitch in &pitches {
        let note = session.document.add_note(
            track_name,
            pitch.midi_number,
            start_tick,
            duration,
            velocity,
            channel,
        )?;
        session.log.append(LogEvent::NoteAdded {
            note: NoteSnapshot::from(&note),
        });
    }
    session.last_tick = start_tick;

    let position = ticks_to_position(
        start_tick,
        &session.document.time_signatures,
        session.document.ppqn,
    );
    Ok(format!(
        "Added {} ({} notes) at {} on {}",
        symbol,
        pitches.len(),
        position,
        track_name
    ))
}

pub fn op_track(cmd: &Command, session: &mut Session) -> EditResult<String> {
    let action = cmd.require_arg(0, "track action (add|remove)")?;
    let name = cmd.require_arg(1, "track name")?.to_string();

    match action {
        "add" => {
            let channel = cmd.resolve_channel()?;
            let program = match cmd.param_str("program") {
                Some(raw) => {
                    let program: u8 = raw.parse().map_err(|_| {
                        EditError::InvalidArgument(format!("Invalid program number: {}", raw))
                    })?;
                    if program > 127 {
                        return Err(EditError::InvalidArgument(
                            "Program must be 0-127".into(),
                        ));
                    }
                    program
                }
                None => 0,
            };
            let (bank_msb, bank_lsb) = parse_bank(cmd.param_str("bank"))?;

            let track = session
                .document
                .add_track(&name, channel, program, bank_msb, bank_lsb)?
                .clone();
            let display_channel = track.channel + 1;
            session.log.append(LogEvent::TrackAdded {
                index: session.document.tracks.len() - 1,
                track,
            });
            Ok(format!("Added track '{}' (ch:{})", name, display_channel))
        }
        "remove" => {
            let (index, track) = session.document.remove_track(&name)?;
            session.log.append(LogEvent::TrackRemoved { index, track });
            Ok(format!("Removed track '{}'", name))
        }
        other => Err(EditError::InvalidArgument(format!(
            "Unknown track action: '{}' (use add or remove)",
            other
        ))),
    }
}

pub fn op_cc(cmd: &Command, session: &mut Session) -> EditResult<String> {
    let track_name = cmd.require_target()?;
    let track_index = session.document.resolve_track(track_name)?;
    let default_channel = session.document.tracks[track_index].channel;

    let controller: u8 = cmd
        .require_arg(0, "controller number")?
        .parse()
        .map_err(|_| {
            EditError::InvalidArgument(format!("Invalid controller: {}", cmd.args[0]))
        })?;
    let value: u8 = cmd.require_arg(1, "controller value")?.parse().map_err(|_| {
        EditError::InvalidArgument(format!("Invalid controller value: {}", cmd.args[1]))
    })?;
    let tick = session.resolve_position(cmd.param_str("at").unwrap_or("1.1"))?;
    let channel = cmd.resolve_channel()?;

    session
        .document
        .add_control_change(track_name, controller, value, tick, channel)?;
    let stored_channel = channel.unwrap_or(default_channel);
    session.log.append(LogEvent::ControlChangeAdded {
        track: track_name.to_string(),
        controller,
        value,
        tick,
        channel: stored_channel,
    });
    session.last_tick = tick;

    let position = ticks_to_position(
        tick,
        &session.document.time_signatures,
        session.document.ppqn,
    );
    Ok(format!(
        "CC{}={} at {} on {}",
        controller, value, position, track_name
    ))
}

pub fn op_bend(cmd: &Command, session: &mut Session) -> EditResult<String> {
    let track_name = cmd.require_target()?;
    let track_index = session.document.resolve_track(track_name)?;
    let default_channel = session.document.tracks[track_index].channel;

    let value: i16 = cmd.require_arg(0, "bend value")?.parse().map_err(|_| {
        EditError::InvalidArgument(format!("Invalid bend value: {}", cmd.args[0]))
    })?;
    let tick = session.resolve_position(cmd.param_str("at").unwrap_or("1.1"))?;
    let channel = cmd.resolve_channel()?;

    session
        .document
        .add_pitch_bend(track_name, value, tick, channel)?;
    let stored_channel = channel.unwrap_or(default_channel);
    session.log.append(LogEvent::PitchBendAdded {
        track: track_name.to_string(),
        value,
        tick,
        channel: stored_channel,
    });
    session.last_tick = tick;

    let position = ticks_to_position(
        tick,
        &session.document.time_signatures,
        session.document.ppqn,
    );
    Ok(format!("Bend {} at {} on {}", value, position, track_name))
}

pub fn op_mute(cmd: &Command, session: &mut Session) -> EditResult<String> {
    toggle_flag(cmd, session, TrackFlag::Mute)
}

pub fn op_solo(cmd: &Command, session: &mut Session) -> EditResult<String> {
    toggle_flag(cmd, session, TrackFlag::Solo)
}

fn toggle_flag(cmd: &Command, session: &mut Session, flag: TrackFlag) -> EditResult<String> {
    let track_name = cmd.require_target()?;
    let index = session.document.resolve_track(track_name)?;
    let track = &mut session.document.tracks[index];

    let (old, new, label) = match flag {
        TrackFlag::Mute => {
            let old = track.mute;
            track.mute = !old;
            (old, !old, if old { "Unmuted" } else { "Muted" })
        }
        TrackFlag::Solo => {
            let old = track.solo;
            track.solo = !old;
            (old, !old, if old { "Unsoloed" } else { "Soloed" })
        }
    };
    session.log.append(LogEvent::TrackFlagChanged {
        track: track_name.to_string(),
        flag,
        old,
        new,
    });
    Ok(format!("{} '{}'", label, track_name))
}

pub fn op_program(cmd: &Command, session: &mut Session) -> EditResult<String> {
    let track_name = cmd.require_target()?;
    let program_str = cmd
        .param_str("program")
        .or_else(|| cmd.args.first().map(String::as_str))
        .ok_or_else(|| EditError::InvalidArgument("Missing program number".into()))?;
    let program: u8 = program_str.parse().map_err(|_| {
        EditError::InvalidArgument(format!("Invalid program number: {}", program_str))
    })?;
    if program > 127 {
        return Err(EditError::InvalidArgument("Program must be 0-127".into()));
    }
    let (bank_msb, bank_lsb) = parse_bank(cmd.param_str("bank"))?;

    let index = session.document.resolve_track(track_name)?;
    let track = &mut session.document.tracks[index];
    let old_program = track.program;
    let old_bank = (track.bank_msb, track.bank_lsb);
    track.program = program;
    if bank_msb.is_some() || bank_lsb.is_some() {
        track.bank_msb = bank_msb;
        track.bank_lsb = bank_lsb;
    }
    let new_bank = (track.bank_msb, track.bank_lsb);

    session.log.append(LogEvent::ProgramChanged {
        track: track_name.to_string(),
        old_program,
        new_program: program,
        old_bank,
        new_bank,
    });
    Ok(format!("Program {} on '{}'", program, track_name))
}

/// Parse a `bank:MSB[.LSB]` parameter
fn parse_bank(raw: Option<&str>) -> EditResult<(Option<u8>, Option<u8>)> {
    let Some(raw) = raw else {
        return Ok((None, None));
    };
    let (msb_str, lsb_str) = match raw.split_once('.') {
        Some((msb, lsb)) => (msb, Some(lsb)),
        None => (raw, None),
    };
    let msb: u8 = msb_str
        .parse()
        .map_err(|_| EditError::InvalidArgument(format!("Invalid bank value: {}", raw)))?;
    if msb > 127 {
        return Err(EditError::InvalidArgument("Bank MSB must be 0-127".into()));
    }
    let lsb = match lsb_str {
        Some(raw_lsb) => {
            let lsb: u8 = raw_lsb.parse().map_err(|_| {
                EditError::InvalidArgument(format!("Invalid bank value: {}", raw))
            })?;
            if lsb > 127 {
                return Err(EditError::InvalidArgument("Bank LSB must be 0-127".into()));
            }
            Some(lsb)
        }
        None => None,
    };
    Ok((Some(msb), lsb))
}
