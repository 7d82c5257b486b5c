// Conductor verbs: tempo, time-sig, key-sig, marker, title

use crate::command::{Command, Session};
use crate::error::{EditError, EditResult};
use crate::history::LogEvent;
use crate::timeline::meta::KeyMode;
use crate::timeline::position::ticks_to_position;

pub fn op_tempo(cmd: &Command, session: &mut Session) -> EditResult<String> {
    let bpm_str = cmd.require_arg(0, "tempo (BPM)")?;
    let bpm: f64 = bpm_str
        .parse()
        .map_err(|_| EditError::InvalidArgument(format!("Invalid tempo: {}", bpm_str)))?;
    if !(20.0..=999.0).contains(&bpm) {
        return Err(EditError::InvalidArgument(
            "Tempo must be between 20 and 999 BPM".into(),
        ));
    }
    let tick = session.resolve_position(cmd.param_str("at").unwrap_or("1.1"))?;

    let previous = session.document.set_tempo(bpm, tick);
    session.log.append(LogEvent::TempoChanged {
        tick,
        previous,
        bpm,
    });

    let position = ticks_to_position(
        tick,
        &session.document.time_signatures,
        session.document.ppqn,
    );
    Ok(format!("Tempo {:.0} BPM at {}", bpm, position))
}

pub fn op_time_sig(cmd: &Command, session: &mut Session) -> EditResult<String> {
    let raw = cmd.require_arg(0, "time signature (N/D)")?;
    let (numerator, denominator) = raw
        .split_once('/')
        .and_then(|(n, d)| Some((n.parse::<u8>().ok()?, d.parse::<u8>().ok()?)))
        .ok_or_else(|| EditError::InvalidArgument(format!("Invalid time-sig: {}", raw)))?;
    if numerator == 0 || numerator > 32 {
        return Err(EditError::InvalidArgument(
            "Time signature numerator must be 1-32".into(),
        ));
    }
    if !denominator.is_power_of_two() || denominator > 32 {
        return Err(EditError::InvalidArgument(
            "Time signature denominator must be a power of 2 up to 32".into(),
        ));
    }
    let tick = session.resolve_position(cmd.param_str("at").unwrap_or("1.1"))?;

    let previous = session.document.set_time_signature(numerator, denominator, tick);
    session.log.append(LogEvent::TimeSignatureChanged {
        tick,
        previous,
        numerator,
        denominator,
    });
    Ok(format!("Time signature {}/{}", numerator, denominator))
}

pub fn op_key_sig(cmd: &Command, session: &mut Session) -> EditResult<String> {
    let raw = cmd.require_arg(0, "key signature (KEY[-MODE])")?;
    let (key, mode) = match raw.split_once('-') {
        Some((key, "major")) => (key, KeyMode::Major),
        Some((key, "minor")) => (key, KeyMode::Minor),
        Some((_, other)) => {
            return Err(EditError::InvalidArgument(format!(
                "Unknown mode: '{}' (use major or minor)",
                other
            )));
        }
        None => (raw, KeyMode::Major),
    };
    validate_key_name(key)?;
    let tick = session.resolve_position(cmd.param_str("at").unwrap_or("1.1"))?;

    let previous = session.document.set_key_signature(key, mode, tick);
    session.log.append(LogEvent::KeySignatureChanged {
        tick,
        previous,
        key: key.to_string(),
        mode,
    });
    Ok(format!("Key signature {} {}", key, mode))
}

pub fn op_marker(cmd: &Command, session: &mut Session) -> EditResult<String> {
    if cmd.args.is_empty() {
        return Err(EditError::InvalidArgument("Missing marker text".into()));
    }
    let text = cmd.args.join(" ");
    let tick = session.resolve_position(cmd.param_str("at").unwrap_or("1.1"))?;

    session.document.add_marker(&text, tick);
    session.log.append(LogEvent::MarkerAdded {
        tick,
        text: text.clone(),
    });

    let position = ticks_to_position(
        tick,
        &session.document.time_signatures,
        session.document.ppqn,
    );
    Ok(format!("Marker '{}' at {}", text, position))
}

pub fn op_title(cmd: &Command, session: &mut Session) -> EditResult<String> {
    if cmd.args.is_empty() {
        return Err(EditError::InvalidArgument("Missing title text".into()));
    }
    let new = cmd.args.join(" ");
    let old = session.document.set_title(&new);
    session.log.append(LogEvent::TitleChanged {
        old,
        new: new.clone(),
    });
    Ok(format!("Title '{}'", new))
}

fn validate_key_name(key: &str) -> EditResult<()> {
    let mut chars = key.chars();
    let valid = matches!(chars.next(), Some('A'..='G'))
        && matches!(chars.as_str(), "" | "#" | "b");
    if valid {
        Ok(())
    } else {
        Err(EditError::InvalidArgument(format!(
            "Invalid key name: {}",
            key
        )))
    }
}
