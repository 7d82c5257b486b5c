// Read-only queries: tracks, events, stats, history, tracker

use crate::command::{Command, Session};
use crate::error::{EditError, EditResult};
use crate::io::tracker::{self, Resolution};
use crate::parse::pitch::pitch_name;
use crate::timeline::position::{ticks_to_position, ticks_to_seconds};

/// Dispatch a query verb
pub fn run(cmd: &Command, session: &Session) -> EditResult<String> {
    match cmd.verb.as_str() {
        "tracks" => Ok(format_track_list(session)),
        "events" => format_events(cmd, session),
        "stats" => Ok(format_stats(session)),
        "history" => format_history(cmd, session),
        "tracker" => format_tracker(cmd, session),
        other => Err(EditError::InvalidArgument(format!(
            "Unknown query: '{}' (try: tracks, events, stats, history, tracker)",
            other
        ))),
    }
}

fn format_track_list(session: &Session) -> String {
    let doc = &session.document;
    if doc.tracks.is_empty() {
        return "No tracks.".to_string();
    }
    let mut lines = vec![format!("Tracks ({}):", doc.tracks.len())];
    for (i, track) in doc.tracks.iter().enumerate() {
        let mut flags = String::new();
        if track.mute {
            flags.push_str(" [MUTED]");
        }
        if track.solo {
            flags.push_str(" [SOLO]");
        }
        lines.push(format!(
            "  {}. {} (ch:{}) program:{} | {} notes{}",
            i + 1,
            track.name,
            track.channel + 1,
            track.program,
            track.note_count(),
            flags
        ));
    }
    lines.join("\n")
}

fn format_events(cmd: &Command, session: &Session) -> EditResult<String> {
    let track_name = cmd.require_target()?;
    session.document.resolve_track(track_name)?;
    let doc = &session.document;

    let start_tick = match cmd.param_str("from") {
        Some(p) => Some(session.resolve_position(p)?),
        None => None,
    };
    let end_tick = match cmd.param_str("to") {
        Some(p) => Some(session.resolve_position(p)?),
        None => None,
    };

    let mut lines = Vec::new();
    for note in session.index.by_track(track_name) {
        if start_tick.map(|s| note.start_tick < s).unwrap_or(false)
            || end_tick.map(|e| note.start_tick >= e).unwrap_or(false)
        {
            continue;
        }
        let position = ticks_to_position(note.start_tick, &doc.time_signatures, doc.ppqn);
        lines.push(format!(
            "  {}  {:6} vel:{:3} dur:{}",
            position,
            pitch_name(note.pitch),
            note.velocity,
            note.duration_ticks
        ));
    }

    if lines.is_empty() {
        return Ok(format!("No events on {} in range.", track_name));
    }
    lines.insert(0, format!("Events on {}:", track_name));
    Ok(lines.join("\n"))
}

fn format_stats(session: &Session) -> String {
    let doc = &session.document;
    let n_notes = session.index.note_count();
    let tempo = doc.tempo_map.first().map(|t| t.bpm).unwrap_or(120.0);
    let (num, den) = doc
        .time_signatures
        .first()
        .map(|ts| (ts.numerator, ts.denominator))
        .unwrap_or((4, 4));
    let key = doc
        .key_signatures
        .first()
        .map(|ks| format!("{} {}", ks.key, ks.mode))
        .unwrap_or_else(|| "none".to_string());

    let end_tick = doc.song_end_tick();
    let duration = ticks_to_seconds(end_tick, &doc.tempo_map, doc.ppqn);
    let minutes = duration as u64 / 60;
    let seconds = duration - (minutes * 60) as f64;

    [
        format!("Song: {}", doc.title),
        format!("  Tempo: {:.0} BPM", tempo),
        format!("  Time sig: {}/{}", num, den),
        format!("  Key: {}", key),
        format!("  PPQN: {}", doc.ppqn),
        format!("  Tracks: {}", doc.tracks.len()),
        format!("  Notes: {}", n_notes),
        format!("  Duration: {}:{:05.2}", minutes, seconds),
    ]
    .join("\n")
}

fn format_history(cmd: &Command, session: &Session) -> EditResult<String> {
    let count: usize = match cmd.args.first() {
        Some(raw) => raw
            .parse()
            .map_err(|_| EditError::InvalidArgument(format!("Invalid count: {}", raw)))?,
        None => 10,
    };
    let events = session.log.recent(count);
    if events.is_empty() {
        return Ok("No history.".to_string());
    }
    let mut lines = vec![format!("History (last {}):", events.len())];
    for event in &events {
        lines.push(format!("  {}", event.describe()));
    }
    Ok(lines.join("\n"))
}

fn format_tracker(cmd: &Command, session: &Session) -> EditResult<String> {
    let track_name = cmd.require_target()?;
    session.document.resolve_track(track_name)?;
    let doc = &session.document;

    let start_tick = match cmd.param_str("from") {
        Some(p) => session.resolve_position(p)?,
        None => 0,
    };
    let end_tick = match cmd.param_str("to") {
        Some(p) => session.resolve_position(p)?,
        None => doc.song_end_tick(),
    };
    let resolution = cmd
        .param_str("resolution")
        .map(Resolution::parse)
        .transpose()?;

    Ok(tracker::render(
        session.index.by_track(track_name),
        track_name,
        &doc.time_signatures,
        doc.ppqn,
        start_tick,
        end_tick,
        resolution,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> Session {
        let mut session = Session::new("Demo", 480, 120.0, (4, 4), None);
        session.apply(&Command::new("track").arg("add").arg("Piano"));
        session.apply(
            &Command::new("note")
                .target("Piano")
                .arg("C4")
                .param("at", "1.1")
                .param("vel", "100"),
        );
        session.apply(
            &Command::new("note")
                .target("Piano")
                .arg("E4")
                .param("at", "1.3"),
        );
        session
    }

    #[test]
    fn test_tracks_query() {
        let s = session();
        let response = s.query(&Command::new("tracks"));
        assert!(response.ok);
        assert!(response.message.contains("1. Piano (ch:1)"));
        assert!(response.message.contains("2 notes"));
    }

    #[test]
    fn test_events_query_with_range() {
        let s = session();
        let response = s.query(
            &Command::new("events")
                .target("Piano")
                .param("from", "1.1")
                .param("to", "1.2"),
        );
        assert!(response.ok);
        assert!(response.message.contains("C4"));
        assert!(!response.message.contains("E4"));
    }

    #[test]
    fn test_stats_query() {
        let s = session();
        let response = s.query(&Command::new("stats"));
        assert!(response.ok);
        assert!(response.message.contains("Song: Demo"));
        assert!(response.message.contains("Notes: 2"));
    }

    #[test]
    fn test_history_query() {
        let s = session();
        let response = s.query(&Command::new("history"));
        assert!(response.ok);
        assert!(response.message.contains("add note 60"));
    }

    #[test]
    fn test_tracker_query() {
        let s = session();
        let response = s.query(&Command::new("tracker").target("Piano"));
        assert!(response.ok, "{}", response);
        assert!(response.message.contains("Step 01:"));
    }

    #[test]
    fn test_unknown_query() {
        let s = session();
        let response = s.query(&Command::new("mystery"));
        assert!(!response.ok);
    }
}
