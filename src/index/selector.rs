// Selector algebra - predicates over the derived note set

use serde::{Deserialize, Serialize};

use crate::error::{EditError, EditResult};
use crate::history::{LogEvent, UndoLog};
use crate::index::registry::EventIndex;
use crate::parse::pitch::parse_pitch;
use crate::timeline::event::Note;
use crate::timeline::meta::effective_time_signatures;
use crate::timeline::position::{position_to_ticks, ticks_per_beat};
use crate::timeline::TimelineDocument;

/// One predicate, optionally negated
///
/// Values are kept as raw text and validated at resolution time so a
/// malformed selector reports the offending input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selector {
    pub kind: SelectorKind,
    #[serde(default)]
    pub negated: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectorKind {
    Track(String),
    Channel(String),
    /// `"START-END"` position pair; END is exclusive after being bumped
    /// by one beat-width
    Range(String),
    Pitch(String),
    /// `"LOW-HIGH"` velocity bounds, inclusive
    Velocity(String),
    All,
    /// The N most recently created notes (default 1)
    Recent(Option<usize>),
}

impl Selector {
    pub fn new(kind: SelectorKind) -> Self {
        Self {
            kind,
            negated: false,
        }
    }

    pub fn negated(kind: SelectorKind) -> Self {
        Self {
            kind,
            negated: true,
        }
    }

    /// Build a selector from boundary `kind`/`value` strings
    pub fn from_parts(kind: &str, value: &str, negated: bool) -> EditResult<Self> {
        let kind = match kind {
            "track" => SelectorKind::Track(value.to_string()),
            "channel" => SelectorKind::Channel(value.to_string()),
            "range" => SelectorKind::Range(value.to_string()),
            "pitch" => SelectorKind::Pitch(value.to_string()),
            "velocity" => SelectorKind::Velocity(value.to_string()),
            "all" => SelectorKind::All,
            "recent" => {
                let count = if value.is_empty() {
                    None
                } else {
                    Some(value.parse::<usize>().map_err(|_| {
                        EditError::InvalidSelector(format!("recent:{}", value))
                    })?)
                };
                SelectorKind::Recent(count)
            }
            other => {
                return Err(EditError::InvalidSelector(format!("{}:{}", other, value)));
            }
        };
        Ok(Self { kind, negated })
    }
}

/// Parsed numeric filters accumulated from the positive selectors
#[derive(Debug, Default)]
struct Filters {
    track: Option<String>,
    pitch: Option<u8>,
    channel: Option<u8>,
    range: Option<(u64, u64)>,
    velocity: Option<(u8, u8)>,
    all: bool,
    recent: Option<usize>,
}

/// Resolves selector lists into concrete note sets
///
/// Non-negated selectors are intersected, starting from the most
/// specific index view available; negated selectors are resolved
/// independently against the whole document and subtracted.
pub struct SelectorResolver<'a> {
    pub document: &'a TimelineDocument,
    pub index: &'a EventIndex,
    pub log: &'a UndoLog,
}

impl<'a> SelectorResolver<'a> {
    pub fn new(
        document: &'a TimelineDocument,
        index: &'a EventIndex,
        log: &'a UndoLog,
    ) -> Self {
        Self {
            document,
            index,
            log,
        }
    }

    pub fn resolve(&self, selectors: &[Selector]) -> EditResult<Vec<Note>> {
        if selectors.is_empty() {
            return Err(EditError::NoSelectors);
        }

        let positive: Vec<&Selector> = selectors.iter().filter(|s| !s.negated).collect();
        let negated: Vec<&Selector> = selectors.iter().filter(|s| s.negated).collect();

        let filters = self.parse_filters(&positive)?;

        // A bare recent short-circuits everything else
        if let Some(count) = filters.recent {
            return Ok(self.recently_created(count));
        }

        let mut notes = self.starting_set(&filters)?;
        self.apply_filters(&mut notes, &filters);

        if !negated.is_empty() && !notes.is_empty() {
            for sel in negated {
                let excluded = self.resolve_single(sel)?;
                notes.retain(|n| !excluded.contains(n));
            }
        }

        Ok(notes)
    }

    fn parse_filters(&self, positive: &[&Selector]) -> EditResult<Filters> {
        let mut filters = Filters::default();
        for sel in positive {
            match &sel.kind {
                SelectorKind::Track(name) => filters.track = Some(name.clone()),
                SelectorKind::Channel(value) => filters.channel = Some(parse_channel(value)?),
                SelectorKind::Range(value) => filters.range = Some(self.parse_range(value)?),
                SelectorKind::Pitch(value) => filters.pitch = Some(parse_pitch_value(value)?),
                SelectorKind::Velocity(value) => {
                    filters.velocity = Some(parse_velocity_range(value)?)
                }
                SelectorKind::All => filters.all = true,
                SelectorKind::Recent(count) => filters.recent = Some(count.unwrap_or(1)),
            }
        }
        Ok(filters)
    }

    /// Most specific index view that covers one of the positive filters
    fn starting_set(&self, filters: &Filters) -> EditResult<Vec<Note>> {
        if filters.all {
            return Ok(self.index.all().to_vec());
        }
        if let Some(name) = &filters.track {
            self.document.resolve_track(name)?;
            return Ok(self.index.by_track(name).to_vec());
        }
        if let Some(pitch) = filters.pitch {
            return Ok(self.index.by_pitch(pitch).to_vec());
        }
        if let Some(channel) = filters.channel {
            return Ok(self.index.by_channel(channel).to_vec());
        }
        Ok(self.index.all().to_vec())
    }

    fn apply_filters(&self, notes: &mut Vec<Note>, filters: &Filters) {
        if let Some(name) = &filters.track {
            notes.retain(|n| &n.track == name);
        }
        if let Some(pitch) = filters.pitch {
            notes.retain(|n| n.pitch == pitch);
        }
        if let Some(channel) = filters.channel {
            notes.retain(|n| n.channel == channel);
        }
        if let Some((start, end)) = filters.range {
            notes.retain(|n| n.start_tick >= start && n.start_tick < end);
        }
        if let Some((lo, hi)) = filters.velocity {
            notes.retain(|n| (lo..=hi).contains(&n.velocity));
        }
    }

    /// Resolve one selector on its own, for negation subtraction
    fn resolve_single(&self, sel: &Selector) -> EditResult<Vec<Note>> {
        match &sel.kind {
            SelectorKind::Track(name) => Ok(self.index.by_track(name).to_vec()),
            SelectorKind::Pitch(value) => {
                Ok(self.index.by_pitch(parse_pitch_value(value)?).to_vec())
            }
            SelectorKind::Channel(value) => {
                Ok(self.index.by_channel(parse_channel(value)?).to_vec())
            }
            SelectorKind::Range(value) => {
                let (start, end) = self.parse_range(value)?;
                Ok(self
                    .index
                    .all()
                    .iter()
                    .filter(|n| n.start_tick >= start && n.start_tick < end)
                    .cloned()
                    .collect())
            }
            SelectorKind::Velocity(value) => {
                let (lo, hi) = parse_velocity_range(value)?;
                Ok(self.index.by_velocity_range(lo, hi))
            }
            SelectorKind::All => Ok(self.index.all().to_vec()),
            SelectorKind::Recent(count) => Ok(self.recently_created(count.unwrap_or(1))),
        }
    }

    /// `"START-END"` into a half-open tick range, END bumped by one
    /// beat-width so the named end beat is included
    fn parse_range(&self, value: &str) -> EditResult<(u64, u64)> {
        let (start_text, end_text) = value
            .split_once('-')
            .ok_or_else(|| EditError::InvalidSelector(format!("range:{}", value)))?;
        let sigs = &self.document.time_signatures;
        let ppqn = self.document.ppqn;
        let start = position_to_ticks(start_text, sigs, ppqn, None, None)
            .map_err(|_| EditError::InvalidSelector(format!("range:{}", value)))?;
        let mut end = position_to_ticks(end_text, sigs, ppqn, None, None)
            .map_err(|_| EditError::InvalidSelector(format!("range:{}", value)))?;
        let denominator = effective_time_signatures(sigs)[0].denominator;
        end += ticks_per_beat(ppqn, denominator);
        Ok((start, end))
    }

    /// The N most recently created notes still present in the document
    ///
    /// Walks the applied log tail backwards matching note-creation
    /// entries against the current index; returned oldest-first.
    fn recently_created(&self, count: usize) -> Vec<Note> {
        let mut collected: Vec<Note> = Vec::new();
        for event in self.log.applied().iter().rev() {
            if collected.len() >= count {
                break;
            }
            let snapshot = match event {
                LogEvent::NoteAdded { note } => note,
                LogEvent::NoteModified { after, .. } => after,
                _ => continue,
            };
            let found = self.index.all().iter().find(|n| {
                n.track == snapshot.track
                    && n.pitch == snapshot.pitch
                    && n.start_tick == snapshot.start_tick
                    && n.channel == snapshot.channel
                    && n.velocity == snapshot.velocity
                    && !collected.contains(n)
            });
            if let Some(note) = found {
                collected.push(note.clone());
            }
        }
        collected.reverse();
        collected
    }
}

fn parse_channel(value: &str) -> EditResult<u8> {
    let channel: u8 = value
        .parse()
        .map_err(|_| EditError::InvalidSelector(format!("channel:{}", value)))?;
    if channel > 15 {
        return Err(EditError::InvalidSelector(format!("channel:{}", value)));
    }
    Ok(channel)
}

fn parse_pitch_value(value: &str) -> EditResult<u8> {
    parse_pitch(value)
        .map(|p| p.midi_number)
        .map_err(|_| EditError::InvalidSelector(format!("pitch:{}", value)))
}

fn parse_velocity_range(value: &str) -> EditResult<(u8, u8)> {
    let (lo, hi) = value
        .split_once('-')
        .ok_or_else(|| EditError::InvalidSelector(format!("velocity:{}", value)))?;
    let lo: u8 = lo
        .parse()
        .map_err(|_| EditError::InvalidSelector(format!("velocity:{}", value)))?;
    let hi: u8 = hi
        .parse()
        .map_err(|_| EditError::InvalidSelector(format!("velocity:{}", value)))?;
    if lo > 127 || hi > 127 {
        return Err(EditError::InvalidSelector(format!("velocity:{}", value)));
    }
    Ok((lo, hi))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::NoteSnapshot;

    struct Fixture {
        doc: TimelineDocument,
        index: EventIndex,
        log: UndoLog,
    }

    fn fixture() -> Fixture {
        let mut doc = TimelineDocument::new("Test", 480);
        doc.add_track("Piano", None, 0, None, None).unwrap();
        doc.add_track("Bass", None, 32, None, None).unwrap();
        let mut log = UndoLog::new();
        for (track, pitch, tick, vel) in [
            ("Piano", 60u8, 0u64, 80u8),
            ("Piano", 64, 1920, 90),
            ("Bass", 40, 0, 100),
        ] {
            let note = doc.add_note(track, pitch, tick, 480, vel, None).unwrap();
            log.append(LogEvent::NoteAdded {
                note: NoteSnapshot::from(&note),
            });
        }
        let mut index = EventIndex::new();
        index.rebuild(&doc);
        Fixture { doc, index, log }
    }

    fn resolve(fx: &Fixture, selectors: &[Selector]) -> EditResult<Vec<Note>> {
        SelectorResolver::new(&fx.doc, &fx.index, &fx.log).resolve(selectors)
    }

    #[test]
    fn test_empty_selector_list() {
        let fx = fixture();
        assert_eq!(resolve(&fx, &[]).unwrap_err(), EditError::NoSelectors);
    }

    #[test]
    fn test_resolve_all() {
        let fx = fixture();
        let notes = resolve(&fx, &[Selector::new(SelectorKind::All)]).unwrap();
        assert_eq!(notes.len(), 3);
    }

    #[test]
    fn test_track_and_range_intersection() {
        let fx = fixture();
        let notes = resolve(
            &fx,
            &[
                Selector::new(SelectorKind::Track("Piano".into())),
                Selector::new(SelectorKind::Range("1.1-2.1".into())),
            ],
        )
        .unwrap();
        // Range 1.1-2.1 covers ticks 0..2400; both Piano notes qualify
        assert_eq!(notes.len(), 2);
        assert!(notes.iter().all(|n| n.track == "Piano"));

        let narrow = resolve(
            &fx,
            &[
                Selector::new(SelectorKind::Track("Piano".into())),
                Selector::new(SelectorKind::Range("1.1-1.4".into())),
            ],
        )
        .unwrap();
        // 1.1-1.4 covers ticks 0..1920, excluding the note at 1920
        assert_eq!(narrow.len(), 1);
        assert_eq!(narrow[0].pitch, 60);
    }

    #[test]
    fn test_unknown_track_in_selector() {
        let fx = fixture();
        let err = resolve(
            &fx,
            &[Selector::new(SelectorKind::Track("Gitar".into()))],
        )
        .unwrap_err();
        assert!(matches!(err, EditError::TrackNotFound { .. }));
    }

    #[test]
    fn test_negated_pitch_subtraction() {
        let fx = fixture();
        let notes = resolve(
            &fx,
            &[
                Selector::new(SelectorKind::All),
                Selector::negated(SelectorKind::Pitch("C4".into())),
            ],
        )
        .unwrap();
        assert_eq!(notes.len(), 2);
        assert!(notes.iter().all(|n| n.pitch != 60));
    }

    #[test]
    fn test_only_negated_starts_from_all() {
        let fx = fixture();
        let notes = resolve(
            &fx,
            &[Selector::negated(SelectorKind::Track("Bass".into()))],
        )
        .unwrap();
        assert_eq!(notes.len(), 2);
        assert!(notes.iter().all(|n| n.track == "Piano"));
    }

    #[test]
    fn test_velocity_range_inclusive() {
        let fx = fixture();
        let notes = resolve(
            &fx,
            &[Selector::new(SelectorKind::Velocity("80-90".into()))],
        )
        .unwrap();
        assert_eq!(notes.len(), 2);
    }

    #[test]
    fn test_recent_short_circuits() {
        let fx = fixture();
        let notes = resolve(
            &fx,
            &[
                Selector::new(SelectorKind::Recent(Some(2))),
                // Ignored entirely by the short-circuit
                Selector::new(SelectorKind::Track("Piano".into())),
            ],
        )
        .unwrap();
        assert_eq!(notes.len(), 2);
        // Oldest of the two first
        assert_eq!(notes[0].pitch, 64);
        assert_eq!(notes[1].pitch, 40);
    }

    #[test]
    fn test_malformed_selectors() {
        let fx = fixture();
        for sel in [
            Selector::new(SelectorKind::Channel("16".into())),
            Selector::new(SelectorKind::Channel("x".into())),
            Selector::new(SelectorKind::Range("1.1".into())),
            Selector::new(SelectorKind::Pitch("H4".into())),
            Selector::new(SelectorKind::Velocity("10".into())),
            Selector::new(SelectorKind::Velocity("10-200".into())),
        ] {
            assert!(
                matches!(
                    resolve(&fx, std::slice::from_ref(&sel)),
                    Err(EditError::InvalidSelector(_))
                ),
                "expected InvalidSelector for {:?}",
                sel
            );
        }
    }

    #[test]
    fn test_selector_from_parts() {
        let sel = Selector::from_parts("track", "Piano", false).unwrap();
        assert_eq!(sel.kind, SelectorKind::Track("Piano".into()));
        assert!(Selector::from_parts("recent", "abc", false).is_err());
        assert!(Selector::from_parts("nope", "x", false).is_err());
    }
}
