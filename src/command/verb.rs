// Verb registry - the dispatch table for every mutating verb
//
// Verbs are plain data: a name, a syntax line for error hints, and a
// handler function. Adding a verb means adding a row.

use crate::command::{ops_edit, ops_meta, ops_music, ops_session, Command, Session};
use crate::error::EditResult;

pub type VerbHandler = fn(&Command, &mut Session) -> EditResult<String>;

pub struct VerbSpec {
    pub verb: &'static str,
    pub syntax: &'static str,
    pub description: &'static str,
    pub handler: VerbHandler,
}

static VERBS: &[VerbSpec] = &[
    // Music creation
    VerbSpec {
        verb: "note",
        syntax: "note TRACK PITCH at:POS dur:DUR [vel:V] [ch:N]",
        description: "Add a single note.",
        handler: ops_music::op_note,
    },
    VerbSpec {
        verb: "chord",
        syntax: "chord TRACK SYMBOL at:POS dur:DUR [vel:V] [ch:N] [octave:N]",
        description: "Add a chord (multiple notes).",
        handler: ops_music::op_chord,
    },
    VerbSpec {
        verb: "track",
        syntax: "track add|remove NAME [program:N] [ch:N] [bank:MSB[.LSB]]",
        description: "Add or remove a track.",
        handler: ops_music::op_track,
    },
    VerbSpec {
        verb: "cc",
        syntax: "cc TRACK CONTROLLER VALUE at:POS [ch:N]",
        description: "Add a continuous controller event.",
        handler: ops_music::op_cc,
    },
    VerbSpec {
        verb: "bend",
        syntax: "bend TRACK VALUE at:POS [ch:N]",
        description: "Add a pitch bend event.",
        handler: ops_music::op_bend,
    },
    VerbSpec {
        verb: "mute",
        syntax: "mute TRACK",
        description: "Toggle track mute.",
        handler: ops_music::op_mute,
    },
    VerbSpec {
        verb: "solo",
        syntax: "solo TRACK",
        description: "Toggle track solo.",
        handler: ops_music::op_solo,
    },
    VerbSpec {
        verb: "program",
        syntax: "program TRACK N [bank:MSB[.LSB]]",
        description: "Change track instrument program.",
        handler: ops_music::op_program,
    },
    // Conductor
    VerbSpec {
        verb: "tempo",
        syntax: "tempo BPM [at:POS]",
        description: "Set tempo.",
        handler: ops_meta::op_tempo,
    },
    VerbSpec {
        verb: "time-sig",
        syntax: "time-sig N/D [at:POS]",
        description: "Set time signature.",
        handler: ops_meta::op_time_sig,
    },
    VerbSpec {
        verb: "key-sig",
        syntax: "key-sig KEY[-MODE] [at:POS]",
        description: "Set key signature.",
        handler: ops_meta::op_key_sig,
    },
    VerbSpec {
        verb: "marker",
        syntax: "marker TEXT at:POS",
        description: "Add a text marker.",
        handler: ops_meta::op_marker,
    },
    VerbSpec {
        verb: "title",
        syntax: "title TEXT",
        description: "Set the document title.",
        handler: ops_meta::op_title,
    },
    // Selector-based editing
    VerbSpec {
        verb: "remove",
        syntax: "remove SELECTORS",
        description: "Remove notes matching selectors.",
        handler: ops_edit::op_remove,
    },
    VerbSpec {
        verb: "move",
        syntax: "move SELECTORS to:POS",
        description: "Move notes, preserving relative spacing.",
        handler: ops_edit::op_move,
    },
    VerbSpec {
        verb: "copy",
        syntax: "copy SELECTORS to:POS",
        description: "Copy notes to a new position.",
        handler: ops_edit::op_copy,
    },
    VerbSpec {
        verb: "transpose",
        syntax: "transpose SELECTORS +/-N",
        description: "Shift note pitches by semitones.",
        handler: ops_edit::op_transpose,
    },
    VerbSpec {
        verb: "velocity",
        syntax: "velocity SELECTORS +/-N",
        description: "Adjust note velocities.",
        handler: ops_edit::op_velocity,
    },
    VerbSpec {
        verb: "quantize",
        syntax: "quantize SELECTORS [grid:DUR]",
        description: "Snap note starts to a grid.",
        handler: ops_edit::op_quantize,
    },
    VerbSpec {
        verb: "modify",
        syntax: "modify SELECTORS [pitch:P] [vel:V] [dur:D] [at:POS] [ch:N]",
        description: "Rewrite fields of matching notes.",
        handler: ops_edit::op_modify,
    },
    VerbSpec {
        verb: "repeat",
        syntax: "repeat SELECTORS [count:N] [to:POS]",
        description: "Repeat notes after their span.",
        handler: ops_edit::op_repeat,
    },
    VerbSpec {
        verb: "crescendo",
        syntax: "crescendo SELECTORS from:V to:V",
        description: "Ramp velocities up across the selection.",
        handler: ops_edit::op_crescendo,
    },
    VerbSpec {
        verb: "decrescendo",
        syntax: "decrescendo SELECTORS from:V to:V",
        description: "Ramp velocities down across the selection.",
        handler: ops_edit::op_crescendo,
    },
    // Session
    VerbSpec {
        verb: "checkpoint",
        syntax: "checkpoint NAME",
        description: "Record a named undo position.",
        handler: ops_session::op_checkpoint,
    },
    VerbSpec {
        verb: "undo",
        syntax: "undo [N | to:NAME]",
        description: "Undo the last N events or back to a checkpoint.",
        handler: ops_session::op_undo,
    },
    VerbSpec {
        verb: "redo",
        syntax: "redo [N]",
        description: "Redo previously undone events.",
        handler: ops_session::op_redo,
    },
];

/// The full verb table
pub fn registry() -> &'static [VerbSpec] {
    VERBS
}

/// Look up a verb by name
pub fn lookup(verb: &str) -> Option<&'static VerbSpec> {
    VERBS.iter().find(|spec| spec.verb == verb)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup() {
        assert!(lookup("note").is_some());
        assert!(lookup("transpose").is_some());
        assert!(lookup("frobnicate").is_none());
    }

    #[test]
    fn test_registry_has_unique_verbs() {
        let mut seen = std::collections::HashSet::new();
        for spec in registry() {
            assert!(seen.insert(spec.verb), "duplicate verb {}", spec.verb);
        }
    }
}
