// Midiline - Library exports for tests and the demo binary

pub mod command;
pub mod error;
pub mod history;
pub mod index;
pub mod io;
pub mod parse;
pub mod timeline;

// Re-export commonly used types for convenience
pub use command::{BatchResponse, Command, CommandResponse, Session};
pub use error::{EditError, EditResult};
pub use history::{LogEvent, NoteSnapshot, UndoLog};
pub use index::{EventIndex, Selector, SelectorKind, SelectorResolver};
pub use timeline::{
    EventKind, KeyMode, KeySignatureChange, Marker, Note, TempoChange, TimeSignatureChange,
    TimelineDocument, Track, TrackEvent,
};
