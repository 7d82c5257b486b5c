// Timeline - the editable document and its tick arithmetic

pub mod bridge;
pub mod document;
pub mod event;
pub mod meta;
pub mod position;
pub mod track;

pub use document::TimelineDocument;
pub use event::{EventKind, Note, TrackEvent};
pub use meta::{KeyMode, KeySignatureChange, Marker, TempoChange, TimeSignatureChange};
pub use track::Track;
