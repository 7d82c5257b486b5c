// Error types shared across the engine

use thiserror::Error;

/// Result type for engine operations
pub type EditResult<T> = Result<T, EditError>;

/// Errors that can occur while editing or querying the timeline
///
/// Every error is a returned value; nothing panics past the command
/// boundary. Literal errors carry the offending text so responses can
/// echo it back to the caller.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EditError {
    #[error("Invalid position: {0}")]
    InvalidPosition(String),

    #[error("Invalid duration: {0}")]
    InvalidDuration(String),

    #[error("Invalid pitch: {0}")]
    InvalidPitch(String),

    #[error("Invalid chord: {0}")]
    InvalidChord(String),

    #[error("Invalid velocity: {0}")]
    InvalidVelocity(String),

    #[error("Invalid selector: {0}")]
    InvalidSelector(String),

    #[error("Relative position '{0}' needs a reference point")]
    MissingReference(String),

    #[error("Track '{name}' not found")]
    TrackNotFound {
        name: String,
        /// Fuzzy-matched alternative, when one is close enough
        suggestion: Option<String>,
    },

    #[error("Track '{0}' already exists")]
    DuplicateTrack(String),

    #[error("No checkpoint named '{0}'")]
    CheckpointNotFound(String),

    #[error("Event index {index} out of range (len={len})")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("{0}")]
    InvalidArgument(String),

    #[error("No selectors specified")]
    NoSelectors,

    #[error("No notes matched selectors")]
    NoMatch,

    #[error("Malformed MIDI file: {0}")]
    MalformedFile(String),
}

impl EditError {
    /// A usage hint suitable for the `try:` line of an error response.
    pub fn suggestion(&self) -> Option<String> {
        match self {
            EditError::TrackNotFound {
                suggestion: Some(s),
                ..
            } => Some(s.clone()),
            EditError::NoSelectors => {
                Some("Use track:NAME, range:M.B-M.B, pitch:P, all, etc.".into())
            }
            EditError::InvalidSelector(_) => Some("range:1.1-4.4".into()),
            _ => None,
        }
    }
}
