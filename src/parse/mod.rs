// Literal parsers - small stateless lookups for pitches, durations,
// velocities and chord symbols

pub mod chord;
pub mod duration;
pub mod pitch;
pub mod velocity;

pub use chord::parse_chord;
pub use duration::parse_duration;
pub use pitch::{parse_pitch, pitch_name, Pitch};
pub use velocity::parse_velocity;
