// Index - derived-note registry and selector resolution

pub mod registry;
pub mod selector;

pub use registry::EventIndex;
pub use selector::{Selector, SelectorKind, SelectorResolver};
