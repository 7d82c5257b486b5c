// Command layer - structured commands, verb registry and session

pub mod ops_edit;
pub mod ops_meta;
pub mod ops_music;
pub mod ops_session;
pub mod queries;
pub mod response;
pub mod session;
pub mod verb;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::index::Selector;

pub use response::{BatchResponse, CommandResponse};
pub use session::Session;
pub use verb::{lookup, registry, VerbSpec};

/// One structured command, already parsed at the boundary
///
/// The engine never sees raw command text; a tokenizer (or a remote
/// caller sending JSON) produces these.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Command {
    pub verb: String,
    /// Target track name, for verbs that take one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    /// Positional arguments
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
    /// key:value parameters
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub params: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub selectors: Vec<Selector>,
}

impl Command {
    pub fn new(verb: impl Into<String>) -> Self {
        Self {
            verb: verb.into(),
            ..Self::default()
        }
    }

    pub fn target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    pub fn selector(mut self, selector: Selector) -> Self {
        self.selectors.push(selector);
        self
    }

    /// Param value by key, as a string slice
    pub(crate) fn param_str(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    /// Target track name, required
    pub(crate) fn require_target(&self) -> crate::error::EditResult<&str> {
        self.target
            .as_deref()
            .ok_or_else(|| crate::error::EditError::InvalidArgument("Missing track name".into()))
    }

    /// Positional argument, required
    pub(crate) fn require_arg(&self, index: usize, what: &str) -> crate::error::EditResult<&str> {
        self.args
            .get(index)
            .map(String::as_str)
            .ok_or_else(|| crate::error::EditError::InvalidArgument(format!("Missing {}", what)))
    }

    /// Optional `ch` param: 1-indexed on the wire, 0-indexed inside
    pub(crate) fn resolve_channel(&self) -> crate::error::EditResult<Option<u8>> {
        match self.param_str("ch") {
            None => Ok(None),
            Some(raw) => {
                let display: u8 = raw.parse().map_err(|_| {
                    crate::error::EditError::InvalidArgument(format!("Invalid channel: {}", raw))
                })?;
                if !(1..=16).contains(&display) {
                    return Err(crate::error::EditError::InvalidArgument(format!(
                        "Channel must be 1-16 (got {})",
                        display
                    )));
                }
                Ok(Some(display - 1))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::SelectorKind;

    #[test]
    fn test_builder() {
        let cmd = Command::new("note")
            .target("Piano")
            .arg("C4")
            .param("at", "1.1")
            .selector(Selector::new(SelectorKind::All));
        assert_eq!(cmd.verb, "note");
        assert_eq!(cmd.target.as_deref(), Some("Piano"));
        assert_eq!(cmd.args, vec!["C4"]);
        assert_eq!(cmd.param_str("at"), Some("1.1"));
        assert_eq!(cmd.selectors.len(), 1);
    }

    #[test]
    fn test_command_json_boundary() {
        let json = r#"{
            "verb": "note",
            "target": "Piano",
            "args": ["C4"],
            "params": {"at": "2.1", "dur": "eighth"},
            "selectors": [{"kind": {"track": "Piano"}, "negated": false}]
        }"#;
        let cmd: Command = serde_json::from_str(json).unwrap();
        assert_eq!(cmd.verb, "note");
        assert_eq!(cmd.param_str("dur"), Some("eighth"));
        assert_eq!(cmd.selectors.len(), 1);
    }
}
