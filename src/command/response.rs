// Command responses - compact success/failure lines plus batch digests

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::EditError;

/// Outcome of a single command
///
/// Rendered as `+ message` on success or `! message` with an optional
/// `try:` suggestion line on failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandResponse {
    pub ok: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

impl CommandResponse {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            ok: true,
            message: message.into(),
            suggestion: None,
        }
    }

    pub fn failure(error: &EditError) -> Self {
        Self {
            ok: false,
            message: error.to_string(),
            suggestion: error.suggestion(),
        }
    }
}

impl fmt::Display for CommandResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.ok {
            write!(f, "+ {}", self.message)
        } else {
            write!(f, "! {}", self.message)?;
            if let Some(suggestion) = &self.suggestion {
                write!(f, "\n  try: {}", suggestion)?;
            }
            Ok(())
        }
    }
}

/// Outcome of an atomic batch
///
/// `ok` is false when the batch was rolled back; `digest` reflects the
/// document state after the batch (or after the rollback).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchResponse {
    pub ok: bool,
    pub responses: Vec<CommandResponse>,
    pub digest: String,
}

impl fmt::Display for BatchResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for response in &self.responses {
            writeln!(f, "{}", response)?;
        }
        write!(f, "{}", self.digest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_rendering() {
        let response = CommandResponse::success("Added C4 at 1.1");
        assert_eq!(response.to_string(), "+ Added C4 at 1.1");
    }

    #[test]
    fn test_failure_rendering_with_suggestion() {
        let err = EditError::TrackNotFound {
            name: "Pianno".into(),
            suggestion: Some("Did you mean 'Piano'?".into()),
        };
        let response = CommandResponse::failure(&err);
        assert_eq!(
            response.to_string(),
            "! Track 'Pianno' not found\n  try: Did you mean 'Piano'?"
        );
    }

    #[test]
    fn test_serde_round_trip() {
        let response = CommandResponse::success("ok");
        let json = serde_json::to_string(&response).unwrap();
        let back: CommandResponse = serde_json::from_str(&json).unwrap();
        assert_eq!(response, back);
    }
}
