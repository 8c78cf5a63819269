//! OCPP-J message framing
//!
//! The OCPP-J (JSON over WebSocket) envelope is identical across protocol
//! versions:
//!
//! - **Call**       `[2, "<uniqueId>", "<action>", {<payload>}]`
//! - **CallResult** `[3, "<uniqueId>", {<payload>}]`
//! - **CallError**  `[4, "<uniqueId>", "<errorCode>", "<errorDescription>", {<errorDetails>}]`

use serde_json::{json, Value};
use thiserror::Error;

use super::errors::OcppError;

const MSG_TYPE_CALL: u64 = 2;
const MSG_TYPE_CALL_RESULT: u64 = 3;
const MSG_TYPE_CALL_ERROR: u64 = 4;

/// A parsed OCPP-J frame (version-agnostic transport envelope).
#[derive(Debug, Clone)]
pub enum OcppFrame {
    Call {
        unique_id: String,
        action: String,
        payload: Value,
    },
    CallResult {
        unique_id: String,
        payload: Value,
    },
    CallError {
        unique_id: String,
        error_code: String,
        error_description: String,
        error_details: Value,
    },
}

/// Errors raised while parsing a raw text frame.
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("invalid JSON: {0}")]
    InvalidJson(String),
    #[error("frame is not a JSON array")]
    NotAnArray,
    #[error("unknown message type {0}")]
    UnknownMessageType(u64),
    #[error("message type is not a number")]
    InvalidMessageType,
    #[error("expected at least {expected} elements, got {got}")]
    TooShort { expected: usize, got: usize },
    #[error("{0} must be a string")]
    NotAString(&'static str),
}

impl FrameError {
    /// The message id of the offending frame, when one could be recovered.
    ///
    /// Lets the router answer a malformed CALL with a correlated CALLERROR
    /// instead of dropping it silently.
    pub fn recovered_id(raw: &str) -> Option<String> {
        let arr: Vec<Value> = serde_json::from_str(raw).ok()?;
        arr.get(1)?.as_str().map(str::to_owned)
    }
}

impl OcppFrame {
    pub fn call(unique_id: impl Into<String>, action: impl Into<String>, payload: Value) -> Self {
        Self::Call {
            unique_id: unique_id.into(),
            action: action.into(),
            payload,
        }
    }

    pub fn call_result(unique_id: impl Into<String>, payload: Value) -> Self {
        Self::CallResult {
            unique_id: unique_id.into(),
            payload,
        }
    }

    /// Build a CALLERROR frame from an engine error.
    pub fn call_error(unique_id: impl Into<String>, error: &OcppError) -> Self {
        Self::CallError {
            unique_id: unique_id.into(),
            error_code: error.wire_code().to_string(),
            error_description: error.wire_description(),
            error_details: json!({}),
        }
    }

    /// Parse a raw text frame.
    pub fn parse(text: &str) -> Result<Self, FrameError> {
        let arr: Vec<Value> =
            serde_json::from_str(text).map_err(|e| FrameError::InvalidJson(e.to_string()))?;

        let msg_type = arr
            .first()
            .ok_or(FrameError::NotAnArray)?
            .as_u64()
            .ok_or(FrameError::InvalidMessageType)?;

        let require = |n: usize| {
            if arr.len() < n {
                Err(FrameError::TooShort {
                    expected: n,
                    got: arr.len(),
                })
            } else {
                Ok(())
            }
        };
        let string_at = |i: usize, name: &'static str| -> Result<String, FrameError> {
            arr[i]
                .as_str()
                .map(str::to_owned)
                .ok_or(FrameError::NotAString(name))
        };

        match msg_type {
            MSG_TYPE_CALL => {
                require(4)?;
                Ok(Self::Call {
                    unique_id: string_at(1, "uniqueId")?,
                    action: string_at(2, "action")?,
                    payload: arr[3].clone(),
                })
            }
            MSG_TYPE_CALL_RESULT => {
                require(3)?;
                Ok(Self::CallResult {
                    unique_id: string_at(1, "uniqueId")?,
                    payload: arr[2].clone(),
                })
            }
            MSG_TYPE_CALL_ERROR => {
                require(4)?;
                Ok(Self::CallError {
                    unique_id: string_at(1, "uniqueId")?,
                    error_code: string_at(2, "errorCode")?,
                    error_description: arr[3].as_str().unwrap_or("").to_string(),
                    error_details: arr.get(4).cloned().unwrap_or_else(|| json!({})),
                })
            }
            other => Err(FrameError::UnknownMessageType(other)),
        }
    }

    /// Serialize to the wire representation.
    pub fn to_text(&self) -> String {
        let value = match self {
            Self::Call {
                unique_id,
                action,
                payload,
            } => json!([MSG_TYPE_CALL, unique_id, action, payload]),
            Self::CallResult { unique_id, payload } => {
                json!([MSG_TYPE_CALL_RESULT, unique_id, payload])
            }
            Self::CallError {
                unique_id,
                error_code,
                error_description,
                error_details,
            } => json!([
                MSG_TYPE_CALL_ERROR,
                unique_id,
                error_code,
                error_description,
                error_details
            ]),
        };
        value.to_string()
    }

    pub fn unique_id(&self) -> &str {
        match self {
            Self::Call { unique_id, .. }
            | Self::CallResult { unique_id, .. }
            | Self::CallError { unique_id, .. } => unique_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_call() {
        let text = r#"[2,"m1","Reset",{"type":"Soft"}]"#;
        match OcppFrame::parse(text).unwrap() {
            OcppFrame::Call {
                unique_id,
                action,
                payload,
            } => {
                assert_eq!(unique_id, "m1");
                assert_eq!(action, "Reset");
                assert_eq!(payload["type"], "Soft");
            }
            other => panic!("expected Call, got {other:?}"),
        }
    }

    #[test]
    fn parse_call_result() {
        let text = r#"[3,"m2",{"status":"Accepted"}]"#;
        match OcppFrame::parse(text).unwrap() {
            OcppFrame::CallResult { unique_id, payload } => {
                assert_eq!(unique_id, "m2");
                assert_eq!(payload["status"], "Accepted");
            }
            other => panic!("expected CallResult, got {other:?}"),
        }
    }

    #[test]
    fn parse_call_error_without_details() {
        let text = r#"[4,"m3","NotImplemented","no handler"]"#;
        match OcppFrame::parse(text).unwrap() {
            OcppFrame::CallError {
                error_code,
                error_description,
                ..
            } => {
                assert_eq!(error_code, "NotImplemented");
                assert_eq!(error_description, "no handler");
            }
            other => panic!("expected CallError, got {other:?}"),
        }
    }

    #[test]
    fn malformed_frames_are_rejected() {
        assert!(OcppFrame::parse("not json").is_err());
        assert!(OcppFrame::parse("{}").is_err());
        assert!(OcppFrame::parse("[9,\"id\",{}]").is_err());
        assert!(OcppFrame::parse("[2,\"id\"]").is_err());
    }

    #[test]
    fn roundtrip() {
        let frame = OcppFrame::call("id1", "Heartbeat", json!({}));
        let parsed = OcppFrame::parse(&frame.to_text()).unwrap();
        assert_eq!(parsed.unique_id(), "id1");

        let err = OcppFrame::call_error("id2", &OcppError::FormationViolation("bad".into()));
        let text = err.to_text();
        assert!(text.contains("FormationViolation"));
        assert!(OcppFrame::parse(&text).is_ok());
    }

    #[test]
    fn recovers_message_id_from_malformed_call() {
        let text = r#"[2,"m7"]"#;
        assert!(OcppFrame::parse(text).is_err());
        assert_eq!(FrameError::recovered_id(text).as_deref(), Some("m7"));
    }
}
