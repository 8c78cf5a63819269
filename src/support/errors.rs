//! Protocol-engine error taxonomy.
//!
//! One enum covers both directions of the wire:
//!
//! - Variants with a message map 1:1 to OCPP-J CALLERROR codes and are what
//!   an inbound handler returns when it must refuse a command.
//! - `Timeout`, `Cancelled` and `Offline` are caller-side outcomes of an
//!   outbound request; they never appear in a CALLERROR we emit.

use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum OcppError {
    /// No handler is registered for the requested action.
    #[error("NotImplemented: {0}")]
    NotImplemented(String),

    /// The action exists but this station/version does not support it.
    #[error("NotSupported: {0}")]
    NotSupported(String),

    /// Registration gate refused the command.
    #[error("SecurityError: {0}")]
    SecurityError(String),

    /// A payload field violates a value constraint.
    #[error("PropertyConstraintViolation: {0}")]
    PropertyConstraintViolation(String),

    /// Invariant violation inside the engine.
    #[error("InternalError: {0}")]
    InternalError(String),

    /// Payload failed schema-driven decoding.
    #[error("FormationViolation: {0}")]
    FormationViolation(String),

    /// Catch-all wire error.
    #[error("GenericError: {0}")]
    GenericError(String),

    /// An outbound request expired before the CSMS replied.
    #[error("request timed out")]
    Timeout,

    /// The station was stopped while the request was pending.
    #[error("request cancelled")]
    Cancelled,

    /// The socket was down and the caller asked not to buffer.
    #[error("transport closed")]
    Offline,

    /// The transport failed while sending.
    #[error("transport failure: {0}")]
    Transport(String),
}

impl OcppError {
    /// CALLERROR `errorCode` field for this error.
    ///
    /// Caller-side variants are mapped to `GenericError` — they only reach
    /// the wire when a handler failed for a reason the CSMS cannot act on.
    pub fn wire_code(&self) -> &'static str {
        match self {
            Self::NotImplemented(_) => "NotImplemented",
            Self::NotSupported(_) => "NotSupported",
            Self::SecurityError(_) => "SecurityError",
            Self::PropertyConstraintViolation(_) => "PropertyConstraintViolation",
            Self::InternalError(_) => "InternalError",
            Self::FormationViolation(_) => "FormationViolation",
            Self::GenericError(_)
            | Self::Timeout
            | Self::Cancelled
            | Self::Offline
            | Self::Transport(_) => "GenericError",
        }
    }

    /// Rebuild a typed error from a received CALLERROR.
    pub fn from_wire(code: &str, description: &str) -> Self {
        let message = description.to_string();
        match code {
            "NotImplemented" => Self::NotImplemented(message),
            "NotSupported" => Self::NotSupported(message),
            "SecurityError" => Self::SecurityError(message),
            "PropertyConstraintViolation" => Self::PropertyConstraintViolation(message),
            "InternalError" => Self::InternalError(message),
            "FormationViolation" => Self::FormationViolation(message),
            _ => Self::GenericError(format!("{code}: {message}")),
        }
    }

    /// CALLERROR `errorDescription` field for this error.
    pub fn wire_description(&self) -> String {
        match self {
            Self::NotImplemented(m)
            | Self::NotSupported(m)
            | Self::SecurityError(m)
            | Self::PropertyConstraintViolation(m)
            | Self::InternalError(m)
            | Self::FormationViolation(m)
            | Self::GenericError(m)
            | Self::Transport(m) => m.clone(),
            Self::Timeout => "request timed out".to_string(),
            Self::Cancelled => "request cancelled".to_string(),
            Self::Offline => "transport closed".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_codes_match_callerror_vocabulary() {
        assert_eq!(
            OcppError::FormationViolation("x".into()).wire_code(),
            "FormationViolation"
        );
        assert_eq!(
            OcppError::SecurityError("x".into()).wire_code(),
            "SecurityError"
        );
        assert_eq!(OcppError::Timeout.wire_code(), "GenericError");
    }
}
