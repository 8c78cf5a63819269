//! Cross-cutting utilities: error taxonomy, OCPP-J framing, logging.

pub mod errors;
pub mod logging;
pub mod ocpp_frame;
