//! OCPP 1.6-J dialect: inbound command handlers, outbound requests and the
//! firmware/diagnostics simulations.

pub mod diagnostics;
pub mod firmware;
pub mod inbound;
pub mod outbound;
