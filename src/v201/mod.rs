//! OCPP 2.0.1 dialect: inbound command handlers, outbound requests, the
//! device model and the TransactionEvent pipeline.

pub mod device_model;
pub mod inbound;
pub mod outbound;
pub mod transaction_event;
pub mod trigger_reason;
