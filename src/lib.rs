//! # OCPP charging-station simulator
//!
//! Impersonates one or more EV charge points speaking OCPP 1.6-J or 2.0.1
//! to a Central System (CSMS). The crate is the protocol engine only: it
//! frames and correlates OCPP-J PDUs, dispatches CSMS-initiated commands to
//! version-specific handlers, issues station-initiated requests, and drives
//! connector, transaction and charging-profile state.
//!
//! ## Architecture
//!
//! - **support**: cross-cutting utilities (OCPP-J framing, error taxonomy,
//!   logging init)
//! - **domain**: version-independent state — registration, connectors,
//!   EVSEs, configuration store, charging-profile rules, status-transition
//!   tables
//! - **station**: the `Station` aggregate (root actor) and its background
//!   tasks (heartbeat, WebSocket ping, periodic meter values)
//! - **router**: pending-request correlation, offline buffering, and the
//!   `Transport` trait the WebSocket layer plugs into
//! - **v16** / **v201**: per-version inbound and outbound request services,
//!   the V16 firmware/diagnostics simulations, and the V201 device model
//!
//! The WebSocket transport, station lifecycle supervisor, persistent
//! storage and UI are external collaborators consumed through the narrow
//! traits in [`router::transport`] and [`v16::diagnostics`].

pub mod config;
pub mod domain;
pub mod router;
pub mod station;
pub mod support;
pub mod v16;
pub mod v201;

// Re-export the types most embedders need at crate root
pub use config::StationConfig;
pub use domain::version::OcppVersion;
pub use router::transport::{InMemoryTransport, Transport};
pub use station::Station;
pub use support::errors::OcppError;
