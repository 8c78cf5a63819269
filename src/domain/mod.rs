//! Version-independent station state: registration, connectors, EVSEs,
//! configuration keys, charging-profile rules and status-transition tables.

pub mod charging_profile;
pub mod configuration;
pub mod connector;
pub mod evse;
pub mod registration;
pub mod transitions;
pub mod version;
