//! EVSE layout (V201).
//!
//! V201 models EVSEs containing connectors; the simulator maps each EVSE to
//! the connector records that belong to it. V16 stations have no EVSEs.

use super::connector::Availability;

#[derive(Debug, Clone)]
pub struct EvseState {
    pub availability: Availability,
    /// Connector ids owned by this EVSE.
    pub connector_ids: Vec<u32>,
}

impl EvseState {
    pub fn new(connector_ids: Vec<u32>) -> Self {
        Self {
            availability: Availability::Operative,
            connector_ids,
        }
    }
}
