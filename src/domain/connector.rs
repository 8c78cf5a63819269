//! Per-connector mutable state.
//!
//! One `ConnectorState` record per connector id; id 0 denotes the station
//! itself in V16. The record is the authoritative home of the transaction
//! that runs on the connector.

use std::collections::VecDeque;
use std::fmt;

use chrono::{DateTime, Utc};
use rust_ocpp::v1_6::types::ChargePointStatus;
use rust_ocpp::v2_0_1::enumerations::connector_status_enum_type::ConnectorStatusEnumType;
use rust_ocpp::v2_0_1::messages::transaction_event::TransactionEventRequest;

use super::charging_profile::StoredChargingProfile;

/// Operative state controlled by ChangeAvailability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Availability {
    #[default]
    Operative,
    Inoperative,
}

/// Connector status, tagged with the dialect whose vocabulary it uses.
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectorStatusValue {
    V16(ChargePointStatus),
    V201(ConnectorStatusEnumType),
}

impl ConnectorStatusValue {
    pub fn as_v16(&self) -> Option<&ChargePointStatus> {
        match self {
            Self::V16(s) => Some(s),
            Self::V201(_) => None,
        }
    }

    pub fn as_v201(&self) -> Option<&ConnectorStatusEnumType> {
        match self {
            Self::V201(s) => Some(s),
            Self::V16(_) => None,
        }
    }
}

/// Transaction identifier: integer in 1.6, UUID string in 2.0.1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionId {
    Integer(i32),
    Uuid(String),
}

impl TransactionId {
    pub fn as_integer(&self) -> Option<i32> {
        match self {
            Self::Integer(id) => Some(*id),
            Self::Uuid(_) => None,
        }
    }

    pub fn as_uuid(&self) -> Option<&str> {
        match self {
            Self::Uuid(id) => Some(id),
            Self::Integer(_) => None,
        }
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(id) => write!(f, "{id}"),
            Self::Uuid(id) => f.write_str(id),
        }
    }
}

/// Why a transaction is being ended. Mapped to the dialect's reason
/// vocabulary by the outbound services.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    EvDisconnected,
    HardReset,
    SoftReset,
    ImmediateReset,
    Local,
    Remote,
    UnlockCommand,
    Reboot,
    Other,
}

/// V16 reservation bookkeeping (ReserveNow / CancelReservation).
#[derive(Debug, Clone)]
pub struct Reservation {
    pub reservation_id: i32,
    pub id_tag: String,
    pub parent_id_tag: Option<String>,
    pub expiry_date: DateTime<Utc>,
}

/// A TransactionEvent held back because the socket was down.
#[derive(Debug, Clone)]
pub struct QueuedTransactionEvent {
    pub request: TransactionEventRequest,
    pub seq_no: i32,
    pub queued_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct ConnectorState {
    pub status: ConnectorStatusValue,
    pub availability: Availability,

    pub transaction_started: bool,
    pub transaction_id: Option<TransactionId>,
    pub transaction_id_tag: Option<String>,
    pub transaction_start: Option<DateTime<Utc>>,
    pub transaction_remote_started: bool,
    pub remote_start_id: Option<i32>,

    /// Lifetime meter register, Wh.
    pub energy_active_import_register: f64,
    /// Energy imported by the running transaction, Wh.
    pub transaction_energy_active_import_register: f64,

    pub charging_profiles: Vec<StoredChargingProfile>,
    pub reservation: Option<Reservation>,

    pub authorize_id_tag: Option<String>,
    pub local_authorize_id_tag: Option<String>,
    pub id_tag_authorized: bool,
    pub id_tag_local_authorized: bool,

    // V201 per-transaction counters; reset when a transaction begins
    pub transaction_seq_no: Option<i32>,
    pub transaction_evse_sent: bool,
    pub transaction_id_token_sent: bool,
    pub transaction_event_queue: VecDeque<QueuedTransactionEvent>,
}

impl ConnectorState {
    pub fn new_v16() -> Self {
        Self::with_status(ConnectorStatusValue::V16(ChargePointStatus::Available))
    }

    pub fn new_v201() -> Self {
        Self::with_status(ConnectorStatusValue::V201(ConnectorStatusEnumType::Available))
    }

    fn with_status(status: ConnectorStatusValue) -> Self {
        Self {
            status,
            availability: Availability::Operative,
            transaction_started: false,
            transaction_id: None,
            transaction_id_tag: None,
            transaction_start: None,
            transaction_remote_started: false,
            remote_start_id: None,
            energy_active_import_register: 0.0,
            transaction_energy_active_import_register: 0.0,
            charging_profiles: Vec::new(),
            reservation: None,
            authorize_id_tag: None,
            local_authorize_id_tag: None,
            id_tag_authorized: false,
            id_tag_local_authorized: false,
            transaction_seq_no: None,
            transaction_evse_sent: false,
            transaction_id_token_sent: false,
            transaction_event_queue: VecDeque::new(),
        }
    }

    pub fn is_operative(&self) -> bool {
        self.availability == Availability::Operative
    }

    pub fn has_active_transaction(&self) -> bool {
        self.transaction_started
    }

    /// Record a freshly accepted transaction and zero its energy register.
    pub fn begin_transaction(
        &mut self,
        id: TransactionId,
        id_tag: Option<String>,
        started_at: DateTime<Utc>,
    ) {
        self.transaction_started = true;
        self.transaction_id = Some(id);
        self.transaction_id_tag = id_tag;
        self.transaction_start = Some(started_at);
        self.transaction_energy_active_import_register = 0.0;
    }

    /// Drop every per-transaction field, including the authorization flags
    /// and the V201 first-emission markers.
    pub fn clear_transaction(&mut self) {
        self.transaction_started = false;
        self.transaction_id = None;
        self.transaction_id_tag = None;
        self.transaction_start = None;
        self.transaction_remote_started = false;
        self.remote_start_id = None;
        self.transaction_energy_active_import_register = 0.0;
        self.authorize_id_tag = None;
        self.local_authorize_id_tag = None;
        self.id_tag_authorized = false;
        self.id_tag_local_authorized = false;
        self.transaction_seq_no = None;
        self.transaction_evse_sent = false;
        self.transaction_id_token_sent = false;
    }

    /// Per-transaction monotonic sequence number: first call yields 0, each
    /// later call increments by 1.
    pub fn next_seq_no(&mut self) -> i32 {
        let next = match self.transaction_seq_no {
            None => 0,
            Some(n) => n + 1,
        };
        self.transaction_seq_no = Some(next);
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seq_no_starts_at_zero_then_increments() {
        let mut c = ConnectorState::new_v201();
        assert_eq!(c.next_seq_no(), 0);
        assert_eq!(c.next_seq_no(), 1);
        assert_eq!(c.next_seq_no(), 2);
    }

    #[test]
    fn clear_transaction_resets_counters_and_flags() {
        let mut c = ConnectorState::new_v201();
        c.begin_transaction(
            TransactionId::Uuid("3e1c9a46-3c1b-4b6e-9a4e-1f1d2c3b4a5d".into()),
            Some("TAG-1".into()),
            Utc::now(),
        );
        c.next_seq_no();
        c.transaction_evse_sent = true;
        c.transaction_id_token_sent = true;

        c.clear_transaction();
        assert!(!c.has_active_transaction());
        assert_eq!(c.transaction_seq_no, None);
        assert!(!c.transaction_evse_sent);
        assert!(!c.transaction_id_token_sent);
        assert_eq!(c.next_seq_no(), 0);
    }

    #[test]
    fn begin_transaction_zeroes_the_session_register() {
        let mut c = ConnectorState::new_v16();
        c.energy_active_import_register = 1500.0;
        c.transaction_energy_active_import_register = 300.0;
        c.begin_transaction(TransactionId::Integer(7), Some("TAG-1".into()), Utc::now());
        assert_eq!(c.transaction_energy_active_import_register, 0.0);
        assert_eq!(c.energy_active_import_register, 1500.0);
    }
}
