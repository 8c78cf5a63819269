//! Connector status transition tables.
//!
//! Every status change is checked against the allow-list for its dialect
//! and component. A pair outside the table is refused and logged by the
//! caller; same-state writes are always permitted (idempotent re-emission
//! of a StatusNotification is not a transition).

use rust_ocpp::v1_6::types::ChargePointStatus;
use rust_ocpp::v2_0_1::enumerations::connector_status_enum_type::ConnectorStatusEnumType;

/// V16 connector-level transitions (connector id > 0).
pub fn v16_connector_allowed(from: &ChargePointStatus, to: &ChargePointStatus) -> bool {
    use ChargePointStatus::*;
    if from == to {
        return true;
    }
    // Faulted and Unavailable are reachable from every state and may leave
    // towards any state.
    if matches!(to, Faulted | Unavailable) || matches!(from, Faulted | Unavailable) {
        return true;
    }
    match from {
        Available => matches!(to, Preparing | Charging | SuspendedEV | SuspendedEVSE | Reserved),
        Preparing => matches!(to, Available | Charging | SuspendedEV | SuspendedEVSE | Finishing),
        Charging => matches!(to, Available | SuspendedEV | SuspendedEVSE | Finishing),
        SuspendedEV => matches!(to, Available | Charging | SuspendedEVSE | Finishing),
        SuspendedEVSE => matches!(to, Available | Charging | SuspendedEV | Finishing),
        Finishing => matches!(to, Available | Preparing),
        Reserved => matches!(to, Available | Preparing),
        Unavailable | Faulted => true,
    }
}

/// V16 station-level transitions (connector id 0).
pub fn v16_station_allowed(from: &ChargePointStatus, to: &ChargePointStatus) -> bool {
    use ChargePointStatus::*;
    if from == to {
        return true;
    }
    matches!(
        (from, to),
        (Available, Unavailable)
            | (Unavailable, Available)
            | (Available, Faulted)
            | (Unavailable, Faulted)
            | (Faulted, Available)
            | (Faulted, Unavailable)
    )
}

/// V201 connector transitions.
pub fn v201_connector_allowed(from: &ConnectorStatusEnumType, to: &ConnectorStatusEnumType) -> bool {
    use ConnectorStatusEnumType::*;
    if from == to {
        return true;
    }
    match from {
        Available => matches!(to, Occupied | Reserved | Unavailable | Faulted),
        Occupied => matches!(to, Available | Unavailable | Faulted),
        Reserved => matches!(to, Available | Occupied | Unavailable | Faulted),
        Unavailable => matches!(to, Available | Occupied | Reserved | Faulted),
        Faulted => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ChargePointStatus as S;

    #[test]
    fn charging_cannot_jump_to_preparing() {
        assert!(!v16_connector_allowed(&S::Charging, &S::Preparing));
        assert!(v16_connector_allowed(&S::Preparing, &S::Charging));
    }

    #[test]
    fn faulted_and_unavailable_are_reachable_and_recoverable_everywhere() {
        for status in [
            S::Available,
            S::Preparing,
            S::Charging,
            S::SuspendedEV,
            S::SuspendedEVSE,
            S::Finishing,
            S::Reserved,
        ] {
            assert!(v16_connector_allowed(&status, &S::Faulted));
            assert!(v16_connector_allowed(&S::Faulted, &status));
            assert!(v16_connector_allowed(&status, &S::Unavailable));
            assert!(v16_connector_allowed(&S::Unavailable, &status));
        }
        assert!(v16_connector_allowed(&S::Unavailable, &S::Faulted));
        assert!(v16_connector_allowed(&S::Faulted, &S::Unavailable));
    }

    #[test]
    fn same_state_is_always_allowed() {
        assert!(v16_connector_allowed(&S::Charging, &S::Charging));
        assert!(v16_station_allowed(&S::Available, &S::Available));
        assert!(v201_connector_allowed(
            &ConnectorStatusEnumType::Occupied,
            &ConnectorStatusEnumType::Occupied
        ));
    }

    #[test]
    fn station_table_is_narrower_than_connector_table() {
        assert!(v16_station_allowed(&S::Available, &S::Unavailable));
        assert!(v16_station_allowed(&S::Faulted, &S::Available));
        assert!(!v16_station_allowed(&S::Available, &S::Charging));
        assert!(!v16_station_allowed(&S::Available, &S::Preparing));
    }

    #[test]
    fn v201_occupied_flows() {
        use ConnectorStatusEnumType::*;
        assert!(v201_connector_allowed(&Available, &Occupied));
        assert!(v201_connector_allowed(&Occupied, &Available));
        assert!(!v201_connector_allowed(&Occupied, &Reserved));
    }
}
