//! TriggerReason selection for TransactionEvent.
//!
//! A TransactionEvent can be provoked by several overlapping causes; the
//! context records which ones apply and `select` picks the reason with the
//! highest precedence: remote command > local authorization > cable action
//! > charging-state change > system event > meter value > limits >
//! abnormal condition, falling back to `Trigger`.

use rust_ocpp::v2_0_1::enumerations::trigger_reason_enum_type::TriggerReasonEnumType;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteCommand {
    RequestStart,
    RequestStop,
    Reset,
    TriggerMessage,
    UnlockConnector,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalAuthorization {
    Authorized,
    StopAuthorized,
    Deauthorized,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CableAction {
    Detected,
    PluggedIn,
    Unplugged,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemEvent {
    CommunicationLost,
    ConnectTimeout,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeterValueKind {
    Signed,
    Periodic,
    Clock,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TriggerContext {
    pub remote_command: Option<RemoteCommand>,
    pub local_authorization: Option<LocalAuthorization>,
    pub cable_action: Option<CableAction>,
    pub charging_state_changed: bool,
    pub system_event: Option<SystemEvent>,
    pub meter_value: Option<MeterValueKind>,
    pub energy_limit: bool,
    pub time_limit: bool,
    pub external_limit: bool,
    pub abnormal_condition: bool,
}

impl TriggerContext {
    pub fn remote(command: RemoteCommand) -> Self {
        Self {
            remote_command: Some(command),
            ..Default::default()
        }
    }

    pub fn meter(kind: MeterValueKind) -> Self {
        Self {
            meter_value: Some(kind),
            ..Default::default()
        }
    }

    pub fn cable(action: CableAction) -> Self {
        Self {
            cable_action: Some(action),
            ..Default::default()
        }
    }
}

pub fn select(ctx: &TriggerContext) -> TriggerReasonEnumType {
    if let Some(command) = ctx.remote_command {
        return match command {
            RemoteCommand::RequestStart => TriggerReasonEnumType::RemoteStart,
            RemoteCommand::RequestStop => TriggerReasonEnumType::RemoteStop,
            RemoteCommand::Reset => TriggerReasonEnumType::ResetCommand,
            RemoteCommand::TriggerMessage => TriggerReasonEnumType::Trigger,
            RemoteCommand::UnlockConnector => TriggerReasonEnumType::UnlockCommand,
        };
    }
    if let Some(auth) = ctx.local_authorization {
        return match auth {
            LocalAuthorization::Authorized => TriggerReasonEnumType::Authorized,
            LocalAuthorization::StopAuthorized => TriggerReasonEnumType::StopAuthorized,
            LocalAuthorization::Deauthorized => TriggerReasonEnumType::Deauthorized,
        };
    }
    if let Some(cable) = ctx.cable_action {
        return match cable {
            CableAction::Detected => TriggerReasonEnumType::EVDetected,
            CableAction::PluggedIn => TriggerReasonEnumType::CablePluggedIn,
            CableAction::Unplugged => TriggerReasonEnumType::EVDeparted,
        };
    }
    if ctx.charging_state_changed {
        return TriggerReasonEnumType::ChargingStateChanged;
    }
    if let Some(event) = ctx.system_event {
        return match event {
            SystemEvent::CommunicationLost => TriggerReasonEnumType::EVCommunicationLost,
            SystemEvent::ConnectTimeout => TriggerReasonEnumType::EVConnectTimeout,
        };
    }
    if let Some(kind) = ctx.meter_value {
        return match kind {
            MeterValueKind::Signed => TriggerReasonEnumType::SignedDataReceived,
            MeterValueKind::Periodic => TriggerReasonEnumType::MeterValuePeriodic,
            MeterValueKind::Clock => TriggerReasonEnumType::MeterValueClock,
        };
    }
    if ctx.energy_limit {
        return TriggerReasonEnumType::EnergyLimitReached;
    }
    if ctx.time_limit {
        return TriggerReasonEnumType::TimeLimitReached;
    }
    if ctx.external_limit {
        return TriggerReasonEnumType::ChargingRateChanged;
    }
    if ctx.abnormal_condition {
        return TriggerReasonEnumType::AbnormalCondition;
    }
    TriggerReasonEnumType::Trigger
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_command_wins_over_everything() {
        let ctx = TriggerContext {
            remote_command: Some(RemoteCommand::RequestStart),
            local_authorization: Some(LocalAuthorization::Authorized),
            meter_value: Some(MeterValueKind::Periodic),
            ..Default::default()
        };
        assert_eq!(select(&ctx), TriggerReasonEnumType::RemoteStart);
    }

    #[test]
    fn authorization_beats_cable_and_meter() {
        let ctx = TriggerContext {
            local_authorization: Some(LocalAuthorization::Deauthorized),
            cable_action: Some(CableAction::PluggedIn),
            meter_value: Some(MeterValueKind::Clock),
            ..Default::default()
        };
        assert_eq!(select(&ctx), TriggerReasonEnumType::Deauthorized);
    }

    #[test]
    fn meter_kinds_map_individually() {
        assert_eq!(
            select(&TriggerContext::meter(MeterValueKind::Signed)),
            TriggerReasonEnumType::SignedDataReceived
        );
        assert_eq!(
            select(&TriggerContext::meter(MeterValueKind::Periodic)),
            TriggerReasonEnumType::MeterValuePeriodic
        );
        assert_eq!(
            select(&TriggerContext::meter(MeterValueKind::Clock)),
            TriggerReasonEnumType::MeterValueClock
        );
    }

    #[test]
    fn empty_context_falls_back_to_trigger() {
        assert_eq!(select(&TriggerContext::default()), TriggerReasonEnumType::Trigger);
    }

    #[test]
    fn limits_and_abnormal_condition() {
        let ctx = TriggerContext {
            energy_limit: true,
            abnormal_condition: true,
            ..Default::default()
        };
        assert_eq!(select(&ctx), TriggerReasonEnumType::EnergyLimitReached);

        let ctx = TriggerContext {
            abnormal_condition: true,
            ..Default::default()
        };
        assert_eq!(select(&ctx), TriggerReasonEnumType::AbnormalCondition);
    }
}
