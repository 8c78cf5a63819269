//! Device model & variable manager (2.0.1).
//!
//! One process-wide registry maps `Component::Variable[::Instance]` keys to
//! their characteristics; per-station runtime values live in an override
//! store keyed by station id, cleared when the station stops. The manager
//! implements GetVariables/SetVariables semantics (including the
//! `ItemsPerMessage`/`BytesPerMessage` envelopes) and builds the
//! GetBaseReport payloads.

use std::sync::Arc;

use dashmap::DashMap;
use rust_ocpp::v2_0_1::datatypes::component_type::ComponentType;
use rust_ocpp::v2_0_1::datatypes::evse_type::EVSEType;
use rust_ocpp::v2_0_1::datatypes::get_variable_data_type::GetVariableDataType;
use rust_ocpp::v2_0_1::datatypes::get_variable_result_type::GetVariableResultType;
use rust_ocpp::v2_0_1::datatypes::report_data_type::ReportDataType;
use rust_ocpp::v2_0_1::datatypes::set_variable_data_type::SetVariableDataType;
use rust_ocpp::v2_0_1::datatypes::set_variable_result_type::SetVariableResultType;
use rust_ocpp::v2_0_1::datatypes::status_info_type::StatusInfoType;
use rust_ocpp::v2_0_1::datatypes::variable_attribute_type::VariableAttributeType;
use rust_ocpp::v2_0_1::datatypes::variable_characteristics_type::VariableCharacteristicsType;
use rust_ocpp::v2_0_1::datatypes::variable_type::VariableType;
use rust_ocpp::v2_0_1::enumerations::attribute_enum_type::AttributeEnumType;
use rust_ocpp::v2_0_1::enumerations::data_enum_type::DataEnumType;
use rust_ocpp::v2_0_1::enumerations::get_variable_status_enum_type::GetVariableStatusEnumType;
use rust_ocpp::v2_0_1::enumerations::mutability_enum_type::MutabilityEnumType;
use rust_ocpp::v2_0_1::enumerations::report_base_enum_type::ReportBaseEnumType;
use rust_ocpp::v2_0_1::enumerations::set_variable_status_enum_type::SetVariableStatusEnumType;
use tracing::debug;

use crate::domain::configuration::keys;
use crate::station::Station;

const REASON_TOO_MANY_ELEMENTS: &str = "TooManyElements";
const REASON_TOO_LARGE_ELEMENT: &str = "TooLargeElement";

/// Where a variable's Actual value comes from when no runtime override is
/// stored.
#[derive(Debug, Clone, Copy)]
pub enum ValueSource {
    /// Mirrors an OCPP configuration key.
    ConfigKey(&'static str),
    StationVendor,
    StationModel,
    StationSerial,
    StationFirmware,
    /// Live connector/station availability.
    AvailabilityState,
    Fixed(&'static str),
}

/// Registry entry: the static characteristics of one variable.
#[derive(Debug, Clone)]
pub struct RegisteredVariable {
    pub component: &'static str,
    pub variable: &'static str,
    pub instance: Option<&'static str>,
    pub data_type: DataEnumType,
    pub mutability: MutabilityEnumType,
    pub persistent: bool,
    pub supported_attributes: &'static [AttributeEnumType],
    pub max_length: Option<usize>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub values_list: Option<&'static str>,
    pub reboot_required: bool,
    pub unit: Option<&'static str>,
    pub source: ValueSource,
}

const ACTUAL_ONLY: &[AttributeEnumType] = &[AttributeEnumType::Actual];

fn standard_registry() -> Vec<RegisteredVariable> {
    let rw_int = |component, variable, key, unit| RegisteredVariable {
        component,
        variable,
        instance: None,
        data_type: DataEnumType::Integer,
        mutability: MutabilityEnumType::ReadWrite,
        persistent: true,
        supported_attributes: ACTUAL_ONLY,
        max_length: None,
        min: Some(0.0),
        max: None,
        values_list: None,
        reboot_required: false,
        unit,
        source: ValueSource::ConfigKey(key),
    };
    let identity = |variable, source| RegisteredVariable {
        component: "ChargingStation",
        variable,
        instance: None,
        data_type: DataEnumType::String,
        mutability: MutabilityEnumType::ReadOnly,
        persistent: true,
        supported_attributes: ACTUAL_ONLY,
        max_length: Some(50),
        min: None,
        max: None,
        values_list: None,
        reboot_required: false,
        unit: None,
        source,
    };

    vec![
        rw_int(
            "OCPPCommCtrlr",
            "HeartbeatInterval",
            keys::HEARTBEAT_INTERVAL,
            Some("s"),
        ),
        rw_int(
            "OCPPCommCtrlr",
            "WebSocketPingInterval",
            keys::WEB_SOCKET_PING_INTERVAL,
            Some("s"),
        ),
        RegisteredVariable {
            reboot_required: true,
            ..rw_int("OCPPCommCtrlr", "NetworkConfigurationPriority", keys::CONNECTION_TIMEOUT, None)
        },
        rw_int(
            "DeviceDataCtrlr",
            "ItemsPerMessage",
            keys::ITEMS_PER_MESSAGE,
            None,
        ),
        rw_int(
            "DeviceDataCtrlr",
            "BytesPerMessage",
            keys::BYTES_PER_MESSAGE,
            None,
        ),
        rw_int(
            "SampledDataCtrlr",
            "TxUpdatedInterval",
            keys::METER_VALUE_SAMPLE_INTERVAL,
            Some("s"),
        ),
        RegisteredVariable {
            component: "LocalAuthListCtrlr",
            variable: "Enabled",
            instance: None,
            data_type: DataEnumType::Boolean,
            mutability: MutabilityEnumType::ReadWrite,
            persistent: true,
            supported_attributes: ACTUAL_ONLY,
            max_length: None,
            min: None,
            max: None,
            values_list: Some("true,false"),
            reboot_required: false,
            unit: None,
            source: ValueSource::ConfigKey(keys::LOCAL_AUTH_LIST_ENABLED),
        },
        RegisteredVariable {
            component: "AuthCtrlr",
            variable: "AuthorizeRemoteStart",
            instance: None,
            data_type: DataEnumType::Boolean,
            mutability: MutabilityEnumType::ReadWrite,
            persistent: true,
            supported_attributes: ACTUAL_ONLY,
            max_length: None,
            min: None,
            max: None,
            values_list: Some("true,false"),
            reboot_required: false,
            unit: None,
            source: ValueSource::ConfigKey(keys::AUTHORIZE_REMOTE_TX_REQUESTS),
        },
        RegisteredVariable {
            component: "TxCtrlr",
            variable: "StopTxOnEVSideDisconnect",
            instance: None,
            data_type: DataEnumType::Boolean,
            mutability: MutabilityEnumType::ReadOnly,
            persistent: true,
            supported_attributes: ACTUAL_ONLY,
            max_length: None,
            min: None,
            max: None,
            values_list: None,
            reboot_required: false,
            unit: None,
            source: ValueSource::Fixed("true"),
        },
        identity("Model", ValueSource::StationModel),
        identity("VendorName", ValueSource::StationVendor),
        identity("SerialNumber", ValueSource::StationSerial),
        identity("FirmwareVersion", ValueSource::StationFirmware),
        RegisteredVariable {
            component: "ChargingStation",
            variable: "AvailabilityState",
            instance: None,
            data_type: DataEnumType::OptionList,
            mutability: MutabilityEnumType::ReadOnly,
            persistent: false,
            supported_attributes: ACTUAL_ONLY,
            max_length: None,
            min: None,
            max: None,
            values_list: Some("Available,Occupied,Reserved,Unavailable,Faulted"),
            reboot_required: false,
            unit: None,
            source: ValueSource::AvailabilityState,
        },
        RegisteredVariable {
            component: "Connector",
            variable: "ConnectorType",
            instance: None,
            data_type: DataEnumType::String,
            mutability: MutabilityEnumType::ReadOnly,
            persistent: true,
            supported_attributes: ACTUAL_ONLY,
            max_length: None,
            min: None,
            max: None,
            values_list: None,
            reboot_required: false,
            unit: None,
            source: ValueSource::Fixed("cType2"),
        },
    ]
}

/// Process-wide variable manager. Construct explicitly; tests inject an
/// isolated instance per station.
pub struct VariableManager {
    registry: Vec<RegisteredVariable>,
    /// (station id, composite key) → runtime value.
    overrides: DashMap<(String, String), String>,
}

impl Default for VariableManager {
    fn default() -> Self {
        Self::new()
    }
}

fn composite_key(component: &str, variable: &str, instance: Option<&str>) -> String {
    match instance {
        Some(instance) => format!("{component}::{variable}::{instance}"),
        None => format!("{component}::{variable}"),
    }
}

impl VariableManager {
    pub fn new() -> Self {
        Self {
            registry: standard_registry(),
            overrides: DashMap::new(),
        }
    }

    /// Drop every runtime override a station accumulated.
    pub fn reset_runtime_overrides(&self, station_id: &str) {
        self.overrides.retain(|(owner, _), _| owner != station_id);
    }

    fn component_known(&self, component: &str) -> bool {
        self.registry
            .iter()
            .any(|e| e.component == component || e.component.eq_ignore_ascii_case(component))
    }

    /// Exact lookup first, case-insensitive fallback second.
    fn lookup(
        &self,
        component: &str,
        variable: &str,
        instance: Option<&str>,
    ) -> Option<&RegisteredVariable> {
        self.registry
            .iter()
            .find(|e| {
                e.component == component && e.variable == variable && e.instance == instance
            })
            .or_else(|| {
                self.registry.iter().find(|e| {
                    e.component.eq_ignore_ascii_case(component)
                        && e.variable.eq_ignore_ascii_case(variable)
                        && match (e.instance, instance) {
                            (None, None) => true,
                            (Some(a), Some(b)) => a.eq_ignore_ascii_case(b),
                            _ => false,
                        }
                })
            })
    }

    fn resolve_value(
        &self,
        station: &Station,
        entry: &RegisteredVariable,
        evse_id: Option<i32>,
    ) -> Option<String> {
        let key = (
            station.id().to_string(),
            composite_key(entry.component, entry.variable, entry.instance),
        );
        if let Some(value) = self.overrides.get(&key) {
            return Some(value.clone());
        }
        match entry.source {
            ValueSource::ConfigKey(name) => station.configuration().value(name),
            ValueSource::StationVendor => Some(station.config().vendor.clone()),
            ValueSource::StationModel => Some(station.config().model.clone()),
            ValueSource::StationSerial => station.config().serial_number.clone(),
            ValueSource::StationFirmware => station.config().firmware_version.clone(),
            ValueSource::Fixed(value) => Some(value.to_string()),
            ValueSource::AvailabilityState => Some(availability_state(station, evse_id)),
        }
    }

    // ── GetVariables ───────────────────────────────────────

    pub fn get_variables(
        &self,
        station: &Station,
        data: &[GetVariableDataType],
        request_bytes: usize,
    ) -> Vec<GetVariableResultType> {
        if let Some(reason) = envelope_violation(station, data.len(), request_bytes) {
            return data.iter().map(|d| rejected_get(d, reason)).collect();
        }

        let results: Vec<GetVariableResultType> =
            data.iter().map(|d| self.get_one(station, d)).collect();

        // The response envelope is measured again after computation.
        if oversized_response(station, &results) {
            return data
                .iter()
                .map(|d| rejected_get(d, REASON_TOO_LARGE_ELEMENT))
                .collect();
        }
        results
    }

    fn get_one(&self, station: &Station, data: &GetVariableDataType) -> GetVariableResultType {
        let attribute_type = data
            .attribute_type
            .clone()
            .unwrap_or(AttributeEnumType::Actual);
        let base = GetVariableResultType {
            attribute_status: GetVariableStatusEnumType::Rejected,
            attribute_type: Some(attribute_type.clone()),
            attribute_value: None,
            component: data.component.clone(),
            variable: data.variable.clone(),
            attribute_status_info: None,
        };

        if !self.component_known(&data.component.name) {
            return GetVariableResultType {
                attribute_status: GetVariableStatusEnumType::UnknownComponent,
                ..base
            };
        }
        let Some(entry) = self.lookup(
            &data.component.name,
            &data.variable.name,
            data.variable.instance.as_deref(),
        ) else {
            return GetVariableResultType {
                attribute_status: GetVariableStatusEnumType::UnknownVariable,
                ..base
            };
        };
        if !entry.supported_attributes.contains(&attribute_type) {
            return GetVariableResultType {
                attribute_status: GetVariableStatusEnumType::NotSupportedAttributeType,
                ..base
            };
        }

        let evse_id = data.component.evse.as_ref().map(|e| e.id);
        GetVariableResultType {
            attribute_status: GetVariableStatusEnumType::Accepted,
            attribute_value: self.resolve_value(station, entry, evse_id),
            ..base
        }
    }

    // ── SetVariables ───────────────────────────────────────

    pub fn set_variables(
        &self,
        station: &Arc<Station>,
        data: &[SetVariableDataType],
        request_bytes: usize,
    ) -> Vec<SetVariableResultType> {
        if let Some(reason) = envelope_violation(station, data.len(), request_bytes) {
            return data.iter().map(|d| rejected_set(d, reason)).collect();
        }
        data.iter().map(|d| self.set_one(station, d)).collect()
    }

    fn set_one(&self, station: &Arc<Station>, data: &SetVariableDataType) -> SetVariableResultType {
        let attribute_type = data
            .attribute_type
            .clone()
            .unwrap_or(AttributeEnumType::Actual);
        let base = SetVariableResultType {
            attribute_type: Some(attribute_type.clone()),
            attribute_status: SetVariableStatusEnumType::Rejected,
            component: data.component.clone(),
            variable: data.variable.clone(),
            attribute_status_info: None,
        };

        if !self.component_known(&data.component.name) {
            return SetVariableResultType {
                attribute_status: SetVariableStatusEnumType::UnknownComponent,
                ..base
            };
        }
        let Some(entry) = self.lookup(
            &data.component.name,
            &data.variable.name,
            data.variable.instance.as_deref(),
        ) else {
            return SetVariableResultType {
                attribute_status: SetVariableStatusEnumType::UnknownVariable,
                ..base
            };
        };
        if !entry.supported_attributes.contains(&attribute_type) {
            return SetVariableResultType {
                attribute_status: SetVariableStatusEnumType::NotSupportedAttributeType,
                ..base
            };
        }
        if entry.mutability == MutabilityEnumType::ReadOnly {
            return SetVariableResultType {
                attribute_status_info: Some(status_info("ReadOnly")),
                ..base
            };
        }
        if let Some(reason) = constraint_violation(entry, &data.attribute_value) {
            return SetVariableResultType {
                attribute_status_info: Some(status_info(reason)),
                ..base
            };
        }

        self.overrides.insert(
            (
                station.id().to_string(),
                composite_key(entry.component, entry.variable, entry.instance),
            ),
            data.attribute_value.clone(),
        );
        self.apply_mirror(station, entry, &data.attribute_value);

        debug!(
            station_id = station.id(),
            component = entry.component,
            variable = entry.variable,
            value = data.attribute_value.as_str(),
            "Variable written"
        );
        SetVariableResultType {
            attribute_status: if entry.reboot_required {
                SetVariableStatusEnumType::RebootRequired
            } else {
                SetVariableStatusEnumType::Accepted
            },
            ..base
        }
    }

    /// Keep the configuration store and its dependent tasks in step with a
    /// variable write.
    fn apply_mirror(&self, station: &Arc<Station>, entry: &RegisteredVariable, value: &str) {
        let ValueSource::ConfigKey(key) = entry.source else {
            return;
        };
        if key == keys::HEARTBEAT_INTERVAL {
            if let Ok(seconds) = value.trim().parse::<i64>() {
                station.apply_heartbeat_interval(seconds);
            }
        } else {
            station.configuration().force_set(key, value);
            if key == keys::WEB_SOCKET_PING_INTERVAL {
                crate::station::tasks::restart_ws_ping(station);
            }
        }
    }

    // ── Reports ────────────────────────────────────────────

    /// Build report data for a GetBaseReport, deterministically ordered:
    /// identity, configuration keys, registry variables, EVSE entries.
    pub fn build_report(&self, station: &Station, base: &ReportBaseEnumType) -> Vec<ReportDataType> {
        let mut report = Vec::new();
        match base {
            ReportBaseEnumType::ConfigurationInventory => {
                report.extend(self.configuration_entries(station));
            }
            ReportBaseEnumType::SummaryInventory => {
                report.extend(self.identity_entries(station));
                report.extend(self.availability_entries(station));
            }
            ReportBaseEnumType::FullInventory => {
                report.extend(self.identity_entries(station));
                report.extend(self.configuration_entries(station));
                report.extend(self.registry_entries(station));
                report.extend(self.availability_entries(station));
            }
        }
        report
    }

    fn identity_entries(&self, station: &Station) -> Vec<ReportDataType> {
        ["Model", "VendorName", "SerialNumber", "FirmwareVersion"]
            .iter()
            .filter_map(|name| {
                let entry = self.lookup("ChargingStation", name, None)?;
                let value = self.resolve_value(station, entry, None)?;
                Some(report_entry(entry, None, Some(value)))
            })
            .collect()
    }

    fn configuration_entries(&self, station: &Station) -> Vec<ReportDataType> {
        station
            .configuration()
            .visible()
            .into_iter()
            .map(|key| ReportDataType {
                component: ComponentType {
                    name: "OCPPCommCtrlr".to_string(),
                    instance: None,
                    evse: None,
                },
                variable: VariableType {
                    name: key.key.clone(),
                    instance: None,
                },
                variable_attribute: vec![VariableAttributeType {
                    kind: Some(AttributeEnumType::Actual),
                    value: Some(key.value.clone()),
                    mutability: Some(if key.readonly {
                        MutabilityEnumType::ReadOnly
                    } else {
                        MutabilityEnumType::ReadWrite
                    }),
                    persistent: Some(true),
                    constant: Some(false),
                }],
                variable_characteristics: Some(VariableCharacteristicsType {
                    unit: None,
                    data_type: DataEnumType::String,
                    min_limit: None,
                    max_limit: None,
                    values_list: None,
                    supports_monitoring: false,
                }),
            })
            .collect()
    }

    fn registry_entries(&self, station: &Station) -> Vec<ReportDataType> {
        self.registry
            .iter()
            .map(|entry| {
                let value = self.resolve_value(station, entry, None);
                report_entry(entry, None, value)
            })
            .collect()
    }

    fn availability_entries(&self, station: &Station) -> Vec<ReportDataType> {
        let Some(entry) = self.lookup("ChargingStation", "AvailabilityState", None) else {
            return Vec::new();
        };
        station
            .evse_ids()
            .into_iter()
            .map(|evse_id| {
                let value = availability_state(station, Some(evse_id as i32));
                report_entry(entry, Some(evse_id as i32), Some(value))
            })
            .collect()
    }
}

fn availability_state(station: &Station, evse_id: Option<i32>) -> String {
    match evse_id {
        Some(id) if id > 0 => station
            .connector_status(id as u32)
            .and_then(|s| s.as_v201().map(|v| format!("{v:?}")))
            .unwrap_or_else(|| "Unavailable".to_string()),
        _ => {
            let any_operative = station
                .connector_ids()
                .into_iter()
                .any(|id| station.read_connector(id, |c| c.is_operative()).unwrap_or(false));
            if any_operative { "Available" } else { "Unavailable" }.to_string()
        }
    }
}

fn report_entry(
    entry: &RegisteredVariable,
    evse_id: Option<i32>,
    value: Option<String>,
) -> ReportDataType {
    ReportDataType {
        component: ComponentType {
            name: entry.component.to_string(),
            instance: None,
            evse: evse_id.map(|id| EVSEType {
                id,
                connector_id: Some(1),
            }),
        },
        variable: VariableType {
            name: entry.variable.to_string(),
            instance: entry.instance.map(str::to_owned),
        },
        variable_attribute: vec![VariableAttributeType {
            kind: Some(AttributeEnumType::Actual),
            value,
            mutability: Some(entry.mutability.clone()),
            persistent: Some(entry.persistent),
            constant: Some(false),
        }],
        variable_characteristics: Some(VariableCharacteristicsType {
            unit: entry.unit.map(str::to_owned),
            data_type: entry.data_type.clone(),
            min_limit: None,
            max_limit: None,
            values_list: entry.values_list.map(str::to_owned),
            supports_monitoring: false,
        }),
    }
}

/// Value checks derived from the characteristics: length, numeric range,
/// membership of the values list.
fn constraint_violation(entry: &RegisteredVariable, value: &str) -> Option<&'static str> {
    if let Some(max_length) = entry.max_length {
        if value.len() > max_length {
            return Some("ValueTooLong");
        }
    }
    if matches!(entry.data_type, DataEnumType::Integer | DataEnumType::Decimal) {
        let Ok(parsed) = value.trim().parse::<f64>() else {
            return Some("InvalidValue");
        };
        if entry.min.map(|min| parsed < min).unwrap_or(false)
            || entry.max.map(|max| parsed > max).unwrap_or(false)
        {
            return Some("OutOfRange");
        }
    }
    if let Some(list) = entry.values_list {
        if !list.split(',').any(|allowed| allowed.trim() == value) {
            return Some("InvalidValue");
        }
    }
    None
}

fn status_info(reason: &str) -> StatusInfoType {
    StatusInfoType {
        reason_code: reason.to_string(),
        additional_info: None,
    }
}

/// Check the incoming envelope against `ItemsPerMessage`/`BytesPerMessage`.
fn envelope_violation(station: &Station, items: usize, request_bytes: usize) -> Option<&'static str> {
    let items_limit = station
        .configuration()
        .int_value(keys::ITEMS_PER_MESSAGE)
        .filter(|l| *l > 0);
    if let Some(limit) = items_limit {
        if items as i64 > limit {
            return Some(REASON_TOO_MANY_ELEMENTS);
        }
    }
    let bytes_limit = station
        .configuration()
        .int_value(keys::BYTES_PER_MESSAGE)
        .filter(|l| *l > 0);
    if let Some(limit) = bytes_limit {
        if request_bytes as i64 > limit {
            return Some(REASON_TOO_LARGE_ELEMENT);
        }
    }
    None
}

fn oversized_response(station: &Station, results: &[GetVariableResultType]) -> bool {
    let Some(limit) = station
        .configuration()
        .int_value(keys::BYTES_PER_MESSAGE)
        .filter(|l| *l > 0)
    else {
        return false;
    };
    let size = serde_json::to_vec(results).map(|v| v.len()).unwrap_or(0);
    size as i64 > limit
}

fn rejected_get(data: &GetVariableDataType, reason: &str) -> GetVariableResultType {
    GetVariableResultType {
        attribute_status: GetVariableStatusEnumType::Rejected,
        attribute_type: data.attribute_type.clone(),
        attribute_value: None,
        component: data.component.clone(),
        variable: data.variable.clone(),
        attribute_status_info: Some(status_info(reason)),
    }
}

fn rejected_set(data: &SetVariableDataType, reason: &str) -> SetVariableResultType {
    SetVariableResultType {
        attribute_type: data.attribute_type.clone(),
        attribute_status: SetVariableStatusEnumType::Rejected,
        component: data.component.clone(),
        variable: data.variable.clone(),
        attribute_status_info: Some(status_info(reason)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StationConfig;
    use crate::domain::version::OcppVersion;
    use crate::router::transport::InMemoryTransport;

    fn station() -> Arc<Station> {
        let config = StationConfig::new("CS-DM", "SimVendor", "SimModel", OcppVersion::V201);
        Station::new(config, Arc::new(InMemoryTransport::new()))
            .with_variable_manager(Arc::new(VariableManager::new()))
            .shared()
    }

    fn get_request(entries: &[(&str, &str)]) -> Vec<GetVariableDataType> {
        entries
            .iter()
            .map(|(component, variable)| GetVariableDataType {
                attribute_type: None,
                component: ComponentType {
                    name: component.to_string(),
                    instance: None,
                    evse: None,
                },
                variable: VariableType {
                    name: variable.to_string(),
                    instance: None,
                },
            })
            .collect()
    }

    fn set_request(entries: &[(&str, &str, &str)]) -> Vec<SetVariableDataType> {
        entries
            .iter()
            .map(|(component, variable, value)| SetVariableDataType {
                attribute_type: None,
                attribute_value: value.to_string(),
                component: ComponentType {
                    name: component.to_string(),
                    instance: None,
                    evse: None,
                },
                variable: VariableType {
                    name: variable.to_string(),
                    instance: None,
                },
            })
            .collect()
    }

    #[tokio::test]
    async fn set_then_get_round_trips() {
        let station = station();
        let manager = station.variable_manager().clone();

        let set = manager.set_variables(
            &station,
            &set_request(&[("SampledDataCtrlr", "TxUpdatedInterval", "30")]),
            128,
        );
        assert_eq!(set[0].attribute_status, SetVariableStatusEnumType::Accepted);

        let get = manager.get_variables(
            &station,
            &get_request(&[("SampledDataCtrlr", "TxUpdatedInterval")]),
            128,
        );
        assert_eq!(get[0].attribute_status, GetVariableStatusEnumType::Accepted);
        assert_eq!(get[0].attribute_value.as_deref(), Some("30"));
    }

    #[tokio::test]
    async fn readonly_variables_reject_writes() {
        let station = station();
        let manager = station.variable_manager().clone();

        let set = manager.set_variables(
            &station,
            &set_request(&[("ChargingStation", "Model", "Evil")]),
            128,
        );
        assert_eq!(set[0].attribute_status, SetVariableStatusEnumType::Rejected);

        let get = manager.get_variables(&station, &get_request(&[("ChargingStation", "Model")]), 64);
        assert_eq!(get[0].attribute_value.as_deref(), Some("SimModel"));
    }

    #[tokio::test]
    async fn unknown_component_and_variable_are_distinguished() {
        let station = station();
        let manager = station.variable_manager().clone();

        let get = manager.get_variables(
            &station,
            &get_request(&[("NoSuchCtrlr", "Enabled"), ("OCPPCommCtrlr", "NoSuchVar")]),
            128,
        );
        assert_eq!(
            get[0].attribute_status,
            GetVariableStatusEnumType::UnknownComponent
        );
        assert_eq!(
            get[1].attribute_status,
            GetVariableStatusEnumType::UnknownVariable
        );
    }

    #[tokio::test]
    async fn lookup_falls_back_to_case_insensitive() {
        let station = station();
        let manager = station.variable_manager().clone();
        let get = manager.get_variables(
            &station,
            &get_request(&[("ocppcommctrlr", "heartbeatinterval")]),
            128,
        );
        assert_eq!(get[0].attribute_status, GetVariableStatusEnumType::Accepted);
    }

    #[tokio::test]
    async fn items_per_message_boundary() {
        let station = station();
        let manager = station.variable_manager().clone();
        station.configuration().force_set(keys::ITEMS_PER_MESSAGE, "2");

        let within = manager.get_variables(
            &station,
            &get_request(&[
                ("OCPPCommCtrlr", "HeartbeatInterval"),
                ("OCPPCommCtrlr", "WebSocketPingInterval"),
            ]),
            256,
        );
        assert!(within
            .iter()
            .all(|r| r.attribute_status == GetVariableStatusEnumType::Accepted));

        let over = manager.get_variables(
            &station,
            &get_request(&[
                ("OCPPCommCtrlr", "HeartbeatInterval"),
                ("OCPPCommCtrlr", "WebSocketPingInterval"),
                ("ChargingStation", "Model"),
            ]),
            256,
        );
        assert_eq!(over.len(), 3);
        for result in &over {
            assert_eq!(result.attribute_status, GetVariableStatusEnumType::Rejected);
            assert_eq!(
                result.attribute_status_info.as_ref().unwrap().reason_code,
                REASON_TOO_MANY_ELEMENTS
            );
        }
    }

    #[tokio::test]
    async fn bytes_per_message_rechecked_after_computation() {
        let station = station();
        let manager = station.variable_manager().clone();
        station.configuration().force_set(keys::BYTES_PER_MESSAGE, "40");

        let results = manager.get_variables(
            &station,
            &get_request(&[("OCPPCommCtrlr", "HeartbeatInterval")]),
            // The request itself fits, the computed response cannot.
            10,
        );
        assert_eq!(results[0].attribute_status, GetVariableStatusEnumType::Rejected);
        assert_eq!(
            results[0].attribute_status_info.as_ref().unwrap().reason_code,
            REASON_TOO_LARGE_ELEMENT
        );
    }

    #[tokio::test]
    async fn overrides_are_cleared_per_station() {
        let station = station();
        let manager = station.variable_manager().clone();

        manager.set_variables(
            &station,
            &set_request(&[("SampledDataCtrlr", "TxUpdatedInterval", "15")]),
            128,
        );
        assert!(!manager.overrides.is_empty());

        manager.reset_runtime_overrides(station.id());
        assert!(manager.overrides.is_empty());

        // The configuration-store mirror survives the override teardown.
        let get = manager.get_variables(
            &station,
            &get_request(&[("SampledDataCtrlr", "TxUpdatedInterval")]),
            128,
        );
        assert_eq!(get[0].attribute_value.as_deref(), Some("15"));
    }

    #[tokio::test]
    async fn full_inventory_report_covers_everything() {
        let station = station();
        let manager = station.variable_manager().clone();

        let report = manager.build_report(&station, &ReportBaseEnumType::FullInventory);
        let identity = 2; // serial/firmware unset in this config
        let config_keys = station.configuration().visible().len();
        let registry = manager.registry.len();
        let evses = station.evse_ids().len();
        assert_eq!(report.len(), identity + config_keys + registry + evses);

        let summary = manager.build_report(&station, &ReportBaseEnumType::SummaryInventory);
        assert_eq!(summary.len(), identity + evses);

        let config_only =
            manager.build_report(&station, &ReportBaseEnumType::ConfigurationInventory);
        assert_eq!(config_only.len(), config_keys);
    }
}
