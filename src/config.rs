//! Station configuration.
//!
//! Configuration-file discovery and loading belong to the supervisor; the
//! engine only defines the TOML-decodable shape and a programmatic
//! constructor for tests and embedders.

use serde::Deserialize;

use crate::domain::version::OcppVersion;

/// Everything a simulated station needs to come up: identity, protocol
/// dialect, connector layout, behaviour flags and the initial OCPP
/// configuration-key table.
#[derive(Debug, Clone, Deserialize)]
pub struct StationConfig {
    /// Identity the station registers under (also the log prefix).
    pub station_id: String,
    pub vendor: String,
    pub model: String,
    #[serde(default)]
    pub serial_number: Option<String>,
    #[serde(default)]
    pub firmware_version: Option<String>,
    #[serde(default)]
    pub iccid: Option<String>,
    #[serde(default)]
    pub imsi: Option<String>,

    #[serde(default = "defaults::protocol")]
    pub protocol: OcppVersion,

    /// Number of connectors (V16) or single-connector EVSEs (V201).
    #[serde(default = "defaults::connector_count")]
    pub connector_count: u32,

    /// When set, commands outside the registration gate are refused and
    /// legacy quirks (V16 hard-reset without transaction teardown) are
    /// preserved.
    #[serde(default = "defaults::yes")]
    pub ocpp_strict_compliance: bool,

    /// Send an Authorize request during remote start when the token is not
    /// locally authorized.
    #[serde(default = "defaults::yes")]
    pub must_authorize_at_remote_start: bool,

    /// Divide available power across connectors with running transactions.
    #[serde(default)]
    pub power_shared_by_connectors: bool,

    /// Attach `transactionData` to StopTransaction and send the
    /// TransactionBegin meter value after StartTransaction.
    #[serde(default)]
    pub transaction_data_meter_values: bool,

    /// Send the transaction-end MeterValues after StopTransaction was
    /// already acknowledged (ignored under strict compliance).
    #[serde(default)]
    pub out_of_order_end_meter_values: bool,

    /// Tokens the station accepts without asking the CSMS.
    #[serde(default)]
    pub local_auth_list: Vec<String>,

    /// Vendor ids for which inbound DataTransfer is Accepted.
    #[serde(default)]
    pub data_transfer_vendor_ids: Vec<String>,

    /// Default timeout for outbound requests, seconds.
    #[serde(default = "defaults::command_timeout_secs")]
    pub command_timeout_secs: u64,

    #[serde(default)]
    pub firmware_upgrade: FirmwareUpgrade,

    /// Extra or overriding OCPP configuration keys; merged over the
    /// standard table.
    #[serde(default)]
    pub configuration_keys: Vec<ConfigurationKeyDef>,
}

/// Knobs for the UpdateFirmware simulation.
#[derive(Debug, Clone, Deserialize)]
pub struct FirmwareUpgrade {
    /// Simulate a failure at this step instead of completing.
    #[serde(default)]
    pub failure_status: Option<FirmwareFailure>,
    /// Reset the station once installation finishes.
    #[serde(default = "defaults::yes")]
    pub reset: bool,
    /// Bounds of the random per-step delay, seconds.
    #[serde(default = "defaults::firmware_min_delay")]
    pub min_delay_secs: u64,
    #[serde(default = "defaults::firmware_max_delay")]
    pub max_delay_secs: u64,
}

impl Default for FirmwareUpgrade {
    fn default() -> Self {
        Self {
            failure_status: None,
            reset: true,
            min_delay_secs: defaults::firmware_min_delay(),
            max_delay_secs: defaults::firmware_max_delay(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum FirmwareFailure {
    DownloadFailed,
    InstallationFailed,
}

/// One entry of the initial configuration-key table.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigurationKeyDef {
    pub key: String,
    pub value: String,
    #[serde(default)]
    pub readonly: bool,
    /// Hidden keys are omitted from GetConfiguration responses.
    #[serde(default = "defaults::yes")]
    pub visible: bool,
    /// ChangeConfiguration answers RebootRequired for this key.
    #[serde(default)]
    pub reboot: bool,
}

impl StationConfig {
    /// Decode a TOML document.
    pub fn from_toml_str(raw: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(raw)
    }

    /// Minimal programmatic config, used by tests and embedders.
    pub fn new(
        station_id: impl Into<String>,
        vendor: impl Into<String>,
        model: impl Into<String>,
        protocol: OcppVersion,
    ) -> Self {
        Self {
            station_id: station_id.into(),
            vendor: vendor.into(),
            model: model.into(),
            serial_number: None,
            firmware_version: None,
            iccid: None,
            imsi: None,
            protocol,
            connector_count: defaults::connector_count(),
            ocpp_strict_compliance: true,
            must_authorize_at_remote_start: true,
            power_shared_by_connectors: false,
            transaction_data_meter_values: false,
            out_of_order_end_meter_values: false,
            local_auth_list: Vec::new(),
            data_transfer_vendor_ids: Vec::new(),
            command_timeout_secs: defaults::command_timeout_secs(),
            firmware_upgrade: FirmwareUpgrade::default(),
            configuration_keys: Vec::new(),
        }
    }
}

mod defaults {
    use crate::domain::version::OcppVersion;

    pub fn protocol() -> OcppVersion {
        OcppVersion::V16
    }
    pub fn connector_count() -> u32 {
        2
    }
    pub fn yes() -> bool {
        true
    }
    pub fn command_timeout_secs() -> u64 {
        60
    }
    pub fn firmware_min_delay() -> u64 {
        2
    }
    pub fn firmware_max_delay() -> u64 {
        5
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_minimal_toml() {
        let cfg = StationConfig::from_toml_str(
            r#"
            station_id = "CS-01"
            vendor = "SimVendor"
            model = "SimModel"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.station_id, "CS-01");
        assert_eq!(cfg.protocol, OcppVersion::V16);
        assert_eq!(cfg.connector_count, 2);
        assert!(cfg.ocpp_strict_compliance);
        assert!(cfg.firmware_upgrade.reset);
    }

    #[test]
    fn decodes_full_toml() {
        let cfg = StationConfig::from_toml_str(
            r#"
            station_id = "CS-02"
            vendor = "SimVendor"
            model = "SimModel"
            protocol = "ocpp2.0.1"
            connector_count = 1
            ocpp_strict_compliance = false
            local_auth_list = ["TAG-1", "TAG-2"]
            data_transfer_vendor_ids = ["com.example"]

            [firmware_upgrade]
            failure_status = "DownloadFailed"
            reset = false

            [[configuration_keys]]
            key = "MeterValueSampleInterval"
            value = "30"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.protocol, OcppVersion::V201);
        assert_eq!(
            cfg.firmware_upgrade.failure_status,
            Some(FirmwareFailure::DownloadFailed)
        );
        assert!(!cfg.firmware_upgrade.reset);
        assert_eq!(cfg.configuration_keys.len(), 1);
    }
}
