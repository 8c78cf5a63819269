//! OCPP configuration-key store.
//!
//! An ordered, case-preserving table of `{key, value, readonly, visible,
//! reboot}` entries. Lookups try an exact match first and fall back to a
//! case-insensitive one, so `heartbeatinterval` resolves to the stored
//! `HeartbeatInterval` entry without losing its original spelling.

use std::sync::RwLock;

use crate::config::StationConfig;
use crate::domain::version::OcppVersion;

/// Well-known key names.
pub mod keys {
    pub const HEARTBEAT_INTERVAL: &str = "HeartbeatInterval";
    /// Legacy 1.6 alias; mirrored with [`HEARTBEAT_INTERVAL`] both ways.
    pub const HEARTBEAT_INTERVAL_LEGACY: &str = "HeartBeatInterval";
    pub const WEB_SOCKET_PING_INTERVAL: &str = "WebSocketPingInterval";
    pub const METER_VALUE_SAMPLE_INTERVAL: &str = "MeterValueSampleInterval";
    pub const METER_VALUES_SAMPLED_DATA: &str = "MeterValuesSampledData";
    pub const AUTHORIZE_REMOTE_TX_REQUESTS: &str = "AuthorizeRemoteTxRequests";
    pub const LOCAL_AUTH_LIST_ENABLED: &str = "LocalAuthListEnabled";
    pub const NUMBER_OF_CONNECTORS: &str = "NumberOfConnectors";
    pub const CONNECTION_TIMEOUT: &str = "ConnectionTimeOut";
    pub const SUPPORTED_FEATURE_PROFILES: &str = "SupportedFeatureProfiles";
    pub const CHARGE_PROFILE_MAX_STACK_LEVEL: &str = "ChargeProfileMaxStackLevel";
    /// V201 `OCPPCommCtrlr` request-size limits, consumed by the device model.
    pub const ITEMS_PER_MESSAGE: &str = "ItemsPerMessage";
    pub const BYTES_PER_MESSAGE: &str = "BytesPerMessage";
}

pub const DEFAULT_HEARTBEAT_INTERVAL_SECS: u64 = 300;
pub const DEFAULT_METER_VALUE_SAMPLE_INTERVAL_SECS: u64 = 60;

#[derive(Debug, Clone)]
pub struct ConfigurationKey {
    pub key: String,
    pub value: String,
    pub readonly: bool,
    pub visible: bool,
    pub reboot_required: bool,
}

impl ConfigurationKey {
    pub fn writable(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            readonly: false,
            visible: true,
            reboot_required: false,
        }
    }

    pub fn readonly(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            readonly: true,
            ..Self::writable(key, value)
        }
    }
}

/// Outcome of a write attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetKeyOutcome {
    /// No such key.
    Unknown,
    /// Key exists but is read-only; the stored value is untouched.
    ReadOnly,
    /// New value equals the stored one (string-wise); nothing changed.
    Unchanged,
    Changed {
        reboot_required: bool,
    },
}

#[derive(Debug, Default)]
pub struct ConfigurationStore {
    entries: RwLock<Vec<ConfigurationKey>>,
}

impl ConfigurationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the standard key table for the station's dialect, then apply
    /// the config-file overrides in order.
    pub fn standard(config: &StationConfig) -> Self {
        let store = Self::new();
        let heartbeat = DEFAULT_HEARTBEAT_INTERVAL_SECS.to_string();
        let sample = DEFAULT_METER_VALUE_SAMPLE_INTERVAL_SECS.to_string();

        store.upsert(ConfigurationKey::writable(keys::HEARTBEAT_INTERVAL, &heartbeat));
        if config.protocol == OcppVersion::V16 {
            store.upsert(ConfigurationKey::writable(
                keys::HEARTBEAT_INTERVAL_LEGACY,
                &heartbeat,
            ));
        }
        store.upsert(ConfigurationKey::writable(keys::WEB_SOCKET_PING_INTERVAL, "60"));
        store.upsert(ConfigurationKey::writable(
            keys::METER_VALUE_SAMPLE_INTERVAL,
            &sample,
        ));
        store.upsert(ConfigurationKey::writable(
            keys::METER_VALUES_SAMPLED_DATA,
            "Energy.Active.Import.Register",
        ));
        store.upsert(ConfigurationKey::writable(
            keys::AUTHORIZE_REMOTE_TX_REQUESTS,
            "true",
        ));
        store.upsert(ConfigurationKey::writable(
            keys::LOCAL_AUTH_LIST_ENABLED,
            if config.local_auth_list.is_empty() {
                "false"
            } else {
                "true"
            },
        ));
        store.upsert(ConfigurationKey::readonly(
            keys::NUMBER_OF_CONNECTORS,
            config.connector_count.to_string(),
        ));
        store.upsert(ConfigurationKey::writable(keys::CONNECTION_TIMEOUT, "120"));
        store.upsert(ConfigurationKey::readonly(
            keys::SUPPORTED_FEATURE_PROFILES,
            "Core,FirmwareManagement,SmartCharging,RemoteTrigger,Reservation",
        ));
        store.upsert(ConfigurationKey::readonly(
            keys::CHARGE_PROFILE_MAX_STACK_LEVEL,
            "9",
        ));
        if config.protocol == OcppVersion::V201 {
            store.upsert(ConfigurationKey::writable(keys::ITEMS_PER_MESSAGE, "32"));
            store.upsert(ConfigurationKey::writable(keys::BYTES_PER_MESSAGE, "65536"));
        }

        for def in &config.configuration_keys {
            store.upsert(ConfigurationKey {
                key: def.key.clone(),
                value: def.value.clone(),
                readonly: def.readonly,
                visible: def.visible,
                reboot_required: def.reboot,
            });
        }
        store
    }

    /// Insert or replace, preserving first-insertion order.
    pub fn upsert(&self, key: ConfigurationKey) {
        let mut entries = self.entries.write().unwrap();
        match entries.iter_mut().find(|e| e.key == key.key) {
            Some(existing) => *existing = key,
            None => entries.push(key),
        }
    }

    pub fn get(&self, name: &str) -> Option<ConfigurationKey> {
        let entries = self.entries.read().unwrap();
        entries
            .iter()
            .find(|e| e.key == name)
            .or_else(|| entries.iter().find(|e| e.key.eq_ignore_ascii_case(name)))
            .cloned()
    }

    pub fn value(&self, name: &str) -> Option<String> {
        self.get(name).map(|e| e.value)
    }

    pub fn int_value(&self, name: &str) -> Option<i64> {
        self.value(name)?.trim().parse().ok()
    }

    pub fn bool_value(&self, name: &str) -> Option<bool> {
        self.value(name)?.trim().parse().ok()
    }

    /// Every visible key, in insertion order.
    pub fn visible(&self) -> Vec<ConfigurationKey> {
        self.entries
            .read()
            .unwrap()
            .iter()
            .filter(|e| e.visible)
            .cloned()
            .collect()
    }

    /// Resolve a requested key list. Hidden keys are silently omitted;
    /// unknown names are returned separately, as requested.
    pub fn select(&self, names: &[String]) -> (Vec<ConfigurationKey>, Vec<String>) {
        let mut found = Vec::new();
        let mut unknown = Vec::new();
        for name in names {
            match self.get(name) {
                Some(entry) if entry.visible => found.push(entry),
                Some(_) => {}
                None => unknown.push(name.clone()),
            }
        }
        (found, unknown)
    }

    /// Attempt a write. Equality is string-wise; an equal value reports
    /// `Unchanged` so callers skip their side effects.
    pub fn set_value(&self, name: &str, value: &str) -> SetKeyOutcome {
        let mut entries = self.entries.write().unwrap();
        eprintln!("DEBUG set_value name={:?} value={:?} entries_before={:?}", name, value, entries.iter().map(|e| (e.key.clone(), e.value.clone())).collect::<Vec<_>>());
        let entry = entries
            .iter_mut()
            .find(|e| e.key == name || e.key.eq_ignore_ascii_case(name));
        match entry {
            None => SetKeyOutcome::Unknown,
            Some(e) if e.readonly => SetKeyOutcome::ReadOnly,
            Some(e) if e.value == value => SetKeyOutcome::Unchanged,
            Some(e) => {
                e.value = value.to_string();
                eprintln!("DEBUG set_value changed key={:?} new_value={:?}", e.key, e.value);
                SetKeyOutcome::Changed {
                    reboot_required: e.reboot_required,
                }
            }
        }
    }

    /// Write bypassing the readonly flag, creating the key when absent.
    /// Used when the CSMS dictates a value (BootNotification interval).
    pub fn force_set(&self, name: &str, value: &str) {
        let mut entries = self.entries.write().unwrap();
        match entries
            .iter_mut()
            .find(|e| e.key == name || e.key.eq_ignore_ascii_case(name))
        {
            Some(e) => e.value = value.to_string(),
            None => entries.push(ConfigurationKey::writable(name, value)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> ConfigurationStore {
        let s = ConfigurationStore::new();
        s.upsert(ConfigurationKey::writable("HeartbeatInterval", "300"));
        s.upsert(ConfigurationKey::readonly("NumberOfConnectors", "2"));
        s.upsert(ConfigurationKey {
            visible: false,
            ..ConfigurationKey::writable("AuthorizationKey", "secret")
        });
        s
    }

    #[test]
    fn lookup_is_exact_then_case_insensitive() {
        let s = store();
        assert_eq!(s.value("HeartbeatInterval").as_deref(), Some("300"));
        assert_eq!(s.value("heartbeatinterval").as_deref(), Some("300"));
        assert!(s.value("NoSuchKey").is_none());
    }

    #[test]
    fn readonly_keys_refuse_writes() {
        let s = store();
        assert_eq!(s.set_value("NumberOfConnectors", "4"), SetKeyOutcome::ReadOnly);
        assert_eq!(s.value("NumberOfConnectors").as_deref(), Some("2"));
    }

    #[test]
    fn equal_value_write_reports_unchanged() {
        let s = store();
        assert_eq!(s.set_value("HeartbeatInterval", "300"), SetKeyOutcome::Unchanged);
        assert_eq!(
            s.set_value("HeartbeatInterval", "45"),
            SetKeyOutcome::Changed {
                reboot_required: false
            }
        );
        assert_eq!(s.value("HeartbeatInterval").as_deref(), Some("45"));
    }

    #[test]
    fn hidden_keys_never_leave_the_store() {
        let s = store();
        assert!(s.visible().iter().all(|e| e.key != "AuthorizationKey"));

        let (found, unknown) =
            s.select(&["AuthorizationKey".to_string(), "Missing".to_string()]);
        assert!(found.is_empty());
        assert_eq!(unknown, vec!["Missing".to_string()]);
    }

    #[test]
    fn select_preserves_original_case() {
        let s = store();
        let (found, _) = s.select(&["HEARTBEATINTERVAL".to_string()]);
        assert_eq!(found[0].key, "HeartbeatInterval");
    }
}
