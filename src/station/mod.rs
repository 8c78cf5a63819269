//! The `Station` aggregate — root actor of one simulated charge point.
//!
//! Owns the connectors, EVSEs, configuration store, authorization cache,
//! message router and background tasks. The inbound/outbound services hold
//! no state of their own; they receive a `&Arc<Station>` on every call.

pub mod tasks;

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, OnceLock, RwLock};
use std::time::Duration;

use dashmap::DashMap;
use rust_ocpp::v1_6::types::{DiagnosticsStatus, FirmwareStatus};
use rust_ocpp::v2_0_1::datatypes::report_data_type::ReportDataType;
use serde_json::Value;
use tracing::{info, warn};

use crate::config::StationConfig;
use crate::domain::configuration::{keys, ConfigurationStore, DEFAULT_HEARTBEAT_INTERVAL_SECS};
use crate::domain::connector::{ConnectorState, ConnectorStatusValue, StopReason, TransactionId};
use crate::domain::evse::EvseState;
use crate::domain::registration::RegistrationState;
use crate::domain::version::OcppVersion;
use crate::router::transport::Transport;
use crate::router::MessageRouter;
use crate::support::errors::OcppError;
use crate::support::ocpp_frame::{FrameError, OcppFrame};
use crate::v16::diagnostics::FtpClient;
use crate::v201::device_model::VariableManager;
use crate::{v16, v201};

fn shared_variable_manager() -> Arc<VariableManager> {
    static SHARED: OnceLock<Arc<VariableManager>> = OnceLock::new();
    SHARED.get_or_init(|| Arc::new(VariableManager::new())).clone()
}

pub struct Station {
    config: StationConfig,
    version: OcppVersion,
    registration: RwLock<RegistrationState>,
    connectors: DashMap<u32, ConnectorState>,
    evses: DashMap<u32, EvseState>,
    configuration: ConfigurationStore,
    /// Tokens the CSMS has authorized (or refused) for this station.
    authorized_tags: DashMap<String, bool>,
    /// Connectors currently drawing shared power.
    power_divider: AtomicU32,
    firmware_status: RwLock<Option<FirmwareStatus>>,
    diagnostics_status: RwLock<Option<DiagnosticsStatus>>,
    router: MessageRouter,
    tasks: tasks::TaskRegistry,
    variable_manager: Arc<VariableManager>,
    ftp_client: Option<Arc<dyn FtpClient>>,
    /// V201 GetBaseReport payloads awaiting NotifyReport emission.
    report_cache: DashMap<i32, Vec<ReportDataType>>,
}

impl Station {
    pub fn new(config: StationConfig, transport: Arc<dyn Transport>) -> Self {
        let version = config.protocol;
        let configuration = ConfigurationStore::standard(&config);
        let connectors = DashMap::new();
        let evses = DashMap::new();

        match version {
            OcppVersion::V16 => {
                // Connector 0 is the station itself.
                for id in 0..=config.connector_count {
                    connectors.insert(id, ConnectorState::new_v16());
                }
            }
            OcppVersion::V201 => {
                for id in 1..=config.connector_count {
                    connectors.insert(id, ConnectorState::new_v201());
                    evses.insert(id, EvseState::new(vec![id]));
                }
            }
        }

        let router = MessageRouter::new(
            config.station_id.clone(),
            transport,
            Duration::from_secs(config.command_timeout_secs),
        );

        Self {
            version,
            registration: RwLock::new(RegistrationState::Unknown),
            connectors,
            evses,
            configuration,
            authorized_tags: DashMap::new(),
            power_divider: AtomicU32::new(0),
            firmware_status: RwLock::new(None),
            diagnostics_status: RwLock::new(None),
            router,
            tasks: tasks::TaskRegistry::new(),
            variable_manager: shared_variable_manager(),
            ftp_client: None,
            report_cache: DashMap::new(),
            config,
        }
    }

    /// Inject an isolated device-model manager (tests, multi-tenant hosts).
    pub fn with_variable_manager(mut self, manager: Arc<VariableManager>) -> Self {
        self.variable_manager = manager;
        self
    }

    /// Attach the FTP collaborator used by GetDiagnostics.
    pub fn with_ftp_client(mut self, client: Arc<dyn FtpClient>) -> Self {
        self.ftp_client = Some(client);
        self
    }

    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    // ── Identity & predicates ──────────────────────────────

    pub fn id(&self) -> &str {
        &self.config.station_id
    }

    pub fn version(&self) -> OcppVersion {
        self.version
    }

    pub fn config(&self) -> &StationConfig {
        &self.config
    }

    pub fn configuration(&self) -> &ConfigurationStore {
        &self.configuration
    }

    pub fn router(&self) -> &MessageRouter {
        &self.router
    }

    pub fn tasks(&self) -> &tasks::TaskRegistry {
        &self.tasks
    }

    pub fn variable_manager(&self) -> &Arc<VariableManager> {
        &self.variable_manager
    }

    pub fn ftp_client(&self) -> Option<Arc<dyn FtpClient>> {
        self.ftp_client.clone()
    }

    pub fn report_cache(&self) -> &DashMap<i32, Vec<ReportDataType>> {
        &self.report_cache
    }

    pub fn registration(&self) -> RegistrationState {
        *self.registration.read().unwrap()
    }

    pub fn set_registration(&self, state: RegistrationState) {
        *self.registration.write().unwrap() = state;
    }

    pub fn is_registered(&self) -> bool {
        self.registration().is_accepted()
    }

    pub fn in_pending_state(&self) -> bool {
        self.registration().is_pending()
    }

    pub fn in_unknown_state(&self) -> bool {
        self.registration().is_unknown()
    }

    pub fn strict_compliance(&self) -> bool {
        self.config.ocpp_strict_compliance
    }

    // ── Connector access ───────────────────────────────────

    pub fn has_connector(&self, id: u32) -> bool {
        self.connectors.contains_key(&id)
    }

    /// Connector ids excluding the station pseudo-connector 0, ascending.
    pub fn connector_ids(&self) -> Vec<u32> {
        let mut ids: Vec<u32> = self
            .connectors
            .iter()
            .map(|e| *e.key())
            .filter(|id| *id != 0)
            .collect();
        ids.sort_unstable();
        ids
    }

    pub fn read_connector<R>(&self, id: u32, f: impl FnOnce(&ConnectorState) -> R) -> Option<R> {
        self.connectors.get(&id).map(|c| f(&c))
    }

    pub fn with_connector<R>(&self, id: u32, f: impl FnOnce(&mut ConnectorState) -> R) -> Option<R> {
        self.connectors.get_mut(&id).map(|mut c| f(&mut c))
    }

    pub fn connector_status(&self, id: u32) -> Option<ConnectorStatusValue> {
        self.read_connector(id, |c| c.status.clone())
    }

    // ── EVSEs (V201) ───────────────────────────────────────

    pub fn has_evse(&self, id: u32) -> bool {
        self.evses.contains_key(&id)
    }

    pub fn evse_ids(&self) -> Vec<u32> {
        let mut ids: Vec<u32> = self.evses.iter().map(|e| *e.key()).collect();
        ids.sort_unstable();
        ids
    }

    pub fn with_evse<R>(&self, id: u32, f: impl FnOnce(&mut EvseState) -> R) -> Option<R> {
        self.evses.get_mut(&id).map(|mut e| f(&mut e))
    }

    // ── Metering ───────────────────────────────────────────

    /// Feed energy from the (external) metering simulator.
    pub fn add_meter_energy(&self, connector_id: u32, wh: f64) {
        self.with_connector(connector_id, |c| {
            c.energy_active_import_register += wh;
            if c.has_active_transaction() {
                c.transaction_energy_active_import_register += wh;
            }
        });
    }

    // ── Transactions ───────────────────────────────────────

    pub fn active_transaction_count(&self) -> usize {
        self.connectors
            .iter()
            .filter(|c| c.has_active_transaction())
            .count()
    }

    pub fn connector_with_transaction(&self, transaction_id: &TransactionId) -> Option<u32> {
        self.connectors
            .iter()
            .find(|c| c.transaction_id.as_ref() == Some(transaction_id))
            .map(|c| *c.key())
    }

    /// Stop the transaction running on a connector, dialect-appropriately.
    /// Returns true when the CSMS accepted the stop.
    pub async fn stop_transaction_on_connector(
        self: &Arc<Self>,
        connector_id: u32,
        reason: StopReason,
    ) -> bool {
        match self.version {
            OcppVersion::V16 => {
                v16::outbound::stop_transaction::send(self, connector_id, reason)
                    .await
                    .unwrap_or(false)
            }
            OcppVersion::V201 => v201::transaction_event::send_ended(
                self,
                connector_id,
                reason,
                v201::transaction_event::context_for_stop(reason),
            )
            .await
            .is_ok(),
        }
    }

    // ── Power divider ──────────────────────────────────────

    pub fn power_divider(&self) -> u32 {
        self.power_divider.load(Ordering::SeqCst)
    }

    pub fn increment_power_divider(&self) {
        if self.config.power_shared_by_connectors {
            self.power_divider.fetch_add(1, Ordering::SeqCst);
        }
    }

    pub fn decrement_power_divider(&self) {
        if self.config.power_shared_by_connectors {
            let _ = self
                .power_divider
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |v| v.checked_sub(1));
        }
    }

    // ── Authorization ──────────────────────────────────────

    pub fn is_locally_authorized(&self, id_tag: &str) -> bool {
        self.local_auth_list_enabled()
            && self.config.local_auth_list.iter().any(|t| t == id_tag)
    }

    pub fn local_auth_list_enabled(&self) -> bool {
        self.configuration
            .bool_value(keys::LOCAL_AUTH_LIST_ENABLED)
            .unwrap_or(false)
    }

    pub fn authorize_remote_tx_requests(&self) -> bool {
        self.configuration
            .bool_value(keys::AUTHORIZE_REMOTE_TX_REQUESTS)
            .unwrap_or(false)
    }

    pub fn cache_authorized_tag(&self, id_tag: &str, accepted: bool) {
        self.authorized_tags.insert(id_tag.to_string(), accepted);
    }

    pub fn cached_tag_authorization(&self, id_tag: &str) -> Option<bool> {
        self.authorized_tags.get(id_tag).map(|v| *v)
    }

    pub fn clear_authorized_tags(&self) {
        self.authorized_tags.clear();
    }

    // ── Firmware status (V16 simulation) ───────────────────

    pub fn firmware_status(&self) -> Option<FirmwareStatus> {
        self.firmware_status.read().unwrap().clone()
    }

    pub fn set_firmware_status(&self, status: Option<FirmwareStatus>) {
        *self.firmware_status.write().unwrap() = status;
    }

    pub fn diagnostics_status(&self) -> Option<DiagnosticsStatus> {
        self.diagnostics_status.read().unwrap().clone()
    }

    pub fn set_diagnostics_status(&self, status: Option<DiagnosticsStatus>) {
        *self.diagnostics_status.write().unwrap() = status;
    }

    // ── Configuration helpers ──────────────────────────────

    pub fn heartbeat_interval_secs(&self) -> u64 {
        self.configuration
            .int_value(keys::HEARTBEAT_INTERVAL)
            .filter(|v| *v >= 0)
            .map(|v| v as u64)
            .unwrap_or(DEFAULT_HEARTBEAT_INTERVAL_SECS)
    }

    /// Store the heartbeat interval under both spellings of the key (the
    /// legacy V16 alias mirrors the canonical one in both directions) and
    /// restart the task.
    pub fn apply_heartbeat_interval(self: &Arc<Self>, seconds: i64) {
        let value = seconds.to_string();
        self.configuration.force_set(keys::HEARTBEAT_INTERVAL, &value);
        if self.version == OcppVersion::V16 {
            self.configuration
                .force_set(keys::HEARTBEAT_INTERVAL_LEGACY, &value);
        }
        tasks::restart_heartbeat(self);
    }

    // ── Lifecycle ──────────────────────────────────────────

    /// Transport (re)connected: replay buffered calls, run the boot
    /// sequence when not yet Accepted, flush queued V201 events.
    pub async fn on_connected(self: &Arc<Self>) {
        self.router.replay_buffered().await;
        tasks::restart_ws_ping(self);

        if !self.is_registered() {
            let result = match self.version {
                OcppVersion::V16 => v16::outbound::boot_notification::send(self).await.map(|_| ()),
                OcppVersion::V201 => v201::outbound::boot_notification::send(self).await.map(|_| ()),
            };
            if let Err(e) = result {
                warn!(station_id = self.id(), error = %e, "BootNotification failed");
            }
        }

        if self.version == OcppVersion::V201 {
            v201::transaction_event::send_queued_transaction_events(self).await;
        }
    }

    /// One inbound text frame from the transport.
    pub async fn on_frame(self: &Arc<Self>, text: &str) {
        match OcppFrame::parse(text) {
            Ok(OcppFrame::Call {
                unique_id,
                action,
                payload,
            }) => {
                let station = self.clone();
                // One task per inbound command in flight.
                tokio::spawn(async move {
                    station.handle_call(unique_id, action, payload).await;
                });
            }
            Ok(reply) => self.router.resolve_reply(&reply),
            Err(e) => {
                warn!(station_id = self.id(), error = %e, "Malformed frame");
                let message_id = FrameError::recovered_id(text).unwrap_or_default();
                self.router
                    .respond_error(&message_id, &OcppError::FormationViolation(e.to_string()))
                    .await;
            }
        }
    }

    async fn handle_call(self: Arc<Self>, message_id: String, action: String, payload: Value) {
        let result = match self.version {
            OcppVersion::V16 => {
                v16::inbound::handle_incoming(&self, &message_id, &action, &payload).await
            }
            OcppVersion::V201 => {
                v201::inbound::handle_incoming(&self, &message_id, &action, &payload).await
            }
        };
        match result {
            Ok(response) => {
                self.router.respond_result(&message_id, response).await;
                // Post-reply hook: peripheral emissions that must follow the
                // synchronous response (NotifyReport after GetBaseReport).
                if self.version == OcppVersion::V201 {
                    v201::inbound::post_reply(&self, &action).await;
                }
            }
            Err(error) => {
                warn!(
                    station_id = self.id(),
                    action = action.as_str(),
                    message_id = message_id.as_str(),
                    error = %error,
                    "Command failed"
                );
                self.router.respond_error(&message_id, &error).await;
            }
        }
    }

    /// Stop the station: cancel background work, fail pending requests,
    /// clear this station's device-model runtime overrides.
    pub fn stop(&self) {
        info!(station_id = self.id(), "Stopping station");
        self.tasks.stop_all();
        self.router.cancel_all();
        self.variable_manager.reset_runtime_overrides(self.id());
    }

    /// Simulated reboot: tear everything down, forget the registration and
    /// run the boot sequence again if the socket is still open.
    pub async fn reboot(self: &Arc<Self>, reason: &str) {
        info!(station_id = self.id(), reason, "Rebooting station");
        self.tasks.stop_all();
        self.router.cancel_all();
        self.set_registration(RegistrationState::Unknown);
        for entry in self.connectors.iter().map(|e| *e.key()).collect::<Vec<_>>() {
            self.with_connector(entry, |c| {
                c.clear_transaction();
                c.status = match self.version {
                    OcppVersion::V16 => {
                        ConnectorStatusValue::V16(rust_ocpp::v1_6::types::ChargePointStatus::Available)
                    }
                    OcppVersion::V201 => ConnectorStatusValue::V201(
                        rust_ocpp::v2_0_1::enumerations::connector_status_enum_type::ConnectorStatusEnumType::Available,
                    ),
                };
            });
        }
        self.set_firmware_status(None);
        if self.router.is_open() {
            // The caller is often one of the background jobs stop_all just
            // aborted; it dies at its next await point. The boot sequence
            // runs on a fresh task so the abort cannot take it down.
            let station = self.clone();
            tokio::spawn(async move {
                station.on_connected().await;
            });
        }
    }
}
