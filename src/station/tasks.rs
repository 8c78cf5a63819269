//! Background tasks bound to a station's lifetime.
//!
//! Heartbeat, WebSocket keep-alive and per-transaction meter values are
//! restartable named slots; everything else (firmware simulation, idle
//! reset monitors, deferred trigger messages) lands in the background list.
//! All handles are aborted on station stop.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use dashmap::DashMap;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::domain::configuration::{keys, DEFAULT_METER_VALUE_SAMPLE_INTERVAL_SECS};
use crate::domain::version::OcppVersion;
use crate::station::Station;
use crate::{v16, v201};

#[derive(Default)]
pub struct TaskRegistry {
    heartbeat: Mutex<Option<JoinHandle<()>>>,
    ws_ping: Mutex<Option<JoinHandle<()>>>,
    meter_values: DashMap<u32, JoinHandle<()>>,
    background: Mutex<Vec<JoinHandle<()>>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn replace_heartbeat(&self, handle: Option<JoinHandle<()>>) {
        let mut slot = self.heartbeat.lock().unwrap();
        if let Some(old) = slot.take() {
            old.abort();
        }
        *slot = handle;
    }

    fn replace_ws_ping(&self, handle: Option<JoinHandle<()>>) {
        let mut slot = self.ws_ping.lock().unwrap();
        if let Some(old) = slot.take() {
            old.abort();
        }
        *slot = handle;
    }

    pub fn heartbeat_running(&self) -> bool {
        self.heartbeat
            .lock()
            .unwrap()
            .as_ref()
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }

    pub fn meter_values_running(&self, connector_id: u32) -> bool {
        self.meter_values
            .get(&connector_id)
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }

    pub fn stop_meter_values(&self, connector_id: u32) {
        if let Some((_, handle)) = self.meter_values.remove(&connector_id) {
            handle.abort();
        }
    }

    pub fn push_background(&self, handle: JoinHandle<()>) {
        let mut background = self.background.lock().unwrap();
        background.retain(|h| !h.is_finished());
        background.push(handle);
    }

    /// Abort everything. Called on station stop and before a reboot.
    pub fn stop_all(&self) {
        self.replace_heartbeat(None);
        self.replace_ws_ping(None);
        let ids: Vec<u32> = self.meter_values.iter().map(|e| *e.key()).collect();
        for id in ids {
            self.stop_meter_values(id);
        }
        for handle in self.background.lock().unwrap().drain(..) {
            handle.abort();
        }
    }
}

/// (Re)start the heartbeat task from the current `HeartbeatInterval` key.
/// An interval of 0 disables the heartbeat.
pub fn restart_heartbeat(station: &Arc<Station>) {
    let interval = station.heartbeat_interval_secs();

    if interval == 0 {
        info!(station_id = station.id(), "Heartbeat disabled");
        station.tasks().replace_heartbeat(None);
        return;
    }

    debug!(station_id = station.id(), interval, "Starting heartbeat task");
    let weak = Arc::downgrade(station);
    let handle = tokio::spawn(async move {
        let period = Duration::from_secs(interval);
        loop {
            tokio::time::sleep(period).await;
            let Some(station) = weak.upgrade() else { break };
            let result = match station.version() {
                OcppVersion::V16 => v16::outbound::heartbeat::send(&station).await.map(|_| ()),
                OcppVersion::V201 => v201::outbound::heartbeat::send(&station).await.map(|_| ()),
            };
            if let Err(e) = result {
                debug!(station_id = station.id(), error = %e, "Heartbeat failed");
            }
        }
    });
    station.tasks().replace_heartbeat(Some(handle));
}

/// (Re)start the WebSocket keep-alive task from `WebSocketPingInterval`.
pub fn restart_ws_ping(station: &Arc<Station>) {
    let interval = station
        .configuration()
        .int_value(keys::WEB_SOCKET_PING_INTERVAL)
        .filter(|v| *v > 0)
        .map(|v| v as u64);

    let Some(interval) = interval else {
        station.tasks().replace_ws_ping(None);
        return;
    };

    let weak = Arc::downgrade(station);
    let handle = tokio::spawn(async move {
        let period = Duration::from_secs(interval);
        loop {
            tokio::time::sleep(period).await;
            let Some(station) = weak.upgrade() else { break };
            if station.router().is_open() {
                let _ = station.router().transport().ping().await;
            }
        }
    });
    station.tasks().replace_ws_ping(Some(handle));
}

/// Start the periodic meter-value job for a connector with a running
/// transaction. V16 sends MeterValues, V201 a TransactionEvent(Updated).
pub fn start_meter_values(station: &Arc<Station>, connector_id: u32) {
    let interval = station
        .configuration()
        .int_value(keys::METER_VALUE_SAMPLE_INTERVAL)
        .filter(|v| *v > 0)
        .map(|v| v as u64)
        .unwrap_or(DEFAULT_METER_VALUE_SAMPLE_INTERVAL_SECS);

    let weak = Arc::downgrade(station);
    let handle = tokio::spawn(async move {
        let period = Duration::from_secs(interval);
        loop {
            tokio::time::sleep(period).await;
            let Some(station) = weak.upgrade() else { break };
            let active = station
                .read_connector(connector_id, |c| c.has_active_transaction())
                .unwrap_or(false);
            if !active {
                break;
            }
            let result = match station.version() {
                OcppVersion::V16 => {
                    v16::outbound::meter_values::send_periodic(&station, connector_id).await
                }
                OcppVersion::V201 => {
                    v201::transaction_event::send_periodic_update(&station, connector_id)
                        .await
                        .map(|_| ())
                }
            };
            if let Err(e) = result {
                debug!(
                    station_id = station.id(),
                    connector_id,
                    error = %e,
                    "Periodic meter values failed"
                );
            }
        }
    });
    if let Some(old) = station.tasks().meter_values.insert(connector_id, handle) {
        old.abort();
    }
}
