//! Message router — the station side of the OCPP-J RPC channel.
//!
//! One router per station. Outgoing CALLs get a v4 UUID and a pending-map
//! entry correlated by message id; CALLRESULT/CALLERROR frames resolve the
//! waiter. Frames produced while the socket is down are buffered (unless
//! the caller opts out) and replayed in order on reconnect.

pub mod transport;

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::oneshot;
use tokio::time::timeout;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::support::errors::OcppError;
use crate::support::ocpp_frame::OcppFrame;
use transport::Transport;

/// Per-call options.
#[derive(Debug, Clone, Default)]
pub struct CallOptions {
    /// Fail immediately instead of buffering when the socket is down.
    pub skip_buffering_on_error: bool,
    /// The call answers a CSMS TriggerMessage.
    pub triggered: bool,
    /// Override of the router's default reply timeout.
    pub timeout: Option<Duration>,
}

struct PendingCall {
    action: String,
    reply_tx: oneshot::Sender<Result<Value, OcppError>>,
}

pub struct MessageRouter {
    station_id: String,
    transport: Arc<dyn Transport>,
    pending: DashMap<String, PendingCall>,
    offline_buffer: Mutex<VecDeque<String>>,
    default_timeout: Duration,
}

impl MessageRouter {
    pub fn new(station_id: impl Into<String>, transport: Arc<dyn Transport>, default_timeout: Duration) -> Self {
        Self {
            station_id: station_id.into(),
            transport,
            pending: DashMap::new(),
            offline_buffer: Mutex::new(VecDeque::new()),
            default_timeout,
        }
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    pub fn is_open(&self) -> bool {
        self.transport.is_open()
    }

    /// Send a CALL and await its correlated reply.
    pub async fn call(&self, action: &str, payload: Value, opts: &CallOptions) -> Result<Value, OcppError> {
        let message_id = Uuid::new_v4().to_string();
        let text = OcppFrame::call(message_id.clone(), action, payload).to_text();

        let (reply_tx, reply_rx) = oneshot::channel();
        self.pending.insert(
            message_id.clone(),
            PendingCall {
                action: action.to_string(),
                reply_tx,
            },
        );

        debug!(
            station_id = self.station_id.as_str(),
            action,
            message_id = message_id.as_str(),
            triggered = opts.triggered,
            "Sending request"
        );

        let send_error = if self.transport.is_open() {
            self.transport.send(text.clone()).await.err()
        } else {
            Some(transport::TransportError::Closed)
        };

        if let Some(err) = send_error {
            if opts.skip_buffering_on_error {
                self.pending.remove(&message_id);
                return match err {
                    transport::TransportError::Closed => Err(OcppError::Offline),
                    transport::TransportError::Send(msg) => Err(OcppError::Transport(msg)),
                };
            }
            // Buffer for in-order replay on reconnect and hand the caller a
            // synthetic empty response so handlers stay live while offline.
            // The replayed frame's reply arrives with a then-unknown message
            // id and is dropped.
            info!(
                station_id = self.station_id.as_str(),
                action,
                message_id = message_id.as_str(),
                "Socket down, buffering request"
            );
            self.pending.remove(&message_id);
            self.offline_buffer.lock().unwrap().push_back(text);
            return Ok(Value::Object(Default::default()));
        }

        let deadline = opts.timeout.unwrap_or(self.default_timeout);
        match timeout(deadline, reply_rx).await {
            Ok(reply) => reply.unwrap_or(Err(OcppError::Cancelled)),
            Err(_) => {
                self.pending.remove(&message_id);
                warn!(
                    station_id = self.station_id.as_str(),
                    action,
                    message_id = message_id.as_str(),
                    "Request timed out"
                );
                Err(OcppError::Timeout)
            }
        }
    }

    /// Answer an inbound CALL with a CALLRESULT.
    pub async fn respond_result(&self, message_id: &str, payload: Value) {
        let text = OcppFrame::call_result(message_id, payload).to_text();
        if let Err(e) = self.transport.send(text).await {
            warn!(
                station_id = self.station_id.as_str(),
                message_id,
                error = %e,
                "Failed to send CALLRESULT"
            );
        }
    }

    /// Answer an inbound CALL with a CALLERROR.
    pub async fn respond_error(&self, message_id: &str, error: &OcppError) {
        let text = OcppFrame::call_error(message_id, error).to_text();
        if let Err(e) = self.transport.send(text).await {
            warn!(
                station_id = self.station_id.as_str(),
                message_id,
                error = %e,
                "Failed to send CALLERROR"
            );
        }
    }

    /// Resolve the waiter for a CALLRESULT/CALLERROR frame. An unknown
    /// message id is logged and dropped.
    pub fn resolve_reply(&self, frame: &OcppFrame) {
        match frame {
            OcppFrame::CallResult { unique_id, payload } => {
                match self.pending.remove(unique_id) {
                    Some((_, pending)) => {
                        debug!(
                            station_id = self.station_id.as_str(),
                            action = pending.action.as_str(),
                            message_id = unique_id.as_str(),
                            "Received response"
                        );
                        let _ = pending.reply_tx.send(Ok(payload.clone()));
                    }
                    None => {
                        warn!(
                            station_id = self.station_id.as_str(),
                            message_id = unique_id.as_str(),
                            "CALLRESULT for unknown message id, dropping"
                        );
                    }
                }
            }
            OcppFrame::CallError {
                unique_id,
                error_code,
                error_description,
                ..
            } => match self.pending.remove(unique_id) {
                Some((_, pending)) => {
                    warn!(
                        station_id = self.station_id.as_str(),
                        action = pending.action.as_str(),
                        message_id = unique_id.as_str(),
                        error_code = error_code.as_str(),
                        "Received CALLERROR"
                    );
                    let _ = pending
                        .reply_tx
                        .send(Err(OcppError::from_wire(error_code, error_description)));
                }
                None => {
                    warn!(
                        station_id = self.station_id.as_str(),
                        message_id = unique_id.as_str(),
                        "CALLERROR for unknown message id, dropping"
                    );
                }
            },
            OcppFrame::Call { .. } => {
                warn!(
                    station_id = self.station_id.as_str(),
                    "resolve_reply called with a CALL frame"
                );
            }
        }
    }

    /// Replay buffered frames in order. Stops at the first send failure,
    /// keeping the rest for the next reconnect. Returns the replayed count.
    pub async fn replay_buffered(&self) -> usize {
        let mut replayed = 0;
        loop {
            let next = self.offline_buffer.lock().unwrap().pop_front();
            let Some(frame) = next else { break };
            if let Err(e) = self.transport.send(frame.clone()).await {
                warn!(
                    station_id = self.station_id.as_str(),
                    error = %e,
                    "Replay interrupted, keeping remaining frames buffered"
                );
                self.offline_buffer.lock().unwrap().push_front(frame);
                break;
            }
            replayed += 1;
        }
        if replayed > 0 {
            info!(
                station_id = self.station_id.as_str(),
                replayed, "Replayed buffered requests"
            );
        }
        replayed
    }

    /// Fail every pending waiter and drop the offline buffer. Called on
    /// station stop.
    pub fn cancel_all(&self) {
        let ids: Vec<String> = self.pending.iter().map(|e| e.key().clone()).collect();
        for id in ids {
            if let Some((_, pending)) = self.pending.remove(&id) {
                let _ = pending.reply_tx.send(Err(OcppError::Cancelled));
            }
        }
        self.offline_buffer.lock().unwrap().clear();
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn buffered_count(&self) -> usize {
        self.offline_buffer.lock().unwrap().len()
    }
}

#[cfg(test)]
mod tests {
    use super::transport::InMemoryTransport;
    use super::*;
    use serde_json::json;

    fn router_with(transport: Arc<InMemoryTransport>) -> Arc<MessageRouter> {
        Arc::new(MessageRouter::new(
            "CS-TEST",
            transport,
            Duration::from_secs(5),
        ))
    }

    fn parse_call(frame: &str) -> (String, String, Value) {
        match OcppFrame::parse(frame).unwrap() {
            OcppFrame::Call {
                unique_id,
                action,
                payload,
            } => (unique_id, action, payload),
            other => panic!("expected CALL, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn call_resolves_on_matching_result() {
        let transport = Arc::new(InMemoryTransport::new());
        let router = router_with(transport.clone());

        let call_router = router.clone();
        let handle = tokio::spawn(async move {
            call_router
                .call("Heartbeat", json!({}), &CallOptions::default())
                .await
        });

        let frame = loop {
            if let Some(f) = transport.sent_frames().pop() {
                break f;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        };
        let (id, action, _) = parse_call(&frame);
        assert_eq!(action, "Heartbeat");

        router.resolve_reply(&OcppFrame::call_result(
            id,
            json!({"currentTime": "2024-01-01T00:00:00Z"}),
        ));

        let reply = handle.await.unwrap().unwrap();
        assert_eq!(reply["currentTime"], "2024-01-01T00:00:00Z");
        assert_eq!(router.pending_count(), 0);
    }

    #[tokio::test]
    async fn callerror_is_typed_for_the_waiter() {
        let transport = Arc::new(InMemoryTransport::new());
        let router = router_with(transport.clone());

        let call_router = router.clone();
        let handle = tokio::spawn(async move {
            call_router
                .call("MeterValues", json!({}), &CallOptions::default())
                .await
        });

        let frame = loop {
            if let Some(f) = transport.sent_frames().pop() {
                break f;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        };
        let (id, _, _) = parse_call(&frame);
        router.resolve_reply(&OcppFrame::CallError {
            unique_id: id,
            error_code: "NotSupported".into(),
            error_description: "nope".into(),
            error_details: json!({}),
        });

        let err = handle.await.unwrap().unwrap_err();
        assert!(matches!(err, OcppError::NotSupported(_)));
    }

    #[tokio::test]
    async fn call_times_out_without_a_reply() {
        let transport = Arc::new(InMemoryTransport::new());
        let router = router_with(transport);

        let opts = CallOptions {
            timeout: Some(Duration::from_millis(20)),
            ..Default::default()
        };
        let err = router.call("Heartbeat", json!({}), &opts).await.unwrap_err();
        assert!(matches!(err, OcppError::Timeout));
        assert_eq!(router.pending_count(), 0);
    }

    #[tokio::test]
    async fn offline_calls_buffer_and_replay_in_order() {
        let transport = Arc::new(InMemoryTransport::closed());
        let router = router_with(transport.clone());

        let first = router
            .call(
                "StatusNotification",
                json!({"connectorId": 1}),
                &CallOptions::default(),
            )
            .await
            .unwrap();
        assert_eq!(first, json!({}));

        let second = router
            .call(
                "StatusNotification",
                json!({"connectorId": 2}),
                &CallOptions::default(),
            )
            .await
            .unwrap();
        assert_eq!(second, json!({}));

        assert_eq!(router.buffered_count(), 2);
        assert!(transport.sent_frames().is_empty());

        transport.set_open(true);
        assert_eq!(router.replay_buffered().await, 2);
        assert_eq!(router.buffered_count(), 0);

        let frames = transport.sent_frames();
        let (_, _, p1) = parse_call(&frames[0]);
        let (_, _, p2) = parse_call(&frames[1]);
        assert_eq!(p1["connectorId"], 1);
        assert_eq!(p2["connectorId"], 2);
    }

    #[tokio::test]
    async fn replay_stops_at_first_failure_and_keeps_order() {
        let transport = Arc::new(InMemoryTransport::closed());
        let router = router_with(transport.clone());

        for connector in 1..=3 {
            router
                .call(
                    "StatusNotification",
                    json!({"connectorId": connector}),
                    &CallOptions::default(),
                )
                .await
                .unwrap();
        }
        assert_eq!(router.buffered_count(), 3);

        transport.set_open(true);
        transport.set_fail_sends(true);
        assert_eq!(router.replay_buffered().await, 0);
        assert_eq!(router.buffered_count(), 3);

        transport.set_fail_sends(false);
        assert_eq!(router.replay_buffered().await, 3);
    }

    #[tokio::test]
    async fn skip_buffering_fails_fast_when_offline() {
        let transport = Arc::new(InMemoryTransport::closed());
        let router = router_with(transport);

        let opts = CallOptions {
            skip_buffering_on_error: true,
            ..Default::default()
        };
        let err = router.call("Heartbeat", json!({}), &opts).await.unwrap_err();
        assert!(matches!(err, OcppError::Offline));
        assert_eq!(router.buffered_count(), 0);
        assert_eq!(router.pending_count(), 0);
    }

    #[tokio::test]
    async fn unknown_reply_id_is_dropped() {
        let transport = Arc::new(InMemoryTransport::new());
        let router = router_with(transport);
        router.resolve_reply(&OcppFrame::call_result("no-such-id", json!({})));
        assert_eq!(router.pending_count(), 0);
    }

    #[tokio::test]
    async fn cancel_all_drains_waiters() {
        let transport = Arc::new(InMemoryTransport::new());
        let router = router_with(transport);

        let call_router = router.clone();
        let handle = tokio::spawn(async move {
            call_router
                .call("Heartbeat", json!({}), &CallOptions::default())
                .await
        });

        while router.pending_count() == 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        router.cancel_all();

        let err = handle.await.unwrap().unwrap_err();
        assert!(matches!(err, OcppError::Cancelled));
    }
}
