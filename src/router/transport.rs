//! Transport abstraction.
//!
//! The engine never touches a socket: the WebSocket layer implements
//! [`Transport`] and feeds received text frames back through
//! [`crate::station::Station::on_frame`]. An [`InMemoryTransport`] is
//! provided for tests and embedders that drive the engine directly.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum TransportError {
    #[error("socket closed")]
    Closed,
    #[error("send failed: {0}")]
    Send(String),
}

#[async_trait]
pub trait Transport: Send + Sync {
    /// Ship one OCPP-J text frame.
    async fn send(&self, frame: String) -> Result<(), TransportError>;

    fn is_open(&self) -> bool;

    /// WebSocket-level keep-alive. Default no-op for transports that have
    /// no ping concept.
    async fn ping(&self) -> Result<(), TransportError> {
        Ok(())
    }
}

/// Captures outgoing frames in memory.
#[derive(Debug, Default)]
pub struct InMemoryTransport {
    open: AtomicBool,
    fail_sends: AtomicBool,
    sent: Mutex<Vec<String>>,
}

impl InMemoryTransport {
    pub fn new() -> Self {
        Self {
            open: AtomicBool::new(true),
            fail_sends: AtomicBool::new(false),
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn closed() -> Self {
        let t = Self::new();
        t.set_open(false);
        t
    }

    pub fn set_open(&self, open: bool) {
        self.open.store(open, Ordering::SeqCst);
    }

    /// Make subsequent sends fail even while the socket reports open.
    pub fn set_fail_sends(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::SeqCst);
    }

    /// Frames sent so far, oldest first.
    pub fn sent_frames(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }

    /// Drain and return the captured frames.
    pub fn take_sent(&self) -> Vec<String> {
        std::mem::take(&mut *self.sent.lock().unwrap())
    }
}

#[async_trait]
impl Transport for InMemoryTransport {
    async fn send(&self, frame: String) -> Result<(), TransportError> {
        if !self.is_open() {
            return Err(TransportError::Closed);
        }
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(TransportError::Send("simulated failure".to_string()));
        }
        self.sent.lock().unwrap().push(frame);
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn captures_frames_while_open() {
        let t = InMemoryTransport::new();
        t.send("[2,\"a\",\"Heartbeat\",{}]".to_string()).await.unwrap();
        assert_eq!(t.sent_frames().len(), 1);

        t.set_open(false);
        let err = t.send("x".to_string()).await.unwrap_err();
        assert!(matches!(err, TransportError::Closed));
        assert_eq!(t.sent_frames().len(), 1);
    }
}
