//! Last-observation state for the QR status endpoint
//!
//! The detector itself lives outside this crate; whatever runs it pushes
//! observations here, and `/qr_status` polls the latest one.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QrStatus {
    pub detected: bool,
    pub data: String,
    /// Milliseconds since the epoch, consumed by the page as a JS Date
    pub timestamp: u64,
}

/// Shared detector observation, written by the detector task and read by
/// the status handler.
#[derive(Default)]
pub struct QrState {
    inner: RwLock<QrStatus>,
}

impl QrState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> QrStatus {
        self.inner.read().clone()
    }

    /// Records a fresh detection.
    pub fn publish(&self, data: String) {
        let mut inner = self.inner.write();
        inner.detected = true;
        inner.data = data;
        inner.timestamp = epoch_millis();
    }

    /// Marks the last observation stale; its data and timestamp remain
    /// visible so the page can show when the code was last seen.
    pub fn expire(&self) {
        self.inner.write().detected = false;
    }
}

fn epoch_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
