//! ScanEvent + the broadcast bus publishing it. Slow subscribers never
//! back-pressure the orchestrator: `tokio::sync::broadcast` is a bounded
//! ring buffer that drops the oldest entry once full, surfacing the drop
//! count to a lagging receiver as `RecvError::Lagged(n)`.

use crate::domain::job::ScanStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::broadcast;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanEvent {
    pub job_id: Uuid,
    pub status: ScanStatus,
    pub progress: u8,
    pub timestamp: DateTime<Utc>,
    pub current_operation: Option<String>,
    pub error_message: Option<String>,
}

impl ScanEvent {
    pub fn new(job_id: Uuid, status: ScanStatus, progress: u8, timestamp: DateTime<Utc>) -> Self {
        Self { job_id, status, progress, timestamp, current_operation: None, error_message: None }
    }

    pub fn with_operation(mut self, operation: impl Into<String>) -> Self {
        self.current_operation = Some(operation.into());
        self
    }

    pub fn with_error(mut self, message: impl Into<String>) -> Self {
        self.error_message = Some(message.into());
        self
    }
}

const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// Single-writer, many-readers event fan-out for all jobs. One channel is
/// shared across every scan; subscribers filter by `job_id` client-side, per
/// the `Subscribe(jobId?)` contract (absent `job_id` = all jobs).
pub struct EventBus {
    sender: broadcast::Sender<ScanEvent>,
    dropped: Arc<AtomicU64>,
}

impl EventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(DEFAULT_CHANNEL_CAPACITY);
        Self { sender, dropped: Arc::new(AtomicU64::new(0)) }
    }

    pub fn publish(&self, event: ScanEvent) {
        // No receivers is not an error here; events are fire-and-forget.
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self, job_id: Option<Uuid>) -> EventSubscription {
        EventSubscription { receiver: self.sender.subscribe(), job_id, dropped: self.dropped.clone() }
    }

    /// Total events dropped across all subscribers due to lag, observed the
    /// next time any subscriber's `recv` races past the condition.
    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

pub struct EventSubscription {
    receiver: broadcast::Receiver<ScanEvent>,
    job_id: Option<Uuid>,
    dropped: Arc<AtomicU64>,
}

impl EventSubscription {
    /// Returns the next event for this subscription's job filter, skipping
    /// events for other jobs and recording any lag encountered.
    pub async fn recv(&mut self) -> Option<ScanEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => {
                    if self.job_id.is_none_or(|id| id == event.job_id) {
                        return Some(event);
                    }
                },
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    self.dropped.fetch_add(n, Ordering::Relaxed);
                },
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}
