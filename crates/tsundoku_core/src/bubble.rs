//! crates/tsundoku_core/src/bubble.rs
//!
//! Validated operations on a reader's time bubble, shared by request handlers
//! and the daily scheduler.

use chrono::NaiveDate;
use std::sync::Arc;
use tracing::debug;

use crate::domain::{BubbleStatus, ReaderId, MAX_BUBBLE_COUNT};
use crate::ports::{BubbleStore, DecayOutcome, PortError, PortResult};

#[derive(Clone)]
pub struct BubbleService {
    store: Arc<dyn BubbleStore>,
}

impl BubbleService {
    pub fn new(store: Arc<dyn BubbleStore>) -> Self {
        Self { store }
    }

    pub async fn get_status(&self, reader_id: ReaderId) -> PortResult<BubbleStatus> {
        let state = self.store.bubble_state(reader_id).await?;
        Ok(BubbleStatus::from(&state))
    }

    pub async fn get_count(&self, reader_id: ReaderId) -> PortResult<u32> {
        Ok(self.store.bubble_state(reader_id).await?.count)
    }

    /// Overwrites both fields. Counts outside `0..=MAX_BUBBLE_COUNT` are rejected.
    pub async fn set_status(&self, reader_id: ReaderId, active: bool, count: i64) -> PortResult<BubbleStatus> {
        let count = u32::try_from(count)
            .ok()
            .filter(|count| *count <= MAX_BUBBLE_COUNT)
            .ok_or_else(|| {
                PortError::Validation(format!(
                    "Bubble count must be between 0 and {}",
                    MAX_BUBBLE_COUNT
                ))
            })?;
        let status = self.store.set_bubble(reader_id, active, count).await?;
        debug!(%reader_id, active, count, "Bubble state overwritten");
        Ok(status)
    }

    pub async fn increment(&self, reader_id: ReaderId) -> PortResult<BubbleStatus> {
        self.store.increment_bubble(reader_id).await
    }

    /// Fails with `Conflict` when the bubble is off or already at zero.
    pub async fn decrement(&self, reader_id: ReaderId) -> PortResult<BubbleStatus> {
        self.store.decrement_bubble(reader_id).await
    }

    /// The scheduler's once-per-day decrement.
    pub async fn decay(&self, reader_id: ReaderId, today: NaiveDate) -> PortResult<DecayOutcome> {
        self.store.decay_bubble(reader_id, today).await
    }

    pub async fn active_readers(&self) -> PortResult<Vec<ReaderId>> {
        self.store.active_bubble_readers().await
    }
}
