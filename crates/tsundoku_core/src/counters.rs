//! crates/tsundoku_core/src/counters.rs
//!
//! The counter rule every shelf mutation upholds:
//! `total_to_be_read` equals the number of unfinished membership rows and
//! `total_completed` the number of finished ones.
//!
//! Stores turn a `CounterDelta` into a clamped store-side update inside the
//! same transaction as the membership change.

use crate::domain::{ShelfCounts, ShelfMembership};

/// Signed change to a reader's two shelf counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CounterDelta {
    pub to_be_read: i32,
    pub completed: i32,
}

impl CounterDelta {
    /// A new unfinished link.
    pub fn added() -> Self {
        Self {
            to_be_read: 1,
            completed: 0,
        }
    }

    /// A link deleted in whichever state it was in.
    pub fn removed(was_completed: bool) -> Self {
        if was_completed {
            Self {
                to_be_read: 0,
                completed: -1,
            }
        } else {
            Self {
                to_be_read: -1,
                completed: 0,
            }
        }
    }

    /// An unfinished link moved to the completed shelf.
    pub fn completed() -> Self {
        Self {
            to_be_read: -1,
            completed: 1,
        }
    }

    /// Applies the delta, never going below zero.
    pub fn apply(&self, counts: ShelfCounts) -> ShelfCounts {
        ShelfCounts {
            total_to_be_read: clamp_add(counts.total_to_be_read, self.to_be_read),
            total_completed: clamp_add(counts.total_completed, self.completed),
        }
    }
}

fn clamp_add(value: u32, delta: i32) -> u32 {
    if delta >= 0 {
        value.saturating_add(delta as u32)
    } else {
        value.saturating_sub(delta.unsigned_abs())
    }
}

/// Counts recomputed from the membership rows themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ShelfTally {
    pub counts: ShelfCounts,
    pub current_reads: usize,
}

impl ShelfTally {
    pub fn from_memberships<'a>(rows: impl IntoIterator<Item = &'a ShelfMembership>) -> Self {
        rows.into_iter().fold(Self::default(), |mut tally, row| {
            if row.is_completed {
                tally.counts.total_completed += 1;
            } else {
                tally.counts.total_to_be_read += 1;
            }
            if row.is_current_read {
                tally.current_reads += 1;
            }
            tally
        })
    }

    /// True when the stored counters agree with the rows and at most one row is current.
    pub fn matches(&self, stored: ShelfCounts) -> bool {
        self.counts == stored && self.current_reads <= 1
    }
}
