//! crates/tsundoku_core/src/ports.rs
//!
//! Defines the store contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of the concrete relational store behind it.
//!
//! Every mutating method is one atomic unit: an implementation must apply the
//! membership change and the counter change together or not at all.

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::domain::{
    Book, BubbleState, BubbleStatus, ReaderId, Reader, ReadingLevel, ShelfCounts,
    ShelfMembership,
};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// The error type for all port and service operations.
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    /// Missing or malformed input.
    #[error("Validation failed: {0}")]
    Validation(String),
    /// Unknown reader, book, or membership.
    #[error("Item not found: {0}")]
    NotFound(String),
    /// A guard on the current state rejected the operation.
    #[error("Conflict: {0}")]
    Conflict(String),
    /// The store could not be reached in time. The caller may retry.
    #[error("Store temporarily unavailable: {0}")]
    Transient(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

/// Result of adding a book that may already be on the shelf.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    Added,
    AlreadyOnShelf,
}

/// Result of one daily decay attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecayOutcome {
    Decremented(BubbleStatus),
    AlreadyAppliedToday,
}

//=========================================================================================
// Store Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait ReaderStore: Send + Sync {
    /// Creates the reader with zeroed counters and an inactive bubble.
    /// Registering an existing reader returns it unchanged.
    async fn register_reader(&self, reader_id: ReaderId, level: ReadingLevel) -> PortResult<Reader>;

    async fn get_reader(&self, reader_id: ReaderId) -> PortResult<Reader>;

    async fn set_reading_level(&self, reader_id: ReaderId, level: ReadingLevel) -> PortResult<()>;
}

#[async_trait]
pub trait ShelfStore: Send + Sync {
    /// Upserts the book (no-op when its id exists), links it to the reader if
    /// not already linked, and bumps `total_to_be_read` only for a new link.
    async fn add_to_shelf(&self, reader_id: ReaderId, book: &Book) -> PortResult<AddOutcome>;

    /// Deletes the link and decrements the counter matching its state.
    async fn remove_from_shelf(&self, reader_id: ReaderId, book_id: &str) -> PortResult<()>;

    /// Marks an unfinished link completed, clears its current-read flag, and
    /// moves one unit from `total_to_be_read` to `total_completed`.
    async fn complete_book(&self, reader_id: ReaderId, book_id: &str) -> PortResult<()>;

    /// Resolves a cover reference to a book on the reader's shelf, preferring
    /// an unfinished one. `None` when no shelved book carries that cover.
    async fn find_book_id_by_cover(&self, reader_id: ReaderId, cover: &str) -> PortResult<Option<String>>;

    /// Clears every current-read flag of the reader and sets it on `book_id`,
    /// serialized against other calls for the same reader.
    async fn set_current_read(&self, reader_id: ReaderId, book_id: &str) -> PortResult<()>;

    async fn current_read(&self, reader_id: ReaderId) -> PortResult<Option<Book>>;

    /// Books on the reader's shelf with the given completion flag, oldest first.
    async fn list_shelf(&self, reader_id: ReaderId, completed: bool) -> PortResult<Vec<Book>>;

    async fn shelf_counts(&self, reader_id: ReaderId) -> PortResult<ShelfCounts>;

    async fn memberships(&self, reader_id: ReaderId) -> PortResult<Vec<ShelfMembership>>;
}

#[async_trait]
pub trait BubbleStore: Send + Sync {
    async fn bubble_state(&self, reader_id: ReaderId) -> PortResult<BubbleState>;

    /// Overwrites both fields unconditionally.
    async fn set_bubble(&self, reader_id: ReaderId, active: bool, count: u32) -> PortResult<BubbleStatus>;

    /// Adds one, saturating at `MAX_BUBBLE_COUNT`.
    async fn increment_bubble(&self, reader_id: ReaderId) -> PortResult<BubbleStatus>;

    /// Decrements only when the bubble is active and above zero, evaluated in
    /// the same statement as the write.
    async fn decrement_bubble(&self, reader_id: ReaderId) -> PortResult<BubbleStatus>;

    /// Like `decrement_bubble`, but at most once per `today`, recording it.
    async fn decay_bubble(&self, reader_id: ReaderId, today: NaiveDate) -> PortResult<DecayOutcome>;

    async fn active_bubble_readers(&self) -> PortResult<Vec<ReaderId>>;
}

/// Message used for every guard rejection of a bubble decrement.
pub const DECREMENT_GUARD_MESSAGE: &str = "cannot decrement: inactive or already zero";
