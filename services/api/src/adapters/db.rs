//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the store ports from the `core` crate. It handles all interactions
//! with the PostgreSQL database using `sqlx`.
//!
//! Every shelf mutation runs in one transaction that first locks the reader row,
//! so membership changes, counter updates and current-read switches for the same
//! reader are serialized. Bubble decrements are single conditional updates.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use tsundoku_core::counters::CounterDelta;
use tsundoku_core::domain::{
    Book, BubbleState, BubbleStatus, Reader, ReaderId, ReadingLevel, ShelfCounts, ShelfMembership,
    MAX_BUBBLE_COUNT,
};
use tsundoku_core::ports::{
    AddOutcome, BubbleStore, DecayOutcome, PortError, PortResult, ReaderStore, ShelfStore,
    DECREMENT_GUARD_MESSAGE,
};
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements every store port.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }

    /// Closes the pool, waiting for checked-out connections to be returned.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    async fn begin(&self) -> PortResult<Transaction<'static, Postgres>> {
        self.pool.begin().await.map_err(map_sqlx_error)
    }

    async fn ensure_reader(&self, reader_id: ReaderId) -> PortResult<()> {
        sqlx::query_scalar::<_, Uuid>("SELECT id FROM readers WHERE id = $1")
            .bind(reader_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?
            .map(|_| ())
            .ok_or_else(|| reader_not_found(reader_id))
    }

    async fn fetch_bubble(&self, reader_id: ReaderId) -> PortResult<BubbleState> {
        let record = sqlx::query_as::<_, BubbleRecord>(
            "SELECT bubble_active, bubble_count, bubble_last_decremented_on FROM readers WHERE id = $1",
        )
        .bind(reader_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?
        .ok_or_else(|| reader_not_found(reader_id))?;
        Ok(record.to_domain())
    }
}

//=========================================================================================
// Error Mapping and Transaction Helpers
//=========================================================================================

/// Sorts `sqlx` failures into the port error taxonomy.
fn map_sqlx_error(e: sqlx::Error) -> PortError {
    match e {
        sqlx::Error::RowNotFound => PortError::NotFound(e.to_string()),
        sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed
        | sqlx::Error::Io(_)
        | sqlx::Error::Tls(_) => PortError::Transient(e.to_string()),
        sqlx::Error::Database(ref db) if db.is_unique_violation() => {
            PortError::Conflict(db.message().to_string())
        }
        _ => PortError::Unexpected(e.to_string()),
    }
}

fn reader_not_found(reader_id: ReaderId) -> PortError {
    PortError::NotFound(format!("Reader {} not found", reader_id))
}

fn membership_not_found(reader_id: ReaderId, book_id: &str) -> PortError {
    PortError::NotFound(format!("Book {} is not on the shelf of reader {}", book_id, reader_id))
}

/// Locks the reader row for the rest of the transaction.
async fn lock_reader(tx: &mut Transaction<'_, Postgres>, reader_id: ReaderId) -> PortResult<()> {
    sqlx::query_scalar::<_, Uuid>("SELECT id FROM readers WHERE id = $1 FOR UPDATE")
        .bind(reader_id)
        .fetch_optional(&mut **tx)
        .await
        .map_err(map_sqlx_error)?
        .map(|_| ())
        .ok_or_else(|| reader_not_found(reader_id))
}

/// Completion flag of the reader's link to `book_id`, if linked.
async fn membership_state(
    tx: &mut Transaction<'_, Postgres>,
    reader_id: ReaderId,
    book_id: &str,
) -> PortResult<Option<bool>> {
    sqlx::query_scalar::<_, bool>(
        "SELECT is_completed FROM shelf_memberships WHERE reader_id = $1 AND book_id = $2",
    )
    .bind(reader_id)
    .bind(book_id)
    .fetch_optional(&mut **tx)
    .await
    .map_err(map_sqlx_error)
}

async fn apply_counter_delta(
    tx: &mut Transaction<'_, Postgres>,
    reader_id: ReaderId,
    delta: CounterDelta,
) -> PortResult<()> {
    sqlx::query(
        "UPDATE readers
         SET total_to_be_read = GREATEST(total_to_be_read + $2, 0),
             total_completed = GREATEST(total_completed + $3, 0)
         WHERE id = $1",
    )
    .bind(reader_id)
    .bind(delta.to_be_read)
    .bind(delta.completed)
    .execute(&mut **tx)
    .await
    .map_err(map_sqlx_error)?;
    Ok(())
}

async fn commit(tx: Transaction<'_, Postgres>) -> PortResult<()> {
    tx.commit().await.map_err(map_sqlx_error)
}

fn non_negative(value: i32) -> u32 {
    u32::try_from(value).unwrap_or(0)
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct ReaderRecord {
    id: Uuid,
    reading_level: String,
    total_to_be_read: i32,
    total_completed: i32,
    bubble_active: bool,
    bubble_count: i32,
    bubble_last_decremented_on: Option<NaiveDate>,
    created_at: DateTime<Utc>,
}
impl ReaderRecord {
    fn to_domain(self) -> PortResult<Reader> {
        let reading_level = self.reading_level.parse::<ReadingLevel>().map_err(|_| {
            PortError::Unexpected(format!(
                "Reader {} has unknown reading level {}",
                self.id, self.reading_level
            ))
        })?;
        Ok(Reader {
            id: self.id,
            reading_level,
            counts: ShelfCounts {
                total_to_be_read: non_negative(self.total_to_be_read),
                total_completed: non_negative(self.total_completed),
            },
            bubble: BubbleState {
                active: self.bubble_active,
                count: non_negative(self.bubble_count),
                last_decremented_on: self.bubble_last_decremented_on,
            },
            created_at: self.created_at,
        })
    }
}

#[derive(FromRow)]
struct BookRecord {
    id: String,
    title: String,
    authors: Vec<String>,
    description: Option<String>,
    cover: String,
    published_date: Option<NaiveDate>,
}
impl BookRecord {
    fn to_domain(self) -> Book {
        Book {
            id: self.id,
            title: self.title,
            authors: self.authors,
            description: self.description,
            cover: self.cover,
            published_date: self.published_date,
        }
    }
}

#[derive(FromRow)]
struct MembershipRecord {
    reader_id: Uuid,
    book_id: String,
    is_completed: bool,
    is_current_read: bool,
    added_at: DateTime<Utc>,
}
impl MembershipRecord {
    fn to_domain(self) -> ShelfMembership {
        ShelfMembership {
            reader_id: self.reader_id,
            book_id: self.book_id,
            is_completed: self.is_completed,
            is_current_read: self.is_current_read,
            added_at: self.added_at,
        }
    }
}

#[derive(FromRow)]
struct BubbleRecord {
    bubble_active: bool,
    bubble_count: i32,
    bubble_last_decremented_on: Option<NaiveDate>,
}
impl BubbleRecord {
    fn to_domain(self) -> BubbleState {
        BubbleState {
            active: self.bubble_active,
            count: non_negative(self.bubble_count),
            last_decremented_on: self.bubble_last_decremented_on,
        }
    }
}

#[derive(FromRow)]
struct CountsRecord {
    total_to_be_read: i32,
    total_completed: i32,
}

const READER_COLUMNS: &str = "id, reading_level, total_to_be_read, total_completed, \
     bubble_active, bubble_count, bubble_last_decremented_on, created_at";

const BUBBLE_RETURNING: &str =
    "RETURNING bubble_active, bubble_count, bubble_last_decremented_on";

//=========================================================================================
// `ReaderStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl ReaderStore for DbAdapter {
    async fn register_reader(&self, reader_id: ReaderId, level: ReadingLevel) -> PortResult<Reader> {
        sqlx::query("INSERT INTO readers (id, reading_level) VALUES ($1, $2) ON CONFLICT (id) DO NOTHING")
            .bind(reader_id)
            .bind(level.as_str())
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        self.get_reader(reader_id).await
    }

    async fn get_reader(&self, reader_id: ReaderId) -> PortResult<Reader> {
        let record = sqlx::query_as::<_, ReaderRecord>(&format!(
            "SELECT {} FROM readers WHERE id = $1",
            READER_COLUMNS
        ))
        .bind(reader_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?
        .ok_or_else(|| reader_not_found(reader_id))?;

        record.to_domain()
    }

    async fn set_reading_level(&self, reader_id: ReaderId, level: ReadingLevel) -> PortResult<()> {
        let updated = sqlx::query("UPDATE readers SET reading_level = $2 WHERE id = $1")
            .bind(reader_id)
            .bind(level.as_str())
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?
            .rows_affected();

        if updated == 0 {
            return Err(reader_not_found(reader_id));
        }
        Ok(())
    }
}

//=========================================================================================
// `ShelfStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl ShelfStore for DbAdapter {
    async fn add_to_shelf(&self, reader_id: ReaderId, book: &Book) -> PortResult<AddOutcome> {
        let mut tx = self.begin().await?;
        lock_reader(&mut tx, reader_id).await?;

        sqlx::query(
            "INSERT INTO books (id, title, authors, description, cover, published_date)
             VALUES ($1, $2, $3, $4, $5, $6)
             ON CONFLICT (id) DO NOTHING",
        )
        .bind(book.id.as_str())
        .bind(book.title.as_str())
        .bind(book.authors.as_slice())
        .bind(book.description.as_deref())
        .bind(book.cover.as_str())
        .bind(book.published_date)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        let linked = sqlx::query(
            "INSERT INTO shelf_memberships (reader_id, book_id) VALUES ($1, $2)
             ON CONFLICT (reader_id, book_id) DO NOTHING",
        )
        .bind(reader_id)
        .bind(book.id.as_str())
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_error)?
        .rows_affected();

        let outcome = if linked == 1 {
            apply_counter_delta(&mut tx, reader_id, CounterDelta::added()).await?;
            AddOutcome::Added
        } else {
            AddOutcome::AlreadyOnShelf
        };

        commit(tx).await?;
        Ok(outcome)
    }

    async fn remove_from_shelf(&self, reader_id: ReaderId, book_id: &str) -> PortResult<()> {
        let mut tx = self.begin().await?;
        lock_reader(&mut tx, reader_id).await?;

        let was_completed = sqlx::query_scalar::<_, bool>(
            "DELETE FROM shelf_memberships WHERE reader_id = $1 AND book_id = $2 RETURNING is_completed",
        )
        .bind(reader_id)
        .bind(book_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(map_sqlx_error)?
        .ok_or_else(|| membership_not_found(reader_id, book_id))?;

        apply_counter_delta(&mut tx, reader_id, CounterDelta::removed(was_completed)).await?;
        commit(tx).await
    }

    async fn complete_book(&self, reader_id: ReaderId, book_id: &str) -> PortResult<()> {
        let mut tx = self.begin().await?;
        lock_reader(&mut tx, reader_id).await?;

        match membership_state(&mut tx, reader_id, book_id).await? {
            None => return Err(membership_not_found(reader_id, book_id)),
            Some(true) => {
                return Err(PortError::Conflict(format!("Book {} is already completed", book_id)))
            }
            Some(false) => {}
        }

        sqlx::query(
            "UPDATE shelf_memberships SET is_completed = TRUE, is_current_read = FALSE
             WHERE reader_id = $1 AND book_id = $2",
        )
        .bind(reader_id)
        .bind(book_id)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        apply_counter_delta(&mut tx, reader_id, CounterDelta::completed()).await?;
        commit(tx).await
    }

    async fn find_book_id_by_cover(&self, reader_id: ReaderId, cover: &str) -> PortResult<Option<String>> {
        self.ensure_reader(reader_id).await?;

        sqlx::query_scalar::<_, String>(
            "SELECT b.id
             FROM books b
             JOIN shelf_memberships m ON m.book_id = b.id
             WHERE m.reader_id = $1 AND b.cover = $2
             ORDER BY m.is_completed ASC, m.added_at ASC, b.id ASC
             LIMIT 1",
        )
        .bind(reader_id)
        .bind(cover)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)
    }

    async fn set_current_read(&self, reader_id: ReaderId, book_id: &str) -> PortResult<()> {
        let mut tx = self.begin().await?;
        lock_reader(&mut tx, reader_id).await?;

        match membership_state(&mut tx, reader_id, book_id).await? {
            None => return Err(membership_not_found(reader_id, book_id)),
            Some(true) => {
                return Err(PortError::Conflict(format!(
                    "Book {} is completed and cannot be the current read",
                    book_id
                )))
            }
            Some(false) => {}
        }

        sqlx::query(
            "UPDATE shelf_memberships SET is_current_read = FALSE
             WHERE reader_id = $1 AND is_current_read",
        )
        .bind(reader_id)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        sqlx::query(
            "UPDATE shelf_memberships SET is_current_read = TRUE
             WHERE reader_id = $1 AND book_id = $2",
        )
        .bind(reader_id)
        .bind(book_id)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        commit(tx).await
    }

    async fn current_read(&self, reader_id: ReaderId) -> PortResult<Option<Book>> {
        let record = sqlx::query_as::<_, BookRecord>(
            "SELECT b.id, b.title, b.authors, b.description, b.cover, b.published_date
             FROM books b
             JOIN shelf_memberships m ON m.book_id = b.id
             WHERE m.reader_id = $1 AND m.is_current_read",
        )
        .bind(reader_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        match record {
            Some(record) => Ok(Some(record.to_domain())),
            None => self.ensure_reader(reader_id).await.map(|_| None),
        }
    }

    async fn list_shelf(&self, reader_id: ReaderId, completed: bool) -> PortResult<Vec<Book>> {
        self.ensure_reader(reader_id).await?;

        let records = sqlx::query_as::<_, BookRecord>(
            "SELECT b.id, b.title, b.authors, b.description, b.cover, b.published_date
             FROM books b
             JOIN shelf_memberships m ON m.book_id = b.id
             WHERE m.reader_id = $1 AND m.is_completed = $2
             ORDER BY m.added_at ASC, b.id ASC",
        )
        .bind(reader_id)
        .bind(completed)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn shelf_counts(&self, reader_id: ReaderId) -> PortResult<ShelfCounts> {
        let record = sqlx::query_as::<_, CountsRecord>(
            "SELECT total_to_be_read, total_completed FROM readers WHERE id = $1",
        )
        .bind(reader_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?
        .ok_or_else(|| reader_not_found(reader_id))?;

        Ok(ShelfCounts {
            total_to_be_read: non_negative(record.total_to_be_read),
            total_completed: non_negative(record.total_completed),
        })
    }

    async fn memberships(&self, reader_id: ReaderId) -> PortResult<Vec<ShelfMembership>> {
        self.ensure_reader(reader_id).await?;

        let records = sqlx::query_as::<_, MembershipRecord>(
            "SELECT reader_id, book_id, is_completed, is_current_read, added_at
             FROM shelf_memberships WHERE reader_id = $1 ORDER BY added_at ASC, book_id ASC",
        )
        .bind(reader_id)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }
}

//=========================================================================================
// `BubbleStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl BubbleStore for DbAdapter {
    async fn bubble_state(&self, reader_id: ReaderId) -> PortResult<BubbleState> {
        self.fetch_bubble(reader_id).await
    }

    async fn set_bubble(&self, reader_id: ReaderId, active: bool, count: u32) -> PortResult<BubbleStatus> {
        let count = i32::try_from(count.min(MAX_BUBBLE_COUNT)).unwrap_or(i32::MAX);

        let record = sqlx::query_as::<_, BubbleRecord>(&format!(
            "UPDATE readers SET bubble_active = $2, bubble_count = $3 WHERE id = $1 {}",
            BUBBLE_RETURNING
        ))
        .bind(reader_id)
        .bind(active)
        .bind(count)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?
        .ok_or_else(|| reader_not_found(reader_id))?;

        Ok(BubbleStatus::from(&record.to_domain()))
    }

    async fn increment_bubble(&self, reader_id: ReaderId) -> PortResult<BubbleStatus> {
        let record = sqlx::query_as::<_, BubbleRecord>(&format!(
            "UPDATE readers
             SET bubble_count = CASE WHEN bubble_count < $2 THEN bubble_count + 1 ELSE bubble_count END
             WHERE id = $1 {}",
            BUBBLE_RETURNING
        ))
        .bind(reader_id)
        .bind(i32::MAX)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?
        .ok_or_else(|| reader_not_found(reader_id))?;

        Ok(BubbleStatus::from(&record.to_domain()))
    }

    async fn decrement_bubble(&self, reader_id: ReaderId) -> PortResult<BubbleStatus> {
        let record = sqlx::query_as::<_, BubbleRecord>(&format!(
            "UPDATE readers SET bubble_count = bubble_count - 1
             WHERE id = $1 AND bubble_active AND bubble_count > 0 {}",
            BUBBLE_RETURNING
        ))
        .bind(reader_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        match record {
            Some(record) => Ok(BubbleStatus::from(&record.to_domain())),
            // The guard already decided; this read only picks the error.
            None => {
                self.ensure_reader(reader_id).await?;
                Err(PortError::Conflict(DECREMENT_GUARD_MESSAGE.to_string()))
            }
        }
    }

    async fn decay_bubble(&self, reader_id: ReaderId, today: NaiveDate) -> PortResult<DecayOutcome> {
        let record = sqlx::query_as::<_, BubbleRecord>(&format!(
            "UPDATE readers
             SET bubble_count = bubble_count - 1, bubble_last_decremented_on = $2
             WHERE id = $1 AND bubble_active AND bubble_count > 0
               AND (bubble_last_decremented_on IS NULL OR bubble_last_decremented_on < $2) {}",
            BUBBLE_RETURNING
        ))
        .bind(reader_id)
        .bind(today)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        if let Some(record) = record {
            return Ok(DecayOutcome::Decremented(BubbleStatus::from(&record.to_domain())));
        }

        let state = self.fetch_bubble(reader_id).await?;
        if state.last_decremented_on.is_some_and(|last| last >= today) {
            Ok(DecayOutcome::AlreadyAppliedToday)
        } else {
            Err(PortError::Conflict(DECREMENT_GUARD_MESSAGE.to_string()))
        }
    }

    async fn active_bubble_readers(&self) -> PortResult<Vec<ReaderId>> {
        sqlx::query_scalar::<_, Uuid>("SELECT id FROM readers WHERE bubble_active ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_error)
    }
}
