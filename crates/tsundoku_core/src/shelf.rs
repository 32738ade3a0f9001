//! crates/tsundoku_core/src/shelf.rs
//!
//! Shelf membership operations: adding, removing and completing books, and
//! choosing the single current read. Counter upkeep happens inside the store
//! call of each mutation (see `counters`).

use std::sync::Arc;
use tracing::{debug, info};

use crate::counters::ShelfTally;
use crate::domain::{Book, BookRef, NewBook, ReaderId, ShelfCounts};
use crate::ports::{AddOutcome, PortError, PortResult, ShelfStore};

/// Stored counters next to the counts recomputed from the rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShelfAudit {
    pub stored: ShelfCounts,
    pub tally: ShelfTally,
}

impl ShelfAudit {
    pub fn is_consistent(&self) -> bool {
        self.tally.matches(self.stored)
    }
}

#[derive(Clone)]
pub struct ShelfService {
    store: Arc<dyn ShelfStore>,
}

impl ShelfService {
    pub fn new(store: Arc<dyn ShelfStore>) -> Self {
        Self { store }
    }

    pub async fn add_to_shelf(&self, reader_id: ReaderId, book: NewBook) -> PortResult<AddOutcome> {
        let book = book.validate()?;
        let outcome = self.store.add_to_shelf(reader_id, &book).await?;
        match outcome {
            AddOutcome::Added => info!(%reader_id, book_id = %book.id, "Book added to shelf"),
            AddOutcome::AlreadyOnShelf => {
                debug!(%reader_id, book_id = %book.id, "Book already on shelf")
            }
        }
        Ok(outcome)
    }

    pub async fn remove_from_shelf(&self, reader_id: ReaderId, book_id: &str) -> PortResult<()> {
        let book_id = require_book_id(book_id)?;
        self.store.remove_from_shelf(reader_id, book_id).await?;
        info!(%reader_id, book_id = %book_id, "Book removed from shelf");
        Ok(())
    }

    /// Moves a book to the completed shelf. A cover reference is resolved
    /// against the reader's own shelf first.
    pub async fn complete_book(&self, reader_id: ReaderId, book: BookRef) -> PortResult<()> {
        let book_id = match book {
            BookRef::Id(id) => require_book_id(&id)?.to_string(),
            BookRef::Cover(cover) => {
                if cover.trim().is_empty() {
                    return Err(PortError::Validation("Book cover reference is required".to_string()));
                }
                self.store
                    .find_book_id_by_cover(reader_id, &cover)
                    .await?
                    .ok_or_else(|| {
                        PortError::NotFound(format!("No book with cover {} on the shelf", cover))
                    })?
            }
        };

        self.store.complete_book(reader_id, &book_id).await?;
        info!(%reader_id, book_id = %book_id, "Book moved to completed shelf");
        Ok(())
    }

    pub async fn set_current_read(&self, reader_id: ReaderId, book_id: &str) -> PortResult<()> {
        let book_id = require_book_id(book_id)?;
        self.store.set_current_read(reader_id, book_id).await?;
        info!(%reader_id, book_id = %book_id, "Current read set");
        Ok(())
    }

    /// `None` when the reader has no current read.
    pub async fn get_current_read(&self, reader_id: ReaderId) -> PortResult<Option<Book>> {
        self.store.current_read(reader_id).await
    }

    pub async fn list_to_be_read(&self, reader_id: ReaderId) -> PortResult<Vec<Book>> {
        self.store.list_shelf(reader_id, false).await
    }

    pub async fn list_completed(&self, reader_id: ReaderId) -> PortResult<Vec<Book>> {
        self.store.list_shelf(reader_id, true).await
    }

    pub async fn shelf_counts(&self, reader_id: ReaderId) -> PortResult<ShelfCounts> {
        self.store.shelf_counts(reader_id).await
    }

    /// Compares the stored counters against the membership rows.
    pub async fn audit(&self, reader_id: ReaderId) -> PortResult<ShelfAudit> {
        let stored = self.store.shelf_counts(reader_id).await?;
        let rows = self.store.memberships(reader_id).await?;
        Ok(ShelfAudit {
            stored,
            tally: ShelfTally::from_memberships(&rows),
        })
    }
}

fn require_book_id(book_id: &str) -> PortResult<&str> {
    let trimmed = book_id.trim();
    if trimmed.is_empty() {
        return Err(PortError::Validation("Book identifier is required".to_string()));
    }
    Ok(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ReadingLevel;
    use crate::memory::MemoryStore;
    use crate::ports::ReaderStore;
    use uuid::Uuid;

    fn book(id: &str) -> NewBook {
        NewBook {
            id: Some(id.to_string()),
            title: Some(format!("Title {}", id)),
            authors: vec!["Anon".to_string()],
            cover: Some(format!("https://covers.example/{}.jpg", id)),
            published_date: Some("2001".to_string()),
            ..Default::default()
        }
    }

    async fn setup() -> (ShelfService, ReaderId) {
        let store = Arc::new(MemoryStore::new());
        let reader_id = Uuid::new_v4();
        store
            .register_reader(reader_id, ReadingLevel::Moderate)
            .await
            .unwrap();
        (ShelfService::new(store), reader_id)
    }

    #[tokio::test]
    async fn add_then_complete_keeps_the_row() {
        let (shelf, reader) = setup().await;

        shelf.add_to_shelf(reader, book("a")).await.unwrap();
        let counts = shelf.shelf_counts(reader).await.unwrap();
        assert_eq!(counts.total_to_be_read, 1);

        shelf
            .complete_book(reader, BookRef::Cover("https://covers.example/a.jpg".to_string()))
            .await
            .unwrap();

        let counts = shelf.shelf_counts(reader).await.unwrap();
        assert_eq!(counts.total_to_be_read, 0);
        assert_eq!(counts.total_completed, 1);

        let completed = shelf.list_completed(reader).await.unwrap();
        assert_eq!(completed.len(), 1);
        assert_eq!(completed[0].id, "a");
        assert!(shelf.audit(reader).await.unwrap().is_consistent());
    }

    #[tokio::test]
    async fn adding_twice_counts_once() {
        let (shelf, reader) = setup().await;

        assert_eq!(shelf.add_to_shelf(reader, book("a")).await.unwrap(), AddOutcome::Added);
        assert_eq!(
            shelf.add_to_shelf(reader, book("a")).await.unwrap(),
            AddOutcome::AlreadyOnShelf
        );

        assert_eq!(shelf.list_to_be_read(reader).await.unwrap().len(), 1);
        assert_eq!(shelf.shelf_counts(reader).await.unwrap().total_to_be_read, 1);
    }

    #[tokio::test]
    async fn switching_current_read_leaves_one_flag() {
        let (shelf, reader) = setup().await;
        shelf.add_to_shelf(reader, book("a")).await.unwrap();
        shelf.add_to_shelf(reader, book("b")).await.unwrap();

        shelf.set_current_read(reader, "a").await.unwrap();
        shelf.set_current_read(reader, "b").await.unwrap();

        let current = shelf.get_current_read(reader).await.unwrap().unwrap();
        assert_eq!(current.id, "b");
        assert_eq!(shelf.audit(reader).await.unwrap().tally.current_reads, 1);
    }

    #[tokio::test]
    async fn shared_cover_completes_the_callers_own_book() {
        let store = Arc::new(MemoryStore::new());
        let shelf = ShelfService::new(store.clone());
        let cover = "https://covers.example/shared.jpg";

        for attempt in 0..20 {
            let (first, second) = (Uuid::new_v4(), Uuid::new_v4());
            store.register_reader(first, ReadingLevel::Moderate).await.unwrap();
            store.register_reader(second, ReadingLevel::Moderate).await.unwrap();

            let mut edition_one = book(&format!("edition-1-{}", attempt));
            edition_one.cover = Some(cover.to_string());
            let mut edition_two = book(&format!("edition-2-{}", attempt));
            edition_two.cover = Some(cover.to_string());
            shelf.add_to_shelf(first, edition_one).await.unwrap();
            shelf.add_to_shelf(second, edition_two).await.unwrap();

            shelf
                .complete_book(second, BookRef::Cover(cover.to_string()))
                .await
                .unwrap();

            let completed = shelf.list_completed(second).await.unwrap();
            assert_eq!(completed[0].id, format!("edition-2-{}", attempt));
            assert_eq!(shelf.shelf_counts(first).await.unwrap().total_completed, 0);
        }
    }

    #[tokio::test]
    async fn unknown_cover_is_not_found() {
        let (shelf, reader) = setup().await;
        let err = shelf
            .complete_book(reader, BookRef::Cover("nope".to_string()))
            .await
            .unwrap_err();
        assert!(matches!(err, PortError::NotFound(_)));
    }

    #[tokio::test]
    async fn missing_book_id_is_a_validation_error() {
        let (shelf, reader) = setup().await;
        let err = shelf.add_to_shelf(reader, NewBook::default()).await.unwrap_err();
        assert!(matches!(err, PortError::Validation(_)));
        let err = shelf.remove_from_shelf(reader, " ").await.unwrap_err();
        assert!(matches!(err, PortError::Validation(_)));
    }
}
