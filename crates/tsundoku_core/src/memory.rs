//! crates/tsundoku_core/src/memory.rs
//!
//! An in-process implementation of every store port. All state sits behind a
//! single mutex, so each operation is atomic and operations on the same reader
//! are serialized. Used for local development and tests.

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use crate::counters::CounterDelta;
use crate::domain::{
    Book, BubbleState, BubbleStatus, Reader, ReaderId, ReadingLevel, ShelfCounts, ShelfMembership,
    MAX_BUBBLE_COUNT,
};
use crate::ports::{
    AddOutcome, BubbleStore, DecayOutcome, PortError, PortResult, ReaderStore, ShelfStore,
    DECREMENT_GUARD_MESSAGE,
};

#[derive(Default)]
struct State {
    readers: HashMap<ReaderId, Reader>,
    books: HashMap<String, Book>,
    /// Kept in insertion order.
    memberships: Vec<ShelfMembership>,
}

impl State {
    fn reader(&self, reader_id: ReaderId) -> PortResult<&Reader> {
        self.readers
            .get(&reader_id)
            .ok_or_else(|| reader_not_found(reader_id))
    }

    fn reader_mut(&mut self, reader_id: ReaderId) -> PortResult<&mut Reader> {
        self.readers
            .get_mut(&reader_id)
            .ok_or_else(|| reader_not_found(reader_id))
    }

    fn membership_index(&self, reader_id: ReaderId, book_id: &str) -> Option<usize> {
        self.memberships
            .iter()
            .position(|m| m.reader_id == reader_id && m.book_id == book_id)
    }

    fn apply(&mut self, reader_id: ReaderId, delta: CounterDelta) -> PortResult<()> {
        let reader = self.reader_mut(reader_id)?;
        reader.counts = delta.apply(reader.counts);
        Ok(())
    }

    fn books_where(&self, reader_id: ReaderId, keep: impl Fn(&ShelfMembership) -> bool) -> Vec<Book> {
        self.memberships
            .iter()
            .filter(|m| m.reader_id == reader_id && keep(m))
            .filter_map(|m| self.books.get(&m.book_id).cloned())
            .collect()
    }
}

fn reader_not_found(reader_id: ReaderId) -> PortError {
    PortError::NotFound(format!("Reader {} not found", reader_id))
}

fn membership_not_found(reader_id: ReaderId, book_id: &str) -> PortError {
    PortError::NotFound(format!("Book {} is not on the shelf of reader {}", book_id, reader_id))
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> PortResult<MutexGuard<'_, State>> {
        self.state
            .lock()
            .map_err(|_| PortError::Unexpected("memory store lock poisoned".to_string()))
    }
}

#[async_trait]
impl ReaderStore for MemoryStore {
    async fn register_reader(&self, reader_id: ReaderId, level: ReadingLevel) -> PortResult<Reader> {
        let mut state = self.lock()?;
        let reader = state
            .readers
            .entry(reader_id)
            .or_insert_with(|| Reader::new(reader_id, level));
        Ok(reader.clone())
    }

    async fn get_reader(&self, reader_id: ReaderId) -> PortResult<Reader> {
        Ok(self.lock()?.reader(reader_id)?.clone())
    }

    async fn set_reading_level(&self, reader_id: ReaderId, level: ReadingLevel) -> PortResult<()> {
        self.lock()?.reader_mut(reader_id)?.reading_level = level;
        Ok(())
    }
}

#[async_trait]
impl ShelfStore for MemoryStore {
    async fn add_to_shelf(&self, reader_id: ReaderId, book: &Book) -> PortResult<AddOutcome> {
        let mut state = self.lock()?;
        state.reader(reader_id)?;

        state
            .books
            .entry(book.id.clone())
            .or_insert_with(|| book.clone());

        if state.membership_index(reader_id, &book.id).is_some() {
            return Ok(AddOutcome::AlreadyOnShelf);
        }

        state.memberships.push(ShelfMembership {
            reader_id,
            book_id: book.id.clone(),
            is_completed: false,
            is_current_read: false,
            added_at: Utc::now(),
        });
        state.apply(reader_id, CounterDelta::added())?;
        Ok(AddOutcome::Added)
    }

    async fn remove_from_shelf(&self, reader_id: ReaderId, book_id: &str) -> PortResult<()> {
        let mut state = self.lock()?;
        state.reader(reader_id)?;

        let index = state
            .membership_index(reader_id, book_id)
            .ok_or_else(|| membership_not_found(reader_id, book_id))?;
        let removed = state.memberships.remove(index);
        state.apply(reader_id, CounterDelta::removed(removed.is_completed))
    }

    async fn complete_book(&self, reader_id: ReaderId, book_id: &str) -> PortResult<()> {
        let mut state = self.lock()?;
        state.reader(reader_id)?;

        let index = state
            .membership_index(reader_id, book_id)
            .ok_or_else(|| membership_not_found(reader_id, book_id))?;
        let row = &mut state.memberships[index];
        if row.is_completed {
            return Err(PortError::Conflict(format!("Book {} is already completed", book_id)));
        }
        row.is_completed = true;
        row.is_current_read = false;
        state.apply(reader_id, CounterDelta::completed())
    }

    async fn find_book_id_by_cover(&self, reader_id: ReaderId, cover: &str) -> PortResult<Option<String>> {
        let state = self.lock()?;
        state.reader(reader_id)?;

        let matches: Vec<&ShelfMembership> = state
            .memberships
            .iter()
            .filter(|m| m.reader_id == reader_id)
            .filter(|m| state.books.get(&m.book_id).is_some_and(|b| b.cover == cover))
            .collect();
        let chosen = matches
            .iter()
            .find(|m| !m.is_completed)
            .or_else(|| matches.first());
        Ok(chosen.map(|m| m.book_id.clone()))
    }

    async fn set_current_read(&self, reader_id: ReaderId, book_id: &str) -> PortResult<()> {
        let mut state = self.lock()?;
        state.reader(reader_id)?;

        let index = state
            .membership_index(reader_id, book_id)
            .ok_or_else(|| membership_not_found(reader_id, book_id))?;
        if state.memberships[index].is_completed {
            return Err(PortError::Conflict(format!(
                "Book {} is completed and cannot be the current read",
                book_id
            )));
        }

        for row in state.memberships.iter_mut().filter(|m| m.reader_id == reader_id) {
            row.is_current_read = false;
        }
        state.memberships[index].is_current_read = true;
        Ok(())
    }

    async fn current_read(&self, reader_id: ReaderId) -> PortResult<Option<Book>> {
        let state = self.lock()?;
        state.reader(reader_id)?;
        Ok(state.books_where(reader_id, |m| m.is_current_read).into_iter().next())
    }

    async fn list_shelf(&self, reader_id: ReaderId, completed: bool) -> PortResult<Vec<Book>> {
        let state = self.lock()?;
        state.reader(reader_id)?;
        Ok(state.books_where(reader_id, |m| m.is_completed == completed))
    }

    async fn shelf_counts(&self, reader_id: ReaderId) -> PortResult<ShelfCounts> {
        Ok(self.lock()?.reader(reader_id)?.counts)
    }

    async fn memberships(&self, reader_id: ReaderId) -> PortResult<Vec<ShelfMembership>> {
        let state = self.lock()?;
        state.reader(reader_id)?;
        Ok(state
            .memberships
            .iter()
            .filter(|m| m.reader_id == reader_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl BubbleStore for MemoryStore {
    async fn bubble_state(&self, reader_id: ReaderId) -> PortResult<BubbleState> {
        Ok(self.lock()?.reader(reader_id)?.bubble.clone())
    }

    async fn set_bubble(&self, reader_id: ReaderId, active: bool, count: u32) -> PortResult<BubbleStatus> {
        let mut state = self.lock()?;
        let bubble = &mut state.reader_mut(reader_id)?.bubble;
        bubble.active = active;
        bubble.count = count;
        Ok(BubbleStatus::from(&*bubble))
    }

    async fn increment_bubble(&self, reader_id: ReaderId) -> PortResult<BubbleStatus> {
        let mut state = self.lock()?;
        let bubble = &mut state.reader_mut(reader_id)?.bubble;
        bubble.count = bubble.count.saturating_add(1).min(MAX_BUBBLE_COUNT);
        Ok(BubbleStatus::from(&*bubble))
    }

    async fn decrement_bubble(&self, reader_id: ReaderId) -> PortResult<BubbleStatus> {
        let mut state = self.lock()?;
        let bubble = &mut state.reader_mut(reader_id)?.bubble;
        if !bubble.active || bubble.count == 0 {
            return Err(PortError::Conflict(DECREMENT_GUARD_MESSAGE.to_string()));
        }
        bubble.count -= 1;
        Ok(BubbleStatus::from(&*bubble))
    }

    async fn decay_bubble(&self, reader_id: ReaderId, today: NaiveDate) -> PortResult<DecayOutcome> {
        let mut state = self.lock()?;
        let bubble = &mut state.reader_mut(reader_id)?.bubble;
        if bubble.last_decremented_on.is_some_and(|last| last >= today) {
            return Ok(DecayOutcome::AlreadyAppliedToday);
        }
        if !bubble.active || bubble.count == 0 {
            return Err(PortError::Conflict(DECREMENT_GUARD_MESSAGE.to_string()));
        }
        bubble.count -= 1;
        bubble.last_decremented_on = Some(today);
        Ok(DecayOutcome::Decremented(BubbleStatus::from(&*bubble)))
    }

    async fn active_bubble_readers(&self) -> PortResult<Vec<ReaderId>> {
        let state = self.lock()?;
        Ok(state
            .readers
            .values()
            .filter(|r| r.bubble.active)
            .map(|r| r.id)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn book(id: &str) -> Book {
        Book {
            id: id.to_string(),
            title: "The Name of the Rose".to_string(),
            authors: vec!["Umberto Eco".to_string()],
            description: None,
            cover: format!("cover-{}", id),
            published_date: None,
        }
    }

    #[tokio::test]
    async fn unknown_reader_cannot_shelve_books() {
        let store = MemoryStore::new();
        let err = store.add_to_shelf(Uuid::new_v4(), &book("x")).await.unwrap_err();
        assert!(matches!(err, PortError::NotFound(_)));
        assert!(store.lock().unwrap().books.is_empty());
    }

    #[tokio::test]
    async fn cover_lookup_stays_on_the_readers_shelf() {
        let store = MemoryStore::new();
        let (first, second) = (Uuid::new_v4(), Uuid::new_v4());
        store.register_reader(first, ReadingLevel::Moderate).await.unwrap();
        store.register_reader(second, ReadingLevel::Moderate).await.unwrap();

        let mut edition_one = book("edition-1");
        edition_one.cover = "shared".to_string();
        let mut edition_two = book("edition-2");
        edition_two.cover = "shared".to_string();
        store.add_to_shelf(first, &edition_one).await.unwrap();
        store.add_to_shelf(second, &edition_two).await.unwrap();

        assert_eq!(
            store.find_book_id_by_cover(second, "shared").await.unwrap().as_deref(),
            Some("edition-2")
        );
        assert_eq!(
            store.find_book_id_by_cover(first, "shared").await.unwrap().as_deref(),
            Some("edition-1")
        );
        assert!(store.find_book_id_by_cover(first, "cover-x").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn cover_lookup_prefers_the_unfinished_copy() {
        let store = MemoryStore::new();
        let reader = Uuid::new_v4();
        store.register_reader(reader, ReadingLevel::Moderate).await.unwrap();

        let mut old = book("old");
        old.cover = "shared".to_string();
        let mut new = book("new");
        new.cover = "shared".to_string();
        store.add_to_shelf(reader, &old).await.unwrap();
        store.add_to_shelf(reader, &new).await.unwrap();
        store.complete_book(reader, "old").await.unwrap();

        assert_eq!(
            store.find_book_id_by_cover(reader, "shared").await.unwrap().as_deref(),
            Some("new")
        );
    }

    #[tokio::test]
    async fn removing_a_completed_book_decrements_completed() {
        let store = MemoryStore::new();
        let reader = Uuid::new_v4();
        store.register_reader(reader, ReadingLevel::Moderate).await.unwrap();
        store.add_to_shelf(reader, &book("x")).await.unwrap();
        store.complete_book(reader, "x").await.unwrap();

        store.remove_from_shelf(reader, "x").await.unwrap();

        assert_eq!(store.shelf_counts(reader).await.unwrap(), ShelfCounts::default());
        let err = store.remove_from_shelf(reader, "x").await.unwrap_err();
        assert!(matches!(err, PortError::NotFound(_)));
    }

    #[tokio::test]
    async fn completed_book_cannot_become_current() {
        let store = MemoryStore::new();
        let reader = Uuid::new_v4();
        store.register_reader(reader, ReadingLevel::Moderate).await.unwrap();
        store.add_to_shelf(reader, &book("x")).await.unwrap();
        store.set_current_read(reader, "x").await.unwrap();

        store.complete_book(reader, "x").await.unwrap();
        assert!(store.current_read(reader).await.unwrap().is_none());

        let err = store.set_current_read(reader, "x").await.unwrap_err();
        assert!(matches!(err, PortError::Conflict(_)));
        let err = store.complete_book(reader, "x").await.unwrap_err();
        assert!(matches!(err, PortError::Conflict(_)));
    }

    #[tokio::test]
    async fn registering_twice_keeps_existing_state() {
        let store = MemoryStore::new();
        let reader = Uuid::new_v4();
        store.register_reader(reader, ReadingLevel::Heavy).await.unwrap();
        store.set_bubble(reader, true, 7).await.unwrap();

        let again = store.register_reader(reader, ReadingLevel::Light).await.unwrap();
        assert_eq!(again.reading_level, ReadingLevel::Heavy);
        assert_eq!(again.bubble.count, 7);
    }
}
