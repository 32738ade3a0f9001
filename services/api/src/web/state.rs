//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use std::sync::Arc;
use tsundoku_core::ports::{BubbleStore, ReaderStore, ShelfStore};
use tsundoku_core::{BubbleService, ShelfService};

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub readers: Arc<dyn ReaderStore>,
    pub shelf: ShelfService,
    pub bubbles: BubbleService,
}

impl AppState {
    /// Wires every service to the same store.
    pub fn new<S>(store: Arc<S>) -> Self
    where
        S: ReaderStore + ShelfStore + BubbleStore + 'static,
    {
        Self {
            readers: store.clone(),
            shelf: ShelfService::new(store.clone()),
            bubbles: BubbleService::new(store),
        }
    }
}
