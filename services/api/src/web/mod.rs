//! services/api/src/web/mod.rs
//!
//! HTTP surface of the service.

pub mod bubble;
pub mod readers;
pub mod rest;
pub mod shelf;
pub mod state;

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use state::AppState;

/// Builds the API router with every REST route attached.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/readers", post(readers::register_reader_handler))
        .route(
            "/level",
            get(readers::get_level_handler).post(readers::set_level_handler),
        )
        .route("/add-to-shelf", post(shelf::add_to_shelf_handler))
        .route("/set-current-read", post(shelf::set_current_read_handler))
        .route("/current-read", get(shelf::get_current_read_handler))
        .route("/remove-from-shelf", post(shelf::remove_from_shelf_handler))
        .route("/complete-book", post(shelf::complete_book_handler))
        .route("/shelf/to-be-read", get(shelf::list_to_be_read_handler))
        .route("/shelf/completed", get(shelf::list_completed_handler))
        .route("/shelf/counts", get(shelf::shelf_counts_handler))
        .route(
            "/bubble",
            get(bubble::get_bubble_handler).post(bubble::set_bubble_handler),
        )
        .route("/bubble/increment", post(bubble::increment_bubble_handler))
        .route("/bubble/decrement", post(bubble::decrement_bubble_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
