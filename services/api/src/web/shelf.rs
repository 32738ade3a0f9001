//! services/api/src/web/shelf.rs
//!
//! Shelf endpoints: adding, removing and completing books, the current read,
//! and shelf listings.

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    response::{IntoResponse, Json},
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tsundoku_core::domain::{Book, BookRef, NewBook, ShelfCounts};
use tsundoku_core::ports::{AddOutcome, PortError};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::web::rest::{
    bad_request, json_body, port_error, reader_from_query, required, HandlerError,
    MessageResponse, ReaderQuery,
};
use crate::web::state::AppState;

//=========================================================================================
// Request/Response Types
//=========================================================================================

/// Book attributes as returned by the metadata provider.
#[derive(Deserialize, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct BookPayload {
    pub book_id: Option<String>,
    pub title: Option<String>,
    #[serde(default)]
    pub authors: Vec<String>,
    pub description: Option<String>,
    pub cover: Option<String>,
    /// `YYYY`, `YYYY-MM` or `YYYY-MM-DD`.
    pub published_date: Option<String>,
}

impl From<BookPayload> for NewBook {
    fn from(payload: BookPayload) -> Self {
        NewBook {
            id: payload.book_id,
            title: payload.title,
            authors: payload.authors,
            description: payload.description,
            cover: payload.cover,
            published_date: payload.published_date,
        }
    }
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AddToShelfRequest {
    pub reader_id: Option<Uuid>,
    pub book: Option<BookPayload>,
}

/// Used by set-current-read and remove-from-shelf.
#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BookActionRequest {
    pub reader_id: Option<Uuid>,
    pub book_id: Option<String>,
}

/// Either the cover reference or the book id identifies the book. A blank
/// cover reference falls back to the book id.
#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CompleteBookRequest {
    pub reader_id: Option<Uuid>,
    pub book_cover_ref: Option<String>,
    pub book_id: Option<String>,
}

#[derive(Serialize, Deserialize, ToSchema, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BookResponse {
    pub book_id: String,
    pub title: String,
    pub authors: Vec<String>,
    pub description: Option<String>,
    pub cover: String,
    pub published_date: Option<NaiveDate>,
}

impl From<Book> for BookResponse {
    fn from(book: Book) -> Self {
        Self {
            book_id: book.id,
            title: book.title,
            authors: book.authors,
            description: book.description,
            cover: book.cover,
            published_date: book.published_date,
        }
    }
}

#[derive(Serialize, Deserialize, ToSchema, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ShelfCountsResponse {
    pub total_to_be_read: u32,
    pub total_completed: u32,
}

impl From<ShelfCounts> for ShelfCountsResponse {
    fn from(counts: ShelfCounts) -> Self {
        Self {
            total_to_be_read: counts.total_to_be_read,
            total_completed: counts.total_completed,
        }
    }
}

fn books_response(books: Vec<Book>) -> Json<Vec<BookResponse>> {
    Json(books.into_iter().map(BookResponse::from).collect())
}

//=========================================================================================
// Mutating Handlers
//=========================================================================================

/// POST /add-to-shelf - Put a book on the reader's to-be-read shelf
#[utoipa::path(
    post,
    path = "/add-to-shelf",
    request_body = AddToShelfRequest,
    responses(
        (status = 200, description = "Book on the shelf", body = MessageResponse),
        (status = 400, description = "Missing readerId, book, or book identifier"),
        (status = 404, description = "Unknown reader"),
        (status = 500, description = "Store error")
    )
)]
pub async fn add_to_shelf_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<AddToShelfRequest>, JsonRejection>,
) -> Result<impl IntoResponse, HandlerError> {
    let req = json_body(payload)?;
    let reader_id = required(req.reader_id, "readerId")?;
    let book = required(req.book, "book")?;

    let outcome = state
        .shelf
        .add_to_shelf(reader_id, book.into())
        .await
        .map_err(|e| port_error("Failed to add book to shelf", e))?;

    Ok(match outcome {
        AddOutcome::Added => MessageResponse::ok("Book added to shelf and count updated"),
        AddOutcome::AlreadyOnShelf => MessageResponse::ok("Book is already on the shelf"),
    })
}

/// POST /set-current-read - Make a shelved book the reader's current read
#[utoipa::path(
    post,
    path = "/set-current-read",
    request_body = BookActionRequest,
    responses(
        (status = 200, description = "Current read set", body = MessageResponse),
        (status = 400, description = "Missing readerId or bookId"),
        (status = 404, description = "Book is not on the reader's shelf"),
        (status = 409, description = "Book is already completed")
    )
)]
pub async fn set_current_read_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<BookActionRequest>, JsonRejection>,
) -> Result<impl IntoResponse, HandlerError> {
    let req = json_body(payload)?;
    let reader_id = required(req.reader_id, "readerId")?;
    let book_id = required(req.book_id, "bookId")?;

    state
        .shelf
        .set_current_read(reader_id, &book_id)
        .await
        .map_err(|e| port_error("Failed to set current read", e))?;

    Ok(MessageResponse::ok("Book set as current read"))
}

/// POST /remove-from-shelf - Take a book off the reader's shelf
#[utoipa::path(
    post,
    path = "/remove-from-shelf",
    request_body = BookActionRequest,
    responses(
        (status = 200, description = "Book removed", body = MessageResponse),
        (status = 400, description = "Missing readerId or bookId"),
        (status = 404, description = "Book is not on the reader's shelf")
    )
)]
pub async fn remove_from_shelf_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<BookActionRequest>, JsonRejection>,
) -> Result<impl IntoResponse, HandlerError> {
    let req = json_body(payload)?;
    let reader_id = required(req.reader_id, "readerId")?;
    let book_id = required(req.book_id, "bookId")?;

    state
        .shelf
        .remove_from_shelf(reader_id, &book_id)
        .await
        .map_err(|e| port_error("Failed to remove book from shelf", e))?;

    Ok(MessageResponse::ok("Book removed from shelf and count updated"))
}

/// POST /complete-book - Move a book to the completed shelf
#[utoipa::path(
    post,
    path = "/complete-book",
    request_body = CompleteBookRequest,
    responses(
        (status = 200, description = "Book completed", body = MessageResponse),
        (status = 400, description = "Missing readerId, or neither bookCoverRef nor bookId"),
        (status = 404, description = "Cover unknown or book not on the shelf"),
        (status = 409, description = "Book already completed")
    )
)]
pub async fn complete_book_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CompleteBookRequest>, JsonRejection>,
) -> Result<impl IntoResponse, HandlerError> {
    let req = json_body(payload)?;
    let reader_id = required(req.reader_id, "readerId")?;
    let cover = req.book_cover_ref.filter(|cover| !cover.trim().is_empty());
    let book = match (cover, req.book_id) {
        (Some(cover), _) => BookRef::Cover(cover),
        (None, Some(id)) => BookRef::Id(id),
        (None, None) => return Err(bad_request("bookCoverRef or bookId is required")),
    };

    state
        .shelf
        .complete_book(reader_id, book)
        .await
        .map_err(|e| port_error("Failed to move book to completed shelf", e))?;

    Ok(MessageResponse::ok("Book moved to completed shelf and counts updated"))
}

//=========================================================================================
// Read-only Handlers
//=========================================================================================

/// GET /current-read - The reader's current read
#[utoipa::path(
    get,
    path = "/current-read",
    params(("readerId" = Uuid, Query, description = "The reader's identifier.")),
    responses(
        (status = 200, description = "The current read", body = BookResponse),
        (status = 400, description = "Missing readerId"),
        (status = 404, description = "No current read, or unknown reader")
    )
)]
pub async fn get_current_read_handler(
    State(state): State<Arc<AppState>>,
    query: Result<Query<ReaderQuery>, QueryRejection>,
) -> Result<impl IntoResponse, HandlerError> {
    let reader_id = reader_from_query(query)?;

    let book = state
        .shelf
        .get_current_read(reader_id)
        .await
        .map_err(|e| port_error("Failed to fetch current read", e))?
        .ok_or_else(|| {
            port_error(
                "Failed to fetch current read",
                PortError::NotFound("No current read found for this reader".to_string()),
            )
        })?;

    Ok(Json(BookResponse::from(book)))
}

/// GET /shelf/to-be-read - Books waiting to be read, oldest first
#[utoipa::path(
    get,
    path = "/shelf/to-be-read",
    params(("readerId" = Uuid, Query, description = "The reader's identifier.")),
    responses(
        (status = 200, description = "To-be-read books", body = [BookResponse]),
        (status = 400, description = "Missing readerId"),
        (status = 404, description = "Unknown reader")
    )
)]
pub async fn list_to_be_read_handler(
    State(state): State<Arc<AppState>>,
    query: Result<Query<ReaderQuery>, QueryRejection>,
) -> Result<impl IntoResponse, HandlerError> {
    let reader_id = reader_from_query(query)?;
    let books = state
        .shelf
        .list_to_be_read(reader_id)
        .await
        .map_err(|e| port_error("Failed to list to-be-read shelf", e))?;
    Ok(books_response(books))
}

/// GET /shelf/completed - Completed books, oldest first
#[utoipa::path(
    get,
    path = "/shelf/completed",
    params(("readerId" = Uuid, Query, description = "The reader's identifier.")),
    responses(
        (status = 200, description = "Completed books", body = [BookResponse]),
        (status = 400, description = "Missing readerId"),
        (status = 404, description = "Unknown reader")
    )
)]
pub async fn list_completed_handler(
    State(state): State<Arc<AppState>>,
    query: Result<Query<ReaderQuery>, QueryRejection>,
) -> Result<impl IntoResponse, HandlerError> {
    let reader_id = reader_from_query(query)?;
    let books = state
        .shelf
        .list_completed(reader_id)
        .await
        .map_err(|e| port_error("Failed to list completed shelf", e))?;
    Ok(books_response(books))
}

/// GET /shelf/counts - The reader's shelf counters
#[utoipa::path(
    get,
    path = "/shelf/counts",
    params(("readerId" = Uuid, Query, description = "The reader's identifier.")),
    responses(
        (status = 200, description = "Shelf counters", body = ShelfCountsResponse),
        (status = 400, description = "Missing readerId"),
        (status = 404, description = "Unknown reader")
    )
)]
pub async fn shelf_counts_handler(
    State(state): State<Arc<AppState>>,
    query: Result<Query<ReaderQuery>, QueryRejection>,
) -> Result<impl IntoResponse, HandlerError> {
    let reader_id = reader_from_query(query)?;
    let counts = state
        .shelf
        .shelf_counts(reader_id)
        .await
        .map_err(|e| port_error("Failed to fetch shelf counts", e))?;
    Ok(Json(ShelfCountsResponse::from(counts)))
}
