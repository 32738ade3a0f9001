//! services/api/src/web/rest.rs
//!
//! The master definition for the OpenAPI specification, plus the pieces every
//! REST handler shares: error responses and request extraction.

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query,
    },
    http::StatusCode,
    response::Json,
};
use serde::{Deserialize, Serialize};
use tracing::{error, warn};
use tsundoku_core::ports::PortError;
use utoipa::{OpenApi, ToSchema};
use uuid::Uuid;

use crate::web::{bubble, readers, shelf};

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        readers::register_reader_handler,
        readers::get_level_handler,
        readers::set_level_handler,
        shelf::add_to_shelf_handler,
        shelf::set_current_read_handler,
        shelf::get_current_read_handler,
        shelf::remove_from_shelf_handler,
        shelf::complete_book_handler,
        shelf::list_to_be_read_handler,
        shelf::list_completed_handler,
        shelf::shelf_counts_handler,
        bubble::get_bubble_handler,
        bubble::set_bubble_handler,
        bubble::increment_bubble_handler,
        bubble::decrement_bubble_handler,
    ),
    components(
        schemas(
            ErrorResponse,
            MessageResponse,
            readers::RegisterReaderRequest,
            readers::ReadingLevelRequest,
            readers::ReaderResponse,
            readers::ReadingLevelResponse,
            shelf::BookPayload,
            shelf::AddToShelfRequest,
            shelf::BookActionRequest,
            shelf::CompleteBookRequest,
            shelf::BookResponse,
            shelf::ShelfCountsResponse,
            bubble::SetBubbleRequest,
            bubble::BubbleResponse,
            ReaderRequest,
        )
    ),
    tags(
        (name = "Tsundoku API", description = "Shelf membership and time bubble endpoints.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// Shared Payload Structs
//=========================================================================================

/// Body of every failed request.
#[derive(Serialize, Deserialize, ToSchema, Debug)]
pub struct ErrorResponse {
    pub error: String,
}

/// Confirmation returned by mutating shelf endpoints.
#[derive(Serialize, Deserialize, ToSchema, Debug)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}

impl MessageResponse {
    pub fn ok(message: impl Into<String>) -> Json<Self> {
        Json(Self {
            success: true,
            message: message.into(),
        })
    }
}

/// A request that only names the reader.
#[derive(Deserialize, ToSchema, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ReaderRequest {
    pub reader_id: Option<Uuid>,
}

/// Query string carrying the reader.
#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ReaderQuery {
    pub reader_id: Option<Uuid>,
}

//=========================================================================================
// Errors and Extraction
//=========================================================================================

pub type HandlerError = (StatusCode, Json<ErrorResponse>);

pub fn bad_request(message: impl Into<String>) -> HandlerError {
    let message = message.into();
    warn!("Rejected request: {}", message);
    (StatusCode::BAD_REQUEST, Json(ErrorResponse { error: message }))
}

/// Maps a port error to its status code and logs it once.
///
/// Server-side failures answer with `context` only; client errors carry the detail.
pub fn port_error(context: &str, e: PortError) -> HandlerError {
    let status = match &e {
        PortError::Validation(_) => StatusCode::BAD_REQUEST,
        PortError::NotFound(_) => StatusCode::NOT_FOUND,
        PortError::Conflict(_) => StatusCode::CONFLICT,
        PortError::Transient(_) | PortError::Unexpected(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };

    let message = if status.is_server_error() {
        error!("{}: {:?}", context, e);
        context.to_string()
    } else {
        warn!("{}: {}", context, e);
        e.to_string()
    };

    (status, Json(ErrorResponse { error: message }))
}

/// Unwraps a JSON body, turning malformed input into a 400.
pub fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, HandlerError> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| bad_request(rejection.body_text()))
}

/// Extracts the reader id from the query string.
pub fn reader_from_query(query: Result<Query<ReaderQuery>, QueryRejection>) -> Result<Uuid, HandlerError> {
    let Query(query) = query.map_err(|rejection| bad_request(rejection.body_text()))?;
    required(query.reader_id, "readerId")
}

/// Fails with 400 when a required field is absent.
pub fn required<T>(value: Option<T>, field: &str) -> Result<T, HandlerError> {
    value.ok_or_else(|| bad_request(format!("{} is required", field)))
}
