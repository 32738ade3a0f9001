//! services/api/src/web/readers.rs
//!
//! Reader registration and reading-level endpoints. The reader id comes from
//! the identity provider; this service only records it.

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tsundoku_core::domain::{Reader, ReadingLevel};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::web::bubble::BubbleResponse;
use crate::web::rest::{
    json_body, port_error, reader_from_query, required, HandlerError, ReaderQuery,
};
use crate::web::state::AppState;

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegisterReaderRequest {
    pub reader_id: Option<Uuid>,
    /// LIGHT, MODERATE or HEAVY. Defaults to MODERATE.
    pub reading_level: Option<String>,
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReadingLevelRequest {
    pub reader_id: Option<Uuid>,
    pub reading_level: Option<String>,
}

#[derive(Serialize, Deserialize, ToSchema, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ReaderResponse {
    pub reader_id: Uuid,
    pub reading_level: String,
    pub total_to_be_read: u32,
    pub total_completed: u32,
    pub bubble: BubbleResponse,
}

impl From<Reader> for ReaderResponse {
    fn from(reader: Reader) -> Self {
        Self {
            reader_id: reader.id,
            reading_level: reader.reading_level.to_string(),
            total_to_be_read: reader.counts.total_to_be_read,
            total_completed: reader.counts.total_completed,
            bubble: BubbleResponse {
                active: reader.bubble.active,
                count: reader.bubble.count,
            },
        }
    }
}

#[derive(Serialize, Deserialize, ToSchema, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ReadingLevelResponse {
    pub reading_level: String,
}

//=========================================================================================
// Handlers
//=========================================================================================

/// POST /readers - Register a reader handed over by the identity provider
#[utoipa::path(
    post,
    path = "/readers",
    request_body = RegisterReaderRequest,
    responses(
        (status = 200, description = "Reader registered (or already known)", body = ReaderResponse),
        (status = 400, description = "Missing readerId or invalid reading level"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn register_reader_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<RegisterReaderRequest>, JsonRejection>,
) -> Result<impl IntoResponse, HandlerError> {
    let req = json_body(payload)?;
    let reader_id = required(req.reader_id, "readerId")?;
    let level = match req.reading_level.as_deref() {
        Some(raw) => raw
            .parse::<ReadingLevel>()
            .map_err(|e| port_error("Failed to register reader", e))?,
        None => ReadingLevel::default(),
    };

    let reader = state
        .readers
        .register_reader(reader_id, level)
        .await
        .map_err(|e| port_error("Failed to register reader", e))?;

    Ok(Json(ReaderResponse::from(reader)))
}

/// GET /level - Fetch a reader's reading level
#[utoipa::path(
    get,
    path = "/level",
    params(("readerId" = Uuid, Query, description = "The reader's identifier.")),
    responses(
        (status = 200, description = "Current reading level", body = ReadingLevelResponse),
        (status = 400, description = "Missing readerId"),
        (status = 404, description = "Unknown reader")
    )
)]
pub async fn get_level_handler(
    State(state): State<Arc<AppState>>,
    query: Result<Query<ReaderQuery>, QueryRejection>,
) -> Result<impl IntoResponse, HandlerError> {
    let reader_id = reader_from_query(query)?;
    let reader = state
        .readers
        .get_reader(reader_id)
        .await
        .map_err(|e| port_error("Failed to fetch reading level", e))?;

    Ok(Json(ReadingLevelResponse {
        reading_level: reader.reading_level.to_string(),
    }))
}

/// POST /level - Update a reader's reading level
#[utoipa::path(
    post,
    path = "/level",
    request_body = ReadingLevelRequest,
    responses(
        (status = 200, description = "Reading level updated", body = ReadingLevelResponse),
        (status = 400, description = "Missing fields or invalid reading level"),
        (status = 404, description = "Unknown reader")
    )
)]
pub async fn set_level_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ReadingLevelRequest>, JsonRejection>,
) -> Result<impl IntoResponse, HandlerError> {
    let req = json_body(payload)?;
    let reader_id = required(req.reader_id, "readerId")?;
    let level = required(req.reading_level, "readingLevel")?
        .parse::<ReadingLevel>()
        .map_err(|e| port_error("Failed to update reading level", e))?;

    state
        .readers
        .set_reading_level(reader_id, level)
        .await
        .map_err(|e| port_error("Failed to update reading level", e))?;

    Ok(Json(ReadingLevelResponse {
        reading_level: level.to_string(),
    }))
}
