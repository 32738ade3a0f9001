//! services/api/src/web/bubble.rs
//!
//! Time bubble endpoints.

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tsundoku_core::domain::BubbleStatus;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::web::rest::{
    json_body, port_error, reader_from_query, required, HandlerError, ReaderQuery, ReaderRequest,
};
use crate::web::state::AppState;

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SetBubbleRequest {
    pub reader_id: Option<Uuid>,
    pub active: Option<bool>,
    /// Defaults to 0. Ignored (forced to 0) when turning the bubble off.
    pub count: Option<i64>,
}

#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, Copy, PartialEq, Eq)]
pub struct BubbleResponse {
    pub active: bool,
    pub count: u32,
}

impl From<BubbleStatus> for BubbleResponse {
    fn from(status: BubbleStatus) -> Self {
        Self {
            active: status.active,
            count: status.count,
        }
    }
}

/// GET /bubble - The reader's bubble state
#[utoipa::path(
    get,
    path = "/bubble",
    params(("readerId" = Uuid, Query, description = "The reader's identifier.")),
    responses(
        (status = 200, description = "Bubble state", body = BubbleResponse),
        (status = 400, description = "Missing readerId"),
        (status = 404, description = "Unknown reader")
    )
)]
pub async fn get_bubble_handler(
    State(state): State<Arc<AppState>>,
    query: Result<Query<ReaderQuery>, QueryRejection>,
) -> Result<impl IntoResponse, HandlerError> {
    let reader_id = reader_from_query(query)?;
    let status = state
        .bubbles
        .get_status(reader_id)
        .await
        .map_err(|e| port_error("Failed to fetch bubble state", e))?;
    Ok(Json(BubbleResponse::from(status)))
}

/// POST /bubble - Turn the bubble on or off and set its count
#[utoipa::path(
    post,
    path = "/bubble",
    request_body = SetBubbleRequest,
    responses(
        (status = 200, description = "Bubble state stored", body = BubbleResponse),
        (status = 400, description = "Missing readerId or active, or negative count"),
        (status = 404, description = "Unknown reader")
    )
)]
pub async fn set_bubble_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<SetBubbleRequest>, JsonRejection>,
) -> Result<impl IntoResponse, HandlerError> {
    let req = json_body(payload)?;
    let reader_id = required(req.reader_id, "readerId")?;
    let active = required(req.active, "active")?;
    // Turning the bubble off always clears it.
    let count = if active { req.count.unwrap_or(0) } else { 0 };

    let status = state
        .bubbles
        .set_status(reader_id, active, count)
        .await
        .map_err(|e| port_error("Failed to update bubble state", e))?;
    Ok(Json(BubbleResponse::from(status)))
}

/// POST /bubble/increment - Add one day to the bubble
#[utoipa::path(
    post,
    path = "/bubble/increment",
    request_body = ReaderRequest,
    responses(
        (status = 200, description = "New bubble state", body = BubbleResponse),
        (status = 400, description = "Missing readerId"),
        (status = 404, description = "Unknown reader")
    )
)]
pub async fn increment_bubble_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ReaderRequest>, JsonRejection>,
) -> Result<impl IntoResponse, HandlerError> {
    let req = json_body(payload)?;
    let reader_id = required(req.reader_id, "readerId")?;
    let status = state
        .bubbles
        .increment(reader_id)
        .await
        .map_err(|e| port_error("Failed to increment bubble", e))?;
    Ok(Json(BubbleResponse::from(status)))
}

/// POST /bubble/decrement - Remove one day from an active, non-empty bubble
#[utoipa::path(
    post,
    path = "/bubble/decrement",
    request_body = ReaderRequest,
    responses(
        (status = 200, description = "New bubble state", body = BubbleResponse),
        (status = 400, description = "Missing readerId"),
        (status = 404, description = "Unknown reader"),
        (status = 409, description = "Bubble inactive or already zero")
    )
)]
pub async fn decrement_bubble_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ReaderRequest>, JsonRejection>,
) -> Result<impl IntoResponse, HandlerError> {
    let req = json_body(payload)?;
    let reader_id = required(req.reader_id, "readerId")?;
    let status = state
        .bubbles
        .decrement(reader_id)
        .await
        .map_err(|e| port_error("Failed to decrement bubble", e))?;
    Ok(Json(BubbleResponse::from(status)))
}
