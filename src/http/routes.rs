//! Matchmaking API routes
//!
//! `POST /api/matchmaking/join`, `POST /api/matchmaking/cancel` and the
//! server-sent event stream at `GET /api/matchmaking/events?playerId=`.

use crate::error::{classify, MatchmakingError};
use crate::http::HttpState;
use crate::types::{CancelRequest, JoinRequest, NotificationEvent};
use axum::{
    extract::{rejection::JsonRejection, Query, State},
    http::StatusCode,
    response::{
        sse::{Event, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::convert::Infallible;
use tokio_stream::StreamExt;
use tracing::{debug, error};

pub fn router() -> Router<HttpState> {
    Router::new()
        .route("/api/matchmaking/join", post(join_handler))
        .route("/api/matchmaking/cancel", post(cancel_handler))
        .route("/api/matchmaking/events", get(events_handler))
}

#[derive(Debug, Deserialize)]
pub struct EventsQuery {
    #[serde(rename = "playerId")]
    pub player_id: Option<String>,
}

/// Map a service error onto the response the client sees
fn error_response(error: anyhow::Error) -> Response {
    match classify(&error) {
        Some(MatchmakingError::InvalidInput { reason }) => {
            (StatusCode::BAD_REQUEST, Json(json!({ "error": reason }))).into_response()
        }
        _ => {
            error!("Request failed: {:#}", error);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Internal server error" })),
            )
                .into_response()
        }
    }
}

fn bad_body(rejection: JsonRejection) -> Response {
    debug!("Rejected request body: {}", rejection);
    (
        StatusCode::BAD_REQUEST,
        Json(json!({ "error": "Invalid request body" })),
    )
        .into_response()
}

async fn join_handler(
    State(state): State<HttpState>,
    body: Result<Json<JoinRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match body {
        Ok(body) => body,
        Err(rejection) => return bad_body(rejection),
    };

    match state.service.join_queue(request).await {
        Ok(entry) => Json(json!({
            "success": true,
            "message": "Joined matchmaking queue",
            "playerId": entry.player_id,
        }))
        .into_response(),
        Err(e) => error_response(e),
    }
}

async fn cancel_handler(
    State(state): State<HttpState>,
    body: Result<Json<CancelRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match body {
        Ok(body) => body,
        Err(rejection) => return bad_body(rejection),
    };

    match state.service.cancel_queue(&request.player_id).await {
        Ok(_) => Json(json!({
            "success": true,
            "message": "Left matchmaking queue",
        }))
        .into_response(),
        Err(e) => error_response(e),
    }
}

async fn events_handler(
    State(state): State<HttpState>,
    Query(query): Query<EventsQuery>,
) -> Response {
    let player_id = query.player_id.unwrap_or_default();

    let session = match state.service.open_notification_channel(&player_id) {
        Ok(session) => session,
        Err(e) => return error_response(e),
    };

    let (_, events) = session.into_stream();
    let frames = events.map(|event| Ok::<_, Infallible>(to_sse_frame(&event)));

    Sse::new(frames).into_response()
}

/// Keep-alive becomes an SSE comment; everything else a `data:` JSON frame
fn to_sse_frame(event: &NotificationEvent) -> Event {
    match event {
        NotificationEvent::KeepAlive => Event::default().comment("heartbeat"),
        _ => Event::default().json_data(event).unwrap_or_else(|e| {
            error!("Failed to encode {} event: {}", event.kind(), e);
            Event::default().comment("encoding error")
        }),
    }
}
