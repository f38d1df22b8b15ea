use std::convert::Infallible;

use axum::{
    extract::{Path, State},
    response::sse::{Event, KeepAlive, Sse},
    response::{IntoResponse, Response},
    Extension,
};
use futures::stream;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::middleware::auth::AuthUser;
use crate::services::broadcast_service::{attempt_channel, OutboundEvent, ADMIN_CHANNEL};
use crate::AppState;

/// Live event feed for one attempt, for its owner or an admin.
#[axum::debug_handler]
pub async fn attempt_events(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(attempt_id): Path<Uuid>,
) -> crate::error::Result<Response> {
    let (attempt, _) = state
        .lifecycle
        .attempt_detail(attempt_id, user.user_id, user.is_admin())
        .await?;

    tracing::info!("User {} subscribed to attempt {}", user.user_id, attempt.id);
    let rx = state.broadcaster.subscribe(&attempt_channel(attempt.id));
    Ok(sse_response(rx))
}

/// Firehose of every attempt event across the service.
#[axum::debug_handler]
pub async fn admin_events(State(state): State<AppState>) -> crate::error::Result<Response> {
    let rx = state.broadcaster.subscribe(ADMIN_CHANNEL);
    Ok(sse_response(rx))
}

fn sse_response(rx: broadcast::Receiver<OutboundEvent>) -> Response {
    let stream = stream::unfold(rx, |mut rx| async move {
        loop {
            match rx.recv().await {
                Ok(OutboundEvent { event, payload }) => {
                    match Event::default().event(event).json_data(&payload) {
                        Ok(frame) => return Some((Ok::<Event, Infallible>(frame), rx)),
                        Err(e) => {
                            tracing::error!("Failed to encode SSE frame: {}", e);
                            continue;
                        }
                    }
                }
                // A slow consumer rejoins at the live edge rather than
                // killing the stream.
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!("SSE subscriber lagged, skipped {} event(s)", skipped);
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::default()).into_response()
}
