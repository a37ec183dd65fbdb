//! Live order feed — websocket push of order events to the stall owner.
//!
//! LIFECYCLE
//! =========
//! 1. Upgrade (owner only) → register a watcher and send a `snapshot` of
//!    the active orders.
//! 2. A writer task relays `OrderEvent`s from the watcher channel.
//! 3. Inbound frames are ignored until the client closes; then the watcher
//!    is removed.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::Response;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::event::OrderEvent;
use crate::routes::ApiError;
use crate::routes::auth::AuthUser;
use crate::routes::stalls::load_owned_stall;
use crate::services::feed::{self, WATCHER_CHANNEL_CAPACITY};
use crate::state::AppState;

/// `GET /api/stalls/:id/feed` — upgrade to the live feed.
pub async fn handle_feed(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(stall_id): Path<Uuid>,
    ws: WebSocketUpgrade,
) -> Result<Response, ApiError> {
    load_owned_stall(&state, &auth, stall_id).await?;
    let user_id = auth.user.id;
    Ok(ws.on_upgrade(move |socket| run_feed(socket, state, stall_id, user_id)))
}

async fn run_feed(socket: WebSocket, state: AppState, stall_id: Uuid, user_id: Uuid) {
    let connection_id = Uuid::new_v4();
    let (tx, mut rx) = mpsc::channel::<OrderEvent>(WATCHER_CHANNEL_CAPACITY);

    let Some(active) = feed::subscribe(&state, stall_id, connection_id, tx).await else {
        warn!(%stall_id, %connection_id, "feed: stall evicted before subscribe");
        return;
    };
    info!(%stall_id, %connection_id, %user_id, "feed: client connected");

    let (mut sink, mut stream) = socket.split();

    let mut writer = tokio::spawn(async move {
        let snapshot = OrderEvent::Snapshot { orders: active };
        if send_event(&mut sink, &snapshot).await.is_err() {
            return;
        }
        while let Some(event) = rx.recv().await {
            if send_event(&mut sink, &event).await.is_err() {
                break;
            }
        }
    });

    loop {
        tokio::select! {
            msg = stream.next() => {
                match msg {
                    Some(Ok(Message::Close(_)) | Err(_)) | None => break,
                    Some(Ok(_)) => {}
                }
            }
            _ = &mut writer => break,
        }
    }

    writer.abort();
    feed::unsubscribe(&state, stall_id, connection_id).await;
    info!(%stall_id, %connection_id, "feed: client disconnected");
}

async fn send_event<S>(sink: &mut S, event: &OrderEvent) -> Result<(), ()>
where
    S: futures::Sink<Message> + Unpin,
{
    let Ok(text) = serde_json::to_string(event) else {
        warn!(kind = event.kind(), "feed: event serialization failed");
        return Ok(());
    };
    sink.send(Message::Text(text.into())).await.map_err(|_| ())
}

#[cfg(test)]
#[path = "feed_test.rs"]
mod tests;
