//! WebSocket progress fan-out with backpressure support.
//!
//! One subscription per connected client, filtered to a single video id.
//! Frames are forwarded at-most-once; a disconnect unsubscribes immediately
//! by dropping the pub/sub stream.

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::time::interval;
use tracing::{debug, info, warn};
use uuid::Uuid;

use vidpipe_models::VideoId;

use crate::metrics;
use crate::state::AppState;

/// Global counter for active WebSocket connections.
static ACTIVE_WS_CONNECTIONS: AtomicI64 = AtomicI64::new(0);

const WS_SEND_BUFFER_SIZE: usize = 32;
const WS_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// Send a frame with backpressure handling.
async fn send_ws_message(tx: &mpsc::Sender<Message>, json: String) -> bool {
    match tx.try_send(Message::Text(json.clone())) {
        Ok(_) => true,
        Err(mpsc::error::TrySendError::Full(_)) => {
            // Channel full; block until the client drains or drops.
            debug!("WebSocket send buffer full, applying backpressure");
            tx.send(Message::Text(json)).await.is_ok()
        }
        Err(mpsc::error::TrySendError::Closed(_)) => false,
    }
}

/// WebSocket endpoint: `/ws/progress/:video_id`.
pub async fn ws_progress(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Path(video_id): Path<Uuid>,
) -> impl IntoResponse {
    let count = ACTIVE_WS_CONNECTIONS.fetch_add(1, Ordering::SeqCst) + 1;
    metrics::set_ws_active_connections(count);
    metrics::record_ws_connection();

    ws.on_upgrade(move |socket| async move {
        handle_progress_socket(socket, state, VideoId(video_id)).await;
        let count = ACTIVE_WS_CONNECTIONS.fetch_sub(1, Ordering::SeqCst) - 1;
        metrics::set_ws_active_connections(count);
    })
}

async fn handle_progress_socket(socket: WebSocket, state: AppState, video_id: VideoId) {
    let (ws_sender, mut receiver) = socket.split();

    // Bounded channel between the fan-out and the socket writer.
    let (tx, mut rx) = mpsc::channel::<Message>(WS_SEND_BUFFER_SIZE);

    let send_task = tokio::spawn(async move {
        let mut ws_sender = ws_sender;
        while let Some(msg) = rx.recv().await {
            if ws_sender.send(msg).await.is_err() {
                break;
            }
        }
    });

    let mut stream = match state.progress.subscribe(&video_id).await {
        Ok(s) => s,
        Err(e) => {
            warn!(video_id = %video_id, "Progress subscribe failed: {}", e);
            let _ = tx
                .send(Message::Text(
                    serde_json::json!({
                        "success": false,
                        "error": "external-io",
                        "message": "failed to subscribe to progress",
                    })
                    .to_string(),
                ))
                .await;
            drop(tx);
            let _ = send_task.await;
            return;
        }
    };

    info!(video_id = %video_id, "Progress subscription opened");
    let mut heartbeat = interval(WS_HEARTBEAT_INTERVAL);

    loop {
        tokio::select! {
            // Frame from a worker
            frame = stream.next() => {
                match frame {
                    Some(frame) => {
                        let json = match serde_json::to_string(&frame) {
                            Ok(j) => j,
                            Err(_) => continue,
                        };
                        metrics::record_ws_frame_sent();
                        if !send_ws_message(&tx, json).await {
                            warn!(video_id = %video_id, "Client gone, closing fan-out");
                            break;
                        }
                    }
                    None => break,
                }
            }
            // Keep the connection alive through idle stretches
            _ = heartbeat.tick() => {
                if tx.send(Message::Ping(vec![])).await.is_err() {
                    break;
                }
            }
            // Client messages: only close/pong matter
            client_msg = receiver.next() => {
                match client_msg {
                    Some(Ok(Message::Close(_))) | None => {
                        info!(video_id = %video_id, "Client closed progress socket");
                        break;
                    }
                    _ => {}
                }
            }
        }
    }

    // Dropping the stream unsubscribes from the channel.
    drop(stream);
    drop(tx);
    let _ = send_task.await;
}
