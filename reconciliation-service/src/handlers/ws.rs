use crate::dtos::{ClientMessage, ServerMessage};
use crate::jobs::{JobManager, JobView, ProgressEvent};
use crate::startup::AppState;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt};
use std::collections::HashMap;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use uuid::Uuid;

const OUTBOUND_BUFFER: usize = 32;

/// Progress subscriptions over a WebSocket.
///
/// Clients send `{"type":"subscribe","jobId":…}` and receive the job's
/// current state followed by every later progress event until the job
/// finishes, they unsubscribe, or the socket closes.
pub async fn progress_socket(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| serve_socket(socket, state.manager))
}

async fn serve_socket(socket: WebSocket, manager: JobManager) {
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::channel::<ServerMessage>(OUTBOUND_BUFFER);

    let writer = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            let text = match serde_json::to_string(&message) {
                Ok(text) => text,
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to encode progress message");
                    continue;
                }
            };
            if sink.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    let mut subscriptions: HashMap<Uuid, JoinHandle<()>> = HashMap::new();
    tracing::debug!("Progress socket opened");

    while let Some(Ok(message)) = stream.next().await {
        let text = match message {
            Message::Text(text) => text,
            Message::Close(_) => break,
            _ => continue,
        };

        let reply = match serde_json::from_str::<ClientMessage>(&text) {
            Ok(ClientMessage::Subscribe { job_id }) => match manager.watch(job_id) {
                Ok((view, receiver)) => {
                    tracing::debug!(job_id = %job_id, status = view.status.as_str(), "Progress subscription");
                    // Snapshot goes out before any buffered event is relayed.
                    if tx.send(ServerMessage::Progress(snapshot(&view))).await.is_err() {
                        break;
                    }
                    if !view.status.is_terminal() {
                        let forwarder = forward_progress(job_id, receiver, tx.clone());
                        if let Some(previous) = subscriptions.insert(job_id, forwarder) {
                            previous.abort();
                        }
                    }
                    continue;
                }
                Err(e) => ServerMessage::Error {
                    message: e.to_string(),
                },
            },
            Ok(ClientMessage::Unsubscribe { job_id }) => {
                if let Some(handle) = subscriptions.remove(&job_id) {
                    handle.abort();
                }
                continue;
            }
            Err(e) => ServerMessage::Error {
                message: format!("Invalid message: {}", e),
            },
        };

        if tx.send(reply).await.is_err() {
            break;
        }
    }

    for (_, handle) in subscriptions {
        handle.abort();
    }
    writer.abort();
    tracing::debug!("Progress socket closed");
}

/// Relay one job's broadcast events into the socket's outbound queue.
fn forward_progress(
    job_id: Uuid,
    mut receiver: broadcast::Receiver<ProgressEvent>,
    tx: mpsc::Sender<ServerMessage>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match receiver.recv().await {
                Ok(event) => {
                    if tx.send(ServerMessage::Progress(event)).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::debug!(job_id = %job_id, skipped, "Progress subscriber lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

fn snapshot(view: &JobView) -> ProgressEvent {
    ProgressEvent {
        job_id: view.job_id,
        progress: view.progress,
        stage: view.stage.clone(),
        status: view.status,
    }
}
