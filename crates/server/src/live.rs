//! WebSocket push of live events, and wiring of the watch loop.

use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use mrqa_compliance::TemplateChecker;
use mrqa_ingest::FieldReader;
use mrqa_live::{Broadcaster, DicomWatcher, LiveEvent, LiveMonitor, MonitorSettings};

use crate::state::AppState;

// ── WebSocket Handler ───────────────────────────────────────────

pub async fn ws_upgrade(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_ws(socket, state))
}

async fn handle_ws(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();
    // Subscribe before reading the snapshot so nothing falls in between.
    let mut rx = state.broadcaster.subscribe();

    for msg in snapshot_messages(&state.broadcaster).await {
        if sender.send(Message::Text(msg.into())).await.is_err() {
            return;
        }
    }

    let send_task = tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(msg) => {
                    if sender.send(Message::Text(msg.into())).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "websocket client lagging, events skipped");
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    // Incoming content is ignored; only a close ends the session.
    let recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            if matches!(msg, Message::Close(_)) {
                break;
            }
        }
    });

    tokio::select! {
        _ = send_task => {},
        _ = recv_task => {},
    }
    debug!("websocket client disconnected");
}

/// The current state, as one `new` event per station.
pub async fn snapshot_messages(broadcaster: &Broadcaster) -> Vec<String> {
    broadcaster
        .snapshot()
        .await
        .into_iter()
        .map(|(station, content)| LiveEvent::New { station, content }.to_json())
        .collect()
}

// ── Watch Loop ──────────────────────────────────────────────────

/// Start watching `dirs` and spawn the monitor task.
///
/// The returned watcher must be kept alive; dropping it closes the event
/// channel and the monitor stops.
pub fn spawn_monitor(
    dirs: &[PathBuf],
    queue: usize,
    reader: Arc<dyn FieldReader>,
    checker: TemplateChecker,
    broadcaster: Broadcaster,
    settings: MonitorSettings,
) -> mrqa_live::Result<DicomWatcher> {
    let (tx, rx) = mpsc::channel::<PathBuf>(queue.max(1));
    let watcher = DicomWatcher::start(dirs, tx)?;
    let monitor = LiveMonitor::new(reader, checker, broadcaster, settings);
    tokio::spawn(monitor.run(rx));
    info!(dirs = watcher.dirs().len(), "live monitor spawned");
    Ok(watcher)
}
