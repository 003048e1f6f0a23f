use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tracing::{info, warn};

use courier_db::Database;
use courier_types::events::GatewayCommand;

use crate::dispatcher::{ConnId, Dispatcher};

/// Heartbeat interval: server sends a Ping every 15 seconds.
/// If 2 consecutive Pongs are missed (~30s), the connection is dropped.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

/// Handle a single WebSocket connection: forward room events to the client,
/// apply join/leave commands, and bridge enqueue requests to the device
/// queue. On any exit path the connection's subscriptions are dropped.
pub async fn handle_connection(socket: WebSocket, dispatcher: Dispatcher, db: Arc<Database>) {
    let (mut sender, mut receiver) = socket.split();

    let (conn_id, mut event_rx) = dispatcher.register_connection().await;
    info!("gateway connection {} opened", conn_id);

    let pong_received = Arc::new(AtomicBool::new(true));
    let pong_flag_send = pong_received.clone();
    let pong_flag_recv = pong_received.clone();

    // Forward room events -> client, with heartbeat.
    let mut send_task = tokio::spawn(async move {
        let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
        heartbeat.tick().await;
        let mut missed_heartbeats: u8 = 0;

        loop {
            tokio::select! {
                event = event_rx.recv() => {
                    let Some(event) = event else { break };
                    let text = match serde_json::to_string(&event) {
                        Ok(text) => text,
                        Err(e) => {
                            warn!("failed to encode gateway event: {}", e);
                            continue;
                        }
                    };
                    if sender.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                _ = heartbeat.tick() => {
                    if pong_flag_send.swap(false, Ordering::Acquire) {
                        missed_heartbeats = 0;
                    } else {
                        missed_heartbeats += 1;
                        if missed_heartbeats >= 2 {
                            warn!("heartbeat timeout (missed {} pongs), dropping connection", missed_heartbeats);
                            break;
                        }
                    }
                    if sender.send(Message::Ping(vec![].into())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    // Read commands from the client.
    let dispatcher_recv = dispatcher.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => match serde_json::from_str::<GatewayCommand>(&text) {
                    Ok(cmd) => {
                        handle_command(&dispatcher_recv, &db, conn_id, cmd).await;
                    }
                    Err(e) => {
                        warn!(
                            "connection {} bad command: {} -- raw: {}",
                            conn_id,
                            e,
                            &text[..text.len().min(200)]
                        );
                    }
                },
                Message::Pong(_) => {
                    pong_flag_recv.store(true, Ordering::Release);
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    // Wait for either task to finish
    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    dispatcher.unsubscribe_all(conn_id).await;
    info!("gateway connection {} closed", conn_id);
}

async fn handle_command(
    dispatcher: &Dispatcher,
    db: &Arc<Database>,
    conn_id: ConnId,
    cmd: GatewayCommand,
) {
    match cmd {
        GatewayCommand::JoinRoom { room_id } => {
            info!("connection {} joined room {}", conn_id, room_id);
            dispatcher.subscribe(conn_id, room_id).await;
        }

        GatewayCommand::LeaveRoom { room_id } => {
            dispatcher.unsubscribe(conn_id, room_id).await;
        }

        // Web UI asks the server to queue a command for a polling phone.
        // Delivery is fire-and-forget from the socket's point of view.
        GatewayCommand::EnqueueCmd { device_id, command } => {
            let db = db.clone();
            let result =
                tokio::task::spawn_blocking(move || db.enqueue_command(&device_id, &command))
                    .await;
            match result {
                Ok(Ok(_)) => {}
                Ok(Err(e)) => warn!("connection {} enqueue failed: {}", conn_id, e),
                Err(e) => warn!("enqueue task panicked: {}", e),
            }
        }
    }
}
