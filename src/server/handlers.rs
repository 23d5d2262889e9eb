use crate::actuator::Disposition;
use crate::broadcast::SessionId;
use crate::door::{DoorId, DoorStatus};
use crate::error::{GarageError, Result};
use crate::protocol::ClientMessage;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    http::StatusCode,
    response::{Html, IntoResponse},
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use tracing::{debug, info, warn};

use super::server::ServerState;

/// Apply one client frame: answer a `LoadTrigger` with the current state and
/// submit every door command it carries. Returns the number of relay pulses
/// started. Unusable fields and commands for unknown doors are logged and
/// skipped; only a frame that cannot be parsed at all is an error.
pub fn process_client_message(
    state: &ServerState,
    session_id: SessionId,
    text: &str,
) -> Result<usize> {
    let message = ClientMessage::parse(text)?;

    for rejected in &message.rejected {
        warn!("Observer {} sent {}", session_id, rejected);
    }
    for &door_id in &message.out_of_range {
        warn!(
            "Observer {} command rejected: {}",
            session_id,
            GarageError::InvalidTarget { door_id }
        );
    }

    if message.load_trigger {
        debug!("Observer {} requested state", session_id);
        state.broadcaster.send_snapshot_to(session_id);
    }

    let mut pulses = 0;
    for command in &message.commands {
        match state
            .arbiter
            .submit(command.door_id, command.toggle_door, command.toggle_light)
        {
            Ok(outcome) => pulses += outcome.pulses(),
            Err(e) => warn!("Observer {} command rejected: {}", session_id, e),
        }
    }

    Ok(pulses)
}

pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<ServerState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| ws_connection(state, socket))
}

async fn ws_connection(state: ServerState, socket: WebSocket) {
    use futures::{SinkExt, StreamExt};

    let mut session = state.broadcaster.connect();
    let session_id = session.id();
    let (mut sender, mut receiver) = socket.split();

    // Ends when the client goes away or the broadcaster evicts the session
    let mut send_task = tokio::spawn(async move {
        while let Some(text) = session.recv().await {
            if sender.send(Message::Text(text)).await.is_err() {
                return;
            }
        }
        let _ = sender.send(Message::Close(None)).await;
    });

    let read_loop = async {
        while let Some(Ok(message)) = receiver.next().await {
            match message {
                Message::Text(text) => {
                    if let Err(e) = process_client_message(&state, session_id, &text) {
                        warn!("Ignoring message from observer {}: {}", session_id, e);
                    }
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    };

    tokio::select! {
        _ = read_loop => {}
        _ = &mut send_task => {
            debug!("Observer {} session ended, closing socket", session_id);
        }
    }

    state.broadcaster.disconnect(session_id);
    send_task.abort();
}

#[derive(Debug, Deserialize)]
pub struct WatchQuery {
    door: Option<DoorId>,
}

/// Minimal command page; `?door=N` toggles door N before rendering
pub async fn watch_handler(
    State(state): State<ServerState>,
    Query(query): Query<WatchQuery>,
) -> impl IntoResponse {
    let mut status = StatusCode::OK;
    let mut notice = String::new();

    if let Some(door_id) = query.door {
        match state.arbiter.submit(door_id, true, false) {
            Ok(outcome) if outcome.door == Disposition::Accepted => {
                info!("Door {} toggled from /watch", door_id);
                notice = format!("Door {} toggled", door_id);
            }
            Ok(_) => {
                notice = format!("Door {} is cooling down, command ignored", door_id);
            }
            Err(GarageError::InvalidTarget { .. }) => {
                status = StatusCode::NOT_FOUND;
                notice = format!("There is no door {}", door_id);
            }
            Err(e) => {
                status = StatusCode::INTERNAL_SERVER_ERROR;
                notice = format!("Door {} command failed: {}", door_id, e);
            }
        }
    }

    let rows: String = state
        .table
        .readings()
        .iter()
        .map(|door| {
            format!(
                r#"        <li>Door {id}: {status}{lock} <a href="/watch?door={id}">toggle</a></li>
"#,
                id = door.id,
                status = door.status,
                lock = if door.lock_engaged { " (locked)" } else { "" },
            )
        })
        .collect();

    let html = format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="utf-8">
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <title>Garage</title>
</head>
<body>
    <p>{notice}</p>
    <ul>
{rows}    </ul>
</body>
</html>
"#,
    );

    (status, Html(html))
}

/// Current state in the observer wire format
pub async fn state_handler(State(state): State<ServerState>) -> impl IntoResponse {
    Json(state.broadcaster.snapshot().to_json())
}

pub async fn health_handler(State(state): State<ServerState>) -> impl IntoResponse {
    let readings = state.table.readings();
    let degraded = readings
        .iter()
        .any(|door| door.hardware_fault || door.status == DoorStatus::Fault);
    let stats = state.broadcaster.stats();

    let doors: Vec<_> = readings
        .iter()
        .map(|door| {
            serde_json::json!({
                "id": door.id,
                "status": door.status,
                "lock_engaged": door.lock_engaged,
                "hardware_fault": door.hardware_fault,
                "last_changed": door.last_changed,
            })
        })
        .collect();

    let health_info = serde_json::json!({
        "status": if degraded { "degraded" } else { "healthy" },
        "uptime_seconds": (Utc::now() - state.started_at).num_seconds(),
        "doors": doors,
        "observers": {
            "active": state.broadcaster.session_count(),
            "total": stats.total_sessions,
            "evicted": stats.evictions,
        },
        "command": {
            "cooldown_ms": state.arbiter.cooldown().as_millis() as u64,
            "pulse_ms": state.arbiter.pulse_duration().as_millis() as u64,
        }
    });

    (StatusCode::OK, Json(health_info))
}
