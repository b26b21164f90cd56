use crate::api;
use crate::connection::{Connection, ConnectionManager};
use crate::inbound::CommandHandler;
use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::IntoResponse,
    routing::{get, post, put},
    Router,
};
use council_orchestrator::Orchestrator;
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Shared application state.
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    pub connections: Arc<ConnectionManager>,
    pub commands: Arc<CommandHandler>,
}

/// The HTTP + WebSocket gateway.
pub struct GatewayServer;

impl GatewayServer {
    /// Build the gateway router around an orchestrator.
    pub fn build(orchestrator: Arc<Orchestrator>) -> Router {
        let connections = ConnectionManager::new();
        let commands = Arc::new(CommandHandler::new(
            orchestrator.clone(),
            connections.clone(),
        ));
        let state = Arc::new(AppState {
            orchestrator,
            connections,
            commands,
        });

        Router::new()
            .route("/health", get(api::health))
            .route("/ws", get(ws_handler))
            .route("/api/agents", get(api::list_agents))
            .route("/api/agents/{name}/engine", put(api::update_engine))
            .route("/api/agents/{name}/specialties", put(api::update_specialties))
            .route("/api/agents/{name}/knowledge", post(api::attach_knowledge))
            .route("/api/tasks", get(api::list_tasks).post(api::create_task))
            .route("/api/tasks/{id}", get(api::get_task))
            .with_state(state)
    }
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let connection_id = Uuid::new_v4();
    let (mut ws_sender, mut ws_receiver) = socket.split();

    // Registering here queues the snapshot as the first outbound frame.
    let mut subscription = state.orchestrator.subscribe();
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    state
        .connections
        .add(Connection {
            id: connection_id,
            observer_id: subscription.id(),
            tx,
        })
        .await;
    info!(connection_id = %connection_id, "WebSocket connected");

    // Task: forward events and direct replies to the WebSocket
    let mut send_task = tokio::spawn(async move {
        loop {
            let text = tokio::select! {
                event = subscription.recv() => match event {
                    Some(event) => match serde_json::to_string(&event) {
                        Ok(json) => json,
                        Err(e) => {
                            warn!(error = %e, kind = event.kind(), "Failed to encode event");
                            continue;
                        }
                    },
                    None => break,
                },
                reply = rx.recv() => match reply {
                    Some(reply) => reply,
                    None => break,
                },
            };
            if ws_sender.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    // Task: apply inbound commands
    let commands = state.commands.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = ws_receiver.next().await {
            match msg {
                Message::Text(text) => {
                    if let Err(e) = commands.handle_text(&text, connection_id).await {
                        error!(error = %e, "Failed to handle message");
                    }
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    // Whichever side ends first tears down the other
    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    state.connections.remove(connection_id).await;
    info!(connection_id = %connection_id, "WebSocket disconnected");
}
