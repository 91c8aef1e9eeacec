//! Server engine (C8): startup, admission, handshake, per-connection
//! multiplexing, heartbeat, and graceful shutdown.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::{header, HeaderMap};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use bridge_runner::RunnerEvent;
use bridge_wire::{parse_client_message, serialize_server_message, ClientMessage, ServerMessage};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};

use crate::config::GatewayConfig;
use crate::connection::ConnectionState;
use crate::dispatch;
use crate::error::{CLOSE_AUTH_FAILED, CLOSE_ORIGIN_REJECTED};
use crate::factory::RunnerFactories;
use crate::health::healthz;

pub struct AppState {
    pub config: GatewayConfig,
    pub factories: RunnerFactories,
    pub connection_count: AtomicUsize,
    /// Broadcast to every open connection task that the server is
    /// shutting down. Each `run_connection` subscribes its own receiver
    /// and, on receipt, disposes its cached runners before returning.
    pub shutdown: broadcast::Sender<()>,
}

pub fn build_router(config: GatewayConfig, factories: RunnerFactories) -> Router {
    build_router_with_state(config, factories).0
}

fn build_router_with_state(config: GatewayConfig, factories: RunnerFactories) -> (Router, Arc<AppState>) {
    let (shutdown, _) = broadcast::channel(1);
    let state = Arc::new(AppState {
        config,
        factories,
        connection_count: AtomicUsize::new(0),
        shutdown,
    });

    let router = Router::new()
        .route("/healthz", get(healthz))
        .route("/", get(ws_upgrade_handler))
        .with_state(state.clone());
    (router, state)
}

async fn ws_upgrade_handler(State(state): State<Arc<AppState>>, headers: HeaderMap, ws: WebSocketUpgrade) -> Response {
    let max_bytes = state.config.max_frame_bytes;
    ws.max_message_size(max_bytes)
        .on_upgrade(move |socket| admit_and_serve(socket, state, headers))
        .into_response()
}

fn extract_bearer(value: &str) -> Option<&str> {
    value.strip_prefix("Bearer ")
}

async fn admit_and_serve(mut socket: WebSocket, state: Arc<AppState>, headers: HeaderMap) {
    if let Some(allowed) = &state.config.allowed_origins {
        if let Some(origin) = headers.get(header::ORIGIN).and_then(|v| v.to_str().ok()) {
            if !allowed.iter().any(|o| o == origin) {
                let _ = socket
                    .send(Message::Close(Some(CloseFrame {
                        code: CLOSE_ORIGIN_REJECTED,
                        reason: "Origin not allowed".into(),
                    })))
                    .await;
                return;
            }
        }
    }

    if let Some(expected_key) = &state.config.api_key {
        let provided = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(extract_bearer);
        if provided != Some(expected_key.as_str()) {
            let _ = socket
                .send(Message::Close(Some(CloseFrame {
                    code: CLOSE_AUTH_FAILED,
                    reason: "Unauthorized".into(),
                })))
                .await;
            return;
        }
    }

    state.connection_count.fetch_add(1, Ordering::SeqCst);
    run_connection(socket, &state).await;
    state.connection_count.fetch_sub(1, Ordering::SeqCst);
}

async fn send_frame(socket: &mut WebSocket, message: &ServerMessage) {
    let text = serialize_server_message(message);
    if socket.send(Message::Text(text)).await.is_err() {
        tracing::debug!("dropped frame: socket not open");
    }
}

async fn run_connection(mut socket: WebSocket, state: &Arc<AppState>) {
    let mut conn_state = ConnectionState::new();
    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<RunnerEvent>();
    let mut shutdown_rx = state.shutdown.subscribe();

    let connected = ServerMessage::connected(state.config.agent_name.clone());
    send_frame(&mut socket, &connected).await;

    let mut heartbeat = tokio::time::interval(state.config.heartbeat_interval);
    heartbeat.tick().await;

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        if let Some(reply) = handle_text_frame(&mut conn_state, &state.factories, &text, event_tx.clone()).await {
                            send_frame(&mut socket, &reply).await;
                        }
                    }
                    Some(Ok(Message::Pong(_))) => conn_state.mark_alive(),
                    Some(Ok(Message::Close(_))) => break,
                    Some(Ok(_)) => {}
                    Some(Err(_)) | None => break,
                }
            }
            event = event_rx.recv() => {
                if let Some(event) = event {
                    let reply = dispatch::translate_runner_event(&mut conn_state, event);
                    send_frame(&mut socket, &reply).await;
                }
            }
            _ = heartbeat.tick() => {
                if !conn_state.is_alive() {
                    break;
                }
                conn_state.mark_dead();
                if socket.send(Message::Ping(Vec::new())).await.is_err() {
                    break;
                }
            }
        }
    }

    conn_state.dispose_all().await;
}

async fn handle_text_frame(
    state: &mut ConnectionState,
    factories: &RunnerFactories,
    text: &str,
    events: mpsc::UnboundedSender<RunnerEvent>,
) -> Option<ServerMessage> {
    match parse_client_message(text) {
        Ok(ClientMessage::Prompt(prompt)) => dispatch::handle_prompt(state, factories, prompt, events).await,
        Ok(ClientMessage::Cancel(cancel)) => Some(dispatch::handle_cancel(state, factories, cancel).await),
        Err(err) => Some(ServerMessage::error(err.to_string(), None)),
    }
}

/// Binds the listener and serves until `shutdown` resolves. At that
/// point the accept loop stops and a shutdown signal is broadcast to
/// every open connection task, which each cancel their heartbeat,
/// dispose their cached runners, and close their socket before exiting.
pub async fn serve(
    config: GatewayConfig,
    factories: RunnerFactories,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    let addr = format!("{}:{}", config.host, config.port);
    let (router, state) = build_router_with_state(config, factories);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "gateway listening");
    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            shutdown.await;
            tracing::info!("shutdown signal received, notifying open connections");
            let _ = state.shutdown.send(());
        })
        .await
}
