use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use bubble_arena_server::config::ServerConfig;
use bubble_arena_server::genre_store::GenreStore;
use bubble_arena_server::hub::{
    self, OutboundMessage, Role, ServerState, SharedState, OUTBOUND_QUEUE_CAPACITY,
};
use bubble_arena_server::server_utils::{resolve_role, ConnectQuery};
use bubble_arena_server::tick::start_tick_loop;
use futures_util::{Sink, SinkExt, StreamExt};
use serde_json::json;
use tokio::sync::mpsc;
use tower_http::services::{ServeDir, ServeFile};
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Clone)]
struct AppState {
    arena: SharedState,
    viewer_token: Option<Arc<str>>,
}

#[tokio::main]
async fn main() {
    init_tracing();
    let config = ServerConfig::from_env();

    let state = ServerState::new(GenreStore::new(config.genre_config_path.clone())).shared();
    start_tick_loop(state.clone());

    if config.viewer_token.is_some() {
        info!("viewer connections require a token");
    }
    let app_state = AppState {
        arena: state,
        viewer_token: config.viewer_token.as_deref().map(Arc::from),
    };
    let app = build_router(app_state, config.static_dir.as_deref());

    let bind_addr = format!("0.0.0.0:{}", config.port);
    let listener = match tokio::net::TcpListener::bind(&bind_addr).await {
        Ok(listener) => listener,
        Err(error) => {
            error!(%bind_addr, %error, "failed to bind server socket");
            std::process::exit(1);
        }
    };

    info!(port = config.port, "listening");
    if let Err(error) = axum::serve(listener, app).await {
        error!(%error, "server runtime failed");
        std::process::exit(1);
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

fn build_router(app_state: AppState, static_dir: Option<&Path>) -> Router {
    let app = Router::new()
        .route("/healthz", get(healthz))
        .route("/api/zones", get(zones_handler))
        .route("/ws", get(ws_handler));

    let app = if let Some(static_dir) = static_dir {
        info!(root = %static_dir.display(), "serving static files");
        let index_file = static_dir.join("index.html");
        app.route_service(
            "/server-view",
            ServeFile::new(static_dir.join("server-view.html")),
        )
        .route_service(
            "/stats-view",
            ServeFile::new(static_dir.join("stats-view.html")),
        )
        .fallback_service(ServeDir::new(static_dir).not_found_service(ServeFile::new(index_file)))
    } else {
        warn!("static file root not found, set STATIC_DIR to serve the browser clients");
        app
    };

    app.with_state(app_state)
}

async fn healthz() -> impl IntoResponse {
    Json(json!({ "ok": true }))
}

async fn zones_handler(State(app): State<AppState>) -> impl IntoResponse {
    let guard = app.arena.lock().await;
    Json(guard.zone_report())
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    State(app): State<AppState>,
    Query(query): Query<ConnectQuery>,
) -> impl IntoResponse {
    let role = resolve_role(&query, app.viewer_token.as_deref());
    if query.wants_viewer() && role == Role::Controller {
        warn!("viewer request without a valid token, registering as controller");
    }
    let stats = query.is_stats();
    ws.on_upgrade(move |socket| handle_socket(app.arena, socket, role, stats))
}

async fn handle_socket(state: SharedState, socket: WebSocket, role: Role, stats: bool) {
    let client_id = make_id("client");
    let (tx, rx) = mpsc::channel::<OutboundMessage>(OUTBOUND_QUEUE_CAPACITY);
    debug!(%client_id, ?role, stats, "socket opened");

    {
        let mut guard = state.lock().await;
        hub::connect_client(&mut guard, &client_id, tx, role);
    }

    let (ws_sender, mut ws_receiver) = socket.split();
    let mut writer = tokio::spawn(write_outbound(rx, ws_sender));
    let mut writer_finished = false;

    loop {
        let received = tokio::select! {
            _ = &mut writer => {
                // The hub dropped this connection; stop reading so the socket closes.
                writer_finished = true;
                break;
            }
            received = ws_receiver.next() => received,
        };
        let Some(Ok(message)) = received else {
            break;
        };

        match message {
            Message::Text(raw) => {
                let mut guard = state.lock().await;
                hub::handle_raw_message(&mut guard, &client_id, raw.as_str());
            }
            Message::Binary(raw) => {
                let mut guard = state.lock().await;
                match std::str::from_utf8(&raw) {
                    Ok(text) => hub::handle_raw_message(&mut guard, &client_id, text),
                    Err(_) => hub::send_error(&mut guard, &client_id, "invalid utf8 message"),
                }
            }
            Message::Close(_) => break,
            _ => {}
        }
    }

    {
        let mut guard = state.lock().await;
        hub::disconnect_client(&mut guard, &client_id);
    }
    if !writer_finished {
        let _ = writer.await;
    }
    debug!(%client_id, "socket closed");
}

/// Forwards queued frames to the socket. Ends after an explicit close, a
/// failed send, or once the hub has dropped the sending half, in which case
/// a bare close frame is sent.
async fn write_outbound<S>(mut rx: mpsc::Receiver<OutboundMessage>, mut sink: S)
where
    S: Sink<Message> + Unpin,
{
    while let Some(outbound) = rx.recv().await {
        let result = match outbound {
            OutboundMessage::Text(payload) => sink.send(Message::Text(payload.into())).await,
            OutboundMessage::Close { code, reason } => {
                let frame = CloseFrame {
                    code,
                    reason: reason.into(),
                };
                let _ = sink.send(Message::Close(Some(frame))).await;
                return;
            }
        };
        if result.is_err() {
            return;
        }
    }
    let _ = sink.send(Message::Close(None)).await;
}

fn make_id(prefix: &str) -> String {
    let seq = NEXT_ID.fetch_add(1, Ordering::Relaxed);
    format!("{prefix}_{seq}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn writer_forwards_close_and_stops() {
        let (tx, rx) = mpsc::channel(8);
        tx.try_send(OutboundMessage::Text("a".to_string())).expect("queue has room");
        tx.try_send(OutboundMessage::Close {
            code: hub::QUEUE_FULL_CLOSE_CODE,
            reason: "outbound queue full".to_string(),
        })
        .expect("queue has room");
        tx.try_send(OutboundMessage::Text("late".to_string())).expect("queue has room");

        let mut sent: Vec<Message> = Vec::new();
        write_outbound(rx, &mut sent).await;

        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0], Message::Text("a".into()));
        match &sent[1] {
            Message::Close(Some(frame)) => {
                assert_eq!(frame.code, hub::QUEUE_FULL_CLOSE_CODE);
                assert_eq!(frame.reason.as_str(), "outbound queue full");
            }
            other => panic!("expected close frame, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn writer_closes_socket_when_hub_drops_the_connection() {
        let (tx, rx) = mpsc::channel(8);
        tx.try_send(OutboundMessage::Text("a".to_string())).expect("queue has room");
        drop(tx);

        let mut sent: Vec<Message> = Vec::new();
        write_outbound(rx, &mut sent).await;

        assert_eq!(sent, vec![Message::Text("a".into()), Message::Close(None)]);
    }

    #[test]
    fn connection_ids_are_unique_and_prefixed() {
        let first = make_id("client");
        let second = make_id("client");
        assert!(first.starts_with("client_"));
        assert_ne!(first, second);
    }
}
