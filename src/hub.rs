//! Connection lifecycle and every player-visible mutation of the arena.
//!
//! All functions here run under the single [`SharedState`] mutex, which is
//! the critical section shared with the tick loop.

use std::collections::HashMap;
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};

use crate::genre_store::{normalize_genres, GenreStore};
use crate::registry::SessionRegistry;
use crate::server_protocol::{
    parse_client_message, ClientMessage, ErrorPayload, InitPayload, ServerMessage,
};
use crate::server_utils::sanitize_name;
use crate::types::Bounds;
use crate::zones::ZoneReport;

pub const OUTBOUND_QUEUE_CAPACITY: usize = 256;
/// Close code sent to a connection evicted for not draining its queue.
pub const QUEUE_FULL_CLOSE_CODE: u16 = 4008;
/// Slots held back from text frames so an eviction's close always fits.
const CLOSE_RESERVE: usize = 1;

pub type SharedState = Arc<Mutex<ServerState>>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
    /// Owns exactly one body and steers it.
    Controller,
    /// Owns no body; may issue arena-wide commands.
    Viewer,
}

/// One item of a connection's outbound queue. The writer task stops after
/// forwarding a `Close`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OutboundMessage {
    Text(String),
    Close { code: u16, reason: String },
}

struct ClientContext {
    tx: mpsc::Sender<OutboundMessage>,
    role: Role,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum QueuePolicy {
    DropOnFull,
    DisconnectOnFull,
}

pub struct ServerState {
    clients: HashMap<String, ClientContext>,
    pub(crate) registry: SessionRegistry,
    pub(crate) bounds: Bounds,
    genres: GenreStore,
    rng: StdRng,
}

impl ServerState {
    pub fn new(genres: GenreStore) -> Self {
        Self::with_rng(genres, StdRng::from_os_rng())
    }

    pub fn with_rng(genres: GenreStore, rng: StdRng) -> Self {
        Self {
            clients: HashMap::new(),
            registry: SessionRegistry::new(),
            bounds: Bounds::default(),
            genres,
            rng,
        }
    }

    pub fn shared(self) -> SharedState {
        Arc::new(Mutex::new(self))
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    pub fn genres(&self) -> &[String] {
        self.genres.genres()
    }

    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    pub fn role_of(&self, client_id: &str) -> Option<Role> {
        self.clients.get(client_id).map(|client| client.role)
    }

    pub fn zone_report(&self) -> ZoneReport {
        ZoneReport::build(self.registry.bodies(), self.bounds, self.genres.genres())
    }
}

/// Registers a new connection. Controllers get a body and a private
/// `init`; everyone gets the registry, genres and bounds.
pub fn connect_client(
    state: &mut ServerState,
    client_id: &str,
    tx: mpsc::Sender<OutboundMessage>,
    role: Role,
) {
    state
        .clients
        .insert(client_id.to_string(), ClientContext { tx, role });

    match role {
        Role::Controller => {
            let bounds = state.bounds;
            let position = state
                .registry
                .register_controller(client_id, bounds, &mut state.rng)
                .position;
            info!(
                client_id,
                x = position.x,
                y = position.y,
                players = state.registry.len(),
                "player connected"
            );
            send_message(
                state,
                client_id,
                &ServerMessage::Init(InitPayload {
                    id: client_id,
                    position,
                }),
                QueuePolicy::DisconnectOnFull,
            );
            broadcast_players(state);
        }
        Role::Viewer => {
            info!(client_id, "viewer connected");
            let Some(payload) = encode(&ServerMessage::Players(state.registry.snapshot())) else {
                return;
            };
            send_text(state, client_id, payload, QueuePolicy::DisconnectOnFull);
        }
    }

    let Some(genres) = encode(&ServerMessage::GenresUpdate(state.genres.genres())) else {
        return;
    };
    send_text(state, client_id, genres, QueuePolicy::DisconnectOnFull);
    let bounds = state.bounds;
    send_message(
        state,
        client_id,
        &ServerMessage::BoundsUpdate(bounds),
        QueuePolicy::DisconnectOnFull,
    );
}

/// Decodes one frame and applies it. Undecodable frames are answered with
/// a private `error` event.
pub fn handle_raw_message(state: &mut ServerState, client_id: &str, raw: &str) {
    match parse_client_message(raw) {
        Ok(message) => handle_client_message(state, client_id, message),
        Err(error) => {
            debug!(client_id, %error, "rejected client frame");
            send_error(state, client_id, &error.to_string());
        }
    }
}

pub fn send_error(state: &mut ServerState, client_id: &str, message: &str) {
    send_message(
        state,
        client_id,
        &ServerMessage::Error(ErrorPayload { message }),
        QueuePolicy::DisconnectOnFull,
    );
}

pub fn handle_client_message(state: &mut ServerState, client_id: &str, message: ClientMessage) {
    let Some(role) = state.role_of(client_id) else {
        return;
    };
    if message.is_privileged() && role != Role::Viewer {
        debug!(client_id, ?message, "ignoring privileged event from controller");
        return;
    }

    match message {
        ClientMessage::SetName(requested) => {
            let Some(body) = state.registry.get(client_id) else {
                return;
            };
            let name = sanitize_name(&requested, &format!("Player {}", body.sequence));
            info!(client_id, %name, "player renamed");
            state.registry.set_name(client_id, name);
            broadcast_players(state);
        }
        ClientMessage::SetShape(shape) => {
            if state.registry.set_shape(client_id, shape) {
                info!(client_id, ?shape, "player reshaped");
                broadcast_players(state);
            }
        }
        ClientMessage::MoveInput(direction) => {
            state.registry.apply_move_input(client_id, direction);
        }
        ClientMessage::UpdateBounds(bounds) => {
            state.bounds = bounds;
            state.registry.reclamp(bounds);
            debug!(width = bounds.width, height = bounds.height, "bounds updated");
            broadcast_message(
                state,
                &ServerMessage::BoundsUpdate(bounds),
                QueuePolicy::DisconnectOnFull,
            );
        }
        ClientMessage::UpdatePlayerPosition(update) => {
            if state.registry.reposition(&update.player_id, update.position) {
                info!(player_id = %update.player_id, "body repositioned");
                broadcast_players(state);
            }
        }
        ClientMessage::AddBot => {
            let bounds = state.bounds;
            let bot_id = state
                .registry
                .spawn_bot(bounds, &mut state.rng)
                .id
                .clone();
            info!(%bot_id, bodies = state.registry.len(), "bot added");
            broadcast_players(state);
        }
        ClientMessage::RemoveBot => {
            if let Some(bot_id) = state.registry.despawn_latest_bot() {
                info!(%bot_id, "bot removed");
                broadcast_message(
                    state,
                    &ServerMessage::PlayerDisconnected(&bot_id),
                    QueuePolicy::DisconnectOnFull,
                );
                broadcast_players(state);
            }
        }
        ClientMessage::ClearBots => {
            let removed = state.registry.clear_bots();
            for bot_id in &removed {
                broadcast_message(
                    state,
                    &ServerMessage::PlayerDisconnected(bot_id),
                    QueuePolicy::DisconnectOnFull,
                );
            }
            info!(count = removed.len(), "bots cleared");
            broadcast_players(state);
        }
        ClientMessage::UpdateGenres(raw) => {
            let Some(genres) = normalize_genres(&raw) else {
                debug!(client_id, count = raw.len(), "ignoring genre update without 8 labels");
                return;
            };
            if let Err(error) = state.genres.replace(genres) {
                warn!(%error, "failed to persist genres, keeping them in memory");
            }
            info!(genres = ?state.genres.genres(), "genres updated");
            let Some(payload) = encode(&ServerMessage::GenresUpdate(state.genres.genres())) else {
                return;
            };
            broadcast_text(state, &payload, QueuePolicy::DisconnectOnFull);
        }
        ClientMessage::PromptUpdate(prompt) => {
            broadcast_message(
                state,
                &ServerMessage::PromptUpdate(&prompt),
                QueuePolicy::DisconnectOnFull,
            );
        }
    }
}

pub fn disconnect_client(state: &mut ServerState, client_id: &str) {
    let Some(context) = state.clients.remove(client_id) else {
        return;
    };
    match context.role {
        Role::Controller => {
            if state.registry.remove(client_id).is_some() {
                info!(client_id, players = state.registry.len(), "player disconnected");
                broadcast_message(
                    state,
                    &ServerMessage::PlayerDisconnected(client_id),
                    QueuePolicy::DropOnFull,
                );
            }
        }
        Role::Viewer => {
            info!(client_id, "viewer disconnected");
        }
    }
}

fn broadcast_players(state: &mut ServerState) {
    let Some(payload) = encode(&ServerMessage::Players(state.registry.snapshot())) else {
        return;
    };
    broadcast_text(state, &payload, QueuePolicy::DisconnectOnFull);
}

fn encode(message: &ServerMessage<'_>) -> Option<String> {
    match message.encode() {
        Ok(payload) => Some(payload),
        Err(error) => {
            warn!(%error, "failed to encode server message");
            None
        }
    }
}

fn send_message(
    state: &mut ServerState,
    client_id: &str,
    message: &ServerMessage<'_>,
    policy: QueuePolicy,
) {
    if let Some(payload) = encode(message) {
        send_text(state, client_id, payload, policy);
    }
}

fn send_text(state: &mut ServerState, client_id: &str, payload: String, policy: QueuePolicy) {
    let send_failed = match state.clients.get(client_id) {
        Some(client) => !try_queue_text(&client.tx, payload),
        None => false,
    };
    if send_failed && policy == QueuePolicy::DisconnectOnFull {
        evict_client(state, client_id);
    }
}

fn try_queue_text(tx: &mpsc::Sender<OutboundMessage>, payload: String) -> bool {
    if tx.capacity() <= CLOSE_RESERVE {
        return false;
    }
    tx.try_send(OutboundMessage::Text(payload)).is_ok()
}

/// Drops a connection that stopped draining its queue. The close frame goes
/// into the reserved slot so the socket is shut instead of left idle.
fn evict_client(state: &mut ServerState, client_id: &str) {
    warn!(client_id, "outbound queue full, dropping connection");
    if let Some(client) = state.clients.get(client_id) {
        let _ = client.tx.try_send(OutboundMessage::Close {
            code: QUEUE_FULL_CLOSE_CODE,
            reason: "outbound queue full".to_string(),
        });
    }
    disconnect_client(state, client_id);
}

fn broadcast_message(state: &mut ServerState, message: &ServerMessage<'_>, policy: QueuePolicy) {
    if let Some(payload) = encode(message) {
        broadcast_text(state, &payload, policy);
    }
}

pub(crate) fn broadcast_text(state: &mut ServerState, payload: &str, policy: QueuePolicy) {
    let mut failed_clients = Vec::new();
    for (client_id, client) in &state.clients {
        if !try_queue_text(&client.tx, payload.to_string()) {
            failed_clients.push(client_id.clone());
        }
    }
    if policy == QueuePolicy::DisconnectOnFull {
        for client_id in failed_clients {
            evict_client(state, &client_id);
        }
    }
}
