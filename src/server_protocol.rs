use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{Bounds, ShapeKind, Snapshot, Vec2};

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("invalid message: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("non-finite coordinates")]
    NonFinite,
    #[error("bounds must be finite and fit one body, got {width}x{height}")]
    InvalidBounds { width: f64, height: f64 },
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct PlayerPositionUpdate {
    #[serde(rename = "playerId")]
    pub player_id: String,
    pub position: Vec2,
}

/// Upstream events. Frames look like `{"type": "moveInput", "data": {...}}`.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum ClientMessage {
    SetName(String),
    SetShape(ShapeKind),
    MoveInput(Vec2),
    UpdateBounds(Bounds),
    UpdatePlayerPosition(PlayerPositionUpdate),
    AddBot,
    RemoveBot,
    ClearBots,
    UpdateGenres(Vec<String>),
    PromptUpdate(String),
}

impl ClientMessage {
    /// Whether only viewer connections may send this event.
    pub fn is_privileged(&self) -> bool {
        matches!(
            self,
            Self::UpdateBounds(_)
                | Self::UpdatePlayerPosition(_)
                | Self::AddBot
                | Self::RemoveBot
                | Self::ClearBots
                | Self::UpdateGenres(_)
        )
    }
}

pub fn parse_client_message(raw: &str) -> Result<ClientMessage, ProtocolError> {
    let message: ClientMessage = serde_json::from_str(raw)?;
    match &message {
        ClientMessage::MoveInput(direction) if !direction.is_finite() => {
            Err(ProtocolError::NonFinite)
        }
        ClientMessage::UpdatePlayerPosition(update) if !update.position.is_finite() => {
            Err(ProtocolError::NonFinite)
        }
        ClientMessage::UpdateBounds(bounds) if !bounds.is_valid() => {
            Err(ProtocolError::InvalidBounds {
                width: bounds.width,
                height: bounds.height,
            })
        }
        _ => Ok(message),
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct InitPayload<'a> {
    pub id: &'a str,
    pub position: Vec2,
}

#[derive(Clone, Debug, Serialize)]
pub struct ErrorPayload<'a> {
    pub message: &'a str,
}

/// Downstream events, same envelope as [`ClientMessage`].
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum ServerMessage<'a> {
    Init(InitPayload<'a>),
    Players(Snapshot<'a>),
    PhysicsUpdate(Snapshot<'a>),
    PlayerDisconnected(&'a str),
    GenresUpdate(&'a [String]),
    BoundsUpdate(Bounds),
    PromptUpdate(&'a str),
    Error(ErrorPayload<'a>),
}

impl ServerMessage<'_> {
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
