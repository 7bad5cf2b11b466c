use serde::Deserialize;

use crate::hub::Role;

const MAX_NAME_CHARS: usize = 24;

/// Query string of the websocket upgrade request.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct ConnectQuery {
    pub viewer: Option<String>,
    pub stats: Option<String>,
    pub token: Option<String>,
}

impl ConnectQuery {
    pub fn wants_viewer(&self) -> bool {
        is_truthy(self.viewer.as_deref())
    }

    pub fn is_stats(&self) -> bool {
        is_truthy(self.stats.as_deref())
    }
}

/// Decides the role of a new connection. Without a configured token the
/// client-declared viewer flag is trusted as-is.
pub fn resolve_role(query: &ConnectQuery, viewer_token: Option<&str>) -> Role {
    if !query.wants_viewer() {
        return Role::Controller;
    }
    match viewer_token {
        None => Role::Viewer,
        Some(expected) if query.token.as_deref() == Some(expected) => Role::Viewer,
        Some(_) => Role::Controller,
    }
}

/// Only the exact string `true` counts.
pub fn is_truthy(raw: Option<&str>) -> bool {
    raw == Some("true")
}

pub fn sanitize_name(value: &str, fallback: &str) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return fallback.to_string();
    }
    trimmed.chars().take(MAX_NAME_CHARS).collect()
}
