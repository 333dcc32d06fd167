use thiserror::Error;

/// Errors produced while loading or streaming an agent session
#[derive(Debug, Error)]
pub enum WatchError {
    /// No session row exists for the requested agent
    #[error("agent '{0}' not found")]
    AgentNotFound(String),

    /// The agent id contains characters that cannot appear in a session id
    #[error("invalid agent id '{0}'")]
    InvalidAgentId(String),

    /// History and realtime need a Supabase URL and anon key
    #[error("supabase is not configured")]
    SupabaseNotConfigured,

    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("malformed payload: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, WatchError>;
