// Gateway trait for the speaker control backends
use crate::domain::session::{Session, SpeakerInfo};
use crate::domain::telemetry::{EndSessionPayload, RealtimeSessionData};
use crate::domain::wire::null_as_default;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("server responded with status {status}")]
    Status { status: u16, message: Option<String> },
    #[error("request rejected: {}", .0.as_deref().unwrap_or("no reason given"))]
    Rejected(Option<String>),
}

impl GatewayError {
    /// Message supplied by the server, if any, suitable for showing to the operator.
    pub fn server_message(&self) -> Option<&str> {
        match self {
            GatewayError::Status { message, .. } | GatewayError::Rejected(message) => {
                message.as_deref().filter(|m| !m.is_empty())
            }
            GatewayError::Transport(_) => None,
        }
    }
}

/// Answer of the active-session lookup, as sent by the backend.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ActiveSessionLookup {
    #[serde(deserialize_with = "null_as_default")]
    pub success: bool,
    #[serde(deserialize_with = "null_as_default")]
    pub has_active_session: bool,
    pub session: Option<Session>,
}

impl ActiveSessionLookup {
    pub fn none() -> Self {
        Self::default()
    }

    /// The session, only when the backend reports it as active.
    pub fn into_active(self) -> Option<Session> {
        if self.success && self.has_active_session {
            self.session
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartSessionRequest {
    pub speaker_id: u64,
    pub user_id: u64,
    pub initial_battery_percentage: f64,
    pub mode: String,
    pub initial_volume: i32,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartedSession {
    pub id: u64,
    pub start_time: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeCommand {
    pub volume: i32,
    pub speaker_id: u64,
    pub session_id: u64,
    pub timestamp: DateTime<Utc>,
}

#[async_trait]
pub trait ControlGateway: Send + Sync {
    /// Look up the session currently running on a speaker
    async fn active_session(&self, speaker_id: u64) -> Result<ActiveSessionLookup, GatewayError>;

    /// Static speaker metadata; `None` when the backend has nothing to report
    async fn speaker_info(&self, speaker_id: u64) -> Result<Option<SpeakerInfo>, GatewayError>;

    async fn start_session(&self, request: &StartSessionRequest) -> Result<StartedSession, GatewayError>;

    async fn end_session(&self, session_id: u64, payload: &EndSessionPayload) -> Result<(), GatewayError>;

    /// Latest telemetry snapshot; `None` when the backend answered without data
    async fn realtime_data(&self, session_id: u64) -> Result<Option<RealtimeSessionData>, GatewayError>;

    async fn set_volume(&self, speaker_id: u64, command: &VolumeCommand) -> Result<(), GatewayError>;
}
