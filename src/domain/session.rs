// Usage session domain model
use crate::domain::wire::null_as_default;
use serde::{Deserialize, Serialize};

pub const UNKNOWN_NAME: &str = "Unknown";
pub const UNKNOWN_POSITION: &str = "Unknown";
pub const LOADING_PLACEHOLDER: &str = "Loading...";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    #[default]
    Active,
    Completed,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeakerInfo {
    #[serde(deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub position: String,
}

impl SpeakerInfo {
    pub fn new(name: impl Into<String>, position: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            position: position.into(),
        }
    }

    pub fn loading() -> Self {
        Self::new(LOADING_PLACEHOLDER, LOADING_PLACEHOLDER)
    }

    pub fn unknown() -> Self {
        Self::new(UNKNOWN_NAME, UNKNOWN_POSITION)
    }

    /// Same info with blank parts replaced by "Unknown".
    pub fn or_unknown(&self) -> Self {
        Self::new(
            non_empty_or(&self.name, UNKNOWN_NAME),
            non_empty_or(&self.position, UNKNOWN_POSITION),
        )
    }
}

/// One continuous period during which a speaker is powered on.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Session {
    #[serde(deserialize_with = "null_as_default")]
    pub id: u64,
    #[serde(deserialize_with = "null_as_default")]
    pub speaker_id: u64,
    #[serde(deserialize_with = "null_as_default")]
    pub user_id: u64,
    #[serde(deserialize_with = "null_as_default")]
    pub start_time: String,
    pub end_time: Option<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub initial_battery_percentage: f64,
    pub final_battery_percentage: Option<f64>,
    #[serde(deserialize_with = "null_as_default")]
    pub status: SessionStatus,
    pub speaker: Option<SpeakerInfo>,
}

impl Session {
    /// Speaker name and position as carried by the session, "Unknown" for missing parts.
    pub fn speaker_info(&self) -> SpeakerInfo {
        match &self.speaker {
            Some(speaker) => speaker.or_unknown(),
            None => SpeakerInfo::unknown(),
        }
    }
}

fn non_empty_or(value: &str, fallback: &str) -> String {
    if value.is_empty() {
        fallback.to_string()
    } else {
        value.to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connected,
}

impl ConnectionState {
    pub fn is_connected(self) -> bool {
        self == ConnectionState::Connected
    }
}

/// Parse a speaker id taken from a route. Only positive integers are accepted.
pub fn parse_speaker_id(raw: &str) -> Option<u64> {
    raw.trim().parse::<u64>().ok().filter(|id| *id >= 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_speaker_id() {
        assert_eq!(parse_speaker_id("7"), Some(7));
        assert_eq!(parse_speaker_id(" 12 "), Some(12));
        assert_eq!(parse_speaker_id("0"), None);
        assert_eq!(parse_speaker_id("-3"), None);
        assert_eq!(parse_speaker_id("abc"), None);
        assert_eq!(parse_speaker_id(""), None);
    }

    #[test]
    fn test_session_tolerates_null_speaker_parts() {
        let json = r#"{
            "id": 42,
            "speakerId": 7,
            "userId": null,
            "startTime": "2024-01-01T00:00:00Z",
            "initialBatteryPercentage": null,
            "status": "active",
            "speaker": { "name": "Lobby", "position": null }
        }"#;

        let session: Session = serde_json::from_str(json).unwrap();
        assert_eq!(session.id, 42);
        assert_eq!(session.speaker_info(), SpeakerInfo::new("Lobby", UNKNOWN_POSITION));

        let info: SpeakerInfo = serde_json::from_str(r#"{"name":null}"#).unwrap();
        assert_eq!(info.or_unknown(), SpeakerInfo::unknown());
    }

    #[test]
    fn test_session_decodes_backend_shape() {
        let json = r#"{
            "id": 42,
            "speakerId": 7,
            "userId": 1,
            "startTime": "2024-01-01T00:00:00Z",
            "initialBatteryPercentage": 100,
            "status": "active",
            "speaker": { "name": "Lobby", "position": "North wall" }
        }"#;

        let session: Session = serde_json::from_str(json).unwrap();
        assert_eq!(session.id, 42);
        assert_eq!(session.status, SessionStatus::Active);
        assert_eq!(session.speaker_info(), SpeakerInfo::new("Lobby", "North wall"));
    }

    #[test]
    fn test_speaker_info_falls_back_to_unknown() {
        let session = Session {
            speaker: Some(SpeakerInfo::new("", "Stage")),
            ..Session::default()
        };
        assert_eq!(session.speaker_info(), SpeakerInfo::new("Unknown", "Stage"));

        let session = Session::default();
        assert_eq!(session.speaker_info(), SpeakerInfo::unknown());
    }
}
