// HTTP implementation of the control gateway
use crate::application::control_gateway::{
    ActiveSessionLookup, ControlGateway, GatewayError, StartSessionRequest, StartedSession,
    VolumeCommand,
};
use crate::domain::session::SpeakerInfo;
use crate::domain::telemetry::{EndSessionPayload, RealtimeSessionData};
use crate::infrastructure::config::ApiSettings;
use anyhow::Context;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct HttpControlGateway {
    client: reqwest::Client,
    energy_url: String,
    speakers_url: String,
}

/// `{success, data, message}` wrapper used by both backends.
#[derive(Debug, Deserialize)]
#[serde(bound = "T: DeserializeOwned")]
struct Envelope<T> {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    data: Option<T>,
    #[serde(default)]
    message: Option<String>,
}

impl<T> Envelope<T> {
    fn into_data(self) -> Result<T, GatewayError> {
        match (self.success, self.data) {
            (true, Some(data)) => Ok(data),
            (_, _) => Err(GatewayError::Rejected(self.message)),
        }
    }

    fn into_ack(self) -> Result<(), GatewayError> {
        if self.success {
            Ok(())
        } else {
            Err(GatewayError::Rejected(self.message))
        }
    }

    fn into_optional(self) -> Option<T> {
        if self.success { self.data } else { None }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
}

impl HttpControlGateway {
    pub fn new(settings: &ApiSettings) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(settings.timeout_ms))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            energy_url: settings.energy_url(),
            speakers_url: settings.speakers_url(),
        })
    }

    fn energy_endpoint(&self, path: &str) -> String {
        format!("{}{}", self.energy_url, path)
    }

    fn speaker_endpoint(&self, speaker_id: u64) -> String {
        format!("{}/{}", self.speakers_url, speaker_id)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, GatewayError> {
        tracing::debug!("GET {}", url);
        let response = self
            .client
            .get(url)
            .header("Accept", "application/json")
            .send()
            .await?;
        Self::decode(response).await
    }

    async fn post_json<B, T>(&self, url: &str, body: &B) -> Result<T, GatewayError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        tracing::debug!("POST {}", url);
        let response = self
            .client
            .post(url)
            .header("Accept", "application/json")
            .json(body)
            .send()
            .await?;
        Self::decode(response).await
    }

    async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, GatewayError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorBody>(&body)
                .ok()
                .and_then(|b| b.message);
            tracing::debug!("request failed with status {}: {}", status, body);
            return Err(GatewayError::Status {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response.json::<T>().await?)
    }
}

#[async_trait]
impl ControlGateway for HttpControlGateway {
    async fn active_session(&self, speaker_id: u64) -> Result<ActiveSessionLookup, GatewayError> {
        let url = self.energy_endpoint(&format!("/active-session/{}", speaker_id));
        self.get_json(&url).await
    }

    async fn speaker_info(&self, speaker_id: u64) -> Result<Option<SpeakerInfo>, GatewayError> {
        let url = self.speaker_endpoint(speaker_id);
        let envelope: Envelope<SpeakerInfo> = self.get_json(&url).await?;
        Ok(envelope.into_optional())
    }

    async fn start_session(&self, request: &StartSessionRequest) -> Result<StartedSession, GatewayError> {
        let url = self.energy_endpoint("/start-session");
        let envelope: Envelope<StartedSession> = self.post_json(&url, request).await?;
        envelope.into_data()
    }

    async fn end_session(&self, session_id: u64, payload: &EndSessionPayload) -> Result<(), GatewayError> {
        let url = self.energy_endpoint(&format!("/end-session/{}", session_id));
        let envelope: Envelope<serde_json::Value> = self.post_json(&url, payload).await?;
        envelope.into_ack()
    }

    async fn realtime_data(&self, session_id: u64) -> Result<Option<RealtimeSessionData>, GatewayError> {
        let url = self.energy_endpoint(&format!("/realtime-data/{}", session_id));
        let envelope: Envelope<RealtimeSessionData> = self.get_json(&url).await?;
        Ok(envelope.into_optional())
    }

    async fn set_volume(&self, speaker_id: u64, command: &VolumeCommand) -> Result<(), GatewayError> {
        let url = self.energy_endpoint(&format!("/volume/{}", speaker_id));
        let envelope: Envelope<serde_json::Value> = self.post_json(&url, command).await?;
        envelope.into_ack()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gateway() -> HttpControlGateway {
        HttpControlGateway::new(&ApiSettings {
            base_url: "http://backend:3000/".to_string(),
            ..ApiSettings::default()
        })
        .unwrap()
    }

    #[test]
    fn test_endpoints() {
        let gateway = gateway();
        assert_eq!(
            gateway.energy_endpoint("/realtime-data/42"),
            "http://backend:3000/api/energy/realtime-data/42"
        );
        assert_eq!(gateway.speaker_endpoint(7), "http://backend:3000/speakers/7");
    }

    #[test]
    fn test_start_envelope() {
        let json = r#"{"success":true,"data":{"id":42,"startTime":"2024-01-01T00:00:00Z"},"message":"ok"}"#;
        let envelope: Envelope<StartedSession> = serde_json::from_str(json).unwrap();
        let started = envelope.into_data().unwrap();
        assert_eq!(started.id, 42);
        assert_eq!(started.start_time, "2024-01-01T00:00:00Z");

        let json = r#"{"success":false,"message":"speaker already on"}"#;
        let envelope: Envelope<StartedSession> = serde_json::from_str(json).unwrap();
        let err = envelope.into_data().unwrap_err();
        assert_eq!(err.server_message(), Some("speaker already on"));
    }

    #[test]
    fn test_ack_envelope() {
        let envelope: Envelope<serde_json::Value> = serde_json::from_str(r#"{"success":true}"#).unwrap();
        assert!(envelope.into_ack().is_ok());

        let envelope: Envelope<serde_json::Value> =
            serde_json::from_str(r#"{"success":false,"message":"device unreachable"}"#).unwrap();
        assert!(matches!(
            envelope.into_ack(),
            Err(GatewayError::Rejected(Some(m))) if m == "device unreachable"
        ));
    }

    #[test]
    fn test_realtime_envelope_without_data() {
        let envelope: Envelope<RealtimeSessionData> =
            serde_json::from_str(r#"{"success":true,"data":null}"#).unwrap();
        assert!(envelope.into_optional().is_none());

        let envelope: Envelope<RealtimeSessionData> =
            serde_json::from_str(r#"{"success":false,"data":{"sessionId":42}}"#).unwrap();
        assert!(envelope.into_optional().is_none());
    }

    #[test]
    fn test_active_session_lookup_shape() {
        let json = r#"{"success":true,"hasActiveSession":true,"session":{"id":42,"startTime":"2024-01-01T00:00:00Z","speaker":{"name":"Lobby","position":"Hall"}}}"#;
        let lookup: ActiveSessionLookup = serde_json::from_str(json).unwrap();
        let session = lookup.into_active().unwrap();
        assert_eq!(session.id, 42);
        assert_eq!(session.speaker_info().name, "Lobby");

        let json = r#"{"success":true,"hasActiveSession":true,"session":{"id":43,"startTime":"2024-01-01T00:00:00Z","speaker":{"name":"Lobby","position":null}}}"#;
        let lookup: ActiveSessionLookup = serde_json::from_str(json).unwrap();
        assert_eq!(lookup.into_active().map(|s| s.id), Some(43));

        let json = r#"{"success":true,"hasActiveSession":false,"session":null}"#;
        let lookup: ActiveSessionLookup = serde_json::from_str(json).unwrap();
        assert!(lookup.into_active().is_none());
    }
}
