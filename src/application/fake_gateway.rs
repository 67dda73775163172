// Scripted in-memory gateway for control panel tests
use crate::application::control_gateway::{
    ActiveSessionLookup, ControlGateway, GatewayError, StartSessionRequest, StartedSession,
    VolumeCommand,
};
use crate::application::session_store::{SessionStore, USER_ID_KEY};
use crate::domain::session::{Session, SessionStatus, SpeakerInfo};
use crate::domain::telemetry::{
    EndSessionPayload, LatestSample, RealtimeSessionData, SessionStatistics,
};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    ActiveSession(u64),
    SpeakerInfo(u64),
    StartSession(StartSessionRequest),
    EndSession(u64, EndSessionPayload),
    RealtimeData(u64),
    SetVolume(u64, VolumeCommand),
}

#[derive(Debug, Clone)]
enum Failure {
    Status(u16),
    Rejected(Option<String>),
}

impl Failure {
    fn to_error(&self) -> GatewayError {
        match self {
            Failure::Status(status) => GatewayError::Status {
                status: *status,
                message: None,
            },
            Failure::Rejected(message) => GatewayError::Rejected(message.clone()),
        }
    }
}

/// Telemetry answer: delay before answering, then data or an HTTP status failure.
pub type ScriptedPoll = (Duration, Result<Option<RealtimeSessionData>, u16>);

/// Volume answer: delay before answering, then success or an HTTP status failure.
pub type ScriptedVolume = (Duration, Result<(), u16>);

pub struct FakeGateway {
    calls: Mutex<Vec<Call>>,
    active: Mutex<ActiveSessionLookup>,
    active_failure: Mutex<Option<Failure>>,
    speaker: Mutex<Option<SpeakerInfo>>,
    speaker_failure: Mutex<Option<Failure>>,
    started: Mutex<StartedSession>,
    start_failure: Mutex<Option<Failure>>,
    end_failure: Mutex<Option<Failure>>,
    volume_failure: Mutex<Option<Failure>>,
    volume_script: Mutex<VecDeque<ScriptedVolume>>,
    realtime_script: Mutex<VecDeque<ScriptedPoll>>,
    realtime_fallback: Mutex<(Duration, RealtimeSessionData)>,
}

impl Default for FakeGateway {
    fn default() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            active: Mutex::new(ActiveSessionLookup::none()),
            active_failure: Mutex::new(None),
            speaker: Mutex::new(None),
            speaker_failure: Mutex::new(None),
            started: Mutex::new(StartedSession {
                id: 42,
                start_time: "2024-01-01T00:00:00Z".to_string(),
            }),
            start_failure: Mutex::new(None),
            end_failure: Mutex::new(None),
            volume_failure: Mutex::new(None),
            volume_script: Mutex::new(VecDeque::new()),
            realtime_script: Mutex::new(VecDeque::new()),
            realtime_fallback: Mutex::new((Duration::ZERO, sample(42, 1))),
        }
    }
}

impl FakeGateway {
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn realtime_calls(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, Call::RealtimeData(_)))
            .count()
    }

    pub fn start_requests(&self) -> Vec<StartSessionRequest> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::StartSession(request) => Some(request),
                _ => None,
            })
            .collect()
    }

    pub fn end_requests(&self) -> Vec<(u64, EndSessionPayload)> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::EndSession(id, payload) => Some((id, payload)),
                _ => None,
            })
            .collect()
    }

    pub fn volume_commands(&self) -> Vec<(u64, VolumeCommand)> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::SetVolume(id, command) => Some((id, command)),
                _ => None,
            })
            .collect()
    }

    pub fn set_active(&self, lookup: ActiveSessionLookup) {
        *self.active.lock().unwrap() = lookup;
    }

    pub fn fail_active_lookup(&self, status: u16) {
        *self.active_failure.lock().unwrap() = Some(Failure::Status(status));
    }

    pub fn set_speaker(&self, speaker: Option<SpeakerInfo>) {
        *self.speaker.lock().unwrap() = speaker;
    }

    pub fn fail_speaker_info(&self, status: u16) {
        *self.speaker_failure.lock().unwrap() = Some(Failure::Status(status));
    }

    pub fn set_started(&self, id: u64, start_time: &str) {
        *self.started.lock().unwrap() = StartedSession {
            id,
            start_time: start_time.to_string(),
        };
    }

    pub fn reject_start(&self, message: Option<&str>) {
        *self.start_failure.lock().unwrap() = Some(Failure::Rejected(message.map(str::to_string)));
    }

    pub fn fail_end_session(&self, status: u16) {
        *self.end_failure.lock().unwrap() = Some(Failure::Status(status));
    }

    pub fn fail_volume(&self, status: u16) {
        *self.volume_failure.lock().unwrap() = Some(Failure::Status(status));
    }

    pub fn reject_volume(&self, message: Option<&str>) {
        *self.volume_failure.lock().unwrap() = Some(Failure::Rejected(message.map(str::to_string)));
    }

    pub fn script_volume(&self, script: Vec<ScriptedVolume>) {
        *self.volume_script.lock().unwrap() = script.into();
    }

    pub fn script_realtime(&self, script: Vec<ScriptedPoll>) {
        *self.realtime_script.lock().unwrap() = script.into();
    }

    pub fn set_realtime_fallback(&self, delay: Duration, data: RealtimeSessionData) {
        *self.realtime_fallback.lock().unwrap() = (delay, data);
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn failure(slot: &Mutex<Option<Failure>>) -> Result<(), GatewayError> {
        match slot.lock().unwrap().as_ref() {
            Some(failure) => Err(failure.to_error()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ControlGateway for FakeGateway {
    async fn active_session(&self, speaker_id: u64) -> Result<ActiveSessionLookup, GatewayError> {
        self.record(Call::ActiveSession(speaker_id));
        Self::failure(&self.active_failure)?;
        Ok(self.active.lock().unwrap().clone())
    }

    async fn speaker_info(&self, speaker_id: u64) -> Result<Option<SpeakerInfo>, GatewayError> {
        self.record(Call::SpeakerInfo(speaker_id));
        Self::failure(&self.speaker_failure)?;
        Ok(self.speaker.lock().unwrap().clone())
    }

    async fn start_session(&self, request: &StartSessionRequest) -> Result<StartedSession, GatewayError> {
        self.record(Call::StartSession(request.clone()));
        Self::failure(&self.start_failure)?;
        Ok(self.started.lock().unwrap().clone())
    }

    async fn end_session(&self, session_id: u64, payload: &EndSessionPayload) -> Result<(), GatewayError> {
        self.record(Call::EndSession(session_id, payload.clone()));
        Self::failure(&self.end_failure)
    }

    async fn realtime_data(&self, session_id: u64) -> Result<Option<RealtimeSessionData>, GatewayError> {
        self.record(Call::RealtimeData(session_id));
        let scripted = self.realtime_script.lock().unwrap().pop_front();
        let (delay, outcome) = match scripted {
            Some(scripted) => scripted,
            None => {
                let (delay, data) = self.realtime_fallback.lock().unwrap().clone();
                (delay, Ok(Some(data)))
            }
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        outcome.map_err(|status| GatewayError::Status {
            status,
            message: None,
        })
    }

    async fn set_volume(&self, speaker_id: u64, command: &VolumeCommand) -> Result<(), GatewayError> {
        self.record(Call::SetVolume(speaker_id, command.clone()));
        let scripted = self.volume_script.lock().unwrap().pop_front();
        match scripted {
            Some((delay, outcome)) => {
                tokio::time::sleep(delay).await;
                outcome.map_err(|status| GatewayError::Status {
                    status,
                    message: None,
                })
            }
            None => Self::failure(&self.volume_failure),
        }
    }
}

#[derive(Default)]
pub struct FakeStore {
    values: HashMap<String, String>,
}

impl FakeStore {
    pub fn with_user(user_id: u64) -> Self {
        let mut values = HashMap::new();
        values.insert(USER_ID_KEY.to_string(), user_id.to_string());
        Self { values }
    }
}

impl SessionStore for FakeStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }
}

/// Backend answer for a speaker with a running session.
pub fn active_lookup(session_id: u64, speaker_id: u64) -> ActiveSessionLookup {
    ActiveSessionLookup {
        success: true,
        has_active_session: true,
        session: Some(Session {
            id: session_id,
            speaker_id,
            user_id: 1,
            start_time: "2024-01-01T00:00:00Z".to_string(),
            initial_battery_percentage: 100.0,
            status: SessionStatus::Active,
            speaker: Some(SpeakerInfo::new(format!("Speaker {}", speaker_id), "Stage")),
            ..Session::default()
        }),
    }
}

/// Live telemetry snapshot whose latest sample carries `sample_index`.
pub fn sample(session_id: u64, sample_index: u64) -> RealtimeSessionData {
    RealtimeSessionData {
        session_id,
        speaker_id: 7,
        status: "active".to_string(),
        latest_data: LatestSample {
            voltage_v: 3.9,
            current_ma: 180.0,
            power_mw: 702.0,
            battery_remaining_percent: 91.0,
            total_consumed_mah: 12.0,
            sample_index,
            ..LatestSample::default()
        },
        statistics: SessionStatistics {
            avg_current_ma: 175.0,
            avg_voltage_v: 3.9,
            avg_power_mw: 682.5,
            peak_power_mw: 720.0,
            measurement_count: 10,
            total_consumed_mah: 12.5,
            duration_seconds: 150.0,
        },
        has_realtime_data: true,
        ..RealtimeSessionData::default()
    }
}
