// Control panel - live session poller and volume reconciler for one speaker
use crate::application::control_gateway::{
    ActiveSessionLookup, ControlGateway, GatewayError, StartSessionRequest, VolumeCommand,
};
use crate::application::panel_view::PanelView;
use crate::application::session_store::SessionStore;
use crate::domain::optimistic;
use crate::domain::session::{ConnectionState, Session, SpeakerInfo};
use crate::domain::telemetry::{
    format_duration, parse_timestamp, EndSessionPayload, RealtimeSessionData, SaveSummary,
    ZERO_DURATION,
};
use crate::domain::volume::{VolumeRange, VolumeState, VolumeStatus};
use chrono::Utc;
use futures::future::{BoxFuture, Fuse, FusedFuture};
use futures::FutureExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

const START_FAILED: &str = "Could not turn on the speaker";
const STOP_FAILED: &str = "Could not turn off the speaker";
const SAVE_FAILED: &str = "Could not save the session data";
const VOLUME_FAILED: &str = "Volume adjustment failed. Check the connection.";
const CONNECTION_LOST: &str = "Connection lost. Retrying...";
const NOT_ENOUGH_DATA: &str = "Not enough data to save the session";

#[derive(Debug, thiserror::Error)]
pub enum PanelError {
    #[error("invalid speaker id: {0}")]
    InvalidSpeakerId(String),
    #[error("cannot adjust volume without an active session")]
    NoActiveSession,
    #[error("no telemetry received yet for this session")]
    NoTelemetry,
    #[error("volume {value} is outside the range {min}-{max}")]
    VolumeOutOfRange { value: i32, min: i32, max: i32 },
    #[error("the speaker is already on")]
    AlreadyConnected,
    #[error("a session command is already in progress")]
    TransitionPending,
    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

/// Timing and defaults a panel runs with.
#[derive(Debug, Clone)]
pub struct PanelSettings {
    pub initial_poll_delay: Duration,
    pub poll_interval: Duration,
    pub reset_delay: Duration,
    pub error_display: Duration,
    pub volume: VolumeRange,
    pub mode: String,
    pub initial_battery_percentage: f64,
}

impl Default for PanelSettings {
    fn default() -> Self {
        Self {
            initial_poll_delay: Duration::from_millis(500),
            poll_interval: Duration::from_millis(2000),
            reset_delay: Duration::from_millis(1000),
            error_display: Duration::from_millis(3000),
            volume: VolumeRange::default(),
            mode: "ultra_optimized".to_string(),
            initial_battery_percentage: 100.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PanelPhase {
    Loading,
    Ready,
}

#[derive(Debug, Clone)]
pub(crate) struct PanelState {
    pub phase: PanelPhase,
    pub connection: ConnectionState,
    pub session_id: Option<u64>,
    pub session_start: Option<String>,
    pub session_duration: String,
    pub speaker: SpeakerInfo,
    pub realtime: Option<RealtimeSessionData>,
    pub volume: VolumeState,
    pub error_message: Option<String>,
    pub transition_in_flight: bool,
}

impl PanelState {
    fn new(default_volume: i32) -> Self {
        Self {
            phase: PanelPhase::Loading,
            connection: ConnectionState::Disconnected,
            session_id: None,
            session_start: None,
            session_duration: ZERO_DURATION.to_string(),
            speaker: SpeakerInfo::loading(),
            realtime: None,
            volume: VolumeState::new(default_volume),
            error_message: None,
            transition_in_flight: false,
        }
    }

    fn clear_telemetry(&mut self) {
        self.realtime = None;
        self.session_duration = ZERO_DURATION.to_string();
        self.volume.status = VolumeStatus::Idle;
        self.volume.last_update = None;
    }

    fn finish_session(&mut self) {
        self.connection = ConnectionState::Disconnected;
        self.session_id = None;
        self.session_start = None;
        self.error_message = None;
        self.clear_telemetry();
    }

    fn refresh_duration(&mut self) {
        if let Some(start) = self.session_start.as_deref().and_then(parse_timestamp) {
            self.session_duration = format_duration(start, Utc::now());
        }
    }
}

#[derive(Default)]
struct PanelTasks {
    poller: Option<JoinHandle<()>>,
    error_timer: Option<JoinHandle<()>>,
    recheck: Option<JoinHandle<()>>,
}

type PollOutcome = Result<Option<RealtimeSessionData>, GatewayError>;

/// Control panel for a single speaker.
///
/// Owns the speaker's session lifecycle (disconnected / connected), the telemetry
/// polling loop of the active session, and the volume control. Cloning is cheap and
/// every clone drives the same panel.
#[derive(Clone)]
pub struct ControlPanel {
    speaker_id: u64,
    gateway: Arc<dyn ControlGateway>,
    store: Arc<dyn SessionStore>,
    settings: Arc<PanelSettings>,
    state: Arc<Mutex<PanelState>>,
    tasks: Arc<Mutex<PanelTasks>>,
}

impl ControlPanel {
    pub fn new(
        speaker_id: u64,
        gateway: Arc<dyn ControlGateway>,
        store: Arc<dyn SessionStore>,
        settings: Arc<PanelSettings>,
    ) -> Self {
        let state = PanelState::new(settings.volume.default);
        Self {
            speaker_id,
            gateway,
            store,
            settings,
            state: Arc::new(Mutex::new(state)),
            tasks: Arc::new(Mutex::new(PanelTasks::default())),
        }
    }

    pub fn speaker_id(&self) -> u64 {
        self.speaker_id
    }

    pub async fn snapshot(&self) -> PanelView {
        let state = self.state.lock().await;
        PanelView::from_state(self.speaker_id, &state, &self.settings, Utc::now())
    }

    /// Adopt the speaker's running session if there is one, otherwise load its metadata.
    ///
    /// A failed lookup counts as "no active session".
    pub async fn check_initial_status(&self) {
        self.state.lock().await.phase = PanelPhase::Loading;
        tracing::info!(speaker_id = self.speaker_id, "checking initial session status");

        let lookup = match self.gateway.active_session(self.speaker_id).await {
            Ok(lookup) => lookup,
            Err(e) => {
                tracing::warn!(speaker_id = self.speaker_id, "active session lookup failed: {}", e);
                ActiveSessionLookup::none()
            }
        };

        match lookup.into_active() {
            Some(session) => self.adopt_session(session).await,
            None => {
                let holds_session = {
                    let mut state = self.state.lock().await;
                    if state.session_id.is_none() {
                        state.connection = ConnectionState::Disconnected;
                    }
                    state.session_id.is_some()
                };
                if holds_session {
                    tracing::debug!(
                        speaker_id = self.speaker_id,
                        "no active session reported, keeping the one this panel started"
                    );
                } else {
                    self.load_speaker_info().await;
                }
            }
        }

        self.state.lock().await.phase = PanelPhase::Ready;
    }

    async fn adopt_session(&self, session: Session) {
        tracing::info!(
            speaker_id = self.speaker_id,
            session_id = session.id,
            "active session found"
        );
        {
            let mut state = self.state.lock().await;
            state.connection = ConnectionState::Connected;
            state.session_id = Some(session.id);
            state.speaker = session.speaker_info();
            state.session_start = Some(session.start_time.clone());
        }
        self.start_polling(session.id).await;
    }

    async fn load_speaker_info(&self) {
        match self.gateway.speaker_info(self.speaker_id).await {
            Ok(Some(info)) => self.state.lock().await.speaker = info.or_unknown(),
            Ok(None) => {}
            Err(e) => {
                tracing::error!(speaker_id = self.speaker_id, "failed to load speaker details: {}", e);
                self.state.lock().await.speaker = SpeakerInfo::unknown();
            }
        }
    }

    /// Power the speaker on when disconnected, off when connected.
    pub async fn toggle_status(&self) -> Result<(), PanelError> {
        let connected = self.state.lock().await.connection.is_connected();
        if connected {
            self.turn_off().await
        } else {
            self.turn_on().await
        }
    }

    async fn turn_on(&self) -> Result<(), PanelError> {
        // A pending status re-check must not overwrite the session started here.
        self.cancel_recheck().await;

        let request = {
            let mut state = self.state.lock().await;
            if state.connection.is_connected() {
                return Err(PanelError::AlreadyConnected);
            }
            if state.transition_in_flight {
                return Err(PanelError::TransitionPending);
            }
            state.transition_in_flight = true;
            StartSessionRequest {
                speaker_id: self.speaker_id,
                user_id: self.store.user_id(),
                initial_battery_percentage: self.settings.initial_battery_percentage,
                mode: self.settings.mode.clone(),
                initial_volume: state.volume.level,
            }
        };

        tracing::info!(speaker_id = self.speaker_id, volume = request.initial_volume, "starting session");

        match self.gateway.start_session(&request).await {
            Ok(started) => {
                {
                    let mut state = self.state.lock().await;
                    state.transition_in_flight = false;
                    state.phase = PanelPhase::Ready;
                    state.connection = ConnectionState::Connected;
                    state.session_id = Some(started.id);
                    state.session_start = Some(started.start_time);
                    state.error_message = None;
                    state.clear_telemetry();
                }
                tracing::info!(speaker_id = self.speaker_id, session_id = started.id, "session started");
                self.start_polling(started.id).await;
                Ok(())
            }
            Err(e) => {
                tracing::error!(speaker_id = self.speaker_id, "{}: {}", START_FAILED, e);
                let mut state = self.state.lock().await;
                state.transition_in_flight = false;
                state.phase = PanelPhase::Ready;
                state.error_message = Some(e.server_message().unwrap_or(START_FAILED).to_string());
                Err(e.into())
            }
        }
    }

    async fn turn_off(&self) -> Result<(), PanelError> {
        let prepared = {
            let mut state = self.state.lock().await;
            let payload = state
                .realtime
                .as_ref()
                .map(|data| EndSessionPayload::from_snapshot(data, &self.settings.mode));
            match (state.session_id, payload) {
                _ if state.transition_in_flight => Err(PanelError::TransitionPending),
                (None, _) => Err(PanelError::NoActiveSession),
                (Some(_), None) => Err(PanelError::NoTelemetry),
                (Some(session_id), Some(payload)) => {
                    state.transition_in_flight = true;
                    let rollback =
                        optimistic::apply(&mut state.connection, ConnectionState::Disconnected);
                    Ok((session_id, payload, rollback))
                }
            }
        };
        let (session_id, payload, rollback) = match prepared {
            Ok(prepared) => prepared,
            Err(e) => return self.reject(e).await,
        };

        tracing::info!(session_id, "ending session and saving history");

        match self.gateway.end_session(session_id, &payload).await {
            Ok(()) => {
                self.stop_polling().await;
                let mut state = self.state.lock().await;
                state.transition_in_flight = false;
                rollback.commit();
                state.finish_session();
                tracing::info!(session_id, "session ended");
                Ok(())
            }
            Err(e) => {
                tracing::error!(session_id, "{}: {}", STOP_FAILED, e);
                let mut state = self.state.lock().await;
                state.transition_in_flight = false;
                rollback.restore(&mut state.connection);
                state.error_message = Some(e.server_message().unwrap_or(STOP_FAILED).to_string());
                Err(e.into())
            }
        }
    }

    /// End the session and report what was recorded.
    pub async fn save_session(&self) -> Result<SaveSummary, PanelError> {
        let prepared = {
            let mut state = self.state.lock().await;
            let ready = match (state.session_id, state.realtime.as_ref()) {
                (Some(session_id), Some(data)) if data.has_realtime_data => Some((
                    session_id,
                    EndSessionPayload::from_snapshot(data, &self.settings.mode),
                    SaveSummary::from_snapshot(data),
                )),
                _ => None,
            };
            match ready {
                Some(_) if state.transition_in_flight => Err(PanelError::TransitionPending),
                Some(ready) => {
                    state.transition_in_flight = true;
                    Ok(ready)
                }
                None => {
                    state.error_message = Some(NOT_ENOUGH_DATA.to_string());
                    Err(if state.session_id.is_none() {
                        PanelError::NoActiveSession
                    } else {
                        PanelError::NoTelemetry
                    })
                }
            }
        };
        let (session_id, payload, summary) = prepared?;

        tracing::info!(session_id, "saving session");

        match self.gateway.end_session(session_id, &payload).await {
            Ok(()) => {
                self.stop_polling().await;
                let mut state = self.state.lock().await;
                state.transition_in_flight = false;
                state.finish_session();
                tracing::info!(session_id, "session saved: {}", summary);
                Ok(summary)
            }
            Err(e) => {
                tracing::error!(session_id, "{}: {}", SAVE_FAILED, e);
                let mut state = self.state.lock().await;
                state.transition_in_flight = false;
                state.error_message = Some(e.server_message().unwrap_or(SAVE_FAILED).to_string());
                Err(e.into())
            }
        }
    }

    async fn start_polling(&self, session_id: u64) {
        let mut tasks = self.tasks.lock().await;
        if let Some(previous) = tasks.poller.take() {
            previous.abort();
        }
        let panel = self.clone();
        tasks.poller = Some(tokio::spawn(async move { panel.poll_loop(session_id).await }));
        tracing::debug!(session_id, "polling started");
    }

    /// Stop the polling loop. Safe to call at any time, any number of times.
    pub async fn stop_polling(&self) {
        if let Some(poller) = self.tasks.lock().await.poller.take() {
            poller.abort();
            tracing::debug!(speaker_id = self.speaker_id, "polling stopped");
        }
    }

    async fn poll_loop(self, session_id: u64) {
        let first_tick = Instant::now() + self.settings.initial_poll_delay;
        let mut ticker = time::interval_at(first_tick, self.settings.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        // Only the request of the latest tick is ever awaited.
        let mut in_flight: Fuse<BoxFuture<'static, PollOutcome>> = Fuse::terminated();

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if !in_flight.is_terminated() {
                        tracing::debug!(session_id, "abandoning stale telemetry request");
                    }
                    let gateway = self.gateway.clone();
                    in_flight = async move { gateway.realtime_data(session_id).await }
                        .boxed()
                        .fuse();
                }
                outcome = &mut in_flight, if !in_flight.is_terminated() => {
                    self.apply_poll_outcome(session_id, outcome).await;
                }
            }
        }
    }

    async fn apply_poll_outcome(&self, session_id: u64, outcome: PollOutcome) {
        match outcome {
            Ok(Some(data)) => {
                let mut state = self.state.lock().await;
                if state.session_id != Some(session_id) {
                    return;
                }
                state.error_message = None;
                state.realtime = Some(data);
                state.refresh_duration();
            }
            Ok(None) => tracing::debug!(session_id, "telemetry response carried no data"),
            Err(e) => {
                tracing::warn!(session_id, "telemetry fetch failed: {}", e);
                self.show_temporary_error(CONNECTION_LOST.to_string()).await;
            }
        }
    }

    /// Send a volume command. The requested level shows while commands are outstanding,
    /// then the last level the speaker confirmed.
    pub async fn set_volume(&self, volume: i32) -> Result<(), PanelError> {
        let prepared = {
            let mut state = self.state.lock().await;
            let range = &self.settings.volume;
            let connected = state.connection.is_connected();
            match state.session_id {
                Some(session_id) if connected => {
                    if range.contains(volume) {
                        Ok((session_id, state.volume.begin(volume)))
                    } else {
                        Err(PanelError::VolumeOutOfRange {
                            value: volume,
                            min: range.min,
                            max: range.max,
                        })
                    }
                }
                _ => Err(PanelError::NoActiveSession),
            }
        };
        let (session_id, seq) = match prepared {
            Ok(prepared) => prepared,
            Err(e) => return self.reject(e).await,
        };

        let command = VolumeCommand {
            volume,
            speaker_id: self.speaker_id,
            session_id,
            timestamp: Utc::now(),
        };

        match self.gateway.set_volume(self.speaker_id, &command).await {
            Ok(()) => {
                self.state.lock().await.volume.confirm(seq, volume, Utc::now());
                tracing::info!(speaker_id = self.speaker_id, "volume set to {}/{}", volume, self.settings.volume.max);
                Ok(())
            }
            Err(e) => {
                tracing::error!(speaker_id = self.speaker_id, volume, "volume command failed: {}", e);
                let message = match &e {
                    GatewayError::Rejected(_) => e.server_message().unwrap_or(VOLUME_FAILED),
                    _ => VOLUME_FAILED,
                }
                .to_string();
                self.state.lock().await.volume.fail(seq);
                self.show_temporary_error(message).await;
                Err(e.into())
            }
        }
    }

    pub async fn increase_volume(&self) -> Result<(), PanelError> {
        let current = self.state.lock().await.volume.level;
        if current < self.settings.volume.max {
            self.set_volume(current + 1).await
        } else {
            Ok(())
        }
    }

    pub async fn decrease_volume(&self) -> Result<(), PanelError> {
        let current = self.state.lock().await.volume.level;
        if current > self.settings.volume.min {
            self.set_volume(current - 1).await
        } else {
            Ok(())
        }
    }

    pub async fn set_volume_preset(&self, volume: i32) -> Result<(), PanelError> {
        self.set_volume(volume).await
    }

    /// Raw slider input. Anything that is not an in-range integer is ignored.
    pub async fn on_volume_input(&self, raw: &str) -> Result<(), PanelError> {
        match raw.trim().parse::<i32>() {
            Ok(volume) if self.settings.volume.contains(volume) => self.set_volume(volume).await,
            _ => {
                tracing::debug!(speaker_id = self.speaker_id, "ignoring volume input {:?}", raw);
                Ok(())
            }
        }
    }

    /// Drop all session state and re-check the backend after a short delay.
    pub async fn reset(&self) {
        tracing::info!(speaker_id = self.speaker_id, "resetting control panel");
        self.stop_polling().await;
        {
            let mut state = self.state.lock().await;
            state.finish_session();
            state.transition_in_flight = false;
        }

        let panel = self.clone();
        let delay = self.settings.reset_delay;
        let mut tasks = self.tasks.lock().await;
        if let Some(previous) = tasks.recheck.take() {
            previous.abort();
        }
        tasks.recheck = Some(tokio::spawn(async move {
            time::sleep(delay).await;
            panel.check_initial_status().await;
        }));
    }

    async fn cancel_recheck(&self) {
        if let Some(recheck) = self.tasks.lock().await.recheck.take() {
            recheck.abort();
            tracing::debug!(speaker_id = self.speaker_id, "pending status re-check cancelled");
        }
    }

    /// Cancel everything the panel scheduled. The panel must not be used afterwards.
    pub async fn teardown(&self) {
        self.stop_polling().await;
        let mut tasks = self.tasks.lock().await;
        for handle in [tasks.error_timer.take(), tasks.recheck.take()].into_iter().flatten() {
            handle.abort();
        }
        tracing::debug!(speaker_id = self.speaker_id, "control panel torn down");
    }

    async fn reject<T>(&self, error: PanelError) -> Result<T, PanelError> {
        tracing::warn!(speaker_id = self.speaker_id, "rejected: {}", error);
        self.show_temporary_error(error.to_string()).await;
        Err(error)
    }

    async fn show_temporary_error(&self, message: String) {
        self.state.lock().await.error_message = Some(message.clone());

        let state = self.state.clone();
        let ttl = self.settings.error_display;
        let mut tasks = self.tasks.lock().await;
        if let Some(previous) = tasks.error_timer.take() {
            previous.abort();
        }
        tasks.error_timer = Some(tokio::spawn(async move {
            time::sleep(ttl).await;
            let mut state = state.lock().await;
            if state.error_message.as_deref() == Some(message.as_str()) {
                state.error_message = None;
            }
        }));
    }
}
