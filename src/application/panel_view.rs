// Serializable snapshot of a control panel for display
use crate::application::control_panel::{PanelPhase, PanelSettings, PanelState};
use crate::domain::session::SpeakerInfo;
use crate::domain::telemetry::{BatteryTier, DataFreshness, RealtimeSessionData, ZERO_DURATION};
use crate::domain::volume::{volume_status_text, VolumeLevel, VolumeStatus};
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct PanelView {
    pub speaker_id: Option<u64>,
    pub loading: bool,
    pub valid: bool,
    pub connected: bool,
    pub connection_status: String,
    pub active_session_id: Option<u64>,
    pub speaker: SpeakerInfo,
    pub session_duration: String,
    pub error_message: Option<String>,
    pub has_realtime_data: bool,
    pub can_save: bool,
    pub data_freshness: Option<DataFreshness>,
    pub battery_status: Option<BatteryTier>,
    pub volume: VolumeView,
    pub metrics: MetricsView,
}

#[derive(Debug, Clone, Serialize)]
pub struct VolumeView {
    pub level: i32,
    pub min: i32,
    pub max: i32,
    pub percent: i32,
    pub description: VolumeLevel,
    pub status: VolumeStatus,
    pub status_text: String,
    pub presets: Vec<i32>,
    pub last_update: Option<DateTime<Utc>>,
}

/// Telemetry figures, pre-formatted the way the dashboard shows them.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MetricsView {
    pub voltage_v: String,
    pub current_ma: String,
    pub power_mw: String,
    pub battery_percent: String,
    pub consumed_mah: String,
    pub avg_voltage_v: String,
    pub avg_current_ma: String,
    pub avg_power_mw: String,
    pub peak_power_mw: String,
    pub measurement_count: u64,
    pub sample_index: u64,
    pub timestamp: f64,
    pub duration_seconds: f64,
}

impl MetricsView {
    fn from_realtime(data: Option<&RealtimeSessionData>) -> Self {
        let mut metrics = match data {
            Some(data) => Self {
                measurement_count: data.statistics.measurement_count,
                sample_index: data.latest_data.sample_index,
                timestamp: data.latest_data.timestamp,
                duration_seconds: data.statistics.duration_seconds,
                ..Self::zeroed()
            },
            None => Self::zeroed(),
        };

        if let Some(data) = data.filter(|d| d.has_realtime_data) {
            let latest = &data.latest_data;
            let stats = &data.statistics;
            metrics.voltage_v = format!("{:.2}", latest.voltage_v);
            metrics.current_ma = format!("{:.1}", latest.current_ma);
            metrics.power_mw = format!("{:.1}", latest.power_mw);
            metrics.battery_percent = format!("{:.1}", latest.battery_remaining_percent);
            metrics.consumed_mah = format!("{:.1}", latest.total_consumed_mah);
            metrics.avg_voltage_v = format!("{:.2}", stats.avg_voltage_v);
            metrics.avg_current_ma = format!("{:.1}", stats.avg_current_ma);
            metrics.avg_power_mw = format!("{:.1}", stats.avg_power_mw);
            metrics.peak_power_mw = format!("{:.1}", stats.peak_power_mw);
        }
        metrics
    }

    fn zeroed() -> Self {
        Self {
            voltage_v: "0.00".to_string(),
            current_ma: "0.0".to_string(),
            power_mw: "0.0".to_string(),
            battery_percent: "0.0".to_string(),
            consumed_mah: "0.0".to_string(),
            avg_voltage_v: "0.00".to_string(),
            avg_current_ma: "0.0".to_string(),
            avg_power_mw: "0.0".to_string(),
            peak_power_mw: "0.0".to_string(),
            ..Self::default()
        }
    }
}

fn connection_status(connected: bool, data: Option<&RealtimeSessionData>) -> &'static str {
    match (connected, data) {
        (false, _) => "Disconnected",
        (true, None) => "Connected - no data",
        (true, Some(data)) if !data.has_realtime_data => "Connected - waiting for data",
        (true, Some(_)) => "Connected - realtime data",
    }
}

impl PanelView {
    pub(crate) fn from_state(
        speaker_id: u64,
        state: &PanelState,
        settings: &PanelSettings,
        now: DateTime<Utc>,
    ) -> Self {
        let realtime = state.realtime.as_ref();
        let live = realtime.filter(|d| d.has_realtime_data);
        let connected = state.connection.is_connected();
        let range = &settings.volume;
        let percent = range.percent(state.volume.level);

        Self {
            speaker_id: Some(speaker_id),
            loading: state.phase == PanelPhase::Loading,
            valid: true,
            connected,
            connection_status: connection_status(connected, realtime).to_string(),
            active_session_id: state.session_id,
            speaker: state.speaker.clone(),
            session_duration: state.session_duration.clone(),
            error_message: state.error_message.clone(),
            has_realtime_data: live.is_some(),
            can_save: state.session_id.is_some() && live.is_some(),
            data_freshness: realtime
                .and_then(|d| d.last_updated.as_deref())
                .and_then(|raw| DataFreshness::of(raw, now)),
            battery_status: live.map(|d| BatteryTier::from_percent(d.latest_data.battery_remaining_percent)),
            volume: VolumeView {
                level: state.volume.level,
                min: range.min,
                max: range.max,
                percent,
                description: VolumeLevel::from_percent(percent),
                status: state.volume.status,
                status_text: volume_status_text(&state.volume, range, now),
                presets: range.presets.clone(),
                last_update: state.volume.last_update,
            },
            metrics: MetricsView::from_realtime(realtime),
        }
    }

    /// View shown when a panel is opened with an unusable speaker id.
    pub fn invalid(raw_id: &str, settings: &PanelSettings) -> Self {
        let range = &settings.volume;
        let raw = if raw_id.is_empty() { "null" } else { raw_id };
        let percent = range.percent(range.default);
        Self {
            speaker_id: None,
            loading: false,
            valid: false,
            connected: false,
            connection_status: connection_status(false, None).to_string(),
            active_session_id: None,
            speaker: SpeakerInfo::unknown(),
            session_duration: ZERO_DURATION.to_string(),
            error_message: Some(format!("invalid speaker id: {}", raw)),
            has_realtime_data: false,
            can_save: false,
            data_freshness: None,
            battery_status: None,
            volume: VolumeView {
                level: range.default,
                min: range.min,
                max: range.max,
                percent,
                description: VolumeLevel::from_percent(percent),
                status: VolumeStatus::Idle,
                status_text: format!("Level: {}", VolumeLevel::from_percent(percent).label()),
                presets: range.presets.clone(),
                last_update: None,
            },
            metrics: MetricsView::zeroed(),
        }
    }
}
