// Realtime telemetry domain models
use crate::domain::wire::null_as_default;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Most recent single measurement reported by the speaker.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LatestSample {
    #[serde(deserialize_with = "null_as_default")]
    pub timestamp: f64,
    #[serde(rename = "current_mA", deserialize_with = "null_as_default")]
    pub current_ma: f64,
    #[serde(rename = "voltage_V", deserialize_with = "null_as_default")]
    pub voltage_v: f64,
    #[serde(rename = "power_mW", deserialize_with = "null_as_default")]
    pub power_mw: f64,
    #[serde(deserialize_with = "null_as_default")]
    pub battery_remaining_percent: f64,
    #[serde(rename = "total_consumed_mAh", deserialize_with = "null_as_default")]
    pub total_consumed_mah: f64,
    #[serde(deserialize_with = "null_as_default")]
    pub sample_index: u64,
}

/// Running aggregates over the whole session.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionStatistics {
    #[serde(rename = "avgCurrent_mA", deserialize_with = "null_as_default")]
    pub avg_current_ma: f64,
    #[serde(rename = "avgVoltage_V", deserialize_with = "null_as_default")]
    pub avg_voltage_v: f64,
    #[serde(rename = "avgPower_mW", deserialize_with = "null_as_default")]
    pub avg_power_mw: f64,
    #[serde(rename = "peakPower_mW", deserialize_with = "null_as_default")]
    pub peak_power_mw: f64,
    #[serde(rename = "measurementCount", deserialize_with = "null_as_default")]
    pub measurement_count: u64,
    #[serde(rename = "totalConsumed_mAh", deserialize_with = "null_as_default")]
    pub total_consumed_mah: f64,
    #[serde(rename = "durationSeconds", deserialize_with = "null_as_default")]
    pub duration_seconds: f64,
}

/// Snapshot returned by one poll of the realtime endpoint. Replaced wholesale on every tick.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RealtimeSessionData {
    #[serde(deserialize_with = "null_as_default")]
    pub session_id: u64,
    #[serde(deserialize_with = "null_as_default")]
    pub speaker_id: u64,
    #[serde(deserialize_with = "null_as_default")]
    pub speaker_name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub user_id: u64,
    #[serde(deserialize_with = "null_as_default")]
    pub status: String,
    pub start_time: Option<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub duration_minutes: f64,
    #[serde(deserialize_with = "null_as_default")]
    pub initial_battery_percentage: f64,
    #[serde(deserialize_with = "null_as_default")]
    pub latest_data: LatestSample,
    #[serde(deserialize_with = "null_as_default")]
    pub statistics: SessionStatistics,
    #[serde(deserialize_with = "null_as_default")]
    pub has_realtime_data: bool,
    pub last_updated: Option<String>,
}

impl RealtimeSessionData {
    /// Cumulative consumption: aggregate first, then the latest sample, then zero.
    pub fn consumed_mah(&self) -> f64 {
        if self.statistics.total_consumed_mah > 0.0 {
            self.statistics.total_consumed_mah
        } else if self.latest_data.total_consumed_mah > 0.0 {
            self.latest_data.total_consumed_mah
        } else {
            0.0
        }
    }
}

/// Body of the end-session request, derived from the last telemetry snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EndSessionPayload {
    #[serde(rename = "finalBatteryPercentage")]
    pub final_battery_percentage: f64,
    #[serde(rename = "totalMeasurementsSent")]
    pub total_measurements_sent: u64,
    #[serde(rename = "totalConsumed_mAh")]
    pub total_consumed_mah: f64,
    #[serde(rename = "sessionDurationSeconds")]
    pub session_duration_seconds: f64,
    #[serde(rename = "avgCurrent_mA")]
    pub avg_current_ma: f64,
    #[serde(rename = "avgVoltage_V")]
    pub avg_voltage_v: f64,
    #[serde(rename = "avgPower_mW")]
    pub avg_power_mw: f64,
    #[serde(rename = "peakPower_mW")]
    pub peak_power_mw: f64,
    pub mode: String,
}

impl EndSessionPayload {
    pub fn from_snapshot(data: &RealtimeSessionData, mode: &str) -> Self {
        let consumed = data.consumed_mah();
        if data.statistics.total_consumed_mah <= 0.0 {
            tracing::warn!(
                session_id = data.session_id,
                from_latest_sample = data.latest_data.total_consumed_mah,
                "aggregate consumption missing, using fallback value {}",
                consumed
            );
        }

        Self {
            final_battery_percentage: data.latest_data.battery_remaining_percent,
            total_measurements_sent: data.statistics.measurement_count,
            total_consumed_mah: consumed,
            session_duration_seconds: data.statistics.duration_seconds,
            avg_current_ma: data.statistics.avg_current_ma,
            avg_voltage_v: data.statistics.avg_voltage_v,
            avg_power_mw: data.statistics.avg_power_mw,
            peak_power_mw: data.statistics.peak_power_mw,
            mode: mode.to_string(),
        }
    }
}

/// Figures reported back after a session is saved.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SaveSummary {
    pub measurement_count: u64,
    pub consumed_mah: String,
    pub duration_minutes: u64,
}

impl SaveSummary {
    pub fn from_snapshot(data: &RealtimeSessionData) -> Self {
        Self {
            measurement_count: data.statistics.measurement_count,
            consumed_mah: format!("{:.1}", data.statistics.total_consumed_mah),
            duration_minutes: (data.statistics.duration_seconds.max(0.0) / 60.0).floor() as u64,
        }
    }
}

impl std::fmt::Display for SaveSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} measurements, {} mAh consumed, {} minutes",
            self.measurement_count, self.consumed_mah, self.duration_minutes
        )
    }
}

pub const ZERO_DURATION: &str = "00:00:00";

/// Elapsed time between `start` and `now` as `HH:MM:SS`. Clock skew never goes negative.
pub fn format_duration(start: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let total = (now - start).num_seconds().max(0);
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;
    format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
}

pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|time| time.with_timezone(&Utc))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BatteryTier {
    Excellent,
    Good,
    Acceptable,
    Low,
    Critical,
    VeryCritical,
}

impl BatteryTier {
    pub fn from_percent(percent: f64) -> Self {
        match percent {
            p if p > 80.0 => BatteryTier::Excellent,
            p if p > 60.0 => BatteryTier::Good,
            p if p > 40.0 => BatteryTier::Acceptable,
            p if p > 20.0 => BatteryTier::Low,
            p if p > 10.0 => BatteryTier::Critical,
            _ => BatteryTier::VeryCritical,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DataFreshness {
    Fresh,
    Recent,
    Stale,
    Obsolete,
}

impl DataFreshness {
    pub fn from_age_seconds(age: i64) -> Self {
        match age {
            a if a < 5 => DataFreshness::Fresh,
            a if a < 10 => DataFreshness::Recent,
            a if a < 30 => DataFreshness::Stale,
            _ => DataFreshness::Obsolete,
        }
    }

    pub fn of(last_updated: &str, now: DateTime<Utc>) -> Option<Self> {
        let updated = parse_timestamp(last_updated)?;
        Some(Self::from_age_seconds((now - updated).num_seconds()))
    }
}
