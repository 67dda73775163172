// Volume control domain model
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VolumeStatus {
    #[default]
    Idle,
    Updating,
    Error,
}

/// Displayed volume plus the bookkeeping needed to reconcile overlapping commands.
///
/// `level` shows the newest command while any command is outstanding. Once none
/// is, it falls back to the last level the device confirmed.
#[derive(Debug, Clone, PartialEq)]
pub struct VolumeState {
    pub level: i32,
    pub status: VolumeStatus,
    pub last_update: Option<DateTime<Utc>>,
    confirmed_level: i32,
    confirmed_seq: u64,
    issued_seq: u64,
    in_flight: u32,
    latest_failed: bool,
}

impl VolumeState {
    pub fn new(level: i32) -> Self {
        Self {
            level,
            status: VolumeStatus::Idle,
            last_update: None,
            confirmed_level: level,
            confirmed_seq: 0,
            issued_seq: 0,
            in_flight: 0,
            latest_failed: false,
        }
    }

    pub fn confirmed_level(&self) -> i32 {
        self.confirmed_level
    }

    /// Show `level` right away and return the sequence number of the new command.
    pub fn begin(&mut self, level: i32) -> u64 {
        self.issued_seq += 1;
        self.in_flight += 1;
        self.level = level;
        self.status = VolumeStatus::Updating;
        self.issued_seq
    }

    /// The device accepted command `seq`.
    pub fn confirm(&mut self, seq: u64, level: i32, now: DateTime<Utc>) {
        if seq > self.confirmed_seq {
            self.confirmed_seq = seq;
            self.confirmed_level = level;
        }
        if seq == self.issued_seq {
            self.latest_failed = false;
        }
        self.last_update = Some(now);
        self.settle();
    }

    /// Command `seq` failed or was refused.
    pub fn fail(&mut self, seq: u64) {
        if seq == self.issued_seq {
            self.latest_failed = true;
        }
        self.settle();
    }

    fn settle(&mut self) {
        self.in_flight = self.in_flight.saturating_sub(1);
        if self.in_flight == 0 {
            self.level = self.confirmed_level;
            self.status = if self.latest_failed {
                VolumeStatus::Error
            } else {
                VolumeStatus::Idle
            };
        }
    }
}

/// Closed range of accepted volume levels.
#[derive(Debug, Clone, PartialEq)]
pub struct VolumeRange {
    pub min: i32,
    pub max: i32,
    pub default: i32,
    pub presets: Vec<i32>,
}

impl Default for VolumeRange {
    fn default() -> Self {
        Self {
            min: 5,
            max: 30,
            default: 25,
            presets: vec![5, 10, 15, 20, 25, 30],
        }
    }
}

impl VolumeRange {
    pub fn contains(&self, level: i32) -> bool {
        (self.min..=self.max).contains(&level)
    }

    pub fn percent(&self, level: i32) -> i32 {
        if self.max <= 0 {
            return 0;
        }
        (f64::from(level) / f64::from(self.max) * 100.0).round() as i32
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VolumeLevel {
    VeryLow,
    Low,
    Medium,
    High,
    Maximum,
}

impl VolumeLevel {
    pub fn from_percent(percent: i32) -> Self {
        match percent {
            p if p <= 20 => VolumeLevel::VeryLow,
            p if p <= 40 => VolumeLevel::Low,
            p if p <= 60 => VolumeLevel::Medium,
            p if p <= 80 => VolumeLevel::High,
            _ => VolumeLevel::Maximum,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            VolumeLevel::VeryLow => "Very low",
            VolumeLevel::Low => "Low",
            VolumeLevel::Medium => "Medium",
            VolumeLevel::High => "High",
            VolumeLevel::Maximum => "Maximum",
        }
    }
}

/// Human readable state of the volume control at `now`.
pub fn volume_status_text(state: &VolumeState, range: &VolumeRange, now: DateTime<Utc>) -> String {
    match state.status {
        VolumeStatus::Updating => "Adjusting volume...".to_string(),
        VolumeStatus::Error => "Volume adjustment failed".to_string(),
        VolumeStatus::Idle => {
            if let Some(updated) = state.last_update {
                let elapsed = (now - updated).num_seconds();
                if (0..5).contains(&elapsed) {
                    return format!("Volume set {}s ago", elapsed);
                }
            }
            let level = VolumeLevel::from_percent(range.percent(state.level));
            format!("Level: {}", level.label())
        }
    }
}
