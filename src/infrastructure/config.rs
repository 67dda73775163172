use crate::application::control_panel::PanelSettings;
use crate::domain::volume::VolumeRange;
use serde::Deserialize;
use std::time::Duration;

pub const CONFIG_FILE: &str = "config/control_panel";
pub const ENV_PREFIX: &str = "SPEAKER_CONTROL";

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerSettings,
    pub api: ApiSettings,
    pub polling: PollingSettings,
    pub volume: VolumeSettings,
    pub session: SessionSettings,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerSettings {
    pub bind: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8080".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ApiSettings {
    pub base_url: String,
    pub energy_prefix: String,
    pub speakers_prefix: String,
    pub timeout_ms: u64,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000".to_string(),
            energy_prefix: "/api/energy".to_string(),
            speakers_prefix: "/speakers".to_string(),
            timeout_ms: 10_000,
        }
    }
}

impl ApiSettings {
    pub fn energy_url(&self) -> String {
        join_url(&self.base_url, &self.energy_prefix)
    }

    pub fn speakers_url(&self) -> String {
        join_url(&self.base_url, &self.speakers_prefix)
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PollingSettings {
    pub initial_delay_ms: u64,
    pub interval_ms: u64,
    pub reset_delay_ms: u64,
}

impl Default for PollingSettings {
    fn default() -> Self {
        Self {
            initial_delay_ms: 500,
            interval_ms: 2000,
            reset_delay_ms: 1000,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct VolumeSettings {
    pub min: i32,
    pub max: i32,
    pub default: i32,
    pub presets: Vec<i32>,
}

impl Default for VolumeSettings {
    fn default() -> Self {
        let range = VolumeRange::default();
        Self {
            min: range.min,
            max: range.max,
            default: range.default,
            presets: range.presets,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SessionSettings {
    pub user_id: u64,
    pub mode: String,
    pub initial_battery_percentage: f64,
    pub error_display_ms: u64,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            user_id: 1,
            mode: "ultra_optimized".to_string(),
            initial_battery_percentage: 100.0,
            error_display_ms: 3000,
        }
    }
}

impl AppConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        let volume = &self.volume;
        anyhow::ensure!(
            volume.min <= volume.default && volume.default <= volume.max,
            "volume.default {} must lie within {}-{}",
            volume.default,
            volume.min,
            volume.max
        );
        if let Some(preset) = volume.presets.iter().find(|p| **p < volume.min || **p > volume.max) {
            anyhow::bail!("volume preset {} is outside {}-{}", preset, volume.min, volume.max);
        }
        anyhow::ensure!(self.polling.interval_ms > 0, "polling.interval_ms must be positive");
        anyhow::ensure!(!self.api.base_url.is_empty(), "api.base_url must be set");
        Ok(())
    }
}

impl From<&AppConfig> for PanelSettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            initial_poll_delay: Duration::from_millis(config.polling.initial_delay_ms),
            poll_interval: Duration::from_millis(config.polling.interval_ms),
            reset_delay: Duration::from_millis(config.polling.reset_delay_ms),
            error_display: Duration::from_millis(config.session.error_display_ms),
            volume: VolumeRange {
                min: config.volume.min,
                max: config.volume.max,
                default: config.volume.default,
                presets: config.volume.presets.clone(),
            },
            mode: config.session.mode.clone(),
            initial_battery_percentage: config.session.initial_battery_percentage,
        }
    }
}

/// Load `config/control_panel.*` (optional) overlaid with `SPEAKER_CONTROL__*` variables.
pub fn load_app_config() -> anyhow::Result<AppConfig> {
    load_from(config::File::with_name(CONFIG_FILE).required(false))
}

fn load_from<S>(source: S) -> anyhow::Result<AppConfig>
where
    S: config::Source + Send + Sync + 'static,
{
    let settings = config::Config::builder()
        .add_source(source)
        .add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__"),
        )
        .build()?;

    let config: AppConfig = settings.try_deserialize()?;
    config.validate()?;
    Ok(config)
}

fn join_url(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
        .trim_end_matches('/')
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::{File, FileFormat};

    #[test]
    fn test_defaults_match_panel_defaults() {
        let config = load_from(File::from_str("", FileFormat::Toml)).unwrap();
        let settings = PanelSettings::from(&config);
        let defaults = PanelSettings::default();

        assert_eq!(settings.poll_interval, defaults.poll_interval);
        assert_eq!(settings.initial_poll_delay, defaults.initial_poll_delay);
        assert_eq!(settings.volume, defaults.volume);
        assert_eq!(settings.mode, "ultra_optimized");
        assert_eq!(config.api.energy_url(), "http://localhost:3000/api/energy");
        assert_eq!(config.api.speakers_url(), "http://localhost:3000/speakers");
    }

    #[test]
    fn test_file_overrides() {
        let toml = r#"
            [api]
            base_url = "https://speakers.example.org/"

            [polling]
            interval_ms = 3000

            [volume]
            min = 0
            max = 50
            default = 10
            presets = [0, 25, 50]
        "#;
        let config = load_from(File::from_str(toml, FileFormat::Toml)).unwrap();

        assert_eq!(config.api.energy_url(), "https://speakers.example.org/api/energy");
        assert_eq!(config.polling.interval_ms, 3000);
        assert_eq!(config.polling.initial_delay_ms, 500);
        assert_eq!(config.volume.presets, vec![0, 25, 50]);
    }

    #[test]
    fn test_rejects_default_volume_outside_range() {
        let toml = r#"
            [volume]
            min = 5
            max = 30
            default = 40
        "#;
        assert!(load_from(File::from_str(toml, FileFormat::Toml)).is_err());
    }
}
