use anyhow::{Context, Result};
use log::warn;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

pub const DEFAULT_INTERVAL_MS: u64 = 60_000;
pub const DEFAULT_SAMPLE_TIMEOUT_MS: u64 = 15_000;
pub const DEFAULT_HTTP_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_COLLECTOR_URL: &str = "http://localhost:8080/api";
pub const DEFAULT_GEOCODE_URL: &str = "http://localhost:8080/api";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct SimulatedOrigin {
    pub latitude: f64,
    pub longitude: f64,
}

impl Default for SimulatedOrigin {
    fn default() -> Self {
        Self {
            latitude: 10.7769,
            longitude: 106.7009,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TrackerSettings {
    pub collector_url: String,
    pub geocode_url: String,
    pub interval_ms: u64,
    pub sample_timeout_ms: u64,
    pub http_timeout_ms: u64,
    /// Start tracking on login when the host is in the foreground.
    pub auto_start_on_login: bool,
    /// Ask for background authorization after foreground is granted.
    pub request_background: bool,
    pub simulated_origin: SimulatedOrigin,
    #[serde(skip)]
    pub debug: bool,
}

impl Default for TrackerSettings {
    fn default() -> Self {
        Self {
            collector_url: DEFAULT_COLLECTOR_URL.into(),
            geocode_url: DEFAULT_GEOCODE_URL.into(),
            interval_ms: DEFAULT_INTERVAL_MS,
            sample_timeout_ms: DEFAULT_SAMPLE_TIMEOUT_MS,
            http_timeout_ms: DEFAULT_HTTP_TIMEOUT_MS,
            auto_start_on_login: true,
            request_background: true,
            simulated_origin: SimulatedOrigin::default(),
            debug: false,
        }
    }
}

impl TrackerSettings {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn sample_timeout(&self) -> Duration {
        Duration::from_millis(self.sample_timeout_ms)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_millis(self.http_timeout_ms)
    }

    /// Overlay `FIELDTRACK_*` environment variables on top of file values.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("FIELDTRACK_COLLECTOR_URL") {
            self.collector_url = url;
        }
        if let Some(url) = lookup("FIELDTRACK_GEOCODE_URL") {
            self.geocode_url = url;
        }
        if let Some(raw) = lookup("FIELDTRACK_INTERVAL_MS") {
            match raw.parse::<u64>() {
                Ok(value) => self.interval_ms = value,
                Err(err) => warn!("Ignoring FIELDTRACK_INTERVAL_MS={raw}: {err}"),
            }
        }
        self.debug = lookup("FIELDTRACK_DEBUG")
            .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
            .unwrap_or(false);
    }
}

pub struct SettingsStore {
    data: TrackerSettings,
}

impl SettingsStore {
    /// Load settings from `path`, writing a defaults file on first run so
    /// operators have something to edit.
    pub fn new(path: PathBuf) -> Result<Self> {
        let mut data: TrackerSettings = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_else(|err| {
                warn!("Invalid settings in {}, using defaults: {err}", path.display());
                TrackerSettings::default()
            })
        } else {
            let defaults = TrackerSettings::default();
            persist(&path, &defaults)?;
            defaults
        };
        data.apply_env_overrides();

        Ok(Self { data })
    }

    pub fn current(&self) -> TrackerSettings {
        self.data.clone()
    }
}

fn persist(path: &Path, data: &TrackerSettings) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let serialized = serde_json::to_string_pretty(data)?;
    fs::write(path, serialized)
        .with_context(|| format!("Failed to write settings to {}", path.display()))
}
