use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::ingest::IngestOptions;

/// Runtime settings: defaults, then `dom6_ingest.toml`, then `DOM6_*` env vars.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub viewer_url: String,
    pub db_path: PathBuf,
    pub data_dir: PathBuf,
    pub categories_file: Option<PathBuf>,
    pub ready_timeout_ms: u64,
    pub render_timeout_ms: u64,
    pub poll_interval_ms: u64,
    pub render_attempts: u32,
    pub retry_delay_ms: u64,
    pub viewport_width: u32,
    pub viewport_height: u32,
    pub headless: bool,
    pub probe_attempts: u32,
    pub probe_delay_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            viewer_url: "http://localhost:8001/?loadEvents=1".into(),
            db_path: PathBuf::from("Data/dom6api.db"),
            data_dir: PathBuf::from("Data"),
            categories_file: None,
            ready_timeout_ms: 10_000,
            render_timeout_ms: 5_000,
            poll_interval_ms: 200,
            render_attempts: 2,
            retry_delay_ms: 500,
            viewport_width: 800,
            viewport_height: 600,
            headless: true,
            probe_attempts: 10,
            probe_delay_ms: 500,
        }
    }
}

impl Settings {
    pub fn load() -> Result<Self, ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name("dom6_ingest").required(false))
            .add_source(config::Environment::with_prefix("DOM6").try_parsing(true))
            .build()?
            .try_deserialize()?;
        Ok(settings)
    }

    pub fn ingest_options(&self) -> IngestOptions {
        IngestOptions {
            ready_timeout: Duration::from_millis(self.ready_timeout_ms),
            render_timeout: Duration::from_millis(self.render_timeout_ms),
            render_attempts: self.render_attempts.max(1),
            retry_delay: Duration::from_millis(self.retry_delay_ms),
            data_dir: self.data_dir.clone(),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn probe_delay(&self) -> Duration {
        Duration::from_millis(self.probe_delay_ms)
    }
}
