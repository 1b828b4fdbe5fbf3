//! Gateway configuration. Defaults, then an optional TOML file, then
//! `OFFBOOK_*` environment variables, each layer overriding the last.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Global application configuration. Load from TOML or env.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreConfig {
    /// Application identity used in logs and the health probe.
    pub app_name: String,
    /// HTTP port for the gateway.
    pub port: u16,
    /// Base directory for the script store, staged uploads and synthesized audio.
    pub storage_path: String,
    /// TTS mode: "auto" uses the live speech API when `TTS_API_KEY` is set,
    /// "placeholder" never calls out.
    pub tts_mode: String,
    /// Scripts and their artifacts are purged this many hours after upload.
    pub script_ttl_hours: u64,
    /// Upload cap for script PDFs, in bytes.
    pub max_upload_bytes: u64,
}

impl CoreConfig {
    /// Load config: defaults -> optional TOML file (`OFFBOOK_CONFIG`, default
    /// `config/gateway`) -> `OFFBOOK_*` environment variables.
    pub fn load() -> Result<Self, config::ConfigError> {
        let config_path = std::env::var("OFFBOOK_CONFIG").unwrap_or_else(|_| "config/gateway".to_string());
        let builder = config::Config::builder()
            .set_default("app_name", "Offbook Gateway")?
            .set_default("port", 8000_i64)?
            .set_default("storage_path", "./data")?
            .set_default("tts_mode", "auto")?
            .set_default("script_ttl_hours", 24_i64)?
            .set_default("max_upload_bytes", 20_971_520_i64)?;

        // with_name resolves the extension, so "config/gateway" finds
        // config/gateway.toml; required(false) keeps a bare checkout working.
        let built = builder
            .add_source(config::File::with_name(&config_path).required(false))
            .add_source(config::Environment::with_prefix("OFFBOOK").separator("__"))
            .build()?;

        built.try_deserialize()
    }

    /// SQLite file backing the script store.
    pub fn db_path(&self) -> PathBuf {
        PathBuf::from(&self.storage_path).join("offbook").join("scripts.sqlite")
    }

    /// Directory for synthesized NPC audio, served under `/audio`.
    pub fn audio_dir(&self) -> PathBuf {
        PathBuf::from(&self.storage_path).join("offbook").join("audio")
    }

    /// Directory for uploaded script PDFs, kept until the script is deleted.
    pub fn uploads_dir(&self) -> PathBuf {
        PathBuf::from(&self.storage_path).join("offbook").join("uploads")
    }

    /// Script retention converted to milliseconds, the unit the store works in.
    pub fn script_ttl_ms(&self) -> i64 {
        (self.script_ttl_hours as i64) * 3_600_000
    }
}
