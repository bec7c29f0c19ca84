//! ABOUTME: Configuration management with validation and environment loading
//! ABOUTME: Handles all application settings and engine parameter clamping

use config::{Config as ConfigBuilder, Environment, File};
use cw_core::{Error, Result};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Valid range for the density alert threshold.
pub const THRESHOLD_RANGE: (f64, f64) = (0.0, 1.0);
/// Valid range for the heatmap blend opacity.
pub const OPACITY_RANGE: (f64, f64) = (0.3, 1.0);

/// Clamp a density threshold into `[0, 1]`.
///
/// Out-of-range operator input is mapped to the nearest bound rather than
/// rejected, so a running session keeps processing.
pub fn clamp_threshold(value: f64) -> f64 {
    value.clamp(THRESHOLD_RANGE.0, THRESHOLD_RANGE.1)
}

/// Clamp a heatmap opacity into `[0.3, 1.0]`.
pub fn clamp_opacity(value: f64) -> f64 {
    value.clamp(OPACITY_RANGE.0, OPACITY_RANGE.1)
}

/// Main configuration struct
#[derive(Debug, Clone, Deserialize, Serialize, Validate, Default)]
#[serde(default)]
pub struct Config {
    #[validate(nested)]
    pub server: ServerConfig,
    #[validate(nested)]
    pub engine: EngineDefaults,
    #[validate(nested)]
    pub capture: CaptureSettings,
    pub render: RenderSettings,
    #[validate(nested)]
    pub alerts: AlertLogSettings,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct ServerConfig {
    #[validate(length(min = 1))]
    pub host: String,
    #[validate(range(min = 1, max = 65535))]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

/// Default engine parameters applied when a session start omits them
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct EngineDefaults {
    /// Density above which an alert fires (fraction of frame area)
    #[validate(range(min = 0.0, max = 1.0))]
    pub density_threshold: f64,
    /// Heatmap blend opacity
    #[validate(range(min = 0.3, max = 1.0))]
    pub heatmap_opacity: f64,
    /// Minimum seconds between repeated HIGH alerts
    #[validate(range(min = 0.0))]
    pub alert_cooldown_seconds: f64,
    /// Identity stamped on emitted alert events
    #[validate(length(min = 1))]
    pub site_id: String,
}

impl Default for EngineDefaults {
    fn default() -> Self {
        Self {
            density_threshold: 0.45,
            heatmap_opacity: 0.70,
            alert_cooldown_seconds: 3.0,
            site_id: default_site_id(),
        }
    }
}

/// Capture adapter settings
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct CaptureSettings {
    /// ffmpeg binary used for frame decoding
    #[validate(length(min = 1))]
    pub ffmpeg_bin: String,
    /// ffprobe binary used for dimension probing
    #[validate(length(min = 1))]
    pub ffprobe_bin: String,
    /// Backoff before reopening a failed network source (milliseconds)
    #[validate(range(min = 10, max = 60000))]
    pub reconnect_backoff_ms: u64,
    /// Consecutive reopen failures tolerated before the loop gives up
    #[validate(range(min = 1, max = 1000))]
    pub max_reconnect_attempts: u32,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            ffmpeg_bin: "ffmpeg".to_string(),
            ffprobe_bin: "ffprobe".to_string(),
            reconnect_backoff_ms: 250,
            max_reconnect_attempts: 10,
        }
    }
}

/// Rendering settings
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct RenderSettings {
    /// Path to a TTF font for overlay text; falls back to common system
    /// locations, and overlays degrade to geometry-only without one.
    pub font_path: Option<String>,
}

/// Alert log collaborator settings
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct AlertLogSettings {
    /// JSON file the most recent alerts are persisted to (best effort)
    pub persist_path: Option<String>,
    /// Events held in memory for listing
    #[validate(range(min = 1, max = 100000))]
    pub memory_capacity: usize,
    /// Events written to the persist file
    #[validate(range(min = 1, max = 10000))]
    pub persist_count: usize,
}

impl Default for AlertLogSettings {
    fn default() -> Self {
        Self {
            persist_path: Some("data/alerts.json".to_string()),
            memory_capacity: 1000,
            persist_count: 100,
        }
    }
}

/// Site identity derived from the host name, dots replaced so the id is
/// safe in topic/file names.
pub fn default_site_id() -> String {
    hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .map(|h| h.replace('.', "-"))
        .filter(|h| !h.is_empty())
        .unwrap_or_else(|| "site-001".to_string())
}

impl Config {
    /// Load configuration from environment variables and optional .env file
    pub fn load() -> Result<Self> {
        let mut builder = ConfigBuilder::builder();

        builder = builder
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8080)?
            .set_default("engine.density_threshold", 0.45)?
            .set_default("engine.heatmap_opacity", 0.70)?
            .set_default("engine.alert_cooldown_seconds", 3.0)?
            .set_default("engine.site_id", default_site_id())?
            .set_default("capture.ffmpeg_bin", "ffmpeg")?
            .set_default("capture.ffprobe_bin", "ffprobe")?
            .set_default("capture.reconnect_backoff_ms", 250)?
            .set_default("capture.max_reconnect_attempts", 10)?
            .set_default("alerts.persist_path", "data/alerts.json")?
            .set_default("alerts.memory_capacity", 1000)?
            .set_default("alerts.persist_count", 100)?;

        // Nested keys containing underscores don't split cleanly with the
        // standard separator, so the commonly tuned ones are mapped explicitly.
        for (var, key) in [
            (
                "CROWDWATCH_ENGINE_DENSITY_THRESHOLD",
                "engine.density_threshold",
            ),
            (
                "CROWDWATCH_ENGINE_HEATMAP_OPACITY",
                "engine.heatmap_opacity",
            ),
            (
                "CROWDWATCH_ENGINE_ALERT_COOLDOWN_SECONDS",
                "engine.alert_cooldown_seconds",
            ),
            ("CROWDWATCH_ENGINE_SITE_ID", "engine.site_id"),
            (
                "CROWDWATCH_CAPTURE_RECONNECT_BACKOFF_MS",
                "capture.reconnect_backoff_ms",
            ),
            (
                "CROWDWATCH_CAPTURE_MAX_RECONNECT_ATTEMPTS",
                "capture.max_reconnect_attempts",
            ),
            ("CROWDWATCH_RENDER_FONT_PATH", "render.font_path"),
        ] {
            if let Ok(value) = std::env::var(var) {
                builder = builder.set_override(key, value)?;
            }
        }

        // Try to load from .env file if it exists (optional)
        if std::path::Path::new(".env").exists() {
            builder = builder.add_source(File::with_name(".env").required(false));
        }

        // Load from environment variables with CROWDWATCH_ prefix (highest priority)
        builder = builder.add_source(
            Environment::with_prefix("CROWDWATCH")
                .try_parsing(true)
                .separator("_"),
        );

        let config = builder
            .build()
            .map_err(|e| Error::Config(format!("Failed to build config: {}", e)))?;

        let parsed: Config = config
            .try_deserialize()
            .map_err(|e| Error::Config(format!("Failed to deserialize config: {}", e)))?;

        parsed
            .validate()
            .map_err(|e| Error::Config(format!("Config validation failed: {}", e)))?;

        Ok(parsed)
    }
}
