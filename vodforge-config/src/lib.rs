//! Configuration management for Vodforge services

use serde::Deserialize;
use std::env;
use std::path::PathBuf;

/// External encoder configuration
#[derive(Debug, Clone, Deserialize)]
pub struct EncoderConfig {
    /// Encoder binary invoked per rendition job.
    pub encoder_bin: String,
    /// Probe binary used for source metadata extraction.
    pub probe_bin: String,
    /// Target audio bitrate passed to every encode, e.g. "128k".
    pub audio_bitrate: String,
    /// Global bound on concurrently running encode subprocesses. Enforced
    /// across all assets, not per asset.
    pub max_concurrent_encodes: usize,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    /// `max-age` for Cache-Control on streamed rendition bytes.
    pub cache_max_age_secs: u64,
}

/// Application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Root directory where rendition outputs are written.
    pub media_root: PathBuf,
    /// Quality labels selecting a subset of the standard ladder, in any
    /// order. `None` means the full standard ladder.
    pub ladder_labels: Option<Vec<String>>,
    pub encoder: EncoderConfig,
    pub server: ServerConfig,
    pub log_level: Option<String>,
    /// "json" for structured production logs, anything else for console.
    pub log_format: Option<String>,
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, config::ConfigError> {
        // Load .env file if it exists
        let _ = dotenvy::dotenv();

        let media_root = env::var("MEDIA_ROOT")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/var/lib/vodforge/media"));

        let ladder_labels = env::var("QUALITY_LADDER").ok().map(|raw| {
            raw.split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        });

        let encoder = EncoderConfig {
            encoder_bin: env::var("ENCODER_BIN").unwrap_or_else(|_| "ffmpeg".to_string()),
            probe_bin: env::var("PROBE_BIN").unwrap_or_else(|_| "ffprobe".to_string()),
            audio_bitrate: env::var("AUDIO_BITRATE").unwrap_or_else(|_| "128k".to_string()),
            max_concurrent_encodes: env::var("MAX_CONCURRENT_ENCODES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(4),
        };

        let server = ServerConfig {
            port: env::var("HTTP_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(8080),
            cache_max_age_secs: env::var("CACHE_MAX_AGE_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(86400),
        };

        let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
        let log_format = env::var("LOG_FORMAT").ok();

        Ok(Self {
            media_root,
            ladder_labels,
            encoder,
            server,
            log_level: Some(log_level),
            log_format,
        })
    }

    /// Get log level, defaulting to "info"
    pub fn log_level(&self) -> &str {
        self.log_level.as_deref().unwrap_or("info")
    }

    /// Whether structured JSON logging was requested.
    pub fn json_logging(&self) -> bool {
        self.log_format
            .as_deref()
            .map(|format| format.eq_ignore_ascii_case("json"))
            .unwrap_or(false)
    }
}
