use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for the caption engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Transcript and metadata endpoints
    pub endpoints: EndpointConfig,

    /// Embedded player settings
    pub player: PlayerConfig,

    /// Follow-scroll behaviour of the transcript list
    pub scroll: ScrollConfig,

    /// Transcript normalization and preview settings
    pub transcript: TranscriptConfig,

    /// Cross-frame remote control
    pub remote: RemoteConfig,

    /// On-disk transcript cache
    pub cache: CacheConfig,

    /// Logging settings
    pub logging: LoggingConfig,

    /// HTTP/WebSocket server settings (api feature)
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointConfig {
    /// Base URL serving `/transcript/{id}` and `/video/{id}`
    pub base_url: String,

    /// Request timeout in seconds
    pub timeout_seconds: u64,

    /// Connection timeout in seconds
    pub connect_timeout_seconds: u64,

    /// User agent sent with every request
    pub user_agent: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerConfig {
    /// Player width in pixels
    pub width: u32,

    /// Player height in pixels
    pub height: u32,

    /// `currentTime` polling period while playing (milliseconds)
    pub poll_interval_ms: u64,

    /// Volume applied when a player becomes ready (0-100)
    pub initial_volume: u8,

    /// Start playback as soon as the player is ready
    pub autoplay: bool,

    /// Hide the widget's own controls in favour of ours
    pub hide_native_controls: bool,

    /// Playback rates offered by the transport controls
    pub playback_rates: Vec<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrollConfig {
    /// Follow mode enabled when a view opens
    pub follow_by_default: bool,

    /// Band at the top and bottom of the viewport that does not count as visible (px)
    pub margin_px: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptConfig {
    /// Drop bracketed sound annotations like `[音楽]`
    pub skip_annotations: bool,

    /// Number of segments shown in the upcoming preview
    pub upcoming_limit: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Enable the cross-frame remote control surface
    pub enabled: bool,

    /// Origins allowed to send remote commands, e.g. `https://app.example.com`
    pub allowed_origins: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Enable the on-disk transcript cache
    pub enabled: bool,

    /// Cache directory
    pub dir: PathBuf,

    /// Cache TTL in hours
    pub ttl_hours: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Filter directive passed to the tracing subscriber
    pub level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address
    pub host: String,

    /// Listening port
    pub port: u16,
}

impl Config {
    /// Load configuration from file
    pub fn load() -> Result<Self> {
        let config_paths = [
            "caption-sync.toml".to_string(),
            "config/caption-sync.toml".to_string(),
            expand_home("~/.config/caption-sync/config.toml"),
            "/etc/caption-sync/config.toml".to_string(),
        ];

        for path in &config_paths {
            if let Ok(config_str) = std::fs::read_to_string(path) {
                match toml::from_str(&config_str) {
                    Ok(config) => {
                        tracing::info!("📄 Loaded configuration from: {}", path);
                        return Ok(config);
                    }
                    Err(e) => {
                        tracing::warn!("Failed to parse config file {}: {}", path, e);
                    }
                }
            }
        }

        Self::from_env()
    }

    /// Load a specific configuration file
    pub fn load_from(path: &str) -> Result<Self> {
        let config_str = std::fs::read_to_string(path)
            .map_err(|e| anyhow!("Failed to read config file {}: {}", path, e))?;
        let config = toml::from_str(&config_str)
            .map_err(|e| anyhow!("Failed to parse config file {}: {}", path, e))?;
        tracing::info!("📄 Loaded configuration from: {}", path);
        Ok(config)
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(base_url) = std::env::var("CAPTION_SYNC_BASE_URL") {
            config.endpoints.base_url = base_url;
        }

        if let Ok(origins) = std::env::var("CAPTION_SYNC_ALLOWED_ORIGINS") {
            config.remote.allowed_origins = origins
                .split(',')
                .map(|o| o.trim().to_string())
                .filter(|o| !o.is_empty())
                .collect();
        }

        if let Ok(interval) = std::env::var("CAPTION_SYNC_POLL_INTERVAL_MS") {
            config.player.poll_interval_ms = interval.parse().unwrap_or(1000);
        }

        if let Ok(cache_dir) = std::env::var("CAPTION_SYNC_CACHE_DIR") {
            config.cache.dir = PathBuf::from(cache_dir);
        }

        if let Ok(log_level) = std::env::var("CAPTION_SYNC_LOG_LEVEL") {
            config.logging.level = log_level;
        }

        if let Ok(port) = std::env::var("CAPTION_SYNC_PORT") {
            config.server.port = port.parse().unwrap_or(8787);
        }

        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, path: &str) -> Result<()> {
        let config_str = toml::to_string_pretty(self)?;
        std::fs::write(path, config_str)?;
        tracing::info!("💾 Configuration saved to: {}", path);
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        url::Url::parse(&self.endpoints.base_url)
            .map_err(|e| anyhow!("endpoints.base_url is not a valid URL: {}", e))?;

        if self.endpoints.timeout_seconds == 0 {
            return Err(anyhow!("endpoints.timeout_seconds must be greater than 0"));
        }

        if self.player.poll_interval_ms < 250 || self.player.poll_interval_ms > 1000 {
            return Err(anyhow!("player.poll_interval_ms must be between 250 and 1000"));
        }

        if self.player.initial_volume > 100 {
            return Err(anyhow!("player.initial_volume must be at most 100"));
        }

        if self.player.playback_rates.iter().any(|r| !(r.is_finite() && *r > 0.0)) {
            return Err(anyhow!("player.playback_rates must be positive"));
        }

        if !(self.scroll.margin_px.is_finite() && self.scroll.margin_px >= 0.0) {
            return Err(anyhow!("scroll.margin_px must be non-negative"));
        }

        for origin in &self.remote.allowed_origins {
            if origin == "*" {
                return Err(anyhow!("remote.allowed_origins must list explicit origins, not '*'"));
            }
            crate::remote::OriginAllowList::parse_origin(origin)
                .map_err(|e| anyhow!("remote.allowed_origins entry {}: {}", origin, e))?;
        }

        if self.remote.enabled && self.remote.allowed_origins.is_empty() {
            tracing::warn!("Remote control enabled with an empty origin allow-list; every message will be rejected");
        }

        tracing::info!("✅ Configuration validation passed");
        Ok(())
    }

    /// Get runtime configuration summary
    pub fn summary(&self) -> String {
        format!(
            "Caption Sync Configuration:\n\
            - Endpoint: {}\n\
            - Poll Interval: {}ms\n\
            - Follow By Default: {}\n\
            - Scroll Margin: {}px\n\
            - Upcoming Preview: {}\n\
            - Remote Origins: {}\n\
            - Caching Enabled: {}",
            self.endpoints.base_url,
            self.player.poll_interval_ms,
            self.scroll.follow_by_default,
            self.scroll.margin_px,
            self.transcript.upcoming_limit,
            if self.remote.allowed_origins.is_empty() {
                "(none)".to_string()
            } else {
                self.remote.allowed_origins.join(", ")
            },
            self.cache.enabled
        )
    }
}

fn expand_home(path: &str) -> String {
    match (path.strip_prefix("~/"), std::env::var("HOME")) {
        (Some(rest), Ok(home)) => format!("{}/{}", home, rest),
        _ => path.to_string(),
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoints: EndpointConfig {
                base_url: "http://localhost:3000/api".to_string(),
                timeout_seconds: 30,
                connect_timeout_seconds: 10,
                user_agent: format!("caption-sync/{}", env!("CARGO_PKG_VERSION")),
            },
            player: PlayerConfig {
                width: 640,
                height: 360,
                poll_interval_ms: 1000,
                initial_volume: 100,
                autoplay: false,
                hide_native_controls: true,
                playback_rates: vec![0.5, 0.75, 1.0, 1.25, 1.5, 2.0],
            },
            scroll: ScrollConfig {
                follow_by_default: true,
                margin_px: 100.0,
            },
            transcript: TranscriptConfig {
                skip_annotations: true,
                upcoming_limit: 3,
            },
            remote: RemoteConfig {
                enabled: false,
                allowed_origins: Vec::new(),
            },
            cache: CacheConfig {
                enabled: true,
                dir: PathBuf::from("./cache/transcripts"),
                ttl_hours: 24,
            },
            logging: LoggingConfig {
                level: "caption_sync=info,warn".to_string(),
            },
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8787,
            },
        }
    }
}

/// Configuration builder for programmatic config creation
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.config.endpoints.base_url = base_url.into();
        self
    }

    pub fn with_poll_interval_ms(mut self, interval: u64) -> Self {
        self.config.player.poll_interval_ms = interval;
        self
    }

    pub fn with_allowed_origins(mut self, origins: Vec<String>) -> Self {
        self.config.remote.enabled = true;
        self.config.remote.allowed_origins = origins;
        self
    }

    pub fn with_scroll_margin(mut self, margin_px: f64) -> Self {
        self.config.scroll.margin_px = margin_px;
        self
    }

    pub fn with_cache_dir(mut self, dir: PathBuf) -> Self {
        self.config.cache.dir = dir;
        self
    }

    pub fn enable_caching(mut self, enable: bool) -> Self {
        self.config.cache.enabled = enable;
        self
    }

    pub fn skip_annotations(mut self, skip: bool) -> Self {
        self.config.transcript.skip_annotations = skip;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.player.poll_interval_ms, 1000);
        assert_eq!(config.scroll.margin_px, 100.0);
        assert!(config.transcript.skip_annotations);
        assert!(config.remote.allowed_origins.is_empty());
    }

    #[test]
    fn test_config_builder() {
        let config = ConfigBuilder::new()
            .with_base_url("https://captions.example.com")
            .with_poll_interval_ms(500)
            .with_allowed_origins(vec!["https://app.example.com".to_string()])
            .enable_caching(false)
            .build();

        assert_eq!(config.endpoints.base_url, "https://captions.example.com");
        assert_eq!(config.player.poll_interval_ms, 500);
        assert!(config.remote.enabled);
        assert!(!config.cache.enabled);
    }

    #[test]
    fn test_config_validation() {
        assert!(Config::default().validate().is_ok());

        let fast_poll = ConfigBuilder::new().with_poll_interval_ms(10).build();
        assert!(fast_poll.validate().is_err());

        let wildcard = ConfigBuilder::new().with_allowed_origins(vec!["*".to_string()]).build();
        assert!(wildcard.validate().is_err());

        let bad_origin = ConfigBuilder::new()
            .with_allowed_origins(vec!["not an origin".to_string()])
            .build();
        assert!(bad_origin.validate().is_err());
    }

    #[test]
    fn test_toml_round_trip() {
        let config = ConfigBuilder::new()
            .with_allowed_origins(vec!["https://app.example.com".to_string()])
            .build();
        let text = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&text).unwrap();
        assert_eq!(parsed.remote.allowed_origins, config.remote.allowed_origins);
        assert_eq!(parsed.player.playback_rates, config.player.playback_rates);
    }
}
