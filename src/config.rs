use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TrackingConfig {
    /// Paths that are served normally but never written to the request log.
    #[serde(default)]
    pub skip_paths: Vec<String>,
    pub queue_capacity: usize,
}

/// Where geolocation enrichment happens relative to the response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GeoMode {
    /// Resolve and write the log entry before the response is returned.
    Inline,
    /// Queue the entry; a worker resolves and writes it.
    Background,
    /// Write entries without geolocation.
    Off,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeoConfig {
    pub enabled: bool,
    pub mode: GeoMode,
    pub api_base_url: String,
    pub timeout_ms: u64,
    pub cache_ttl_secs: u64,
    pub failure_ttl_secs: u64,
    pub cache_capacity: usize,
    pub cache_namespace: String,
    pub skip_private: bool,
}

impl GeoConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn failure_ttl(&self) -> Duration {
        Duration::from_secs(self.failure_ttl_secs)
    }

    /// Enrichment is active only when enabled and not switched off by mode.
    pub fn is_active(&self) -> bool {
        self.enabled && self.mode != GeoMode::Off
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AdminConfig {
    pub enabled: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub tracking: TrackingConfig,
    pub geo: GeoConfig,
    pub admin: AdminConfig,
}

const DEFAULTS: &str = include_str!("../config/default.toml");

impl Default for AppConfig {
    fn default() -> Self {
        // Fallback: parse the embedded default TOML
        match ::config::Config::builder()
            .add_source(::config::File::from_str(DEFAULTS, ::config::FileFormat::Toml))
            .build()
        {
            Ok(cfg) => match cfg.try_deserialize() {
                Ok(app_cfg) => app_cfg,
                Err(e) => {
                    eprintln!("FATAL: Failed to deserialize default config: {}", e);
                    panic!("Failed to deserialize default config: {}", e);
                }
            },
            Err(e) => {
                eprintln!("FATAL: Failed to parse default config: {}", e);
                panic!("Failed to parse default config: {}", e);
            }
        }
    }
}

pub fn load() -> anyhow::Result<AppConfig> {
    // Load .env first (optional)
    let _ = dotenvy::dotenv();

    let mut builder = ::config::Config::builder()
        .add_source(::config::File::from_str(DEFAULTS, ::config::FileFormat::Toml))
        // Optional local file: ip-tracking.toml (in CWD)
        .add_source(::config::File::with_name("ip-tracking").required(false));

    if let Ok(custom_path) = std::env::var("IP_TRACKING_CONFIG") {
        builder = builder.add_source(::config::File::with_name(&custom_path).required(false));
    }
    // Environment variables last to have highest precedence
    builder = builder.add_source(
        ::config::Environment::with_prefix("IP_TRACKING")
            .prefix_separator("__")
            .separator("__")
            .list_separator(",")
            .with_list_parse_key("tracking.skip_paths")
            .try_parsing(true),
    );

    let cfg = builder.build()?;
    let app_cfg: AppConfig = cfg.try_deserialize()?;
    validate(&app_cfg)?;
    Ok(app_cfg)
}

pub fn validate(cfg: &AppConfig) -> anyhow::Result<()> {
    // Server
    if cfg.server.port == 0 {
        return Err(anyhow::anyhow!("invalid server.port: {}", cfg.server.port));
    }
    #[cfg(unix)]
    if cfg.server.port < 1024 {
        tracing::warn!("Using privileged port {} - may require elevated permissions", cfg.server.port);
    }

    if cfg.database.url.trim().is_empty() {
        return Err(anyhow::anyhow!("database.url must not be empty"));
    }

    // Tracking
    if cfg.tracking.queue_capacity == 0 {
        return Err(anyhow::anyhow!("tracking.queue_capacity must be > 0"));
    }
    if let Some(p) = cfg.tracking.skip_paths.iter().find(|p| !p.starts_with('/')) {
        return Err(anyhow::anyhow!("tracking.skip_paths entries must start with '/': {}", p));
    }

    // Geo
    let geo = &cfg.geo;
    if geo.api_base_url.trim().is_empty() {
        return Err(anyhow::anyhow!("geo.api_base_url must not be empty"));
    }
    if geo.timeout_ms == 0 {
        return Err(anyhow::anyhow!("geo.timeout_ms must be > 0"));
    }
    if geo.cache_ttl_secs == 0 {
        return Err(anyhow::anyhow!("geo.cache_ttl_secs must be > 0"));
    }
    if geo.failure_ttl_secs > geo.cache_ttl_secs {
        return Err(anyhow::anyhow!("geo.failure_ttl_secs must be <= geo.cache_ttl_secs"));
    }
    if geo.cache_capacity == 0 {
        return Err(anyhow::anyhow!("geo.cache_capacity must be > 0"));
    }

    Ok(())
}

pub fn ensure_sqlite_parent_dir(url: &str) -> anyhow::Result<()> {
    if let Some(path) = url.strip_prefix("sqlite://") {
        // On Windows, handle URLs like sqlite:///C:/... by stripping the leading '/'
        #[cfg(windows)]
        let path = {
            let bytes = path.as_bytes();
            if bytes.len() >= 3 && bytes[0] == b'/' && bytes[2] == b':' && bytes[1].is_ascii_alphabetic() {
                &path[1..]
            } else {
                path
            }
        };
        let p = Path::new(path);
        if let Some(parent) = p.parent() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}
