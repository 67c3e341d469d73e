//! Server configuration.
//!
//! Values come from three layers, later ones winning:
//! - built-in defaults
//! - a TOML file (`PCB_INSPECT_CONFIG`, or `./pcb-inspect.toml` when present)
//! - environment variables (`PORT`, `JWT_SECRET`, `INFERENCE_URL`, ...)

use std::{
    env,
    fmt::Display,
    path::{Path, PathBuf},
    str::FromStr,
};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use url::Url;

const DEFAULT_CONFIG_FILE: &str = "pcb-inspect.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub inference: InferenceConfig,
    pub storage: StorageConfig,
    pub limits: LimitsConfig,
    /// Directory whose TOML files replace the embedded content and catalog.
    pub content_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub cors_origin: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            cors_origin: "http://localhost:5173".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("data/pcb-inspect.db"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// HMAC secret for session tokens. Generated per process when unset.
    pub jwt_secret: Option<String>,
    pub token_ttl_hours: i64,
    pub remember_me_days: i64,
    pub bcrypt_cost: u32,
    pub secure_cookies: bool,
    pub seed_default_users: bool,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: None,
            token_ttl_hours: 24,
            remember_me_days: 30,
            bcrypt_cost: 10,
            secure_cookies: false,
            seed_default_users: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InferenceConfig {
    pub base_url: String,
    pub timeout_secs: u64,
    pub default_confidence: f64,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000".to_string(),
            timeout_secs: 60,
            default_confidence: 0.5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub model_dir: PathBuf,
    pub bootstrap_model: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            model_dir: PathBuf::from("uploads/model"),
            bootstrap_model: PathBuf::from("model/best.onnx"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    pub detection_image_bytes: usize,
    pub avatar_bytes: usize,
    pub model_bytes: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            detection_image_bytes: 15 * 1024 * 1024,
            avatar_bytes: 5 * 1024 * 1024,
            model_bytes: 100 * 1024 * 1024,
        }
    }
}

impl Config {
    /// Load the file layer (if any), apply env overrides and validate.
    pub fn load() -> Result<Self> {
        let explicit = env::var("PCB_INSPECT_CONFIG").ok().map(PathBuf::from);
        let mut config = match explicit {
            Some(path) => Self::from_file(&path)?,
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_FILE))?
            }
            None => {
                info!("No config file found, using defaults");
                Self::default()
            }
        };

        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {:?}", path))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Invalid TOML in config file {:?}", path))?;
        info!("Loaded config from {:?}", path);
        Ok(config)
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Some(host) = var("HOST") {
            self.server.host = host;
        }
        if let Some(port) = parse_var("PORT")? {
            self.server.port = port;
        }
        if let Some(origin) = var("CORS_ORIGIN") {
            self.server.cors_origin = origin;
        }
        if let Some(path) = var("DATABASE_PATH") {
            self.database.path = PathBuf::from(path);
        }
        if let Some(secret) = var("JWT_SECRET") {
            self.auth.jwt_secret = Some(secret);
        }
        if let Some(hours) = parse_var("JWT_EXPIRES_HOURS")? {
            self.auth.token_ttl_hours = hours;
        }
        if let Some(url) = var("INFERENCE_URL") {
            self.inference.base_url = url;
        }
        if let Some(dir) = var("CONTENT_DIR") {
            self.content_dir = Some(PathBuf::from(dir));
        }
        if var("APP_ENV").as_deref() == Some("production") {
            self.auth.secure_cookies = true;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        self.inference_url()?;
        anyhow::ensure!(self.auth.token_ttl_hours > 0, "auth.token_ttl_hours must be positive");
        anyhow::ensure!(self.auth.remember_me_days > 0, "auth.remember_me_days must be positive");
        anyhow::ensure!(
            (4..=31).contains(&self.auth.bcrypt_cost),
            "auth.bcrypt_cost must be between 4 and 31"
        );
        anyhow::ensure!(
            self.inference.default_confidence > 0.0 && self.inference.default_confidence <= 1.0,
            "inference.default_confidence must be in (0, 1]"
        );
        Ok(())
    }

    /// Parsed inference base URL, normalized to end with a slash so `join` appends.
    pub fn inference_url(&self) -> Result<Url> {
        let mut raw = self.inference.base_url.trim().to_string();
        if !raw.ends_with('/') {
            raw.push('/');
        }
        Url::parse(&raw).with_context(|| format!("Invalid inference.base_url '{}'", raw))
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

fn var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_var<T: FromStr>(key: &str) -> Result<Option<T>>
where
    T::Err: Display,
{
    match var(key) {
        Some(raw) => raw.trim().parse().map(Some).map_err(|e| {
            warn!("Invalid {key} value: {e}");
            anyhow::anyhow!("Invalid {key} value '{raw}': {e}")
        }),
        None => Ok(None),
    }
}
