use crate::auth::password::MIN_ROUNDS;
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable naming the config file.
pub const CONFIG_PATH_ENV: &str = "SSO_CONFIG_PATH";

/// Longest accepted token lifetime (one year).
pub const MAX_TOKEN_TTL_SECS: u64 = 365 * 24 * 60 * 60;

/// Deployment environment. Selects the default log level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Env {
    #[default]
    Local,
    Dev,
    Prod,
}

impl std::str::FromStr for Env {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "dev" => Ok(Self::Dev),
            "prod" => Ok(Self::Prod),
            other => bail!("unknown env '{other}' (expected local, dev or prod)"),
        }
    }
}

/// Top-level service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub env: Env,
    /// SQLite database file.
    pub storage_path: PathBuf,
    /// Lifetime of issued tokens, in seconds.
    pub token_ttl_secs: u64,
    pub password: PasswordConfig,
    pub gateway: GatewayConfig,
    pub storage: StorageConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            env: Env::default(),
            storage_path: PathBuf::from("./storage/sso.db"),
            token_ttl_secs: 3600,
            password: PasswordConfig::default(),
            gateway: GatewayConfig::default(),
            storage: StorageConfig::default(),
        }
    }
}

/// Password hashing work factor.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PasswordConfig {
    /// PBKDF2-HMAC-SHA256 iteration count for new hashes.
    pub rounds: u32,
}

impl Default for PasswordConfig {
    fn default() -> Self {
        Self { rounds: 600_000 }
    }
}

/// HTTP gateway settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
    /// Deadline applied to every service call.
    pub request_timeout_secs: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 44044,
            request_timeout_secs: 10,
        }
    }
}

/// SQLite pool settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub max_connections: u32,
    pub migrations_table: String,
    pub busy_timeout_ms: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            max_connections: 8,
            migrations_table: crate::storage::migrate::DEFAULT_MIGRATIONS_TABLE.into(),
            busy_timeout_ms: 5000,
        }
    }
}

impl Config {
    /// Resolve the config file and load it.
    ///
    /// Order: explicit path, `SSO_CONFIG_PATH`, the platform config dir.
    /// A missing default file yields built-in defaults; a missing explicit
    /// file is an error.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let from_env = std::env::var_os(CONFIG_PATH_ENV)
            .map(PathBuf::from)
            .filter(|p| !p.as_os_str().is_empty());

        let mut config = match explicit.map(Path::to_path_buf).or(from_env) {
            Some(path) => Self::load_from_path(&path)?,
            None => match default_config_path() {
                Some(path) if path.exists() => Self::load_from_path(&path)?,
                _ => Self::default(),
            },
        };

        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        Self::from_toml(&raw).with_context(|| format!("invalid config {}", path.display()))
    }

    pub fn from_toml(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    /// Environment variables win over the file.
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Some(env) = env_value("SSO_ENV") {
            self.env = env.parse()?;
        }
        if let Some(path) = env_value("SSO_STORAGE_PATH") {
            self.storage_path = PathBuf::from(path);
        }
        if let Some(ttl) = env_value("SSO_TOKEN_TTL_SECS") {
            self.token_ttl_secs = ttl
                .parse()
                .with_context(|| format!("SSO_TOKEN_TTL_SECS is not a number: {ttl}"))?;
        }
        if let Some(port) = env_value("SSO_GATEWAY_PORT") {
            self.gateway.port = port
                .parse()
                .with_context(|| format!("SSO_GATEWAY_PORT is not a port: {port}"))?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.token_ttl_secs == 0 {
            bail!("token_ttl_secs must be greater than zero");
        }
        if self.token_ttl_secs > MAX_TOKEN_TTL_SECS {
            bail!("token_ttl_secs must be at most {MAX_TOKEN_TTL_SECS} (one year)");
        }
        if self.password.rounds < MIN_ROUNDS {
            bail!("password.rounds must be at least {MIN_ROUNDS}");
        }
        if self.storage.max_connections == 0 {
            bail!("storage.max_connections must be greater than zero");
        }
        if self.storage_path.as_os_str().is_empty() {
            bail!("storage_path is not set");
        }
        Ok(())
    }

    pub fn token_ttl(&self) -> Duration {
        Duration::from_secs(self.token_ttl_secs)
    }
}

impl GatewayConfig {
    pub fn request_timeout(&self) -> Option<Duration> {
        (self.request_timeout_secs > 0).then(|| Duration::from_secs(self.request_timeout_secs))
    }
}

fn env_value(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}

fn default_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "sso").map(|dirs| dirs.config_dir().join("config.toml"))
}
