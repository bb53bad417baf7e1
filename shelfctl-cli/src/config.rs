//! Layered service configuration
//!
//! Precedence, lowest first: built-in defaults, TOML file, `.env` and
//! process environment, command-line flags. Environment and flags are both
//! read by clap (`#[arg(env = ...)]`), so one struct covers the last two
//! layers.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Args;
use serde::{Deserialize, Serialize};
use shelfctl_core::{DEFAULT_WORK_FACTOR, MAX_WORK_FACTOR, MIN_WORK_FACTOR};
use shelfctl_server::db::{PoolConfig, RetryPolicy};
use shelfctl_server::{LifecycleConfig, ServiceConfig};
use url::Url;

/// File read when `--config` is not given, if it exists.
pub const DEFAULT_CONFIG_FILE: &str = "shelfctl.toml";

/// Effective configuration, as stored in `shelfctl.toml`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ShelfConfig {
    pub bind: SocketAddr,
    pub database_url: Option<String>,
    pub work_factor: u32,
    pub health_timeout_ms: u64,
    pub drain_timeout_secs: u64,
    pub pool: PoolSection,
    pub probe: ProbeSection,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct PoolSection {
    pub max_open: u32,
    pub max_idle: u32,
    pub max_lifetime_secs: u64,
    pub max_idle_time_secs: u64,
    pub acquire_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ProbeSection {
    pub timeout_secs: u64,
    pub retries: u32,
    pub backoff_ms: u64,
}

impl Default for ShelfConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([0, 0, 0, 0], 8080)),
            database_url: None,
            work_factor: DEFAULT_WORK_FACTOR,
            health_timeout_ms: 1000,
            drain_timeout_secs: 30,
            pool: PoolSection::default(),
            probe: ProbeSection::default(),
        }
    }
}

impl Default for PoolSection {
    fn default() -> Self {
        Self {
            max_open: 25,
            max_idle: 5,
            max_lifetime_secs: 300,
            max_idle_time_secs: 60,
            acquire_timeout_secs: 5,
        }
    }
}

impl Default for ProbeSection {
    fn default() -> Self {
        Self {
            timeout_secs: 5,
            retries: 3,
            backoff_ms: 1000,
        }
    }
}

/// Environment and flag overrides shared by every command that needs the
/// effective configuration
#[derive(Args, Debug, Clone, Default)]
pub struct ConfigOverrides {
    /// Path to a TOML config file (default: ./shelfctl.toml if present)
    #[arg(long, short = 'c', env = "SHELFCTL_CONFIG")]
    pub config: Option<PathBuf>,

    /// Address to bind to (default: 0.0.0.0:8080)
    #[arg(long, short = 'b', env = "SHELFCTL_BIND")]
    pub bind: Option<SocketAddr>,

    /// Port to listen on all interfaces; ignored when --bind is set
    #[arg(long, env = "PORT")]
    pub port: Option<u16>,

    /// PostgreSQL connection string
    #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
    pub database_url: Option<String>,

    /// Maximum open database connections
    #[arg(long, env = "SHELFCTL_MAX_OPEN")]
    pub max_open: Option<u32>,

    /// Maximum idle database connections
    #[arg(long, env = "SHELFCTL_MAX_IDLE")]
    pub max_idle: Option<u32>,

    /// Seconds accepted requests get to finish on shutdown
    #[arg(long, env = "SHELFCTL_DRAIN_TIMEOUT_SECS")]
    pub drain_timeout_secs: Option<u64>,

    /// Per-attempt timeout for the startup database probe, in seconds
    #[arg(long, env = "SHELFCTL_PROBE_TIMEOUT_SECS")]
    pub probe_timeout_secs: Option<u64>,

    /// Retries after the first failed startup probe
    #[arg(long, env = "SHELFCTL_PROBE_RETRIES")]
    pub probe_retries: Option<u32>,

    /// PBKDF2 iterations for new credentials
    #[arg(long, env = "SHELFCTL_WORK_FACTOR")]
    pub work_factor: Option<u32>,
}

impl ShelfConfig {
    /// Parse a TOML document on top of the defaults.
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse config file (invalid TOML)")
    }

    /// Read a config file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_toml(&content)
    }

    /// Defaults, then the config file, then overrides.
    pub fn load(overrides: &ConfigOverrides) -> Result<Self> {
        let mut config = match &overrides.config {
            Some(path) => Self::from_file(path)?,
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    Self::from_file(default_path)?
                } else {
                    Self::default()
                }
            }
        };
        config.apply(overrides);
        Ok(config)
    }

    /// Apply environment/flag overrides in place.
    pub fn apply(&mut self, overrides: &ConfigOverrides) {
        match (overrides.bind, overrides.port) {
            (Some(bind), _) => self.bind = bind,
            (None, Some(port)) => self.bind = SocketAddr::from(([0, 0, 0, 0], port)),
            (None, None) => {}
        }
        if let Some(url) = &overrides.database_url {
            self.database_url = Some(url.clone());
        }
        if let Some(v) = overrides.max_open {
            self.pool.max_open = v;
        }
        if let Some(v) = overrides.max_idle {
            self.pool.max_idle = v;
        }
        if let Some(v) = overrides.drain_timeout_secs {
            self.drain_timeout_secs = v;
        }
        if let Some(v) = overrides.probe_timeout_secs {
            self.probe.timeout_secs = v;
        }
        if let Some(v) = overrides.probe_retries {
            self.probe.retries = v;
        }
        if let Some(v) = overrides.work_factor {
            self.work_factor = v;
        }
    }

    /// Check the values and build the server configuration.
    pub fn to_service_config(&self) -> Result<ServiceConfig> {
        let url = self
            .database_url
            .clone()
            .filter(|u| !u.trim().is_empty())
            .context("DATABASE_URL not set. Set via --database-url, DATABASE_URL env, .env or shelfctl.toml")?;

        if !(MIN_WORK_FACTOR..=MAX_WORK_FACTOR).contains(&self.work_factor) {
            bail!(
                "work_factor {} out of range ({}..={})",
                self.work_factor,
                MIN_WORK_FACTOR,
                MAX_WORK_FACTOR
            );
        }
        if self.drain_timeout_secs == 0 {
            bail!("drain_timeout_secs must be greater than zero");
        }
        if self.probe.timeout_secs == 0 {
            bail!("probe.timeout_secs must be greater than zero");
        }

        Ok(ServiceConfig {
            bind_addr: self.bind,
            pool: PoolConfig {
                url,
                max_open: self.pool.max_open,
                max_idle: self.pool.max_idle,
                max_lifetime: Duration::from_secs(self.pool.max_lifetime_secs),
                max_idle_time: Duration::from_secs(self.pool.max_idle_time_secs),
                acquire_timeout: Duration::from_secs(self.pool.acquire_timeout_secs),
            },
            lifecycle: LifecycleConfig {
                probe_timeout: Duration::from_secs(self.probe.timeout_secs),
                probe_retry: RetryPolicy {
                    retries: self.probe.retries,
                    backoff: Duration::from_millis(self.probe.backoff_ms),
                },
                drain_timeout: Duration::from_secs(self.drain_timeout_secs),
                ..LifecycleConfig::default()
            },
            health_timeout: Duration::from_millis(self.health_timeout_ms),
            work_factor: self.work_factor,
        })
    }

    /// TOML rendering with the database password masked.
    pub fn to_redacted_toml(&self) -> Result<String> {
        let mut shown = self.clone();
        shown.database_url = shown.database_url.as_deref().map(redact_url);
        toml::to_string_pretty(&shown).context("Failed to render config as TOML")
    }
}

/// Shown in place of any secret.
const MASK: &str = "****";

/// Mask the password in a connection URL, both in the userinfo and in any
/// `password`-like query parameter. Anything that does not parse as a URL
/// is masked whole.
pub fn redact_url(raw: &str) -> String {
    let Ok(mut url) = Url::parse(raw) else {
        return MASK.to_owned();
    };

    if url.password().is_some() && url.set_password(Some(MASK)).is_err() {
        return MASK.to_owned();
    }

    let is_secret = |key: &str| key.to_ascii_lowercase().contains("password");
    if url.query_pairs().any(|(key, _)| is_secret(&key)) {
        let pairs: Vec<(String, String)> = url
            .query_pairs()
            .map(|(key, value)| {
                let value = if is_secret(&key) {
                    MASK.to_owned()
                } else {
                    value.into_owned()
                };
                (key.into_owned(), value)
            })
            .collect();
        url.query_pairs_mut().clear().extend_pairs(pairs);
    }

    url.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = ShelfConfig::default();
        assert_eq!(config.bind.port(), 8080);
        assert_eq!(config.pool.max_open, 25);
        assert_eq!(config.pool.max_idle, 5);
        assert_eq!(config.probe.retries, 3);
        assert_eq!(config.drain_timeout_secs, 30);
        assert_eq!(config.probe.timeout_secs, 5);
    }

    #[test]
    fn toml_fills_in_defaults() {
        let config = ShelfConfig::from_toml(
            r#"
            database_url = "postgres://u:p@db/shelf"
            drain_timeout_secs = 10

            [pool]
            max_open = 50
            "#,
        )
        .unwrap();
        assert_eq!(config.drain_timeout_secs, 10);
        assert_eq!(config.pool.max_open, 50);
        assert_eq!(config.pool.max_idle, 5);
        assert_eq!(config.probe.timeout_secs, 5);
    }

    #[test]
    fn unknown_keys_rejected() {
        assert!(ShelfConfig::from_toml("drain_timeout = 3").is_err());
    }

    #[test]
    fn overrides_win_over_file() {
        let mut config = ShelfConfig::from_toml("drain_timeout_secs = 10").unwrap();
        config.apply(&ConfigOverrides {
            port: Some(9000),
            drain_timeout_secs: Some(2),
            database_url: Some("postgres://localhost/shelf".into()),
            ..Default::default()
        });
        assert_eq!(config.bind, SocketAddr::from(([0, 0, 0, 0], 9000)));
        assert_eq!(config.drain_timeout_secs, 2);

        config.apply(&ConfigOverrides {
            bind: Some("127.0.0.1:7000".parse().unwrap()),
            port: Some(9000),
            ..Default::default()
        });
        assert_eq!(config.bind.port(), 7000);
    }

    #[test]
    fn service_config_requires_database_url() {
        let err = ShelfConfig::default().to_service_config().unwrap_err();
        assert!(err.to_string().contains("DATABASE_URL"));
    }

    #[test]
    fn service_config_maps_knobs() {
        let config = ShelfConfig {
            database_url: Some("postgres://localhost/shelf".into()),
            drain_timeout_secs: 12,
            ..Default::default()
        };
        let service = config.to_service_config().unwrap();
        assert_eq!(service.lifecycle.drain_timeout, Duration::from_secs(12));
        assert_eq!(service.lifecycle.probe_timeout, Duration::from_secs(5));
        assert_eq!(service.lifecycle.probe_retry.retries, 3);
        assert_eq!(service.pool.max_idle, 5);
        assert_eq!(service.health_timeout, Duration::from_secs(1));
    }

    #[test]
    fn work_factor_range_checked() {
        let config = ShelfConfig {
            database_url: Some("postgres://localhost/shelf".into()),
            work_factor: 10,
            ..Default::default()
        };
        assert!(config.to_service_config().is_err());
    }

    #[test]
    fn redacts_password_only() {
        assert_eq!(
            redact_url("postgres://shelf:hunter2@db:5432/shelf?sslmode=require"),
            "postgres://shelf:****@db:5432/shelf?sslmode=require"
        );
        assert_eq!(redact_url("postgres://shelf@db/shelf"), "postgres://shelf@db/shelf");
        assert_eq!(redact_url("postgres://db/shelf"), "postgres://db/shelf");
        assert_eq!(redact_url("not a url"), MASK);
    }

    #[test]
    fn redacts_password_query_parameter() {
        assert_eq!(
            redact_url("postgres://shelf@db/shelf?password=hunter2"),
            "postgres://shelf@db/shelf?password=****"
        );
        assert_eq!(
            redact_url("postgres://shelf:hunter2@db/shelf?sslmode=require&password=hunter2"),
            "postgres://shelf:****@db/shelf?sslmode=require&password=****"
        );

        let config = ShelfConfig {
            database_url: Some("postgres://shelf@db/shelf?sslpassword=hunter2".into()),
            ..Default::default()
        };
        assert!(!config.to_redacted_toml().unwrap().contains("hunter2"));
    }

    #[test]
    fn redacted_toml_hides_password() {
        let config = ShelfConfig {
            database_url: Some("postgres://shelf:hunter2@db/shelf".into()),
            ..Default::default()
        };
        let shown = config.to_redacted_toml().unwrap();
        assert!(!shown.contains("hunter2"));
        assert!(shown.contains("[pool]"));
    }
}
