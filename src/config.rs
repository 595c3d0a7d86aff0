use crate::error::{ClientError, Result};
use crate::masking::format_credentials;
use directories::ProjectDirs;
use secrecy::SecretString;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_PORT: u16 = 19002;
pub const DEFAULT_MAX_WARNINGS: u32 = 10;
pub const DEFAULT_ACTIVE_REQUESTS_PATH: &str = "/admin/requests/running";

/// Decides which I/O failures are reported as transient connection errors.
///
/// Timeouts are never subject to the policy, they always surface as
/// [`ClientError::Timeout`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TransientPolicy {
    #[default]
    Never,
    ConnectFailures,
    Always,
}

impl TransientPolicy {
    /// Classify a transport failure raised while talking to the service.
    pub fn http_error(&self, err: &reqwest::Error, context: &str) -> ClientError {
        if err.is_timeout() {
            return ClientError::Timeout {
                message: format!("{}: {}", context, err),
            };
        }
        let transient = match self {
            TransientPolicy::Never => false,
            TransientPolicy::ConnectFailures => err.is_connect(),
            TransientPolicy::Always => true,
        };
        ClientError::Connection {
            message: format!("{}: {}", context, err),
            transient,
        }
    }

    /// Classify a failure raised while reading a response body.
    pub fn io_error(&self, err: &io::Error, context: &str) -> ClientError {
        if matches!(err.kind(), io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock) {
            return ClientError::Timeout {
                message: format!("{}: {}", context, err),
            };
        }
        let transient = match self {
            TransientPolicy::Never => false,
            TransientPolicy::ConnectFailures => matches!(
                err.kind(),
                io::ErrorKind::ConnectionRefused
                    | io::ErrorKind::ConnectionReset
                    | io::ErrorKind::ConnectionAborted
                    | io::ErrorKind::Interrupted
            ),
            TransientPolicy::Always => true,
        };
        ClientError::Connection {
            message: format!("{}: {}", context, err),
            transient,
        }
    }
}

/// Everything needed to reach one query service.
#[derive(Debug)]
pub struct ClientConfig {
    pub host: String,
    pub port: u16,
    pub user: Option<String>,
    pub password: Option<SecretString>,
    pub connect_timeout: Option<Duration>,
    pub socket_timeout: Option<Duration>,
    pub max_warnings: u32,
    pub sql_compat: bool,
    pub dataverse: Option<String>,
    pub active_requests_path: String,
    pub ssl: bool,
    pub transient_policy: TransientPolicy,
    /// Profile keys that were not understood, reported as connection warnings.
    pub unsupported: Vec<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: DEFAULT_PORT,
            user: None,
            password: None,
            connect_timeout: None,
            socket_timeout: None,
            max_warnings: DEFAULT_MAX_WARNINGS,
            sql_compat: true,
            dataverse: None,
            active_requests_path: DEFAULT_ACTIVE_REQUESTS_PATH.to_string(),
            ssl: false,
            transient_policy: TransientPolicy::default(),
            unsupported: Vec::new(),
        }
    }
}

impl ClientConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Self::default()
        }
    }

    pub fn with_credentials(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self.password = Some(SecretString::from(password.into()));
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    pub fn with_socket_timeout(mut self, timeout: Duration) -> Self {
        self.socket_timeout = Some(timeout);
        self
    }

    pub fn with_max_warnings(mut self, max_warnings: u32) -> Self {
        self.max_warnings = max_warnings;
        self
    }

    pub fn with_sql_compat(mut self, sql_compat: bool) -> Self {
        self.sql_compat = sql_compat;
        self
    }

    pub fn with_dataverse(mut self, dataverse: impl Into<String>) -> Self {
        self.dataverse = Some(dataverse.into());
        self
    }

    pub fn with_active_requests_path(mut self, path: impl Into<String>) -> Self {
        self.active_requests_path = path.into();
        self
    }

    pub fn with_ssl(mut self, ssl: bool) -> Self {
        self.ssl = ssl;
        self
    }

    pub fn with_transient_policy(mut self, policy: TransientPolicy) -> Self {
        self.transient_policy = policy;
        self
    }

    pub(crate) fn scheme(&self) -> &'static str {
        if self.ssl { "https" } else { "http" }
    }
}

impl fmt::Display for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}://{}:{} {}",
            self.scheme(),
            self.host,
            self.port,
            format_credentials(self.user.as_deref(), self.password.as_ref(), false)
        )
    }
}

// --- TOML config file structs ---

#[derive(Debug, Deserialize, Default)]
struct TomlConfig {
    #[serde(default)]
    defaults: TomlProfile,
    #[serde(default)]
    profiles: HashMap<String, TomlProfile>,
}

#[derive(Debug, Deserialize, Default, Clone)]
struct TomlProfile {
    host: Option<String>,
    port: Option<u16>,
    user: Option<String>,
    password: Option<String>,
    password_env: Option<String>,
    /// Seconds.
    connect_timeout: Option<u64>,
    /// Seconds.
    socket_timeout: Option<u64>,
    max_warnings: Option<i64>,
    sql_compat: Option<bool>,
    dataverse: Option<String>,
    active_requests_path: Option<String>,
    ssl: Option<bool>,
    transient_policy: Option<TransientPolicy>,
    #[serde(flatten)]
    unknown: BTreeMap<String, toml::Value>,
}

impl TomlProfile {
    /// Profile values win over defaults.
    fn merged_over(self, defaults: TomlProfile) -> TomlProfile {
        let mut unknown = defaults.unknown;
        unknown.extend(self.unknown);
        TomlProfile {
            host: self.host.or(defaults.host),
            port: self.port.or(defaults.port),
            user: self.user.or(defaults.user),
            password: self.password.or(defaults.password),
            password_env: self.password_env.or(defaults.password_env),
            connect_timeout: self.connect_timeout.or(defaults.connect_timeout),
            socket_timeout: self.socket_timeout.or(defaults.socket_timeout),
            max_warnings: self.max_warnings.or(defaults.max_warnings),
            sql_compat: self.sql_compat.or(defaults.sql_compat),
            dataverse: self.dataverse.or(defaults.dataverse),
            active_requests_path: self.active_requests_path.or(defaults.active_requests_path),
            ssl: self.ssl.or(defaults.ssl),
            transient_policy: self.transient_policy.or(defaults.transient_policy),
            unknown,
        }
    }
}

/// Distinguishes a path the caller asked for from one we guessed.
struct ResolvedConfigPath {
    path: PathBuf,
    explicit: bool,
}

/// Explicit path > ASTERIX_LINK_CONFIG > platform config dir.
fn resolve_config_path(explicit: Option<&Path>) -> Option<ResolvedConfigPath> {
    if let Some(path) = explicit {
        return Some(ResolvedConfigPath {
            path: path.to_path_buf(),
            explicit: true,
        });
    }
    if let Ok(path) = std::env::var("ASTERIX_LINK_CONFIG")
        && !path.is_empty()
    {
        return Some(ResolvedConfigPath {
            path: PathBuf::from(path),
            explicit: true,
        });
    }
    ProjectDirs::from("", "", "asterix-link").map(|dirs| ResolvedConfigPath {
        path: dirs.config_dir().join("config.toml"),
        explicit: false,
    })
}

fn load_toml_config(resolved: Option<&ResolvedConfigPath>) -> Result<TomlConfig> {
    let Some(resolved) = resolved else {
        return Ok(TomlConfig::default());
    };

    if !resolved.path.exists() {
        if resolved.explicit {
            return Err(ClientError::Config {
                message: format!("config file not found: {}", resolved.path.display()),
            });
        }
        return Ok(TomlConfig::default());
    }

    let content = std::fs::read_to_string(&resolved.path).map_err(|e| ClientError::Config {
        message: format!("cannot read config file {}: {}", resolved.path.display(), e),
    })?;

    toml::from_str(&content).map_err(|e| ClientError::Config {
        message: format!("invalid config file {}: {}", resolved.path.display(), e),
    })
}

/// Direct value > env indirection > fallback env var.
fn resolve_secret(direct: Option<&str>, env_key: Option<&str>, fallback_env: &str) -> Option<SecretString> {
    if let Some(val) = direct
        && !val.is_empty()
    {
        return Some(SecretString::from(val.to_string()));
    }
    if let Some(key) = env_key
        && let Ok(val) = std::env::var(key)
        && !val.is_empty()
    {
        return Some(SecretString::from(val));
    }
    if let Ok(val) = std::env::var(fallback_env)
        && !val.is_empty()
    {
        return Some(SecretString::from(val));
    }
    None
}

/// Build a [`ClientConfig`] from the `[defaults]` table and, when given, one
/// `[profiles.<name>]` table of the config file.
pub fn load_profile(profile: Option<&str>, config_path: Option<&Path>) -> Result<ClientConfig> {
    let resolved_path = resolve_config_path(config_path);
    let mut toml_config = load_toml_config(resolved_path.as_ref())?;

    let defaults = std::mem::take(&mut toml_config.defaults);
    let merged = match profile {
        Some(name) => toml_config
            .profiles
            .remove(name)
            .ok_or_else(|| ClientError::Config {
                message: format!("profile '{}' not found in config file", name),
            })?
            .merged_over(defaults),
        None => defaults,
    };

    let password = resolve_secret(
        merged.password.as_deref(),
        merged.password_env.as_deref(),
        "ASTERIX_LINK_PASSWORD",
    );

    let max_warnings = merged
        .max_warnings
        .map(|n| n.clamp(0, i64::from(u32::MAX)) as u32)
        .unwrap_or(DEFAULT_MAX_WARNINGS);

    let base = ClientConfig::default();
    Ok(ClientConfig {
        host: merged.host.unwrap_or(base.host),
        port: merged.port.unwrap_or(base.port),
        user: merged.user,
        password,
        connect_timeout: merged.connect_timeout.map(Duration::from_secs),
        socket_timeout: merged.socket_timeout.map(Duration::from_secs),
        max_warnings,
        sql_compat: merged.sql_compat.unwrap_or(base.sql_compat),
        dataverse: merged.dataverse,
        active_requests_path: merged
            .active_requests_path
            .unwrap_or(base.active_requests_path),
        ssl: merged.ssl.unwrap_or(base.ssl),
        transient_policy: merged.transient_policy.unwrap_or_default(),
        unsupported: merged.unknown.into_keys().collect(),
    })
}
