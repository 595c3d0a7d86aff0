use asterix_link::config::{DEFAULT_ACTIVE_REQUESTS_PATH, DEFAULT_PORT, load_profile};
use asterix_link::{ClientError, TransientPolicy};
use secrecy::ExposeSecret;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;
use tempfile::TempDir;

// --- Env var test infrastructure ---

/// Static mutex to serialize tests that touch process env vars.
static ENV_MUTEX: Mutex<()> = Mutex::new(());

/// RAII guard that sets env vars on creation and removes them on Drop.
/// Holds the ENV_MUTEX lock for its lifetime.
struct EnvGuard {
    keys: Vec<String>,
    _lock: std::sync::MutexGuard<'static, ()>,
}

impl EnvGuard {
    fn new(vars: &[(&str, &str)]) -> Self {
        let lock = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
        for key in ["ASTERIX_LINK_CONFIG", "ASTERIX_LINK_PASSWORD"] {
            // SAFETY: env var access is serialized by ENV_MUTEX
            unsafe { std::env::remove_var(key); }
        }
        for (key, val) in vars {
            // SAFETY: env var access is serialized by ENV_MUTEX
            unsafe { std::env::set_var(key, val); }
        }
        EnvGuard {
            keys: vars.iter().map(|(k, _)| k.to_string()).collect(),
            _lock: lock,
        }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for key in &self.keys {
            // SAFETY: env var access is serialized by ENV_MUTEX
            unsafe { std::env::remove_var(key); }
        }
    }
}

fn write_temp_toml(content: &str) -> (TempDir, PathBuf) {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, content).unwrap();
    (dir, path)
}

fn load(profile: Option<&str>, path: &Path) -> asterix_link::Result<asterix_link::ClientConfig> {
    load_profile(profile, Some(path))
}

// --- Defaults ---

#[test]
fn test_empty_file_gives_defaults() {
    let _guard = EnvGuard::new(&[]);
    let (_dir, path) = write_temp_toml("");
    let config = load(None, &path).unwrap();
    assert_eq!(config.host, "localhost");
    assert_eq!(config.port, DEFAULT_PORT);
    assert_eq!(config.max_warnings, 10);
    assert!(config.sql_compat);
    assert!(!config.ssl);
    assert!(config.user.is_none());
    assert!(config.password.is_none());
    assert!(config.dataverse.is_none());
    assert_eq!(config.active_requests_path, DEFAULT_ACTIVE_REQUESTS_PATH);
    assert_eq!(config.transient_policy, TransientPolicy::Never);
    assert!(config.unsupported.is_empty());
}

#[test]
fn test_config_file_not_found_errors() {
    let _guard = EnvGuard::new(&[]);
    let bad_path = PathBuf::from("/nonexistent/asterix-link/config.toml");
    let err = load(None, &bad_path).unwrap_err();
    assert!(matches!(err, ClientError::Config { .. }));
    assert!(err.to_string().contains("config file not found"), "Got: {}", err);
}

#[test]
fn test_invalid_toml_errors() {
    let _guard = EnvGuard::new(&[]);
    let (_dir, path) = write_temp_toml("[defaults\nhost = ");
    let err = load(None, &path).unwrap_err();
    assert!(err.to_string().contains("invalid config file"), "Got: {}", err);
}

// --- Profiles ---

#[test]
fn test_profile_overrides_defaults() {
    let _guard = EnvGuard::new(&[]);
    let (_dir, path) = write_temp_toml(
        r#"
[defaults]
host = "db.internal"
port = 19003
dataverse = "Base"
socket_timeout = 60

[profiles.analytics]
host = "analytics.internal"
user = "reporter"
password = "s3cret"
connect_timeout = 5
max_warnings = 25
sql_compat = false
ssl = true
transient_policy = "connect-failures"
"#,
    );
    let config = load(Some("analytics"), &path).unwrap();
    assert_eq!(config.host, "analytics.internal");
    assert_eq!(config.port, 19003);
    assert_eq!(config.dataverse.as_deref(), Some("Base"));
    assert_eq!(config.user.as_deref(), Some("reporter"));
    assert_eq!(config.password.as_ref().unwrap().expose_secret(), "s3cret");
    assert_eq!(config.connect_timeout, Some(Duration::from_secs(5)));
    assert_eq!(config.socket_timeout, Some(Duration::from_secs(60)));
    assert_eq!(config.max_warnings, 25);
    assert!(!config.sql_compat);
    assert!(config.ssl);
    assert_eq!(config.transient_policy, TransientPolicy::ConnectFailures);
}

#[test]
fn test_missing_profile_errors() {
    let _guard = EnvGuard::new(&[]);
    let (_dir, path) = write_temp_toml("[profiles.one]\nhost = \"a\"\n");
    let err = load(Some("two"), &path).unwrap_err();
    assert!(
        err.to_string().contains("profile 'two' not found"),
        "Got: {}",
        err
    );
}

#[test]
fn test_negative_max_warnings_clamped() {
    let _guard = EnvGuard::new(&[]);
    let (_dir, path) = write_temp_toml("[defaults]\nmax_warnings = -4\n");
    assert_eq!(load(None, &path).unwrap().max_warnings, 0);
}

#[test]
fn test_unknown_keys_reported() {
    let _guard = EnvGuard::new(&[]);
    let (_dir, path) = write_temp_toml(
        r#"
[defaults]
fetch_size = 100

[profiles.p]
catalog = "x"
"#,
    );
    let config = load(Some("p"), &path).unwrap();
    assert_eq!(config.unsupported, vec!["catalog".to_string(), "fetch_size".to_string()]);
}

// --- Secrets ---

#[test]
fn test_password_from_named_env_var() {
    let _guard = EnvGuard::new(&[("ANALYTICS_PW", "from-env")]);
    let (_dir, path) = write_temp_toml("[defaults]\nuser = \"u\"\npassword_env = \"ANALYTICS_PW\"\n");
    let config = load(None, &path).unwrap();
    assert_eq!(config.password.unwrap().expose_secret(), "from-env");
}

#[test]
fn test_password_fallback_env_var() {
    let _guard = EnvGuard::new(&[("ASTERIX_LINK_PASSWORD", "fallback")]);
    let (_dir, path) = write_temp_toml("[defaults]\nuser = \"u\"\n");
    let config = load(None, &path).unwrap();
    assert_eq!(config.password.unwrap().expose_secret(), "fallback");
}

#[test]
fn test_direct_password_wins_over_env() {
    let _guard = EnvGuard::new(&[("ASTERIX_LINK_PASSWORD", "fallback")]);
    let (_dir, path) = write_temp_toml("[defaults]\npassword = \"direct\"\n");
    let config = load(None, &path).unwrap();
    assert_eq!(config.password.unwrap().expose_secret(), "direct");
}

#[test]
fn test_empty_password_treated_as_unset() {
    let _guard = EnvGuard::new(&[("ASTERIX_LINK_PASSWORD", "")]);
    let (_dir, path) = write_temp_toml("[defaults]\npassword = \"\"\n");
    assert!(load(None, &path).unwrap().password.is_none());
}

// --- Path resolution ---

#[test]
fn test_config_path_from_env() {
    let (_dir, path) = write_temp_toml("[defaults]\nhost = \"from-env-file\"\n");
    let _guard = EnvGuard::new(&[("ASTERIX_LINK_CONFIG", path.to_str().unwrap())]);
    let config = load_profile(None, None).unwrap();
    assert_eq!(config.host, "from-env-file");
}

#[test]
fn test_missing_env_config_path_errors() {
    let _guard = EnvGuard::new(&[("ASTERIX_LINK_CONFIG", "/nonexistent/asterix-link.toml")]);
    let err = load_profile(None, None).unwrap_err();
    assert!(err.to_string().contains("config file not found"), "Got: {}", err);
}

// --- Builder ---

#[test]
fn test_builder_methods() {
    let config = asterix_link::ClientConfig::new("h", 1)
        .with_connect_timeout(Duration::from_secs(3))
        .with_socket_timeout(Duration::from_secs(4))
        .with_max_warnings(2)
        .with_sql_compat(false)
        .with_active_requests_path("/admin/active")
        .with_ssl(true)
        .with_transient_policy(TransientPolicy::Always);
    assert_eq!(config.connect_timeout, Some(Duration::from_secs(3)));
    assert_eq!(config.socket_timeout, Some(Duration::from_secs(4)));
    assert_eq!(config.max_warnings, 2);
    assert!(!config.sql_compat);
    assert_eq!(config.active_requests_path, "/admin/active");
    assert!(config.to_string().starts_with("https://h:1"));
}
