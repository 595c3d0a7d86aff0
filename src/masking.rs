//! Redaction of credentials in diagnostics.

use secrecy::{ExposeSecret, SecretString};

const REDACTED: &str = "[REDACTED]";
const NOT_SET: &str = "(not set)";

/// Render a password for diagnostics; hidden unless `reveal` is set.
pub fn format_secret(secret: &SecretString, reveal: bool) -> String {
    if reveal {
        secret.expose_secret().to_string()
    } else {
        REDACTED.to_string()
    }
}

pub fn format_optional_secret(secret: Option<&SecretString>, reveal: bool) -> String {
    secret.map_or_else(|| NOT_SET.to_string(), |s| format_secret(s, reveal))
}

/// `user=<name> password=<masked>` as shown in connection diagnostics.
pub fn format_credentials(user: Option<&str>, password: Option<&SecretString>, reveal: bool) -> String {
    format!(
        "user={} password={}",
        user.unwrap_or(NOT_SET),
        format_optional_secret(password, reveal)
    )
}
