//! Structured Logging with Sensitive Data Redaction
//!
//! Identity operations handle derived seeds, shared secrets and JWTs; none of
//! them may ever reach a log line. Fields are redacted by key name:
//! - seeds, secrets, JWTs, signatures: fully redacted
//! - Base58Check public keys: first 6 and last 4 characters
//! - transaction hashes and hex payloads: first 10 and last 6 characters

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

static DEBUG_ENABLED: AtomicBool = AtomicBool::new(false);

/// Enable debug logging
pub fn enable_debug() {
    DEBUG_ENABLED.store(true, Ordering::SeqCst);
}

/// Disable debug logging
pub fn disable_debug() {
    DEBUG_ENABLED.store(false, Ordering::SeqCst);
}

pub fn is_debug_enabled() -> bool {
    DEBUG_ENABLED.load(Ordering::SeqCst)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
        };
        f.write_str(label)
    }
}

/// Structured log entry
#[derive(Debug)]
pub struct LogEntry {
    pub level: LogLevel,
    pub module: &'static str,
    pub message: String,
    pub fields: Vec<(&'static str, String)>,
}

impl LogEntry {
    pub fn new(level: LogLevel, module: &'static str, message: impl Into<String>) -> Self {
        Self {
            level,
            module,
            message: message.into(),
            fields: Vec::new(),
        }
    }

    /// Add a field, redacting it according to its key
    pub fn field(mut self, key: &'static str, value: impl fmt::Display) -> Self {
        let redacted = redact_if_sensitive(key, &value.to_string());
        self.fields.push((key, redacted));
        self
    }

    /// Add a field that is always fully redacted
    pub fn redacted_field(mut self, key: &'static str, value: impl fmt::Display) -> Self {
        self.fields.push((key, redact_value(&value.to_string())));
        self
    }

    /// Add a public key field (partial redaction)
    pub fn public_key_field(mut self, key: &'static str, public_key: &str) -> Self {
        self.fields.push((key, redact_public_key(public_key)));
        self
    }

    fn render(&self) -> String {
        let fields_str = self
            .fields
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join(" ");

        let timestamp = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ");

        if fields_str.is_empty() {
            format!("[{}] {} [{}] {}", timestamp, self.level, self.module, self.message)
        } else {
            format!(
                "[{}] {} [{}] {} | {}",
                timestamp, self.level, self.module, self.message, fields_str
            )
        }
    }

    /// Write the entry to stderr
    pub fn log(self) {
        if self.level == LogLevel::Debug && !is_debug_enabled() {
            return;
        }
        eprintln!("{}", self.render());
    }
}

/// Redact a value if the key suggests it's sensitive
fn redact_if_sensitive(key: &str, value: &str) -> String {
    let key_lower = key.to_lowercase();

    const SECRET_KEYS: [&str; 7] = [
        "seed", "secret", "jwt", "signature", "private", "password", "token",
    ];
    if SECRET_KEYS.iter().any(|k| key_lower.contains(k)) {
        return redact_value(value);
    }

    const PUBLIC_KEY_KEYS: [&str; 4] = ["public_key", "owner", "counterparty", "derived"];
    if PUBLIC_KEY_KEYS.iter().any(|k| key_lower.contains(k)) {
        return redact_public_key(value);
    }

    const HEX_KEYS: [&str; 4] = ["hash", "txn", "transaction", "cipher"];
    if HEX_KEYS.iter().any(|k| key_lower.contains(k)) {
        return redact_hex(value);
    }

    value.to_string()
}

/// Fully redact a sensitive value
fn redact_value(value: &str) -> String {
    match value.len() {
        0 => "[EMPTY]".to_string(),
        1..=4 => "[REDACTED]".to_string(),
        len => format!("[REDACTED:{}chars]", len),
    }
}

/// Show the first 6 and last 4 characters of a public key
fn redact_public_key(public_key: &str) -> String {
    let trimmed = public_key.trim();
    if trimmed.is_empty() {
        return "[EMPTY]".to_string();
    }
    if trimmed.len() <= 13 || !trimmed.is_ascii() {
        return redact_value(trimmed);
    }

    format!("{}...{}", &trimmed[..6], &trimmed[trimmed.len() - 4..])
}

/// Show the first 10 and last 6 characters of a hash or hex payload
fn redact_hex(value: &str) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return "[EMPTY]".to_string();
    }
    if trimmed.len() <= 20 || !trimmed.is_ascii() {
        return trimmed.to_string();
    }

    format!("{}...{}", &trimmed[..10], &trimmed[trimmed.len() - 6..])
}

#[macro_export]
macro_rules! log_debug {
    ($module:expr, $msg:expr) => {
        $crate::utils::logging::LogEntry::new(
            $crate::utils::logging::LogLevel::Debug,
            $module,
            $msg
        ).log()
    };
    ($module:expr, $msg:expr, $($key:ident = $value:expr),* $(,)?) => {
        $crate::utils::logging::LogEntry::new(
            $crate::utils::logging::LogLevel::Debug,
            $module,
            $msg
        )
        $(.field(stringify!($key), &$value))*
        .log()
    };
}

#[macro_export]
macro_rules! log_info {
    ($module:expr, $msg:expr) => {
        $crate::utils::logging::LogEntry::new(
            $crate::utils::logging::LogLevel::Info,
            $module,
            $msg
        ).log()
    };
    ($module:expr, $msg:expr, $($key:ident = $value:expr),* $(,)?) => {
        $crate::utils::logging::LogEntry::new(
            $crate::utils::logging::LogLevel::Info,
            $module,
            $msg
        )
        $(.field(stringify!($key), &$value))*
        .log()
    };
}

#[macro_export]
macro_rules! log_warn {
    ($module:expr, $msg:expr) => {
        $crate::utils::logging::LogEntry::new(
            $crate::utils::logging::LogLevel::Warn,
            $module,
            $msg
        ).log()
    };
    ($module:expr, $msg:expr, $($key:ident = $value:expr),* $(,)?) => {
        $crate::utils::logging::LogEntry::new(
            $crate::utils::logging::LogLevel::Warn,
            $module,
            $msg
        )
        $(.field(stringify!($key), &$value))*
        .log()
    };
}

#[macro_export]
macro_rules! log_error {
    ($module:expr, $msg:expr) => {
        $crate::utils::logging::LogEntry::new(
            $crate::utils::logging::LogLevel::Error,
            $module,
            $msg
        ).log()
    };
    ($module:expr, $msg:expr, $($key:ident = $value:expr),* $(,)?) => {
        $crate::utils::logging::LogEntry::new(
            $crate::utils::logging::LogLevel::Error,
            $module,
            $msg
        )
        $(.field(stringify!($key), &$value))*
        .log()
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    const OWNER: &str = "BC1YLhBLE1834FBJbQ9JU23JbPanNYMkUsdpJZrFVqNGsCe7YadYiUg";

    #[test]
    fn test_redact_value() {
        assert_eq!(redact_value(""), "[EMPTY]");
        assert_eq!(redact_value("abc"), "[REDACTED]");
        assert_eq!(redact_value("0123456789abcdef"), "[REDACTED:16chars]");
    }

    #[test]
    fn test_redact_public_key() {
        let redacted = redact_public_key(OWNER);
        assert!(redacted.starts_with("BC1YLh"));
        assert!(redacted.ends_with("YiUg"));
        assert!(redacted.contains("..."));

        assert_eq!(redact_public_key("short"), "[REDACTED:5chars]");
    }

    #[test]
    fn test_redact_hex() {
        let txn = "0123456789abcdef0123456789abcdef0123456789abcdef";
        let redacted = redact_hex(txn);
        assert!(redacted.starts_with("0123456789"));
        assert!(redacted.ends_with("abcdef"));
        assert_eq!(redact_hex("abcd"), "abcd");
    }

    #[test]
    fn test_redact_if_sensitive() {
        assert!(redact_if_sensitive("derived_seed_hex", "deadbeefdeadbeef").contains("REDACTED"));
        assert!(redact_if_sensitive("shared_secret", "ab".repeat(32).as_str()).contains("REDACTED"));
        assert!(redact_if_sensitive("jwt", "eyJhbGciOiJFUzI1NiJ9").contains("REDACTED"));
        assert!(redact_if_sensitive("owner", OWNER).contains("..."));
        assert_eq!(redact_if_sensitive("block_height", "123456"), "123456");
    }

    #[test]
    fn test_log_entry_redacts_fields() {
        let entry = LogEntry::new(LogLevel::Info, "identity", "Signed transaction")
            .field("expiration_block", 1000)
            .field("derived_seed_hex", "0f".repeat(32))
            .public_key_field("counterparty", OWNER);

        let seed = entry.fields.iter().find(|(k, _)| *k == "derived_seed_hex");
        assert!(seed.is_some_and(|(_, v)| v.contains("REDACTED")));

        let counterparty = entry.fields.iter().find(|(k, _)| *k == "counterparty");
        assert!(counterparty.is_some_and(|(_, v)| v.contains("...")));

        let rendered = entry.render();
        assert!(rendered.contains("[identity] Signed transaction | "));
        assert!(rendered.contains("expiration_block=1000"));
        assert!(!rendered.contains(&"0f".repeat(32)));
    }
}
