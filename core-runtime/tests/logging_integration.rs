//! Integration tests for logging system

use bridge_traits::LogLevel;
use core_runtime::logging::{redact_if_sensitive, LogFormat, LoggingConfig};

#[test]
fn test_logging_config_defaults() {
    let config = LoggingConfig::default();

    assert_eq!(config.level, LogLevel::Info);
    assert!(config.redact_pii);
    assert!(config.logger_sink.is_none());
    assert!(config.filter.is_none());
}

#[test]
fn test_pii_redaction_credentials() {
    assert_eq!(redact_if_sensitive("access_token", "eyJ.a.b"), "[REDACTED]");
    assert_eq!(redact_if_sensitive("refresh_token", "eyJ.c.d"), "[REDACTED]");
    assert_eq!(redact_if_sensitive("password", "Passw0rd!"), "[REDACTED]");
    assert_eq!(redact_if_sensitive("registration_token", "inv-123"), "[REDACTED]");
}

#[test]
fn test_pii_redaction_emails() {
    let redacted = redact_if_sensitive("email", "admin@myduka.co.ke");

    assert!(redacted.starts_with('a'));
    assert!(redacted.contains("[REDACTED]"));
    assert!(!redacted.contains("myduka"));
}

#[test]
fn test_pii_redaction_passes_ordinary_values() {
    assert_eq!(redact_if_sensitive("store_id", "3"), "3");
    assert_eq!(redact_if_sensitive("path", "/admin/clerk"), "/admin/clerk");
    assert_eq!(redact_if_sensitive("role", "merchant"), "merchant");
}

#[test]
fn test_format_selection() {
    #[cfg(debug_assertions)]
    assert_eq!(LoggingConfig::default().format, LogFormat::Pretty);

    #[cfg(not(debug_assertions))]
    assert_eq!(LoggingConfig::default().format, LogFormat::Json);
}

#[test]
fn test_config_chaining() {
    let config = LoggingConfig::default()
        .with_format(LogFormat::Compact)
        .with_level(LogLevel::Warn)
        .with_pii_redaction(false)
        .with_spans(false)
        .with_target(false)
        .with_thread_info(true);

    assert_eq!(config.format, LogFormat::Compact);
    assert_eq!(config.level, LogLevel::Warn);
    assert!(!config.redact_pii);
    assert!(!config.enable_spans);
    assert!(!config.display_target);
    assert!(config.display_thread_info);
}
