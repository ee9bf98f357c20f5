//! # Structured Logging
//!
//! Subscriber setup for binaries that drive migrations and seeders. The
//! engine itself only emits `tracing` events; nothing is printed unless a
//! subscriber is installed.

use std::io;

use serde_json::{json, Value};
use tracing_subscriber::{fmt::Layer, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::error::{DatabaseError, DatabaseResult};

/// Logging configuration for migration and seeding runs
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "warn")
    pub level: String,
    /// Enable JSON structured logging (vs plain text)
    pub json_format: bool,
    /// Enable pretty printing for development
    pub pretty_print: bool,
    /// Include file and line number information
    pub include_location: bool,
    /// Custom fields reported when logging starts
    pub global_fields: serde_json::Map<String, Value>,
    /// Environment filter (e.g. "elif_database=debug,sqlx=warn")
    pub env_filter: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
            pretty_print: false,
            include_location: false,
            global_fields: serde_json::Map::new(),
            env_filter: None,
        }
    }
}

impl LoggingConfig {
    /// JSON output at info level
    pub fn production() -> Self {
        Self {
            level: "info".to_string(),
            json_format: true,
            pretty_print: false,
            include_location: false,
            global_fields: env_field("production"),
            env_filter: Some("elif_database=info,sqlx=warn".to_string()),
        }
    }

    /// Pretty output with statement-level debug events
    pub fn development() -> Self {
        Self {
            level: "debug".to_string(),
            json_format: false,
            pretty_print: true,
            include_location: true,
            global_fields: env_field("development"),
            env_filter: Some("elif_database=debug,sqlx=info".to_string()),
        }
    }

    /// Errors only
    pub fn test() -> Self {
        Self {
            level: "error".to_string(),
            json_format: false,
            pretty_print: false,
            include_location: false,
            global_fields: env_field("test"),
            env_filter: Some("elif_database=error".to_string()),
        }
    }

    pub fn with_global_field<K, V>(mut self, key: K, value: V) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
    {
        self.global_fields.insert(key.into(), value.into());
        self
    }

    pub fn with_env_filter<S: Into<String>>(mut self, filter: S) -> Self {
        self.env_filter = Some(filter.into());
        self
    }

    fn filter(&self) -> DatabaseResult<EnvFilter> {
        let directives = self.env_filter.as_deref().unwrap_or(&self.level);
        EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(directives))
            .map_err(|e| {
                DatabaseError::Configuration(format!("Invalid log filter '{}': {}", directives, e))
            })
    }
}

fn env_field(env: &str) -> serde_json::Map<String, Value> {
    let mut fields = serde_json::Map::new();
    fields.insert("env".to_string(), json!(env));
    fields
}

/// Install a global subscriber
///
/// `RUST_LOG` takes precedence over the configured filter. Fails if a global
/// subscriber is already set.
pub fn init_logging(config: LoggingConfig) -> DatabaseResult<()> {
    let filter = config.filter()?;
    let registry = tracing_subscriber::registry().with(filter);

    let installed = if config.json_format {
        registry
            .with(
                Layer::new()
                    .with_writer(io::stdout)
                    .with_file(config.include_location)
                    .with_line_number(config.include_location)
                    .json(),
            )
            .try_init()
    } else if config.pretty_print {
        registry
            .with(
                Layer::new()
                    .with_writer(io::stdout)
                    .with_file(config.include_location)
                    .with_line_number(config.include_location)
                    .pretty(),
            )
            .try_init()
    } else {
        registry
            .with(
                Layer::new()
                    .with_writer(io::stdout)
                    .with_file(config.include_location)
                    .with_line_number(config.include_location),
            )
            .try_init()
    };
    installed.map_err(|e| DatabaseError::Configuration(format!("Logging already initialized: {}", e)))?;

    let mut init_msg = json!({
        "message": "Structured logging initialized",
        "level": config.level,
        "json_format": config.json_format,
    });
    for (key, value) in config.global_fields {
        init_msg[key] = value;
    }
    tracing::info!(target: "elif_database::logging", "{}", init_msg);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets() {
        let prod = LoggingConfig::production();
        assert!(prod.json_format);
        assert_eq!(prod.global_fields["env"], json!("production"));

        let dev = LoggingConfig::development();
        assert!(dev.pretty_print);
        assert!(dev.include_location);

        assert_eq!(LoggingConfig::test().level, "error");
    }

    #[test]
    fn test_builders() {
        let config = LoggingConfig::default()
            .with_global_field("service", "billing")
            .with_env_filter("elif_database=trace");

        assert_eq!(config.global_fields["service"], json!("billing"));
        assert_eq!(config.env_filter.as_deref(), Some("elif_database=trace"));
    }
}
