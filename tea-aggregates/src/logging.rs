//! Logging setup and helpers.
//!
//! The crate emits `tracing` spans and events. Reads open a span per call, and
//! the DataFusion backend logs each rendered query at `debug`. Nothing is
//! printed unless the application installs a subscriber, for example with
//! [`setup::init_logging`].
//!
//! Rendered queries grow with the number of requested statistics, so they are
//! cut to [`query_log_length`] characters before logging.

use std::sync::atomic::{AtomicUsize, Ordering};

/// Default cap on the logged length of a rendered query.
pub const MAX_QUERY_LOG_LENGTH: usize = 512;

static QUERY_LOG_LENGTH: AtomicUsize = AtomicUsize::new(MAX_QUERY_LOG_LENGTH);

/// Current cap on the logged length of a rendered query.
pub fn query_log_length() -> usize {
    QUERY_LOG_LENGTH.load(Ordering::Relaxed)
}

/// Sets the cap used by [`truncate_query`] for the whole process.
pub fn set_query_log_length(max_length: usize) {
    QUERY_LOG_LENGTH.store(max_length, Ordering::Relaxed);
}

/// Truncates a rendered query to the current [`query_log_length`].
pub fn truncate_query(query: &str) -> String {
    truncate_field(query, query_log_length())
}

/// Truncates a string to `max_length` bytes, backing off to a character
/// boundary.
pub fn truncate_field(value: &str, max_length: usize) -> String {
    if value.len() <= max_length {
        return value.to_string();
    }
    let mut end = max_length;
    while !value.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...(truncated)", &value[..end])
}

/// Subscriber installation.
pub mod setup {
    use tracing::info;

    use super::{set_query_log_length, MAX_QUERY_LOG_LENGTH};

    const DEFAULT_FILTER: &str = "warn,tea_aggregates=info";

    /// How [`init_logging`] configures the global subscriber.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct LoggingConfig {
        /// `EnvFilter` directives used when `RUST_LOG` is unset.
        pub filter: String,
        pub json_format: bool,
        /// Cap on the logged length of rendered queries.
        pub max_query_length: usize,
    }

    impl Default for LoggingConfig {
        fn default() -> Self {
            Self {
                filter: DEFAULT_FILTER.to_string(),
                json_format: false,
                max_query_length: MAX_QUERY_LOG_LENGTH,
            }
        }
    }

    impl LoggingConfig {
        /// Logs every rendered query in full at `debug`.
        pub fn with_queries() -> Self {
            Self {
                filter: "warn,tea_aggregates=debug".to_string(),
                max_query_length: usize::MAX,
                ..Self::default()
            }
        }

        pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
            self.filter = filter.into();
            self
        }

        pub fn with_json_format(mut self, enabled: bool) -> Self {
            self.json_format = enabled;
            self
        }

        pub fn with_max_query_length(mut self, max_length: usize) -> Self {
            self.max_query_length = max_length;
            self
        }
    }

    /// Installs a global `tracing` subscriber and applies the query log cap.
    ///
    /// `RUST_LOG` takes precedence over [`LoggingConfig::filter`]. Fails if a
    /// global subscriber is already set; the query cap is applied either way.
    ///
    /// ```rust,no_run
    /// use tea_aggregates::logging::setup::{init_logging, LoggingConfig};
    ///
    /// init_logging(LoggingConfig::with_queries().with_json_format(true)).unwrap();
    /// ```
    pub fn init_logging(config: LoggingConfig) -> Result<(), Box<dyn std::error::Error>> {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

        set_query_log_length(config.max_query_length);

        let env_filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(&config.filter));

        let fmt_layer = if config.json_format {
            tracing_subscriber::fmt::layer().json().boxed()
        } else {
            tracing_subscriber::fmt::layer().boxed()
        };

        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()?;

        info!(
            json = config.json_format,
            max_query_length = config.max_query_length,
            "Logging initialized"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::setup::LoggingConfig;
    use super::*;

    #[test]
    fn test_truncate_field() {
        assert_eq!(truncate_field("hello", 10), "hello");

        let long_text = "this is a very long text that should be truncated";
        assert_eq!(truncate_field(long_text, 10), "this is a ...(truncated)");

        // 'é' is two bytes; cutting inside it backs off to the boundary
        assert_eq!(truncate_field("aé", 2), "a...(truncated)");
    }

    #[test]
    fn test_query_log_length() {
        let query = "x".repeat(MAX_QUERY_LOG_LENGTH + 10);
        assert_eq!(query_log_length(), MAX_QUERY_LOG_LENGTH);
        assert!(truncate_query(&query).ends_with("...(truncated)"));

        set_query_log_length(usize::MAX);
        assert_eq!(truncate_query(&query), query);
        set_query_log_length(MAX_QUERY_LOG_LENGTH);
    }

    #[test]
    fn test_logging_config() {
        let config = LoggingConfig::default();
        assert_eq!(config.filter, "warn,tea_aggregates=info");
        assert_eq!(config.max_query_length, MAX_QUERY_LOG_LENGTH);
        assert!(!config.json_format);

        let verbose = LoggingConfig::with_queries()
            .with_json_format(true)
            .with_max_query_length(64);
        assert_eq!(verbose.filter, "warn,tea_aggregates=debug");
        assert_eq!(verbose.max_query_length, 64);
        assert!(verbose.json_format);

        let custom = LoggingConfig::default().with_filter("tea_aggregates=trace");
        assert_eq!(custom.filter, "tea_aggregates=trace");
    }
}
