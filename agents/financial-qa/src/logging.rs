//! Log subscriber setup
//!
//! Filter comes from `RUST_LOG`, then `LOG_LEVEL`, then `info`. Setting
//! `LOG_FORMAT=json` switches to JSON lines.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Output format of the log subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

impl LogFormat {
    pub fn from_env() -> Self {
        Self::parse(std::env::var("LOG_FORMAT").ok().as_deref())
    }

    fn parse(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some(v) if v.eq_ignore_ascii_case("json") => LogFormat::Json,
            _ => LogFormat::Pretty,
        }
    }
}

fn filter_directive(rust_log: Option<String>, log_level: Option<String>) -> String {
    rust_log
        .or(log_level)
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| "info".to_string())
}

/// Install the global subscriber. A second call is a no-op.
pub fn init() {
    let directive = filter_directive(
        std::env::var("RUST_LOG").ok(),
        std::env::var("LOG_LEVEL").ok(),
    );
    let filter = EnvFilter::try_new(&directive).unwrap_or_else(|_| EnvFilter::new("info"));

    let (json, pretty) = match LogFormat::from_env() {
        LogFormat::Json => (Some(fmt::layer().json()), None),
        LogFormat::Pretty => (None, Some(fmt::layer())),
    };

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(json)
        .with(pretty)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_precedence() {
        assert_eq!(
            filter_directive(Some("debug".into()), Some("warn".into())),
            "debug"
        );
        assert_eq!(filter_directive(None, Some("warn".into())), "warn");
        assert_eq!(filter_directive(None, None), "info");
    }

    #[test]
    fn test_log_format() {
        assert_eq!(LogFormat::parse(Some("JSON")), LogFormat::Json);
        assert_eq!(LogFormat::parse(Some("text")), LogFormat::Pretty);
        assert_eq!(LogFormat::parse(None), LogFormat::Pretty);
    }

    #[test]
    fn test_init_twice() {
        init();
        init();
    }
}
