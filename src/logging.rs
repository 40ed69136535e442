//! A small stderr logger behind the `log` facade.

use chrono::Local;
use log::{Level, LevelFilter, Log, Metadata, Record, SetLoggerError};
use std::sync::OnceLock;

/// Environment variable that overrides the configured log level.
pub const LOG_LEVEL_ENV: &str = "FOLDERSORT_LOG_LEVEL";

pub struct Logger {
    level: Level,
}

impl Log for Logger {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record<'_>) {
        if self.enabled(record.metadata()) {
            eprintln!(
                "{} {} [{}] {}",
                Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
                record.level(),
                record.target(),
                record.args()
            );
        }
    }

    fn flush(&self) {}
}

/// Parses `error`, `warn`, `info`, `debug` or `trace`. `off` and unknown names yield `None`.
pub fn parse_level(value: &str) -> Option<Level> {
    value
        .trim()
        .parse::<LevelFilter>()
        .ok()
        .and_then(|filter| filter.to_level())
}

/// The environment wins over the configured level; the default is `warn`.
fn resolve_level(env_value: Option<&str>, configured: Option<&str>) -> Level {
    env_value
        .and_then(parse_level)
        .or_else(|| configured.and_then(parse_level))
        .unwrap_or(Level::Warn)
}

/// Installs the logger. Later calls are no-ops.
pub fn init(configured: Option<&str>) -> Result<(), SetLoggerError> {
    let env_value = std::env::var(LOG_LEVEL_ENV).ok();
    init_with_level(resolve_level(env_value.as_deref(), configured))
}

pub fn init_with_level(level: Level) -> Result<(), SetLoggerError> {
    static LOGGER: OnceLock<Logger> = OnceLock::new();

    // Only the first call installs the logger, so max_level must follow that call.
    let init_call = LOGGER.get().is_none();
    let logger = LOGGER.get_or_init(|| Logger { level });

    if init_call {
        log::set_logger(logger)?;
        log::set_max_level(level.to_level_filter());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("debug"), Some(Level::Debug));
        assert_eq!(parse_level(" INFO "), Some(Level::Info));
        assert_eq!(parse_level("off"), None);
        assert_eq!(parse_level("loud"), None);
    }

    #[test]
    fn test_env_overrides_config() {
        assert_eq!(resolve_level(Some("trace"), Some("info")), Level::Trace);
        assert_eq!(resolve_level(Some("bogus"), Some("info")), Level::Info);
        assert_eq!(resolve_level(None, Some("error")), Level::Error);
        assert_eq!(resolve_level(None, None), Level::Warn);
    }

    #[test]
    fn test_logger_enabled_respects_level() {
        let logger = Logger { level: Level::Info };
        let info = Metadata::builder().level(Level::Info).build();
        let debug = Metadata::builder().level(Level::Debug).build();
        assert!(logger.enabled(&info));
        assert!(!logger.enabled(&debug));
    }

    #[test]
    fn test_init_twice_is_ok() {
        assert!(init_with_level(Level::Warn).is_ok());
        assert!(init_with_level(Level::Debug).is_ok());
    }
}
