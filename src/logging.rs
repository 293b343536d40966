use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

use crate::config::Config;

/// sled 的 debug 日志非常吵，除非显式指定否则压到 warn
const QUIET_DEPENDENCIES: &str = "sled=warn,tokio_cron_scheduler=warn";

#[derive(Debug, Clone)]
pub struct LogConfig {
    pub log_level: String,
    pub enable_file_logs: bool,
    pub log_dir: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            enable_file_logs: false,
            log_dir: "./logs".to_string(),
        }
    }
}

impl From<&Config> for LogConfig {
    fn from(config: &Config) -> Self {
        Self {
            log_level: config.log_level.clone(),
            enable_file_logs: config.enable_file_logs,
            log_dir: config.log_dir.clone(),
        }
    }
}

fn build_filter(log_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if log_level.contains('=') {
            EnvFilter::new(log_level)
        } else {
            EnvFilter::new(format!("{log_level},{QUIET_DEPENDENCIES}"))
        }
    })
}

/// Installs the global subscriber. The returned guard must be held for the
/// process lifetime when file logging is on, or buffered lines are lost.
pub fn init_tracing(config: &LogConfig) -> Option<WorkerGuard> {
    let stdout_layer = fmt::layer().with_target(true).with_thread_ids(false);
    let registry = Registry::default()
        .with(build_filter(&config.log_level))
        .with(stdout_layer);

    if config.enable_file_logs {
        let file_appender = match RollingFileAppender::builder()
            .rotation(Rotation::DAILY)
            .filename_prefix("memory-backend")
            .filename_suffix("log")
            .max_log_files(30)
            .build(&config.log_dir)
        {
            Ok(appender) => appender,
            Err(e) => panic!("Failed to create rolling file appender in {}: {e}", config.log_dir),
        };
        let (writer, guard) = tracing_appender::non_blocking(file_appender);
        let file_layer = fmt::layer().with_writer(writer).with_ansi(false).json();
        // 测试环境中全局 subscriber 可能已被设置，忽略该错误
        if let Err(e) = registry.with(file_layer).try_init() {
            if !e.to_string().contains("already") {
                panic!("Failed to initialize tracing with file logs: {e}");
            }
        }
        Some(guard)
    } else {
        if let Err(e) = registry.try_init() {
            if !e.to_string().contains("already") {
                panic!("Failed to initialize tracing: {e}");
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_is_idempotent() {
        let cfg = LogConfig::default();
        assert!(init_tracing(&cfg).is_none());
        assert!(init_tracing(&cfg).is_none());
    }

    #[test]
    fn file_logging_returns_guard() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = LogConfig {
            log_level: "debug".to_string(),
            enable_file_logs: true,
            log_dir: dir.path().to_string_lossy().into_owned(),
        };
        assert!(init_tracing(&cfg).is_some());
    }
}
