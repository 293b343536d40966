use std::env;
use std::net::{IpAddr, Ipv4Addr};
use std::str::FromStr;

use crate::constants::{DEFAULT_INTERLEAVE_SAMPLE_SIZE, DEFAULT_TOP_CONFUSIONS};

#[derive(Debug, Clone)]
pub struct Config {
    pub host: IpAddr,
    pub port: u16,
    pub log_level: String,
    pub enable_file_logs: bool,
    pub log_dir: String,
    pub sled_path: String,
    pub cors_origin: String,
    pub worker: WorkerConfig,
    pub study: StudyConfig,
}

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub is_leader: bool,
}

#[derive(Debug, Clone)]
pub struct StudyConfig {
    /// 空闲超过该时长的会话由 session_cleanup 回收
    pub session_idle_minutes: i64,
    pub interleave_sample_size: usize,
    pub top_confusions_limit: usize,
}

impl Default for StudyConfig {
    fn default() -> Self {
        Self {
            session_idle_minutes: 120,
            interleave_sample_size: DEFAULT_INTERLEAVE_SAMPLE_SIZE,
            top_confusions_limit: DEFAULT_TOP_CONFUSIONS,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let study_defaults = StudyConfig::default();
        Self {
            host: env_or_parse("HOST", IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1))),
            port: env_or_parse("PORT", 3000_u16),
            log_level: env_or("RUST_LOG", "info"),
            enable_file_logs: env_or_bool("ENABLE_FILE_LOGS", false),
            log_dir: env_or("LOG_DIR", "./logs"),
            sled_path: env_or("SLED_PATH", "./data/memory.sled"),
            cors_origin: env_or("CORS_ORIGIN", "http://localhost:5173"),
            worker: WorkerConfig {
                is_leader: env_or_bool("WORKER_LEADER", true),
            },
            study: StudyConfig {
                session_idle_minutes: env_or_parse(
                    "SESSION_IDLE_MINUTES",
                    study_defaults.session_idle_minutes,
                ),
                interleave_sample_size: env_or_parse(
                    "INTERLEAVE_SAMPLE_SIZE",
                    study_defaults.interleave_sample_size,
                ),
                top_confusions_limit: env_or_parse(
                    "TOP_CONFUSIONS_LIMIT",
                    study_defaults.top_confusions_limit,
                ),
            },
        }
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|raw| !raw.trim().is_empty())
}

pub fn env_or(key: &str, default: &str) -> String {
    non_empty_var(key).unwrap_or_else(|| default.to_string())
}

/// 解析失败时回退默认值并记一条 warn
pub fn env_or_parse<T>(key: &str, default: T) -> T
where
    T: FromStr + Copy,
{
    let Some(raw) = non_empty_var(key) else {
        return default;
    };
    raw.trim().parse::<T>().unwrap_or_else(|_| {
        tracing::warn!(key, value = %raw, "Unparseable env var, falling back to default");
        default
    })
}

pub fn env_or_bool(key: &str, default: bool) -> bool {
    let Some(raw) = non_empty_var(key) else {
        return default;
    };
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => true,
        "0" | "false" | "no" | "off" => false,
        other => {
            tracing::warn!(key, value = other, "Unrecognised boolean env var, falling back to default");
            default
        }
    }
}
