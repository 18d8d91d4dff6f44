use clap::{Parser, Subcommand, ValueEnum};
use shortlink_allocator::DEFAULT_RESOLVE_PATH;
use shortlink_telemetry::LogFormat;
use std::fmt::{Display, Formatter};

pub const STORAGE_BACKEND_ENV: &str = "SHORTLINK_STORAGE_BACKEND";
pub const REDIS_URL_ENV: &str = "SHORTLINK_REDIS_URL";
pub const REDIS_TIMEOUT_MILLIS_ENV: &str = "SHORTLINK_REDIS_TIMEOUT_MILLIS";
pub const KEY_NAMESPACE_ENV: &str = "SHORTLINK_KEY_NAMESPACE";
pub const CODE_SECRET_ENV: &str = "SHORTLINK_CODE_SECRET";
pub const BASE_URL_ENV: &str = "SHORTLINK_BASE_URL";
pub const RESOLVE_PATH_ENV: &str = "SHORTLINK_RESOLVE_PATH";
pub const CODE_LENGTH_ENV: &str = "SHORTLINK_CODE_LENGTH";
pub const MAX_RETRIES_ENV: &str = "SHORTLINK_MAX_RETRIES";
pub const TTL_MILLIS_ENV: &str = "SHORTLINK_TTL_MILLIS";
pub const RATE_LIMIT_ENV: &str = "SHORTLINK_RATE_LIMIT";
pub const RATE_WINDOW_SECONDS_ENV: &str = "SHORTLINK_RATE_WINDOW_SECONDS";
pub const LOG_FORMAT_ENV: &str = "SHORTLINK_LOG_FORMAT";

pub const DEFAULT_BASE_URL: &str = "http://localhost:3000";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StorageBackendArg {
    #[value(name = "in-memory")]
    InMemory,
    #[value(name = "redis")]
    Redis,
}

impl Display for StorageBackendArg {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageBackendArg::InMemory => write!(f, "in-memory"),
            StorageBackendArg::Redis => write!(f, "redis"),
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "shortlink", about = "Allocate short codes for long URLs")]
pub struct CLI {
    #[arg(
        long,
        env = STORAGE_BACKEND_ENV,
        value_enum,
        default_value_t = StorageBackendArg::InMemory
    )]
    pub storage: StorageBackendArg,

    #[arg(long, env = REDIS_URL_ENV, required_if_eq("storage", "redis"))]
    pub redis_url: Option<String>,

    #[arg(long, env = REDIS_TIMEOUT_MILLIS_ENV, default_value_t = 2000)]
    pub redis_timeout_millis: u64,

    /// Prepended to every key, for sharing one Redis between deployments.
    #[arg(long, env = KEY_NAMESPACE_ENV)]
    pub key_namespace: Option<String>,

    #[arg(long, env = CODE_SECRET_ENV, hide_env_values = true)]
    pub code_secret: String,

    #[arg(long, env = BASE_URL_ENV, default_value = DEFAULT_BASE_URL)]
    pub base_url: String,

    /// Path between the base URL and the code; empty for none.
    #[arg(long, env = RESOLVE_PATH_ENV, default_value = DEFAULT_RESOLVE_PATH)]
    pub resolve_path: String,

    #[arg(long, env = CODE_LENGTH_ENV, default_value_t = 7)]
    pub code_length: usize,

    #[arg(long, env = MAX_RETRIES_ENV, default_value_t = 7)]
    pub max_retries: u32,

    /// Mapping lifetime in milliseconds; 0 keeps mappings forever.
    #[arg(long, env = TTL_MILLIS_ENV, default_value_t = 0)]
    pub ttl_millis: u64,

    #[arg(long, env = RATE_LIMIT_ENV, default_value_t = 10)]
    pub rate_limit: u64,

    #[arg(long, env = RATE_WINDOW_SECONDS_ENV, default_value_t = 60)]
    pub rate_window_seconds: u64,

    #[arg(
        long,
        env = LOG_FORMAT_ENV,
        value_enum,
        default_value_t = LogFormat::Text
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Allocates a short code for each URL, printing `<code> <short url>`.
    Allocate {
        /// URL to shorten; repeat to allocate several in one run.
        #[arg(long = "url", required = true)]
        urls: Vec<String>,

        /// Origin address the requests are counted against.
        #[arg(long, default_value = "127.0.0.1")]
        origin: String,
    },
}
