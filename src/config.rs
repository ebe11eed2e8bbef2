//! Configuration types.
//!
//! Both binaries read their settings once from the environment at startup.
//! Unset variables fall back to the defaults below; set but unparsable ones
//! are rejected.

use std::net::{SocketAddr, ToSocketAddrs};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;
use tracing::warn;

use crate::error::ConfigError;

const DEFAULT_JWT_SECRET: &str = "secret";

/// Orchestrator (HTTP + gRPC) configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub http_addr: SocketAddr,
    pub grpc_addr: SocketAddr,
    /// libSQL file; `:memory:` keeps everything in process.
    pub db_path: PathBuf,
    pub jwt_secret: SecretString,
    pub jwt_ttl: chrono::Duration,
    /// How long a claimed task may stay `in_progress` before it is requeued.
    pub task_lease: chrono::Duration,
    pub lease_sweep_interval: Duration,
    pub bcrypt_cost: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            grpc_addr: SocketAddr::from(([0, 0, 0, 0], 50051)),
            db_path: PathBuf::from("./calc.db"),
            jwt_secret: SecretString::from(DEFAULT_JWT_SECRET),
            jwt_ttl: chrono::Duration::hours(24),
            task_lease: chrono::Duration::seconds(60),
            lease_sweep_interval: Duration::from_secs(30),
            bcrypt_cost: bcrypt::DEFAULT_COST,
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let http_addr = match lookup("SERVER_ADDRESS") {
            Some(raw) => listen_addr("SERVER_ADDRESS", &raw)?,
            None => defaults.http_addr,
        };
        let grpc_addr = match lookup("GRPC_ADDRESS") {
            Some(raw) => listen_addr("GRPC_ADDRESS", &raw)?,
            None => defaults.grpc_addr,
        };
        let db_path = lookup("DB_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.db_path);

        let jwt_secret = match lookup("JWT_SECRET").filter(|s| !s.is_empty()) {
            Some(secret) => SecretString::from(secret),
            None => {
                warn!("JWT_SECRET not set, using the built-in development secret");
                defaults.jwt_secret
            }
        };

        let jwt_ttl_hours: i64 = parse_or(&lookup, "JWT_TTL_HOURS", 24)?;
        let lease_secs: i64 = parse_or(&lookup, "TASK_LEASE_SECS", 60)?;
        let sweep_secs: u64 = parse_or(&lookup, "LEASE_SWEEP_SECS", 30)?;
        let bcrypt_cost: u32 = parse_or(&lookup, "BCRYPT_COST", bcrypt::DEFAULT_COST)?;

        let jwt_ttl = bounded_duration(
            "JWT_TTL_HOURS",
            jwt_ttl_hours,
            MAX_JWT_TTL_HOURS,
            chrono::Duration::try_hours,
        )?;
        let task_lease = bounded_duration(
            "TASK_LEASE_SECS",
            lease_secs,
            MAX_INTERVAL_SECS,
            chrono::Duration::try_seconds,
        )?;
        if sweep_secs == 0 || sweep_secs > MAX_INTERVAL_SECS as u64 {
            return Err(invalid(
                "LEASE_SWEEP_SECS",
                format!("must be between 1 and {MAX_INTERVAL_SECS}"),
            ));
        }
        if !(4..=31).contains(&bcrypt_cost) {
            return Err(invalid("BCRYPT_COST", "must be between 4 and 31"));
        }

        Ok(Self {
            http_addr,
            grpc_addr,
            db_path,
            jwt_secret,
            jwt_ttl,
            task_lease,
            lease_sweep_interval: Duration::from_secs(sweep_secs),
            bcrypt_cost,
        })
    }
}

/// Worker agent configuration.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// gRPC endpoint URI of the orchestrator.
    pub orchestrator_addr: String,
    /// Dial timeout for each connection attempt.
    pub connect_timeout: Duration,
    /// Sleep when no task is available.
    pub idle_backoff: Duration,
    /// Sleep after a transport failure.
    pub retry_backoff: Duration,
    /// Sleep after each handled task.
    pub pause: Duration,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            orchestrator_addr: "http://localhost:50051".to_string(),
            connect_timeout: Duration::from_secs(5),
            idle_backoff: Duration::from_millis(1000),
            retry_backoff: Duration::from_millis(5000),
            pause: Duration::from_millis(500),
        }
    }
}

impl AgentConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let orchestrator_addr = lookup("ORCHESTRATOR_ADDRESS")
            .filter(|s| !s.trim().is_empty())
            .map(|s| endpoint_uri(s.trim()))
            .unwrap_or(defaults.orchestrator_addr);

        Ok(Self {
            orchestrator_addr,
            connect_timeout: defaults.connect_timeout,
            idle_backoff: Duration::from_millis(parse_or(&lookup, "AGENT_IDLE_MS", 1000)?),
            retry_backoff: Duration::from_millis(parse_or(&lookup, "AGENT_RETRY_MS", 5000)?),
            pause: Duration::from_millis(parse_or(&lookup, "AGENT_PAUSE_MS", 500)?),
        })
    }
}

/// Upper bound for token lifetimes: one year.
const MAX_JWT_TTL_HOURS: i64 = 24 * 365;

/// Upper bound for task leases and the sweep period: one week.
const MAX_INTERVAL_SECS: i64 = 7 * 24 * 60 * 60;

fn bounded_duration(
    key: &str,
    value: i64,
    max: i64,
    build: fn(i64) -> Option<chrono::Duration>,
) -> Result<chrono::Duration, ConfigError> {
    if !(1..=max).contains(&value) {
        return Err(invalid(key, format!("must be between 1 and {max}")));
    }
    build(value).ok_or_else(|| invalid(key, "out of range"))
}

fn invalid(key: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        message: message.into(),
    }
}

fn parse_or<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| invalid(key, e.to_string())),
        None => Ok(default),
    }
}

/// Resolve a listen address. `:8080` is shorthand for all interfaces.
fn listen_addr(key: &str, raw: &str) -> Result<SocketAddr, ConfigError> {
    let raw = raw.trim();
    let full = if raw.starts_with(':') {
        format!("0.0.0.0{raw}")
    } else {
        raw.to_string()
    };
    full.to_socket_addrs()
        .map_err(|e| invalid(key, format!("{raw}: {e}")))?
        .next()
        .ok_or_else(|| invalid(key, format!("{raw} resolved to no address")))
}

/// Turn `host:port` into a URI tonic can dial.
fn endpoint_uri(addr: &str) -> String {
    if addr.contains("://") {
        addr.to_string()
    } else {
        format!("http://{addr}")
    }
}
