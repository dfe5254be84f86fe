//! Application Configuration
//!
//! Rate-limit policy thresholds plus the environment-driven settings for
//! store selection, proxy trust and identifier hashing.

use std::str::FromStr;
use std::time::Duration;

use axum::http::HeaderName;
use platform::client::{DEFAULT_SECRET_HEADER, ProxyMode, TrustConfig};
use platform::crypto::IdentifierHasher;
use platform::net::parse_cidr_list;
use zeroize::Zeroizing;

use crate::error::{GuardError, GuardResult};

/// Rate-limit thresholds
#[derive(Debug, Clone)]
pub struct RateLimitPolicy {
    /// Attempts per IP per minute window
    pub ip_minute_limit: u32,
    pub ip_minute_window: Duration,
    /// Retry hint when the minute window is exhausted
    pub ip_minute_retry_after: Duration,
    /// Attempts per IP per hour window
    pub ip_hour_limit: u32,
    pub ip_hour_window: Duration,
    pub ip_hour_retry_after: Duration,
    /// Attempts per identifier before backoff kicks in
    pub identifier_soft_limit: u32,
    pub identifier_window: Duration,
    /// Consecutive failures before a hard lock
    pub lockout_threshold: u32,
    /// Window in which failures are counted
    pub failure_window: Duration,
    pub lockout_duration: Duration,
    /// Backoff base (5s, 10s, 20s, ...)
    pub backoff_base: Duration,
    pub backoff_max: Duration,
}

impl Default for RateLimitPolicy {
    fn default() -> Self {
        Self {
            ip_minute_limit: 10,
            ip_minute_window: Duration::from_secs(60),
            ip_minute_retry_after: Duration::from_secs(60),
            ip_hour_limit: 50,
            ip_hour_window: Duration::from_secs(3600),
            ip_hour_retry_after: Duration::from_secs(600),
            identifier_soft_limit: 5,
            identifier_window: Duration::from_secs(60),
            lockout_threshold: 10,
            failure_window: Duration::from_secs(15 * 60),
            lockout_duration: Duration::from_secs(15 * 60),
            backoff_base: Duration::from_secs(5),
            backoff_max: Duration::from_secs(15 * 60),
        }
    }
}

impl RateLimitPolicy {
    /// Reject policies the stores cannot represent
    pub fn validate(&self) -> GuardResult<()> {
        let limits = [
            ("ip_minute_limit", self.ip_minute_limit),
            ("ip_hour_limit", self.ip_hour_limit),
            ("identifier_soft_limit", self.identifier_soft_limit),
            ("lockout_threshold", self.lockout_threshold),
        ];
        for (name, value) in limits {
            if value == 0 {
                return Err(GuardError::Configuration(format!("{name} must be positive")));
            }
        }

        let windows = [
            ("ip_minute_window", self.ip_minute_window),
            ("ip_hour_window", self.ip_hour_window),
            ("identifier_window", self.identifier_window),
            ("failure_window", self.failure_window),
        ];
        for (name, window) in windows {
            if window.as_secs() == 0 {
                return Err(GuardError::Configuration(format!(
                    "{name} must be at least one second"
                )));
            }
        }

        // Both identifier counters share the identifier scope; the window
        // length is what tells them apart.
        if self.identifier_window_secs() == self.failure_window_secs() {
            return Err(GuardError::Configuration(
                "identifier_window and failure_window must differ".to_string(),
            ));
        }
        if self.ip_minute_window_secs() == self.ip_hour_window_secs() {
            return Err(GuardError::Configuration(
                "ip_minute_window and ip_hour_window must differ".to_string(),
            ));
        }
        Ok(())
    }

    pub fn ip_minute_window_secs(&self) -> u32 {
        window_secs(self.ip_minute_window)
    }

    pub fn ip_hour_window_secs(&self) -> u32 {
        window_secs(self.ip_hour_window)
    }

    pub fn identifier_window_secs(&self) -> u32 {
        window_secs(self.identifier_window)
    }

    pub fn failure_window_secs(&self) -> u32 {
        window_secs(self.failure_window)
    }

    /// Get lockout duration in milliseconds
    pub fn lockout_duration_ms(&self) -> i64 {
        i64::try_from(self.lockout_duration.as_millis()).unwrap_or(i64::MAX)
    }

    /// Backoff for an identifier whose window count reached `count`
    ///
    /// `min(2^(count - soft_limit) * base, max)`, so the first denial waits
    /// `base` seconds.
    pub fn backoff_secs(&self, count: u32) -> u64 {
        let base = self.backoff_base.as_secs().max(1);
        let max = self.backoff_max.as_secs().max(base);
        let exponent = count.saturating_sub(self.identifier_soft_limit);
        let factor = 1u64.checked_shl(exponent).unwrap_or(u64::MAX);
        base.saturating_mul(factor).min(max)
    }
}

fn window_secs(window: Duration) -> u32 {
    u32::try_from(window.as_secs()).unwrap_or(u32::MAX)
}

/// Attempt store implementation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    /// In-process maps; single instance only
    Memory,
    /// Shared PostgreSQL table
    Postgres,
}

impl FromStr for StoreBackend {
    type Err = GuardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(StoreBackend::Memory),
            "postgres" | "postgresql" => Ok(StoreBackend::Postgres),
            other => Err(GuardError::Configuration(format!(
                "unknown RATE_LIMIT_BACKEND: {other} (expected memory or postgres)"
            ))),
        }
    }
}

/// Deployment environment
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Environment {
    Production,
    #[default]
    Development,
}

impl Environment {
    fn parse(value: Option<&str>) -> Self {
        match value.map(|v| v.trim().to_ascii_lowercase()) {
            Some(v) if v == "production" || v == "prod" => Environment::Production,
            _ => Environment::Development,
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Environment::Production)
    }
}

/// Store selection settings
#[derive(Debug, Clone)]
pub struct StoreSettings {
    pub backend: StoreBackend,
    pub environment: Environment,
    /// Explicit override permitting the memory store in production
    pub allow_memory_in_production: bool,
    /// Upper bound for a single store operation
    pub operation_timeout: Option<Duration>,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Memory,
            environment: Environment::Development,
            allow_memory_in_production: false,
            operation_timeout: None,
        }
    }
}

/// Everything the guard reads from the environment
#[derive(Clone, Default)]
pub struct GuardSettings {
    pub store: StoreSettings,
    pub trust: TrustConfig,
    pub policy: RateLimitPolicy,
    /// Secret for HMAC-hashing identifiers (plain SHA-256 when absent)
    pub identifier_key: Option<Zeroizing<String>>,
}

impl std::fmt::Debug for GuardSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GuardSettings")
            .field("store", &self.store)
            .field("trust", &self.trust)
            .field("policy", &self.policy)
            .field("identifier_key", &self.identifier_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl GuardSettings {
    /// Load settings from process environment variables
    pub fn from_env() -> GuardResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load settings from an arbitrary key lookup
    ///
    /// Unparseable values are startup errors, except for individual CIDR
    /// entries, which are dropped with a warning.
    pub fn from_lookup<F>(lookup: F) -> GuardResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let backend = get("RATE_LIMIT_BACKEND")
            .map(|v| v.parse::<StoreBackend>())
            .transpose()?
            .unwrap_or(StoreBackend::Memory);

        let store = StoreSettings {
            backend,
            environment: Environment::parse(get("APP_ENV").as_deref()),
            allow_memory_in_production: parse_bool(
                "ALLOW_MEMORY_RATE_LIMIT",
                get("ALLOW_MEMORY_RATE_LIMIT"),
            )?,
            operation_timeout: get("RATE_LIMIT_STORE_TIMEOUT_MS")
                .map(|v| parse_number::<u64>("RATE_LIMIT_STORE_TIMEOUT_MS", &v))
                .transpose()?
                .filter(|ms| *ms > 0)
                .map(Duration::from_millis),
        };

        let mode = get("TRUSTED_PROXY_MODE")
            .map(|v| v.parse::<ProxyMode>())
            .transpose()
            .map_err(|e| GuardError::Configuration(e.to_string()))?
            .unwrap_or_default();

        let secret_header = get("TRUSTED_PROXY_SECRET_HEADER")
            .unwrap_or_else(|| DEFAULT_SECRET_HEADER.to_string());
        let secret_header_name =
            HeaderName::from_bytes(secret_header.trim().to_ascii_lowercase().as_bytes()).map_err(
                |_| {
                    GuardError::Configuration(format!(
                        "invalid TRUSTED_PROXY_SECRET_HEADER: {secret_header}"
                    ))
                },
            )?;

        let trust = TrustConfig {
            mode,
            trusted_hops: get("TRUSTED_HOPS")
                .map(|v| parse_number::<usize>("TRUSTED_HOPS", &v))
                .transpose()?
                .unwrap_or(0),
            allow_private_ips: parse_bool("ALLOW_PRIVATE_IPS", get("ALLOW_PRIVATE_IPS"))?,
            trusted_cidrs: get("TRUSTED_PROXY_CIDRS")
                .map(|v| parse_cidr_list(&v))
                .unwrap_or_default(),
            shared_secret: get("TRUSTED_PROXY_SECRET").map(Zeroizing::new),
            secret_header_name,
        };

        if trust.mode != ProxyMode::None && !trust.has_provenance_source() {
            tracing::warn!(
                mode = ?trust.mode,
                "Proxy mode enabled without TRUSTED_PROXY_CIDRS or TRUSTED_PROXY_SECRET; proxy headers will be ignored"
            );
        }

        let policy = RateLimitPolicy::default();
        policy.validate()?;

        Ok(Self {
            store,
            trust,
            policy,
            identifier_key: get("RATE_LIMIT_IDENTIFIER_KEY").map(Zeroizing::new),
        })
    }

    /// Identifier hasher for the configured key
    pub fn identifier_hasher(&self) -> IdentifierHasher {
        match &self.identifier_key {
            Some(key) => IdentifierHasher::keyed(key.as_bytes()),
            None => IdentifierHasher::unkeyed(),
        }
    }
}

fn parse_bool(key: &str, value: Option<String>) -> GuardResult<bool> {
    let Some(value) = value else {
        return Ok(false);
    };
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        other => Err(GuardError::Configuration(format!(
            "invalid boolean for {key}: {other}"
        ))),
    }
}

fn parse_number<T: FromStr>(key: &str, value: &str) -> GuardResult<T> {
    value
        .trim()
        .parse::<T>()
        .map_err(|_| GuardError::Configuration(format!("invalid number for {key}: {value}")))
}
