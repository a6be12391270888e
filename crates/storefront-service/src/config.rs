//! Service configuration.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use storefront_core::ShippingFeeTable;

use crate::retry::RetryPolicy;

/// Default locations of the shipping fee file, tried in order.
const SHIPPING_FILE_PATHS: [&str; 2] = [".storefront/shipping.json", "../.storefront/shipping.json"];

/// When cart mutations become visible locally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WritePolicy {
    /// Update local state at once and persist in the background. Failed
    /// writes are logged; local state is not rolled back.
    #[default]
    Optimistic,
    /// Persist first and update local state only once the write succeeded.
    Confirm,
}

impl FromStr for WritePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "optimistic" => Ok(Self::Optimistic),
            "confirm" => Ok(Self::Confirm),
            other => Err(format!("unknown write policy: {other}")),
        }
    }
}

/// Storefront configuration loaded from environment variables.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StorefrontConfig {
    /// Shipping fee per delivery option (default: 30000 / 60000).
    pub shipping_fees: ShippingFeeTable,

    /// Cart write policy (default: optimistic).
    pub write_policy: WritePolicy,

    /// Retry policy for store writes (default: 3 attempts, 100 ms doubling
    /// to 2 s).
    pub retry: RetryPolicy,

    /// `RocksDB` data directory. In-memory storage when unset.
    pub data_dir: Option<PathBuf>,
}

impl StorefrontConfig {
    /// Load configuration from environment variables and the shipping fee
    /// file.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through `lookup`, which maps a variable name to
    /// its value. Missing or unparsable values fall back to the defaults.
    #[must_use]
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let mut shipping_fees = load_shipping_file(lookup("STOREFRONT_SHIPPING_FILE").as_deref())
            .unwrap_or(defaults.shipping_fees);
        if let Some(fee) = parse_var(&lookup, "STOREFRONT_SHIPPING_STANDARD") {
            shipping_fees.standard = fee;
        }
        if let Some(fee) = parse_var(&lookup, "STOREFRONT_SHIPPING_EXPRESS") {
            shipping_fees.express = fee;
        }

        let write_policy = match lookup("STOREFRONT_WRITE_POLICY") {
            Some(raw) => raw.parse().unwrap_or_else(|e| {
                tracing::warn!(error = %e, "ignoring STOREFRONT_WRITE_POLICY");
                defaults.write_policy
            }),
            None => defaults.write_policy,
        };

        let retry = RetryPolicy {
            max_attempts: parse_var(&lookup, "STOREFRONT_RETRY_MAX_ATTEMPTS")
                .unwrap_or(defaults.retry.max_attempts),
            initial_backoff: parse_var(&lookup, "STOREFRONT_RETRY_BACKOFF_MS")
                .map_or(defaults.retry.initial_backoff, Duration::from_millis),
            max_backoff: defaults.retry.max_backoff,
        };

        let data_dir = lookup("STOREFRONT_DATA_DIR")
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from);

        Self {
            shipping_fees,
            write_policy,
            retry,
            data_dir,
        }
    }
}

/// Parse the variable `key`, ignoring surrounding whitespace.
fn parse_var<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    lookup(key).and_then(|s| s.trim().parse().ok())
}

/// Load the fee table from `explicit`, or from the first default location
/// that holds a readable file.
fn load_shipping_file(explicit: Option<&str>) -> Option<ShippingFeeTable> {
    let candidates: Vec<&str> = match explicit {
        Some(path) => vec![path],
        None => SHIPPING_FILE_PATHS.to_vec(),
    };

    for path in candidates {
        match load_json_file::<ShippingFeeTable>(Path::new(path)) {
            Ok(fees) => {
                tracing::info!(path = %path, "Loaded shipping fees from file");
                return Some(fees);
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(path = %path, error = %e, "Ignoring unreadable shipping fee file");
            }
        }
    }

    tracing::debug!("Shipping fee file not found, using environment variables");
    None
}

/// Load a JSON file.
fn load_json_file<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, std::io::Error> {
    let contents = std::fs::read_to_string(path)?;
    serde_json::from_str(&contents)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
}
