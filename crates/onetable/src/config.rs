use std::{env, str::FromStr, time::Duration};

use onetable_core::storage::MAX_TRANSACT_ITEMS;

use crate::storage::RetryConfig;

/// Access layer configuration loaded from environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Name of the single table (default: "onetable")
    pub table_name: String,
    /// Attempts per storage call, including the first (default: 4)
    pub max_attempts: u32,
    /// First retry delay in milliseconds (default: 50)
    pub base_delay_ms: u64,
    /// Upper bound for a retry delay in milliseconds (default: 2,000)
    pub max_delay_ms: u64,
    /// Operations per transaction, capped at 25 (default: 25)
    pub transact_max_items: usize,
    /// Page size forced on every query (default: engine decides)
    pub query_page_size: Option<usize>,
    /// Custom DynamoDB endpoint, e.g. a local DynamoDB
    pub aws_endpoint_url: Option<String>,
    /// AWS region for the DynamoDB engine
    pub aws_region: Option<String>,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `ONETABLE_TABLE_NAME` - Table name (default: "onetable")
    /// - `ONETABLE_MAX_ATTEMPTS` - Attempts per storage call (default: 4)
    /// - `ONETABLE_BASE_DELAY_MS` - First retry delay (default: 50)
    /// - `ONETABLE_MAX_DELAY_MS` - Retry delay cap (default: 2,000)
    /// - `ONETABLE_TRANSACT_MAX_ITEMS` - Transaction size bound (default: 25)
    /// - `ONETABLE_QUERY_PAGE_SIZE` - Query page size (default: unset)
    /// - `AWS_ENDPOINT_URL` - DynamoDB endpoint override (default: unset)
    /// - `AWS_REGION` - AWS region (default: unset, SDK chain decides)
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            table_name: lookup("ONETABLE_TABLE_NAME")
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| "onetable".to_string()),
            max_attempts: parse(&lookup, "ONETABLE_MAX_ATTEMPTS").unwrap_or(4).max(1),
            base_delay_ms: parse(&lookup, "ONETABLE_BASE_DELAY_MS").unwrap_or(50),
            max_delay_ms: parse(&lookup, "ONETABLE_MAX_DELAY_MS").unwrap_or(2_000),
            transact_max_items: parse(&lookup, "ONETABLE_TRANSACT_MAX_ITEMS")
                .unwrap_or(MAX_TRANSACT_ITEMS)
                .clamp(1, MAX_TRANSACT_ITEMS),
            query_page_size: parse(&lookup, "ONETABLE_QUERY_PAGE_SIZE").filter(|size: &usize| *size > 0),
            aws_endpoint_url: lookup("AWS_ENDPOINT_URL").filter(|v| !v.is_empty()),
            aws_region: lookup("AWS_REGION").filter(|v| !v.is_empty()),
        }
    }

    /// Retry settings for the storage decorator.
    pub fn retry(&self) -> RetryConfig {
        RetryConfig {
            max_attempts: self.max_attempts,
            base_delay: Duration::from_millis(self.base_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
        }
    }
}

fn parse<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Option<T> {
    lookup(name).and_then(|v| v.trim().parse().ok())
}

impl Default for Config {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config_from(vars: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_default_values() {
        let config = Config::default();

        assert_eq!(config.table_name, "onetable");
        assert_eq!(config.max_attempts, 4);
        assert_eq!(config.base_delay_ms, 50);
        assert_eq!(config.max_delay_ms, 2_000);
        assert_eq!(config.transact_max_items, 25);
        assert_eq!(config.query_page_size, None);
        assert_eq!(config.aws_endpoint_url, None);
    }

    #[test]
    fn test_values_from_environment() {
        let config = config_from(&[
            ("ONETABLE_TABLE_NAME", "social"),
            ("ONETABLE_MAX_ATTEMPTS", "7"),
            ("ONETABLE_QUERY_PAGE_SIZE", "10"),
            ("AWS_ENDPOINT_URL", "http://localhost:8000"),
        ]);

        assert_eq!(config.table_name, "social");
        assert_eq!(config.max_attempts, 7);
        assert_eq!(config.query_page_size, Some(10));
        assert_eq!(config.aws_endpoint_url.as_deref(), Some("http://localhost:8000"));
    }

    #[test]
    fn test_transaction_bound_is_clamped() {
        assert_eq!(config_from(&[("ONETABLE_TRANSACT_MAX_ITEMS", "100")]).transact_max_items, 25);
        assert_eq!(config_from(&[("ONETABLE_TRANSACT_MAX_ITEMS", "0")]).transact_max_items, 1);
    }

    #[test]
    fn test_invalid_numbers_fall_back_to_defaults() {
        let config = config_from(&[
            ("ONETABLE_MAX_ATTEMPTS", "many"),
            ("ONETABLE_QUERY_PAGE_SIZE", "0"),
        ]);
        assert_eq!(config.max_attempts, 4);
        assert_eq!(config.query_page_size, None);
    }

    #[test]
    fn test_retry_conversion() {
        let config = config_from(&[("ONETABLE_BASE_DELAY_MS", "10")]);
        let retry = config.retry();
        assert_eq!(retry.base_delay, Duration::from_millis(10));
        assert_eq!(retry.max_delay, Duration::from_millis(2_000));
    }
}
