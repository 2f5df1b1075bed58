//! HTTP client configuration.

use crate::retry::RetryPolicy;
use std::env;
use std::str::FromStr;
use std::time::Duration;
use tether_core::{Error, Result};

/// HTTP client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL for all requests.
    pub base_url: Option<String>,
    /// Default request timeout.
    pub timeout: Duration,
    /// Connection timeout.
    pub connect_timeout: Duration,
    /// Retry policy applied to every request.
    pub retry: Option<RetryPolicy>,
    /// How long idle connections are kept.
    pub pool_idle_timeout: Duration,
    /// Maximum idle connections per host.
    pub pool_max_idle_per_host: usize,
    /// Default headers for all requests.
    pub default_headers: Vec<(String, String)>,
    /// User agent string.
    pub user_agent: String,
    /// Enable gzip compression.
    pub gzip: bool,
    /// Enable brotli compression.
    pub brotli: bool,
    /// Follow redirects.
    pub follow_redirects: bool,
    /// Maximum redirects to follow.
    pub max_redirects: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout: Duration::from_secs(60),
            connect_timeout: Duration::from_secs(30),
            retry: None,
            pool_idle_timeout: Duration::from_secs(90),
            pool_max_idle_per_host: 32,
            default_headers: Vec::new(),
            user_agent: crate::USER_AGENT.to_string(),
            gzip: true,
            brotli: true,
            follow_redirects: true,
            max_redirects: crate::redirect::DEFAULT_LIMIT,
        }
    }
}

fn parse<T: FromStr>(key: &str, raw: &str) -> Result<T> {
    raw.trim()
        .parse()
        .map_err(|_| Error::Config(format!("invalid value for {key}: '{raw}'")))
}

fn parse_bool(key: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(Error::Config(format!("invalid value for {key}: '{raw}'"))),
    }
}

impl ClientConfig {
    /// Create a new configuration builder.
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::default()
    }

    /// Load configuration from environment variables named `<PREFIX>_*`.
    ///
    /// Recognized suffixes: `BASE_URL`, `TIMEOUT_MS`, `CONNECT_TIMEOUT_MS`,
    /// `USER_AGENT`, `MAX_REDIRECTS`, `FOLLOW_REDIRECTS`, `RETRIES` and
    /// `RETRY_WAIT_MS`. Unset variables keep their defaults.
    pub fn from_env(prefix: &str) -> Result<Self> {
        Self::from_lookup(prefix, |key| env::var(key).ok())
    }

    fn from_lookup<F>(prefix: &str, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let prefix = prefix.trim_end_matches('_').to_ascii_uppercase();
        let var = |suffix: &str| {
            let key = format!("{prefix}_{suffix}");
            lookup(&key).map(|value| (key, value))
        };

        let mut config = Self::default();
        if let Some((_, url)) = var("BASE_URL") {
            url::Url::parse(&url)?;
            config.base_url = Some(url);
        }
        if let Some((key, raw)) = var("TIMEOUT_MS") {
            config.timeout = Duration::from_millis(parse(&key, &raw)?);
        }
        if let Some((key, raw)) = var("CONNECT_TIMEOUT_MS") {
            config.connect_timeout = Duration::from_millis(parse(&key, &raw)?);
        }
        if let Some((_, agent)) = var("USER_AGENT") {
            config.user_agent = agent;
        }
        if let Some((key, raw)) = var("MAX_REDIRECTS") {
            config.max_redirects = parse(&key, &raw)?;
        }
        if let Some((key, raw)) = var("FOLLOW_REDIRECTS") {
            config.follow_redirects = parse_bool(&key, &raw)?;
        }

        let retries = var("RETRIES")
            .map(|(key, raw)| parse::<usize>(&key, &raw))
            .transpose()?;
        let wait = var("RETRY_WAIT_MS")
            .map(|(key, raw)| parse::<u64>(&key, &raw).map(Duration::from_millis))
            .transpose()?;
        if retries.is_some() || wait.is_some() {
            config.retry = Some(RetryPolicy::constant(
                retries.unwrap_or(crate::retry::RETRY_TIMES),
                wait.unwrap_or(crate::retry::RETRY_WAIT),
            ));
        }

        Ok(config)
    }
}

/// Builder for HTTP client configuration.
#[derive(Debug, Default)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    /// Set the base URL for all requests.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = Some(url.into());
        self
    }

    /// Set the default request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Set the connection timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    /// Retry every request with this policy.
    pub fn retry(mut self, policy: RetryPolicy) -> Self {
        self.config.retry = Some(policy);
        self
    }

    /// Set the connection pool idle timeout.
    pub fn pool_idle_timeout(mut self, timeout: Duration) -> Self {
        self.config.pool_idle_timeout = timeout;
        self
    }

    /// Set the maximum idle connections per host.
    pub fn pool_max_idle_per_host(mut self, max: usize) -> Self {
        self.config.pool_max_idle_per_host = max;
        self
    }

    /// Add a default header for all requests.
    pub fn default_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.default_headers.push((name.into(), value.into()));
        self
    }

    /// Set the user agent string.
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }

    /// Enable or disable gzip compression.
    pub fn gzip(mut self, enable: bool) -> Self {
        self.config.gzip = enable;
        self
    }

    /// Enable or disable brotli compression.
    pub fn brotli(mut self, enable: bool) -> Self {
        self.config.brotli = enable;
        self
    }

    /// Enable or disable following redirects.
    pub fn follow_redirects(mut self, enable: bool) -> Self {
        self.config.follow_redirects = enable;
        self
    }

    /// Set the maximum number of redirects to follow.
    pub fn max_redirects(mut self, max: usize) -> Self {
        self.config.max_redirects = max;
        self
    }

    /// Build the configuration.
    pub fn build(self) -> ClientConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();
        assert!(config.retry.is_none());
        assert!(config.follow_redirects);
        assert_eq!(config.max_redirects, 10);
        assert!(config.user_agent.starts_with("tether/"));
    }

    #[test]
    fn test_builder() {
        let config = ClientConfig::builder()
            .base_url("https://api.example.com")
            .timeout(Duration::from_secs(5))
            .retry(RetryPolicy::constant(2, Duration::from_millis(10)))
            .default_header("X-Api-Version", "2")
            .follow_redirects(false)
            .build();
        assert_eq!(config.base_url.as_deref(), Some("https://api.example.com"));
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.retry.map(|r| r.retries()), Some(2));
        assert_eq!(config.default_headers.len(), 1);
        assert!(!config.follow_redirects);
    }

    #[test]
    fn test_from_env() {
        let config = ClientConfig::from_lookup(
            "APP",
            lookup(&[
                ("APP_BASE_URL", "http://localhost:8080"),
                ("APP_TIMEOUT_MS", "2500"),
                ("APP_FOLLOW_REDIRECTS", "off"),
                ("APP_RETRIES", "5"),
            ]),
        )
        .unwrap();
        assert_eq!(config.base_url.as_deref(), Some("http://localhost:8080"));
        assert_eq!(config.timeout, Duration::from_millis(2500));
        assert!(!config.follow_redirects);
        let retry = config.retry.unwrap();
        assert_eq!(retry.retries(), 5);
        assert!(retry.waits().iter().all(|w| *w == crate::retry::RETRY_WAIT));
    }

    #[test]
    fn test_from_env_prefix_with_underscore() {
        let config =
            ClientConfig::from_lookup("app_", lookup(&[("APP_MAX_REDIRECTS", "3")])).unwrap();
        assert_eq!(config.max_redirects, 3);
    }

    #[test]
    fn test_from_env_invalid_values() {
        let err = ClientConfig::from_lookup("APP", lookup(&[("APP_TIMEOUT_MS", "soon")]))
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(err.to_string().contains("APP_TIMEOUT_MS"));

        let err = ClientConfig::from_lookup("APP", lookup(&[("APP_FOLLOW_REDIRECTS", "maybe")]))
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));

        let err = ClientConfig::from_lookup("APP", lookup(&[("APP_BASE_URL", "not a url")]))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidUrl(_)));
    }
}
