//! Configuration Module
//!
//! Loads proxy and cache settings once from a key/value properties file.
//! The resulting [`Config`] is immutable and handed to the cache and the
//! proxy explicitly.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

/// Default sweep period in seconds.
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 600;

/// Default ceiling on concurrently handled connections.
pub const DEFAULT_MAX_CONNECTIONS: usize = 1024;

/// Largest accepted `maxConnections`, the semaphore's permit ceiling.
pub const MAX_CONNECTIONS_LIMIT: usize = tokio::sync::Semaphore::MAX_PERMITS;

// == Config Error ==
/// Errors raised while loading the configuration file.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// File could not be read
    #[error("Failed to read configuration file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Required key absent
    #[error("Missing configuration key: {0}")]
    Missing(&'static str),

    /// Key present but its value does not parse
    #[error("Invalid value {value:?} for {key}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },

    /// Line that is neither a comment nor a key/value pair
    #[error("Malformed configuration line {line}: {content:?}")]
    Malformed { line: usize, content: String },
}

// == Target Policy ==
/// Rule deciding which absolute target URLs the proxy accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TargetPolicy {
    /// Target host and port must be the proxy's own bind address
    #[default]
    SelfAddressed,
    /// Target host and port must be the upstream's
    Upstream,
    /// Any host is accepted; the request still goes to the fixed upstream
    Any,
}

impl FromStr for TargetPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "self" => Ok(Self::SelfAddressed),
            "upstream" => Ok(Self::Upstream),
            "any" => Ok(Self::Any),
            other => Err(format!("expected self, upstream or any, got {other}")),
        }
    }
}

impl fmt::Display for TargetPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::SelfAddressed => "self",
            Self::Upstream => "upstream",
            Self::Any => "any",
        };
        f.write_str(name)
    }
}

/// Cache limits, fixed for the process lifetime.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Time-to-live applied to every admitted entry
    pub ttl: Duration,
    /// Maximum number of resident entries
    pub max_entries: usize,
    /// Maximum aggregate body bytes
    pub max_bytes: u64,
    /// Period of the background expiry sweep
    pub sweep_interval: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(300),
            max_entries: 1000,
            max_bytes: 10 * 1024 * 1024,
            sweep_interval: Duration::from_secs(DEFAULT_SWEEP_INTERVAL_SECS),
        }
    }
}

/// Listener and upstream settings.
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    pub bind_host: String,
    pub bind_port: u16,
    pub upstream_host: String,
    pub upstream_port: u16,
    /// Required prefix of every target URL, e.g. `http://`
    pub scheme: String,
    pub target_policy: TargetPolicy,
    /// Concurrent handler ceiling, 0 for unbounded
    pub max_connections: usize,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            bind_host: "127.0.0.1".to_string(),
            bind_port: 8080,
            upstream_host: "localhost".to_string(),
            upstream_port: 80,
            scheme: "http://".to_string(),
            target_policy: TargetPolicy::default(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
        }
    }
}

/// Complete process configuration.
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub cache: CacheConfig,
    pub proxy: ProxyConfig,
    /// Port of the admin HTTP API on the proxy's bind host, if enabled
    pub admin_port: Option<u16>,
}

impl Config {
    /// Reads and parses the properties file at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_properties(&text)
    }

    /// Parses configuration from properties text.
    ///
    /// # Required keys
    /// - `expiration` - cache TTL in milliseconds
    /// - `maxEntries` - maximum resident entries
    /// - `maxSize` - maximum resident bytes
    /// - `ip_proxy`, `port_proxy` - proxy bind address
    /// - `nom_server`, `port_server` - upstream address
    /// - `protocole` - required scheme prefix
    ///
    /// # Optional keys
    /// - `sweepInterval` - sweep period in seconds (default: 600)
    /// - `maxConnections` - concurrent connection ceiling (default: 1024, 0 = unbounded)
    /// - `targetMatch` - `self`, `upstream` or `any` (default: `self`)
    /// - `port_admin` - enables the admin API on this port
    pub fn from_properties(text: &str) -> Result<Self, ConfigError> {
        let props = Properties::from_text(text)?;

        let cache = CacheConfig {
            ttl: Duration::from_millis(props.parse("expiration")?),
            max_entries: props.parse("maxEntries")?,
            max_bytes: props.parse("maxSize")?,
            sweep_interval: Duration::from_secs(
                props
                    .parse_optional("sweepInterval")?
                    .unwrap_or(DEFAULT_SWEEP_INTERVAL_SECS),
            ),
        };

        let scheme = props.required("protocole")?.to_string();
        if !scheme.ends_with("://") {
            return Err(ConfigError::Invalid {
                key: "protocole",
                value: scheme,
                reason: "expected a scheme prefix such as http://".to_string(),
            });
        }

        let proxy = ProxyConfig {
            bind_host: props.required("ip_proxy")?.to_string(),
            bind_port: props.parse("port_proxy")?,
            upstream_host: props.required("nom_server")?.to_string(),
            upstream_port: props.parse("port_server")?,
            scheme,
            target_policy: props.parse_optional("targetMatch")?.unwrap_or_default(),
            max_connections: props
                .parse_optional("maxConnections")?
                .unwrap_or(DEFAULT_MAX_CONNECTIONS),
        };

        if proxy.max_connections > MAX_CONNECTIONS_LIMIT {
            return Err(ConfigError::Invalid {
                key: "maxConnections",
                value: proxy.max_connections.to_string(),
                reason: format!("must be at most {MAX_CONNECTIONS_LIMIT}, or 0 for unbounded"),
            });
        }

        Ok(Self {
            cache,
            proxy,
            admin_port: props.parse_optional("port_admin")?,
        })
    }
}

// == Properties ==
/// Raw `key=value` pairs read from a properties file.
struct Properties(HashMap<String, String>);

impl Properties {
    fn from_text(text: &str) -> Result<Self, ConfigError> {
        let mut values = HashMap::new();

        for (index, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
                continue;
            }

            let Some(split) = line.find(['=', ':']) else {
                return Err(ConfigError::Malformed {
                    line: index + 1,
                    content: line.to_string(),
                });
            };

            let key = line[..split].trim();
            let value = line[split + 1..].trim();
            values.insert(key.to_string(), value.to_string());
        }

        Ok(Self(values))
    }

    fn required(&self, key: &'static str) -> Result<&str, ConfigError> {
        match self.0.get(key) {
            Some(value) if !value.is_empty() => Ok(value),
            _ => Err(ConfigError::Missing(key)),
        }
    }

    fn parse<T>(&self, key: &'static str) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        let value = self.required(key)?;
        value.parse().map_err(|e: T::Err| ConfigError::Invalid {
            key,
            value: value.to_string(),
            reason: e.to_string(),
        })
    }

    fn parse_optional<T>(&self, key: &'static str) -> Result<Option<T>, ConfigError>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        match self.0.get(key) {
            Some(value) if !value.is_empty() => self.parse(key).map(Some),
            _ => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
# proxy settings
expiration=60000
maxEntries=10
maxSize = 4096
ip_proxy=127.0.0.1
port_proxy=8080
nom_server=example.org
port_server:80
protocole=http://
";

    #[test]
    fn test_config_from_properties() {
        let config = Config::from_properties(SAMPLE).unwrap();

        assert_eq!(config.cache.ttl, Duration::from_millis(60_000));
        assert_eq!(config.cache.max_entries, 10);
        assert_eq!(config.cache.max_bytes, 4096);
        assert_eq!(
            config.cache.sweep_interval,
            Duration::from_secs(DEFAULT_SWEEP_INTERVAL_SECS)
        );
        assert_eq!(config.proxy.bind_host, "127.0.0.1");
        assert_eq!(config.proxy.bind_port, 8080);
        assert_eq!(config.proxy.upstream_host, "example.org");
        assert_eq!(config.proxy.upstream_port, 80);
        assert_eq!(config.proxy.scheme, "http://");
        assert_eq!(config.proxy.target_policy, TargetPolicy::SelfAddressed);
        assert_eq!(config.proxy.max_connections, DEFAULT_MAX_CONNECTIONS);
        assert!(config.admin_port.is_none());
    }

    #[test]
    fn test_config_optional_keys() {
        let text = format!(
            "{SAMPLE}sweepInterval=5\nmaxConnections=0\ntargetMatch=Upstream\nport_admin=9090\n"
        );
        let config = Config::from_properties(&text).unwrap();

        assert_eq!(config.cache.sweep_interval, Duration::from_secs(5));
        assert_eq!(config.proxy.max_connections, 0);
        assert_eq!(config.proxy.target_policy, TargetPolicy::Upstream);
        assert_eq!(config.admin_port, Some(9090));
    }

    #[test]
    fn test_config_missing_key() {
        let text = SAMPLE.replace("port_proxy=8080\n", "");
        let err = Config::from_properties(&text).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("port_proxy")));
    }

    #[test]
    fn test_config_invalid_number() {
        let text = SAMPLE.replace("maxEntries=10", "maxEntries=ten");
        let err = Config::from_properties(&text).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "maxEntries", .. }));
    }

    #[test]
    fn test_config_rejects_oversized_connection_limit() {
        let text = format!("{SAMPLE}maxConnections={}\n", usize::MAX);
        let err = Config::from_properties(&text).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "maxConnections", .. }));

        let text = format!("{SAMPLE}maxConnections={MAX_CONNECTIONS_LIMIT}\n");
        let config = Config::from_properties(&text).unwrap();
        assert_eq!(config.proxy.max_connections, MAX_CONNECTIONS_LIMIT);
    }

    #[test]
    fn test_config_rejects_bad_scheme() {
        let text = SAMPLE.replace("protocole=http://", "protocole=http");
        let err = Config::from_properties(&text).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "protocole", .. }));
    }

    #[test]
    fn test_config_malformed_line() {
        let text = format!("{SAMPLE}garbage\n");
        let err = Config::from_properties(&text).unwrap_err();
        assert!(matches!(err, ConfigError::Malformed { line: 10, .. }));
    }

    #[test]
    fn test_config_load_missing_file() {
        let err = Config::load("/nonexistent/config.conf").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_target_policy_parse() {
        assert_eq!("self".parse::<TargetPolicy>(), Ok(TargetPolicy::SelfAddressed));
        assert_eq!("ANY".parse::<TargetPolicy>(), Ok(TargetPolicy::Any));
        assert!("nowhere".parse::<TargetPolicy>().is_err());
    }
}
