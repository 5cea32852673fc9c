//! Configuration types for the dnsync system
//!
//! The configuration is a single JSON document. Field names follow the
//! camelCase layout of the file; the Rust names describe what each value is.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::Path;

/// Main dnsync configuration
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Network controller holding fixed-IP reservations
    #[serde(rename = "unifi")]
    pub controller: ControllerConfig,

    /// Record stores to reconcile
    #[serde(rename = "pihole")]
    pub targets: Vec<TargetConfig>,

    /// Reverse-proxy manager holding public domain names
    #[serde(rename = "nginxProxyManager")]
    pub proxy_manager: ProxyManagerConfig,

    /// Naming strings used to build the desired state
    #[serde(flatten)]
    pub naming: NamingConfig,

    /// Optional engine settings
    #[serde(default)]
    pub engine: EngineConfig,
}

impl AppConfig {
    /// Read, parse and validate a configuration file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, crate::Error> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            crate::Error::config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        self.controller.validate()?;
        self.proxy_manager.validate()?;
        self.naming.validate()?;
        self.engine.validate()?;

        if self.targets.is_empty() {
            return Err(crate::Error::config("No record store targets configured"));
        }

        let mut names = HashSet::new();
        for target in &self.targets {
            target.validate()?;
            if !names.insert(target.name.as_str()) {
                return Err(crate::Error::config(format!(
                    "Duplicate target name: {}",
                    target.name
                )));
            }
        }

        Ok(())
    }
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("controller", &self.controller)
            .field("targets", &self.targets)
            .field("proxy_manager", &self.proxy_manager)
            .field("naming", &self.naming)
            .field("engine", &self.engine)
            .finish()
    }
}

/// UniFi network controller connection
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ControllerConfig {
    pub username: String,
    /// ⚠️ NEVER log this value
    pub password: String,
    pub url: String,
    /// Prefix matched against the controller's site labels
    pub site: String,
    /// Verify the controller's TLS certificate
    #[serde(default = "default_verify_tls")]
    pub verify_tls: bool,
}

impl ControllerConfig {
    pub fn validate(&self) -> Result<(), crate::Error> {
        validate_url("unifi.url", &self.url)?;
        if self.username.is_empty() {
            return Err(crate::Error::config("unifi.username cannot be empty"));
        }
        Ok(())
    }
}

impl fmt::Debug for ControllerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControllerConfig")
            .field("username", &self.username)
            .field("password", &"<REDACTED>")
            .field("url", &self.url)
            .field("site", &self.site)
            .field("verify_tls", &self.verify_tls)
            .finish()
    }
}

/// One record store target
#[derive(Clone, Serialize, Deserialize)]
pub struct TargetConfig {
    /// Display name, unique across targets
    pub name: String,
    pub url: String,
    /// ⚠️ NEVER log this value
    pub password: String,
}

impl TargetConfig {
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.name.is_empty() {
            return Err(crate::Error::config("pihole target name cannot be empty"));
        }
        validate_url(&format!("pihole[{}].url", self.name), &self.url)
    }
}

impl fmt::Debug for TargetConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TargetConfig")
            .field("name", &self.name)
            .field("url", &self.url)
            .field("password", &"<REDACTED>")
            .finish()
    }
}

/// Nginx Proxy Manager connection
#[derive(Clone, Serialize, Deserialize)]
pub struct ProxyManagerConfig {
    pub url: String,
    pub username: String,
    /// ⚠️ NEVER log this value
    pub password: String,
}

impl ProxyManagerConfig {
    pub fn validate(&self) -> Result<(), crate::Error> {
        validate_url("nginxProxyManager.url", &self.url)
    }
}

impl fmt::Debug for ProxyManagerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyManagerConfig")
            .field("url", &self.url)
            .field("username", &self.username)
            .field("password", &"<REDACTED>")
            .finish()
    }
}

/// Naming strings for the desired state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamingConfig {
    /// Suffix appended to client names, also the zone of the edge host
    #[serde(rename = "local")]
    pub local_domain: String,

    /// Host every proxied domain aliases to (without the local suffix)
    #[serde(rename = "webEdge")]
    pub edge_host: String,

    /// Only proxy domains ending in this suffix are managed
    #[serde(rename = "domain")]
    pub filter_domain: String,
}

impl NamingConfig {
    pub fn validate(&self) -> Result<(), crate::Error> {
        for (field, value) in [
            ("local", &self.local_domain),
            ("webEdge", &self.edge_host),
            ("domain", &self.filter_domain),
        ] {
            if value.is_empty() {
                return Err(crate::Error::config(format!("{} cannot be empty", field)));
            }
        }
        Ok(())
    }
}

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineConfig {
    /// Targets reconciled at the same time (1 = strictly sequential)
    #[serde(default = "default_max_concurrent_targets")]
    pub max_concurrent_targets: usize,

    /// Per-request timeout for every HTTP collaborator (in seconds)
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,

    /// Capacity of the reconcile event channel
    ///
    /// When full, new events are dropped (with a warning log).
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.max_concurrent_targets == 0 {
            return Err(crate::Error::config("engine.maxConcurrentTargets must be > 0"));
        }
        if self.http_timeout_secs == 0 {
            return Err(crate::Error::config("engine.httpTimeoutSecs must be > 0"));
        }
        if self.event_channel_capacity == 0 {
            return Err(crate::Error::config("engine.eventChannelCapacity must be > 0"));
        }
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_concurrent_targets: default_max_concurrent_targets(),
            http_timeout_secs: default_http_timeout_secs(),
            event_channel_capacity: default_event_channel_capacity(),
        }
    }
}

fn validate_url(field: &str, url: &str) -> Result<(), crate::Error> {
    if url.is_empty() {
        return Err(crate::Error::config(format!("{} cannot be empty", field)));
    }
    if !url.starts_with("https://") && !url.starts_with("http://") {
        return Err(crate::Error::config(format!(
            "{} must use HTTP or HTTPS scheme. Got: {}",
            field, url
        )));
    }
    Ok(())
}

fn default_verify_tls() -> bool {
    true
}

fn default_max_concurrent_targets() -> usize {
    1
}

fn default_http_timeout_secs() -> u64 {
    30
}

fn default_event_channel_capacity() -> usize {
    1000
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = r#"{
        "unifi": { "username": "admin", "password": "s3cret-unifi", "url": "https://unifi.lan", "site": "Default" },
        "pihole": [
            { "name": "primary", "url": "http://10.0.0.53", "password": "s3cret-pihole" },
            { "name": "secondary", "url": "http://10.0.0.54", "password": "s3cret-pihole" }
        ],
        "nginxProxyManager": { "url": "http://npm.lan:81", "username": "admin@example.com", "password": "s3cret-npm" },
        "domain": "example.com",
        "webEdge": "edge",
        "local": "home.arpa"
    }"#;

    fn sample() -> AppConfig {
        serde_json::from_str(SAMPLE).unwrap()
    }

    #[test]
    fn parses_file_layout() {
        let config = sample();
        assert_eq!(config.targets.len(), 2);
        assert_eq!(config.naming.local_domain, "home.arpa");
        assert_eq!(config.naming.edge_host, "edge");
        assert_eq!(config.naming.filter_domain, "example.com");
        assert!(config.controller.verify_tls);
        assert_eq!(config.engine.max_concurrent_targets, 1);
        assert_eq!(config.engine.http_timeout_secs, 30);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_missing_targets() {
        let mut config = sample();
        config.targets.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_duplicate_target_names() {
        let mut config = sample();
        config.targets[1].name = "primary".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("Duplicate target name"));
    }

    #[test]
    fn rejects_url_without_scheme() {
        let mut config = sample();
        config.proxy_manager.url = "npm.lan:81".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_empty_naming() {
        let mut config = sample();
        config.naming.edge_host.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_zero_concurrency() {
        let mut config = sample();
        config.engine.max_concurrent_targets = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn debug_redacts_passwords() {
        let debug_str = format!("{:?}", sample());
        assert!(!debug_str.contains("s3cret"));
        assert!(debug_str.contains("<REDACTED>"));
    }

    #[test]
    fn from_file_reads_and_validates() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let config = AppConfig::from_file(file.path()).unwrap();
        assert_eq!(config.targets[0].name, "primary");
    }

    #[test]
    fn from_file_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = AppConfig::from_file(dir.path().join("missing.json")).unwrap_err();
        assert!(matches!(err, crate::Error::Config(_)));
    }
}
