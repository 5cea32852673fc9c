// # UniFi Controller Source
//
// This crate provides the fixed-IP client source for dnsync, backed by a
// UniFi Network controller.
//
// Both controller flavours are supported:
//
// - **Classic controller** (standalone Network application): login at
//   `/api/login`, API rooted at `/`
// - **UniFi OS** (UDM, UCG, Cloud Key Gen2+): login at `/api/auth/login`,
//   API rooted at `/proxy/network`
//
// The flavour is detected on every fetch: UniFi OS answers `GET /` with
// `200`, a classic controller redirects to its login page.
//
// ## Security Requirements
//
// - The controller password NEVER appears in logs or Debug output
// - The session cookie lives in this source's HTTP client only
//
// ## API Reference
//
// - List sites: GET `{prefix}/api/self/sites`
// - List known clients: GET `{prefix}/api/s/<site>/stat/alluser?type=all&conn=all&within=87600`

use async_trait::async_trait;
use dnsync_core::config::ControllerConfig;
use dnsync_core::traits::{FixedIpClient, FixedIpSource};
use dnsync_core::{Error, Result};
use reqwest::{StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

const SOURCE_NAME: &str = "unifi";

/// Hours of client history requested from the controller (ten years)
const CLIENT_HISTORY_HOURS: &str = "87600";

/// Controller flavour, decides the login path and the API prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flavour {
    Classic,
    UnifiOs,
}

impl Flavour {
    fn login_path(self) -> &'static [&'static str] {
        match self {
            Flavour::Classic => &["api", "login"],
            Flavour::UnifiOs => &["api", "auth", "login"],
        }
    }

    fn api_prefix(self) -> &'static [&'static str] {
        match self {
            Flavour::Classic => &[],
            Flavour::UnifiOs => &["proxy", "network"],
        }
    }
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

/// The `{meta, data}` envelope every controller API answer uses
#[derive(Deserialize)]
struct Envelope<T> {
    #[serde(default)]
    meta: Option<Meta>,
    #[serde(default = "Vec::new")]
    data: Vec<T>,
}

#[derive(Deserialize)]
struct Meta {
    rc: String,
    #[serde(default)]
    msg: Option<String>,
}

#[derive(Deserialize)]
struct Site {
    /// Internal site id used in API paths
    name: String,
    /// Human readable site name
    #[serde(default)]
    desc: String,
}

impl Site {
    /// Label matched against the configured site filter
    fn label(&self) -> String {
        format!("{} ({})", self.desc, self.name)
    }
}

#[derive(Deserialize)]
struct ClientEntry {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    hostname: Option<String>,
    #[serde(default)]
    note: Option<String>,
    #[serde(default)]
    use_fixedip: bool,
    #[serde(default)]
    fixed_ip: Option<String>,
}

impl ClientEntry {
    fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .filter(|n| !n.is_empty())
            .or(self.hostname.as_deref())
            .unwrap_or("<unnamed>")
    }

    /// Fixed-IP flag set without an address to pin
    fn lacks_fixed_ip(&self) -> bool {
        self.use_fixedip && self.fixed_ip.as_deref().is_none_or(|ip| ip.trim().is_empty())
    }
}

/// Convert controller entries, dropping fixed-IP clients that carry no address
fn into_clients(entries: Vec<ClientEntry>) -> Vec<FixedIpClient> {
    entries
        .into_iter()
        .filter(|entry| {
            if entry.lacks_fixed_ip() {
                tracing::warn!(
                    "Skipping client {}: fixed IP enabled but no address set",
                    entry.display_name()
                );
                return false;
            }
            true
        })
        .map(FixedIpClient::from)
        .collect()
}

impl From<ClientEntry> for FixedIpClient {
    fn from(entry: ClientEntry) -> Self {
        let name = entry
            .name
            .filter(|n| !n.is_empty())
            .or(entry.hostname)
            .unwrap_or_default();
        let client = FixedIpClient::new(name, entry.fixed_ip.unwrap_or_default(), entry.use_fixedip);
        match entry.note {
            Some(note) => client.with_note(note),
            None => client,
        }
    }
}

/// UniFi controller fixed-IP client source
pub struct UnifiSource {
    base_url: Url,
    username: String,
    /// ⚠️ NEVER log this value
    password: String,
    /// Prefix of the `"<desc> (<name>)"` label of the site to read
    site_filter: String,
    client: reqwest::Client,
}

impl fmt::Debug for UnifiSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnifiSource")
            .field("base_url", &self.base_url.as_str())
            .field("username", &self.username)
            .field("password", &"<REDACTED>")
            .field("site_filter", &self.site_filter)
            .finish()
    }
}

impl UnifiSource {
    /// Create a source from the controller configuration
    pub fn new(config: &ControllerConfig, timeout: Duration) -> Result<Self> {
        let base_url = Url::parse(&config.url)
            .map_err(|e| Error::config(format!("Invalid UniFi URL: {}", e)))?;
        if base_url.cannot_be_a_base() {
            return Err(Error::config(format!("Invalid UniFi URL: {}", config.url)));
        }

        if !config.verify_tls {
            tracing::warn!("TLS certificate verification disabled for the UniFi controller");
        }

        // Redirects stay visible so the controller flavour can be detected
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .cookie_store(true)
            .redirect(reqwest::redirect::Policy::none())
            .danger_accept_invalid_certs(!config.verify_tls)
            .build()
            .map_err(|e| Error::http(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            base_url,
            username: config.username.clone(),
            password: config.password.clone(),
            site_filter: config.site.clone(),
            client,
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| Error::config("Invalid UniFi URL"))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn api_endpoint(&self, flavour: Flavour, segments: &[&str]) -> Result<Url> {
        let mut path: Vec<&str> = flavour.api_prefix().to_vec();
        path.extend_from_slice(segments);
        self.endpoint(&path)
    }

    async fn detect_flavour(&self) -> Result<Flavour> {
        let response = self
            .client
            .get(self.base_url.clone())
            .send()
            .await
            .map_err(|e| Error::source_fetch(SOURCE_NAME, format!("HTTP request failed: {}", e)))?;

        let flavour = if response.status() == StatusCode::OK {
            Flavour::UnifiOs
        } else {
            Flavour::Classic
        };
        tracing::debug!("UniFi controller flavour: {:?}", flavour);
        Ok(flavour)
    }

    async fn login(&self, flavour: Flavour) -> Result<()> {
        let response = self
            .client
            .post(self.endpoint(flavour.login_path())?)
            .json(&LoginRequest {
                username: &self.username,
                password: &self.password,
            })
            .send()
            .await
            .map_err(|e| Error::source_fetch(SOURCE_NAME, format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::source_fetch(
                SOURCE_NAME,
                format!("Login failed. Status: {}", status),
            ));
        }
        Ok(())
    }

    async fn get_data<T: DeserializeOwned>(&self, url: Url) -> Result<Vec<T>> {
        tracing::debug!("GET {}", url.path());
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::source_fetch(SOURCE_NAME, format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error response".to_string());
            return Err(Error::source_fetch(
                SOURCE_NAME,
                format!("{} - {}", status, error_text),
            ));
        }

        let envelope: Envelope<T> = response.json().await.map_err(|e| {
            Error::source_fetch(SOURCE_NAME, format!("Failed to parse response: {}", e))
        })?;

        if let Some(meta) = envelope.meta.filter(|m| m.rc != "ok") {
            return Err(Error::source_fetch(
                SOURCE_NAME,
                format!(
                    "Controller answered {}: {}",
                    meta.rc,
                    meta.msg.unwrap_or_default()
                ),
            ));
        }

        Ok(envelope.data)
    }

    /// Pick the first site whose label starts with the configured filter
    fn select_site(&self, sites: Vec<Site>) -> Result<Site> {
        for site in &sites {
            tracing::debug!("Site found on controller: {}", site.label());
        }
        sites
            .into_iter()
            .find(|site| site.label().starts_with(&self.site_filter))
            .ok_or_else(|| {
                Error::source_fetch(
                    SOURCE_NAME,
                    format!("Target site not found: {}", self.site_filter),
                )
            })
    }
}

#[async_trait]
impl FixedIpSource for UnifiSource {
    async fn fetch_fixed_ip_clients(&self) -> Result<Vec<FixedIpClient>> {
        tracing::info!("Fetching UniFi clients");

        let flavour = self.detect_flavour().await?;
        self.login(flavour).await?;

        let sites: Vec<Site> = self
            .get_data(self.api_endpoint(flavour, &["api", "self", "sites"])?)
            .await?;
        let site = self.select_site(sites)?;
        tracing::info!("Target site found: {}", site.label());

        let mut url = self.api_endpoint(flavour, &["api", "s", site.name.as_str(), "stat", "alluser"])?;
        url.query_pairs_mut()
            .append_pair("type", "all")
            .append_pair("conn", "all")
            .append_pair("within", CLIENT_HISTORY_HOURS);

        let entries: Vec<ClientEntry> = self.get_data(url).await?;
        tracing::info!("{} clients fetched", entries.len());

        Ok(into_clients(entries))
    }

    fn source_name(&self) -> &'static str {
        SOURCE_NAME
    }
}
