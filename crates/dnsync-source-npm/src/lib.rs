// # Nginx Proxy Manager Source
//
// This crate provides the alias source for dnsync: every domain name
// configured on an Nginx Proxy Manager proxy host.
//
// ## Token handling
//
// NPM issues a bearer token with an absolute expiry. The token is cached
// inside this source and reused until it expires, so repeated runs from
// an embedding application log in once per token lifetime.
//
// ## Security Requirements
//
// - The password and the bearer token NEVER appear in logs or Debug output
//
// ## API Reference
//
// - Request token: POST `/api/tokens` `{"identity": ..., "secret": ...}`
// - List proxy hosts: GET `/api/nginx/proxy-hosts`

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dnsync_core::config::ProxyManagerConfig;
use dnsync_core::traits::AliasSource;
use dnsync_core::{Error, Result};
use reqwest::{StatusCode, Url};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tokio::sync::Mutex;

const SOURCE_NAME: &str = "nginx-proxy-manager";

#[derive(Serialize)]
struct TokenRequest<'a> {
    identity: &'a str,
    secret: &'a str,
}

#[derive(Deserialize, Clone)]
struct Token {
    token: String,
    expires: DateTime<Utc>,
}

#[derive(Deserialize)]
struct ProxyHost {
    #[serde(default)]
    domain_names: Vec<String>,
}

/// Nginx Proxy Manager domain-name source
pub struct ProxyManagerSource {
    base_url: Url,
    username: String,
    /// ⚠️ NEVER log this value
    password: String,
    client: reqwest::Client,
    token: Mutex<Option<Token>>,
}

impl fmt::Debug for ProxyManagerSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyManagerSource")
            .field("base_url", &self.base_url.as_str())
            .field("username", &self.username)
            .field("password", &"<REDACTED>")
            .finish()
    }
}

impl ProxyManagerSource {
    pub fn new(config: &ProxyManagerConfig, timeout: Duration) -> Result<Self> {
        let base_url = Url::parse(&config.url)
            .map_err(|e| Error::config(format!("Invalid Nginx Proxy Manager URL: {}", e)))?;
        if base_url.cannot_be_a_base() {
            return Err(Error::config(format!(
                "Invalid Nginx Proxy Manager URL: {}",
                config.url
            )));
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::http(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            base_url,
            username: config.username.clone(),
            password: config.password.clone(),
            client,
            token: Mutex::new(None),
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| Error::config("Invalid Nginx Proxy Manager URL"))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Return a bearer token, requesting a new one only when the cached one expired
    async fn bearer_token(&self) -> Result<String> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref().filter(|t| Utc::now() < t.expires) {
            tracing::debug!("Using cached Nginx Proxy Manager token");
            return Ok(token.token.clone());
        }

        tracing::info!("Authenticating to Nginx Proxy Manager");
        let response = self
            .client
            .post(self.endpoint(&["api", "tokens"])?)
            .json(&TokenRequest {
                identity: &self.username,
                secret: &self.password,
            })
            .send()
            .await
            .map_err(|e| Error::source_fetch(SOURCE_NAME, format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(Error::source_fetch(
                SOURCE_NAME,
                format!("Authentication failed. Status: {}", status),
            ));
        }

        let token: Token = response.json().await.map_err(|e| {
            Error::source_fetch(SOURCE_NAME, format!("Failed to parse token response: {}", e))
        })?;
        tracing::info!("Authenticated to Nginx Proxy Manager, token expires {}", token.expires);

        let bearer = token.token.clone();
        *cached = Some(token);
        Ok(bearer)
    }
}

#[async_trait]
impl AliasSource for ProxyManagerSource {
    async fn fetch_domain_names(&self) -> Result<Vec<String>> {
        let token = self.bearer_token().await?;

        let response = self
            .client
            .get(self.endpoint(&["api", "nginx", "proxy-hosts"])?)
            .bearer_auth(&token)
            .send()
            .await
            .map_err(|e| Error::source_fetch(SOURCE_NAME, format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            *self.token.lock().await = None;
        }
        if status != StatusCode::OK {
            return Err(Error::source_fetch(
                SOURCE_NAME,
                format!("Failed to get proxy hosts. Status: {}", status),
            ));
        }

        let hosts: Vec<ProxyHost> = response.json().await.map_err(|e| {
            Error::source_fetch(SOURCE_NAME, format!("Failed to parse response: {}", e))
        })?;

        let domains: Vec<String> = hosts.into_iter().flat_map(|h| h.domain_names).collect();
        tracing::info!("{} proxied domain names found", domains.len());
        Ok(domains)
    }

    fn source_name(&self) -> &'static str {
        SOURCE_NAME
    }
}
