// # Pi-hole Record Store
//
// This crate provides the Pi-hole v6 record store for dnsync.
//
// Each `PiholeStore` talks to exactly one Pi-hole instance and owns that
// instance's session. A session is obtained with the web password, kept
// until its validity runs out, and dropped as soon as the server answers
// 401.
//
// ## What this store does NOT do
//
// - Retry failed calls (the next run converges)
// - Share a session with another target
// - Decide which records to change (owned by the Reconciler)
//
// ## Security Requirements
//
// - The password and the session id NEVER appear in logs or Debug output
//
// ## API Reference
//
// - Authenticate: POST `/api/auth` `{"password": ...}`
// - List A records: GET `/api/config/dns/hosts`
// - List CNAME records: GET `/api/config/dns/cnameRecords`
// - Create/delete A record: PUT/DELETE `/api/config/dns/hosts/<ip host>`
// - Create/delete CNAME record: PUT/DELETE `/api/config/dns/cnameRecords/<alias,target>`

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dnsync_core::traits::RecordStore;
use dnsync_core::{Alias, Binding, Error, Result, StoreOutcome};
use reqwest::{Method, StatusCode, Url};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;
use tokio::sync::Mutex;

const SID_HEADER: &str = "X-FTL-SID";
const CSRF_HEADER: &str = "X-FTL-CSRF";

/// An authenticated Pi-hole session
#[derive(Clone)]
struct Session {
    sid: String,
    csrf: String,
    expires: DateTime<Utc>,
}

impl Session {
    fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires
    }
}

#[derive(Serialize)]
struct AuthRequest<'a> {
    password: &'a str,
}

#[derive(Deserialize)]
struct AuthResponse {
    session: AuthSession,
}

#[derive(Deserialize)]
struct AuthSession {
    valid: bool,
    #[serde(default)]
    sid: Option<String>,
    #[serde(default)]
    csrf: Option<String>,
    #[serde(default)]
    validity: i64,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Deserialize)]
struct ConfigResponse {
    config: ConfigDocument,
}

#[derive(Deserialize, Default)]
struct ConfigDocument {
    #[serde(default)]
    dns: DnsSection,
}

#[derive(Deserialize, Default)]
struct DnsSection {
    #[serde(default)]
    hosts: Vec<String>,
    #[serde(default, rename = "cnameRecords")]
    cname_records: Vec<String>,
}

/// Raw entry strings from the last listing, keyed by the record parsed from them
///
/// Pi-hole removes an entry only when the DELETE path matches the stored
/// string exactly, so deletes of listed records reuse these strings.
#[derive(Default)]
struct ListedEntries {
    hosts: HashMap<Binding, String>,
    cname_records: HashMap<Alias, String>,
}

/// Create or delete, with the status codes each one treats as success
#[derive(Debug, Clone, Copy)]
enum Mutation {
    Create,
    Delete,
}

impl Mutation {
    fn method(self) -> Method {
        match self {
            Mutation::Create => Method::PUT,
            Mutation::Delete => Method::DELETE,
        }
    }

    fn outcome(self, status: StatusCode) -> Option<StoreOutcome> {
        match (self, status.as_u16()) {
            (Mutation::Create, 201) | (Mutation::Delete, 204) => Some(StoreOutcome::Applied),
            // 400: entry already present; 404: entry already gone
            (Mutation::Create, 400) | (Mutation::Delete, 404) => {
                Some(StoreOutcome::AlreadyInDesiredState)
            }
            _ => None,
        }
    }
}

/// Pi-hole v6 record store
///
/// # Security
///
/// The Debug implementation does NOT expose the password or the session.
pub struct PiholeStore {
    /// Target name used in logs and errors
    name: String,

    base_url: Url,

    /// Web interface password
    /// ⚠️ NEVER log this value
    password: String,

    client: reqwest::Client,

    /// Cached session, `None` until the first authentication
    session: Mutex<Option<Session>>,

    listed: Mutex<ListedEntries>,
}

impl fmt::Debug for PiholeStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PiholeStore")
            .field("name", &self.name)
            .field("base_url", &self.base_url.as_str())
            .field("password", &"<REDACTED>")
            .finish()
    }
}

impl PiholeStore {
    /// Create a store for one Pi-hole instance
    ///
    /// No request is made until [`RecordStore::authenticate`] or a listing
    /// is called.
    pub fn new(
        name: impl Into<String>,
        url: &str,
        password: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let name = name.into();
        let base_url = Url::parse(url)
            .map_err(|e| Error::config(format!("Invalid Pi-hole URL for {}: {}", name, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(Error::config(format!("Invalid Pi-hole URL for {}: {}", name, url)));
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::http(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            name,
            base_url,
            password: password.into(),
            client,
            session: Mutex::new(None),
            listed: Mutex::new(ListedEntries::default()),
        })
    }

    /// Build `<base>/api/<segments...>`, percent-encoding each segment
    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| Error::config(format!("Invalid Pi-hole URL for {}", self.name)))?
            .pop_if_empty()
            .push("api")
            .extend(segments);
        Ok(url)
    }

    /// Return a valid session, authenticating only when needed
    async fn session(&self) -> Result<Session> {
        let mut cached = self.session.lock().await;
        if let Some(session) = cached.as_ref() {
            if session.is_valid_at(Utc::now()) {
                tracing::debug!("[{}] Using cached session", self.name);
                return Ok(session.clone());
            }
            tracing::debug!("[{}] Session expired", self.name);
        }

        let session = self.login().await?;
        *cached = Some(session.clone());
        Ok(session)
    }

    async fn login(&self) -> Result<Session> {
        tracing::info!("[{}] Authenticating to Pi-hole", self.name);

        let response = self
            .client
            .post(self.endpoint(&["auth"])?)
            .json(&AuthRequest {
                password: &self.password,
            })
            .send()
            .await
            .map_err(|e| Error::target_auth(&self.name, format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(Error::target_auth(
                &self.name,
                format!("Authentication failed. Status: {}", status),
            ));
        }

        let body: AuthResponse = response.json().await.map_err(|e| {
            Error::target_auth(&self.name, format!("Failed to parse response: {}", e))
        })?;
        let auth = body.session;

        if !auth.valid {
            return Err(Error::target_auth(
                &self.name,
                auth.message
                    .unwrap_or_else(|| "session not valid".to_string()),
            ));
        }

        Ok(Session {
            sid: auth.sid.unwrap_or_default(),
            csrf: auth.csrf.unwrap_or_default(),
            expires: Utc::now() + chrono::Duration::seconds(auth.validity),
        })
    }

    async fn invalidate_session(&self) {
        tracing::warn!("[{}] Session rejected, clearing cached session", self.name);
        *self.session.lock().await = None;
    }

    /// Fetch one `config.dns` element
    async fn dns_config(&self, element: &str) -> Result<DnsSection> {
        let session = self.session().await?;
        let url = self.endpoint(&["config", "dns", element])?;
        tracing::debug!("[{}] GET {}", self.name, url.path());

        let response = self
            .client
            .get(url)
            .header(SID_HEADER, &session.sid)
            .header(CSRF_HEADER, &session.csrf)
            .send()
            .await
            .map_err(|e| Error::target_list(&self.name, format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            self.invalidate_session().await;
            return Err(Error::target_auth(&self.name, "Session rejected (401)"));
        }
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error response".to_string());
            return Err(Error::target_list(
                &self.name,
                format!("Failed to read {}: {} - {}", element, status, error_text),
            ));
        }

        let body: ConfigResponse = response.json().await.map_err(|e| {
            Error::target_list(&self.name, format!("Failed to parse response: {}", e))
        })?;
        Ok(body.config.dns)
    }

    async fn mutate(
        &self,
        mutation: Mutation,
        element: &str,
        entry: &str,
        operation: &str,
        record: String,
    ) -> Result<StoreOutcome> {
        let session = self.session().await?;
        let url = self.endpoint(&["config", "dns", element, entry])?;
        tracing::debug!("[{}] {} {}", self.name, mutation.method(), url.path());

        let response = self
            .client
            .request(mutation.method(), url)
            .header(SID_HEADER, &session.sid)
            .header(CSRF_HEADER, &session.csrf)
            .send()
            .await
            .map_err(|e| {
                Error::operation(
                    &self.name,
                    operation,
                    &record,
                    format!("HTTP request failed: {}", e),
                )
            })?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            self.invalidate_session().await;
            return Err(Error::target_auth(&self.name, "Session rejected (401)"));
        }

        match mutation.outcome(status) {
            Some(outcome) => Ok(outcome),
            None => {
                let error_text = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "Unable to read error response".to_string());
                Err(Error::operation(
                    &self.name,
                    operation,
                    record,
                    format!("{} - {}", status, error_text),
                ))
            }
        }
    }
}

/// Parse a `config.dns.hosts` entry: `"<ip> <hostname> [<hostname>...]"`
///
/// An entry naming several hostnames is one binding whose hostname is the
/// space-joined list. Generated hostnames never contain spaces, so such an
/// entry is always replaced by single-host entries.
pub fn parse_host_entry(entry: &str) -> Option<Binding> {
    let mut fields = entry.split_whitespace();
    let ip = fields.next()?;
    let hostnames: Vec<&str> = fields.collect();
    if hostnames.is_empty() {
        return None;
    }
    Some(Binding::new(hostnames.join(" "), ip))
}

/// Parse a `config.dns.cnameRecords` entry: `"<alias>,<target>[,<ttl>]"`
pub fn parse_cname_entry(entry: &str) -> Option<Alias> {
    let mut fields = entry.split(',').map(str::trim);
    let alias = fields.next().filter(|s| !s.is_empty())?;
    let target = fields.next().filter(|s| !s.is_empty())?;
    Some(Alias::new(alias, target))
}

#[async_trait]
impl RecordStore for PiholeStore {
    fn target_name(&self) -> &str {
        &self.name
    }

    async fn authenticate(&self) -> Result<()> {
        self.session().await.map(|_| ())
    }

    async fn list_bindings(&self) -> Result<Vec<Binding>> {
        let dns = self.dns_config("hosts").await?;
        let mut bindings = Vec::with_capacity(dns.hosts.len());
        let mut hosts = HashMap::with_capacity(dns.hosts.len());
        for entry in dns.hosts {
            let binding = parse_host_entry(&entry).ok_or_else(|| {
                Error::target_list(&self.name, format!("Malformed hosts entry: {:?}", entry))
            })?;
            bindings.push(binding.clone());
            hosts.insert(binding, entry);
        }

        self.listed.lock().await.hosts = hosts;
        Ok(bindings)
    }

    async fn list_aliases(&self) -> Result<Vec<Alias>> {
        let dns = self.dns_config("cnameRecords").await?;
        let mut aliases = Vec::with_capacity(dns.cname_records.len());
        let mut cname_records = HashMap::with_capacity(dns.cname_records.len());
        for entry in dns.cname_records {
            let alias = parse_cname_entry(&entry).ok_or_else(|| {
                Error::target_list(
                    &self.name,
                    format!("Malformed cnameRecords entry: {:?}", entry),
                )
            })?;
            aliases.push(alias.clone());
            cname_records.insert(alias, entry);
        }

        self.listed.lock().await.cname_records = cname_records;
        Ok(aliases)
    }

    async fn create_binding(&self, binding: &Binding) -> Result<StoreOutcome> {
        let entry = format!("{} {}", binding.ip_address, binding.hostname);
        self.mutate(Mutation::Create, "hosts", &entry, "create binding", binding.to_string())
            .await
    }

    async fn delete_binding(&self, binding: &Binding) -> Result<StoreOutcome> {
        let listed = self.listed.lock().await.hosts.get(binding).cloned();
        let entry =
            listed.unwrap_or_else(|| format!("{} {}", binding.ip_address, binding.hostname));
        self.mutate(Mutation::Delete, "hosts", &entry, "delete binding", binding.to_string())
            .await
    }

    async fn create_alias(&self, alias: &Alias) -> Result<StoreOutcome> {
        let entry = format!("{},{}", alias.alias, alias.target);
        self.mutate(Mutation::Create, "cnameRecords", &entry, "create alias", alias.to_string())
            .await
    }

    async fn delete_alias(&self, alias: &Alias) -> Result<StoreOutcome> {
        let listed = self.listed.lock().await.cname_records.get(alias).cloned();
        let entry = listed.unwrap_or_else(|| format!("{},{}", alias.alias, alias.target));
        self.mutate(Mutation::Delete, "cnameRecords", &entry, "delete alias", alias.to_string())
            .await
    }
}
