//! Asynchronous hypervisor API client.
//!
//! Every request goes to `<api_url>/api2/json/...` with API-token auth and
//! comes back wrapped in a `{"data": ...}` envelope. Hypervisors in the
//! field run self-signed certificates, so certificate verification is
//! switchable (and loudly logged when off).

use crate::models::{
    ApiData, GuestKind, GuestListEntry, GuestStatus, NodeEntry, SnapshotEntry, VersionInfo,
};
use crate::Result;
use reqwest::{ClientBuilder, Method, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{info, warn};
use url::Url;
use vmctl_core::client::{HttpConfig, GUEST_SETTLE_DELAY_SECS, PROXMOX_DEFAULT_TIMEOUT};
use vmctl_core::Error;

const USER_AGENT: &str = concat!("vmctl-proxmox/", env!("CARGO_PKG_VERSION"));
const DEFAULT_TOKEN_ID: &str = "api";

/// Builder for [`ProxmoxClient`].
#[derive(Debug, Clone)]
pub struct ProxmoxClientBuilder {
    api_url: String,
    username: String,
    token: SecretString,
    verify_ssl: bool,
    http_config: HttpConfig,
    settle_delay: Duration,
}

impl ProxmoxClientBuilder {
    /// Create a builder for the given endpoint and API token credential.
    ///
    /// A credential of the form `id=secret` carries its own token id;
    /// a bare secret gets the default id `api`.
    #[must_use]
    pub fn new(
        api_url: impl Into<String>,
        username: impl Into<String>,
        token: impl Into<String>,
    ) -> Self {
        Self {
            api_url: api_url.into(),
            username: username.into(),
            token: SecretString::from(token.into()),
            verify_ssl: true,
            http_config: HttpConfig::new()
                .with_timeout(Duration::from_secs(PROXMOX_DEFAULT_TIMEOUT)),
            settle_delay: Duration::from_secs(GUEST_SETTLE_DELAY_SECS),
        }
    }

    /// Toggle TLS certificate verification.
    #[must_use]
    pub const fn verify_ssl(mut self, verify: bool) -> Self {
        self.verify_ssl = verify;
        self
    }

    /// Override the HTTP client configuration.
    #[must_use]
    pub fn with_http_config(mut self, config: HttpConfig) -> Self {
        self.http_config = config;
        self
    }

    /// Override the delay before re-polling status after a power change.
    #[must_use]
    pub const fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    /// Build the client.
    pub fn build(self) -> Result<ProxmoxClient> {
        let mut root = self.api_url;
        if !root.ends_with('/') {
            root.push('/');
        }
        let base_url = Url::parse(&root)
            .and_then(|url| url.join("api2/json/"))
            .map_err(|err| Error::Config(format!("Invalid API base URL `{root}`: {err}")))?;

        let raw = self.token.expose_secret();
        let (token_id, secret) = match raw.split_once('=') {
            Some((id, value)) => (id.to_string(), value.to_string()),
            None => (DEFAULT_TOKEN_ID.to_string(), raw.to_string()),
        };
        let auth_header = SecretString::from(format!(
            "PVEAPIToken={}!{token_id}={secret}",
            self.username
        ));

        let accept_invalid_certs = !self.verify_ssl || self.http_config.accept_invalid_certs;
        if accept_invalid_certs {
            warn!("TLS certificate verification disabled");
        }

        let http = ClientBuilder::new()
            .user_agent(USER_AGENT)
            .timeout(self.http_config.timeout)
            .pool_idle_timeout(self.http_config.pool_idle_timeout)
            .pool_max_idle_per_host(self.http_config.pool_max_idle_per_host)
            .danger_accept_invalid_certs(accept_invalid_certs)
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|err| Error::Config(format!("Failed to build HTTP client: {err}")))?;

        Ok(ProxmoxClient {
            http,
            base_url,
            auth_header,
            settle_delay: self.settle_delay,
        })
    }
}

/// Asynchronous client for the hypervisor API.
#[derive(Clone)]
pub struct ProxmoxClient {
    http: reqwest::Client,
    base_url: Url,
    auth_header: SecretString,
    settle_delay: Duration,
}

impl ProxmoxClient {
    /// Return the resolved base URL, `api2/json/` segment included.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Delay to let a guest settle before re-polling its status.
    #[must_use]
    pub const fn settle_delay(&self) -> Duration {
        self.settle_delay
    }

    /// Fetch the API version.
    pub async fn version(&self) -> Result<VersionInfo> {
        self.get_data("version").await
    }

    /// List the cluster's nodes.
    pub async fn list_nodes(&self) -> Result<Vec<NodeEntry>> {
        self.get_data("nodes").await
    }

    /// Fetch the current status of a guest.
    pub async fn guest_status(
        &self,
        node: &str,
        kind: GuestKind,
        vmid: u64,
    ) -> Result<GuestStatus> {
        let path = format!("{}/status/current", guest_path(node, kind, vmid));
        self.get_data(&path).await
    }

    /// Start a guest.
    pub async fn start(&self, node: &str, kind: GuestKind, vmid: u64) -> Result<()> {
        self.post_status(node, kind, vmid, "start").await
    }

    /// Force-stop a guest.
    pub async fn stop(&self, node: &str, kind: GuestKind, vmid: u64) -> Result<()> {
        self.post_status(node, kind, vmid, "stop").await
    }

    /// Ask a guest to shut down gracefully.
    pub async fn shutdown(&self, node: &str, kind: GuestKind, vmid: u64) -> Result<()> {
        self.post_status(node, kind, vmid, "shutdown").await
    }

    /// Reboot a guest.
    pub async fn reboot(&self, node: &str, kind: GuestKind, vmid: u64) -> Result<()> {
        self.post_status(node, kind, vmid, "reboot").await
    }

    /// List a guest's snapshots, the synthetic `current` entry included.
    pub async fn list_snapshots(
        &self,
        node: &str,
        kind: GuestKind,
        vmid: u64,
    ) -> Result<Vec<SnapshotEntry>> {
        let path = format!("{}/snapshot", guest_path(node, kind, vmid));
        self.get_data(&path).await
    }

    /// Create a named snapshot of a guest. QEMU snapshots exclude guest
    /// RAM (`vmstate=0`); the container API has no such knob.
    pub async fn create_snapshot(
        &self,
        node: &str,
        kind: GuestKind,
        vmid: u64,
        name: &str,
        description: &str,
    ) -> Result<()> {
        let path = format!("{}/snapshot", guest_path(node, kind, vmid));
        let mut form = vec![
            ("snapname", name.to_string()),
            ("description", description.to_string()),
        ];
        if kind == GuestKind::Qemu {
            form.push(("vmstate", "0".to_string()));
        }
        self.execute(Method::POST, &path, Some(&form)).await.map(|_| ())
    }

    /// Roll a guest back to a named snapshot.
    pub async fn rollback_snapshot(
        &self,
        node: &str,
        kind: GuestKind,
        vmid: u64,
        name: &str,
    ) -> Result<()> {
        let path = format!("{}/snapshot/{name}/rollback", guest_path(node, kind, vmid));
        self.execute(Method::POST, &path, None).await.map(|_| ())
    }

    /// Delete a named snapshot of a guest.
    pub async fn delete_snapshot(
        &self,
        node: &str,
        kind: GuestKind,
        vmid: u64,
        name: &str,
    ) -> Result<()> {
        let path = format!("{}/snapshot/{name}", guest_path(node, kind, vmid));
        self.execute(Method::DELETE, &path, None).await.map(|_| ())
    }

    /// List guests of one flavor on a node.
    pub async fn list_guests(&self, node: &str, kind: GuestKind) -> Result<Vec<GuestListEntry>> {
        let path = format!("nodes/{node}/{}", kind.path_segment());
        self.get_data(&path).await
    }

    async fn post_status(&self, node: &str, kind: GuestKind, vmid: u64, op: &str) -> Result<()> {
        let path = format!("{}/status/{op}", guest_path(node, kind, vmid));
        self.execute(Method::POST, &path, None).await.map(|_| ())
    }

    async fn get_data<T>(&self, path: &str) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let response = self.execute(Method::GET, path, None).await?;
        let envelope: ApiData<T> = response.json().await.map_err(|err| {
            Error::Parse(format!("Failed to parse response for `{path}`: {err}"))
        })?;
        Ok(envelope.data)
    }

    async fn execute(
        &self,
        method: Method,
        path: &str,
        form: Option<&[(&str, String)]>,
    ) -> Result<reqwest::Response> {
        let url = self
            .base_url
            .join(path)
            .map_err(|err| Error::InvalidEndpoint(format!("Invalid API path `{path}`: {err}")))?;

        let mut request = self
            .http
            .request(method, url)
            .header("Authorization", self.auth_header.expose_secret())
            .header("Accept", "application/json");

        if let Some(fields) = form {
            request = request.form(fields);
        }

        info!(path = %path, "hypervisor API request");

        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(map_status_to_error(status, &body))
    }
}

fn guest_path(node: &str, kind: GuestKind, vmid: u64) -> String {
    format!("nodes/{node}/{}/{vmid}", kind.path_segment())
}

/// Map a non-2xx hypervisor response to the error taxonomy. The API often
/// puts the diagnostic in the status reason and leaves the body empty.
fn map_status_to_error(status: StatusCode, body: &str) -> Error {
    let trimmed = body.trim();
    let message = if trimmed.is_empty() {
        status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string()
    } else {
        trimmed.to_string()
    };

    match status {
        StatusCode::NOT_FOUND => Error::NotFound(message),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Error::AuthFailed(message),
        status if status.is_server_error() => {
            Error::Api(format!("Provider error {status}: {message}"))
        }
        _ => Error::Api(message),
    }
}
