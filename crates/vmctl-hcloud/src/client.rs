//! Asynchronous cloud API client implementation.

use crate::models::{
    Action, ActionResponse, ActionStatus, CreateImageRequest, CreateImageResponse, ErrorEnvelope,
    Image, ImageResponse, ImagesResponse, Server, ServerResponse,
};
use crate::Result;
use reqwest::{ClientBuilder, Method, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info};
use url::Url;
use vmctl_core::client::{
    HttpConfig, ACTION_MAX_POLLS, ACTION_POLL_INTERVAL_SECS, HCLOUD_DEFAULT_TIMEOUT,
};
use vmctl_core::query::QueryParams;
use vmctl_core::Error;

const USER_AGENT: &str = concat!("vmctl-hcloud/", env!("CARGO_PKG_VERSION"));
const DEFAULT_BASE_URL: &str = "https://api.hetzner.cloud/v1/";
const LIST_PAGE_SIZE: u32 = 50;

/// Builder for [`HcloudClient`].
#[derive(Debug, Clone)]
pub struct HcloudClientBuilder {
    base_url: String,
    token: SecretString,
    http_config: HttpConfig,
    action_poll_interval: Duration,
    action_max_polls: u32,
}

impl HcloudClientBuilder {
    /// Create a builder for the given API token.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            token: SecretString::from(token.into()),
            http_config: HttpConfig::new()
                .with_timeout(Duration::from_secs(HCLOUD_DEFAULT_TIMEOUT)),
            action_poll_interval: Duration::from_secs(ACTION_POLL_INTERVAL_SECS),
            action_max_polls: ACTION_MAX_POLLS,
        }
    }

    /// Override the API base URL.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Override the HTTP client configuration.
    #[must_use]
    pub fn with_http_config(mut self, config: HttpConfig) -> Self {
        self.http_config = config;
        self
    }

    /// Override the delay between action polls.
    #[must_use]
    pub const fn with_action_poll_interval(mut self, interval: Duration) -> Self {
        self.action_poll_interval = interval;
        self
    }

    /// Override the maximum number of action polls.
    #[must_use]
    pub const fn with_action_max_polls(mut self, polls: u32) -> Self {
        self.action_max_polls = polls;
        self
    }

    /// Build the client.
    pub fn build(self) -> Result<HcloudClient> {
        let mut base = self.base_url;
        if !base.ends_with('/') {
            base.push('/');
        }
        let base_url = Url::parse(&base)
            .map_err(|err| Error::Config(format!("Invalid API base URL `{base}`: {err}")))?;

        let http = ClientBuilder::new()
            .user_agent(USER_AGENT)
            .timeout(self.http_config.timeout)
            .pool_idle_timeout(self.http_config.pool_idle_timeout)
            .pool_max_idle_per_host(self.http_config.pool_max_idle_per_host)
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|err| Error::Config(format!("Failed to build HTTP client: {err}")))?;

        Ok(HcloudClient {
            http,
            base_url,
            token: self.token,
            action_poll_interval: self.action_poll_interval,
            action_max_polls: self.action_max_polls,
        })
    }
}

/// Asynchronous client for the cloud VM API.
#[derive(Clone)]
pub struct HcloudClient {
    http: reqwest::Client,
    base_url: Url,
    token: SecretString,
    action_poll_interval: Duration,
    action_max_polls: u32,
}

impl HcloudClient {
    /// Construct a client with default settings for the given token.
    pub fn new(token: impl Into<String>) -> Result<Self> {
        HcloudClientBuilder::new(token).build()
    }

    /// Return the base URL.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Fetch a server by id.
    pub async fn get_server(&self, server_id: u64) -> Result<Server> {
        let path = format!("servers/{server_id}");
        let response: ServerResponse = self.get_json(&path, &[]).await?;
        Ok(response.server)
    }

    /// Power on a server.
    pub async fn power_on(&self, server_id: u64) -> Result<Action> {
        self.server_action(server_id, "poweron").await
    }

    /// Gracefully shut down a server via ACPI.
    pub async fn shutdown(&self, server_id: u64) -> Result<Action> {
        self.server_action(server_id, "shutdown").await
    }

    /// Cut power to a server immediately.
    pub async fn power_off(&self, server_id: u64) -> Result<Action> {
        self.server_action(server_id, "poweroff").await
    }

    /// Reboot a server.
    pub async fn reboot(&self, server_id: u64) -> Result<Action> {
        self.server_action(server_id, "reboot").await
    }

    /// Fetch an action by id.
    pub async fn get_action(&self, action_id: u64) -> Result<Action> {
        let path = format!("actions/{action_id}");
        let response: ActionResponse = self.get_json(&path, &[]).await?;
        Ok(response.action)
    }

    /// Poll an action until it reaches a terminal state, bounded by the
    /// configured poll budget.
    ///
    /// The provider job is never canceled; exhausting the budget is a
    /// timeout failure and the job keeps running remotely.
    pub async fn wait_action(&self, action_id: u64) -> Result<Action> {
        for poll in 0..self.action_max_polls {
            let action = self.get_action(action_id).await?;
            match action.status {
                ActionStatus::Success => {
                    debug!(action_id, polls = poll + 1, "action finished");
                    return Ok(action);
                }
                ActionStatus::Error => {
                    let message = action
                        .error
                        .as_ref()
                        .map_or("unknown action error", |err| err.message.as_str());
                    return Err(Error::Api(format!("Action {action_id} failed: {message}")));
                }
                ActionStatus::Running | ActionStatus::Unknown => {
                    sleep(self.action_poll_interval).await;
                }
            }
        }

        Err(Error::Timeout(format!(
            "Action {action_id} did not finish within {} polls",
            self.action_max_polls
        )))
    }

    /// List every snapshot image in the project, following pagination.
    pub async fn list_snapshot_images(&self) -> Result<Vec<Image>> {
        let mut images = Vec::new();
        let mut page = 1u32;

        loop {
            let mut params = QueryParams::new();
            params.push("type", "snapshot");
            params.push("per_page", LIST_PAGE_SIZE);
            params.push("page", page);

            let response: ImagesResponse =
                self.get_json("images", &params.into_pairs()).await?;
            images.extend(response.images);

            match response
                .meta
                .and_then(|meta| meta.pagination)
                .and_then(|pagination| pagination.next_page)
            {
                Some(next) => page = next,
                None => break,
            }
        }

        Ok(images)
    }

    /// Fetch a snapshot image by id.
    pub async fn get_image(&self, image_id: u64) -> Result<Image> {
        let path = format!("images/{image_id}");
        let response: ImageResponse = self.get_json(&path, &[]).await?;
        Ok(response.image)
    }

    /// Create a snapshot image of a server.
    pub async fn create_image(
        &self,
        server_id: u64,
        description: &str,
    ) -> Result<CreateImageResponse> {
        let path = format!("servers/{server_id}/actions/create_image");
        let request = CreateImageRequest::snapshot(description);
        self.send_json(Method::POST, &path, Some(&request), &[]).await
    }

    /// Delete a snapshot image.
    pub async fn delete_image(&self, image_id: u64) -> Result<()> {
        let path = format!("images/{image_id}");
        self.execute(Method::DELETE, &path, &[], None::<&()>)
            .await
            .map(|_| ())
    }

    async fn server_action(&self, server_id: u64, action: &str) -> Result<Action> {
        let path = format!("servers/{server_id}/actions/{action}");
        let response: ActionResponse = self
            .send_json(Method::POST, &path, None::<&()>, &[])
            .await?;
        Ok(response.action)
    }

    fn build_url(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|err| Error::InvalidEndpoint(format!("Invalid API path `{path}`: {err}")))
    }

    async fn get_json<T>(&self, path: &str, params: &[(&'static str, String)]) -> Result<T>
    where
        T: DeserializeOwned,
    {
        self.send_json::<(), T>(Method::GET, path, None, params).await
    }

    async fn send_json<B, R>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
        params: &[(&'static str, String)],
    ) -> Result<R>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let response = self.execute(method, path, params, body).await?;
        response.json::<R>().await.map_err(|err| {
            Error::Parse(format!("Failed to parse response for `{path}`: {err}"))
        })
    }

    async fn execute<B>(
        &self,
        method: Method,
        path: &str,
        params: &[(&'static str, String)],
        body: Option<&B>,
    ) -> Result<reqwest::Response>
    where
        B: Serialize + ?Sized,
    {
        let url = self.build_url(path)?;
        let mut request = self
            .http
            .request(method, url)
            .query(params)
            .bearer_auth(self.token.expose_secret())
            .header("Accept", "application/json");

        if let Some(payload) = body {
            request = request.json(payload);
        }

        info!(path = %path, "cloud API request");

        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        Err(map_status_to_error(status, &text))
    }
}

/// Map a non-2xx provider response to the error taxonomy, extracting the
/// provider's own message from the error body when it parses.
fn map_status_to_error(status: StatusCode, body: &str) -> Error {
    let message = serde_json::from_str::<ErrorEnvelope>(body)
        .map_or_else(|_| body.to_string(), |envelope| envelope.error.message);

    match status {
        StatusCode::NOT_FOUND => Error::NotFound(message),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Error::AuthFailed(message),
        status if status.is_server_error() => {
            Error::Api(format!("Provider error {status}: {message}"))
        }
        _ => Error::Api(message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_client(server: &MockServer) -> HcloudClient {
        HcloudClientBuilder::new("test-token")
            .with_base_url(server.uri())
            .with_action_poll_interval(Duration::from_millis(5))
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn get_server_sends_bearer_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/servers/42"))
            .and(header("Authorization", "Bearer test-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "server": {"id": 42, "name": "web-01", "status": "running"}
            })))
            .mount(&server)
            .await;

        let client = test_client(&server);
        let result = client.get_server(42).await.unwrap();
        assert_eq!(result.name, "web-01");
        assert!(result.status.is_running());
    }

    #[tokio::test]
    async fn get_server_not_found_surfaces_provider_message() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/servers/9"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "error": {"code": "not_found", "message": "server with ID '9' not found"}
            })))
            .mount(&server)
            .await;

        let client = test_client(&server);
        let err = client.get_server(9).await.unwrap_err();
        assert_eq!(
            err,
            Error::NotFound("server with ID '9' not found".to_string())
        );
    }

    #[tokio::test]
    async fn auth_failure_maps_to_auth_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/servers/1"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "error": {"code": "unauthorized", "message": "unable to authenticate"}
            })))
            .mount(&server)
            .await;

        let client = test_client(&server);
        let err = client.get_server(1).await.unwrap_err();
        assert!(matches!(err, Error::AuthFailed(_)));
    }

    #[tokio::test]
    async fn wait_action_polls_until_success() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/actions/77"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "action": {"id": 77, "status": "running"}
            })))
            .up_to_n_times(2)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/actions/77"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "action": {"id": 77, "status": "success", "progress": 100}
            })))
            .mount(&server)
            .await;

        let client = test_client(&server);
        let action = client.wait_action(77).await.unwrap();
        assert_eq!(action.status, ActionStatus::Success);
    }

    #[tokio::test]
    async fn wait_action_reports_action_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/actions/78"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "action": {
                    "id": 78,
                    "status": "error",
                    "error": {"code": "server_locked", "message": "server is locked"}
                }
            })))
            .mount(&server)
            .await;

        let client = test_client(&server);
        let err = client.wait_action(78).await.unwrap_err();
        assert_eq!(
            err,
            Error::Api("Action 78 failed: server is locked".to_string())
        );
    }

    #[tokio::test]
    async fn wait_action_times_out_on_stuck_action() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/actions/79"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "action": {"id": 79, "status": "running"}
            })))
            .mount(&server)
            .await;

        let client = HcloudClientBuilder::new("test-token")
            .with_base_url(server.uri())
            .with_action_poll_interval(Duration::from_millis(1))
            .with_action_max_polls(3)
            .build()
            .unwrap();

        let err = client.wait_action(79).await.unwrap_err();
        assert!(matches!(err, Error::Timeout(_)));
    }

    #[tokio::test]
    async fn list_snapshot_images_follows_pagination() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/images"))
            .and(query_param("type", "snapshot"))
            .and(query_param("page", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "images": [{"id": 1, "description": "a", "status": "available"}],
                "meta": {"pagination": {"next_page": 2}}
            })))
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/images"))
            .and(query_param("page", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "images": [{"id": 2, "description": "b", "status": "creating"}],
                "meta": {"pagination": {"next_page": null}}
            })))
            .mount(&server)
            .await;

        let client = test_client(&server);
        let images = client.list_snapshot_images().await.unwrap();
        assert_eq!(images.len(), 2);
        assert_eq!(images[0].id, 1);
        assert_eq!(images[1].id, 2);
    }

    #[tokio::test]
    async fn create_image_posts_snapshot_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/servers/42/actions/create_image"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "image": {"id": 900, "description": "web-01-nightly", "status": "creating"},
                "action": {"id": 555, "status": "running"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(&server);
        let response = client.create_image(42, "web-01-nightly").await.unwrap();
        assert_eq!(response.image.id, 900);
        assert_eq!(response.action.id, 555);
    }

    #[tokio::test]
    async fn delete_image_accepts_no_content() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/images/900"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(&server);
        client.delete_image(900).await.unwrap();
    }
}
