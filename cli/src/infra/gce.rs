//! Compute Engine REST client: implements the `ComputeApi` port.

use std::time::Duration;

use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::application::ports::ComputeApi;
use crate::domain::{ComputeError, Disk, DiskSpec, Instance, InstanceDescriptor, Operation};

/// Production endpoint of the Compute API.
pub const DEFAULT_BASE_URL: &str = "https://compute.googleapis.com/compute/v1";

/// Default timeout for API requests.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Compute API client bound to one project and access token.
#[derive(Clone)]
pub struct GceClient {
    client: Client,
    base_url: String,
    project: String,
    access_token: String,
}

impl GceClient {
    /// Create a client for `project` against the production endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(
        project: impl Into<String>,
        access_token: impl Into<String>,
    ) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .user_agent(concat!("docker-cloud/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            base_url: DEFAULT_BASE_URL.to_string(),
            project: project.into(),
            access_token: access_token.into(),
        })
    }

    /// Point the client at another endpoint, e.g. a local mock server.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn zone_url(&self, zone: &str, path: &str) -> String {
        format!(
            "{}/projects/{}/zones/{zone}/{path}",
            self.base_url, self.project
        )
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ComputeError> {
        let response = request
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(classify_transport)?;
        let status = response.status();
        let text = response.text().await.map_err(classify_transport)?;

        if status.is_success() {
            serde_json::from_str(&text).map_err(|e| {
                warn!(error = %e, body = %text, "failed to parse response");
                ComputeError::Fatal(format!("unexpected response body: {e}"))
            })
        } else {
            Err(classify_status(status, &text))
        }
    }
}

/// Map an HTTP error status to the caller-facing classification.
#[must_use]
pub fn classify_status(status: StatusCode, body: &str) -> ComputeError {
    let message = format!("{}: {}", status.as_u16(), error_message(body));
    match status {
        StatusCode::NOT_FOUND => ComputeError::NotFound(message),
        StatusCode::REQUEST_TIMEOUT | StatusCode::TOO_MANY_REQUESTS => {
            ComputeError::Transient(message)
        }
        s if s.is_server_error() => ComputeError::Transient(message),
        _ => ComputeError::Fatal(message),
    }
}

fn classify_transport(err: reqwest::Error) -> ComputeError {
    if err.is_timeout() || err.is_connect() {
        ComputeError::Transient(err.to_string())
    } else {
        ComputeError::Fatal(err.to_string())
    }
}

/// `error.message` of a Google API error body, or the raw body.
fn error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(str::to_owned))
        .unwrap_or_else(|| body.trim().to_string())
}

impl ComputeApi for GceClient {
    fn project(&self) -> &str {
        &self.project
    }

    async fn get_instance(&self, zone: &str, name: &str) -> Result<Instance, ComputeError> {
        let url = self.zone_url(zone, &format!("instances/{name}"));
        debug!(url = %url, "GET instance");
        self.send(self.client.get(&url)).await
    }

    async fn get_disk(&self, zone: &str, name: &str) -> Result<Disk, ComputeError> {
        let url = self.zone_url(zone, &format!("disks/{name}"));
        debug!(url = %url, "GET disk");
        self.send(self.client.get(&url)).await
    }

    async fn insert_disk(&self, zone: &str, spec: &DiskSpec) -> Result<Operation, ComputeError> {
        let url = self.zone_url(zone, "disks");
        debug!(url = %url, image = %spec.source_image, "POST disk");
        self.send(
            self.client
                .post(&url)
                .query(&[("sourceImage", spec.source_image.as_str())])
                .json(spec),
        )
        .await
    }

    async fn insert_instance(
        &self,
        zone: &str,
        descriptor: &InstanceDescriptor,
    ) -> Result<Operation, ComputeError> {
        let url = self.zone_url(zone, "instances");
        debug!(url = %url, "POST instance");
        self.send(self.client.post(&url).json(descriptor)).await
    }

    async fn delete_instance(&self, zone: &str, name: &str) -> Result<Operation, ComputeError> {
        let url = self.zone_url(zone, &format!("instances/{name}"));
        debug!(url = %url, "DELETE instance");
        self.send(self.client.delete(&url)).await
    }

    async fn get_operation(&self, zone: &str, name: &str) -> Result<Operation, ComputeError> {
        let url = self.zone_url(zone, &format!("operations/{name}"));
        debug!(url = %url, "GET operation");
        self.send(self.client.get(&url)).await
    }
}
