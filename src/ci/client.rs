//! CI HTTP client
//!
//! This module handles all HTTP requests against CI servers, including:
//! - Building HTTP clients with the configured user agent and timeouts
//! - Folder listings (`GET {folder}/api/json?tree=...`)
//! - Build triggers (`POST {job}/build` or `{job}/buildWithParameters`)
//! - Fixed-delay retry for transient failures
//! - Error classification

use crate::ci::types::{CiItem, CiServer, FolderListing};
use crate::config::{DiscoveryConfig, UserAgentConfig};
use crate::url::{api_json_url, trigger_url, TriggerEndpoint};
use crate::{DiscoveryError, RequestFailure, Result};
use reqwest::{Client, RequestBuilder, Response};
use std::collections::BTreeMap;
use std::time::Duration;

/// Builds an HTTP client with proper configuration
///
/// # Example
///
/// ```no_run
/// use atlas_discovery::ci::build_http_client;
/// use atlas_discovery::config::{DiscoveryConfig, UserAgentConfig};
///
/// let client = build_http_client(&UserAgentConfig::default(), &DiscoveryConfig::default()).unwrap();
/// ```
pub fn build_http_client(
    user_agent: &UserAgentConfig,
    discovery: &DiscoveryConfig,
) -> std::result::Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(format!("{}/{}", user_agent.name, user_agent.version))
        .timeout(Duration::from_secs(discovery.request_timeout_secs))
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Client for the discovery and trigger endpoints of a CI server
#[derive(Debug, Clone)]
pub struct CiClient {
    http: Client,
    tree_projection: String,
    max_attempts: u32,
    retry_delay: Duration,
}

impl CiClient {
    /// Creates a client from the discovery and user agent settings
    pub fn new(discovery: &DiscoveryConfig, user_agent: &UserAgentConfig) -> Result<Self> {
        let http = build_http_client(user_agent, discovery)?;
        Ok(Self::with_http_client(http, discovery))
    }

    /// Creates a client around an existing `reqwest::Client`
    pub fn with_http_client(http: Client, discovery: &DiscoveryConfig) -> Self {
        Self {
            http,
            tree_projection: discovery.tree_projection.clone(),
            max_attempts: discovery.max_attempts.max(1),
            retry_delay: Duration::from_millis(discovery.retry_delay_ms),
        }
    }

    /// Field projection sent with every folder listing
    pub fn tree_projection(&self) -> &str {
        &self.tree_projection
    }

    /// Lists the immediate children of a folder
    ///
    /// With `folder_url = None` the server's root is listed. The credential is
    /// checked before any request is made.
    ///
    /// # Errors
    ///
    /// * `MissingCredential` - the server has no usable credential
    /// * `CiRequest` - transport error or non-2xx status after all attempts
    /// * `CiResponse` - the body is not a JSON folder listing
    pub async fn list_children(
        &self,
        server: &CiServer,
        folder_url: Option<&str>,
    ) -> Result<Vec<CiItem>> {
        let credential = server.require_credential()?;
        let url = api_json_url(folder_url.unwrap_or(&server.url))?;

        tracing::debug!("Listing {} on {}", url, server.name);

        let response = self
            .send_with_retry(server, &url, || {
                self.http
                    .get(&url)
                    .query(&[("tree", self.tree_projection.as_str())])
                    .basic_auth(&credential.username, Some(&credential.secret))
            })
            .await?;

        let body = read_body(server, &url, response).await?;
        let listing: FolderListing =
            serde_json::from_str(&body).map_err(|e| DiscoveryError::CiResponse {
                server: server.name.clone(),
                url: url.clone(),
                message: format!("invalid folder listing: {}", e),
            })?;

        Ok(listing.jobs.unwrap_or_default())
    }

    /// Starts a build of the job at `job_url`
    ///
    /// Parameters are sent form-encoded. Returns the JSON body if the server
    /// sent one; trigger endpoints usually answer `201 Created` with no body.
    pub async fn trigger_build(
        &self,
        server: &CiServer,
        job_url: &str,
        parameters: &BTreeMap<String, String>,
    ) -> Result<Option<serde_json::Value>> {
        let credential = server.require_credential()?;
        let endpoint = TriggerEndpoint::for_parameter_count(parameters.len());
        let url = trigger_url(job_url, endpoint)?;

        tracing::info!("Triggering {} on {}", url, server.name);

        let response = self
            .send_with_retry(server, &url, || {
                self.http
                    .post(&url)
                    .form(parameters)
                    .basic_auth(&credential.username, Some(&credential.secret))
            })
            .await?;

        let body = read_body(server, &url, response).await?;
        if body.trim().is_empty() {
            return Ok(None);
        }

        match serde_json::from_str(&body) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                tracing::debug!("Ignoring non-JSON trigger response from {}: {}", url, e);
                Ok(None)
            }
        }
    }

    /// Sends a request, repeating it on transient failures
    ///
    /// # Retry Logic
    ///
    /// | Condition | Action |
    /// |-----------|--------|
    /// | 2xx | Return response |
    /// | HTTP 5xx, 429 | Retry after fixed delay |
    /// | Connect error, timeout | Retry after fixed delay |
    /// | Other status | Fail immediately |
    async fn send_with_retry<F>(&self, server: &CiServer, url: &str, build: F) -> Result<Response>
    where
        F: Fn() -> RequestBuilder,
    {
        let mut attempt = 1;
        loop {
            let failure = match build().send().await {
                Ok(response) if response.status().is_success() => return Ok(response),
                Ok(response) => RequestFailure::Status {
                    status: response.status().as_u16(),
                },
                Err(e) => RequestFailure::Transport(e),
            };

            if !failure.is_transient() || attempt >= self.max_attempts {
                return Err(DiscoveryError::CiRequest {
                    server: server.name.clone(),
                    url: url.to_string(),
                    source: failure,
                });
            }

            tracing::warn!(
                "Request to {} failed ({}), retrying in {:?} ({}/{})",
                url,
                failure,
                self.retry_delay,
                attempt,
                self.max_attempts
            );
            tokio::time::sleep(self.retry_delay).await;
            attempt += 1;
        }
    }
}

async fn read_body(server: &CiServer, url: &str, response: Response) -> Result<String> {
    response
        .text()
        .await
        .map_err(|e| DiscoveryError::CiRequest {
            server: server.name.clone(),
            url: url.to_string(),
            source: RequestFailure::Transport(e),
        })
}
