//! HTTP client abstraction
//!
//! The REST profile store talks to its endpoint through this trait so unit
//! tests can swap in a canned-response client instead of a live server.

use std::collections::HashMap;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;

/// Minimal response shape shared by real and mock clients
#[derive(Debug, Clone)]
pub struct SimpleHttpResponse {
    /// HTTP status code
    pub status: u16,
    /// Response body as text
    pub body: String,
    /// Response headers
    pub headers: HashMap<String, String>,
}

impl SimpleHttpResponse {
    /// Whether the status code is in the 2xx range
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Deserialize the body as JSON
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_str(&self.body).context("failed to parse response body as JSON")
    }
}

/// Transport seam for HTTP-backed stores
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Perform a GET request
    async fn get(&self, url: &str, headers: HashMap<String, String>)
        -> Result<SimpleHttpResponse>;

    /// Perform a POST request with a JSON body
    async fn post(
        &self,
        url: &str,
        headers: HashMap<String, String>,
        body: serde_json::Value,
    ) -> Result<SimpleHttpResponse>;
}

/// Production client backed by `reqwest`
pub struct ReqwestHttpClient {
    client: reqwest::Client,
}

impl ReqwestHttpClient {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    async fn into_simple(response: reqwest::Response) -> Result<SimpleHttpResponse> {
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.to_string(), v.to_string()))
            })
            .collect();
        let body = response
            .text()
            .await
            .context("failed to read response body")?;

        Ok(SimpleHttpResponse {
            status,
            body,
            headers,
        })
    }
}

impl Default for ReqwestHttpClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn get(
        &self,
        url: &str,
        headers: HashMap<String, String>,
    ) -> Result<SimpleHttpResponse> {
        let mut request = self.client.get(url);
        for (name, value) in headers {
            request = request.header(name, value);
        }

        let response = request.send().await.context("GET request failed")?;
        Self::into_simple(response).await
    }

    async fn post(
        &self,
        url: &str,
        headers: HashMap<String, String>,
        body: serde_json::Value,
    ) -> Result<SimpleHttpResponse> {
        let mut request = self.client.post(url).json(&body);
        for (name, value) in headers {
            request = request.header(name, value);
        }

        let response = request.send().await.context("POST request failed")?;
        Self::into_simple(response).await
    }
}
