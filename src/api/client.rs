//! HTTP client for the BOCH API.

use super::models::*;
use super::{ApiError, WatchApi};

use reqwest::{Method, Url};
use serde::de::DeserializeOwned;
use std::time::Duration;

/// Client for the BOCH watch API behind RapidAPI.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: Url,
    host: String,
    api_key: String,
}

impl std::fmt::Debug for ApiClient {
    // The key stays out of debug output.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url.as_str())
            .field("host", &self.host)
            .finish_non_exhaustive()
    }
}

impl ApiClient {
    /// Create a client for the API at `base_url`.
    pub fn new(base_url: &str, host: &str, api_key: &str, timeout: Duration) -> Result<Self, ApiError> {
        let base_url = Url::parse(base_url).map_err(|e| ApiError::Config(e.to_string()))?;
        if base_url.cannot_be_a_base() {
            return Err(ApiError::Config(format!("not a base URL: {}", base_url)));
        }

        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::Network(e.to_string()))?;

        Ok(Self {
            http,
            base_url,
            host: host.to_string(),
            api_key: api_key.to_string(),
        })
    }

    pub fn has_api_key(&self) -> bool {
        !self.api_key.trim().is_empty()
    }

    /// Build the URL for the given path segments, percent-encoding each one.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ApiError::Config(format!("not a base URL: {}", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn send(
        &self,
        method: Method,
        segments: &[&str],
        body: Option<serde_json::Value>,
    ) -> Result<String, ApiError> {
        let url = self.endpoint(segments)?;
        tracing::debug!("BOCH request {} {}", method, url.path());

        let mut request = self
            .http
            .request(method, url)
            .header("X-RapidAPI-Key", &self.api_key)
            .header("X-RapidAPI-Host", &self.host);
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.send().await.map_err(map_reqwest_error)?;
        let status = response.status();

        if !status.is_success() {
            let message = response
                .text()
                .await
                .ok()
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| "Request failed".to_string());
            return Err(ApiError::Status {
                status: status.as_u16(),
                message,
            });
        }

        response.text().await.map_err(map_reqwest_error)
    }

    /// Send a request and decode the JSON body. An empty body decodes to `T::default()`.
    async fn fetch<T: DeserializeOwned + Default>(&self, segments: &[&str]) -> Result<T, ApiError> {
        let text = self.send(Method::GET, segments, None).await?;
        if text.trim().is_empty() {
            return Ok(T::default());
        }
        serde_json::from_str(&text).map_err(|e| ApiError::Decode(e.to_string()))
    }

    fn to_body<B: serde::Serialize>(body: &B) -> Result<serde_json::Value, ApiError> {
        serde_json::to_value(body).map_err(|e| ApiError::Decode(e.to_string()))
    }
}

impl WatchApi for ApiClient {
    async fn list_watches(&self) -> Result<Vec<Watch>, ApiError> {
        self.fetch(&["api", "watch"]).await
    }

    async fn get_history(&self, watch_name: &str) -> Result<Vec<HistoryRecord>, ApiError> {
        let name = encode_watch_name(watch_name)?;
        let response: HistoryResponse = self.fetch(&["api", "history", name]).await?;
        Ok(response.records)
    }

    async fn get_history_summary(&self, watch_name: &str) -> Result<HistorySummary, ApiError> {
        let name = encode_watch_name(watch_name)?;
        self.fetch(&["api", "history", name, "summary"]).await
    }

    async fn create_watch(&self, request: &AddWatchRequest) -> Result<(), ApiError> {
        encode_watch_name(&request.name)?;
        let body = Self::to_body(request)?;
        self.send(Method::POST, &["api", "watch"], Some(body)).await?;
        Ok(())
    }

    async fn update_watch(&self, watch_name: &str, request: &UpdateWatchRequest) -> Result<(), ApiError> {
        let name = encode_watch_name(watch_name)?;
        let body = Self::to_body(request)?;
        self.send(Method::PUT, &["api", "watch", name], Some(body)).await?;
        Ok(())
    }

    async fn delete_watch(&self, watch_name: &str) -> Result<(), ApiError> {
        let name = encode_watch_name(watch_name)?;
        // The remote API uses the plural collection for deletes.
        self.send(Method::DELETE, &["api", "watches", name], None).await?;
        Ok(())
    }
}

/// Trim a watch name for use as a path segment, rejecting blank names.
fn encode_watch_name(name: &str) -> Result<&str, ApiError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(ApiError::MissingWatchName);
    }
    Ok(trimmed)
}

fn map_reqwest_error(e: reqwest::Error) -> ApiError {
    if e.is_timeout() {
        ApiError::Timeout
    } else if e.is_decode() {
        ApiError::Decode(e.to_string())
    } else {
        ApiError::Network(e.to_string())
    }
}
