//! BOCH API module.
//!
//! Typed access to the remote watch service: the wire models, the reqwest
//! client, and the [`WatchApi`] trait the orchestrator consumes.

mod client;
mod models;

pub use client::*;
pub use models::*;

use std::future::Future;
use thiserror::Error;

/// API error types.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ApiError {
    #[error("missing watch name")]
    MissingWatchName,
    #[error("API returned {status}: {message}")]
    Status { status: u16, message: String },
    #[error("request timed out")]
    Timeout,
    #[error("network error: {0}")]
    Network(String),
    #[error("invalid response: {0}")]
    Decode(String),
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("background task failed: {0}")]
    Task(String),
}

/// Operations offered by the remote watch service.
pub trait WatchApi: Send + Sync + 'static {
    fn list_watches(&self) -> impl Future<Output = Result<Vec<Watch>, ApiError>> + Send;

    fn get_history(
        &self,
        watch_name: &str,
    ) -> impl Future<Output = Result<Vec<HistoryRecord>, ApiError>> + Send;

    fn get_history_summary(
        &self,
        watch_name: &str,
    ) -> impl Future<Output = Result<HistorySummary, ApiError>> + Send;

    fn create_watch(
        &self,
        request: &AddWatchRequest,
    ) -> impl Future<Output = Result<(), ApiError>> + Send;

    fn update_watch(
        &self,
        watch_name: &str,
        request: &UpdateWatchRequest,
    ) -> impl Future<Output = Result<(), ApiError>> + Send;

    fn delete_watch(&self, watch_name: &str) -> impl Future<Output = Result<(), ApiError>> + Send;
}
