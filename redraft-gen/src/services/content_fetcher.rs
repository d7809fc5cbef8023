//! Content-detail fetcher
//!
//! Resolves an item reference into the full source document through the
//! content-detail service: `GET {base_url}/detail?reference=…` with the
//! owner's credential in `X-Fetch-Credential`.

use async_trait::async_trait;
use redraft_common::config::FetcherConfig;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::models::StagedContent;

/// Header carrying the owner's platform credential
pub const CREDENTIAL_HEADER: &str = "X-Fetch-Credential";

/// Fetch errors
#[derive(Debug, Error)]
pub enum FetchError {
    /// Document deleted, private or never existed
    #[error("source not available: {0}")]
    NotAvailable(String),

    /// The service rejected the owner's credential
    #[error("fetch credential rejected (HTTP {0})")]
    CredentialExpired(u16),

    #[error("content fetch failed: {0}")]
    Transport(String),

    #[error("content detail response could not be parsed: {0}")]
    Parse(String),
}

/// Resolved source document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceContent {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl SourceContent {
    /// Fallback built from the payload captured at submission
    pub fn from_staged(staged: &StagedContent) -> Self {
        Self {
            title: staged.title.clone().unwrap_or_default(),
            body: staged.body.clone().unwrap_or_default(),
            tags: staged.tags.clone(),
        }
    }

    pub fn has_text(&self) -> bool {
        !self.title.trim().is_empty() || !self.body.trim().is_empty()
    }
}

/// Source of full document content
#[async_trait]
pub trait ContentFetcher: Send + Sync {
    async fn fetch_detail(&self, reference: &str, credential: &str) -> Result<SourceContent, FetchError>;
}

/// HTTP implementation against the content-detail service
pub struct HttpContentFetcher {
    http: reqwest::Client,
    base_url: String,
}

impl HttpContentFetcher {
    pub fn new(config: &FetcherConfig) -> Result<Self, FetchError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| FetchError::Transport(format!("HTTP client build failed: {}", e)))?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl ContentFetcher for HttpContentFetcher {
    async fn fetch_detail(&self, reference: &str, credential: &str) -> Result<SourceContent, FetchError> {
        let url = format!("{}/detail", self.base_url);
        debug!(reference = %reference, "Fetching content detail");

        let response = self
            .http
            .get(&url)
            .query(&[("reference", reference)])
            .header(CREDENTIAL_HEADER, credential)
            .send()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        match response.status() {
            status if status.is_success() => response
                .json::<SourceContent>()
                .await
                .map_err(|e| FetchError::Parse(e.to_string())),
            StatusCode::NOT_FOUND | StatusCode::GONE => {
                Err(FetchError::NotAvailable(reference.to_string()))
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                Err(FetchError::CredentialExpired(response.status().as_u16()))
            }
            status => Err(FetchError::Transport(format!("HTTP {}", status))),
        }
    }
}
