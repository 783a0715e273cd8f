//! HTTP authority client.
//!
//! Used for the initial document fetch when a session opens, and as the
//! non-real-time save path when the channel is unavailable.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use syncline_channel::message::types::DocumentUpdatePayload;
use syncline_core::types::id::DocumentId;
use syncline_core::{AppError, AppResult};

/// A document as returned by the authority's HTTP API.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteDocument {
    /// Document ID.
    pub document_id: DocumentId,
    /// Authoritative content.
    pub content: String,
    /// When the authority last applied a change.
    pub updated_at: Option<DateTime<Utc>>,
}

/// Thin client over the authority's HTTP document API.
#[derive(Debug, Clone)]
pub struct AuthorityClient {
    http: reqwest::Client,
    base_url: String,
}

impl AuthorityClient {
    /// Create a client for the given base URL.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> AppResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::http(format!("failed to build HTTP client: {e}")))?;

        let base_url: String = base_url.into();
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Fetch the current authoritative document.
    pub async fn fetch_document(&self, document_id: DocumentId) -> AppResult<RemoteDocument> {
        let url = format!("{}/documents/{}", self.base_url, document_id);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| AppError::http(format!("document fetch failed: {e}")))?;

        if !response.status().is_success() {
            return Err(AppError::http(format!(
                "document fetch failed with status {}",
                response.status()
            )));
        }

        response
            .json::<RemoteDocument>()
            .await
            .map_err(|e| AppError::http(format!("invalid document response: {e}")))
    }

    /// Save a document update over HTTP (fallback path).
    pub async fn save_document(&self, payload: &DocumentUpdatePayload) -> AppResult<()> {
        let url = format!("{}/documents/{}", self.base_url, payload.document_id);
        let response = self
            .http
            .put(&url)
            .json(payload)
            .send()
            .await
            .map_err(|e| AppError::http(format!("fallback save failed: {e}")))?;

        if !response.status().is_success() {
            return Err(AppError::http(format!(
                "fallback save failed with status {}",
                response.status()
            )));
        }

        tracing::debug!(document_id = %payload.document_id, "document saved via HTTP fallback");
        Ok(())
    }
}
