//! Client of the leave-request workflow service.
//!
//! | Call | Response |
//! |---|---|
//! | `GET /api/leave-requests?status=APPROVED&balance_deducted=true` | `{"requests": [request]}` |
//! | `POST /api/leave-requests/statuses` with `{"ids": [...]}` | `{"statuses": {id: status}}` |

use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::Client;
use saldo_core::ledger::APPROVED_STATUS;
use saldo_core::reconciliation::{LeaveRequestRecord, LeaveRequestSource, SourceError};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::transport::{fetch_json, get_json, normalize_base};

#[derive(Debug, Deserialize)]
struct RequestsResponse {
    requests: Vec<LeaveRequestRecord>,
}

#[derive(Debug, Serialize)]
struct StatusesRequest<'a> {
    ids: &'a [String],
}

#[derive(Debug, Deserialize)]
struct StatusesResponse {
    statuses: HashMap<String, String>,
}

/// [`LeaveRequestSource`] backed by the workflow service's HTTP API.
#[derive(Debug, Clone)]
pub struct HttpLeaveRequestSource {
    client: Client,
    base_url: String,
}

impl HttpLeaveRequestSource {
    /// Creates a source calling `base_url` through `client`.
    #[must_use]
    pub fn new(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: normalize_base(base_url),
        }
    }

    /// Service base URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl LeaveRequestSource for HttpLeaveRequestSource {
    async fn approved_with_deduction(&self) -> Result<Vec<LeaveRequestRecord>, SourceError> {
        let url = format!("{}/api/leave-requests", self.base_url);
        let query = [
            ("status", APPROVED_STATUS.to_string()),
            ("balance_deducted", "true".to_string()),
        ];
        let body: RequestsResponse = get_json(&self.client, &url, &query).await?;
        // Only approved, deducted requests, whatever the service returned.
        Ok(body
            .requests
            .into_iter()
            .filter(|r| r.is_approved() && r.balance_deducted)
            .collect())
    }

    async fn statuses(&self, ids: &[String]) -> Result<HashMap<String, String>, SourceError> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let url = format!("{}/api/leave-requests/statuses", self.base_url);
        debug!(count = ids.len(), "Fetching leave-request statuses");
        let body: StatusesResponse =
            fetch_json(self.client.post(&url).json(&StatusesRequest { ids })).await?;
        Ok(body.statuses)
    }
}
