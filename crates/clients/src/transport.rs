//! Request helpers and failure classification shared by both clients.

use reqwest::{Client, RequestBuilder};
use saldo_core::accrual::DirectoryError;
use saldo_core::reconciliation::SourceError;
use serde::de::DeserializeOwned;
use tracing::debug;

/// Why a call failed, before it is named after its service.
#[derive(Debug)]
pub(crate) enum Failure {
    Timeout,
    Status(u16),
    Transport(String),
    Decode(String),
}

impl From<reqwest::Error> for Failure {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if let Some(status) = err.status() {
            Self::Status(status.as_u16())
        } else if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}

impl From<Failure> for DirectoryError {
    fn from(failure: Failure) -> Self {
        match failure {
            Failure::Timeout => Self::Timeout,
            Failure::Status(code) => Self::Status(code),
            Failure::Transport(msg) => Self::Transport(msg),
            Failure::Decode(msg) => Self::Decode(msg),
        }
    }
}

impl From<Failure> for SourceError {
    fn from(failure: Failure) -> Self {
        match failure {
            Failure::Timeout => Self::Timeout,
            Failure::Status(code) => Self::Status(code),
            Failure::Transport(msg) => Self::Transport(msg),
            Failure::Decode(msg) => Self::Decode(msg),
        }
    }
}

/// Base URL without trailing slashes.
pub(crate) fn normalize_base(base_url: &str) -> String {
    base_url.trim_end_matches('/').to_string()
}

/// Sends `request` and decodes a JSON body; non-2xx statuses are failures.
pub(crate) async fn fetch_json<T: DeserializeOwned>(request: RequestBuilder) -> Result<T, Failure> {
    let response = request.send().await?.error_for_status()?;
    debug!(url = %response.url(), status = response.status().as_u16(), "Service responded");
    Ok(response.json().await?)
}

/// `GET {url}` with query parameters.
pub(crate) async fn get_json<T: DeserializeOwned>(
    client: &Client,
    url: &str,
    query: &[(&str, String)],
) -> Result<T, Failure> {
    fetch_json(client.get(url).query(query)).await
}
