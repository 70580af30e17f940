//! Shared reqwest plumbing for the HTTP backends.

use std::time::Duration;

use reqwest::StatusCode;
use serde::Deserialize;

use crate::error::{Error, Result, Stage};

/// Build a pooled client. One client is created per backend at startup and
/// shared by every request.
pub fn client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .connect_timeout(timeout.min(Duration::from_secs(5)))
        .pool_max_idle_per_host(16)
        .build()
        .map_err(|e| Error::Configuration(format!("failed to build HTTP client: {e}")))
}

/// Classify a transport-level failure for `stage`.
pub fn transport_error(stage: Stage, err: &reqwest::Error) -> Error {
    if err.is_decode() {
        stage.malformed(format!("undecodable response: {err}"))
    } else {
        stage.unavailable(err.to_string())
    }
}

/// Classify a non-success HTTP status for `stage`. Server-side failures and
/// throttling count as unavailability, everything else as a bad response.
pub fn status_error(stage: Stage, status: StatusCode, body: &str) -> Error {
    let msg = format!("HTTP {status}: {}", body.chars().take(200).collect::<String>());
    if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS || status == StatusCode::NOT_FOUND {
        stage.unavailable(msg)
    } else {
        stage.malformed(msg)
    }
}

#[derive(Debug, Deserialize)]
struct ModelList {
    #[serde(default)]
    data: Vec<ModelEntry>,
}

#[derive(Debug, Deserialize)]
struct ModelEntry {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    model_name: Option<String>,
}

/// Whether an OpenAI-style `/v1/models` listing names `model`, by id or by
/// `model_name` (Xinference reports both).
pub fn listing_contains(body: &str, model: &str) -> bool {
    serde_json::from_str::<ModelList>(body)
        .map(|list| {
            list.data
                .iter()
                .any(|m| m.id.as_deref() == Some(model) || m.model_name.as_deref() == Some(model))
        })
        .unwrap_or(false)
}

/// Probe `{base_url}/v1/models` for `model`. Any failure reads as unhealthy.
pub async fn model_is_served(client: &reqwest::Client, base_url: &str, model: &str, timeout: Duration) -> bool {
    let url = format!("{base_url}/v1/models");
    let Ok(resp) = client.get(&url).timeout(timeout).send().await else {
        return false;
    };
    if !resp.status().is_success() {
        return false;
    }
    match resp.text().await {
        Ok(body) => listing_contains(&body, model),
        Err(_) => false,
    }
}
