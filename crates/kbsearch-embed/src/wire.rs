//! OpenAI-style `/embeddings` wire format, spoken by both Xinference and the
//! OpenAI-compatible endpoints.

use serde::{Deserialize, Serialize};

use kbsearch_core::http::{status_error, transport_error};
use kbsearch_core::{EmbeddingVector, Error, Result, Stage};

#[derive(Debug, Serialize)]
pub(crate) struct EmbeddingRequest<'a> {
    pub model: &'a str,
    pub input: [&'a str; 1],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encoding_format: Option<&'static str>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

/// POST `request` to `url` and return the single embedding it yields.
pub(crate) async fn post_embedding(
    client: &reqwest::Client,
    url: &str,
    bearer: Option<&str>,
    request: &EmbeddingRequest<'_>,
    expected_dim: usize,
) -> Result<EmbeddingVector> {
    let mut builder = client.post(url).json(request);
    if let Some(token) = bearer {
        builder = builder.bearer_auth(token);
    }
    let response = builder.send().await.map_err(|e| transport_error(Stage::Embed, &e))?;
    let status = response.status();
    let body = response.text().await.map_err(|e| transport_error(Stage::Embed, &e))?;
    if !status.is_success() {
        return Err(status_error(Stage::Embed, status, &body));
    }
    parse_embedding(&body, expected_dim)
}

pub(crate) fn parse_embedding(body: &str, expected_dim: usize) -> Result<EmbeddingVector> {
    let parsed: EmbeddingResponse =
        serde_json::from_str(body).map_err(|e| Error::ProviderError(format!("invalid embedding payload: {e}")))?;
    let vector = parsed
        .data
        .into_iter()
        .next()
        .map(|d| d.embedding)
        .ok_or_else(|| Error::ProviderError("embedding response contained no data".into()))?;
    if vector.len() != expected_dim {
        return Err(Error::ProviderError(format!(
            "provider returned {} dimensions, configured for {expected_dim}",
            vector.len()
        )));
    }
    if vector.iter().any(|x| !x.is_finite()) {
        return Err(Error::ProviderError("embedding contains non-finite values".into()));
    }
    Ok(vector)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_first_embedding() {
        let body = r#"{"object":"list","model":"bge-base-en-v1.5",
            "data":[{"index":0,"object":"embedding","embedding":[0.1,0.2,0.3]}]}"#;
        let v = parse_embedding(body, 3).expect("parse");
        assert_eq!(v, vec![0.1, 0.2, 0.3]);
    }

    #[test]
    fn wrong_length_is_a_provider_error() {
        let body = r#"{"data":[{"embedding":[0.1,0.2]}]}"#;
        assert!(matches!(parse_embedding(body, 3), Err(Error::ProviderError(_))));
    }

    #[test]
    fn empty_or_garbled_payloads_are_provider_errors() {
        assert!(matches!(parse_embedding(r#"{"data":[]}"#, 3), Err(Error::ProviderError(_))));
        assert!(matches!(parse_embedding("upstream timeout", 3), Err(Error::ProviderError(_))));
    }

    #[test]
    fn request_omits_unset_fields() {
        let req = EmbeddingRequest { model: "m", input: ["hi"], dimensions: None, encoding_format: None };
        let json = serde_json::to_string(&req).expect("serialize");
        assert_eq!(json, r#"{"model":"m","input":["hi"]}"#);
    }
}
