//! REST client for the generation service.
//!
//! Wraps the two HTTP endpoints this crate talks to: job submission
//! (`POST /generate`) and the pull channel (`GET /status/{user}/{job}`),
//! using [`reqwest`].

use genbridge_core::types::JobId;
use reqwest::Url;
use serde::{Deserialize, Serialize};

/// HTTP client bound to one user on one generation service.
#[derive(Clone)]
pub struct GenerationApi {
    client: reqwest::Client,
    api_url: String,
    user_id: String,
}

#[derive(Debug, Serialize)]
struct SubmitRequest<'a> {
    #[serde(rename = "userId")]
    user_id: &'a str,
}

/// Response returned by `POST /generate`.
#[derive(Debug, Deserialize)]
pub struct SubmitResponse {
    /// Server-assigned job identifier.
    #[serde(rename = "requestId")]
    pub request_id: String,
}

/// Job status as reported by the pull channel.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum JobStatus {
    /// The image is ready at `result`.
    Completed {
        #[serde(default)]
        result: Option<String>,
    },
    /// The server gave up on the job.
    Error {
        #[serde(default)]
        error: Option<String>,
    },
    /// Still running; check again later.
    Processing,
}

/// Errors from the REST layer.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The HTTP request itself failed (network, DNS, TLS, timeout, body decode).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The service returned a non-2xx status code.
    #[error("Generation API error ({status}): {body}")]
    ApiError {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },

    /// The service answered 2xx with a body we cannot use.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// The configured base address cannot be turned into an endpoint URL.
    #[error("Invalid endpoint URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

/// Append `segments` to the path of `base`, percent-encoding each one.
///
/// Ids are opaque, so `?`, `#` and `/` inside a segment stay part of that
/// segment instead of changing the resource being addressed.
pub fn endpoint_url<'a>(
    base: &str,
    segments: impl IntoIterator<Item = &'a str>,
) -> Result<Url, url::ParseError> {
    let mut url = Url::parse(base)?;
    url.path_segments_mut()
        .map_err(|()| url::ParseError::RelativeUrlWithCannotBeABaseBase)?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

impl GenerationApi {
    /// Create an API client for `user_id` against `api_url`
    /// (e.g. `http://host:8000`).
    pub fn new(api_url: String, user_id: String) -> Self {
        Self::with_client(reqwest::Client::new(), api_url, user_id)
    }

    /// Create an API client reusing an existing [`reqwest::Client`].
    pub fn with_client(client: reqwest::Client, api_url: String, user_id: String) -> Self {
        Self {
            client,
            api_url,
            user_id,
        }
    }

    /// Ask the service to start a new generation job.
    ///
    /// Sends `POST /generate` with `{"userId": ...}` and returns the
    /// server-assigned job id.
    pub async fn submit(&self) -> Result<JobId, ApiError> {
        let response = self
            .client
            .post(endpoint_url(&self.api_url, ["generate"])?)
            .json(&SubmitRequest {
                user_id: &self.user_id,
            })
            .send()
            .await?;

        let body: SubmitResponse = Self::parse_response(response).await?;
        JobId::parse(body.request_id).map_err(|e| ApiError::InvalidResponse(e.to_string()))
    }

    /// Query the pull channel for the current status of a job.
    pub async fn fetch_status(&self, job_id: &JobId) -> Result<JobStatus, ApiError> {
        let response = self
            .client
            .get(endpoint_url(
                &self.api_url,
                ["status", self.user_id.as_str(), job_id.as_str()],
            )?)
            .send()
            .await?;

        Self::parse_response(response).await
    }

    // ---- private helpers ----

    /// Ensure the response has a success status code. Returns the
    /// response unchanged on success, or an [`ApiError::ApiError`]
    /// containing the status and body text on failure.
    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(ApiError::ApiError {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    /// Parse a successful JSON response body into the expected type.
    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ApiError> {
        let response = Self::ensure_success(response).await?;
        Ok(response.json::<T>().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> JobStatus {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn parse_completed_status() {
        assert_eq!(
            parse(r#"{"status":"completed","result":"http://x/y.png"}"#),
            JobStatus::Completed {
                result: Some("http://x/y.png".into())
            }
        );
    }

    #[test]
    fn parse_completed_without_result() {
        assert_eq!(
            parse(r#"{"status":"completed"}"#),
            JobStatus::Completed { result: None }
        );
    }

    #[test]
    fn parse_error_status() {
        assert_eq!(
            parse(r#"{"status":"error","error":"OOM"}"#),
            JobStatus::Error {
                error: Some("OOM".into())
            }
        );
    }

    #[test]
    fn parse_processing_ignores_extra_fields() {
        assert_eq!(
            parse(r#"{"status":"processing","progress":40}"#),
            JobStatus::Processing
        );
    }

    #[test]
    fn unknown_status_is_rejected() {
        assert!(serde_json::from_str::<JobStatus>(r#"{"status":"queued"}"#).is_err());
    }

    #[test]
    fn endpoint_url_encodes_reserved_characters() {
        let url = endpoint_url("http://host:8000", ["status", "u 1", "a?b/c#d"]).unwrap();
        assert_eq!(url.as_str(), "http://host:8000/status/u%201/a%3Fb%2Fc%23d");
        assert_eq!(url.query(), None);
        assert_eq!(url.fragment(), None);
    }

    #[test]
    fn endpoint_url_keeps_base_path() {
        let url = endpoint_url("http://host/api", ["generate"]).unwrap();
        assert_eq!(url.as_str(), "http://host/api/generate");
    }

    #[test]
    fn endpoint_url_rejects_garbage_base() {
        assert!(endpoint_url("not a url", ["generate"]).is_err());
    }

    #[test]
    fn submit_request_uses_camel_case() {
        let json = serde_json::to_value(SubmitRequest { user_id: "u1" }).unwrap();
        assert_eq!(json, serde_json::json!({ "userId": "u1" }));
    }
}
