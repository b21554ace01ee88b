//! HTTP utilities for SLS REST API calls

use super::error::SlsError;
use reqwest::{Client, Method};
use serde_json::Value;
use std::collections::BTreeMap;

/// Maximum length of response body to log (to avoid logging sensitive data)
const MAX_LOG_BODY_LENGTH: usize = 200;

/// Request id headers, in order of preference
const REQUEST_ID_HEADERS: &[&str] = &["x-log-requestid", "x-acs-request-id"];

/// Sanitize response body for logging
/// Truncates long responses and drops control characters
fn sanitize_for_log(body: &str) -> String {
    let truncated = if body.len() > MAX_LOG_BODY_LENGTH {
        let cut = (0..=MAX_LOG_BODY_LENGTH)
            .rev()
            .find(|i| body.is_char_boundary(*i))
            .unwrap_or(0);
        format!("{}... [truncated, {} bytes total]", &body[..cut], body.len())
    } else {
        body.to_string()
    };

    truncated.replace(|c: char| !c.is_ascii_graphic() && c != ' ', "")
}

/// Build an [`SlsError::Api`] from a failed response.
/// Understands both the SLS (`errorCode`) and POP (`Code`) error shapes.
fn api_error(status: u16, header_request_id: Option<String>, body: &str) -> SlsError {
    let parsed: Value = serde_json::from_str(body).unwrap_or(Value::Null);
    let field = |names: &[&str]| {
        names
            .iter()
            .find_map(|n| parsed.get(*n).and_then(|v| v.as_str()))
            .map(|s| s.to_string())
    };

    SlsError::Api {
        status,
        code: field(&["errorCode", "Code"]).unwrap_or_else(|| format!("HTTP{}", status)),
        message: field(&["errorMessage", "Message"]).unwrap_or_default(),
        request_id: header_request_id
            .or_else(|| field(&["RequestId", "requestId"]))
            .unwrap_or_else(|| "-".to_string()),
    }
}

/// HTTP client wrapper for SLS API calls
#[derive(Clone)]
pub struct SlsHttpClient {
    client: Client,
}

impl SlsHttpClient {
    /// Create a new HTTP client
    pub fn new() -> Result<Self, SlsError> {
        let client = Client::builder()
            .user_agent(concat!("slsctl/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { client })
    }

    /// Send a request and return the parsed JSON body.
    /// An empty success body is returned as [`Value::Null`].
    pub async fn send(
        &self,
        method: Method,
        url: &str,
        headers: &BTreeMap<String, String>,
        body: Option<Vec<u8>>,
    ) -> Result<Value, SlsError> {
        tracing::debug!("{} {}", method, url);

        let mut request = self.client.request(method, url);
        for (name, value) in headers {
            // reqwest derives Host from the URL
            if name == "host" {
                continue;
            }
            request = request.header(name.as_str(), value.as_str());
        }
        if let Some(body) = body {
            request = request.body(body);
        }

        let response = request.send().await?;

        let status = response.status();
        let request_id = REQUEST_ID_HEADERS.iter().find_map(|h| {
            response
                .headers()
                .get(*h)
                .and_then(|v| v.to_str().ok())
                .map(|s| s.to_string())
        });
        let response_body = response.text().await?;

        if !status.is_success() {
            // Security: Only log sanitized/truncated error body to avoid leaking sensitive data
            tracing::error!("API error: {} - {}", status, sanitize_for_log(&response_body));
            return Err(api_error(status.as_u16(), request_id, &response_body));
        }

        // Tag calls answer with an empty body
        if response_body.trim().is_empty() {
            return Ok(Value::Null);
        }

        Ok(serde_json::from_str(&response_body)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_sls_shape() {
        let err = api_error(
            404,
            Some("req-9".to_string()),
            r#"{"errorCode":"ProjectNotExist","errorMessage":"Project does not exist"}"#,
        );
        match err {
            SlsError::Api { status, code, message, request_id } => {
                assert_eq!(status, 404);
                assert_eq!(code, "ProjectNotExist");
                assert_eq!(message, "Project does not exist");
                assert_eq!(request_id, "req-9");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_api_error_pop_shape_and_garbage() {
        let err = api_error(503, None, r#"{"Code":"ServiceUnavailable","RequestId":"abc"}"#);
        assert_eq!(err.code(), Some("ServiceUnavailable"));
        assert!(err.to_string().contains("abc"));

        let err = api_error(502, None, "<html>bad gateway</html>");
        assert_eq!(err.code(), Some("HTTP502"));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_sanitize_for_log_truncates() {
        let long = "x".repeat(500);
        let out = sanitize_for_log(&long);
        assert!(out.contains("truncated, 500 bytes total"));
        assert_eq!(sanitize_for_log("a\nb"), "ab");
    }
}
