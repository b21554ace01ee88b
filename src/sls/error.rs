//! SLS error type
//!
//! Classifies failures from the Log Service API into transient errors that
//! are worth retrying, the distinguished not-found case, and everything else.

use std::time::Duration;
use thiserror::Error;

/// Error code returned when the addressed project does not exist
pub const PROJECT_NOT_EXIST: &str = "ProjectNotExist";

/// Error codes that always indicate a transient condition
const RETRYABLE_CODES: &[&str] = &["ServiceUnavailable", "Rejected.Throttling"];

#[derive(Debug, Error)]
pub enum SlsError {
    /// The service answered with a non-success status
    #[error("{code}: {message} (status {status}, request id {request_id})")]
    Api {
        status: u16,
        code: String,
        message: String,
        request_id: String,
    },

    /// The request never produced a response
    #[error("failed to send request: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("failed to parse response JSON: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("missing credentials: {0}")]
    Credentials(String),

    #[error("invalid endpoint: {0}")]
    Endpoint(String),

    #[error("The specified {resource} {id} is not found.")]
    NotFound { resource: String, id: String },

    /// Any other failure, wrapped with the resource id and the API path
    #[error("Resource {id} {action} Failed!!! {source}")]
    Operation {
        id: String,
        action: String,
        #[source]
        source: Box<SlsError>,
    },

    /// The retry deadline passed while the last attempt was still failing
    #[error("timeout after {elapsed:?}, last error: {last}")]
    Timeout {
        elapsed: Duration,
        #[source]
        last: Box<SlsError>,
    },

    #[error("Failed to reach target status. Current status is {0}.")]
    FailedToReachTargetStatus(String),
}

impl SlsError {
    pub fn not_found(resource: &str, id: &str) -> Self {
        Self::NotFound {
            resource: resource.to_string(),
            id: id.to_string(),
        }
    }

    /// Wrap an error with the resource id and API path it came from
    pub fn operation(self, id: &str, action: &str) -> Self {
        Self::Operation {
            id: id.to_string(),
            action: action.to_string(),
            source: Box::new(self),
        }
    }

    /// The remote error code, if the service returned one
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Api { code, .. } => Some(code),
            Self::Operation { source, .. } => source.code(),
            Self::Timeout { last, .. } => last.code(),
            _ => None,
        }
    }

    /// True if the remote error code is one of `codes`
    pub fn is_expected(&self, codes: &[&str]) -> bool {
        self.code().is_some_and(|code| codes.contains(&code))
    }

    /// True for throttling, service unavailability, server-side 5xx and
    /// requests that failed before a response arrived
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_connect() || e.is_timeout() || e.is_request(),
            Self::Api { status, code, .. } => {
                RETRYABLE_CODES.contains(&code.as_str())
                    || code.starts_with("Throttling")
                    || (500..600).contains(status)
            }
            _ => false,
        }
    }

    pub fn is_not_found(&self) -> bool {
        match self {
            Self::NotFound { .. } => true,
            Self::Operation { source, .. } => source.is_not_found(),
            Self::Timeout { last, .. } => last.is_not_found(),
            _ => false,
        }
    }
}

/// Format an SLS error for display
/// Security: avoids echoing raw API messages, which may carry account details
pub fn format_sls_error(error: &SlsError) -> String {
    if error.is_not_found() {
        return error.to_string();
    }
    if let SlsError::Timeout { .. } = error {
        return "Timed out waiting for the Log Service. Please try again.".to_string();
    }
    if let SlsError::Credentials(_) = error {
        return error.to_string();
    }

    let status = match error {
        SlsError::Api { status, .. } => Some(*status),
        SlsError::Operation { source, .. } => match source.as_ref() {
            SlsError::Api { status, .. } => Some(*status),
            _ => None,
        },
        _ => None,
    };

    match (status, error.code()) {
        (_, Some(code)) if code.starts_with("Throttling") || code == "Rejected.Throttling" => {
            "Rate limit exceeded. Please try again later.".to_string()
        }
        (Some(401), _) | (_, Some("Unauthorized")) | (_, Some("SignatureNotMatch")) => {
            "Authentication failed. Check your AccessKey ID and secret.".to_string()
        }
        (Some(403), _) => "Permission denied. Check your RAM policy.".to_string(),
        (Some(400), _) => "Invalid request. Check your parameters.".to_string(),
        (Some(s), _) if s >= 500 => {
            "Log Service temporarily unavailable. Please try again.".to_string()
        }
        _ => {
            let text = error.to_string();
            let sanitized = text
                .chars()
                .filter(|c| c.is_ascii_graphic() || *c == ' ')
                .take(80)
                .collect::<String>();
            if sanitized.len() < text.len() {
                format!("{}...", sanitized)
            } else {
                sanitized
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api(status: u16, code: &str) -> SlsError {
        SlsError::Api {
            status,
            code: code.to_string(),
            message: "boom".to_string(),
            request_id: "req-1".to_string(),
        }
    }

    #[test]
    fn test_retryable_codes() {
        assert!(api(503, "ServiceUnavailable").is_retryable());
        assert!(api(400, "Rejected.Throttling").is_retryable());
        assert!(api(403, "Throttling.User").is_retryable());
        assert!(api(500, "InternalServerError").is_retryable());
        assert!(!api(404, PROJECT_NOT_EXIST).is_retryable());
        assert!(!api(400, "ParameterInvalid").is_retryable());
    }

    #[test]
    fn test_not_found_seen_through_wrappers() {
        let err = SlsError::not_found("Project", "demo").operation("demo", "/");
        assert!(err.is_not_found());
        assert_eq!(
            SlsError::not_found("Project", "demo").to_string(),
            "The specified Project demo is not found."
        );
    }

    #[test]
    fn test_expected_code_through_operation() {
        let err = api(404, PROJECT_NOT_EXIST).operation("demo", "/tags");
        assert!(err.is_expected(&[PROJECT_NOT_EXIST]));
        assert!(!err.is_expected(&["Other"]));
        assert!(!err.is_not_found());
    }

    #[test]
    fn test_format_sls_error() {
        assert_eq!(
            format_sls_error(&api(403, "Unauthorized").operation("demo", "/")),
            "Authentication failed. Check your AccessKey ID and secret."
        );
        assert_eq!(
            format_sls_error(&api(429, "Throttling")),
            "Rate limit exceeded. Please try again later."
        );
        assert_eq!(
            format_sls_error(&api(502, "BadGateway")),
            "Log Service temporarily unavailable. Please try again."
        );
    }
}
