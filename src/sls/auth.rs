//! Alibaba Cloud Authentication
//!
//! Loads AccessKey credentials from the environment and signs requests with
//! the ACS3-HMAC-SHA256 scheme.

use super::error::SlsError;
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Signature algorithm name, also the Authorization header prefix
pub const SIGNATURE_ALGORITHM: &str = "ACS3-HMAC-SHA256";

const ACCESS_KEY_ID_VARS: &[&str] = &["ALIBABA_CLOUD_ACCESS_KEY_ID", "ALICLOUD_ACCESS_KEY"];
const ACCESS_KEY_SECRET_VARS: &[&str] = &["ALIBABA_CLOUD_ACCESS_KEY_SECRET", "ALICLOUD_SECRET_KEY"];
const SECURITY_TOKEN_VARS: &[&str] = &["ALIBABA_CLOUD_SECURITY_TOKEN", "ALICLOUD_SECURITY_TOKEN"];

type HmacSha256 = Hmac<Sha256>;

/// AccessKey credentials, optionally with an STS security token
#[derive(Clone)]
pub struct Credentials {
    pub access_key_id: String,
    access_key_secret: String,
    pub security_token: Option<String>,
}

// Keeps the secret out of logs
impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("security_token", &self.security_token.as_ref().map(|_| "***"))
            .finish()
    }
}

fn first_env(vars: &[&str]) -> Option<String> {
    vars.iter()
        .filter_map(|v| std::env::var(v).ok())
        .map(|v| v.trim().to_string())
        .find(|v| !v.is_empty())
}

impl Credentials {
    pub fn new(access_key_id: &str, access_key_secret: &str) -> Self {
        Self {
            access_key_id: access_key_id.to_string(),
            access_key_secret: access_key_secret.to_string(),
            security_token: None,
        }
    }

    pub fn with_security_token(mut self, token: &str) -> Self {
        self.security_token = Some(token.to_string());
        self
    }

    /// Read credentials from the standard Alibaba Cloud environment variables
    pub fn from_env() -> Result<Self, SlsError> {
        let access_key_id = first_env(ACCESS_KEY_ID_VARS).ok_or_else(|| {
            SlsError::Credentials(format!("set {}", ACCESS_KEY_ID_VARS.join(" or ")))
        })?;
        let access_key_secret = first_env(ACCESS_KEY_SECRET_VARS).ok_or_else(|| {
            SlsError::Credentials(format!("set {}", ACCESS_KEY_SECRET_VARS.join(" or ")))
        })?;

        let mut credentials = Self::new(&access_key_id, &access_key_secret);
        if let Some(token) = first_env(SECURITY_TOKEN_VARS) {
            tracing::debug!("Using STS security token from environment");
            credentials = credentials.with_security_token(&token);
        }
        Ok(credentials)
    }
}

/// The parts of a request covered by the signature
#[derive(Debug)]
pub struct SignableRequest<'a> {
    pub method: &'a str,
    pub path: &'a str,
    pub query: &'a BTreeMap<String, String>,
    /// Lowercase header names. Only `host`, `content-type` and `x-acs-*` are signed.
    pub headers: &'a BTreeMap<String, String>,
    pub body: &'a [u8],
}

/// Hex SHA-256 of the request payload, sent as `x-acs-content-sha256`
pub fn content_sha256(body: &[u8]) -> String {
    hex::encode(Sha256::digest(body))
}

/// RFC 3986 percent-encoding of each key and value, sorted by key
pub(crate) fn canonical_query(query: &BTreeMap<String, String>) -> String {
    query
        .iter()
        .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

fn is_signed_header(name: &str) -> bool {
    name == "host" || name == "content-type" || name.starts_with("x-acs-")
}

/// Build the Authorization header value for a request
pub fn authorization(
    credentials: &Credentials,
    request: &SignableRequest<'_>,
) -> Result<String, SlsError> {
    let signed: Vec<(&String, &String)> = request
        .headers
        .iter()
        .filter(|(name, _)| is_signed_header(name))
        .collect();

    let canonical_headers: String = signed
        .iter()
        .map(|(name, value)| format!("{}:{}\n", name, value.trim()))
        .collect();
    let signed_headers = signed
        .iter()
        .map(|(name, _)| name.as_str())
        .collect::<Vec<_>>()
        .join(";");

    let path = if request.path.is_empty() { "/" } else { request.path };
    let canonical_request = format!(
        "{}\n{}\n{}\n{}\n{}\n{}",
        request.method,
        path,
        canonical_query(request.query),
        canonical_headers,
        signed_headers,
        content_sha256(request.body),
    );

    let string_to_sign = format!(
        "{}\n{}",
        SIGNATURE_ALGORITHM,
        hex::encode(Sha256::digest(canonical_request.as_bytes()))
    );

    let mut mac = HmacSha256::new_from_slice(credentials.access_key_secret.as_bytes())
        .map_err(|e| SlsError::Credentials(format!("unusable AccessKey secret: {}", e)))?;
    mac.update(string_to_sign.as_bytes());
    let signature = hex::encode(mac.finalize().into_bytes());

    Ok(format!(
        "{} Credential={},SignedHeaders={},Signature={}",
        SIGNATURE_ALGORITHM, credentials.access_key_id, signed_headers, signature
    ))
}

/// Validate an SLS project name
/// Names are 3-63 characters of lowercase letters, digits and hyphens,
/// and must start and end with a letter or digit
pub fn validate_project_name(project: &str) -> bool {
    if project.len() < 3 || project.len() > 63 {
        return false;
    }

    let is_edge = |c: char| c.is_ascii_lowercase() || c.is_ascii_digit();
    match (project.chars().next(), project.chars().last()) {
        (Some(first), Some(last)) if is_edge(first) && is_edge(last) => {}
        _ => return false,
    }

    project
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers() -> BTreeMap<String, String> {
        [
            ("host", "demo.cn-hangzhou.log.aliyuncs.com"),
            ("x-acs-action", "GetProject"),
            ("x-acs-version", "2020-12-30"),
            ("x-acs-date", "2026-01-01T00:00:00Z"),
            ("x-acs-signature-nonce", "nonce-1"),
            ("user-agent", "slsctl"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
    }

    #[test]
    fn test_authorization_format() {
        let creds = Credentials::new("AKID", "secret");
        let query = BTreeMap::new();
        let headers = headers();
        let request = SignableRequest {
            method: "GET",
            path: "/",
            query: &query,
            headers: &headers,
            body: b"",
        };

        let auth = authorization(&creds, &request).unwrap();
        assert!(auth.starts_with("ACS3-HMAC-SHA256 Credential=AKID,"));
        assert!(auth.contains(
            "SignedHeaders=host;x-acs-action;x-acs-date;x-acs-signature-nonce;x-acs-version,"
        ));
        let signature = auth.rsplit("Signature=").next().unwrap();
        assert_eq!(signature.len(), 64);
    }

    #[test]
    fn test_signature_depends_on_secret_and_query() {
        let headers = headers();
        let empty = BTreeMap::new();
        let mut query = BTreeMap::new();
        query.insert("resourceType".to_string(), "PROJECT".to_string());

        let sign = |secret: &str, query: &BTreeMap<String, String>| {
            authorization(
                &Credentials::new("AKID", secret),
                &SignableRequest {
                    method: "GET",
                    path: "/tags",
                    query,
                    headers: &headers,
                    body: b"",
                },
            )
            .unwrap()
        };

        assert_eq!(sign("a", &empty), sign("a", &empty));
        assert_ne!(sign("a", &empty), sign("b", &empty));
        assert_ne!(sign("a", &empty), sign("a", &query));
    }

    #[test]
    fn test_content_sha256_of_empty_body() {
        assert_eq!(
            content_sha256(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_debug_hides_secret() {
        let creds = Credentials::new("AKID", "top-secret").with_security_token("sts");
        let shown = format!("{:?}", creds);
        assert!(!shown.contains("top-secret"));
        assert!(!shown.contains("sts\""));
    }

    #[test]
    fn test_validate_project_name() {
        assert!(validate_project_name("my-project-01"));
        assert!(validate_project_name("abc"));
        assert!(!validate_project_name("ab"));
        assert!(!validate_project_name("-abc"));
        assert!(!validate_project_name("abc-"));
        assert!(!validate_project_name("My-Project"));
        assert!(!validate_project_name("my_project"));
        assert!(!validate_project_name(&"a".repeat(64)));
    }
}
