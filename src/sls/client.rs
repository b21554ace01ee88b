//! SLS Client
//!
//! Main client for the Log Service API, combining credentials, endpoint
//! resolution, request signing and HTTP.

use super::auth::{self, Credentials, SignableRequest};
use super::error::SlsError;
use super::http::SlsHttpClient;
use super::retry::RetryPolicy;
use reqwest::Method;
use serde_json::Value;
use std::collections::BTreeMap;
use url::Url;

/// API version for every project operation
pub const API_VERSION: &str = "2020-12-30";

/// Default region when none is configured
pub const DEFAULT_REGION: &str = "cn-hangzhou";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

impl HttpMethod {
    fn as_method(self) -> Method {
        match self {
            HttpMethod::Get => Method::GET,
            HttpMethod::Post => Method::POST,
        }
    }
}

/// A named ROA-style API action: name, verb, version and path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApiAction {
    pub name: &'static str,
    pub method: HttpMethod,
    pub version: &'static str,
    pub path: &'static str,
}

impl ApiAction {
    pub const fn roa(name: &'static str, method: HttpMethod, path: &'static str) -> Self {
        Self {
            name,
            method,
            version: API_VERSION,
            path,
        }
    }
}

pub const GET_PROJECT: ApiAction = ApiAction::roa("GetProject", HttpMethod::Get, "/");
pub const LIST_TAG_RESOURCES: ApiAction =
    ApiAction::roa("ListTagResources", HttpMethod::Get, "/tags");
pub const TAG_RESOURCES: ApiAction = ApiAction::roa("TagResources", HttpMethod::Post, "/tag");
pub const UNTAG_RESOURCES: ApiAction = ApiAction::roa("UntagResources", HttpMethod::Post, "/untag");

/// Query string and JSON body of a single call
#[derive(Debug, Clone, Default)]
pub struct ApiRequest {
    pub query: BTreeMap<String, String>,
    pub body: Option<Value>,
}

impl ApiRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_query(mut self, key: &str, value: &str) -> Self {
        self.query.insert(key.to_string(), value.to_string());
        self
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }
}

/// Where requests are sent
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// `https://{project}.{region}.log.aliyuncs.com`
    Public,
    /// `https://{project}.{region}-intranet.log.aliyuncs.com`
    Intranet,
    /// Base URL template. `{project}` and `{region}` are substituted when present.
    Custom(String),
}

impl Endpoint {
    /// Parse `public`, `intranet`, or a URL template
    pub fn parse(value: &str) -> Result<Self, SlsError> {
        match value.trim() {
            "" | "public" => Ok(Endpoint::Public),
            "intranet" => Ok(Endpoint::Intranet),
            custom => {
                let sample = custom
                    .replace("{project}", "project")
                    .replace("{region}", DEFAULT_REGION);
                Url::parse(&sample).map_err(|e| SlsError::Endpoint(format!("{}: {}", custom, e)))?;
                Ok(Endpoint::Custom(custom.to_string()))
            }
        }
    }

    /// Base URL for a project in a region
    pub fn base_url(&self, project: &str, region: &str) -> Result<Url, SlsError> {
        let raw = match self {
            Endpoint::Public => format!("https://{}.{}.log.aliyuncs.com", project, region),
            Endpoint::Intranet => {
                format!("https://{}.{}-intranet.log.aliyuncs.com", project, region)
            }
            Endpoint::Custom(template) => template
                .replace("{project}", project)
                .replace("{region}", region),
        };
        Url::parse(&raw).map_err(|e| SlsError::Endpoint(format!("{}: {}", raw, e)))
    }
}

/// Main SLS client
#[derive(Clone)]
pub struct SlsClient {
    pub credentials: Credentials,
    pub http: SlsHttpClient,
    pub region: String,
    pub endpoint: Endpoint,
    pub retry: RetryPolicy,
}

impl SlsClient {
    /// Create a new SLS client
    pub fn new(credentials: Credentials, region: &str, endpoint: Endpoint) -> Result<Self, SlsError> {
        let http = SlsHttpClient::new()?;

        Ok(Self {
            credentials,
            http,
            region: region.to_string(),
            endpoint,
            retry: RetryPolicy::default(),
        })
    }

    /// Create a client with credentials from the environment
    pub fn from_env(region: &str, endpoint: Endpoint) -> Result<Self, SlsError> {
        Self::new(Credentials::from_env()?, region, endpoint)
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Build the full URL of an action for a project
    pub fn action_url(
        &self,
        project: &str,
        action: ApiAction,
        query: &BTreeMap<String, String>,
    ) -> Result<Url, SlsError> {
        let mut url = self.endpoint.base_url(project, &self.region)?;
        let base_path = url.path().trim_end_matches('/').to_string();
        url.set_path(&format!("{}{}", base_path, action.path));

        if query.is_empty() {
            url.set_query(None);
        } else {
            // Same encoding as the signed canonical query
            url.set_query(Some(&auth::canonical_query(query)));
        }
        Ok(url)
    }

    /// Sign and send one call. No retries happen here.
    pub async fn execute(
        &self,
        project: &str,
        action: ApiAction,
        request: &ApiRequest,
    ) -> Result<Value, SlsError> {
        let url = self.action_url(project, action, &request.query)?;
        let host = match (url.host_str(), url.port()) {
            (Some(host), Some(port)) => format!("{}:{}", host, port),
            (Some(host), None) => host.to_string(),
            (None, _) => return Err(SlsError::Endpoint(format!("no host in {}", url))),
        };

        let body = match &request.body {
            Some(body) => serde_json::to_vec(body)?,
            None => Vec::new(),
        };

        let mut headers = BTreeMap::new();
        headers.insert("host".to_string(), host);
        headers.insert("x-acs-action".to_string(), action.name.to_string());
        headers.insert("x-acs-version".to_string(), action.version.to_string());
        headers.insert(
            "x-acs-date".to_string(),
            chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string(),
        );
        headers.insert(
            "x-acs-signature-nonce".to_string(),
            uuid::Uuid::new_v4().to_string(),
        );
        headers.insert("x-acs-content-sha256".to_string(), auth::content_sha256(&body));
        if request.body.is_some() {
            headers.insert("content-type".to_string(), "application/json".to_string());
        }
        if let Some(token) = &self.credentials.security_token {
            headers.insert("x-acs-security-token".to_string(), token.clone());
        }

        let authorization = auth::authorization(
            &self.credentials,
            &SignableRequest {
                method: action.method.as_method().as_str(),
                path: url.path(),
                query: &request.query,
                headers: &headers,
                body: &body,
            },
        )?;
        headers.insert("authorization".to_string(), authorization);

        tracing::debug!("{} project={} action={}", action.name, project, action.path);

        let body = request.body.as_ref().map(|_| body);
        self.http
            .send(action.method.as_method(), url.as_str(), &headers, body)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(endpoint: Endpoint) -> SlsClient {
        SlsClient::new(Credentials::new("AKID", "secret"), "cn-shanghai", endpoint).unwrap()
    }

    #[test]
    fn test_public_endpoint_url() {
        let url = client(Endpoint::Public)
            .action_url("demo", GET_PROJECT, &BTreeMap::new())
            .unwrap();
        assert_eq!(url.as_str(), "https://demo.cn-shanghai.log.aliyuncs.com/");
    }

    #[test]
    fn test_intranet_endpoint_url_with_query() {
        let mut query = BTreeMap::new();
        query.insert("resourceType".to_string(), "PROJECT".to_string());
        query.insert("resourceId".to_string(), r#"["demo"]"#.to_string());
        let url = client(Endpoint::Intranet)
            .action_url("demo", LIST_TAG_RESOURCES, &query)
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://demo.cn-shanghai-intranet.log.aliyuncs.com/tags?resourceId=%5B%22demo%22%5D&resourceType=PROJECT"
        );
    }

    #[test]
    fn test_custom_endpoint_keeps_base_path() {
        let endpoint = Endpoint::parse("http://127.0.0.1:8080/{project}/").unwrap();
        let url = client(endpoint)
            .action_url("demo", TAG_RESOURCES, &BTreeMap::new())
            .unwrap();
        assert_eq!(url.as_str(), "http://127.0.0.1:8080/demo/tag");
    }

    #[test]
    fn test_endpoint_parse() {
        assert_eq!(Endpoint::parse("").unwrap(), Endpoint::Public);
        assert_eq!(Endpoint::parse("intranet").unwrap(), Endpoint::Intranet);
        assert!(Endpoint::parse("not a url").is_err());
    }

    #[test]
    fn test_actions_share_api_version() {
        for action in [GET_PROJECT, LIST_TAG_RESOURCES, TAG_RESOURCES, UNTAG_RESOURCES] {
            assert_eq!(action.version, "2020-12-30");
        }
        assert_eq!(UNTAG_RESOURCES.method, HttpMethod::Post);
    }
}
