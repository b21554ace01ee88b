//! Log Service (SLS) API interaction module
//!
//! This module provides the core functionality for talking to the Alibaba
//! Cloud Log Service project APIs: authentication, HTTP, retries, tag
//! diffing, and the project operations themselves.
//!
//! # Module Structure
//!
//! - [`auth`] - AccessKey credentials and ACS3-HMAC-SHA256 signing
//! - [`client`] - Main SLS client, endpoints and API actions
//! - [`error`] - Error type with retry and not-found classification
//! - [`http`] - HTTP utilities for REST API calls
//! - [`projects`] - Describe, tag and poll projects
//! - [`retry`] - Bounded retry loop with incremental waits
//! - [`tags`] - Tag set diffing
//!
//! # Example
//!
//! ```ignore
//! use slsctl::sls::{client::{Endpoint, SlsClient}, projects};
//!
//! async fn example() -> Result<(), slsctl::sls::error::SlsError> {
//!     let client = SlsClient::from_env("cn-hangzhou", Endpoint::Public)?;
//!     let project = projects::describe_project(&client, "my-project").await?;
//!     println!("{}", project["status"]);
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod client;
pub mod error;
pub mod http;
pub mod projects;
pub mod retry;
pub mod tags;
