//! slsctl
//!
//! Describe, tag, and poll the status of Alibaba Cloud Log Service projects.
//! The [`sls`] module holds the API client and project operations,
//! [`config`] the persisted CLI settings.

pub mod config;
pub mod sls;

pub use sls::client::{Endpoint, SlsClient};
pub use sls::error::SlsError;
pub use sls::tags::{TagDiff, Tags};
