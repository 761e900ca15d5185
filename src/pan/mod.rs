//! # Netdisk Integration Module
//!
//! HTTP layer between bdfs and the Baidu Netdisk open platform. Every remote
//! call the tool makes lives here; nothing above this module builds URLs or
//! parses raw bodies.
//!
//! ## Layout
//!
//! ```text
//! Application Layer (CLI, Management)
//!          ↓
//! Netdisk Integration Layer
//!     ├── auth    device code, token polling, refresh      (AuthApi)
//!     ├── files   list, metas, mkdir, batch ops, quota, download (FileApi)
//!     └── upload  precreate, superfile2 slices, create      (UploadApi)
//!          ↓
//! HTTP Layer (reqwest, JSON)
//! ```
//!
//! The three traits are the seams the management layer is written against;
//! [`PanClient`] implements all of them over HTTPS, tests implement them in
//! memory.
//!
//! ## Timeouts
//!
//! [`PanClient`] owns two `reqwest::Client`s. Metadata calls use the short
//! `api_timeout`, slice uploads and downloads use `transfer_timeout`.
//!
//! ## Errors
//!
//! Non-2xx statuses become [`PanError::Http`], unparsable bodies become
//! [`PanError::Json`]. Non-zero `errno` values are reported by the raw response
//! types so callers can tell protocol and integrity failures apart.

pub mod auth;
pub mod files;
pub mod upload;

pub use auth::{AuthApi, TokenPoll};
pub use files::{FileApi, ListQuery, list_dir};
pub use upload::{CreateRequest, OverwritePolicy, PrecreateRequest, UploadApi};

use std::borrow::Cow;

use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use tracing::trace;

use crate::{Res, config::Config, config::Endpoints, error::PanError};

/// The service requires this agent on quota and download links.
const USER_AGENT: &str = "pan.baidu.com";

pub struct PanClient {
    api: Client,
    transfer: Client,
    client_id: String,
    client_secret: String,
    endpoints: Endpoints,
}

impl PanClient {
    pub fn new(config: &Config) -> Res<Self> {
        let api = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(config.api_timeout)
            .build()?;
        let transfer = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(config.transfer_timeout)
            .build()?;

        Ok(Self {
            api,
            transfer,
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            endpoints: config.endpoints.clone(),
        })
    }

    fn xpan_file_url(&self) -> String {
        format!("{}/rest/2.0/xpan/file", self.endpoints.api_url)
    }
}

/// Endpoints whose bodies carry device codes or tokens.
const CREDENTIAL_ENDPOINTS: [&str; 3] = ["device code", "device token", "token refresh"];

/// Body as it may appear in logs; credential responses show only their size.
fn loggable_body<'a>(endpoint: &str, body: &'a str) -> Cow<'a, str> {
    if CREDENTIAL_ENDPOINTS.contains(&endpoint) {
        Cow::Owned(format!("<redacted, {} bytes>", body.len()))
    } else {
        Cow::Borrowed(body)
    }
}

/// Reads a JSON body, turning non-success statuses into [`PanError::Http`].
async fn read_json<T: DeserializeOwned>(endpoint: &'static str, response: Response) -> Res<T> {
    let status = response.status();
    let body = response.text().await?;
    trace!(
        endpoint,
        status = status.as_u16(),
        body = %loggable_body(endpoint, &body),
        "response"
    );

    if !status.is_success() {
        return Err(PanError::Http {
            endpoint,
            status: status.as_u16(),
            body,
        });
    }

    Ok(serde_json::from_str(&body)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credential_bodies_are_not_logged() {
        let body = r#"{"access_token":"secret","refresh_token":"also-secret"}"#;
        for endpoint in ["device code", "device token", "token refresh"] {
            let logged = loggable_body(endpoint, body);
            assert!(!logged.contains("secret"), "{endpoint} leaked its body");
            assert_eq!(logged, format!("<redacted, {} bytes>", body.len()));
        }
    }

    #[test]
    fn other_bodies_are_logged_verbatim() {
        let body = r#"{"errno":0,"list":[]}"#;
        assert_eq!(loggable_body("list", body), body);
    }
}
