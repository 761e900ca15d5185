use async_trait::async_trait;
use reqwest::StatusCode;
use tracing::debug;

use super::{PanClient, read_json};
use crate::{
    Res,
    error::PanError,
    types::{DeviceAuthSession, OAuthErrorResponse, TokenResponse},
};

/// Result of one poll of the token endpoint during the device flow.
#[derive(Debug, Clone)]
pub enum TokenPoll {
    Granted(TokenResponse),
    /// `authorization_pending`: the user has not finished yet.
    Pending,
    /// `slow_down`: keep polling, but less often.
    SlowDown,
}

#[async_trait]
pub trait AuthApi: Send + Sync {
    /// Starts a device authorization session.
    async fn device_code(&self) -> Res<DeviceAuthSession>;

    /// Asks once whether the user completed authorization for `device_code`.
    async fn poll_device_token(&self, device_code: &str) -> Res<TokenPoll>;

    /// Exchanges a refresh token for a new token pair.
    async fn refresh_token(&self, refresh_token: &str) -> Res<TokenResponse>;
}

#[async_trait]
impl AuthApi for PanClient {
    async fn device_code(&self) -> Res<DeviceAuthSession> {
        let res = self
            .api
            .post(format!("{}/device/code", self.endpoints.oauth_url))
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("response_type", "device_code"),
                ("scope", "basic,netdisk"),
            ])
            .send()
            .await?;

        let session: DeviceAuthSession = read_json("device code", res).await?;
        debug!(
            expires_in = session.expires_in,
            interval = session.interval,
            "device code issued"
        );
        Ok(session)
    }

    async fn poll_device_token(&self, device_code: &str) -> Res<TokenPoll> {
        let res = self
            .api
            .post(format!("{}/token", self.endpoints.oauth_url))
            .form(&[
                ("grant_type", "device_token"),
                ("code", device_code),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
            ])
            .send()
            .await?;

        let status = res.status();
        let body = res.text().await?;
        parse_token_poll(status, body)
    }

    async fn refresh_token(&self, refresh_token: &str) -> Res<TokenResponse> {
        let res = self
            .api
            .post(format!("{}/token", self.endpoints.oauth_url))
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
            ])
            .send()
            .await?;

        let token: TokenResponse = read_json("token refresh", res).await?;
        if token.access_token.is_empty() {
            return Err(PanError::AuthFailed(
                "refresh returned an empty access token".to_string(),
            ));
        }
        Ok(token)
    }
}

/// Interprets a token endpoint answer during device-code polling.
///
/// Only `authorization_pending` and `slow_down` are non-fatal; any other
/// non-success status is returned as [`PanError::Http`].
pub fn parse_token_poll(status: StatusCode, body: String) -> Res<TokenPoll> {
    if !status.is_success() {
        if let Ok(err) = serde_json::from_str::<OAuthErrorResponse>(&body) {
            match err.error.as_str() {
                "authorization_pending" => return Ok(TokenPoll::Pending),
                "slow_down" => return Ok(TokenPoll::SlowDown),
                _ => {}
            }
        }
        return Err(PanError::Http {
            endpoint: "device token",
            status: status.as_u16(),
            body,
        });
    }

    let token: TokenResponse = serde_json::from_str(&body)?;
    if token.access_token.is_empty() {
        return Ok(TokenPoll::Pending);
    }
    Ok(TokenPoll::Granted(token))
}
