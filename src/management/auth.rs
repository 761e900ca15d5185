//! Token authority: owns the access/refresh token pair for the process.
//!
//! A stored record is evaluated against the clock. Tokens expiring within
//! [`EXPIRY_LOOKAHEAD`] are refreshed; a failed refresh discards the stored
//! record and falls back to the device-code flow.

use std::{sync::Arc, time::Duration};

use chrono::{DateTime, TimeDelta, Utc};
use tokio::time::{Instant, sleep, timeout_at};
use tracing::{debug, trace, warn};

use super::CredentialStore;
use crate::{
    Res,
    error::PanError,
    pan::{AuthApi, TokenPoll},
    types::{DeviceAuthSession, TokenRecord, TokenResponse},
};

/// Tokens closer than this to their expiry are treated as expired.
pub const EXPIRY_LOOKAHEAD: TimeDelta = TimeDelta::hours(48);

/// Poll cadence when the device code response carries no interval.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Added to the poll interval on every `slow_down`.
pub const SLOW_DOWN_STEP: Duration = Duration::from_secs(5);

/// Upper bound for an interactive authorization.
pub const AUTHORIZE_TIMEOUT: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenState {
    NoToken,
    Valid,
    ExpiringSoon,
    Expired,
}

/// Classifies `record` at `now`. Pure.
///
/// A record without an issuance time or lifetime counts as expired.
pub fn token_state(record: Option<&TokenRecord>, now: DateTime<Utc>) -> TokenState {
    let Some(record) = record else {
        return TokenState::NoToken;
    };
    let Some(expires_at) = record.expires_at() else {
        return TokenState::Expired;
    };

    if now >= expires_at {
        TokenState::Expired
    } else if expires_at - now < EXPIRY_LOOKAHEAD {
        TokenState::ExpiringSoon
    } else {
        TokenState::Valid
    }
}

/// Whether `record` needs a refresh at `now`.
pub fn is_expired(record: &TokenRecord, now: DateTime<Utc>) -> bool {
    token_state(Some(record), now) != TokenState::Valid
}

/// Receives device-flow events so the caller can guide the user.
pub trait AuthPrompt: Send + Sync {
    fn device_code_issued(&self, session: &DeviceAuthSession);

    fn authorization_finished(&self, _granted: bool) {}
}

/// Prompt that only logs.
pub struct LogPrompt;

impl AuthPrompt for LogPrompt {
    fn device_code_issued(&self, session: &DeviceAuthSession) {
        debug!(
            user_code = %session.user_code,
            verification_url = %session.verification_url,
            "waiting for device authorization"
        );
    }
}

pub struct TokenManager {
    api: Arc<dyn AuthApi>,
    store: CredentialStore,
    prompt: Box<dyn AuthPrompt>,
    token: Option<TokenRecord>,
    loaded: bool,
}

impl TokenManager {
    pub fn new(api: Arc<dyn AuthApi>, store: CredentialStore) -> Self {
        Self {
            api,
            store,
            prompt: Box::new(LogPrompt),
            token: None,
            loaded: false,
        }
    }

    pub fn with_prompt(mut self, prompt: Box<dyn AuthPrompt>) -> Self {
        self.prompt = prompt;
        self
    }

    pub fn token(&self) -> Option<&TokenRecord> {
        self.token.as_ref()
    }

    pub fn store(&self) -> &CredentialStore {
        &self.store
    }

    pub fn state_at(&self, now: DateTime<Utc>) -> TokenState {
        token_state(self.token.as_ref(), now)
    }

    pub fn is_expired(&self) -> bool {
        self.state_at(Utc::now()) != TokenState::Valid
    }

    /// Creates the token directory and reads the stored record, once.
    ///
    /// A corrupt token file is removed and treated as no token.
    pub async fn load(&mut self) -> Res<()> {
        if self.loaded {
            return Ok(());
        }
        self.store.ensure_dir().await?;
        self.token = match self.store.load().await {
            Ok(token) => token,
            Err(e @ PanError::CorruptToken { .. }) => {
                warn!(error = %e, "could not load existing token, will re-authorize");
                self.store.clear().await?;
                None
            }
            Err(e) => return Err(e),
        };
        self.loaded = true;
        Ok(())
    }

    /// Returns a valid access token, authorizing interactively if needed.
    pub async fn access_token(&mut self) -> Res<String> {
        self.authorize(Instant::now() + AUTHORIZE_TIMEOUT).await?;
        self.token
            .as_ref()
            .map(|t| t.access_token.clone())
            .ok_or(PanError::NotAuthorized)
    }

    /// Ensures a valid token, refreshing or running the device flow.
    ///
    /// Fails with [`PanError::Cancelled`] when `deadline` passes while
    /// waiting for the user; nothing is written in that case.
    pub async fn authorize(&mut self, deadline: Instant) -> Res<()> {
        self.load().await?;

        match self.state_at(Utc::now()) {
            TokenState::Valid => return Ok(()),
            TokenState::ExpiringSoon | TokenState::Expired => match self.refresh().await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    warn!(error = %e, "token refresh failed, starting device authorization");
                    self.store.clear().await?;
                    self.token = None;
                }
            },
            TokenState::NoToken => {}
        }

        self.device_flow(deadline).await
    }

    /// Discards any stored token and runs the device flow.
    ///
    /// The stored record is not read, so an unreadable file cannot block it.
    pub async fn reauthorize(&mut self, deadline: Instant) -> Res<()> {
        self.store.ensure_dir().await?;
        self.store.clear().await?;
        self.loaded = true;
        self.token = None;
        self.device_flow(deadline).await
    }

    /// Exchanges the refresh token once.
    ///
    /// On failure the in-memory record is left as it was.
    pub async fn refresh(&mut self) -> Res<()> {
        self.load().await?;
        let refresh_token = match &self.token {
            Some(t) if !t.refresh_token.is_empty() => t.refresh_token.clone(),
            _ => return Err(PanError::MissingRefreshToken),
        };

        let response = self.api.refresh_token(&refresh_token).await?;
        let record = TokenRecord::from_response(response, Utc::now());
        self.store.persist(&record).await?;
        debug!(expires_at = ?record.expires_at(), "token refreshed");
        self.token = Some(record);
        Ok(())
    }

    async fn device_flow(&mut self, deadline: Instant) -> Res<()> {
        let session = self.api.device_code().await?;
        self.prompt.device_code_issued(&session);

        let outcome = timeout_at(deadline, self.poll_for_token(&session)).await;
        let response = match outcome {
            Err(_) => {
                self.prompt.authorization_finished(false);
                return Err(PanError::Cancelled);
            }
            Ok(Err(e)) => {
                self.prompt.authorization_finished(false);
                return Err(PanError::AuthFailed(e.to_string()));
            }
            Ok(Ok(response)) => response,
        };

        let record = TokenRecord::from_response(response, Utc::now());
        self.store.persist(&record).await?;
        self.token = Some(record);
        self.prompt.authorization_finished(true);
        Ok(())
    }

    /// Polls the token endpoint until the user authorizes the device code.
    ///
    /// Pending answers and connection failures or timeouts are retried at the
    /// session's interval; `slow_down` widens it. Any HTTP error status ends
    /// the poll. Gives up with
    /// [`PanError::DeviceCodeExpired`] once the code's lifetime has passed.
    pub async fn poll_for_token(&self, session: &DeviceAuthSession) -> Res<TokenResponse> {
        let expires_at = Instant::now() + Duration::from_secs(session.expires_in);
        let mut interval = match session.interval {
            0 => DEFAULT_POLL_INTERVAL,
            secs => Duration::from_secs(secs),
        };

        loop {
            match self.api.poll_device_token(&session.device_code).await {
                Ok(TokenPoll::Granted(token)) => return Ok(token),
                Ok(TokenPoll::Pending) => trace!("authorization pending"),
                Ok(TokenPoll::SlowDown) => {
                    interval += SLOW_DOWN_STEP;
                    debug!(interval = ?interval, "asked to slow down");
                }
                Err(PanError::Transport(e)) if e.is_connect() || e.is_timeout() => {
                    warn!(error = %e, "token poll failed, retrying")
                }
                Err(e) => return Err(e),
            }

            let now = Instant::now();
            if now >= expires_at {
                return Err(PanError::DeviceCodeExpired);
            }
            sleep(interval.min(expires_at - now)).await;
        }
    }
}
