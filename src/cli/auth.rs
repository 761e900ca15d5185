use std::sync::Mutex;

use colored::Colorize;
use indicatif::ProgressBar;
use tokio::time::Instant;

use super::Context;
use crate::{
    Res, info,
    management::{AuthPrompt, auth::AUTHORIZE_TIMEOUT},
    success,
    types::DeviceAuthSession,
    utils, warning,
};

/// Guides the user through the device flow on the terminal.
#[derive(Default)]
pub struct TerminalPrompt {
    spinner: Mutex<Option<ProgressBar>>,
}

impl TerminalPrompt {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AuthPrompt for TerminalPrompt {
    fn device_code_issued(&self, session: &DeviceAuthSession) {
        info!(
            "Open {} and enter the code {}",
            session.verification_url.underline(),
            session.user_code.bold()
        );
        if let Some(qrcode) = &session.qrcode_url {
            info!("Or scan the QR code at {}", qrcode);
        }
        if webbrowser::open(&session.verification_url).is_err() {
            warning!(
                "Failed to open browser. Please navigate to {} manually.",
                session.verification_url
            );
        }

        if let Ok(mut slot) = self.spinner.lock() {
            *slot = Some(super::spinner("Waiting for authorization..."));
        }
    }

    fn authorization_finished(&self, _granted: bool) {
        if let Some(pb) = self.spinner.lock().ok().and_then(|mut slot| slot.take()) {
            pb.finish_and_clear();
        }
    }
}

pub async fn auth(force: bool) -> Res<()> {
    let mut ctx = Context::new().await?;
    let deadline = Instant::now() + AUTHORIZE_TIMEOUT;

    if force {
        ctx.tokens.reauthorize(deadline).await?;
    } else {
        ctx.tokens.authorize(deadline).await?;
    }

    match ctx.tokens.token().and_then(|t| t.expires_at()) {
        Some(expires_at) => success!(
            "Authorized. Token valid until {}.",
            utils::format_timestamp(expires_at.timestamp())
        ),
        None => success!("Authorized."),
    }
    Ok(())
}

pub async fn refresh() -> Res<()> {
    let mut ctx = Context::new().await?;
    ctx.tokens.refresh().await?;

    if let Some(expires_at) = ctx.tokens.token().and_then(|t| t.expires_at()) {
        success!(
            "Token refreshed, valid until {}.",
            utils::format_timestamp(expires_at.timestamp())
        );
    } else {
        success!("Token refreshed.");
    }
    Ok(())
}
