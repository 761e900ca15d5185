//! # CLI Module
//!
//! Command implementations behind the `bdfs` binary. Each command builds a
//! [`Context`], obtains a valid access token through the token authority and
//! then performs exactly one operation against the Netdisk API.
//!
//! ## Commands
//!
//! - [`auth`], [`refresh`] - device-code login and forced token refresh
//! - [`list`] - directory listing, recursive via the directory walker
//! - [`upload`], [`download`] - file transfer with progress bars
//! - [`remove`], [`move_to`], [`rename`], [`copy`], [`mkdir`] - file management
//! - [`info`], [`quota`] - metadata and storage usage
//!
//! ## Layers
//!
//! ```text
//! CLI Layer (prompts, progress, tables)
//!     ↓
//! Management Layer (token authority, upload orchestrator, walker, batches)
//!     ↓
//! Netdisk Layer (PanClient)
//! ```
//!
//! Commands return [`crate::Res`]; the binary prints the error and exits
//! with status 1.

mod auth;
mod download;
mod info;
mod list;
mod manage;
mod upload;

pub use auth::{TerminalPrompt, auth, refresh};
pub use download::{download, prepare_local};
pub use info::{info, quota};
pub use list::list;
pub use manage::{copy, mkdir, move_to, remove, rename};
pub use upload::upload;

use std::{sync::Arc, time::Duration};

use dialoguer::Confirm;
use indicatif::{ProgressBar, ProgressStyle};

use crate::{
    Res,
    config::Config,
    management::{CredentialStore, TokenManager},
    pan::PanClient,
};

/// Everything a command needs: configuration, HTTP client and tokens.
pub struct Context {
    pub config: Config,
    pub client: Arc<PanClient>,
    pub tokens: TokenManager,
}

impl Context {
    pub async fn new() -> Res<Self> {
        let config = Config::load().await?;
        let client = Arc::new(PanClient::new(&config)?);
        let mut tokens = TokenManager::new(client.clone(), CredentialStore::new(&config.token_path))
            .with_prompt(Box::new(TerminalPrompt::new()));
        tokens.load().await?;

        Ok(Self {
            config,
            client,
            tokens,
        })
    }

    pub async fn access_token(&mut self) -> Res<String> {
        self.tokens.access_token().await
    }
}

/// Asks a yes/no question unless `assume_yes` is set.
pub(crate) fn confirm(question: String, assume_yes: bool) -> Res<bool> {
    if assume_yes {
        return Ok(true);
    }
    Ok(Confirm::new()
        .with_prompt(question)
        .default(false)
        .interact()?)
}

pub(crate) fn spinner(message: impl Into<String>) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template("{spinner:.blue} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"),
    );
    pb.set_message(message.into());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

pub(crate) fn transfer_bar(total: u64, message: impl Into<String>) -> ProgressBar {
    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::with_template(
            "{msg} [{bar:30.blue}] {bytes}/{total_bytes} ({bytes_per_sec}, {eta})",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=> "),
    );
    pb.set_message(message.into());
    pb
}
