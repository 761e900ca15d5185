//! Baidu Netdisk command-line client library.
//!
//! Talks to the Netdisk open platform: device-code authorization with a
//! persisted, self-refreshing token, sliced uploads verified with MD5, a
//! concurrent remote directory walker, and batch file operations.
//!
//! # Modules
//!
//! - `cli` - Command implementations behind the `bdfs` binary
//! - `config` - Configuration from environment, `.env` and TOML
//! - `error` - The [`error::PanError`] type and service `errno` catalogue
//! - `management` - Token authority, credential store, upload orchestrator,
//!   directory walker and batch helpers
//! - `pan` - HTTP client for the Netdisk endpoints and the traits around it
//! - `slicer` - Fixed-size slicing and hashing of local files
//! - `types` - Wire and persisted data structures
//! - `utils` - Remote path and formatting helpers
//!
//! # Example
//!
//! ```no_run
//! use bdfs::{config::{self, Config}, management::{CredentialStore, TokenManager}, pan::PanClient};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> bdfs::Res<()> {
//!     config::load_env().await?;
//!     let config = Config::load().await?;
//!     let client = Arc::new(PanClient::new(&config)?);
//!     let mut tokens = TokenManager::new(client, CredentialStore::new(&config.token_path));
//!     let token = tokens.access_token().await?;
//!     println!("{token}");
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod config;
pub mod error;
pub mod management;
pub mod pan;
pub mod slicer;
pub mod types;
pub mod utils;

/// Result alias used across the crate.
pub type Res<T> = std::result::Result<T, error::PanError>;

/// Prints an informational message with a blue bullet point.
///
/// ```ignore
/// info!("Uploading {} slices", count);
/// ```
#[macro_export]
macro_rules! info {
  ($($arg:tt)*) => ({
    use colored::Colorize;
    println!("[{}] {}", "o".blue().bold(), std::format_args!($($arg)*));
  })
}

/// Prints a success message with a green checkmark.
#[macro_export]
macro_rules! success {
  ($($arg:tt)*) => ({
    use colored::Colorize;
    println!("[{}] {}", "✓".green().bold(), std::format_args!($($arg)*));
  })
}

/// Prints an error message with a red exclamation mark and exits with code 1.
///
/// Only for the binary's top level; library code returns [`Res`] instead.
#[macro_export]
macro_rules! error {
  ($($arg:tt)*) => ({
    use colored::Colorize;
    eprintln!("[{}] {}", "!".red().bold(), std::format_args!($($arg)*));
    std::process::exit(1);
  })
}

/// Prints a warning message with a yellow exclamation mark.
#[macro_export]
macro_rules! warning {
  ($($arg:tt)*) => ({
    use colored::Colorize;
    eprintln!("[{}] {}", "!".yellow().bold(), std::format_args!($($arg)*));
  })
}
