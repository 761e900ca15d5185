//! Error types shared by every layer of the client.
//!
//! Errors fall into five groups: transport failures (network, timeouts,
//! unexpected HTTP statuses), protocol failures (a non-zero `errno` in a parsed
//! body), partial batch failures, integrity failures (the service or the local
//! file disagrees with the slice hashes), and local I/O failures. The auth flow
//! adds its own terminal outcomes on top.

use std::{fmt, path::PathBuf};

use thiserror::Error;

/// Category of a non-zero `errno` returned by the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrnoKind {
    Permission,
    PathNotFound,
    NameConflict,
    QuotaExceeded,
    BannedContent,
    Unknown,
}

impl ErrnoKind {
    pub fn from_errno(errno: i64) -> Self {
        match errno {
            -6 | 3 | 4 | 6 | 31045 => ErrnoKind::Permission,
            -9 | 12 | 108 | 115 | 31066 => ErrnoKind::PathNotFound,
            -8 | 110 | 112 | 31061 => ErrnoKind::NameConflict,
            -10 | 116 | 117 | 31112 => ErrnoKind::QuotaExceeded,
            113 | 31001 | 31026 => ErrnoKind::BannedContent,
            _ => ErrnoKind::Unknown,
        }
    }
}

impl fmt::Display for ErrnoKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrnoKind::Permission => "permission denied",
            ErrnoKind::PathNotFound => "path not found",
            ErrnoKind::NameConflict => "name conflict",
            ErrnoKind::QuotaExceeded => "quota exceeded",
            ErrnoKind::BannedContent => "banned content",
            ErrnoKind::Unknown => "unknown error",
        };
        f.write_str(s)
    }
}

/// Human readable message for a service `errno`.
pub fn errno_message(errno: i64) -> &'static str {
    match errno {
        0 => "Success",
        2 => "Parameters error",
        3 => "User permission error",
        4 => "Request source error",
        6 => "User not authorized for this app",
        10 => "Failed to create file",
        12 => "Operation not allowed or path error",
        -6 => "Access token invalid",
        -7 => "Invalid file name",
        -8 => "File or directory already exists",
        -9 => "File does not exist",
        -10 => "Cloud storage capacity is full",
        108 => "Path error, path does not exist",
        110 => "Target path already exists",
        111 => "Another asynchronous task is currently executing",
        112 => "Same file already exists in the same directory",
        113 => "File or directory name contains forbidden words",
        114 => "Path too long",
        115 => "Target directory does not exist",
        116 => "Insufficient disk space",
        117 => "File too large",
        31001 => "User has been banned",
        31026 => "File contains illegal content",
        31061 => "File already exists",
        31066 => "File does not exist",
        31190 => "Uploaded slices not found",
        31363 => "Slice missing",
        31364 => "Slice size exceeds limit",
        _ => "Unknown error code",
    }
}

/// One failed item of a batch file operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemFailure {
    pub path: String,
    pub errno: i64,
}

impl fmt::Display for ItemFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (errno {}: {})",
            self.path,
            self.errno,
            errno_message(self.errno)
        )
    }
}

#[derive(Debug, Error)]
pub enum PanError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("{endpoint} failed with HTTP status {status}: {body}")]
    Http {
        endpoint: &'static str,
        status: u16,
        body: String,
    },

    #[error("{endpoint} returned errno {errno} ({kind}): {message}")]
    Api {
        endpoint: &'static str,
        errno: i64,
        kind: ErrnoKind,
        message: &'static str,
    },

    #[error("{} of {total} items failed: {}", .failures.len(), join_failures(.failures))]
    Batch {
        total: usize,
        failures: Vec<ItemFailure>,
    },

    #[error("integrity check failed: {0}; restart the upload from precreate")]
    Integrity(String),

    #[error("slice {index} failed: {source}")]
    SliceTransfer {
        index: usize,
        #[source]
        source: Box<PanError>,
    },

    #[error("{action} {}: {source}", .path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("token file {} is corrupt: {source}", .path.display())]
    CorruptToken {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("prompt failed: {0}")]
    Prompt(#[from] dialoguer::Error),

    #[error("malformed response: {0}")]
    Json(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid remote path: {0}")]
    InvalidPath(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("unexpected response: {0}")]
    Protocol(String),

    #[error("authorization failed: {0}")]
    AuthFailed(String),

    #[error("device code has expired before authorization completed")]
    DeviceCodeExpired,

    #[error("authorization cancelled: deadline elapsed")]
    Cancelled,

    #[error("no refresh token available")]
    MissingRefreshToken,

    #[error("no access token, authorize first")]
    NotAuthorized,
}

impl PanError {
    pub fn api(endpoint: &'static str, errno: i64) -> Self {
        PanError::Api {
            endpoint,
            errno,
            kind: ErrnoKind::from_errno(errno),
            message: errno_message(errno),
        }
    }

    pub fn io(action: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PanError::Io {
            action,
            path: path.into(),
            source,
        }
    }

    /// Whether the failure happened below the API layer (connection, timeout,
    /// truncated body) and may succeed when simply repeated.
    pub fn is_transient(&self) -> bool {
        match self {
            PanError::Transport(e) => {
                e.is_connect() || e.is_timeout() || e.is_request() || e.is_body()
            }
            PanError::Http { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

fn join_failures(failures: &[ItemFailure]) -> String {
    failures
        .iter()
        .map(|f| f.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}
