//! Three-phase upload: precreate, slice transfer, create.
//!
//! Slices are sent one after another in index order so progress is
//! deterministic. Each slice is re-read from disk and re-hashed right before
//! transfer; a file modified after precreate fails with an integrity error
//! instead of producing a corrupt remote file.

use std::{
    io::{self, SeekFrom},
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tracing::{debug, info, warn};

use crate::{
    Res,
    error::PanError,
    pan::{CreateRequest, OverwritePolicy, PrecreateRequest, UploadApi},
    slicer::{self, DEFAULT_SLICE_SIZE},
    types::{CreateResponse, PrecreateOutcome, PrecreateResponse, SliceDescriptor, SliceUploadResponse},
    utils,
};

/// `create` errnos meaning the service did not get the slices it expected.
const INTEGRITY_ERRNOS: [i64; 3] = [10, 31190, 31363];

/// Retry policy for a single slice transfer.
///
/// Only transient failures (connection, timeout, 5xx) are retried. A policy
/// with `max_attempts == 1` never retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            initial_backoff: Duration::ZERO,
        }
    }

    /// Wait before attempt `attempt + 1`, doubling from `initial_backoff`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(16);
        self.initial_backoff.saturating_mul(1 << exp)
    }
}

#[derive(Debug, Clone)]
pub struct UploadOptions {
    pub slice_size: usize,
    pub policy: OverwritePolicy,
    pub retry: RetryPolicy,
    /// Send the whole-file MD5 with precreate.
    pub content_md5: bool,
}

impl Default for UploadOptions {
    fn default() -> Self {
        Self {
            slice_size: DEFAULT_SLICE_SIZE,
            policy: OverwritePolicy::default(),
            retry: RetryPolicy::default(),
            content_md5: false,
        }
    }
}

/// State between a precreate that demands upload and a successful create.
#[derive(Debug, Clone)]
pub struct UploadSession {
    pub remote_path: String,
    pub local_path: PathBuf,
    pub total_size: u64,
    pub upload_id: String,
    pub slices: Vec<SliceDescriptor>,
    pub uploaded_slice_count: usize,
}

#[derive(Debug, Clone)]
pub enum UploadOutcome {
    /// The service already held identical content; nothing was transferred.
    AlreadyPresent { remote_path: String, size: u64 },
    Uploaded {
        session: UploadSession,
        file: CreateResponse,
    },
}

/// Interprets a precreate answer.
pub fn precreate_outcome(res: PrecreateResponse) -> Res<PrecreateOutcome> {
    if res.errno != 0 {
        return Err(PanError::api("precreate", res.errno));
    }
    match res.return_type {
        2 => Ok(PrecreateOutcome::NoUploadNeeded),
        _ if !res.upload_id.is_empty() => Ok(PrecreateOutcome::NeedUpload {
            upload_id: res.upload_id,
        }),
        other => Err(PanError::Protocol(format!(
            "precreate returned return_type {other} without an upload id"
        ))),
    }
}

/// Interprets a create answer, separating integrity failures.
pub fn check_create(res: CreateResponse) -> Res<CreateResponse> {
    match res.errno {
        0 => Ok(res),
        errno if INTEGRITY_ERRNOS.contains(&errno) => Err(PanError::Integrity(format!(
            "create rejected the slices (errno {errno}: {})",
            crate::error::errno_message(errno)
        ))),
        errno => Err(PanError::api("create", errno)),
    }
}

pub struct UploadOrchestrator {
    api: Arc<dyn UploadApi>,
    options: UploadOptions,
}

impl UploadOrchestrator {
    pub fn new(api: Arc<dyn UploadApi>, options: UploadOptions) -> Self {
        Self { api, options }
    }

    pub fn options(&self) -> &UploadOptions {
        &self.options
    }

    /// Uploads `local` to `remote`, reporting `(bytes_sent, total)` after
    /// every slice.
    pub async fn upload(
        &self,
        access_token: &str,
        local: &Path,
        remote: &str,
        on_progress: &(dyn Fn(u64, u64) + Send + Sync),
    ) -> Res<UploadOutcome> {
        let remote_path = utils::normalize_remote_path(remote)?;
        let total_size = local_file_size(local).await?;

        let slices = self.hash_slices(local).await?;
        let block_list: Vec<String> = slices.iter().map(|s| s.content_hash.clone()).collect();
        let content_md5 = if self.options.content_md5 {
            let path = local.to_path_buf();
            Some(blocking(local, move || slicer::whole_file_hash(&path)).await?)
        } else {
            None
        };
        debug!(path = %remote_path, size = total_size, slices = slices.len(), "precreate");

        let precreate = self
            .api
            .precreate(
                access_token,
                &PrecreateRequest {
                    path: &remote_path,
                    size: total_size,
                    block_list: &block_list,
                    policy: self.options.policy,
                    content_md5: content_md5.as_deref(),
                },
            )
            .await?;

        let upload_id = match precreate_outcome(precreate)? {
            PrecreateOutcome::NoUploadNeeded => {
                info!(path = %remote_path, "content already present, skipping transfer");
                on_progress(total_size, total_size);
                return Ok(UploadOutcome::AlreadyPresent {
                    remote_path,
                    size: total_size,
                });
            }
            PrecreateOutcome::NeedUpload { upload_id } => upload_id,
        };

        let mut session = UploadSession {
            remote_path,
            local_path: local.to_path_buf(),
            total_size,
            upload_id,
            slices,
            uploaded_slice_count: 0,
        };

        self.transfer_slices(access_token, &mut session, on_progress).await?;

        let response = self
            .api
            .create(
                access_token,
                &CreateRequest {
                    path: &session.remote_path,
                    size: session.total_size,
                    upload_id: &session.upload_id,
                    block_list: &block_list,
                    policy: self.options.policy,
                },
            )
            .await?;
        let file = check_create(response)?;
        info!(path = %file.path, fs_id = file.fs_id, "upload created");

        Ok(UploadOutcome::Uploaded { session, file })
    }

    async fn hash_slices(&self, local: &Path) -> Res<Vec<SliceDescriptor>> {
        let path = local.to_path_buf();
        let slice_size = self.options.slice_size;
        blocking(local, move || slicer::collect_slices(&path, slice_size)).await
    }

    async fn transfer_slices(
        &self,
        access_token: &str,
        session: &mut UploadSession,
        on_progress: &(dyn Fn(u64, u64) + Send + Sync),
    ) -> Res<()> {
        if session.slices.is_empty() {
            return Ok(());
        }

        let mut file = tokio::fs::File::open(&session.local_path)
            .await
            .map_err(|e| PanError::io("cannot open", &session.local_path, e))?;

        let slice_size = match self.options.slice_size {
            0 => DEFAULT_SLICE_SIZE,
            n => n,
        } as u64;
        let mut sent = 0u64;

        for slice in session.slices.clone() {
            let result = self
                .transfer_slice(access_token, session, &mut file, slice_size, &slice)
                .await;
            if let Err(source) = result {
                return Err(PanError::SliceTransfer {
                    index: slice.index,
                    source: Box::new(source),
                });
            }

            session.uploaded_slice_count += 1;
            sent += slice.byte_length;
            on_progress(sent, session.total_size);
        }

        Ok(())
    }

    async fn transfer_slice(
        &self,
        access_token: &str,
        session: &UploadSession,
        file: &mut tokio::fs::File,
        slice_size: u64,
        slice: &SliceDescriptor,
    ) -> Res<()> {
        let path = &session.local_path;
        let offset = slice.index as u64 * slice_size;
        file.seek(SeekFrom::Start(offset))
            .await
            .map_err(|e| PanError::io("cannot seek", path, e))?;
        let mut data = vec![0u8; slice.byte_length as usize];
        file.read_exact(&mut data)
            .await
            .map_err(|e| PanError::io("cannot read", path, e))?;

        let actual = slicer::hash_bytes(&data);
        if actual != slice.content_hash {
            return Err(PanError::Integrity(format!(
                "{} changed since it was hashed",
                path.display()
            )));
        }

        let res = self.send_with_retry(access_token, session, slice.index, data).await?;
        if res.error_code != 0 {
            return Err(PanError::api("superfile2", res.error_code));
        }
        if !res.md5.is_empty() && res.md5 != slice.content_hash {
            return Err(PanError::Integrity(format!(
                "service stored {} for a slice hashed {}",
                res.md5, slice.content_hash
            )));
        }

        debug!(index = slice.index, bytes = slice.byte_length, "slice uploaded");
        Ok(())
    }

    async fn send_with_retry(
        &self,
        access_token: &str,
        session: &UploadSession,
        index: usize,
        data: Vec<u8>,
    ) -> Res<SliceUploadResponse> {
        let retry = self.options.retry;
        let mut attempt = 1;
        loop {
            let result = self
                .api
                .upload_slice(
                    access_token,
                    &session.remote_path,
                    &session.upload_id,
                    index,
                    data.clone(),
                )
                .await;

            match result {
                Err(e) if e.is_transient() && attempt < retry.max_attempts => {
                    let wait = retry.backoff(attempt);
                    warn!(index, attempt, error = %e, wait = ?wait, "slice transfer failed, retrying");
                    tokio::time::sleep(wait).await;
                    attempt += 1;
                }
                other => return other,
            }
        }
    }
}

/// Size of the regular file at `path`; anything else is a local I/O error.
pub async fn local_file_size(path: &Path) -> Res<u64> {
    let meta = tokio::fs::metadata(path)
        .await
        .map_err(|e| PanError::io("cannot stat", path, e))?;
    if !meta.is_file() {
        return Err(PanError::io(
            "cannot upload",
            path,
            io::Error::new(io::ErrorKind::InvalidInput, "not a regular file"),
        ));
    }
    Ok(meta.len())
}

/// Runs a hashing job off the async runtime.
async fn blocking<T, F>(path: &Path, job: F) -> Res<T>
where
    T: Send + 'static,
    F: FnOnce() -> Res<T> + Send + 'static,
{
    tokio::task::spawn_blocking(job)
        .await
        .map_err(|e| PanError::io("cannot hash", path, io::Error::other(e)))?
}
