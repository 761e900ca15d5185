use std::path::PathBuf;

use super::{Context, transfer_bar};
use crate::{
    Res, info,
    management::{
        RetryPolicy, UploadOptions, UploadOrchestrator, UploadOutcome,
        upload::local_file_size,
    },
    pan::OverwritePolicy,
    success, utils,
};

pub async fn upload(
    local: PathBuf,
    remote: String,
    policy: OverwritePolicy,
    retries: u32,
    content_md5: bool,
) -> Res<()> {
    // Local problems surface before any token refresh or device flow
    local_file_size(&local).await?;
    let remote = remote_target(&local, &remote);
    utils::normalize_remote_path(&remote)?;

    let mut ctx = Context::new().await?;
    let token = ctx.access_token().await?;

    let options = UploadOptions {
        policy,
        retry: RetryPolicy {
            max_attempts: retries.max(1),
            ..RetryPolicy::default()
        },
        content_md5,
        ..UploadOptions::default()
    };
    let orchestrator = UploadOrchestrator::new(ctx.client.clone(), options);

    info!("Uploading {} to {}", local.display(), remote);
    let bar = transfer_bar(0, "upload");
    let on_progress = |sent: u64, total: u64| {
        bar.set_length(total);
        bar.set_position(sent);
    };

    let outcome = orchestrator.upload(&token, &local, &remote, &on_progress).await;
    bar.finish_and_clear();

    match outcome? {
        UploadOutcome::AlreadyPresent { remote_path, size } => success!(
            "{} already holds identical content ({}), nothing transferred.",
            remote_path,
            utils::format_bytes(size)
        ),
        UploadOutcome::Uploaded { session, file } => success!(
            "Uploaded {} to {} ({} in {} slices).",
            session.local_path.display(),
            if file.path.is_empty() { &session.remote_path } else { &file.path },
            utils::format_bytes(session.total_size),
            session.uploaded_slice_count
        ),
    }
    Ok(())
}

/// A remote path ending in `/` is a directory receiving the local file name.
fn remote_target(local: &std::path::Path, remote: &str) -> String {
    if !remote.ends_with('/') {
        return remote.to_string();
    }
    match local.file_name() {
        Some(name) => utils::join_remote(remote, &name.to_string_lossy()),
        None => remote.to_string(),
    }
}
