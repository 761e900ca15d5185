use std::path::{Path, PathBuf};

use super::{Context, transfer_bar};
use crate::{Res, error::PanError, info, success, utils};

pub async fn download(remote: String, local: Option<PathBuf>) -> Res<()> {
    let remote = utils::normalize_remote_path(&remote)?;
    if let Some(path) = &local {
        prepare_local(path).await?;
    }

    let mut ctx = Context::new().await?;
    let token = ctx.access_token().await?;

    let entry = ctx.client.find_entry(&token, &remote).await?;
    if entry.is_directory {
        return Err(PanError::InvalidPath(format!(
            "{} is a directory; only files can be downloaded",
            entry.path
        )));
    }

    let dest = destination(local, &entry.server_filename);

    let dlink = ctx
        .client
        .file_metas(&token, &[entry.remote_id])
        .await?
        .into_iter()
        .find_map(|meta| meta.dlink)
        .ok_or_else(|| PanError::Protocol(format!("no download link for {}", entry.path)))?;

    info!("Downloading {} to {}", entry.path, dest.display());
    let bar = transfer_bar(entry.size, "download");
    let written = ctx
        .client
        .download(&token, &dlink, &dest, &|n: u64| bar.set_position(n))
        .await;
    bar.finish_and_clear();

    let written = written?;
    success!(
        "Downloaded {} to {} ({}).",
        entry.path,
        dest.display(),
        utils::format_bytes(written)
    );
    Ok(())
}

/// Creates the directory that will receive `local` before any request is made.
///
/// An existing directory is used as is; otherwise `local` names the file and
/// its parent is created.
pub async fn prepare_local(local: &Path) -> Res<()> {
    if local.is_dir() {
        return Ok(());
    }
    if let Some(parent) = local.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| PanError::io("cannot create", parent, e))?;
    }
    Ok(())
}

/// Resolves the local target: an existing directory receives the remote
/// file name, no target means the current directory.
fn destination(local: Option<PathBuf>, remote_name: &str) -> PathBuf {
    match local {
        Some(path) if path.is_dir() => path.join(remote_name),
        Some(path) => path,
        None => Path::new(".").join(remote_name),
    }
}
