//! Batch file operations (`filemanager`): building item lists and folding the
//! per-item results into one outcome.

use tracing::debug;

use crate::{
    Res,
    error::{ItemFailure, PanError},
    pan::PanClient,
    types::{BatchItem, BatchOp, BatchResponse},
    utils::{normalize_remote_path, split_remote_path},
};

/// Folds a batch response into success or [`PanError::Batch`].
///
/// A non-zero top-level `errno` fails the whole call. Otherwise every item
/// with a non-zero `errno` is reported, named after the submitted item at the
/// same position.
pub fn check_batch(op: BatchOp, items: &[BatchItem], response: BatchResponse) -> Res<()> {
    if response.errno != 0 && response.info.iter().all(|r| r.errno == 0) {
        return Err(PanError::api(op.opera(), response.errno));
    }

    let failures: Vec<ItemFailure> = response
        .info
        .iter()
        .enumerate()
        .filter(|(_, r)| r.errno != 0)
        .map(|(i, r)| ItemFailure {
            path: items
                .get(i)
                .map(|item| item.path.clone())
                .unwrap_or_else(|| r.path.clone()),
            errno: r.errno,
        })
        .collect();

    if failures.is_empty() {
        return Ok(());
    }
    Err(PanError::Batch {
        total: items.len(),
        failures,
    })
}

/// Item moving `source` into the directory `dest_dir`, keeping its name.
pub fn move_item(source: &str, dest_dir: &str) -> Res<BatchItem> {
    let source = normalize_remote_path(source)?;
    let dest_dir = normalize_remote_path(dest_dir)?;
    let (_, name) = split_remote_path(&source)?;
    Ok(BatchItem::relocate(source, dest_dir, name))
}

/// Item copying `source` to `dest`.
///
/// A `dest` ending in `/` names the target directory; otherwise it is the
/// full path of the copy.
pub fn copy_item(source: &str, dest: &str) -> Res<BatchItem> {
    let source = normalize_remote_path(source)?;
    let (_, source_name) = split_remote_path(&source)?;

    if dest.trim_end().ends_with('/') {
        let dest_dir = normalize_remote_path(dest)?;
        return Ok(BatchItem::relocate(source, dest_dir, source_name));
    }

    let (dest_dir, name) = split_remote_path(dest)?;
    Ok(BatchItem::relocate(source, dest_dir, name))
}

/// Item renaming `source` in place.
pub fn rename_item(source: &str, newname: &str) -> Res<BatchItem> {
    let source = normalize_remote_path(source)?;
    let newname = newname.trim();
    if newname.is_empty() || newname.contains('/') {
        return Err(PanError::InvalidPath(format!(
            "{newname:?} is not a valid file name"
        )));
    }
    split_remote_path(&source)?;
    Ok(BatchItem::rename(source, newname))
}

pub fn delete_item(path: &str) -> Res<BatchItem> {
    let path = normalize_remote_path(path)?;
    if path == "/" {
        return Err(PanError::InvalidPath("refusing to delete the root".to_string()));
    }
    Ok(BatchItem::delete(path))
}

/// Submits `items` as one synchronous batch.
pub async fn run_batch(
    client: &PanClient,
    access_token: &str,
    op: BatchOp,
    items: &[BatchItem],
) -> Res<()> {
    if items.is_empty() {
        return Err(PanError::InvalidPath(format!(
            "no paths given for {}",
            op.opera()
        )));
    }

    let response = client.file_manager(access_token, op, items).await?;
    debug!(opera = op.opera(), errno = response.errno, "filemanager answered");
    check_batch(op, items, response)
}
