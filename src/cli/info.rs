use colored::Colorize;

use super::Context;
use crate::{Res, utils, warning};

/// Displays the metadata of a single remote file or directory.
///
/// The entry is located by listing its parent directory with a file name
/// filter. For files the content hash is then taken from `filemetas`, which
/// reports it more reliably than the listing.
///
/// # Output
///
/// ```text
/// Path:      /apps/bdfs/report.pdf
/// Name:      report.pdf
/// Type:      file
/// Size:      1.2 MiB (1258291 bytes)
/// MD5:       0cc175b9c0f1b6a831c399e269772661
/// Created:   2025-05-02 10:41
/// Modified:  2025-05-02 10:41
/// ID:        889314785420153
/// ```
pub async fn info(path: String) -> Res<()> {
    let mut ctx = Context::new().await?;
    let token = ctx.access_token().await?;

    let entry = ctx.client.find_entry(&token, &path).await?;
    let hash = if entry.is_directory {
        None
    } else {
        match ctx.client.file_metas(&token, &[entry.remote_id]).await {
            Ok(metas) => metas
                .into_iter()
                .find_map(|m| m.content_hash)
                .or(entry.content_hash.clone()),
            Err(e) => {
                warning!("Could not fetch file metas: {}", e);
                entry.content_hash.clone()
            }
        }
    };

    let label = |s: &str| format!("{:<10}", format!("{s}:")).bold();
    println!("{} {}", label("Path"), entry.path);
    println!("{} {}", label("Name"), entry.server_filename);
    println!(
        "{} {}",
        label("Type"),
        if entry.is_directory { "directory" } else { "file" }
    );
    if !entry.is_directory {
        println!(
            "{} {} ({} bytes)",
            label("Size"),
            utils::format_bytes(entry.size),
            entry.size
        );
        println!("{} {}", label("MD5"), hash.as_deref().unwrap_or("-"));
    }
    println!("{} {}", label("Created"), utils::format_timestamp(entry.created_at));
    println!("{} {}", label("Modified"), utils::format_timestamp(entry.modified_at));
    println!("{} {}", label("ID"), entry.remote_id);
    Ok(())
}

/// Displays total, used and free storage of the account.
pub async fn quota() -> Res<()> {
    let mut ctx = Context::new().await?;
    let token = ctx.access_token().await?;
    let quota = ctx.client.quota(&token).await?;

    let percent = if quota.total > 0 {
        quota.used as f64 / quota.total as f64 * 100.0
    } else {
        0.0
    };
    let free = if quota.free > 0 {
        quota.free
    } else {
        quota.total.saturating_sub(quota.used)
    };

    let label = |s: &str| format!("{s:<7}").bold();
    println!("{}{}", label("Total:"), utils::format_bytes(quota.total));
    println!(
        "{}{} ({percent:.1}%)",
        label("Used:"),
        utils::format_bytes(quota.used)
    );
    println!("{}{}", label("Free:"), utils::format_bytes(free));
    if quota.expire {
        warning!("Part of the storage expires within 7 days.");
    }
    Ok(())
}
