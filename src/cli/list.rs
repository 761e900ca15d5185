use tabled::Table;

use super::Context;
use crate::{
    Res,
    management::walk::{DEFAULT_WALK_BUFFER, walk},
    pan::list_dir,
    types::FileEntryTableRow,
    utils, warning,
};

pub async fn list(path: String, recursive: bool) -> Res<()> {
    let mut ctx = Context::new().await?;
    let token = ctx.access_token().await?;
    let dir = utils::normalize_remote_path(&path)?;

    if recursive {
        return list_recursive(ctx, token, dir).await;
    }

    let mut entries = list_dir(ctx.client.as_ref(), &token, &dir).await?;
    if entries.is_empty() {
        println!("{dir} is empty");
        return Ok(());
    }

    utils::sort_entries(&mut entries);
    let rows: Vec<FileEntryTableRow> = entries.iter().map(utils::to_table_row).collect();
    println!("{}\n{} entries", Table::new(rows), entries.len());
    Ok(())
}

/// Prints entries as they stream in from the walker.
async fn list_recursive(ctx: Context, token: String, root: String) -> Res<()> {
    let mut walk = walk(ctx.client.clone(), token, root, DEFAULT_WALK_BUFFER);

    let mut count = 0usize;
    while let Some(entry) = walk.entries.recv().await {
        let size = if entry.is_directory {
            "-".to_string()
        } else {
            utils::format_bytes(entry.size)
        };
        let kind = if entry.is_directory { "d" } else { "-" };
        println!(
            "{kind} {size:>10}  {}  {}",
            utils::format_timestamp(entry.modified_at),
            entry.path
        );
        count += 1;
    }

    let _ = walk.handle.await;

    let mut failed = 0usize;
    while let Ok(err) = walk.errors.try_recv() {
        warning!("{}", err);
        failed += 1;
    }

    println!("{count} entries");
    if failed > 0 {
        warning!("{} director{} could not be listed", failed, if failed == 1 { "y" } else { "ies" });
    }
    Ok(())
}
