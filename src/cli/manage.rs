use super::{Context, confirm};
use crate::{
    Res,
    management::batch::{copy_item, delete_item, move_item, rename_item, run_batch},
    success,
    types::BatchOp,
    utils,
};

pub async fn remove(paths: Vec<String>, assume_yes: bool) -> Res<()> {
    let items = paths
        .iter()
        .map(|p| delete_item(p))
        .collect::<Res<Vec<_>>>()?;

    let listed = items.iter().map(|i| i.path.as_str()).collect::<Vec<_>>().join(", ");
    if !confirm(
        format!("Remove {listed}? This cannot be undone"),
        assume_yes,
    )? {
        success!("Remove operation cancelled.");
        return Ok(());
    }

    let mut ctx = Context::new().await?;
    let token = ctx.access_token().await?;
    run_batch(&ctx.client, &token, BatchOp::Delete, &items).await?;
    success!("Removed {}.", listed);
    Ok(())
}

pub async fn move_to(source: String, dest_dir: String, assume_yes: bool) -> Res<()> {
    let item = move_item(&source, &dest_dir)?;
    let dest = item.dest.clone().unwrap_or_default();

    if !confirm(format!("Move {} into {}?", item.path, dest), assume_yes)? {
        success!("Move operation cancelled.");
        return Ok(());
    }

    let mut ctx = Context::new().await?;
    let token = ctx.access_token().await?;
    let path = item.path.clone();
    run_batch(&ctx.client, &token, BatchOp::Move, &[item]).await?;
    success!("Moved {} into {}.", path, dest);
    Ok(())
}

pub async fn rename(source: String, newname: String, assume_yes: bool) -> Res<()> {
    let item = rename_item(&source, &newname)?;
    let (parent, _) = utils::split_remote_path(&item.path)?;
    let new_path = utils::join_remote(&parent, newname.trim());

    if !confirm(format!("Rename {} to {}?", item.path, new_path), assume_yes)? {
        success!("Rename operation cancelled.");
        return Ok(());
    }

    let mut ctx = Context::new().await?;
    let token = ctx.access_token().await?;
    let path = item.path.clone();
    run_batch(&ctx.client, &token, BatchOp::Rename, &[item]).await?;
    success!("Renamed {} to {}.", path, new_path);
    Ok(())
}

pub async fn copy(source: String, dest: String) -> Res<()> {
    let item = copy_item(&source, &dest)?;
    let target = utils::join_remote(
        item.dest.as_deref().unwrap_or("/"),
        item.newname.as_deref().unwrap_or_default(),
    );

    let mut ctx = Context::new().await?;
    let token = ctx.access_token().await?;
    let path = item.path.clone();
    run_batch(&ctx.client, &token, BatchOp::Copy, &[item]).await?;
    success!("Copied {} to {}.", path, target);
    Ok(())
}

pub async fn mkdir(path: String) -> Res<()> {
    let path = utils::normalize_remote_path(&path)?;
    utils::split_remote_path(&path)?;

    let mut ctx = Context::new().await?;
    let token = ctx.access_token().await?;
    let created = ctx.client.create_dir(&token, &path).await?;
    let shown = if created.path.is_empty() { &path } else { &created.path };
    success!("Created directory {}.", shown);
    Ok(())
}
