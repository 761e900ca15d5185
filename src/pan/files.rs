use std::path::Path;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use super::{PanClient, read_json};
use crate::{
    Res,
    error::PanError,
    types::{BatchItem, BatchOp, BatchResponse, CreateResponse, FileEntry, ListResponse, QuotaResponse},
};

/// Largest page the list endpoint hands out.
pub const PAGE_SIZE: u32 = 1000;

/// Parameters of one `method=list` call.
#[derive(Debug, Clone)]
pub struct ListQuery {
    pub dir: String,
    /// Only keep entries whose name equals this value.
    pub filename: Option<String>,
    pub start: u32,
    pub limit: u32,
}

impl ListQuery {
    pub fn new(dir: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            filename: None,
            start: 0,
            limit: PAGE_SIZE,
        }
    }
}

#[async_trait]
pub trait FileApi: Send + Sync {
    /// Lists one page of the direct children of `query.dir`.
    async fn list(&self, access_token: &str, query: &ListQuery) -> Res<Vec<FileEntry>>;
}

/// Lists every direct child of `dir`, following pages until a short one.
pub async fn list_dir(api: &dyn FileApi, access_token: &str, dir: &str) -> Res<Vec<FileEntry>> {
    let mut query = ListQuery::new(dir);
    let mut entries = Vec::new();

    loop {
        let page = api.list(access_token, &query).await?;
        let full = page.len() as u32 >= query.limit;
        entries.extend(page);
        if !full {
            break;
        }
        query.start += query.limit;
    }

    Ok(entries)
}

#[async_trait]
impl FileApi for PanClient {
    async fn list(&self, access_token: &str, query: &ListQuery) -> Res<Vec<FileEntry>> {
        let start = query.start.to_string();
        let limit = query.limit.to_string();
        let mut params = vec![
            ("method", "list"),
            ("access_token", access_token),
            ("dir", query.dir.as_str()),
            ("folder", "0"),
            ("web", "0"),
            ("start", start.as_str()),
            ("limit", limit.as_str()),
        ];
        if let Some(name) = &query.filename {
            params.push(("filename", name.as_str()));
        }

        let res = self.api.get(self.xpan_file_url()).query(&params).send().await?;
        let body: ListResponse = read_json("list", res).await?;
        if body.errno != 0 {
            return Err(PanError::api("list", body.errno));
        }

        let entries = match &query.filename {
            Some(name) => body
                .list
                .into_iter()
                .filter(|e| &e.server_filename == name)
                .collect(),
            None => body.list,
        };
        Ok(entries)
    }
}

#[derive(serde::Deserialize)]
struct MetasResponse {
    errno: i64,
    #[serde(default)]
    list: Vec<FileEntry>,
}

impl PanClient {
    /// Looks up the entry at `path` by listing its parent directory.
    pub async fn find_entry(&self, access_token: &str, path: &str) -> Res<FileEntry> {
        let path = crate::utils::normalize_remote_path(path)?;
        let (parent, name) = crate::utils::split_remote_path(&path)?;
        let mut query = ListQuery::new(parent);
        query.filename = Some(name.to_string());

        self.list(access_token, &query)
            .await?
            .into_iter()
            .find(|e| e.path == path || e.server_filename == name)
            .ok_or(PanError::NotFound(path))
    }

    /// Fetches metadata for the given ids, including download links.
    pub async fn file_metas(&self, access_token: &str, ids: &[u64]) -> Res<Vec<FileEntry>> {
        let fsids = serde_json::to_string(ids)?;
        let res = self
            .api
            .get(format!("{}/rest/2.0/xpan/multimedia", self.endpoints.api_url))
            .query(&[
                ("method", "filemetas"),
                ("access_token", access_token),
                ("fsids", fsids.as_str()),
                ("dlink", "1"),
            ])
            .send()
            .await?;

        let body: MetasResponse = read_json("filemetas", res).await?;
        if body.errno != 0 {
            return Err(PanError::api("filemetas", body.errno));
        }
        Ok(body.list)
    }

    /// Creates a remote directory.
    pub async fn create_dir(&self, access_token: &str, path: &str) -> Res<CreateResponse> {
        let res = self
            .api
            .post(self.xpan_file_url())
            .query(&[("method", "create"), ("access_token", access_token)])
            .form(&[
                ("path", path),
                ("size", "0"),
                ("isdir", "1"),
                ("block_list", "[]"),
            ])
            .send()
            .await?;

        let body: CreateResponse = read_json("mkdir", res).await?;
        if body.errno != 0 {
            return Err(PanError::api("mkdir", body.errno));
        }
        Ok(body)
    }

    /// Submits one batch file operation and returns the raw response.
    ///
    /// Per-item outcomes are left to the caller; see
    /// [`crate::management::batch::check_batch`].
    pub async fn file_manager(
        &self,
        access_token: &str,
        op: BatchOp,
        items: &[BatchItem],
    ) -> Res<BatchResponse> {
        let filelist = match op {
            BatchOp::Delete => {
                serde_json::to_string(&items.iter().map(|i| i.path.as_str()).collect::<Vec<_>>())?
            }
            _ => serde_json::to_string(items)?,
        };

        let res = self
            .api
            .post(format!("{}/api/filemanager", self.endpoints.api_url))
            .query(&[
                ("method", "filemanager"),
                ("access_token", access_token),
                ("opera", op.opera()),
            ])
            .form(&[
                ("async", "0"),
                ("ondup", "newcopy"),
                ("filelist", filelist.as_str()),
            ])
            .send()
            .await?;

        debug!(opera = op.opera(), items = items.len(), "filemanager submitted");
        read_json("filemanager", res).await
    }

    pub async fn quota(&self, access_token: &str) -> Res<QuotaResponse> {
        let res = self
            .api
            .get(format!("{}/api/quota", self.endpoints.api_url))
            .query(&[
                ("access_token", access_token),
                ("checkfree", "1"),
                ("checkexpire", "1"),
            ])
            .send()
            .await?;

        let body: QuotaResponse = read_json("quota", res).await?;
        if body.errno != 0 {
            return Err(PanError::api("quota", body.errno));
        }
        Ok(body)
    }

    /// Streams the content behind `dlink` into `dest`.
    ///
    /// Data goes to `<dest>.part` first and is renamed into place once the
    /// body is complete; the partial file is removed on any failure.
    pub async fn download(
        &self,
        access_token: &str,
        dlink: &str,
        dest: &Path,
        on_progress: &(dyn Fn(u64) + Send + Sync),
    ) -> Res<u64> {
        let mut part = dest.as_os_str().to_owned();
        part.push(".part");
        let part = std::path::PathBuf::from(part);

        let result = self.download_into(access_token, dlink, &part, on_progress).await;
        match result {
            Ok(written) => {
                tokio::fs::rename(&part, dest)
                    .await
                    .map_err(|e| PanError::io("cannot move into place", dest, e))?;
                info!(path = %dest.display(), bytes = written, "download complete");
                Ok(written)
            }
            Err(e) => {
                let _ = tokio::fs::remove_file(&part).await;
                Err(e)
            }
        }
    }

    async fn download_into(
        &self,
        access_token: &str,
        dlink: &str,
        part: &Path,
        on_progress: &(dyn Fn(u64) + Send + Sync),
    ) -> Res<u64> {
        let mut res = self
            .transfer
            .get(dlink)
            .query(&[("access_token", access_token)])
            .send()
            .await?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(PanError::Http {
                endpoint: "download",
                status: status.as_u16(),
                body,
            });
        }

        let mut file = tokio::fs::File::create(part)
            .await
            .map_err(|e| PanError::io("cannot create", part, e))?;

        let mut written = 0u64;
        while let Some(chunk) = res.chunk().await? {
            file.write_all(&chunk)
                .await
                .map_err(|e| PanError::io("cannot write", part, e))?;
            written += chunk.len() as u64;
            on_progress(written);
        }
        file.flush()
            .await
            .map_err(|e| PanError::io("cannot write", part, e))?;

        Ok(written)
    }
}
