use async_trait::async_trait;
use clap::ValueEnum;
use reqwest::multipart::{Form, Part};

use super::{PanClient, read_json};
use crate::{
    Res,
    types::{CreateResponse, PrecreateResponse, SliceUploadResponse},
};

/// What the service does when the target path already exists (`rtype`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OverwritePolicy {
    /// Refuse the upload.
    Fail,
    /// Store under a new name.
    Rename,
    /// Store under a new name only when the content differs.
    RenameIfDifferent,
    /// Replace the existing file.
    #[default]
    Overwrite,
}

impl OverwritePolicy {
    pub fn rtype(self) -> u8 {
        match self {
            OverwritePolicy::Fail => 0,
            OverwritePolicy::Rename => 1,
            OverwritePolicy::RenameIfDifferent => 2,
            OverwritePolicy::Overwrite => 3,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PrecreateRequest<'a> {
    pub path: &'a str,
    pub size: u64,
    pub block_list: &'a [String],
    pub policy: OverwritePolicy,
    /// MD5 of the whole file, enables instant upload when the service has it.
    pub content_md5: Option<&'a str>,
}

#[derive(Debug, Clone)]
pub struct CreateRequest<'a> {
    pub path: &'a str,
    pub size: u64,
    pub upload_id: &'a str,
    pub block_list: &'a [String],
    pub policy: OverwritePolicy,
}

/// The three calls of the slice upload protocol.
///
/// Implementations return the raw service answers; interpreting `errno`,
/// `return_type` and echoed hashes is up to the orchestrator.
#[async_trait]
pub trait UploadApi: Send + Sync {
    async fn precreate(&self, access_token: &str, req: &PrecreateRequest<'_>) -> Res<PrecreateResponse>;

    async fn upload_slice(
        &self,
        access_token: &str,
        path: &str,
        upload_id: &str,
        partseq: usize,
        data: Vec<u8>,
    ) -> Res<SliceUploadResponse>;

    async fn create(&self, access_token: &str, req: &CreateRequest<'_>) -> Res<CreateResponse>;
}

#[async_trait]
impl UploadApi for PanClient {
    async fn precreate(&self, access_token: &str, req: &PrecreateRequest<'_>) -> Res<PrecreateResponse> {
        let size = req.size.to_string();
        let rtype = req.policy.rtype().to_string();
        let block_list = serde_json::to_string(req.block_list)?;

        let mut form = vec![
            ("path", req.path),
            ("size", size.as_str()),
            ("isdir", "0"),
            ("autoinit", "1"),
            ("rtype", rtype.as_str()),
            ("block_list", block_list.as_str()),
        ];
        if let Some(md5) = req.content_md5 {
            form.push(("content-md5", md5));
        }

        let res = self
            .api
            .post(self.xpan_file_url())
            .query(&[("method", "precreate"), ("access_token", access_token)])
            .form(&form)
            .send()
            .await?;

        read_json("precreate", res).await
    }

    async fn upload_slice(
        &self,
        access_token: &str,
        path: &str,
        upload_id: &str,
        partseq: usize,
        data: Vec<u8>,
    ) -> Res<SliceUploadResponse> {
        let partseq = partseq.to_string();
        let form = Form::new().part("file", Part::bytes(data).file_name("blob"));

        let res = self
            .transfer
            .post(format!("{}/rest/2.0/pcs/superfile2", self.endpoints.pcs_url))
            .query(&[
                ("method", "upload"),
                ("access_token", access_token),
                ("type", "tmpfile"),
                ("path", path),
                ("uploadid", upload_id),
                ("partseq", partseq.as_str()),
            ])
            .multipart(form)
            .send()
            .await?;

        read_json("superfile2", res).await
    }

    async fn create(&self, access_token: &str, req: &CreateRequest<'_>) -> Res<CreateResponse> {
        let size = req.size.to_string();
        let rtype = req.policy.rtype().to_string();
        let block_list = serde_json::to_string(req.block_list)?;

        let res = self
            .api
            .post(self.xpan_file_url())
            .query(&[("method", "create"), ("access_token", access_token)])
            .form(&[
                ("path", req.path),
                ("size", size.as_str()),
                ("isdir", "0"),
                ("rtype", rtype.as_str()),
                ("uploadid", req.upload_id),
                ("block_list", block_list.as_str()),
            ])
            .send()
            .await?;

        read_json("create", res).await
    }
}
