use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tabled::Tabled;

/// Credential record persisted in the token file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenRecord {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: String,
    #[serde(default)]
    pub expires_in: i64,
    #[serde(default)]
    pub uid: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl TokenRecord {
    pub fn from_response(res: TokenResponse, created_at: DateTime<Utc>) -> Self {
        Self {
            access_token: res.access_token,
            refresh_token: res.refresh_token,
            expires_in: res.expires_in,
            uid: res.uid,
            created_at: Some(created_at),
        }
    }

    /// Absolute expiry instant, `None` when issuance time or lifetime is unknown.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        let created_at = self.created_at?;
        if created_at.timestamp() <= 0 || self.expires_in <= 0 {
            return None;
        }
        created_at.checked_add_signed(chrono::TimeDelta::try_seconds(self.expires_in)?)
    }
}

/// Response of the device code endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceAuthSession {
    pub device_code: String,
    pub user_code: String,
    pub verification_url: String,
    #[serde(default)]
    pub qrcode_url: Option<String>,
    #[serde(default)]
    pub expires_in: u64,
    #[serde(default)]
    pub interval: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: String,
    #[serde(default)]
    pub expires_in: i64,
    #[serde(default)]
    pub scope: String,
    #[serde(default)]
    pub uid: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OAuthErrorResponse {
    pub error: String,
    #[serde(default)]
    pub error_description: String,
}

/// One remote file or directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileEntry {
    #[serde(rename = "fs_id")]
    pub remote_id: u64,
    pub path: String,
    #[serde(default, alias = "filename")]
    pub server_filename: String,
    #[serde(rename = "isdir", default, with = "int_bool")]
    pub is_directory: bool,
    #[serde(default)]
    pub size: u64,
    #[serde(rename = "md5", default, skip_serializing_if = "Option::is_none")]
    pub content_hash: Option<String>,
    #[serde(rename = "server_ctime", default)]
    pub created_at: i64,
    #[serde(rename = "server_mtime", default)]
    pub modified_at: i64,
    #[serde(default)]
    pub category: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dlink: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ListResponse {
    pub errno: i64,
    #[serde(default)]
    pub list: Vec<FileEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PrecreateResponse {
    pub errno: i64,
    #[serde(rename = "uploadid", default)]
    pub upload_id: String,
    #[serde(default)]
    pub return_type: i32,
    #[serde(default)]
    pub block_list: Vec<u64>,
}

/// What the service wants after precreate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrecreateOutcome {
    NeedUpload { upload_id: String },
    NoUploadNeeded,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SliceUploadResponse {
    #[serde(default)]
    pub md5: String,
    #[serde(default)]
    pub error_code: i64,
    #[serde(default)]
    pub error_msg: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct CreateResponse {
    pub errno: i64,
    #[serde(default)]
    pub fs_id: u64,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub md5: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub ctime: i64,
    #[serde(default)]
    pub mtime: i64,
    #[serde(default)]
    pub isdir: u8,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QuotaResponse {
    pub errno: i64,
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub used: u64,
    #[serde(default)]
    pub free: u64,
    #[serde(default)]
    pub expire: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchOp {
    Delete,
    Move,
    Copy,
    Rename,
}

impl BatchOp {
    pub fn opera(&self) -> &'static str {
        match self {
            BatchOp::Delete => "delete",
            BatchOp::Move => "move",
            BatchOp::Copy => "copy",
            BatchOp::Rename => "rename",
        }
    }
}

/// One entry of a batch `filelist`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchItem {
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dest: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub newname: Option<String>,
}

impl BatchItem {
    pub fn delete(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            dest: None,
            newname: None,
        }
    }

    pub fn relocate(path: impl Into<String>, dest: impl Into<String>, newname: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            dest: Some(dest.into()),
            newname: Some(newname.into()),
        }
    }

    pub fn rename(path: impl Into<String>, newname: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            dest: None,
            newname: Some(newname.into()),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BatchResponse {
    pub errno: i64,
    #[serde(default, alias = "list")]
    pub info: Vec<BatchItemResult>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BatchItemResult {
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub errno: i64,
}

/// A contiguous byte range of a local file and its MD5.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SliceDescriptor {
    pub index: usize,
    pub content_hash: String,
    pub byte_length: u64,
}

#[derive(Tabled)]
pub struct FileEntryTableRow {
    #[tabled(rename = "type")]
    pub kind: String,
    pub name: String,
    pub path: String,
    pub size: String,
    pub created: String,
    pub modified: String,
}

mod int_bool {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &bool, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(u8::from(*value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
        Ok(i64::deserialize(deserializer)? != 0)
    }
}
