use std::{
    collections::VecDeque,
    io::Write,
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use bdfs::{
    Res,
    error::PanError,
    management::{RetryPolicy, UploadOptions, UploadOrchestrator, UploadOutcome},
    pan::{CreateRequest, PrecreateRequest, UploadApi},
    slicer::hash_bytes,
    types::{CreateResponse, PrecreateResponse, SliceUploadResponse},
};
use tempfile::NamedTempFile;

#[derive(Debug, Clone, PartialEq)]
enum Call {
    Precreate { block_list: Vec<String>, size: u64 },
    Slice { partseq: usize, len: usize, upload_id: String },
    Create { block_list: Vec<String>, upload_id: String },
}

/// Records every call; slices echo the MD5 of what they received unless a
/// scripted answer is queued.
struct FakeUpload {
    return_type: i32,
    create_errno: i64,
    slice_script: Mutex<VecDeque<Res<SliceUploadResponse>>>,
    calls: Mutex<Vec<Call>>,
}

impl FakeUpload {
    fn new(return_type: i32) -> Self {
        Self {
            return_type,
            create_errno: 0,
            slice_script: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    fn slices(self, script: Vec<Res<SliceUploadResponse>>) -> Self {
        *self.slice_script.lock().unwrap() = script.into();
        self
    }

    fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn slice_calls(&self) -> Vec<usize> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Slice { partseq, .. } => Some(partseq),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl UploadApi for FakeUpload {
    async fn precreate(&self, _token: &str, req: &PrecreateRequest<'_>) -> Res<PrecreateResponse> {
        self.calls.lock().unwrap().push(Call::Precreate {
            block_list: req.block_list.to_vec(),
            size: req.size,
        });
        Ok(PrecreateResponse {
            errno: 0,
            upload_id: if self.return_type == 2 { String::new() } else { "upload-1".to_string() },
            return_type: self.return_type,
            block_list: vec![],
        })
    }

    async fn upload_slice(
        &self,
        _token: &str,
        _path: &str,
        upload_id: &str,
        partseq: usize,
        data: Vec<u8>,
    ) -> Res<SliceUploadResponse> {
        self.calls.lock().unwrap().push(Call::Slice {
            partseq,
            len: data.len(),
            upload_id: upload_id.to_string(),
        });
        if partseq == 1 {
            if let Some(scripted) = self.slice_script.lock().unwrap().pop_front() {
                return scripted;
            }
        }
        Ok(SliceUploadResponse {
            md5: hash_bytes(&data),
            ..Default::default()
        })
    }

    async fn create(&self, _token: &str, req: &CreateRequest<'_>) -> Res<CreateResponse> {
        self.calls.lock().unwrap().push(Call::Create {
            block_list: req.block_list.to_vec(),
            upload_id: req.upload_id.to_string(),
        });
        Ok(CreateResponse {
            errno: self.create_errno,
            fs_id: 7,
            path: req.path.to_string(),
            size: req.size,
            ..Default::default()
        })
    }
}

fn temp_file(len: usize) -> NamedTempFile {
    let data: Vec<u8> = (0..len).map(|i| (i % 253) as u8).collect();
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(&data).unwrap();
    file.flush().unwrap();
    file
}

fn options() -> UploadOptions {
    UploadOptions {
        slice_size: 4,
        retry: RetryPolicy {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(1),
        },
        ..UploadOptions::default()
    }
}

fn server_error() -> PanError {
    PanError::Http {
        endpoint: "superfile2",
        status: 503,
        body: String::new(),
    }
}

#[tokio::test]
async fn test_full_upload_runs_three_phases_in_order() {
    let file = temp_file(10);
    let api = Arc::new(FakeUpload::new(1));
    let orchestrator = UploadOrchestrator::new(api.clone(), options());

    let progress = Mutex::new(Vec::new());
    let outcome = orchestrator
        .upload("token", file.path(), "/apps/bdfs/data.bin", &|sent: u64, total: u64| {
            progress.lock().unwrap().push((sent, total))
        })
        .await
        .unwrap();

    let calls = api.calls();
    assert_eq!(calls.len(), 5);
    let block_list = match &calls[0] {
        Call::Precreate { block_list, size } => {
            assert_eq!(*size, 10);
            block_list.clone()
        }
        other => panic!("expected precreate first, got {other:?}"),
    };
    assert_eq!(block_list.len(), 3);
    assert_eq!(api.slice_calls(), vec![0, 1, 2]);
    let lengths: Vec<usize> = calls
        .iter()
        .filter_map(|c| match c {
            Call::Slice { len, upload_id, .. } => {
                assert_eq!(upload_id, "upload-1");
                Some(*len)
            }
            _ => None,
        })
        .collect();
    assert_eq!(lengths, vec![4, 4, 2]);
    assert_eq!(
        calls[4],
        Call::Create {
            block_list,
            upload_id: "upload-1".to_string()
        }
    );

    // Progress grows monotonically and ends at the total
    assert_eq!(*progress.lock().unwrap(), vec![(4, 10), (8, 10), (10, 10)]);

    match outcome {
        UploadOutcome::Uploaded { session, file } => {
            assert_eq!(session.uploaded_slice_count, 3);
            assert_eq!(file.fs_id, 7);
        }
        other => panic!("unexpected outcome {other:?}"),
    }
}

#[tokio::test]
async fn test_no_upload_needed_skips_transfer() {
    let file = temp_file(10);
    let api = Arc::new(FakeUpload::new(2));
    let orchestrator = UploadOrchestrator::new(api.clone(), options());

    let outcome = orchestrator
        .upload("token", file.path(), "/apps/bdfs/data.bin", &|_: u64, _: u64| {})
        .await
        .unwrap();

    assert!(matches!(outcome, UploadOutcome::AlreadyPresent { size: 10, .. }));
    assert_eq!(api.calls().len(), 1);
    assert!(api.slice_calls().is_empty());
}

#[tokio::test]
async fn test_empty_file_uploads_without_slices() {
    let file = temp_file(0);
    let api = Arc::new(FakeUpload::new(1));
    let orchestrator = UploadOrchestrator::new(api.clone(), options());

    orchestrator
        .upload("token", file.path(), "/apps/bdfs/empty.txt", &|_: u64, _: u64| {})
        .await
        .unwrap();

    let calls = api.calls();
    assert!(api.slice_calls().is_empty());
    assert_eq!(
        calls,
        vec![
            Call::Precreate {
                block_list: vec![],
                size: 0
            },
            Call::Create {
                block_list: vec![],
                upload_id: "upload-1".to_string()
            },
        ]
    );
}

#[tokio::test]
async fn test_transient_slice_failure_is_retried() {
    let file = temp_file(10);
    let api = Arc::new(FakeUpload::new(1).slices(vec![Err(server_error())]));
    let orchestrator = UploadOrchestrator::new(api.clone(), options());

    orchestrator
        .upload("token", file.path(), "/apps/bdfs/data.bin", &|_: u64, _: u64| {})
        .await
        .unwrap();

    assert_eq!(api.slice_calls(), vec![0, 1, 1, 2]);
}

#[tokio::test]
async fn test_failed_slice_aborts_with_its_index() {
    let file = temp_file(10);
    let api = Arc::new(FakeUpload::new(1).slices(vec![Err(server_error())]));
    let mut opts = options();
    opts.retry = RetryPolicy::none();
    let orchestrator = UploadOrchestrator::new(api.clone(), opts);

    let err = orchestrator
        .upload("token", file.path(), "/apps/bdfs/data.bin", &|_: u64, _: u64| {})
        .await
        .unwrap_err();

    assert!(matches!(err, PanError::SliceTransfer { index: 1, .. }));
    // Nothing after the failing slice, no finalize
    assert_eq!(api.slice_calls(), vec![0, 1]);
    assert!(!api.calls().iter().any(|c| matches!(c, Call::Create { .. })));
}

#[tokio::test]
async fn test_service_errno_on_slice_is_not_retried() {
    let file = temp_file(10);
    let api = Arc::new(FakeUpload::new(1).slices(vec![Ok(SliceUploadResponse {
        md5: String::new(),
        error_code: 31364,
        error_msg: "slice too large".to_string(),
    })]));
    let orchestrator = UploadOrchestrator::new(api.clone(), options());

    let err = orchestrator
        .upload("token", file.path(), "/apps/bdfs/data.bin", &|_: u64, _: u64| {})
        .await
        .unwrap_err();

    match err {
        PanError::SliceTransfer { index, source } => {
            assert_eq!(index, 1);
            assert!(matches!(*source, PanError::Api { errno: 31364, .. }));
        }
        other => panic!("unexpected error {other:?}"),
    }
    assert_eq!(api.slice_calls(), vec![0, 1]);
}

#[tokio::test]
async fn test_mismatched_echo_is_an_integrity_error() {
    let file = temp_file(10);
    let api = Arc::new(FakeUpload::new(1).slices(vec![Ok(SliceUploadResponse {
        md5: "00000000000000000000000000000000".to_string(),
        ..Default::default()
    })]));
    let orchestrator = UploadOrchestrator::new(api.clone(), options());

    let err = orchestrator
        .upload("token", file.path(), "/apps/bdfs/data.bin", &|_: u64, _: u64| {})
        .await
        .unwrap_err();

    match err {
        PanError::SliceTransfer { index: 1, source } => {
            assert!(matches!(*source, PanError::Integrity(_)))
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[tokio::test]
async fn test_finalize_block_mismatch_is_an_integrity_error() {
    let file = temp_file(10);
    let mut fake = FakeUpload::new(1);
    fake.create_errno = 31190;
    let api = Arc::new(fake);
    let orchestrator = UploadOrchestrator::new(api.clone(), options());

    let err = orchestrator
        .upload("token", file.path(), "/apps/bdfs/data.bin", &|_: u64, _: u64| {})
        .await
        .unwrap_err();

    assert!(matches!(err, PanError::Integrity(_)));
}

#[tokio::test]
async fn test_local_errors_fail_before_any_call() {
    let api = Arc::new(FakeUpload::new(1));
    let orchestrator = UploadOrchestrator::new(api.clone(), options());

    let err = orchestrator
        .upload(
            "token",
            std::path::Path::new("/definitely/missing/file.bin"),
            "/apps/bdfs/file.bin",
            &|_: u64, _: u64| {},
        )
        .await
        .unwrap_err();
    assert!(matches!(err, PanError::Io { .. }));

    let file = temp_file(4);
    let err = orchestrator
        .upload("token", file.path(), "relative/path.bin", &|_: u64, _: u64| {})
        .await
        .unwrap_err();
    assert!(matches!(err, PanError::InvalidPath(_)));

    assert!(api.calls().is_empty());
}
