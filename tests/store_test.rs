use bdfs::error::PanError;
use bdfs::management::CredentialStore;
use bdfs::types::TokenRecord;
use chrono::Utc;
use tempfile::TempDir;

fn sample_record(access_token: &str) -> TokenRecord {
    TokenRecord {
        access_token: access_token.to_string(),
        refresh_token: "refresh".to_string(),
        expires_in: 2_592_000,
        uid: "42".to_string(),
        created_at: Some(Utc::now()),
    }
}

#[tokio::test]
async fn test_load_without_file_is_none() {
    let dir = TempDir::new().unwrap();
    let store = CredentialStore::new(dir.path().join("token.json"));

    assert!(store.load().await.unwrap().is_none());
}

#[tokio::test]
async fn test_persist_then_load_returns_same_record() {
    let dir = TempDir::new().unwrap();
    let store = CredentialStore::new(dir.path().join("nested/deeper/token.json"));
    let record = sample_record("first");

    // Parent directories are created on demand
    store.persist(&record).await.unwrap();

    assert_eq!(store.load().await.unwrap(), Some(record));
}

#[tokio::test]
async fn test_persist_replaces_and_leaves_no_temp_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("token.json");
    let store = CredentialStore::new(&path);

    store.persist(&sample_record("first")).await.unwrap();
    store.persist(&sample_record("second")).await.unwrap();

    let loaded = store.load().await.unwrap().unwrap();
    assert_eq!(loaded.access_token, "second");

    let names: Vec<String> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec!["token.json".to_string()]);
}

#[cfg(unix)]
#[tokio::test]
async fn test_token_file_is_owner_only() {
    use std::os::unix::fs::PermissionsExt;

    let dir = TempDir::new().unwrap();
    let path = dir.path().join("token.json");
    let store = CredentialStore::new(&path);
    store.persist(&sample_record("secret")).await.unwrap();

    let mode = std::fs::metadata(&path).unwrap().permissions().mode();
    assert_eq!(mode & 0o777, 0o600);
}

#[cfg(unix)]
#[tokio::test]
async fn test_stale_temp_file_never_widens_permissions() {
    use std::os::unix::fs::PermissionsExt;

    let dir = TempDir::new().unwrap();
    let path = dir.path().join("token.json");
    let tmp = dir.path().join("token.json.tmp");

    // Left behind by an interrupted write, readable by everyone
    std::fs::write(&tmp, "stale").unwrap();
    std::fs::set_permissions(&tmp, std::fs::Permissions::from_mode(0o644)).unwrap();

    let store = CredentialStore::new(&path);
    store.persist(&sample_record("secret")).await.unwrap();

    let mode = std::fs::metadata(&path).unwrap().permissions().mode();
    assert_eq!(mode & 0o777, 0o600);
    assert!(!tmp.exists());
    assert_eq!(store.load().await.unwrap().unwrap().access_token, "secret");
}

#[tokio::test]
async fn test_clear_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("token.json");
    let store = CredentialStore::new(&path);

    store.persist(&sample_record("gone")).await.unwrap();
    store.clear().await.unwrap();
    assert!(!path.exists());

    // Clearing again is not an error
    store.clear().await.unwrap();
}

#[tokio::test]
async fn test_corrupt_file_is_reported() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("token.json");
    std::fs::write(&path, "{not json").unwrap();

    let store = CredentialStore::new(&path);
    match store.load().await {
        Err(PanError::CorruptToken { path: reported, .. }) => assert_eq!(reported, path),
        other => panic!("unexpected load result: {other:?}"),
    }
}
