use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use bdfs::{
    Res,
    error::PanError,
    management::walk,
    pan::{FileApi, ListQuery, list_dir},
    types::FileEntry,
};

/// In-memory directory tree; `None` makes listing that directory fail.
struct FakeTree {
    dirs: HashMap<String, Option<Vec<FileEntry>>>,
    queries: Mutex<Vec<(String, u32)>>,
}

impl FakeTree {
    fn new(dirs: Vec<(&str, Option<Vec<FileEntry>>)>) -> Self {
        Self {
            dirs: dirs.into_iter().map(|(k, v)| (k.to_string(), v)).collect(),
            queries: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl FileApi for FakeTree {
    async fn list(&self, _access_token: &str, query: &ListQuery) -> Res<Vec<FileEntry>> {
        self.queries
            .lock()
            .unwrap()
            .push((query.dir.clone(), query.start));
        match self.dirs.get(&query.dir) {
            Some(Some(children)) => Ok(children
                .iter()
                .skip(query.start as usize)
                .take(query.limit as usize)
                .cloned()
                .collect()),
            Some(None) => Err(PanError::api("list", 31066)),
            None => Err(PanError::api("list", -9)),
        }
    }
}

fn entry(path: &str, is_directory: bool) -> FileEntry {
    FileEntry {
        remote_id: path.len() as u64,
        path: path.to_string(),
        server_filename: path.rsplit('/').next().unwrap_or_default().to_string(),
        is_directory,
        size: if is_directory { 0 } else { 10 },
        content_hash: None,
        created_at: 0,
        modified_at: 0,
        category: 0,
        dlink: None,
    }
}

async fn drain(walk: &mut bdfs::management::Walk) -> Vec<String> {
    let mut paths = Vec::new();
    while let Some(entry) = walk.entries.recv().await {
        paths.push(entry.path);
    }
    paths
}

#[tokio::test]
async fn test_walk_is_depth_first_pre_order() {
    let tree = Arc::new(FakeTree::new(vec![
        ("/", Some(vec![entry("/a", false), entry("/b", true)])),
        ("/b", Some(vec![entry("/b/c", false)])),
    ]));

    let mut walk = walk(tree, "token".to_string(), "/".to_string(), 1);
    let paths = drain(&mut walk).await;
    walk.handle.await.unwrap();

    assert_eq!(paths, vec!["/a", "/b", "/b/c"]);
    assert!(walk.errors.recv().await.is_none());
}

#[tokio::test]
async fn test_walk_descends_before_visiting_siblings() {
    let tree = Arc::new(FakeTree::new(vec![
        ("/", Some(vec![entry("/x", true), entry("/y", false)])),
        ("/x", Some(vec![entry("/x/z", true)])),
        ("/x/z", Some(vec![entry("/x/z/deep.txt", false)])),
    ]));

    let mut walk = walk(tree, "token".to_string(), "/".to_string(), 4);
    let paths = drain(&mut walk).await;

    assert_eq!(paths, vec!["/x", "/x/z", "/x/z/deep.txt", "/y"]);
}

#[tokio::test]
async fn test_failed_branch_reports_once_and_continues() {
    let tree = Arc::new(FakeTree::new(vec![
        (
            "/",
            Some(vec![entry("/a", false), entry("/b", true), entry("/d", false)]),
        ),
        ("/b", None),
    ]));

    let mut walk = walk(tree, "token".to_string(), "/".to_string(), 2);
    let paths = drain(&mut walk).await;
    walk.handle.await.unwrap();

    // Everything outside the failed branch still arrives
    assert_eq!(paths, vec!["/a", "/b", "/d"]);

    let err = walk.errors.recv().await.unwrap();
    assert!(matches!(err, PanError::Api { errno: 31066, .. }));
    assert!(walk.errors.recv().await.is_none());
}

#[tokio::test]
async fn test_dropping_the_receiver_stops_the_walk() {
    let children: Vec<FileEntry> = (0..50).map(|i| entry(&format!("/f{i}"), false)).collect();
    let tree = Arc::new(FakeTree::new(vec![("/", Some(children))]));

    let mut walk = walk(tree, "token".to_string(), "/".to_string(), 1);
    assert_eq!(walk.entries.recv().await.unwrap().path, "/f0");
    drop(walk.entries);

    // The producer notices the closed channel and finishes
    walk.handle.await.unwrap();
}

#[tokio::test]
async fn test_list_dir_follows_pages() {
    let children: Vec<FileEntry> = (0..2500).map(|i| entry(&format!("/big/{i}"), false)).collect();
    let tree = FakeTree::new(vec![("/big", Some(children))]);

    let listed = list_dir(&tree, "token", "/big").await.unwrap();

    assert_eq!(listed.len(), 2500);
    assert_eq!(listed[1000].path, "/big/1000");
    assert_eq!(
        *tree.queries.lock().unwrap(),
        vec![
            ("/big".to_string(), 0),
            ("/big".to_string(), 1000),
            ("/big".to_string(), 2000)
        ]
    );
}

#[tokio::test]
async fn test_list_dir_with_exact_page_asks_once_more() {
    let children: Vec<FileEntry> = (0..1000).map(|i| entry(&format!("/full/{i}"), false)).collect();
    let tree = FakeTree::new(vec![("/full", Some(children))]);

    let listed = list_dir(&tree, "token", "/full").await.unwrap();

    assert_eq!(listed.len(), 1000);
    assert_eq!(tree.queries.lock().unwrap().len(), 2);
}
