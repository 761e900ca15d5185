use std::{future::Future, pin::Pin, sync::Arc};

use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{debug, warn};

use crate::{
    error::PanError,
    pan::{FileApi, list_dir},
    types::FileEntry,
};

/// Buffer of the entry channel; the producer blocks once it is full.
pub const DEFAULT_WALK_BUFFER: usize = 16;

/// A running traversal of a remote subtree.
///
/// Entries arrive depth-first in pre-order. A listing failure is sent once on
/// `errors` and ends only that branch. Both channels close after the producer
/// finishes; await `handle` for an orderly shutdown.
pub struct Walk {
    pub entries: mpsc::Receiver<FileEntry>,
    pub errors: mpsc::UnboundedReceiver<PanError>,
    pub handle: JoinHandle<()>,
}

/// Starts walking `root` on a background task.
pub fn walk(api: Arc<dyn FileApi>, access_token: String, root: String, buffer: usize) -> Walk {
    let (entry_tx, entries) = mpsc::channel(buffer.max(1));
    let (error_tx, errors) = mpsc::unbounded_channel();

    let handle = tokio::spawn(async move {
        let walker = Walker {
            api,
            access_token,
            entries: entry_tx,
            errors: error_tx,
        };
        walker.visit(root).await;
        debug!("walk finished");
    });

    Walk {
        entries,
        errors,
        handle,
    }
}

struct Walker {
    api: Arc<dyn FileApi>,
    access_token: String,
    entries: mpsc::Sender<FileEntry>,
    errors: mpsc::UnboundedSender<PanError>,
}

impl Walker {
    /// Returns `false` once the consumer has dropped the entry receiver.
    fn visit(&self, dir: String) -> Pin<Box<dyn Future<Output = bool> + Send + '_>> {
        Box::pin(async move {
            let children = match list_dir(self.api.as_ref(), &self.access_token, &dir).await {
                Ok(children) => children,
                Err(e) => {
                    warn!(dir = %dir, error = %e, "listing failed, skipping branch");
                    let _ = self.errors.send(e);
                    return true;
                }
            };

            for entry in children {
                let subdir = entry.is_directory.then(|| entry.path.clone());
                if self.entries.send(entry).await.is_err() {
                    return false;
                }
                if let Some(subdir) = subdir {
                    if !self.visit(subdir).await {
                        return false;
                    }
                }
            }
            true
        })
    }
}
