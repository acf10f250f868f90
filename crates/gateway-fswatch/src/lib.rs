//! A small notify-backed watcher for a single file, used by both the
//! signing-secret reload (`gateway-token`) and the role/storage snapshot
//! reload (`gateway-registry`).
//!
//! Grounded on the teacher's `kubelet::fs_watch` module, which wraps
//! `notify` behind a `Stream`; generalized here from "watch a directory of
//! pod manifests" to "watch one file and re-run a reload closure on change".

use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};
use tracing::error;

/// Watches `path` and invokes `on_change` (given the path) every time the
/// underlying file changes, until the returned handle is dropped.
pub struct FileWatchHandle {
    _watcher: RecommendedWatcher,
    _task: tokio::task::JoinHandle<()>,
}

pub fn watch_file<F>(path: impl AsRef<Path>, mut on_change: F) -> anyhow::Result<FileWatchHandle>
where
    F: FnMut(&Path) + Send + 'static,
{
    let path: PathBuf = path.as_ref().to_owned();
    let (tx, mut rx): (_, UnboundedReceiver<notify::Result<notify::Event>>) = unbounded_channel();

    let mut watcher = notify::recommended_watcher(move |res| {
        if let Err(e) = tx.send(res) {
            error!(error = %e, "unable to forward file-watch event");
        }
    })?;
    watcher.watch(&path, RecursiveMode::NonRecursive)?;

    let task_path = path.clone();
    let task = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            match event {
                Ok(ev) if ev.kind.is_modify() || ev.kind.is_create() => {
                    on_change(&task_path);
                }
                Ok(_) => {}
                Err(e) => error!(error = %e, path = %task_path.display(), "file watch error"),
            }
        }
    });

    Ok(FileWatchHandle {
        _watcher: watcher,
        _task: task,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn fires_on_modification() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("secret.txt");
        tokio::fs::write(&path, "v1").await.unwrap();

        let hits = Arc::new(AtomicUsize::new(0));
        let hits_clone = hits.clone();
        let _handle = watch_file(&path, move |_| {
            hits_clone.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

        tokio::time::sleep(Duration::from_millis(100)).await;
        tokio::fs::write(&path, "v2").await.unwrap();
        tokio::time::sleep(Duration::from_millis(300)).await;

        assert!(hits.load(Ordering::SeqCst) >= 1);
    }
}
