// src/pose/watcher.rs
//! Hot reload of the reference library file

use crate::error::LibraryError;
use crate::pose::library::{LibraryStore, PoseLibrary};
use notify::{DebouncedEvent, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

const DEBOUNCE: Duration = Duration::from_millis(500);

/// Reloads the library into a [`LibraryStore`] whenever its file is written.
///
/// A reload that fails keeps the previous snapshot. Dropping the watcher stops it.
pub struct LibraryWatcher {
    _watcher: RecommendedWatcher,
    path: PathBuf,
}

impl LibraryWatcher {
    pub fn spawn<P: AsRef<Path>>(path: P, store: LibraryStore) -> Result<Self, LibraryError> {
        let path = path.as_ref().to_path_buf();
        let (watch_tx, watch_rx) = mpsc::channel();
        let mut watcher = notify::watcher(watch_tx, DEBOUNCE)
            .map_err(|e| LibraryError::Watch(e.to_string()))?;

        // Watch the directory so that editors replacing the file are seen too
        let directory = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        watcher
            .watch(directory, RecursiveMode::NonRecursive)
            .map_err(|e| LibraryError::Watch(e.to_string()))?;

        let target = path.clone();
        thread::spawn(move || {
            while let Ok(event) = watch_rx.recv() {
                match event {
                    DebouncedEvent::Write(changed) | DebouncedEvent::Create(changed)
                        if same_file(&changed, &target) =>
                    {
                        reload(&target, &store);
                    }
                    DebouncedEvent::Error(e, _) => warn!(error = %e, "library watcher error"),
                    other => debug!(event = ?other, "ignoring filesystem event"),
                }
            }
            debug!(path = %target.display(), "library watcher stopped");
        });

        info!(path = %path.display(), "watching pose library");
        Ok(Self {
            _watcher: watcher,
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => a.file_name() == b.file_name(),
    }
}

fn reload(path: &Path, store: &LibraryStore) {
    match PoseLibrary::load(path) {
        Ok(library) => {
            info!(path = %path.display(), poses = library.len(), "reloaded pose library");
            store.replace(library);
        }
        Err(e) => warn!(error = %e, "keeping previous pose library"),
    }
}
