//! File-watch subscription on the canonical schema path.
//!
//! The notify debouncer runs on its own thread and reports raw write activity at poll-interval
//! granularity. [`FileWatcher`] filters that activity down to the one watched file and feeds
//! it into a [`SettleHandle`]; deciding when a change is final is the settle queue's job.
//!
//! The parent directory is watched rather than the file itself so that editors which save by
//! writing a temporary file and renaming it over the original are still observed.

use notify_debouncer_full::{
    new_debouncer,
    notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher},
    DebounceEventResult, Debouncer, FileIdMap,
};
use std::{
    ffi::OsString,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{error::SchemaflowError, settle::SettleHandle};

type FileDebouncer = Debouncer<RecommendedWatcher, FileIdMap>;

pub struct FileWatcher {
    debouncer: FileDebouncer,
    path: PathBuf,
}

impl FileWatcher {
    /// Starts watching `path`, which must exist.
    pub fn start(
        path: &Path,
        poll_interval: Duration,
        settle: SettleHandle,
    ) -> Result<Self, SchemaflowError> {
        let path = path.canonicalize()?;
        let file_name = path
            .file_name()
            .map(|name| name.to_os_string())
            .ok_or_else(|| SchemaflowError::NotFound(format!("{path:?} has no file name")))?;
        let parent = path
            .parent()
            .map(Path::to_path_buf)
            .ok_or_else(|| SchemaflowError::NotFound(format!("{path:?} has no parent")))?;

        let mut debouncer = new_debouncer(
            poll_interval,
            None,
            move |result: DebounceEventResult| match result {
                Ok(events) => {
                    let touched = events.iter().any(|event| {
                        matches!(
                            event.event.kind,
                            EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
                        ) && event.paths.iter().any(|p| is_watched(p, &file_name))
                    });
                    if touched {
                        tracing::debug!("[Watch] Write activity on watched file");
                        if !settle.touch() {
                            tracing::debug!("[Watch] Settle queue closed, dropping event");
                        }
                    }
                }
                Err(errors) => {
                    tracing::warn!("[Watch] File watcher errors: {:?}", errors);
                }
            },
        )?;

        debouncer
            .watcher()
            .watch(&parent, RecursiveMode::NonRecursive)?;
        tracing::info!("[Watch] File watcher started for {}", path.display());

        Ok(FileWatcher { debouncer, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn stop(self) {
        tracing::info!("[Watch] File watcher stopped for {}", self.path.display());
        self.debouncer.stop();
    }
}

fn is_watched(candidate: &Path, file_name: &OsString) -> bool {
    candidate
        .file_name()
        .map(|name| name == file_name.as_os_str())
        .unwrap_or(false)
}
