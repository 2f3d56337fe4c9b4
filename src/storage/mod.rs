//! Blocking JSON document storage shared by the filesystem adapters.
//!
//! Each store owns one directory below the configured state root and keeps
//! one JSON document per key. Writes land in a uniquely named temporary file
//! that is synced and renamed over the target, so readers observe either the
//! previous document or the new one and never a torn write.

use camino::Utf8Path;
use cap_std::ambient_authority;
use cap_std::fs_utf8::Dir;
use serde::{Serialize, de::DeserializeOwned};
use std::io::{self, Write};
use std::sync::Arc;
use uuid::Uuid;

const DOCUMENT_SUFFIX: &str = ".json";

/// Directory of JSON documents addressed by key.
#[derive(Debug, Clone)]
pub(crate) struct JsonDir {
    dir: Arc<Dir>,
}

impl JsonDir {
    /// Opens `root/name`, creating both directories when missing.
    pub(crate) fn open(root: &Utf8Path, name: &str) -> io::Result<Self> {
        Dir::create_ambient_dir_all(root, ambient_authority())?;
        let root_dir = Dir::open_ambient_dir(root, ambient_authority())?;
        root_dir.create_dir_all(name)?;
        let dir = root_dir.open_dir(name)?;
        Ok(Self { dir: Arc::new(dir) })
    }

    /// Reads and decodes the document stored under `key`.
    ///
    /// Returns `Ok(None)` when no document exists.
    pub(crate) fn read<T: DeserializeOwned>(&self, key: &str) -> io::Result<Option<T>> {
        let contents = match self.dir.read_to_string(document_name(key)) {
            Ok(contents) => contents,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err),
        };
        serde_json::from_str(&contents)
            .map(Some)
            .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))
    }

    /// Atomically replaces the document stored under `key`.
    pub(crate) fn write<T: Serialize>(&self, key: &str, value: &T) -> io::Result<()> {
        let bytes = serde_json::to_vec_pretty(value)
            .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?;
        write_atomic(&self.dir, &document_name(key), &bytes)
    }

    /// Removes the document stored under `key`.
    ///
    /// Returns `false` when there was nothing to remove.
    pub(crate) fn remove(&self, key: &str) -> io::Result<bool> {
        match self.dir.remove_file(document_name(key)) {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// Decodes every document in the directory, skipping staging files.
    pub(crate) fn read_all<T: DeserializeOwned>(&self) -> io::Result<Vec<T>> {
        let mut documents = Vec::new();
        for entry in self.dir.entries()? {
            let file_name = entry?.file_name()?;
            if file_name.starts_with('.') {
                continue;
            }
            let Some(key) = file_name.strip_suffix(DOCUMENT_SUFFIX) else {
                continue;
            };
            if let Some(document) = self.read(key)? {
                documents.push(document);
            }
        }
        Ok(documents)
    }
}

fn document_name(key: &str) -> String {
    format!("{key}{DOCUMENT_SUFFIX}")
}

/// Replaces `target` in `dir` with `bytes` through a synced staging file.
pub(crate) fn write_atomic(dir: &Dir, target: &str, bytes: &[u8]) -> io::Result<()> {
    let staging = format!(".{target}.{}.tmp", Uuid::new_v4().simple());
    let mut file = dir.create(&staging)?;
    file.write_all(bytes)?;
    file.sync_all()?;
    drop(file);
    if let Err(err) = dir.rename(&staging, dir, target) {
        let _cleanup = dir.remove_file(&staging);
        return Err(err);
    }
    Ok(())
}

/// Runs blocking filesystem work on the dedicated blocking thread pool.
pub(crate) async fn run_blocking<F, T>(f: F) -> io::Result<T>
where
    F: FnOnce() -> io::Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|err| io::Error::other(format!("blocking task failed: {err}")))?
}
