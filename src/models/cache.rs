use std::{
    fs::{self, File},
    io::Write,
    path::{Path, PathBuf},
};

use directories::BaseDirs;
use parking_lot::RwLock;

use crate::error::{HubError, Result};

use super::{manifest::ModelRecord, metadata::is_sha256_hex};

pub const HOME_ENV: &str = "ONNX_HOME";

/// Owns the cache root and every path derived from it.
#[derive(Debug)]
pub struct CacheStore {
    root: RwLock<PathBuf>,
}

impl CacheStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: RwLock::new(root.into()),
        }
    }

    #[must_use]
    pub fn root(&self) -> PathBuf {
        self.root.read().clone()
    }

    /// Later operations use `root`; entries under the old root stay put.
    pub fn set_root(&self, root: impl Into<PathBuf>) {
        let root = root.into();
        tracing::debug!(root = %root.display(), "Cache root changed");
        *self.root.write() = root;
    }

    /// `{owner}/{name}/{model}/opset{N}/{file}` relative to the root.
    #[must_use]
    pub fn relative_path_for(&self, owner: &str, name: &str, record: &ModelRecord) -> PathBuf {
        let file = file_name(&record.model_path);
        let file = match record.model_sha.as_deref().filter(|sha| is_sha256_hex(sha)) {
            Some(sha) => format!("{}_{file}", sha.to_ascii_lowercase()),
            None => file,
        };
        PathBuf::from(owner)
            .join(name)
            .join(model_key(&record.model))
            .join(format!("opset{}", record.opset_version))
            .join(file)
    }

    #[must_use]
    pub fn path_for(&self, owner: &str, name: &str, record: &ModelRecord) -> PathBuf {
        self.root().join(self.relative_path_for(owner, name, record))
    }

    #[must_use]
    pub fn exists(&self, path: &Path) -> bool {
        path.is_file()
    }

    pub fn read(&self, path: &Path) -> Result<Vec<u8>> {
        fs::read(path).map_err(|err| HubError::io(path, err))
    }

    /// Replaces `path` with `bytes` atomically; readers see the old content
    /// or the new one, never a prefix.
    pub fn write(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        let parent = path
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(parent).map_err(|err| HubError::io(parent, err))?;

        let staging = StagingFile::create(parent, path)?;
        staging.fill(bytes)?;
        staging.persist(path)
    }

    /// Removes a cached entry. Returns whether anything was removed.
    pub fn invalidate(&self, path: &Path) -> Result<bool> {
        match fs::remove_file(path) {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(HubError::io(path, err)),
        }
    }
}

impl Default for CacheStore {
    fn default() -> Self {
        Self::new(default_cache_dir())
    }
}

/// `$ONNX_HOME/hub`, else `<cache dir>/onnx/hub`.
#[must_use]
pub fn default_cache_dir() -> PathBuf {
    if let Some(home) = std::env::var_os(HOME_ENV).filter(|home| !home.is_empty()) {
        return PathBuf::from(home).join("hub");
    }
    BaseDirs::new()
        .map(|dirs| dirs.cache_dir().join("onnx").join("hub"))
        .unwrap_or_else(|| std::env::temp_dir().join("onnx").join("hub"))
}

/// Temp sibling of the destination; removed on drop unless persisted.
struct StagingFile {
    path: PathBuf,
    file: Option<File>,
    persisted: bool,
}

impl StagingFile {
    fn create(dir: &Path, target: &Path) -> Result<Self> {
        let stem = target
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "artifact".into());
        let path = dir.join(format!(".{stem}.{}.part", uuid::Uuid::new_v4().simple()));
        let file = File::create(&path).map_err(|err| HubError::io(&path, err))?;
        Ok(Self {
            path,
            file: Some(file),
            persisted: false,
        })
    }

    fn fill(&self, bytes: &[u8]) -> Result<()> {
        let Some(mut file) = self.file.as_ref() else {
            return Err(HubError::io(
                &self.path,
                std::io::Error::other("staging file already closed"),
            ));
        };
        file.write_all(bytes)
            .and_then(|()| file.flush())
            .and_then(|()| file.sync_all())
            .map_err(|err| HubError::io(&self.path, err))
    }

    fn persist(mut self, target: &Path) -> Result<()> {
        drop(self.file.take());
        fs::rename(&self.path, target).map_err(|err| HubError::io(target, err))?;
        self.persisted = true;
        Ok(())
    }
}

impl Drop for StagingFile {
    fn drop(&mut self) {
        drop(self.file.take());
        if !self.persisted {
            let _ = fs::remove_file(&self.path);
        }
    }
}

fn file_name(model_path: &str) -> String {
    model_path
        .replace('\\', "/")
        .split('/')
        .filter(|segment| !segment.is_empty())
        .last()
        .map(|segment| segment.split(['?', '#']).next().unwrap_or(segment).to_string())
        .filter(|segment| !segment.is_empty() && segment != "." && segment != "..")
        .unwrap_or_else(|| "model.onnx".into())
}

/// Lower-cased model name with bytes outside `[a-z0-9._-]` percent-encoded,
/// so distinct names never share a directory.
fn model_key(model: &str) -> String {
    let mut key = String::with_capacity(model.len());
    for byte in model.to_lowercase().bytes() {
        match byte {
            b'a'..=b'z' | b'0'..=b'9' | b'.' | b'_' | b'-' => key.push(byte as char),
            other => key.push_str(&format!("%{other:02X}")),
        }
    }
    if key.is_empty() || key == "." || key == ".." {
        key = key.replace('.', "%2E");
        if key.is_empty() {
            key.push_str("%00");
        }
    }
    key
}
