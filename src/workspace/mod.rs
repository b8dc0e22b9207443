//! The set of files a pass reads and rewrites.

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::{DirEntry, WalkDir};

#[derive(Debug, Error)]
pub enum WorkspaceError {
    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("git error: {0}")]
    Git(#[from] crate::git::GitError),
}

pub type Result<T> = std::result::Result<T, WorkspaceError>;

/// File access used by the serializer, deserializer and suggestion builder.
///
/// Paths are relative to the workspace root and use `/` separators.
pub trait Workspace {
    /// Every file in the workspace, sorted.
    fn files(&self) -> Result<Vec<PathBuf>>;

    /// Text content of `path`. `None` when the file is missing or is not
    /// UTF-8 text.
    fn read(&self, path: &Path) -> Result<Option<String>>;

    fn exists(&self, path: &Path) -> bool;

    fn write(&mut self, path: &Path, content: &str) -> Result<()>;

    fn remove(&mut self, path: &Path) -> Result<()>;
}

/// Whether raw file bytes should be treated as text.
pub fn decode_text(bytes: Vec<u8>) -> Option<String> {
    if bytes.contains(&0) {
        return None;
    }
    String::from_utf8(bytes).ok()
}

/// A directory on disk.
///
/// Inside a git checkout the file list comes from `git ls-files` (tracked
/// and untracked-but-not-ignored files); elsewhere the tree is walked,
/// skipping hidden directories.
#[derive(Debug, Clone)]
pub struct FsWorkspace {
    root: PathBuf,
}

impl FsWorkspace {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn io_error(&self, path: &Path, source: std::io::Error) -> WorkspaceError {
        WorkspaceError::Io {
            path: self.root.join(path),
            source,
        }
    }

    /// Every regular file under the root, outside hidden and `target`
    /// directories.
    fn walk(&self) -> Result<Vec<PathBuf>> {
        let mut out = Vec::new();
        let entries = WalkDir::new(&self.root)
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !is_skipped_dir(e));
        for entry in entries {
            let entry = entry.map_err(|e| {
                let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| self.root.clone());
                WorkspaceError::Io {
                    path,
                    source: e.into(),
                }
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            if let Ok(relative) = entry.path().strip_prefix(&self.root) {
                out.push(relative.to_path_buf());
            }
        }
        Ok(out)
    }
}

fn is_skipped_dir(entry: &DirEntry) -> bool {
    entry.file_type().is_dir()
        && entry
            .file_name()
            .to_str()
            .is_some_and(|name| name.starts_with('.') || name == "target")
}

impl Workspace for FsWorkspace {
    fn files(&self) -> Result<Vec<PathBuf>> {
        let mut files = if crate::git::is_repo(&self.root) {
            crate::git::list_files(&self.root)?
        } else {
            self.walk()?
        };
        files.retain(|path| self.root.join(path).is_file());
        files.sort();
        Ok(files)
    }

    fn read(&self, path: &Path) -> Result<Option<String>> {
        match fs::read(self.root.join(path)) {
            Ok(bytes) => Ok(decode_text(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(self.io_error(path, e)),
        }
    }

    fn exists(&self, path: &Path) -> bool {
        self.root.join(path).is_file()
    }

    fn write(&mut self, path: &Path, content: &str) -> Result<()> {
        let full = self.root.join(path);
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent).map_err(|e| self.io_error(path, e))?;
        }
        fs::write(&full, content).map_err(|e| self.io_error(path, e))
    }

    fn remove(&mut self, path: &Path) -> Result<()> {
        match fs::remove_file(self.root.join(path)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(self.io_error(path, e)),
        }
    }
}

/// In-memory file set, used by tests and by callers that stage content
/// before touching disk.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryWorkspace {
    files: BTreeMap<PathBuf, Vec<u8>>,
}

impl MemoryWorkspace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a workspace from `(path, text)` pairs.
    pub fn from_files<'a>(files: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        Self {
            files: files
                .into_iter()
                .map(|(path, text)| (PathBuf::from(path), text.as_bytes().to_vec()))
                .collect(),
        }
    }

    pub fn insert_bytes(&mut self, path: impl Into<PathBuf>, bytes: Vec<u8>) {
        self.files.insert(path.into(), bytes);
    }

    /// Text of `path`, for assertions.
    pub fn get(&self, path: &str) -> Option<&str> {
        self.files
            .get(Path::new(path))
            .and_then(|bytes| std::str::from_utf8(bytes).ok())
    }
}

impl Workspace for MemoryWorkspace {
    fn files(&self) -> Result<Vec<PathBuf>> {
        Ok(self.files.keys().cloned().collect())
    }

    fn read(&self, path: &Path) -> Result<Option<String>> {
        Ok(self.files.get(path).cloned().and_then(decode_text))
    }

    fn exists(&self, path: &Path) -> bool {
        self.files.contains_key(path)
    }

    fn write(&mut self, path: &Path, content: &str) -> Result<()> {
        self.files
            .insert(path.to_path_buf(), content.as_bytes().to_vec());
        Ok(())
    }

    fn remove(&mut self, path: &Path) -> Result<()> {
        self.files.remove(path);
        Ok(())
    }
}
