//! Filesystem capability
//!
//! Every file the pipeline touches goes through [`FileSystem`] so that the
//! orchestration can run against [`MemoryFileSystem`] in tests.

use crate::error::{BuildError, BuildResult};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use walkdir::WalkDir;

/// Abstraction over file system operations for testability
pub trait FileSystem: Send + Sync {
    /// Check if a path exists
    fn exists(&self, path: &Path) -> bool;

    /// Check if path is a directory
    fn is_dir(&self, path: &Path) -> bool;

    /// Check if path is a file
    fn is_file(&self, path: &Path) -> bool;

    /// Read file contents as string
    fn read_to_string(&self, path: &Path) -> BuildResult<String>;

    /// Create or truncate a file with the given contents
    fn write(&self, path: &Path, contents: &str) -> BuildResult<()>;

    /// Create a directory and all of its parents
    fn create_dir_all(&self, path: &Path) -> BuildResult<()>;

    fn remove_file(&self, path: &Path) -> BuildResult<()>;

    /// Remove a directory tree
    fn remove_dir_all(&self, path: &Path) -> BuildResult<()>;

    /// Copy a single file; `to` is the destination file path
    fn copy(&self, from: &Path, to: &Path) -> BuildResult<()>;

    /// All regular files below `dir`, sorted
    fn walk_files(&self, dir: &Path) -> BuildResult<Vec<PathBuf>>;
}

/// [`FileSystem`] backed by the real disk
#[derive(Debug, Clone, Copy, Default)]
pub struct RealFileSystem;

impl FileSystem for RealFileSystem {
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn is_file(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn read_to_string(&self, path: &Path) -> BuildResult<String> {
        fs::read_to_string(path).map_err(|e| BuildError::io(path, e))
    }

    fn write(&self, path: &Path, contents: &str) -> BuildResult<()> {
        fs::write(path, contents).map_err(|e| BuildError::io(path, e))
    }

    fn create_dir_all(&self, path: &Path) -> BuildResult<()> {
        fs::create_dir_all(path).map_err(|e| BuildError::io(path, e))
    }

    fn remove_file(&self, path: &Path) -> BuildResult<()> {
        fs::remove_file(path).map_err(|e| BuildError::io(path, e))
    }

    fn remove_dir_all(&self, path: &Path) -> BuildResult<()> {
        fs::remove_dir_all(path).map_err(|e| BuildError::io(path, e))
    }

    fn copy(&self, from: &Path, to: &Path) -> BuildResult<()> {
        fs::copy(from, to)
            .map(|_| ())
            .map_err(|e| BuildError::io(from, e))
    }

    fn walk_files(&self, dir: &Path) -> BuildResult<Vec<PathBuf>> {
        let mut files = Vec::new();
        for entry in WalkDir::new(dir).sort_by_file_name() {
            let entry = entry.map_err(|e| {
                let path = e.path().unwrap_or(dir).to_path_buf();
                BuildError::io(path, io::Error::other(e.to_string()))
            })?;
            if entry.file_type().is_file() {
                files.push(entry.into_path());
            }
        }
        Ok(files)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum MemoryEntry {
    File(String),
    Directory,
}

/// In-memory [`FileSystem`]
///
/// Paths are stored exactly as given; parents are created implicitly when a
/// file is written.
#[derive(Debug, Default)]
pub struct MemoryFileSystem {
    entries: RwLock<BTreeMap<PathBuf, MemoryEntry>>,
}

impl MemoryFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style helper to seed a file
    pub fn with_file(self, path: impl AsRef<Path>, contents: &str) -> Self {
        self.add_file(path, contents);
        self
    }

    /// Seed a file (and its parent directories)
    pub fn add_file(&self, path: impl AsRef<Path>, contents: &str) {
        let path = path.as_ref();
        let mut entries = self.write_lock();
        if let Some(parent) = path.parent() {
            Self::ensure_parents(&mut entries, parent);
        }
        entries.insert(path.to_path_buf(), MemoryEntry::File(contents.to_string()));
    }

    /// Seed a directory
    pub fn add_dir(&self, path: impl AsRef<Path>) {
        let mut entries = self.write_lock();
        Self::ensure_parents(&mut entries, path.as_ref());
    }

    /// Contents of a file, if present
    pub fn contents(&self, path: impl AsRef<Path>) -> Option<String> {
        match self.read_lock().get(path.as_ref()) {
            Some(MemoryEntry::File(contents)) => Some(contents.clone()),
            _ => None,
        }
    }

    /// Every file path currently stored
    pub fn files(&self) -> Vec<PathBuf> {
        self.read_lock()
            .iter()
            .filter(|(_, entry)| matches!(entry, MemoryEntry::File(_)))
            .map(|(path, _)| path.clone())
            .collect()
    }

    fn read_lock(&self) -> RwLockReadGuard<'_, BTreeMap<PathBuf, MemoryEntry>> {
        self.entries.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_lock(&self) -> RwLockWriteGuard<'_, BTreeMap<PathBuf, MemoryEntry>> {
        self.entries.write().unwrap_or_else(|e| e.into_inner())
    }

    fn ensure_parents(entries: &mut BTreeMap<PathBuf, MemoryEntry>, path: &Path) {
        let mut current = PathBuf::new();
        for component in path.components() {
            current.push(component);
            entries
                .entry(current.clone())
                .or_insert(MemoryEntry::Directory);
        }
    }

    fn not_found(path: &Path) -> BuildError {
        BuildError::io(
            path,
            io::Error::new(io::ErrorKind::NotFound, "no such file or directory"),
        )
    }
}

impl FileSystem for MemoryFileSystem {
    fn exists(&self, path: &Path) -> bool {
        self.read_lock().contains_key(path)
    }

    fn is_dir(&self, path: &Path) -> bool {
        matches!(self.read_lock().get(path), Some(MemoryEntry::Directory))
    }

    fn is_file(&self, path: &Path) -> bool {
        matches!(self.read_lock().get(path), Some(MemoryEntry::File(_)))
    }

    fn read_to_string(&self, path: &Path) -> BuildResult<String> {
        self.contents(path).ok_or_else(|| Self::not_found(path))
    }

    fn write(&self, path: &Path, contents: &str) -> BuildResult<()> {
        self.add_file(path, contents);
        Ok(())
    }

    fn create_dir_all(&self, path: &Path) -> BuildResult<()> {
        self.add_dir(path);
        Ok(())
    }

    fn remove_file(&self, path: &Path) -> BuildResult<()> {
        let mut entries = self.write_lock();
        match entries.get(path) {
            Some(MemoryEntry::File(_)) => {
                entries.remove(path);
                Ok(())
            }
            _ => Err(Self::not_found(path)),
        }
    }

    fn remove_dir_all(&self, path: &Path) -> BuildResult<()> {
        let mut entries = self.write_lock();
        if !entries.contains_key(path) {
            return Err(Self::not_found(path));
        }
        entries.retain(|p, _| !p.starts_with(path));
        Ok(())
    }

    fn copy(&self, from: &Path, to: &Path) -> BuildResult<()> {
        let contents = self.read_to_string(from)?;
        self.add_file(to, &contents);
        Ok(())
    }

    fn walk_files(&self, dir: &Path) -> BuildResult<Vec<PathBuf>> {
        if !self.exists(dir) {
            return Err(Self::not_found(dir));
        }
        Ok(self
            .read_lock()
            .iter()
            .filter(|(path, entry)| matches!(entry, MemoryEntry::File(_)) && path.starts_with(dir))
            .map(|(path, _)| path.clone())
            .collect())
    }
}
