// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Storage backend traits and the in-memory backend for RelayFS Core
//!
//! The dispatcher only assumes what these traits promise: directories
//! resolved (or created) one segment at a time, files opened within a
//! directory, and an exclusive handle per file carrying byte-range
//! read/write/truncate/flush/size. Durability, layout, and
//! recursive-removal behavior belong to the backend.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use crate::error::{StorageError, StorageResult};

/// Handle-based asynchronous storage backend.
pub trait StorageBackend: Send + Sync {
    fn root(&self) -> Arc<dyn DirHandle>;
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait DirHandle: Send + Sync {
    /// Resolve a child directory, creating it when `create` is set.
    async fn dir(&self, name: &str, create: bool) -> StorageResult<Arc<dyn DirHandle>>;

    /// Open a file node within this directory, creating it when `create`
    /// is set.
    async fn file(&self, name: &str, create: bool) -> StorageResult<Arc<dyn FileNode>>;

    /// Remove a directory entry. Removing a non-empty directory fails
    /// unless `recursive` is set.
    async fn remove(&self, name: &str, recursive: bool) -> StorageResult<()>;
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait FileNode: Send + Sync {
    /// Acquire the file's exclusive read/write handle. Fails with
    /// [`StorageError::Locked`] while another holder is live.
    async fn open_exclusive(&self) -> StorageResult<Box<dyn ExclusiveHandle>>;
}

/// Byte-range access to one file, held by at most one owner at a time.
/// Dropping an unclosed handle releases exclusivity; release is idempotent.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ExclusiveHandle: Send + Sync {
    async fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> StorageResult<usize>;
    async fn write_at(&mut self, offset: u64, data: &[u8]) -> StorageResult<usize>;
    async fn truncate(&mut self, size: u64) -> StorageResult<()>;
    async fn flush(&mut self) -> StorageResult<()>;
    async fn size(&self) -> StorageResult<u64>;
    async fn close(&mut self) -> StorageResult<()>;
}

/// In-memory storage backend implementation
pub struct MemoryBackend {
    root: Arc<MemoryDir>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            root: Arc::new(MemoryDir::new()),
        }
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl StorageBackend for MemoryBackend {
    fn root(&self) -> Arc<dyn DirHandle> {
        self.root.clone()
    }
}

struct MemoryDir {
    entries: Mutex<HashMap<String, MemoryNode>>,
}

#[derive(Clone)]
enum MemoryNode {
    Dir(Arc<MemoryDir>),
    File(Arc<MemoryFile>),
}

impl MemoryDir {
    fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl DirHandle for MemoryDir {
    async fn dir(&self, name: &str, create: bool) -> StorageResult<Arc<dyn DirHandle>> {
        if name.is_empty() {
            return Err(StorageError::InvalidName);
        }
        let mut entries = self.entries.lock().unwrap();
        match entries.get(name) {
            Some(MemoryNode::Dir(dir)) => Ok(dir.clone()),
            Some(MemoryNode::File(_)) => Err(StorageError::NotADirectory),
            None if create => {
                let dir = Arc::new(MemoryDir::new());
                entries.insert(name.to_string(), MemoryNode::Dir(dir.clone()));
                Ok(dir)
            }
            None => Err(StorageError::NotFound),
        }
    }

    async fn file(&self, name: &str, create: bool) -> StorageResult<Arc<dyn FileNode>> {
        if name.is_empty() {
            return Err(StorageError::InvalidName);
        }
        let mut entries = self.entries.lock().unwrap();
        match entries.get(name) {
            Some(MemoryNode::File(file)) => Ok(file.clone()),
            Some(MemoryNode::Dir(_)) => Err(StorageError::IsADirectory),
            None if create => {
                let file = Arc::new(MemoryFile::new());
                entries.insert(name.to_string(), MemoryNode::File(file.clone()));
                Ok(file)
            }
            None => Err(StorageError::NotFound),
        }
    }

    async fn remove(&self, name: &str, recursive: bool) -> StorageResult<()> {
        let mut entries = self.entries.lock().unwrap();
        match entries.get(name) {
            None => return Err(StorageError::NotFound),
            Some(MemoryNode::Dir(dir)) => {
                if !recursive && !dir.entries.lock().unwrap().is_empty() {
                    return Err(StorageError::NotEmpty);
                }
            }
            Some(MemoryNode::File(file)) => {
                if file.contents.held.load(Ordering::SeqCst) {
                    return Err(StorageError::Locked);
                }
            }
        }
        entries.remove(name);
        Ok(())
    }
}

struct MemoryFile {
    contents: Arc<FileContents>,
}

struct FileContents {
    data: Mutex<Vec<u8>>,
    held: AtomicBool,
}

impl MemoryFile {
    fn new() -> Self {
        Self {
            contents: Arc::new(FileContents {
                data: Mutex::new(Vec::new()),
                held: AtomicBool::new(false),
            }),
        }
    }
}

#[async_trait]
impl FileNode for MemoryFile {
    async fn open_exclusive(&self) -> StorageResult<Box<dyn ExclusiveHandle>> {
        self.contents
            .held
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map_err(|_| StorageError::Locked)?;
        Ok(Box::new(MemoryHandle {
            contents: self.contents.clone(),
        }))
    }
}

struct MemoryHandle {
    contents: Arc<FileContents>,
}

#[async_trait]
impl ExclusiveHandle for MemoryHandle {
    async fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> StorageResult<usize> {
        let data = self.contents.data.lock().unwrap();
        let start = offset as usize;
        if start >= data.len() {
            return Ok(0);
        }
        let end = std::cmp::min(start + buf.len(), data.len());
        buf[..end - start].copy_from_slice(&data[start..end]);
        Ok(end - start)
    }

    async fn write_at(&mut self, offset: u64, data: &[u8]) -> StorageResult<usize> {
        let mut contents = self.contents.data.lock().unwrap();
        let start = offset as usize;
        let end = start + data.len();
        if contents.len() < end {
            contents.resize(end, 0);
        }
        contents[start..end].copy_from_slice(data);
        Ok(data.len())
    }

    async fn truncate(&mut self, size: u64) -> StorageResult<()> {
        self.contents.data.lock().unwrap().resize(size as usize, 0);
        Ok(())
    }

    async fn flush(&mut self) -> StorageResult<()> {
        Ok(())
    }

    async fn size(&self) -> StorageResult<u64> {
        Ok(self.contents.data.lock().unwrap().len() as u64)
    }

    async fn close(&mut self) -> StorageResult<()> {
        self.contents.held.store(false, Ordering::SeqCst);
        Ok(())
    }
}

impl Drop for MemoryHandle {
    fn drop(&mut self) {
        self.contents.held.store(false, Ordering::SeqCst);
    }
}
