// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Operation handlers for the RelayFS dispatcher
//!
//! One async procedure per virtual-filesystem operation. Every handler
//! converts backend failures into the nearest result code itself; nothing
//! here propagates an error into the dispatch loop. A missing open-file
//! entry is a protocol violation on the caller's part and is reported
//! through the same result codes, never a panic.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, error, warn};

use relayfs_proto::{Command, OpenFlags, OperationCode, ResultCode, WireValue, SYNC_DIR_CLEANUP};

use crate::dispatch::DispatcherContext;
use crate::error::{StorageError, StorageResult};
use crate::handles::{split_path, OpenFile};
use crate::storage::{DirHandle, StorageBackend};

/// Walk `segments` from the backend root, creating missing directories when
/// `create` is set.
pub(crate) async fn resolve_dir(
    backend: &dyn StorageBackend,
    segments: &[String],
    create: bool,
) -> StorageResult<Arc<dyn DirHandle>> {
    let mut dir = backend.root();
    for segment in segments {
        dir = dir.dir(segment, create).await?;
    }
    Ok(dir)
}

/// Resolve the directory containing `path` and split off the file-name
/// component.
pub(crate) async fn dir_for_path(
    backend: &dyn StorageBackend,
    path: &str,
    create: bool,
) -> StorageResult<(Arc<dyn DirHandle>, String)> {
    let mut segments = split_path(path);
    let name = segments.pop().ok_or(StorageError::InvalidName)?;
    let dir = resolve_dir(backend, &segments, create).await?;
    Ok((dir, name))
}

impl DispatcherContext {
    /// Execute one decoded command to completion and produce its result
    /// code.
    pub(crate) async fn execute(&mut self, cmd: Command) -> ResultCode {
        match cmd {
            Command::Mkdir { path } => self.op_mkdir(&path).await,
            Command::Access { path } => self.op_access(&path).await,
            Command::Open { id, path, flags } => self.op_open(id, &path, flags).await,
            Command::Close { id } => self.op_close(id).await,
            Command::Read { id, len, offset } => self.op_read(id, len, offset).await,
            Command::Write { id, len, offset } => self.op_write(id, len, offset).await,
            Command::Sync { id, flags } => self.op_sync(id, flags).await,
            Command::Truncate { id, size } => self.op_truncate(id, size).await,
            Command::FileSize { id } => self.op_file_size(id).await,
            Command::Delete {
                path,
                sync_dir,
                recursive,
            } => {
                self.op_delete(OperationCode::Delete, &path, sync_dir, recursive)
                    .await
            }
            Command::DeleteNoWait {
                path,
                sync_dir,
                recursive,
            } => {
                self.op_delete(OperationCode::DeleteNoWait, &path, sync_dir, recursive)
                    .await
            }
        }
    }

    async fn op_mkdir(&mut self, path: &str) -> ResultCode {
        let wait = Instant::now();
        let created = resolve_dir(self.backend.as_ref(), &split_path(path), true).await;
        self.metrics.add_wait(OperationCode::Mkdir, wait.elapsed());
        match created {
            Ok(_) => ResultCode::Ok,
            Err(err) => {
                debug!(path, error = %err, "mkdir failed");
                ResultCode::Ioerr
            }
        }
    }

    async fn op_access(&mut self, path: &str) -> ResultCode {
        // The backend has no permission bits; present means accessible.
        let wait = Instant::now();
        let outcome = match dir_for_path(self.backend.as_ref(), path, false).await {
            Ok((dir, name)) => dir.file(&name, false).await.map(|_| ()),
            Err(err) => Err(err),
        };
        self.metrics.add_wait(OperationCode::Access, wait.elapsed());
        match outcome {
            Ok(()) => ResultCode::Ok,
            Err(err) => {
                debug!(path, error = %err, "access check failed");
                ResultCode::Ioerr
            }
        }
    }

    async fn op_open(&mut self, id: u64, path: &str, flags: OpenFlags) -> ResultCode {
        let create = flags.contains(OpenFlags::CREATE);
        let wait = Instant::now();
        let resolved = dir_for_path(self.backend.as_ref(), path, create).await;
        let (dir, name) = match resolved {
            Ok(parts) => parts,
            Err(err) => {
                self.metrics.add_wait(OperationCode::Open, wait.elapsed());
                debug!(path, error = %err, "open could not resolve the containing directory");
                return ResultCode::NotFound;
            }
        };
        let opened = match dir.file(&name, create).await {
            Ok(file) => file.open_exclusive().await,
            Err(err) => Err(err),
        };
        self.metrics.add_wait(OperationCode::Open, wait.elapsed());
        match opened {
            Ok(access) => {
                self.files.insert(OpenFile {
                    id,
                    access,
                    dir,
                    path: path.to_string(),
                    name,
                    // A create request always yields a writable handle.
                    read_only: !create && flags.contains(OpenFlags::READ_ONLY),
                    delete_on_close: flags.contains(OpenFlags::DELETE_ON_CLOSE),
                });
                ResultCode::Ok
            }
            Err(err) => {
                error!(path, error = %err, "open failed");
                ResultCode::Ioerr
            }
        }
    }

    async fn op_close(&mut self, id: u64) -> ResultCode {
        let Some(mut entry) = self.files.remove(id) else {
            warn!(id, "close on unknown handle id");
            return ResultCode::NotFound;
        };
        let wait = Instant::now();
        if let Err(err) = entry.access.close().await {
            warn!(id, path = %entry.path, error = %err, "ignoring close failure");
        }
        if entry.delete_on_close {
            if let Err(err) = entry.dir.remove(&entry.name, false).await {
                warn!(id, path = %entry.path, error = %err, "ignoring delete-on-close removal failure");
            }
        }
        self.metrics.add_wait(OperationCode::Close, wait.elapsed());
        ResultCode::Ok
    }

    async fn op_read(&mut self, id: u64, len: u64, offset: u64) -> ResultCode {
        if len > self.config.file_buffer_size {
            error!(id, len, "read length exceeds the file buffer");
            return ResultCode::ReadError;
        }
        let Some(entry) = self.files.get_mut(id) else {
            warn!(id, "read on unknown handle id");
            return ResultCode::ReadError;
        };
        let mut buf = vec![0u8; len as usize];
        let wait = Instant::now();
        let read = entry.access.read_at(offset, &mut buf).await;
        self.metrics.add_wait(OperationCode::Read, wait.elapsed());
        match read {
            Ok(read) => {
                // The tail of `buf` is still zeroed, so staging the whole
                // request zero-fills everything past EOF.
                if let Err(err) = self.region.write_at(0, &buf) {
                    error!(id, error = %err, "failed to stage read result");
                    return ResultCode::ReadError;
                }
                if (read as u64) < len {
                    ResultCode::ShortRead
                } else {
                    ResultCode::Ok
                }
            }
            Err(err) => {
                error!(id, error = %err, "read failed");
                ResultCode::ReadError
            }
        }
    }

    async fn op_write(&mut self, id: u64, len: u64, offset: u64) -> ResultCode {
        if len > self.config.file_buffer_size {
            error!(id, len, "write length exceeds the file buffer");
            return ResultCode::WriteError;
        }
        let data = match self.region.read_at(0, len as usize) {
            Ok(data) => data,
            Err(err) => {
                error!(id, error = %err, "failed to fetch write payload");
                return ResultCode::WriteError;
            }
        };
        let Some(entry) = self.files.get_mut(id) else {
            warn!(id, "write on unknown handle id");
            return ResultCode::WriteError;
        };
        if entry.read_only {
            warn!(id, path = %entry.path, "write on read-only handle");
            return ResultCode::WriteError;
        }
        let wait = Instant::now();
        let written = entry.access.write_at(offset, &data).await;
        self.metrics.add_wait(OperationCode::Write, wait.elapsed());
        match written {
            Ok(written) if written == data.len() => ResultCode::Ok,
            Ok(written) => {
                error!(id, written, expected = data.len(), "short write");
                ResultCode::WriteError
            }
            Err(err) => {
                error!(id, error = %err, "write failed");
                ResultCode::WriteError
            }
        }
    }

    async fn op_sync(&mut self, id: u64, _flags: u64) -> ResultCode {
        // Nothing to flush is not an error; sync never fails.
        let Some(entry) = self.files.get_mut(id) else {
            return ResultCode::Ok;
        };
        if entry.read_only {
            return ResultCode::Ok;
        }
        let wait = Instant::now();
        if let Err(err) = entry.access.flush().await {
            warn!(id, path = %entry.path, error = %err, "ignoring flush failure");
        }
        self.metrics.add_wait(OperationCode::Sync, wait.elapsed());
        ResultCode::Ok
    }

    async fn op_truncate(&mut self, id: u64, size: u64) -> ResultCode {
        let Some(entry) = self.files.get_mut(id) else {
            warn!(id, "truncate on unknown handle id");
            return ResultCode::TruncateError;
        };
        if entry.read_only {
            warn!(id, path = %entry.path, "truncate on read-only handle");
            return ResultCode::TruncateError;
        }
        let wait = Instant::now();
        let truncated = entry.access.truncate(size).await;
        self.metrics.add_wait(OperationCode::Truncate, wait.elapsed());
        match truncated {
            Ok(()) => ResultCode::Ok,
            Err(err) => {
                error!(id, size, error = %err, "truncate failed");
                ResultCode::TruncateError
            }
        }
    }

    async fn op_file_size(&mut self, id: u64) -> ResultCode {
        let Some(entry) = self.files.get_mut(id) else {
            warn!(id, "file-size on unknown handle id");
            return ResultCode::Ioerr;
        };
        let wait = Instant::now();
        let size = entry.access.size().await;
        self.metrics.add_wait(OperationCode::FileSize, wait.elapsed());
        match size {
            Ok(size) => match self.wire.serialize(&[WireValue::Uint(size)]) {
                Ok(()) => ResultCode::Ok,
                Err(err) => {
                    error!(id, error = %err, "failed to emit file size");
                    ResultCode::Ioerr
                }
            },
            Err(err) => {
                error!(id, error = %err, "file-size query failed");
                ResultCode::Ioerr
            }
        }
    }

    async fn op_delete(
        &mut self,
        op: OperationCode,
        path: &str,
        sync_dir: u64,
        recursive: bool,
    ) -> ResultCode {
        let wait = Instant::now();
        let rc = delete_path(self.backend.as_ref(), path, sync_dir, recursive).await;
        self.metrics.add_wait(op, wait.elapsed());
        rc
    }
}

async fn delete_path(
    backend: &dyn StorageBackend,
    path: &str,
    sync_dir: u64,
    recursive: bool,
) -> ResultCode {
    let mut segments = split_path(path);
    let Some(leaf) = segments.pop() else {
        // No leaf to remove; nothing to report.
        return ResultCode::Ok;
    };
    let removed = match resolve_dir(backend, &segments, false).await {
        Ok(dir) => dir.remove(&leaf, recursive).await,
        Err(err) => Err(err),
    };
    if let Err(err) = removed {
        debug!(path, error = %err, "delete failed");
        return ResultCode::DeleteError;
    }
    if sync_dir != SYNC_DIR_CLEANUP {
        return ResultCode::Ok;
    }
    // Best-effort ancestor cleanup: remove newly-empty directories walking
    // upward, stopping at the first failure. The leaf is already gone, so
    // nothing here changes the reported result.
    while let Some(name) = segments.pop() {
        let removed = match resolve_dir(backend, &segments, false).await {
            Ok(parent) => parent.remove(&name, false).await,
            Err(err) => Err(err),
        };
        if let Err(err) = removed {
            debug!(ancestor = %name, error = %err, "stopping ancestor cleanup");
            break;
        }
    }
    ResultCode::Ok
}
