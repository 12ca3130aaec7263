// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Test-only synchronous caller for driving a live dispatcher
//!
//! The production caller side lives in the embedding process; this minimal
//! stand-in marshals arguments the same way so scenario tests can exercise
//! the bridge end to end from a plain blocking thread.

use std::sync::Arc;

use relayfs_proto::{InitConfig, OpenFlags, OperationCode, ResultCode, WireValue};

use crate::channel::ControlChannel;
use crate::region::SharedRegion;
use crate::wire::WireBuffer;

pub(crate) struct SyncCaller {
    pub(crate) channel: Arc<ControlChannel>,
    pub(crate) region: Arc<SharedRegion>,
    pub(crate) wire: WireBuffer,
}

impl SyncCaller {
    pub(crate) fn new(
        config: &InitConfig,
        channel: Arc<ControlChannel>,
        region: Arc<SharedRegion>,
    ) -> Self {
        let wire = WireBuffer::new(
            region.clone(),
            config.wire_offset as usize,
            config.wire_size as usize,
            config.little_endian,
        )
        .expect("wire window must fit the region");
        Self {
            channel,
            region,
            wire,
        }
    }

    /// Serialize `args`, post the operation, and block for its result.
    pub(crate) fn call(&self, op: OperationCode, args: &[WireValue]) -> ResultCode {
        self.wire
            .serialize(args)
            .expect("arguments must fit the wire window");
        self.channel.post(op);
        let raw = self.channel.await_result(op);
        ResultCode::from_i32(raw).unwrap_or_else(|| panic!("unknown result code {raw}"))
    }

    pub(crate) fn stage_data(&self, data: &[u8]) {
        self.region
            .write_at(0, data)
            .expect("payload must fit the file buffer");
    }

    pub(crate) fn fetch_data(&self, len: usize) -> Vec<u8> {
        self.region
            .read_at(0, len)
            .expect("length must fit the file buffer")
    }

    pub(crate) fn mkdir(&self, path: &str) -> ResultCode {
        self.call(OperationCode::Mkdir, &[WireValue::text(path)])
    }

    pub(crate) fn access(&self, path: &str) -> ResultCode {
        self.call(OperationCode::Access, &[WireValue::text(path)])
    }

    pub(crate) fn open(&self, id: u64, path: &str, flags: OpenFlags) -> ResultCode {
        self.call(
            OperationCode::Open,
            &[
                WireValue::Uint(id),
                WireValue::text(path),
                WireValue::Uint(flags.bits() as u64),
            ],
        )
    }

    pub(crate) fn close(&self, id: u64) -> ResultCode {
        self.call(OperationCode::Close, &[WireValue::Uint(id)])
    }

    pub(crate) fn read(&self, id: u64, len: u64, offset: u64) -> (ResultCode, Vec<u8>) {
        let rc = self.call(
            OperationCode::Read,
            &[
                WireValue::Uint(id),
                WireValue::Uint(len),
                WireValue::Uint(offset),
            ],
        );
        (rc, self.fetch_data(len as usize))
    }

    pub(crate) fn write(&self, id: u64, offset: u64, data: &[u8]) -> ResultCode {
        self.stage_data(data);
        self.call(
            OperationCode::Write,
            &[
                WireValue::Uint(id),
                WireValue::Uint(data.len() as u64),
                WireValue::Uint(offset),
            ],
        )
    }

    pub(crate) fn sync(&self, id: u64) -> ResultCode {
        self.call(
            OperationCode::Sync,
            &[WireValue::Uint(id), WireValue::Uint(0)],
        )
    }

    pub(crate) fn truncate(&self, id: u64, size: u64) -> ResultCode {
        self.call(
            OperationCode::Truncate,
            &[WireValue::Uint(id), WireValue::Uint(size)],
        )
    }

    pub(crate) fn file_size(&self, id: u64) -> (ResultCode, Option<u64>) {
        let rc = self.call(OperationCode::FileSize, &[WireValue::Uint(id)]);
        let size = (rc == ResultCode::Ok)
            .then(|| self.wire.deserialize().ok().flatten())
            .flatten()
            .and_then(|values| match values.as_slice() {
                [WireValue::Uint(size)] => Some(*size),
                _ => None,
            });
        (rc, size)
    }

    pub(crate) fn delete(&self, path: &str, sync_dir: u64, recursive: bool) -> ResultCode {
        self.call(
            OperationCode::Delete,
            &[
                WireValue::text(path),
                WireValue::Uint(sync_dir),
                WireValue::Flag(recursive),
            ],
        )
    }

    pub(crate) fn delete_no_wait(&self, path: &str, sync_dir: u64, recursive: bool) -> ResultCode {
        self.call(
            OperationCode::DeleteNoWait,
            &[
                WireValue::text(path),
                WireValue::Uint(sync_dir),
                WireValue::Flag(recursive),
            ],
        )
    }
}
