// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Operation codes, result codes, and open flags for the RelayFS channel

use bitflags::bitflags;

/// Identifier for each virtual-filesystem operation the dispatcher serves.
///
/// The code doubles as the operation's result-slot index in the control
/// channel; slot 0 is reserved for the command cell, so codes start at 1.
/// Codes are stable for the lifetime of a channel instance.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum OperationCode {
    Mkdir = 1,
    Access = 2,
    Close = 3,
    Delete = 4,
    DeleteNoWait = 5,
    FileSize = 6,
    Open = 7,
    Read = 8,
    Sync = 9,
    Truncate = 10,
    Write = 11,
}

impl OperationCode {
    /// Number of defined operations.
    pub const COUNT: usize = 11;

    /// Number of channel slots: one result slot per operation plus the
    /// command slot at index 0.
    pub const SLOT_COUNT: usize = Self::COUNT + 1;

    pub const ALL: [OperationCode; Self::COUNT] = [
        OperationCode::Mkdir,
        OperationCode::Access,
        OperationCode::Close,
        OperationCode::Delete,
        OperationCode::DeleteNoWait,
        OperationCode::FileSize,
        OperationCode::Open,
        OperationCode::Read,
        OperationCode::Sync,
        OperationCode::Truncate,
        OperationCode::Write,
    ];

    pub fn from_i32(value: i32) -> Option<Self> {
        Self::ALL.iter().copied().find(|op| *op as i32 == value)
    }

    /// Index of this operation's result slot in the control channel.
    pub fn result_slot(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            OperationCode::Mkdir => "mkdir",
            OperationCode::Access => "access",
            OperationCode::Close => "close",
            OperationCode::Delete => "delete",
            OperationCode::DeleteNoWait => "delete_no_wait",
            OperationCode::FileSize => "file_size",
            OperationCode::Open => "open",
            OperationCode::Read => "read",
            OperationCode::Sync => "sync",
            OperationCode::Truncate => "truncate",
            OperationCode::Write => "write",
        }
    }
}

/// Status written to an operation's result slot once its handler completes.
///
/// A result slot never carries anything but a status; file-size emits the
/// 64-bit size through the serialization buffer alongside its `Ok`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(i32)]
pub enum ResultCode {
    Ok = 0,
    NotFound = 1,
    Ioerr = 2,
    ShortRead = 3,
    ReadError = 4,
    WriteError = 5,
    TruncateError = 6,
    DeleteError = 7,
}

impl ResultCode {
    pub const ALL: [ResultCode; 8] = [
        ResultCode::Ok,
        ResultCode::NotFound,
        ResultCode::Ioerr,
        ResultCode::ShortRead,
        ResultCode::ReadError,
        ResultCode::WriteError,
        ResultCode::TruncateError,
        ResultCode::DeleteError,
    ];

    pub fn from_i32(value: i32) -> Option<Self> {
        Self::ALL.iter().copied().find(|rc| *rc as i32 == value)
    }
}

/// Sentinel value a caller may pass in a delete request's `sync_dir`
/// argument to request best-effort removal of newly-empty ancestor
/// directories after the leaf entry is gone.
pub const SYNC_DIR_CLEANUP: u64 = 0x1234;

/// Value a caller parks in a result slot before posting a command; the
/// dispatcher's published result replaces it.
pub const RESULT_PENDING: i32 = -1;

/// Command-slot value meaning "no operation pending".
pub const OP_IDLE: i32 = 0;

bitflags! {
    /// Flag bits carried in an open request.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct OpenFlags: u32 {
        const READ_ONLY = 0x01;
        const READ_WRITE = 0x02;
        const CREATE = 0x04;
        const DELETE_ON_CLOSE = 0x08;
    }
}
