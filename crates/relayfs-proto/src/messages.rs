// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Wire values, typed commands, and the initialization message for RelayFS

use serde::{Deserialize, Serialize};
use ssz_derive::{Decode, Encode};
use thiserror::Error;

use crate::codes::{OpenFlags, OperationCode};

// SSZ union for the value kinds that cross the serialization buffer.
// No protocol value is negative, so unsigned integers cover everything.

/// One value in an ordered argument (or spot-result) list.
#[derive(Clone, Debug, PartialEq, Encode, Decode)]
#[ssz(enum_behaviour = "union")]
pub enum WireValue {
    Uint(u64),
    Text(Vec<u8>),
    Flag(bool),
}

impl WireValue {
    pub fn text(value: &str) -> Self {
        WireValue::Text(value.as_bytes().to_vec())
    }

    fn as_uint(&self) -> Result<u64, ProtocolError> {
        match self {
            WireValue::Uint(v) => Ok(*v),
            _ => Err(ProtocolError::TypeMismatch("unsigned integer")),
        }
    }

    fn as_text(&self) -> Result<String, ProtocolError> {
        match self {
            WireValue::Text(bytes) => String::from_utf8(bytes.clone())
                .map_err(|_| ProtocolError::TypeMismatch("utf-8 text")),
            _ => Err(ProtocolError::TypeMismatch("utf-8 text")),
        }
    }

    fn as_flag(&self) -> Result<bool, ProtocolError> {
        match self {
            WireValue::Flag(v) => Ok(*v),
            _ => Err(ProtocolError::TypeMismatch("flag")),
        }
    }
}

/// A malformed command: the caller and dispatcher disagree about the
/// protocol (usually a version mismatch).
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("unknown operation code {0}")]
    UnknownOperation(i32),
    #[error("wrong argument count for {op}: expected {expected}, got {got}")]
    Arity {
        op: &'static str,
        expected: usize,
        got: usize,
    },
    #[error("argument type mismatch: expected {0}")]
    TypeMismatch(&'static str),
}

/// An operation together with its decoded, validated arguments.
///
/// Pairing the command-slot code with a typed union gives the dispatcher an
/// exhaustive match instead of a runtime handler lookup.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    Mkdir { path: String },
    Access { path: String },
    Open { id: u64, path: String, flags: OpenFlags },
    Close { id: u64 },
    Read { id: u64, len: u64, offset: u64 },
    Write { id: u64, len: u64, offset: u64 },
    Sync { id: u64, flags: u64 },
    Truncate { id: u64, size: u64 },
    FileSize { id: u64 },
    Delete { path: String, sync_dir: u64, recursive: bool },
    DeleteNoWait { path: String, sync_dir: u64, recursive: bool },
}

impl Command {
    /// Decode the argument list posted for `op` into a typed command.
    pub fn decode(op: OperationCode, values: &[WireValue]) -> Result<Command, ProtocolError> {
        match op {
            OperationCode::Mkdir => {
                expect_arity(op, values, 1)?;
                Ok(Command::Mkdir {
                    path: values[0].as_text()?,
                })
            }
            OperationCode::Access => {
                expect_arity(op, values, 1)?;
                Ok(Command::Access {
                    path: values[0].as_text()?,
                })
            }
            OperationCode::Open => {
                expect_arity(op, values, 3)?;
                Ok(Command::Open {
                    id: values[0].as_uint()?,
                    path: values[1].as_text()?,
                    flags: OpenFlags::from_bits_truncate(values[2].as_uint()? as u32),
                })
            }
            OperationCode::Close => {
                expect_arity(op, values, 1)?;
                Ok(Command::Close {
                    id: values[0].as_uint()?,
                })
            }
            OperationCode::Read => {
                expect_arity(op, values, 3)?;
                Ok(Command::Read {
                    id: values[0].as_uint()?,
                    len: values[1].as_uint()?,
                    offset: values[2].as_uint()?,
                })
            }
            OperationCode::Write => {
                expect_arity(op, values, 3)?;
                Ok(Command::Write {
                    id: values[0].as_uint()?,
                    len: values[1].as_uint()?,
                    offset: values[2].as_uint()?,
                })
            }
            OperationCode::Sync => {
                expect_arity(op, values, 2)?;
                Ok(Command::Sync {
                    id: values[0].as_uint()?,
                    flags: values[1].as_uint()?,
                })
            }
            OperationCode::Truncate => {
                expect_arity(op, values, 2)?;
                Ok(Command::Truncate {
                    id: values[0].as_uint()?,
                    size: values[1].as_uint()?,
                })
            }
            OperationCode::FileSize => {
                expect_arity(op, values, 1)?;
                Ok(Command::FileSize {
                    id: values[0].as_uint()?,
                })
            }
            OperationCode::Delete => {
                expect_arity(op, values, 3)?;
                Ok(Command::Delete {
                    path: values[0].as_text()?,
                    sync_dir: values[1].as_uint()?,
                    recursive: values[2].as_flag()?,
                })
            }
            OperationCode::DeleteNoWait => {
                expect_arity(op, values, 3)?;
                Ok(Command::DeleteNoWait {
                    path: values[0].as_text()?,
                    sync_dir: values[1].as_uint()?,
                    recursive: values[2].as_flag()?,
                })
            }
        }
    }
}

fn expect_arity(
    op: OperationCode,
    values: &[WireValue],
    expected: usize,
) -> Result<(), ProtocolError> {
    if values.len() != expected {
        return Err(ProtocolError::Arity {
            op: op.name(),
            expected,
            got: values.len(),
        });
    }
    Ok(())
}

/// One-time initialization message from the control-plane collaborator.
///
/// Region, channel, and backend handles are in-process values passed
/// alongside this config; only the plain settings are serialized.
#[derive(Clone, Debug, PartialEq, Encode, Decode, Serialize, Deserialize)]
pub struct InitConfig {
    pub version: Vec<u8>,
    pub little_endian: bool,
    /// 0 = silent, 1 = errors, 2 = warnings, 3 = debug housekeeping.
    pub verbose: u8,
    pub file_buffer_size: u64,
    pub wire_offset: u64,
    pub wire_size: u64,
}

impl InitConfig {
    /// Total shared-region length this geometry requires.
    pub fn region_len(&self) -> usize {
        (self.wire_offset + self.wire_size) as usize
    }
}

impl Default for InitConfig {
    fn default() -> Self {
        Self {
            version: b"1".to_vec(),
            little_endian: true,
            verbose: 2,
            file_buffer_size: 64 * 1024,
            wire_offset: 64 * 1024,
            wire_size: 4096,
        }
    }
}

/// Readiness acknowledgement the dispatcher sends once it has validated its
/// configuration and is about to enter the wait loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BridgeStatus {
    Ready,
}
