// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! RelayFS Protocol — control-channel codes and wire types
//!
//! This crate defines the operation/result code tables, the SSZ wire value
//! union carried through the shared serialization buffer, the typed command
//! union the dispatcher executes, and the one-shot initialization message
//! with its validation.

pub mod codes;
pub mod messages;
pub mod validation;

// Re-export key types
pub use codes::{
    OpenFlags, OperationCode, ResultCode, OP_IDLE, RESULT_PENDING, SYNC_DIR_CLEANUP,
};
pub use messages::{BridgeStatus, Command, InitConfig, ProtocolError, WireValue};
pub use validation::{validate_init, ValidationError, MIN_WIRE_SIZE};
