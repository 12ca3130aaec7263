// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Error types for RelayFS Core

use std::io;

use relayfs_proto::ValidationError;

/// Storage backend error type
#[derive(thiserror::Error, Debug)]
pub enum StorageError {
    #[error("not found")]
    NotFound,
    #[error("not a directory")]
    NotADirectory,
    #[error("is a directory")]
    IsADirectory,
    #[error("directory not empty")]
    NotEmpty,
    #[error("exclusive handle already held")]
    Locked,
    #[error("name not allowed")]
    InvalidName,
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Shared-region and serialization-buffer faults
#[derive(thiserror::Error, Debug)]
pub enum WireError {
    #[error("payload of {len} bytes exceeds the {capacity}-byte window")]
    Overflow { len: usize, capacity: usize },
    #[error("region access out of bounds: offset {offset}, len {len}, region {region}")]
    OutOfBounds {
        offset: usize,
        len: usize,
        region: usize,
    },
    #[error("ssz decoding failed: {0}")]
    Decode(String),
}

/// Dispatcher construction failure
#[derive(thiserror::Error, Debug)]
pub enum BridgeError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Wire(#[from] WireError),
}
