// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Schema validation for RelayFS control messages

use thiserror::Error;

use crate::messages::InitConfig;

/// Smallest serialization window the dispatcher will accept: the 32-bit
/// length prefix plus room for at least one encoded value.
pub const MIN_WIRE_SIZE: u64 = 16;

/// Validation error
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("schema validation failed: {0}")]
    Schema(String),
}

/// Validate an initialization message against its logical schema.
pub fn validate_init(config: &InitConfig) -> Result<(), ValidationError> {
    if config.version != b"1" {
        return Err(ValidationError::Schema("version must be '1'".to_string()));
    }
    if config.verbose > 3 {
        return Err(ValidationError::Schema(
            "verbose level must be in 0..=3".to_string(),
        ));
    }
    if config.file_buffer_size == 0 {
        return Err(ValidationError::Schema(
            "file buffer size must be nonzero".to_string(),
        ));
    }
    if config.wire_size < MIN_WIRE_SIZE {
        return Err(ValidationError::Schema(format!(
            "serialization window must be at least {} bytes",
            MIN_WIRE_SIZE
        )));
    }
    if config.wire_offset < config.file_buffer_size {
        return Err(ValidationError::Schema(
            "serialization window overlaps the file buffer".to_string(),
        ));
    }
    Ok(())
}
