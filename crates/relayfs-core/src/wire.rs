// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Length-prefixed serialization buffer over the shared region
//!
//! Arguments travel caller → dispatcher and spot results (file size) travel
//! back through the same window: a 32-bit length prefix in the configured
//! endianness, then the SSZ-encoded value list. A zero prefix means "empty".

use std::sync::Arc;

use ssz::{Decode, Encode};

use relayfs_proto::WireValue;

use crate::error::WireError;
use crate::region::SharedRegion;

const LEN_PREFIX: usize = 4;

#[derive(Clone)]
pub struct WireBuffer {
    region: Arc<SharedRegion>,
    offset: usize,
    capacity: usize,
    little_endian: bool,
}

impl WireBuffer {
    pub fn new(
        region: Arc<SharedRegion>,
        offset: usize,
        capacity: usize,
        little_endian: bool,
    ) -> Result<Self, WireError> {
        let end = offset.checked_add(capacity).filter(|end| *end <= region.len());
        if end.is_none() || capacity < LEN_PREFIX {
            return Err(WireError::OutOfBounds {
                offset,
                len: capacity,
                region: region.len(),
            });
        }
        Ok(Self {
            region,
            offset,
            capacity,
            little_endian,
        })
    }

    /// Greatest payload length `serialize` will accept.
    pub fn capacity(&self) -> usize {
        self.capacity - LEN_PREFIX
    }

    /// Encode an ordered value list into the window. An empty slice writes
    /// the zero-length marker, the reset convention shared with
    /// [`deserialize`]. Oversized payloads fail before any byte is written,
    /// so a previously serialized list stays readable.
    ///
    /// [`deserialize`]: WireBuffer::serialize
    pub fn serialize(&self, values: &[WireValue]) -> Result<(), WireError> {
        if values.is_empty() {
            return self.reset();
        }
        let payload = values.to_vec().as_ssz_bytes();
        if payload.len() > self.capacity() {
            return Err(WireError::Overflow {
                len: payload.len(),
                capacity: self.capacity(),
            });
        }
        let mut frame = Vec::with_capacity(LEN_PREFIX + payload.len());
        frame.extend_from_slice(&self.encode_len(payload.len() as u32));
        frame.extend_from_slice(&payload);
        self.region.write_at(self.offset, &frame)
    }

    /// Write the zero-length marker.
    pub fn reset(&self) -> Result<(), WireError> {
        self.region.write_at(self.offset, &self.encode_len(0))
    }

    /// Decode the most recently serialized value list, or `None` when the
    /// window holds the empty marker.
    pub fn deserialize(&self) -> Result<Option<Vec<WireValue>>, WireError> {
        let prefix = self.region.read_at(self.offset, LEN_PREFIX)?;
        let len = self.decode_len(&prefix) as usize;
        if len == 0 {
            return Ok(None);
        }
        if len > self.capacity() {
            return Err(WireError::Decode(format!(
                "length prefix {} exceeds the {}-byte window",
                len,
                self.capacity()
            )));
        }
        let payload = self.region.read_at(self.offset + LEN_PREFIX, len)?;
        Vec::<WireValue>::from_ssz_bytes(&payload)
            .map(Some)
            .map_err(|err| WireError::Decode(format!("{err:?}")))
    }

    fn encode_len(&self, len: u32) -> [u8; LEN_PREFIX] {
        if self.little_endian {
            len.to_le_bytes()
        } else {
            len.to_be_bytes()
        }
    }

    fn decode_len(&self, bytes: &[u8]) -> u32 {
        let raw: [u8; LEN_PREFIX] = bytes.try_into().unwrap_or_default();
        if self.little_endian {
            u32::from_le_bytes(raw)
        } else {
            u32::from_be_bytes(raw)
        }
    }
}
