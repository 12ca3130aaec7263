// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! RelayFS Core — cross-thread synchronous-call bridge
//!
//! A caller thread blocks on a shared control channel while a dispatcher
//! thread executes virtual-filesystem operations against an asynchronous,
//! handle-based storage backend and publishes the results back through the
//! same shared memory. One call is in flight at a time; the caller writes
//! only the request side of the channel and region, the dispatcher owns
//! everything else.

pub mod channel;
pub mod dispatch;
pub mod error;
pub mod handles;
pub mod metrics;
mod ops;
pub mod region;
pub mod storage;
pub mod wire;

#[cfg(test)]
mod test_scenarios;
#[cfg(test)]
pub(crate) mod testing;

// Re-export the main bridge types
pub use channel::ControlChannel;
pub use dispatch::{Dispatcher, DispatcherHandle, WAIT_TIMEOUT};
pub use error::{BridgeError, StorageError, StorageResult, WireError};
pub use handles::{OpenFile, OpenFiles};
pub use metrics::{MetricsRegistry, MetricsSnapshot, OpSnapshot};
pub use region::SharedRegion;
pub use storage::{DirHandle, ExclusiveHandle, FileNode, MemoryBackend, StorageBackend};
pub use wire::WireBuffer;
