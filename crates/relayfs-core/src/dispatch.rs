// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Dispatch loop and bootstrap for the RelayFS bridge
//!
//! The dispatcher owns every piece of mutable bridge state through one
//! explicit context value; there are no ambient globals. A protocol fault
//! (an unrecognized code, an empty or malformed argument buffer) kills the
//! iteration, never the loop: a crashed dispatcher would permanently hang
//! the blocked caller.

use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::Context as _;
use tracing::{debug, error, warn};

use relayfs_proto::{
    validate_init, BridgeStatus, Command, InitConfig, OperationCode, ResultCode,
};

use crate::channel::ControlChannel;
use crate::error::{BridgeError, WireError};
use crate::handles::OpenFiles;
use crate::metrics::MetricsRegistry;
use crate::region::SharedRegion;
use crate::storage::StorageBackend;
use crate::wire::WireBuffer;

/// How long an idle iteration blocks before running housekeeping.
pub const WAIT_TIMEOUT: Duration = Duration::from_millis(150);

const METRICS_DUMP_INTERVAL: Duration = Duration::from_secs(60);
const READY_TIMEOUT: Duration = Duration::from_secs(5);

/// All dispatcher-side state, constructed once at initialization time and
/// threaded into every handler call.
pub(crate) struct DispatcherContext {
    pub(crate) config: InitConfig,
    pub(crate) channel: Arc<ControlChannel>,
    pub(crate) region: Arc<SharedRegion>,
    pub(crate) wire: WireBuffer,
    pub(crate) files: OpenFiles,
    pub(crate) backend: Arc<dyn StorageBackend>,
    pub(crate) metrics: MetricsRegistry,
}

impl DispatcherContext {
    fn new(
        config: InitConfig,
        channel: Arc<ControlChannel>,
        region: Arc<SharedRegion>,
        backend: Arc<dyn StorageBackend>,
    ) -> Result<Self, BridgeError> {
        validate_init(&config)?;
        if config.file_buffer_size as usize > region.len() {
            return Err(WireError::OutOfBounds {
                offset: 0,
                len: config.file_buffer_size as usize,
                region: region.len(),
            }
            .into());
        }
        let wire = WireBuffer::new(
            region.clone(),
            config.wire_offset as usize,
            config.wire_size as usize,
            config.little_endian,
        )?;
        debug!(?config, "dispatcher context initialized");
        Ok(Self {
            config,
            channel,
            region,
            wire,
            files: OpenFiles::new(),
            backend,
            metrics: MetricsRegistry::new(),
        })
    }

    pub(crate) fn publish(&self, op: OperationCode, rc: ResultCode) {
        debug!(op = op.name(), result = rc as i32, "notifying result slot");
        self.channel.publish(op, rc);
    }

    fn housekeeping(&mut self, last_dump: &mut Instant) {
        if self.config.verbose < 3 || last_dump.elapsed() < METRICS_DUMP_INTERVAL {
            return;
        }
        match serde_json::to_string_pretty(&self.metrics.snapshot()) {
            Ok(json) => debug!("dispatcher metrics:\n{json}"),
            Err(err) => warn!(error = %err, "failed to serialize the metrics snapshot"),
        }
        *last_dump = Instant::now();
    }

    #[cfg(test)]
    pub(crate) fn for_tests(backend: Arc<dyn StorageBackend>) -> Self {
        let config = InitConfig::default();
        let region = Arc::new(SharedRegion::new(config.region_len()));
        let channel = Arc::new(ControlChannel::new());
        Self::new(config, channel, region, backend).expect("default geometry must be valid")
    }
}

/// The long-lived bridge dispatcher.
pub struct Dispatcher {
    ctx: DispatcherContext,
}

impl Dispatcher {
    /// Validate the initialization message and build the dispatcher. The
    /// serialization window must lie within the region behind the file
    /// buffer.
    pub fn new(
        config: InitConfig,
        channel: Arc<ControlChannel>,
        region: Arc<SharedRegion>,
        backend: Arc<dyn StorageBackend>,
    ) -> Result<Self, BridgeError> {
        Ok(Self {
            ctx: DispatcherContext::new(config, channel, region, backend)?,
        })
    }

    /// Start the dispatcher on its own thread with a dedicated
    /// current-thread runtime, and return once it has acknowledged
    /// readiness. The loop runs until the process exits.
    pub fn spawn(
        config: InitConfig,
        channel: Arc<ControlChannel>,
        region: Arc<SharedRegion>,
        backend: Arc<dyn StorageBackend>,
    ) -> anyhow::Result<DispatcherHandle> {
        let dispatcher = Self::new(config, channel, region, backend)?;
        let runtime = tokio::runtime::Builder::new_current_thread()
            .build()
            .context("failed to build the dispatcher runtime")?;
        let (status_tx, status_rx) = mpsc::channel();
        let join = thread::Builder::new()
            .name("relayfs-dispatcher".to_string())
            .spawn(move || {
                let _ = status_tx.send(BridgeStatus::Ready);
                runtime.block_on(dispatcher.run());
            })
            .context("failed to spawn the dispatcher thread")?;
        status_rx
            .recv_timeout(READY_TIMEOUT)
            .context("dispatcher did not signal readiness")?;
        Ok(DispatcherHandle { join })
    }

    /// Block for commands and execute them, forever.
    pub async fn run(mut self) {
        debug!("dispatcher entering wait loop");
        let mut last_dump = Instant::now();
        loop {
            let code = match self.ctx.channel.next_op(WAIT_TIMEOUT) {
                Some(code) => code,
                None => {
                    self.ctx.housekeeping(&mut last_dump);
                    continue;
                }
            };
            let Some(op) = OperationCode::from_i32(code) else {
                error!(code, "no handler registered for operation code");
                continue;
            };
            let values = match self.ctx.wire.deserialize() {
                Ok(Some(values)) => values,
                Ok(None) => {
                    error!(op = op.name(), "operation posted with an empty argument buffer");
                    continue;
                }
                Err(err) => {
                    error!(op = op.name(), error = %err, "failed to decode the argument buffer");
                    continue;
                }
            };
            let cmd = match Command::decode(op, &values) {
                Ok(cmd) => cmd,
                Err(err) => {
                    error!(op = op.name(), error = %err, "malformed arguments");
                    continue;
                }
            };
            let started = Instant::now();
            let rc = self.ctx.execute(cmd).await;
            self.ctx.metrics.record(op, started.elapsed());
            self.ctx.publish(op, rc);
        }
    }
}

/// Handle to a spawned dispatcher thread.
pub struct DispatcherHandle {
    join: thread::JoinHandle<()>,
}

impl DispatcherHandle {
    pub fn is_running(&self) -> bool {
        !self.join.is_finished()
    }
}
