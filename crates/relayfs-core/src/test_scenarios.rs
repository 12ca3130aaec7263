// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! End-to-end scenarios: a blocking caller thread driving a spawned
//! dispatcher over the shared channel, backed by the in-memory backend.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use relayfs_proto::{InitConfig, OpenFlags, OperationCode, ResultCode, WireValue, SYNC_DIR_CLEANUP};

use crate::channel::ControlChannel;
use crate::dispatch::{Dispatcher, DispatcherHandle};
use crate::region::SharedRegion;
use crate::storage::{DirHandle as _, MemoryBackend, StorageBackend as _};
use crate::testing::SyncCaller;

struct Bridge {
    caller: SyncCaller,
    backend: Arc<MemoryBackend>,
    _handle: DispatcherHandle,
}

fn bridge() -> Bridge {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    let config = InitConfig::default();
    let channel = Arc::new(ControlChannel::new());
    let region = Arc::new(SharedRegion::new(config.region_len()));
    let backend = Arc::new(MemoryBackend::new());
    let handle = Dispatcher::spawn(
        config.clone(),
        channel.clone(),
        region.clone(),
        backend.clone(),
    )
    .expect("dispatcher must start");
    Bridge {
        caller: SyncCaller::new(&config, channel, region),
        backend,
        _handle: handle,
    }
}

fn block_on<F: std::future::Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap()
        .block_on(future)
}

#[test]
fn open_write_sync_size_close_access_scenario() {
    let bridge = bridge();
    let caller = &bridge.caller;

    assert_eq!(caller.open(1, "/a/b.db", OpenFlags::CREATE), ResultCode::Ok);
    let payload = vec![0xabu8; 4096];
    assert_eq!(caller.write(1, 0, &payload), ResultCode::Ok);
    assert_eq!(caller.sync(1), ResultCode::Ok);
    assert_eq!(caller.file_size(1), (ResultCode::Ok, Some(4096)));
    assert_eq!(caller.close(1), ResultCode::Ok);
    assert_eq!(caller.access("/a/b.db"), ResultCode::Ok);
}

#[test]
fn write_then_read_returns_identical_bytes() {
    let bridge = bridge();
    let caller = &bridge.caller;

    assert_eq!(caller.open(1, "/data.bin", OpenFlags::CREATE), ResultCode::Ok);
    let payload: Vec<u8> = (0..=255).cycle().take(1024).map(|b: u16| b as u8).collect();
    assert_eq!(caller.write(1, 64, &payload), ResultCode::Ok);

    let (rc, bytes) = caller.read(1, payload.len() as u64, 64);
    assert_eq!(rc, ResultCode::Ok);
    assert_eq!(bytes, payload);
}

#[test]
fn read_past_eof_zero_fills_and_reports_short_read() {
    let bridge = bridge();
    let caller = &bridge.caller;

    assert_eq!(caller.open(1, "/short.db", OpenFlags::CREATE), ResultCode::Ok);
    assert_eq!(caller.write(1, 0, b"abcdefghij"), ResultCode::Ok);

    let (rc, bytes) = caller.read(1, 16, 0);
    assert_eq!(rc, ResultCode::ShortRead);
    assert_eq!(&bytes[..10], b"abcdefghij");
    assert_eq!(&bytes[10..], &[0u8; 6]);
}

#[test]
fn mkdir_creates_every_missing_segment() {
    let bridge = bridge();
    let caller = &bridge.caller;

    assert_eq!(caller.mkdir("/x/y/z"), ResultCode::Ok);
    assert_eq!(
        caller.open(1, "/x/y/z/file.db", OpenFlags::CREATE),
        ResultCode::Ok
    );
    assert_eq!(caller.close(1), ResultCode::Ok);
    assert_eq!(caller.access("/x/y/z/file.db"), ResultCode::Ok);
}

#[test]
fn open_without_create_on_a_missing_directory_is_not_found() {
    let bridge = bridge();
    assert_eq!(
        bridge.caller.open(7, "/no/such/dir.db", OpenFlags::READ_WRITE),
        ResultCode::NotFound
    );
}

#[test]
fn read_only_handles_reject_mutation() {
    let bridge = bridge();
    let caller = &bridge.caller;

    assert_eq!(caller.open(1, "/ro.db", OpenFlags::CREATE), ResultCode::Ok);
    assert_eq!(caller.write(1, 0, b"seed"), ResultCode::Ok);
    assert_eq!(caller.close(1), ResultCode::Ok);

    assert_eq!(caller.open(2, "/ro.db", OpenFlags::READ_ONLY), ResultCode::Ok);
    assert_eq!(caller.write(2, 0, b"nope"), ResultCode::WriteError);
    assert_eq!(caller.truncate(2, 0), ResultCode::TruncateError);
    let (rc, bytes) = caller.read(2, 4, 0);
    assert_eq!(rc, ResultCode::Ok);
    assert_eq!(&bytes, b"seed");
    assert_eq!(caller.close(2), ResultCode::Ok);
}

#[test]
fn delete_on_close_removes_the_file() {
    let bridge = bridge();
    let caller = &bridge.caller;

    assert_eq!(
        caller.open(1, "/tmp/scratch.db", OpenFlags::CREATE | OpenFlags::DELETE_ON_CLOSE),
        ResultCode::Ok
    );
    assert_eq!(caller.write(1, 0, b"scratch"), ResultCode::Ok);
    assert_eq!(caller.close(1), ResultCode::Ok);
    assert_eq!(caller.access("/tmp/scratch.db"), ResultCode::Ioerr);
}

#[test]
fn delete_with_sentinel_prunes_empty_ancestors() {
    let bridge = bridge();
    let caller = &bridge.caller;

    assert_eq!(caller.open(1, "/a/b/c.db", OpenFlags::CREATE), ResultCode::Ok);
    assert_eq!(caller.close(1), ResultCode::Ok);
    assert_eq!(caller.open(2, "/a/keep.db", OpenFlags::CREATE), ResultCode::Ok);
    assert_eq!(caller.close(2), ResultCode::Ok);

    assert_eq!(
        caller.delete("/a/b/c.db", SYNC_DIR_CLEANUP, false),
        ResultCode::Ok
    );

    // /a/b became empty and was pruned; /a still holds keep.db and stopped
    // the walk.
    let root = bridge.backend.root();
    block_on(async {
        let a = root.dir("a", false).await.expect("/a must survive");
        assert!(a.dir("b", false).await.is_err());
        assert!(a.file("keep.db", false).await.is_ok());
    });
    assert_eq!(caller.access("/a/keep.db"), ResultCode::Ok);
}

#[test]
fn delete_of_a_missing_leaf_is_an_error() {
    let bridge = bridge();
    assert_eq!(
        bridge.caller.delete("/nope.db", 0, false),
        ResultCode::DeleteError
    );
}

#[test]
fn delete_no_wait_matches_delete_semantics() {
    let bridge = bridge();
    let caller = &bridge.caller;

    assert_eq!(caller.open(1, "/d/e.db", OpenFlags::CREATE), ResultCode::Ok);
    assert_eq!(caller.close(1), ResultCode::Ok);
    assert_eq!(caller.delete_no_wait("/d/e.db", 0, false), ResultCode::Ok);
    assert_eq!(caller.access("/d/e.db"), ResultCode::Ioerr);
    assert_eq!(
        caller.delete_no_wait("/d/e.db", 0, false),
        ResultCode::DeleteError
    );
}

#[test]
fn exclusive_handles_conflict_across_caller_ids() {
    let bridge = bridge();
    let caller = &bridge.caller;

    assert_eq!(caller.open(1, "/solo.db", OpenFlags::CREATE), ResultCode::Ok);
    assert_eq!(
        caller.open(2, "/solo.db", OpenFlags::READ_WRITE),
        ResultCode::Ioerr
    );
    assert_eq!(caller.close(1), ResultCode::Ok);
    assert_eq!(
        caller.open(2, "/solo.db", OpenFlags::READ_WRITE),
        ResultCode::Ok
    );
    assert_eq!(caller.close(2), ResultCode::Ok);
}

#[test]
fn close_of_an_unknown_id_is_not_found_and_sync_is_a_no_op() {
    let bridge = bridge();
    assert_eq!(bridge.caller.close(99), ResultCode::NotFound);
    assert_eq!(bridge.caller.sync(99), ResultCode::Ok);
    assert_eq!(bridge.caller.file_size(99), (ResultCode::Ioerr, None));
}

#[test]
fn protocol_faults_do_not_kill_the_dispatcher() {
    let bridge = bridge();
    let caller = &bridge.caller;

    // Unregistered operation code: logged and skipped.
    caller.channel.post_raw(99);
    thread::sleep(Duration::from_millis(50));

    // Empty argument buffer for a real operation: logged and skipped.
    caller.wire.serialize(&[]).unwrap();
    caller.channel.post_raw(OperationCode::Mkdir as i32);
    thread::sleep(Duration::from_millis(50));

    // Wrong arity for mkdir: logged and skipped.
    caller
        .wire
        .serialize(&[WireValue::Uint(1), WireValue::Uint(2)])
        .unwrap();
    caller.channel.post_raw(OperationCode::Mkdir as i32);
    thread::sleep(Duration::from_millis(50));

    // The loop must still serve well-formed commands.
    assert_eq!(caller.mkdir("/alive"), ResultCode::Ok);
    assert!(bridge._handle.is_running());
}
