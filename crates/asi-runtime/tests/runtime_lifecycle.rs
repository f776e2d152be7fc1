//! Worker runtime lifecycle: start, snapshot, shutdown, soft restart.

use std::net::TcpListener;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use asi_events::EventId;
use asi_runtime::{RuntimeConfig, SNAPSHOT_INTERVAL, WorkerRuntime};
use asi_scheduler::{RtSetup, WorkerVerdict};
use asi_state::{
    EventCheckpoint, InFlightEvent, ProcessingStage, StorageLayout, load_region, save_checkpoint,
};

fn config(dir: &tempfile::TempDir, vam: &TcpListener, cm: &TcpListener) -> RuntimeConfig {
    let mut config = RuntimeConfig::new(dir.path());
    config.vam_addr = vam.local_addr().expect("addr");
    config.cm_addr = cm.local_addr().expect("addr");
    config.rt_setup = RtSetup::testing();
    config
}

#[test]
fn worker_runs_snapshots_and_shuts_down_cleanly() {
    let dir = tempfile::tempdir().expect("tempdir");
    let vam = TcpListener::bind("127.0.0.1:0").expect("bind");
    let cm = TcpListener::bind("127.0.0.1:0").expect("bind");

    let runtime = WorkerRuntime::start(config(&dir, &vam, &cm)).expect("start");
    let shutdown = AtomicBool::new(false);

    let verdict = std::thread::scope(|scope| {
        let handle = scope.spawn(|| runtime.run(&shutdown));
        // Long enough for a snapshot interval to pass and the cycle
        // counter to advance.
        std::thread::sleep(SNAPSHOT_INTERVAL + Duration::from_millis(600));
        shutdown.store(true, Ordering::Release);
        handle.join().expect("runtime thread")
    });

    assert_eq!(verdict, WorkerVerdict::CleanShutdown);

    let layout = StorageLayout::new(dir.path());
    let snapshot = load_region(&layout.child_storage()).expect("child snapshot written");
    assert!(snapshot.cycle_counter > 0, "cycle counter advanced");

    // InitComplete went through the fault manager into the event log.
    let log = std::fs::read_to_string(layout.event_log()).expect("event log");
    assert!(log.contains("INIT_COMPLETE"));
}

#[test]
fn soft_restart_restores_region_and_in_flight_event() {
    let dir = tempfile::tempdir().expect("tempdir");
    let vam = TcpListener::bind("127.0.0.1:0").expect("bind");
    let cm = TcpListener::bind("127.0.0.1:0").expect("bind");

    // First life: run briefly and shut down, leaving a snapshot behind.
    {
        let runtime = WorkerRuntime::start(config(&dir, &vam, &cm)).expect("start");
        let shutdown = AtomicBool::new(false);
        std::thread::scope(|scope| {
            let handle = scope.spawn(|| runtime.run(&shutdown));
            std::thread::sleep(Duration::from_millis(400));
            shutdown.store(true, Ordering::Release);
            handle.join().expect("runtime thread")
        });
    }

    let layout = StorageLayout::new(dir.path());
    let before = load_region(&layout.child_storage()).expect("snapshot");

    // Simulate dying mid-event: checkpoint an in-flight record the next
    // life must pick up.
    save_checkpoint(
        &layout.event_data(),
        &EventCheckpoint::in_flight(InFlightEvent {
            event: EventId::MsgCrcCheck,
            stage: ProcessingStage::Log,
        }),
    )
    .expect("checkpoint");

    // Second life with soft restart: the counter must restore rather
    // than zero, and the checkpointed event must resume from its stage.
    let mut second = config(&dir, &vam, &cm);
    second.soft_restart = true;
    let runtime = WorkerRuntime::start(second).expect("soft restart");

    {
        let common = runtime.shared().common.lock();
        assert!(
            common.cycle_counter >= before.cycle_counter,
            "cycle counter restored, not zeroed"
        );
    }

    let shutdown = AtomicBool::new(false);
    let verdict = std::thread::scope(|scope| {
        let handle = scope.spawn(|| runtime.run(&shutdown));
        std::thread::sleep(Duration::from_millis(300));
        shutdown.store(true, Ordering::Release);
        handle.join().expect("runtime thread")
    });
    assert_eq!(verdict, WorkerVerdict::CleanShutdown);

    // Resuming at the Log stage wrote the event line and retired the
    // checkpoint.
    let log = std::fs::read_to_string(layout.event_log()).expect("event log");
    assert!(log.contains("FAULT_MSG_CRC_CHECK"));
    let checkpoint = asi_state::load_checkpoint(&layout.event_data());
    assert_eq!(checkpoint.processing_flag, 0);
}
