//! Fault manager: serialised, staged event processing with
//! checkpoint/resume.
//!
//! Exactly one event is in flight at any time. Processing runs four
//! stages (occurrence count, severity callback, log line, dequeue)
//! with a yield between stages so higher-priority tasks can preempt.
//! After every stage the in-flight record is checkpointed; a worker that
//! dies mid-event resumes it from the recorded stage. A 5-second
//! wall-clock watchdog aborts any single event that exceeds its budget.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use asi_events::{EventId, Severity};
use asi_scheduler::{PeriodicTask, TaskSpec};
use asi_state::{
    EventCheckpoint, InFlightEvent, ProcessingStage, SharedState, save_checkpoint,
};
use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use crate::eventlog::EventLogger;
use crate::report::enqueue_status_notification;

use super::FAULT_TASK;

/// Wall-clock budget for processing one event.
pub const EVENT_WATCHDOG: Duration = Duration::from_secs(5);

/// The fault manager task.
///
/// The event log handle is shared so a respawned incarnation appends to
/// the same file.
#[derive(Debug)]
pub struct FaultManagerTask {
    shared: SharedState,
    logger: Arc<Mutex<EventLogger>>,
    checkpoint_path: PathBuf,
    event_started: Option<Instant>,
}

impl FaultManagerTask {
    /// Create the task over the shared region, the rotating event log,
    /// and the checkpoint file.
    pub fn new(
        shared: SharedState,
        logger: Arc<Mutex<EventLogger>>,
        checkpoint_path: PathBuf,
    ) -> Self {
        Self {
            shared,
            logger,
            checkpoint_path,
            event_started: None,
        }
    }

    /// Pick up the in-flight event, or promote the queue head to in
    /// flight.
    fn acquire_work(&mut self) -> Option<InFlightEvent> {
        let mut fault = self.shared.fault.lock();

        if !fault.processing_flag {
            let head = fault.queue.head()?;
            fault.processing_flag = true;
            fault.in_flight = Some(InFlightEvent {
                event: head,
                stage: ProcessingStage::CountOccurrence,
            });
            drop(fault);
            self.event_started = Some(Instant::now());
            return self.shared.fault.lock().in_flight;
        }

        match fault.in_flight {
            Some(work) => Some(work),
            None => {
                // Flag without a record: a torn restore. Clear and move on.
                warn!("processing flag set with no in-flight record, clearing");
                fault.processing_flag = false;
                None
            }
        }
    }

    fn persist(&mut self, checkpoint: EventCheckpoint) {
        if let Err(err) = save_checkpoint(&self.checkpoint_path, &checkpoint) {
            warn!(%err, "event checkpoint write failed");
        }
    }

    fn run_stage(&mut self, event: EventId, stage: ProcessingStage) {
        match stage {
            ProcessingStage::CountOccurrence => {
                let count = { self.shared.fault.lock().counters.increment(event) };
                debug!(%event, count, "event occurrence counted");
            }
            ProcessingStage::Notify => match event.severity() {
                Severity::Critical => {
                    error!(%event, "critical event, latching the fault flag");
                    self.shared.machine.lock().critical_fault_flag = true;
                }
                Severity::Normal => {
                    enqueue_status_notification(&self.shared);
                }
                Severity::Minor => {}
            },
            ProcessingStage::Log => {
                let (occurrence, snapshot) = {
                    let fault = self.shared.fault.lock();
                    (fault.counters.get(event), fault.queue.snapshot().cloned())
                };
                if let Err(err) = self
                    .logger
                    .lock()
                    .log_event(event, occurrence, snapshot.as_ref())
                {
                    warn!(%err, "event log write failed");
                }
            }
            ProcessingStage::Dequeue => {
                let mut fault = self.shared.fault.lock();
                if !fault.queue.remove_first(event) {
                    debug!(%event, "processed event already absent from queue");
                }
                fault.processing_flag = false;
                fault.in_flight = None;
            }
        }
    }

    fn abort_event(&mut self, event: EventId) {
        if let Err(err) = self.logger.lock().log_timeout(event) {
            warn!(%err, "event log write failed");
        }
        {
            let mut fault = self.shared.fault.lock();
            let _ = fault.queue.remove_first(event);
            fault.processing_flag = false;
            fault.in_flight = None;
        }
        self.event_started = None;
        self.persist(EventCheckpoint::idle());
    }
}

impl PeriodicTask for FaultManagerTask {
    fn spec(&self) -> TaskSpec {
        FAULT_TASK
    }

    fn tick(&mut self) {
        let Some(work) = self.acquire_work() else {
            return;
        };

        // Resuming after a restart: the budget restarts with us.
        let started = *self.event_started.get_or_insert_with(Instant::now);

        let mut stage = work.stage;
        loop {
            if started.elapsed() > EVENT_WATCHDOG {
                warn!(event = %work.event, "event processing watchdog expired");
                self.abort_event(work.event);
                return;
            }

            self.run_stage(work.event, stage);

            match stage.next() {
                Some(next) => {
                    {
                        self.shared.fault.lock().in_flight = Some(InFlightEvent {
                            event: work.event,
                            stage: next,
                        });
                    }
                    self.persist(EventCheckpoint::in_flight(InFlightEvent {
                        event: work.event,
                        stage: next,
                    }));

                    // Cancellation point: let a higher-priority wake in.
                    std::thread::yield_now();
                    stage = next;
                }
                None => {
                    self.event_started = None;
                    self.persist(EventCheckpoint::idle());
                    return;
                }
            }
        }
    }

    fn on_shutdown(&mut self) {
        let (skipped, in_flight) = {
            let mut fault = self.shared.fault.lock();
            let mut skipped = Vec::new();
            while let Some(event) = fault.queue.pop_head() {
                skipped.push(event);
            }
            (skipped, fault.in_flight)
        };

        for event in skipped {
            if in_flight.is_some_and(|w| w.event == event) {
                continue;
            }
            if let Err(err) = self.logger.lock().log_skipped(event) {
                warn!(%err, "event log write failed");
            }
        }

        match in_flight {
            Some(work) => self.persist(EventCheckpoint::in_flight(work)),
            None => self.persist(EventCheckpoint::idle()),
        }
        info!("fault manager flushed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use asi_events::SystemSnapshot;
    use asi_state::{AsiState, load_checkpoint};

    struct Harness {
        task: FaultManagerTask,
        dir: tempfile::TempDir,
    }

    fn harness() -> Harness {
        let dir = tempfile::tempdir().expect("tempdir");
        let shared = SharedState::new();
        shared.machine.lock().state = AsiState::NormalOperation;
        let logger = EventLogger::open(dir.path().join("Event_Logger.log")).expect("open log");
        let task = FaultManagerTask::new(
            shared,
            Arc::new(Mutex::new(logger)),
            dir.path().join("event_data.bin"),
        );
        Harness { task, dir }
    }

    fn raise(task: &FaultManagerTask, event: EventId) {
        task.shared
            .fault
            .lock()
            .queue
            .raise(event, SystemSnapshot::default());
    }

    #[test]
    fn test_normal_event_processed_in_one_tick() {
        let mut h = harness();
        raise(&h.task, EventId::MsgCrcCheck);

        h.task.tick();

        let fault = h.task.shared.fault.lock();
        assert!(fault.queue.is_empty());
        assert!(!fault.processing_flag);
        assert_eq!(fault.counters.get(EventId::MsgCrcCheck), 1);
        drop(fault);

        // Normal severity notified the external system.
        assert_eq!(h.task.shared.common.lock().approved.len(), 1);
        // The flag stayed down.
        assert!(!h.task.shared.machine.lock().critical_fault_flag);
    }

    #[test]
    fn test_critical_event_latches_fault_flag() {
        let mut h = harness();
        raise(&h.task, EventId::EcuCriticalFail);

        h.task.tick();

        assert!(h.task.shared.machine.lock().critical_fault_flag);
    }

    #[test]
    fn test_minor_event_has_no_callback() {
        let mut h = harness();
        raise(&h.task, EventId::InitComplete);

        h.task.tick();

        assert!(h.task.shared.common.lock().approved.is_empty());
        assert!(!h.task.shared.machine.lock().critical_fault_flag);
    }

    #[test]
    fn test_log_line_written() {
        let mut h = harness();
        raise(&h.task, EventId::RollCount);
        h.task.tick();

        let contents =
            std::fs::read_to_string(h.dir.path().join("Event_Logger.log")).expect("read");
        assert!(contents.contains("FAULT_ROLL_COUNT"));
    }

    #[test]
    fn test_checkpoint_idle_after_completion() {
        let mut h = harness();
        raise(&h.task, EventId::MsgCrcCheck);
        h.task.tick();

        let checkpoint = load_checkpoint(&h.dir.path().join("event_data.bin"));
        assert_eq!(checkpoint.processing_flag, 0);
    }

    #[test]
    fn test_resume_from_persisted_stage() {
        let mut h = harness();

        // Simulate a worker that died after the notify stage of a
        // critical event: flag set, record at Log, event still queued.
        raise(&h.task, EventId::EcuCriticalFail);
        {
            let mut fault = h.task.shared.fault.lock();
            fault.processing_flag = true;
            fault.in_flight = Some(InFlightEvent {
                event: EventId::EcuCriticalFail,
                stage: ProcessingStage::Log,
            });
        }

        h.task.tick();

        // Resumed at Log: occurrence was NOT recounted, the queue
        // drained, and processing completed.
        let fault = h.task.shared.fault.lock();
        assert!(fault.queue.is_empty());
        assert!(!fault.processing_flag);
        assert_eq!(fault.counters.get(EventId::EcuCriticalFail), 0);
        drop(fault);

        let contents =
            std::fs::read_to_string(h.dir.path().join("Event_Logger.log")).expect("read");
        assert!(contents.contains("FAULT_ECU_CRITICAL_FAIL"));
    }

    #[test]
    fn test_shutdown_logs_skipped_events() {
        let mut h = harness();
        raise(&h.task, EventId::MsgCrcCheck);
        raise(&h.task, EventId::AckLoss);

        h.task.on_shutdown();

        let contents =
            std::fs::read_to_string(h.dir.path().join("Event_Logger.log")).expect("read");
        assert_eq!(contents.matches("SKIPPED EVENT").count(), 2);
    }

    #[test]
    fn test_severity_order_processing() {
        let mut h = harness();
        raise(&h.task, EventId::LossComm);
        raise(&h.task, EventId::EcuCriticalFail);

        // First tick takes the critical event, not the minor one.
        h.task.tick();
        let fault = h.task.shared.fault.lock();
        assert!(!fault.queue.contains(EventId::EcuCriticalFail));
        assert!(fault.queue.contains(EventId::LossComm));
    }
}
