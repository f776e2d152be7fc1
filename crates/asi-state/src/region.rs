//! The shared region: seven monitors and the persistable snapshot.

use std::sync::Arc;

use asi_events::{EventId, EventQueue, OccurrenceCounters};
use asi_protocol::ROLE_COUNT;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::calib::CalibBuffer;
use crate::connection::ConnectionInfo;
use crate::limiter::RateLimiter;
use crate::machine::AsiState;
use crate::msg::ProcessMsgData;
use crate::queues::BoundedQueue;
use crate::registers::CounterRegisters;
use crate::track::{CycleSeqTrack, PendingActionTimers};
use crate::vehicle::VehicleCache;

/// Data shared between tasks: the common monitor.
#[derive(Debug, Default)]
pub struct CommonState {
    /// Global cycle counter, advanced every 25 ms, wrapping mod 2^16.
    pub cycle_counter: u16,
    /// Validated messages awaiting approval.
    pub incoming: BoundedQueue<ProcessMsgData>,
    /// Approved messages awaiting transmit.
    pub approved: BoundedQueue<ProcessMsgData>,
    /// Messages transmitted while in Safe State.
    pub safe_state: BoundedQueue<ProcessMsgData>,
    /// Cached vehicle status.
    pub vehicle: VehicleCache,
    /// Per-peer connection state, indexed by [`asi_protocol::Peer`].
    pub connections: [ConnectionInfo; 2],
    /// Rolling-counter and sequence registers.
    pub registers: CounterRegisters,
    /// Receive instants of in-flight action requests.
    pub pending_actions: PendingActionTimers,
}

/// RX task private data.
#[derive(Debug, Default)]
pub struct RxState {
    /// Consecutive CRC failures per role.
    pub crc_errors: [u8; ROLE_COUNT],
    /// Consecutive rolling-counter failures per role.
    pub roll_errors: [u8; ROLE_COUNT],
}

/// TX task private data.
#[derive(Debug, Default)]
pub struct TxState {
    /// Transmit rate limiter.
    pub limiter: RateLimiter,
}

/// CycleCountUpdater private data.
#[derive(Debug, Default)]
pub struct TrackerState {
    /// Tracked message instances.
    pub track: CycleSeqTrack,
}

/// Calibration verifier private data.
#[derive(Debug, Default)]
pub struct CalibState {
    /// Copies of transmitted calibration requests.
    pub copy: CalibBuffer,
    /// Readbacks echoed by the CM.
    pub readback: CalibBuffer,
}

/// Fault-manager processing stage, a cancellation point boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProcessingStage {
    /// Increment the per-run occurrence counter.
    CountOccurrence,
    /// Invoke the severity callback.
    Notify,
    /// Append the event log line.
    Log,
    /// Remove the event from the queue head.
    Dequeue,
}

impl ProcessingStage {
    /// Stable storage code.
    pub fn code(self) -> u8 {
        match self {
            ProcessingStage::CountOccurrence => 0,
            ProcessingStage::Notify => 1,
            ProcessingStage::Log => 2,
            ProcessingStage::Dequeue => 3,
        }
    }

    /// Decode a storage code, clamping unknown codes to the first stage.
    pub fn from_code(code: u8) -> Self {
        match code {
            1 => ProcessingStage::Notify,
            2 => ProcessingStage::Log,
            3 => ProcessingStage::Dequeue,
            _ => ProcessingStage::CountOccurrence,
        }
    }

    /// The stage after this one, if any.
    pub fn next(self) -> Option<Self> {
        match self {
            ProcessingStage::CountOccurrence => Some(ProcessingStage::Notify),
            ProcessingStage::Notify => Some(ProcessingStage::Log),
            ProcessingStage::Log => Some(ProcessingStage::Dequeue),
            ProcessingStage::Dequeue => None,
        }
    }
}

/// The event currently being processed, checkpointed across restarts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InFlightEvent {
    /// The event being processed.
    pub event: EventId,
    /// The stage to run next.
    pub stage: ProcessingStage,
}

/// Fault-manager private data.
#[derive(Debug, Default)]
pub struct FaultState {
    /// The severity-prioritised event queue.
    pub queue: EventQueue,
    /// Per-run occurrence counters.
    pub counters: OccurrenceCounters,
    /// Exactly one event is in flight at any time.
    pub processing_flag: bool,
    /// The in-flight event and its resume stage.
    pub in_flight: Option<InFlightEvent>,
}

/// State-machine private data.
#[derive(Debug)]
pub struct MachineState {
    /// Current supervisor state.
    pub state: AsiState,
    /// Latched critical fault flag.
    pub critical_fault_flag: bool,
}

impl Default for MachineState {
    fn default() -> Self {
        Self {
            state: AsiState::Initial,
            critical_fault_flag: false,
        }
    }
}

/// The shared region: seven monitors behind independent locks.
///
/// Handles are cloned into each task at spawn time. No code path holds
/// two monitor locks at once.
#[derive(Debug, Clone, Default)]
pub struct SharedState {
    /// Common monitor.
    pub common: Arc<Mutex<CommonState>>,
    /// RX private monitor.
    pub rx: Arc<Mutex<RxState>>,
    /// TX private monitor.
    pub tx: Arc<Mutex<TxState>>,
    /// Cycle-tracker private monitor.
    pub tracker: Arc<Mutex<TrackerState>>,
    /// Calibration private monitor.
    pub calib: Arc<Mutex<CalibState>>,
    /// Fault-manager private monitor.
    pub fault: Arc<Mutex<FaultState>>,
    /// State-machine private monitor.
    pub machine: Arc<Mutex<MachineState>>,
}

impl SharedState {
    /// Create a zero-initialised region.
    pub fn new() -> Self {
        Self::default()
    }

    /// Capture a persistable snapshot, taking each monitor lock in turn
    /// (never two at once).
    pub fn capture(&self) -> RegionSnapshot {
        let mut snapshot = RegionSnapshot::default();

        {
            let common = self.common.lock();
            snapshot.cycle_counter = common.cycle_counter;
            snapshot.incoming = common.incoming.iter().copied().collect();
            snapshot.approved = common.approved.iter().copied().collect();
            snapshot.safe_state = common.safe_state.iter().copied().collect();
            snapshot.vehicle = common.vehicle;
            snapshot.connections = common.connections;
            snapshot.registers = common.registers;
        }
        {
            let rx = self.rx.lock();
            snapshot.crc_errors = rx.crc_errors;
            snapshot.roll_errors = rx.roll_errors;
        }
        {
            let tracker = self.tracker.lock();
            snapshot.track = tracker.track.clone();
        }
        {
            let calib = self.calib.lock();
            snapshot.calib_copy = calib.copy.clone();
            snapshot.calib_readback = calib.readback.clone();
        }
        {
            let fault = self.fault.lock();
            snapshot.event_codes = fault.queue.to_codes();
            snapshot.occurrence = fault.counters.clone();
            snapshot.processing_flag = i16::from(fault.processing_flag);
            snapshot.in_flight = fault.in_flight;
        }
        {
            let machine = self.machine.lock();
            snapshot.asi_state = machine.state;
            snapshot.critical_fault_flag = machine.critical_fault_flag;
        }

        snapshot
    }

    /// Restore the region from a snapshot, taking each monitor lock in
    /// turn.
    ///
    /// Runtime-transient data (pending action timers, the rate-limiter
    /// window) restarts empty: their deadlines are meaningless across a
    /// process boundary.
    pub fn restore(&self, snapshot: &RegionSnapshot) {
        {
            let mut common = self.common.lock();
            common.cycle_counter = snapshot.cycle_counter;
            common.incoming.clear();
            for msg in &snapshot.incoming {
                let _ = common.incoming.push_back(*msg);
            }
            common.approved.clear();
            for msg in &snapshot.approved {
                let _ = common.approved.push_back(*msg);
            }
            common.safe_state.clear();
            for msg in &snapshot.safe_state {
                let _ = common.safe_state.push_back(*msg);
            }
            common.vehicle = snapshot.vehicle;
            common.connections = snapshot.connections;
            common.registers = snapshot.registers;
        }
        {
            let mut rx = self.rx.lock();
            rx.crc_errors = snapshot.crc_errors;
            rx.roll_errors = snapshot.roll_errors;
        }
        {
            let mut tracker = self.tracker.lock();
            tracker.track = snapshot.track.clone();
        }
        {
            let mut calib = self.calib.lock();
            calib.copy = snapshot.calib_copy.clone();
            calib.readback = snapshot.calib_readback.clone();
        }
        {
            let mut fault = self.fault.lock();
            fault.queue.restore_codes(&snapshot.event_codes);
            fault.counters = snapshot.occurrence.clone();
            fault.processing_flag = snapshot.processing_flag == 1;
            fault.in_flight = snapshot.in_flight;
        }
        {
            let mut machine = self.machine.lock();
            machine.state = snapshot.asi_state;
            machine.critical_fault_flag = snapshot.critical_fault_flag;
        }
    }
}

/// Persistable image of the shared region.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegionSnapshot {
    /// Global cycle counter.
    pub cycle_counter: u16,
    /// Incoming queue contents.
    pub incoming: Vec<ProcessMsgData>,
    /// Approved queue contents.
    pub approved: Vec<ProcessMsgData>,
    /// Safe-state queue contents.
    pub safe_state: Vec<ProcessMsgData>,
    /// Vehicle cache.
    pub vehicle: VehicleCache,
    /// Per-peer connection state.
    pub connections: [ConnectionInfo; 2],
    /// Counter registers.
    pub registers: CounterRegisters,
    /// Consecutive CRC failures per role.
    pub crc_errors: [u8; ROLE_COUNT],
    /// Consecutive rolling-counter failures per role.
    pub roll_errors: [u8; ROLE_COUNT],
    /// Tracked message instances.
    pub track: CycleSeqTrack,
    /// Calibration copy buffer.
    pub calib_copy: CalibBuffer,
    /// Calibration readback buffer.
    pub calib_readback: CalibBuffer,
    /// Queued event codes, in drain order.
    pub event_codes: Vec<u16>,
    /// Per-run occurrence counters.
    pub occurrence: OccurrenceCounters,
    /// In-flight processing flag, kept as `i16` for the on-disk format.
    pub processing_flag: i16,
    /// The in-flight event, when `processing_flag == 1`.
    pub in_flight: Option<InFlightEvent>,
    /// Supervisor state.
    pub asi_state: AsiState,
    /// Latched critical fault flag.
    pub critical_fault_flag: bool,
}

impl Default for RegionSnapshot {
    fn default() -> Self {
        Self {
            cycle_counter: 0,
            incoming: Vec::new(),
            approved: Vec::new(),
            safe_state: Vec::new(),
            vehicle: VehicleCache::default(),
            connections: [ConnectionInfo::default(); 2],
            registers: CounterRegisters::default(),
            crc_errors: [0; ROLE_COUNT],
            roll_errors: [0; ROLE_COUNT],
            track: CycleSeqTrack::default(),
            calib_copy: CalibBuffer::default(),
            calib_readback: CalibBuffer::default(),
            event_codes: Vec::new(),
            occurrence: OccurrenceCounters::default(),
            processing_flag: 0,
            in_flight: None,
            asi_state: AsiState::Initial,
            critical_fault_flag: false,
        }
    }
}
