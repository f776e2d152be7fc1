//! Event raising and notification building.
//!
//! These helpers follow the lock discipline: each takes one monitor lock
//! at a time, in sequence, and never calls back into another accessor
//! while holding one.

use std::time::{SystemTime, UNIX_EPOCH};

use asi_events::{Admission, EventId, SystemSnapshot};
use asi_protocol::{Disposition, MessageClass, MessageRole};
use asi_state::{AsiState, ProcessMsgData, SharedState};
use tracing::{debug, warn};

/// Wall-clock time as unix seconds, preformatted for snapshots and log
/// lines.
pub fn system_time_string() -> String {
    match SystemTime::now().duration_since(UNIX_EPOCH) {
        Ok(elapsed) => elapsed.as_secs().to_string(),
        Err(_) => "0".to_owned(),
    }
}

/// Wall-clock time as unix seconds for frame timestamps.
pub fn unix_seconds() -> u32 {
    match SystemTime::now().duration_since(UNIX_EPOCH) {
        Ok(elapsed) => elapsed.as_secs() as u32,
        Err(_) => 0,
    }
}

/// Raise an event with a snapshot of the current vehicle state.
pub fn raise_event(shared: &SharedState, event: EventId) {
    let (speed, gear) = {
        let common = shared.common.lock();
        (common.vehicle.speed_kph, common.vehicle.gear.raw())
    };
    let state = { shared.machine.lock().state };

    let snapshot = SystemSnapshot::new(speed, gear, state.code(), system_time_string());
    let admission = { shared.fault.lock().queue.raise(event, snapshot) };

    match admission {
        Admission::Appended => {}
        Admission::Replaced(evicted) => {
            warn!(%event, %evicted, "event queue full, least severe entry replaced");
        }
        Admission::Dropped => {
            warn!(%event, "event queue full, event dropped");
        }
    }
}

/// Build an action notification to the VAM about `about_id`.
///
/// The declared length is 1 (the disposition byte); the padding bytes
/// carry the id being reported on so the VAM can correlate.
pub fn action_notification(about_id: u16, disposition: Disposition) -> ProcessMsgData {
    let mut value = [0u8; 8];
    value[0] = disposition.code();
    value[1..3].copy_from_slice(&about_id.to_le_bytes());
    ProcessMsgData {
        id: MessageRole::ActionNotification.id(),
        sequence: 0,
        class: MessageClass::Notification,
        length: 1,
        value,
    }
}

/// Build the periodic status notification carrying the current state.
pub fn status_notification(state: AsiState) -> ProcessMsgData {
    let mut value = [0u8; 8];
    value[0] = state.code();
    ProcessMsgData {
        id: MessageRole::StatusNotification.id(),
        sequence: 0,
        class: MessageClass::Notification,
        length: 1,
        value,
    }
}

/// Build the startup-test progress notification.
pub fn startup_notification(passed: bool) -> ProcessMsgData {
    let mut value = [0u8; 8];
    value[0] = u8::from(passed);
    ProcessMsgData {
        id: MessageRole::StartupTestNotification.id(),
        sequence: 0,
        class: MessageClass::Notification,
        length: 1,
        value,
    }
}

/// Enqueue a notification for transmit.
///
/// Notifications ride the approved queue; in Safe State no VAM-bound
/// traffic is generated, so the notification is dropped there.
pub fn enqueue_notification(shared: &SharedState, msg: ProcessMsgData) {
    let state = { shared.machine.lock().state };
    if state == AsiState::SafeState
        && MessageRole::from_id(msg.id).is_ok_and(|r| r.tx_peer() == asi_protocol::Peer::Vam)
    {
        debug!(id = msg.id, "notification suppressed in safe state");
        return;
    }

    let mut common = shared.common.lock();
    if common.approved.push_back(msg).is_err() {
        debug!(id = msg.id, "approved queue full, notification dropped");
    }
}

/// Enqueue the periodic status notification.
///
/// Outside Safe State it rides the approved queue toward the VAM; in
/// Safe State it rides the safe-state queue, which the transmit path
/// drains toward the CM only.
pub fn enqueue_status_notification(shared: &SharedState) {
    let state = { shared.machine.lock().state };
    let msg = status_notification(state);

    let mut common = shared.common.lock();
    let result = if state == AsiState::SafeState {
        common.safe_state.push_back(msg)
    } else {
        common.approved.push_back(msg)
    };
    if result.is_err() {
        debug!("status notification dropped, queue full");
    }
}
