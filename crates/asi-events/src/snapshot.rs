//! Vehicle state snapshot attached to processed events.

use serde::{Deserialize, Serialize};

/// Vehicle state captured at the moment an event is admitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemSnapshot {
    /// Cached vehicle speed in km/h.
    pub vehicle_speed: f32,
    /// Cached gear position, as its raw wire value.
    pub gear_position: u8,
    /// Supervisor state, as its stable storage code.
    pub asi_state: u8,
    /// Wall-clock time the snapshot was taken, preformatted.
    pub system_time: String,
}

impl SystemSnapshot {
    /// Build a snapshot from its parts.
    pub fn new(vehicle_speed: f32, gear_position: u8, asi_state: u8, system_time: String) -> Self {
        Self {
            vehicle_speed,
            gear_position,
            asi_state,
            system_time,
        }
    }
}

impl Default for SystemSnapshot {
    fn default() -> Self {
        Self {
            vehicle_speed: 0.0,
            gear_position: 0,
            asi_state: 0,
            system_time: String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_zeroed() {
        let snapshot = SystemSnapshot::default();
        assert_eq!(snapshot.vehicle_speed, 0.0);
        assert_eq!(snapshot.gear_position, 0);
        assert_eq!(snapshot.asi_state, 0);
        assert!(snapshot.system_time.is_empty());
    }
}
