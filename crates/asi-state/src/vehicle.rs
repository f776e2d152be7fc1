//! Cached vehicle status with range validation.

use serde::{Deserialize, Serialize};

use crate::error::{StateError, StateResult};

/// Maximum admissible raw speed: 400.00 km/h in 0.01 km/h fixed point.
pub const MAX_SPEED_RAW: u16 = 40_000;

/// Gear position as reported by the CM.
///
/// Parsing never produces an out-of-range value; anything outside the
/// declared range decodes to `Invalid` and is rejected by the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GearPosition {
    /// Park.
    Park,
    /// Reverse.
    Reverse,
    /// Neutral.
    Neutral,
    /// Drive.
    Drive,
    /// Low.
    Low,
    /// Out-of-range wire value.
    Invalid,
}

impl GearPosition {
    /// Decode the raw wire value.
    pub fn from_raw(raw: u8) -> Self {
        match raw {
            0 => GearPosition::Park,
            1 => GearPosition::Reverse,
            2 => GearPosition::Neutral,
            3 => GearPosition::Drive,
            4 => GearPosition::Low,
            _ => GearPosition::Invalid,
        }
    }

    /// The raw wire value; `Invalid` has no encoding and maps to 0xFF.
    pub fn raw(self) -> u8 {
        match self {
            GearPosition::Park => 0,
            GearPosition::Reverse => 1,
            GearPosition::Neutral => 2,
            GearPosition::Drive => 3,
            GearPosition::Low => 4,
            GearPosition::Invalid => 0xFF,
        }
    }
}

/// Cached vehicle status fed by the cyclic CM messages.
///
/// Updates are range-checked; a rejected update leaves the cached value
/// untouched. The outdated flags are set by the cycle tracker when a
/// cyclic source times out and cleared by the next accepted update.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct VehicleCache {
    /// Vehicle speed in km/h.
    pub speed_kph: f32,
    /// Gear position.
    pub gear: GearPosition,
    /// Rain sensor intensity, raw.
    pub rain_level: u8,
    /// The cyclic speed source timed out.
    pub speed_outdated: bool,
    /// The cyclic gear source timed out.
    pub gear_outdated: bool,
}

impl Default for VehicleCache {
    fn default() -> Self {
        Self {
            speed_kph: 0.0,
            gear: GearPosition::Park,
            rain_level: 0,
            speed_outdated: true,
            gear_outdated: true,
        }
    }
}

impl VehicleCache {
    /// Create a cache with nothing received yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept a raw fixed-point speed (0.01 km/h units).
    ///
    /// # Errors
    ///
    /// Returns [`StateError::SpeedOutOfRange`] above 400.00 km/h; the
    /// cached value is not updated.
    pub fn update_speed(&mut self, raw: u16) -> StateResult<()> {
        if raw > MAX_SPEED_RAW {
            return Err(StateError::SpeedOutOfRange { raw });
        }
        self.speed_kph = f32::from(raw) / 100.0;
        self.speed_outdated = false;
        Ok(())
    }

    /// Accept a raw gear position.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::GearOutOfRange`] for values outside the
    /// declared enum range; the cached value is not updated.
    pub fn update_gear(&mut self, raw: u8) -> StateResult<()> {
        let gear = GearPosition::from_raw(raw);
        if gear == GearPosition::Invalid {
            return Err(StateError::GearOutOfRange { raw });
        }
        self.gear = gear;
        self.gear_outdated = false;
        Ok(())
    }

    /// Accept a raw rain sensor level.
    pub fn update_rain(&mut self, raw: u8) {
        self.rain_level = raw;
    }

    /// Mark the cyclic speed source as timed out.
    pub fn mark_speed_outdated(&mut self) {
        self.speed_outdated = true;
    }

    /// Mark the cyclic gear source as timed out.
    pub fn mark_gear_outdated(&mut self) {
        self.gear_outdated = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_speed_boundaries() {
        let mut cache = VehicleCache::new();
        assert!(cache.update_speed(0).is_ok());
        assert!((cache.speed_kph - 0.0).abs() < f32::EPSILON);

        assert!(cache.update_speed(MAX_SPEED_RAW).is_ok());
        assert!((cache.speed_kph - 400.0).abs() < 1e-4);

        assert!(matches!(
            cache.update_speed(MAX_SPEED_RAW + 1),
            Err(StateError::SpeedOutOfRange { .. })
        ));
        // Rejected update leaves the cache untouched.
        assert!((cache.speed_kph - 400.0).abs() < 1e-4);
    }

    #[test]
    fn test_gear_range() {
        let mut cache = VehicleCache::new();
        assert!(cache.update_gear(3).is_ok());
        assert_eq!(cache.gear, GearPosition::Drive);

        assert!(matches!(
            cache.update_gear(5),
            Err(StateError::GearOutOfRange { raw: 5 })
        ));
        assert_eq!(cache.gear, GearPosition::Drive);
    }

    #[test]
    fn test_gear_round_trip() {
        for raw in 0..=4u8 {
            assert_eq!(GearPosition::from_raw(raw).raw(), raw);
        }
        assert_eq!(GearPosition::from_raw(200), GearPosition::Invalid);
    }

    #[test]
    fn test_outdated_flags_cleared_by_update() {
        let mut cache = VehicleCache::new();
        assert!(cache.speed_outdated);

        cache.update_speed(1000).expect("valid");
        assert!(!cache.speed_outdated);

        cache.mark_speed_outdated();
        assert!(cache.speed_outdated);

        cache.update_speed(1100).expect("valid");
        assert!(!cache.speed_outdated);
    }
}
