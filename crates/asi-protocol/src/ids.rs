//! Well-known message id constants.
//!
//! Ids are grouped by origin. The dictionary in [`crate::dictionary`] maps
//! each id to its logical role; these constants exist so tests and
//! integration code can name messages without going through a role first.

/// VAM-origin action request ids, `0x0000..=0x000A`.
pub mod action_request {
    /// Engage automated driving.
    pub const ENGAGE_AUTOMATION: u16 = 0x0000;
    /// Disengage automated driving.
    pub const DISENGAGE_AUTOMATION: u16 = 0x0001;
    /// Select a target gear.
    pub const SET_TARGET_GEAR: u16 = 0x0002;
    /// Select a target speed.
    pub const SET_TARGET_SPEED: u16 = 0x0003;
    /// Apply service brake.
    pub const APPLY_BRAKE: u16 = 0x0004;
    /// Release service brake.
    pub const RELEASE_BRAKE: u16 = 0x0005;
    /// Adjust steering angle.
    pub const STEERING_ADJUST: u16 = 0x0006;
    /// Sound the horn.
    pub const ACTIVATE_HORN: u16 = 0x0007;
    /// Exterior lamp control.
    pub const LAMP_CONTROL: u16 = 0x0008;
    /// Wiper control.
    pub const WIPER_CONTROL: u16 = 0x0009;
    /// Hazard light control.
    pub const HAZARD_CONTROL: u16 = 0x000A;
}

/// CM-origin message ids.
pub mod control_module {
    /// Acknowledgement of a message the ASI sent.
    pub const ACK: u16 = 0x0201;
    /// Cyclic PRNDL (gear position) status.
    pub const PRNDL: u16 = 0x03E8;
    /// Cyclic vehicle speed status.
    pub const VEHICLE_SPEED: u16 = 0x03E9;
    /// Cyclic rain sensor status.
    pub const RAIN_SENSOR: u16 = 0x07D0;
    /// Calibration readback echo.
    pub const CALIB_READBACK: u16 = 0x0301;
    /// Critical ECU failure report.
    pub const CRITICAL_FAIL: u16 = 0xFF01;
    /// Non-critical ECU failure report.
    pub const NON_CRITICAL_FAIL: u16 = 0xFF02;
}

/// ASI-origin message ids.
pub mod interlock {
    /// Calibration request carrying data for the CM to echo.
    pub const CALIB_REQUEST: u16 = 0x0300;
    /// Startup-test progress notification.
    pub const STARTUP_TEST_NOTIFICATION: u16 = 0x1010;
    /// Periodic status notification.
    pub const STATUS_NOTIFICATION: u16 = 0x1011;
    /// Action-request disposition notification.
    pub const ACTION_NOTIFICATION: u16 = 0x1012;
}

/// Health probe payload sent on the raw stream, outside the frame format.
pub const HEALTH_PROBE: &[u8; 4] = b"PING";
