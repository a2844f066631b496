//! # Mechanisms Module
//!
//! Core of the mechanisms executable. [`Mechanisms`] owns the actuator registry and the servo
//! bank, carries demand batches through calibration onto the hardware, and provides the stop
//! path which idles every drive motor. [`run`] is the serve loop the executable spends its life
//! in, whatever ends the loop the mechanisms are commanded to stop before it returns.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

pub mod calib;
pub mod registry;

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Utc;
use comms_if::eqpt::mech::{
    ActGroup, ActId, MechDems, MechDemsResponse, MechSensData, MechState
};
use log::{debug, error, info, warn};

use self::calib::CalibStore;
use self::registry::ActuatorRegistry;
use crate::mech_server::{MechServer, MechServerError};
use crate::servo_ctrl::{ServoBank, ServoError};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// The mechanisms engine, actuation state and hardware access in one place.
pub struct Mechanisms<B: ServoBank> {
    registry: ActuatorRegistry,
    bank: B,
    state: MechState,
    batches_applied: u64,
    entries_skipped: u64
}

/// Summary of one actuated demand batch.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct BatchReport {
    /// Number of demand entries written to the servo bank.
    pub applied: usize,

    /// Number of demand entries skipped as unactuatable.
    pub skipped: usize
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Errors which can occur while running the mechanisms.
#[derive(thiserror::Error, Debug)]
pub enum MechError {
    #[error("Writing to {id} failed: {source}")]
    HardwareWrite {
        id: ActId,
        source: ServoError
    },

    #[error("Demand channel failure: {0}")]
    Server(#[from] MechServerError)
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl<B: ServoBank> Mechanisms<B> {
    /// Create the mechanisms engine over a calibration store and servo bank.
    ///
    /// Positional channels of the bank are configured here. The engine starts in
    /// [`MechState::Stopped`] without having commanded anything, callers are expected to command
    /// a stop before serving demands.
    pub fn new(store: CalibStore, mut bank: B) -> Result<Self, ServoError> {
        let registry = ActuatorRegistry::build(&store, &mut bank)?;

        Ok(Self {
            registry,
            bank,
            state: MechState::Stopped,
            batches_applied: 0,
            entries_skipped: 0
        })
    }

    /// Current state of the mechanisms.
    pub fn state(&self) -> MechState {
        self.state
    }

    /// Access the underlying servo bank.
    pub fn bank(&self) -> &B {
        &self.bank
    }

    /// Snapshot of the mechanisms for publication as sensor data.
    pub fn sens_data(&self) -> MechSensData {
        MechSensData {
            timestamp: Utc::now(),
            state: self.state,
            batches_applied: self.batches_applied,
            entries_skipped: self.entries_skipped
        }
    }

    /// Actuate one batch of demands.
    ///
    /// Position demands are applied before speed demands. Entries which cannot be actuated,
    /// unknown names, non-finite values, or demands for the wrong actuator group, are skipped
    /// and counted while the rest of the batch still goes through. A hardware write failure
    /// aborts the batch immediately.
    pub fn actuate(&mut self, dems: &MechDems) -> Result<BatchReport, MechError> {
        let mut report = BatchReport::default();

        for (name, &pos_rad) in &dems.pos_rad {
            self.actuate_position(name, pos_rad, &mut report)?;
        }

        for (name, &speed_rads) in &dems.speed_rads {
            self.actuate_speed(name, speed_rads, &mut report)?;
        }

        self.batches_applied += 1;
        self.entries_skipped += report.skipped as u64;

        Ok(report)
    }

    /// Stop all motion by commanding every drive motor to its calibrated zero rate.
    ///
    /// Steer and arm servos hold their last commanded position. Every drive motor is attempted
    /// even if one write fails, with the first failure returned. The state only becomes
    /// [`MechState::Stopped`] once all writes succeed.
    pub fn stop(&mut self) -> Result<(), MechError> {
        self.set_state(MechState::Stopping);

        let mut first_err: Option<MechError> = None;

        for act in self.registry.drive_actuators() {
            let throttle = act.calib.convert(0.0);

            if let Err(source) = self.bank.set_throttle(act.calib.addr, throttle) {
                error!("Failed to stop {}: {}", act.id, source);

                if first_err.is_none() {
                    first_err = Some(MechError::HardwareWrite { id: act.id, source });
                }
            }
        }

        match first_err {
            Some(e) => Err(e),
            None => {
                self.set_state(MechState::Stopped);
                Ok(())
            }
        }
    }

    fn actuate_position(
        &mut self,
        name: &str,
        pos_rad: f64,
        report: &mut BatchReport
    ) -> Result<(), MechError> {
        let (id, calib) = match self.registry.resolve_name(name) {
            Ok(act) => (act.id, act.calib),
            Err(e) => {
                warn!("Skipping position demand: {}", e);
                report.skipped += 1;
                return Ok(())
            }
        };

        if !pos_rad.is_finite() {
            warn!("Skipping non-finite position demand {} for {}", pos_rad, id);
            report.skipped += 1;
            return Ok(())
        }

        // Position demands only make sense for positional actuators, one addressed to a drive
        // motor is a legal no-op on the wire
        if id.group() == ActGroup::Drive {
            debug!("Ignoring position demand for drive motor {}", id);
            report.skipped += 1;
            return Ok(())
        }

        let angle_deg = calib.convert(pos_rad);

        self.bank
            .set_angle_deg(calib.addr, angle_deg)
            .map_err(|source| MechError::HardwareWrite { id, source })?;

        report.applied += 1;

        Ok(())
    }

    fn actuate_speed(
        &mut self,
        name: &str,
        speed_rads: f64,
        report: &mut BatchReport
    ) -> Result<(), MechError> {
        let (id, calib) = match self.registry.resolve_name(name) {
            Ok(act) => (act.id, act.calib),
            Err(e) => {
                warn!("Skipping speed demand: {}", e);
                report.skipped += 1;
                return Ok(())
            }
        };

        if !speed_rads.is_finite() {
            warn!("Skipping non-finite speed demand {} for {}", speed_rads, id);
            report.skipped += 1;
            return Ok(())
        }

        // Speed demands only make sense for drive motors
        if id.group() != ActGroup::Drive {
            debug!("Ignoring speed demand for positional actuator {}", id);
            report.skipped += 1;
            return Ok(())
        }

        let throttle = calib.convert(speed_rads);

        self.bank
            .set_throttle(calib.addr, throttle)
            .map_err(|source| MechError::HardwareWrite { id, source })?;

        report.applied += 1;

        Ok(())
    }

    fn set_state(&mut self, state: MechState) {
        if self.state != state {
            info!("Mechanisms state: {:?} -> {:?}", self.state, state);
            self.state = state;
        }
    }
}

// ------------------------------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Serve demand batches until cancelled or until the demand channel fails.
///
/// Each pass blocks on the demands socket for at most
/// [`DEMS_RECV_TIMEOUT_MS`](crate::mech_server::DEMS_RECV_TIMEOUT_MS), actuates whatever arrived,
/// acks the client, and publishes a sensor data snapshot. The client is only acked once its
/// demands are on the hardware, a missing ack tells it the batch cannot be trusted.
///
/// However the loop ends, the mechanisms are commanded to stop before this function returns.
pub fn run<B: ServoBank>(
    mechs: &mut Mechanisms<B>,
    server: &mut MechServer,
    cancel: &AtomicBool
) -> Result<(), MechError> {
    mechs.set_state(MechState::Running);

    let mut result = Ok(());

    while !cancel.load(Ordering::Relaxed) {
        let dems = match server.get_demands() {
            Ok(Some(dems)) => dems,
            Ok(None) => continue,
            Err(e) => {
                error!("Demand channel failed: {}", e);
                result = Err(MechError::Server(e));
                break
            }
        };

        match mechs.actuate(&dems) {
            Ok(report) => debug!(
                "Actuated demand batch, {} applied, {} skipped",
                report.applied,
                report.skipped
            ),
            Err(e) => {
                error!("Actuation failed: {}", e);
                result = Err(e);
                break
            }
        }

        if let Err(e) = server.send_dems_response(&MechDemsResponse::DemsOk) {
            error!("Failed to ack demands: {}", e);
            result = Err(MechError::Server(e));
            break
        }

        // Sensor data is best effort, an unread publication must not stall the loop
        if let Err(e) = server.send_sens_data(&mechs.sens_data()) {
            warn!("Failed to publish sensor data: {}", e);
        }
    }

    let stop_result = mechs.stop();

    if let Err(e) = server.send_sens_data(&mechs.sens_data()) {
        warn!("Failed to publish final sensor data: {}", e);
    }

    result.and(stop_result)
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use crate::params::MechExecParams;
    use crate::servo_ctrl::ChannelAddr;

    /// One command recorded by the mock bank.
    #[derive(Debug, Clone, Copy, PartialEq)]
    enum Cmd {
        Angle { addr: ChannelAddr, angle_deg: f64 },
        Throttle { addr: ChannelAddr, throttle: f64 }
    }

    /// Bank recording every command, optionally failing writes to one address.
    struct MockBank {
        cmds: Vec<Cmd>,
        fail_addr: Option<ChannelAddr>
    }

    impl MockBank {
        fn new() -> Self {
            Self {
                cmds: vec![],
                fail_addr: None
            }
        }
    }

    impl ServoBank for MockBank {
        fn configure_positional(
            &mut self,
            _addr: ChannelAddr,
            _actuation_range_deg: f64,
            _pulse_width_us: (f64, f64)
        ) -> Result<(), ServoError> {
            Ok(())
        }

        fn set_angle_deg(&mut self, addr: ChannelAddr, angle_deg: f64) -> Result<(), ServoError> {
            if self.fail_addr == Some(addr) {
                return Err(ServoError::I2c)
            }
            self.cmds.push(Cmd::Angle { addr, angle_deg });
            Ok(())
        }

        fn set_throttle(&mut self, addr: ChannelAddr, throttle: f64) -> Result<(), ServoError> {
            if self.fail_addr == Some(addr) {
                return Err(ServoError::I2c)
            }
            self.cmds.push(Cmd::Throttle { addr, throttle });
            Ok(())
        }
    }

    fn mechs() -> Mechanisms<MockBank> {
        mechs_with_bank(MockBank::new())
    }

    fn mechs_with_bank(bank: MockBank) -> Mechanisms<MockBank> {
        let store = CalibStore::build(&MechExecParams::dummy()).unwrap();
        Mechanisms::new(store, bank).unwrap()
    }

    #[test]
    fn test_positions_before_speeds() {
        let mut mechs = mechs();

        let mut dems = MechDems::empty();
        dems.speed_rads.insert(String::from("DrvFL"), 0.5);
        dems.pos_rad.insert(String::from("StrRR"), 0.0);

        let report = mechs.actuate(&dems).unwrap();
        assert_eq!(report, BatchReport { applied: 2, skipped: 0 });

        let cmds = &mechs.bank().cmds;
        assert!(matches!(cmds[0], Cmd::Angle { .. }));
        assert!(matches!(cmds[1], Cmd::Throttle { .. }));
    }

    #[test]
    fn test_calibrated_conversion() {
        let mut mechs = mechs();

        let mut dems = MechDems::empty();
        dems.pos_rad.insert(String::from("StrFL"), 0.5);
        dems.pos_rad.insert(String::from("ArmGrabber"), 1.0);
        dems.speed_rads.insert(String::from("DrvML"), 1.0);
        dems.speed_rads.insert(String::from("DrvRL"), 1.0);

        let report = mechs.actuate(&dems).unwrap();
        assert_eq!(report, BatchReport { applied: 4, skipped: 0 });

        let cmds = &mechs.bank().cmds;

        // StrFL at 60 deg/rad gain and 90 deg offset
        assert!(cmds.contains(&Cmd::Angle {
            addr: ChannelAddr { board: 0, channel: 6 },
            angle_deg: 120.0
        }));

        // ArmGrabber at 45 deg/rad gain and 90 deg offset
        assert!(cmds.contains(&Cmd::Angle {
            addr: ChannelAddr { board: 1, channel: 4 },
            angle_deg: 135.0
        }));

        // DrvML through its 0.5 gain and 0.1 offset
        assert!(cmds.contains(&Cmd::Throttle {
            addr: ChannelAddr { board: 0, channel: 1 },
            throttle: 0.6
        }));

        // DrvRL saturates at its 0.5 limit
        assert!(cmds.contains(&Cmd::Throttle {
            addr: ChannelAddr { board: 0, channel: 2 },
            throttle: 0.5
        }));
    }

    #[test]
    fn test_double_apply_same_writes() {
        let mut mechs = mechs();

        let mut dems = MechDems::empty();
        dems.pos_rad.insert(String::from("StrFL"), 0.5);
        dems.pos_rad.insert(String::from("ArmElbow"), -0.25);
        dems.speed_rads.insert(String::from("DrvRR"), 0.75);

        let first = mechs.actuate(&dems).unwrap();
        let first_cmds = mechs.bank().cmds.clone();

        // The engine holds no state between batches, so re-applying the same demands must
        // produce exactly the same writes
        let second = mechs.actuate(&dems).unwrap();
        assert_eq!(first, second);

        let cmds = &mechs.bank().cmds;
        assert_eq!(cmds.len(), first_cmds.len() * 2);
        assert_eq!(cmds[first_cmds.len()..], first_cmds[..]);
    }

    #[test]
    fn test_unknown_name_skipped() {
        let mut mechs = mechs();

        let mut dems = MechDems::empty();
        dems.pos_rad.insert(String::from("NotAnAct"), 1.0);
        dems.pos_rad.insert(String::from("StrML"), 0.0);

        let report = mechs.actuate(&dems).unwrap();
        assert_eq!(report, BatchReport { applied: 1, skipped: 1 });
        assert_eq!(mechs.bank().cmds.len(), 1);
    }

    #[test]
    fn test_non_finite_skipped() {
        let mut mechs = mechs();

        let mut dems = MechDems::empty();
        dems.pos_rad.insert(String::from("StrFL"), std::f64::NAN);
        dems.speed_rads.insert(String::from("DrvFL"), std::f64::INFINITY);

        let report = mechs.actuate(&dems).unwrap();
        assert_eq!(report, BatchReport { applied: 0, skipped: 2 });
        assert!(mechs.bank().cmds.is_empty());
    }

    #[test]
    fn test_wrong_group_skipped() {
        let mut mechs = mechs();

        // Position demand for a drive motor and speed demand for a steer servo
        let mut dems = MechDems::empty();
        dems.pos_rad.insert(String::from("DrvFL"), 1.0);
        dems.speed_rads.insert(String::from("StrFL"), 1.0);

        let report = mechs.actuate(&dems).unwrap();
        assert_eq!(report, BatchReport { applied: 0, skipped: 2 });
        assert!(mechs.bank().cmds.is_empty());
    }

    #[test]
    fn test_hardware_failure_aborts_batch() {
        let mut bank = MockBank::new();
        bank.fail_addr = Some(ChannelAddr { board: 0, channel: 0 });
        let mut mechs = mechs_with_bank(bank);

        let mut dems = MechDems::empty();
        dems.speed_rads.insert(String::from("DrvFL"), 0.1);

        match mechs.actuate(&dems) {
            Err(MechError::HardwareWrite { id, .. }) => assert_eq!(id, ActId::DrvFL),
            other => panic!("expected a hardware write failure, got {:?}", other)
        }

        // An aborted batch does not count as applied
        assert_eq!(mechs.sens_data().batches_applied, 0);
    }

    #[test]
    fn test_stop_commands_calibrated_zero() {
        let mut mechs = mechs();

        mechs.stop().unwrap();
        assert_eq!(mechs.state(), MechState::Stopped);

        let cmds = &mechs.bank().cmds;
        assert_eq!(cmds.len(), 6);
        assert!(cmds.iter().all(|cmd| matches!(cmd, Cmd::Throttle { .. })));

        // DrvML idles at its 0.1 offset, not at raw zero
        assert_eq!(
            cmds[1],
            Cmd::Throttle {
                addr: ChannelAddr { board: 0, channel: 1 },
                throttle: 0.1
            }
        );
    }

    #[test]
    fn test_stop_attempts_all_drives_on_failure() {
        let mut bank = MockBank::new();
        bank.fail_addr = Some(ChannelAddr { board: 0, channel: 0 });
        let mut mechs = mechs_with_bank(bank);

        let result = mechs.stop();
        assert!(matches!(
            result,
            Err(MechError::HardwareWrite { id: ActId::DrvFL, .. })
        ));

        // The other five drives were still commanded, and the state honestly reports that the
        // stop never completed
        assert_eq!(mechs.bank().cmds.len(), 5);
        assert_eq!(mechs.state(), MechState::Stopping);
    }

    #[test]
    fn test_sens_data_counters() {
        let mut mechs = mechs();
        assert_eq!(mechs.state(), MechState::Stopped);

        let mut dems = MechDems::empty();
        dems.pos_rad.insert(String::from("ArmBase"), 0.0);
        dems.pos_rad.insert(String::from("Bogus"), 0.0);

        mechs.actuate(&dems).unwrap();
        mechs.actuate(&dems).unwrap();

        let sens = mechs.sens_data();
        assert_eq!(sens.state, MechState::Stopped);
        assert_eq!(sens.batches_applied, 2);
        assert_eq!(sens.entries_skipped, 2);
    }
}
