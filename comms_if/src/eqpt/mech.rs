//! # Mechanisms Equipment Commands
//!
//! Messages exchanged with the mechanisms executable: actuator demands, the server's response to
//! them, and the sensor data published after each batch.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use chrono::{DateTime, Utc, serde::ts_milliseconds};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Demands that are sent from the MechClient to the MechServer.
///
/// Keys are actuator ID names as produced by [`ActId`]'s `Display` impl. String keys are used
/// rather than `ActId` itself so that a batch containing an unknown name still deserialises,
/// letting the server skip the bad entry and actuate the rest.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct MechDems {
    /// The demanded position of an actuator in radians.
    pub pos_rad: HashMap<String, f64>,

    /// The demanded speed of an actuator in radians per second, normalised to [-1, +1] for drive
    /// motors.
    pub speed_rads: HashMap<String, f64>
}

/// Sensor data published by the MechServer after each demand batch.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct MechSensData {
    /// Time at which this data was published.
    #[serde(with = "ts_milliseconds")]
    pub timestamp: DateTime<Utc>,

    /// Current state of the mechanisms executable.
    pub state: MechState,

    /// Number of demand batches actuated since boot.
    pub batches_applied: u64,

    /// Number of demand entries skipped as unactuatable since boot.
    pub entries_skipped: u64
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// IDs of all actuators available to the rover
#[derive(Serialize, Deserialize, Debug, Hash, Eq, PartialEq, Copy, Clone)]
pub enum ActId {
    DrvFL,
    DrvML,
    DrvRL,
    DrvFR,
    DrvMR,
    DrvRR,
    StrFL,
    StrML,
    StrRL,
    StrFR,
    StrMR,
    StrRR,
    ArmBase,
    ArmShoulder,
    ArmElbow,
    ArmWrist,
    ArmGrabber
}

/// Functional groups the actuators divide into.
///
/// Drive motors are continuous-rotation and take speed demands, steer and arm servos are
/// positional and take position demands.
#[derive(Serialize, Deserialize, Debug, Hash, Eq, PartialEq, Copy, Clone)]
pub enum ActGroup {
    Drive,
    Steer,
    Arm
}

/// State of the mechanisms executable, as reported in [`MechSensData`].
#[derive(Serialize, Deserialize, Debug, Eq, PartialEq, Copy, Clone)]
pub enum MechState {
    /// All actuators are at rest and no demands are being actuated.
    Stopped,

    /// Demands are being accepted and actuated.
    Running,

    /// A stop is in progress, actuators are being brought to rest.
    Stopping
}

/// Response from the mechanisms server based on the demands sent by the client.
#[derive(Serialize, Deserialize, Debug, Eq, PartialEq, Copy, Clone)]
pub enum MechDemsResponse {
    /// Demands were valid and have been actuated
    DemsOk,

    /// Demands were invalid and have been rejected
    DemsInvalid,

    /// Equipment is invalid so demands cannot be actuated
    EqptInvalid
}

/// Error returned when parsing a string which is not a valid [`ActId`] name.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
#[error("Unrecognised actuator ID \"{0}\"")]
pub struct ActIdParseError(pub String);

// -----------------------------------------------------------------------------------------------
// IMPLS
// -----------------------------------------------------------------------------------------------

impl ActId {
    /// All actuator IDs, drive then steer then arm.
    pub const ALL: [ActId; 17] = [
        ActId::DrvFL,
        ActId::DrvML,
        ActId::DrvRL,
        ActId::DrvFR,
        ActId::DrvMR,
        ActId::DrvRR,
        ActId::StrFL,
        ActId::StrML,
        ActId::StrRL,
        ActId::StrFR,
        ActId::StrMR,
        ActId::StrRR,
        ActId::ArmBase,
        ActId::ArmShoulder,
        ActId::ArmElbow,
        ActId::ArmWrist,
        ActId::ArmGrabber
    ];

    /// Drive actuator IDs in group index order.
    pub const DRV_IDS: [ActId; 6] = [
        ActId::DrvFL,
        ActId::DrvML,
        ActId::DrvRL,
        ActId::DrvFR,
        ActId::DrvMR,
        ActId::DrvRR
    ];

    /// Steer actuator IDs in group index order.
    pub const STR_IDS: [ActId; 6] = [
        ActId::StrFL,
        ActId::StrML,
        ActId::StrRL,
        ActId::StrFR,
        ActId::StrMR,
        ActId::StrRR
    ];

    /// Arm actuator IDs in group index order.
    pub const ARM_IDS: [ActId; 5] = [
        ActId::ArmBase,
        ActId::ArmShoulder,
        ActId::ArmElbow,
        ActId::ArmWrist,
        ActId::ArmGrabber
    ];

    /// Return the group this actuator belongs to.
    pub fn group(&self) -> ActGroup {
        match self {
            ActId::DrvFL
            | ActId::DrvML
            | ActId::DrvRL
            | ActId::DrvFR
            | ActId::DrvMR
            | ActId::DrvRR => ActGroup::Drive,
            ActId::StrFL
            | ActId::StrML
            | ActId::StrRL
            | ActId::StrFR
            | ActId::StrMR
            | ActId::StrRR => ActGroup::Steer,
            ActId::ArmBase
            | ActId::ArmShoulder
            | ActId::ArmElbow
            | ActId::ArmWrist
            | ActId::ArmGrabber => ActGroup::Arm
        }
    }

    /// Return the index of this actuator within its group.
    ///
    /// This is the index used by the per-group arrays in the parameter file, for example
    /// `str_idx_map` or `arm_ang_min_sk`.
    pub fn group_index(&self) -> usize {
        match self {
            ActId::DrvFL => 0,
            ActId::DrvML => 1,
            ActId::DrvRL => 2,
            ActId::DrvFR => 3,
            ActId::DrvMR => 4,
            ActId::DrvRR => 5,
            ActId::StrFL => 0,
            ActId::StrML => 1,
            ActId::StrRL => 2,
            ActId::StrFR => 3,
            ActId::StrMR => 4,
            ActId::StrRR => 5,
            ActId::ArmBase => 0,
            ActId::ArmShoulder => 1,
            ActId::ArmElbow => 2,
            ActId::ArmWrist => 3,
            ActId::ArmGrabber => 4
        }
    }

    /// Return the name of this actuator as used on the wire.
    pub fn name(&self) -> &'static str {
        match self {
            ActId::DrvFL => "DrvFL",
            ActId::DrvML => "DrvML",
            ActId::DrvRL => "DrvRL",
            ActId::DrvFR => "DrvFR",
            ActId::DrvMR => "DrvMR",
            ActId::DrvRR => "DrvRR",
            ActId::StrFL => "StrFL",
            ActId::StrML => "StrML",
            ActId::StrRL => "StrRL",
            ActId::StrFR => "StrFR",
            ActId::StrMR => "StrMR",
            ActId::StrRR => "StrRR",
            ActId::ArmBase => "ArmBase",
            ActId::ArmShoulder => "ArmShoulder",
            ActId::ArmElbow => "ArmElbow",
            ActId::ArmWrist => "ArmWrist",
            ActId::ArmGrabber => "ArmGrabber"
        }
    }
}

impl fmt::Display for ActId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for ActId {
    type Err = ActIdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ActId::ALL
            .iter()
            .find(|id| id.name() == s)
            .copied()
            .ok_or_else(|| ActIdParseError(s.into()))
    }
}

impl ActGroup {
    /// Return the number of actuators in this group.
    pub fn num_acts(&self) -> usize {
        match self {
            ActGroup::Drive => ActId::DRV_IDS.len(),
            ActGroup::Steer => ActId::STR_IDS.len(),
            ActGroup::Arm => ActId::ARM_IDS.len()
        }
    }
}

impl fmt::Display for ActGroup {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ActGroup::Drive => write!(f, "Drive"),
            ActGroup::Steer => write!(f, "Steer"),
            ActGroup::Arm => write!(f, "Arm")
        }
    }
}

impl MechDems {
    /// Return a demand set with no entries at all.
    pub fn empty() -> Self {
        Self {
            pos_rad: HashMap::new(),
            speed_rads: HashMap::new()
        }
    }
}

impl Default for MechDems {
    /// The default demand set commands every actuator to its rest value, zero position for the
    /// positional actuators and zero speed for the drive motors.
    fn default() -> Self {
        let mut pos_rad = HashMap::new();
        let mut speed_rads = HashMap::new();

        for id in ActId::STR_IDS.iter().chain(ActId::ARM_IDS.iter()) {
            pos_rad.insert(id.to_string(), 0.0);
        }

        for id in ActId::DRV_IDS.iter() {
            speed_rads.insert(id.to_string(), 0.0);
        }

        Self {
            pos_rad,
            speed_rads
        }
    }
}

// -----------------------------------------------------------------------------------------------
// TESTS
// -----------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_act_id_names() {
        // Names must survive a round trip since they are the demand map keys on the wire
        for id in ActId::ALL.iter() {
            assert_eq!(ActId::from_str(id.name()), Ok(*id));
        }

        assert!(ActId::from_str("DrvXX").is_err());
        assert!(ActId::from_str("").is_err());
    }

    #[test]
    fn test_act_id_groups() {
        assert_eq!(ActId::DrvRR.group(), ActGroup::Drive);
        assert_eq!(ActId::DrvRR.group_index(), 5);
        assert_eq!(ActId::StrFL.group(), ActGroup::Steer);
        assert_eq!(ActId::StrFL.group_index(), 0);
        assert_eq!(ActId::ArmGrabber.group(), ActGroup::Arm);
        assert_eq!(ActId::ArmGrabber.group_index(), 4);

        assert_eq!(ActGroup::Drive.num_acts(), 6);
        assert_eq!(ActGroup::Steer.num_acts(), 6);
        assert_eq!(ActGroup::Arm.num_acts(), 5);
    }

    #[test]
    fn test_dems_wire_format() {
        // Format produced by existing clients, string keyed maps under pos_rad and speed_rads
        let json = r#"{
            "pos_rad": {"StrFL": 0.25, "ArmBase": -0.1},
            "speed_rads": {"DrvFL": 0.5, "NotAnAct": 1.0}
        }"#;

        let dems: MechDems = serde_json::from_str(json).unwrap();

        assert_eq!(dems.pos_rad.get("StrFL"), Some(&0.25));
        assert_eq!(dems.speed_rads.get("DrvFL"), Some(&0.5));

        // Unknown names must not fail deserialisation, the server decides what to do with them
        assert_eq!(dems.speed_rads.get("NotAnAct"), Some(&1.0));
    }

    #[test]
    fn test_response_wire_format() {
        // Clients match on the exact reply string
        assert_eq!(
            serde_json::to_string(&MechDemsResponse::DemsOk).unwrap(),
            "\"DemsOk\""
        );
        assert_eq!(
            serde_json::from_str::<MechDemsResponse>("\"DemsInvalid\"").unwrap(),
            MechDemsResponse::DemsInvalid
        );
    }

    #[test]
    fn test_default_dems_are_safe() {
        let dems = MechDems::default();

        // Every positional actuator is at zero and every drive motor stationary
        assert_eq!(dems.pos_rad.len(), 11);
        assert_eq!(dems.speed_rads.len(), 6);
        assert!(dems.pos_rad.values().all(|v| *v == 0.0));
        assert!(dems.speed_rads.values().all(|v| *v == 0.0));
    }
}
