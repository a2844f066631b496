//! # Actuator Calibration Store
//!
//! Validated form of the calibration section of the parameter file. The raw parameters arrive as
//! parallel per-group arrays indexed by group position, [`CalibStore::build`] cross checks them
//! and folds them into one [`CalibRecord`] per actuator. Everything downstream of the build works
//! from records and can assume they are complete and consistent.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::collections::HashMap;

use comms_if::eqpt::mech::ActId;

use crate::params::MechExecParams;
use crate::servo_ctrl::ChannelAddr;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Validated calibration data for all actuators on the rover.
pub struct CalibStore {
    /// The servo driver boards, in board index order.
    pub boards: Vec<BoardInfo>,

    records: HashMap<ActId, CalibRecord>
}

/// One servo driver board as described by the parameter file.
#[derive(Debug, Clone, Copy)]
pub struct BoardInfo {
    pub i2c_address: u8,
    pub num_channels: usize
}

/// Calibration of a single actuator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibRecord {
    /// The servo channel the actuator is wired to.
    pub addr: ChannelAddr,

    /// Gain of the linear demand to servo unit conversion.
    pub gain: f64,

    /// Offset of the linear demand to servo unit conversion. Also the servo unit value of a zero
    /// demand, which is what a stop commands.
    pub offset: f64,

    /// Lowest servo unit value the actuator may be commanded to.
    pub hw_min: f64,

    /// Highest servo unit value the actuator may be commanded to.
    pub hw_max: f64,

    /// The kind of servo fitted to the actuator.
    pub kind: ServoKind
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// The kind of servo fitted to an actuator, with its electrical configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ServoKind {
    /// A positional servo taking angles in degrees.
    Positional {
        actuation_range_deg: f64,
        pulse_width_us: (f64, f64)
    },

    /// A continuous rotation servo taking normalised throttles.
    Continuous
}

/// Errors found while validating the calibration parameters.
#[derive(thiserror::Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("Required parameter \"{0}\" is missing")]
    MissingField(&'static str),

    #[error("Parameter \"{field}\" has {found} entries, expected {expected}")]
    ShapeMismatch {
        field: &'static str,
        expected: usize,
        found: usize
    },

    #[error("{id} is mapped to board {board} but only {num_boards} boards are configured")]
    BoardOutOfRange {
        id: ActId,
        board: usize,
        num_boards: usize
    },

    #[error(
        "{id} is mapped to channel {channel} on board {board}, which only has {num_channels} \
        channels"
    )]
    ChannelOutOfRange {
        id: ActId,
        board: usize,
        channel: usize,
        num_channels: usize
    },

    #[error("{first} and {second} are both mapped to {addr}")]
    DuplicateAddress {
        first: ActId,
        second: ActId,
        addr: ChannelAddr
    },

    #[error("{id} has an inverted limit range, min {min} is greater than max {max}")]
    InvertedRange {
        id: ActId,
        min: f64,
        max: f64
    },

    #[error(
        "{id} limits [{min}, {max}] are outside the commandable range [{legal_min}, {legal_max}]"
    )]
    LimitsOutOfRange {
        id: ActId,
        min: f64,
        max: f64,
        legal_min: f64,
        legal_max: f64
    }
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl CalibRecord {
    /// Convert a demand into servo units.
    ///
    /// The demand goes through the linear calibration and is then saturated to the actuator's
    /// limits. With `hw_min` equal to `hw_max` the output is pinned to that value regardless of
    /// the demand.
    pub fn convert(&self, demand: f64) -> f64 {
        util::maths::clamp(
            &(self.gain * demand + self.offset),
            &self.hw_min,
            &self.hw_max
        )
    }
}

impl CalibStore {
    /// Build the store from raw parameters.
    ///
    /// All fields are checked for presence and shape, channel addresses are checked against the
    /// board descriptions and against each other, and limit ranges are checked for inversion and
    /// for fit inside the commandable range of the servo kind. The first problem found is
    /// returned.
    pub fn build(params: &MechExecParams) -> Result<Self, ConfigError> {
        let addresses = params.board_addresses
            .as_ref()
            .ok_or(ConfigError::MissingField("board_addresses"))?;
        let num_channels = group_array(
            &params.board_num_channels,
            "board_num_channels",
            addresses.len()
        )?;

        let boards: Vec<BoardInfo> = addresses
            .iter()
            .zip(num_channels.iter())
            .map(|(address, num_channels)| BoardInfo {
                i2c_address: *address,
                num_channels: *num_channels
            })
            .collect();

        let mut records = HashMap::new();
        let mut seen = HashMap::new();

        // Drive group, continuous rotation servos
        let idx_map = group_array(
            &params.drv_idx_map, "drv_idx_map", ActId::DRV_IDS.len()
        )?;
        let coeffs = group_array(
            &params.drv_rate_norm_to_sk_coeffs,
            "drv_rate_norm_to_sk_coeffs",
            ActId::DRV_IDS.len()
        )?;
        let mins = group_array(&params.drv_rate_min_sk, "drv_rate_min_sk", ActId::DRV_IDS.len())?;
        let maxs = group_array(&params.drv_rate_max_sk, "drv_rate_max_sk", ActId::DRV_IDS.len())?;

        for &id in ActId::DRV_IDS.iter() {
            let i = id.group_index();
            let addr = parse_addr(id, "drv_idx_map", &idx_map[i], &boards, &mut seen)?;
            let (gain, offset) = parse_coeffs("drv_rate_norm_to_sk_coeffs", &coeffs[i])?;
            check_bounds(id, mins[i], maxs[i], (-1.0, 1.0))?;

            records.insert(id, CalibRecord {
                addr,
                gain,
                offset,
                hw_min: mins[i],
                hw_max: maxs[i],
                kind: ServoKind::Continuous
            });
        }

        // Steer group, positional servos
        let idx_map = group_array(
            &params.str_idx_map, "str_idx_map", ActId::STR_IDS.len()
        )?;
        let coeffs = group_array(
            &params.str_ang_rad_to_sk_coeffs,
            "str_ang_rad_to_sk_coeffs",
            ActId::STR_IDS.len()
        )?;
        let mins = group_array(&params.str_ang_min_sk, "str_ang_min_sk", ActId::STR_IDS.len())?;
        let maxs = group_array(&params.str_ang_max_sk, "str_ang_max_sk", ActId::STR_IDS.len())?;
        let act_ranges = group_array(
            &params.str_act_range_sk, "str_act_range_sk", ActId::STR_IDS.len()
        )?;
        let pw_mins = group_array(
            &params.str_pw_range_min, "str_pw_range_min", ActId::STR_IDS.len()
        )?;
        let pw_maxs = group_array(
            &params.str_pw_range_max, "str_pw_range_max", ActId::STR_IDS.len()
        )?;

        for &id in ActId::STR_IDS.iter() {
            let i = id.group_index();
            let addr = parse_addr(id, "str_idx_map", &idx_map[i], &boards, &mut seen)?;
            let (gain, offset) = parse_coeffs("str_ang_rad_to_sk_coeffs", &coeffs[i])?;
            check_bounds(id, mins[i], maxs[i], (0.0, act_ranges[i]))?;

            records.insert(id, CalibRecord {
                addr,
                gain,
                offset,
                hw_min: mins[i],
                hw_max: maxs[i],
                kind: ServoKind::Positional {
                    actuation_range_deg: act_ranges[i],
                    pulse_width_us: (pw_mins[i], pw_maxs[i])
                }
            });
        }

        // Arm group, positional servos with their own electrical configuration
        let idx_map = group_array(
            &params.arm_idx_map, "arm_idx_map", ActId::ARM_IDS.len()
        )?;
        let coeffs = group_array(
            &params.arm_ang_rad_to_sk_coeffs,
            "arm_ang_rad_to_sk_coeffs",
            ActId::ARM_IDS.len()
        )?;
        let mins = group_array(&params.arm_ang_min_sk, "arm_ang_min_sk", ActId::ARM_IDS.len())?;
        let maxs = group_array(&params.arm_ang_max_sk, "arm_ang_max_sk", ActId::ARM_IDS.len())?;
        let act_ranges = group_array(
            &params.arm_act_range_sk, "arm_act_range_sk", ActId::ARM_IDS.len()
        )?;
        let pw_mins = group_array(
            &params.arm_pw_range_min, "arm_pw_range_min", ActId::ARM_IDS.len()
        )?;
        let pw_maxs = group_array(
            &params.arm_pw_range_max, "arm_pw_range_max", ActId::ARM_IDS.len()
        )?;

        for &id in ActId::ARM_IDS.iter() {
            let i = id.group_index();
            let addr = parse_addr(id, "arm_idx_map", &idx_map[i], &boards, &mut seen)?;
            let (gain, offset) = parse_coeffs("arm_ang_rad_to_sk_coeffs", &coeffs[i])?;
            check_bounds(id, mins[i], maxs[i], (0.0, act_ranges[i]))?;

            records.insert(id, CalibRecord {
                addr,
                gain,
                offset,
                hw_min: mins[i],
                hw_max: maxs[i],
                kind: ServoKind::Positional {
                    actuation_range_deg: act_ranges[i],
                    pulse_width_us: (pw_mins[i], pw_maxs[i])
                }
            });
        }

        Ok(Self { boards, records })
    }

    /// Get the calibration record of an actuator.
    ///
    /// Every actuator in [`ActId::ALL`] has a record, [`CalibStore::build`] fails otherwise.
    pub fn get(&self, id: ActId) -> &CalibRecord {
        &self.records[&id]
    }
}

// ------------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Unwrap a per-group parameter array, checking presence and length.
fn group_array<'a, T>(
    field: &'a Option<Vec<T>>,
    name: &'static str,
    expected: usize
) -> Result<&'a [T], ConfigError> {
    let values = field
        .as_ref()
        .ok_or(ConfigError::MissingField(name))?;

    if values.len() != expected {
        return Err(ConfigError::ShapeMismatch {
            field: name,
            expected,
            found: values.len()
        })
    }

    Ok(values)
}

/// Parse one `[board, channel]` index map entry into a checked [`ChannelAddr`].
fn parse_addr(
    id: ActId,
    field: &'static str,
    entry: &[usize],
    boards: &[BoardInfo],
    seen: &mut HashMap<ChannelAddr, ActId>
) -> Result<ChannelAddr, ConfigError> {
    if entry.len() != 2 {
        return Err(ConfigError::ShapeMismatch {
            field,
            expected: 2,
            found: entry.len()
        })
    }

    let addr = ChannelAddr {
        board: entry[0],
        channel: entry[1]
    };

    let board = boards
        .get(addr.board)
        .ok_or(ConfigError::BoardOutOfRange {
            id,
            board: addr.board,
            num_boards: boards.len()
        })?;

    if addr.channel >= board.num_channels {
        return Err(ConfigError::ChannelOutOfRange {
            id,
            board: addr.board,
            channel: addr.channel,
            num_channels: board.num_channels
        })
    }

    if let Some(first) = seen.insert(addr, id) {
        return Err(ConfigError::DuplicateAddress {
            first,
            second: id,
            addr
        })
    }

    Ok(addr)
}

/// Parse one `[gain, offset]` coefficient entry.
fn parse_coeffs(field: &'static str, entry: &[f64]) -> Result<(f64, f64), ConfigError> {
    if entry.len() != 2 {
        return Err(ConfigError::ShapeMismatch {
            field,
            expected: 2,
            found: entry.len()
        })
    }

    Ok((entry[0], entry[1]))
}

/// Check a limit range for inversion and for fit inside the commandable range.
///
/// A limit outside what the servo bank will accept would otherwise pass the load and only
/// surface as a write failure on the first demand near that limit.
fn check_bounds(
    id: ActId,
    min: f64,
    max: f64,
    legal: (f64, f64)
) -> Result<(), ConfigError> {
    if min > max {
        return Err(ConfigError::InvertedRange { id, min, max })
    }

    if min < legal.0 || max > legal.1 {
        return Err(ConfigError::LimitsOutOfRange {
            id,
            min,
            max,
            legal_min: legal.0,
            legal_max: legal.1
        })
    }

    Ok(())
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_build_valid() {
        let store = CalibStore::build(&MechExecParams::dummy()).unwrap();

        assert_eq!(store.boards.len(), 2);
        assert_eq!(store.boards[1].i2c_address, 0x41);

        let drv_ml = store.get(ActId::DrvML);
        assert_eq!(drv_ml.addr, ChannelAddr { board: 0, channel: 1 });
        assert_eq!(drv_ml.gain, 0.5);
        assert_eq!(drv_ml.offset, 0.1);
        assert_eq!(drv_ml.kind, ServoKind::Continuous);

        let str_fl = store.get(ActId::StrFL);
        assert_eq!(str_fl.addr, ChannelAddr { board: 0, channel: 6 });
        assert_eq!(
            str_fl.kind,
            ServoKind::Positional {
                actuation_range_deg: 180.0,
                pulse_width_us: (750.0, 2250.0)
            }
        );

        // The grabber runs a different servo to the rest of the arm
        let grabber = store.get(ActId::ArmGrabber);
        assert_eq!(
            grabber.kind,
            ServoKind::Positional {
                actuation_range_deg: 270.0,
                pulse_width_us: (500.0, 2500.0)
            }
        );
    }

    #[test]
    fn test_missing_fields() {
        let mut params = MechExecParams::dummy();
        params.board_addresses = None;
        assert_eq!(
            CalibStore::build(&params).err(),
            Some(ConfigError::MissingField("board_addresses"))
        );

        let mut params = MechExecParams::dummy();
        params.str_ang_min_sk = None;
        assert_eq!(
            CalibStore::build(&params).err(),
            Some(ConfigError::MissingField("str_ang_min_sk"))
        );
    }

    #[test]
    fn test_wrong_group_length() {
        let mut params = MechExecParams::dummy();
        params.drv_rate_min_sk = Some(vec![-1.0; 5]);

        assert_eq!(
            CalibStore::build(&params).err(),
            Some(ConfigError::ShapeMismatch {
                field: "drv_rate_min_sk",
                expected: 6,
                found: 5
            })
        );
    }

    #[test]
    fn test_wrong_entry_arity() {
        let mut params = MechExecParams::dummy();
        params.drv_idx_map.as_mut().unwrap()[3] = vec![0];
        assert_eq!(
            CalibStore::build(&params).err(),
            Some(ConfigError::ShapeMismatch {
                field: "drv_idx_map",
                expected: 2,
                found: 1
            })
        );

        let mut params = MechExecParams::dummy();
        params.str_ang_rad_to_sk_coeffs.as_mut().unwrap()[2] = vec![60.0, 90.0, 0.0];
        assert_eq!(
            CalibStore::build(&params).err(),
            Some(ConfigError::ShapeMismatch {
                field: "str_ang_rad_to_sk_coeffs",
                expected: 2,
                found: 3
            })
        );
    }

    #[test]
    fn test_board_out_of_range() {
        let mut params = MechExecParams::dummy();
        params.arm_idx_map.as_mut().unwrap()[0] = vec![2, 0];

        assert_eq!(
            CalibStore::build(&params).err(),
            Some(ConfigError::BoardOutOfRange {
                id: ActId::ArmBase,
                board: 2,
                num_boards: 2
            })
        );
    }

    #[test]
    fn test_channel_out_of_range() {
        let mut params = MechExecParams::dummy();
        params.drv_idx_map.as_mut().unwrap()[0] = vec![0, 16];

        assert_eq!(
            CalibStore::build(&params).err(),
            Some(ConfigError::ChannelOutOfRange {
                id: ActId::DrvFL,
                board: 0,
                channel: 16,
                num_channels: 16
            })
        );
    }

    #[test]
    fn test_duplicate_address() {
        let mut params = MechExecParams::dummy();
        params.str_idx_map.as_mut().unwrap()[1] = vec![0, 6];

        assert_eq!(
            CalibStore::build(&params).err(),
            Some(ConfigError::DuplicateAddress {
                first: ActId::StrFL,
                second: ActId::StrML,
                addr: ChannelAddr { board: 0, channel: 6 }
            })
        );
    }

    #[test]
    fn test_inverted_range() {
        let mut params = MechExecParams::dummy();
        params.arm_ang_min_sk.as_mut().unwrap()[1] = 200.0;

        assert_eq!(
            CalibStore::build(&params).err(),
            Some(ConfigError::InvertedRange {
                id: ActId::ArmShoulder,
                min: 200.0,
                max: 170.0
            })
        );
    }

    #[test]
    fn test_limits_outside_commandable_range() {
        // A steer limit beyond the servo's actuation range would only surface as a write
        // failure on the first demand near that limit, so the load rejects it
        let mut params = MechExecParams::dummy();
        params.str_ang_max_sk.as_mut().unwrap()[0] = 200.0;

        assert_eq!(
            CalibStore::build(&params).err(),
            Some(ConfigError::LimitsOutOfRange {
                id: ActId::StrFL,
                min: 0.0,
                max: 200.0,
                legal_min: 0.0,
                legal_max: 180.0
            })
        );

        // Throttle limits are bounded by the normalised throttle range
        let mut params = MechExecParams::dummy();
        params.drv_rate_min_sk.as_mut().unwrap()[3] = -1.5;

        assert_eq!(
            CalibStore::build(&params).err(),
            Some(ConfigError::LimitsOutOfRange {
                id: ActId::DrvFR,
                min: -1.5,
                max: 1.0,
                legal_min: -1.0,
                legal_max: 1.0
            })
        );
    }

    #[test]
    fn test_convert() {
        let record = CalibRecord {
            addr: ChannelAddr { board: 0, channel: 0 },
            gain: 2.0,
            offset: 1.0,
            hw_min: 0.0,
            hw_max: 10.0,
            kind: ServoKind::Continuous
        };

        assert_eq!(record.convert(2.0), 5.0);
        assert_eq!(record.convert(10.0), 10.0);
        assert_eq!(record.convert(-3.0), 0.0);

        // Equal limits pin the output no matter the demand
        let pinned = CalibRecord {
            hw_min: 3.0,
            hw_max: 3.0,
            ..record
        };
        assert_eq!(pinned.convert(100.0), 3.0);
        assert_eq!(pinned.convert(-100.0), 3.0);
    }
}
