//! # Mechanisms Executable Parameters

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::Deserialize;

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Number of steer axes on the rover.
const NUM_STR_AXES: usize = 6;

/// Number of drive axes on the rover.
const NUM_DRV_AXES: usize = 6;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Parameters for the mechanisms executable.
///
/// The calibration fields are optional at the serde level so that a missing or misshapen field
/// can be reported by name when the calibration store is built, rather than as a generic
/// deserialisation failure.
///
/// The `_sk` suffix marks values in servo units, degrees for positional servos and normalised
/// throttle for continuous rotation ones.
#[derive(Deserialize)]
pub struct MechExecParams {

    // ---- SERVER ----

    /// Endpoint for the demands socket
    pub demands_endpoint: String,

    /// Endpoint for the sensor data socket
    pub sensor_data_endpoint: String,

    // ---- SERVO BOARDS ----

    /// I2C addresses of the servo driver boards, in board index order
    pub board_addresses: Option<Vec<u8>>,

    /// Number of servo channels on each board
    pub board_num_channels: Option<Vec<usize>>,

    // ---- DRIVE GROUP ----

    /// Servo channel of each drive axis, as a `[board, channel]` pair
    pub drv_idx_map: Option<Vec<Vec<usize>>>,

    /// Linear `[gain, offset]` coefficients mapping a drive rate in rad/s to a throttle
    pub drv_rate_norm_to_sk_coeffs: Option<Vec<Vec<f64>>>,

    /// Lowest throttle each drive axis may be commanded to
    pub drv_rate_min_sk: Option<Vec<f64>>,

    /// Highest throttle each drive axis may be commanded to
    pub drv_rate_max_sk: Option<Vec<f64>>,

    // ---- STEER GROUP ----

    /// Servo channel of each steer axis, as a `[board, channel]` pair
    pub str_idx_map: Option<Vec<Vec<usize>>>,

    /// Linear `[gain, offset]` coefficients mapping a steer angle in radians to a servo angle
    /// in degrees
    pub str_ang_rad_to_sk_coeffs: Option<Vec<Vec<f64>>>,

    /// Lowest servo angle each steer axis may be commanded to, in degrees
    pub str_ang_min_sk: Option<Vec<f64>>,

    /// Highest servo angle each steer axis may be commanded to, in degrees
    pub str_ang_max_sk: Option<Vec<f64>>,

    /// Actuation range of each steer servo, in degrees
    pub str_act_range_sk: Option<Vec<f64>>,

    /// Minimum pulse width of each steer servo, in microseconds
    pub str_pw_range_min: Option<Vec<f64>>,

    /// Maximum pulse width of each steer servo, in microseconds
    pub str_pw_range_max: Option<Vec<f64>>,

    // ---- ARM GROUP ----

    /// Servo channel of each arm joint, as a `[board, channel]` pair
    pub arm_idx_map: Option<Vec<Vec<usize>>>,

    /// Linear `[gain, offset]` coefficients mapping an arm joint angle in radians to a servo
    /// angle in degrees
    pub arm_ang_rad_to_sk_coeffs: Option<Vec<Vec<f64>>>,

    /// Lowest servo angle each arm joint may be commanded to, in degrees
    pub arm_ang_min_sk: Option<Vec<f64>>,

    /// Highest servo angle each arm joint may be commanded to, in degrees
    pub arm_ang_max_sk: Option<Vec<f64>>,

    /// Actuation range of each arm servo, in degrees
    pub arm_act_range_sk: Option<Vec<f64>>,

    /// Minimum pulse width of each arm servo, in microseconds
    pub arm_pw_range_min: Option<Vec<f64>>,

    /// Maximum pulse width of each arm servo, in microseconds
    pub arm_pw_range_max: Option<Vec<f64>>
}

/// Locomotion parameters used by the mechanisms executable.
///
/// Only the command envelope is read here, the rest of the locomotion parameter file is for
/// locomotion control itself.
#[derive(Debug, Deserialize)]
pub struct LocoParams {

    /// Maximum steer axis absolute position (highest positive value)
    ///
    /// Units: radians
    pub str_max_abs_pos_rad: [f64; NUM_STR_AXES],

    /// Minimum steer axis absolute position (lowest negative value)
    ///
    /// Units: radians
    pub str_min_abs_pos_rad: [f64; NUM_STR_AXES],

    /// Maximum drive axis rate (highest positive value)
    ///
    /// Units: radians/second
    pub drv_max_abs_rate_rads: [f64; NUM_DRV_AXES],

    /// Minimum drive axis rate (lowest negative value)
    ///
    /// Units: radians/second
    pub drv_min_abs_rate_rads: [f64; NUM_DRV_AXES]
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
impl MechExecParams {
    /// A complete and valid set of parameters for tests to start from.
    pub(crate) fn dummy() -> Self {
        Self {
            demands_endpoint: String::from("tcp://*:5000"),
            sensor_data_endpoint: String::from("tcp://*:5001"),
            board_addresses: Some(vec![0x40, 0x41]),
            board_num_channels: Some(vec![16, 16]),
            drv_idx_map: Some(vec![
                vec![0, 0], vec![0, 1], vec![0, 2], vec![0, 3], vec![0, 4], vec![0, 5]
            ]),
            drv_rate_norm_to_sk_coeffs: Some(vec![
                vec![1.0, 0.0],
                vec![0.5, 0.1],
                vec![1.0, 0.0],
                vec![1.0, 0.0],
                vec![1.0, 0.0],
                vec![1.0, 0.0]
            ]),
            drv_rate_min_sk: Some(vec![-1.0; 6]),
            drv_rate_max_sk: Some(vec![1.0, 1.0, 0.5, 1.0, 1.0, 1.0]),
            str_idx_map: Some(vec![
                vec![0, 6], vec![0, 7], vec![0, 8], vec![0, 9], vec![0, 10], vec![0, 11]
            ]),
            str_ang_rad_to_sk_coeffs: Some(vec![vec![60.0, 90.0]; 6]),
            str_ang_min_sk: Some(vec![0.0; 6]),
            str_ang_max_sk: Some(vec![180.0; 6]),
            str_act_range_sk: Some(vec![180.0; 6]),
            str_pw_range_min: Some(vec![750.0; 6]),
            str_pw_range_max: Some(vec![2250.0; 6]),
            arm_idx_map: Some(vec![
                vec![1, 0], vec![1, 1], vec![1, 2], vec![1, 3], vec![1, 4]
            ]),
            arm_ang_rad_to_sk_coeffs: Some(vec![vec![45.0, 90.0]; 5]),
            arm_ang_min_sk: Some(vec![10.0; 5]),
            arm_ang_max_sk: Some(vec![170.0; 5]),
            arm_act_range_sk: Some(vec![180.0, 180.0, 180.0, 180.0, 270.0]),
            arm_pw_range_min: Some(vec![750.0, 750.0, 750.0, 750.0, 500.0]),
            arm_pw_range_max: Some(vec![2250.0, 2250.0, 2250.0, 2250.0, 2500.0])
        }
    }
}
