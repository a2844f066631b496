//! # Servo Controller Module
//!
//! This module provides a unified servo control interface which can abstract over different types
//! of servo driver boards.
//!
//! Two layers are involved. [`ServoDriver`] is implemented per board type and speaks raw duty
//! cycles, while [`ServoCtrl`] collects a set of boards into a [`ServoBank`], the surface the
//! rest of the executable talks to. The bank deals in servo terms, angles for positional servos
//! and normalised throttles for continuous rotation ones, and owns the conversion into pulse
//! widths and duty cycles.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// [`ServoDriver`] implementation for the Adafruit PCA9685 16 channel servo driver board.
pub mod pca9685;

/// [`ServoDriver`] implementation recording commands in memory, used off the rover.
pub mod sim;

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::collections::HashMap;
use std::fmt;

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// PWM frame frequency the driver boards are run at. Standard analogue servo timing.
pub const PWM_FREQUENCY_HZ: f64 = 50.0;

/// Width of one PWM frame in microseconds.
const FRAME_WIDTH_US: f64 = 1_000_000.0 / PWM_FREQUENCY_HZ;

/// Pulse width range used for channels with no explicit electrical configuration.
///
/// These are the values used by the servos fitted to the rover, full range over 750 to 2250 us.
pub const DEFAULT_PULSE_WIDTH_US: (f64, f64) = (750.0, 2250.0);

/// Actuation range used for positional channels with no explicit electrical configuration.
pub const DEFAULT_ACTUATION_RANGE_DEG: f64 = 180.0;

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

/// Trait to provide a unified API for accessing servo driver boards.
pub trait ServoDriver {

    /// The type that the underlying driver uses for channel identification
    type Channel;

    /// Number of PWM channels the board provides.
    fn num_channels(&self) -> usize;

    /// Map a channel index onto the driver's channel type.
    ///
    /// Returns `None` if the board has no channel with that index.
    fn channel_from_index(&self, index: usize) -> Option<Self::Channel>;

    /// Set the duty cycle of a channel.
    ///
    /// ## Arguments
    /// - `channel` - The channel to set the duty cycle for
    /// - `duty_cycle` - The duty cycle to set. Must be a value between 0.0 and 1.0. Values outside
    ///   this range will be rejected.
    fn set_duty_cycle(&mut self, channel: Self::Channel, duty_cycle: f64) -> Result<(), ServoError>;
}

/// The servo-level interface onto a set of driver boards.
///
/// Channels are identified by [`ChannelAddr`]. Positional channels accept angles within their
/// actuation range, continuous rotation channels accept normalised throttles in [-1.0, +1.0].
pub trait ServoBank {

    /// Set the electrical configuration of a positional channel.
    ///
    /// Channels which are never configured use [`DEFAULT_ACTUATION_RANGE_DEG`] and
    /// [`DEFAULT_PULSE_WIDTH_US`]. Configuration is one time work done at startup, not something
    /// to repeat per command.
    fn configure_positional(
        &mut self,
        addr: ChannelAddr,
        actuation_range_deg: f64,
        pulse_width_us: (f64, f64)
    ) -> Result<(), ServoError>;

    /// Command a positional channel to an angle in degrees.
    fn set_angle_deg(&mut self, addr: ChannelAddr, angle_deg: f64) -> Result<(), ServoError>;

    /// Command a continuous rotation channel to a normalised throttle in [-1.0, +1.0].
    fn set_throttle(&mut self, addr: ChannelAddr, throttle: f64) -> Result<(), ServoError>;
}

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Address of a single servo channel, a board index plus the channel index on that board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChannelAddr {
    pub board: usize,
    pub channel: usize
}

/// A [`ServoBank`] over a homogeneous set of [`ServoDriver`] boards.
pub struct ServoCtrl<D: ServoDriver> {
    boards: Vec<D>,

    /// Electrical configuration of positional channels, keyed by address.
    positional_configs: HashMap<ChannelAddr, PositionalConfig>
}

/// Electrical configuration of one positional channel.
#[derive(Debug, Clone, Copy)]
struct PositionalConfig {
    actuation_range_deg: f64,
    pulse_width_us: (f64, f64)
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(thiserror::Error, Debug)]
pub enum ServoError {
    #[error("An I2C error occured")]
    I2c,

    #[error("Duty cycle must be between 0.0 and 1.0")]
    InvalidDutyCycle,

    #[error("Angle {angle_deg} deg is outside the actuation range of {actuation_range_deg} deg")]
    AngleOutOfRange {
        angle_deg: f64,
        actuation_range_deg: f64
    },

    #[error("Throttle {0} is outside [-1.0, +1.0]")]
    ThrottleOutOfRange(f64),

    #[error("No servo channel at {0}")]
    BadAddress(ChannelAddr),

    #[error("The servo driver rejected I2C address 0x{0:02X}")]
    BadI2cAddress(u8)
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl<D: ServoDriver> ServoCtrl<D> {
    /// Create a new servo controller over the given boards.
    ///
    /// Board indexes in [`ChannelAddr`]s follow the order of this vector.
    pub fn new(boards: Vec<D>) -> Self {
        Self {
            boards,
            positional_configs: HashMap::new()
        }
    }

    /// Access the underlying driver boards.
    pub fn boards(&self) -> &[D] {
        &self.boards
    }

    /// Write a pulse width out to the channel at the given address.
    fn write_pulse(&mut self, addr: ChannelAddr, pulse_us: f64) -> Result<(), ServoError> {
        let duty_cycle = pulse_us / FRAME_WIDTH_US;

        let board = self.boards
            .get_mut(addr.board)
            .ok_or(ServoError::BadAddress(addr))?;
        let channel = board
            .channel_from_index(addr.channel)
            .ok_or(ServoError::BadAddress(addr))?;

        board.set_duty_cycle(channel, duty_cycle)
    }
}

impl<D: ServoDriver> ServoBank for ServoCtrl<D> {
    fn configure_positional(
        &mut self,
        addr: ChannelAddr,
        actuation_range_deg: f64,
        pulse_width_us: (f64, f64)
    ) -> Result<(), ServoError> {
        // Check the address up front so a bad configuration fails at startup rather than on the
        // first command
        let board = self.boards
            .get(addr.board)
            .ok_or(ServoError::BadAddress(addr))?;
        board
            .channel_from_index(addr.channel)
            .ok_or(ServoError::BadAddress(addr))?;

        self.positional_configs.insert(
            addr,
            PositionalConfig {
                actuation_range_deg,
                pulse_width_us
            }
        );

        Ok(())
    }

    fn set_angle_deg(&mut self, addr: ChannelAddr, angle_deg: f64) -> Result<(), ServoError> {
        let config = self.positional_configs
            .get(&addr)
            .copied()
            .unwrap_or_default();

        if !angle_deg.is_finite()
            || angle_deg < 0.0
            || angle_deg > config.actuation_range_deg
        {
            return Err(ServoError::AngleOutOfRange {
                angle_deg,
                actuation_range_deg: config.actuation_range_deg
            })
        }

        let pulse_us = util::maths::lin_map(
            (0.0, config.actuation_range_deg),
            config.pulse_width_us,
            angle_deg
        );

        self.write_pulse(addr, pulse_us)
    }

    fn set_throttle(&mut self, addr: ChannelAddr, throttle: f64) -> Result<(), ServoError> {
        if !throttle.is_finite() || throttle < -1.0 || throttle > 1.0 {
            return Err(ServoError::ThrottleOutOfRange(throttle))
        }

        // Continuous rotation channels run on the default electrical configuration, a zero
        // throttle sits at the middle of the pulse range
        let pulse_us = util::maths::lin_map(
            (-1.0, 1.0),
            DEFAULT_PULSE_WIDTH_US,
            throttle
        );

        self.write_pulse(addr, pulse_us)
    }
}

impl Default for PositionalConfig {
    fn default() -> Self {
        Self {
            actuation_range_deg: DEFAULT_ACTUATION_RANGE_DEG,
            pulse_width_us: DEFAULT_PULSE_WIDTH_US
        }
    }
}

impl fmt::Display for ChannelAddr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "board {} channel {}", self.board, self.channel)
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------
