//! [`ServoDriver`] implementation which records commands in memory.
//!
//! Used when the executable runs somewhere without servo hardware on the bus, and by tests which
//! need to observe what would have been written to the boards.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::collections::HashMap;

use super::{ServoDriver, ServoError};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// A servo driver board which exists only in memory.
pub struct SimServoDriver {
    num_channels: usize,

    /// Last duty cycle written to each channel. Channels never written to have no entry.
    duty_cycles: HashMap<usize, f64>
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl SimServoDriver {
    /// Create a new simulated board with the given number of channels.
    pub fn new(num_channels: usize) -> Self {
        Self {
            num_channels,
            duty_cycles: HashMap::new()
        }
    }

    /// Get the last duty cycle written to a channel, or `None` if it was never written to.
    pub fn duty_cycle(&self, channel: usize) -> Option<f64> {
        self.duty_cycles.get(&channel).copied()
    }
}

impl ServoDriver for SimServoDriver {
    type Channel = usize;

    fn num_channels(&self) -> usize {
        self.num_channels
    }

    fn channel_from_index(&self, index: usize) -> Option<Self::Channel> {
        if index < self.num_channels {
            Some(index)
        }
        else {
            None
        }
    }

    fn set_duty_cycle(
        &mut self,
        channel: Self::Channel,
        duty_cycle: f64
    ) -> Result<(), ServoError> {

        // If the duty cycle is out of range return an error
        if duty_cycle < 0.0 || duty_cycle > 1.0 {
            return Err(ServoError::InvalidDutyCycle)
        }

        self.duty_cycles.insert(channel, duty_cycle);

        Ok(())
    }
}
