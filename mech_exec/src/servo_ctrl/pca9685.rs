//! [`ServoDriver`] implementation for the PCA9685 driver

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use pwm_pca9685::{Channel, Pca9685};
use embedded_hal::blocking::i2c::{Write, WriteRead};

use super::{ServoDriver, ServoError};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Number of PWM channels on a PCA9685.
const NUM_CHANNELS: usize = 16;

/// Number of ticks in one PWM frame.
const MAX_PWM: u16 = 4096;

/// Prescale value for a 50 Hz frame from the internal 25 MHz oscillator.
const PRESCALE_50_HZ: u8 = 121;

// ------------------------------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Initialise a PCA9685 at the given I2C address, ready to drive servos.
///
/// The board is brought out of sleep with the frame frequency set to
/// [`PWM_FREQUENCY_HZ`](super::PWM_FREQUENCY_HZ).
pub fn init_board<I2C, E>(i2c: I2C, address: u8) -> Result<Pca9685<I2C>, ServoError>
where
    I2C: Write<Error = E> + WriteRead<Error = E>
{
    let mut board = match Pca9685::new(i2c, address) {
        Ok(b) => b,
        Err(pwm_pca9685::Error::I2C(_)) => return Err(ServoError::I2c),
        Err(pwm_pca9685::Error::InvalidInputData) =>
            return Err(ServoError::BadI2cAddress(address))
    };

    // The prescale constant is always in the range the device accepts, so any failure from
    // here on is an I2C one
    board.set_prescale(PRESCALE_50_HZ).map_err(|_| ServoError::I2c)?;
    board.enable().map_err(|_| ServoError::I2c)?;

    Ok(board)
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl<I2C, E> ServoDriver for Pca9685<I2C>
where
    I2C: Write<Error = E> + WriteRead<Error = E>
{
    type Channel = Channel;

    fn num_channels(&self) -> usize {
        NUM_CHANNELS
    }

    fn channel_from_index(&self, index: usize) -> Option<Self::Channel> {
        let channel = match index {
            0 => Channel::C0,
            1 => Channel::C1,
            2 => Channel::C2,
            3 => Channel::C3,
            4 => Channel::C4,
            5 => Channel::C5,
            6 => Channel::C6,
            7 => Channel::C7,
            8 => Channel::C8,
            9 => Channel::C9,
            10 => Channel::C10,
            11 => Channel::C11,
            12 => Channel::C12,
            13 => Channel::C13,
            14 => Channel::C14,
            15 => Channel::C15,
            _ => return None
        };

        Some(channel)
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

        // The pulse turns on at tick zero and off at the tick matching the duty cycle. The off
        // register holds 12 bits so a full scale duty cycle saturates at the final tick.
        let off_tick = ((duty_cycle*(MAX_PWM as f64)) as u16).min(MAX_PWM - 1);

        match self.set_channel_on_off(channel, 0, off_tick) {
            Ok(_) => Ok(()),
            Err(pwm_pca9685::Error::I2C(_)) => Err(ServoError::I2c),
            Err(pwm_pca9685::Error::InvalidInputData) => Err(ServoError::InvalidDutyCycle)
        }
    }
}
