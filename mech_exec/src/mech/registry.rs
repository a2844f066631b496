//! # Actuator Registry
//!
//! The registry owns one [`Actuator`] per ID in [`ActId::ALL`] and is the only place demand names
//! are resolved. Building it also pushes the electrical configuration of every positional channel
//! down into the servo bank, which is one time work, actuation never reconfigures channels.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::collections::HashMap;

use comms_if::eqpt::mech::ActId;

use super::calib::{CalibRecord, CalibStore, ServoKind};
use crate::servo_ctrl::{ServoBank, ServoError};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// A single actuator known to the registry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Actuator {
    pub id: ActId,
    pub calib: CalibRecord
}

/// Registry of all actuators on the rover.
pub struct ActuatorRegistry {
    actuators: HashMap<ActId, Actuator>
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum LookupError {
    #[error("No actuator named \"{0}\" exists")]
    UnknownActuator(String)
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl ActuatorRegistry {
    /// Build the registry from the calibration store, configuring each positional channel of the
    /// bank along the way.
    pub fn build<B: ServoBank>(
        store: &CalibStore,
        bank: &mut B
    ) -> Result<Self, ServoError> {
        let mut actuators = HashMap::new();

        for &id in ActId::ALL.iter() {
            let calib = *store.get(id);

            if let ServoKind::Positional { actuation_range_deg, pulse_width_us } = calib.kind {
                bank.configure_positional(calib.addr, actuation_range_deg, pulse_width_us)?;
            }

            actuators.insert(id, Actuator { id, calib });
        }

        Ok(Self { actuators })
    }

    /// Resolve an actuator from the name used on the demand wire.
    pub fn resolve_name(&self, name: &str) -> Result<&Actuator, LookupError> {
        let id: ActId = name
            .parse()
            .map_err(|_| LookupError::UnknownActuator(name.to_string()))?;

        Ok(&self.actuators[&id])
    }

    /// Get an actuator by ID.
    ///
    /// Every ID in [`ActId::ALL`] is present by construction.
    pub fn get(&self, id: ActId) -> &Actuator {
        &self.actuators[&id]
    }

    /// Iterate over the drive actuators in group index order.
    pub fn drive_actuators(&self) -> impl Iterator<Item = &Actuator> + '_ {
        ActId::DRV_IDS.iter().map(move |id| &self.actuators[id])
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------
