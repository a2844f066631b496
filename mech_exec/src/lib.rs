//! # Mechanisms library.
//!
//! This library allows other crates in the workspace, and the integration tests, to access items
//! defined inside the mechanisms executable.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Mechanisms engine - carries demand batches through calibration onto the servo bank
pub mod mech;

/// Mechanisms server - accepts demands and publishes sensor data over the network
pub mod mech_server;

/// Parameter structures loaded from the parameter files
pub mod params;

/// Servo controller - abstracts over the servo driver boards
pub mod servo_ctrl;
