//! # Mechanisms Control Executable
//!
//! This executable is responsible for controlling the mechanisms of the rover:
//! - Locomotion actuators (6 steer, 6 drive)
//! - Arm actuators (5 joints)
//!
//! Demands arrive over the demands socket and are carried through calibration onto the servo
//! driver boards, with a sensor data snapshot published after each batch. On every exit path the
//! drive motors are commanded to their calibrated zero rate before the process ends.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

// External
use color_eyre::{eyre::{eyre, WrapErr}, Result};
use log::{debug, info};
use std::env;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

// Internal
use mech_lib::{
    mech::{calib::CalibStore, run, Mechanisms},
    mech_server::MechServer,
    params::{LocoParams, MechExecParams},
    servo_ctrl::ServoCtrl
};
use util::{
    host,
    logger::{logger_init, LevelFilter},
    session::Session,
};

// ------------------------------------------------------------------------------------------------
// MAIN
// ------------------------------------------------------------------------------------------------

fn main() -> Result<()> {

    // ---- EARLY INITIALISATION ----

    // Initialise session
    let session = Session::new(
        "mech_exec",
        "sessions"
    ).wrap_err("Failed to create the session")?;

    // Initialise logger
    logger_init(LevelFilter::Trace, &session)
        .wrap_err("Failed to initialise logging")?;

    // Log information on this execution.
    info!("Mechanisms Control Executable\n");
    info!(
        "Running on: {:#?}",
        host::get_uname().wrap_err("Failed to get host information")?
    );
    info!("Session directory: {:?}\n", session.session_root);

    info!("Initialising...");

    // ---- LOAD PARAMETERS ----

    // Collect all arguments
    let args: Vec<String> = env::args().collect();

    debug!("CLI arguments: {:?}", args);

    if args.len() != 3 {
        return Err(eyre!(
            "Expected two arguments, found {}. \
            Usage: mech_exec <mech_exec_params> <loco_ctrl_params>",
            args.len() - 1
        ));
    }

    let mech_params: MechExecParams = util::params::load(Path::new(&args[1]))
        .wrap_err("Could not load mechanisms params")?;
    let loco_params: LocoParams = util::params::load(Path::new(&args[2]))
        .wrap_err("Could not load locomotion params")?;

    info!("Parameters loaded");
    info!(
        "Steer position envelope: {:?} to {:?} rad",
        loco_params.str_min_abs_pos_rad,
        loco_params.str_max_abs_pos_rad
    );
    info!(
        "Drive rate envelope: {:?} to {:?} rad/s\n",
        loco_params.drv_min_abs_rate_rads,
        loco_params.drv_max_abs_rate_rads
    );

    // ---- MECHANISMS INITIALISATION ----

    let calib = CalibStore::build(&mech_params)
        .wrap_err("Mechanisms calibration is invalid")?;

    let bank = build_bank(&calib)?;

    let mut mechs = Mechanisms::new(calib, bank)
        .wrap_err("Failed to initialise the mechanisms")?;

    // The rover must be stationary before the server opens for demands
    mechs.stop().wrap_err("Failed to command the initial stop")?;

    info!("Mechanisms initialised and stopped");

    // ---- SERVER INITIALISATION ----

    let mut server = MechServer::new(&mech_params)
        .wrap_err("Failed to initialise server")?;

    info!("Server initialised");

    // ---- MAIN LOOP ----

    let cancel = Arc::new(AtomicBool::new(false));
    let handler_cancel = cancel.clone();

    ctrlc::set_handler(move || {
        handler_cancel.store(true, Ordering::Relaxed);
    }).wrap_err("Failed to set the termination handler")?;

    info!("Initialisation complete, entering main loop");

    run(&mut mechs, &mut server, &cancel)
        .wrap_err("Mechanisms loop ended with an error")?;

    info!("End of execution");

    Ok(())
}

// ------------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Build the servo bank over the PCA9685 boards on the I2C bus.
///
/// The cfg matches the target gate `rppal` is declared under in Cargo.toml, the two must stay
/// in step.
#[cfg(all(target_arch = "arm", target_os = "linux"))]
fn build_bank(
    calib: &CalibStore
) -> Result<ServoCtrl<pwm_pca9685::Pca9685<rppal::i2c::I2c>>> {
    use mech_lib::servo_ctrl::pca9685::init_board;

    let mut boards = Vec::with_capacity(calib.boards.len());

    for board_info in calib.boards.iter() {
        let i2c = rppal::i2c::I2c::new()
            .wrap_err("Failed to open the I2C bus")?;

        let board = init_board(i2c, board_info.i2c_address)
            .wrap_err_with(|| format!(
                "Failed to initialise the servo board at I2C address 0x{:02X}",
                board_info.i2c_address
            ))?;

        boards.push(board);
    }

    Ok(ServoCtrl::new(boards))
}

/// Build a simulated servo bank, used when running somewhere without the servo boards.
#[cfg(not(all(target_arch = "arm", target_os = "linux")))]
fn build_bank(
    calib: &CalibStore
) -> Result<ServoCtrl<mech_lib::servo_ctrl::sim::SimServoDriver>> {
    use mech_lib::servo_ctrl::sim::SimServoDriver;

    info!("Not running on the rover, using the simulated servo driver");

    let boards = calib.boards
        .iter()
        .map(|board_info| SimServoDriver::new(board_info.num_channels))
        .collect();

    Ok(ServoCtrl::new(boards))
}
