//! Integration tests driving the demand loop over real sockets.
//!
//! Each test stands up the same stack the executable runs, a [`Mechanisms`] engine over simulated
//! servo boards served by a [`MechServer`] on ipc endpoints, and talks to it as the rover
//! executable would.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use comms_if::eqpt::mech::{MechDems, MechDemsResponse, MechSensData, MechState};
use comms_if::net::zmq;
use mech_lib::mech::{calib::CalibStore, run, Mechanisms};
use mech_lib::mech_server::MechServer;
use mech_lib::params::MechExecParams;
use mech_lib::servo_ctrl::{sim::SimServoDriver, ServoCtrl};

/// Write a parameter file for this test and load it back, with endpoints unique to the test.
fn test_params(tag: &str) -> MechExecParams {
    let pid = std::process::id();

    let toml_str = format!(
        r#"
demands_endpoint = "ipc:///tmp/mech_dems_{tag}_{pid}"
sensor_data_endpoint = "ipc:///tmp/mech_sens_{tag}_{pid}"

board_addresses = [0x40, 0x41]
board_num_channels = [16, 16]

drv_idx_map = [[0, 0], [0, 1], [0, 2], [0, 3], [0, 4], [0, 5]]
drv_rate_norm_to_sk_coeffs = [
    [1.0, 0.0], [1.0, 0.0], [1.0, 0.0], [1.0, 0.0], [1.0, 0.0], [1.0, 0.0]
]
drv_rate_min_sk = [-1.0, -1.0, -1.0, -1.0, -1.0, -1.0]
drv_rate_max_sk = [1.0, 1.0, 1.0, 1.0, 1.0, 1.0]

str_idx_map = [[0, 6], [0, 7], [0, 8], [0, 9], [0, 10], [0, 11]]
str_ang_rad_to_sk_coeffs = [
    [60.0, 90.0], [60.0, 90.0], [60.0, 90.0], [60.0, 90.0], [60.0, 90.0], [60.0, 90.0]
]
str_ang_min_sk = [0.0, 0.0, 0.0, 0.0, 0.0, 0.0]
str_ang_max_sk = [180.0, 180.0, 180.0, 180.0, 180.0, 180.0]
str_act_range_sk = [180.0, 180.0, 180.0, 180.0, 180.0, 180.0]
str_pw_range_min = [750.0, 750.0, 750.0, 750.0, 750.0, 750.0]
str_pw_range_max = [2250.0, 2250.0, 2250.0, 2250.0, 2250.0, 2250.0]

arm_idx_map = [[1, 0], [1, 1], [1, 2], [1, 3], [1, 4]]
arm_ang_rad_to_sk_coeffs = [
    [45.0, 90.0], [45.0, 90.0], [45.0, 90.0], [45.0, 90.0], [45.0, 90.0]
]
arm_ang_min_sk = [10.0, 10.0, 10.0, 10.0, 10.0]
arm_ang_max_sk = [170.0, 170.0, 170.0, 170.0, 170.0]
arm_act_range_sk = [180.0, 180.0, 180.0, 180.0, 180.0]
arm_pw_range_min = [750.0, 750.0, 750.0, 750.0, 750.0]
arm_pw_range_max = [2250.0, 2250.0, 2250.0, 2250.0, 2250.0]
"#,
        tag = tag,
        pid = pid
    );

    let path = std::env::temp_dir().join(format!("mech_exec_test_{}_{}.toml", tag, pid));
    std::fs::write(&path, toml_str).unwrap();

    let params = util::params::load(&path).unwrap();
    let _ = std::fs::remove_file(&path);

    params
}

/// Stand up the engine and server, and spawn the loop on its own thread.
///
/// The server binds before this returns, so clients connecting afterwards never race the bind.
fn spawn_loop(
    params: &MechExecParams,
    cancel: &Arc<AtomicBool>
) -> thread::JoinHandle<(
    Mechanisms<ServoCtrl<SimServoDriver>>,
    Result<(), mech_lib::mech::MechError>
)> {
    let store = CalibStore::build(params).unwrap();

    let bank = ServoCtrl::new(vec![SimServoDriver::new(16), SimServoDriver::new(16)]);
    let mut mechs = Mechanisms::new(store, bank).unwrap();
    mechs.stop().unwrap();

    let mut server = MechServer::new(params).unwrap();

    let loop_cancel = cancel.clone();

    thread::spawn(move || {
        let result = run(&mut mechs, &mut server, &loop_cancel);
        (mechs, result)
    })
}

#[test]
fn test_loop_actuates_and_acks() {
    let params = test_params("ack");
    let cancel = Arc::new(AtomicBool::new(false));
    let handle = spawn_loop(&params, &cancel);

    let ctx = zmq::Context::new();

    let req = ctx.socket(zmq::REQ).unwrap();
    req.set_rcvtimeo(3000).unwrap();
    req.set_sndtimeo(1000).unwrap();
    req.set_linger(0).unwrap();
    req.connect(&params.demands_endpoint).unwrap();

    let sub = ctx.socket(zmq::SUB).unwrap();
    sub.set_rcvtimeo(1000).unwrap();
    sub.set_subscribe(b"").unwrap();
    sub.connect(&params.sensor_data_endpoint).unwrap();

    thread::sleep(Duration::from_millis(100));

    // One steer position and one drive speed
    let mut dems = MechDems::empty();
    dems.pos_rad.insert(String::from("StrFL"), 0.5);
    dems.speed_rads.insert(String::from("DrvFL"), 0.25);

    // Each acked batch is followed by a sensor data snapshot. Publications made while the
    // subscription is still joining are dropped, so demand until a snapshot arrives.
    let mut snapshot = None;

    for _ in 0..5 {
        req.send(&serde_json::to_string(&dems).unwrap(), 0).unwrap();

        let reply = req.recv_msg(0).unwrap();
        let response: MechDemsResponse = serde_json::from_str(reply.as_str().unwrap()).unwrap();
        assert_eq!(response, MechDemsResponse::DemsOk);

        if let Ok(msg) = sub.recv_msg(0) {
            let sens: MechSensData = serde_json::from_str(msg.as_str().unwrap()).unwrap();
            snapshot = Some(sens);
            break;
        }
    }

    let sens = snapshot.expect("no sensor data snapshot arrived");
    assert_eq!(sens.state, MechState::Running);
    assert!(sens.batches_applied >= 1);

    // Cancel and let the loop wind down
    cancel.store(true, std::sync::atomic::Ordering::Relaxed);
    let (mechs, result) = handle.join().unwrap();

    result.unwrap();
    assert_eq!(mechs.state(), MechState::Stopped);

    let boards = mechs.bank().boards();

    // StrFL held the demanded position through the stop, 120 deg on the default electrical
    // range is a 1750 us pulse
    assert_eq!(boards[0].duty_cycle(6), Some(0.0875));

    // DrvFL was wound back from the demanded rate to its calibrated zero, a 1500 us pulse
    assert_eq!(boards[0].duty_cycle(0), Some(0.075));
}

#[test]
fn test_loop_stops_on_malformed_payload() {
    let params = test_params("malformed");
    let cancel = Arc::new(AtomicBool::new(false));
    let handle = spawn_loop(&params, &cancel);

    let ctx = zmq::Context::new();

    let req = ctx.socket(zmq::REQ).unwrap();
    req.set_rcvtimeo(1500).unwrap();
    req.set_sndtimeo(1000).unwrap();
    req.set_linger(0).unwrap();
    req.connect(&params.demands_endpoint).unwrap();

    req.send("not json", 0).unwrap();

    // The server treats the payload as a failed demand channel and never acks
    let reply = req.recv_msg(0);
    assert!(
        matches!(reply, Err(zmq::Error::EAGAIN)),
        "expected the reply to time out"
    );

    // The loop ends on its own, with the drives stopped
    let (mechs, result) = handle.join().unwrap();

    assert!(result.is_err());
    assert_eq!(mechs.state(), MechState::Stopped);

    let boards = mechs.bank().boards();
    for channel in 0..6 {
        assert_eq!(boards[0].duty_cycle(channel), Some(0.075));
    }
}
