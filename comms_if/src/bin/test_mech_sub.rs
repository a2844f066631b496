//! Simple subscriber test for the mechanisms sensor data stream

use comms_if::{
    eqpt::mech::MechSensData,
    net::{MonitoredSocket, SocketOptions},
};
use structopt::StructOpt;

#[derive(StructOpt, Debug)]
#[structopt(name = "test_mech_sub")]
struct Opts {
    /// Endpoint the mechanisms server's sensor data socket is bound to
    #[structopt(default_value = "tcp://localhost:5001")]
    endpoint: String
}

fn main() -> Result<(), Box<dyn std::error::Error>> {

    let opts = Opts::from_args();

    // Create context
    let ctx = zmq::Context::new();

    // Create socket options
    let socket_options = SocketOptions {
        ..Default::default()
    };

    // Create socket
    let socket = MonitoredSocket::new(
        &ctx,
        zmq::SUB,
        socket_options,
        &opts.endpoint
    )?;

    // Subscribe to everything the server publishes
    socket.set_subscribe(b"")?;

    // Recieve messages from publisher
    loop {

        let msg = socket.recv_msg(0)?;

        match msg.as_str().map(serde_json::from_str::<MechSensData>) {
            Some(Ok(sens_data)) => println!("Got sensor data: {:?}", sens_data),
            _ => println!("Got unparsable message: {:?}", msg.as_str())
        }
    }
}
