//! Simple demand client test for the mechanisms server
//!
//! Sends a demand batch to a running mechanisms server once per second and prints the response.
//! Useful for exercising the server without bringing up the rest of the rover software.

use comms_if::{
    eqpt::mech::{ActId, MechDems, MechDemsResponse},
    net::{MonitoredSocket, SocketOptions},
};
use structopt::StructOpt;

#[derive(StructOpt, Debug)]
#[structopt(name = "test_mech_client")]
struct Opts {
    /// Endpoint the mechanisms server's demand socket is bound to
    #[structopt(default_value = "tcp://localhost:5000")]
    endpoint: String,

    /// Steer angle to demand of all steer axes, in radians
    #[structopt(short, long, default_value = "0.0")]
    steer_rad: f64,

    /// Normalised rate to demand of all drive motors, in [-1, +1]
    #[structopt(short, long, default_value = "0.0")]
    drive_norm: f64
}

fn main() -> Result<(), Box<dyn std::error::Error>> {

    let opts = Opts::from_args();

    // Build the demand batch to repeat at the server
    let mut dems = MechDems::empty();
    for id in ActId::STR_IDS.iter() {
        dems.pos_rad.insert(id.to_string(), opts.steer_rad);
    }
    for id in ActId::DRV_IDS.iter() {
        dems.speed_rads.insert(id.to_string(), opts.drive_norm);
    }
    let dems_json = serde_json::to_string(&dems)?;

    // Create the context for zmq
    let ctx = zmq::Context::new();

    // Set the socket options
    let socket_options = SocketOptions {
        connect_timeout: 1000,
        heartbeat_ivl: 500,
        heartbeat_ttl: 1000,
        heartbeat_timeout: 1000,
        linger: 1,
        recv_timeout: 1500,
        send_timeout: 10,
        req_correlate: true,
        req_relaxed: true,
        ..Default::default()
    };

    // Create the socket
    let socket = match MonitoredSocket::new(
        &ctx,
        zmq::REQ,
        socket_options,
        &opts.endpoint
    ) {
        Ok(s) => s,
        Err(e) => {
            println!("Could not connect to the server");
            return Err(e.into())
        }
    };

    // Loop over sending demands to the server
    loop {
        // If the socket isn't connected wait a bit. We do this so that we don't build up a big
        // backlog of messages to be sent to the server, as zmq will buffer all the messages we send
        // until the server is back up.
        if !socket.connected() {
            println!("Waiting for connection");
            std::thread::sleep(std::time::Duration::from_millis(1000));
            continue;
        }

        // Send the demands to the server
        print!("Sending demands... ");
        match socket.send(&dems_json as &str, 0) {
            Ok(_) => (),
            // If the operation wasn't completed wait a bit
            Err(e) => {
                println!("could not send: {}", e);
                std::thread::sleep(std::time::Duration::from_millis(1000));
                continue;
            }
        }

        // Recieve the response from the server
        let msg = match socket.recv_msg(0) {
            Ok(m) => m,
            // If we didn't get a response wait a bit
            Err(e) => {
                println!("could not read from server: {}", e);
                std::thread::sleep(std::time::Duration::from_millis(1000));
                continue;
            }
        };

        // Print some info about the response
        match msg.as_str().map(serde_json::from_str::<MechDemsResponse>) {
            Some(Ok(response)) => println!("response: {:?}", response),
            Some(Err(e)) => println!("unparsable response: {}", e),
            None => println!("no response")
        }

        // Wait a bit
        std::thread::sleep(std::time::Duration::from_millis(1000));
    }
}
