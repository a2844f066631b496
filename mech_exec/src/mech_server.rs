//! # Mechanisms Server Module
//!
//! This module abstracts over the networking side of the mechanisms executable. The server accepts
//! connections from the client in the rover executable, allowing demands to be recieved from the
//! client and sensor data to be published back out.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use comms_if::{
    eqpt::mech::{MechDems, MechDemsResponse, MechSensData},
    net::{zmq, MonitoredSocket, MonitoredSocketError, SocketOptions}
};

use crate::params::MechExecParams;

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Receive timeout on the demands socket in milliseconds.
///
/// One pass of the main loop lasts at most this long when no demands arrive, so this also bounds
/// how quickly the executable reacts to a cancellation request.
pub const DEMS_RECV_TIMEOUT_MS: i32 = 1000;

/// Send timeout on both sockets in milliseconds.
const SEND_TIMEOUT_MS: i32 = 10;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// An abstraction over the networking part of the mechanisms executable.
///
/// The server accepts connections from the client in the rover executable, allowing demands to be
/// recieved from the client and sensor data to be published back out.
pub struct MechServer {

    /// REP socket which accepts demands from the client
    dems_socket: MonitoredSocket,

    /// PUB socket which publishes sensor data
    sens_socket: MonitoredSocket,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Errors which can occur in the [`MechServer`]
#[derive(thiserror::Error, Debug)]
pub enum MechServerError {
    #[error("Socket error: {0}")]
    SocketError(MonitoredSocketError),

    #[error("Could not read from the demands socket: {0}")]
    RecvError(zmq::Error),

    #[error("Could not deserialize demands: {0}")]
    DemsParseError(serde_json::Error),

    #[error("Could not send data to the client: {0}")]
    SendError(zmq::Error)
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl MechServer {

    /// Create a new instance of the mechanisms server.
    ///
    /// This function will not wait for a connection from the client before returning.
    pub fn new(params: &MechExecParams) -> Result<Self, MechServerError> {

        // Create the zmq context
        let ctx = zmq::Context::new();

        // Create the socket options
        let dems_socket_options = SocketOptions {
            bind: true,
            block_on_first_connect: false,
            recv_timeout: DEMS_RECV_TIMEOUT_MS,
            send_timeout: SEND_TIMEOUT_MS,
            ..Default::default()
        };
        let sens_socket_options = SocketOptions {
            bind: true,
            block_on_first_connect: false,
            send_timeout: SEND_TIMEOUT_MS,
            ..Default::default()
        };

        // Create the sockets
        let dems_socket = MonitoredSocket::new(
            &ctx,
            zmq::REP,
            dems_socket_options,
            &params.demands_endpoint
        )?;
        let sens_socket = MonitoredSocket::new(
            &ctx,
            zmq::PUB,
            sens_socket_options,
            &params.sensor_data_endpoint
        )?;

        // Create self
        Ok(Self {
            dems_socket,
            sens_socket
        })
    }

    /// Retrieve a set of demands from the client.
    ///
    /// `Ok(None)` means no demands arrived within [`DEMS_RECV_TIMEOUT_MS`], which is normal on a
    /// quiet link. After `Ok(Some(..))` the caller MUST actuate and then call
    /// [`MechServer::send_dems_response`], the client blocks on the reply.
    ///
    /// An `Err` means the demand channel can no longer be trusted, and the mechanisms must be
    /// stopped.
    pub fn get_demands(&mut self) -> Result<Option<MechDems>, MechServerError> {

        // Read from the socket
        let msg = match self.dems_socket.recv_msg(0) {
            Ok(m) => m,
            Err(zmq::Error::EAGAIN) => return Ok(None),
            Err(e) => return Err(MechServerError::RecvError(e))
        };

        match serde_json::from_str(msg.as_str().unwrap_or("")) {
            Ok(dems) => Ok(Some(dems)),
            Err(e) => Err(MechServerError::DemsParseError(e))
        }
    }

    /// Send a response to the client based on the recieved demands.
    pub fn send_dems_response(
        &mut self,
        response: &MechDemsResponse
    ) -> Result<(), MechServerError> {
        // Serialize response
        let resp_str = serde_json::to_string(response)
            .expect("Response serialization failed. This should not happen");

        // Send response
        match self.dems_socket.send(&resp_str, 0) {
            Ok(_) => Ok(()),
            Err(e) => Err(MechServerError::SendError(e))
        }
    }

    /// Publish sensor data to any connected subscribers.
    pub fn send_sens_data(&mut self, sens_data: &MechSensData) -> Result<(), MechServerError> {
        // Serialize the data
        let sens_str = serde_json::to_string(sens_data)
            .expect("Sensor data serialization failed. This should not happen");

        // Publish it
        match self.sens_socket.send(&sens_str, 0) {
            Ok(_) => Ok(()),
            Err(e) => Err(MechServerError::SendError(e))
        }
    }
}

impl From<MonitoredSocketError> for MechServerError {
    fn from(e: MonitoredSocketError) -> Self {
        MechServerError::SocketError(e)
    }
}
