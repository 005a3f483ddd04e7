use std::{
    io::{self, Write as _},
    mem,
    net::TcpStream,
};

use parking_lot::Mutex;
use quanta::{Clock, Instant};
use tracing::{debug, info, warn};

use crate::telemetry::TelemetryUpdate;

use super::{ForwardError, ForwarderConfiguration};

fn connect(config: &ForwarderConfiguration) -> io::Result<TcpStream> {
    let mut last_error = None;
    for addr in config.remote_addr.resolve()? {
        match TcpStream::connect_timeout(&addr, config.connect_timeout) {
            Ok(stream) => {
                stream.set_write_timeout(Some(config.write_timeout))?;
                stream.set_nodelay(true)?;
                return Ok(stream);
            }
            Err(e) => {
                debug!(%addr, error = %e, "Failed to connect to resolved address.");
                last_error = Some(e);
            }
        }
    }

    Err(last_error.unwrap_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no addresses to connect to")))
}

enum ClientState {
    // Forwarder is currently disconnected.
    //
    // Holds the time of the last failed connection attempt, if any, which gates when the next attempt may happen.
    Disconnected { last_failure: Option<Instant> },

    // Forwarder is connected and ready to send payloads.
    Ready(TcpStream),
}

impl ClientState {
    /// Takes the connected stream out of the state, connecting first if necessary.
    ///
    /// The state is left as `Disconnected` when this returns: callers must put the stream back once they're done with
    /// it, which means that any path that fails to do so closes the connection.
    fn take_stream(
        &mut self,
        config: &ForwarderConfiguration,
        now: Instant,
        telemetry: &mut TelemetryUpdate,
    ) -> Result<TcpStream, ForwardError> {
        let last_failure = match mem::replace(self, ClientState::Disconnected { last_failure: None }) {
            ClientState::Ready(stream) => return Ok(stream),
            ClientState::Disconnected { last_failure } => last_failure,
        };

        if let Some(last_failure) = last_failure {
            let elapsed = now.saturating_duration_since(last_failure);
            if elapsed < config.reconnect_backoff {
                *self = ClientState::Disconnected { last_failure: Some(last_failure) };
                return Err(ForwardError::Throttled {
                    addr: config.remote_addr.clone(),
                    retry_in: config.reconnect_backoff - elapsed,
                });
            }
        }

        info!(addr = %config.remote_addr, "Connecting to line receiver.");
        match connect(config) {
            Ok(stream) => {
                telemetry.track_connect_attempt(true);
                Ok(stream)
            }
            Err(source) => {
                telemetry.track_connect_attempt(false);
                warn!(addr = %config.remote_addr, error = %source, "Failed to connect to line receiver.");
                *self = ClientState::Disconnected { last_failure: Some(now) };
                Err(ForwardError::Connect { addr: config.remote_addr.clone(), source })
            }
        }
    }

    fn ensure_connected(
        &mut self,
        config: &ForwarderConfiguration,
        now: Instant,
        telemetry: &mut TelemetryUpdate,
    ) -> Result<(), ForwardError> {
        let stream = self.take_stream(config, now, telemetry)?;
        *self = ClientState::Ready(stream);
        Ok(())
    }

    fn try_send(
        &mut self,
        config: &ForwarderConfiguration,
        now: Instant,
        payload: &[u8],
        telemetry: &mut TelemetryUpdate,
    ) -> Result<(), ForwardError> {
        let mut stream = self.take_stream(config, now, telemetry)?;
        match stream.write_all(payload) {
            Ok(()) => {
                *self = ClientState::Ready(stream);
                Ok(())
            }
            Err(source) => {
                // The stream is dropped here, closing the socket, and we stay disconnected.
                warn!(addr = %config.remote_addr, error = %source, "Failed to send payload; dropping connection.");
                Err(ForwardError::Send { addr: config.remote_addr.clone(), source })
            }
        }
    }
}

/// Synchronous forwarder.
///
/// Owns the connection to the line receiver. All connection attempts and writes happen while holding the forwarder's
/// lock, so payloads from concurrent callers are written whole and never interleave.
pub struct Forwarder {
    config: ForwarderConfiguration,
    clock: Clock,
    client_state: Mutex<ClientState>,
}

impl Forwarder {
    /// Create a new synchronous `Forwarder`.
    ///
    /// No connection is made until [`connect`](Forwarder::connect) or [`send`](Forwarder::send) is called.
    pub fn new(config: ForwarderConfiguration, clock: Clock) -> Self {
        Forwarder { config, clock, client_state: Mutex::new(ClientState::Disconnected { last_failure: None }) }
    }

    /// Returns `true` if the forwarder currently holds an open connection.
    ///
    /// A connection that was closed by the remote end is only detected as broken on the next failed send.
    pub fn is_connected(&self) -> bool {
        matches!(*self.client_state.lock(), ClientState::Ready(_))
    }

    /// Ensures the forwarder is connected, connecting if necessary.
    ///
    /// # Errors
    ///
    /// If the forwarder is disconnected and the last connection attempt failed within the reconnect backoff window, no
    /// attempt is made and [`ForwardError::Throttled`] is returned. If a connection attempt is made and fails,
    /// [`ForwardError::Connect`] is returned.
    pub fn connect(&self, telemetry: &mut TelemetryUpdate) -> Result<(), ForwardError> {
        let mut client_state = self.client_state.lock();
        client_state.ensure_connected(&self.config, self.clock.now(), telemetry)
    }

    /// Sends a payload, connecting first if necessary.
    ///
    /// Payloads are never retried or queued: if the payload can't be sent, it is dropped.
    ///
    /// # Errors
    ///
    /// Any of the errors from [`connect`](Forwarder::connect) can be returned, in which case nothing was sent. If
    /// writing the payload fails, the connection is closed and [`ForwardError::Send`] is returned.
    pub fn send(&self, payload: &[u8], telemetry: &mut TelemetryUpdate) -> Result<(), ForwardError> {
        let mut client_state = self.client_state.lock();
        let result = client_state.try_send(&self.config, self.clock.now(), payload, telemetry);
        drop(client_state);

        match &result {
            Ok(()) => telemetry.track_payload_send_succeeded(payload.len()),
            Err(_) => telemetry.track_payload_send_failed(payload.len()),
        }

        result
    }
}
