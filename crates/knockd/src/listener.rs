//! Decoy-port listeners.
//!
//! One receiver per knock port. The listener is the only component
//! touching the network for knocks, and it trusts nothing but the
//! source address, the destination port, and the arrival time: TCP
//! connections are closed without a byte written, UDP payloads are
//! discarded unread. Silence is part of the concealment design.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use thiserror::Error;
use tokio::net::{TcpListener, UdpSocket};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use knock_core::KnockGateApi;

use crate::config::Transport;

/// Listener startup errors.
#[derive(Debug, Error)]
pub enum ListenError {
    #[error("cannot bind knock port {port}: {source}")]
    Bind {
        port: u16,
        source: std::io::Error,
    },
}

/// Binds the decoy ports and feeds every inbound event to the gate.
pub struct KnockListener {
    gate: Arc<dyn KnockGateApi>,
    bind_address: IpAddr,
    transport: Transport,
    ports: Vec<u16>,
}

impl KnockListener {
    pub fn new(
        gate: Arc<dyn KnockGateApi>,
        bind_address: IpAddr,
        transport: Transport,
        ports: Vec<u16>,
    ) -> Self {
        Self {
            gate,
            bind_address,
            transport,
            ports,
        }
    }

    /// Bind every knock port (failing fast if any is taken) and spawn
    /// one receiver task per port.
    pub async fn spawn(
        self,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Result<Vec<JoinHandle<()>>, ListenError> {
        let mut handles = Vec::with_capacity(self.ports.len());
        match self.transport {
            Transport::Tcp => {
                let mut listeners = Vec::with_capacity(self.ports.len());
                for &port in &self.ports {
                    let addr = SocketAddr::new(self.bind_address, port);
                    let listener = TcpListener::bind(addr)
                        .await
                        .map_err(|source| ListenError::Bind { port, source })?;
                    listeners.push((port, listener));
                }
                for (port, listener) in listeners {
                    tracing::info!(port, "listening for TCP knocks");
                    handles.push(tokio::spawn(accept_loop(
                        listener,
                        port,
                        Arc::clone(&self.gate),
                        shutdown_rx.clone(),
                    )));
                }
            }
            Transport::Udp => {
                let mut sockets = Vec::with_capacity(self.ports.len());
                for &port in &self.ports {
                    let addr = SocketAddr::new(self.bind_address, port);
                    let socket = UdpSocket::bind(addr)
                        .await
                        .map_err(|source| ListenError::Bind { port, source })?;
                    sockets.push((port, socket));
                }
                for (port, socket) in sockets {
                    tracing::info!(port, "listening for UDP knocks");
                    handles.push(tokio::spawn(datagram_loop(
                        socket,
                        port,
                        Arc::clone(&self.gate),
                        shutdown_rx.clone(),
                    )));
                }
            }
        }
        Ok(handles)
    }
}

/// Dispatch one knock as its own task so a slow grant never blocks the
/// receive loop.
fn dispatch(gate: Arc<dyn KnockGateApi>, source: IpAddr, port: u16) {
    tokio::spawn(async move {
        if let Err(err) = gate.handle_knock(source, port).await {
            tracing::warn!(%source, port, error = %err, "knock handling failed");
        }
    });
}

async fn accept_loop(
    listener: TcpListener,
    port: u16,
    gate: Arc<dyn KnockGateApi>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    // The completed connect IS the knock; never respond.
                    drop(stream);
                    dispatch(Arc::clone(&gate), peer.ip(), port);
                }
                Err(err) => {
                    tracing::warn!(port, error = %err, "accept failed");
                }
            },
            changed = shutdown_rx.changed() => {
                // A dropped sender counts as shutdown.
                if changed.is_err() || *shutdown_rx.borrow() {
                    break;
                }
            }
        }
    }
}

async fn datagram_loop(
    socket: UdpSocket,
    port: u16,
    gate: Arc<dyn KnockGateApi>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    // Payload is ignored; the buffer only drains the socket.
    let mut buf = [0u8; 128];
    loop {
        tokio::select! {
            received = socket.recv_from(&mut buf) => match received {
                Ok((_, peer)) => {
                    dispatch(Arc::clone(&gate), peer.ip(), port);
                }
                Err(err) => {
                    tracing::warn!(port, error = %err, "recv failed");
                }
            },
            changed = shutdown_rx.changed() => {
                // A dropped sender counts as shutdown.
                if changed.is_err() || *shutdown_rx.borrow() {
                    break;
                }
            }
        }
    }
}
