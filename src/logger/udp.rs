//! UDP packet transport: one datagram per record.

use std::net::SocketAddr;

use async_trait::async_trait;
use tokio::net::UdpSocket;
use tracing::debug;

use super::transport::{Transport, TransportError};
use crate::error::Result;

/// Sends each record as a single datagram to a fixed collector address
#[derive(Debug)]
pub struct PacketTransport {
    socket: UdpSocket,
    dest: SocketAddr,
}

impl PacketTransport {
    /// Bind an ephemeral local socket for sending to `dest`.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if no local socket could be bound.
    pub async fn bind(dest: SocketAddr) -> Result<Self> {
        let local: SocketAddr = if dest.is_ipv4() {
            ([0, 0, 0, 0], 0).into()
        } else {
            ([0u16; 8], 0).into()
        };
        let socket = UdpSocket::bind(local).await?;
        debug!("UDP log socket bound to {}", socket.local_addr()?);
        Ok(Self { socket, dest })
    }

    pub fn dest(&self) -> SocketAddr {
        self.dest
    }
}

#[async_trait]
impl Transport for PacketTransport {
    async fn send(&mut self, payload: &[u8]) -> std::result::Result<(), TransportError> {
        let sent = self.socket.send_to(payload, self.dest).await?;
        if sent != payload.len() {
            return Err(TransportError::Send(format!(
                "short datagram ({} of {} bytes)",
                sent,
                payload.len()
            )));
        }
        Ok(())
    }

    fn describe(&self) -> String {
        format!("udp://{}", self.dest)
    }
}
