use std::future::Future;
use std::io;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

use bytes::Bytes;
use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;
use tracing::trace;

use crate::core::{Error, Result};
use super::RawFrame;

/// Source of raw datagrams
pub trait Inbound {
    /// Waits for the next datagram
    fn recv(&mut self) -> impl Future<Output = io::Result<RawFrame>> + Send;
}

/// Destination for released frames
pub trait Outbound {
    /// Sends one frame, returning the number of bytes written
    fn send(&mut self, frame: &[u8]) -> impl Future<Output = io::Result<usize>> + Send;
}

/// UDP receiver, one datagram per frame
#[derive(Debug)]
pub struct UdpInbound {
    socket: UdpSocket,
    recv_buffer: Vec<u8>,
}

impl UdpInbound {
    /// Binds the receive socket. Must be called within a tokio runtime.
    pub fn bind(addr: SocketAddr, recv_buffer_size: usize) -> Result<Self> {
        let socket = bind_socket(addr)
            .map_err(|e| Error::network(format!("Failed to bind socket {}: {}", addr, e)))?;
        Ok(UdpInbound::from_socket(socket, recv_buffer_size))
    }

    /// Wraps an already bound socket
    pub fn from_socket(socket: UdpSocket, recv_buffer_size: usize) -> Self {
        UdpInbound {
            socket,
            recv_buffer: vec![0u8; recv_buffer_size],
        }
    }

    /// Returns the local socket address
    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.socket
            .local_addr()
            .map_err(|e| Error::network(format!("Failed to get local address: {}", e)))
    }
}

impl Inbound for UdpInbound {
    async fn recv(&mut self) -> io::Result<RawFrame> {
        let (size, peer) = self.socket.recv_from(&mut self.recv_buffer).await?;
        trace!(%peer, size, "Received datagram");
        Ok(Bytes::copy_from_slice(&self.recv_buffer[..size]))
    }
}

/// UDP sender towards a fixed destination
#[derive(Debug)]
pub struct UdpOutbound {
    socket: UdpSocket,
    destination: SocketAddr,
}

impl UdpOutbound {
    /// Opens an ephemeral socket for sending to `destination`
    pub async fn connect(destination: SocketAddr) -> Result<Self> {
        let local = match destination.ip() {
            IpAddr::V4(_) => SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0),
            IpAddr::V6(_) => SocketAddr::new(IpAddr::V6(Ipv6Addr::UNSPECIFIED), 0),
        };
        let socket = UdpSocket::bind(local)
            .await
            .map_err(|e| Error::network(format!("Failed to open send socket: {}", e)))?;
        Ok(UdpOutbound { socket, destination })
    }

    /// Where frames are sent
    pub fn destination(&self) -> SocketAddr {
        self.destination
    }
}

impl Outbound for UdpOutbound {
    async fn send(&mut self, frame: &[u8]) -> io::Result<usize> {
        self.socket.send_to(frame, self.destination).await
    }
}

fn bind_socket(addr: SocketAddr) -> io::Result<UdpSocket> {
    let socket = Socket::new(Domain::for_address(addr), Type::DGRAM, Some(Protocol::UDP))?;
    // Allow quick restarts on the well-known FreeD port
    socket.set_reuse_address(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;
    UdpSocket::from_std(socket.into())
}
