//! UDP socket setup shared by the network source and sink.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, UdpSocket};

use socket2::{Domain, Protocol, Socket, Type};

use crate::{RelayError, RelayResult};

/// Kernel buffer size for relay sockets, in frames.
const SOCKET_BUFFER_FRAMES: usize = 32;

/// Creates a UDP socket bound to `addr` with room for a burst of frames.
pub(crate) fn bind_udp(addr: SocketAddr, frame_bytes: usize) -> RelayResult<UdpSocket> {
    let bind_err = |source| RelayError::Bind { addr, source };

    let socket =
        Socket::new(Domain::for_address(addr), Type::DGRAM, Some(Protocol::UDP)).map_err(bind_err)?;
    socket.set_reuse_address(true).map_err(bind_err)?;

    let buffer = frame_bytes * SOCKET_BUFFER_FRAMES;
    if let Err(e) = socket.set_recv_buffer_size(buffer) {
        tracing::debug!(%addr, "could not grow receive buffer: {}", e);
    }
    if let Err(e) = socket.set_send_buffer_size(buffer) {
        tracing::debug!(%addr, "could not grow send buffer: {}", e);
    }

    socket.bind(&addr.into()).map_err(bind_err)?;
    Ok(socket.into())
}

/// Wildcard address with an ephemeral port in the same family as `peer`.
pub(crate) fn unspecified_for(peer: SocketAddr) -> SocketAddr {
    let ip = match peer.ip() {
        IpAddr::V4(_) => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
        IpAddr::V6(_) => IpAddr::V6(Ipv6Addr::UNSPECIFIED),
    };
    SocketAddr::new(ip, 0)
}
