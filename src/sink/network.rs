//! UDP send side of a relay link.

use std::io;
use std::net::{SocketAddr, UdpSocket};

use crate::net::{bind_udp, unspecified_for};
use crate::sink::{check_frame_format, FrameSink};
use crate::{AudioFormat, AudioFrame, RelayResult};

/// Sends every frame as exactly one datagram to a fixed peer.
///
/// No header, no acknowledgment, no retransmission: the payload is the
/// frame's little-endian interleaved samples and nothing else.
pub struct NetworkPlayback {
    socket: UdpSocket,
    target: SocketAddr,
    format: AudioFormat,
    buf: Vec<u8>,
}

impl NetworkPlayback {
    /// Opens an ephemeral socket for sending to `target`.
    ///
    /// # Errors
    ///
    /// Returns `Bind` if the local socket cannot be created.
    pub fn connect(target: SocketAddr, format: AudioFormat) -> RelayResult<Self> {
        let socket = bind_udp(unspecified_for(target), format.frame_bytes())?;
        tracing::info!(%target, "sending frames");
        Ok(Self {
            socket,
            target,
            format,
            buf: Vec::with_capacity(format.frame_bytes()),
        })
    }

    /// Peer the frames go to.
    pub fn target(&self) -> SocketAddr {
        self.target
    }
}

impl FrameSink for NetworkPlayback {
    fn name(&self) -> &str {
        "udp-send"
    }

    fn put(&mut self, frame: &AudioFrame) -> RelayResult<()> {
        check_frame_format(self.format, frame)?;

        frame.write_le_bytes(&mut self.buf);
        let sent = self.socket.send_to(&self.buf, self.target)?;
        if sent != self.buf.len() {
            return Err(io::Error::new(io::ErrorKind::WriteZero, "datagram truncated on send").into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RelayError;
    use std::time::Duration;

    #[test]
    fn test_one_datagram_per_frame() {
        let receiver = UdpSocket::bind("127.0.0.1:0").unwrap();
        receiver
            .set_read_timeout(Some(Duration::from_secs(2)))
            .unwrap();
        let mut sink =
            NetworkPlayback::connect(receiver.local_addr().unwrap(), AudioFormat::STANDARD).unwrap();

        let frame = AudioFrame::new(vec![0x1234; 2048], AudioFormat::STANDARD).unwrap();
        sink.put(&frame).unwrap();

        let mut buf = [0u8; 8192];
        let (size, _) = receiver.recv_from(&mut buf).unwrap();
        assert_eq!(size, 4096);
        assert_eq!(&buf[..2], &[0x34, 0x12]);
    }

    #[test]
    fn test_rejects_foreign_format() {
        let mut sink =
            NetworkPlayback::connect("127.0.0.1:9".parse().unwrap(), AudioFormat::STANDARD).unwrap();
        let mono = AudioFormat {
            channels: 1,
            ..AudioFormat::STANDARD
        };
        let result = sink.put(&AudioFrame::silence(mono));
        assert!(matches!(result, Err(RelayError::FrameSizeMismatch { .. })));
    }
}
