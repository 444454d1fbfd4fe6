//! UDP receive side of a relay link.

use std::io::ErrorKind;
use std::net::{SocketAddr, UdpSocket};
use std::time::{Duration, Instant};

use super::FrameSource;
use crate::event::{emit, EventCallback, RelayEvent};
use crate::net::bind_udp;
use crate::{AudioFormat, AudioFrame, RelayResult};

/// Largest possible UDP payload. Receiving into a buffer this size means an
/// oversized datagram shows up with its true length instead of truncated.
const MAX_DATAGRAM: usize = 65_536;

/// Frames arriving as raw datagrams, one frame per datagram.
///
/// A datagram of any size other than one frame is discarded with a
/// [`RelayEvent::FramingViolation`] and the receive continues. When nothing
/// valid arrives within the receive timeout, [`next`](FrameSource::next)
/// returns `Ok(None)`; the first such window after traffic emits
/// [`RelayEvent::PeerSilent`]. Waiting for a peer that has not sent anything
/// yet is not reported.
pub struct NetworkCapture {
    socket: UdpSocket,
    local_addr: SocketAddr,
    format: AudioFormat,
    timeout: Duration,
    buf: Vec<u8>,
    events: Option<EventCallback>,
    // True until the first frame, and again after each PeerSilent.
    silent: bool,
}

impl NetworkCapture {
    /// Binds `addr` and prepares to receive.
    ///
    /// # Errors
    ///
    /// Returns `Bind` if the socket cannot be created or bound, and `Io` if
    /// the timeout cannot be applied.
    pub fn bind(addr: SocketAddr, format: AudioFormat, timeout: Duration) -> RelayResult<Self> {
        let socket = bind_udp(addr, format.frame_bytes())?;
        socket.set_read_timeout(Some(timeout))?;
        let local_addr = socket.local_addr()?;

        tracing::info!(%local_addr, "listening for frames");

        Ok(Self {
            socket,
            local_addr,
            format,
            timeout,
            buf: vec![0; MAX_DATAGRAM],
            events: None,
            silent: true,
        })
    }

    /// Sets the callback for framing and liveness events.
    #[must_use]
    pub fn with_events(mut self, events: Option<EventCallback>) -> Self {
        self.events = events;
        self
    }

    /// The bound address, with the real port if 0 was requested.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    fn went_quiet(&mut self) {
        if !self.silent {
            self.silent = true;
            emit(
                self.events.as_ref(),
                RelayEvent::PeerSilent {
                    waited: self.timeout,
                },
            );
        }
    }
}

impl FrameSource for NetworkCapture {
    fn name(&self) -> &str {
        "udp-receive"
    }

    fn next(&mut self) -> RelayResult<Option<AudioFrame>> {
        let expected = self.format.frame_bytes();
        let started = Instant::now();

        loop {
            match self.socket.recv_from(&mut self.buf) {
                Ok((size, from)) if size == expected => {
                    if self.silent {
                        self.silent = false;
                        tracing::info!(peer = %from, "peer streaming");
                    }
                    return AudioFrame::from_le_bytes(&self.buf[..size], self.format).map(Some);
                }
                Ok((size, from)) => {
                    emit(
                        self.events.as_ref(),
                        RelayEvent::FramingViolation {
                            from,
                            size,
                            expected,
                        },
                    );
                    // A flood of junk must not starve cancellation checks.
                    if started.elapsed() >= self.timeout {
                        return Ok(None);
                    }
                }
                Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                    self.went_quiet();
                    return Ok(None);
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => return Err(e.into()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn loopback(timeout: Duration) -> (NetworkCapture, UdpSocket) {
        let capture = NetworkCapture::bind(
            "127.0.0.1:0".parse().unwrap(),
            AudioFormat::STANDARD,
            timeout,
        )
        .unwrap();
        let sender = UdpSocket::bind("127.0.0.1:0").unwrap();
        (capture, sender)
    }

    #[test]
    fn test_receives_whole_frame() {
        let (mut capture, sender) = loopback(Duration::from_secs(2));
        let frame = AudioFrame::new(vec![-7; 2048], AudioFormat::STANDARD).unwrap();
        sender
            .send_to(&frame.to_le_bytes(), capture.local_addr())
            .unwrap();

        let received = capture.next().unwrap().unwrap();
        assert_eq!(received, frame);
    }

    #[test]
    fn test_discards_wrong_sizes() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        let (capture, sender) = loopback(Duration::from_secs(2));
        let mut capture = capture.with_events(Some(crate::event_callback(move |e| {
            seen_clone.lock().unwrap().push(e);
        })));

        let target = capture.local_addr();
        sender.send_to(&[0u8; 100], target).unwrap();
        sender.send_to(&[0u8; 4098], target).unwrap();
        sender.send_to(&[1u8; 4096], target).unwrap();

        let frame = capture.next().unwrap().unwrap();
        assert!(frame.samples().iter().all(|&s| s == 0x0101));

        let seen = seen.lock().unwrap();
        let sizes: Vec<usize> = seen
            .iter()
            .filter_map(|e| match e {
                RelayEvent::FramingViolation { size, .. } => Some(*size),
                _ => None,
            })
            .collect();
        assert_eq!(sizes, vec![100, 4098]);
    }

    #[test]
    fn test_timeout_yields_none_and_reports_once_after_traffic() {
        let count = Arc::new(Mutex::new(0usize));
        let count_clone = count.clone();
        let (capture, sender) = loopback(Duration::from_millis(50));
        let mut capture = capture.with_events(Some(crate::event_callback(move |e| {
            if matches!(e, RelayEvent::PeerSilent { .. }) {
                *count_clone.lock().unwrap() += 1;
            }
        })));

        // Nobody has sent anything yet.
        assert!(capture.next().unwrap().is_none());
        assert_eq!(*count.lock().unwrap(), 0);

        sender
            .send_to(&[0u8; 4096], capture.local_addr())
            .unwrap();
        assert!(capture.next().unwrap().is_some());

        assert!(capture.next().unwrap().is_none());
        assert!(capture.next().unwrap().is_none());
        assert_eq!(*count.lock().unwrap(), 1);
    }
}
