//! MediaPipe landmark receiver
//!
//! Receives JSON-over-UDP [`LandmarkPacket`]s from the
//! `scripts/landmark_tracker.py` helper, one per captured video frame.

use std::net::{SocketAddr, UdpSocket};
use std::time::{Duration, Instant};

use super::{FrameObservation, LandmarkPacket, Tracker};
use crate::config::TrackerConfig;
use crate::error::{Fushigi2dError, TrackingError};

/// MediaPipe JSON-over-UDP receiver.
///
/// Blocks for at most `read_timeout_ms` per frame. When nothing arrives in
/// time the last observation is repeated until it is `stale_after_ms` old,
/// then empty observations are returned. An `error` packet from the helper
/// is returned as a fatal [`TrackingError::HelperFailed`].
pub struct MpReceiver {
    config: TrackerConfig,
    socket: Option<UdpSocket>,
    buf: Vec<u8>,
    last: Option<(FrameObservation, Instant)>,
    packets_received: u64,
}

impl MpReceiver {
    /// Create a new MediaPipe receiver (does not bind yet)
    pub fn new(config: &TrackerConfig) -> Self {
        Self {
            config: config.clone(),
            socket: None,
            buf: vec![0u8; 65536],
            last: None,
            packets_received: 0,
        }
    }

    /// Bind the UDP socket and start receiving
    pub fn start(&mut self) -> Result<(), Fushigi2dError> {
        let addr = format!("{}:{}", self.config.listen_address, self.config.port);

        let socket = UdpSocket::bind(&addr).map_err(|e| {
            TrackingError::MpReceiver(format!("Failed to bind to {}: {}", addr, e))
        })?;

        let timeout = Duration::from_millis(self.config.read_timeout_ms.max(1));
        socket.set_read_timeout(Some(timeout)).map_err(|e| {
            TrackingError::MpReceiver(format!("Failed to set read timeout: {}", e))
        })?;

        tracing::info!("MediaPipe receiver listening on {}", addr);
        self.socket = Some(socket);

        Ok(())
    }

    /// Bound address, once started
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.socket.as_ref().and_then(|s| s.local_addr().ok())
    }

    pub fn packets_received(&self) -> u64 {
        self.packets_received
    }

    /// Stop the receiver
    pub fn stop(&mut self) {
        self.socket = None;
        self.last = None;
        tracing::info!("MediaPipe receiver stopped");
    }

    fn stale_after(&self) -> Duration {
        Duration::from_millis(self.config.stale_after_ms)
    }

    /// Observation to use when no packet arrived this frame
    fn repeat_last(&self) -> FrameObservation {
        match &self.last {
            Some((observation, at)) if at.elapsed() < self.stale_after() => observation.clone(),
            _ => FrameObservation::empty(),
        }
    }

    /// Wait for one datagram, then take whatever else is already queued so
    /// the newest packet wins. Returns the newest datagram's length.
    fn recv_latest(&mut self) -> Result<Option<usize>, Fushigi2dError> {
        let Some(socket) = &self.socket else {
            return Err(TrackingError::MpReceiver("Receiver not started".to_string()).into());
        };

        let mut len = match socket.recv(&mut self.buf) {
            Ok(size) => size,
            Err(e) if is_timeout(&e) => return Ok(None),
            Err(e) => {
                return Err(TrackingError::MpReceiver(format!("Receive error: {}", e)).into());
            }
        };

        socket.set_nonblocking(true)?;
        let mut skipped = 0u32;
        while let Ok(size) = socket.recv(&mut self.buf) {
            len = size;
            skipped += 1;
        }
        socket.set_nonblocking(false)?;

        if skipped > 0 {
            tracing::trace!("Skipped {} stale packets", skipped);
        }
        Ok(Some(len))
    }
}

impl Tracker for MpReceiver {
    fn process(&mut self) -> Result<Option<FrameObservation>, Fushigi2dError> {
        let Some(len) = self.recv_latest()? else {
            return Ok(Some(self.repeat_last()));
        };

        let mut packet: LandmarkPacket = match serde_json::from_slice(&self.buf[..len]) {
            Ok(packet) => packet,
            Err(e) => {
                let err = TrackingError::MpParse(format!("JSON parse error: {}", e));
                tracing::warn!("{}", err);
                return Ok(Some(FrameObservation::empty()));
            }
        };
        self.packets_received += 1;

        if let Some(message) = packet.error.take() {
            return Err(TrackingError::HelperFailed(message).into());
        }
        if packet.end_of_stream {
            tracing::info!("Tracker reported end of stream");
            return Ok(None);
        }

        let observation = packet.into_observation();
        self.last = Some((observation.clone(), Instant::now()));
        Ok(Some(observation))
    }
}

fn is_timeout(e: &std::io::Error) -> bool {
    matches!(
        e.kind(),
        std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
    )
}
