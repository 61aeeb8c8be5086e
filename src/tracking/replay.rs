//! Recorded landmark replay
//!
//! JSON-lines files with one [`LandmarkPacket`] per line, the same shape the
//! UDP helper sends. Blank lines are skipped.

use std::collections::VecDeque;
use std::path::Path;

use super::{FrameObservation, LandmarkPacket, Tracker};
use crate::error::{Fushigi2dError, TrackingError};

/// Plays back recorded frames; end of file is end of stream
#[derive(Debug, Clone, Default)]
pub struct ReplayTracker {
    frames: VecDeque<FrameObservation>,
    played: usize,
}

impl ReplayTracker {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, Fushigi2dError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            TrackingError::Replay(format!("Failed to read {}: {}", path.display(), e))
        })?;

        let tracker = Self::parse(&contents)
            .map_err(|e| TrackingError::Replay(format!("{}: {}", path.display(), e)))?;
        tracing::info!(
            "Loaded {} replay frames from {}",
            tracker.remaining(),
            path.display()
        );
        Ok(tracker)
    }

    /// Parse JSON lines. Fails on the first malformed line.
    fn parse(contents: &str) -> Result<Self, String> {
        let mut packets = Vec::new();
        for (index, line) in contents.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let packet: LandmarkPacket = serde_json::from_str(line)
                .map_err(|e| format!("line {}: {}", index + 1, e))?;
            if let Some(message) = &packet.error {
                return Err(format!("line {}: recorded tracker error: {}", index + 1, message));
            }
            packets.push(packet);
        }
        Ok(Self::from_packets(packets))
    }

    /// Frames up to (not including) the first `end_of_stream` packet
    pub fn from_packets(packets: impl IntoIterator<Item = LandmarkPacket>) -> Self {
        let frames = packets
            .into_iter()
            .take_while(|packet| !packet.end_of_stream)
            .map(LandmarkPacket::into_observation)
            .collect();
        Self { frames, played: 0 }
    }

    pub fn from_frames(frames: impl IntoIterator<Item = FrameObservation>) -> Self {
        Self {
            frames: frames.into_iter().collect(),
            played: 0,
        }
    }

    pub fn remaining(&self) -> usize {
        self.frames.len()
    }

    pub fn played(&self) -> usize {
        self.played
    }
}

impl Tracker for ReplayTracker {
    fn process(&mut self) -> Result<Option<FrameObservation>, Fushigi2dError> {
        let frame = self.frames.pop_front();
        if frame.is_some() {
            self.played += 1;
        }
        Ok(frame)
    }
}
