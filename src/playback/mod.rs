//! Gapless scheduling of inbound synthesized audio
//!
//! The engine streams audio in bursts; segments are scheduled on a virtual
//! playback clock so consecutive responses abut exactly. A single cursor
//! (`next_start`) is the only state: each segment starts at
//! `max(next_start, now)` and advances the cursor by its own duration, so
//! segments never overlap and never leave a gap while a backlog exists.

use crate::error::SessionError;
use std::sync::Mutex;
use std::time::Instant;
use tracing::{debug, warn};

/// Monotonic time reference used purely for scheduling decoded audio
pub trait PlaybackClock: Send + Sync {
    /// Seconds elapsed on the playback clock (starts at 0)
    fn now_secs(&self) -> f64;
}

/// Real clock backed by a monotonic `Instant`
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl PlaybackClock for MonotonicClock {
    fn now_secs(&self) -> f64 {
        self.origin.elapsed().as_secs_f64()
    }
}

/// Manually driven clock for deterministic scheduling tests
pub struct ManualClock {
    now: Mutex<f64>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: Mutex::new(0.0),
        }
    }

    pub fn advance(&self, secs: f64) {
        *self.now.lock().unwrap() += secs;
    }

    pub fn set(&self, secs: f64) {
        *self.now.lock().unwrap() = secs;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl PlaybackClock for ManualClock {
    fn now_secs(&self) -> f64 {
        *self.now.lock().unwrap()
    }
}

/// A decoded audio buffer with its scheduled start on the playback clock
#[derive(Debug, Clone)]
pub struct PlaybackSegment {
    pub samples: Vec<i16>,
    pub sample_rate: u32,
    pub start_secs: f64,
}

impl PlaybackSegment {
    pub fn duration_secs(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }

    pub fn end_secs(&self) -> f64 {
        self.start_secs + self.duration_secs()
    }
}

/// Decode a raw little-endian 16-bit PCM payload into samples.
///
/// The engine sends fixed-rate mono PCM with no container, so decoding is a
/// byte-pair reinterpretation. An odd-length payload is malformed.
pub fn decode_pcm16(bytes: &[u8]) -> Result<Vec<i16>, SessionError> {
    if bytes.len() % 2 != 0 {
        return Err(SessionError::Decode(format!(
            "PCM payload has odd length {}",
            bytes.len()
        )));
    }

    Ok(bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect())
}

/// Schedules decoded segments back-to-back on a shared playback clock
pub struct PlaybackScheduler {
    clock: std::sync::Arc<dyn PlaybackClock>,
    sample_rate: u32,
    next_start: f64,
    closed: bool,
}

impl PlaybackScheduler {
    pub fn new(clock: std::sync::Arc<dyn PlaybackClock>, sample_rate: u32) -> Self {
        Self {
            clock,
            sample_rate,
            next_start: 0.0,
            closed: false,
        }
    }

    /// Decode a payload and assign it a start time.
    ///
    /// Returns `Ok(None)` once the scheduler is closed: delivery racing a
    /// session teardown must not schedule anything. A decode failure leaves
    /// the cursor untouched so one bad segment never corrupts the timeline.
    pub fn schedule(&mut self, payload: &[u8]) -> Result<Option<PlaybackSegment>, SessionError> {
        if self.closed {
            debug!("Dropping segment scheduled after playback close");
            return Ok(None);
        }

        let samples = decode_pcm16(payload)?;
        let now = self.clock.now_secs();
        let start = if self.next_start < now {
            now
        } else {
            self.next_start
        };

        let segment = PlaybackSegment {
            samples,
            sample_rate: self.sample_rate,
            start_secs: start,
        };

        self.next_start = segment.end_secs();

        debug!(
            "Scheduled segment: start={:.3}s duration={:.3}s",
            segment.start_secs,
            segment.duration_secs()
        );

        Ok(Some(segment))
    }

    /// Close the playback path; later segments are silently dropped.
    pub fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            debug!("Playback scheduler closed at cursor {:.3}s", self.next_start);
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn next_start(&self) -> f64 {
        self.next_start
    }
}

/// Log-and-skip wrapper used by the inbound event loop
pub fn schedule_or_skip(
    scheduler: &mut PlaybackScheduler,
    payload: &[u8],
) -> Option<PlaybackSegment> {
    match scheduler.schedule(payload) {
        Ok(segment) => segment,
        Err(e) => {
            warn!("Skipping undecodable audio segment: {}", e);
            None
        }
    }
}
