// Audio mixer for the session recording
//
// Combines two time-aligned streams into the recorded track:
// - Microphone input (what the user said and ambient sound)
// - Guidance audio (synthesized playback the user heard)
//
// Frames land in an accumulation buffer indexed by absolute sample
// position derived from their timestamps, so overlapping audio sums in
// place and the emitted stream advances in wall time, never by frame
// count. Samples within the hold window stay buffered so a late
// counterpart can still land on the same positions.

use std::collections::VecDeque;
use tracing::{debug, warn};

/// Which stream a mix frame came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MixSource {
    Microphone,
    Guidance,
}

/// One block of samples headed for the recording
#[derive(Debug, Clone)]
pub struct MixFrame {
    pub samples: Vec<i16>,
    /// Milliseconds since the session started
    pub timestamp_ms: u64,
    pub source: MixSource,
}

impl MixFrame {
    pub fn microphone(samples: Vec<i16>, timestamp_ms: u64) -> Self {
        Self {
            samples,
            timestamp_ms,
            source: MixSource::Microphone,
        }
    }

    pub fn guidance(samples: Vec<i16>, timestamp_ms: u64) -> Self {
        Self {
            samples,
            timestamp_ms,
            source: MixSource::Guidance,
        }
    }
}

/// Configuration for the recording mixer
#[derive(Debug, Clone)]
pub struct MixerConfig {
    pub sample_rate: u32,
    /// How far behind the newest frame samples stay buffered before
    /// flushing; an overlapping counterpart arriving within this window
    /// still lands on the same positions
    pub max_buffer_delay_ms: u64,
}

impl Default for MixerConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16000,
            max_buffer_delay_ms: 200,
        }
    }
}

/// Mixes microphone and guidance frames into a single recorded stream
pub struct RecordingMixer {
    config: MixerConfig,
    /// Accumulated samples covering positions `flushed..horizon`
    pending: VecDeque<i32>,
    /// Absolute sample position of the front of `pending`
    flushed: u64,
    /// Absolute sample position one past the newest frame seen
    horizon: u64,
}

impl RecordingMixer {
    pub fn new(config: MixerConfig) -> Self {
        Self {
            config,
            pending: VecDeque::new(),
            flushed: 0,
            horizon: 0,
        }
    }

    fn sample_index(&self, timestamp_ms: u64) -> u64 {
        timestamp_ms * self.config.sample_rate as u64 / 1000
    }

    /// Add a frame at its timeline position and flush whatever is ready.
    ///
    /// Overlapping frames sum into the same sample positions, so a long
    /// guidance segment spanning several microphone frames occupies the
    /// wall-clock span it was heard in instead of stretching the output.
    pub fn push(&mut self, frame: MixFrame) -> Option<MixFrame> {
        let start = self.sample_index(frame.timestamp_ms);
        let end = start + frame.samples.len() as u64;

        if end <= self.flushed {
            warn!(
                "Dropping stale {:?} frame at {}ms (already flushed)",
                frame.source, frame.timestamp_ms
            );
            return None;
        }

        let skip = self.flushed.saturating_sub(start) as usize;
        let offset = start.saturating_sub(self.flushed) as usize;
        let needed = offset + frame.samples.len() - skip;
        if self.pending.len() < needed {
            self.pending.resize(needed, 0);
        }
        for (i, &sample) in frame.samples[skip..].iter().enumerate() {
            self.pending[offset + i] += sample as i32;
        }
        self.horizon = self.horizon.max(end);

        // Positions behind the hold window cannot gain a counterpart anymore
        let window = self.sample_index(self.config.max_buffer_delay_ms);
        let ready = self
            .horizon
            .saturating_sub(window)
            .saturating_sub(self.flushed);
        self.take(ready as usize)
    }

    /// Flush everything still buffered at end of session.
    pub fn drain(&mut self) -> Vec<MixFrame> {
        let count = self.pending.len();
        self.take(count).into_iter().collect()
    }

    /// Emit the first `count` buffered samples, clipped to 16-bit range.
    fn take(&mut self, count: usize) -> Option<MixFrame> {
        if count == 0 {
            return None;
        }

        let timestamp_ms = self.flushed * 1000 / self.config.sample_rate as u64;
        let samples: Vec<i16> = self
            .pending
            .drain(..count)
            .map(|v| v.clamp(i16::MIN as i32, i16::MAX as i32) as i16)
            .collect();
        self.flushed += count as u64;

        debug!("Flushed {} mixed samples at {}ms", count, timestamp_ms);

        Some(MixFrame {
            samples,
            timestamp_ms,
            source: MixSource::Microphone,
        })
    }
}

/// Linear-interpolation resampler.
///
/// The guidance stream arrives at the engine's output rate (24kHz) while
/// recordings are written at the capture rate (16kHz); the ratio is not an
/// integer, so decimation is not enough.
pub fn resample_linear(samples: &[i16], from_rate: u32, to_rate: u32) -> Vec<i16> {
    if from_rate == to_rate || samples.is_empty() {
        return samples.to_vec();
    }

    let out_len = (samples.len() as u64 * to_rate as u64 / from_rate as u64) as usize;
    let mut out = Vec::with_capacity(out_len);
    let step = from_rate as f64 / to_rate as f64;

    for i in 0..out_len {
        let pos = i as f64 * step;
        let idx = pos as usize;
        let frac = pos - idx as f64;

        let a = samples[idx] as f64;
        let b = samples.get(idx + 1).copied().unwrap_or(samples[idx]) as f64;
        out.push((a + (b - a) * frac).round() as i16);
    }

    out
}
