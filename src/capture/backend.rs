use crate::error::SessionError;
use anyhow::Result;
use tokio::sync::{mpsc, watch};

/// Which camera the capture pipeline should prefer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraFacing {
    /// Front camera (facing the user)
    User,
    /// Rear camera (facing the surroundings)
    Environment,
}

impl CameraFacing {
    pub fn toggled(self) -> Self {
        match self {
            CameraFacing::User => CameraFacing::Environment,
            CameraFacing::Environment => CameraFacing::User,
        }
    }
}

/// Preferred device constraints for an acquisition attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureConstraints {
    pub width: u32,
    pub height: u32,
    pub frame_rate: u32,
    pub facing: CameraFacing,
}

impl CaptureConstraints {
    /// Minimal constraints used for the single retry after a rejection
    pub fn fallback(&self) -> Self {
        Self {
            width: 0,
            height: 0,
            frame_rate: 0,
            facing: self.facing,
        }
    }
}

impl Default for CaptureConstraints {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
            frame_rate: 15,
            facing: CameraFacing::Environment,
        }
    }
}

/// A fixed block of raw microphone samples (16-bit PCM, mono)
#[derive(Debug, Clone)]
pub struct AudioChunk {
    pub samples: Vec<i16>,
    pub sample_rate: u32,
    /// Milliseconds since capture started
    pub timestamp_ms: u64,
}

/// One raw camera frame (RGB8, row-major)
#[derive(Debug, Clone)]
pub struct CameraFrame {
    pub rgb: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub timestamp_ms: u64,
}

/// Capture device backend
///
/// Owns the microphone and camera locks for one acquisition at a time.
/// `release` must be idempotent and callable from any lifecycle state so
/// teardown can always run it unconditionally.
#[async_trait::async_trait]
pub trait CaptureBackend: Send + Sync {
    /// Acquire the microphone/camera pair under the given constraints.
    ///
    /// Backends do not retry; constraint relaxation is the pipeline's job
    /// (see [`super::acquire_with_fallback`]).
    async fn acquire(&mut self, constraints: &CaptureConstraints) -> Result<(), SessionError>;

    /// Take the live audio stream. Returns `None` if not acquired or if the
    /// stream was already taken; re-acquiring makes it available again.
    fn take_audio(&mut self) -> Option<mpsc::Receiver<AudioChunk>>;

    /// Latest-frame slot: always carries the most recent camera frame, or
    /// `None` before the first frame lands. Superseded frames are dropped.
    fn frames(&self) -> watch::Receiver<Option<CameraFrame>>;

    /// Free the underlying device locks. Safe to call repeatedly.
    async fn release(&mut self);

    fn is_capturing(&self) -> bool;

    /// Backend name for logging
    fn name(&self) -> &str;
}

/// Capture source type
#[derive(Debug, Clone)]
pub enum CaptureSource {
    /// Real microphone + camera devices
    Device,
    /// Generated tone and test-pattern frames (demo runs and tests)
    Synthetic,
}

/// Capture backend factory
pub struct CaptureBackendFactory;

impl CaptureBackendFactory {
    pub fn create(
        source: CaptureSource,
        audio: &crate::config::AudioConfig,
    ) -> Result<Box<dyn CaptureBackend>> {
        match source {
            CaptureSource::Device => {
                anyhow::bail!("device capture is not available on this build; use the synthetic source")
            }
            CaptureSource::Synthetic => {
                let backend = super::synthetic::SyntheticBackend::new(
                    audio.input_sample_rate,
                    audio.chunk_duration_ms,
                );
                Ok(Box::new(backend))
            }
        }
    }
}
