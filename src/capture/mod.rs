//! Capture pipeline: microphone + camera acquisition
//!
//! Acquisition tries the caller's preferred constraints first and retries
//! once with minimal constraints before failing. The audio stream pushes
//! fixed chunks at the device cadence; the video side is a latest-frame
//! slot that is polled, never queued.

pub mod backend;
pub mod synthetic;

pub use backend::{
    AudioChunk, CameraFacing, CameraFrame, CaptureBackend, CaptureBackendFactory,
    CaptureConstraints, CaptureSource,
};
pub use synthetic::SyntheticBackend;

use crate::error::SessionError;
use tracing::warn;

/// Acquire with the preferred constraints, retrying once with minimal
/// constraints before signaling a device error.
pub async fn acquire_with_fallback(
    backend: &mut dyn CaptureBackend,
    preferred: &CaptureConstraints,
) -> Result<(), SessionError> {
    match backend.acquire(preferred).await {
        Ok(()) => Ok(()),
        Err(first) => {
            warn!(
                "Preferred capture constraints rejected ({}), retrying with defaults",
                first
            );
            backend
                .acquire(&preferred.fallback())
                .await
                .map_err(|e| SessionError::DeviceAcquisition(format!("{} (after fallback)", e)))
        }
    }
}
