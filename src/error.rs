use thiserror::Error;

/// Failures a live guidance session can run into.
///
/// Each variant maps to a distinct recovery policy: acquisition is retried
/// once with relaxed constraints, an unsupported recording encoding disables
/// recording for the session, a transport failure tears the session down
/// until the user restarts it, and a decode failure skips the single segment.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("device acquisition failed: {0}")]
    DeviceAcquisition(String),

    #[error("no supported recording encoding: {0}")]
    EncodingUnsupported(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("audio decode error: {0}")]
    Decode(String),
}
