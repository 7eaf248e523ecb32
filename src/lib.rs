pub mod capture;
pub mod config;
pub mod error;
pub mod haptics;
pub mod history;
pub mod playback;
pub mod recorder;
pub mod session;
pub mod transport;
pub mod uplink;

pub use capture::{
    acquire_with_fallback, AudioChunk, CameraFacing, CameraFrame, CaptureBackend,
    CaptureBackendFactory, CaptureConstraints, CaptureSource, SyntheticBackend,
};
pub use config::Config;
pub use error::SessionError;
pub use haptics::{HapticCategory, HapticPattern, HapticSink, LogHapticSink};
pub use history::{HistorySink, MemoryHistory, RecordingArtifact};
pub use playback::{ManualClock, MonotonicClock, PlaybackClock, PlaybackScheduler, PlaybackSegment};
pub use recorder::{ActiveRecording, MixFrame, MixSource, RecordingEncoding, SessionRecorder};
pub use session::{SessionContext, SessionController, SessionStatus};
pub use transport::{
    GeminiLiveClient, LiveEvent, MediaChunk, OpenConfig, SessionHandle, SessionTransport,
    TranscriptEvent, TranscriptSource,
};
pub use uplink::VideoFrame;
