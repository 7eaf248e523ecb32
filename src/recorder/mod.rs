//! Session recorder
//!
//! Captures the mixed (microphone + guidance) audio for a session into a
//! single WAV artifact. The recorder tries a prioritized list of encodings
//! and falls back to "no recording" if none open; a recorder failure never
//! aborts the session. Recordings shorter than the configured minimum are
//! discarded silently.

pub mod mixer;

pub use mixer::{MixFrame, MixSource, MixerConfig, RecordingMixer, resample_linear};

use crate::config::RecordingConfig;
use crate::error::SessionError;
use crate::history::RecordingArtifact;
use anyhow::{Context, Result};
use chrono::Utc;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::PathBuf;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Supported recording encodings, in priority order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordingEncoding {
    WavPcm16,
    WavFloat32,
}

impl RecordingEncoding {
    pub const PRIORITY: &'static [RecordingEncoding] =
        &[RecordingEncoding::WavPcm16, RecordingEncoding::WavFloat32];

    fn spec(&self, sample_rate: u32) -> hound::WavSpec {
        match self {
            RecordingEncoding::WavPcm16 => hound::WavSpec {
                channels: 1,
                sample_rate,
                bits_per_sample: 16,
                sample_format: hound::SampleFormat::Int,
            },
            RecordingEncoding::WavFloat32 => hound::WavSpec {
                channels: 1,
                sample_rate,
                bits_per_sample: 32,
                sample_format: hound::SampleFormat::Float,
            },
        }
    }
}

/// Writes mixed samples to disk in the chosen encoding
struct WavSink {
    writer: Option<hound::WavWriter<BufWriter<File>>>,
    encoding: RecordingEncoding,
    samples_written: usize,
}

impl WavSink {
    fn open(path: &PathBuf, encoding: RecordingEncoding, sample_rate: u32) -> Result<Self> {
        let writer = hound::WavWriter::create(path, encoding.spec(sample_rate))
            .with_context(|| format!("Failed to create WAV file: {:?}", path))?;

        Ok(Self {
            writer: Some(writer),
            encoding,
            samples_written: 0,
        })
    }

    fn write(&mut self, samples: &[i16]) -> Result<()> {
        if let Some(writer) = &mut self.writer {
            for &sample in samples {
                match self.encoding {
                    RecordingEncoding::WavPcm16 => writer
                        .write_sample(sample)
                        .context("Failed to write sample")?,
                    RecordingEncoding::WavFloat32 => writer
                        .write_sample(sample as f32 / i16::MAX as f32)
                        .context("Failed to write sample")?,
                }
            }
            self.samples_written += samples.len();
        }
        Ok(())
    }

    fn finalize(mut self) -> Result<usize> {
        if let Some(writer) = self.writer.take() {
            writer.finalize().context("Failed to finalize WAV file")?;
        }
        Ok(self.samples_written)
    }
}

impl Drop for WavSink {
    fn drop(&mut self) {
        if let Some(writer) = self.writer.take() {
            if let Err(e) = writer.finalize() {
                warn!("Failed to finalize WAV writer on drop: {}", e);
            }
        }
    }
}

/// Opens recordings for sessions
pub struct SessionRecorder {
    output_dir: PathBuf,
    sample_rate: u32,
    min_duration_secs: f64,
}

impl SessionRecorder {
    pub fn new(config: &RecordingConfig, sample_rate: u32) -> Self {
        Self {
            output_dir: PathBuf::from(&config.output_dir),
            sample_rate,
            min_duration_secs: config.min_duration_secs,
        }
    }

    /// Begin recording for a session.
    ///
    /// Walks the encoding priority list until one opens; if none do, the
    /// caller is expected to continue the session without a recording.
    pub fn start(&self, goal: &str) -> Result<ActiveRecording> {
        fs::create_dir_all(&self.output_dir).context("Failed to create recordings directory")?;

        let id = uuid::Uuid::new_v4().to_string();
        let path = self.output_dir.join(format!("session-{}.wav", id));

        let mut sink = None;
        for &encoding in RecordingEncoding::PRIORITY {
            match WavSink::open(&path, encoding, self.sample_rate) {
                Ok(s) => {
                    info!("Recording {} with {:?}", path.display(), encoding);
                    sink = Some(s);
                    break;
                }
                Err(e) => warn!("Encoding {:?} unavailable: {}", encoding, e),
            }
        }

        let mut sink = sink.ok_or_else(|| {
            SessionError::EncodingUnsupported("all recording encodings failed to open".to_string())
        })?;

        let (mix_tx, mut mix_rx) = mpsc::channel::<MixFrame>(256);
        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();

        let sample_rate = self.sample_rate;
        let task: JoinHandle<Result<usize>> = tokio::spawn(async move {
            let mut mixer = RecordingMixer::new(MixerConfig {
                sample_rate,
                ..MixerConfig::default()
            });

            loop {
                tokio::select! {
                    maybe = mix_rx.recv() => match maybe {
                        Some(frame) => {
                            if let Some(mixed) = mixer.push(frame) {
                                sink.write(&mixed.samples)?;
                            }
                        }
                        None => break,
                    },
                    _ = &mut stop_rx => {
                        // Drain whatever already arrived, then stop
                        while let Ok(frame) = mix_rx.try_recv() {
                            if let Some(mixed) = mixer.push(frame) {
                                sink.write(&mixed.samples)?;
                            }
                        }
                        break;
                    }
                }
            }

            for mixed in mixer.drain() {
                sink.write(&mixed.samples)?;
            }

            sink.finalize()
        });

        Ok(ActiveRecording {
            mix_tx,
            stop_tx: Some(stop_tx),
            task,
            id,
            goal: goal.to_string(),
            path,
            created_at: Utc::now(),
            sample_rate,
            min_duration_secs: self.min_duration_secs,
        })
    }
}

/// A recording in progress
pub struct ActiveRecording {
    mix_tx: mpsc::Sender<MixFrame>,
    stop_tx: Option<oneshot::Sender<()>>,
    task: JoinHandle<Result<usize>>,
    id: String,
    goal: String,
    path: PathBuf,
    created_at: chrono::DateTime<Utc>,
    sample_rate: u32,
    min_duration_secs: f64,
}

impl ActiveRecording {
    /// Sender for mix frames; clone one per tap (microphone, guidance).
    pub fn mix_sender(&self) -> mpsc::Sender<MixFrame> {
        self.mix_tx.clone()
    }

    /// Stop capture and finalize.
    ///
    /// Returns the artifact when the recorded duration meets the minimum;
    /// shorter recordings are deleted and never surfaced.
    pub async fn stop(mut self) -> Option<RecordingArtifact> {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
        drop(self.mix_tx);

        let samples_written = match self.task.await {
            Ok(Ok(n)) => n,
            Ok(Err(e)) => {
                error!("Recording task failed: {}", e);
                let _ = fs::remove_file(&self.path);
                return None;
            }
            Err(e) => {
                error!("Recording task panicked: {}", e);
                let _ = fs::remove_file(&self.path);
                return None;
            }
        };

        let duration_secs = samples_written as f64 / self.sample_rate as f64;

        if duration_secs < self.min_duration_secs {
            info!(
                "Discarding short recording ({:.1}s < {:.1}s)",
                duration_secs, self.min_duration_secs
            );
            let _ = fs::remove_file(&self.path);
            return None;
        }

        info!(
            "Finalized recording {} ({:.1}s)",
            self.path.display(),
            duration_secs
        );

        Some(RecordingArtifact {
            id: self.id,
            created_at: self.created_at,
            duration_secs,
            goal: self.goal,
            media_path: self.path,
        })
    }
}
