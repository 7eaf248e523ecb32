//! Synthetic capture backend
//!
//! Generates a quiet test tone at the capture cadence and a moving gradient
//! frame once a second. Used for demo runs without camera hardware and for
//! exercising the pipeline in tests.

use super::backend::{AudioChunk, CameraFrame, CaptureBackend, CaptureConstraints};
use crate::error::SessionError;
use std::f32::consts::TAU;
use std::time::Instant;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::info;

const TONE_HZ: f32 = 440.0;
const TONE_AMPLITUDE: f32 = 3000.0;

pub struct SyntheticBackend {
    sample_rate: u32,
    chunk_duration_ms: u64,
    frame_tx: watch::Sender<Option<CameraFrame>>,
    audio_rx: Option<mpsc::Receiver<AudioChunk>>,
    tasks: Vec<JoinHandle<()>>,
    capturing: bool,
}

impl SyntheticBackend {
    pub fn new(sample_rate: u32, chunk_duration_ms: u64) -> Self {
        let (frame_tx, _) = watch::channel(None);
        Self {
            sample_rate,
            chunk_duration_ms,
            frame_tx,
            audio_rx: None,
            tasks: Vec::new(),
            capturing: false,
        }
    }

    fn spawn_audio_task(&self, tx: mpsc::Sender<AudioChunk>) -> JoinHandle<()> {
        let sample_rate = self.sample_rate;
        let chunk_ms = self.chunk_duration_ms;
        let samples_per_chunk = (sample_rate as u64 * chunk_ms / 1000) as usize;

        tokio::spawn(async move {
            let start = Instant::now();
            let mut interval = tokio::time::interval(std::time::Duration::from_millis(chunk_ms));
            let mut phase: u64 = 0;

            loop {
                interval.tick().await;

                let samples: Vec<i16> = (0..samples_per_chunk)
                    .map(|i| {
                        let t = (phase + i as u64) as f32 / sample_rate as f32;
                        (TONE_AMPLITUDE * (TAU * TONE_HZ * t).sin()) as i16
                    })
                    .collect();
                phase += samples_per_chunk as u64;

                let chunk = AudioChunk {
                    samples,
                    sample_rate,
                    timestamp_ms: start.elapsed().as_millis() as u64,
                };

                // Receiver dropped means the stream was released
                if tx.send(chunk).await.is_err() {
                    break;
                }
            }
        })
    }

    fn spawn_frame_task(
        &self,
        constraints: &CaptureConstraints,
        tx: watch::Sender<Option<CameraFrame>>,
    ) -> JoinHandle<()> {
        // Fallback constraints carry zero dimensions; substitute a minimal frame
        let width = constraints.width.max(64);
        let height = constraints.height.max(48);

        tokio::spawn(async move {
            let start = Instant::now();
            let mut interval = tokio::time::interval(std::time::Duration::from_secs(1));
            let mut tick: u32 = 0;

            loop {
                interval.tick().await;

                let mut rgb = Vec::with_capacity((width * height * 3) as usize);
                for y in 0..height {
                    for x in 0..width {
                        rgb.push(((x + tick) % 256) as u8);
                        rgb.push((y % 256) as u8);
                        rgb.push((tick % 256) as u8);
                    }
                }

                let frame = CameraFrame {
                    rgb,
                    width,
                    height,
                    timestamp_ms: start.elapsed().as_millis() as u64,
                };

                if tx.send(Some(frame)).is_err() {
                    break;
                }
                tick = tick.wrapping_add(1);
            }
        })
    }
}

#[async_trait::async_trait]
impl CaptureBackend for SyntheticBackend {
    async fn acquire(&mut self, constraints: &CaptureConstraints) -> Result<(), SessionError> {
        // Re-acquiring restarts both streams
        if self.capturing {
            self.release().await;
        }

        info!(
            "Synthetic capture acquired: {}x{} @ {}fps, facing {:?}",
            constraints.width, constraints.height, constraints.frame_rate, constraints.facing
        );

        let (audio_tx, audio_rx) = mpsc::channel(100);
        self.tasks.push(self.spawn_audio_task(audio_tx));
        self.tasks
            .push(self.spawn_frame_task(constraints, self.frame_tx.clone()));

        self.audio_rx = Some(audio_rx);
        self.capturing = true;

        Ok(())
    }

    fn take_audio(&mut self) -> Option<mpsc::Receiver<AudioChunk>> {
        self.audio_rx.take()
    }

    fn frames(&self) -> watch::Receiver<Option<CameraFrame>> {
        self.frame_tx.subscribe()
    }

    async fn release(&mut self) {
        if !self.capturing && self.tasks.is_empty() {
            return;
        }

        for task in self.tasks.drain(..) {
            task.abort();
        }
        self.audio_rx = None;
        self.frame_tx.send_replace(None);
        self.capturing = false;

        info!("Synthetic capture released");
    }

    fn is_capturing(&self) -> bool {
        self.capturing
    }

    fn name(&self) -> &str {
        "synthetic"
    }
}
