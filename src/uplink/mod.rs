//! Encoder/transport adapter
//!
//! Shapes raw capture data into the remote session's media envelopes. The
//! audio pump forwards each capture chunk as base64 PCM while the session is
//! live and the mic is enabled; the video sampler compresses the latest
//! camera frame to JPEG once a second. Frames are never queued: a missed
//! tick is skipped, so a slow consumer sees the next sample, not a backlog.

use crate::capture::{AudioChunk, CameraFrame};
use crate::recorder::MixFrame;
use crate::session::SessionContext;
use crate::session::SessionStatus;
use crate::transport::{MediaChunk, SessionHandle};
use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

/// One compressed still image plus its capture timestamp
#[derive(Debug, Clone)]
pub struct VideoFrame {
    pub jpeg: Vec<u8>,
    pub timestamp_ms: u64,
}

/// Compress a raw camera frame into a JPEG still.
pub fn compress_frame(frame: &CameraFrame, quality: u8) -> Result<VideoFrame> {
    let mut jpeg = Vec::new();
    let mut encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut jpeg, quality);
    encoder
        .encode(
            &frame.rgb,
            frame.width,
            frame.height,
            image::ColorType::Rgb8,
        )
        .context("JPEG encoding failed")?;

    Ok(VideoFrame {
        jpeg,
        timestamp_ms: frame.timestamp_ms,
    })
}

/// Forward capture audio to the session and the recording mix.
///
/// Chunks always feed the recording tap; they go out on the wire only while
/// the session is Connecting or Connected and the mic toggle is on. The task
/// ends when the capture stream closes (device released).
pub fn spawn_audio_pump(
    ctx: Arc<SessionContext>,
    mut audio_rx: mpsc::Receiver<AudioChunk>,
    handle: Arc<dyn SessionHandle>,
    mix_tx: Option<mpsc::Sender<MixFrame>>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        debug!("Audio pump started");

        while let Some(chunk) = audio_rx.recv().await {
            if let Some(tx) = &mix_tx {
                let frame = MixFrame::microphone(chunk.samples.clone(), chunk.timestamp_ms);
                if tx.send(frame).await.is_err() {
                    debug!("Recording tap closed");
                }
            }

            if !ctx.mic_enabled() {
                continue;
            }

            match ctx.status() {
                SessionStatus::Connecting | SessionStatus::Connected => {
                    handle.send(MediaChunk::audio_pcm(&chunk.samples)).await;
                }
                _ => {}
            }
        }

        debug!("Audio pump stopped");
    })
}

/// Sample the latest camera frame at a fixed cadence and send it as a JPEG
/// still. Superseded frames are dropped by the latest-frame slot itself.
pub fn spawn_video_sampler(
    ctx: Arc<SessionContext>,
    frames: watch::Receiver<Option<CameraFrame>>,
    handle: Arc<dyn SessionHandle>,
    video: crate::config::VideoConfig,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        debug!("Video sampler started ({}ms)", video.sample_interval_ms);

        let mut interval =
            tokio::time::interval(std::time::Duration::from_millis(video.sample_interval_ms));
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            interval.tick().await;

            if !ctx.video_enabled() {
                continue;
            }
            if ctx.status() != SessionStatus::Connected {
                continue;
            }

            let frame = frames.borrow().clone();
            let Some(frame) = frame else {
                continue;
            };

            match compress_frame(&frame, video.jpeg_quality) {
                Ok(still) => handle.send(MediaChunk::jpeg_frame(&still.jpeg)).await,
                Err(e) => warn!("Dropping frame: {}", e),
            }
        }
    })
}
