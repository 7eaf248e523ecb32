// Integration tests for session recording
//
// These verify the artifact duration threshold and that the finalized
// WAV file is well-formed and readable.

use anyhow::Result;
use aura_guide::config::RecordingConfig;
use aura_guide::recorder::{MixFrame, SessionRecorder};
use std::fs;
use tempfile::TempDir;

fn recording_config(dir: &TempDir) -> RecordingConfig {
    RecordingConfig {
        output_dir: dir.path().display().to_string(),
        min_duration_secs: 2.0,
    }
}

fn wav_files(dir: &TempDir) -> Vec<std::path::PathBuf> {
    fs::read_dir(dir.path())
        .expect("read dir")
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.extension().is_some_and(|ext| ext == "wav"))
        .collect()
}

#[tokio::test]
async fn test_short_recording_discarded() -> Result<()> {
    let tmp = TempDir::new()?;
    let recorder = SessionRecorder::new(&recording_config(&tmp), 16000);

    let recording = recorder.start("reach the lobby")?;
    let tx = recording.mix_sender();

    // 15 * 100ms of microphone audio = 1.5s, below the 2s minimum
    for i in 0..15u64 {
        tx.send(MixFrame::microphone(vec![0i16; 1600], i * 100))
            .await?;
    }

    assert!(recording.stop().await.is_none());
    assert!(wav_files(&tmp).is_empty(), "short recording left a file");
    Ok(())
}

#[tokio::test]
async fn test_recording_meets_threshold() -> Result<()> {
    let tmp = TempDir::new()?;
    let recorder = SessionRecorder::new(&recording_config(&tmp), 16000);

    let recording = recorder.start("cross the street")?;
    let tx = recording.mix_sender();

    // 25 * 100ms = 2.5s
    for i in 0..25u64 {
        tx.send(MixFrame::microphone(vec![100i16; 1600], i * 100))
            .await?;
    }

    let artifact = recording.stop().await.expect("artifact kept");
    assert!((artifact.duration_secs - 2.5).abs() < 1e-9);
    assert_eq!(artifact.goal, "cross the street");
    assert!(artifact.media_path.exists());

    let reader = hound::WavReader::open(&artifact.media_path)?;
    let spec = reader.spec();
    assert_eq!(spec.sample_rate, 16000);
    assert_eq!(spec.channels, 1);
    assert_eq!(spec.bits_per_sample, 16);
    assert_eq!(reader.len(), 40000);
    Ok(())
}

#[tokio::test]
async fn test_guidance_only_recording_kept() -> Result<()> {
    let tmp = TempDir::new()?;
    let recorder = SessionRecorder::new(&recording_config(&tmp), 16000);

    let recording = recorder.start("narrated walk")?;
    let tx = recording.mix_sender();

    for i in 0..25u64 {
        tx.send(MixFrame::guidance(vec![50i16; 1600], i * 100))
            .await?;
    }

    let artifact = recording.stop().await.expect("artifact kept");
    assert!((artifact.duration_secs - 2.5).abs() < 1e-9);
    Ok(())
}

#[tokio::test]
async fn test_overlapping_guidance_keeps_wall_clock_duration() -> Result<()> {
    let tmp = TempDir::new()?;
    let recorder = SessionRecorder::new(&recording_config(&tmp), 16000);

    let recording = recorder.start("guided crossing")?;
    let tx = recording.mix_sender();

    // 2.5s of microphone audio plus a 1s guidance segment heard at the
    // 500ms mark; the guidance overlaps mic frames and must not stretch
    // the recorded timeline
    for i in 0..25u64 {
        tx.send(MixFrame::microphone(vec![100i16; 1600], i * 100))
            .await?;
        if i == 5 {
            tx.send(MixFrame::guidance(vec![50i16; 16000], 500)).await?;
        }
    }

    let artifact = recording.stop().await.expect("artifact kept");
    assert!((artifact.duration_secs - 2.5).abs() < 1e-9);

    let mut reader = hound::WavReader::open(&artifact.media_path)?;
    assert_eq!(reader.len(), 40000);

    // Mic alone before the guidance, summed while it plays
    let samples: Vec<i16> = reader.samples::<i16>().collect::<Result<_, _>>()?;
    assert_eq!(samples[0], 100);
    assert_eq!(samples[16000], 150);
    assert_eq!(samples[30000], 100);
    Ok(())
}

#[tokio::test]
async fn test_mic_and_guidance_share_one_track() -> Result<()> {
    let tmp = TempDir::new()?;
    let recorder = SessionRecorder::new(&recording_config(&tmp), 16000);

    let recording = recorder.start("mixed")?;
    let tx = recording.mix_sender();

    // Paired frames at the same timestamps mix into a single stream
    for i in 0..25u64 {
        tx.send(MixFrame::microphone(vec![100i16; 1600], i * 100))
            .await?;
        tx.send(MixFrame::guidance(vec![50i16; 1600], i * 100))
            .await?;
    }

    let artifact = recording.stop().await.expect("artifact kept");

    let mut reader = hound::WavReader::open(&artifact.media_path)?;
    assert_eq!(reader.len(), 40000);

    let first: i16 = reader.samples::<i16>().next().expect("has samples")?;
    assert_eq!(first, 150);
    Ok(())
}
