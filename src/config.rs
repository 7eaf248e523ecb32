use anyhow::Result;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub service: ServiceConfig,
    pub engine: EngineConfig,
    pub audio: AudioConfig,
    pub video: VideoConfig,
    pub recording: RecordingConfig,
    pub session: SessionTuning,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Model identifier sent in the session setup message
    pub model: String,
    /// WebSocket endpoint of the realtime engine
    pub endpoint: String,
    /// Prebuilt synthesized voice name
    pub voice: String,
    /// Environment variable holding the API key
    pub api_key_env: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Outbound microphone sample rate (the engine expects 16kHz PCM)
    pub input_sample_rate: u32,
    /// Inbound synthesized audio sample rate
    pub output_sample_rate: u32,
    pub channels: u16,
    /// Capture callback cadence in milliseconds
    pub chunk_duration_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct VideoConfig {
    pub width: u32,
    pub height: u32,
    pub frame_rate: u32,
    /// JPEG quality for outbound stills (0-100)
    pub jpeg_quality: u8,
    /// Interval between outbound frame samples
    pub sample_interval_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RecordingConfig {
    pub output_dir: String,
    /// Recordings shorter than this are discarded
    pub min_duration_secs: f64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionTuning {
    /// Delay between teardown and re-acquisition on a camera switch
    pub settle_delay_ms: u64,
    pub default_goal: String,
    /// Rolling caption buffer size in characters
    pub caption_limit: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: "aura-guide".to_string(),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            model: "gemini-2.5-flash-native-audio-preview-09-2025".to_string(),
            endpoint: "wss://generativelanguage.googleapis.com/ws/google.ai.generativelanguage.v1beta.GenerativeService.BidiGenerateContent".to_string(),
            voice: "Kore".to_string(),
            api_key_env: "AURA_API_KEY".to_string(),
        }
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            input_sample_rate: 16000,
            output_sample_rate: 24000,
            channels: 1,
            chunk_duration_ms: 100,
        }
    }
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
            frame_rate: 15,
            jpeg_quality: 50,
            sample_interval_ms: 1000,
        }
    }
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            output_dir: "recordings".to_string(),
            min_duration_secs: 2.0,
        }
    }
}

impl Default for SessionTuning {
    fn default() -> Self {
        Self {
            settle_delay_ms: 500,
            default_goal: "Navigate safely".to_string(),
            caption_limit: 150,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service: ServiceConfig::default(),
            engine: EngineConfig::default(),
            audio: AudioConfig::default(),
            video: VideoConfig::default(),
            recording: RecordingConfig::default(),
            session: SessionTuning::default(),
        }
    }
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}
