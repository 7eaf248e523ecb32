//! Realtime engine wire protocol
//!
//! JSON message types for the bidirectional generate-content session.
//!
//! # Protocol Overview
//!
//! 1. Connect to the WebSocket endpoint (API key as query parameter)
//! 2. Send a `setup` message (model, response modality, system instruction,
//!    voice, output transcription enabled)
//! 3. Receive `setupComplete`
//! 4. Stream media via `realtimeInput` envelopes (`audio/pcm;rate=16000`
//!    chunks and `image/jpeg` stills)
//! 5. Receive `serverContent` messages carrying synthesized audio parts
//!    and/or transcript fragments

use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};

pub const AUDIO_PCM_MIME: &str = "audio/pcm;rate=16000";
pub const IMAGE_JPEG_MIME: &str = "image/jpeg";

/// System instruction sent on session open. `{{USER_GOAL}}` is replaced with
/// the active navigation goal.
pub const SYSTEM_INSTRUCTION_TEMPLATE: &str = "\
You are Aura, an intelligent spatial guide for visually impaired users.
Your input is a continuous video and audio stream.
The user's initial goal is: \"{{USER_GOAL}}\".

CORE DIRECTIVES:
1. BE PROACTIVE: Do not just list objects. Explain obstacles, paths, and dynamics relevant to the goal.
2. SAFETY FIRST: Immediately warn of hazards (steps, traffic, head-height obstacles) with a \"STOP\" command if necessary.
3. CLOCK DIRECTIONS: Use \"Object at 2 o'clock\" for precision.
4. LISTEN FOR GOALS: The user may verbally change their goal (e.g. \"Aura, help me find a seat\"). Adapt immediately if they do.
5. CONCISE: Speak clearly, calmly, and briefly.

REASONING FRAMEWORK:
- Scan for clear paths.
- Analyze movement (is that person walking towards us?).
- Read text only if relevant to navigation or the goal.

If the user is silent, provide a pulse check on the environment every few seconds.
";

// ============================================================================
// Client Messages (sent TO the engine)
// ============================================================================

/// First message on a fresh connection
#[derive(Debug, Clone, Serialize)]
pub struct SetupMessage {
    pub setup: SessionSetup,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSetup {
    pub model: String,
    pub generation_config: GenerationConfig,
    pub system_instruction: Content,
    /// Passing an empty object enables output transcription
    pub output_audio_transcription: EmptyOptions,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub response_modalities: Vec<String>,
    pub speech_config: SpeechConfig,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeechConfig {
    pub voice_config: VoiceConfig,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceConfig {
    pub prebuilt_voice_config: PrebuiltVoiceConfig,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrebuiltVoiceConfig {
    pub voice_name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EmptyOptions {}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<Part>,
}

impl Content {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            role: None,
            parts: vec![Part {
                text: Some(text.into()),
                inline_data: None,
            }],
        }
    }

    pub fn user_text(text: impl Into<String>) -> Self {
        let mut content = Self::text(text);
        content.role = Some("user".to_string());
        content
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inline_data: Option<InlineData>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    pub mime_type: String,
    pub data: String,
}

/// Outbound media envelope
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RealtimeInputMessage {
    pub realtime_input: RealtimeInput,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RealtimeInput {
    pub media_chunks: Vec<MediaChunk>,
}

/// One encoded media payload with its MIME tag
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MediaChunk {
    pub mime_type: String,
    pub data: String,
}

impl MediaChunk {
    /// Frame raw 16-bit PCM samples as a transportable audio chunk
    pub fn audio_pcm(samples: &[i16]) -> Self {
        let bytes: Vec<u8> = samples.iter().flat_map(|&s| s.to_le_bytes()).collect();
        Self {
            mime_type: AUDIO_PCM_MIME.to_string(),
            data: STANDARD.encode(&bytes),
        }
    }

    /// Frame a compressed JPEG still
    pub fn jpeg_frame(jpeg: &[u8]) -> Self {
        Self {
            mime_type: IMAGE_JPEG_MIME.to_string(),
            data: STANDARD.encode(jpeg),
        }
    }

    pub fn into_message(self) -> RealtimeInputMessage {
        RealtimeInputMessage {
            realtime_input: RealtimeInput {
                media_chunks: vec![self],
            },
        }
    }
}

/// Mid-session text turn (goal updates)
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientContentMessage {
    pub client_content: ClientContent,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientContent {
    pub turns: Vec<Content>,
    pub turn_complete: bool,
}

impl ClientContentMessage {
    pub fn goal_update(goal: &str) -> Self {
        Self {
            client_content: ClientContent {
                turns: vec![Content::user_text(format!(
                    "My navigation goal is now: \"{}\". Adapt your guidance.",
                    goal
                ))],
                turn_complete: true,
            },
        }
    }
}

// ============================================================================
// Server Messages (received FROM the engine)
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerMessage {
    pub setup_complete: Option<EmptyOptions>,
    pub server_content: Option<ServerContent>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerContent {
    pub model_turn: Option<Content>,
    pub output_transcription: Option<Transcription>,
    #[serde(default)]
    pub turn_complete: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Transcription {
    pub text: String,
    #[serde(default)]
    pub finished: bool,
}

impl ServerMessage {
    /// Extract the synthesized audio payload, if any
    pub fn audio_payload(&self) -> Option<Vec<u8>> {
        let part = self
            .server_content
            .as_ref()?
            .model_turn
            .as_ref()?
            .parts
            .first()?;
        let inline = part.inline_data.as_ref()?;
        STANDARD.decode(&inline.data).ok()
    }

    pub fn transcript_text(&self) -> Option<&Transcription> {
        self.server_content.as_ref()?.output_transcription.as_ref()
    }
}
