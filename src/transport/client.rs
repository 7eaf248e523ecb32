//! WebSocket client for the realtime engine
//!
//! Owns the connection lifecycle for one session: setup message on open, a
//! reader task mapping server JSON to [`LiveEvent`]s, and a writer task
//! draining the outbound channel. Transport failures surface exactly once as
//! `LiveEvent::Error`; there is no automatic reconnect.

use super::protocol::{
    ClientContentMessage, Content, EmptyOptions, GenerationConfig, MediaChunk,
    PrebuiltVoiceConfig, ServerMessage, SessionSetup, SetupMessage, SpeechConfig, VoiceConfig,
};
use super::{LiveEvent, OpenConfig, SessionHandle, SessionTransport, TranscriptEvent, TranscriptSource};
use crate::error::SessionError;
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};

/// Timeout for the initial WebSocket handshake
const CONNECTION_TIMEOUT: Duration = Duration::from_secs(10);

/// Opens sessions against a Gemini-Live-style bidirectional endpoint
pub struct GeminiLiveClient {
    endpoint: String,
    api_key: String,
}

impl GeminiLiveClient {
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_key: api_key.into(),
        }
    }

    fn setup_message(open: &OpenConfig) -> SetupMessage {
        SetupMessage {
            setup: SessionSetup {
                model: open.model.clone(),
                generation_config: GenerationConfig {
                    response_modalities: vec!["AUDIO".to_string()],
                    speech_config: SpeechConfig {
                        voice_config: VoiceConfig {
                            prebuilt_voice_config: PrebuiltVoiceConfig {
                                voice_name: open.voice.clone(),
                            },
                        },
                    },
                },
                system_instruction: Content::text(&open.system_instruction),
                output_audio_transcription: EmptyOptions {},
            },
        }
    }
}

/// Commands consumed by the writer task
enum Outbound {
    Media(MediaChunk),
    GoalUpdate(String),
    Close,
}

#[async_trait::async_trait]
impl SessionTransport for GeminiLiveClient {
    async fn connect(
        &self,
        open: OpenConfig,
    ) -> Result<(Box<dyn SessionHandle>, mpsc::Receiver<LiveEvent>), SessionError> {
        let url = format!("{}?key={}", self.endpoint, self.api_key);

        info!("Connecting to realtime engine ({})", open.model);

        let (ws, _response) = timeout(CONNECTION_TIMEOUT, connect_async(url))
            .await
            .map_err(|_| SessionError::Transport("connection timeout".to_string()))?
            .map_err(|e| SessionError::Transport(e.to_string()))?;

        let (mut write, mut read) = ws.split();

        // Configure the session before any media flows
        let setup = serde_json::to_string(&Self::setup_message(&open))
            .map_err(|e| SessionError::Transport(e.to_string()))?;
        write
            .send(Message::Text(setup.into()))
            .await
            .map_err(|e| SessionError::Transport(e.to_string()))?;

        let (events_tx, events_rx) = mpsc::channel(64);
        let (outbound_tx, mut outbound_rx) = mpsc::channel::<Outbound>(64);

        // Writer: drains the outbound channel onto the socket
        tokio::spawn(async move {
            while let Some(cmd) = outbound_rx.recv().await {
                let result = match cmd {
                    Outbound::Media(chunk) => {
                        match serde_json::to_string(&chunk.into_message()) {
                            Ok(json) => write.send(Message::Text(json.into())).await,
                            Err(e) => {
                                warn!("Failed to serialize media chunk: {}", e);
                                continue;
                            }
                        }
                    }
                    Outbound::GoalUpdate(goal) => {
                        match serde_json::to_string(&ClientContentMessage::goal_update(&goal)) {
                            Ok(json) => write.send(Message::Text(json.into())).await,
                            Err(e) => {
                                warn!("Failed to serialize goal update: {}", e);
                                continue;
                            }
                        }
                    }
                    Outbound::Close => {
                        let _ = write.send(Message::Close(None)).await;
                        break;
                    }
                };

                if let Err(e) = result {
                    debug!("Outbound send failed, socket likely closed: {}", e);
                    break;
                }
            }
        });

        // Reader: maps server messages to typed events
        tokio::spawn(async move {
            while let Some(msg) = read.next().await {
                match msg {
                    Ok(Message::Text(text)) => {
                        dispatch_server_message(text.as_bytes(), &events_tx).await;
                    }
                    Ok(Message::Binary(bytes)) => {
                        dispatch_server_message(&bytes, &events_tx).await;
                    }
                    Ok(Message::Close(_)) => break,
                    Ok(_) => {}
                    Err(e) => {
                        let _ = events_tx.send(LiveEvent::Error(e.to_string())).await;
                        return;
                    }
                }
            }
            let _ = events_tx.send(LiveEvent::Closed).await;
        });

        Ok((Box::new(GeminiSessionHandle { outbound_tx }), events_rx))
    }
}

async fn dispatch_server_message(payload: &[u8], events: &mpsc::Sender<LiveEvent>) {
    let message: ServerMessage = match serde_json::from_slice(payload) {
        Ok(m) => m,
        Err(e) => {
            warn!("Unparseable server message: {}", e);
            return;
        }
    };

    if message.setup_complete.is_some() {
        info!("Realtime session open");
        let _ = events.send(LiveEvent::Opened).await;
    }

    // One message may carry both audio and a transcript fragment
    if let Some(audio) = message.audio_payload() {
        let _ = events.send(LiveEvent::Audio(audio)).await;
    }

    if let Some(transcription) = message.transcript_text() {
        let _ = events
            .send(LiveEvent::Transcript(TranscriptEvent {
                source: TranscriptSource::Engine,
                text: transcription.text.clone(),
                is_final: transcription.finished,
            }))
            .await;
    }
}

struct GeminiSessionHandle {
    outbound_tx: mpsc::Sender<Outbound>,
}

#[async_trait::async_trait]
impl SessionHandle for GeminiSessionHandle {
    async fn send(&self, chunk: MediaChunk) {
        // Stray sends after close must not raise
        if self.outbound_tx.send(Outbound::Media(chunk)).await.is_err() {
            debug!("Dropped media chunk: session closed");
        }
    }

    async fn set_goal(&self, goal: &str) {
        if self
            .outbound_tx
            .send(Outbound::GoalUpdate(goal.to_string()))
            .await
            .is_err()
        {
            debug!("Dropped goal update: session closed");
        }
    }

    async fn disconnect(&self) {
        let _ = self.outbound_tx.send(Outbound::Close).await;
    }
}
