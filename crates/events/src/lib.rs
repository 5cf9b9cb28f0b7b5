//! Shared event contracts for the dialogue pipeline.
//!
//! This crate defines the DTOs for notifications that flow out of the turn
//! machine, the orchestrator and the speech streamer. Using shared types
//! prevents mismatched field names between producers and subscribers.
//!
//! Also provides the `EventBus` trait for decoupled event emission.

mod bus;

pub use bus::{
    publish, BroadcastEventBus, EmittedEvent, EventBus, EventBusRef, FanoutEventBus,
    InMemoryEventBus, NullEventBus, TracingEventBus,
};

use base64::Engine as _;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A payload type bound to one topic.
pub trait TopicEvent: Serialize + DeserializeOwned {
    const TOPIC: &'static str;
}

/// Listening state of the turn machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnState {
    /// Nobody is talking; the assistant holds the floor (or nobody does).
    #[default]
    Idle,
    /// Speech is arriving and being transcribed incrementally.
    Online,
    /// The utterance paused and has been finalized; waiting to see if the
    /// user resumes before going idle.
    Offline,
}

impl TurnState {
    /// True while the user holds the floor.
    pub fn is_listening(self) -> bool {
        self != TurnState::Idle
    }
}

impl std::fmt::Display for TurnState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            TurnState::Idle => "idle",
            TurnState::Online => "online",
            TurnState::Offline => "offline",
        };
        f.write_str(name)
    }
}

/// How a dialogue turn ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Answer and speech ran to the end.
    Completed,
    /// The user barged in (or the assistant shut down).
    Interrupted,
    /// Answer generation or synthesis failed.
    Failed,
}

/// Incremental transcription produced for one chunk.
///
/// Producers: turn machine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartialTranscriptEvent {
    pub text: String,
}

/// Finalize pass result for one utterance segment.
///
/// Producers: turn machine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinalTranscriptEvent {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

/// The transcript was handed to the orchestrator and cleared.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TranscriptResetEvent {}

/// The turn machine changed state.
///
/// Producers: turn machine
/// Consumers: frontend (mute playback while the user talks)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListeningChangedEvent {
    pub state: TurnState,
    pub listening: bool,
}

/// Silent chunks left before the machine returns to idle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdleCountdownEvent {
    pub remaining: u32,
    pub threshold: u32,
}

/// A dialogue turn started for a user utterance.
///
/// Producers: orchestrator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnStartedEvent {
    pub turn_id: Uuid,
    pub transcript: String,
}

/// One token of the streamed answer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenEvent {
    pub turn_id: Uuid,
    pub text: String,
}

/// A dialogue turn resolved. Emitted exactly once per turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnStoppedEvent {
    pub turn_id: Uuid,
    pub reason: StopReason,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// One synthesized audio frame ready for playback.
///
/// Samples are 16-bit little-endian PCM, base64 encoded.
///
/// Producers: speech streamer
/// Consumers: frontend playback
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioChunkEvent {
    pub turn_id: Uuid,
    pub sample_rate: u32,
    pub samples: String,
}

impl AudioChunkEvent {
    pub fn from_samples(turn_id: Uuid, sample_rate: u32, samples: &[f32]) -> Self {
        let mut bytes = Vec::with_capacity(samples.len() * 2);
        for &sample in samples {
            let pcm = (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
            bytes.extend_from_slice(&pcm.to_le_bytes());
        }
        Self {
            turn_id,
            sample_rate,
            samples: base64::engine::general_purpose::STANDARD.encode(bytes),
        }
    }

    /// Decode the payload back into PCM16 samples.
    pub fn pcm16(&self) -> Option<Vec<i16>> {
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(&self.samples)
            .ok()?;
        Some(
            bytes
                .chunks_exact(2)
                .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
                .collect(),
        )
    }
}

/// Every queued synthesis unit of a turn has been emitted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllSpeechSentEvent {
    pub turn_id: Uuid,
}

/// Event names as constants to prevent typos.
pub mod event_names {
    pub const PARTIAL_TRANSCRIPT: &str = "stt:partial_transcript";
    pub const FINAL_TRANSCRIPT: &str = "stt:final_transcript";
    pub const TRANSCRIPT_RESET: &str = "stt:transcript_reset";
    pub const LISTENING_CHANGED: &str = "turn:listening_changed";
    pub const IDLE_COUNTDOWN: &str = "turn:idle_countdown";
    pub const TURN_STARTED: &str = "dialogue:turn_started";
    pub const TOKEN: &str = "dialogue:token";
    pub const TURN_STOPPED: &str = "dialogue:turn_stopped";
    pub const AUDIO_CHUNK: &str = "tts:audio_chunk";
    pub const ALL_SPEECH_SENT: &str = "tts:all_speech_sent";
}

macro_rules! topic {
    ($($ty:ty => $name:ident),* $(,)?) => {
        $(impl TopicEvent for $ty {
            const TOPIC: &'static str = event_names::$name;
        })*
    };
}

topic! {
    PartialTranscriptEvent => PARTIAL_TRANSCRIPT,
    FinalTranscriptEvent => FINAL_TRANSCRIPT,
    TranscriptResetEvent => TRANSCRIPT_RESET,
    ListeningChangedEvent => LISTENING_CHANGED,
    IdleCountdownEvent => IDLE_COUNTDOWN,
    TurnStartedEvent => TURN_STARTED,
    TokenEvent => TOKEN,
    TurnStoppedEvent => TURN_STOPPED,
    AudioChunkEvent => AUDIO_CHUNK,
    AllSpeechSentEvent => ALL_SPEECH_SENT,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_turn_state_serialization() {
        let json = serde_json::to_string(&ListeningChangedEvent {
            state: TurnState::Online,
            listening: true,
        })
        .unwrap();
        assert_eq!(json, r#"{"state":"online","listening":true}"#);
    }

    #[test]
    fn test_turn_state_listening() {
        assert!(!TurnState::Idle.is_listening());
        assert!(TurnState::Online.is_listening());
        assert!(TurnState::Offline.is_listening());
        assert_eq!(TurnState::default(), TurnState::Idle);
    }

    #[test]
    fn test_turn_stopped_omits_missing_error() {
        let event = TurnStoppedEvent {
            turn_id: Uuid::nil(),
            reason: StopReason::Interrupted,
            error: None,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["reason"], "interrupted");
        assert!(json.get("error").is_none());
    }

    #[test]
    fn test_final_transcript_deserialize_minimal() {
        let json = r#"{"text": "hello"}"#;
        let event: FinalTranscriptEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.text, "hello");
        assert_eq!(event.language, None);
    }

    #[test]
    fn test_audio_chunk_pcm16() {
        let event = AudioChunkEvent::from_samples(Uuid::nil(), 24000, &[0.0, 1.0, -1.0, 2.0]);
        assert_eq!(event.sample_rate, 24000);
        assert_eq!(event.pcm16().unwrap(), vec![0, i16::MAX, -i16::MAX, i16::MAX]);
    }
}
