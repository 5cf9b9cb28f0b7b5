use std::sync::Arc;

use parley_bus::AudioChunk;
use parley_events::{
    publish, EventBusRef, FinalTranscriptEvent, IdleCountdownEvent, ListeningChangedEvent,
    PartialTranscriptEvent, TranscriptResetEvent,
};
use parley_speaker::SpeakerGate;
use parley_stt::{FinalTranscriber, StreamingTranscriber};
use parley_vad::VoiceActivityDetector;
use tokio::sync::watch;

use crate::{ListeningSnapshot, ListeningWatch, Result, Transcript, TurnConfig, TurnState};

/// Consecutive-chunk counters compared against the configured thresholds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HysteresisCounters {
    pub ending: u32,
    pub idle: u32,
}

impl HysteresisCounters {
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// A finished user turn, handed to the dialogue orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Utterance {
    pub text: String,
    /// Activation count at dispatch time. Any later activation means the
    /// user started speaking again.
    pub activations: u64,
}

/// Single-writer turn-taking state machine.
///
/// Owned by the chunk consumer; everyone else observes it through
/// [`ListeningWatch`] and the event bus.
pub struct TurnMachine {
    config: TurnConfig,
    state: TurnState,
    counters: HysteresisCounters,
    accumulated: Vec<Arc<[f32]>>,
    transcript: Transcript,
    activations: u64,
    vad: Box<dyn VoiceActivityDetector>,
    gate: SpeakerGate,
    online: Box<dyn StreamingTranscriber>,
    offline: Box<dyn FinalTranscriber>,
    events: EventBusRef,
    listening: watch::Sender<ListeningSnapshot>,
}

impl TurnMachine {
    pub fn new(
        config: TurnConfig,
        vad: Box<dyn VoiceActivityDetector>,
        gate: SpeakerGate,
        online: Box<dyn StreamingTranscriber>,
        offline: Box<dyn FinalTranscriber>,
        events: EventBusRef,
    ) -> Result<Self> {
        config.validate()?;
        let (listening, _) = watch::channel(ListeningSnapshot::default());
        Ok(Self {
            config,
            state: TurnState::Idle,
            counters: HysteresisCounters::default(),
            accumulated: Vec::new(),
            transcript: Transcript::new(),
            activations: 0,
            vad,
            gate,
            online,
            offline,
            events,
            listening,
        })
    }

    pub fn subscribe(&self) -> ListeningWatch {
        ListeningWatch::new(self.listening.subscribe())
    }

    pub fn config(&self) -> &TurnConfig {
        &self.config
    }

    pub fn state(&self) -> TurnState {
        self.state
    }

    pub fn counters(&self) -> HysteresisCounters {
        self.counters
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn accumulated_chunks(&self) -> usize {
        self.accumulated.len()
    }

    pub fn activations(&self) -> u64 {
        self.activations
    }

    pub fn speaker_gate(&self) -> &SpeakerGate {
        &self.gate
    }

    /// Process one chunk and return the finished utterance, if this chunk
    /// completed one.
    ///
    /// Model failures are logged and the chunk's effect is dropped.
    #[tracing::instrument(level = "trace", skip(self, chunk), fields(chunk_seq = chunk.seq))]
    pub async fn handle_chunk(&mut self, chunk: &AudioChunk) -> Option<Utterance> {
        if let Err(e) = self.process_chunk(chunk).await {
            if e.is_model_inference() {
                tracing::warn!(seq = chunk.seq, error = %e, "Dropping chunk after model failure");
            } else {
                tracing::error!(seq = chunk.seq, error = %e, "Chunk processing failed");
            }
        }

        publish(
            self.events.as_ref(),
            &IdleCountdownEvent {
                remaining: self.config.idle_threshold.saturating_sub(self.counters.idle),
                threshold: self.config.idle_threshold,
            },
        );

        self.take_utterance()
    }

    /// Run the online, offline and idle checks for one chunk, in that order.
    ///
    /// A failed VAD, verification or incremental pass drops the chunk with no
    /// transition. A failed finalize pass keeps its counter increments, so it
    /// is retried on the next silent chunk, and the idle check still runs.
    /// When the pass was forced by the accumulation cap, the buffered audio is
    /// discarded instead. Audio still unfinalized on entering IDLE is dropped.
    pub async fn process_chunk(&mut self, chunk: &AudioChunk) -> Result<()> {
        let speech_present = self.speech_present(&chunk.samples).await?;

        // Online
        if speech_present {
            let text = self.online.transcribe_chunk(&chunk.samples).await?;
            self.accumulated.push(Arc::clone(&chunk.samples));
            if !text.is_empty() {
                self.transcript.push_pending(&text);
                publish(self.events.as_ref(), &PartialTranscriptEvent { text });
            }
            self.transition(TurnState::Online);
        }

        // Offline
        let buffer_full = self.accumulated.len() >= self.config.accumulated_speech_threshold;
        let mut finalized = Ok(());
        if (self.state == TurnState::Online && !speech_present) || buffer_full {
            self.counters.ending += 1;
            if self.counters.ending >= self.config.ending_threshold || buffer_full {
                finalized = self.finalize().await;
                if finalized.is_err() && buffer_full {
                    self.discard_accumulated("finalize failed at the accumulation cap");
                }
            }
        }

        // Idle
        if self.state != TurnState::Idle && !speech_present {
            self.counters.idle += 1;
            if self.counters.idle >= self.config.idle_threshold {
                if !self.accumulated.is_empty() {
                    self.discard_accumulated("utterance never finalized");
                }
                self.transition(TurnState::Idle);
            }
        }

        finalized
    }

    /// Hand over the transcript if the user has yielded the floor.
    ///
    /// Reads and clears the transcript in one step; a blank transcript
    /// starts no turn.
    pub fn take_utterance(&mut self) -> Option<Utterance> {
        if self.state != TurnState::Idle {
            return None;
        }
        let text = self.transcript.take()?;
        publish(self.events.as_ref(), &TranscriptResetEvent {});
        tracing::info!(chars = text.len(), activations = self.activations, "User turn complete");
        Some(Utterance {
            text,
            activations: self.activations,
        })
    }

    /// Clear the transcript without dispatching it.
    pub fn reset_transcript(&mut self) {
        self.transcript.reset();
        publish(self.events.as_ref(), &TranscriptResetEvent {});
    }

    async fn speech_present(&mut self, samples: &[f32]) -> Result<bool> {
        if !self.vad.detect(samples)? {
            return Ok(false);
        }
        Ok(self.gate.verify(samples).await?)
    }

    async fn finalize(&mut self) -> Result<()> {
        if self.accumulated.is_empty() {
            return Ok(());
        }
        let utterance: Vec<f32> = self
            .accumulated
            .iter()
            .flat_map(|chunk| chunk.iter().copied())
            .collect();

        let result = self.offline.transcribe(&utterance).await?;
        tracing::debug!(
            chunks = self.accumulated.len(),
            chars = result.text.len(),
            language = ?result.language,
            "Finalized utterance"
        );

        self.gate.set_initial_reference(utterance);
        if let Some(language) = result.language.as_deref() {
            self.online.set_language(language);
        }

        self.transcript.commit(&result.text);
        publish(
            self.events.as_ref(),
            &FinalTranscriptEvent {
                text: result.text,
                language: result.language,
            },
        );

        self.accumulated.clear();
        self.online.reset_cache();
        self.transition(TurnState::Offline);
        Ok(())
    }

    fn discard_accumulated(&mut self, reason: &'static str) {
        tracing::warn!(chunks = self.accumulated.len(), reason, "Discarding unfinalized audio");
        self.accumulated.clear();
        self.online.reset_cache();
    }

    /// Enter `next`, resetting both counters. Re-entering the current state
    /// only resets the counters.
    fn transition(&mut self, next: TurnState) {
        let previous = self.state;
        self.state = next;
        self.counters.reset();
        if previous == next {
            return;
        }
        if previous == TurnState::Idle {
            self.activations += 1;
        }

        tracing::debug!(from = %previous, to = %next, activations = self.activations, "Turn state changed");
        self.listening.send_replace(ListeningSnapshot {
            state: next,
            activations: self.activations,
        });
        publish(
            self.events.as_ref(),
            &ListeningChangedEvent {
                state: next,
                listening: next.is_listening(),
            },
        );
    }
}
