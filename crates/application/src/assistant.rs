use std::sync::Arc;

use parley_bus::{AudioBus, AudioBusReceiver, AudioBusSender};
use parley_events::{EventBusRef, NullEventBus};
use parley_llm::{AnswerGenerator, ConversationHistory};
use parley_speaker::{SpeakerGate, SpeakerVerifier};
use parley_stt::{FinalTranscriber, StreamingTranscriber};
use parley_tts::{AudioSink, NullSink, SpeechSynthesizer, TtsStreamer};
use parley_turn::{ListeningWatch, TurnMachine, TurnState, Utterance};
use parley_vad::{EnergyVad, VoiceActivityDetector};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::{AssistantConfig, AssistantError, ConfigError, DialogueOrchestrator};

/// Collects the collaborators of a [`VoiceAssistant`].
///
/// Transcribers, the answer generator and the speech synthesizer are
/// required. The VAD defaults to [`EnergyVad`], the sink to [`NullSink`] and
/// the event bus to [`NullEventBus`].
pub struct VoiceAssistantBuilder {
    config: AssistantConfig,
    vad: Option<Box<dyn VoiceActivityDetector>>,
    speaker_verifier: Option<Arc<dyn SpeakerVerifier>>,
    streaming_transcriber: Option<Box<dyn StreamingTranscriber>>,
    final_transcriber: Option<Box<dyn FinalTranscriber>>,
    answer_generator: Option<Arc<dyn AnswerGenerator>>,
    speech_synthesizer: Option<Arc<dyn SpeechSynthesizer>>,
    audio_sink: Arc<dyn AudioSink>,
    events: EventBusRef,
}

impl VoiceAssistantBuilder {
    pub fn new(config: AssistantConfig) -> Self {
        Self {
            config,
            vad: None,
            speaker_verifier: None,
            streaming_transcriber: None,
            final_transcriber: None,
            answer_generator: None,
            speech_synthesizer: None,
            audio_sink: Arc::new(NullSink),
            events: Arc::new(NullEventBus),
        }
    }

    pub fn vad(mut self, vad: impl VoiceActivityDetector + 'static) -> Self {
        self.vad = Some(Box::new(vad));
        self
    }

    /// Only consulted when `speaker.enabled` is set.
    pub fn speaker_verifier(mut self, verifier: Arc<dyn SpeakerVerifier>) -> Self {
        self.speaker_verifier = Some(verifier);
        self
    }

    pub fn streaming_transcriber(
        mut self,
        transcriber: impl StreamingTranscriber + 'static,
    ) -> Self {
        self.streaming_transcriber = Some(Box::new(transcriber));
        self
    }

    pub fn final_transcriber(mut self, transcriber: impl FinalTranscriber + 'static) -> Self {
        self.final_transcriber = Some(Box::new(transcriber));
        self
    }

    pub fn answer_generator(mut self, generator: Arc<dyn AnswerGenerator>) -> Self {
        self.answer_generator = Some(generator);
        self
    }

    pub fn speech_synthesizer(mut self, synthesizer: Arc<dyn SpeechSynthesizer>) -> Self {
        self.speech_synthesizer = Some(synthesizer);
        self
    }

    pub fn audio_sink(mut self, sink: Arc<dyn AudioSink>) -> Self {
        self.audio_sink = sink;
        self
    }

    pub fn event_bus(mut self, events: EventBusRef) -> Self {
        self.events = events;
        self
    }

    pub fn build(self) -> Result<VoiceAssistant, ConfigError> {
        let config = self.config;
        config.validate()?;

        let streaming = self
            .streaming_transcriber
            .ok_or(ConfigError::MissingCollaborator("streaming_transcriber"))?;
        let finalizer = self
            .final_transcriber
            .ok_or(ConfigError::MissingCollaborator("final_transcriber"))?;
        let generator = self
            .answer_generator
            .ok_or(ConfigError::MissingCollaborator("answer_generator"))?;
        let synthesizer = self
            .speech_synthesizer
            .ok_or(ConfigError::MissingCollaborator("speech_synthesizer"))?;

        let gate = if config.speaker.enabled {
            let verifier = self
                .speaker_verifier
                .ok_or(ConfigError::MissingCollaborator("speaker_verifier"))?;
            SpeakerGate::new(verifier, config.speaker.threshold)
        } else {
            SpeakerGate::disabled()
        };
        let vad = self
            .vad
            .unwrap_or_else(|| Box::new(EnergyVad::default()) as Box<dyn VoiceActivityDetector>);

        let machine = TurnMachine::new(
            config.turn,
            vad,
            gate,
            streaming,
            finalizer,
            Arc::clone(&self.events),
        )
        .map_err(|e| ConfigError::Invalid(e.to_string()))?;

        let speech = TtsStreamer::new(synthesizer, self.audio_sink, Arc::clone(&self.events))
            .with_buffer_threshold(config.tts.buffer_threshold);
        let history = ConversationHistory::new(
            config.llm.instruction_suffix.clone(),
            config.llm.max_history_messages,
        );
        let orchestrator =
            DialogueOrchestrator::new(generator, speech, history, machine.subscribe(), self.events);

        let mut bus = AudioBus::with_config(config.audio.bus_config());
        let audio = bus.sender();
        let receiver = bus
            .take_receiver()
            .ok_or_else(|| ConfigError::Invalid("audio bus receiver unavailable".into()))?;

        tracing::info!(
            sample_rate = config.audio.sample_rate,
            chunk_ms = config.audio.chunk_duration_ms,
            speaker_gate = config.speaker.enabled,
            "Voice assistant built"
        );

        Ok(VoiceAssistant {
            config,
            machine,
            orchestrator,
            audio,
            receiver,
        })
    }
}

/// A fully wired assistant, not yet running.
pub struct VoiceAssistant {
    config: AssistantConfig,
    machine: TurnMachine,
    orchestrator: DialogueOrchestrator,
    audio: AudioBusSender,
    receiver: AudioBusReceiver,
}

impl VoiceAssistant {
    pub fn builder(config: AssistantConfig) -> VoiceAssistantBuilder {
        VoiceAssistantBuilder::new(config)
    }

    pub fn config(&self) -> &AssistantConfig {
        &self.config
    }

    /// Spawn the chunk consumer and the dialogue orchestrator.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(self) -> AssistantHandle {
        let listening = self.machine.subscribe();
        let active_turn = self.orchestrator.active_turn();
        let shutdown = CancellationToken::new();
        let (utterance_tx, utterance_rx) = mpsc::unbounded_channel();

        let consumer = tokio::spawn(run_chunk_consumer(
            self.machine,
            self.receiver,
            utterance_tx,
            shutdown.clone(),
        ));
        let orchestrator = tokio::spawn(self.orchestrator.run(utterance_rx, shutdown.clone()));

        AssistantHandle {
            audio: Some(self.audio),
            listening,
            active_turn,
            shutdown,
            consumer,
            orchestrator,
        }
    }
}

/// Control surface of a running assistant.
pub struct AssistantHandle {
    audio: Option<AudioBusSender>,
    listening: ListeningWatch,
    active_turn: watch::Receiver<Option<Uuid>>,
    shutdown: CancellationToken,
    consumer: JoinHandle<()>,
    orchestrator: JoinHandle<()>,
}

impl AssistantHandle {
    /// Producer side of the ingestion queue. `None` after [`close_input`](Self::close_input).
    pub fn audio_sender(&self) -> Option<AudioBusSender> {
        self.audio.clone()
    }

    /// Drop this handle's sender. Once every other sender is gone too, the
    /// chunk consumer drains the queue and stops.
    pub fn close_input(&mut self) {
        self.audio = None;
    }

    pub fn listening(&self) -> ListeningWatch {
        self.listening.clone()
    }

    pub fn listening_state(&self) -> TurnState {
        self.listening.current().state
    }

    pub fn active_turn(&self) -> Option<Uuid> {
        *self.active_turn.borrow()
    }

    pub fn is_turn_active(&self) -> bool {
        self.active_turn().is_some()
    }

    /// Changes whenever a turn starts or finishes tearing down.
    pub fn active_turn_watch(&self) -> watch::Receiver<Option<Uuid>> {
        self.active_turn.clone()
    }

    /// Stop consuming audio and interrupt the live turn, if any.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Wait for both workers to stop.
    ///
    /// Without [`shutdown`](Self::shutdown) this returns once input is closed
    /// and every pending turn has run to the end.
    pub async fn join(mut self) -> Result<(), AssistantError> {
        self.close_input();
        self.consumer.await?;
        self.orchestrator.await?;
        Ok(())
    }
}

/// Sole owner of the turn machine: processes chunks strictly in arrival
/// order, one at a time.
async fn run_chunk_consumer(
    mut machine: TurnMachine,
    mut receiver: AudioBusReceiver,
    utterances: mpsc::UnboundedSender<Utterance>,
    shutdown: CancellationToken,
) {
    loop {
        let chunk = tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            chunk = receiver.recv() => match chunk {
                Some(chunk) => chunk,
                None => break,
            },
        };
        if let Some(utterance) = machine.handle_chunk(&chunk).await {
            if utterances.send(utterance).is_err() {
                tracing::debug!("Orchestrator gone, dropping utterance");
                break;
            }
        }
    }
    tracing::debug!(gaps = receiver.gaps_detected(), "Chunk consumer stopped");
}
