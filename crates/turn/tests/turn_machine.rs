//! Integration tests for the turn machine.
//!
//! Chunks encode their own classification: the first sample is 1.0 for the
//! user's speech, 0.7 for another speaker, 0.0 for silence, NaN for a chunk
//! the VAD backend chokes on.

use std::sync::{Arc, Mutex};

use parley_bus::AudioChunk;
use parley_events::{
    event_names, FinalTranscriptEvent, IdleCountdownEvent, InMemoryEventBus,
    ListeningChangedEvent, PartialTranscriptEvent,
};
use parley_speaker::{SpeakerGate, SpeakerVerifier};
use parley_stt::{FinalTranscriber, FinalTranscript, SttError, StreamingTranscriber};
use parley_turn::{TurnConfig, TurnMachine, TurnState};
use parley_vad::{VadError, VoiceActivityDetector};

const USER: f32 = 1.0;
const OTHER: f32 = 0.7;
const SILENCE: f32 = 0.0;
const SAMPLES_PER_CHUNK: usize = 4;

#[derive(Default)]
struct Log {
    partial_calls: usize,
    finalize_sizes: Vec<usize>,
    cache_resets: usize,
    languages: Vec<String>,
    fail_next_partial: bool,
    fail_next_finalize: bool,
    finalize_down: bool,
    finalize_language: Option<String>,
}

type SharedLog = Arc<Mutex<Log>>;

struct ScriptedVad;

impl VoiceActivityDetector for ScriptedVad {
    fn detect(&mut self, samples: &[f32]) -> parley_vad::Result<bool> {
        if samples[0].is_nan() {
            return Err(VadError::InferenceError("bad frame".into()));
        }
        Ok(samples[0] > 0.5)
    }
}

struct FakeOnline(SharedLog);

#[async_trait::async_trait]
impl StreamingTranscriber for FakeOnline {
    async fn transcribe_chunk(&mut self, _samples: &[f32]) -> parley_stt::Result<String> {
        let mut log = self.0.lock().unwrap();
        if std::mem::take(&mut log.fail_next_partial) {
            return Err(SttError::TranscriptionFailed("partial".into()));
        }
        log.partial_calls += 1;
        Ok(format!("p{} ", log.partial_calls))
    }

    fn reset_cache(&mut self) {
        self.0.lock().unwrap().cache_resets += 1;
    }

    fn set_language(&mut self, language: &str) {
        self.0.lock().unwrap().languages.push(language.to_string());
    }
}

struct FakeOffline(SharedLog);

#[async_trait::async_trait]
impl FinalTranscriber for FakeOffline {
    async fn transcribe(&mut self, samples: &[f32]) -> parley_stt::Result<FinalTranscript> {
        let mut log = self.0.lock().unwrap();
        if std::mem::take(&mut log.fail_next_finalize) || log.finalize_down {
            return Err(SttError::TranscriptionFailed("final".into()));
        }
        let chunks = samples.len() / SAMPLES_PER_CHUNK;
        log.finalize_sizes.push(chunks);
        let mut transcript = FinalTranscript::new(format!("F{chunks}."));
        if let Some(language) = &log.finalize_language {
            transcript = transcript.with_language(language.clone());
        }
        Ok(transcript)
    }
}

/// Same speaker when the first samples match.
struct FirstSampleVerifier;

#[async_trait::async_trait]
impl SpeakerVerifier for FirstSampleVerifier {
    async fn verify(
        &self,
        candidate: &[f32],
        reference: &[f32],
        _threshold: f32,
    ) -> parley_speaker::Result<bool> {
        Ok(candidate[0] == reference[0])
    }
}

struct Harness {
    machine: TurnMachine,
    log: SharedLog,
    events: Arc<InMemoryEventBus>,
    seq: u64,
}

impl Harness {
    fn new(config: TurnConfig) -> Self {
        Self::with_gate(config, SpeakerGate::disabled())
    }

    fn with_gate(config: TurnConfig, gate: SpeakerGate) -> Self {
        let log = SharedLog::default();
        let events = Arc::new(InMemoryEventBus::new());
        let machine = TurnMachine::new(
            config,
            Box::new(ScriptedVad),
            gate,
            Box::new(FakeOnline(log.clone())),
            Box::new(FakeOffline(log.clone())),
            events.clone(),
        )
        .unwrap();
        Self {
            machine,
            log,
            events,
            seq: 0,
        }
    }

    fn chunk(&mut self, value: f32) -> AudioChunk {
        let chunk = AudioChunk::new(self.seq, 0, 16000, vec![value; SAMPLES_PER_CHUNK]);
        self.seq += 1;
        chunk
    }

    async fn feed(&mut self, value: f32) -> Option<parley_turn::Utterance> {
        let chunk = self.chunk(value);
        self.machine.handle_chunk(&chunk).await
    }

    /// Feed a script ('S' user speech, '_' silence) and record the state after each chunk.
    async fn trace(&mut self, script: &str) -> Vec<TurnState> {
        let mut states = Vec::new();
        for c in script.chars() {
            let value = if c == 'S' { USER } else { SILENCE };
            self.feed(value).await;
            states.push(self.machine.state());
        }
        states
    }
}

fn config(ending: u32, idle: u32, cap: usize) -> TurnConfig {
    TurnConfig {
        ending_threshold: ending,
        idle_threshold: idle,
        accumulated_speech_threshold: cap,
    }
}

use TurnState::{Idle, Offline, Online};

#[tokio::test]
async fn test_state_trace_follows_online_offline_idle_order() {
    let mut h = Harness::new(config(2, 3, 50));

    let states = h.trace("SS____S____").await;

    assert_eq!(
        states,
        vec![Online, Online, Online, Offline, Offline, Idle, Online, Online, Offline, Offline, Idle]
    );
    assert_eq!(h.log.lock().unwrap().finalize_sizes, vec![2, 1]);

    let remaining: Vec<u32> = h
        .events
        .decoded::<IdleCountdownEvent>()
        .iter()
        .map(|e| e.remaining)
        .collect();
    assert_eq!(remaining, vec![3, 3, 2, 2, 1, 3, 3, 2, 2, 1, 3]);
    assert!(h.events.decoded::<IdleCountdownEvent>().iter().all(|e| e.threshold == 3));
}

#[tokio::test]
async fn test_idle_counter_restarts_after_finalize_in_same_chunk() {
    let mut h = Harness::new(config(2, 3, 50));
    h.trace("S_").await;
    assert_eq!(h.machine.counters().ending, 1);
    assert_eq!(h.machine.counters().idle, 1);

    // Ending threshold hit: finalize resets both counters, then the idle
    // check of the same chunk counts again from zero.
    h.trace("_").await;
    assert_eq!(h.machine.state(), Offline);
    assert_eq!(h.machine.counters().ending, 0);
    assert_eq!(h.machine.counters().idle, 1);
}

#[tokio::test]
async fn test_silence_while_idle_changes_nothing() {
    let mut h = Harness::new(config(2, 8, 50));
    let states = h.trace("_____").await;
    assert!(states.iter().all(|s| *s == Idle));
    assert_eq!(h.machine.counters().idle, 0);
    assert!(h.events.events_for(event_names::LISTENING_CHANGED).is_empty());
}

#[tokio::test]
async fn test_accumulation_cap_forces_finalize() {
    let mut h = Harness::new(config(2, 8, 3));

    for _ in 0..10 {
        h.feed(USER).await;
        assert!(h.machine.accumulated_chunks() < 3, "buffer must never reach the cap");
    }
    assert_eq!(h.log.lock().unwrap().finalize_sizes, vec![3, 3, 3]);

    for _ in 0..2 {
        h.feed(SILENCE).await;
    }
    assert_eq!(h.log.lock().unwrap().finalize_sizes, vec![3, 3, 3, 1]);
    assert_eq!(h.machine.accumulated_chunks(), 0);
}

#[tokio::test]
async fn test_partial_text_superseded_by_final() {
    let mut h = Harness::new(config(2, 8, 50));

    h.feed(USER).await;
    h.feed(USER).await;
    assert_eq!(h.machine.transcript().pending(), "p1 p2 ");
    assert_eq!(h.events.decoded::<PartialTranscriptEvent>().len(), 2);

    h.feed(SILENCE).await;
    h.feed(SILENCE).await;
    assert_eq!(h.machine.transcript().committed(), "F2.");
    assert_eq!(h.machine.transcript().pending(), "");
    assert_eq!(h.log.lock().unwrap().cache_resets, 1);

    let finals = h.events.decoded::<FinalTranscriptEvent>();
    assert_eq!(finals.len(), 1);
    assert_eq!(finals[0].text, "F2.");
}

#[tokio::test]
async fn test_utterance_dispatched_once_on_idle() {
    let mut h = Harness::new(config(2, 3, 50));

    let mut utterances = Vec::new();
    for value in [USER, USER, SILENCE, SILENCE, SILENCE, SILENCE, SILENCE, SILENCE] {
        if let Some(utterance) = h.feed(value).await {
            utterances.push(utterance);
        }
    }

    assert_eq!(utterances.len(), 1);
    assert_eq!(utterances[0].text, "F2.");
    assert_eq!(utterances[0].activations, 1);
    assert!(h.machine.transcript().is_empty());
    assert_eq!(h.events.events_for(event_names::TRANSCRIPT_RESET).len(), 1);
}

#[tokio::test]
async fn test_listening_watch_counts_activations() {
    let mut h = Harness::new(config(2, 3, 50));
    let watch = h.machine.subscribe();

    h.trace("S").await;
    assert_eq!(watch.current().state, Online);
    assert_eq!(watch.current().activations, 1);

    // Resuming from OFFLINE is not a new activation.
    h.trace("__S").await;
    assert_eq!(watch.current().activations, 1);

    h.trace("______S").await;
    assert_eq!(watch.current().activations, 2);

    let changes = h.events.decoded::<ListeningChangedEvent>();
    assert!(changes.iter().any(|c| c.state == Idle && !c.listening));
}

#[tokio::test]
async fn test_vad_failure_drops_chunk_without_transition() {
    let mut h = Harness::new(config(2, 8, 50));

    assert!(h.feed(f32::NAN).await.is_none());
    assert_eq!(h.machine.state(), Idle);

    h.feed(USER).await;
    assert_eq!(h.machine.state(), Online);
    let counters = h.machine.counters();

    // A failing chunk mid-utterance does not advance the hysteresis counters.
    h.feed(f32::NAN).await;
    assert_eq!(h.machine.state(), Online);
    assert_eq!(h.machine.counters(), counters);
}

#[tokio::test]
async fn test_partial_transcription_failure_drops_chunk_effect() {
    let mut h = Harness::new(config(2, 8, 50));
    h.log.lock().unwrap().fail_next_partial = true;

    h.feed(USER).await;

    assert_eq!(h.machine.state(), Idle);
    assert_eq!(h.machine.accumulated_chunks(), 0);
    assert!(h.machine.transcript().is_empty());

    h.feed(USER).await;
    assert_eq!(h.machine.state(), Online);
    assert_eq!(h.machine.transcript().pending(), "p1 ");
}

#[tokio::test]
async fn test_finalize_failure_keeps_buffer_and_retries() {
    let mut h = Harness::new(config(2, 8, 50));
    h.trace("S_").await;
    h.log.lock().unwrap().fail_next_finalize = true;

    h.trace("_").await;
    assert_eq!(h.machine.state(), Online);
    assert_eq!(h.machine.accumulated_chunks(), 1);
    assert_eq!(h.machine.transcript().pending(), "p1 ");

    h.trace("_").await;
    assert_eq!(h.machine.state(), Offline);
    assert_eq!(h.machine.transcript().committed(), "F1.");
}

#[tokio::test]
async fn test_finalize_outage_keeps_buffer_bounded_and_turn_ends() {
    let mut h = Harness::new(config(2, 4, 3));
    h.log.lock().unwrap().finalize_down = true;

    for _ in 0..40 {
        h.feed(USER).await;
        assert!(h.machine.accumulated_chunks() < 3);
        assert_eq!(h.machine.state(), Online);
    }
    assert!(h.log.lock().unwrap().finalize_sizes.is_empty());
    assert_eq!(h.log.lock().unwrap().cache_resets, 13);

    let mut utterances = Vec::new();
    for _ in 0..4 {
        utterances.extend(h.feed(SILENCE).await);
    }

    assert_eq!(h.machine.state(), Idle);
    assert_eq!(h.machine.accumulated_chunks(), 0);
    assert_eq!(h.log.lock().unwrap().cache_resets, 14);
    assert_eq!(utterances.len(), 1);
    assert!(utterances[0].text.starts_with("p1 p2 p3"));
    assert!(utterances[0].text.ends_with("p40"));
    assert!(h.events.decoded::<FinalTranscriptEvent>().is_empty());
}

#[tokio::test]
async fn test_detected_language_forwarded_to_incremental_pass() {
    let mut h = Harness::new(config(2, 8, 50));
    h.log.lock().unwrap().finalize_language = Some("es".into());

    h.trace("S__").await;

    assert_eq!(h.log.lock().unwrap().languages, vec!["es".to_string()]);
    let finals = h.events.decoded::<FinalTranscriptEvent>();
    assert_eq!(finals[0].language.as_deref(), Some("es"));
}

#[tokio::test]
async fn test_speaker_gate_locks_onto_first_speaker() {
    let gate = SpeakerGate::new(Arc::new(FirstSampleVerifier), 0.35);
    let mut h = Harness::with_gate(config(2, 3, 50), gate);

    // Before any reference, another voice is accepted.
    h.feed(OTHER).await;
    assert_eq!(h.machine.state(), Online);
    h.trace("_").await;
    assert!(h.machine.speaker_gate().reference().is_none());

    // First finalize stores the reference.
    h.trace("_").await;
    assert_eq!(h.machine.speaker_gate().reference().unwrap()[0], OTHER);

    // The user whose voice is not the reference now reads as silence.
    h.trace("_____").await;
    assert_eq!(h.machine.state(), Idle);
    h.feed(USER).await;
    assert_eq!(h.machine.state(), Idle);

    h.feed(OTHER).await;
    assert_eq!(h.machine.state(), Online);
}

#[tokio::test]
async fn test_reset_transcript_is_idempotent() {
    let mut h = Harness::new(config(2, 8, 50));
    h.trace("SS").await;

    h.machine.reset_transcript();
    assert!(h.machine.transcript().is_empty());
    h.machine.reset_transcript();
    assert!(h.machine.transcript().is_empty());
    assert_eq!(h.machine.transcript().text(), "");
}

#[tokio::test]
async fn test_invalid_config_rejected() {
    let log = SharedLog::default();
    let result = TurnMachine::new(
        config(0, 8, 50),
        Box::new(ScriptedVad),
        SpeakerGate::disabled(),
        Box::new(FakeOnline(log.clone())),
        Box::new(FakeOffline(log)),
        Arc::new(InMemoryEventBus::new()),
    );
    assert!(matches!(result, Err(parley_turn::TurnError::InvalidConfig(_))));
}
