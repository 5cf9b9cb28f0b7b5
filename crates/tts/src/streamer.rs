use std::sync::Arc;

use futures::StreamExt;
use parley_events::{publish, AllSpeechSentEvent, AudioChunkEvent, EventBusRef};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::{
    preprocess_for_speech, AudioSink, InterruptSignal, SpeechSynthesizer, TextBuffer, TtsError,
    DEFAULT_BUFFER_THRESHOLD,
};

/// How a turn's speech pipeline ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpeechOutcome {
    /// Every unit was synthesized and playback drained.
    Completed { units: usize, frames: usize },
    /// The turn's interrupt was raised, or the handle was dropped before
    /// [`SpeechHandle::finish`].
    Interrupted,
    Failed(String),
}

enum Command {
    Speak(String),
    Finish,
}

/// Starts one speech pipeline per dialogue turn.
#[derive(Clone)]
pub struct TtsStreamer {
    synthesizer: Arc<dyn SpeechSynthesizer>,
    sink: Arc<dyn AudioSink>,
    events: EventBusRef,
    buffer_threshold: usize,
}

impl TtsStreamer {
    pub fn new(
        synthesizer: Arc<dyn SpeechSynthesizer>,
        sink: Arc<dyn AudioSink>,
        events: EventBusRef,
    ) -> Self {
        Self {
            synthesizer,
            sink,
            events,
            buffer_threshold: DEFAULT_BUFFER_THRESHOLD,
        }
    }

    pub fn with_buffer_threshold(mut self, buffer_threshold: usize) -> Self {
        self.buffer_threshold = buffer_threshold;
        self
    }

    pub fn buffer_threshold(&self) -> usize {
        self.buffer_threshold
    }

    /// Spawn the synthesis/playback worker for `turn_id`.
    ///
    /// Text pushed through the returned handle is spoken in order. The
    /// worker observes `interrupt` between frames.
    pub fn start(
        &self,
        turn_id: Uuid,
        interrupt: InterruptSignal,
    ) -> (SpeechHandle, JoinHandle<SpeechOutcome>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let worker = SpeechWorker {
            turn_id,
            synthesizer: Arc::clone(&self.synthesizer),
            sink: Arc::clone(&self.sink),
            events: Arc::clone(&self.events),
            interrupt: interrupt.clone(),
            units: 0,
            frames: 0,
        };
        let task = tokio::spawn(worker.run(rx));
        let handle = SpeechHandle {
            buffer: TextBuffer::new(self.buffer_threshold),
            commands: tx,
            interrupt,
        };
        (handle, task)
    }
}

/// Producer side of a turn's speech pipeline.
pub struct SpeechHandle {
    buffer: TextBuffer,
    commands: mpsc::UnboundedSender<Command>,
    interrupt: InterruptSignal,
}

impl SpeechHandle {
    /// Buffer answer text and submit a unit once one is ready.
    pub fn push_text(&mut self, text: &str) {
        if self.interrupt.is_raised() {
            return;
        }
        if let Some(unit) = self.buffer.push(text) {
            self.send(Command::Speak(unit));
        }
    }

    /// Submit whatever is buffered and close the queue.
    pub fn finish(mut self) {
        if let Some(unit) = self.buffer.flush() {
            self.send(Command::Speak(unit));
        }
        self.send(Command::Finish);
    }

    fn send(&self, command: Command) {
        if self.commands.send(command).is_err() {
            tracing::debug!("Speech worker already stopped");
        }
    }
}

struct SpeechWorker {
    turn_id: Uuid,
    synthesizer: Arc<dyn SpeechSynthesizer>,
    sink: Arc<dyn AudioSink>,
    events: EventBusRef,
    interrupt: InterruptSignal,
    units: usize,
    frames: usize,
}

impl SpeechWorker {
    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>) -> SpeechOutcome {
        let outcome = self.drain(&mut commands).await;

        if let SpeechOutcome::Completed { units, frames } = outcome {
            publish(
                self.events.as_ref(),
                &AllSpeechSentEvent {
                    turn_id: self.turn_id,
                },
            );
            tracing::debug!(turn_id = %self.turn_id, units, frames, "All speech sent");
        } else {
            commands.close();
            let mut discarded = 0;
            while commands.try_recv().is_ok() {
                discarded += 1;
            }
            self.sink.stop().await;
            tracing::debug!(turn_id = %self.turn_id, discarded, outcome = ?outcome, "Speech stopped");
        }
        outcome
    }

    async fn drain(&mut self, commands: &mut mpsc::UnboundedReceiver<Command>) -> SpeechOutcome {
        loop {
            let command = tokio::select! {
                biased;
                _ = self.interrupt.raised() => return SpeechOutcome::Interrupted,
                command = commands.recv() => command,
            };
            match command {
                Some(Command::Speak(unit)) => match self.speak(&unit).await {
                    Ok(true) => {}
                    Ok(false) => return SpeechOutcome::Interrupted,
                    Err(e) => {
                        tracing::warn!(turn_id = %self.turn_id, error = %e, "Speech failed");
                        self.interrupt.raise();
                        return SpeechOutcome::Failed(e.to_string());
                    }
                },
                Some(Command::Finish) => {
                    let finished = tokio::select! {
                        biased;
                        _ = self.interrupt.raised() => return SpeechOutcome::Interrupted,
                        finished = self.sink.finish() => finished,
                    };
                    if let Err(e) = finished {
                        self.interrupt.raise();
                        return SpeechOutcome::Failed(e.to_string());
                    }
                    return SpeechOutcome::Completed {
                        units: self.units,
                        frames: self.frames,
                    };
                }
                None => return SpeechOutcome::Interrupted,
            }
        }
    }

    /// Synthesize and play one unit. `Ok(false)` if interrupted part way.
    async fn speak(&mut self, unit: &str) -> Result<bool, TtsError> {
        let text = preprocess_for_speech(unit);
        if text.is_empty() {
            return Ok(true);
        }
        tracing::debug!(turn_id = %self.turn_id, chars = text.len(), "Synthesizing unit");
        self.units += 1;

        let mut frames = self.synthesizer.synthesize(&text);
        loop {
            let next = tokio::select! {
                biased;
                _ = self.interrupt.raised() => return Ok(false),
                next = frames.next() => next,
            };
            let Some(frame) = next else {
                return Ok(true);
            };
            let frame = frame?;

            publish(
                self.events.as_ref(),
                &AudioChunkEvent::from_samples(self.turn_id, frame.sample_rate, &frame.samples),
            );
            self.frames += 1;

            tokio::select! {
                biased;
                _ = self.interrupt.raised() => return Ok(false),
                played = self.sink.play(&frame) => played?,
            }
        }
    }
}
