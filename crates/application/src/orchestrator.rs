//! Dialogue orchestration: one answer/speech pipeline per user turn, raced
//! against the user speaking again.

use std::sync::{Arc, OnceLock};

use futures::stream::BoxStream;
use futures::StreamExt;
use parley_events::{
    publish, EventBusRef, StopReason, TokenEvent, TurnStartedEvent, TurnStoppedEvent,
};
use parley_llm::{AnswerGenerator, ConversationHistory};
use parley_tts::{InterruptSignal, SpeechHandle, SpeechOutcome, TtsStreamer};
use parley_turn::{ListeningWatch, Utterance};
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// One live request/response cycle.
///
/// Every worker of the turn observes the same [`InterruptSignal`]. The turn
/// resolves exactly once, by whichever path gets there first.
pub struct DialogueTurn {
    id: Uuid,
    interrupt: InterruptSignal,
    resolution: OnceLock<StopReason>,
    events: EventBusRef,
}

impl DialogueTurn {
    pub fn new(interrupt: InterruptSignal, events: EventBusRef) -> Self {
        Self {
            id: Uuid::new_v4(),
            interrupt,
            resolution: OnceLock::new(),
            events,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn interrupt(&self) -> &InterruptSignal {
        &self.interrupt
    }

    pub fn reason(&self) -> Option<StopReason> {
        self.resolution.get().copied()
    }

    pub fn is_resolved(&self) -> bool {
        self.resolution.get().is_some()
    }

    /// Resolve the turn and raise its interrupt so every worker winds down.
    ///
    /// Returns false, doing nothing, if the turn was already resolved.
    pub fn resolve(&self, reason: StopReason, error: Option<String>) -> bool {
        if self.resolution.set(reason).is_err() {
            return false;
        }
        self.interrupt.raise();

        match reason {
            StopReason::Completed => tracing::info!(turn_id = %self.id, "Turn completed"),
            StopReason::Interrupted => tracing::info!(turn_id = %self.id, "Turn interrupted"),
            StopReason::Failed => {
                tracing::warn!(turn_id = %self.id, error = ?error, "Turn failed")
            }
        }
        publish(
            self.events.as_ref(),
            &TurnStoppedEvent {
                turn_id: self.id,
                reason,
                error,
            },
        );
        true
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnOutcome {
    pub turn_id: Uuid,
    pub reason: StopReason,
    /// Answer text produced before the turn stopped.
    pub answer: String,
}

/// Runs dialogue turns strictly one after another.
pub struct DialogueOrchestrator {
    generator: Arc<dyn AnswerGenerator>,
    speech: TtsStreamer,
    history: ConversationHistory,
    listening: ListeningWatch,
    events: EventBusRef,
    active_turn: watch::Sender<Option<Uuid>>,
}

impl DialogueOrchestrator {
    pub fn new(
        generator: Arc<dyn AnswerGenerator>,
        speech: TtsStreamer,
        history: ConversationHistory,
        listening: ListeningWatch,
        events: EventBusRef,
    ) -> Self {
        let (active_turn, _) = watch::channel(None);
        Self {
            generator,
            speech,
            history,
            listening,
            events,
            active_turn,
        }
    }

    pub fn history(&self) -> &ConversationHistory {
        &self.history
    }

    /// Id of the live turn, `None` once its teardown has finished.
    pub fn active_turn(&self) -> watch::Receiver<Option<Uuid>> {
        self.active_turn.subscribe()
    }

    /// Take utterances one at a time until shutdown or until the chunk
    /// consumer goes away. An utterance that arrives during a live turn
    /// waits for that turn's teardown.
    pub async fn run(
        mut self,
        mut utterances: mpsc::UnboundedReceiver<Utterance>,
        shutdown: CancellationToken,
    ) {
        loop {
            let utterance = tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                utterance = utterances.recv() => match utterance {
                    Some(utterance) => utterance,
                    None => break,
                },
            };
            self.run_turn(utterance, &shutdown).await;
        }
        tracing::debug!("Dialogue orchestrator stopped");
    }

    /// Run one turn to resolution and tear it down.
    pub async fn run_turn(
        &mut self,
        utterance: Utterance,
        shutdown: &CancellationToken,
    ) -> TurnOutcome {
        let turn = Arc::new(DialogueTurn::new(
            InterruptSignal::child_of(shutdown),
            Arc::clone(&self.events),
        ));
        let turn_id = turn.id();
        self.active_turn.send_replace(Some(turn_id));
        tracing::info!(%turn_id, chars = utterance.text.len(), "Turn started");
        publish(
            self.events.as_ref(),
            &TurnStartedEvent {
                turn_id,
                transcript: utterance.text.clone(),
            },
        );

        self.history.push_user(&utterance.text);
        let tokens = self.generator.stream(self.history.messages());
        let (speech, speech_task) = self.speech.start(turn_id, turn.interrupt().clone());

        let watcher = tokio::spawn(watch_barge_in(
            Arc::clone(&turn),
            self.listening.clone(),
            utterance.activations,
        ));
        let answer_task = tokio::spawn(consume_answer(
            Arc::clone(&turn),
            tokens,
            speech,
            Arc::clone(&self.events),
        ));

        let answer = match answer_task.await {
            Ok(answer) => answer,
            Err(e) => {
                turn.resolve(StopReason::Failed, Some(format!("answer consumer died: {e}")));
                String::new()
            }
        };
        match speech_task.await {
            Ok(SpeechOutcome::Completed { .. }) => turn.resolve(StopReason::Completed, None),
            Ok(SpeechOutcome::Interrupted) => turn.resolve(StopReason::Interrupted, None),
            Ok(SpeechOutcome::Failed(error)) => turn.resolve(StopReason::Failed, Some(error)),
            Err(e) => turn.resolve(StopReason::Failed, Some(format!("speech worker died: {e}"))),
        };
        // Resolution raised the interrupt, which ends the watcher.
        if let Err(e) = watcher.await {
            tracing::warn!(%turn_id, error = %e, "Barge-in watcher died");
        }

        self.history.push_assistant(&answer);
        self.active_turn.send_replace(None);

        TurnOutcome {
            turn_id,
            reason: turn.reason().unwrap_or(StopReason::Interrupted),
            answer,
        }
    }
}

/// Interrupt the turn as soon as the user leaves IDLE again.
async fn watch_barge_in(turn: Arc<DialogueTurn>, mut listening: ListeningWatch, since: u64) {
    tokio::select! {
        biased;
        _ = turn.interrupt().raised() => {}
        snapshot = listening.left_idle_after(since) => {
            if let Some(snapshot) = snapshot {
                tracing::info!(turn_id = %turn.id(), state = %snapshot.state, "User barged in");
                turn.resolve(StopReason::Interrupted, None);
            }
        }
    }
}

/// Forward answer tokens to the event bus and the speech pipeline until the
/// stream ends or the turn is interrupted. Returns the answer so far.
async fn consume_answer(
    turn: Arc<DialogueTurn>,
    mut tokens: BoxStream<'static, parley_llm::Result<String>>,
    mut speech: SpeechHandle,
    events: EventBusRef,
) -> String {
    let mut answer = String::new();
    loop {
        let next = tokio::select! {
            biased;
            _ = turn.interrupt().raised() => break,
            next = tokens.next() => next,
        };
        match next {
            Some(Ok(token)) => {
                answer.push_str(&token);
                speech.push_text(&token);
                publish(
                    events.as_ref(),
                    &TokenEvent {
                        turn_id: turn.id(),
                        text: token,
                    },
                );
            }
            Some(Err(e)) => {
                turn.resolve(StopReason::Failed, Some(e.to_string()));
                break;
            }
            None => {
                tracing::debug!(turn_id = %turn.id(), chars = answer.len(), "Answer stream finished");
                speech.finish();
                return answer;
            }
        }
    }
    answer
}
