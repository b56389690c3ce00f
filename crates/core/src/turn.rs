//! Turn Controller
//!
//! Drives one interview session through its turns. A turn takes the user's
//! utterance, asks the model for a reply, appends the `[user, assistant]` pair
//! to the transcript and derives the next state from the reply's action tag.

use crate::{
    error::{ModelCallError, PersistenceError},
    interpreter::{PromptContext, ResponseInterpreter},
    interview::QuestionBank,
    prompt::{PromptTemplate, spoken_text},
    reply::{Action, InterpretedReply},
    transcript::{AudioMetadata, ChatMessage, Sender, SessionKey, TranscriptStore},
};
use serde::{Deserialize, Serialize};
use std::{
    collections::HashSet,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};
use tracing::{info, instrument, warn};

/// States of the turn-taking state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TurnState {
    AwaitingInput,
    Processing,
    FollowUp,
    Guidance,
    Complete,
}

impl TurnState {
    /// The state a reply's action tag leads to.
    pub fn for_action(action: Action) -> Self {
        match action {
            Action::FollowUp => TurnState::FollowUp,
            Action::Reflection | Action::Guidance => TurnState::Guidance,
            Action::Complete | Action::Ready => TurnState::Complete,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TurnState::Complete)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TurnError {
    #[error("the interview is already complete")]
    SessionComplete,
    #[error("a turn is already being processed")]
    Busy,
    #[error("the utterance is empty")]
    EmptyUtterance,
    #[error(transparent)]
    Model(#[from] ModelCallError),
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

/// The state machine of one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TurnMachine {
    state: TurnState,
}

impl Default for TurnMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl TurnMachine {
    pub fn new() -> Self {
        Self {
            state: TurnState::AwaitingInput,
        }
    }

    /// Restores the machine of a persisted session: complete if the last
    /// assistant reply carried a terminal action, awaiting input otherwise.
    pub fn resume(transcript: &[ChatMessage]) -> Self {
        let finished = transcript
            .iter()
            .rev()
            .find(|msg| msg.from == Sender::Assistant)
            .and_then(|msg| serde_json::from_str::<InterpretedReply>(&msg.message).ok())
            .is_some_and(|reply| reply.action.is_terminal());
        Self {
            state: if finished {
                TurnState::Complete
            } else {
                TurnState::AwaitingInput
            },
        }
    }

    pub fn state(&self) -> TurnState {
        self.state
    }

    /// `AWAITING_INPUT -> PROCESSING`.
    pub fn begin(&mut self) -> Result<(), TurnError> {
        match self.state {
            TurnState::Complete => Err(TurnError::SessionComplete),
            TurnState::Processing => Err(TurnError::Busy),
            _ => {
                self.state = TurnState::Processing;
                Ok(())
            }
        }
    }

    /// `PROCESSING -> FOLLOW_UP | GUIDANCE | COMPLETE`, decided by `action`.
    pub fn resolve(&mut self, action: Action) -> TurnState {
        debug_assert_eq!(self.state, TurnState::Processing);
        self.state = TurnState::for_action(action);
        self.state
    }

    /// Loops a non-terminal state back to `AWAITING_INPUT`.
    pub fn settle(&mut self) -> TurnState {
        if !self.state.is_terminal() {
            self.state = TurnState::AwaitingInput;
        }
        self.state
    }

    /// Returns to `AWAITING_INPUT` after a failed model call.
    pub fn abort(&mut self) {
        if self.state == TurnState::Processing {
            self.state = TurnState::AwaitingInput;
        }
    }
}

/// The candidate's answer for one turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Utterance {
    pub text: String,
    /// Set when the answer was transcribed from a recording.
    pub audio: Option<AudioMetadata>,
}

impl Utterance {
    pub fn typed(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            audio: None,
        }
    }

    pub fn spoken(text: impl Into<String>, audio: AudioMetadata) -> Self {
        Self {
            text: text.into(),
            audio: Some(audio),
        }
    }
}

impl From<&str> for Utterance {
    fn from(text: &str) -> Self {
        Self::typed(text)
    }
}

/// The result of one completed turn.
#[derive(Debug, Clone, PartialEq)]
pub struct TurnOutcome {
    pub reply: InterpretedReply,
    /// The state derived from the reply's action tag.
    pub state: TurnState,
    /// The state the session is left in: `AWAITING_INPUT` or `COMPLETE`.
    pub next_state: TurnState,
}

pub struct TurnController {
    store: Arc<dyn TranscriptStore>,
    interpreter: ResponseInterpreter,
    in_flight: Mutex<HashSet<SessionKey>>,
}

impl TurnController {
    pub fn new(store: Arc<dyn TranscriptStore>, interpreter: ResponseInterpreter) -> Self {
        Self {
            store,
            interpreter,
            in_flight: Mutex::default(),
        }
    }

    /// Starts (or restarts) a session by writing the opening question as the
    /// first assistant message.
    #[instrument(skip(self, question), fields(session = %key))]
    pub async fn start_session(&self, key: &SessionKey, question: &str) -> Result<(), TurnError> {
        self.open(key, question).await?;
        info!("Interview session started");
        Ok(())
    }

    /// Runs one turn for `utterance`.
    ///
    /// A session whose transcript is empty or unreadable is started over with
    /// a question drawn from `bank`. On a model failure nothing is appended and
    /// the error is returned. A second turn on a session whose turn is still
    /// running fails with [`TurnError::Busy`].
    #[instrument(skip(self, template, bank, utterance), fields(session = %key))]
    pub async fn take_turn(
        &self,
        key: &SessionKey,
        template: &PromptTemplate,
        bank: &QuestionBank,
        utterance: impl Into<Utterance>,
    ) -> Result<TurnOutcome, TurnError> {
        let utterance = utterance.into();
        let text = utterance.text.trim();
        if text.is_empty() {
            return Err(TurnError::EmptyUtterance);
        }
        let _claim = self.claim(key)?;

        let mut transcript = self.store.load_all(key).await;
        let question = match current_question(&transcript) {
            Some(question) => question,
            None => {
                warn!("Transcript is empty or unreadable, starting the session over");
                let question = bank.pick();
                transcript = vec![self.open(key, &question).await?];
                question
            }
        };

        let mut machine = TurnMachine::resume(&transcript);
        machine.begin()?;

        let context = PromptContext {
            kind: key.kind,
            system_prompt: template.render(&transcript, &question, text),
            user_utterance: text.to_string(),
        };
        let reply = match self.interpreter.interpret(context).await {
            Ok(reply) => reply,
            Err(e) => {
                machine.abort();
                warn!(error = %e, "Model call failed, turn abandoned");
                return Err(e.into());
            }
        };

        let state = machine.resolve(reply.action);
        self.store
            .append_all(
                key,
                &[
                    ChatMessage::user(text).with_metadata(utterance.audio.clone()),
                    ChatMessage::assistant(reply.to_transcript_text()),
                ],
            )
            .await?;
        let next_state = machine.settle();

        info!(action = %reply.action, ?state, ?next_state, "Turn completed");
        Ok(TurnOutcome {
            reply,
            state,
            next_state,
        })
    }

    /// Resets `key` and writes its opening message.
    async fn open(&self, key: &SessionKey, question: &str) -> Result<ChatMessage, TurnError> {
        self.store.reset(key).await?;
        let opening = ChatMessage::assistant(InterpretedReply::question(question).to_transcript_text());
        self.store.append(key, opening.clone()).await?;
        Ok(opening)
    }

    /// Marks a turn on `key` as running until the returned claim is dropped.
    fn claim(&self, key: &SessionKey) -> Result<TurnClaim<'_>, TurnError> {
        if !lock(&self.in_flight).insert(*key) {
            return Err(TurnError::Busy);
        }
        Ok(TurnClaim {
            sessions: &self.in_flight,
            key: *key,
        })
    }
}

struct TurnClaim<'a> {
    sessions: &'a Mutex<HashSet<SessionKey>>,
    key: SessionKey,
}

impl Drop for TurnClaim<'_> {
    fn drop(&mut self) {
        lock(self.sessions).remove(&self.key);
    }
}

fn lock(sessions: &Mutex<HashSet<SessionKey>>) -> MutexGuard<'_, HashSet<SessionKey>> {
    sessions.lock().unwrap_or_else(PoisonError::into_inner)
}

/// The session's question: the text of the first message, which is always
/// the interviewer's opening.
pub fn current_question(transcript: &[ChatMessage]) -> Option<String> {
    transcript
        .first()
        .filter(|msg| msg.from == Sender::Assistant)
        .map(|msg| spoken_text(&msg.message).into_owned())
}
