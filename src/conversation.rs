//! Per-user conversation state for the private `/config` dialogue.
//!
//! ```text
//! Idle -> AwaitingKeyword -> AwaitingResponse { keyword } -> Idle
//! Idle -> AwaitingKeywordToDelete -> Idle
//! ```
//!
//! State lives in teloxide's in-memory dialogue storage and is lost on
//! restart. [`advance`] performs one transition against the storage and
//! [`advance_dialogue`] also stores the resulting state; the handler layer
//! decides what to send back from the returned [`Transition`].

use anyhow::Result;
use serde::{Deserialize, Serialize};
use teloxide::dispatching::dialogue::{Dialogue, InMemStorage};
use tracing::{debug, warn};

use crate::keywords::{normalize_keyword, KeywordResponse, UserId};
use crate::storage::Storage;

/// Where a user is in the configuration dialogue
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConversationState {
    #[default]
    Idle,
    AwaitingKeyword,
    AwaitingResponse {
        keyword: String,
    },
    AwaitingKeywordToDelete,
}

impl ConversationState {
    pub fn is_idle(&self) -> bool {
        matches!(self, ConversationState::Idle)
    }
}

/// Type alias for the configuration dialogue
pub type ConversationDialogue = Dialogue<ConversationState, InMemStorage<ConversationState>>;

/// Private-chat input that can drive a transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversationInput<'a> {
    Text(&'a str),
    /// Telegram file id of the largest photo size
    Photo(&'a str),
}

/// What happened during a transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionOutcome {
    /// Keyword stored as pending, waiting for its response
    KeywordReceived { keyword: String },
    /// Submitted keyword was blank
    KeywordRejected,
    /// Response stored; `kind` is `"text"` or `"photo"`
    ResponseConfigured { keyword: String, kind: &'static str },
    KeywordDeleted { keyword: String },
    KeywordNotFound { keyword: String },
    /// A photo arrived where only text is accepted
    TextExpected,
    /// Nothing to do for this state/input pair
    Ignored,
}

/// Result of [`advance`]: the state to store and what happened
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub next: ConversationState,
    pub outcome: TransitionOutcome,
}

impl Transition {
    fn new(next: ConversationState, outcome: TransitionOutcome) -> Self {
        Self { next, outcome }
    }
}

/// Apply one dialogue step for `user_id`.
///
/// On `Err` the caller resets the user to [`ConversationState::Idle`]; any
/// write that already happened is kept.
pub async fn advance(
    storage: &dyn Storage,
    user_id: UserId,
    state: ConversationState,
    input: ConversationInput<'_>,
) -> Result<Transition> {
    debug!(user_id = %user_id, state = ?state, "Advancing conversation");

    let transition = match (state, input) {
        (ConversationState::Idle, _) => Transition::new(ConversationState::Idle, TransitionOutcome::Ignored),

        (ConversationState::AwaitingKeyword, ConversationInput::Text(text)) => match normalize_keyword(text) {
            Some(keyword) => {
                storage
                    .set_keyword(user_id, &keyword, &KeywordResponse::Pending)
                    .await?;
                Transition::new(
                    ConversationState::AwaitingResponse {
                        keyword: keyword.clone(),
                    },
                    TransitionOutcome::KeywordReceived { keyword },
                )
            }
            None => Transition::new(
                ConversationState::AwaitingKeyword,
                TransitionOutcome::KeywordRejected,
            ),
        },

        (ConversationState::AwaitingResponse { keyword }, input) => {
            let response = match input {
                ConversationInput::Text(text) => KeywordResponse::Text(text.to_string()),
                ConversationInput::Photo(file_id) => KeywordResponse::Photo(file_id.to_string()),
            };
            let kind = response.kind();
            storage.set_keyword(user_id, &keyword, &response).await?;
            Transition::new(
                ConversationState::Idle,
                TransitionOutcome::ResponseConfigured { keyword, kind },
            )
        }

        (ConversationState::AwaitingKeywordToDelete, ConversationInput::Text(text)) => {
            let keyword = text.to_lowercase();
            let outcome = if storage.delete_keyword(user_id, &keyword).await? {
                TransitionOutcome::KeywordDeleted { keyword }
            } else {
                TransitionOutcome::KeywordNotFound { keyword }
            };
            Transition::new(ConversationState::Idle, outcome)
        }

        (state @ ConversationState::AwaitingKeyword, ConversationInput::Photo(_))
        | (state @ ConversationState::AwaitingKeywordToDelete, ConversationInput::Photo(_)) => {
            Transition::new(state, TransitionOutcome::TextExpected)
        }
    };

    debug!(user_id = %user_id, next = ?transition.next, outcome = ?transition.outcome, "Conversation advanced");
    Ok(transition)
}

/// Clear the stored state so the user is back at [`ConversationState::Idle`]
pub async fn reset_dialogue(dialogue: &ConversationDialogue) {
    // In-memory storage only fails when there was no state to remove
    if let Err(e) = dialogue.exit().await {
        debug!(chat_id = %dialogue.chat_id(), error = %e, "No conversation state to clear");
    }
}

/// Persist the next conversation state; `Idle` drops the entry
pub async fn store_state(dialogue: &ConversationDialogue, next: ConversationState) -> Result<()> {
    if next.is_idle() {
        reset_dialogue(dialogue).await;
    } else {
        dialogue.update(next).await?;
    }
    Ok(())
}

/// Run [`advance`] for the dialogue's user and store the next state.
///
/// When the transition fails the user is reset to Idle before the error is
/// returned; writes that already happened are kept.
pub async fn advance_dialogue(
    storage: &dyn Storage,
    dialogue: &ConversationDialogue,
    user_id: UserId,
    state: ConversationState,
    input: ConversationInput<'_>,
) -> Result<Transition> {
    match advance(storage, user_id, state, input).await {
        Ok(transition) => {
            store_state(dialogue, transition.next.clone()).await?;
            Ok(transition)
        }
        Err(e) => {
            warn!(user_id = %user_id, error = %format!("{:#}", e), "Conversation step failed, resetting to idle");
            reset_dialogue(dialogue).await;
            Err(e)
        }
    }
}
