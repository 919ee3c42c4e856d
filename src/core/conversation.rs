use std::error::Error as StdError;
use std::fmt;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::api::ChatMessage;
use crate::core::chat_stream::{ChatStreamService, StreamEvent, StreamParams, CANCEL_GRACE};
use crate::core::config::Config;
use crate::core::message::{Message, Role};

/// The controller's half of the streaming lifecycle: Idle -> Busy -> Idle.
/// Busy is reachable only from Idle, and completion, cancellation, and error
/// all converge on the same cleanup path back to Idle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Busy,
}

/// Why a submission was rejected.
#[derive(Debug, PartialEq, Eq)]
pub enum SubmitError {
    /// A stream is already in flight; only one is permitted at a time.
    Busy,
    /// Input was empty after trimming.
    Empty,
}

impl fmt::Display for SubmitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubmitError::Busy => write!(f, "a response is already streaming"),
            SubmitError::Empty => write!(f, "message is empty"),
        }
    }
}

impl StdError for SubmitError {}

/// What a stream event meant for the conversation, for the caller to display.
#[derive(Debug)]
pub enum TurnOutcome {
    /// Incremental text appended to the in-progress reply.
    Fragment(String),
    /// Reply finished and was appended to the conversation.
    Finished(String),
    /// Stream failed; the partial reply was discarded.
    Failed(String),
}

/// Transient state for one in-flight request. Created on submission,
/// destroyed when the stream completes, errors, or is cancelled.
struct StreamSession {
    stream_id: u64,
    cancel_token: CancellationToken,
    handle: JoinHandle<()>,
    buffer: String,
}

/// Owns the ordered conversation and gates it behind a single in-flight
/// stream. All mutation happens on the caller's task; the streaming worker
/// only ever emits events.
pub struct ConversationController {
    config: Config,
    client: reqwest::Client,
    api_token: Option<String>,
    service: ChatStreamService,
    messages: Vec<Message>,
    session: Option<StreamSession>,
    next_stream_id: u64,
    cancel_grace: Duration,
}

impl ConversationController {
    pub fn new(
        config: Config,
        api_token: Option<String>,
        client: reqwest::Client,
        service: ChatStreamService,
    ) -> Self {
        let messages = vec![Message::system(config.system_prompt.clone())];
        Self {
            config,
            client,
            api_token,
            service,
            messages,
            session: None,
            next_stream_id: 0,
            cancel_grace: CANCEL_GRACE,
        }
    }

    pub fn state(&self) -> SessionState {
        if self.session.is_some() {
            SessionState::Busy
        } else {
            SessionState::Idle
        }
    }

    pub fn is_busy(&self) -> bool {
        self.state() == SessionState::Busy
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Append a user turn and start exactly one streaming worker over the
    /// full message list. Rejected while a stream is in flight.
    pub fn submit_user_turn(&mut self, text: &str) -> Result<u64, SubmitError> {
        if self.session.is_some() {
            return Err(SubmitError::Busy);
        }
        let text = text.trim();
        if text.is_empty() {
            return Err(SubmitError::Empty);
        }

        self.messages.push(Message::user(text));

        let cancel_token = CancellationToken::new();
        self.next_stream_id += 1;
        let stream_id = self.next_stream_id;

        let params = StreamParams {
            client: self.client.clone(),
            base_url: self.config.base_url.clone(),
            api_token: self.api_token.clone(),
            model: self.config.model.clone(),
            messages: self.api_messages(),
            sampling: self.config.sampling(),
            cancel_token: cancel_token.clone(),
            stream_id,
        };
        let handle = self.service.spawn_stream(params);

        self.session = Some(StreamSession {
            stream_id,
            cancel_token,
            handle,
            buffer: String::new(),
        });
        Ok(stream_id)
    }

    /// Fold one stream event into the conversation. Events from a stream that
    /// is no longer active are ignored.
    pub fn on_event(&mut self, event: StreamEvent, stream_id: u64) -> Option<TurnOutcome> {
        match self.session.as_ref() {
            Some(session) if session.stream_id == stream_id => {}
            _ => return None,
        }

        match event {
            StreamEvent::Fragment(text) => {
                if let Some(session) = self.session.as_mut() {
                    session.buffer.push_str(&text);
                }
                Some(TurnOutcome::Fragment(text))
            }
            StreamEvent::Completed(full_text) => {
                self.session = None;
                self.messages.push(Message::assistant(full_text.clone()));
                Some(TurnOutcome::Finished(full_text))
            }
            StreamEvent::Failed(error) => {
                // Discard the partial reply; the error is surfaced instead.
                self.session = None;
                Some(TurnOutcome::Failed(error))
            }
        }
    }

    /// Cancel the active stream, if any. Idempotent and always safe.
    ///
    /// Cancellation is cooperative: the token stops the relay between
    /// fragments, and the worker task is aborted if it does not finish within
    /// the grace period. Text that was already relayed is retained as the
    /// finalized assistant message; `None` means nothing had arrived yet.
    pub async fn cancel(&mut self) -> Option<String> {
        let StreamSession {
            stream_id,
            cancel_token,
            mut handle,
            buffer,
        } = self.session.take()?;

        debug!(stream_id, "cancelling active stream");
        cancel_token.cancel();
        if tokio::time::timeout(self.cancel_grace, &mut handle)
            .await
            .is_err()
        {
            warn!(stream_id, "worker missed the cancellation grace period; aborting");
            handle.abort();
        }

        if buffer.is_empty() {
            None
        } else {
            self.messages.push(Message::assistant(buffer.clone()));
            Some(buffer)
        }
    }

    /// Replace the system message content in place. Prior turns are kept.
    pub fn set_personality(&mut self, content: impl Into<String>) {
        let content = content.into();
        match self.messages.first_mut() {
            Some(first) if first.role == Role::System => first.content = content,
            _ => self.messages.insert(0, Message::system(content)),
        }
    }

    /// Reset the conversation to a single system message, keeping the
    /// currently selected personality.
    pub fn clear(&mut self) {
        let system_content = self
            .messages
            .first()
            .filter(|m| m.role == Role::System)
            .map(|m| m.content.clone())
            .unwrap_or_else(|| self.config.system_prompt.clone());
        self.messages = vec![Message::system(system_content)];
    }

    /// Replace the conversation with a loaded transcript. Callers must not
    /// invoke this while a stream is in flight.
    pub fn replace_messages(&mut self, messages: Vec<Message>) {
        if messages.is_empty() {
            self.clear();
        } else {
            self.messages = messages;
        }
    }

    /// Project the conversation into wire messages, prefixing the system
    /// message with the configured unconditional instruction text.
    fn api_messages(&self) -> Vec<ChatMessage> {
        self.messages
            .iter()
            .map(|message| {
                let content = match (&self.config.extra_instructions, message.role) {
                    (Some(extra), Role::System) => {
                        format!("{extra}\n\n{}", message.content)
                    }
                    _ => message.content.clone(),
                };
                ChatMessage {
                    role: message.role,
                    content,
                }
            })
            .collect()
    }
}
