//! The chat session controller.
//!
//! A submission moves through `Idle → Sending → Rendering → Idle`. The
//! `Sending` state is represented by a live [`ProcessingGuard`]; while one
//! exists every further submission is dropped. Front ends that drive the
//! network call themselves use [`ChatSession::begin`] and
//! [`ChatSession::finish`]; everything else can use
//! [`ChatSession::send_message`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info};

use crate::api::{ApiError, QueryRequest, QueryResponse, QueryTransport};
use crate::format::{render_reply, ERROR_MESSAGE, GREETINGS, GREETING_REPLY};
use crate::identity::UserId;
use crate::state::{ChatMessage, Turn, TurnBody};

/// Pause before the canned greeting reply appears
pub const GREETING_DELAY: Duration = Duration::from_millis(500);

/// What the controller needs from whatever displays the conversation
pub trait ChatView {
    /// Add a turn at the end of the log and bring it into view
    fn append_turn(&mut self, turn: Turn);
    fn show_typing_indicator(&mut self);
    fn remove_typing_indicator(&mut self);
    fn set_controls_enabled(&mut self, enabled: bool);
    fn clear_input(&mut self);
    fn focus_input(&mut self);
    fn set_query_count(&mut self, count: u64);
}

pub fn is_greeting(text: &str) -> bool {
    let lowered = text.trim().to_lowercase();
    GREETINGS.iter().any(|greeting| *greeting == lowered)
}

/// Proof that the processing flag is held. Dropping it clears the flag.
#[derive(Debug)]
pub struct ProcessingGuard {
    flag: Arc<AtomicBool>,
}

impl ProcessingGuard {
    fn acquire(flag: &Arc<AtomicBool>) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self {
                flag: Arc::clone(flag),
            })
    }
}

impl Drop for ProcessingGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// A query that has been recorded and is ready to be sent
#[derive(Debug)]
pub struct PendingQuery {
    request: QueryRequest,
    guard: ProcessingGuard,
}

impl PendingQuery {
    pub fn request(&self) -> &QueryRequest {
        &self.request
    }

    pub fn into_parts(self) -> (QueryRequest, ProcessingGuard) {
        (self.request, self.guard)
    }
}

#[derive(Debug)]
pub enum Submission {
    /// Empty input, or a query already in flight
    Ignored,
    /// Answered locally; call `deliver_greeting` after `GREETING_DELAY`
    Greeting,
    Query(PendingQuery),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Ignored,
    Greeted,
    Answered,
    /// The error shown to the user is generic; `reason` keeps the cause
    Failed { reason: String },
}

pub struct ChatSession<V> {
    user_id: UserId,
    history: Vec<ChatMessage>,
    query_count: u64,
    processing: Arc<AtomicBool>,
    view: V,
}

impl<V: ChatView> ChatSession<V> {
    pub fn new(user_id: UserId, view: V) -> Self {
        Self {
            user_id,
            history: Vec::new(),
            query_count: 0,
            processing: Arc::new(AtomicBool::new(false)),
            view,
        }
    }

    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }

    pub fn query_count(&self) -> u64 {
        self.query_count
    }

    pub fn is_processing(&self) -> bool {
        self.processing.load(Ordering::Acquire)
    }

    pub fn view(&self) -> &V {
        &self.view
    }

    pub fn view_mut(&mut self) -> &mut V {
        &mut self.view
    }

    /// Validate the input and record it. Only `Submission::Query` holds the
    /// processing flag; greetings never touch it.
    pub fn begin(&mut self, input: &str) -> Submission {
        let message = input.trim();
        if message.is_empty() || self.is_processing() {
            return Submission::Ignored;
        }

        if is_greeting(message) {
            self.view.append_turn(Turn::user(message));
            self.view.clear_input();
            return Submission::Greeting;
        }

        let Some(guard) = ProcessingGuard::acquire(&self.processing) else {
            return Submission::Ignored;
        };

        self.view.set_controls_enabled(false);
        self.view.append_turn(Turn::user(message));
        self.history.push(ChatMessage::user(message));

        self.view.clear_input();
        self.view.show_typing_indicator();

        self.query_count += 1;
        self.view.set_query_count(self.query_count);

        info!(query_count = self.query_count, "submitting property query");

        // History already holds the turn being asked about
        let request = QueryRequest::new(&self.user_id, message, &self.history);
        Submission::Query(PendingQuery { request, guard })
    }

    pub fn deliver_greeting(&mut self) {
        self.view
            .append_turn(Turn::assistant(TurnBody::Text(GREETING_REPLY.to_string())));
    }

    /// Render the outcome of a query and return to idle.
    pub fn finish(
        &mut self,
        guard: ProcessingGuard,
        result: Result<QueryResponse, ApiError>,
    ) -> Outcome {
        self.view.remove_typing_indicator();

        let outcome = match result {
            Ok(response) => {
                if let Some(intent) = &response.intent {
                    debug!(%intent, "user intent");
                }
                if let Some(filters) = &response.filters_applied {
                    debug!(%filters, "filters applied");
                }

                let reply = render_reply(&response);
                let canonical = response.response.unwrap_or(reply.text);

                self.view.append_turn(Turn::assistant(reply.body));
                self.history.push(ChatMessage::assistant(canonical));
                Outcome::Answered
            }
            Err(err) => {
                error!(error = %err, "property query failed");
                self.view
                    .append_turn(Turn::assistant(TurnBody::Error(ERROR_MESSAGE.to_string())));
                Outcome::Failed {
                    reason: err.to_string(),
                }
            }
        };

        drop(guard);
        self.view.set_controls_enabled(true);
        self.view.focus_input();
        outcome
    }

    /// Run one full submission against `transport`.
    pub async fn send_message<T>(&mut self, input: &str, transport: &T) -> Outcome
    where
        T: QueryTransport + ?Sized,
    {
        match self.begin(input) {
            Submission::Ignored => Outcome::Ignored,
            Submission::Greeting => {
                tokio::time::sleep(GREETING_DELAY).await;
                self.deliver_greeting();
                Outcome::Greeted
            }
            Submission::Query(pending) => {
                let (request, guard) = pending.into_parts();
                let result = transport.query(&request).await;
                self.finish(guard, result)
            }
        }
    }
}
