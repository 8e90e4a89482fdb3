//! Conversation state machine.
//!
//! [`ConversationStore::dispatch`] applies one [`Event`] to the state and
//! returns the [`Effect`]s the caller must perform. The store never performs
//! I/O itself: whoever runs the effects (the TUI's task poller or
//! [`crate::session::Session`]) feeds each outcome back in as another event.

use chrono::Utc;

use crate::client::{ChatReply, HistoryRecord};
use crate::error::TransportError;
use crate::state::{ConversationState, HistoryEntry, Message};

/// Transcript entry appended when a send fails.
pub const SEND_ERROR_MESSAGE: &str = "Sorry, there was an error processing your request.";

/// Notification raised when clearing history fails.
pub const CLEAR_ERROR_MESSAGE: &str = "Failed to clear chat history.";

/// Starter prompts offered while the transcript is empty.
pub const SUGGESTIONS: [&str; 3] = [
    "How many times did Meenakshi visit?",
    "Tell me about steel site visits",
    "What were the purposes of site visits?",
];

/// Identifies one history fetch so late results can be recognized.
pub type FetchId = u64;

#[derive(Debug)]
pub enum Event {
    Submit(String),
    SendSucceeded(ChatReply),
    SendFailed(TransportError),
    RefreshHistory,
    HistoryLoaded { id: FetchId, records: Vec<HistoryRecord> },
    HistoryFailed { id: FetchId, error: TransportError },
    SelectHistoryEntry(String),
    DraftChanged(String),
    /// The user already answered yes to the confirmation prompt.
    ClearConfirmed,
    Cleared,
    ClearFailed(TransportError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    Send(String),
    FetchHistory(FetchId),
    ClearHistory,
    /// Must be shown to the user in a blocking way.
    Notify(String),
}

#[derive(Debug, Default)]
pub struct ConversationStore {
    state: ConversationState,
    next_fetch: FetchId,
    // Newest fetch whose snapshot made it into `history`
    applied_fetch: Option<FetchId>,
    // Fetches issued before this id predate the last successful clear
    fetch_floor: FetchId,
}

impl ConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &ConversationState {
        &self.state
    }

    pub fn dispatch(&mut self, event: Event) -> Vec<Effect> {
        match event {
            Event::Submit(text) => self.on_submit(text),
            Event::SendSucceeded(reply) => self.on_send_succeeded(reply),
            Event::SendFailed(error) => self.on_send_failed(error),
            Event::RefreshHistory => vec![self.begin_fetch()],
            Event::HistoryLoaded { id, records } => {
                self.on_history_loaded(id, records);
                Vec::new()
            }
            Event::HistoryFailed { id, error } => {
                self.on_history_failed(id, error);
                Vec::new()
            }
            Event::SelectHistoryEntry(question) | Event::DraftChanged(question) => {
                self.state.draft_input = question;
                Vec::new()
            }
            Event::ClearConfirmed => self.on_clear_confirmed(),
            Event::Cleared => {
                self.on_cleared();
                Vec::new()
            }
            Event::ClearFailed(error) => self.on_clear_failed(error),
        }
    }

    pub fn submit_message(&mut self, text: impl Into<String>) -> Vec<Effect> {
        self.dispatch(Event::Submit(text.into()))
    }

    pub fn refresh_history(&mut self) -> Vec<Effect> {
        self.dispatch(Event::RefreshHistory)
    }

    pub fn select_history_entry(&mut self, question: impl Into<String>) -> Vec<Effect> {
        self.dispatch(Event::SelectHistoryEntry(question.into()))
    }

    pub fn set_draft(&mut self, draft: impl Into<String>) -> Vec<Effect> {
        self.dispatch(Event::DraftChanged(draft.into()))
    }

    /// Caller must have confirmed with the user first.
    pub fn clear_all(&mut self) -> Vec<Effect> {
        self.dispatch(Event::ClearConfirmed)
    }

    fn on_submit(&mut self, text: String) -> Vec<Effect> {
        if text.trim().is_empty() || self.state.is_sending {
            return Vec::new();
        }

        self.state
            .messages
            .push(Message::user(text.clone(), Utc::now().to_rfc3339()));
        self.state.draft_input.clear();
        self.state.is_sending = true;

        vec![Effect::Send(text)]
    }

    fn on_send_succeeded(&mut self, reply: ChatReply) -> Vec<Effect> {
        if !self.state.is_sending {
            log::warn!("Ignoring chat reply with no send in flight");
            return Vec::new();
        }

        self.state
            .messages
            .push(Message::bot(reply.message, Some(reply.timestamp)));
        let refresh = self.begin_fetch();
        self.state.is_sending = false;

        vec![refresh]
    }

    fn on_send_failed(&mut self, error: TransportError) -> Vec<Effect> {
        if !self.state.is_sending {
            log::warn!("Ignoring send failure with no send in flight: {}", error);
            return Vec::new();
        }

        log::warn!("Error sending message: {}", error);
        self.state.messages.push(Message::bot(
            SEND_ERROR_MESSAGE,
            Some(Utc::now().to_rfc3339()),
        ));
        self.state.is_sending = false;

        Vec::new()
    }

    fn begin_fetch(&mut self) -> Effect {
        let id = self.next_fetch;
        self.next_fetch += 1;

        // Spinner only until the first snapshot lands
        if self.applied_fetch.is_none() {
            self.state.is_history_loading = true;
        }

        Effect::FetchHistory(id)
    }

    fn is_latest_fetch(&self, id: FetchId) -> bool {
        id + 1 >= self.next_fetch
    }

    fn on_history_loaded(&mut self, id: FetchId, records: Vec<HistoryRecord>) {
        if self.is_latest_fetch(id) {
            self.state.is_history_loading = false;
        }

        let superseded = self.applied_fetch.is_some_and(|applied| id <= applied);
        if superseded || id < self.fetch_floor {
            log::debug!("Dropping stale history snapshot #{}", id);
            return;
        }

        self.state.history = records
            .into_iter()
            .map(|record| HistoryEntry { question: record.question })
            .collect();
        self.applied_fetch = Some(id);
        self.state.is_history_loading = false;
    }

    fn on_history_failed(&mut self, id: FetchId, error: TransportError) {
        log::warn!("Error fetching chat history: {}", error);
        if self.is_latest_fetch(id) {
            self.state.is_history_loading = false;
        }
    }

    fn on_clear_confirmed(&mut self) -> Vec<Effect> {
        if self.state.is_clearing {
            return Vec::new();
        }
        self.state.is_clearing = true;
        vec![Effect::ClearHistory]
    }

    fn on_cleared(&mut self) {
        self.state.history.clear();
        self.state.messages.clear();
        self.state.is_clearing = false;
        self.fetch_floor = self.next_fetch;
    }

    fn on_clear_failed(&mut self, error: TransportError) -> Vec<Effect> {
        log::warn!("Error clearing history: {}", error);
        self.state.is_clearing = false;
        vec![Effect::Notify(CLEAR_ERROR_MESSAGE.to_string())]
    }
}
