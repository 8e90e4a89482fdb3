//! Sequential effect runner for the conversation store.
//!
//! The TUI runs effects as background tasks; everything else (the one-shot
//! CLI, tests) uses [`Session`], which awaits each effect in turn and feeds
//! the outcome straight back into the store.

use std::collections::VecDeque;

use crate::client::ChatService;
use crate::store::{ConversationStore, Effect, Event};

/// How a [`Session::submit_message`] call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Blank text or a send already in flight; nothing was sent.
    Ignored,
    Answered,
    /// The error placeholder was appended to the transcript.
    Failed,
}

pub struct Session<S> {
    store: ConversationStore,
    service: S,
    last_send: Option<SubmitOutcome>,
}

impl<S: ChatService> Session<S> {
    pub fn new(service: S) -> Self {
        Self {
            store: ConversationStore::new(),
            service,
            last_send: None,
        }
    }

    pub fn store(&self) -> &ConversationStore {
        &self.store
    }

    pub fn service(&self) -> &S {
        &self.service
    }

    /// Performs `effects` and every follow-up effect they produce. Returns
    /// the notifications that must be shown to the user.
    pub async fn run(&mut self, effects: Vec<Effect>) -> Vec<String> {
        let mut queue: VecDeque<Effect> = effects.into();
        let mut notices = Vec::new();

        while let Some(effect) = queue.pop_front() {
            let event = match effect {
                Effect::Send(text) => match self.service.send(&text).await {
                    Ok(reply) => {
                        self.last_send = Some(SubmitOutcome::Answered);
                        Event::SendSucceeded(reply)
                    }
                    Err(error) => {
                        self.last_send = Some(SubmitOutcome::Failed);
                        Event::SendFailed(error)
                    }
                },
                Effect::FetchHistory(id) => match self.service.fetch_history().await {
                    Ok(response) => Event::HistoryLoaded {
                        id,
                        records: response.history,
                    },
                    Err(error) => Event::HistoryFailed { id, error },
                },
                Effect::ClearHistory => match self.service.clear_history().await {
                    Ok(_) => Event::Cleared,
                    Err(error) => Event::ClearFailed(error),
                },
                Effect::Notify(message) => {
                    notices.push(message);
                    continue;
                }
            };
            queue.extend(self.store.dispatch(event));
        }

        notices
    }

    pub async fn submit_message(&mut self, text: &str) -> SubmitOutcome {
        self.last_send = None;
        let effects = self.store.submit_message(text);
        self.run(effects).await;
        self.last_send.take().unwrap_or(SubmitOutcome::Ignored)
    }

    pub async fn refresh_history(&mut self) {
        let effects = self.store.refresh_history();
        self.run(effects).await;
    }

    /// Clears server history and the transcript. The caller must have asked
    /// the user for confirmation. On failure the error is the notification
    /// to show; state is untouched.
    pub async fn clear_all(&mut self) -> Result<(), String> {
        let effects = self.store.clear_all();
        match self.run(effects).await.into_iter().next() {
            Some(notice) => Err(notice),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{ChatReply, ClearAck, HistoryRecord, HistoryResponse};
    use crate::error::TransportError;
    use crate::state::Message;
    use crate::store::{CLEAR_ERROR_MESSAGE, SEND_ERROR_MESSAGE};
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MockBackend {
        fail_send: bool,
        fail_history: bool,
        fail_clear: bool,
        history: Mutex<Vec<String>>,
        sent: Mutex<Vec<String>>,
        history_calls: Mutex<usize>,
        clear_calls: Mutex<usize>,
    }

    impl MockBackend {
        fn history_calls(&self) -> usize {
            *self.history_calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl ChatService for MockBackend {
        async fn send(&self, message: &str) -> Result<ChatReply, TransportError> {
            self.sent.lock().unwrap().push(message.to_string());
            if self.fail_send {
                return Err(TransportError::malformed("send rejected"));
            }
            self.history.lock().unwrap().insert(0, message.to_string());
            Ok(ChatReply {
                message: "3 times".to_string(),
                timestamp: "T1".to_string(),
            })
        }

        async fn fetch_history(&self) -> Result<HistoryResponse, TransportError> {
            *self.history_calls.lock().unwrap() += 1;
            if self.fail_history {
                return Err(TransportError::malformed("history unavailable"));
            }
            let history = self
                .history
                .lock()
                .unwrap()
                .iter()
                .map(|q| HistoryRecord {
                    question: q.clone(),
                    extra: serde_json::Map::new(),
                })
                .collect();
            Ok(HistoryResponse { history })
        }

        async fn clear_history(&self) -> Result<ClearAck, TransportError> {
            *self.clear_calls.lock().unwrap() += 1;
            if self.fail_clear {
                return Err(TransportError::malformed("clear rejected"));
            }
            self.history.lock().unwrap().clear();
            Ok(ClearAck(serde_json::Value::Null))
        }
    }

    #[tokio::test]
    async fn test_submit_success_refreshes_history() {
        let mut session = Session::new(MockBackend::default());

        let outcome = session.submit_message("How many times did Meenakshi visit?").await;

        assert_eq!(outcome, SubmitOutcome::Answered);
        let state = session.store().state();
        assert_eq!(state.messages.len(), 2);
        assert_eq!(state.messages[0].content, "How many times did Meenakshi visit?");
        assert!(state.messages[0].is_user);
        assert_eq!(
            state.messages[1],
            Message::bot("3 times", Some("T1".to_string()))
        );
        assert!(!state.is_sending);
        assert_eq!(session.service().history_calls(), 1);
        assert_eq!(state.history.len(), 1);
        assert_eq!(state.history[0].question, "How many times did Meenakshi visit?");
    }

    #[tokio::test]
    async fn test_submit_failure_skips_history_refresh() {
        let backend = MockBackend {
            fail_send: true,
            ..Default::default()
        };
        let mut session = Session::new(backend);

        assert_eq!(session.submit_message("hello").await, SubmitOutcome::Failed);

        let state = session.store().state();
        let last = state.messages.last().unwrap();
        assert_eq!(last.content, SEND_ERROR_MESSAGE);
        assert!(!last.is_user);
        assert!(!state.is_sending);
        assert_eq!(state.messages.len(), 2);
        assert_eq!(session.service().history_calls(), 0);
    }

    #[tokio::test]
    async fn test_whitespace_submit_never_reaches_backend() {
        let mut session = Session::new(MockBackend::default());
        assert_eq!(session.submit_message("   ").await, SubmitOutcome::Ignored);

        assert!(session.service().sent.lock().unwrap().is_empty());
        assert!(session.store().state().messages.is_empty());
    }

    #[tokio::test]
    async fn test_answer_matching_error_text_is_still_answered() {
        struct EchoesErrorText;

        #[async_trait]
        impl ChatService for EchoesErrorText {
            async fn send(&self, _message: &str) -> Result<ChatReply, TransportError> {
                Ok(ChatReply {
                    message: SEND_ERROR_MESSAGE.to_string(),
                    timestamp: "T1".to_string(),
                })
            }

            async fn fetch_history(&self) -> Result<HistoryResponse, TransportError> {
                Ok(HistoryResponse { history: Vec::new() })
            }

            async fn clear_history(&self) -> Result<ClearAck, TransportError> {
                Ok(ClearAck(serde_json::Value::Null))
            }
        }

        let mut session = Session::new(EchoesErrorText);

        let outcome = session.submit_message("what does the error say?").await;

        assert_eq!(outcome, SubmitOutcome::Answered);
        assert_eq!(session.store().state().messages[1].content, SEND_ERROR_MESSAGE);
    }

    #[tokio::test]
    async fn test_history_failure_after_send_keeps_transcript() {
        let backend = MockBackend {
            fail_history: true,
            ..Default::default()
        };
        let mut session = Session::new(backend);

        session.submit_message("question").await;

        let state = session.store().state();
        assert_eq!(state.messages.len(), 2);
        assert_eq!(state.messages[1].content, "3 times");
        assert!(state.history.is_empty());
        assert!(!state.is_history_loading);
    }

    #[tokio::test]
    async fn test_clear_all_success() {
        let mut session = Session::new(MockBackend::default());
        session.submit_message("question").await;

        assert_eq!(session.clear_all().await, Ok(()));

        let state = session.store().state();
        assert!(state.messages.is_empty());
        assert!(state.history.is_empty());
    }

    #[tokio::test]
    async fn test_clear_all_failure_reports_and_keeps_state() {
        let backend = MockBackend {
            fail_clear: true,
            ..Default::default()
        };
        let mut session = Session::new(backend);
        session.submit_message("question").await;
        let before = session.store().state().clone();

        let result = session.clear_all().await;

        assert_eq!(result, Err(CLEAR_ERROR_MESSAGE.to_string()));
        assert_eq!(session.store().state(), &before);
        assert_eq!(*session.service().clear_calls.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_initial_history_load() {
        let backend = MockBackend::default();
        backend.history.lock().unwrap().extend([
            "Tell me about steel site visits".to_string(),
            "What were the purposes of site visits?".to_string(),
        ]);
        let mut session = Session::new(backend);

        session.refresh_history().await;

        let questions: Vec<&str> = session
            .store()
            .state()
            .history
            .iter()
            .map(|h| h.question.as_str())
            .collect();
        assert_eq!(
            questions,
            ["Tell me about steel site visits", "What were the purposes of site visits?"]
        );
        assert!(!session.store().state().is_history_loading);
    }
}
