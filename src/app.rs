use ratatui::layout::Rect;
use ratatui::widgets::ListState;
use tokio::task::{JoinError, JoinHandle};

use sitechat::client::{ChatReply, ChatService, ChatServiceClient, ClearAck, HistoryResponse};
use sitechat::store::{ConversationStore, Effect, Event, FetchId, SUGGESTIONS};
use sitechat::TransportError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Editing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusPane {
    History,
    Transcript,
    Input,
}

impl FocusPane {
    pub fn next(self) -> Self {
        match self {
            FocusPane::History => FocusPane::Transcript,
            FocusPane::Transcript => FocusPane::Input,
            FocusPane::Input => FocusPane::History,
        }
    }

    pub fn prev(self) -> Self {
        match self {
            FocusPane::History => FocusPane::Input,
            FocusPane::Transcript => FocusPane::History,
            FocusPane::Input => FocusPane::Transcript,
        }
    }
}

/// Modal overlays; while one is open it receives every key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Popup {
    ConfirmClear,
    Notice(String),
}

type TaskResult<T> = Result<Result<T, TransportError>, JoinError>;

pub struct App {
    // Core state
    pub should_quit: bool,
    pub input_mode: InputMode,
    pub focus: FocusPane,
    pub popup: Option<Popup>,

    pub store: ConversationStore,
    pub api_url: String,
    client: ChatServiceClient,

    // Draft cursor, in chars
    pub draft_cursor: usize,

    // Sidebar
    pub history_state: ListState,

    // Transcript viewport; render keeps height and max_scroll current
    pub transcript_scroll: u16,
    pub transcript_max_scroll: u16,
    pub transcript_height: u16,
    pub follow_transcript: bool,

    // Animation state
    pub animation_frame: u8,

    // Panel areas for mouse hit-testing (updated during render)
    pub history_area: Option<Rect>,
    pub transcript_area: Option<Rect>,

    // In-flight network work
    send_task: Option<JoinHandle<Result<ChatReply, TransportError>>>,
    history_tasks: Vec<(FetchId, JoinHandle<Result<HistoryResponse, TransportError>>)>,
    clear_task: Option<JoinHandle<Result<ClearAck, TransportError>>>,
}

impl App {
    pub fn new(client: ChatServiceClient) -> Self {
        Self {
            should_quit: false,
            input_mode: InputMode::Editing,
            focus: FocusPane::Input,
            popup: None,

            store: ConversationStore::new(),
            api_url: client.base_url().to_string(),
            client,

            draft_cursor: 0,
            history_state: ListState::default(),

            transcript_scroll: 0,
            transcript_max_scroll: 0,
            transcript_height: 0,
            follow_transcript: true,

            animation_frame: 0,

            history_area: None,
            transcript_area: None,

            send_task: None,
            history_tasks: Vec::new(),
            clear_task: None,
        }
    }

    /// Kick off the initial history load
    pub fn start(&mut self) {
        let effects = self.store.refresh_history();
        self.apply(effects);
    }

    /// Spawn a task for every effect; results come back through `poll_tasks`.
    fn apply(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::Send(text) => {
                    let client = self.client.clone();
                    self.send_task = Some(tokio::spawn(async move { client.send(&text).await }));
                }
                Effect::FetchHistory(id) => {
                    let client = self.client.clone();
                    let task = tokio::spawn(async move { client.fetch_history().await });
                    self.history_tasks.push((id, task));
                }
                Effect::ClearHistory => {
                    let client = self.client.clone();
                    self.clear_task = Some(tokio::spawn(async move { client.clear_history().await }));
                }
                Effect::Notify(message) => {
                    self.popup = Some(Popup::Notice(message));
                }
            }
        }
    }

    fn dispatch(&mut self, event: Event) {
        let effects = self.store.dispatch(event);
        self.apply(effects);
        self.clamp_history_selection();
    }

    pub fn has_pending_tasks(&self) -> bool {
        self.send_task.is_some() || self.clear_task.is_some() || !self.history_tasks.is_empty()
    }

    /// Feed finished network tasks back into the store
    pub async fn poll_tasks(&mut self) {
        if self.send_task.as_ref().is_some_and(|t| t.is_finished()) {
            if let Some(task) = self.send_task.take() {
                let event = match flatten(task.await) {
                    Ok(reply) => Event::SendSucceeded(reply),
                    Err(error) => Event::SendFailed(error),
                };
                self.follow_transcript = true;
                self.dispatch(event);
            }
        }

        let (finished, pending): (Vec<_>, Vec<_>) = std::mem::take(&mut self.history_tasks)
            .into_iter()
            .partition(|(_, task)| task.is_finished());
        self.history_tasks = pending;
        for (id, task) in finished {
            let event = match flatten(task.await) {
                Ok(response) => Event::HistoryLoaded {
                    id,
                    records: response.history,
                },
                Err(error) => Event::HistoryFailed { id, error },
            };
            self.dispatch(event);
        }

        if self.clear_task.as_ref().is_some_and(|t| t.is_finished()) {
            if let Some(task) = self.clear_task.take() {
                let event = match flatten(task.await) {
                    Ok(_) => Event::Cleared,
                    Err(error) => Event::ClearFailed(error),
                };
                self.dispatch(event);
                self.transcript_scroll = 0;
            }
        }
    }

    /// Cancel everything still in flight (view teardown)
    pub fn shutdown(&mut self) {
        if self.has_pending_tasks() {
            log::debug!("Cancelling in-flight requests");
        }
        if let Some(task) = self.send_task.take() {
            task.abort();
        }
        if let Some(task) = self.clear_task.take() {
            task.abort();
        }
        for (_, task) in self.history_tasks.drain(..) {
            task.abort();
        }
    }

    // Draft editing

    pub fn draft(&self) -> &str {
        &self.store.state().draft_input
    }

    fn replace_draft(&mut self, draft: String, cursor: usize) {
        self.store.set_draft(draft);
        self.draft_cursor = cursor.min(self.draft().chars().count());
    }

    pub fn insert_str(&mut self, text: &str) {
        // Single-line input
        let text: String = text.chars().filter(|c| *c != '\n' && *c != '\r').collect();
        let mut draft = self.draft().to_string();
        let byte_pos = char_to_byte_index(&draft, self.draft_cursor);
        draft.insert_str(byte_pos, &text);
        let cursor = self.draft_cursor + text.chars().count();
        self.replace_draft(draft, cursor);
    }

    pub fn insert_char(&mut self, c: char) {
        let mut buf = [0u8; 4];
        self.insert_str(c.encode_utf8(&mut buf));
    }

    pub fn delete_back(&mut self) {
        if self.draft_cursor > 0 {
            let mut draft = self.draft().to_string();
            let byte_pos = char_to_byte_index(&draft, self.draft_cursor - 1);
            draft.remove(byte_pos);
            let cursor = self.draft_cursor - 1;
            self.replace_draft(draft, cursor);
        }
    }

    pub fn delete_forward(&mut self) {
        let char_count = self.draft().chars().count();
        if self.draft_cursor < char_count {
            let mut draft = self.draft().to_string();
            let byte_pos = char_to_byte_index(&draft, self.draft_cursor);
            draft.remove(byte_pos);
            let cursor = self.draft_cursor;
            self.replace_draft(draft, cursor);
        }
    }

    pub fn cursor_left(&mut self) {
        self.draft_cursor = self.draft_cursor.saturating_sub(1);
    }

    pub fn cursor_right(&mut self) {
        let char_count = self.draft().chars().count();
        self.draft_cursor = (self.draft_cursor + 1).min(char_count);
    }

    pub fn cursor_home(&mut self) {
        self.draft_cursor = 0;
    }

    pub fn cursor_end(&mut self) {
        self.draft_cursor = self.draft().chars().count();
    }

    /// Submit the current draft. Ignored for blank drafts or while a send is
    /// in flight (the store enforces both).
    pub fn submit_draft(&mut self) {
        let text = self.draft().to_string();
        let effects = self.store.submit_message(text);
        if !effects.is_empty() {
            self.draft_cursor = 0;
            self.follow_transcript = true;
        }
        self.apply(effects);
    }

    // Sidebar

    pub fn history_nav_down(&mut self) {
        let len = self.store.state().history.len();
        if len > 0 {
            let i = self.history_state.selected().unwrap_or(0);
            self.history_state.select(Some((i + 1).min(len - 1)));
        }
    }

    pub fn history_nav_up(&mut self) {
        if !self.store.state().history.is_empty() {
            let i = self.history_state.selected().unwrap_or(0);
            self.history_state.select(Some(i.saturating_sub(1)));
        }
    }

    pub fn history_first(&mut self) {
        if !self.store.state().history.is_empty() {
            self.history_state.select(Some(0));
        }
    }

    pub fn history_last(&mut self) {
        let len = self.store.state().history.len();
        if len > 0 {
            self.history_state.select(Some(len - 1));
        }
    }

    fn clamp_history_selection(&mut self) {
        let len = self.store.state().history.len();
        match self.history_state.selected() {
            _ if len == 0 => self.history_state.select(None),
            None => self.history_state.select(Some(0)),
            Some(i) if i >= len => self.history_state.select(Some(len - 1)),
            Some(_) => {}
        }
    }

    /// Copy the highlighted history question into the draft and start editing
    pub fn select_history(&mut self) {
        let question = self
            .history_state
            .selected()
            .and_then(|i| self.store.state().history.get(i))
            .map(|entry| entry.question.clone());

        if let Some(question) = question {
            self.use_as_draft(question);
        }
    }

    /// Pick one of the starter prompts (only offered on an empty transcript)
    pub fn choose_suggestion(&mut self, index: usize) {
        if !self.store.state().messages.is_empty() {
            return;
        }
        if let Some(suggestion) = SUGGESTIONS.get(index) {
            self.use_as_draft(suggestion.to_string());
        }
    }

    fn use_as_draft(&mut self, text: String) {
        self.store.select_history_entry(text);
        self.draft_cursor = self.draft().chars().count();
        self.focus = FocusPane::Input;
        self.input_mode = InputMode::Editing;
    }

    pub fn refresh_history(&mut self) {
        let effects = self.store.refresh_history();
        self.apply(effects);
    }

    // Clearing

    /// Offered only when there is history to clear
    pub fn request_clear(&mut self) {
        let state = self.store.state();
        if !state.is_clearing && !state.history.is_empty() {
            self.popup = Some(Popup::ConfirmClear);
        }
    }

    pub fn confirm_clear(&mut self) {
        self.popup = None;
        let effects = self.store.clear_all();
        self.apply(effects);
    }

    pub fn dismiss_popup(&mut self) {
        self.popup = None;
    }

    // Transcript scrolling

    pub fn scroll_down(&mut self, lines: u16) {
        self.transcript_scroll = self
            .transcript_scroll
            .saturating_add(lines)
            .min(self.transcript_max_scroll);
        self.follow_transcript = self.transcript_scroll >= self.transcript_max_scroll;
    }

    pub fn scroll_up(&mut self, lines: u16) {
        self.transcript_scroll = self.transcript_scroll.saturating_sub(lines);
        self.follow_transcript = false;
    }

    pub fn scroll_half_page_down(&mut self) {
        self.scroll_down((self.transcript_height / 2).max(1));
    }

    pub fn scroll_half_page_up(&mut self) {
        self.scroll_up((self.transcript_height / 2).max(1));
    }

    pub fn scroll_to_top(&mut self) {
        self.transcript_scroll = 0;
        self.follow_transcript = false;
    }

    pub fn scroll_to_bottom(&mut self) {
        self.transcript_scroll = self.transcript_max_scroll;
        self.follow_transcript = true;
    }

    /// Tick animation frame (called by Tick event)
    pub fn tick_animation(&mut self) {
        let state = self.store.state();
        if state.is_sending || state.is_history_loading || state.is_clearing {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }
}

fn flatten<T>(result: TaskResult<T>) -> Result<T, TransportError> {
    result.unwrap_or_else(|join_error| Err(join_error.into()))
}

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}
