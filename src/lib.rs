pub mod client;
pub mod config;
pub mod error;
pub mod markdown;
pub mod session;
pub mod state;
pub mod store;

// Re-export main types for convenience
pub use client::{ChatReply, ChatService, ChatServiceClient, ClearAck, HistoryRecord, HistoryResponse};
pub use config::{Config, Settings};
pub use error::TransportError;
pub use session::{Session, SubmitOutcome};
pub use state::{ConversationState, HistoryEntry, Message};
pub use store::{ConversationStore, Effect, Event};
