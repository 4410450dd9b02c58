pub mod api;
pub mod chat_log;
pub mod config;
pub mod format;
pub mod identity;
pub mod logging;
pub mod session;
pub mod state;
pub mod storage;

// Re-export main types for convenience
pub use api::{ApiError, PropertyApiClient, PropertyListing, QueryRequest, QueryResponse, QueryTransport};
pub use chat_log::{ChatLog, InputField, LogEntry};
pub use config::Config;
pub use identity::UserId;
pub use session::{ChatSession, ChatView, Outcome, PendingQuery, ProcessingGuard, Submission};
pub use state::{ChatMessage, ChatRole, Turn, TurnBody};
pub use storage::LocalStorage;
