mod api;
mod config;
mod documents;
mod error;
mod http;
mod openai;
mod poll;
mod session;
mod types;

pub use api::{AssistantSpec, AssistantsApi};
pub use config::{Config, DEFAULT_INSTRUCTIONS};
pub use documents::{collect_documents, has_accepted_ext, Document};
pub use error::{RagError, Result};
pub use openai::OpenAiClient;
pub use poll::{wait_until, CancelToken, PollPolicy};
pub use session::{execute_turn, Session, SessionSettings, SessionStatus};
pub use types::{
    AssistantHandle, ChatTurn, ConversationHandle, FileBatch, FileCounts, FileHandle, IndexHandle,
    MessageContent, Role, Run, RunError, RunHandle, RunStatus, TextContent, ThreadMessage,
};
