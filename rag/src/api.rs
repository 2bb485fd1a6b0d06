use crate::error::Result;
use crate::types::{
    AssistantHandle, ConversationHandle, FileBatch, FileHandle, IndexHandle, Role, Run, RunHandle,
    ThreadMessage,
};

/// What an assistant is created with. The index handle is the only grounding source.
#[derive(Clone, Debug)]
pub struct AssistantSpec {
    pub name: String,
    pub instructions: String,
    pub model: String,
}

/// Remote operations the chat session depends on. Everything behind this trait is
/// owned by the hosted service; handles are opaque.
pub trait AssistantsApi: Send + Sync {
    fn create_index(&self, name: &str) -> Result<IndexHandle>;

    fn upload_file(&self, name: &str, bytes: Vec<u8>) -> Result<FileHandle>;

    /// Starts indexing the uploaded files into the index.
    fn attach_files(&self, index: &IndexHandle, files: &[FileHandle]) -> Result<FileBatch>;

    fn get_file_batch(&self, index: &IndexHandle, batch_id: &str) -> Result<FileBatch>;

    fn create_assistant(&self, spec: &AssistantSpec, index: &IndexHandle) -> Result<AssistantHandle>;

    fn create_conversation(&self) -> Result<ConversationHandle>;

    fn append_message(&self, conversation: &ConversationHandle, role: Role, text: &str) -> Result<String>;

    fn start_run(&self, conversation: &ConversationHandle, assistant: &AssistantHandle) -> Result<Run>;

    fn get_run(&self, conversation: &ConversationHandle, run: &RunHandle) -> Result<Run>;

    /// Most recent message first.
    fn list_messages(&self, conversation: &ConversationHandle) -> Result<Vec<ThreadMessage>>;

    fn delete_index(&self, index: &IndexHandle) -> Result<()>;

    /// Uploaded files outlive the index they were attached to.
    fn delete_file(&self, file: &FileHandle) -> Result<()>;

    fn delete_assistant(&self, assistant: &AssistantHandle) -> Result<()>;

    fn delete_conversation(&self, conversation: &ConversationHandle) -> Result<()>;
}
