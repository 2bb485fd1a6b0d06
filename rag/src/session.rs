use tracing::{error, info, warn};

use crate::api::{AssistantSpec, AssistantsApi};
use crate::config::Config;
use crate::documents::Document;
use crate::error::{RagError, Result};
use crate::poll::{wait_until, CancelToken, PollPolicy};
use crate::types::{
    AssistantHandle, ChatTurn, ConversationHandle, FileHandle, IndexHandle, Role, RunStatus,
};

#[derive(Clone, Debug)]
pub struct SessionSettings {
    pub assistant: AssistantSpec,
    pub index_name: String,
    pub run_policy: PollPolicy,
    pub index_policy: PollPolicy,
    /// Delete remote objects before they are replaced.
    pub teardown: bool,
}

impl SessionSettings {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            assistant: AssistantSpec {
                name: cfg.assistant_name.clone(),
                instructions: cfg.instructions.clone(),
                model: cfg.model.clone(),
            },
            index_name: cfg.vector_store_name.clone(),
            run_policy: PollPolicy::new(cfg.poll_interval, cfg.run_timeout),
            index_policy: PollPolicy::new(cfg.poll_interval, cfg.index_timeout),
            teardown: cfg.teardown,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SessionStatus {
    pub index_ready: bool,
    pub assistant_ready: bool,
    pub conversation_ready: bool,
    pub files_uploaded: usize,
}

impl SessionStatus {
    pub fn is_ready(&self) -> bool {
        self.index_ready && self.assistant_ready && self.conversation_ready
    }
}

/// One user's chat context: the local transcript plus the three remote handles.
///
/// `setup` fills the handles strictly in order (index, assistant, conversation)
/// and stops at the first failure, so the set of populated handles is always a
/// prefix of that order.
#[derive(Debug)]
pub struct Session {
    settings: SessionSettings,
    history: Vec<ChatTurn>,
    index: Option<IndexHandle>,
    assistant: Option<AssistantHandle>,
    conversation: Option<ConversationHandle>,
    files: Vec<FileHandle>,
}

impl Session {
    pub fn new(settings: SessionSettings) -> Self {
        Self {
            settings,
            history: Vec::new(),
            index: None,
            assistant: None,
            conversation: None,
            files: Vec::new(),
        }
    }

    pub fn history(&self) -> &[ChatTurn] {
        &self.history
    }

    pub fn index(&self) -> Option<&IndexHandle> {
        self.index.as_ref()
    }

    pub fn assistant(&self) -> Option<&AssistantHandle> {
        self.assistant.as_ref()
    }

    pub fn conversation(&self) -> Option<&ConversationHandle> {
        self.conversation.as_ref()
    }

    pub fn status(&self) -> SessionStatus {
        SessionStatus {
            index_ready: self.index.is_some(),
            assistant_ready: self.assistant.is_some(),
            conversation_ready: self.conversation.is_some(),
            files_uploaded: self.files.len(),
        }
    }

    /// Full setup: index the documents, create the assistant, open a conversation.
    pub fn setup(&mut self, api: &dyn AssistantsApi, docs: Vec<Document>, cancel: &CancelToken) -> Result<()> {
        if docs.is_empty() {
            return Err(RagError::NoDocuments);
        }
        if self.settings.teardown {
            self.teardown(api);
        } else {
            self.forget_handles();
        }

        let result = self
            .provision_index(api, docs, cancel)
            .and_then(|_| self.provision_assistant(api))
            .and_then(|_| self.provision_conversation(api));
        match &result {
            Ok(()) => info!(files = self.files.len(), "setup complete"),
            Err(err) => error!(error = %err, status = ?self.status(), "setup aborted"),
        }
        result
    }

    pub fn provision_index(&mut self, api: &dyn AssistantsApi, docs: Vec<Document>, cancel: &CancelToken) -> Result<()> {
        self.index = None;
        if self.settings.teardown {
            self.delete_files(api);
        } else {
            self.files.clear();
        }
        if docs.is_empty() {
            return Err(RagError::NoDocuments);
        }

        let index = api.create_index(&self.settings.index_name)?;
        let mut files = Vec::with_capacity(docs.len());
        let result = self.populate_index(api, &index, docs, &mut files, cancel);
        self.files = files;
        match result {
            Ok(()) => {
                info!(index = %index, files = self.files.len(), "index ready");
                self.index = Some(index);
                Ok(())
            }
            Err(err) => {
                if self.settings.teardown {
                    discard("index", api.delete_index(&index));
                    self.delete_files(api);
                } else {
                    self.files.clear();
                }
                Err(err)
            }
        }
    }

    /// Uploads every document into `files` as it goes, so a failure partway
    /// still leaves the caller holding what was created.
    fn populate_index(
        &self,
        api: &dyn AssistantsApi,
        index: &IndexHandle,
        docs: Vec<Document>,
        files: &mut Vec<FileHandle>,
        cancel: &CancelToken,
    ) -> Result<()> {
        for doc in docs {
            let name = doc.name;
            let file = api.upload_file(&name, doc.bytes)?;
            info!(file = %file, name = %name, "uploaded");
            files.push(file);
        }

        let batch = api.attach_files(index, &files[..])?;
        let batch_id = batch.id.clone();
        let batch = wait_until(
            batch,
            || api.get_file_batch(index, &batch_id),
            |b| b.is_pending(),
            self.settings.index_policy,
            cancel,
        )?;
        if batch.status != "completed" {
            return Err(RagError::IndexingFailed(batch.status));
        }
        if batch.file_counts.failed > 0 {
            warn!(failed = batch.file_counts.failed, total = batch.file_counts.total, "some files were not indexed");
        }
        Ok(())
    }

    pub fn provision_assistant(&mut self, api: &dyn AssistantsApi) -> Result<()> {
        self.assistant = None;
        let index = self.index.as_ref().ok_or(RagError::NotReady("index"))?;
        let assistant = api.create_assistant(&self.settings.assistant, index)?;
        info!(assistant = %assistant, model = %self.settings.assistant.model, "assistant ready");
        self.assistant = Some(assistant);
        Ok(())
    }

    pub fn provision_conversation(&mut self, api: &dyn AssistantsApi) -> Result<()> {
        self.conversation = None;
        let conversation = api.create_conversation()?;
        info!(conversation = %conversation, "conversation opened");
        self.conversation = Some(conversation);
        Ok(())
    }

    /// Sends one user message and waits for the assistant's reply.
    ///
    /// The user turn is recorded locally before anything remote happens; the
    /// assistant turn only on a completed run.
    pub fn submit_turn(&mut self, api: &dyn AssistantsApi, text: &str, cancel: &CancelToken) -> Result<&str> {
        if self.index.is_none() {
            return Err(RagError::NotReady("index"));
        }
        let assistant = self.assistant.clone().ok_or(RagError::NotReady("assistant"))?;
        let conversation = self.conversation.clone().ok_or(RagError::NotReady("conversation"))?;

        self.history.push(ChatTurn {
            role: Role::User,
            text: text.to_string(),
        });

        match execute_turn(api, &conversation, &assistant, text, self.settings.run_policy, cancel) {
            Ok(reply) => {
                self.history.push(ChatTurn {
                    role: Role::Assistant,
                    text: reply,
                });
                Ok(self.history.last().map(|t| t.text.as_str()).unwrap_or_default())
            }
            Err(err) => {
                error!(error = %err, conversation = %conversation, "turn aborted");
                Err(err)
            }
        }
    }

    /// Empties the transcript and swaps in a fresh conversation.
    ///
    /// If the new conversation cannot be created the handle stays unset; the
    /// previous one is never restored.
    pub fn clear_chat(&mut self, api: &dyn AssistantsApi) -> Result<()> {
        self.history.clear();
        let old = self.conversation.take();
        self.provision_conversation(api)?;
        if let (Some(old), true) = (old, self.settings.teardown) {
            discard("conversation", api.delete_conversation(&old));
        }
        Ok(())
    }

    /// Deletes every remote object this session owns and unsets the handles.
    /// Failures are logged and otherwise ignored.
    pub fn teardown(&mut self, api: &dyn AssistantsApi) {
        if let Some(conversation) = self.conversation.take() {
            discard("conversation", api.delete_conversation(&conversation));
        }
        if let Some(assistant) = self.assistant.take() {
            discard("assistant", api.delete_assistant(&assistant));
        }
        if let Some(index) = self.index.take() {
            discard("index", api.delete_index(&index));
        }
        self.delete_files(api);
    }

    fn delete_files(&mut self, api: &dyn AssistantsApi) {
        for file in self.files.drain(..) {
            discard("file", api.delete_file(&file));
        }
    }

    fn forget_handles(&mut self) {
        self.conversation = None;
        self.assistant = None;
        self.index = None;
        self.files.clear();
    }
}

/// Runs one remote turn: post the message, start a run, poll it to a terminal
/// status, and read back the newest message on completion.
pub fn execute_turn(
    api: &dyn AssistantsApi,
    conversation: &ConversationHandle,
    assistant: &AssistantHandle,
    text: &str,
    policy: PollPolicy,
    cancel: &CancelToken,
) -> Result<String> {
    api.append_message(conversation, Role::User, text)?;
    let run = api.start_run(conversation, assistant)?;
    let run_id = run.id.clone();
    info!(run = %run_id, status = %run.status, "run started");

    let run = wait_until(
        run,
        || api.get_run(conversation, &run_id),
        |r| r.status.is_pending(),
        policy,
        cancel,
    )?;

    if run.status != RunStatus::Completed {
        return Err(RagError::RunFailed {
            status: run.status,
            detail: run.last_error.and_then(|e| e.message),
        });
    }

    let messages = api.list_messages(conversation)?;
    let reply = messages
        .first()
        .and_then(|m| m.text())
        .ok_or(RagError::EmptyReply)?;
    info!(run = %run_id, chars = reply.len(), "run completed");
    Ok(reply.to_string())
}

fn discard(what: &str, result: Result<()>) {
    if let Err(err) = result {
        warn!(error = %err, "failed to delete {}", what);
    }
}
