#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use rag::{
    AssistantHandle, AssistantSpec, AssistantsApi, ConversationHandle, Document, FileBatch,
    FileCounts, FileHandle, IndexHandle, MessageContent, PollPolicy, RagError, Result, Role, Run,
    RunHandle, RunStatus, SessionSettings, TextContent, ThreadMessage,
};

/// How the newest entry of the message list looks after a completed run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ReplyShape {
    #[default]
    Text,
    NonText,
    Missing,
}

#[derive(Default)]
struct State {
    next_id: usize,
    fail_on: Option<&'static str>,
    batch_status: Option<String>,
    run_script: VecDeque<RunStatus>,
    run_fetches: usize,
    messages: Vec<(String, Role, String)>,
    reply: Option<String>,
    reply_shape: ReplyShape,
    deleted: Vec<String>,
    calls: Vec<&'static str>,
}

/// In-memory stand-in for the hosted service with scripted run statuses.
#[derive(Default)]
pub struct ScriptedApi {
    state: Mutex<State>,
}

impl ScriptedApi {
    pub fn new() -> Self {
        let api = Self::default();
        api.set_reply("Q4 revenue was 12M [budget.csv]");
        api
    }

    pub fn fail_on(&self, op: &'static str) {
        self.state.lock().unwrap().fail_on = Some(op);
    }

    pub fn succeed(&self) {
        self.state.lock().unwrap().fail_on = None;
    }

    pub fn set_batch_status(&self, status: &str) {
        self.state.lock().unwrap().batch_status = Some(status.to_string());
    }

    pub fn script_run(&self, statuses: &[&str]) {
        let mut state = self.state.lock().unwrap();
        state.run_script = statuses.iter().map(|s| RunStatus::from(*s)).collect();
        state.run_fetches = 0;
    }

    pub fn set_reply(&self, text: &str) {
        self.state.lock().unwrap().reply = Some(text.to_string());
    }

    pub fn set_reply_shape(&self, shape: ReplyShape) {
        self.state.lock().unwrap().reply_shape = shape;
    }

    pub fn run_fetches(&self) -> usize {
        self.state.lock().unwrap().run_fetches
    }

    pub fn deleted(&self) -> Vec<String> {
        self.state.lock().unwrap().deleted.clone()
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn remote_messages(&self) -> Vec<(String, Role, String)> {
        self.state.lock().unwrap().messages.clone()
    }

    fn enter(&self, op: &'static str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(op);
        if state.fail_on == Some(op) {
            return Err(RagError::Status {
                method: "POST",
                url: format!("https://api.test/{}", op),
                status: 500,
                body: "boom".to_string(),
            });
        }
        Ok(())
    }

    fn mint(&self, prefix: &str) -> String {
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        format!("{}_{}", prefix, state.next_id)
    }

    fn batch(&self, id: String) -> FileBatch {
        let status = self
            .state
            .lock()
            .unwrap()
            .batch_status
            .clone()
            .unwrap_or_else(|| "completed".to_string());
        FileBatch {
            id,
            status,
            file_counts: FileCounts::default(),
        }
    }
}

impl AssistantsApi for ScriptedApi {
    fn create_index(&self, _name: &str) -> Result<IndexHandle> {
        self.enter("create_index")?;
        Ok(IndexHandle::new(self.mint("vs")))
    }

    fn upload_file(&self, _name: &str, _bytes: Vec<u8>) -> Result<FileHandle> {
        self.enter("upload_file")?;
        Ok(FileHandle::new(self.mint("file")))
    }

    fn attach_files(&self, _index: &IndexHandle, _files: &[FileHandle]) -> Result<FileBatch> {
        self.enter("attach_files")?;
        let mut batch = self.batch(self.mint("vsfb"));
        batch.status = "in_progress".to_string();
        Ok(batch)
    }

    fn get_file_batch(&self, _index: &IndexHandle, batch_id: &str) -> Result<FileBatch> {
        self.enter("get_file_batch")?;
        Ok(self.batch(batch_id.to_string()))
    }

    fn create_assistant(&self, _spec: &AssistantSpec, _index: &IndexHandle) -> Result<AssistantHandle> {
        self.enter("create_assistant")?;
        Ok(AssistantHandle::new(self.mint("asst")))
    }

    fn create_conversation(&self) -> Result<ConversationHandle> {
        self.enter("create_conversation")?;
        Ok(ConversationHandle::new(self.mint("thread")))
    }

    fn append_message(&self, conversation: &ConversationHandle, role: Role, text: &str) -> Result<String> {
        self.enter("append_message")?;
        self.state
            .lock()
            .unwrap()
            .messages
            .push((conversation.to_string(), role, text.to_string()));
        Ok(self.mint("msg"))
    }

    fn start_run(&self, _conversation: &ConversationHandle, _assistant: &AssistantHandle) -> Result<Run> {
        self.enter("start_run")?;
        Ok(Run {
            id: RunHandle::new(self.mint("run")),
            status: RunStatus::Queued,
            last_error: None,
        })
    }

    fn get_run(&self, _conversation: &ConversationHandle, run: &RunHandle) -> Result<Run> {
        self.enter("get_run")?;
        let mut state = self.state.lock().unwrap();
        state.run_fetches += 1;
        let status = state.run_script.pop_front().unwrap_or(RunStatus::Completed);
        Ok(Run {
            id: run.clone(),
            status,
            last_error: None,
        })
    }

    fn list_messages(&self, conversation: &ConversationHandle) -> Result<Vec<ThreadMessage>> {
        self.enter("list_messages")?;
        let (reply, shape) = {
            let state = self.state.lock().unwrap();
            (state.reply.clone().unwrap_or_default(), state.reply_shape)
        };
        let mut out = Vec::new();
        match shape {
            ReplyShape::Text => out.push(ThreadMessage {
                id: self.mint("msg"),
                role: Role::Assistant,
                content: vec![MessageContent::Text {
                    text: TextContent { value: reply },
                }],
            }),
            ReplyShape::NonText => out.push(ThreadMessage {
                id: self.mint("msg"),
                role: Role::Assistant,
                content: vec![MessageContent::Other],
            }),
            ReplyShape::Missing => return Ok(out),
        }
        let state = self.state.lock().unwrap();
        for (thread, role, text) in state.messages.iter().rev() {
            if thread == conversation.as_str() {
                out.push(ThreadMessage {
                    id: "msg_prior".to_string(),
                    role: *role,
                    content: vec![MessageContent::Text {
                        text: TextContent { value: text.clone() },
                    }],
                });
            }
        }
        Ok(out)
    }

    fn delete_index(&self, index: &IndexHandle) -> Result<()> {
        self.enter("delete_index")?;
        self.state.lock().unwrap().deleted.push(index.to_string());
        Ok(())
    }

    fn delete_file(&self, file: &FileHandle) -> Result<()> {
        self.enter("delete_file")?;
        self.state.lock().unwrap().deleted.push(file.to_string());
        Ok(())
    }

    fn delete_assistant(&self, assistant: &AssistantHandle) -> Result<()> {
        self.enter("delete_assistant")?;
        self.state.lock().unwrap().deleted.push(assistant.to_string());
        Ok(())
    }

    fn delete_conversation(&self, conversation: &ConversationHandle) -> Result<()> {
        self.enter("delete_conversation")?;
        self.state.lock().unwrap().deleted.push(conversation.to_string());
        Ok(())
    }
}

pub fn settings(teardown: bool) -> SessionSettings {
    let fast = PollPolicy::new(Duration::ZERO, Some(Duration::from_secs(5)));
    SessionSettings {
        assistant: AssistantSpec {
            name: "Company Data Assistant".to_string(),
            instructions: rag::DEFAULT_INSTRUCTIONS.to_string(),
            model: "gpt-4-turbo-preview".to_string(),
        },
        index_name: "Company Documents POC".to_string(),
        run_policy: fast,
        index_policy: fast,
        teardown,
    }
}

pub fn docs() -> Vec<Document> {
    vec![
        Document {
            name: "budget.csv".to_string(),
            bytes: b"dept,amount\nops,12".to_vec(),
        },
        Document {
            name: "strategy.md".to_string(),
            bytes: b"# Strategy".to_vec(),
        },
    ]
}
