use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::api::{AssistantSpec, AssistantsApi};
use crate::config::Config;
use crate::error::{RagError, Result};
use crate::http::HttpClient;
use crate::types::{
    AssistantHandle, ConversationHandle, FileBatch, FileHandle, IndexHandle, Role, Run, RunHandle,
    ThreadMessage,
};

#[derive(Deserialize)]
struct Created {
    id: String,
}

#[derive(Deserialize)]
struct MessageList {
    data: Vec<ThreadMessage>,
}

#[derive(Serialize)]
struct CreateBatch<'a> {
    file_ids: Vec<&'a str>,
}

#[derive(Serialize)]
struct CreateMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct CreateRun<'a> {
    assistant_id: &'a str,
}

/// Assistants v2 REST client.
#[derive(Clone)]
pub struct OpenAiClient {
    http: HttpClient,
}

impl OpenAiClient {
    pub fn from_config(cfg: &Config) -> Result<Self> {
        let key = cfg.api_key.as_deref().ok_or(RagError::MissingApiKey)?;
        Ok(Self {
            http: HttpClient::new(&cfg.base_url, key, cfg.http_timeout)?,
        })
    }
}

impl AssistantsApi for OpenAiClient {
    fn create_index(&self, name: &str) -> Result<IndexHandle> {
        let res: Created = self.http.post_json("vector_stores", &json!({ "name": name }))?;
        Ok(IndexHandle::new(res.id))
    }

    fn upload_file(&self, name: &str, bytes: Vec<u8>) -> Result<FileHandle> {
        let res: Created = self.http.post_file("files", "assistants", name, bytes)?;
        Ok(FileHandle::new(res.id))
    }

    fn attach_files(&self, index: &IndexHandle, files: &[FileHandle]) -> Result<FileBatch> {
        let body = CreateBatch {
            file_ids: files.iter().map(FileHandle::as_str).collect(),
        };
        self.http
            .post_json(&format!("vector_stores/{}/file_batches", index), &body)
    }

    fn get_file_batch(&self, index: &IndexHandle, batch_id: &str) -> Result<FileBatch> {
        self.http
            .get_json(&format!("vector_stores/{}/file_batches/{}", index, batch_id))
    }

    fn create_assistant(&self, spec: &AssistantSpec, index: &IndexHandle) -> Result<AssistantHandle> {
        let body = json!({
            "name": spec.name,
            "instructions": spec.instructions,
            "model": spec.model,
            "tools": [{ "type": "file_search" }],
            "tool_resources": {
                "file_search": { "vector_store_ids": [index.as_str()] }
            }
        });
        let res: Created = self.http.post_json("assistants", &body)?;
        Ok(AssistantHandle::new(res.id))
    }

    fn create_conversation(&self) -> Result<ConversationHandle> {
        let res: Created = self.http.post_json("threads", &json!({}))?;
        Ok(ConversationHandle::new(res.id))
    }

    fn append_message(&self, conversation: &ConversationHandle, role: Role, text: &str) -> Result<String> {
        let body = CreateMessage {
            role: role.as_str(),
            content: text,
        };
        let res: Created = self
            .http
            .post_json(&format!("threads/{}/messages", conversation), &body)?;
        Ok(res.id)
    }

    fn start_run(&self, conversation: &ConversationHandle, assistant: &AssistantHandle) -> Result<Run> {
        let body = CreateRun {
            assistant_id: assistant.as_str(),
        };
        self.http
            .post_json(&format!("threads/{}/runs", conversation), &body)
    }

    fn get_run(&self, conversation: &ConversationHandle, run: &RunHandle) -> Result<Run> {
        self.http
            .get_json(&format!("threads/{}/runs/{}", conversation, run))
    }

    fn list_messages(&self, conversation: &ConversationHandle) -> Result<Vec<ThreadMessage>> {
        let res: MessageList = self
            .http
            .get_json(&format!("threads/{}/messages?order=desc", conversation))?;
        Ok(res.data)
    }

    fn delete_index(&self, index: &IndexHandle) -> Result<()> {
        self.http.delete(&format!("vector_stores/{}", index))
    }

    fn delete_file(&self, file: &FileHandle) -> Result<()> {
        self.http.delete(&format!("files/{}", file))
    }

    fn delete_assistant(&self, assistant: &AssistantHandle) -> Result<()> {
        self.http.delete(&format!("assistants/{}", assistant))
    }

    fn delete_conversation(&self, conversation: &ConversationHandle) -> Result<()> {
        self.http.delete(&format!("threads/{}", conversation))
    }
}
