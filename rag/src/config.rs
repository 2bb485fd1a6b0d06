use std::env;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_INSTRUCTIONS: &str = "You are a helpful assistant that answers questions about company documents.\n\
Use the uploaded files to provide accurate, detailed answers.\n\
If you can't find relevant information in the documents, say so clearly.\n\
Always cite which document you're referencing when possible.";

#[derive(Clone, Debug)]
pub struct Config {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub assistant_name: String,
    pub vector_store_name: String,
    pub instructions: String,
    pub accepted_exts: Vec<String>,
    pub poll_interval: Duration,
    pub run_timeout: Option<Duration>,
    pub index_timeout: Option<Duration>,
    pub http_timeout: Duration,
    pub teardown: bool,
    pub log_dir: PathBuf,
}

impl Config {
    pub fn from_env() -> Self {
        // Load .env if present so the key and model can be set without exporting them.
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub(crate) fn from_lookup<F>(get: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let string = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());
        let number = |key: &str, default: u64| -> u64 {
            get(key).and_then(|v| v.trim().parse().ok()).unwrap_or(default)
        };
        let bounded = |secs: u64| (secs > 0).then(|| Duration::from_secs(secs));

        Self {
            api_key: get("OPENAI_API_KEY")
                .map(|k| k.trim().to_string())
                .filter(|k| !k.is_empty()),
            base_url: string("OPENAI_BASE_URL", "https://api.openai.com/v1")
                .trim_end_matches('/')
                .to_string(),
            model: string("RAG_MODEL", "gpt-4-turbo-preview"),
            assistant_name: string("RAG_ASSISTANT_NAME", "Company Data Assistant"),
            vector_store_name: string("RAG_VECTOR_STORE_NAME", "Company Documents POC"),
            instructions: string("RAG_INSTRUCTIONS", DEFAULT_INSTRUCTIONS),
            accepted_exts: parse_exts(&string("RAG_ACCEPTED_EXTS", ".pdf,.csv,.txt,.md,.docx")),
            poll_interval: Duration::from_millis(number("RAG_POLL_INTERVAL_MS", 1000)),
            run_timeout: bounded(number("RAG_RUN_TIMEOUT_SECS", 300)),
            index_timeout: bounded(number("RAG_INDEX_TIMEOUT_SECS", 600)),
            http_timeout: Duration::from_secs(number("RAG_HTTP_TIMEOUT_SECS", 120).max(1)),
            teardown: get("RAG_TEARDOWN")
                .map(|v| !matches!(v.trim().to_lowercase().as_str(), "0" | "false" | "no" | "off"))
                .unwrap_or(true),
            log_dir: PathBuf::from(string("RAG_LOG_DIR", "./logs")),
        }
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }
}

fn parse_exts(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().trim_start_matches('.').to_lowercase())
        .filter(|s| !s.is_empty())
        .map(|s| format!(".{}", s))
        .collect()
}
