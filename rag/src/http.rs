use reqwest::blocking::multipart::{Form, Part};
use reqwest::blocking::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::from_str;
use std::time::Duration;

use crate::error::{RagError, Result};

const BETA_HEADER: &str = "OpenAI-Beta";
const BETA_VALUE: &str = "assistants=v2";

#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl HttpClient {
    pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(RagError::ClientBuild)?;
        Ok(Self::with_client(client, base_url, api_key))
    }

    fn with_client(client: Client, base_url: &str, api_key: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    pub fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.url(path);
        let req = self.client.get(&url);
        self.send("GET", url, req)
    }

    pub fn post_json<T: DeserializeOwned, B: Serialize>(&self, path: &str, body: &B) -> Result<T> {
        let url = self.url(path);
        let req = self.client.post(&url).json(body);
        self.send("POST", url, req)
    }

    pub fn post_file<T: DeserializeOwned>(
        &self,
        path: &str,
        purpose: &str,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<T> {
        let url = self.url(path);
        let part = Part::bytes(bytes).file_name(file_name.to_string());
        let form = Form::new()
            .text("purpose", purpose.to_string())
            .part("file", part);
        let req = self.client.post(&url).multipart(form);
        self.send("POST", url, req)
    }

    pub fn delete(&self, path: &str) -> Result<()> {
        let url = self.url(path);
        let req = self.client.delete(&url);
        self.send::<serde_json::Value>("DELETE", url, req).map(|_| ())
    }

    fn send<T: DeserializeOwned>(&self, method: &'static str, url: String, req: RequestBuilder) -> Result<T> {
        let resp = req
            .bearer_auth(&self.api_key)
            .header(BETA_HEADER, BETA_VALUE)
            .send()
            .map_err(|source| RagError::Transport { method, url: url.clone(), source })?;
        let status = resp.status();
        let text = resp.text().unwrap_or_default();
        if !status.is_success() {
            return Err(RagError::Status {
                method,
                url,
                status: status.as_u16(),
                body: text,
            });
        }
        from_str::<T>(&text).map_err(|e| RagError::Decode {
            method,
            url,
            message: format!("{} | {}", e, text),
        })
    }
}
