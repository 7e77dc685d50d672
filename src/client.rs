//! HTTP transport for the chat backend.
//!
//! `GET /chat/` and `POST /chat/` both answer with newline-delimited JSON.
//! The body is read chunk by chunk; after every chunk the *whole* body so far
//! is handed to a [`StreamSink`], and once more after the stream ends. The
//! raw bytes are re-decoded each time, so a multi-byte character split across
//! two chunks shows up as a replacement character for one call at most.

use std::path::{Path, PathBuf};

use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response};
use tokio_stream::StreamExt;
use tracing::{debug, error};

use crate::config::ClientConfig;
use crate::error::{ChatError, Result};

/// Receives the accumulated response text of a streaming request.
pub trait StreamSink {
    /// Called with the full text received so far, after every chunk and once
    /// more when the body is complete.
    fn on_buffer(&mut self, text: &str) -> Result<()>;

    /// Called once after the final `on_buffer`.
    fn on_complete(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Collects every buffer it is handed. Handy for scripting and tests.
#[derive(Debug, Default, Clone)]
pub struct BufferLog {
    pub buffers: Vec<String>,
    pub completed: bool,
}

impl StreamSink for BufferLog {
    fn on_buffer(&mut self, text: &str) -> Result<()> {
        self.buffers.push(text.to_string());
        Ok(())
    }

    fn on_complete(&mut self) -> Result<()> {
        self.completed = true;
        Ok(())
    }
}

/// One prompt submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub prompt: String,
    pub model: String,
    /// Optional file sent as the `document` form part.
    pub document: Option<PathBuf>,
}

impl Submission {
    pub fn new(prompt: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            model: model.into(),
            document: None,
        }
    }

    pub fn with_document(mut self, path: impl Into<PathBuf>) -> Self {
        self.document = Some(path.into());
        self
    }
}

#[derive(Debug, Clone)]
pub struct ChatClient {
    client: Client,
    base_url: String,
}

impl ChatClient {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout())
            .build()
            .map_err(|e| ChatError::http(config.base_url(), e))?;
        Ok(Self {
            client,
            base_url: config.base_url().to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Stream the stored conversation into `sink`.
    pub async fn fetch_history<S: StreamSink + ?Sized>(&self, sink: &mut S) -> Result<()> {
        let url = self.url("/chat/");
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| ChatError::http(&url, e))?;
        stream_into(&url, response, sink).await
    }

    /// Post a prompt and stream the reply into `sink`.
    pub async fn submit<S: StreamSink + ?Sized>(
        &self,
        submission: &Submission,
        sink: &mut S,
    ) -> Result<()> {
        let url = self.url("/chat/");
        let mut form = Form::new()
            .text("prompt", submission.prompt.clone())
            .text("model_name", submission.model.clone());
        if let Some(path) = &submission.document {
            form = form.part("document", document_part(path).await?);
        }
        debug!(
            model = %submission.model,
            has_document = submission.document.is_some(),
            "submitting prompt"
        );

        let response = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| ChatError::http(&url, e))?;
        stream_into(&url, response, sink).await
    }

    /// Delete the server-side history. A refusal carries the response body.
    pub async fn clear_history(&self) -> Result<()> {
        let url = self.url("/chat/");
        let response = self
            .client
            .delete(&url)
            .send()
            .await
            .map_err(|e| ChatError::http(&url, e))?;
        if response.status().is_success() {
            return Ok(());
        }
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        error!(%status, body = %body, "failed to clear chat history");
        Err(ChatError::ClearFailed(body))
    }

    /// Model names offered by the backend.
    pub async fn list_models(&self) -> Result<Vec<String>> {
        let url = self.url("/models/");
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| ChatError::http(&url, e))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ChatError::Status {
                status: status.as_u16(),
                body,
            });
        }
        let bytes = response.bytes().await.map_err(|e| ChatError::http(&url, e))?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

async fn stream_into<S: StreamSink + ?Sized>(
    url: &str,
    response: Response,
    sink: &mut S,
) -> Result<()> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        error!(%status, url, body = %body, "unexpected response");
        return Err(ChatError::Status {
            status: status.as_u16(),
            body,
        });
    }

    let mut stream = response.bytes_stream();
    let mut raw: Vec<u8> = Vec::new();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| ChatError::http(url, e))?;
        raw.extend_from_slice(&chunk);
        sink.on_buffer(&String::from_utf8_lossy(&raw))?;
    }

    sink.on_buffer(&String::from_utf8_lossy(&raw))?;
    sink.on_complete()
}

async fn document_part(path: &Path) -> Result<Part> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| ChatError::io(path.display().to_string(), e))?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string());
    Part::bytes(bytes)
        .file_name(file_name)
        .mime_str(guess_mime(path))
        .map_err(|e| ChatError::http(path.display().to_string(), e))
}

/// Media type of an attached document, from its extension.
pub fn guess_mime(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "pdf" => "application/pdf",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "txt" => "text/plain",
        "md" | "markdown" => "text/markdown",
        "csv" => "text/csv",
        "html" | "htm" => "text/html",
        "json" => "application/json",
        _ => "application/octet-stream",
    }
}
