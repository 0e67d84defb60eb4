//! The summarization collaborator: text in, short summary out. The pipeline
//! only ever sees the trait; failures degrade a single digest entry and are
//! never allowed to fail a run.

use crate::config::SummarizeOptions;
use crate::types::{DigestError, NewsItem, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

#[async_trait]
pub trait Summarizer: Send + Sync {
    fn name(&self) -> String;

    /// Produce a short summary for one item. Callers impose their own
    /// timeout; implementations should not retry indefinitely.
    async fn summarize(&self, item: &NewsItem) -> Result<String>;
}

/// Summarizer backed by an OpenAI-compatible chat-completions endpoint,
/// with an optional on-disk cache keyed by item URL so reruns over the same
/// stories do not repeat model calls.
pub struct OpenAiSummarizer {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    max_tokens: u32,
    max_input_chars: usize,
    cache_dir: Option<PathBuf>,
}

impl OpenAiSummarizer {
    pub fn new(options: &SummarizeOptions, api_key: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: options.endpoint.clone(),
            api_key,
            model: options.model.clone(),
            max_tokens: options.max_tokens,
            max_input_chars: options.max_input_chars,
            cache_dir: options.cache_dir.clone(),
        }
    }

    fn input_text(&self, item: &NewsItem) -> String {
        let mut text = item.title.clone();
        if let Some(excerpt) = &item.body_excerpt {
            text.push_str("\n\n");
            text.push_str(excerpt);
        }
        if text.chars().count() > self.max_input_chars {
            text = text.chars().take(self.max_input_chars).collect();
        }
        text
    }

    /// Cache layout: `<dir>/<first two hex chars>/<hash>_summary.txt`, hash
    /// over the item URL (or title when there is no URL).
    fn cache_path(&self, item: &NewsItem) -> Option<PathBuf> {
        let dir = self.cache_dir.as_ref()?;
        let key = item.url.as_deref().unwrap_or(&item.title);
        let hash = hex_digest(key);
        Some(dir.join(&hash[..2]).join(format!("{}_summary.txt", hash)))
    }

    async fn read_cache(&self, path: &Path) -> Option<String> {
        match tokio::fs::read_to_string(path).await {
            Ok(summary) if !summary.trim().is_empty() => Some(summary),
            _ => None,
        }
    }

    async fn write_cache(&self, path: &Path, summary: &str) {
        if let Some(parent) = path.parent() {
            if let Err(e) = tokio::fs::create_dir_all(parent).await {
                warn!(path = %parent.display(), error = %e, "failed to create summary cache directory");
                return;
            }
        }
        if let Err(e) = tokio::fs::write(path, summary).await {
            warn!(path = %path.display(), error = %e, "failed to write summary cache entry");
        }
    }
}

#[async_trait]
impl Summarizer for OpenAiSummarizer {
    fn name(&self) -> String {
        format!("openai ({})", self.model)
    }

    async fn summarize(&self, item: &NewsItem) -> Result<String> {
        let cache_path = self.cache_path(item);
        if let Some(ref path) = cache_path {
            if let Some(summary) = self.read_cache(path).await {
                debug!(id = %item.id, "summary served from cache");
                return Ok(summary);
            }
        }

        let text = self.input_text(item);
        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage {
                role: "system".to_string(),
                content: format!("Summarize the following text:\n\n{}", text),
            }],
            max_tokens: self.max_tokens,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DigestError::Summarization(format!(
                "HTTP {}: {}",
                status, body
            )));
        }

        let parsed: ChatResponse = response.json().await?;
        let summary = parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content.trim().to_string())
            .filter(|content| !content.is_empty())
            .ok_or_else(|| {
                DigestError::Summarization("model returned no choices".to_string())
            })?;

        if let Some(ref path) = cache_path {
            self.write_cache(path, &summary).await;
        }
        Ok(summary)
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: String,
}

fn hex_digest(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    let digest = hasher.finalize();
    digest.iter().map(|byte| format!("{:02x}", byte)).collect()
}
