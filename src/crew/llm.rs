//! Minimal OpenAI-compatible chat completion client.
//!
//! One request at a time, paced to the crew's max RPM. The orchestration
//! layer above never talks HTTP directly; it only sees task outputs.

use anyhow::{anyhow, Context, Result};
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// The chat seam the crew talks through. Production uses `ChatClient`;
/// tests substitute scripted responders.
pub trait ChatApi: Send + Sync {
    fn chat<'a>(&'a self, system: &'a str, user: &'a str) -> BoxFuture<'a, Result<String>>;
}

/// Spaces requests at least `60 / max_rpm` seconds apart.
pub struct RateLimiter {
    min_interval: Duration,
    next_slot: Mutex<Instant>,
}

impl RateLimiter {
    pub fn new(max_rpm: u32) -> Self {
        let max_rpm = max_rpm.max(1);
        Self {
            min_interval: Duration::from_secs_f64(60.0 / max_rpm as f64),
            next_slot: Mutex::new(Instant::now()),
        }
    }

    /// Wait until the next request slot is free, then claim it.
    pub async fn acquire(&self) {
        let at = {
            let mut slot = self.next_slot.lock().await;
            let at = (*slot).max(Instant::now());
            *slot = at + self.min_interval;
            at
        };
        tokio::time::sleep_until(at).await;
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
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
    content: Option<String>,
}

pub struct ChatClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    limiter: RateLimiter,
}

impl ChatClient {
    pub fn new(
        base_url: &str,
        api_key: &str,
        model: &str,
        max_rpm: u32,
        request_timeout: Duration,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(format!("crew-blog-cli/{}", env!("CARGO_PKG_VERSION")))
            .timeout(request_timeout)
            .build()
            .context("build HTTP client")?;
        Ok(Self {
            http,
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            api_key: api_key.to_string(),
            model: model.to_string(),
            limiter: RateLimiter::new(max_rpm),
        })
    }

    /// Send one system+user exchange and return the assistant text.
    pub async fn chat(&self, system: &str, user: &str) -> Result<String> {
        self.limiter.acquire().await;

        let body = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
        };

        let resp = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .context("chat completion request failed")?;

        let status = resp.status();
        if !status.is_success() {
            let detail = resp.text().await.unwrap_or_default();
            return Err(anyhow!(
                "chat completion returned {status}: {}",
                detail.trim()
            ));
        }

        let parsed: ChatResponse = resp
            .json()
            .await
            .context("decode chat completion response")?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| anyhow!("chat completion response contained no content"))
    }
}

impl ChatApi for ChatClient {
    fn chat<'a>(&'a self, system: &'a str, user: &'a str) -> BoxFuture<'a, Result<String>> {
        Box::pin(self.chat(system, user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn limiter_spaces_requests_by_rpm() {
        let limiter = RateLimiter::new(60); // one request per second
        let start = Instant::now();
        limiter.acquire().await;
        limiter.acquire().await;
        limiter.acquire().await;
        // Third acquire can fire no earlier than two intervals after the first.
        assert!(start.elapsed() >= Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn limiter_clamps_zero_rpm_to_one() {
        let limiter = RateLimiter::new(0);
        let start = Instant::now();
        limiter.acquire().await;
        limiter.acquire().await;
        assert!(start.elapsed() >= Duration::from_secs(60));
    }
}
