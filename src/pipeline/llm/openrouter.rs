use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use super::types::{ChatMessage, ChatRequest, LlmClient};
use super::LlmError;
use crate::config::AppConfig;

/// Blocking client for the OpenRouter chat-completions API.
pub struct OpenRouterClient {
    base_url: String,
    api_key: Option<String>,
    referer: Option<String>,
    title: String,
    client: reqwest::blocking::Client,
    timeout_secs: u64,
    min_interval: Duration,
    next_slot: Mutex<Option<Instant>>,
}

impl OpenRouterClient {
    pub fn new(
        base_url: &str,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, LlmError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LlmError::HttpClient(e.to_string()))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            referer: None,
            title: crate::config::DEFAULT_TITLE.to_string(),
            client,
            timeout_secs: timeout.as_secs(),
            min_interval: Duration::ZERO,
            next_slot: Mutex::new(None),
        })
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, LlmError> {
        let mut client = Self::new(
            &config.base_url,
            config.api_key.clone(),
            config.request_timeout(),
        )?
        .with_min_interval(Duration::from_millis(config.min_call_interval_ms));
        client.referer = config.referer.clone();
        client.title = config.title.clone();
        Ok(client)
    }

    /// Minimum spacing between the start of two calls, across threads.
    pub fn with_min_interval(mut self, interval: Duration) -> Self {
        self.min_interval = interval;
        self
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Reserve the next call slot and sleep until it opens.
    fn throttle(&self) {
        if self.min_interval.is_zero() {
            return;
        }
        let wait = {
            let mut slot = match self.next_slot.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            let now = Instant::now();
            let start = match *slot {
                Some(next) if next > now => next,
                _ => now,
            };
            *slot = Some(start + self.min_interval);
            start.saturating_duration_since(now)
        };
        if !wait.is_zero() {
            tracing::debug!(wait_ms = wait.as_millis() as u64, "Throttling LLM call");
            std::thread::sleep(wait);
        }
    }

    fn map_send_error(&self, e: reqwest::Error) -> LlmError {
        if e.is_connect() {
            LlmError::Connection(self.base_url.clone())
        } else if e.is_timeout() {
            LlmError::Timeout(self.timeout_secs)
        } else {
            LlmError::HttpClient(e.to_string())
        }
    }
}

/// Request body for /chat/completions
#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    temperature: f32,
    frequency_penalty: f32,
    presence_penalty: f32,
}

/// Response body from /chat/completions
#[derive(Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
}

#[derive(Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Deserialize)]
struct CompletionMessage {
    #[serde(default)]
    content: Option<String>,
    /// Reasoning models sometimes leave `content` empty and answer here.
    #[serde(default)]
    reasoning: Option<String>,
}

/// Pick the assistant text out of a completion response body.
fn completion_text(body: &str) -> Result<String, LlmError> {
    let parsed: CompletionResponse = serde_json::from_str(body)
        .map_err(|e| LlmError::MalformedResponse(e.to_string()))?;
    let message = parsed
        .choices
        .into_iter()
        .next()
        .map(|c| c.message)
        .ok_or_else(|| LlmError::MalformedResponse("response has no choices".into()))?;

    match (message.content, message.reasoning) {
        (Some(content), _) if !content.trim().is_empty() => Ok(content),
        (_, Some(reasoning)) if !reasoning.trim().is_empty() => Ok(reasoning),
        _ => Err(LlmError::EmptyCompletion),
    }
}

impl LlmClient for OpenRouterClient {
    fn chat(&self, request: &ChatRequest) -> Result<String, LlmError> {
        let api_key = self.api_key.as_deref().ok_or(LlmError::MissingApiKey)?;
        let url = format!("{}/chat/completions", self.base_url);
        let body = CompletionRequest {
            model: &request.model,
            messages: &request.messages,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            frequency_penalty: 0.0,
            presence_penalty: 0.0,
        };

        self.throttle();
        let started = Instant::now();

        let mut builder = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .header("X-Title", &self.title)
            .json(&body);
        if let Some(referer) = &self.referer {
            builder = builder.header("HTTP-Referer", referer);
        }

        let response = builder.send().map_err(|e| self.map_send_error(e))?;

        let status = response.status();
        let text = response.text().map_err(|e| self.map_send_error(e))?;
        if !status.is_success() {
            return Err(LlmError::Api {
                status: status.as_u16(),
                body: text,
            });
        }

        let content = completion_text(&text)?;
        tracing::debug!(
            model = %request.model,
            prompt_chars = request.prompt_chars(),
            response_chars = content.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "LLM call completed"
        );
        Ok(content)
    }

    fn name(&self) -> &str {
        "openrouter"
    }
}

type Responder = dyn Fn(&ChatRequest, usize) -> Result<String, LlmError> + Send + Sync;

/// Mock LLM client for testing - returns a configurable response.
pub struct MockLlmClient {
    responder: Box<Responder>,
    calls: AtomicUsize,
    requests: Mutex<Vec<ChatRequest>>,
}

impl MockLlmClient {
    pub fn new(response: &str) -> Self {
        let response = response.to_string();
        Self::with_responder(move |_, _| Ok(response.clone()))
    }

    /// Always fail with the given error.
    pub fn failing(error: LlmError) -> Self {
        Self::with_responder(move |_, _| Err(error.clone()))
    }

    /// Compute each reply from the request and the zero-based call index.
    pub fn with_responder<F>(responder: F) -> Self
    where
        F: Fn(&ChatRequest, usize) -> Result<String, LlmError> + Send + Sync + 'static,
    {
        Self {
            responder: Box::new(responder),
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Requests received so far, in arrival order.
    pub fn requests(&self) -> Vec<ChatRequest> {
        match self.requests.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl LlmClient for MockLlmClient {
    fn chat(&self, request: &ChatRequest) -> Result<String, LlmError> {
        let index = self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut guard) = self.requests.lock() {
            guard.push(request.clone());
        }
        (self.responder)(request, index)
    }

    fn name(&self) -> &str {
        "mock"
    }
}
