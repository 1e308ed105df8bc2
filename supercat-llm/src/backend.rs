//! Completion backends: "given a system message and a prompt, return text".
//!
//! `HttpBackend` talks to the OpenAI chat completions or Anthropic messages
//! API with an async reqwest client, driven from synchronous callers.

use anyhow::{anyhow, bail, Context, Result};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, OnceLock};
use std::thread;
use std::time::Duration;
use tokio::runtime::{Handle, Runtime, RuntimeFlavor};

pub trait CompletionBackend: Send + Sync {
    fn complete(&self, system: &str, prompt: &str) -> Result<String>;
}

impl<T: CompletionBackend + ?Sized> CompletionBackend for Box<T> {
    fn complete(&self, system: &str, prompt: &str) -> Result<String> {
        (**self).complete(system, prompt)
    }
}

impl<T: CompletionBackend + ?Sized> CompletionBackend for Arc<T> {
    fn complete(&self, system: &str, prompt: &str) -> Result<String> {
        (**self).complete(system, prompt)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    OpenAI,
    Anthropic,
}

impl Provider {
    pub fn default_model(&self) -> &'static str {
        match self {
            Provider::OpenAI => "gpt-4o-mini",
            Provider::Anthropic => "claude-3-5-sonnet-latest",
        }
    }

    pub fn default_base_url(&self) -> &'static str {
        match self {
            Provider::OpenAI => "https://api.openai.com",
            Provider::Anthropic => "https://api.anthropic.com",
        }
    }

    pub fn default_api_key_env(&self) -> &'static str {
        match self {
            Provider::OpenAI => "OPENAI_API_KEY",
            Provider::Anthropic => "ANTHROPIC_API_KEY",
        }
    }
}

/// Remote model settings. Unset model, base URL and key variable fall back
/// to the provider's defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    pub provider: Provider,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Whole-request timeout
    pub timeout_secs: u64,
    /// Environment variable holding the API key
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,
}

impl Default for LlmSettings {
    fn default() -> Self {
        LlmSettings::for_provider(Provider::OpenAI)
    }
}

impl LlmSettings {
    pub fn for_provider(provider: Provider) -> Self {
        Self {
            provider,
            model: None,
            base_url: None,
            temperature: 0.3,
            max_tokens: 50,
            timeout_secs: 30,
            api_key_env: None,
        }
    }

    pub fn model(&self) -> &str {
        self.model.as_deref().unwrap_or(self.provider.default_model())
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_deref().unwrap_or(self.provider.default_base_url())
    }

    pub fn api_key_env(&self) -> &str {
        self.api_key_env
            .as_deref()
            .unwrap_or(self.provider.default_api_key_env())
    }

    fn endpoint(&self) -> String {
        let base = self.base_url().trim_end_matches('/');
        match self.provider {
            Provider::OpenAI => format!("{base}/v1/chat/completions"),
            Provider::Anthropic => format!("{base}/v1/messages"),
        }
    }
}

pub struct HttpBackend {
    settings: LlmSettings,
    api_key: String,
    client: reqwest::Client,
    /// Built on first use outside a multi-threaded runtime.
    runtime: OnceLock<Runtime>,
}

impl HttpBackend {
    /// Build a backend, reading the key from `settings.api_key_env`.
    pub fn new(settings: LlmSettings) -> Result<Self> {
        let var = settings.api_key_env().to_string();
        let key = std::env::var(&var).with_context(|| format!("{var} is not set"))?;
        Self::with_api_key(settings, key)
    }

    pub fn with_api_key(settings: LlmSettings, api_key: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .context("build http client")?;
        Ok(Self {
            settings,
            api_key: api_key.into(),
            client,
            runtime: OnceLock::new(),
        })
    }

    /// Must not be called from a thread that is driving a runtime.
    fn runtime(&self) -> Result<&Runtime> {
        if let Some(rt) = self.runtime.get() {
            return Ok(rt);
        }
        let rt = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()
            .context("create tokio runtime")?;
        Ok(self.runtime.get_or_init(|| rt))
    }

    fn block_on_owned(&self, system: &str, prompt: &str) -> Result<String> {
        self.runtime()?.block_on(self.complete_async(system, prompt))
    }

    pub fn settings(&self) -> &LlmSettings {
        &self.settings
    }

    async fn complete_async(&self, system: &str, prompt: &str) -> Result<String> {
        match self.settings.provider {
            Provider::OpenAI => self.openai_complete(system, prompt).await,
            Provider::Anthropic => self.anthropic_complete(system, prompt).await,
        }
    }

    fn transport_error(&self, e: reqwest::Error, what: &str) -> anyhow::Error {
        if e.is_timeout() {
            anyhow!("{what} timed out after {}s", self.settings.timeout_secs)
        } else {
            anyhow::Error::new(e).context(format!("{what} request"))
        }
    }

    async fn openai_complete(&self, system: &str, prompt: &str) -> Result<String> {
        #[derive(Serialize)]
        struct Msg<'a> {
            role: &'a str,
            content: &'a str,
        }

        #[derive(Serialize)]
        struct Req<'a> {
            model: &'a str,
            messages: Vec<Msg<'a>>,
            temperature: f32,
            max_tokens: u32,
        }

        #[derive(Deserialize)]
        struct Resp {
            choices: Vec<Choice>,
        }

        #[derive(Deserialize)]
        struct Choice {
            message: MsgOut,
        }

        #[derive(Deserialize)]
        struct MsgOut {
            content: Option<String>,
        }

        let body = Req {
            model: self.settings.model(),
            messages: vec![
                Msg {
                    role: "system",
                    content: system,
                },
                Msg {
                    role: "user",
                    content: prompt,
                },
            ],
            temperature: self.settings.temperature,
            max_tokens: self.settings.max_tokens,
        };

        let resp = self
            .client
            .post(self.settings.endpoint())
            .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| self.transport_error(e, "openai"))?;

        let status = resp.status();
        if !status.is_success() {
            let txt = resp.text().await.unwrap_or_default();
            bail!("openai error: {status} {txt}");
        }

        let out: Resp = resp
            .json()
            .await
            .map_err(|e| self.transport_error(e, "openai"))
            .context("parse openai response")?;
        let content = out
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .unwrap_or_default();

        Ok(content.trim().to_string())
    }

    async fn anthropic_complete(&self, system: &str, prompt: &str) -> Result<String> {
        #[derive(Serialize)]
        struct Msg<'a> {
            role: &'a str,
            content: &'a str,
        }

        #[derive(Serialize)]
        struct Req<'a> {
            model: &'a str,
            max_tokens: u32,
            temperature: f32,
            system: &'a str,
            messages: Vec<Msg<'a>>,
        }

        #[derive(Deserialize)]
        struct Resp {
            content: Vec<ContentBlock>,
        }

        #[derive(Deserialize)]
        struct ContentBlock {
            #[serde(rename = "type")]
            t: String,
            text: Option<String>,
        }

        let body = Req {
            model: self.settings.model(),
            max_tokens: self.settings.max_tokens,
            temperature: self.settings.temperature,
            system,
            messages: vec![Msg {
                role: "user",
                content: prompt,
            }],
        };

        let mut headers = HeaderMap::new();
        headers.insert("x-api-key", HeaderValue::from_str(&self.api_key)?);
        headers.insert("anthropic-version", HeaderValue::from_static("2023-06-01"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let resp = self
            .client
            .post(self.settings.endpoint())
            .headers(headers)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.transport_error(e, "anthropic"))?;

        let status = resp.status();
        if !status.is_success() {
            let txt = resp.text().await.unwrap_or_default();
            bail!("anthropic error: {status} {txt}");
        }

        let out: Resp = resp
            .json()
            .await
            .map_err(|e| self.transport_error(e, "anthropic"))
            .context("parse anthropic response")?;
        let mut s = String::new();
        for b in out.content {
            if b.t == "text" {
                if let Some(t) = b.text {
                    s.push_str(&t);
                }
            }
        }
        Ok(s.trim().to_string())
    }
}

impl CompletionBackend for HttpBackend {
    fn complete(&self, system: &str, prompt: &str) -> Result<String> {
        match Handle::try_current() {
            Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
                tokio::task::block_in_place(|| {
                    handle.block_on(self.complete_async(system, prompt))
                })
            }
            // block_in_place panics on a current-thread runtime, so the
            // request runs on the owned runtime from a plain thread instead.
            Ok(_) => thread::scope(|s| {
                s.spawn(|| self.block_on_owned(system, prompt))
                    .join()
                    .unwrap_or_else(|_| Err(anyhow!("completion thread panicked")))
            }),
            Err(_) => self.block_on_owned(system, prompt),
        }
    }
}

impl Drop for HttpBackend {
    fn drop(&mut self) {
        // A plain drop blocks, which panics when the backend is dropped from async code.
        if let Some(rt) = self.runtime.take() {
            rt.shutdown_background();
        }
    }
}
