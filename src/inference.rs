//! Text-generation collaborator.
//!
//! The evaluation only needs "prompt in, generated text out"; model loading,
//! tokenisation and device placement live behind the serving endpoint.
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::util::retry::{RetryConfig, is_retryable_error, is_retryable_status};

/// エラーメッセージの最大長
const MAX_ERROR_MESSAGE_LENGTH: usize = 500;
const PROGRESS_LOG_INTERVAL: usize = 50;

/// Sampling parameters forwarded to the generation backend.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GenerationParams {
    pub do_sample: bool,
    pub top_k: u32,
    pub top_p: f32,
    pub temperature: f32,
    pub max_new_tokens: u32,
    pub num_return_sequences: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eos_token_id: Option<u32>,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            do_sample: true,
            top_k: 10,
            top_p: 0.9,
            temperature: 0.6,
            max_new_tokens: 10,
            num_return_sequences: 1,
            eos_token_id: None,
        }
    }
}

impl GenerationParams {
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            top_k: config.top_k(),
            top_p: config.top_p(),
            temperature: config.temperature(),
            max_new_tokens: config.max_new_tokens(),
            eos_token_id: config.eos_token_id(),
            ..Self::default()
        }
    }
}

/// Produces text for a fully formatted prompt.
///
/// Implementations return the prompt followed by the continuation so the
/// answer can be located after the instruction marker.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str, params: &GenerationParams) -> Result<String>;

    /// プロンプトを入力順に1件ずつ推論する。結果はプロンプトと同じ並び。
    ///
    /// # Errors
    /// 最初に失敗した呼び出しのエラーを、何件目かの文脈付きで返す。
    async fn generate_all(
        &self,
        prompts: &[String],
        params: &GenerationParams,
    ) -> Result<Vec<String>> {
        let total = prompts.len();
        let mut outputs = Vec::with_capacity(total);
        for (idx, prompt) in prompts.iter().enumerate() {
            let generated = self
                .generate(prompt, params)
                .await
                .with_context(|| format!("generation failed for prompt {} of {total}", idx + 1))?;
            outputs.push(generated);

            let completed = idx + 1;
            if completed % PROGRESS_LOG_INTERVAL == 0 || completed == total {
                info!(completed, total, "inference progress");
            }
        }
        Ok(outputs)
    }
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    inputs: &'a str,
    parameters: GenerateParameters<'a>,
}

#[derive(Debug, Serialize)]
struct GenerateParameters<'a> {
    #[serde(flatten)]
    sampling: &'a GenerationParams,
    return_full_text: bool,
}

#[derive(Debug, Deserialize)]
struct GeneratedText {
    generated_text: String,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum GenerateResponse {
    Single(GeneratedText),
    Batch(Vec<GeneratedText>),
}

impl GenerateResponse {
    fn into_text(self) -> Option<String> {
        match self {
            Self::Single(item) => Some(item.generated_text),
            Self::Batch(items) => items.into_iter().next().map(|item| item.generated_text),
        }
    }
}

enum AttemptError {
    Retryable(anyhow::Error),
    Fatal(anyhow::Error),
}

/// HTTP client for a text-generation server exposing `POST /generate`.
#[derive(Debug, Clone)]
pub struct HttpTextGenerator {
    client: Client,
    base_url: Url,
    retry: RetryConfig,
}

impl HttpTextGenerator {
    /// # Errors
    /// ベースURLが不正、またはHTTPクライアントの構築に失敗した場合。
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build inference client")?;
        // 末尾の `/` がないと join でパスの最後のセグメントが置き換わる
        let mut base_url = base_url.into();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }
        let base_url = Url::parse(&base_url).context("invalid inference base URL")?;

        Ok(Self {
            client,
            base_url,
            retry: RetryConfig::default(),
        })
    }

    /// # Errors
    /// See [`HttpTextGenerator::new`].
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self::new(config.inference_base_url(), config.request_timeout())?.with_retry(
            RetryConfig::from_retries(
                config.max_retries(),
                config.backoff_base_ms(),
                config.backoff_cap_ms(),
            ),
        ))
    }

    #[must_use]
    pub(crate) fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    async fn send_once(&self, url: &Url, request: &GenerateRequest<'_>) -> Result<String, AttemptError> {
        let response = self
            .client
            .post(url.clone())
            .json(request)
            .send()
            .await
            .map_err(|error| {
                let retryable = is_retryable_error(&error);
                let error = anyhow::Error::new(error).context("generate request failed");
                if retryable {
                    AttemptError::Retryable(error)
                } else {
                    AttemptError::Fatal(error)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let error = anyhow!(
                "generate endpoint returned error status {status}: {}",
                truncate_error_message(&body)
            );
            return Err(if is_retryable_status(status) {
                AttemptError::Retryable(error)
            } else {
                AttemptError::Fatal(error)
            });
        }

        let payload: GenerateResponse = response
            .json()
            .await
            .context("failed to deserialize generate response")
            .map_err(AttemptError::Fatal)?;

        payload
            .into_text()
            .ok_or_else(|| AttemptError::Fatal(anyhow!("generate response contained no sequences")))
    }
}

#[async_trait]
impl TextGenerator for HttpTextGenerator {
    async fn generate(&self, prompt: &str, params: &GenerationParams) -> Result<String> {
        let url = self
            .base_url
            .join("generate")
            .context("failed to build generate URL")?;
        let request = GenerateRequest {
            inputs: prompt,
            parameters: GenerateParameters {
                sampling: params,
                return_full_text: true,
            },
        };

        let mut attempt = 0usize;
        loop {
            let delay = self.retry.delay_for_attempt(attempt);
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }

            match self.send_once(&url, &request).await {
                Ok(text) => {
                    debug!(attempt, chars = text.len(), "generation completed");
                    return Ok(text);
                }
                Err(AttemptError::Retryable(error)) if self.retry.can_retry(attempt + 1) => {
                    warn!(attempt, error = %error, "retrying generate request");
                    attempt += 1;
                }
                Err(AttemptError::Retryable(error) | AttemptError::Fatal(error)) => {
                    return Err(error);
                }
            }
        }
    }
}

/// エラーメッセージを要約して切り詰める。
fn truncate_error_message(msg: &str) -> String {
    let char_count = msg.chars().count();
    if char_count <= MAX_ERROR_MESSAGE_LENGTH {
        return msg.to_string();
    }
    let truncated: String = msg.chars().take(MAX_ERROR_MESSAGE_LENGTH).collect();
    format!("{truncated}... (truncated, {char_count} chars)")
}
