use std::{env, num::NonZeroUsize, path::PathBuf, time::Duration};

use thiserror::Error;

#[cfg(test)]
use once_cell::sync::Lazy;
#[cfg(test)]
pub(crate) static ENV_MUTEX: Lazy<std::sync::Mutex<()>> = Lazy::new(|| std::sync::Mutex::new(()));

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    dataset_path: PathBuf,
    model: String,
    inference_base_url: String,
    sample_limit: NonZeroUsize,
    shuffle_seed: u64,
    top_k: u32,
    top_p: f32,
    temperature: f32,
    max_new_tokens: u32,
    eos_token_id: Option<u32>,
    request_timeout: Duration,
    max_retries: usize,
    backoff_base_ms: u64,
    backoff_cap_ms: u64,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {name}: {source}")]
    Invalid {
        name: &'static str,
        #[source]
        source: anyhow::Error,
    },
}

impl Config {
    /// 環境変数から評価設定を読み込み、検証する。
    ///
    /// 未設定の項目はデフォルト値を用いる。
    ///
    /// # Errors
    /// 数値のパースや範囲チェックに失敗した場合は [`ConfigError`] を返す。
    pub fn from_env() -> Result<Self, ConfigError> {
        let dataset_path = PathBuf::from(
            env::var("GENRE_EVAL_DATASET")
                .unwrap_or_else(|_| "./genredataset/test_data_solution.txt".to_string()),
        );
        let model =
            env::var("GENRE_EVAL_MODEL").unwrap_or_else(|_| "./models/genre-llama-demo".to_string());
        let inference_base_url = env::var("GENRE_EVAL_INFERENCE_URL")
            .unwrap_or_else(|_| "http://127.0.0.1:8080/".to_string());

        // Sampling
        let sample_limit = parse_non_zero_usize("GENRE_EVAL_SAMPLE_LIMIT", 1000)?;
        let shuffle_seed = parse_u64("GENRE_EVAL_SHUFFLE_SEED", 1993)?;

        // Generation parameters (same as fine-tuning evaluation)
        let top_k = parse_u32("GENRE_EVAL_TOP_K", 10)?;
        let top_p = parse_unit_interval("GENRE_EVAL_TOP_P", 0.9)?;
        let temperature = parse_positive_f32("GENRE_EVAL_TEMPERATURE", 0.6)?;
        let max_new_tokens = parse_u32("GENRE_EVAL_MAX_NEW_TOKENS", 10)?;
        let eos_token_id = parse_optional_u32("GENRE_EVAL_EOS_TOKEN_ID")?;

        // HTTP
        let request_timeout = parse_duration_ms("GENRE_EVAL_REQUEST_TIMEOUT_MS", 30000)?;
        let max_retries = parse_usize("GENRE_EVAL_MAX_RETRIES", 3)?;
        let backoff_base_ms = parse_u64("GENRE_EVAL_BACKOFF_BASE_MS", 250)?;
        let backoff_cap_ms = parse_u64("GENRE_EVAL_BACKOFF_CAP_MS", 10000)?;

        Ok(Self {
            dataset_path,
            model,
            inference_base_url,
            sample_limit,
            shuffle_seed,
            top_k,
            top_p,
            temperature,
            max_new_tokens,
            eos_token_id,
            request_timeout,
            max_retries,
            backoff_base_ms,
            backoff_cap_ms,
        })
    }

    #[must_use]
    pub fn dataset_path(&self) -> &std::path::Path {
        &self.dataset_path
    }

    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    #[must_use]
    pub fn inference_base_url(&self) -> &str {
        &self.inference_base_url
    }

    #[must_use]
    pub fn sample_limit(&self) -> NonZeroUsize {
        self.sample_limit
    }

    #[must_use]
    pub fn shuffle_seed(&self) -> u64 {
        self.shuffle_seed
    }

    #[must_use]
    pub fn top_k(&self) -> u32 {
        self.top_k
    }

    #[must_use]
    pub fn top_p(&self) -> f32 {
        self.top_p
    }

    #[must_use]
    pub fn temperature(&self) -> f32 {
        self.temperature
    }

    #[must_use]
    pub fn max_new_tokens(&self) -> u32 {
        self.max_new_tokens
    }

    #[must_use]
    pub fn eos_token_id(&self) -> Option<u32> {
        self.eos_token_id
    }

    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    #[must_use]
    pub fn max_retries(&self) -> usize {
        self.max_retries
    }

    #[must_use]
    pub fn backoff_base_ms(&self) -> u64 {
        self.backoff_base_ms
    }

    #[must_use]
    pub fn backoff_cap_ms(&self) -> u64 {
        self.backoff_cap_ms
    }

    /// コマンドライン引数による上書き。
    pub fn set_dataset_path(&mut self, path: PathBuf) {
        self.dataset_path = path;
    }

    pub fn set_model(&mut self, model: String) {
        self.model = model;
    }

    pub fn set_inference_base_url(&mut self, url: String) {
        self.inference_base_url = url;
    }

    pub fn set_sample_limit(&mut self, limit: NonZeroUsize) {
        self.sample_limit = limit;
    }

    pub fn set_shuffle_seed(&mut self, seed: u64) {
        self.shuffle_seed = seed;
    }
}

fn invalid(name: &'static str, source: impl Into<anyhow::Error>) -> ConfigError {
    ConfigError::Invalid {
        name,
        source: source.into(),
    }
}

fn parse_non_zero_usize(name: &'static str, default: usize) -> Result<NonZeroUsize, ConfigError> {
    let value = parse_usize(name, default)?;
    NonZeroUsize::new(value).ok_or_else(|| invalid(name, anyhow::anyhow!("must be greater than zero")))
}

fn parse_duration_ms(name: &'static str, default_ms: u64) -> Result<Duration, ConfigError> {
    let millis = parse_u64(name, default_ms)?;
    if millis == 0 {
        return Err(invalid(name, anyhow::anyhow!("must be greater than zero")));
    }
    Ok(Duration::from_millis(millis))
}

fn parse_usize(name: &'static str, default: usize) -> Result<usize, ConfigError> {
    match env::var(name) {
        Ok(value) => value.parse::<usize>().map_err(|error| invalid(name, error)),
        Err(_) => Ok(default),
    }
}

fn parse_u32(name: &'static str, default: u32) -> Result<u32, ConfigError> {
    match env::var(name) {
        Ok(value) => value.parse::<u32>().map_err(|error| invalid(name, error)),
        Err(_) => Ok(default),
    }
}

fn parse_optional_u32(name: &'static str) -> Result<Option<u32>, ConfigError> {
    match env::var(name) {
        Ok(value) => value
            .parse::<u32>()
            .map(Some)
            .map_err(|error| invalid(name, error)),
        Err(_) => Ok(None),
    }
}

fn parse_u64(name: &'static str, default: u64) -> Result<u64, ConfigError> {
    match env::var(name) {
        Ok(value) => value.parse::<u64>().map_err(|error| invalid(name, error)),
        Err(_) => Ok(default),
    }
}

fn parse_f32(name: &'static str, default: f32) -> Result<f32, ConfigError> {
    match env::var(name) {
        Ok(value) => value.parse::<f32>().map_err(|error| invalid(name, error)),
        Err(_) => Ok(default),
    }
}

fn parse_unit_interval(name: &'static str, default: f32) -> Result<f32, ConfigError> {
    let value = parse_f32(name, default)?;
    if value > 0.0 && value <= 1.0 {
        Ok(value)
    } else {
        Err(invalid(name, anyhow::anyhow!("must be within (0, 1]")))
    }
}

fn parse_positive_f32(name: &'static str, default: f32) -> Result<f32, ConfigError> {
    let value = parse_f32(name, default)?;
    if value > 0.0 {
        Ok(value)
    } else {
        Err(invalid(name, anyhow::anyhow!("must be greater than zero")))
    }
}
