use anyhow::{Context, Result};
use dotenv::dotenv;
use std::time::Duration;

/// Backoff for the Gemini API: up to `attempts` tries, delay multiplied by
/// `exp_base` after each retryable failure.
#[derive(Clone, Debug)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub initial_delay: Duration,
    pub exp_base: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 5,
            initial_delay: Duration::from_secs(1),
            exp_base: 7,
        }
    }
}

#[derive(Clone, Debug)]
pub struct GeminiConfig {
    pub api_key: String,
    pub model: String,
    pub retry: RetryPolicy,
}

impl GeminiConfig {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();
        Ok(Self {
            api_key: std::env::var("GEMINI_API_KEY").context("GEMINI_API_KEY is not set")?,
            model: std::env::var("GEMINI_MODEL")
                .unwrap_or_else(|_| "gemini-2.5-flash-lite".to_string()),
            retry: RetryPolicy::default(),
        })
    }
}
