use anyhow::{Context, Result};
use dotenv::dotenv;
use std::path::PathBuf;

#[derive(Clone, Debug, serde::Deserialize, serde::Serialize)]
pub struct WhisperConfig {
    pub model_path: PathBuf,
    pub use_gpu: bool,
    pub language: String,
    pub audio_context: i32,
    pub no_speech_threshold: f32,
    pub num_threads: i32,
}

impl WhisperConfig {
    /// Build from the environment. `model_path` overrides
    /// `WHISPER_MODEL_PATH` when given on the command line.
    pub fn from_env(model_path: Option<PathBuf>, language: Option<String>) -> Result<Self> {
        dotenv().ok();
        let model_path = match model_path {
            Some(path) => path,
            None => PathBuf::from(
                std::env::var("WHISPER_MODEL_PATH")
                    .context("WHISPER_MODEL_PATH is not set and no --model-path given")?,
            ),
        };

        Ok(Self {
            model_path,
            use_gpu: env_flag("WHISPER_USE_GPU", true),
            language: language.unwrap_or_else(|| "en".to_string()),
            audio_context: 768,
            no_speech_threshold: 0.5,
            num_threads: 2,
        })
    }
}

fn env_flag(key: &str, default: bool) -> bool {
    match std::env::var(key) {
        Ok(value) => match value.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => true,
            "0" | "false" | "no" | "off" => false,
            // Unrecognized values keep the default rather than silently
            // flipping the flag off.
            _ => default,
        },
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_flag_is_case_insensitive() {
        unsafe {
            std::env::set_var("VOX_TEST_FLAG_UPPER", "TRUE");
            std::env::set_var("VOX_TEST_FLAG_OFF", "False");
        }
        assert!(env_flag("VOX_TEST_FLAG_UPPER", false));
        assert!(!env_flag("VOX_TEST_FLAG_OFF", true));
    }

    #[test]
    fn env_flag_keeps_default_for_unrecognized_values() {
        unsafe {
            std::env::set_var("VOX_TEST_FLAG_GARBAGE", "maybe");
        }
        assert!(env_flag("VOX_TEST_FLAG_GARBAGE", true));
        assert!(!env_flag("VOX_TEST_FLAG_GARBAGE", false));
    }

    #[test]
    fn env_flag_uses_default_when_unset() {
        assert!(env_flag("VOX_TEST_FLAG_UNSET", true));
        assert!(!env_flag("VOX_TEST_FLAG_UNSET", false));
    }
}
