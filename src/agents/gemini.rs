use anyhow::{Result, anyhow};
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::config::GeminiConfig;

const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// HTTP statuses worth retrying: rate limits and transient server errors.
const RETRYABLE_STATUSES: [u16; 4] = [429, 500, 503, 504];

#[derive(Serialize)]
struct GenerateRequest {
    #[serde(rename = "systemInstruction")]
    system_instruction: Content,
    contents: Vec<Content>,
}

#[derive(Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Serialize)]
struct Part {
    text: String,
}

#[derive(Deserialize)]
struct GenerateResponse {
    candidates: Option<Vec<Candidate>>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    parts: Option<Vec<CandidatePart>>,
}

#[derive(Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

pub struct GeminiClient {
    http: reqwest::Client,
    config: GeminiConfig,
}

impl GeminiClient {
    pub fn new(config: GeminiConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    /// Run one generateContent call with the given system instruction and
    /// user input, retrying on rate limits and transient server errors.
    pub async fn generate(&self, instruction: &str, input: &str) -> Result<String> {
        let url = format!("{}/{}:generateContent", API_BASE, self.config.model);
        let body = GenerateRequest {
            system_instruction: Content {
                parts: vec![Part {
                    text: instruction.to_string(),
                }],
            },
            contents: vec![Content {
                parts: vec![Part {
                    text: input.to_string(),
                }],
            }],
        };

        let mut delay = self.config.retry.initial_delay;
        for attempt in 1..=self.config.retry.attempts {
            debug!(
                "Calling {} (attempt {}/{})",
                self.config.model, attempt, self.config.retry.attempts
            );

            let response = self
                .http
                .post(&url)
                .header("x-goog-api-key", &self.config.api_key)
                .json(&body)
                .send()
                .await
                .map_err(|e| anyhow!("Failed to reach Gemini API: {}", e))?;

            let status = response.status();
            if status.is_success() {
                let parsed: GenerateResponse = response
                    .json()
                    .await
                    .map_err(|e| anyhow!("Failed to parse Gemini response: {}", e))?;
                return extract_text(parsed);
            }

            let response_text = response.text().await.unwrap_or_default();
            if RETRYABLE_STATUSES.contains(&status.as_u16())
                && attempt < self.config.retry.attempts
            {
                warn!(
                    "Gemini returned {}, retrying in {:?} ({}/{})",
                    status, delay, attempt, self.config.retry.attempts
                );
                tokio::time::sleep(delay).await;
                delay *= self.config.retry.exp_base;
                continue;
            }

            return Err(anyhow!("Gemini API error {}: {}", status, response_text));
        }

        Err(anyhow!(
            "Gemini API gave no usable response after {} attempts",
            self.config.retry.attempts
        ))
    }
}

fn extract_text(response: GenerateResponse) -> Result<String> {
    let parts = response
        .candidates
        .and_then(|mut c| if c.is_empty() { None } else { c.remove(0).content })
        .and_then(|c| c.parts)
        .ok_or_else(|| anyhow!("Gemini response contained no candidates"))?;

    let text: String = parts.into_iter().filter_map(|p| p.text).collect();
    if text.is_empty() {
        return Err(anyhow!("Gemini response contained no text"));
    }
    Ok(text)
}

/// Strip markdown code fences the model sometimes wraps JSON output in.
pub fn extract_json(response: &str) -> &str {
    if let Some(start) = response.find("```json") {
        let body = &response[start + 7..];
        match body.find("```") {
            Some(end) => body[..end].trim(),
            None => body.trim(),
        }
    } else if let Some(start) = response.find("```") {
        let body = &response[start + 3..];
        match body.find("```") {
            Some(end) => body[..end].trim(),
            None => body.trim(),
        }
    } else {
        response.trim()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_json_from_labeled_fence() {
        let response = "Here you go:\n```json\n{\"a\": 1}\n```\nDone.";
        assert_eq!(extract_json(response), "{\"a\": 1}");
    }

    #[test]
    fn extracts_json_from_bare_fence() {
        let response = "```\n{\"b\": 2}\n```";
        assert_eq!(extract_json(response), "{\"b\": 2}");
    }

    #[test]
    fn plain_json_passes_through_trimmed() {
        assert_eq!(extract_json("  {\"c\": 3}\n"), "{\"c\": 3}");
    }

    #[test]
    fn unterminated_fence_takes_the_rest() {
        assert_eq!(extract_json("```json\n{\"d\": 4}"), "{\"d\": 4}");
    }

    #[test]
    fn candidate_text_is_concatenated() {
        let response = GenerateResponse {
            candidates: Some(vec![Candidate {
                content: Some(CandidateContent {
                    parts: Some(vec![
                        CandidatePart {
                            text: Some("foo".to_string()),
                        },
                        CandidatePart {
                            text: Some("bar".to_string()),
                        },
                    ]),
                }),
            }]),
        };
        assert_eq!(extract_text(response).unwrap(), "foobar");
    }

    #[test]
    fn empty_candidates_are_an_error() {
        let response = GenerateResponse {
            candidates: Some(vec![]),
        };
        assert!(extract_text(response).is_err());
    }
}
