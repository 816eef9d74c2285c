use anyhow::{Context, Result};
use log::info;
use serde::{Deserialize, Serialize};

use crate::agents::gemini::{GeminiClient, extract_json};

/// System instruction for the summarizer agent. The JSON contract below is
/// what `MeetingSummary` deserializes.
const INSTRUCTION: &str = r#"Your task is to generate a structured summary of a meeting based solely on the
full transcript provided as input text.

Follow these steps in order:

1) Read and analyze the full transcript provided by the user.
   - Do NOT search for anything.
   - Do NOT assume context outside the transcript.
   - If the transcript is empty or unusable, return an error JSON (see below).

2) Extract and summarize the meeting content.
   Your summary MUST follow this exact JSON structure:

   {
     "one_line": "string (<=140 chars)",
     "executive": "string (3-4 short paragraphs, max 300 words)",
     "technical": "string | null",
     "key_decisions": [
       {
         "decision": "string",
         "rationale": "string | null",
         "timestamp": "string | null",
         "inferred": false
       }
     ],
     "action_items": [
       {
         "id": "A1",
         "task": "string",
         "assignee": "string | null",
         "due_date": "YYYY-MM-DD | null",
         "priority": "low|medium|high|unspecified",
         "origin_timestamp": "string | null",
         "notes": "string | null",
         "inferred": false
       }
     ],
     "attendees": [
       {
         "name": "string",
         "role": "string | null",
         "present": true
       }
     ],
     "open_questions": [
       {
         "question": "string",
         "asked_by": "string | null",
         "timestamp": "string | null"
       }
     ],
     "follow_ups": [
       {
         "type": "string",
         "description": "string",
         "owner": "string | null",
         "due_date": "YYYY-MM-DD | null"
       }
     ],
     "highlights_with_timestamps": [
       {
         "timestamp": "string",
         "short_note": "string"
       }
     ],
     "tone_and_sentiment": {
       "overall_tone": "neutral|positive|negative|mixed",
       "confidence": "low|medium|high"
     },
     "confidence_note": "string | null",
     "error": null
   }

3) Strict requirements:
   - Only include facts found in the transcript.
   - If something is unclear or missing, set the field to null.
   - If you infer something from context, set "inferred": true and explain in notes.
   - Action items must be labeled A1, A2, A3...
   - Keep one_line under 140 characters.
   - Keep executive under 300 words.
   - Maintain JSON validity - no extra commentary or Markdown.

4) If the transcript cannot be summarized (empty, corrupted, or clearly not a meeting):
   Return exactly:
   {
     "error": "INVALID_TRANSCRIPT",
     "summary": null
   }

Return ONLY valid JSON as final output. No text outside of the JSON."#;

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MeetingSummary {
    pub one_line: Option<String>,
    pub executive: Option<String>,
    pub technical: Option<String>,
    pub key_decisions: Vec<KeyDecision>,
    pub action_items: Vec<ActionItem>,
    pub attendees: Vec<Attendee>,
    pub open_questions: Vec<OpenQuestion>,
    pub follow_ups: Vec<FollowUp>,
    pub highlights_with_timestamps: Vec<Highlight>,
    pub tone_and_sentiment: Option<ToneAndSentiment>,
    pub confidence_note: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyDecision {
    pub decision: String,
    pub rationale: Option<String>,
    pub timestamp: Option<String>,
    pub inferred: bool,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ActionItem {
    pub id: String,
    pub task: String,
    pub assignee: Option<String>,
    pub due_date: Option<String>,
    pub priority: String,
    pub origin_timestamp: Option<String>,
    pub notes: Option<String>,
    pub inferred: bool,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Attendee {
    pub name: String,
    pub role: Option<String>,
    pub present: bool,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenQuestion {
    pub question: String,
    pub asked_by: Option<String>,
    pub timestamp: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FollowUp {
    #[serde(rename = "type")]
    pub kind: String,
    pub description: String,
    pub owner: Option<String>,
    pub due_date: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Highlight {
    pub timestamp: String,
    pub short_note: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ToneAndSentiment {
    pub overall_tone: String,
    pub confidence: String,
}

/// Summarize a full meeting transcript into the structured form above.
pub async fn summarize(client: &GeminiClient, transcript: &str) -> Result<MeetingSummary> {
    info!(
        "Summarizing transcript ({} characters)",
        transcript.len()
    );
    let prompt = format!("Please summarize this meeting transcript:\n\n{transcript}");
    let raw = client.generate(INSTRUCTION, &prompt).await?;
    let json = extract_json(&raw);
    serde_json::from_str(json).context("Summarizer returned invalid JSON")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_summary_deserializes() {
        let json = r#"{
            "one_line": "Weekly sync on release planning.",
            "executive": "The team met to plan the release.",
            "technical": null,
            "key_decisions": [
                {"decision": "Ship Friday", "rationale": null, "timestamp": "00:12", "inferred": false}
            ],
            "action_items": [
                {"id": "A1", "task": "Write release notes", "assignee": "Sam",
                 "due_date": null, "priority": "high", "origin_timestamp": null,
                 "notes": null, "inferred": false}
            ],
            "attendees": [{"name": "Sam", "role": null, "present": true}],
            "open_questions": [],
            "follow_ups": [{"type": "meeting", "description": "Retro", "owner": null, "due_date": null}],
            "highlights_with_timestamps": [{"timestamp": "00:01", "short_note": "Kickoff"}],
            "tone_and_sentiment": {"overall_tone": "positive", "confidence": "high"},
            "confidence_note": null,
            "error": null
        }"#;

        let summary: MeetingSummary = serde_json::from_str(json).unwrap();
        assert_eq!(summary.one_line.as_deref(), Some("Weekly sync on release planning."));
        assert_eq!(summary.action_items.len(), 1);
        assert_eq!(summary.action_items[0].id, "A1");
        assert_eq!(summary.follow_ups[0].kind, "meeting");
        assert!(summary.error.is_none());
    }

    #[test]
    fn error_payload_deserializes() {
        let json = r#"{"error": "INVALID_TRANSCRIPT", "summary": null}"#;
        let summary: MeetingSummary = serde_json::from_str(json).unwrap();
        assert_eq!(summary.error.as_deref(), Some("INVALID_TRANSCRIPT"));
        assert!(summary.one_line.is_none());
        assert!(summary.action_items.is_empty());
    }
}
