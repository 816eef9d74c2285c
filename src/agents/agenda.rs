use anyhow::Result;
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::agents::gemini::{GeminiClient, extract_json};

/// System instruction for the agenda mapping agent.
const INSTRUCTION: &str = r#"Your task is to map sections of a meeting transcript to the topics listed in the meeting agenda.

You will receive:
1. A meeting agenda with numbered topics
2. A full meeting transcript

Follow these steps:

1) Parse the agenda to identify all agenda topics.
   - Extract the topic title/description from each agenda item.
   - Preserve the original numbering and structure.

2) Analyze the transcript and split it into sections that correspond to each agenda topic.
   - Use context clues, keywords, and flow to determine which parts of the transcript belong to which topic.
   - If multiple topics are discussed in an interleaved manner, assign text to the most relevant topic.
   - DO NOT modify, summarize, or paraphrase the transcript text.
   - Include the full transcript text for each section.

3) If parts of the transcript don't clearly map to any agenda item, create a special topic called "Other Discussion" or "Off-topic".

4) Output MUST be valid JSON with this exact structure:

{
  "meeting_metadata": {
    "date": "string | null",
    "attendees": ["string"] | null,
    "parsed_at": "ISO-8601 timestamp"
  },
  "agenda_topics": [
    {
      "topic_id": "string (e.g., '1', '2', 'intro')",
      "topic_title": "string",
      "duration_estimate": "string | null (e.g., '5 min')",
      "transcript_sections": [
        {
          "text": "string (exact transcript text)",
          "confidence": "high|medium|low",
          "reasoning": "string | null (brief explanation of why this section belongs here)"
        }
      ]
    }
  ],
  "unmapped_sections": [
    {
      "text": "string (exact transcript text)",
      "note": "string (why this couldn't be mapped)"
    }
  ],
  "error": null
}

5) Important rules:
   - Preserve exact transcript text - do NOT paraphrase, summarize, or edit.
   - Every part of the transcript MUST appear in exactly one section (either mapped or unmapped).
   - Maintain chronological order of the transcript.
   - If the transcript is empty or the agenda is missing, return an error:
     {
       "error": "MISSING_INPUT",
       "agenda_topics": null
     }

Return ONLY valid JSON. No Markdown, no extra commentary."#;

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AgendaMapping {
    pub meeting_metadata: Option<MeetingMetadata>,
    pub agenda_topics: Option<Vec<AgendaTopic>>,
    pub unmapped_sections: Vec<UnmappedSection>,
    pub error: Option<String>,
}

impl AgendaMapping {
    pub fn topics(&self) -> &[AgendaTopic] {
        self.agenda_topics.as_deref().unwrap_or_default()
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MeetingMetadata {
    pub date: Option<String>,
    pub attendees: Option<Vec<String>>,
    pub parsed_at: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AgendaTopic {
    pub topic_id: String,
    pub topic_title: String,
    pub duration_estimate: Option<String>,
    pub transcript_sections: Vec<TranscriptSection>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscriptSection {
    pub text: String,
    pub confidence: String,
    pub reasoning: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UnmappedSection {
    pub text: String,
    pub note: String,
}

/// Result of an agenda mapping run. The model's raw output is kept when it
/// cannot be parsed so the caller can save it for inspection.
pub enum MappingResult {
    Mapped(Box<AgendaMapping>),
    Unparsed { response: String, error: String },
}

/// Map transcript sections to agenda topics.
pub async fn map_agenda(
    client: &GeminiClient,
    agenda: &str,
    transcript: &str,
) -> Result<MappingResult> {
    info!(
        "Mapping transcript ({} characters) against agenda ({} characters)",
        transcript.len(),
        agenda.len()
    );

    let input = format!(
        "Here is the meeting agenda:\n\n{agenda}\n\n---\n\nHere is the full meeting transcript:\n\n{transcript}\n\n---\n\nPlease map the transcript sections to the agenda topics and return the result as JSON.\nIMPORTANT: Do not invent anything that is not in the transcript or agenda."
    );

    let raw = client.generate(INSTRUCTION, &input).await?;
    let json = extract_json(&raw);
    match serde_json::from_str::<AgendaMapping>(json) {
        Ok(mapping) => Ok(MappingResult::Mapped(Box::new(mapping))),
        Err(e) => {
            warn!("Agenda mapper returned unparseable JSON: {e}");
            Ok(MappingResult::Unparsed {
                response: raw,
                error: e.to_string(),
            })
        }
    }
}
