use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "vox-machine",
    about = "Vox Machine - Meeting Transcription & Analysis",
    long_about = "A toolkit for turning meeting recordings into transcripts, structured summaries, and agenda-to-transcript mappings. Audio input must be WAV.",
    after_help = "EXAMPLES:\n    # Transcribe a meeting recording in 5-minute chunks\n    vox-machine transcribe meeting.wav\n\n    # Transcribe with smaller chunks and an explicit model\n    vox-machine transcribe meeting.wav --chunk-minutes 2 --model-path ggml-base.en.bin\n\n    # Summarize the newest transcript in the data directory\n    vox-machine summarize\n\n    # Map a specific transcript against an agenda\n    vox-machine map-agenda --agenda agenda.md --transcript data/transcript_20251129_09-21-47.txt"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(name = "transcribe")]
    Transcribe {
        /// WAV file to transcribe
        audio_file: PathBuf,

        /// Maximum length of each transcription chunk, in minutes
        #[arg(long, default_value = "5", value_parser = validate_chunk_minutes)]
        chunk_minutes: u64,

        /// Whisper model file (overrides WHISPER_MODEL_PATH)
        #[arg(long)]
        model_path: Option<PathBuf>,

        /// Spoken language hint, e.g. "en"
        #[arg(long)]
        language: Option<String>,

        #[arg(long, default_value = "data")]
        data_dir: PathBuf,
    },
    #[command(name = "summarize")]
    Summarize {
        /// Transcript file (defaults to the newest transcript in the data directory)
        #[arg(long)]
        transcript: Option<PathBuf>,

        #[arg(long, default_value = "data")]
        data_dir: PathBuf,
    },
    #[command(name = "map-agenda")]
    MapAgenda {
        /// Agenda file (defaults to <data-dir>/agenda.md)
        #[arg(long)]
        agenda: Option<PathBuf>,

        /// Transcript file (defaults to the newest transcript in the data directory)
        #[arg(long)]
        transcript: Option<PathBuf>,

        #[arg(long, default_value = "data")]
        data_dir: PathBuf,
    },
}

pub fn validate_chunk_minutes(s: &str) -> Result<u64, String> {
    match s.parse::<u64>() {
        Ok(0) => Err("Chunk duration must be at least 1 minute".to_string()),
        Ok(minutes) => Ok(minutes),
        Err(_) => Err("Invalid chunk duration".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_chunk_minutes_is_rejected() {
        assert!(validate_chunk_minutes("0").is_err());
        assert!(validate_chunk_minutes("abc").is_err());
        assert_eq!(validate_chunk_minutes("5"), Ok(5));
    }
}
