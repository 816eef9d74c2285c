mod agents;
mod audio;
mod backend;
mod chunker;
mod cli;
mod config;
mod store;
mod whisper;

use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::agents::agenda::{self, MappingResult};
use crate::agents::gemini::GeminiClient;
use crate::agents::summarizer;
use crate::audio::Recording;
use crate::chunker::ChunkedTranscriber;
use crate::cli::{Cli, Commands};
use crate::config::GeminiConfig;
use crate::whisper::config::WhisperConfig;
use crate::whisper::transcriber::WhisperTranscriber;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Transcribe {
            audio_file,
            chunk_minutes,
            model_path,
            language,
            data_dir,
        } => run_transcribe(audio_file, chunk_minutes, model_path, language, data_dir),
        Commands::Summarize {
            transcript,
            data_dir,
        } => run_summarize(transcript, data_dir).await,
        Commands::MapAgenda {
            agenda,
            transcript,
            data_dir,
        } => run_map_agenda(agenda, transcript, data_dir).await,
    }
}

fn run_transcribe(
    audio_file: PathBuf,
    chunk_minutes: u64,
    model_path: Option<PathBuf>,
    language: Option<String>,
    data_dir: PathBuf,
) -> Result<()> {
    let recording = Recording::load(&audio_file)?;
    println!(
        "🎵 Loaded {}: {:?} of audio at {}Hz",
        audio_file.display(),
        recording.duration(),
        recording.sample_rate
    );

    let config = WhisperConfig::from_env(model_path, language)?;
    info!(
        "Using configuration: model_path={:?}, use_gpu={}, language={}, num_threads={}",
        config.model_path, config.use_gpu, config.language, config.num_threads
    );

    let backend = WhisperTranscriber::new(config)?;
    let transcriber = ChunkedTranscriber::new(backend, Duration::from_secs(chunk_minutes * 60))?;

    let transcript = transcriber.transcribe(&recording)?;
    if transcript.failed_segments() > 0 {
        eprintln!(
            "⚠️  {} chunk(s) failed; transcript contains error markers",
            transcript.failed_segments()
        );
    }

    let text = transcript.to_text();
    store::ensure_dir(&data_dir)?;
    let output_file = store::timestamped_path(&data_dir, "transcript", "txt");
    store::write_text(&output_file, &text)?;

    println!("\n📝 Transcription saved to: {}", output_file.display());
    println!("\n{text}");
    Ok(())
}

async fn run_summarize(transcript: Option<PathBuf>, data_dir: PathBuf) -> Result<()> {
    let transcript_file = match transcript {
        Some(path) => path,
        None => store::latest_transcript(&data_dir)?,
    };
    let content = fs::read_to_string(&transcript_file)
        .with_context(|| format!("Failed to read transcript: {}", transcript_file.display()))?;

    println!("📁 Reading transcript from: {}", transcript_file.display());
    println!("   Transcript length: {} characters\n", content.len());

    let client = GeminiClient::new(GeminiConfig::from_env()?);
    let summary = summarizer::summarize(&client, &content).await?;

    if let Some(error) = &summary.error {
        eprintln!("❌ Summarizer rejected the transcript: {error}");
    }

    store::ensure_dir(&data_dir)?;
    let output_file = store::timestamped_path(&data_dir, "summary", "json");
    store::write_text(&output_file, &serde_json::to_string_pretty(&summary)?)?;

    println!("{}", "=".repeat(80));
    println!("SUMMARY SAVED TO: {}", output_file.display());
    println!("{}", "=".repeat(80));
    if let Some(one_line) = &summary.one_line {
        println!("\n{one_line}");
    }
    println!(
        "\n{} decision(s), {} action item(s), {} open question(s)",
        summary.key_decisions.len(),
        summary.action_items.len(),
        summary.open_questions.len()
    );
    Ok(())
}

async fn run_map_agenda(
    agenda: Option<PathBuf>,
    transcript: Option<PathBuf>,
    data_dir: PathBuf,
) -> Result<()> {
    let agenda_file = agenda.unwrap_or_else(|| data_dir.join("agenda.md"));
    let transcript_file = match transcript {
        Some(path) => path,
        None => store::latest_transcript(&data_dir)?,
    };

    let agenda_content = fs::read_to_string(&agenda_file)
        .with_context(|| format!("Failed to read agenda: {}", agenda_file.display()))?;
    let transcript_content = fs::read_to_string(&transcript_file)
        .with_context(|| format!("Failed to read transcript: {}", transcript_file.display()))?;

    println!("📁 Reading agenda from: {}", agenda_file.display());
    println!("   Agenda length: {} characters", agenda_content.len());
    println!("📁 Reading transcript from: {}", transcript_file.display());
    println!(
        "   Transcript length: {} characters\n",
        transcript_content.len()
    );

    let client = GeminiClient::new(GeminiConfig::from_env()?);
    store::ensure_dir(&data_dir)?;
    println!("Processing with agenda mapper...");

    match agenda::map_agenda(&client, &agenda_content, &transcript_content).await? {
        MappingResult::Mapped(mapping) => {
            let output_file = store::timestamped_path(&data_dir, "agenda_mapping", "json");
            store::write_text(&output_file, &serde_json::to_string_pretty(&mapping)?)?;

            println!("{}", "=".repeat(80));
            println!("AGENDA MAPPING SAVED TO: {}", output_file.display());
            println!("{}", "=".repeat(80));
            println!("\nFound {} agenda topic(s)", mapping.topics().len());
            for topic in mapping.topics() {
                println!(
                    "  - {}: {} transcript section(s)",
                    topic.topic_title,
                    topic.transcript_sections.len()
                );
            }
            if !mapping.unmapped_sections.is_empty() {
                println!(
                    "\n⚠️  {} unmapped section(s) found",
                    mapping.unmapped_sections.len()
                );
            }
        }
        MappingResult::Unparsed { response, error } => {
            let error_file = store::timestamped_path(&data_dir, "agenda_mapping_error", "txt");
            store::write_text(&error_file, &response)?;

            eprintln!("❌ Failed to parse JSON response: {error}");
            eprintln!("Raw response saved to: {}", error_file.display());
        }
    }
    Ok(())
}
