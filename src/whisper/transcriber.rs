use anyhow::{Result, bail};
use log::{debug, info};
use std::path::Path;
use std::sync::{Arc, Mutex};
use whisper_rs::{FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters};

use crate::audio::Recording;
use crate::backend::SpeechBackend;
use crate::whisper::config::WhisperConfig;
use crate::whisper::resampler::{WHISPER_SAMPLE_RATE, resample_to_whisper_rate};

/// Segments whose mean token probability falls below this get flagged in
/// the log so suspect stretches of the transcript can be checked by hand.
const LOW_CONFIDENCE_THRESHOLD: f32 = 0.4;

pub struct InputAudio<'a> {
    pub data: &'a [f32],
    pub sample_rate: u32,
    pub channels: usize,
}

pub struct TranscribeOutput {
    pub combined: String,
    pub segments: Vec<Segment>,
}

/// One segment as whisper sees it, with timestamps in centiseconds.
#[derive(Clone)]
pub struct Segment {
    pub start: usize,
    pub end: usize,
    pub text: String,
    pub confidence: f32,
}

fn low_confidence(segments: &[Segment], threshold: f32) -> Vec<&Segment> {
    segments
        .iter()
        .filter(|segment| segment.confidence < threshold)
        .collect()
}

#[derive(Clone)]
pub struct WhisperTranscriber {
    inner: Arc<Mutex<TranscriberInner>>,
    config: WhisperConfig,
}

struct TranscriberInner {
    ctx: WhisperContext,
}

impl WhisperTranscriber {
    pub fn new(config: WhisperConfig) -> Result<Self> {
        let mut ctx_params = WhisperContextParameters::default();
        ctx_params.use_gpu(config.use_gpu);

        info!(
            "Loading whisper model from {} (gpu: {})",
            config.model_path.display(),
            config.use_gpu
        );

        let model_path = config
            .model_path
            .to_str()
            .ok_or_else(|| anyhow::anyhow!("Model path is not valid UTF-8"))?;
        let ctx = WhisperContext::new_with_params(model_path, ctx_params)
            .map_err(|e| anyhow::anyhow!("Failed to load model: {}", e))?;

        Ok(Self {
            inner: Arc::new(Mutex::new(TranscriberInner { ctx })),
            config,
        })
    }

    pub fn transcribe(&self, audio: &InputAudio) -> Result<TranscribeOutput> {
        // Downmix first so only one channel goes through the resampler.
        let mono_source = match audio.channels {
            1 => audio.data.to_vec(),
            2 => whisper_rs::convert_stereo_to_mono_audio(audio.data)
                .map_err(|e| anyhow::anyhow!("Failed to convert audio to mono: {}", e))?,
            n => bail!("Unsupported channel count: {}", n),
        };

        let mut mono = resample_to_whisper_rate(&mono_source, audio.sample_rate)?;

        // Whisper needs at least one second of audio; pad short tails with
        // silence instead of rejecting them.
        if mono.len() < WHISPER_SAMPLE_RATE as usize {
            mono.resize(WHISPER_SAMPLE_RATE as usize, 0.0);
        }

        let mut params = FullParams::new(SamplingStrategy::Greedy { best_of: 1 });
        params.set_language(Some(&self.config.language));
        params.set_print_special(false);
        params.set_print_progress(false);
        params.set_print_realtime(false);
        params.set_print_timestamps(true);
        params.set_audio_ctx(self.config.audio_context);
        params.set_no_speech_thold(self.config.no_speech_threshold);
        params.set_n_threads(self.config.num_threads);

        let inner = self
            .inner
            .lock()
            .map_err(|_| anyhow::anyhow!("Failed to acquire transcriber lock"))?;

        let mut state = inner
            .ctx
            .create_state()
            .map_err(|e| anyhow::anyhow!("Failed to create whisper state: {}", e))?;

        state
            .full(params, &mono)
            .map_err(|e| anyhow::anyhow!("Failed to run transcription: {}", e))?;

        let num_segments = state
            .full_n_segments()
            .map_err(|e| anyhow::anyhow!("Failed to get segment count: {}", e))?;

        let mut combined = String::new();
        let mut segments = Vec::with_capacity(num_segments as usize);

        for i in 0..num_segments {
            let text = state
                .full_get_segment_text(i)
                .map_err(|e| anyhow::anyhow!("Failed to get segment text: {}", e))?;
            let start = state
                .full_get_segment_t0(i)
                .map_err(|e| anyhow::anyhow!("Failed to get segment start: {}", e))?;
            let end = state
                .full_get_segment_t1(i)
                .map_err(|e| anyhow::anyhow!("Failed to get segment end: {}", e))?;
            let confidence = self.segment_confidence(&state, i)?;

            combined.push_str(&text);
            segments.push(Segment {
                start: start as usize,
                end: end as usize,
                text,
                confidence,
            });
        }

        debug!(
            "Whisper produced {} segment(s), {} characters",
            segments.len(),
            combined.len()
        );

        Ok(TranscribeOutput { combined, segments })
    }

    fn segment_confidence(
        &self,
        state: &whisper_rs::WhisperState,
        segment_idx: i32,
    ) -> Result<f32> {
        let n_tokens = state.full_n_tokens(segment_idx)?;
        if n_tokens == 0 {
            return Ok(0.0);
        }

        let mut sum_logprob = 0.0_f32;
        for token_idx in 0..n_tokens {
            let token_data = state.full_get_token_data(segment_idx, token_idx)?;
            sum_logprob += token_data.plog;
        }

        Ok((sum_logprob / n_tokens as f32).exp())
    }
}

impl SpeechBackend for WhisperTranscriber {
    fn transcribe_file(&self, path: &Path) -> Result<String> {
        let recording = Recording::load(path)?;
        let output = self.transcribe(&InputAudio {
            data: &recording.samples,
            sample_rate: recording.sample_rate,
            channels: recording.channels,
        })?;

        for segment in low_confidence(&output.segments, LOW_CONFIDENCE_THRESHOLD) {
            debug!(
                "Low confidence ({:.2}) at {}..{}cs: {}",
                segment.confidence,
                segment.start,
                segment.end,
                segment.text.trim()
            );
        }

        Ok(output.combined.trim().to_string())
    }
}
