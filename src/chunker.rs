use anyhow::{Context, Result, bail};
use log::{debug, error, info, warn};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::audio::{Recording, write_wav};
use crate::backend::SpeechBackend;

/// Why a single segment produced no text. Failures are isolated to the
/// segment they occurred in and never abort the rest of the run.
#[derive(Debug, Error)]
pub enum SegmentError {
    #[error("materialization failed: {0}")]
    Materialize(anyhow::Error),
    #[error("inference failed: {0}")]
    Inference(anyhow::Error),
}

/// One planned slice of the recording timeline. Plans are contiguous,
/// non-overlapping, ordered by index, and cover the full duration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentPlan {
    pub index: usize,
    pub start: Duration,
    pub end: Duration,
}

/// Outcome for one segment, keyed by its ordinal so results can be
/// reassembled in order regardless of how they were produced.
#[derive(Debug)]
pub struct SegmentResult {
    pub index: usize,
    pub outcome: Result<String, SegmentError>,
}

impl SegmentResult {
    /// Presentation form: the transcribed text, or a placeholder naming the
    /// 1-based chunk number on failure.
    pub fn text(&self) -> String {
        match &self.outcome {
            Ok(text) => text.clone(),
            Err(_) => format!("[Error in chunk {}]", self.index + 1),
        }
    }
}

/// Full result of a chunked transcription run.
#[derive(Debug)]
pub struct Transcript {
    pub results: Vec<SegmentResult>,
}

impl Transcript {
    /// Join per-segment text in ordinal order with a single space.
    pub fn to_text(&self) -> String {
        self.results
            .iter()
            .map(|r| r.text())
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn failed_segments(&self) -> usize {
        self.results.iter().filter(|r| r.outcome.is_err()).count()
    }
}

/// Walk the timeline in steps of `max_segment`. The final segment may be
/// shorter; a zero-length recording yields no segments.
pub fn partition(total: Duration, max_segment: Duration) -> Vec<SegmentPlan> {
    if max_segment.is_zero() {
        // Callers validate this; avoid spinning on a zero step.
        return Vec::new();
    }
    let mut plans = Vec::new();
    let mut start = Duration::ZERO;
    while start < total {
        let end = (start + max_segment).min(total);
        plans.push(SegmentPlan {
            index: plans.len(),
            start,
            end,
        });
        start = end;
    }
    plans
}

/// A segment's audio written out for the backend. Lives in the run's
/// private temp directory until released.
pub struct TempSegment {
    pub path: PathBuf,
    pub index: usize,
}

impl TempSegment {
    /// Best-effort idempotent delete. A missing file is fine; anything else
    /// is logged and swallowed.
    pub fn release(&self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!("Removed segment {} file {}", self.index, self.path.display()),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove {}: {e}", self.path.display()),
        }
    }
}

/// Extract the plan's sample range and write it to a uniquely named WAV in
/// `dir`, preserving the source sample rate and channel count.
pub fn materialize(recording: &Recording, plan: &SegmentPlan, dir: &Path) -> Result<TempSegment> {
    let path = dir.join(format!("segment-{:04}.wav", plan.index));
    let samples = recording.slice(plan.start, plan.end);
    write_wav(&path, samples, recording.sample_rate, recording.channels)
        .with_context(|| format!("Failed to write segment {} audio", plan.index))?;
    debug!(
        "Materialized segment {} ({:?}..{:?}) to {}",
        plan.index,
        plan.start,
        plan.end,
        path.display()
    );
    Ok(TempSegment {
        path,
        index: plan.index,
    })
}

/// Turns one long recording into one transcript without exceeding the
/// backend's per-call duration limit. Segments are processed strictly in
/// order, one full materialize/infer/release cycle at a time; a failure in
/// one segment never stops the rest.
pub struct ChunkedTranscriber<B: SpeechBackend> {
    backend: B,
    max_segment: Duration,
}

impl<B: SpeechBackend> ChunkedTranscriber<B> {
    pub fn new(backend: B, max_segment: Duration) -> Result<Self> {
        if max_segment.is_zero() {
            bail!("Segment duration must be positive");
        }
        Ok(Self {
            backend,
            max_segment,
        })
    }

    pub fn transcribe(&self, recording: &Recording) -> Result<Transcript> {
        let plans = partition(recording.duration(), self.max_segment);
        if plans.is_empty() {
            info!("Recording is empty, nothing to transcribe");
            return Ok(Transcript {
                results: Vec::new(),
            });
        }

        info!(
            "Transcribing {:?} of audio in {} segment(s) of up to {:?}",
            recording.duration(),
            plans.len(),
            self.max_segment
        );

        let workdir = tempfile::Builder::new()
            .prefix("vox-segments-")
            .tempdir()
            .context("Failed to create segment working directory")?;

        let mut results = Vec::with_capacity(plans.len());
        for plan in &plans {
            let outcome = self.run_segment(recording, plan, workdir.path());
            if let Err(e) = &outcome {
                error!("Segment {} failed: {e}", plan.index);
            }
            results.push(SegmentResult {
                index: plan.index,
                outcome,
            });
        }

        let transcript = Transcript { results };
        if transcript.failed_segments() > 0 {
            warn!(
                "{} of {} segment(s) failed; transcript contains placeholders",
                transcript.failed_segments(),
                plans.len()
            );
        }
        Ok(transcript)
    }

    fn run_segment(
        &self,
        recording: &Recording,
        plan: &SegmentPlan,
        workdir: &Path,
    ) -> Result<String, SegmentError> {
        let segment = materialize(recording, plan, workdir).map_err(SegmentError::Materialize)?;
        let outcome = self
            .backend
            .transcribe_file(&segment.path)
            .map_err(SegmentError::Inference);
        // Release on both paths before moving to the next segment.
        segment.release();
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use std::sync::Mutex;

    fn secs(s: u64) -> Duration {
        Duration::from_secs(s)
    }

    fn recording(duration_secs: usize) -> Recording {
        Recording {
            samples: vec![0.25; duration_secs * 100],
            sample_rate: 100,
            channels: 1,
        }
    }

    /// Pops one canned response per call and remembers the paths it saw.
    struct ScriptedBackend {
        responses: Mutex<Vec<Result<String>>>,
        seen_paths: Mutex<Vec<PathBuf>>,
    }

    impl ScriptedBackend {
        fn new(responses: Vec<Result<String>>) -> Self {
            let mut reversed = responses;
            reversed.reverse();
            Self {
                responses: Mutex::new(reversed),
                seen_paths: Mutex::new(Vec::new()),
            }
        }
    }

    impl SpeechBackend for ScriptedBackend {
        fn transcribe_file(&self, path: &Path) -> Result<String> {
            assert!(path.exists(), "segment file must exist during inference");
            self.seen_paths.lock().unwrap().push(path.to_path_buf());
            self.responses
                .lock()
                .unwrap()
                .pop()
                .expect("backend called more times than scripted")
        }
    }

    #[test]
    fn partition_steps_through_the_timeline() {
        let plans = partition(secs(720), secs(300));
        assert_eq!(plans.len(), 3);
        assert_eq!(plans[0].start, secs(0));
        assert_eq!(plans[0].end, secs(300));
        assert_eq!(plans[1].start, secs(300));
        assert_eq!(plans[1].end, secs(600));
        assert_eq!(plans[2].start, secs(600));
        assert_eq!(plans[2].end, secs(720));
    }

    #[test]
    fn partition_is_contiguous_and_exhaustive() {
        let total = Duration::from_millis(12_345);
        let chunk = Duration::from_millis(700);
        let plans = partition(total, chunk);

        let expected = total.as_millis().div_ceil(chunk.as_millis());
        assert_eq!(plans.len() as u128, expected);

        assert_eq!(plans[0].start, Duration::ZERO);
        assert_eq!(plans.last().unwrap().end, total);
        for pair in plans.windows(2) {
            assert_eq!(pair[0].end, pair[1].start);
            assert_eq!(pair[0].index + 1, pair[1].index);
        }
        for plan in &plans {
            assert!(plan.start < plan.end);
            assert!(plan.end - plan.start <= chunk);
        }
    }

    #[test]
    fn partition_of_empty_recording_is_empty() {
        assert!(partition(Duration::ZERO, secs(300)).is_empty());
    }

    #[test]
    fn short_recording_gets_one_full_segment() {
        let plans = partition(secs(90), secs(300));
        assert_eq!(plans.len(), 1);
        assert_eq!(plans[0].start, secs(0));
        assert_eq!(plans[0].end, secs(90));
    }

    #[test]
    fn transcribe_joins_segments_in_order() {
        let backend = ScriptedBackend::new(vec![
            Ok("hello".to_string()),
            Ok("world".to_string()),
            Ok("!".to_string()),
        ]);
        let transcriber = ChunkedTranscriber::new(backend, secs(5)).unwrap();

        let transcript = transcriber.transcribe(&recording(12)).unwrap();
        assert_eq!(transcript.results.len(), 3);
        assert_eq!(transcript.to_text(), "hello world !");
    }

    #[test]
    fn one_failed_segment_does_not_stop_the_rest() {
        let backend = ScriptedBackend::new(vec![
            Err(anyhow!("model exploded")),
            Ok("second half".to_string()),
        ]);
        let transcriber = ChunkedTranscriber::new(backend, secs(5)).unwrap();

        let transcript = transcriber.transcribe(&recording(10)).unwrap();
        assert_eq!(transcript.failed_segments(), 1);
        assert_eq!(transcript.to_text(), "[Error in chunk 1] second half");
    }

    #[test]
    fn segment_files_are_cleaned_up() {
        let backend = ScriptedBackend::new(vec![
            Ok("a".to_string()),
            Err(anyhow!("boom")),
            Ok("c".to_string()),
        ]);
        let transcriber = ChunkedTranscriber::new(backend, secs(4)).unwrap();

        transcriber.transcribe(&recording(12)).unwrap();

        let seen = transcriber.backend.seen_paths.lock().unwrap();
        assert_eq!(seen.len(), 3);
        for path in seen.iter() {
            assert!(!path.exists(), "{} should have been released", path.display());
        }
    }

    #[test]
    fn empty_recording_yields_empty_transcript() {
        let backend = ScriptedBackend::new(vec![]);
        let transcriber = ChunkedTranscriber::new(backend, secs(5)).unwrap();

        let transcript = transcriber.transcribe(&recording(0)).unwrap();
        assert!(transcript.results.is_empty());
        assert_eq!(transcript.to_text(), "");
    }

    #[test]
    fn zero_segment_duration_is_rejected_up_front() {
        let backend = ScriptedBackend::new(vec![]);
        assert!(ChunkedTranscriber::new(backend, Duration::ZERO).is_err());
    }

    #[test]
    fn deterministic_backend_gives_identical_transcripts() {
        struct FixedBackend;
        impl SpeechBackend for FixedBackend {
            fn transcribe_file(&self, _path: &Path) -> Result<String> {
                Ok("same".to_string())
            }
        }

        let transcriber = ChunkedTranscriber::new(FixedBackend, secs(3)).unwrap();
        let rec = recording(7);
        let first = transcriber.transcribe(&rec).unwrap().to_text();
        let second = transcriber.transcribe(&rec).unwrap().to_text();
        assert_eq!(first, second);
        assert_eq!(first, "same same same");
    }

    #[test]
    fn materialize_writes_the_planned_range() {
        let dir = tempfile::tempdir().unwrap();
        let rec = recording(10);
        let plan = SegmentPlan {
            index: 1,
            start: secs(5),
            end: secs(8),
        };

        let segment = materialize(&rec, &plan, dir.path()).unwrap();
        let written = Recording::load(&segment.path).unwrap();
        assert_eq!(written.frames(), 300);
        assert_eq!(written.sample_rate, rec.sample_rate);

        segment.release();
        assert!(!segment.path.exists());
        // Releasing again is a no-op.
        segment.release();
    }
}
