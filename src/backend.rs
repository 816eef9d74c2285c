use anyhow::Result;
use std::path::Path;

/// Seam to the speech-to-text engine: one materialized audio file in, one
/// text out. Calls are made one segment at a time; any retry policy belongs
/// to the implementation, not to the pipeline driving it.
pub trait SpeechBackend: Send + Sync {
    fn transcribe_file(&self, path: &Path) -> Result<String>;
}
