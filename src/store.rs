use anyhow::{Context, Result, bail};
use chrono::Local;
use std::fs;
use std::path::{Path, PathBuf};

/// Timestamp used in output filenames, e.g. `20251129_09-21-47`.
pub fn timestamp() -> String {
    Local::now().format("%Y%m%d_%H-%M-%S").to_string()
}

pub fn timestamped_path(dir: &Path, prefix: &str, ext: &str) -> PathBuf {
    dir.join(format!("{}_{}.{}", prefix, timestamp(), ext))
}

/// Newest `transcript_*.txt` in `dir` (timestamped names sort
/// chronologically), falling back to a plain `transcript.txt`.
pub fn latest_transcript(dir: &Path) -> Result<PathBuf> {
    let entries = fs::read_dir(dir)
        .with_context(|| format!("Failed to read data directory: {}", dir.display()))?;

    let mut candidates: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.file_name()
                .and_then(|name| name.to_str())
                .map(|name| name.starts_with("transcript_") && name.ends_with(".txt"))
                .unwrap_or(false)
        })
        .collect();
    candidates.sort();

    if let Some(newest) = candidates.pop() {
        return Ok(newest);
    }

    let fallback = dir.join("transcript.txt");
    if fallback.exists() {
        return Ok(fallback);
    }

    bail!("No transcript file found in {}", dir.display());
}

pub fn write_text(path: &Path, content: &str) -> Result<()> {
    fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))
}

/// Create the data directory (and parents) if it is not there yet.
pub fn ensure_dir(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create data directory: {}", dir.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamp_has_the_expected_shape() {
        let ts = timestamp();
        assert_eq!(ts.len(), 17);
        assert_eq!(&ts[8..9], "_");
    }

    #[test]
    fn newest_timestamped_transcript_wins() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("transcript_20251101_10-00-00.txt"), "old").unwrap();
        fs::write(dir.path().join("transcript_20251129_09-21-47.txt"), "new").unwrap();
        fs::write(dir.path().join("summary_20251130_09-00-00.json"), "{}").unwrap();

        let path = latest_transcript(dir.path()).unwrap();
        assert_eq!(
            path.file_name().unwrap(),
            "transcript_20251129_09-21-47.txt"
        );
    }

    #[test]
    fn falls_back_to_plain_transcript() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("transcript.txt"), "plain").unwrap();

        let path = latest_transcript(dir.path()).unwrap();
        assert_eq!(path.file_name().unwrap(), "transcript.txt");
    }

    #[test]
    fn ensure_dir_creates_missing_directories() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("fresh").join("data");

        ensure_dir(&nested).unwrap();
        assert!(nested.is_dir());

        // Already existing is fine too.
        ensure_dir(&nested).unwrap();
        write_text(&nested.join("summary_test.json"), "{}").unwrap();
    }

    #[test]
    fn missing_transcripts_are_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(latest_transcript(dir.path()).is_err());
    }
}
