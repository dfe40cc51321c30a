use anyhow::{Context, Result, anyhow};
use log::debug;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

const STATE_DIR: &str = ".calpulse";
const SNAPSHOT_FILE: &str = "last_feed.ics";
// Feeds larger than this are refused rather than read into memory (10MB)
const MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;

/// Keeps the last-seen feed text so the next check has something to diff against.
pub struct SnapshotStore {
    state_dir: PathBuf,
}

impl SnapshotStore {
    pub fn new() -> Result<Self> {
        let home_dir = dirs::home_dir().ok_or_else(|| anyhow!("Could not find home directory"))?;
        Self::with_dir(home_dir.join(STATE_DIR))
    }

    pub fn with_dir(state_dir: impl Into<PathBuf>) -> Result<Self> {
        let state_dir = state_dir.into();
        fs::create_dir_all(&state_dir)
            .with_context(|| format!("Failed to create state directory {}", state_dir.display()))?;
        Ok(Self { state_dir })
    }

    pub fn snapshot_path(&self) -> PathBuf {
        self.state_dir.join(SNAPSHOT_FILE)
    }

    /// The stored snapshot, or `None` before the first check.
    pub fn load(&self) -> Result<Option<String>> {
        let path = self.snapshot_path();
        if !path.exists() {
            return Ok(None);
        }

        let metadata = fs::metadata(&path)?;
        if metadata.len() > MAX_FILE_SIZE {
            return Err(anyhow!("Stored snapshot exceeds size limit ({} bytes)", metadata.len()));
        }

        let content = fs::read_to_string(&path).context("Failed to read stored snapshot")?;
        debug!("Loaded snapshot of {} bytes from {}", content.len(), path.display());
        Ok(Some(content))
    }

    pub fn save(&self, content: &str) -> Result<()> {
        let path = self.snapshot_path();
        let mut file = OpenOptions::new().write(true).create(true).truncate(true).open(&path)?;
        file.write_all(content.as_bytes()).context("Failed to write snapshot")?;
        debug!("Stored snapshot of {} bytes at {}", content.len(), path.display());
        Ok(())
    }

    pub fn clear(&self) -> Result<()> {
        let path = self.snapshot_path();
        if path.exists() {
            fs::remove_file(path)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_snapshot_round_trip() -> Result<()> {
        let temp_dir = tempdir()?;
        let store = SnapshotStore::with_dir(temp_dir.path().join("state"))?;

        assert_eq!(store.load()?, None);

        store.save("BEGIN:VCALENDAR\nEND:VCALENDAR")?;
        assert_eq!(store.load()?.as_deref(), Some("BEGIN:VCALENDAR\nEND:VCALENDAR"));

        store.save("shorter")?;
        assert_eq!(store.load()?.as_deref(), Some("shorter"));

        store.clear()?;
        assert_eq!(store.load()?, None);

        Ok(())
    }
}
