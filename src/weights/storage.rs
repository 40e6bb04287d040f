use super::types::{WeightState, WEIGHTS_STATE_VERSION};
use anyhow::{Context, Result};
use atomic_write_file::AtomicWriteFile;
use std::fs::{self, File};
use std::path::Path;

/// Weights file name inside the data directory
pub const WEIGHTS_FILE: &str = "weights.json";

/// Load weight records from a JSON file
///
/// If the file doesn't exist, returns a new empty state.
/// If the file exists but has an unsupported version, returns an error.
pub fn load_weight_state(path: &Path) -> Result<WeightState> {
    if !path.exists() {
        return Ok(WeightState::new());
    }

    let file = File::open(path)
        .with_context(|| format!("Failed to open weights file at {}", path.display()))?;

    let state: WeightState =
        serde_json::from_reader(file).context("Failed to load weight records")?;

    if state.version != WEIGHTS_STATE_VERSION {
        anyhow::bail!("Unsupported weights file version: {}", state.version);
    }

    Ok(state)
}

/// Save weight records to a JSON file atomically
///
/// The file is either fully replaced or left untouched.
pub fn save_weight_state(path: &Path, state: &WeightState) -> Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create data directory at {}", dir.display()))?;
    }

    let mut file = AtomicWriteFile::open(path)
        .with_context(|| format!("Failed to open atomic write file at {}", path.display()))?;

    serde_json::to_writer_pretty(&mut file, state).context("Failed to serialize weight records")?;

    file.commit().context("Failed to save weight records")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::{Criterion, Profile, WeightVector};

    #[test]
    fn test_load_missing_file_returns_empty() {
        let dir = tempfile::tempdir().unwrap();
        let state = load_weight_state(&dir.path().join(WEIGHTS_FILE)).unwrap();
        assert_eq!(state.version, 1);
        assert!(state.records.is_empty());
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(WEIGHTS_FILE);

        let mut state = WeightState::new();
        let vector: WeightVector = [(Criterion::Transport, 0.4), (Criterion::Environment, 0.6)]
            .into_iter()
            .collect();
        state.replace_profile(Profile::Lifestyle, &vector);

        save_weight_state(&path, &state).unwrap();
        let loaded = load_weight_state(&path).unwrap();

        assert_eq!(loaded, state);
        assert_eq!(loaded.active_vector(Profile::Lifestyle), Some(vector));
    }

    #[test]
    fn test_unsupported_version_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(WEIGHTS_FILE);
        std::fs::write(&path, r#"{"version": 9, "records": []}"#).unwrap();
        let err = load_weight_state(&path).unwrap_err();
        assert!(err.to_string().contains("version"));
    }
}
