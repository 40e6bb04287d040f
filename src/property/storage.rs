use super::types::Property;
use anyhow::{Context, Result};
use atomic_write_file::AtomicWriteFile;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::path::Path;
use tracing::debug;

/// Property collection file name inside the data directory
pub const PROPERTIES_FILE: &str = "properties.json";

const PROPERTIES_STATE_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct PropertyState {
    version: u32,
    #[serde(default)]
    properties: Vec<Property>,
}

/// Load the property collection from a JSON file
///
/// If the file doesn't exist, returns an empty collection.
pub fn load_properties(path: &Path) -> Result<Vec<Property>> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let file = File::open(path)
        .with_context(|| format!("Failed to open properties file at {}", path.display()))?;

    let state: PropertyState =
        serde_json::from_reader(file).context("Failed to load properties")?;

    if state.version != PROPERTIES_STATE_VERSION {
        anyhow::bail!("Unsupported properties file version: {}", state.version);
    }

    Ok(state.properties)
}

/// Save the property collection atomically
pub fn save_properties(path: &Path, properties: &[Property]) -> Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create data directory at {}", dir.display()))?;
    }

    let mut file = AtomicWriteFile::open(path)
        .with_context(|| format!("Failed to open atomic write file at {}", path.display()))?;

    #[derive(Serialize)]
    struct PropertyStateRef<'a> {
        version: u32,
        properties: &'a [Property],
    }

    serde_json::to_writer_pretty(
        &mut file,
        &PropertyStateRef {
            version: PROPERTIES_STATE_VERSION,
            properties,
        },
    )
    .context("Failed to serialize properties")?;

    file.commit().context("Failed to save properties")?;

    Ok(())
}

/// Read enriched property bundles from every file matching `pattern`.
///
/// A file may hold a single property object or an array of them.
pub fn read_bundles(pattern: &str) -> Result<Vec<Property>> {
    let mut properties = Vec::new();
    let paths = glob::glob(pattern).with_context(|| format!("Invalid file pattern '{}'", pattern))?;

    for entry in paths {
        let path = entry.context("Failed to read matched path")?;
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;

        let value: serde_json::Value = serde_json::from_str(&content)
            .with_context(|| format!("Invalid JSON in {}", path.display()))?;
        let parsed: Vec<Property> = if value.is_array() {
            serde_json::from_value(value)
        } else {
            serde_json::from_value(value).map(|p| vec![p])
        }
        .with_context(|| format!("Invalid property bundle in {}", path.display()))?;

        debug!(file = %path.display(), count = parsed.len(), "read property bundle");
        properties.extend(parsed);
    }

    Ok(properties)
}

/// Insert `incoming` into `existing`, replacing records with the same id.
/// Replaced records lose their scores. Returns the number of new ids.
pub fn merge_properties(existing: &mut Vec<Property>, incoming: Vec<Property>) -> usize {
    let mut added = 0;
    for mut property in incoming {
        property.scores = None;
        match existing.iter_mut().find(|p| p.id == property.id) {
            Some(slot) => *slot = property,
            None => {
                existing.push(property);
                added += 1;
            }
        }
    }
    added
}
