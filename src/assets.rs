use std::fs;
use std::path::Path;

#[derive(Debug, Default)]
pub struct AssetSummary {
    pub map_files: usize,
}

/// Counts the map files under the configured directory before anything
/// is decoded, so startup can report what it is about to load.
pub fn scan(map_dir: &Path) -> Result<AssetSummary, String> {
    let entries = fs::read_dir(map_dir)
        .map_err(|err| format!("failed to read {}: {}", map_dir.display(), err))?;

    let mut map_files = 0usize;
    for entry in entries {
        let entry = entry.map_err(|err| format!("asset scan failed: {}", err))?;
        if entry.path().extension().and_then(|ext| ext.to_str()) == Some("emf") {
            map_files += 1;
        }
    }

    Ok(AssetSummary { map_files })
}
