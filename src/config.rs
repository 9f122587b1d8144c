use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub struct AppConfig {
    pub root: PathBuf,
}

impl AppConfig {
    pub fn from_args(args: &[String]) -> Result<Self, String> {
        if args.len() < 2 {
            return Err("usage: endless <asset-root>".to_string());
        }
        Ok(Self {
            root: Path::new(&args[1]).to_path_buf(),
        })
    }
}

/// Tunables read from `<root>/server.yaml`; a missing file means defaults.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Directory of map files, relative to the asset root.
    pub map_dir: String,
    /// Slots available per chest, shared between rules and deposits.
    pub chest_slots: usize,
    /// Largest amount one chest item stack may hold.
    pub max_chest: u32,
    /// Floor items allowed on a single tile.
    pub max_tile: usize,
    /// Floor items allowed on a whole map.
    pub max_map: usize,
    /// Delay before a manually opened door closes itself.
    pub door_close_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            map_dir: "maps".to_string(),
            chest_slots: 5,
            max_chest: 10_000_000,
            max_tile: 8,
            max_map: 400,
            door_close_ms: 3000,
        }
    }
}

impl ServerConfig {
    pub fn load(root: &Path) -> Result<Self, String> {
        let path = root.join("server.yaml");
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(&path)
            .map_err(|err| format!("failed to read {}: {}", path.display(), err))?;
        serde_yaml::from_str(&content)
            .map_err(|err| format!("failed to parse {}: {}", path.display(), err))
    }

    pub fn map_dir(&self, root: &Path) -> PathBuf {
        root.join(&self.map_dir)
    }

    pub fn limits(&self) -> Limits {
        Limits {
            chest_slots: self.chest_slots,
            max_chest: self.max_chest,
            max_tile: self.max_tile,
            max_map: self.max_map,
            door_close_ms: self.door_close_ms,
        }
    }
}

/// The capacity/timing subset of the config that live maps carry around.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    pub chest_slots: usize,
    pub max_chest: u32,
    pub max_tile: usize,
    pub max_map: usize,
    pub door_close_ms: u64,
}

impl Default for Limits {
    fn default() -> Self {
        ServerConfig::default().limits()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = ServerConfig::default();
        assert_eq!(config.map_dir, "maps");
        assert_eq!(config.chest_slots, 5);
        assert_eq!(config.max_tile, 8);
        assert_eq!(config.max_map, 400);
        assert_eq!(config.door_close_ms, 3000);
    }

    #[test]
    fn partial_yaml_fills_in_defaults() {
        let config: ServerConfig =
            serde_yaml::from_str("max_tile: 4\ndoor_close_ms: 1500\n").expect("parse");
        assert_eq!(config.max_tile, 4);
        assert_eq!(config.door_close_ms, 1500);
        assert_eq!(config.chest_slots, 5);
        assert_eq!(config.map_dir, "maps");
    }

    #[test]
    fn from_args_requires_root() {
        let err = AppConfig::from_args(&["endless".to_string()]).unwrap_err();
        assert!(err.starts_with("usage:"));
        let config =
            AppConfig::from_args(&["endless".to_string(), "/srv/world".to_string()]).expect("args");
        assert_eq!(config.root, Path::new("/srv/world"));
    }
}
