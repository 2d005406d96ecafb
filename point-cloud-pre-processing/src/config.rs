/// Preprocessing run configuration with YAML and JSON loaders.
use crate::error::{PreprocessError, Result};
use constants::class::{CLASS_MAP, DEFAULT_CLASS_COLOUR};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessConfig {
    /// Root holding one directory of raw scene arrays per session.
    pub data_dir: PathBuf,
    /// Root receiving processed arrays, ground truth and manifests.
    pub save_dir: PathBuf,
    /// Session identifiers, in processing and split order.
    pub modes: Vec<String>,
    /// Worker threads for scene processing; zero or negative uses every core.
    pub n_jobs: i32,
    /// Semantic class name to id.
    pub class_map: BTreeMap<String, u32>,
    /// Colour recorded for every class in the label database.
    pub default_colour: [u8; 3],
    /// Leave failing scenes out of the manifest instead of aborting the run.
    pub skip_failed_scenes: bool,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data/tiled_data_3x3/"),
            save_dir: PathBuf::from("data/processed/wheathead_iis/"),
            modes: ["9", "10", "11", "12"].iter().map(|s| s.to_string()).collect(),
            n_jobs: -1,
            class_map: CLASS_MAP
                .iter()
                .map(|c| (c.name.to_string(), c.id))
                .collect(),
            default_colour: DEFAULT_CLASS_COLOUR,
            skip_failed_scenes: false,
        }
    }
}

impl PreprocessConfig {
    /// Loads a configuration, choosing the format from the file extension.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");

        match extension.to_lowercase().as_str() {
            "yaml" | "yml" => {
                let content = std::fs::read_to_string(path)?;
                Ok(serde_yaml::from_str(&content)?)
            }
            "json" => {
                let content = std::fs::read_to_string(path)?;
                Ok(serde_json::from_str(&content)?)
            }
            _ => Err(PreprocessError::UnsupportedFormat(extension.to_string())),
        }
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");

        let content = match extension.to_lowercase().as_str() {
            "yaml" | "yml" => serde_yaml::to_string(self)?,
            "json" => serde_json::to_string_pretty(self)?,
            _ => return Err(PreprocessError::UnsupportedFormat(extension.to_string())),
        };
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Thread count for the scene worker pool.
    pub fn worker_threads(&self) -> usize {
        if self.n_jobs > 0 {
            self.n_jobs as usize
        } else {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        }
    }
}
