/// Per-session scene manifests and leave-one-session-out training splits.
use crate::error::{PreprocessError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Metadata describing the processed outputs of one scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneMetadata {
    /// Processed record array.
    pub filepath: PathBuf,
    pub scene: String,
    /// Session the scene was captured in.
    #[serde(rename = "area")]
    pub session: String,
    /// Raw point array the scene was read from.
    pub raw_filepath: PathBuf,
    /// Number of points.
    pub file_len: usize,
    pub instance_gt_filepath: PathBuf,
    pub color_mean: Vec<f64>,
    pub color_std: Vec<f64>,
}

/// Reads and writes manifests under the output root.
pub struct ManifestStore {
    save_dir: PathBuf,
}

impl ManifestStore {
    pub fn new(save_dir: &Path) -> Self {
        Self {
            save_dir: save_dir.to_path_buf(),
        }
    }

    pub fn session_manifest_path(&self, session: &str) -> PathBuf {
        self.save_dir.join(format!("{session}_database.yaml"))
    }

    pub fn training_manifest_path(&self, held_out: &str) -> PathBuf {
        self.save_dir.join(format!("train_{held_out}_database.yaml"))
    }

    pub fn save_session(&self, session: &str, records: &[SceneMetadata]) -> Result<PathBuf> {
        let path = self.session_manifest_path(session);
        write_manifest(&path, records)?;
        info!(
            "Saved manifest for session '{}' ({} scenes): {}",
            session,
            records.len(),
            path.display()
        );
        Ok(path)
    }

    pub fn load_session(&self, session: &str) -> Result<Vec<SceneMetadata>> {
        let path = self.session_manifest_path(session);
        if !path.is_file() {
            return Err(PreprocessError::MissingManifest {
                session: session.to_string(),
                path,
            });
        }

        let content = fs::read_to_string(&path)?;
        // An empty session serializes as `[]`, but tolerate a blank file too.
        let records: Option<Vec<SceneMetadata>> = serde_yaml::from_str(&content)?;
        Ok(records.unwrap_or_default())
    }

    /// Builds one training manifest per session in `train_sessions`, holding
    /// that session out and concatenating every other session's manifest in
    /// iteration order.
    ///
    /// A session's manifest is only read when some split includes it. Every
    /// such manifest is loaded before anything is written, so a missing one
    /// leaves no partial splits behind.
    pub fn joint_database(&self, train_sessions: &[String]) -> Result<Vec<PathBuf>> {
        let mut manifests: HashMap<&str, Vec<SceneMetadata>> = HashMap::new();
        for session in train_sessions {
            let referenced = train_sessions.iter().any(|held_out| held_out != session);
            if referenced && !manifests.contains_key(session.as_str()) {
                manifests.insert(session.as_str(), self.load_session(session)?);
            }
        }

        let mut written = Vec::with_capacity(train_sessions.len());
        for held_out in train_sessions {
            let joint: Vec<SceneMetadata> = train_sessions
                .iter()
                .filter(|session| *session != held_out)
                .filter_map(|session| manifests.get(session.as_str()))
                .flat_map(|records| records.iter().cloned())
                .collect();

            let path = self.training_manifest_path(held_out);
            write_manifest(&path, &joint)?;
            debug!(
                "Training split without '{}': {} scenes -> {}",
                held_out,
                joint.len(),
                path.display()
            );
            written.push(path);
        }

        info!("Built {} leave-one-session-out training manifests", written.len());
        Ok(written)
    }
}

fn write_manifest(path: &Path, records: &[SceneMetadata]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, serde_yaml::to_string(records)?)?;
    Ok(())
}
