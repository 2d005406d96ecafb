/// Error types for scene preprocessing and manifest assembly.
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PreprocessError {
    #[error("missing input file {}", path.display())]
    MissingFile { path: PathBuf },

    #[error(
        "array lengths don't match in scene '{scene}': {points} points, {instances} instance labels, {semantics} semantic labels"
    )]
    LengthMismatch {
        scene: String,
        points: usize,
        instances: usize,
        semantics: usize,
    },

    #[error("manifest for session '{session}' not found at {}", path.display())]
    MissingManifest { session: String, path: PathBuf },

    #[error("'{}' is not a scene point file (expected a name ending in '{suffix}')", path.display())]
    InvalidScenePath { path: PathBuf, suffix: &'static str },

    #[error("unexpected shape {shape:?} in {}: {expected}", path.display())]
    InvalidShape {
        path: PathBuf,
        shape: Vec<usize>,
        expected: &'static str,
    },

    #[error("malformed npy file {}: {reason}", path.display())]
    Npy { path: PathBuf, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unsupported config format '{0}'")]
    UnsupportedFormat(String),

    #[error("failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

pub type Result<T, E = PreprocessError> = std::result::Result<T, E>;
