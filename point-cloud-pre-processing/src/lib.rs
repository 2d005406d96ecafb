//! Preprocessing for instance segmentation point cloud captures.
//!
//! Converts per-scene raw arrays (points, instance ids, semantic ids) into
//! fixed-layout training records and instance ground truth, and assembles
//! leave-one-session-out training manifests.

pub mod config;
pub mod discovery;
pub mod error;
pub mod label_database;
pub mod manifest;
pub mod npy;
pub mod preprocessor;
pub mod scene;

pub use config::PreprocessConfig;
pub use error::{PreprocessError, Result};
pub use label_database::{LabelDatabase, LabelDatabaseBuilder, LabelEntry};
pub use manifest::{ManifestStore, SceneMetadata};
pub use preprocessor::{PreprocessSummary, Preprocessor};
pub use scene::{SceneProcessor, instance_gt_code, remap_instance_label};
