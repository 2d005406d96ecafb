use clap::{Args, Parser, Subcommand};
use pcprep::PreprocessConfig;
use std::path::PathBuf;

/// Instance segmentation point cloud preprocessing.
#[derive(Debug, Clone, Parser)]
#[command(name = "pcprep", version)]
pub struct Opts {
    #[command(flatten)]
    pub settings: Settings,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Write the label database to the output root.
    LabelDatabase,
    /// Convert a single scene and print its manifest entry.
    ProcessFile(ProcessFile),
    /// Run the label database, every scene of every session, and the
    /// training splits.
    Preprocess,
    /// Build leave-one-session-out training manifests from existing
    /// session manifests.
    JointDatabase(JointDatabase),
}

/// Overrides applied on top of the configuration file.
#[derive(Debug, Clone, Args)]
pub struct Settings {
    /// YAML or JSON configuration file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    #[arg(long, global = true)]
    pub save_dir: Option<PathBuf>,

    /// Comma separated session identifiers.
    #[arg(long, global = true, value_delimiter = ',')]
    pub modes: Option<Vec<String>>,

    /// Worker threads; zero or negative uses every core.
    #[arg(long, global = true, allow_negative_numbers = true)]
    pub n_jobs: Option<i32>,

    /// Leave failing scenes out of the manifests instead of aborting.
    #[arg(long, global = true)]
    pub skip_failed_scenes: bool,
}

impl Settings {
    pub fn apply(self, mut config: PreprocessConfig) -> PreprocessConfig {
        if let Some(data_dir) = self.data_dir {
            config.data_dir = data_dir;
        }
        if let Some(save_dir) = self.save_dir {
            config.save_dir = save_dir;
        }
        if let Some(modes) = self.modes {
            config.modes = modes;
        }
        if let Some(n_jobs) = self.n_jobs {
            config.n_jobs = n_jobs;
        }
        if self.skip_failed_scenes {
            config.skip_failed_scenes = true;
        }
        config
    }
}

#[derive(Debug, Clone, Args)]
pub struct ProcessFile {
    /// Scene point array, `<scene>_point.npy`.
    pub file: PathBuf,

    #[arg(short, long)]
    pub session: String,
}

#[derive(Debug, Clone, Args)]
pub struct JointDatabase {
    /// Sessions to split; defaults to the configured sessions.
    #[arg(long, value_delimiter = ',')]
    pub sessions: Option<Vec<String>>,
}
