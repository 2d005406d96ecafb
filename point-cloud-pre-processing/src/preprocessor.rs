/// Full preprocessing run: label database, per-scene conversion across all
/// sessions, session manifests and training splits.
use crate::config::PreprocessConfig;
use crate::discovery::discover_scene_files;
use crate::error::Result;
use crate::label_database::{LabelDatabase, LabelDatabaseBuilder};
use crate::manifest::{ManifestStore, SceneMetadata};
use crate::scene::SceneProcessor;
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Outcome of processing one session.
#[derive(Debug, Clone)]
pub struct SessionSummary {
    pub session: String,
    pub scenes: usize,
    pub points: usize,
    /// Scenes left out of the manifest after failing.
    pub skipped: usize,
    pub manifest: PathBuf,
}

#[derive(Debug, Clone)]
pub struct PreprocessSummary {
    pub label_database: PathBuf,
    pub sessions: Vec<SessionSummary>,
    pub training_manifests: Vec<PathBuf>,
}

impl PreprocessSummary {
    pub fn print(&self) {
        println!("Preprocessing Summary:");
        println!("  Label database: {}", self.label_database.display());
        for session in &self.sessions {
            println!(
                "  Session {}: {} scenes, {} points{}",
                session.session,
                session.scenes,
                session.points,
                if session.skipped > 0 {
                    format!(", {} skipped", session.skipped)
                } else {
                    String::new()
                }
            );
        }
        println!("  Training manifests: {}", self.training_manifests.len());
    }
}

/// Drives the preprocessing stages with a shared configuration.
pub struct Preprocessor {
    config: PreprocessConfig,
    scenes: SceneProcessor,
    manifests: ManifestStore,
}

impl Preprocessor {
    pub fn new(config: PreprocessConfig) -> Self {
        let scenes = SceneProcessor::new(&config.save_dir);
        let manifests = ManifestStore::new(&config.save_dir);
        Self {
            config,
            scenes,
            manifests,
        }
    }

    pub fn config(&self) -> &PreprocessConfig {
        &self.config
    }

    /// Writes `label_database.yaml` from the configured class table.
    pub fn create_label_database(&self) -> Result<(LabelDatabase, PathBuf)> {
        LabelDatabaseBuilder::new(self.config.class_map.clone(), self.config.default_colour)
            .build_and_save(&self.config.save_dir)
    }

    pub fn process_file(&self, filepath: &Path, session: &str) -> Result<SceneMetadata> {
        self.scenes.process_file(filepath, session)
    }

    /// Builds the leave-one-session-out training manifests.
    pub fn joint_database(&self, train_sessions: &[String]) -> Result<Vec<PathBuf>> {
        self.manifests.joint_database(train_sessions)
    }

    /// Runs every stage over all configured sessions.
    pub fn preprocess(&self) -> Result<PreprocessSummary> {
        let (_, label_database) = self.create_label_database()?;

        let threads = self.config.worker_threads();
        let pool = ThreadPoolBuilder::new().num_threads(threads).build()?;
        info!(
            "Processing {} sessions with {} worker threads",
            self.config.modes.len(),
            threads
        );

        let mut sessions = Vec::with_capacity(self.config.modes.len());
        for session in &self.config.modes {
            sessions.push(self.process_session(&pool, session)?);
        }

        let training_manifests = self.joint_database(&self.config.modes)?;

        Ok(PreprocessSummary {
            label_database,
            sessions,
            training_manifests,
        })
    }

    /// Converts every scene of a session in parallel and writes the session
    /// manifest in discovery order.
    fn process_session(&self, pool: &ThreadPool, session: &str) -> Result<SessionSummary> {
        let files = discover_scene_files(&self.config.data_dir, session)?;
        info!("Tasks for session '{}': {}", session, files.len());

        let pb = ProgressBar::new(files.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("[{bar:40.green/blue}] {pos}/{len} scenes ({percent}%) {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("▉▊▋▌▍▎▏ "),
        );
        pb.set_message(format!("Session {session}"));

        // Every scene runs to completion so one failure leaves the others'
        // outputs whole.
        let results: Vec<(&PathBuf, Result<SceneMetadata>)> = pool.install(|| {
            files
                .par_iter()
                .map(|file| {
                    let result = self.scenes.process_file(file, session);
                    pb.inc(1);
                    (file, result)
                })
                .collect()
        });
        pb.finish_with_message(format!("Session {session} processed"));

        let mut database = Vec::with_capacity(results.len());
        let mut skipped = 0;
        for (file, result) in results {
            match result {
                Ok(metadata) => database.push(metadata),
                Err(e) if self.config.skip_failed_scenes => {
                    warn!("Skipping scene {}: {}", file.display(), e);
                    skipped += 1;
                }
                Err(e) => return Err(e),
            }
        }

        let manifest = self.manifests.save_session(session, &database)?;

        Ok(SessionSummary {
            session: session.to_string(),
            scenes: database.len(),
            points: database.iter().map(|m| m.file_len).sum(),
            skipped,
            manifest,
        })
    }
}
