/// Command line entry point for scene preprocessing
mod opts;

use clap::Parser;
use opts::{Command, JointDatabase, Opts, ProcessFile};
use pcprep::{PreprocessConfig, Preprocessor};
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let Opts { settings, command } = Opts::parse();

    let config = match &settings.config {
        Some(path) => PreprocessConfig::load(path)?,
        None => PreprocessConfig::default(),
    };
    let preprocessor = Preprocessor::new(settings.apply(config));

    match command {
        Command::LabelDatabase => {
            let (database, path) = preprocessor.create_label_database()?;
            println!("Wrote {} classes to {}", database.len(), path.display());
        }
        Command::ProcessFile(ProcessFile { file, session }) => {
            let metadata = preprocessor.process_file(&file, &session)?;
            print!("{}", serde_yaml::to_string(&metadata)?);
        }
        Command::Preprocess => {
            let summary = preprocessor.preprocess()?;
            summary.print();
        }
        Command::JointDatabase(JointDatabase { sessions }) => {
            let sessions = sessions.unwrap_or_else(|| preprocessor.config().modes.clone());
            for path in preprocessor.joint_database(&sessions)? {
                println!("Wrote {}", path.display());
            }
        }
    }

    Ok(())
}
