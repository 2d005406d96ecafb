/// Label database (class taxonomy) generation.
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub const LABEL_DATABASE_FILE: &str = "label_database.yaml";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelEntry {
    #[serde(rename = "color")]
    pub colour: [u8; 3],
    pub name: String,
    pub validation: bool,
}

/// Class id to label entry, ordered by id.
pub type LabelDatabase = BTreeMap<u32, LabelEntry>;

/// Builds the label database from a class table and writes it under the
/// output root.
pub struct LabelDatabaseBuilder {
    class_map: BTreeMap<String, u32>,
    default_colour: [u8; 3],
}

impl LabelDatabaseBuilder {
    pub fn new(class_map: BTreeMap<String, u32>, default_colour: [u8; 3]) -> Self {
        Self {
            class_map,
            default_colour,
        }
    }

    pub fn build(&self) -> LabelDatabase {
        let mut database = LabelDatabase::new();

        for (name, &id) in &self.class_map {
            let entry = LabelEntry {
                colour: self.default_colour,
                name: name.clone(),
                validation: true,
            };
            if let Some(previous) = database.insert(id, entry) {
                warn!(
                    "Class id {} assigned to both '{}' and '{}', keeping '{}'",
                    id, previous.name, name, name
                );
            }
        }

        database
    }

    /// Builds the database and persists it as `label_database.yaml`.
    pub fn build_and_save(&self, save_dir: &Path) -> Result<(LabelDatabase, PathBuf)> {
        let database = self.build();

        fs::create_dir_all(save_dir)?;
        let path = save_dir.join(LABEL_DATABASE_FILE);
        fs::write(&path, serde_yaml::to_string(&database)?)?;

        info!(
            "Saved label database with {} classes: {}",
            database.len(),
            path.display()
        );
        Ok((database, path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wheat_classes() -> BTreeMap<String, u32> {
        [("stem", 0), ("leaves", 1), ("wheat-heads", 2)]
            .into_iter()
            .map(|(name, id)| (name.to_string(), id))
            .collect()
    }

    #[test]
    fn test_build_entries() {
        let database = LabelDatabaseBuilder::new(wheat_classes(), [255, 255, 255]).build();
        assert_eq!(database.len(), 3);
        assert_eq!(database[&1].name, "leaves");
        assert!(database.values().all(|e| e.validation && e.colour == [255, 255, 255]));
    }

    #[test]
    fn test_duplicate_id_keeps_last_name() {
        let mut classes = wheat_classes();
        classes.insert("awns".to_string(), 2);
        let database = LabelDatabaseBuilder::new(classes, [0, 0, 0]).build();
        assert_eq!(database.len(), 3);
        assert_eq!(database[&2].name, "wheat-heads");
    }

    #[test]
    fn test_saved_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let builder = LabelDatabaseBuilder::new(wheat_classes(), [255, 255, 255]);
        let (database, path) = builder.build_and_save(&dir.path().join("out")).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains("color"));
        assert!(content.contains("wheat-heads"));

        let loaded: LabelDatabase = serde_yaml::from_str(&content).unwrap();
        assert_eq!(loaded, database);
    }
}
