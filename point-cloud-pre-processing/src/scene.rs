/// Per-scene conversion of raw capture arrays into training records and
/// instance ground truth.
use crate::error::{PreprocessError, Result};
use crate::manifest::SceneMetadata;
use crate::npy::{self, NpyArray};
use constants::record_layout::{
    COL_INSTANCE_LABEL, COL_INTENSITY, COL_NORMAL, COL_SEGMENT_ID, COL_SEMANTIC_LABEL, COL_X,
    COL_Y, COL_Z, GT_CLASS_STRIDE, IGNORE_INSTANCE_LABEL, INSTANCE_FILE_SUFFIX,
    MILLIMETRES_PER_METRE, PLACEHOLDER_COLOUR_MEAN, PLACEHOLDER_COLOUR_STD, PLACEHOLDER_NORMAL,
    POINT_FILE_SUFFIX, RAW_IGNORE_INSTANCE, RAW_POINT_FIELDS, RECORD_FIELDS, SEMANTIC_FILE_SUFFIX,
};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

/// Maps a raw instance id to the processed instance label: the ignore id
/// becomes -1 and every other id shifts down by one.
pub fn remap_instance_label(raw_instance: i64) -> i64 {
    if raw_instance == RAW_IGNORE_INSTANCE {
        IGNORE_INSTANCE_LABEL
    } else {
        raw_instance.wrapping_sub(1)
    }
}

/// Packs semantic class and instance index into one evaluation code.
/// Returns `None` for ignored points; wraps on overflow.
pub fn instance_gt_code(semantic_label: i64, instance_label: i64) -> Option<i64> {
    (instance_label >= 0).then(|| {
        semantic_label
            .wrapping_add(1)
            .wrapping_mul(GT_CLASS_STRIDE)
            .wrapping_add(instance_label)
            .wrapping_add(1)
    })
}

/// Paths of the three raw arrays of one scene.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SceneFiles {
    pub scene_name: String,
    pub points: PathBuf,
    pub instances: PathBuf,
    pub semantics: PathBuf,
}

impl SceneFiles {
    /// Derives the companion label files from a `<scene>_point.npy` path.
    pub fn from_point_file(point_file: &Path) -> Result<Self> {
        let file_name = point_file
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or_default();
        let scene_name = file_name
            .strip_suffix(POINT_FILE_SUFFIX)
            .filter(|name| !name.is_empty())
            .ok_or_else(|| PreprocessError::InvalidScenePath {
                path: point_file.to_path_buf(),
                suffix: POINT_FILE_SUFFIX,
            })?;

        let dir = point_file.parent().unwrap_or(Path::new("."));
        Ok(Self {
            scene_name: scene_name.to_string(),
            points: point_file.to_path_buf(),
            instances: dir.join(format!("{scene_name}{INSTANCE_FILE_SUFFIX}")),
            semantics: dir.join(format!("{scene_name}{SEMANTIC_FILE_SUFFIX}")),
        })
    }

    fn ensure_present(&self) -> Result<()> {
        for path in [&self.points, &self.instances, &self.semantics] {
            if !path.is_file() {
                return Err(PreprocessError::MissingFile { path: path.clone() });
            }
        }
        Ok(())
    }
}

/// Raw arrays of one scene after validation.
#[derive(Debug, Clone)]
pub struct RawScene {
    /// N rows of x, y, z (millimetres) and intensity.
    pub points: Vec<[f64; RAW_POINT_FIELDS]>,
    pub instance_ids: Vec<i64>,
    pub semantic_ids: Vec<i64>,
}

impl RawScene {
    /// Loads and validates the three arrays of a scene.
    pub fn load(files: &SceneFiles) -> Result<Self> {
        files.ensure_present()?;

        let points = npy::read_f64(&files.points)?;
        let instances = npy::read_i64(&files.instances)?;
        let semantics = npy::read_i64(&files.semantics)?;

        if points.rows() != instances.rows() || points.rows() != semantics.rows() {
            return Err(PreprocessError::LengthMismatch {
                scene: files.scene_name.clone(),
                points: points.rows(),
                instances: instances.rows(),
                semantics: semantics.rows(),
            });
        }

        if points.shape.len() != 2 || points.shape[1] != RAW_POINT_FIELDS {
            return Err(PreprocessError::InvalidShape {
                path: files.points.clone(),
                shape: points.shape,
                expected: "N x 4 (x, y, z, intensity)",
            });
        }

        let points = points
            .data
            .chunks_exact(RAW_POINT_FIELDS)
            .map(|row| [row[0], row[1], row[2], row[3]])
            .collect();

        Ok(Self {
            points,
            instance_ids: label_column(instances, &files.instances)?,
            semantic_ids: label_column(semantics, &files.semantics)?,
        })
    }

    fn len(&self) -> usize {
        self.points.len()
    }
}

fn label_column(array: NpyArray<i64>, path: &Path) -> Result<Vec<i64>> {
    match array.shape.as_slice() {
        [_] | [_, 1] => Ok(array.data),
        _ => Err(PreprocessError::InvalidShape {
            path: path.to_path_buf(),
            shape: array.shape,
            expected: "N or N x 1 labels",
        }),
    }
}

/// Processed records and ground-truth codes of one scene, held in memory
/// until both are written.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessedScene {
    /// Row-major N x 10 records: x, y, z, intensity, nx, ny, nz, segment id,
    /// semantic label, instance label.
    pub records: Vec<f32>,
    /// One code per point with a non-negative instance label, in point order.
    pub gt_codes: Vec<i64>,
}

impl ProcessedScene {
    pub fn from_raw(raw: &RawScene) -> Self {
        let mut records = Vec::with_capacity(raw.len() * RECORD_FIELDS);
        let mut gt_codes = Vec::new();

        for ((point, &instance), &semantic) in raw
            .points
            .iter()
            .zip(&raw.instance_ids)
            .zip(&raw.semantic_ids)
        {
            let [x, y, z, intensity] = *point;
            let instance_label = remap_instance_label(instance);

            let mut record = [0.0f32; RECORD_FIELDS];
            record[COL_X] = (x / MILLIMETRES_PER_METRE) as f32;
            record[COL_Y] = (y / MILLIMETRES_PER_METRE) as f32;
            record[COL_Z] = (z / MILLIMETRES_PER_METRE) as f32;
            record[COL_INTENSITY] = intensity as f32;
            record[COL_NORMAL..COL_NORMAL + 3].copy_from_slice(&PLACEHOLDER_NORMAL);
            record[COL_SEGMENT_ID] = instance as f32;
            record[COL_SEMANTIC_LABEL] = semantic as f32;
            record[COL_INSTANCE_LABEL] = instance_label as f32;
            records.extend_from_slice(&record);

            if let Some(code) = instance_gt_code(semantic, instance_label) {
                gt_codes.push(code);
            }
        }

        Self { records, gt_codes }
    }

    pub fn rows(&self) -> usize {
        self.records.len() / RECORD_FIELDS
    }

    pub fn record(&self, index: usize) -> &[f32] {
        &self.records[index * RECORD_FIELDS..(index + 1) * RECORD_FIELDS]
    }

    /// Ground truth as newline-terminated integers; empty when no point
    /// carries an instance.
    pub fn gt_text(&self) -> String {
        self.gt_codes
            .iter()
            .map(|code| format!("{code}\n"))
            .collect()
    }
}

/// Converts scenes and writes their outputs below the output root.
#[derive(Debug, Clone)]
pub struct SceneProcessor {
    save_dir: PathBuf,
}

impl SceneProcessor {
    pub fn new(save_dir: &Path) -> Self {
        Self {
            save_dir: save_dir.to_path_buf(),
        }
    }

    pub fn processed_path(&self, session: &str, scene_name: &str) -> PathBuf {
        self.save_dir.join(session).join(format!("{scene_name}.npy"))
    }

    pub fn instance_gt_path(&self, session: &str, scene_name: &str) -> PathBuf {
        self.save_dir
            .join("instance_gt")
            .join(session)
            .join(format!("{scene_name}.txt"))
    }

    /// Processes the scene whose point array is `filepath` and returns its
    /// manifest entry. Nothing is written unless both outputs are complete.
    #[tracing::instrument(skip(self, filepath), fields(path = %filepath.display()))]
    pub fn process_file(&self, filepath: &Path, session: &str) -> Result<SceneMetadata> {
        let files = SceneFiles::from_point_file(filepath)?;
        let raw = RawScene::load(&files)?;
        debug!("Loaded {} points for scene '{}'", raw.len(), files.scene_name);

        let processed = ProcessedScene::from_raw(&raw);

        let processed_path = self.processed_path(session, &files.scene_name);
        let gt_path = self.instance_gt_path(session, &files.scene_name);

        let staged_records = stage(&processed_path, |file| {
            npy::write_npy(file, &[processed.rows(), RECORD_FIELDS], &processed.records)
        })?;
        let staged_gt = stage(&gt_path, |file| file.write_all(processed.gt_text().as_bytes()))?;

        staged_records
            .persist(&processed_path)
            .map_err(io::Error::from)?;
        if let Err(e) = staged_gt.persist(&gt_path) {
            // Take the processed array back out so the scene has no outputs.
            if let Err(cleanup) = fs::remove_file(&processed_path) {
                warn!(
                    "Could not remove {} after a failed write: {}",
                    processed_path.display(),
                    cleanup
                );
            }
            return Err(io::Error::from(e).into());
        }

        info!(
            "Processed scene '{}' ({} points, {} instance points)",
            files.scene_name,
            processed.rows(),
            processed.gt_codes.len()
        );

        Ok(SceneMetadata {
            filepath: processed_path,
            scene: files.scene_name,
            session: session.to_string(),
            raw_filepath: files.points,
            file_len: processed.rows(),
            instance_gt_filepath: gt_path,
            color_mean: PLACEHOLDER_COLOUR_MEAN.to_vec(),
            color_std: PLACEHOLDER_COLOUR_STD.to_vec(),
        })
    }
}

/// Writes to a temporary file beside `target`, ready to be renamed over it.
fn stage<F>(target: &Path, write: F) -> Result<NamedTempFile>
where
    F: FnOnce(&mut NamedTempFile) -> io::Result<()>,
{
    let dir = target.parent().unwrap_or(Path::new("."));
    fs::create_dir_all(dir)?;

    let mut file = NamedTempFile::new_in(dir)?;
    write(&mut file)?;
    file.flush()?;
    Ok(file)
}
