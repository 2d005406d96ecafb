//! End-to-end runs over scenes written to a temporary directory.

use pcprep::npy::{self, NpyElement};
use pcprep::{ManifestStore, PreprocessConfig, PreprocessError, Preprocessor, SceneMetadata};
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn write_array<T: NpyElement>(path: &Path, shape: &[usize], data: &[T]) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    let mut file = File::create(path).unwrap();
    npy::write_npy(&mut file, shape, data).unwrap();
}

/// Writes the three raw arrays of a scene and returns its point file.
fn write_scene(
    data_dir: &Path,
    session: &str,
    scene: &str,
    points: &[[f64; 4]],
    instances: &[i64],
    semantics: &[i64],
) -> PathBuf {
    let dir = data_dir.join(session);
    let point_file = dir.join(format!("{scene}_point.npy"));
    let flat: Vec<f64> = points.iter().flatten().copied().collect();
    write_array(&point_file, &[points.len(), 4], &flat);
    write_array(
        &dir.join(format!("{scene}_ins_label.npy")),
        &[instances.len()],
        instances,
    );
    write_array(
        &dir.join(format!("{scene}_sem_label.npy")),
        &[semantics.len(), 1],
        semantics,
    );
    point_file
}

fn setup(modes: &[&str]) -> (TempDir, PreprocessConfig) {
    let dir = tempfile::tempdir().unwrap();
    let config = PreprocessConfig {
        data_dir: dir.path().join("raw"),
        save_dir: dir.path().join("processed"),
        modes: modes.iter().map(|s| s.to_string()).collect(),
        n_jobs: 2,
        ..PreprocessConfig::default()
    };
    (dir, config)
}

fn three_point_scene(data_dir: &Path, session: &str, scene: &str) -> PathBuf {
    write_scene(
        data_dir,
        session,
        scene,
        &[
            [1000.0, 2000.0, 3000.0, 12.0],
            [10.0, 20.0, 30.0, 40.0],
            [-1000.0, 0.0, 500.0, 0.0],
        ],
        &[0, 1, 1],
        &[0, 0, 1],
    )
}

#[test]
fn test_process_file_outputs() {
    let (_dir, config) = setup(&["9"]);
    let point_file = three_point_scene(&config.data_dir, "9", "tile_1");
    let preprocessor = Preprocessor::new(config.clone());

    let metadata = preprocessor.process_file(&point_file, "9").unwrap();
    assert_eq!(metadata.scene, "tile_1");
    assert_eq!(metadata.session, "9");
    assert_eq!(metadata.file_len, 3);
    assert_eq!(metadata.filepath, config.save_dir.join("9").join("tile_1.npy"));
    assert_eq!(
        metadata.instance_gt_filepath,
        config.save_dir.join("instance_gt").join("9").join("tile_1.txt")
    );
    assert_eq!(metadata.color_mean, vec![0.5]);
    assert_eq!(metadata.color_std, vec![0.5]);

    let records = npy::read_f64(&metadata.filepath).unwrap();
    assert_eq!(records.shape, vec![3, 10]);
    assert_eq!(
        records.row(0),
        &[1.0, 2.0, 3.0, 12.0, 1.0, 1.0, 1.0, 0.0, 0.0, -1.0]
    );
    assert_eq!(&records.row(2)[7..], &[1.0, 1.0, 0.0]);
    for row in 0..3 {
        assert_eq!(&records.row(row)[4..7], &[1.0, 1.0, 1.0]);
    }

    let gt = fs::read_to_string(&metadata.instance_gt_filepath).unwrap();
    assert_eq!(gt, "1001\n2001\n");
}

#[test]
fn test_reprocessing_is_byte_identical() {
    let (_dir, config) = setup(&["9"]);
    let point_file = three_point_scene(&config.data_dir, "9", "tile_1");
    let preprocessor = Preprocessor::new(config);

    let first = preprocessor.process_file(&point_file, "9").unwrap();
    let records = fs::read(&first.filepath).unwrap();
    let gt = fs::read(&first.instance_gt_filepath).unwrap();

    let second = preprocessor.process_file(&point_file, "9").unwrap();
    assert_eq!(first, second);
    assert_eq!(fs::read(&second.filepath).unwrap(), records);
    assert_eq!(fs::read(&second.instance_gt_filepath).unwrap(), gt);
}

#[test]
fn test_unlabelled_scene_has_empty_gt() {
    let (_dir, config) = setup(&["9"]);
    let point_file = write_scene(
        &config.data_dir,
        "9",
        "bare",
        &[[0.0; 4], [1.0; 4]],
        &[0, 0],
        &[1, 2],
    );
    let metadata = Preprocessor::new(config)
        .process_file(&point_file, "9")
        .unwrap();
    assert_eq!(fs::read(&metadata.instance_gt_filepath).unwrap(), b"");
}

#[test]
fn test_missing_semantic_file() {
    let (_dir, config) = setup(&["9"]);
    let point_file = three_point_scene(&config.data_dir, "9", "tile_1");
    fs::remove_file(config.data_dir.join("9").join("tile_1_sem_label.npy")).unwrap();

    let result = Preprocessor::new(config.clone()).process_file(&point_file, "9");
    assert!(matches!(result, Err(PreprocessError::MissingFile { .. })));
    assert!(!config.save_dir.join("9").join("tile_1.npy").exists());
    assert!(
        !config
            .save_dir
            .join("instance_gt")
            .join("9")
            .join("tile_1.txt")
            .exists()
    );
}

#[test]
fn test_length_mismatch() {
    let (_dir, config) = setup(&["9"]);
    let point_file = write_scene(
        &config.data_dir,
        "9",
        "short",
        &[[0.0; 4], [1.0; 4], [2.0; 4]],
        &[1, 1],
        &[0, 0, 0],
    );

    let result = Preprocessor::new(config.clone()).process_file(&point_file, "9");
    match result {
        Err(PreprocessError::LengthMismatch {
            points,
            instances,
            semantics,
            ..
        }) => assert_eq!((points, instances, semantics), (3, 2, 3)),
        other => panic!("expected LengthMismatch, got {other:?}"),
    }
    assert!(!config.save_dir.join("9").join("short.npy").exists());
}

fn assert_no_outputs(config: &PreprocessConfig, scene: &str) {
    assert!(!config.save_dir.join("9").join(format!("{scene}.npy")).exists());
    assert!(
        !config
            .save_dir
            .join("instance_gt")
            .join("9")
            .join(format!("{scene}.txt"))
            .exists()
    );
}

#[test]
fn test_point_array_must_have_four_columns() {
    let (_dir, config) = setup(&["9"]);
    let point_file = three_point_scene(&config.data_dir, "9", "tile_1");
    write_array(&point_file, &[3, 3], &[0.0f64; 9]);

    let result = Preprocessor::new(config.clone()).process_file(&point_file, "9");
    match result {
        Err(PreprocessError::InvalidShape { path, shape, .. }) => {
            assert_eq!(path, point_file);
            assert_eq!(shape, vec![3, 3]);
        }
        other => panic!("expected InvalidShape, got {other:?}"),
    }
    assert_no_outputs(&config, "tile_1");
}

#[test]
fn test_label_array_must_be_a_column() {
    let (_dir, config) = setup(&["9"]);
    let point_file = three_point_scene(&config.data_dir, "9", "tile_1");
    let labels = config.data_dir.join("9").join("tile_1_ins_label.npy");
    write_array(&labels, &[3, 2], &[0i64, 0, 1, 1, 1, 1]);

    let result = Preprocessor::new(config.clone()).process_file(&point_file, "9");
    match result {
        Err(PreprocessError::InvalidShape { path, shape, .. }) => {
            assert_eq!(path, labels);
            assert_eq!(shape, vec![3, 2]);
        }
        other => panic!("expected InvalidShape, got {other:?}"),
    }
    assert_no_outputs(&config, "tile_1");
}

#[test]
fn test_truncated_array_is_rejected() {
    let (_dir, config) = setup(&["9"]);
    let point_file = three_point_scene(&config.data_dir, "9", "tile_1");
    let labels = config.data_dir.join("9").join("tile_1_sem_label.npy");
    let bytes = fs::read(&labels).unwrap();
    fs::write(&labels, &bytes[..bytes.len() - 4]).unwrap();

    let result = Preprocessor::new(config.clone()).process_file(&point_file, "9");
    assert!(matches!(result, Err(PreprocessError::Npy { ref path, .. }) if *path == labels));
    assert_no_outputs(&config, "tile_1");
}

#[test]
fn test_failed_gt_write_leaves_no_processed_array() {
    let (_dir, config) = setup(&["9"]);
    let point_file = three_point_scene(&config.data_dir, "9", "tile_1");
    // A non-empty directory in place of the ground-truth file cannot be
    // replaced by a rename.
    let gt_target = config.save_dir.join("instance_gt").join("9").join("tile_1.txt");
    fs::create_dir_all(gt_target.join("occupied")).unwrap();

    let result = Preprocessor::new(config.clone()).process_file(&point_file, "9");
    assert!(matches!(result, Err(PreprocessError::Io(_))));
    assert!(!config.save_dir.join("9").join("tile_1.npy").exists());
    assert!(gt_target.is_dir());
}

#[test]
fn test_single_session_joint_database() {
    let (_dir, config) = setup(&["9"]);
    let store = ManifestStore::new(&config.save_dir);

    let paths = Preprocessor::new(config.clone())
        .joint_database(&config.modes)
        .unwrap();
    assert_eq!(paths, vec![store.training_manifest_path("9")]);
    assert!(!store.session_manifest_path("9").exists());
}

#[test]
fn test_full_preprocess_run() {
    let (_dir, config) = setup(&["9", "10"]);
    three_point_scene(&config.data_dir, "9", "tile_2");
    three_point_scene(&config.data_dir, "9", "tile_10");
    write_scene(
        &config.data_dir,
        "10",
        "tile_1",
        &[[5.0, 5.0, 5.0, 1.0]],
        &[3],
        &[2],
    );

    let preprocessor = Preprocessor::new(config.clone());
    let summary = preprocessor.preprocess().unwrap();

    assert!(config.save_dir.join("label_database.yaml").is_file());
    assert_eq!(summary.sessions.len(), 2);
    assert_eq!(summary.sessions[0].scenes, 2);
    assert_eq!(summary.sessions[0].points, 6);
    assert_eq!(summary.sessions[1].scenes, 1);
    assert_eq!(summary.training_manifests.len(), 2);

    let store = ManifestStore::new(&config.save_dir);
    let session_9 = store.load_session("9").unwrap();
    let scenes: Vec<&str> = session_9.iter().map(|m| m.scene.as_str()).collect();
    assert_eq!(scenes, vec!["tile_2", "tile_10"]);

    let load = |path: &Path| -> Vec<SceneMetadata> {
        serde_yaml::from_str(&fs::read_to_string(path).unwrap()).unwrap()
    };
    assert_eq!(
        load(&store.training_manifest_path("9")),
        store.load_session("10").unwrap()
    );
    assert_eq!(load(&store.training_manifest_path("10")), session_9);

    let gt = fs::read_to_string(config.save_dir.join("instance_gt/10/tile_1.txt")).unwrap();
    assert_eq!(gt, "3003\n");
}

#[test]
fn test_failed_scene_aborts_or_skips() {
    let (_dir, mut config) = setup(&["9"]);
    three_point_scene(&config.data_dir, "9", "good");
    three_point_scene(&config.data_dir, "9", "broken");
    fs::remove_file(config.data_dir.join("9").join("broken_ins_label.npy")).unwrap();

    let result = Preprocessor::new(config.clone()).preprocess();
    assert!(matches!(result, Err(PreprocessError::MissingFile { .. })));
    // The healthy scene still completed.
    assert!(config.save_dir.join("9").join("good.npy").is_file());
    assert!(!config.save_dir.join("9_database.yaml").exists());

    config.skip_failed_scenes = true;
    let summary = Preprocessor::new(config.clone()).preprocess().unwrap();
    assert_eq!(summary.sessions[0].scenes, 1);
    assert_eq!(summary.sessions[0].skipped, 1);
}

#[test]
fn test_joint_database_requires_every_manifest() {
    let (_dir, config) = setup(&["9", "10"]);
    let preprocessor = Preprocessor::new(config.clone());
    let store = ManifestStore::new(&config.save_dir);
    store.save_session("10", &[]).unwrap();

    let result = preprocessor.joint_database(&config.modes);
    assert!(
        matches!(result, Err(PreprocessError::MissingManifest { ref session, .. }) if session == "9")
    );
    assert!(!store.training_manifest_path("10").exists());
}
