/// Scene discovery within session directories.
use crate::error::Result;
use constants::record_layout::POINT_FILE_SUFFIX;
use std::cmp::Ordering;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Lists the point files of every scene in `<data_dir>/<session>`, in
/// natural file name order.
pub fn discover_scene_files(data_dir: &Path, session: &str) -> Result<Vec<PathBuf>> {
    let session_dir = data_dir.join(session);
    if !session_dir.is_dir() {
        warn!("Session directory not found: {}", session_dir.display());
        return Ok(Vec::new());
    }

    let mut scene_files = Vec::new();
    for entry in fs::read_dir(&session_dir)? {
        let path = entry?.path();
        let is_point_file = path
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.ends_with(POINT_FILE_SUFFIX));

        if path.is_file() && is_point_file {
            scene_files.push(path);
        }
    }

    scene_files.sort_by(|a, b| natural_cmp(&file_name(a), &file_name(b)));

    debug!(
        "Found {} scenes in {}",
        scene_files.len(),
        session_dir.display()
    );
    Ok(scene_files)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .unwrap_or_default()
        .to_string_lossy()
        .to_string()
}

/// Compares strings treating runs of ASCII digits as numbers, so
/// `scene_2` sorts before `scene_10`.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut a = a.chars().peekable();
    let mut b = b.chars().peekable();

    loop {
        match (a.peek().copied(), b.peek().copied()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) if x.is_ascii_digit() && y.is_ascii_digit() => {
                let run_a = take_digits(&mut a);
                let run_b = take_digits(&mut b);
                let ord = compare_digit_runs(&run_a, &run_b);
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            (Some(x), Some(y)) => {
                let ord = x.cmp(&y);
                if ord != Ordering::Equal {
                    return ord;
                }
                a.next();
                b.next();
            }
        }
    }
}

fn take_digits(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> String {
    let mut run = String::new();
    while let Some(c) = chars.next_if(|c| c.is_ascii_digit()) {
        run.push(c);
    }
    run
}

/// Numeric comparison of digit strings of any length; on equal value the
/// shorter (fewer leading zeros) run sorts first.
fn compare_digit_runs(a: &str, b: &str) -> Ordering {
    let a_trimmed = a.trim_start_matches('0');
    let b_trimmed = b.trim_start_matches('0');

    a_trimmed
        .len()
        .cmp(&b_trimmed.len())
        .then_with(|| a_trimmed.cmp(b_trimmed))
        .then_with(|| a.len().cmp(&b.len()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_natural_cmp() {
        let mut names = vec!["scene_10", "scene_2", "scene_1", "plot_b", "plot_a", "scene_02"];
        names.sort_by(|a, b| natural_cmp(a, b));
        assert_eq!(
            names,
            vec!["plot_a", "plot_b", "scene_1", "scene_2", "scene_02", "scene_10"]
        );
    }

    #[test]
    fn test_discover_scene_files() {
        let dir = tempfile::tempdir().unwrap();
        let session_dir = dir.path().join("9");
        fs::create_dir_all(&session_dir).unwrap();
        for name in [
            "tile_10_point.npy",
            "tile_2_point.npy",
            "tile_2_ins_label.npy",
            "tile_2_sem_label.npy",
            "notes.txt",
        ] {
            fs::write(session_dir.join(name), b"").unwrap();
        }
        fs::create_dir_all(session_dir.join("nested_point.npy")).unwrap();

        let files = discover_scene_files(dir.path(), "9").unwrap();
        let names: Vec<String> = files.iter().map(|p| file_name(p)).collect();
        assert_eq!(names, vec!["tile_2_point.npy", "tile_10_point.npy"]);
    }

    #[test]
    fn test_missing_session_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(discover_scene_files(dir.path(), "42").unwrap().is_empty());
    }
}
