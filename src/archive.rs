//! Result labelling and archiving
use std::path::{Path, PathBuf};

use log::{debug, info, warn};

use crate::{catalog::FileCatalog, error::Error, state::ProcessState};

/// Appends `_<label>` to a file name
pub fn labelled(path: &Path, label: &str) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(format!("_{}", label));
    PathBuf::from(name)
}

/// Copies each existing file of given categories to `<file>_<label>`.
/// Returns the number of copied files.
pub fn copy_result_files(
    catalog: &FileCatalog,
    state: &ProcessState,
    categories: &[&str],
    label: &str,
) -> Result<usize, Error> {
    let mut copied = 0;
    for category in categories.iter() {
        for path in catalog.files(category, state, true) {
            std::fs::copy(&path, labelled(&path, label))?;
            copied += 1;
        }
    }
    debug!(
        "{} - {} files labelled {} ({})",
        state.begin,
        copied,
        label,
        categories.join(",")
    );
    Ok(copied)
}

/// Copies the labelled versions of given categories into `dir`,
/// which is created if needed. Labels with no file are skipped.
pub fn copy_result_files_to(
    catalog: &FileCatalog,
    state: &ProcessState,
    categories: &[&str],
    dir: &Path,
    labels: &[&str],
) -> Result<usize, Error> {
    std::fs::create_dir_all(dir)?;
    let mut copied = 0;
    for category in categories.iter() {
        for path in catalog.files(category, state, false) {
            for label in labels.iter() {
                let source = labelled(&path, label);
                let Some(file_name) = source.file_name() else {
                    continue;
                };
                if !source.is_file() {
                    warn!("file not found {}", source.display());
                    continue;
                }
                std::fs::copy(&source, dir.join(file_name))?;
                copied += 1;
            }
        }
    }
    Ok(copied)
}

/// Archives the labelled orbit and clock differences in
/// `result_dir/<category>/<year>/`, once per reference center
/// and per constellation.
pub fn archive_results(
    catalog: &FileCatalog,
    state: &mut ProcessState,
    result_dir: &Path,
    centers: &[String],
    labels: &[&str],
) -> Result<usize, Error> {
    let year = state.begin.year().to_string();
    let orbdif_dir = result_dir.join("orbdif").join(&year);
    let clkdif_dir = result_dir.join("clkdif").join(&year);

    let mut archived = 0;

    for center in centers.iter() {
        state.center = Some(center.clone());
        archived += copy_result_files_to(catalog, state, &["orbdif"], &orbdif_dir, labels)?;

        for constellation in state.constellations.clone() {
            state.constellation = Some(constellation);
            archived += copy_result_files_to(catalog, state, &["clkdif"], &clkdif_dir, labels)?;
        }
        state.constellation = None;
    }
    state.center = None;

    info!(
        "{} - {} result files archived in {}",
        state.begin,
        archived,
        result_dir.display()
    );

    Ok(archived)
}

/// Replaces `dst` with a copy of `src`
pub fn backup_dir(src: &Path, dst: &Path) -> Result<(), Error> {
    if !src.is_dir() {
        warn!("directory not found {}", src.display());
        return Ok(());
    }
    if dst.exists() {
        std::fs::remove_dir_all(dst)?;
    }
    copy_dir(src, dst)
}

fn copy_dir(src: &Path, dst: &Path) -> Result<(), Error> {
    std::fs::create_dir_all(dst)?;
    for entry in std::fs::read_dir(src)? {
        let entry = entry?;
        let path = entry.path();
        let target = dst.join(entry.file_name());
        if path.is_dir() {
            copy_dir(&path, &target)?;
        } else {
            std::fs::copy(&path, &target)?;
        }
    }
    Ok(())
}
