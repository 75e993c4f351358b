//! File categories
use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use log::warn;

use crate::{cfg::Config, state::ProcessState};

/// Resolves file categories ("ics", "orb", "recover", ..) into paths of the
/// work directory. Templates may contain `{yyyy}`, `{yy}`, `{doy}`, `{cen}`,
/// `{sys}` and `{site}` placeholders. Templates holding `{site}` resolve to
/// one file per active station.
#[derive(Debug, Clone)]
pub struct FileCatalog {
    work_dir: PathBuf,
    templates: BTreeMap<String, String>,
}

impl FileCatalog {
    pub fn new(cfg: &Config) -> Self {
        Self {
            work_dir: cfg.work_dir.clone(),
            templates: cfg.files.clone(),
        }
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    fn expand(template: &str, state: &ProcessState, site: Option<&str>) -> String {
        let year = state.begin.year();
        let mut name = template
            .replace("{yyyy}", &format!("{:04}", year))
            .replace("{yy}", &format!("{:02}", year.rem_euclid(100)))
            .replace("{doy}", &format!("{:03}", state.begin.doy()))
            .replace("{cen}", state.center.as_deref().unwrap_or(""))
            .replace(
                "{sys}",
                &state
                    .constellation
                    .map(|c| format!("{:x}", c))
                    .unwrap_or_default(),
            );
        if let Some(site) = site {
            name = name.replace("{site}", site);
        }
        name
    }

    /// Resolves a category that describes a single file
    pub fn get_filename(&self, category: &str, state: &ProcessState) -> Option<PathBuf> {
        let Some(template) = self.templates.get(category) else {
            warn!("unknown file category \"{}\"", category);
            return None;
        };
        if template.contains("{site}") {
            warn!("file category \"{}\" is defined per station", category);
            return None;
        }
        Some(self.work_dir.join(Self::expand(template, state, None)))
    }

    /// Resolves all files of a category. When `check` is set,
    /// only existing files are returned.
    pub fn files(&self, category: &str, state: &ProcessState, check: bool) -> Vec<PathBuf> {
        let Some(template) = self.templates.get(category) else {
            warn!("unknown file category \"{}\"", category);
            return Vec::new();
        };

        let files = if template.contains("{site}") {
            state
                .sites
                .iter()
                .map(|site| self.work_dir.join(Self::expand(template, state, Some(site))))
                .collect::<Vec<_>>()
        } else {
            vec![self.work_dir.join(Self::expand(template, state, None))]
        };

        if check {
            files
                .into_iter()
                .filter(|path| {
                    let exists = path.is_file();
                    if !exists {
                        warn!("file not found {}", path.display());
                    }
                    exists
                })
                .collect()
        } else {
            files
        }
    }
}
