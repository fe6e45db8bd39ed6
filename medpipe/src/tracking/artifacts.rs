//! Artifact locations and the local filesystem backend.
//!
//! Runs report their artifact root as a URI. `mlflow-artifacts:` roots are
//! served by the tracking server's artifact proxy; plain paths and `file:`
//! URIs are read and written directly.

use std::fs;
use std::path::{Path, PathBuf};

use super::error::{Result, TrackingError};

/// Where a run's artifacts live
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactLocation {
    /// Path under the tracking server's `mlflow-artifacts` proxy, without leading slash
    Proxied(String),
    /// Directory on the local filesystem
    Local(PathBuf),
}

impl ArtifactLocation {
    /// Parse an artifact URI reported by the tracking server
    pub fn parse(uri: &str) -> Result<Self> {
        if let Some(rest) = uri.strip_prefix("mlflow-artifacts:") {
            // mlflow-artifacts://host:port/path carries an authority we ignore
            let path = match rest.strip_prefix("//") {
                Some(with_host) => with_host.split_once('/').map(|(_, p)| p).unwrap_or(""),
                None => rest,
            };
            return Ok(Self::Proxied(path.trim_matches('/').to_string()));
        }
        if let Some(path) = uri.strip_prefix("file://") {
            return Ok(Self::Local(PathBuf::from(path)));
        }
        match uri.split_once("://") {
            Some(_) => Err(TrackingError::UnsupportedArtifactUri(uri.to_string())),
            None => Ok(Self::Local(PathBuf::from(uri))),
        }
    }

    /// Location of a relative artifact path below this one
    pub fn join(&self, relative: &str) -> Self {
        let relative = relative.trim_matches('/');
        if relative.is_empty() {
            return self.clone();
        }
        match self {
            Self::Proxied(base) if base.is_empty() => Self::Proxied(relative.to_string()),
            Self::Proxied(base) => Self::Proxied(format!("{}/{}", base, relative)),
            Self::Local(base) => Self::Local(base.join(relative)),
        }
    }
}

/// Copy a file or directory tree into `dest`, returning the copied path
pub(crate) fn copy_local(source: &Path, dest: &Path) -> Result<PathBuf> {
    let name = source
        .file_name()
        .ok_or_else(|| TrackingError::response(format!("no file name in {}", source.display())))?;
    let target = dest.join(name);
    copy_tree(source, &target)?;
    Ok(target)
}

/// Recursively copy `source` to exactly `target`
pub(crate) fn copy_tree(source: &Path, target: &Path) -> Result<()> {
    if source.is_dir() {
        fs::create_dir_all(target)?;
        for entry in fs::read_dir(source)? {
            let entry = entry?;
            copy_tree(&entry.path(), &target.join(entry.file_name()))?;
        }
    } else {
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::copy(source, target)?;
    }
    Ok(())
}

/// All files below `dir`, as (absolute path, '/'-separated relative path)
pub(crate) fn walk_files(dir: &Path) -> Result<Vec<(PathBuf, String)>> {
    let mut files = Vec::new();
    let mut stack = vec![dir.to_path_buf()];
    while let Some(current) = stack.pop() {
        for entry in fs::read_dir(&current)? {
            let path = entry?.path();
            if path.is_dir() {
                stack.push(path);
            } else {
                let relative = path
                    .strip_prefix(dir)
                    .map_err(TrackingError::response)?
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy().into_owned())
                    .collect::<Vec<_>>()
                    .join("/");
                files.push((path, relative));
            }
        }
    }
    files.sort_by(|a, b| a.1.cmp(&b.1));
    Ok(files)
}
