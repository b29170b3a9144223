use std::path::PathBuf;

use log::{debug, warn};

use crate::error::LoadError;

/// Expands a profile's path pattern with shell-glob semantics. Only regular
/// files are returned, in lexical order. An empty result is not an error here;
/// the orchestrator decides what a profile without files means.
pub fn match_files(pattern: &str) -> Result<Vec<PathBuf>, LoadError> {
    let entries = glob::glob(pattern).map_err(|err| LoadError::InvalidPattern {
        pattern: pattern.to_string(),
        message: err.to_string(),
    })?;
    let mut files = Vec::new();
    for entry in entries {
        match entry {
            Ok(path) if path.is_file() => files.push(path),
            Ok(path) => debug!("Ignoring non-file match {path:?}"),
            Err(err) => warn!("Cannot inspect {:?}: {}", err.path(), err.error()),
        }
    }
    files.sort();
    Ok(files)
}
