#![allow(dead_code)]

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use price_loader::profile::{FileKind, MappingProfile};
use tempfile::{TempDir, tempdir};

/// Scratch directory helper that cleans up files automatically on drop.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    /// Creates a fresh scratch directory for the current test case.
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    /// Returns the root path for all files owned by this workspace.
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Writes `contents` into a file under the workspace and returns the path.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        self.write_bytes(name, contents.as_bytes())
    }

    pub fn write_bytes(&self, name: &str, contents: &[u8]) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("create parent dir");
        }
        let mut file = File::create(&path).expect("create temp file");
        file.write_all(contents).expect("write temp file contents");
        path
    }

    /// Glob pattern for `name` inside the workspace.
    pub fn pattern(&self, name: &str) -> String {
        format!("{}/{}", self.path().display(), name)
    }
}

/// A headerless, semicolon-delimited profile reading files that match `pattern`.
pub fn delimited_profile(id: i64, pattern: String) -> MappingProfile {
    MappingProfile {
        id,
        file_kind: FileKind::Delimited,
        path_pattern: pattern,
        delimiter: Some(";".into()),
        delimiter_name: Some("Semicolon".into()),
        flags: 0,
        active: true,
    }
}
