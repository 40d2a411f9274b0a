//! Directory layout
//!
//! Maps segment ids to file paths and discovers existing ids on disk.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Result;

const DATA_DIR: &str = "data";
const HINT_DIR: &str = "hint";
const DATA_EXT: &str = "data";
const HINT_EXT: &str = "hint";

/// Paths under a database root
#[derive(Debug, Clone)]
pub struct Layout {
    root: PathBuf,
    data_dir: PathBuf,
    hint_dir: PathBuf,
}

impl Layout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            data_dir: root.join(DATA_DIR),
            hint_dir: root.join(HINT_DIR),
            root,
        }
    }

    /// Create `data/` and `hint/` (and the root) if missing
    pub fn create_dirs(&self) -> Result<()> {
        fs::create_dir_all(&self.data_dir)?;
        fs::create_dir_all(&self.hint_dir)?;
        Ok(())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn hint_dir(&self) -> &Path {
        &self.hint_dir
    }

    /// "data/7.data"
    pub fn segment_path(&self, id: u64) -> PathBuf {
        self.data_dir.join(format!("{}.{}", id, DATA_EXT))
    }

    /// "hint/7.hint"
    pub fn hint_path(&self, id: u64) -> PathBuf {
        self.hint_dir.join(format!("{}.{}", id, HINT_EXT))
    }

    /// All segment ids on disk, ascending
    pub fn segment_ids(&self) -> Result<Vec<u64>> {
        list_ids(&self.data_dir, DATA_EXT)
    }

    /// All hint ids on disk, ascending
    pub fn hint_ids(&self) -> Result<Vec<u64>> {
        list_ids(&self.hint_dir, HINT_EXT)
    }

    pub fn latest_segment_id(&self) -> Result<Option<u64>> {
        Ok(self.segment_ids()?.last().copied())
    }

    pub fn latest_hint_id(&self) -> Result<Option<u64>> {
        Ok(self.hint_ids()?.last().copied())
    }
}

/// Collect numeric stems of `<n>.<ext>` files, sorted numerically.
/// A missing directory yields no ids.
fn list_ids(dir: &Path, ext: &str) -> Result<Vec<u64>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut ids = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        if let Some(id) = parse_id(&path, ext) {
            ids.push(id);
        }
    }
    ids.sort_unstable();
    Ok(ids)
}

/// "12.data" → Some(12); anything else → None
fn parse_id(path: &Path, ext: &str) -> Option<u64> {
    if path.extension()?.to_str()? != ext {
        return None;
    }
    let id: u64 = path.file_stem()?.to_str()?.parse().ok()?;
    (id > 0).then_some(id)
}
