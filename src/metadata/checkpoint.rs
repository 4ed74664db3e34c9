//! JSON snapshots of the rows collected so far.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::models::MetadataRow;

/// A checkpoint file, rewritten in full on every save
#[derive(Debug, Clone)]
pub struct Checkpoint {
    path: PathBuf,
}

impl Checkpoint {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write `rows`, replacing any previous snapshot
    pub fn save(&self, rows: &[MetadataRow]) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let tmp = self.path.with_extension("json.tmp");
        let json = serde_json::to_vec_pretty(rows).map_err(io::Error::other)?;
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)
    }

    /// Read the last snapshot back
    pub fn load(&self) -> io::Result<Vec<MetadataRow>> {
        let bytes = fs::read(&self.path)?;
        serde_json::from_slice(&bytes).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_save_replaces_previous_snapshot() {
        let dir = tempdir().unwrap();
        let checkpoint = Checkpoint::new(dir.path().join("nested").join("checkpoint.json"));

        let mut rows = vec![MetadataRow {
            newspaper_title: "Spirit of Jefferson".to_string(),
            ..Default::default()
        }];
        checkpoint.save(&rows).unwrap();
        assert_eq!(checkpoint.load().unwrap().len(), 1);

        rows.push(MetadataRow::default());
        checkpoint.save(&rows).unwrap();
        assert_eq!(checkpoint.load().unwrap(), rows);

        let entries = fs::read_dir(dir.path().join("nested")).unwrap().count();
        assert_eq!(entries, 1);
    }

    #[test]
    fn test_load_missing() {
        let dir = tempdir().unwrap();
        assert!(Checkpoint::new(dir.path().join("none.json")).load().is_err());
    }
}
