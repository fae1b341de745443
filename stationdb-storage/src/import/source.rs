use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use stationdb_core::{StationDbError, StationDbResult};

/// Where an import reads its `<table>.dat` files from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportSource {
    Directory(PathBuf),
    Archive(PathBuf),
}

impl ImportSource {
    /// Directories are read in place, anything else is opened as a zip archive
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        if path.is_dir() {
            ImportSource::Directory(path)
        } else {
            ImportSource::Archive(path)
        }
    }

    pub fn path(&self) -> &Path {
        match self {
            ImportSource::Directory(path) | ImportSource::Archive(path) => path,
        }
    }

    pub(crate) fn open(&self) -> StationDbResult<OpenSource> {
        match self {
            ImportSource::Directory(dir) => {
                if !dir.is_dir() {
                    return Err(StationDbError::NotFound(format!(
                        "import directory {}",
                        dir.display()
                    )));
                }
                let mut entries = HashMap::new();
                for entry in std::fs::read_dir(dir)? {
                    let entry = entry?;
                    if entry.file_type()?.is_file() {
                        let name = entry.file_name().to_string_lossy().to_string();
                        entries.insert(name.to_lowercase(), entry.path());
                    }
                }
                Ok(OpenSource::Directory { entries })
            }
            ImportSource::Archive(path) => {
                let file = File::open(path).map_err(|e| {
                    StationDbError::Archive(format!("opening {}: {}", path.display(), e))
                })?;
                let archive = zip::ZipArchive::new(file)
                    .map_err(|e| StationDbError::Archive(format!("reading {}: {}", path.display(), e)))?;
                let mut entries = HashMap::new();
                for name in archive.file_names() {
                    if name.ends_with('/') {
                        continue;
                    }
                    // Entries may sit below a folder inside the archive
                    let base = name.rsplit('/').next().unwrap_or(name);
                    entries.insert(base.to_lowercase(), name.to_string());
                }
                Ok(OpenSource::Archive { archive, entries })
            }
        }
    }
}

/// An import source with its file listing resolved
pub(crate) enum OpenSource {
    Directory {
        entries: HashMap<String, PathBuf>,
    },
    Archive {
        archive: zip::ZipArchive<File>,
        entries: HashMap<String, String>,
    },
}

impl OpenSource {
    pub fn contains(&self, file_name: &str) -> bool {
        let key = file_name.to_lowercase();
        match self {
            OpenSource::Directory { entries } => entries.contains_key(&key),
            OpenSource::Archive { entries, .. } => entries.contains_key(&key),
        }
    }

    /// Run `f` over a buffered reader for `file_name`
    pub fn with_reader<T>(
        &mut self,
        file_name: &str,
        f: impl FnOnce(&mut dyn BufRead) -> StationDbResult<T>,
    ) -> StationDbResult<T> {
        let key = file_name.to_lowercase();
        match self {
            OpenSource::Directory { entries } => {
                let path = entries
                    .get(&key)
                    .ok_or_else(|| StationDbError::NotFound(file_name.to_string()))?;
                let mut reader = BufReader::new(File::open(path)?);
                f(&mut reader)
            }
            OpenSource::Archive { archive, entries } => {
                let entry = entries
                    .get(&key)
                    .ok_or_else(|| StationDbError::NotFound(file_name.to_string()))?;
                let file = archive
                    .by_name(entry)
                    .map_err(|e| StationDbError::Archive(format!("reading {}: {}", entry, e)))?;
                let mut reader = BufReader::new(file);
                f(&mut reader)
            }
        }
    }
}
