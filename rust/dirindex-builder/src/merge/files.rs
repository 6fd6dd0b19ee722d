use std::{
    fs::File,
    io::{BufReader, ErrorKind},
    path::{Path, PathBuf},
};

use dirindex_common::{Result, error::Error};
use log::warn;

use crate::record::RecordReader;

/// The intermediate files of one index.
///
/// The files are deleted when the guard is dropped, whether or not the merge that
/// consumed them succeeded.
#[derive(Debug)]
pub struct IntermediateFiles {
    index_name: String,
    paths: Vec<PathBuf>,
}

impl IntermediateFiles {
    /// Lists the regular files in `dir` whose names start with `index_name`,
    /// sorted by name. A missing directory yields no files.
    pub fn discover(dir: impl AsRef<Path>, index_name: &str) -> Result<IntermediateFiles> {
        let dir = dir.as_ref();
        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Ok(IntermediateFiles::from_paths(index_name, Vec::new()));
            }
            Err(e) => return Err(Error::io(dir.display().to_string(), e)),
        };

        let mut paths = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| Error::io(dir.display().to_string(), e))?;
            let is_file = entry
                .file_type()
                .map_err(|e| Error::io(entry.path().display().to_string(), e))?
                .is_file();
            if is_file && entry.file_name().to_string_lossy().starts_with(index_name) {
                paths.push(entry.path());
            }
        }
        paths.sort();
        Ok(IntermediateFiles::from_paths(index_name, paths))
    }

    pub fn from_paths(index_name: impl Into<String>, paths: Vec<PathBuf>) -> IntermediateFiles {
        IntermediateFiles {
            index_name: index_name.into(),
            paths,
        }
    }

    pub fn index_name(&self) -> &str {
        &self.index_name
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Opens a buffered reader on every file, in order.
    pub fn open_readers(
        &self,
        buffer_size: usize,
        with_deletes: bool,
    ) -> Result<Vec<RecordReader<BufReader<File>>>> {
        self.paths
            .iter()
            .map(|path| RecordReader::open(path, buffer_size, with_deletes))
            .collect()
    }

    fn remove_all(&mut self) {
        for path in self.paths.drain(..) {
            match std::fs::remove_file(&path) {
                Ok(()) => (),
                Err(e) if e.kind() == ErrorKind::NotFound => (),
                Err(e) => warn!(
                    "{}: failed to delete intermediate file {}: {e}",
                    self.index_name,
                    path.display()
                ),
            }
        }
    }
}

impl Drop for IntermediateFiles {
    fn drop(&mut self) {
        self.remove_all();
    }
}
