//! Index and import configuration.

use std::path::{Path, PathBuf};

use dirindex_common::{Result, error::Error, verify_arg};
use serde::{Deserialize, Serialize};

/// Default maximum number of entry IDs kept for a single key.
pub const DEFAULT_ENTRY_LIMIT: usize = 4000;

/// Default read buffer size for each intermediate stream.
pub const DEFAULT_INPUT_BUFFER_SIZE: usize = 65536;

/// Per-index settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct IndexConfig {
    /// Maximum cardinality of a defined entry ID set. Larger sets are stored as
    /// undefined.
    pub entry_limit: usize,
    /// Whether undefined keys keep a running count.
    pub maintain_count: bool,
}

impl Default for IndexConfig {
    fn default() -> Self {
        IndexConfig {
            entry_limit: DEFAULT_ENTRY_LIMIT,
            maintain_count: true,
        }
    }
}

impl IndexConfig {
    pub fn with_entry_limit(mut self, entry_limit: usize) -> Self {
        self.entry_limit = entry_limit;
        self
    }

    pub fn with_maintain_count(mut self, maintain_count: bool) -> Self {
        self.maintain_count = maintain_count;
        self
    }

    pub fn validate(&self) -> Result<()> {
        verify_arg!(entry_limit, self.entry_limit > 0);
        Ok(())
    }

    pub fn from_json(json: &str) -> Result<Self> {
        parse_json(json, "IndexConfig")
    }
}

/// Settings of one bulk import.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ImportConfig {
    /// Merge into the index contents that are already stored.
    pub append_to_existing_data: bool,
    /// Apply the delete lists of the intermediate records. Only honored together
    /// with `append_to_existing_data`.
    pub replace_existing_entries: bool,
    /// Directory holding the intermediate files of all indexes.
    pub temp_directory: PathBuf,
    pub input_buffer_size: usize,
}

impl Default for ImportConfig {
    fn default() -> Self {
        ImportConfig {
            append_to_existing_data: false,
            replace_existing_entries: false,
            temp_directory: std::env::temp_dir(),
            input_buffer_size: DEFAULT_INPUT_BUFFER_SIZE,
        }
    }
}

impl ImportConfig {
    pub fn new(temp_directory: impl AsRef<Path>) -> Self {
        ImportConfig {
            temp_directory: temp_directory.as_ref().to_path_buf(),
            ..Default::default()
        }
    }

    pub fn with_append(mut self, append_to_existing_data: bool) -> Self {
        self.append_to_existing_data = append_to_existing_data;
        self
    }

    pub fn with_replace_existing(mut self, replace_existing_entries: bool) -> Self {
        self.replace_existing_entries = replace_existing_entries;
        self
    }

    pub fn with_input_buffer_size(mut self, input_buffer_size: usize) -> Self {
        self.input_buffer_size = input_buffer_size;
        self
    }

    /// Whether the intermediate records carry delete lists and those deletes are
    /// applied to stored values.
    #[inline]
    pub fn replace_existing(&self) -> bool {
        self.append_to_existing_data && self.replace_existing_entries
    }

    pub fn validate(&self) -> Result<()> {
        verify_arg!(input_buffer_size, self.input_buffer_size > 0);
        if self.temp_directory.as_os_str().is_empty() {
            return Err(Error::invalid_arg(
                "temp_directory",
                "temporary directory must be set",
            ));
        }
        Ok(())
    }

    pub fn from_json(json: &str) -> Result<Self> {
        parse_json(json, "ImportConfig")
    }
}

fn parse_json<T: for<'de> Deserialize<'de>>(json: &str, element: &str) -> Result<T> {
    serde_json::from_str(json).map_err(|e| Error::invalid_format(element, e.to_string()))
}
