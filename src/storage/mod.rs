//! Predicate database storage formats
//!
//! **Streaming Design** (constant memory per file):
//! - Formats read one record at a time from a buffered reader
//! - Corrupt records are skipped and counted, never fatal to the file
//! - Writes go to a temporary sibling that is renamed on success
//!
//! Toyota Way Principles:
//! - Jidoka: a bad line stops itself, not the line next to it
//! - Poka-Yoke: an aborted write never leaves a partial target file
//!
//! ## Formats
//!
//! | Id | Extension | Read | Write |
//! |---|---|---|---|
//! | `json` | `jsonl` | yes | yes |
//! | `legacy` | `pdb` | yes | no |

mod json;
mod legacy;
mod sample;
mod stats;

pub use json::JsonFormat;
pub use legacy::LegacyFormat;
pub use sample::{DbSample, PredicateSample, SampleStream, TrainingData};
pub use stats::DataGenerationStats;

use std::fmt;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use walkdir::WalkDir;

use crate::{Error, Result};

/// Identifier of a storage format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FormatId {
    /// Current JSON-lines format
    Json,
    /// Legacy line format (read-only)
    Legacy,
}

impl FormatId {
    /// Instantiate the format.
    #[must_use]
    pub fn format(self) -> Box<dyn PredicateDbFormat> {
        match self {
            Self::Json => Box::new(JsonFormat::new()),
            Self::Legacy => Box::new(LegacyFormat::new()),
        }
    }
}

impl fmt::Display for FormatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Json => f.write_str("json"),
            Self::Legacy => f.write_str("legacy"),
        }
    }
}

impl FromStr for FormatId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" | "jsonl" => Ok(Self::Json),
            "legacy" | "pdb" => Ok(Self::Legacy),
            other => Err(Error::Config(format!("unknown database format '{other}'"))),
        }
    }
}

/// A predicate database codec.
pub trait PredicateDbFormat: Send + Sync {
    /// Identifier of the format.
    fn id(&self) -> FormatId;

    /// Extension (without dot) of the files of this format.
    fn file_extension(&self) -> &'static str;

    /// Stream the samples of one file.
    ///
    /// # Errors
    ///
    /// Returns `Error::FileIo` if the file cannot be opened
    fn load_samples(&self, file: &Path) -> Result<SampleStream>;

    /// Write the samples of one source file below `target_dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if the target cannot be written or the sample stream
    /// ended with an I/O error; no target file is left behind in that case
    fn write_samples(&self, data: TrainingData, target_dir: &Path)
        -> Result<DataGenerationStats>;

    /// Target file for a source path relative to the database root.
    fn target_path(&self, relative_source: &Path, target_dir: &Path) -> PathBuf {
        target_dir
            .join(relative_source)
            .with_extension(self.file_extension())
    }

    /// Check whether a file belongs to this format.
    fn matches(&self, path: &Path) -> bool {
        path.extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case(self.file_extension()))
    }
}

/// Path of `file` relative to `root`; the file name when `file` is `root`.
#[must_use]
pub fn relative_source(file: &Path, root: &Path) -> PathBuf {
    match file.strip_prefix(root) {
        Ok(relative) if !relative.as_os_str().is_empty() => relative.to_path_buf(),
        _ => file
            .file_name()
            .map_or_else(|| file.to_path_buf(), PathBuf::from),
    }
}

/// Recursively collect the regular files of a format below `root`, sorted.
///
/// # Errors
///
/// Returns `Error::FatalIo` if the tree cannot be walked
pub fn collect_files(root: &Path, format: &dyn PredicateDbFormat) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(|e| Error::fatal_io(root, e))?;
        if entry.file_type().is_file() && format.matches(entry.path()) {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

/// Write `target` through a temporary sibling renamed on success.
pub(crate) fn write_atomically<F>(target: &Path, write: F) -> Result<DataGenerationStats>
where
    F: FnOnce(&mut BufWriter<File>) -> Result<DataGenerationStats>,
{
    if let Some(parent) = target.parent() {
        std::fs::create_dir_all(parent).map_err(|e| Error::file_io(parent, e))?;
    }

    let mut tmp_name = target.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp = PathBuf::from(tmp_name);

    let result = File::create(&tmp)
        .map_err(|e| Error::file_io(&tmp, e))
        .and_then(|file| {
            let mut writer = BufWriter::new(file);
            let stats = write(&mut writer)?;
            writer.flush().map_err(|e| Error::file_io(&tmp, e))?;
            Ok(stats)
        })
        .and_then(|stats| {
            std::fs::rename(&tmp, target).map_err(|e| Error::file_io(target, e))?;
            Ok(stats)
        });

    if result.is_err() {
        // Best effort: the temporary may not exist if creation failed
        let _ = std::fs::remove_file(&tmp);
    }
    result
}
