//! Legacy line format (read-only migration source)
//!
//! One sample per line, no header:
//!
//! ```text
//! 1.0,2.0,3.0,-1.0:x : 1..10 & x > 5:lift/Lift.mch:PREDICATES
//! ```
//!
//! The labelling is everything before the first `:`; the rest of the line
//! is kept verbatim as the predicate, provenance comment included. Lines are
//! independent, so a malformed line never affects its neighbours.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use super::{
    DataGenerationStats, FormatId, PredicateDbFormat, PredicateSample, SampleStream, TrainingData,
};
use crate::{Error, Result};

/// Extension of legacy files.
pub const LEGACY_EXTENSION: &str = "pdb";

/// Legacy `labelling:predicate` line format.
#[derive(Debug, Clone, Copy, Default)]
pub struct LegacyFormat {
    _private: (),
}

impl LegacyFormat {
    /// Create the format.
    #[must_use]
    pub const fn new() -> Self {
        Self { _private: () }
    }

    /// Parse one line into a sample without source.
    ///
    /// # Errors
    ///
    /// Returns a description of the defect for lines without `:`, with an
    /// empty labelling or with a non-numeric label
    pub fn parse_line(line: &str) -> std::result::Result<PredicateSample, String> {
        let (labels, predicate) = line
            .split_once(':')
            .ok_or_else(|| "missing ':' after labelling".to_string())?;

        if labels.trim().is_empty() {
            return Err("empty labelling".to_string());
        }

        let labelling = labels
            .split(',')
            .map(|label| {
                label
                    .trim()
                    .parse::<f64>()
                    .map_err(|e| format!("label '{}': {e}", label.trim()))
            })
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(PredicateSample::new(predicate.to_string(), labelling, None))
    }
}

impl PredicateDbFormat for LegacyFormat {
    fn id(&self) -> FormatId {
        FormatId::Legacy
    }

    fn file_extension(&self) -> &'static str {
        LEGACY_EXTENSION
    }

    fn load_samples(&self, file: &Path) -> Result<SampleStream> {
        let reader = BufReader::new(File::open(file).map_err(|e| Error::file_io(file, e))?);
        let path = file.to_path_buf();

        let records = reader
            .lines()
            .enumerate()
            .filter_map(move |(index, line)| match line {
                Ok(line) if line.trim().is_empty() => None,
                Ok(line) => Some(Self::parse_line(&line).map_err(|reason| {
                    Error::FormatCorruption {
                        file: path.clone(),
                        line: index + 1,
                        reason,
                    }
                })),
                Err(e) => Some(Err(Error::file_io(&path, e))),
            });

        Ok(SampleStream::new(records))
    }

    fn write_samples(
        &self,
        _data: TrainingData,
        _target_dir: &Path,
    ) -> Result<DataGenerationStats> {
        Err(Error::UnsupportedOperation(
            "the legacy format is read-only; migrate to the json format instead".to_string(),
        ))
    }
}
