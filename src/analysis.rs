//! Aggregate statistics over a predicate database tree
//!
//! Every file is streamed on the worker pool into a per-file summary; the
//! summaries are reduced on the calling thread after the join. Files that
//! fail with an I/O error are reported and left out of the aggregate.

use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use serde::Serialize;
use tracing::{info, warn};

use crate::storage::{collect_files, relative_source, PredicateDbFormat};
use crate::{worker_pool, Error, Result};

/// Aggregate of a predicate database analysis.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PredDbAnalysis {
    machine_count: usize,
    sample_count: u64,
    contradiction_count: u64,
    files_seen: u64,
    files_with_errors: u64,
    failed_samples: u64,
}

impl PredDbAnalysis {
    /// Number of distinct source machines.
    #[must_use]
    pub const fn machine_count(&self) -> usize {
        self.machine_count
    }

    /// Number of samples read.
    #[must_use]
    pub const fn sample_count(&self) -> u64 {
        self.sample_count
    }

    /// Number of samples some backend decided valid and another invalid.
    #[must_use]
    pub const fn contradiction_count(&self) -> u64 {
        self.contradiction_count
    }

    /// Number of files analysed.
    #[must_use]
    pub const fn files_seen(&self) -> u64 {
        self.files_seen
    }

    /// Number of files skipped because of I/O errors.
    #[must_use]
    pub const fn files_with_errors(&self) -> u64 {
        self.files_with_errors
    }

    /// Number of corrupt records skipped.
    #[must_use]
    pub const fn failed_samples(&self) -> u64 {
        self.failed_samples
    }
}

impl fmt::Display for PredDbAnalysis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Machines:        {}", self.machine_count)?;
        writeln!(f, "Samples:         {}", self.sample_count)?;
        writeln!(f, "Contradictions:  {}", self.contradiction_count)?;
        writeln!(f, "Files seen:      {}", self.files_seen)?;
        writeln!(f, "Files w/ errors: {}", self.files_with_errors)?;
        write!(f, "Corrupt records: {}", self.failed_samples)
    }
}

#[derive(Debug, Default)]
struct FileSummary {
    machines: BTreeSet<PathBuf>,
    samples: u64,
    contradictions: u64,
    failed: u64,
    error: bool,
}

/// Computes a [`PredDbAnalysis`] over database files of one format.
pub struct PredicateDbAnalyser {
    format: Box<dyn PredicateDbFormat>,
    workers: usize,
}

impl PredicateDbAnalyser {
    /// Create an analyser for `format` files.
    #[must_use]
    pub fn new<F: PredicateDbFormat + 'static>(format: F) -> Self {
        Self::from_boxed(Box::new(format))
    }

    /// Create an analyser from an already boxed format.
    #[must_use]
    pub fn from_boxed(format: Box<dyn PredicateDbFormat>) -> Self {
        Self { format, workers: 0 }
    }

    /// Set the number of worker threads (0 = one per core).
    #[must_use]
    pub const fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Analyse every matching file below `dir`.
    ///
    /// # Errors
    ///
    /// Returns `Error::FatalIo` if `dir` does not exist or cannot be walked
    pub fn analyse(&self, dir: impl AsRef<Path>) -> Result<PredDbAnalysis> {
        let dir = dir.as_ref();
        if !dir.exists() {
            return Err(Error::fatal_io(dir, "database does not exist"));
        }

        let files = collect_files(dir, self.format.as_ref())?;
        let summaries: Vec<FileSummary> = worker_pool(self.workers)?.install(|| {
            files
                .par_iter()
                .map(|file| self.analyse_file(file, dir))
                .collect()
        });

        let mut machines = BTreeSet::new();
        let mut analysis = PredDbAnalysis::default();
        for summary in summaries {
            analysis.files_seen += 1;
            if summary.error {
                analysis.files_with_errors += 1;
                continue;
            }
            machines.extend(summary.machines);
            analysis.sample_count += summary.samples;
            analysis.contradiction_count += summary.contradictions;
            analysis.failed_samples += summary.failed;
        }
        analysis.machine_count = machines.len();

        info!(
            dir = %dir.display(),
            machines = analysis.machine_count,
            samples = analysis.sample_count,
            contradictions = analysis.contradiction_count,
            "analysis finished"
        );
        Ok(analysis)
    }

    fn analyse_file(&self, file: &Path, root: &Path) -> FileSummary {
        let mut stream = match self.format.load_samples(file) {
            Ok(stream) => stream,
            Err(e) => {
                warn!(file = %file.display(), error = %e, "skipping unreadable file");
                return FileSummary {
                    error: true,
                    ..FileSummary::default()
                };
            }
        };

        let fallback = relative_source(file, root);
        let mut summary = FileSummary::default();
        for sample in stream.by_ref() {
            summary.samples += 1;
            if sample.is_contradictory() {
                summary.contradictions += 1;
            }
            let machine = sample.source().map_or_else(|| fallback.clone(), Path::to_path_buf);
            summary.machines.insert(machine);
        }
        summary.failed = stream.failed() as u64;

        if let Some(e) = stream.take_error() {
            warn!(file = %file.display(), error = %e, "skipping corrupt file");
            summary.error = true;
        }
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{JsonFormat, LegacyFormat};

    #[test]
    fn test_missing_dir_is_fatal() {
        let result = PredicateDbAnalyser::new(JsonFormat::new()).analyse("/nonexistent/db");
        assert!(matches!(result, Err(Error::FatalIo { .. })));
    }

    #[test]
    fn test_legacy_samples_fall_back_to_file_path() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("a")).unwrap();
        std::fs::write(dir.path().join("a/One.pdb"), "1.0:x = 1\n2.0:x = 2\n").unwrap();
        std::fs::write(dir.path().join("Two.pdb"), "1.0:y = 1\nbroken\n").unwrap();

        let analysis = PredicateDbAnalyser::new(LegacyFormat::new())
            .with_workers(2)
            .analyse(dir.path())
            .unwrap();

        assert_eq!(analysis.machine_count(), 2);
        assert_eq!(analysis.sample_count(), 3);
        assert_eq!(analysis.contradiction_count(), 0);
        assert_eq!(analysis.failed_samples(), 1);
        assert_eq!(analysis.files_seen(), 2);
    }

    #[test]
    fn test_corrupt_file_skipped() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("Good.pdb"), "1.0:x = 1\n").unwrap();
        std::fs::write(dir.path().join("Bad.pdb"), b"1.0:x = 1\n\xff\n").unwrap();

        let analysis = PredicateDbAnalyser::new(LegacyFormat::new())
            .analyse(dir.path())
            .unwrap();

        assert_eq!(analysis.sample_count(), 1);
        assert_eq!(analysis.machine_count(), 1);
        assert_eq!(analysis.files_with_errors(), 1);
    }
}
