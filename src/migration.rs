//! Parallel directory-to-directory format migration
//!
//! **Two-phase design**:
//! - Phase 1: sequential tree walk collecting the source files (fatal on
//!   failure, the tree itself is unusable); sources colliding on one target
//!   path are counted as files with errors
//! - Phase 2: bounded rayon pool converting files independently; per-file
//!   failures are logged and counted, then all statistics are reduced after
//!   the join
//!
//! Toyota Way Principles:
//! - Jidoka: one broken file is isolated, the migration carries on
//! - Heijunka: fixed worker count levels the I/O load

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::storage::{
    collect_files, relative_source, DataGenerationStats, PredicateDbFormat, TrainingData,
};
use crate::{worker_pool, Error, Result};

/// Migrates a database tree from one format into another.
pub struct PredicateDbMigration {
    source_format: Box<dyn PredicateDbFormat>,
    workers: usize,
    overwrite: bool,
}

impl PredicateDbMigration {
    /// Create a migration reading `source_format` files.
    #[must_use]
    pub fn new<F: PredicateDbFormat + 'static>(source_format: F) -> Self {
        Self::from_boxed(Box::new(source_format))
    }

    /// Create a migration from an already boxed source format.
    #[must_use]
    pub fn from_boxed(source_format: Box<dyn PredicateDbFormat>) -> Self {
        Self {
            source_format,
            workers: 0,
            overwrite: false,
        }
    }

    /// Set the number of worker threads (0 = one per core).
    #[must_use]
    pub const fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Rewrite targets even when they are newer than their source.
    #[must_use]
    pub const fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    /// Get the source format.
    #[must_use]
    pub fn source_format(&self) -> &dyn PredicateDbFormat {
        self.source_format.as_ref()
    }

    /// Migrate every source-format file below `source_dir` into `target_dir`.
    ///
    /// # Errors
    ///
    /// Returns `Error::FatalIo` if the source tree cannot be read or the
    /// target root cannot be created. Failures of single files are counted
    /// in the returned statistics instead.
    pub fn migrate(
        &self,
        source_dir: impl AsRef<Path>,
        target_dir: impl AsRef<Path>,
        target_format: &dyn PredicateDbFormat,
    ) -> Result<DataGenerationStats> {
        let source_dir = source_dir.as_ref();
        let target_dir = target_dir.as_ref();

        if !source_dir.exists() {
            return Err(Error::fatal_io(source_dir, "source does not exist"));
        }
        std::fs::create_dir_all(target_dir).map_err(|e| Error::fatal_io(target_dir, e))?;

        let files = collect_files(source_dir, self.source_format())?;

        // Sources differing only in extension case share a target; the first
        // in walk order keeps it, the others are reported instead of skipped
        let mut claimed = HashSet::new();
        let (files, collisions): (Vec<PathBuf>, Vec<PathBuf>) =
            files.into_iter().partition(|file| {
                let relative = relative_source(file, source_dir);
                claimed.insert(target_format.target_path(&relative, target_dir))
            });
        for file in &collisions {
            warn!(file = %file.display(), "another source maps to the same target, not migrated");
        }

        info!(
            source = %source_dir.display(),
            target = %target_dir.display(),
            files = files.len(),
            from = %self.source_format.id(),
            to = %target_format.id(),
            "starting migration"
        );

        let done = AtomicUsize::new(0);
        let total = files.len();
        let per_file: Vec<DataGenerationStats> = worker_pool(self.workers)?.install(|| {
            files
                .par_iter()
                .map(|file| {
                    let stats = self.migrate_file(file, source_dir, target_dir, target_format);
                    let count = done.fetch_add(1, Ordering::Relaxed) + 1;
                    debug!(file = %file.display(), count, total, "file migrated");
                    stats
                })
                .collect()
        });

        let stats: DataGenerationStats = per_file
            .into_iter()
            .chain(collisions.iter().map(|_| DataGenerationStats::failed_file()))
            .sum();
        info!(%stats, "migration finished");
        Ok(stats)
    }

    /// Migrate a single file; never fails, errors are counted.
    ///
    /// `source_root` is the database root the target layout is relative to
    /// (pass the file itself for ad-hoc conversions).
    pub fn migrate_file(
        &self,
        file: &Path,
        source_root: &Path,
        target_dir: &Path,
        target_format: &dyn PredicateDbFormat,
    ) -> DataGenerationStats {
        let relative = relative_source(file, source_root);

        if !self.overwrite {
            let target = target_format.target_path(&relative, target_dir);
            if is_up_to_date(file, &target) {
                debug!(
                    file = %file.display(),
                    target = %target.display(),
                    "target up to date, skipping"
                );
                return DataGenerationStats::skipped_file();
            }
        }

        let result = self.source_format.load_samples(file).and_then(|samples| {
            let data = TrainingData::new(relative, file, samples);
            target_format.write_samples(data, target_dir)
        });

        match result {
            Ok(stats) => stats,
            Err(e) => {
                warn!(file = %file.display(), error = %e, "could not migrate file");
                DataGenerationStats::failed_file()
            }
        }
    }
}

/// True if `target` exists and was modified after `source`.
fn is_up_to_date(source: &Path, target: &Path) -> bool {
    let modified = |path: &Path| std::fs::metadata(path).and_then(|m| m.modified()).ok();
    match (modified(source), modified(target)) {
        (Some(source), Some(target)) => target > source,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{JsonFormat, LegacyFormat};

    #[test]
    fn test_missing_source_is_fatal() {
        let target = tempfile::tempdir().unwrap();
        let result = PredicateDbMigration::new(LegacyFormat::new()).migrate(
            "/nonexistent/predicate/db",
            target.path(),
            &JsonFormat::new(),
        );
        assert!(matches!(result, Err(Error::FatalIo { .. })));
    }

    #[test]
    fn test_uncreatable_target_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        std::fs::create_dir_all(&src).unwrap();
        std::fs::write(src.join("m.pdb"), "1.0:x = 1\n").unwrap();
        let blocker = dir.path().join("file.txt");
        std::fs::write(&blocker, "not a directory").unwrap();

        let result = PredicateDbMigration::new(LegacyFormat::new()).migrate(
            &src,
            blocker.join("out"),
            &JsonFormat::new(),
        );
        assert!(matches!(result, Err(Error::FatalIo { .. })));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_target_collision_counted_as_error() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        std::fs::create_dir_all(&src).unwrap();
        std::fs::write(
            src.join("M.jsonl"),
            concat!(
                "{\"predicate\":\"a\",\"labelling\":[1.0]}\n",
                "{\"predicate\":\"b\",\"labelling\":[2.0]}\n",
            ),
        )
        .unwrap();
        std::fs::write(
            src.join("M.JSONL"),
            "{\"predicate\":\"c\",\"labelling\":[3.0]}\n",
        )
        .unwrap();
        let out = dir.path().join("out");

        let stats = PredicateDbMigration::new(JsonFormat::new())
            .migrate(&src, &out, &JsonFormat::new())
            .unwrap();

        assert_eq!(stats.files_seen(), 2);
        assert_eq!(stats.files_created(), 1);
        assert_eq!(stats.files_with_errors(), 1);

        // A rerun must not pass the colliding file off as up to date
        let rerun = PredicateDbMigration::new(JsonFormat::new())
            .migrate(&src, &out, &JsonFormat::new())
            .unwrap();
        assert_eq!(rerun.files_with_errors(), 1);
    }

    #[test]
    fn test_migrate_file_counts_write_failure() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("m.pdb");
        std::fs::write(&file, "1.0:x = 1\n").unwrap();

        // Legacy cannot be written, so the file counts as failed
        let stats = PredicateDbMigration::new(LegacyFormat::new()).migrate_file(
            &file,
            dir.path(),
            &dir.path().join("out"),
            &LegacyFormat::new(),
        );
        assert_eq!(stats, DataGenerationStats::failed_file());
    }

    #[test]
    fn test_single_file_root_uses_file_name() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("Lift.pdb");
        std::fs::write(&file, "1.0,2.0:x = 1\n").unwrap();
        let out = dir.path().join("out");

        let stats = PredicateDbMigration::new(LegacyFormat::new())
            .migrate(&file, &out, &JsonFormat::new())
            .unwrap();

        assert_eq!(stats.samples_written(), 1);
        assert!(out.join("Lift.jsonl").is_file());
    }

    #[test]
    fn test_up_to_date_target_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        std::fs::create_dir_all(&src).unwrap();
        std::fs::write(src.join("m.pdb"), "1.0:x = 1\n").unwrap();
        let out = dir.path().join("out");
        let migration = PredicateDbMigration::new(LegacyFormat::new()).with_workers(1);

        let first = migration.migrate(&src, &out, &JsonFormat::new()).unwrap();
        assert_eq!(first.files_created(), 1);

        // Make the target strictly newer than the source
        let later = std::time::SystemTime::now() + std::time::Duration::from_secs(60);
        std::fs::File::options()
            .write(true)
            .open(out.join("m.jsonl"))
            .unwrap()
            .set_modified(later)
            .unwrap();

        let second = migration.migrate(&src, &out, &JsonFormat::new()).unwrap();
        assert_eq!(second, DataGenerationStats::skipped_file());

        let forced = migration
            .with_overwrite(true)
            .migrate(&src, &out, &JsonFormat::new())
            .unwrap();
        assert_eq!(forced.files_created(), 1);
    }
}
