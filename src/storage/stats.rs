//! Data generation statistics
//!
//! `DataGenerationStats` forms a commutative monoid under `merge`: workers
//! produce one value per file and a single reducer folds them after the
//! join.

use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign};

use serde::{Deserialize, Serialize};

/// File and sample counters of a generation, migration or write pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DataGenerationStats {
    files_seen: u64,
    files_created: u64,
    files_with_errors: u64,
    samples_written: u64,
    samples_failed: u64,
}

impl DataGenerationStats {
    /// Create statistics from explicit counts.
    #[must_use]
    pub const fn new(
        files_seen: u64,
        files_created: u64,
        files_with_errors: u64,
        samples_written: u64,
        samples_failed: u64,
    ) -> Self {
        Self {
            files_seen,
            files_created,
            files_with_errors,
            samples_written,
            samples_failed,
        }
    }

    /// Statistics of a single file that could not be processed.
    #[must_use]
    pub const fn failed_file() -> Self {
        Self::new(1, 0, 1, 0, 0)
    }

    /// Statistics of a single file seen but left untouched.
    #[must_use]
    pub const fn skipped_file() -> Self {
        Self::new(1, 0, 0, 0, 0)
    }

    /// Pointwise sum of two statistics.
    #[must_use]
    pub const fn merge(self, other: Self) -> Self {
        Self {
            files_seen: self.files_seen + other.files_seen,
            files_created: self.files_created + other.files_created,
            files_with_errors: self.files_with_errors + other.files_with_errors,
            samples_written: self.samples_written + other.samples_written,
            samples_failed: self.samples_failed + other.samples_failed,
        }
    }

    /// Number of files looked at.
    #[must_use]
    pub const fn files_seen(&self) -> u64 {
        self.files_seen
    }

    /// Number of files written.
    #[must_use]
    pub const fn files_created(&self) -> u64 {
        self.files_created
    }

    /// Number of files abandoned because of errors.
    #[must_use]
    pub const fn files_with_errors(&self) -> u64 {
        self.files_with_errors
    }

    /// Number of samples written.
    #[must_use]
    pub const fn samples_written(&self) -> u64 {
        self.samples_written
    }

    /// Number of samples that could not be read or written.
    #[must_use]
    pub const fn samples_failed(&self) -> u64 {
        self.samples_failed
    }

    /// Count one more file seen; returns the new count.
    pub fn increase_files_seen(&mut self) -> u64 {
        self.files_seen += 1;
        self.files_seen
    }

    /// Count one more file created; returns the new count.
    pub fn increase_files_created(&mut self) -> u64 {
        self.files_created += 1;
        self.files_created
    }

    /// Count one more file with errors; returns the new count.
    pub fn increase_files_with_errors(&mut self) -> u64 {
        self.files_with_errors += 1;
        self.files_with_errors
    }

    /// Count one more written sample; returns the new count.
    pub fn increase_samples_written(&mut self) -> u64 {
        self.samples_written += 1;
        self.samples_written
    }

    /// Count failed samples; returns the new count.
    pub fn increase_samples_failed(&mut self, by: u64) -> u64 {
        self.samples_failed += by;
        self.samples_failed
    }
}

impl Add for DataGenerationStats {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        self.merge(rhs)
    }
}

impl AddAssign for DataGenerationStats {
    fn add_assign(&mut self, rhs: Self) {
        *self = self.merge(rhs);
    }
}

impl Sum for DataGenerationStats {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Self::merge)
    }
}

impl fmt::Display for DataGenerationStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "files seen: {}, files created: {}, files with errors: {}, \
             samples written: {}, samples failed: {}",
            self.files_seen,
            self.files_created,
            self.files_with_errors,
            self.samples_written,
            self.samples_failed
        )
    }
}
