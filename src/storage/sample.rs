//! Database samples and sample streams

use std::fmt;
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::backend::Answer;
use crate::{Error, Result};

/// One persisted training sample: data, labelling and optional provenance.
///
/// `source == None` is a valid state distinct from any source path.
#[derive(Debug, Clone, PartialEq)]
pub struct DbSample<D> {
    data: D,
    labelling: Vec<f64>,
    source: Option<PathBuf>,
    answers: Vec<Answer>,
}

/// Sample whose data is the predicate text.
pub type PredicateSample = DbSample<String>;

impl<D> DbSample<D> {
    /// Create a sample without backend answers.
    #[must_use]
    pub const fn new(data: D, labelling: Vec<f64>, source: Option<PathBuf>) -> Self {
        Self {
            data,
            labelling,
            source,
            answers: Vec::new(),
        }
    }

    /// Attach per-backend answers, in labelling order.
    #[must_use]
    pub fn with_answers(mut self, answers: Vec<Answer>) -> Self {
        self.answers = answers;
        self
    }

    /// Get the sample data.
    #[must_use]
    pub const fn data(&self) -> &D {
        &self.data
    }

    /// Get the labelling.
    #[must_use]
    pub fn labelling(&self) -> &[f64] {
        &self.labelling
    }

    /// Get the source machine path, relative to the database root.
    #[must_use]
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// Get the backend answers (empty when unknown).
    #[must_use]
    pub fn answers(&self) -> &[Answer] {
        &self.answers
    }

    /// True if some backend found the predicate valid and another invalid.
    #[must_use]
    pub fn is_contradictory(&self) -> bool {
        self.answers.contains(&Answer::Valid) && self.answers.contains(&Answer::Invalid)
    }

    /// Replace the source path.
    #[must_use]
    pub fn with_source(mut self, source: Option<PathBuf>) -> Self {
        self.source = source;
        self
    }
}

impl<D: fmt::Display> fmt::Display for DbSample<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.labelling, self.data)?;
        if let Some(source) = &self.source {
            write!(f, " ({})", source.display())?;
        }
        Ok(())
    }
}

type Records<D> = Box<dyn Iterator<Item = Result<DbSample<D>>> + Send>;

/// Lazy stream of samples read from one file.
///
/// Corrupt records are skipped and counted ([`SampleStream::failed`]).
/// Any other error ends the stream early and is kept for the consumer
/// ([`SampleStream::take_error`]), so a half-read file is never mistaken
/// for a complete one.
pub struct SampleStream<D = String> {
    records: Records<D>,
    failed: usize,
    error: Option<Error>,
    finished: bool,
}

impl<D> SampleStream<D> {
    /// Wrap a fallible record iterator.
    pub fn new<I>(records: I) -> Self
    where
        I: Iterator<Item = Result<DbSample<D>>> + Send + 'static,
    {
        Self {
            records: Box::new(records),
            failed: 0,
            error: None,
            finished: false,
        }
    }

    /// Stream over samples already in memory.
    pub fn from_samples(samples: Vec<DbSample<D>>) -> Self
    where
        D: Send + 'static,
    {
        Self::new(samples.into_iter().map(Ok))
    }

    /// Number of corrupt records skipped so far.
    #[must_use]
    pub const fn failed(&self) -> usize {
        self.failed
    }

    /// Take the error that ended the stream, if any.
    pub fn take_error(&mut self) -> Option<Error> {
        self.error.take()
    }
}

impl<D> Iterator for SampleStream<D> {
    type Item = DbSample<D>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.finished {
            match self.records.next() {
                Some(Ok(sample)) => return Some(sample),
                Some(Err(e)) if e.is_record_level() => {
                    warn!(error = %e, "skipping corrupt record");
                    self.failed += 1;
                }
                Some(Err(e)) => {
                    self.error = Some(e);
                    self.finished = true;
                }
                None => self.finished = true,
            }
        }
        None
    }
}

impl<D> fmt::Debug for SampleStream<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SampleStream")
            .field("failed", &self.failed)
            .field("error", &self.error)
            .field("finished", &self.finished)
            .finish_non_exhaustive()
    }
}

/// Samples of one source file, tagged with where they came from.
///
/// The sample stream can be consumed exactly once.
#[derive(Debug)]
pub struct TrainingData<D = String> {
    relative_source: PathBuf,
    absolute_source: PathBuf,
    samples: SampleStream<D>,
}

impl<D> TrainingData<D> {
    /// Create training data.
    pub fn new(
        relative_source: impl Into<PathBuf>,
        absolute_source: impl Into<PathBuf>,
        samples: SampleStream<D>,
    ) -> Self {
        Self {
            relative_source: relative_source.into(),
            absolute_source: absolute_source.into(),
            samples,
        }
    }

    /// Get the source path relative to the database root.
    #[must_use]
    pub fn relative_source(&self) -> &Path {
        &self.relative_source
    }

    /// Get the absolute source path.
    #[must_use]
    pub fn absolute_source(&self) -> &Path {
        &self.absolute_source
    }

    /// Consume the data, yielding its sample stream.
    #[must_use]
    pub fn into_samples(self) -> SampleStream<D> {
        self.samples
    }
}
