//! Training database generation
//!
//! Evaluates the predicates of a machine with every configured backend and
//! writes the resulting samples through a database format. Each machine job
//! owns its own machine context; jobs run concurrently up to a bound, the
//! backends of one predicate run sequentially.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::backend::{Backend, DecisionEngine, DecisionTimings};
use crate::config::DEFAULT_TIMEOUT_MS;
use crate::storage::{
    relative_source, DataGenerationStats, PredicateDbFormat, SampleStream, TrainingData,
};
use crate::Result;

/// Predicates of one machine to evaluate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MachineJob {
    machine: PathBuf,
    relative_source: PathBuf,
    predicates: Vec<String>,
}

impl MachineJob {
    /// Create a job for `machine`, located below the database root
    /// `source_root`.
    #[must_use]
    pub fn new(machine: impl Into<PathBuf>, source_root: &Path, predicates: Vec<String>) -> Self {
        let machine = machine.into();
        let relative_source = relative_source(&machine, source_root);
        Self {
            machine,
            relative_source,
            predicates,
        }
    }

    /// Get the machine file.
    #[must_use]
    pub fn machine(&self) -> &Path {
        &self.machine
    }

    /// Get the machine path relative to the database root.
    #[must_use]
    pub fn relative_source(&self) -> &Path {
        &self.relative_source
    }

    /// Get the predicates.
    #[must_use]
    pub fn predicates(&self) -> &[String] {
        &self.predicates
    }
}

/// Generates predicate database files from machine jobs.
pub struct PredicateDbGenerator<E> {
    engine: Arc<E>,
    backends: Arc<[Backend]>,
    format: Arc<dyn PredicateDbFormat>,
    timeout: Duration,
    concurrency: usize,
}

impl<E> Clone for PredicateDbGenerator<E> {
    fn clone(&self) -> Self {
        Self {
            engine: Arc::clone(&self.engine),
            backends: Arc::clone(&self.backends),
            format: Arc::clone(&self.format),
            timeout: self.timeout,
            concurrency: self.concurrency,
        }
    }
}

impl<E: DecisionEngine + 'static> PredicateDbGenerator<E> {
    /// Create a generator labelling samples with `backends`, in order.
    pub fn new(
        engine: Arc<E>,
        backends: Vec<Backend>,
        format: Arc<dyn PredicateDbFormat>,
    ) -> Self {
        Self {
            engine,
            backends: backends.into(),
            format,
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            concurrency: 1,
        }
    }

    /// Set the per-backend timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set how many machine jobs may run at once (at least one).
    #[must_use]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Get the backends.
    #[must_use]
    pub fn backends(&self) -> &[Backend] {
        &self.backends
    }

    /// Evaluate one machine job and write its database file.
    ///
    /// Predicates whose machine context cannot be opened are counted as
    /// failed samples.
    ///
    /// # Errors
    ///
    /// Returns an error if the database file cannot be written
    pub async fn generate(
        &self,
        job: &MachineJob,
        target_dir: &Path,
    ) -> Result<DataGenerationStats> {
        let mut samples = Vec::with_capacity(job.predicates.len());
        let mut failed = 0;

        for predicate in &job.predicates {
            match DecisionTimings::evaluate(
                self.engine.as_ref(),
                Some(job.machine.as_path()),
                predicate,
                &self.backends,
                self.timeout,
            )
            .await
            {
                Ok(timings) => {
                    samples.push(timings.to_sample(Some(job.relative_source.clone())));
                }
                Err(e) => {
                    warn!(
                        machine = %job.machine.display(),
                        predicate,
                        error = %e,
                        "predicate not evaluated"
                    );
                    failed += 1;
                }
            }
        }

        let data = TrainingData::new(
            job.relative_source.clone(),
            job.machine.clone(),
            SampleStream::from_samples(samples),
        );
        let mut stats = self.format.write_samples(data, target_dir)?;
        stats.increase_samples_failed(failed);
        info!(machine = %job.machine.display(), %stats, "machine generated");
        Ok(stats)
    }

    /// Run all jobs with bounded concurrency and merge their statistics.
    ///
    /// A job whose file cannot be written counts as a file with errors.
    pub async fn generate_all(
        &self,
        jobs: Vec<MachineJob>,
        target_dir: PathBuf,
    ) -> DataGenerationStats {
        let permits = Arc::new(Semaphore::new(self.concurrency));
        let target_dir = Arc::new(target_dir);
        let mut tasks = JoinSet::new();

        for job in jobs {
            let generator = self.clone();
            let permits = Arc::clone(&permits);
            let target_dir = Arc::clone(&target_dir);
            tasks.spawn(async move {
                let Ok(_permit) = permits.acquire_owned().await else {
                    return DataGenerationStats::failed_file();
                };
                match generator.generate(&job, &target_dir).await {
                    Ok(stats) => stats,
                    Err(e) => {
                        warn!(
                            machine = %job.machine.display(),
                            error = %e,
                            "could not write machine database"
                        );
                        DataGenerationStats::failed_file()
                    }
                }
            });
        }

        let mut results = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(stats) => results.push(stats),
                Err(e) => {
                    error!(error = %e, "generation task panicked");
                    results.push(DataGenerationStats::failed_file());
                }
            }
        }
        results.into_iter().sum()
    }
}
