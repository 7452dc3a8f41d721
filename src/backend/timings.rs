//! Per-predicate timings of several backends

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::debug;

use super::{Answer, Backend, DecisionEngine, TimedAnswer};
use crate::storage::PredicateSample;
use crate::{Error, Result};

/// Timed answers of a set of backends for one predicate.
///
/// Holds exactly one entry per evaluated backend. Looking up a backend that
/// was not evaluated is an error, which keeps "not evaluated" apart from
/// "evaluated but undecided".
#[derive(Debug, Clone, PartialEq)]
pub struct DecisionTimings {
    predicate: String,
    order: Vec<Backend>,
    timings: HashMap<Backend, TimedAnswer>,
}

impl DecisionTimings {
    /// Evaluate `predicate` with every backend against one machine context.
    ///
    /// Backends run sequentially since they reconfigure the shared context;
    /// duplicates are evaluated once. The context is closed before
    /// returning, on success and on error alike.
    ///
    /// # Errors
    ///
    /// Returns `Error::MachineAccess` if the machine context cannot be
    /// opened or used
    pub async fn evaluate<E: DecisionEngine>(
        engine: &E,
        machine: Option<&Path>,
        predicate: &str,
        backends: &[Backend],
        timeout: Duration,
    ) -> Result<Self> {
        let mut context = engine.open_machine(machine)?;
        let mut seen = HashSet::new();
        let mut answers = Vec::with_capacity(backends.len());

        for backend in backends {
            if !seen.insert(backend) {
                continue;
            }
            let answer = backend
                .solve(engine, &mut context, predicate, timeout)
                .await?;
            answers.push((backend.clone(), answer));
        }

        debug!(predicate, backends = answers.len(), "predicate evaluated");
        Ok(Self::from_answers(predicate, answers))
    }

    /// Build timings from precomputed answers; a repeated backend keeps its
    /// last answer.
    #[must_use]
    pub fn from_answers(
        predicate: impl Into<String>,
        answers: impl IntoIterator<Item = (Backend, TimedAnswer)>,
    ) -> Self {
        let mut order = Vec::new();
        let mut timings = HashMap::new();
        for (backend, answer) in answers {
            if timings.insert(backend.clone(), answer).is_none() {
                order.push(backend);
            }
        }

        Self {
            predicate: predicate.into(),
            order,
            timings,
        }
    }

    /// Get the predicate.
    #[must_use]
    pub fn predicate(&self) -> &str {
        &self.predicate
    }

    /// Get the evaluated backends in evaluation order.
    #[must_use]
    pub fn backends(&self) -> &[Backend] {
        &self.order
    }

    /// Get the timed answer of a backend.
    ///
    /// # Errors
    ///
    /// Returns `Error::BackendNotEvaluated` for backends not evaluated
    pub fn get(&self, backend: &Backend) -> Result<&TimedAnswer> {
        self.timings
            .get(backend)
            .ok_or_else(|| Error::BackendNotEvaluated(backend.to_string()))
    }

    /// Flattened timing of a backend: nanoseconds, or negative if undecided.
    ///
    /// # Errors
    ///
    /// Returns `Error::BackendNotEvaluated` for backends not evaluated
    pub fn get_timing(&self, backend: &Backend) -> Result<i64> {
        self.get(backend).map(TimedAnswer::timing)
    }

    /// Answer of a backend.
    ///
    /// # Errors
    ///
    /// Returns `Error::BackendNotEvaluated` for backends not evaluated
    pub fn get_answer(&self, backend: &Backend) -> Result<Answer> {
        self.get(backend).map(TimedAnswer::answer)
    }

    /// Timings of the given backends as a labelling vector.
    ///
    /// # Errors
    ///
    /// Returns `Error::BackendNotEvaluated` if any backend was not evaluated
    #[allow(clippy::cast_precision_loss)]
    pub fn labelling(&self, backends: &[Backend]) -> Result<Vec<f64>> {
        backends
            .iter()
            .map(|b| self.get_timing(b).map(|t| t as f64))
            .collect()
    }

    /// Convert into a database sample, labelled in evaluation order.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn to_sample(&self, source: Option<PathBuf>) -> PredicateSample {
        let labelling = self
            .order
            .iter()
            .map(|b| self.timings[b].timing() as f64)
            .collect();
        let answers = self.order.iter().map(|b| self.timings[b].answer()).collect();

        PredicateSample::new(self.predicate.clone(), labelling, source).with_answers(answers)
    }
}
