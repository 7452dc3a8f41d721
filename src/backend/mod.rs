//! Decision backends
//!
//! Toyota Way Principles:
//! - Genchi Genbutsu: Every backend is measured against the same machine
//!   context; timings come from actual runs, never estimates
//! - Poka-Yoke: Preferences are applied through scoped guards and a
//!   backend never outlives its deadline
//!
//! ## Usage
//!
//! ```rust,no_run
//! use predicate_db::backend::{Backend, DecisionTimings, ProcessEngine};
//! use std::time::Duration;
//!
//! # async fn example() -> predicate_db::Result<()> {
//! let engine = ProcessEngine::new();
//! let backends: Vec<Backend> = Backend::parse("prob[CLPFD=TRUE,SMT=TRUE]")?
//!     .cross_produce()?;
//!
//! let timings = DecisionTimings::evaluate(
//!     &engine,
//!     None,
//!     "x : 1..10 & x > 5",
//!     &backends,
//!     Duration::from_secs(2),
//! )
//! .await?;
//! println!("{}", timings.get_timing(&backends[0])?);
//! # Ok(())
//! # }
//! ```

mod descriptor;
mod engine;
mod preference;
mod timings;

pub use descriptor::{
    cross_produce, match_backend, BackendDescriptor, BackendKind, MAX_CROSS_PREFERENCES,
};
pub use engine::{
    Answer, DecisionEngine, EngineCommand, MachineContext, Outcome, PreferenceScope,
    ProcessEngine, TimedAnswer, UNDECIDED_SENTINEL,
};
pub use preference::{Preference, PreferenceSet, PreferenceSetBuilder};
pub use timings::DecisionTimings;

use std::fmt;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::{Error, Result};

/// A decision backend: a backend kind configured with preferences.
///
/// Two backends are equal iff their descriptors are equal, which is what
/// deduplicates cross-produced variants.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Backend {
    descriptor: BackendDescriptor,
}

impl Backend {
    /// Create a backend from its descriptor.
    #[must_use]
    pub const fn new(descriptor: BackendDescriptor) -> Self {
        Self { descriptor }
    }

    /// Backend of a kind without preferences.
    #[must_use]
    pub fn plain(kind: BackendKind) -> Self {
        Self::new(BackendDescriptor::plain(kind))
    }

    /// Parse a backend spec string.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` for malformed specs
    pub fn parse(spec: &str) -> Result<Self> {
        BackendDescriptor::parse(spec).map(Self::new)
    }

    /// Get the descriptor.
    #[must_use]
    pub const fn descriptor(&self) -> &BackendDescriptor {
        &self.descriptor
    }

    /// Get the backend kind.
    #[must_use]
    pub const fn kind(&self) -> BackendKind {
        self.descriptor.kind()
    }

    /// Get the preferences.
    #[must_use]
    pub const fn preferences(&self) -> &PreferenceSet {
        self.descriptor.preferences()
    }

    /// One backend per subset of this backend's preferences.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if there are too many preferences to expand
    pub fn cross_produce(&self) -> Result<Vec<Self>> {
        Ok(self
            .descriptor
            .cross_produce()?
            .into_iter()
            .map(Self::new)
            .collect())
    }

    /// Decide a predicate within `timeout`.
    ///
    /// The preferences are applied to `context` for the duration of the
    /// call only. Engine failures become `Answer::Error` and an expired
    /// deadline cancels the engine call and yields `Answer::Timeout`.
    ///
    /// # Errors
    ///
    /// Returns `Error::MachineAccess` if the engine could not use the
    /// machine context; every other failure is reported in the answer
    pub async fn solve<E: DecisionEngine>(
        &self,
        engine: &E,
        context: &mut MachineContext,
        predicate: &str,
        timeout: Duration,
    ) -> Result<TimedAnswer> {
        let scope = context.apply(self.preferences());
        let start = Instant::now();
        let decision = engine.decide(self.kind(), predicate, &scope);
        let result = tokio::time::timeout(timeout, decision).await;
        let elapsed = start.elapsed();
        drop(scope);

        let answer = match result {
            Ok(Ok(answer)) => answer,
            Ok(Err(e @ Error::MachineAccess { .. })) => return Err(e),
            Ok(Err(e)) => {
                warn!(backend = %self, error = %e, "engine failed");
                Answer::Error
            }
            Err(_) => {
                debug!(backend = %self, ?timeout, "engine cancelled at deadline");
                Answer::Timeout
            }
        };

        debug!(backend = %self, %answer, ?elapsed, "backend finished");
        Ok(TimedAnswer::new(answer, elapsed))
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.descriptor, f)
    }
}

impl From<BackendDescriptor> for Backend {
    fn from(descriptor: BackendDescriptor) -> Self {
        Self::new(descriptor)
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    //! Scripted in-memory engine for backend tests.

    use super::*;
    use std::collections::HashMap;
    use std::future::Future;
    use std::path::Path;
    use std::sync::Mutex;

    /// Scripted reply of the mock engine for one backend kind.
    #[derive(Debug, Clone, Copy)]
    pub enum Reply {
        Answer(Answer),
        Fail,
        Hang,
        DenyMachine,
    }

    /// Engine replying from a script and recording the preferences it saw.
    #[derive(Debug, Default)]
    pub struct ScriptedEngine {
        replies: HashMap<BackendKind, Reply>,
        pub seen: Mutex<Vec<(BackendKind, Vec<(String, String)>)>>,
        deny_open: bool,
    }

    impl ScriptedEngine {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn reply(mut self, kind: BackendKind, reply: Reply) -> Self {
            self.replies.insert(kind, reply);
            self
        }

        pub fn deny_machines(mut self) -> Self {
            self.deny_open = true;
            self
        }
    }

    impl DecisionEngine for ScriptedEngine {
        fn open_machine(&self, machine: Option<&Path>) -> Result<MachineContext> {
            if self.deny_open {
                return Err(Error::MachineAccess {
                    machine: format!("{machine:?}"),
                    reason: "denied".to_string(),
                });
            }
            MachineContext::open(machine)
        }

        fn decide(
            &self,
            kind: BackendKind,
            _predicate: &str,
            context: &MachineContext,
        ) -> impl Future<Output = Result<Answer>> + Send {
            let prefs = context
                .preferences()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect();
            self.seen.lock().unwrap().push((kind, prefs));
            let reply = self
                .replies
                .get(&kind)
                .copied()
                .unwrap_or(Reply::Answer(Answer::Unknown));

            async move {
                match reply {
                    Reply::Answer(answer) => Ok(answer),
                    Reply::Fail => Err(Error::Engine("scripted failure".to_string())),
                    Reply::Hang => {
                        tokio::time::sleep(Duration::from_secs(3600)).await;
                        Ok(Answer::Valid)
                    }
                    Reply::DenyMachine => Err(Error::MachineAccess {
                        machine: "scripted".to_string(),
                        reason: "denied".to_string(),
                    }),
                }
            }
        }
    }
}
