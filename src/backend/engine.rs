//! Decision engines, machine contexts and timed answers
//!
//! Toyota Way Principles:
//! - Poka-Yoke: preference changes live in a scope guard that restores the
//!   context on drop, so a timed-out or failed call cannot leak settings
//!   into the next backend
//! - Jidoka: engine failures become `Answer::Error` instead of stopping
//!   the whole evaluation

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::future::Future;
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tracing::{debug, trace};

use super::descriptor::BackendKind;
use super::preference::PreferenceSet;
use crate::{Error, Result};

/// Flattened timing of an answer that produced no successful timing.
pub const UNDECIDED_SENTINEL: i64 = -1;

/// Verdict of one backend on one predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Answer {
    /// Predicate holds (a solution was found)
    Valid,
    /// Predicate is contradictory
    Invalid,
    /// Engine finished without a verdict
    Unknown,
    /// Engine was cancelled at the deadline
    Timeout,
    /// Engine failed
    Error,
}

/// Three-way collapse of an `Answer`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    /// The backend produced a verdict
    Decided,
    /// The backend gave up or ran out of time
    Undecided,
    /// The backend failed
    Error,
}

impl Answer {
    /// Collapse to decided / undecided / error.
    #[must_use]
    pub const fn outcome(self) -> Outcome {
        match self {
            Self::Valid | Self::Invalid => Outcome::Decided,
            Self::Unknown | Self::Timeout => Outcome::Undecided,
            Self::Error => Outcome::Error,
        }
    }

    /// Classify the first non-empty line of engine output.
    #[must_use]
    pub fn classify(output: &str) -> Self {
        let verdict = output
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .unwrap_or_default()
            .to_ascii_lowercase();

        match verdict.as_str() {
            "valid" | "sat" | "true" | "solution" => Self::Valid,
            "invalid" | "unsat" | "false" | "contradiction" => Self::Invalid,
            "unknown" => Self::Unknown,
            "timeout" => Self::Timeout,
            _ => Self::Error,
        }
    }
}

impl fmt::Display for Answer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Valid => "VALID",
            Self::Invalid => "INVALID",
            Self::Unknown => "UNKNOWN",
            Self::Timeout => "TIMEOUT",
            Self::Error => "ERROR",
        };
        f.write_str(s)
    }
}

/// An answer together with the wall-clock time the backend needed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimedAnswer {
    answer: Answer,
    elapsed: Duration,
}

impl TimedAnswer {
    /// Create a timed answer.
    #[must_use]
    pub const fn new(answer: Answer, elapsed: Duration) -> Self {
        Self { answer, elapsed }
    }

    /// Get the answer.
    #[must_use]
    pub const fn answer(&self) -> Answer {
        self.answer
    }

    /// Get the outcome class of the answer.
    #[must_use]
    pub const fn outcome(&self) -> Outcome {
        self.answer.outcome()
    }

    /// Get the measured elapsed time.
    #[must_use]
    pub const fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// Legacy scalar form: nanoseconds when decided, `UNDECIDED_SENTINEL`
    /// otherwise.
    ///
    /// The sentinel does not distinguish timeouts, unknown results and
    /// engine errors; use `answer()` where that matters.
    #[must_use]
    pub fn timing(&self) -> i64 {
        match self.outcome() {
            Outcome::Decided => i64::try_from(self.elapsed.as_nanos()).unwrap_or(i64::MAX),
            Outcome::Undecided | Outcome::Error => UNDECIDED_SENTINEL,
        }
    }
}

/// Evaluation scope for predicates of one machine.
///
/// The context is closed when dropped; backends only change it through
/// [`MachineContext::apply`], which hands out a restoring guard.
#[derive(Debug)]
pub struct MachineContext {
    machine: Option<PathBuf>,
    preferences: BTreeMap<String, String>,
}

impl MachineContext {
    /// Open a context for a machine file, or an empty context for `None`.
    ///
    /// # Errors
    ///
    /// Returns `Error::MachineAccess` if the machine is not a readable file
    pub fn open(machine: Option<&Path>) -> Result<Self> {
        if let Some(path) = machine {
            let metadata = std::fs::metadata(path).map_err(|e| Error::MachineAccess {
                machine: path.display().to_string(),
                reason: e.to_string(),
            })?;
            if !metadata.is_file() {
                return Err(Error::MachineAccess {
                    machine: path.display().to_string(),
                    reason: "not a regular file".to_string(),
                });
            }
        }

        debug!(machine = ?machine, "opened machine context");
        Ok(Self {
            machine: machine.map(Path::to_path_buf),
            preferences: BTreeMap::new(),
        })
    }

    /// Get the machine file, if any.
    #[must_use]
    pub fn machine(&self) -> Option<&Path> {
        self.machine.as_deref()
    }

    /// Get the currently applied value of a preference.
    #[must_use]
    pub fn preference(&self, name: &str) -> Option<&str> {
        self.preferences.get(name).map(String::as_str)
    }

    /// Iterate over the currently applied preferences in name order.
    pub fn preferences(&self) -> impl Iterator<Item = (&str, &str)> {
        self.preferences
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Apply preferences until the returned guard is dropped.
    pub fn apply(&mut self, preferences: &PreferenceSet) -> PreferenceScope<'_> {
        let saved = preferences
            .iter()
            .map(|pref| {
                let previous = self
                    .preferences
                    .insert(pref.name().to_string(), pref.value().to_string());
                (pref.name().to_string(), previous)
            })
            .collect();

        PreferenceScope {
            context: self,
            saved,
        }
    }
}

impl Drop for MachineContext {
    fn drop(&mut self) {
        debug!(machine = ?self.machine, "closed machine context");
    }
}

/// Guard restoring the preferences a backend applied to a context.
#[derive(Debug)]
pub struct PreferenceScope<'a> {
    context: &'a mut MachineContext,
    saved: Vec<(String, Option<String>)>,
}

impl Deref for PreferenceScope<'_> {
    type Target = MachineContext;

    fn deref(&self) -> &MachineContext {
        self.context
    }
}

impl Drop for PreferenceScope<'_> {
    fn drop(&mut self) {
        for (name, previous) in self.saved.drain(..).rev() {
            match previous {
                Some(value) => {
                    self.context.preferences.insert(name, value);
                }
                None => {
                    self.context.preferences.remove(&name);
                }
            }
        }
        trace!("restored machine context preferences");
    }
}

/// An external decision procedure able to decide predicates.
///
/// One engine value is created at startup and passed to every call needing
/// engine access. Implementations dispatch on the backend kind.
pub trait DecisionEngine: Send + Sync {
    /// Open the evaluation context of a machine.
    ///
    /// # Errors
    ///
    /// Returns `Error::MachineAccess` if the machine cannot be loaded
    fn open_machine(&self, machine: Option<&Path>) -> Result<MachineContext> {
        MachineContext::open(machine)
    }

    /// Decide a predicate with the given backend kind.
    ///
    /// Dropping the returned future must abandon the engine invocation.
    fn decide(
        &self,
        kind: BackendKind,
        predicate: &str,
        context: &MachineContext,
    ) -> impl Future<Output = Result<Answer>> + Send;
}

/// Command line launching the engine of one backend kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineCommand {
    program: String,
    args: Vec<String>,
}

impl EngineCommand {
    /// Create a command from a program and its fixed arguments.
    #[must_use]
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Parse a whitespace separated command line.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the line is empty
    pub fn parse(line: &str) -> Result<Self> {
        let mut words = line.split_whitespace().map(str::to_string);
        let program = words
            .next()
            .ok_or_else(|| Error::Config("empty engine command".to_string()))?;
        Ok(Self::new(program, words.collect()))
    }

    /// Get the program.
    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Get the fixed arguments.
    #[must_use]
    pub fn args(&self) -> &[String] {
        &self.args
    }
}

/// Engine running one external process per backend call.
///
/// The process is invoked as
/// `<program> <args...> [--machine <path>] --backend <KIND> [--pref K=V]...`
/// with the predicate on stdin. Children are killed when the call is
/// cancelled.
#[derive(Debug, Clone, Default)]
pub struct ProcessEngine {
    commands: HashMap<BackendKind, EngineCommand>,
}

impl ProcessEngine {
    /// Create an engine without any configured backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the command used for a backend kind.
    #[must_use]
    pub fn with_command(mut self, kind: BackendKind, command: EngineCommand) -> Self {
        self.commands.insert(kind, command);
        self
    }

    /// Build an engine from the configured commands.
    #[must_use]
    pub fn from_config(config: &crate::config::EngineConfig) -> Self {
        config
            .commands()
            .fold(Self::new(), |engine, (kind, command)| {
                engine.with_command(kind, command.clone())
            })
    }

    /// Check whether a backend kind has a command.
    #[must_use]
    pub fn supports(&self, kind: BackendKind) -> bool {
        self.commands.contains_key(&kind)
    }

    async fn run(
        &self,
        kind: BackendKind,
        predicate: &str,
        context: &MachineContext,
    ) -> Result<Answer> {
        let command = self
            .commands
            .get(&kind)
            .ok_or_else(|| Error::Engine(format!("no command configured for {kind}")))?;

        let mut cmd = tokio::process::Command::new(command.program());
        cmd.args(command.args());
        if let Some(machine) = context.machine() {
            cmd.arg("--machine").arg(machine);
        }
        cmd.arg("--backend").arg(kind.keyword());
        for (name, value) in context.preferences() {
            cmd.arg("--pref").arg(format!("{name}={value}"));
        }
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd
            .spawn()
            .map_err(|e| Error::Engine(format!("cannot start {}: {e}", command.program())))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(predicate.as_bytes()).await?;
            stdin.shutdown().await?;
        }

        let output = child.wait_with_output().await?;
        if !output.status.success() {
            return Err(Error::Engine(format!(
                "{} exited with {}: {}",
                command.program(),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        Ok(Answer::classify(&String::from_utf8_lossy(&output.stdout)))
    }
}

impl DecisionEngine for ProcessEngine {
    fn decide(
        &self,
        kind: BackendKind,
        predicate: &str,
        context: &MachineContext,
    ) -> impl Future<Output = Result<Answer>> + Send {
        self.run(kind, predicate, context)
    }
}
