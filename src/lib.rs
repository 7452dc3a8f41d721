//! # predicate-db: Predicate Training Databases
//!
//! predicate-db records, for every predicate of a specification, how several
//! decision backends perform against it (decided or not, and how fast), and
//! maintains the resulting training databases on disk.
//!
//! ## Design Principles (Toyota Way Aligned)
//!
//! - **Jidoka**: Corrupt records and files are isolated, counted and logged;
//!   only infrastructure failures stop a run
//! - **Heijunka**: Bounded worker pools level the load across database files
//! - **Poka-Yoke**: Machine contexts and preference changes are scoped guards,
//!   restored on every exit path
//! - **Genchi Genbutsu**: Aggregate statistics are computed from the files
//!   themselves, never from cached metadata
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use predicate_db::migration::PredicateDbMigration;
//! use predicate_db::storage::{JsonFormat, LegacyFormat};
//!
//! let migration = PredicateDbMigration::new(LegacyFormat::new()).with_workers(4);
//! let stats = migration.migrate("db/legacy", "db/json", &JsonFormat::new())?;
//! println!("{stats}");
//! # Ok::<(), predicate_db::Error>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod analysis;
pub mod backend;
pub mod config;
pub mod error;
pub mod generation;
pub mod migration;
pub mod storage;

pub use error::{Error, Result};

/// Build a bounded rayon pool; `0` workers means one per available core
///
/// # Errors
///
/// Returns `Error::Config` if the pool cannot be created
pub(crate) fn worker_pool(workers: usize) -> Result<rayon::ThreadPool> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .build()
        .map_err(|e| Error::Config(format!("cannot build worker pool: {e}")))
}
