//! Reconciliation of a local package mirror against its indexes.
//!
//! A run goes through four stages, each in its own module:
//!
//! 1. [`catalog`]: index files found under dist roots ([`discover`]) are
//!    parsed into the cache, skipping those unchanged since the last run.
//! 2. [`pool`]: the pool is listed (from a fresh walk or a trusted earlier
//!    one, see [`marker`]) or left to on-demand lookups.
//! 3. [`reconcile`]: the missing set (expected but absent or the wrong size)
//!    and the excess set (present but referenced by no catalog).
//! 4. [`plan`]: the missing set is split across download jobs, and the
//!    excess set gets a cleanup script.

pub mod catalog;
pub mod discover;
pub mod error;
pub mod marker;
pub mod plan;
pub mod pool;
pub mod reconcile;

pub use crate::catalog::{CatalogBuilder, IngestOutcome, IngestStats, Skip};
pub use crate::marker::PoolMarker;
pub use crate::plan::{Job, Planner, partition};
pub use crate::pool::{PoolIndex, PoolScanner, PoolSource};
pub use crate::reconcile::{Excess, Missing, find_excess, find_missing};
