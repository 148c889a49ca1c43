//! Incremental author name disambiguation.
//!
//! As publications stream in, every author mention is either merged into an
//! existing profile, instantiated as a new one, or routed to a human-review
//! queue. The decision engine scores (mention, candidate) pairs with one of
//! two backends — a weighted baseline and Fellegi-Sunter log-likelihood
//! ratios — behind a dual-threshold three-way policy, and every decision is
//! logged to a deterministic, name-redacted JSONL trace.
//!
//! # Architecture
//!
//! This crate defines:
//! - Domain types ([`types::AuthorProfile`], [`types::Publication`],
//!   [`types::AuthorMention`]) and the arena-style [`index::AuthorIndex`]
//! - The [`dedup::Deduplicator`] DOI/title gate
//! - Per-feature [`compare`] comparators and the two-backend [`score::Scorer`]
//! - The three-way [`engine::DecisionEngine`]
//! - The redacted [`trace`] log, review queue, and run manifest
//! - The ORCID gold-set [`eval`]uator (B³ and pairwise F1)
//! - The [`pipeline`] orchestrator: bounded worker pool, one decision lane
//!
//! # Determinism
//!
//! Identical input, configuration, and seed reproduce a byte-identical
//! trace: every map is ordered, ids and timestamps derive from the run
//! configuration, and decisions are committed serially in ingest order.
//!
//! # Example
//!
//! ```
//! use authorlink_core::config::{Mode, RunConfig};
//!
//! let config = RunConfig::for_mode(Mode::Baseline);
//! assert!(config.validate().is_ok());
//! assert_eq!(config.accept_threshold, 0.90);
//! ```

pub mod compare;
pub mod config;
pub mod dedup;
pub mod engine;
pub mod error;
pub mod eval;
pub mod index;
pub mod ingest;
pub mod normalize;
pub mod pipeline;
pub mod score;
pub mod trace;
pub mod types;

pub use config::{Mode, RunConfig};
pub use error::{ConfigError, ContradictionError, CoreResult, DataQualityError, EngineError};
pub use pipeline::{run, OutputPaths, RunArtifacts};
