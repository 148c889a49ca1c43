//! Domain value types.
//!
//! Ownership follows the arena pattern: the index owns profiles, the
//! deduplicator owns publications, publications own their mentions. All
//! cross-references are ids, never pointers, which rules out reference
//! cycles by construction.

mod author;
mod decision;
mod publication;
mod raw;

pub use author::{AuthorProfile, ProfileDelta};
pub use decision::{Decision, DecisionOutcome, FeatureScore, ScoreBreakdown};
pub use publication::{AuthorMention, Publication};
pub use raw::RawMentionRecord;
