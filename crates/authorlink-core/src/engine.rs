//! The three-way decision engine.
//!
//! For each admitted publication the engine stages one decision per mention
//! (blocking, candidate scoring, dual-threshold verdict) against a frozen
//! view of the index, then commits the whole publication at once: profile
//! creation, merge deltas, within-publication co-authorship wiring. A
//! publication therefore contributes either zero or all of its decisions —
//! a fatal error during staging or commit leaves nothing half-applied.
//!
//! All iteration orders here are stable: candidates arrive sorted from the
//! index, the best candidate is chosen by (score desc, id asc), and author
//! ids are assigned in mention-position order.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::compare::{self, MentionView};
use crate::config::RunConfig;
use crate::dedup::{DedupOutcome, Deduplicator, DuplicateReason};
use crate::error::{ContradictionError, EngineError};
use crate::index::AuthorIndex;
use crate::normalize;
use crate::score::Scorer;
use crate::types::{
    AuthorProfile, Decision, DecisionOutcome, ProfileDelta, Publication, ScoreBreakdown,
};

/// What happened to one submitted publication.
#[derive(Debug)]
pub enum PublicationOutcome {
    /// The publication was admitted; one decision per mention, in position
    /// order.
    Admitted(Vec<DecisionOutcome>),
    /// The publication duplicates an already-admitted one; nothing changed.
    Duplicate {
        /// Id of the admitted publication.
        existing_id: String,
        /// Which dedup check fired.
        reason: DuplicateReason,
    },
}

/// Running decision tallies, reported in the manifest.
#[derive(Debug, Default, Clone, Copy, serde::Serialize)]
pub struct DecisionCounts {
    /// MERGE decisions committed.
    pub merge: usize,
    /// NEW decisions committed.
    pub new: usize,
    /// UNKNOWN decisions routed to review.
    pub unknown: usize,
}

/// One staged (not yet committed) mention decision.
struct StagedDecision {
    mention_index: usize,
    decision: Decision,
    best_author_id: Option<String>,
    breakdown: Option<ScoreBreakdown>,
    candidate_count: usize,
    blocking_keys: Vec<String>,
}

/// The decision engine. Owns the index and the deduplicator; single-writer
/// by construction (the pipeline commits publications serially on one lane).
pub struct DecisionEngine {
    index: AuthorIndex,
    dedup: Deduplicator,
    scorer: Scorer,
    accept_threshold: f64,
    reject_threshold: f64,
    counts: DecisionCounts,
    duplicate_count: usize,
    next_author_seq: u64,
    clock_base: DateTime<Utc>,
    clock_ticks: i64,
}

impl DecisionEngine {
    /// Build an engine from a validated run config and a scorer.
    pub fn new(config: &RunConfig, scorer: Scorer, clock_base: DateTime<Utc>) -> Self {
        Self {
            index: AuthorIndex::new(),
            dedup: Deduplicator::new(config.title_threshold),
            scorer,
            accept_threshold: config.accept_threshold,
            reject_threshold: config.reject_threshold,
            counts: DecisionCounts::default(),
            duplicate_count: 0,
            next_author_seq: 0,
            clock_base,
            clock_ticks: 0,
        }
    }

    /// Read access to the author store.
    pub fn index(&self) -> &AuthorIndex {
        &self.index
    }

    /// Decision tallies so far.
    pub fn counts(&self) -> DecisionCounts {
        self.counts
    }

    /// Publications rejected as duplicates so far.
    pub fn duplicate_count(&self) -> usize {
        self.duplicate_count
    }

    /// Process one publication: dedup gate, stage all mention decisions,
    /// then commit atomically.
    pub fn submit(&mut self, publication: &Publication) -> Result<PublicationOutcome, EngineError> {
        match self.dedup.check(publication) {
            DedupOutcome::Duplicate {
                existing_id,
                reason,
                ..
            } => {
                debug!(
                    publication_id = %publication.publication_id,
                    existing = %existing_id,
                    ?reason,
                    "publication rejected as duplicate"
                );
                self.duplicate_count += 1;
                Ok(PublicationOutcome::Duplicate { existing_id, reason })
            }
            DedupOutcome::Admit => {
                let staged = self.stage(publication)?;
                let outcomes = self.commit(publication, staged)?;
                self.dedup.admit(publication);
                Ok(PublicationOutcome::Admitted(outcomes))
            }
        }
    }

    /// Stage a decision for every mention against the current index. No
    /// mutation happens here; mentions of the same publication do not see
    /// each other's (not yet existing) profiles.
    fn stage(&self, publication: &Publication) -> Result<Vec<StagedDecision>, EngineError> {
        let mut staged = Vec::with_capacity(publication.mentions.len());
        for (mention_index, mention) in publication.mentions.iter().enumerate() {
            let view = self.mention_view(publication, mention_index);
            let block = self.index.block(&view);

            if block.candidates.is_empty() {
                staged.push(StagedDecision {
                    mention_index,
                    decision: Decision::New,
                    best_author_id: None,
                    breakdown: None,
                    candidate_count: 0,
                    blocking_keys: block.keys,
                });
                continue;
            }

            // Candidates arrive sorted by id; strict `>` keeps the first
            // (lowest id) on score ties.
            let mut best: Option<(String, ScoreBreakdown)> = None;
            for candidate_id in &block.candidates {
                let profile = self
                    .index
                    .get(candidate_id)
                    .expect("blocking returned an id the index does not hold");
                let coauthor_keys = self.index.coauthor_projections(profile);
                let vector = compare::compare(&view, profile, &coauthor_keys);
                let breakdown = self.scorer.score(&vector).map_err(EngineError::from)?;
                let better = match &best {
                    None => true,
                    Some((_, current)) => breakdown.total > current.total,
                };
                if better {
                    best = Some((candidate_id.clone(), breakdown));
                }
            }
            let (best_id, breakdown) =
                best.expect("non-empty candidate set always yields a best");

            let decision = if breakdown.total >= self.accept_threshold {
                Decision::Merge
            } else if breakdown.total <= self.reject_threshold {
                Decision::New
            } else {
                Decision::Unknown
            };
            debug!(
                mention = %mention.mention_id,
                best = %best_id,
                score = breakdown.total,
                decision = decision.as_str(),
                "mention staged"
            );

            staged.push(StagedDecision {
                mention_index,
                decision,
                best_author_id: Some(best_id),
                breakdown: Some(breakdown),
                candidate_count: block.candidates.len(),
                blocking_keys: block.keys,
            });
        }
        Ok(staged)
    }

    /// Commit all staged decisions for one publication.
    fn commit(
        &mut self,
        publication: &Publication,
        staged: Vec<StagedDecision>,
    ) -> Result<Vec<DecisionOutcome>, EngineError> {
        // ORCID contradiction check before any mutation: a NEW decision must
        // not bind an ORCID that is already bound, in the index or within
        // this publication's own batch.
        let mut batch_orcids: BTreeSet<&str> = BTreeSet::new();
        for decision in &staged {
            if decision.decision != Decision::New {
                continue;
            }
            let mention = &publication.mentions[decision.mention_index];
            if let Some(orcid) = &mention.orcid {
                if let Some(existing) = self.index.find_by_orcid(orcid) {
                    return Err(ContradictionError::DuplicateOrcid {
                        orcid: orcid.clone(),
                        existing_id: existing.author_id.clone(),
                    }
                    .into());
                }
                if !batch_orcids.insert(orcid) {
                    return Err(ContradictionError::DuplicateOrcid {
                        orcid: orcid.clone(),
                        existing_id: publication.publication_id.clone(),
                    }
                    .into());
                }
            }
        }

        let now = self.tick();
        let mut outcomes = Vec::with_capacity(staged.len());
        // Resolved (mention_index, author_id) pairs for coauthor wiring.
        let mut resolved: BTreeMap<usize, String> = BTreeMap::new();

        for decision in &staged {
            let mention = &publication.mentions[decision.mention_index];
            let assigned = match decision.decision {
                Decision::Merge => {
                    let target = decision
                        .best_author_id
                        .clone()
                        .expect("merge always has a best candidate");
                    let mut delta = ProfileDelta::default();
                    delta.aliases.insert(mention.name.clone());
                    delta.affiliations.extend(mention.affiliations.iter().cloned());
                    delta
                        .publication_ids
                        .insert(publication.publication_id.clone());
                    if let Some(journal) = &publication.journal {
                        delta.journals.insert(journal.clone());
                    }
                    self.index.update(&target, delta, now);
                    self.counts.merge += 1;
                    Some(target)
                }
                Decision::New => {
                    let id = self.next_author_id();
                    let mut profile = AuthorProfile::new(id.clone(), mention.name.clone(), now);
                    profile.orcid = mention.orcid.clone();
                    profile.affiliations = mention.affiliations.clone();
                    profile
                        .publication_ids
                        .insert(publication.publication_id.clone());
                    if let Some(journal) = &publication.journal {
                        profile.journals.insert(journal.clone());
                    }
                    self.index.insert(profile)?;
                    self.counts.new += 1;
                    Some(id)
                }
                Decision::Unknown => {
                    self.counts.unknown += 1;
                    None
                }
            };

            if let Some(id) = &assigned {
                resolved.insert(decision.mention_index, id.clone());
            }
            outcomes.push(DecisionOutcome {
                mention_id: mention.mention_id.clone(),
                publication_id: publication.publication_id.clone(),
                position: mention.position,
                decision: decision.decision,
                best_author_id: decision.best_author_id.clone(),
                assigned_author_id: assigned,
                breakdown: decision.breakdown.clone().unwrap_or_else(ScoreBreakdown::empty),
                candidate_count: decision.candidate_count,
                blocking_keys: decision.blocking_keys.clone(),
            });
        }

        // Wire within-publication co-authorship between every pair of
        // resolved mentions (MERGE and NEW alike), self-links excluded.
        let ids: Vec<&String> = resolved.values().collect();
        for id in &ids {
            let peers: BTreeSet<String> = ids
                .iter()
                .filter(|other| **other != *id)
                .map(|s| (*s).clone())
                .collect();
            if peers.is_empty() {
                continue;
            }
            let mut delta = ProfileDelta::default();
            delta.coauthor_ids = peers;
            self.index.update(id, delta, now);
        }

        Ok(outcomes)
    }

    /// Prepare the comparison-side view of one mention: name, validated
    /// ORCID, co-mention surname+initial projections, the publication's
    /// journal, and the mention's affiliations.
    fn mention_view(&self, publication: &Publication, mention_index: usize) -> MentionView {
        let mention = &publication.mentions[mention_index];
        let coauthor_keys: BTreeSet<String> = publication
            .co_mention_names(mention.position)
            .iter()
            .filter_map(|name| normalize::surname_initial_projection(name))
            .collect();
        let journals: BTreeSet<String> = publication.journal.iter().cloned().collect();
        MentionView {
            name: mention.name.clone(),
            orcid: mention.orcid.clone(),
            coauthor_keys,
            journals,
            affiliations: mention.affiliations.clone(),
        }
    }

    fn next_author_id(&mut self) -> String {
        self.next_author_seq += 1;
        format!("au_{:06}", self.next_author_seq)
    }

    /// Advance the engine's deterministic clock by one second per
    /// publication commit.
    fn tick(&mut self) -> DateTime<Utc> {
        self.clock_ticks += 1;
        self.clock_base + chrono::Duration::seconds(self.clock_ticks)
    }
}
