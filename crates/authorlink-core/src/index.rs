//! In-memory author store with multi-key blocking indices.
//!
//! The index is the arena that owns every [`AuthorProfile`]; all other
//! structures refer to profiles by id. Five dictionaries are maintained over
//! the live profile set:
//!
//! - `by_id` — primary store
//! - `by_orcid` — unique secondary key
//! - `by_surname` — normalized surname token -> ordered author ids
//! - `by_surname_initial` — (surname, first given initial) -> ordered ids
//! - `by_affiliation` — normalized institution -> ordered ids
//!
//! All maps are `BTreeMap`s and all posting lists stay sorted by id, so
//! blocking output is deterministic (a requirement the trace's byte-level
//! reproducibility rests on).

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use tracing::trace;

use crate::compare::MentionView;
use crate::error::ContradictionError;
use crate::normalize;
use crate::types::{AuthorProfile, ProfileDelta};

/// Result of blocking one mention: candidate ids plus the keys that
/// produced them (reported in the trace).
#[derive(Debug, Clone, PartialEq)]
pub struct BlockResult {
    /// Deduplicated candidate ids, sorted lexicographically.
    pub candidates: Vec<String>,
    /// Blocking keys probed, in probe order.
    pub keys: Vec<String>,
}

/// The author store.
#[derive(Debug, Default)]
pub struct AuthorIndex {
    by_id: BTreeMap<String, AuthorProfile>,
    by_orcid: BTreeMap<String, String>,
    by_surname: BTreeMap<String, Vec<String>>,
    by_surname_initial: BTreeMap<String, Vec<String>>,
    by_affiliation: BTreeMap<String, Vec<String>>,
}

impl AuthorIndex {
    /// An empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live profiles. Profiles are never deleted during a run, so
    /// this is non-decreasing (P6).
    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    /// Whether the index holds no profiles.
    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    /// Look up a profile by id.
    pub fn get(&self, id: &str) -> Option<&AuthorProfile> {
        self.by_id.get(id)
    }

    /// Look up a profile by ORCID.
    pub fn find_by_orcid(&self, orcid: &str) -> Option<&AuthorProfile> {
        self.by_orcid.get(orcid).and_then(|id| self.by_id.get(id))
    }

    /// Iterate profiles in id order.
    pub fn profiles(&self) -> impl Iterator<Item = &AuthorProfile> {
        self.by_id.values()
    }

    /// Number of distinct ORCIDs bound to profiles.
    pub fn orcid_count(&self) -> usize {
        self.by_orcid.len()
    }

    /// Insert a new profile, indexing every blocking key.
    ///
    /// Fails with [`ContradictionError::DuplicateAuthorId`] when the id is
    /// taken, and [`ContradictionError::DuplicateOrcid`] when the profile
    /// carries an ORCID already bound to another profile — the latter is the
    /// data contradiction that aborts a run.
    pub fn insert(&mut self, profile: AuthorProfile) -> Result<(), ContradictionError> {
        if self.by_id.contains_key(&profile.author_id) {
            return Err(ContradictionError::DuplicateAuthorId(
                profile.author_id.clone(),
            ));
        }
        if let Some(orcid) = &profile.orcid {
            if let Some(existing_id) = self.by_orcid.get(orcid) {
                return Err(ContradictionError::DuplicateOrcid {
                    orcid: orcid.clone(),
                    existing_id: existing_id.clone(),
                });
            }
        }

        let id = profile.author_id.clone();
        if let Some(orcid) = &profile.orcid {
            self.by_orcid.insert(orcid.clone(), id.clone());
        }
        self.index_name(&profile.canonical_name, &id);
        for alias in &profile.aliases {
            self.index_name(alias, &id);
        }
        for affiliation in &profile.affiliations {
            self.index_affiliation(affiliation, &id);
        }
        trace!(author_id = %id, "profile inserted");
        self.by_id.insert(id, profile);
        Ok(())
    }

    /// Merge a delta into an existing profile and refresh the blocking
    /// indices for any newly added aliases and affiliations.
    ///
    /// `canonical_name` and `orcid` are structurally immutable here: the
    /// delta type carries neither.
    pub fn update(&mut self, id: &str, delta: ProfileDelta, now: DateTime<Utc>) {
        let (new_aliases, new_affiliations) = {
            let Some(profile) = self.by_id.get(id) else {
                return;
            };
            let aliases: Vec<String> = delta
                .aliases
                .iter()
                .filter(|a| !profile.aliases.contains(*a))
                .cloned()
                .collect();
            let affiliations: Vec<String> = delta
                .affiliations
                .iter()
                .filter(|a| !profile.affiliations.contains(*a))
                .cloned()
                .collect();
            (aliases, affiliations)
        };

        for alias in &new_aliases {
            self.index_name(alias, id);
        }
        for affiliation in &new_affiliations {
            self.index_affiliation(affiliation, id);
        }
        if let Some(profile) = self.by_id.get_mut(id) {
            profile.apply(delta, now);
        }
    }

    /// Produce the candidate set for a mention: union of the ORCID probe,
    /// the surname posting, the surname+initial posting, and one posting per
    /// affiliation; deduplicated and sorted by id.
    ///
    /// An empty result short-circuits the engine straight to a NEW decision.
    pub fn block(&self, mention: &MentionView) -> BlockResult {
        let mut candidates: BTreeSet<String> = BTreeSet::new();
        let mut keys: Vec<String> = Vec::new();

        if let Some(orcid) = &mention.orcid {
            keys.push(format!("orcid:{orcid}"));
            if let Some(id) = self.by_orcid.get(orcid) {
                candidates.insert(id.clone());
            }
        }

        if let Some(surname) = normalize::surname(&mention.name) {
            keys.push(format!("surname:{surname}"));
            if let Some(ids) = self.by_surname.get(&surname) {
                candidates.extend(ids.iter().cloned());
            }
            if let Some(projection) = normalize::surname_initial_projection(&mention.name) {
                if projection != surname {
                    keys.push(format!("surname_initial:{projection}"));
                    if let Some(ids) = self.by_surname_initial.get(&projection) {
                        candidates.extend(ids.iter().cloned());
                    }
                }
            }
        }

        for affiliation in &mention.affiliations {
            let norm = normalize::normalize_text(affiliation);
            if norm.is_empty() {
                continue;
            }
            keys.push(format!("affiliation:{norm}"));
            if let Some(ids) = self.by_affiliation.get(&norm) {
                candidates.extend(ids.iter().cloned());
            }
        }

        BlockResult {
            candidates: candidates.into_iter().collect(),
            keys,
        }
    }

    /// Surname+initial projections of a profile's coauthors, resolved
    /// through the index. Ids that no longer resolve (possible only within
    /// an ingest batch) are skipped.
    pub fn coauthor_projections(&self, profile: &AuthorProfile) -> BTreeSet<String> {
        profile
            .coauthor_ids
            .iter()
            .filter_map(|id| self.by_id.get(id))
            .filter_map(|p| normalize::surname_initial_projection(&p.canonical_name))
            .collect()
    }

    fn index_name(&mut self, name: &str, id: &str) {
        if let Some(surname) = normalize::surname(name) {
            push_sorted(self.by_surname.entry(surname).or_default(), id);
        }
        if let Some(projection) = normalize::surname_initial_projection(name) {
            push_sorted(self.by_surname_initial.entry(projection).or_default(), id);
        }
    }

    fn index_affiliation(&mut self, affiliation: &str, id: &str) {
        let norm = normalize::normalize_text(affiliation);
        if !norm.is_empty() {
            push_sorted(self.by_affiliation.entry(norm).or_default(), id);
        }
    }
}

/// Insert `id` into a sorted posting list, keeping it sorted and free of
/// duplicates.
fn push_sorted(list: &mut Vec<String>, id: &str) {
    if let Err(pos) = list.binary_search_by(|existing| existing.as_str().cmp(id)) {
        list.insert(pos, id.to_string());
    }
}
