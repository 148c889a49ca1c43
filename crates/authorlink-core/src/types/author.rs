//! Persistent author profiles.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A persistent author identity aggregating many mentions.
///
/// Invariants enforced by the index:
/// - `author_id` is unique and never changes;
/// - a set `orcid` is globally unique across the index;
/// - `canonical_name` is non-empty and frozen at creation (a later mention
///   judged "more canonical" never renames the profile);
/// - `coauthor_ids` never contains the profile's own id.
///
/// Collections are `BTreeSet`s so every serialization of a profile is
/// deterministic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorProfile {
    /// Opaque stable identifier, assigned at creation.
    pub author_id: String,
    /// Name of the first mention that created the profile.
    pub canonical_name: String,
    /// Validated ORCID, if any mention supplied one.
    pub orcid: Option<String>,
    /// Surface forms seen for this author, canonical name included.
    pub aliases: BTreeSet<String>,
    /// Institution strings, as supplied by mentions.
    pub affiliations: BTreeSet<String>,
    /// Ids of co-author profiles, resolved through the index.
    pub coauthor_ids: BTreeSet<String>,
    /// Journal titles this author has published in.
    pub journals: BTreeSet<String>,
    /// Ids of publications this author appears on.
    pub publication_ids: BTreeSet<String>,
    /// Creation instant (run-deterministic clock).
    pub created_at: DateTime<Utc>,
    /// Last mutation instant.
    pub updated_at: DateTime<Utc>,
}

impl AuthorProfile {
    /// A fresh profile with empty collections, alias set seeded with the
    /// canonical name.
    pub fn new(author_id: String, canonical_name: String, now: DateTime<Utc>) -> Self {
        let mut aliases = BTreeSet::new();
        aliases.insert(canonical_name.clone());
        Self {
            author_id,
            canonical_name,
            orcid: None,
            aliases,
            affiliations: BTreeSet::new(),
            coauthor_ids: BTreeSet::new(),
            journals: BTreeSet::new(),
            publication_ids: BTreeSet::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Apply a merge delta: union every set, refresh `updated_at`. The
    /// canonical name and ORCID are deliberately untouchable through this
    /// path.
    pub fn apply(&mut self, delta: ProfileDelta, now: DateTime<Utc>) {
        self.aliases.extend(delta.aliases);
        self.affiliations.extend(delta.affiliations);
        self.journals.extend(delta.journals);
        self.publication_ids.extend(delta.publication_ids);
        for id in delta.coauthor_ids {
            if id != self.author_id {
                self.coauthor_ids.insert(id);
            }
        }
        self.updated_at = now;
    }
}

/// Profiles are equal when their ids are equal.
impl PartialEq for AuthorProfile {
    fn eq(&self, other: &Self) -> bool {
        self.author_id == other.author_id
    }
}

impl Eq for AuthorProfile {}

/// Set-union payload for a MERGE. There is no field for `canonical_name` or
/// `orcid`: an update cannot change either.
#[derive(Debug, Clone, Default)]
pub struct ProfileDelta {
    /// Surface forms to add.
    pub aliases: BTreeSet<String>,
    /// Institutions to add.
    pub affiliations: BTreeSet<String>,
    /// Coauthor profile ids to add (self-links are filtered on apply).
    pub coauthor_ids: BTreeSet<String>,
    /// Journals to add.
    pub journals: BTreeSet<String>,
    /// Publication ids to add.
    pub publication_ids: BTreeSet<String>,
}
