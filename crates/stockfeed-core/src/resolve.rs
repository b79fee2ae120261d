//! The in-batch half of the reference resolver.
//!
//! Category and company names are deduplicated case-insensitively within a
//! batch and reconciled against a snapshot of already-persisted names. The
//! storage backend performs the inserts; on a uniqueness race with a
//! concurrent batch it re-reads the winner's id. Here everything is pure
//! and deterministic: first appearance in the batch fixes both the stored
//! spelling and the insertion order.

use std::collections::{HashMap, HashSet};

/// The case-folded key under which names are compared and resolved.
///
/// Names are expected to be cleaned already (see
/// [`clean_text`](crate::normalize::clean_text)); folding adds only the
/// case-insensitivity the uniqueness constraint applies.
pub fn fold_name(name: &str) -> String { name.trim().to_lowercase() }

// ─── NameSet ─────────────────────────────────────────────────────────────────

/// The distinct reference names appearing in one batch, in order of first
/// appearance. `"Electronics "` and `"electronics"` collapse to a single
/// entry spelled the way it first appeared (trimmed).
#[derive(Debug, Default)]
pub struct NameSet {
  names: Vec<String>,
  seen:  HashSet<String>,
}

impl NameSet {
  /// Collect the distinct names from `iter`, preserving first-appearance
  /// order under case-insensitive equality.
  pub fn collect<'a>(iter: impl IntoIterator<Item = &'a str>) -> Self {
    let mut set = Self::default();
    for name in iter {
      let trimmed = name.trim();
      if trimmed.is_empty() {
        continue;
      }
      if set.seen.insert(fold_name(trimmed)) {
        set.names.push(trimmed.to_owned());
      }
    }
    set
  }

  /// Distinct names in first-appearance order.
  pub fn names(&self) -> &[String] { &self.names }

  pub fn is_empty(&self) -> bool { self.names.is_empty() }

  pub fn len(&self) -> usize { self.names.len() }
}

// ─── ResolvedNames ───────────────────────────────────────────────────────────

/// A mapping from case-folded reference name to its surrogate identifier.
///
/// Starts as a snapshot of persisted rows and grows as the loader inserts
/// the batch's new names.
#[derive(Debug, Default)]
pub struct ResolvedNames {
  ids: HashMap<String, i64>,
}

impl ResolvedNames {
  /// Build the snapshot from persisted `(name, id)` rows.
  pub fn from_persisted(
    rows: impl IntoIterator<Item = (String, i64)>,
  ) -> Self {
    let ids = rows
      .into_iter()
      .map(|(name, id)| (fold_name(&name), id))
      .collect();
    Self { ids }
  }

  /// Look up a name, folding it first.
  pub fn get(&self, name: &str) -> Option<i64> {
    self.ids.get(&fold_name(name)).copied()
  }

  pub fn insert(&mut self, name: &str, id: i64) {
    self.ids.insert(fold_name(name), id);
  }
}

/// The batch names not yet present in `resolved`, in first-appearance
/// order — the rows the loader must insert.
pub fn partition_new<'a>(
  set: &'a NameSet,
  resolved: &ResolvedNames,
) -> Vec<&'a str> {
  set
    .names()
    .iter()
    .map(String::as_str)
    .filter(|name| resolved.get(name).is_none())
    .collect()
}

// ─── Tests ───────────────────────────────────────────────────────────────────
