//! Record types at the three stages of the transform: raw, normalized,
//! and accepted.
//!
//! A record's shape narrows as it moves through the pipeline: everything in
//! a [`RawRecord`] is optional text, a [`NormalizedRecord`] has typed but
//! still-unchecked fields, and a [`ProductRecord`] has passed validation
//! and is ready for the resolver and loader.

use serde::{Deserialize, Serialize};

/// One loosely-typed listing as delivered by the source reader.
///
/// Every field is optional raw text; no invariants hold. Unknown keys in a
/// serialized form are ignored, missing keys deserialize to `None`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RawRecord {
  pub product_id:    Option<String>,
  pub name:          Option<String>,
  pub category:      Option<String>,
  pub company:       Option<String>,
  pub description:   Option<String>,
  /// Raw price text, e.g. `"$1,234.56"` or `"$10.00 - $20.00"`.
  pub price:         Option<String>,
  pub url:           Option<String>,
  /// Raw count text, e.g. `"1,234 reviews"` or `"1.2K"`.
  pub reviews_count: Option<String>,
  /// Raw rating text, e.g. `"4.5 out of 5 stars"`.
  pub avg_rating:    Option<String>,
}

/// A [`RawRecord`] after field normalization: text cleaned, numerics
/// parsed, fallbacks applied. Required-field and range checks have not yet
/// run — that is the validator's job.
#[derive(Debug, Clone, Default)]
pub struct NormalizedRecord {
  pub product_id:    Option<String>,
  pub name:          Option<String>,
  pub category:      Option<String>,
  pub company:       Option<String>,
  pub description:   Option<String>,
  /// `None` means "price unknown", never "free".
  pub price:         Option<f64>,
  pub url:           Option<String>,
  /// Absence of review text is a meaningful zero, not an unknown.
  pub reviews_count: i64,
  pub avg_rating:    Option<f64>,
}

/// An accepted, fully-typed record — the unit handed to the resolver and
/// the transactional loader.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductRecord {
  /// Natural key; immutable once first persisted.
  pub product_id:    String,
  pub name:          String,
  pub category:      Option<String>,
  pub company:       Option<String>,
  pub description:   Option<String>,
  pub price:         Option<f64>,
  pub url:           String,
  pub reviews_count: i64,
  pub avg_rating:    Option<f64>,
}
