//! The record validator — accept/reject decisions per normalized record.
//!
//! Rejection is an ordinary data value, not an error: one bad record never
//! aborts a batch, and the orchestrator aggregates rejections by reason.
//! Validation runs strictly before any storage write, which is what makes
//! per-record recovery safe (contrast with the loader, where a failure
//! aborts the whole transaction).

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::record::{NormalizedRecord, ProductRecord};

// ─── Rejection ───────────────────────────────────────────────────────────────

/// Why a record was dropped from the batch.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize,
  Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
  /// `product_id`, `name`, or `url` was missing or empty after cleaning.
  MissingRequiredField,
  /// A present `price` or `avg_rating` lay outside its declared range.
  OutOfRange,
}

impl fmt::Display for RejectReason {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::MissingRequiredField => write!(f, "missing_required_field"),
      Self::OutOfRange => write!(f, "out_of_range"),
    }
  }
}

/// A per-record rejection, retained for aggregate reporting.
#[derive(Debug, Clone, Serialize)]
pub struct Rejection {
  /// The record's natural key, when it survived normalization.
  pub product_id: Option<String>,
  pub reason:     RejectReason,
  /// The field that triggered the rejection.
  pub field:      &'static str,
}

/// Outcome of validating one normalized record.
#[derive(Debug, Clone)]
pub enum Validation {
  Accepted(ProductRecord),
  Rejected(Rejection),
}

// ─── Validator ───────────────────────────────────────────────────────────────

/// Check required-field and range invariants on a normalized record.
///
/// Required: `product_id`, `name`, `url` non-empty after cleaning.
/// Ranges: `price ≥ 0` and `avg_rating ∈ [0, 5]` when present. The
/// normalizer already guarantees both for values it produced; the checks
/// guard records constructed by other callers.
pub fn validate(record: NormalizedRecord) -> Validation {
  let NormalizedRecord {
    product_id,
    name,
    category,
    company,
    description,
    price,
    url,
    reviews_count,
    avg_rating,
  } = record;

  let Some(product_id) = product_id else {
    return missing(None, "product_id");
  };
  let Some(name) = name else {
    return missing(Some(product_id), "name");
  };
  let Some(url) = url else {
    return missing(Some(product_id), "url");
  };

  if price.is_some_and(|p| p < 0.0) {
    return out_of_range(product_id, "price");
  }
  if avg_rating.is_some_and(|r| !(0.0..=5.0).contains(&r)) {
    return out_of_range(product_id, "avg_rating");
  }

  Validation::Accepted(ProductRecord {
    product_id,
    name,
    category,
    company,
    description,
    price,
    url,
    reviews_count,
    avg_rating,
  })
}

fn missing(product_id: Option<String>, field: &'static str) -> Validation {
  Validation::Rejected(Rejection {
    product_id,
    reason: RejectReason::MissingRequiredField,
    field,
  })
}

fn out_of_range(product_id: String, field: &'static str) -> Validation {
  Validation::Rejected(Rejection {
    product_id: Some(product_id),
    reason: RejectReason::OutOfRange,
    field,
  })
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use super::*;

  fn complete() -> NormalizedRecord {
    NormalizedRecord {
      product_id: Some("B0001".into()),
      name: Some("Widget".into()),
      url: Some("https://example.com/widget".into()),
      category: Some("Electronics".into()),
      price: Some(19.99),
      reviews_count: 12,
      avg_rating: Some(4.0),
      ..Default::default()
    }
  }

  #[test]
  fn complete_record_is_accepted() {
    let Validation::Accepted(record) = validate(complete()) else {
      panic!("expected acceptance");
    };
    assert_eq!(record.product_id, "B0001");
    assert_eq!(record.price, Some(19.99));
  }

  #[test]
  fn missing_url_is_rejected() {
    let record = NormalizedRecord { url: None, ..complete() };
    let Validation::Rejected(rejection) = validate(record) else {
      panic!("expected rejection");
    };
    assert_eq!(rejection.reason, RejectReason::MissingRequiredField);
    assert_eq!(rejection.field, "url");
    assert_eq!(rejection.product_id.as_deref(), Some("B0001"));
  }

  #[test]
  fn missing_product_id_is_rejected_without_key() {
    let record = NormalizedRecord { product_id: None, ..complete() };
    let Validation::Rejected(rejection) = validate(record) else {
      panic!("expected rejection");
    };
    assert_eq!(rejection.reason, RejectReason::MissingRequiredField);
    assert!(rejection.product_id.is_none());
  }

  #[test]
  fn negative_price_is_out_of_range() {
    let record = NormalizedRecord { price: Some(-1.0), ..complete() };
    let Validation::Rejected(rejection) = validate(record) else {
      panic!("expected rejection");
    };
    assert_eq!(rejection.reason, RejectReason::OutOfRange);
    assert_eq!(rejection.field, "price");
  }

  #[test]
  fn rating_above_five_is_out_of_range() {
    let record = NormalizedRecord { avg_rating: Some(5.5), ..complete() };
    let Validation::Rejected(rejection) = validate(record) else {
      panic!("expected rejection");
    };
    assert_eq!(rejection.reason, RejectReason::OutOfRange);
  }

  #[test]
  fn absent_optionals_are_fine() {
    let record = NormalizedRecord {
      category: None,
      price: None,
      avg_rating: None,
      ..complete()
    };
    assert!(matches!(validate(record), Validation::Accepted(_)));
  }

  #[test]
  fn reject_reason_display_matches_wire_form() {
    assert_eq!(
      RejectReason::MissingRequiredField.to_string(),
      "missing_required_field"
    );
    assert_eq!(RejectReason::OutOfRange.to_string(), "out_of_range");
  }
}
