//! Aggregated outcome of one batch run.

use std::collections::BTreeMap;

use serde::Serialize;

use stockfeed_core::{store::LoadStage, validate::RejectReason};

/// Context for a failed storage load, sized for an external
/// retry-the-whole-batch policy: which stage died, how many records were
/// in flight, and the underlying cause.
#[derive(Debug, Clone, Serialize)]
pub struct BatchFailure {
  /// Stage of the load transaction that failed, when the backend knows it.
  pub stage:      Option<LoadStage>,
  /// Number of accepted records handed to the loader.
  pub batch_size: usize,
  pub message:    String,
}

/// Per-record and per-batch counts for one `run_batch` invocation.
///
/// `loaded` is all-or-nothing: after a successful commit it is the number
/// of product rows written (equal to `accepted` unless the batch repeated
/// a `product_id`), and `0` after a rollback. Success and "some records
/// were imperfect" are deliberately not conflated — a run with rejections
/// and a clean commit is a success.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchResult {
  /// Records delivered by the source reader.
  pub extracted:         usize,
  /// Records that passed normalization and validation.
  pub accepted:          usize,
  /// Records dropped by the validator, before any storage write.
  pub rejected:          usize,
  /// Rejection counts keyed by reason.
  pub rejection_reasons: BTreeMap<RejectReason, usize>,
  /// Product rows written by the run; `0` on rollback or an empty batch.
  pub loaded:            usize,
  /// Set exactly when the storage commit did not succeed.
  pub error:             Option<BatchFailure>,
}

impl BatchResult {
  /// Whether the run as a whole succeeded: the storage commit went
  /// through (or there was nothing to load).
  pub fn is_success(&self) -> bool { self.error.is_none() }
}
