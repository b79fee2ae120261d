//! The batch orchestrator: normalize → validate → resolve → load.
//!
//! [`Pipeline`] sequences the pure transform stages from
//! [`stockfeed_core`] over one batch of raw records, hands the accepted
//! records to any [`ProductStore`] in a single transactional load, and
//! aggregates per-record outcomes into a [`BatchResult`].
//!
//! A run is a success exactly when the storage commit succeeded. Rejected
//! records never fail a run — they are counted and broken down by reason —
//! and a batch with zero accepted records is a successful no-op load.

pub mod result;

use chrono::{NaiveDate, Utc};
use tracing::{debug, info, warn};

use stockfeed_core::{
  normalize::normalize,
  record::RawRecord,
  store::{FeaturedRule, LoadBatch, ProductStore, StoreError as _},
  validate::{Validation, validate},
};

pub use result::{BatchFailure, BatchResult};

// ─── Configuration ───────────────────────────────────────────────────────────

/// Parameters for one pipeline instance. Passed explicitly; there is no
/// process-wide configuration.
#[derive(Debug, Clone, Copy, Default)]
pub struct PipelineConfig {
  /// Date under which metric snapshots are recorded. Defaults to today at
  /// the time of each `run_batch` call; fix it for reproducible re-runs.
  pub snapshot_date: Option<NaiveDate>,
  pub featured:      FeaturedRule,
}

// ─── Pipeline ────────────────────────────────────────────────────────────────

/// The batch pipeline over a storage backend `S`.
pub struct Pipeline<S> {
  store:  S,
  config: PipelineConfig,
}

impl<S: ProductStore> Pipeline<S> {
  pub fn new(store: S) -> Self {
    Self::with_config(store, PipelineConfig::default())
  }

  pub fn with_config(store: S, config: PipelineConfig) -> Self {
    Self { store, config }
  }

  pub fn store(&self) -> &S { &self.store }

  /// Push one batch of raw records through the pipeline.
  ///
  /// Records are consumed exactly once. Validation rejections are counted
  /// per reason and dropped before any storage write; the surviving
  /// records are loaded in one all-or-nothing transaction. The returned
  /// [`BatchResult`] never panics or errors — load failure is reported in
  /// its `error` field.
  pub async fn run_batch(
    &self,
    records: impl IntoIterator<Item = RawRecord>,
  ) -> BatchResult {
    let mut outcome = BatchResult::default();
    let mut accepted = Vec::new();

    for raw in records {
      outcome.extracted += 1;
      match validate(normalize(&raw)) {
        Validation::Accepted(record) => accepted.push(record),
        Validation::Rejected(rejection) => {
          debug!(
            product_id = rejection.product_id.as_deref().unwrap_or("<none>"),
            field = rejection.field,
            reason = %rejection.reason,
            "record rejected"
          );
          outcome.rejected += 1;
          *outcome
            .rejection_reasons
            .entry(rejection.reason)
            .or_insert(0) += 1;
        }
      }
    }
    outcome.accepted = accepted.len();

    if accepted.is_empty() {
      info!(extracted = outcome.extracted, "no accepted records, nothing to load");
      return outcome;
    }

    let batch = LoadBatch {
      records:       accepted,
      snapshot_date: self
        .config
        .snapshot_date
        .unwrap_or_else(|| Utc::now().date_naive()),
      featured:      self.config.featured,
    };
    let batch_size = batch.records.len();

    match self.store.load_batch(batch).await {
      Ok(summary) => {
        outcome.loaded = summary.products;
        info!(
          extracted = outcome.extracted,
          accepted = outcome.accepted,
          rejected = outcome.rejected,
          loaded = outcome.loaded,
          categories_created = summary.categories_created,
          companies_created = summary.companies_created,
          "batch run complete"
        );
      }
      Err(e) => {
        warn!(batch_size, "batch load failed: {e}");
        outcome.error = Some(BatchFailure {
          stage: e.failed_stage(),
          batch_size,
          message: e.to_string(),
        });
      }
    }

    outcome
  }
}
