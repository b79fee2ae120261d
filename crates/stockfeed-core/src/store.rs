//! The `ProductStore` trait and the persisted-entity types.
//!
//! The trait is implemented by storage backends (e.g.
//! `stockfeed-store-sqlite`). The orchestrator depends on this abstraction,
//! not on any concrete backend. Reads exist for the analytics side and for
//! verifying integrity after loads; the single write operation is
//! [`ProductStore::load_batch`], which is transactional: either every row
//! for every record in the batch becomes visible, or none do.

use std::fmt;
use std::future::Future;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::record::ProductRecord;

// ─── Persisted entities ──────────────────────────────────────────────────────

/// A reference row with a surrogate id; never deleted by the core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
  pub category_id: i64,
  pub name:        String,
}

/// A reference row with a surrogate id; `industry` is carried in the schema
/// but not populated by this pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Company {
  pub company_id: i64,
  pub name:       String,
  pub industry:   Option<String>,
}

/// A persisted product. `product_id` is the natural key and never changes;
/// every other non-timestamp field is mutable on re-ingestion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
  pub product_id:  String,
  pub name:        String,
  pub category_id: Option<i64>,
  pub company_id:  Option<i64>,
  pub description: Option<String>,
  pub price:       Option<f64>,
  pub url:         String,
  pub created_at:  DateTime<Utc>,
  pub updated_at:  DateTime<Utc>,
}

/// A dated observation of mutable product metrics. Unique per
/// `(product_id, snapshot_date)`; same-date re-ingestion overwrites, a new
/// date appends history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricSnapshot {
  pub product_id:    String,
  pub snapshot_date: NaiveDate,
  pub reviews_count: i64,
  pub avg_rating:    Option<f64>,
  pub is_featured:   bool,
}

// ─── Load inputs ─────────────────────────────────────────────────────────────

/// Threshold rule deciding whether a snapshot marks the product featured.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FeaturedRule {
  pub min_rating:  f64,
  pub min_reviews: i64,
}

impl Default for FeaturedRule {
  fn default() -> Self { Self { min_rating: 4.5, min_reviews: 100 } }
}

impl FeaturedRule {
  pub fn is_featured(&self, record: &ProductRecord) -> bool {
    record.avg_rating.is_some_and(|r| r >= self.min_rating)
      && record.reviews_count >= self.min_reviews
  }
}

/// One transactional unit of accepted records plus the load parameters
/// scoped to this invocation (no process-wide configuration).
#[derive(Debug, Clone)]
pub struct LoadBatch {
  pub records:       Vec<ProductRecord>,
  /// The date under which metric snapshots are recorded.
  pub snapshot_date: NaiveDate,
  pub featured:      FeaturedRule,
}

/// Row counts from a committed batch.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct LoadSummary {
  /// Product rows upserted — one per distinct `product_id` in the batch.
  pub products:           usize,
  /// Metric snapshot rows upserted — one per distinct `product_id`.
  pub metrics:            usize,
  /// Reference rows newly created (not pre-existing ones reused).
  pub categories_created: usize,
  pub companies_created:  usize,
}

// ─── Failure context ─────────────────────────────────────────────────────────

/// The stage of the batch transaction at which a load failed.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum LoadStage {
  /// Category/company resolution and insertion.
  References,
  Products,
  Metrics,
  Commit,
}

impl fmt::Display for LoadStage {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::References => write!(f, "references"),
      Self::Products => write!(f, "products"),
      Self::Metrics => write!(f, "metrics"),
      Self::Commit => write!(f, "commit"),
    }
  }
}

/// Errors produced by a [`ProductStore`] backend.
///
/// The only extra obligation over `std::error::Error` is reporting which
/// stage a failed batch load died in, so the orchestrator can surface it
/// to callers implementing a retry-the-whole-batch policy.
pub trait StoreError: std::error::Error + Send + Sync + 'static {
  /// The stage at which a batch load was rolled back, if this error
  /// aborted a load.
  fn failed_stage(&self) -> Option<LoadStage> { None }
}

// ─── Integrity report ────────────────────────────────────────────────────────

/// Post-load verification counts over the persisted relations. After any
/// successful commit every `orphan`/`dangling` figure must be zero.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct IntegrityReport {
  pub categories:             usize,
  pub companies:              usize,
  pub products:               usize,
  pub metrics:                usize,
  /// Metric rows whose product no longer exists.
  pub orphan_metrics:         usize,
  /// Products pointing at a missing category row.
  pub dangling_category_refs: usize,
  /// Products pointing at a missing company row.
  pub dangling_company_refs:  usize,
}

impl IntegrityReport {
  pub fn is_clean(&self) -> bool {
    self.orphan_metrics == 0
      && self.dangling_category_refs == 0
      && self.dangling_company_refs == 0
  }
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over a Stockfeed storage backend.
///
/// All methods return `Send` futures so the trait can be used from
/// multi-threaded async runtimes.
pub trait ProductStore: Send + Sync {
  type Error: StoreError;

  // ── Write ─────────────────────────────────────────────────────────────

  /// Atomically persist one batch: resolve and upsert reference rows,
  /// upsert products keyed by `product_id`, then upsert metric snapshots
  /// keyed by `(product_id, snapshot_date)`.
  ///
  /// On failure the store is left exactly as it was before the call; the
  /// error reports the failing stage via [`StoreError::failed_stage`].
  fn load_batch(
    &self,
    batch: LoadBatch,
  ) -> impl Future<Output = Result<LoadSummary, Self::Error>> + Send + '_;

  // ── Reads ─────────────────────────────────────────────────────────────

  /// Fetch a product by natural key. Returns `None` if not persisted.
  fn get_product<'a>(
    &'a self,
    product_id: &'a str,
  ) -> impl Future<Output = Result<Option<Product>, Self::Error>> + Send + 'a;

  /// All categories, ordered by name.
  fn list_categories(
    &self,
  ) -> impl Future<Output = Result<Vec<Category>, Self::Error>> + Send + '_;

  /// All companies, ordered by name.
  fn list_companies(
    &self,
  ) -> impl Future<Output = Result<Vec<Company>, Self::Error>> + Send + '_;

  /// Metric history for a product, ordered by snapshot date.
  fn metrics_for<'a>(
    &'a self,
    product_id: &'a str,
  ) -> impl Future<Output = Result<Vec<MetricSnapshot>, Self::Error>> + Send + 'a;

  /// Row counts and referential-integrity figures for the whole store.
  fn integrity_report(
    &self,
  ) -> impl Future<Output = Result<IntegrityReport, Self::Error>> + Send + '_;
}
