//! [`SqliteStore`] — the SQLite implementation of [`ProductStore`].

use std::collections::HashSet;
use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension as _, Transaction};
use tracing::{debug, info, warn};

use stockfeed_core::{
  resolve::{NameSet, ResolvedNames, partition_new},
  store::{
    Category, Company, IntegrityReport, LoadBatch, LoadStage, LoadSummary,
    MetricSnapshot, Product, ProductStore,
  },
};

use crate::{
  Error, Result,
  encode::{RawMetric, RawProduct, encode_date, encode_dt},
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Stockfeed product store backed by a single SQLite file.
///
/// Cloning is cheap — the inner connection is reference-counted. One
/// connection carries at most one batch transaction at a time, which is
/// the unit of mutual exclusion for this store.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store — useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

// ─── ProductStore impl ───────────────────────────────────────────────────────

impl ProductStore for SqliteStore {
  type Error = Error;

  async fn load_batch(&self, batch: LoadBatch) -> Result<LoadSummary> {
    let batch_size = batch.records.len();
    let now = Utc::now();

    let staged: std::result::Result<LoadSummary, StageFailure> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        match stage_batch(&tx, &batch, now) {
          Ok(summary) => match tx.commit() {
            Ok(()) => Ok(Ok(summary)),
            Err(e) => {
              Ok(Err(StageFailure::new(LoadStage::Commit, e.to_string())))
            }
          },
          // Dropping the open transaction rolls the whole batch back.
          Err(failure) => Ok(Err(failure)),
        }
      })
      .await?;

    match staged {
      Ok(summary) => {
        info!(
          products = summary.products,
          metrics = summary.metrics,
          categories_created = summary.categories_created,
          companies_created = summary.companies_created,
          "batch committed"
        );
        Ok(summary)
      }
      Err(failure) => {
        warn!(
          stage = %failure.stage,
          batch_size,
          "batch rolled back: {}",
          failure.message
        );
        Err(Error::BatchFailed {
          stage: failure.stage,
          batch_size,
          message: failure.message,
        })
      }
    }
  }

  async fn get_product(&self, product_id: &str) -> Result<Option<Product>> {
    let id = product_id.to_owned();

    let raw: Option<RawProduct> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT product_id, name, category_id, company_id,
                      description, price, url, created_at, updated_at
               FROM products WHERE product_id = ?1",
              rusqlite::params![id],
              |row| {
                Ok(RawProduct {
                  product_id:  row.get(0)?,
                  name:        row.get(1)?,
                  category_id: row.get(2)?,
                  company_id:  row.get(3)?,
                  description: row.get(4)?,
                  price:       row.get(5)?,
                  url:         row.get(6)?,
                  created_at:  row.get(7)?,
                  updated_at:  row.get(8)?,
                })
              },
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawProduct::into_product).transpose()
  }

  async fn list_categories(&self) -> Result<Vec<Category>> {
    self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(
          "SELECT category_id, category_name
           FROM categories ORDER BY category_name",
        )?;
        let rows = stmt
          .query_map([], |row| {
            Ok(Category { category_id: row.get(0)?, name: row.get(1)? })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await
      .map_err(Error::from)
  }

  async fn list_companies(&self) -> Result<Vec<Company>> {
    self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(
          "SELECT company_id, company_name, company_industry
           FROM companies ORDER BY company_name",
        )?;
        let rows = stmt
          .query_map([], |row| {
            Ok(Company {
              company_id: row.get(0)?,
              name:       row.get(1)?,
              industry:   row.get(2)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await
      .map_err(Error::from)
  }

  async fn metrics_for(&self, product_id: &str) -> Result<Vec<MetricSnapshot>> {
    let id = product_id.to_owned();

    let raws: Vec<RawMetric> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT product_id, snapshot_date, reviews_count,
                  avg_rating, is_featured
           FROM product_metrics
           WHERE product_id = ?1
           ORDER BY snapshot_date",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![id], |row| {
            Ok(RawMetric {
              product_id:    row.get(0)?,
              snapshot_date: row.get(1)?,
              reviews_count: row.get(2)?,
              avg_rating:    row.get(3)?,
              is_featured:   row.get(4)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawMetric::into_snapshot).collect()
  }

  async fn integrity_report(&self) -> Result<IntegrityReport> {
    self
      .conn
      .call(|conn| {
        let report = conn.query_row(
          "SELECT
             (SELECT COUNT(*) FROM categories),
             (SELECT COUNT(*) FROM companies),
             (SELECT COUNT(*) FROM products),
             (SELECT COUNT(*) FROM product_metrics),
             (SELECT COUNT(*) FROM product_metrics pm
                LEFT JOIN products p ON p.product_id = pm.product_id
                WHERE p.product_id IS NULL),
             (SELECT COUNT(*) FROM products pr
                LEFT JOIN categories c ON c.category_id = pr.category_id
                WHERE pr.category_id IS NOT NULL AND c.category_id IS NULL),
             (SELECT COUNT(*) FROM products pr
                LEFT JOIN companies co ON co.company_id = pr.company_id
                WHERE pr.company_id IS NOT NULL AND co.company_id IS NULL)",
          [],
          |row| {
            Ok(IntegrityReport {
              categories:             row.get::<_, i64>(0)? as usize,
              companies:              row.get::<_, i64>(1)? as usize,
              products:               row.get::<_, i64>(2)? as usize,
              metrics:                row.get::<_, i64>(3)? as usize,
              orphan_metrics:         row.get::<_, i64>(4)? as usize,
              dangling_category_refs: row.get::<_, i64>(5)? as usize,
              dangling_company_refs:  row.get::<_, i64>(6)? as usize,
            })
          },
        )?;
        Ok(report)
      })
      .await
      .map_err(Error::from)
  }
}

// ─── Batch staging ───────────────────────────────────────────────────────────

/// A stage-tagged failure inside the batch transaction. Carried as a value
/// out of the connection closure; converted to [`Error::BatchFailed`] once
/// the batch size is back in scope.
#[derive(Debug)]
pub(crate) struct StageFailure {
  stage:   LoadStage,
  message: String,
}

impl StageFailure {
  fn new(stage: LoadStage, message: impl Into<String>) -> Self {
    Self { stage, message: message.into() }
  }
}

pub(crate) type StageResult<T> = std::result::Result<T, StageFailure>;

/// Run every stage of the batch against an open transaction. Ordering is
/// fixed: references first (products need their ids), then products
/// (metrics need the product rows), then metrics.
fn stage_batch(
  tx: &Transaction<'_>,
  batch: &LoadBatch,
  now: DateTime<Utc>,
) -> StageResult<LoadSummary> {
  let (categories, categories_created) = resolve_references(
    tx,
    Reference::Category,
    batch.records.iter().filter_map(|r| r.category.as_deref()),
  )?;
  let (companies, companies_created) = resolve_references(
    tx,
    Reference::Company,
    batch.records.iter().filter_map(|r| r.company.as_deref()),
  )?;

  let products = upsert_products(tx, batch, &categories, &companies, now)?;
  let metrics = upsert_metrics(tx, batch)?;

  Ok(LoadSummary { products, metrics, categories_created, companies_created })
}

// ─── Reference resolution ────────────────────────────────────────────────────

#[derive(Clone, Copy)]
pub(crate) enum Reference {
  Category,
  Company,
}

impl Reference {
  fn label(self) -> &'static str {
    match self {
      Self::Category => "category",
      Self::Company => "company",
    }
  }

  fn select_all_sql(self) -> &'static str {
    match self {
      Self::Category => "SELECT category_name, category_id FROM categories",
      Self::Company => "SELECT company_name, company_id FROM companies",
    }
  }

  fn insert_sql(self) -> &'static str {
    match self {
      Self::Category => {
        "INSERT INTO categories (category_name) VALUES (?1)"
      }
      Self::Company => "INSERT INTO companies (company_name) VALUES (?1)",
    }
  }

  fn select_one_sql(self) -> &'static str {
    match self {
      Self::Category => {
        "SELECT category_id FROM categories WHERE category_name = ?1"
      }
      Self::Company => {
        "SELECT company_id FROM companies WHERE company_name = ?1"
      }
    }
  }
}

/// Resolve every distinct reference name in the batch to a surrogate id:
/// snapshot the persisted rows, then insert the names not yet known.
/// Returns the full mapping plus the number of rows newly created.
fn resolve_references<'a>(
  tx: &Transaction<'_>,
  kind: Reference,
  names: impl Iterator<Item = &'a str>,
) -> StageResult<(ResolvedNames, usize)> {
  let fail =
    |e: rusqlite::Error| StageFailure::new(LoadStage::References, e.to_string());

  let set = NameSet::collect(names);

  let mut stmt = tx.prepare(kind.select_all_sql()).map_err(fail)?;
  let persisted = stmt
    .query_map([], |row| {
      Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
    })
    .map_err(fail)?
    .collect::<rusqlite::Result<Vec<_>>>()
    .map_err(fail)?;
  let mut resolved = ResolvedNames::from_persisted(persisted);

  let mut created = 0;
  for name in partition_new(&set, &resolved) {
    let (id, inserted) = insert_or_refetch(tx, kind, name)?;
    resolved.insert(name, id);
    if inserted {
      created += 1;
      debug!(kind = kind.label(), name, id, "reference created");
    }
  }

  Ok((resolved, created))
}

/// Insert a new reference row, adopting the existing id if a concurrent
/// batch created the name first. One retry; if the re-read also fails the
/// batch aborts.
pub(crate) fn insert_or_refetch(
  tx: &Transaction<'_>,
  kind: Reference,
  name: &str,
) -> StageResult<(i64, bool)> {
  match tx.execute(kind.insert_sql(), rusqlite::params![name]) {
    Ok(_) => Ok((tx.last_insert_rowid(), true)),
    Err(e) if is_unique_violation(&e) => {
      let id = tx
        .query_row(kind.select_one_sql(), rusqlite::params![name], |row| {
          row.get(0)
        })
        .map_err(|e| {
          StageFailure::new(
            LoadStage::References,
            format!(
              "{} {name:?} missing after uniqueness conflict: {e}",
              kind.label()
            ),
          )
        })?;
      Ok((id, false))
    }
    Err(e) => Err(StageFailure::new(LoadStage::References, e.to_string())),
  }
}

fn is_unique_violation(e: &rusqlite::Error) -> bool {
  matches!(
    e,
    rusqlite::Error::SqliteFailure(f, _)
      if f.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
  )
}

// ─── Products ────────────────────────────────────────────────────────────────

const UPSERT_PRODUCT: &str = "
  INSERT INTO products (product_id, name, category_id, company_id,
                        description, price, url, created_at, updated_at)
  VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)
  ON CONFLICT(product_id) DO UPDATE SET
    name        = excluded.name,
    category_id = excluded.category_id,
    company_id  = excluded.company_id,
    description = excluded.description,
    price       = excluded.price,
    url         = excluded.url,
    updated_at  = excluded.updated_at";

fn upsert_products(
  tx: &Transaction<'_>,
  batch: &LoadBatch,
  categories: &ResolvedNames,
  companies: &ResolvedNames,
  now: DateTime<Utc>,
) -> StageResult<usize> {
  let fail =
    |e: rusqlite::Error| StageFailure::new(LoadStage::Products, e.to_string());

  let now_str = encode_dt(now);
  let mut stmt = tx.prepare(UPSERT_PRODUCT).map_err(fail)?;

  // A batch may carry the same product_id more than once (last one wins);
  // the summary counts rows, not executions.
  let mut ids = HashSet::new();
  for record in &batch.records {
    ids.insert(record.product_id.as_str());
    let category_id =
      reference_id(categories, record.category.as_deref(), Reference::Category)?;
    let company_id =
      reference_id(companies, record.company.as_deref(), Reference::Company)?;

    stmt
      .execute(rusqlite::params![
        record.product_id,
        record.name,
        category_id,
        company_id,
        record.description,
        record.price,
        record.url,
        now_str,
      ])
      .map_err(fail)?;
  }

  Ok(ids.len())
}

/// Look up the surrogate id for a record's reference name. Every name was
/// collected from the same records in the resolution stage, so a miss here
/// is a fatal inconsistency, not a recoverable condition.
fn reference_id(
  resolved: &ResolvedNames,
  name: Option<&str>,
  kind: Reference,
) -> StageResult<Option<i64>> {
  match name {
    None => Ok(None),
    Some(name) => resolved.get(name).map(Some).ok_or_else(|| {
      StageFailure::new(
        LoadStage::Products,
        format!("unresolved {} name: {name:?}", kind.label()),
      )
    }),
  }
}

// ─── Metrics ─────────────────────────────────────────────────────────────────

const UPSERT_METRIC: &str = "
  INSERT INTO product_metrics (product_id, snapshot_date, reviews_count,
                               avg_rating, is_featured)
  VALUES (?1, ?2, ?3, ?4, ?5)
  ON CONFLICT(product_id, snapshot_date) DO UPDATE SET
    reviews_count = excluded.reviews_count,
    avg_rating    = excluded.avg_rating,
    is_featured   = excluded.is_featured";

fn upsert_metrics(tx: &Transaction<'_>, batch: &LoadBatch) -> StageResult<usize> {
  let fail =
    |e: rusqlite::Error| StageFailure::new(LoadStage::Metrics, e.to_string());

  let date_str = encode_date(batch.snapshot_date);
  let mut stmt = tx.prepare(UPSERT_METRIC).map_err(fail)?;

  let mut ids = HashSet::new();
  for record in &batch.records {
    ids.insert(record.product_id.as_str());
    stmt
      .execute(rusqlite::params![
        record.product_id,
        date_str,
        record.reviews_count,
        record.avg_rating,
        batch.featured.is_featured(record),
      ])
      .map_err(fail)?;
  }

  Ok(ids.len())
}
