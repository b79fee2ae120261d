//! Encoding and decoding helpers between Rust domain types and the
//! plain-text representations stored in SQLite columns.
//!
//! Timestamps are stored as RFC 3339 strings, snapshot dates as
//! `YYYY-MM-DD` (which sorts chronologically as text).

use chrono::{DateTime, NaiveDate, Utc};
use stockfeed_core::store::{MetricSnapshot, Product};

use crate::{Error, Result};

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── NaiveDate ───────────────────────────────────────────────────────────────

pub fn encode_date(date: NaiveDate) -> String {
  date.format("%Y-%m-%d").to_string()
}

pub fn decode_date(s: &str) -> Result<NaiveDate> {
  NaiveDate::parse_from_str(s, "%Y-%m-%d")
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw values read directly from a `products` row.
pub struct RawProduct {
  pub product_id:  String,
  pub name:        String,
  pub category_id: Option<i64>,
  pub company_id:  Option<i64>,
  pub description: Option<String>,
  pub price:       Option<f64>,
  pub url:         String,
  pub created_at:  String,
  pub updated_at:  String,
}

impl RawProduct {
  pub fn into_product(self) -> Result<Product> {
    Ok(Product {
      product_id:  self.product_id,
      name:        self.name,
      category_id: self.category_id,
      company_id:  self.company_id,
      description: self.description,
      price:       self.price,
      url:         self.url,
      created_at:  decode_dt(&self.created_at)?,
      updated_at:  decode_dt(&self.updated_at)?,
    })
  }
}

/// Raw values read directly from a `product_metrics` row.
pub struct RawMetric {
  pub product_id:    String,
  pub snapshot_date: String,
  pub reviews_count: i64,
  pub avg_rating:    Option<f64>,
  pub is_featured:   bool,
}

impl RawMetric {
  pub fn into_snapshot(self) -> Result<MetricSnapshot> {
    Ok(MetricSnapshot {
      product_id:    self.product_id,
      snapshot_date: decode_date(&self.snapshot_date)?,
      reviews_count: self.reviews_count,
      avg_rating:    self.avg_rating,
      is_featured:   self.is_featured,
    })
  }
}
