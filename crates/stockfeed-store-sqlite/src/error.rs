//! Error type for `stockfeed-store-sqlite`.

use thiserror::Error;

use stockfeed_core::store::{LoadStage, StoreError};

#[derive(Debug, Error)]
pub enum Error {
  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  /// A batch load aborted and was rolled back; nothing from the batch is
  /// visible in the store.
  #[error("batch of {batch_size} records failed at {stage} stage: {message}")]
  BatchFailed {
    stage:      LoadStage,
    batch_size: usize,
    message:    String,
  },

  #[error("date/time parse error: {0}")]
  DateParse(String),
}

impl StoreError for Error {
  fn failed_stage(&self) -> Option<LoadStage> {
    match self {
      Self::BatchFailed { stage, .. } => Some(*stage),
      _ => None,
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
