//! SQLite backend for the Stockfeed product store.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated
//! thread without blocking the async runtime. The batch loader runs one
//! transaction per batch; the uniqueness constraints in the schema, not
//! application sequencing, are the final arbiter for concurrent batches.

mod encode;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::SqliteStore;

#[cfg(test)]
mod tests;
