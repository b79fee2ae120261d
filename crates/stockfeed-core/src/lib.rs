//! Core types and pure transform stages for the Stockfeed product ETL.
//!
//! This crate is deliberately free of database dependencies. It holds the
//! record types, the field normalizer, the record validator, the in-batch
//! half of the reference resolver, and the [`store::ProductStore`] trait
//! that storage backends implement.
//!
//! Nothing in this crate can fail: malformed input maps to documented
//! defaults in the normalizer, and validation outcomes are ordinary data
//! values (`Accepted` / `Rejected`), not errors.

pub mod normalize;
pub mod record;
pub mod resolve;
pub mod store;
pub mod validate;
