//! DuckDB query engine for WebSQL
//!
//! DuckDB is an in-process analytical database. Imported files become
//! ordinary DuckDB tables; CSV and Parquet go through its native readers.

mod engine;
#[cfg(test)]
mod engine_tests;

pub use engine::*;
