//! SQLite sink for the hnsync ingester.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime.

mod encode;
mod schema;
mod sink;

pub mod error;

pub use error::{Error, Result};
pub use sink::SqliteSink;
