//! Core types and trait definitions for the hnsync ingester.
//!
//! This crate is deliberately free of HTTP and database dependencies.
//! The source client, the SQLite sink and the pipeline all depend on it.

pub mod error;
pub mod feed;
pub mod ids;
pub mod item;
pub mod sink;
pub mod source;
pub mod update;
pub mod user;

pub use error::{Error, FetchError, Result};
pub use ids::IdSelection;
pub use item::{Item, ItemId, ItemKind, KidEdge};
pub use update::UpdateNotice;
pub use user::User;
