//! HTTP access to the Hacker News Firebase API.
//!
//! [`HnClient`] implements [`ItemSource`](hnsync_core::source::ItemSource) over
//! the REST endpoints; [`UpdateStream`] follows the `updates` endpoint as a
//! server-sent event stream and reconnects when it drops.

mod client;
mod feed;
mod sse;

pub mod error;

pub use client::{ClientConfig, DEFAULT_BASE_URL, HnClient};
pub use error::{Error, Result};
pub use feed::{FeedConfig, StreamHandle, UpdateStream};
pub use sse::{SseEvent, SseParser};
