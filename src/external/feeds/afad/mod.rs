//! JSON REST feed.

mod client;
mod types;

pub use client::{AfadFeed, parse_batch};
