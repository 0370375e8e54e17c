//! Seismic feed adapters.
//!
//! - [`afad`]: JSON REST endpoint
//! - [`kandilli`]: legacy `<pre>` text table in windows-1254

pub mod afad;
pub mod kandilli;
mod provider;

pub use afad::AfadFeed;
pub use kandilli::KandilliFeed;
pub use provider::{FeedBatch, FeedProvider, FeedQuery};
