//! Clients for the upstream feeds and the outbound HTTP plumbing they share.

pub mod client;
pub mod feeds;
pub mod user_agent;
