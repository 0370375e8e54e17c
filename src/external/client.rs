use std::sync::LazyLock;
use std::time::Duration;

use super::user_agent::random_user_agent;

/// Shared HTTP client for the feeds and the messaging channel.
///
/// Initialized on first access. The 30s timeout is only an upper bound;
/// each caller sets its own configured timeout per request.
///
/// # Example
/// ```ignore
/// use crate::external::client::HTTP_CLIENT;
///
/// let body = HTTP_CLIENT
///     .get(url)
///     .timeout(Duration::from_secs(config.timeout_seconds))
///     .send()
///     .await?
///     .error_for_status()?
///     .bytes()
///     .await?;
/// ```
pub static HTTP_CLIENT: LazyLock<reqwest::Client> = LazyLock::new(|| {
    reqwest::Client::builder()
        // Timeouts
        .timeout(Duration::from_secs(30))
        .connect_timeout(Duration::from_secs(10))
        // Connection pooling
        .pool_max_idle_per_host(4)
        .pool_idle_timeout(Duration::from_secs(90))
        // The legacy feed only speaks HTTP/1.1 over plain http
        .https_only(false)
        .gzip(true)
        .deflate(true)
        .brotli(true)
        .zstd(true)
        .cookie_store(true)
        .user_agent(random_user_agent())
        .build()
        .expect("Failed to build HTTP client")
});
