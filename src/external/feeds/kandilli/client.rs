use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use encoding_rs::WINDOWS_1254;
use jiff::tz::Offset;

use super::parser::parse_page;
use crate::config::KandilliFeedConfig;
use crate::error::{AppError, AppResult};
use crate::external::client::HTTP_CLIENT;
use crate::external::feeds::provider::{FeedBatch, FeedProvider, FeedQuery};
use crate::external::user_agent::random_user_agent;
use crate::models::FeedSource;

const FEED: &str = "kandilli";

/// Legacy HTML table feed client.
///
/// The page is served in windows-1254 and only answers requests that look
/// like they come from a browser.
pub struct KandilliFeed {
    config: KandilliFeedConfig,
    naive_offset: Offset,
}

impl KandilliFeed {
    pub fn new(config: KandilliFeedConfig) -> AppResult<Self> {
        let naive_offset = Offset::from_hours(config.naive_offset_hours).map_err(|e| {
            AppError::Validation {
                field: "feeds.kandilli.naive_offset_hours".to_string(),
                reason: e.to_string(),
            }
        })?;
        Ok(Self {
            config,
            naive_offset,
        })
    }

    fn network_error(message: impl Into<String>, source: Option<anyhow::Error>) -> AppError {
        AppError::Network {
            feed: FEED.into(),
            message: message.into(),
            source,
        }
    }

    async fn get_page(&self) -> AppResult<String> {
        let resp = HTTP_CLIENT
            .get(&self.config.url)
            .header("User-Agent", random_user_agent())
            .header("Accept", "text/html,application/xhtml+xml,application/xml")
            .header("Accept-Language", "tr-TR,tr;q=0.9,en-US;q=0.8,en;q=0.7")
            .header("Cache-Control", "max-age=0")
            .timeout(Duration::from_secs(self.config.timeout_seconds))
            .send()
            .await
            .map_err(|e| Self::network_error(format!("request failed: {}", e), Some(e.into())))?
            .error_for_status()
            .map_err(|e| Self::network_error(format!("HTTP error: {}", e), Some(e.into())))?;

        let bytes = resp.bytes().await.map_err(|e| {
            Self::network_error(format!("reading body failed: {}", e), Some(e.into()))
        })?;

        Ok(decode_page(&bytes))
    }

    async fn dump_page(&self, page: &str) {
        let Some(path) = self.config.debug_dump_path.as_deref() else {
            return;
        };

        if let Err(e) = write_dump(Path::new(path), page).await {
            tracing::warn!(feed = FEED, path, error = %e, "Failed to write debug dump");
        } else {
            tracing::info!(feed = FEED, path, "Wrote unparsable page to debug dump");
        }
    }
}

#[async_trait]
impl FeedProvider for KandilliFeed {
    fn source(&self) -> FeedSource {
        FeedSource::Kandilli
    }

    async fn fetch(&self, query: &FeedQuery) -> AppResult<FeedBatch> {
        tracing::debug!(feed = FEED, url = %self.config.url, "Fetching feed");
        let page = self.get_page().await?;

        let parsed = match parse_page(&page, query.floor(), self.naive_offset) {
            Ok(parsed) => parsed,
            Err(e) => {
                self.dump_page(&page).await;
                return Err(e);
            }
        };

        tracing::info!(
            feed = FEED,
            events = parsed.events.len(),
            skipped = parsed.malformed,
            below_floor = parsed.below_floor,
            "Feed fetched"
        );
        Ok(FeedBatch {
            events: parsed.events,
            skipped: parsed.malformed,
        })
    }
}

/// Decode a windows-1254 page; unmappable bytes become U+FFFD.
pub fn decode_page(bytes: &[u8]) -> String {
    let (text, _, had_errors) = WINDOWS_1254.decode(bytes);
    if had_errors {
        tracing::debug!(feed = FEED, "Page contained bytes outside windows-1254");
    }
    text.into_owned()
}

async fn write_dump(path: &Path, page: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, page).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_turkish_letters() {
        // "Çözüm Niteliği İlksel" in windows-1254
        let bytes = [
            0xC7, 0xF6, b'z', 0xFC, b'm', b' ', b'N', b'i', b't', b'e', b'l', b'i',
            0xF0, b'i', b' ', 0xDD, b'l', b'k', b's', b'e', b'l',
        ];
        assert_eq!(decode_page(&bytes), "Çözüm Niteliği İlksel");
    }

    #[test]
    fn test_decode_then_parse_page() {
        let page = "<pre>Tarih      Saat      Enlem(N)  Boylam(E) Derinlik(km)  MD   ML   Mw    Yer      Çözüm Niteliği\n\
---------- --------  --------  -------   ----------    ------------    --------------\n\
2025.05.13 09:05:56  36.9173   27.6803        8.9      -.-  3.4  -.-   SINDIRGI (BALIKESIR)      İlksel\n\
</pre>";
        let (encoded, _, _) = WINDOWS_1254.encode(page);
        let decoded = decode_page(&encoded);

        let parsed = parse_page(&decoded, 0.0, Offset::constant(3)).unwrap();
        assert_eq!(parsed.events.len(), 1);
        assert_eq!(parsed.events[0].quality, "İlksel");
    }

    #[tokio::test]
    async fn test_unparsable_page_is_dumped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dumps").join("kandilli.html");

        write_dump(&path, "<html>maintenance</html>").await.unwrap();
        let written = tokio::fs::read_to_string(&path).await.unwrap();
        assert_eq!(written, "<html>maintenance</html>");
    }

    #[test]
    fn test_invalid_offset_is_rejected() {
        let config = KandilliFeedConfig {
            naive_offset_hours: 40,
            ..Default::default()
        };
        assert!(matches!(
            KandilliFeed::new(config),
            Err(AppError::Validation { field, .. }) if field == "feeds.kandilli.naive_offset_hours"
        ));
    }

    #[tokio::test]
    #[ignore = "requires network access"]
    async fn test_fetch_live_feed() {
        let feed = KandilliFeed::new(KandilliFeedConfig::default()).unwrap();
        let batch = feed.fetch(&FeedQuery::with_floor(0.0)).await.unwrap();
        assert!(batch.events.iter().all(|e| e.source == FeedSource::Kandilli));
    }
}
