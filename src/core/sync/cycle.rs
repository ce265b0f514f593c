use std::sync::Arc;

use chrono::Utc;

use super::normalize::{normalize_entry, DateFallback};
use crate::core::feed::reader::FeedReader;
use crate::core::feed::types::FeedFormat;
use crate::core::feed::FeedError;
use crate::core::storage::models::Entry;
use crate::core::storage::EntryStore;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub source: String,
    pub format: Option<FeedFormat>,
    pub parsed: usize,
    pub inserted: usize,
    pub failed: usize,
    pub fallback_dates: usize,
}

/// Fetch, normalize and persist one source.
pub struct FetchCycle<R> {
    reader: Arc<R>,
    store: EntryStore,
    date_fallback: DateFallback,
}

impl<R> Clone for FetchCycle<R> {
    fn clone(&self) -> Self {
        Self {
            reader: Arc::clone(&self.reader),
            store: self.store.clone(),
            date_fallback: self.date_fallback,
        }
    }
}

impl<R: FeedReader> FetchCycle<R> {
    pub fn new(reader: Arc<R>, store: EntryStore, date_fallback: DateFallback) -> Self {
        Self {
            reader,
            store,
            date_fallback,
        }
    }

    /// A fetch or parse failure returns before the store is touched. A row
    /// that fails to insert is logged and skipped.
    pub async fn run(&self, source: &str) -> Result<CycleReport, FeedError> {
        let fetched_at = Utc::now();
        let feed = match self.reader.read_feed(source).await {
            Ok(feed) => feed,
            Err(error) => {
                tracing::warn!(source, %error, "feed unavailable, skipping this cycle");
                return Err(error);
            }
        };

        let mut report = CycleReport {
            source: source.to_string(),
            format: Some(feed.format),
            parsed: feed.entries.len(),
            ..CycleReport::default()
        };
        let entries: Vec<Entry> = feed
            .entries
            .iter()
            .map(|parsed| {
                let normalized = normalize_entry(parsed, self.date_fallback, fetched_at);
                if normalized.used_fallback {
                    report.fallback_dates += 1;
                    tracing::debug!(
                        source,
                        link = %parsed.link,
                        raw = parsed.published_at.as_deref().unwrap_or(""),
                        "unusable publish date, using fallback"
                    );
                }
                normalized.entry
            })
            .collect();

        let mut writer = self.store.writer().await;
        for entry in &entries {
            match writer.insert(entry).await {
                Ok(_) => report.inserted += 1,
                Err(error) => {
                    report.failed += 1;
                    tracing::warn!(source, link = %entry.link, %error, "failed to store entry");
                }
            }
        }
        drop(writer);

        tracing::info!(
            source,
            feed = %feed.title,
            format = ?feed.format,
            parsed = report.parsed,
            inserted = report.inserted,
            failed = report.failed,
            "fetch cycle finished"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::feed::parser::FeedParseError;
    use crate::core::feed::types::{ParsedEntry, ParsedFeed};
    use chrono::DateTime;
    use std::collections::HashMap;

    /// Serves canned entries per URL; unknown URLs fail like a dead host.
    #[derive(Default)]
    struct FakeReader {
        feeds: HashMap<String, Vec<ParsedEntry>>,
    }

    impl FakeReader {
        fn with_feed(mut self, url: &str, entries: Vec<ParsedEntry>) -> Self {
            self.feeds.insert(url.to_string(), entries);
            self
        }
    }

    impl FeedReader for FakeReader {
        async fn read_feed(&self, url: &str) -> Result<ParsedFeed, FeedError> {
            match self.feeds.get(url) {
                Some(entries) => Ok(ParsedFeed {
                    format: FeedFormat::XmlFeed,
                    title: url.to_string(),
                    entries: entries.clone(),
                }),
                None => Err(FeedError::Parse(FeedParseError::EmptyPayload)),
            }
        }
    }

    fn item(title: &str, published_at: Option<&str>) -> ParsedEntry {
        ParsedEntry {
            title: title.to_string(),
            link: format!("http://example.com/{title}"),
            summary: Some(format!("{title} summary")),
            content: None,
            published_at: published_at.map(ToString::to_string),
        }
    }

    async fn memory_store() -> EntryStore {
        EntryStore::connect("sqlite::memory:", 1)
            .await
            .expect("connect must succeed")
    }

    fn cycle(reader: FakeReader, store: &EntryStore) -> FetchCycle<FakeReader> {
        FetchCycle::new(Arc::new(reader), store.clone(), DateFallback::Epoch)
    }

    #[tokio::test]
    async fn fetch_failure_leaves_store_untouched() {
        let store = memory_store().await;
        let cycle = cycle(FakeReader::default(), &store);

        let result = cycle.run("http://unreachable.invalid/feed.xml").await;

        assert!(result.is_err());
        assert_eq!(store.count().await.expect("count"), 0);
    }

    #[tokio::test]
    async fn report_carries_the_feed_format() {
        let store = memory_store().await;
        let reader = FakeReader::default().with_feed("feed", vec![item("A", None)]);

        let report = cycle(reader, &store).run("feed").await.expect("cycle runs");

        assert_eq!(report.format, Some(FeedFormat::XmlFeed));
        assert_eq!(report.parsed, 1);
        assert_eq!(report.inserted, 1);
    }

    #[tokio::test]
    async fn failed_row_is_skipped_and_the_rest_persist() {
        let store = memory_store().await;
        sqlx::query(
            r#"
            CREATE TRIGGER reject_b BEFORE INSERT ON news
            WHEN NEW.title = 'B'
            BEGIN SELECT RAISE(ABORT, 'rejected'); END;
            "#,
        )
        .execute(store.pool())
        .await
        .expect("trigger should be created");
        let reader = FakeReader::default().with_feed(
            "feed",
            vec![
                item("A", Some("2026-02-24T03:00:00Z")),
                item("B", Some("2026-02-24T02:00:00Z")),
                item("C", Some("2026-02-24T01:00:00Z")),
            ],
        );

        let report = cycle(reader, &store).run("feed").await.expect("cycle runs");
        let titles: Vec<String> = store
            .latest(10)
            .await
            .expect("latest")
            .into_iter()
            .map(|row| row.title)
            .collect();

        assert_eq!(report.inserted, 2);
        assert_eq!(report.failed, 1);
        assert_eq!(titles, vec!["A", "C"]);
    }

    #[tokio::test]
    async fn entry_with_bad_date_is_kept_with_fallback() {
        let store = memory_store().await;
        let reader = FakeReader::default().with_feed("feed", vec![item("Undated", Some("not-a-date"))]);

        let report = cycle(reader, &store).run("feed").await.expect("cycle runs");
        let rows = store.latest(1).await.expect("latest");

        assert_eq!(report.fallback_dates, 1);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].pub_date, DateTime::<Utc>::UNIX_EPOCH);
    }

    #[tokio::test]
    async fn fetch_time_fallback_stamps_the_cycle_start() {
        let store = memory_store().await;
        let reader = FakeReader::default().with_feed("feed", vec![item("Undated", None)]);
        let cycle = FetchCycle::new(Arc::new(reader), store.clone(), DateFallback::FetchTime);

        let before = Utc::now();
        cycle.run("feed").await.expect("cycle runs");
        let after = Utc::now();
        let rows = store.latest(1).await.expect("latest");

        assert!(rows[0].pub_date >= before - chrono::Duration::seconds(1));
        assert!(rows[0].pub_date <= after);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn overlapping_cycles_lose_no_rows() {
        let store = memory_store().await;
        let five = |prefix: &str| {
            (0..5)
                .map(|index| item(&format!("{prefix}{index}"), Some("2026-02-24T00:00:00Z")))
                .collect::<Vec<_>>()
        };
        let reader = FakeReader::default()
            .with_feed("one", five("one-"))
            .with_feed("two", five("two-"));
        let cycle = cycle(reader, &store);

        let (first, second) = tokio::join!(
            tokio::spawn({
                let cycle = cycle.clone();
                async move { cycle.run("one").await }
            }),
            tokio::spawn({
                let cycle = cycle.clone();
                async move { cycle.run("two").await }
            }),
        );

        assert_eq!(first.expect("join").expect("cycle").inserted, 5);
        assert_eq!(second.expect("join").expect("cycle").inserted, 5);
        assert_eq!(store.count().await.expect("count"), 10);
    }

    #[tokio::test]
    async fn broken_source_does_not_affect_a_concurrent_healthy_one() {
        let store = memory_store().await;
        let reader = FakeReader::default().with_feed(
            "healthy",
            vec![item("Kept", Some("2026-02-24T00:00:00Z"))],
        );
        let cycle = cycle(reader, &store);

        let (broken, healthy) = tokio::join!(cycle.run("broken"), cycle.run("healthy"));

        assert!(broken.is_err());
        assert_eq!(healthy.expect("healthy cycle").inserted, 1);
        assert_eq!(store.count().await.expect("count"), 1);
    }
}
