//! Source client contract and pagination driver.
//!
//! A [`PageSource`] performs one network read per page. [`RecordPager`]
//! turns that into a finite, restartable sequence of raw records: a new
//! pager always starts at page 1.
//!
//! # Termination
//!
//! Checked after every page, in order:
//!
//! 1. the source reports no further pages,
//! 2. the page-count ceiling is reached,
//! 3. the page held fewer than [`PAGE_SIZE`] records (including zero).

use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

use crate::error::Result;
use crate::models::RawRecord;

/// Records per page, fixed by the source API contract.
pub const PAGE_SIZE: usize = 25;

/// One page of raw records plus the source's pagination signal.
#[derive(Debug, Clone, Default)]
pub struct SourcePage {
    pub records: Vec<RawRecord>,
    /// `false` when the source says this is the last page.
    pub has_more: bool,
}

/// A paginated, read-only record source.
///
/// Implementations must not retain state between calls that would make a
/// second harvest depend on the first.
#[async_trait]
pub trait PageSource: Send + Sync {
    /// Human-readable endpoint, used in logs and errors.
    fn endpoint(&self) -> &str;

    /// Politeness delay between consecutive page requests.
    fn request_delay(&self) -> Duration {
        Duration::ZERO
    }

    /// Fetch page `page` (1-based) of `collection`.
    async fn fetch_page(&self, collection: &str, page: u32, size: usize) -> Result<SourcePage>;
}

/// Lazy page-by-page reader over a [`PageSource`].
pub struct RecordPager<'a> {
    source: &'a dyn PageSource,
    collection: String,
    max_pages: Option<u32>,
    next_page: u32,
    done: bool,
}

impl<'a> RecordPager<'a> {
    pub fn new(source: &'a dyn PageSource, collection: &str, max_pages: Option<u32>) -> Self {
        Self {
            source,
            collection: collection.to_string(),
            max_pages,
            next_page: 1,
            done: max_pages == Some(0),
        }
    }

    /// Pages requested so far.
    pub fn pages_fetched(&self) -> u32 {
        self.next_page - 1
    }

    /// Fetch the next page, or `None` once a termination condition held.
    pub async fn next_page(&mut self) -> Result<Option<Vec<RawRecord>>> {
        if self.done {
            return Ok(None);
        }

        let page = self.next_page;
        if page > 1 {
            let delay = self.source.request_delay();
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }

        let result = self
            .source
            .fetch_page(&self.collection, page, PAGE_SIZE)
            .await?;
        self.next_page += 1;

        let count = result.records.len();
        debug!(
            collection = %self.collection,
            page,
            count,
            has_more = result.has_more,
            "fetched page"
        );

        if !result.has_more
            || self.max_pages.is_some_and(|max| page >= max)
            || count < PAGE_SIZE
        {
            self.done = true;
        }

        Ok(Some(result.records))
    }
}

/// All records of one collection harvest.
#[derive(Debug, Clone, Default)]
pub struct CollectedRecords {
    pub records: Vec<RawRecord>,
    pub pages_fetched: u32,
}

/// Drain a fresh pager. Any page failure fails the whole collection.
pub async fn collect_records(
    source: &dyn PageSource,
    collection: &str,
    max_pages: Option<u32>,
) -> Result<CollectedRecords> {
    let mut pager = RecordPager::new(source, collection, max_pages);
    let mut records = Vec::new();
    while let Some(page) = pager.next_page().await? {
        records.extend(page);
    }
    Ok(CollectedRecords {
        records,
        pages_fetched: pager.pages_fetched(),
    })
}

#[cfg(test)]
pub(crate) mod testing {
    //! In-memory [`PageSource`] for pager and pipeline tests.

    use super::*;
    use crate::error::CatalogueError;
    use crate::models::SOURCE_ZENODO;
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};

    pub struct MemorySource {
        pub pages: Vec<SourcePage>,
        pub fail_on: Option<u32>,
        pub calls: AtomicU32,
    }

    impl MemorySource {
        pub fn new(pages: Vec<SourcePage>) -> Self {
            Self {
                pages,
                fail_on: None,
                calls: AtomicU32::new(0),
            }
        }

        pub fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    pub fn hit(recid: u32) -> RawRecord {
        RawRecord::new(
            SOURCE_ZENODO,
            json!({
                "id": recid,
                "doi": format!("10.5281/zenodo.{}", recid),
                "metadata": { "title": format!("Record {}", recid) }
            }),
        )
    }

    pub fn page(start: u32, count: u32, has_more: bool) -> SourcePage {
        SourcePage {
            records: (start..start + count).map(hit).collect(),
            has_more,
        }
    }

    #[async_trait]
    impl PageSource for MemorySource {
        fn endpoint(&self) -> &str {
            "memory"
        }

        async fn fetch_page(&self, _collection: &str, page: u32, _size: usize) -> Result<SourcePage> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_on == Some(page) {
                return Err(CatalogueError::source_unavailable("memory", "HTTP 503"));
            }
            Ok(self
                .pages
                .get(page as usize - 1)
                .cloned()
                .unwrap_or_default())
        }
    }
}
