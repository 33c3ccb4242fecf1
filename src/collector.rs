//! Draining token-paginated listings and batch-describing what they return
//!
//! Pages are walked strictly in order: each page's ids are described before
//! the next page is requested. Any failure aborts the whole collection and
//! nothing gathered so far is returned.

use crate::provider::{Operation, Page, ProviderResult};
use crate::Result;
use futures::stream::{self, StreamExt, TryStreamExt};
use std::future::Future;
use tracing::debug;

#[derive(Debug, Clone, Copy)]
pub struct PaginatedCollector {
    batch_size: usize,
}

impl PaginatedCollector {
    pub fn new(batch_size: usize) -> Self {
        Self {
            batch_size: batch_size.max(1),
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Follow continuation tokens and gather every listed id, in page order
    pub async fn collect_ids<L, LF>(&self, operation: Operation, mut list: L) -> Result<Vec<String>>
    where
        L: FnMut(Option<String>) -> LF,
        LF: Future<Output = ProviderResult<Page>>,
    {
        let mut ids = Vec::new();
        let mut token = None;

        while let Some(page) = next_page(operation, &mut list, &mut token).await? {
            ids.extend(page);
        }

        debug!("{} listed {} ids", operation, ids.len());
        Ok(ids)
    }

    /// List every page and describe its ids in batches before moving on
    ///
    /// `describe` receives at most `batch_size` ids per call.
    pub async fn collect<T, L, LF, D, DF>(
        &self,
        operation: Operation,
        mut list: L,
        mut describe: D,
    ) -> Result<Vec<T>>
    where
        L: FnMut(Option<String>) -> LF,
        LF: Future<Output = ProviderResult<Page>>,
        D: FnMut(Vec<String>) -> DF,
        DF: Future<Output = Result<Vec<T>>>,
    {
        let mut records = Vec::new();
        let mut token = None;
        let mut pages = 0usize;

        while let Some(ids) = next_page(operation, &mut list, &mut token).await? {
            pages += 1;
            for batch in ids.chunks(self.batch_size) {
                records.extend(describe(batch.to_vec()).await?);
            }
        }

        debug!(
            "{} collected {} records over {} pages",
            operation,
            records.len(),
            pages
        );
        Ok(records)
    }

    /// Describe a known id list in batches, at most `concurrency` in flight
    ///
    /// Results keep the order of `ids` regardless of completion order.
    pub async fn describe_bounded<T, D, DF>(
        &self,
        ids: &[String],
        concurrency: usize,
        describe: D,
    ) -> Result<Vec<T>>
    where
        D: FnMut(Vec<String>) -> DF,
        DF: Future<Output = Result<Vec<T>>>,
    {
        let batches: Vec<Vec<String>> = ids
            .chunks(self.batch_size)
            .map(<[String]>::to_vec)
            .collect();
        debug!(
            "Describing {} ids in {} batches ({} concurrent)",
            ids.len(),
            batches.len(),
            concurrency
        );

        let described: Vec<Vec<T>> = stream::iter(batches)
            .map(describe)
            .buffered(concurrency.max(1))
            .try_collect()
            .await?;

        Ok(described.into_iter().flatten().collect())
    }
}

/// Fetch the next page, returning `None` once the listing is exhausted.
///
/// Only a missing continuation token ends the listing; an empty page that
/// still carries a token is followed like any other.
async fn next_page<L, LF>(
    operation: Operation,
    list: &mut L,
    token: &mut Option<Option<String>>,
) -> Result<Option<Vec<String>>>
where
    L: FnMut(Option<String>) -> LF,
    LF: Future<Output = ProviderResult<Page>>,
{
    let request = match token.take() {
        None => None,
        Some(Some(next)) => Some(next),
        Some(None) => return Ok(None),
    };

    let page = list(request).await.map_err(|e| e.listing(operation))?;
    debug!(
        "{} page: {} ids, more: {}",
        operation,
        page.ids.len(),
        page.next_token.is_some()
    );

    *token = Some(page.next_token);
    Ok(Some(page.ids))
}
