use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::Arc;

use tracing::debug;

use crate::cancel::CancellationToken;
use crate::error::DbResult;
use crate::sql::BoundQuery;

/// Default number of items returned per page.
pub const DEFAULT_MAX_ITEM_COUNT: usize = 100;

/// Per-query options.
#[derive(Debug, Clone, Default)]
pub struct QueryOptions {
    /// Page size override. `None` uses the container default.
    pub max_item_count: Option<usize>,
}

impl QueryOptions {
    pub fn with_max_item_count(mut self, max_item_count: usize) -> Self {
        self.max_item_count = Some(max_item_count);
        self
    }
}

/// One page of query results.
#[derive(Debug, Clone)]
pub struct FeedResponse<T> {
    items: Vec<T>,
}

impl<T> FeedResponse<T> {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    pub fn into_items(self) -> Vec<T> {
        self.items
    }
}

impl<T> IntoIterator for FeedResponse<T> {
    type Item = T;
    type IntoIter = std::vec::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

enum Source<T> {
    /// Walks the view in id order, resuming after `last_key`.
    Scan {
        view: Arc<BTreeMap<String, T>>,
        last_key: Option<String>,
    },
    /// Matches already collected and sorted for ORDER BY.
    Sorted(std::vec::IntoIter<T>),
}

/// Pull-based pager over query results.
///
/// Reads from the point-in-time view captured when the query started;
/// later writes to the container are not visible.
pub struct FeedIterator<T> {
    source: Source<T>,
    query: Option<BoundQuery<T>>,
    max_item_count: usize,
    cancel: CancellationToken,
    lookahead: Option<T>,
}

impl<T: Clone> FeedIterator<T> {
    pub(crate) fn new(
        view: Arc<BTreeMap<String, T>>,
        query: Option<BoundQuery<T>>,
        max_item_count: usize,
        cancel: CancellationToken,
    ) -> DbResult<Self> {
        let source = match &query {
            Some(bound) if bound.is_ordered() => {
                let mut rows = Vec::new();
                for row in view.values() {
                    cancel.check()?;
                    if bound.matches(row) {
                        rows.push(row.clone());
                    }
                }
                // Stable sort keeps id order among equal keys.
                rows.sort_by(|a, b| bound.compare(a, b));
                Source::Sorted(rows.into_iter())
            }
            _ => Source::Scan {
                view,
                last_key: None,
            },
        };

        let mut feed = Self {
            source,
            query,
            max_item_count: max_item_count.max(1),
            cancel,
            lookahead: None,
        };
        feed.lookahead = feed.advance()?;
        Ok(feed)
    }

    pub fn has_more_results(&self) -> bool {
        self.lookahead.is_some()
    }

    /// Reads the next page of at most `max_item_count` items. Returns an
    /// empty page once the feed is drained.
    pub fn read_next(&mut self) -> DbResult<FeedResponse<T>> {
        let mut items = Vec::new();
        while items.len() < self.max_item_count {
            match self.lookahead.take() {
                Some(row) => {
                    items.push(row);
                    self.lookahead = self.advance()?;
                }
                None => break,
            }
        }
        debug!(
            count = items.len(),
            has_more = self.lookahead.is_some(),
            "feed page read"
        );
        Ok(FeedResponse { items })
    }

    /// Drains every remaining page.
    pub fn read_all(mut self) -> DbResult<Vec<T>> {
        let mut rows = Vec::new();
        while self.has_more_results() {
            rows.extend(self.read_next()?);
        }
        Ok(rows)
    }

    pub fn max_item_count(&self) -> usize {
        self.max_item_count
    }

    /// Schema names of the selected columns, or `None` for `select *`.
    pub fn projection(&self) -> Option<&[&'static str]> {
        self.query.as_ref().and_then(|q| q.projection())
    }

    fn advance(&mut self) -> DbResult<Option<T>> {
        match &mut self.source {
            Source::Scan { view, last_key } => {
                let start = match last_key.take() {
                    Some(key) => Bound::Excluded(key),
                    None => Bound::Unbounded,
                };
                let mut resume = match &start {
                    Bound::Excluded(key) => Some(key.clone()),
                    _ => None,
                };
                let mut found = None;
                for (key, row) in view.range((start, Bound::Unbounded)) {
                    self.cancel.check()?;
                    resume = Some(key.clone());
                    let matched = self.query.as_ref().map_or(true, |q| q.matches(row));
                    if matched {
                        found = Some(row.clone());
                        break;
                    }
                }
                *last_key = resume;
                Ok(found)
            }
            Source::Sorted(rows) => {
                self.cancel.check()?;
                Ok(rows.next())
            }
        }
    }
}
