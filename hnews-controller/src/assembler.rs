//! Result assembly
//!
//! Candidates are visited in upstream order and fetched one by one. The loop
//! checks the admitted count before every fetch, so once `limit` items are
//! admitted no further item is requested. Output keeps upstream order.

use hnews_common::resource::{hnews_item_url, Link};

use crate::comparison::evaluate;
use crate::hn_client::{FetchError, HackerNewsItem, ItemSource};
use crate::normalizer::ResolvedFilter;

/// Both predicates hold for the item
///
/// `item_type` is deliberately not consulted.
pub fn admits(filter: &ResolvedFilter, item: &HackerNewsItem) -> bool {
    evaluate(item.score, filter.score.as_str())
        && evaluate(item.descendants, filter.descendants.as_str())
}

pub fn to_link(item: &HackerNewsItem) -> Link {
    Link {
        hnews_url: hnews_item_url(item.id),
        article_url: item.url.clone(),
        descendents: item.descendants,
        score: item.score,
    }
}

/// Fetch candidates in order and collect up to `filter.limit` admitted items
///
/// The first fetch error aborts assembly; no partial list is returned.
pub async fn assemble<S>(
    candidate_ids: &[i64],
    source: &S,
    filter: &ResolvedFilter,
) -> Result<Vec<Link>, FetchError>
where
    S: ItemSource + ?Sized,
{
    let limit = filter.limit as usize;
    let mut links = Vec::with_capacity(limit.min(candidate_ids.len()));

    for &id in candidate_ids {
        if links.len() == limit {
            break;
        }

        let item = source.fetch_item(id).await?;

        if admits(filter, &item) && links.len() < limit {
            tracing::debug!(id, score = item.score, descendants = item.descendants, "Item admitted");
            links.push(to_link(&item));
        }
    }

    Ok(links)
}
