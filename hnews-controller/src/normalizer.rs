//! Filter defaulting
//!
//! A filter with any unset field is completed once; only the unset fields are
//! filled. The controller persists the result and stops the cycle there.

use hnews_common::resource::{Comparison, Filter, ItemType};

pub const DEFAULT_ITEM_TYPE: ItemType = ItemType::Story;
pub const DEFAULT_LIMIT: u32 = 5;
pub const DEFAULT_SCORE: &str = ">200";
pub const DEFAULT_DESCENDANTS: &str = ">5";

/// Filter with every field present
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedFilter {
    pub limit: u32,
    /// Stored for users; not applied during admission
    pub item_type: ItemType,
    pub score: Comparison,
    pub descendants: Comparison,
}

impl From<ResolvedFilter> for Filter {
    fn from(resolved: ResolvedFilter) -> Self {
        Filter {
            limit: Some(resolved.limit),
            item_type: Some(resolved.item_type),
            score: Some(resolved.score),
            descendants: Some(resolved.descendants),
        }
    }
}

/// Fill unset fields; returns the completed filter and whether anything was filled
pub fn normalize(filter: &Filter) -> (ResolvedFilter, bool) {
    let was_defaulted = !filter.is_complete();

    let resolved = ResolvedFilter {
        limit: filter.limit.unwrap_or(DEFAULT_LIMIT),
        item_type: filter.item_type.unwrap_or(DEFAULT_ITEM_TYPE),
        score: filter
            .score
            .clone()
            .unwrap_or_else(|| Comparison::from(DEFAULT_SCORE)),
        descendants: filter
            .descendants
            .clone()
            .unwrap_or_else(|| Comparison::from(DEFAULT_DESCENDANTS)),
    };

    (resolved, was_defaulted)
}
