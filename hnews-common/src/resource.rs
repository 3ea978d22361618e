//! `HNews` resource model
//!
//! An `HNews` resource pairs a desired filter (`spec.filter`) with the observed
//! list of matching Hacker News items (`status`). The JSON field names match the
//! manifests users already write (`descendents`, `hnews_url`, `lastSyncedAt`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

/// Namespace used when a request does not name one
pub const DEFAULT_NAMESPACE: &str = "default";

/// Discussion page for an item on news.ycombinator.com
pub fn hnews_item_url(id: i64) -> String {
    format!("https://news.ycombinator.com/item?id={}", id)
}

/// Identity of a resource: `namespace/name`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceKey {
    pub namespace: String,
    pub name: String,
}

impl ResourceKey {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Hacker News item kinds
///
/// Per https://github.com/HackerNews/API#items
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemType {
    Story,
    Comment,
    Job,
    Poll,
    PollOpt,
}

impl ItemType {
    /// Wire names accepted in `spec.filter.type`
    pub const NAMES: &'static [&'static str] = &["job", "story", "comment", "poll", "pollopt"];

    pub fn as_str(&self) -> &'static str {
        match self {
            ItemType::Story => "story",
            ItemType::Comment => "comment",
            ItemType::Job => "job",
            ItemType::Poll => "poll",
            ItemType::PollOpt => "pollopt",
        }
    }
}

impl fmt::Display for ItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ItemType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "story" => Ok(ItemType::Story),
            "comment" => Ok(ItemType::Comment),
            "job" => Ok(ItemType::Job),
            "poll" => Ok(ItemType::Poll),
            "pollopt" => Ok(ItemType::PollOpt),
            other => Err(format!(
                "unknown item type '{}', expected one of: {}",
                other,
                Self::NAMES.join(", ")
            )),
        }
    }
}

/// Raw comparison expression text, e.g. `">=10"`
///
/// Kept verbatim so that an unparseable expression round-trips unchanged;
/// evaluation lives in the controller.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Comparison(String);

impl Comparison {
    pub fn new(expr: impl Into<String>) -> Self {
        Self(expr.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Comparison {
    fn from(expr: &str) -> Self {
        Self(expr.to_string())
    }
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Filter selecting which Hacker News items to report
///
/// Every field is optional: `None` means "not yet defaulted". Manifests written
/// with `limit: 0` or empty strings decode as `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Filter {
    /// Number of items wanted
    #[serde(
        default,
        deserialize_with = "zero_as_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub limit: Option<u32>,

    /// Item type wanted (stored, not applied during admission)
    #[serde(
        rename = "type",
        default,
        deserialize_with = "item_type_or_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub item_type: Option<ItemType>,

    /// Predicate on the item score, e.g. `">=10"`
    #[serde(
        default,
        deserialize_with = "comparison_or_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub score: Option<Comparison>,

    /// Predicate on the item comment count
    #[serde(
        rename = "descendents",
        default,
        deserialize_with = "comparison_or_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub descendants: Option<Comparison>,
}

impl Filter {
    /// True once every field has a value
    pub fn is_complete(&self) -> bool {
        self.limit.is_some()
            && self.item_type.is_some()
            && self.score.is_some()
            && self.descendants.is_some()
    }
}

fn zero_as_none<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<u32>::deserialize(deserializer)?.filter(|limit| *limit != 0))
}

fn comparison_or_none<'de, D>(deserializer: D) -> Result<Option<Comparison>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?
        .filter(|expr| !expr.is_empty())
        .map(Comparison))
}

fn item_type_or_none<'de, D>(deserializer: D) -> Result<Option<ItemType>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<String>::deserialize(deserializer)? {
        None => Ok(None),
        Some(name) if name.is_empty() => Ok(None),
        Some(name) => name
            .parse::<ItemType>()
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}

/// Desired state
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HNewsSpec {
    #[serde(default)]
    pub filter: Filter,
}

/// One item satisfying the filter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    /// Discussion page, e.g. https://news.ycombinator.com/item?id=31316372
    pub hnews_url: String,
    /// URL shared on the discussion page (empty for text posts)
    pub article_url: String,
    pub descendents: i64,
    pub score: i64,
}

/// Observed state, overwritten wholesale by each successful cycle
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HNewsStatus {
    #[serde(rename = "link", default)]
    pub links: Vec<Link>,

    #[serde(
        rename = "lastSyncedAt",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub last_synced_at: Option<DateTime<Utc>>,
}

/// Resource identity plus bookkeeping
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectMeta {
    pub name: String,
    #[serde(default = "default_namespace")]
    pub namespace: String,
    /// Incremented on every spec write
    #[serde(default)]
    pub generation: i64,
    #[serde(
        rename = "creationTimestamp",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub created_at: Option<DateTime<Utc>>,
}

fn default_namespace() -> String {
    DEFAULT_NAMESPACE.to_string()
}

/// The `HNews` resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HNews {
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: HNewsSpec,
    #[serde(default)]
    pub status: HNewsStatus,
}

impl HNews {
    /// New resource with an empty status; generation is assigned by the store
    pub fn new(key: ResourceKey, spec: HNewsSpec) -> Self {
        Self {
            metadata: ObjectMeta {
                name: key.name,
                namespace: key.namespace,
                generation: 0,
                created_at: None,
            },
            spec,
            status: HNewsStatus::default(),
        }
    }

    pub fn key(&self) -> ResourceKey {
        ResourceKey::new(&self.metadata.namespace, &self.metadata.name)
    }
}
