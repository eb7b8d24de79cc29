//! The post listing (`index.json`), per-post `config.json` and the category
//! list, as stored in the content repository.

use std::{cmp::Ordering, collections::HashSet};

use itertools::Itertools;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// `null` reads the same as a missing field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// One row of `index.json`. Rows written by other tools may lack any field or
/// carry extra ones; unknown keys are kept so a rewrite does not drop them.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlogIndexItem {
    #[serde(default, deserialize_with = "null_as_default")]
    pub slug: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub tags: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub date: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hidden: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl BlogIndexItem {
    pub fn is_hidden(&self) -> bool {
        self.hidden.unwrap_or(false)
    }

    /// Index row for a post described by its `config.json`.
    pub fn from_config(slug: &str, config: &BlogConfig) -> Self {
        Self {
            slug: slug.to_string(),
            title: config.title.clone().unwrap_or_default(),
            tags: config.tags.clone().unwrap_or_default(),
            date: config.date.clone().unwrap_or_default(),
            summary: config.summary.clone(),
            cover: config.cover.clone(),
            hidden: config.hidden,
            category: config.category.clone(),
            extra: Map::new(),
        }
    }
}

/// Contents of `public/blogs/<slug>/config.json`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlogConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hidden: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

impl BlogConfig {
    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Newest first. Dates are ISO-like strings so they compare lexicographically;
/// posts without a date go last.
fn newest_first(a: &BlogIndexItem, b: &BlogIndexItem) -> Ordering {
    match (a.date.is_empty(), b.date.is_empty()) {
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        _ => b.date.cmp(&a.date),
    }
}

/// The whole of `index.json`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BlogIndex {
    items: Vec<BlogIndexItem>,
}

impl BlogIndex {
    pub fn new(items: Vec<BlogIndexItem>) -> Self {
        Self { items }
    }

    /// Parse `index.json`. Anything that is not a JSON array yields an empty
    /// index, the same as a missing file. A row that cannot be read is
    /// skipped on its own; the rest of the listing survives.
    pub fn parse_lenient(text: &str) -> Self {
        let rows = match serde_json::from_str::<Vec<Value>>(text) {
            Ok(rows) => rows,
            Err(e) => {
                tracing::warn!(error = %e, "unreadable blog index, starting from empty");
                return Self::default();
            }
        };
        let items = rows
            .into_iter()
            .enumerate()
            .filter_map(|(n, row)| match serde_json::from_value(row) {
                Ok(item) => Some(item),
                Err(e) => {
                    tracing::warn!(row = n, error = %e, "skipping unreadable index row");
                    None
                }
            })
            .collect();
        Self { items }
    }

    pub fn items(&self) -> &[BlogIndexItem] {
        &self.items
    }

    pub fn into_items(self) -> Vec<BlogIndexItem> {
        self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, slug: &str) -> Option<&BlogIndexItem> {
        self.items.iter().find(|i| i.slug == slug)
    }

    /// Insert or replace the post with the same slug, keeping the index
    /// sorted newest first. Unknown keys of the replaced row carry over.
    pub fn upsert(&mut self, mut item: BlogIndexItem) {
        match self.items.iter_mut().find(|i| i.slug == item.slug) {
            Some(existing) => {
                for (key, value) in std::mem::take(&mut existing.extra) {
                    item.extra.entry(key).or_insert(value);
                }
                *existing = item;
            }
            None => self.items.push(item),
        }
        self.sort();
    }

    /// Drop every listed slug. Empty slugs are ignored.
    pub fn remove<S: AsRef<str>>(&mut self, slugs: &[S]) {
        let doomed: HashSet<&str> = slugs
            .iter()
            .map(AsRef::as_ref)
            .filter(|s| !s.is_empty())
            .collect();
        if doomed.is_empty() {
            return;
        }
        self.items.retain(|i| !doomed.contains(i.slug.as_str()));
    }

    /// Adopt an edited listing wholesale, sorted newest first.
    pub fn replace_sorted(items: Vec<BlogIndexItem>) -> Self {
        let mut index = Self { items };
        index.sort();
        index
    }

    fn sort(&mut self) {
        self.items.sort_by(newest_first);
    }

    /// Posts a reader may see; hidden ones only show up for the author.
    pub fn visible(&self, is_auth: bool) -> impl Iterator<Item = &BlogIndexItem> {
        self.items.iter().filter(move |i| is_auth || !i.is_hidden())
    }

    pub fn latest(&self, is_auth: bool) -> Option<&BlogIndexItem> {
        self.visible(is_auth).min_by(|a, b| newest_first(a, b))
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.items)
    }
}

/// Slugs present in `original` but missing from `next`, unique and in their
/// original order.
pub fn removed_since(original: &[BlogIndexItem], next: &[BlogIndexItem]) -> Vec<String> {
    let kept: HashSet<&str> = next.iter().map(|i| i.slug.as_str()).collect();
    original
        .iter()
        .map(|i| i.slug.as_str())
        .filter(|slug| !slug.is_empty() && !kept.contains(slug))
        .unique()
        .map(ToOwned::to_owned)
        .collect()
}

/// `categories.json`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Categories {
    pub categories: Vec<String>,
}

impl Categories {
    /// Accepts either a bare array of names or `{ "categories": [...] }`.
    /// Non-string entries are skipped; any other shape is empty.
    pub fn parse_lenient(text: &str) -> Self {
        let value: Value = serde_json::from_str(text).unwrap_or(Value::Null);
        let list = match &value {
            Value::Array(list) => Some(list),
            Value::Object(map) => map.get("categories").and_then(Value::as_array),
            _ => None,
        };
        let categories = list
            .into_iter()
            .flatten()
            .filter_map(Value::as_str)
            .map(ToOwned::to_owned)
            .collect();
        Self { categories }
    }

    /// Trimmed, non-empty, first occurrence wins.
    pub fn normalize<S: AsRef<str>>(names: &[S]) -> Self {
        let categories = names
            .iter()
            .map(|c| c.as_ref().trim())
            .filter(|c| !c.is_empty())
            .unique()
            .map(ToOwned::to_owned)
            .collect();
        Self { categories }
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
