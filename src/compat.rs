use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Server wide item compatibility data.
///
/// Discovered once from the loaded content, then persisted inside the
/// manager save so later sessions skip rediscovery. Opaque to the
/// persistence coordinator; this struct is its own serde contract.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompatibilityStore {
    item_tags: IndexMap<String, Vec<String>>,
    discovered: bool,
}
impl CompatibilityStore {
    pub fn record(&mut self, item: &str, tag: &str) {
        let tags = self.item_tags.entry(item.to_string()).or_default();
        if !tags.iter().any(|t| t == tag) {
            tags.push(tag.to_string());
        }
    }

    pub fn has_tag(&self, item: &str, tag: &str) -> bool {
        self.item_tags
            .get(item)
            .is_some_and(|tags| tags.iter().any(|t| t == tag))
    }

    pub fn tags(&self, item: &str) -> &[String] {
        self.item_tags.get(item).map_or(&[], Vec::as_slice)
    }

    pub fn is_discovered(&self) -> bool {
        self.discovered
    }

    pub fn set_discovered(&mut self) {
        self.discovered = true;
    }

    pub fn len(&self) -> usize {
        self.item_tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.item_tags.is_empty()
    }
}
