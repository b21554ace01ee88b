//! Tag diffing
//!
//! Computes which tag calls are needed to move a resource from its prior
//! tag set to the desired one.

use std::collections::BTreeMap;

/// Tag set keyed by tag key
pub type Tags = BTreeMap<String, String>;

/// Key prefixes owned by the platform. These are never untagged.
const IGNORED_TAG_PREFIXES: &[&str] = &["aliyun", "acs:", "http://", "https://"];

/// Returns true for system-managed tag keys
pub fn is_ignored_tag(key: &str) -> bool {
    IGNORED_TAG_PREFIXES.iter().any(|p| key.starts_with(p))
}

/// Tag calls needed to reach a desired tag set
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagDiff {
    /// Every desired tag. The tag endpoint upserts, so the whole set is sent.
    pub added: Tags,
    /// Keys to detach, sorted, without ignored keys
    pub removed: Vec<String>,
}

impl TagDiff {
    /// Diff `old` against `new`. An unchanged tag set yields an empty diff.
    pub fn between(old: &Tags, new: &Tags) -> Self {
        if old == new {
            return Self::default();
        }

        let removed = old
            .iter()
            .filter(|(key, value)| new.get(*key) != Some(*value))
            .map(|(key, _)| key)
            .filter(|key| !is_ignored_tag(key))
            .cloned()
            .collect();

        Self {
            added: new.clone(),
            removed,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// Parse `key=value` pairs, as given on the command line
pub fn parse_tag(raw: &str) -> Result<(String, String), String> {
    let Some((key, value)) = raw.split_once('=') else {
        return Err(format!("expected key=value, got '{}'", raw));
    };
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty tag key in '{}'", raw));
    }
    Ok((key.to_string(), value.trim().to_string()))
}
