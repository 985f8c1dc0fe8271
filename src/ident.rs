//! Node identifier allocation.
//!
//! Identifiers look like `ID_<seed><counter>` where the seed is the session date (`YYMMDD`) and
//! the counter is at least four digits wide. The counter lives in an [`IdAllocator`]; a process
//! wide instance is available through [`IdAllocator::global`], and callers that need reproducible
//! identifiers construct their own with a pinned seed.
use crate::element::Element;
use once_cell::sync::Lazy;
use std::{
    collections::HashSet,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

pub const ID_PREFIX: &str = "ID_";

static GLOBAL_ALLOCATOR: Lazy<Arc<IdAllocator>> = Lazy::new(|| Arc::new(IdAllocator::new()));

#[derive(Debug)]
pub struct IdAllocator {
    seed: String,
    counter: AtomicU64,
}

impl Default for IdAllocator {
    fn default() -> Self {
        IdAllocator::new()
    }
}

impl IdAllocator {
    /// An allocator seeded with today's local date.
    pub fn new() -> IdAllocator {
        IdAllocator::with_seed(chrono::Local::now().format("%y%m%d").to_string())
    }

    /// An allocator with an explicit seed. The seed must consist of digits so that generated
    /// identifiers stay valid node ids; anything else is dropped with a warning.
    pub fn with_seed(seed: impl Into<String>) -> IdAllocator {
        let mut seed: String = seed.into();
        if !seed.chars().all(|c| c.is_ascii_digit()) {
            tracing::warn!("identifier seed {seed:?} contains non-digits, ignoring them");
            seed.retain(|c| c.is_ascii_digit());
        }
        IdAllocator {
            seed,
            counter: AtomicU64::new(0),
        }
    }

    pub fn global() -> Arc<IdAllocator> {
        GLOBAL_ALLOCATOR.clone()
    }

    pub fn seed(&self) -> &str {
        &self.seed
    }

    fn format(&self, count: u64) -> String {
        format!("{ID_PREFIX}{}{count:04}", self.seed)
    }

    /// Hand out the next identifier. When `tree` is given, identifiers already carried by any
    /// element below it are skipped.
    pub fn next_id(&self, tree: Option<&Element>) -> String {
        let taken: HashSet<String> = match tree {
            Some(root) => root.iter().into_iter().filter_map(|e| e.get("ID")).collect(),
            None => HashSet::new(),
        };
        loop {
            let count = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
            let candidate = self.format(count);
            if !taken.contains(&candidate) {
                return candidate;
            }
            tracing::debug!("identifier {candidate} already in use, probing the next one");
        }
    }
}

/// Normalize a caller-supplied identifier: add the `ID_` prefix when missing and require digits
/// after it. Returns `None` when the value cannot be a node identifier.
pub fn normalize_id(value: &str) -> Option<String> {
    let value = value.trim();
    let digits = if value
        .get(..ID_PREFIX.len())
        .is_some_and(|p| p.eq_ignore_ascii_case(ID_PREFIX))
    {
        &value[ID_PREFIX.len()..]
    } else {
        tracing::warn!("identifier {value:?} lacks the {ID_PREFIX} prefix, adding it");
        value
    };
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        tracing::warn!("identifier {value:?} must be {ID_PREFIX} followed by digits only");
        return None;
    }
    Some(format!("{ID_PREFIX}{digits}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn counter_starts_at_one_and_pads() {
        let alloc = IdAllocator::with_seed("240101");
        assert_eq!(alloc.next_id(None), "ID_2401010001");
        assert_eq!(alloc.next_id(None), "ID_2401010002");
    }

    #[test]
    fn counter_grows_past_four_digits() {
        let alloc = IdAllocator::with_seed("1");
        alloc.counter.store(9999, Ordering::Relaxed);
        assert_eq!(alloc.next_id(None), "ID_110000");
    }

    #[test]
    fn collisions_are_skipped() {
        let alloc = IdAllocator::with_seed("7");
        let root = Element::new("map");
        let node = root.subelement("node");
        node.set("ID", "ID_70001");
        node.subelement("node").set("ID", "ID_70002");
        assert_eq!(alloc.next_id(Some(&root)), "ID_70003");
    }

    #[test]
    fn ids_are_distinct_and_well_formed() {
        let alloc = IdAllocator::with_seed("991231");
        let pattern = regex::Regex::new(r"^ID_991231\d{4,}$").unwrap();
        let ids: HashSet<String> = (0..500).map(|_| alloc.next_id(None)).collect();
        assert_eq!(ids.len(), 500);
        assert!(ids.iter().all(|id| pattern.is_match(id)));
    }

    #[test]
    fn seed_must_be_digits() {
        let alloc = IdAllocator::with_seed("24-01-01");
        assert_eq!(alloc.seed(), "240101");
    }

    #[test]
    fn normalize_adds_prefix_and_rejects_non_digits() {
        assert_eq!(normalize_id("ID_123").as_deref(), Some("ID_123"));
        assert_eq!(normalize_id("id_123").as_deref(), Some("ID_123"));
        assert_eq!(normalize_id("456").as_deref(), Some("ID_456"));
        assert_eq!(normalize_id("ID_12a"), None);
        assert_eq!(normalize_id("ID_"), None);
        assert_eq!(normalize_id("abc"), None);
    }
}
