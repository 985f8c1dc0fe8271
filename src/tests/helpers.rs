//! Shared test utilities for unit tests.

use crate::{ident::IdAllocator, mindmap::Mindmap};
use std::sync::Arc;

/// Initialize logging for tests
#[allow(dead_code)]
pub fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init()
        .ok();
}

/// An allocator with a fixed seed, so identifiers are reproducible.
pub fn pinned_allocator() -> Arc<IdAllocator> {
    Arc::new(IdAllocator::with_seed("000001"))
}

/// A fresh default map whose first identifier is `ID_0000010001`.
pub fn pinned_map() -> Mindmap {
    Mindmap::with_allocator(pinned_allocator())
}

/// A small attached tree below a fresh root:
///
/// ```text
/// root
/// ├── A
/// │   ├── A1
/// │   └── A2
/// └── B
/// ```
pub fn sample_map() -> Mindmap {
    init_logging();
    let map = pinned_map();
    let mut root = map.rootnode();
    root.set_plaintext("root");
    let mut a = root.add_child("A").unwrap();
    a.add_child("A1").unwrap();
    a.add_child("A2").unwrap();
    root.add_child("B").unwrap();
    map
}
