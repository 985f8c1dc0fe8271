use crate::{element::Element, ident::IdAllocator, mindmap::Mindmap, parentmap::ParentMap};
use parking_lot::RwLock;
use std::{
    collections::HashMap,
    fmt,
    sync::{Arc, Weak},
};

struct BranchInner {
    head: Element,
    parents: RwLock<ParentMap>,
    removals: Removals,
    map: RwLock<Option<Mindmap>>,
    merged_into: RwLock<Option<Branch>>,
    allocator: Arc<IdAllocator>,
}

/// Parent bookkeeping for a subtree that is not (yet) part of a [`Mindmap`].
///
/// When the subtree is attached somewhere, its entries are merged into the destination and the
/// branch records where they went: the document it was attached to, or the branch it was merged
/// into. Node views still holding the branch follow that record back to the current owner.
#[derive(Clone)]
pub struct Branch(Arc<BranchInner>);

impl Branch {
    pub(crate) fn new(head: &Element, allocator: Arc<IdAllocator>) -> Branch {
        Branch(Arc::new(BranchInner {
            head: head.clone(),
            parents: RwLock::new(ParentMap::new()),
            removals: Removals::default(),
            map: RwLock::new(None),
            merged_into: RwLock::new(None),
            allocator,
        }))
    }

    pub(crate) fn allocator(&self) -> Arc<IdAllocator> {
        self.0.allocator.clone()
    }

    /// The element the branch was created for. Once merged elsewhere it is an ordinary node of
    /// the destination.
    pub(crate) fn head(&self) -> &Element {
        &self.0.head
    }

    pub(crate) fn parents(&self) -> &RwLock<ParentMap> {
        &self.0.parents
    }

    pub(crate) fn removals(&self) -> &Removals {
        &self.0.removals
    }

    /// The document this branch was attached to, directly or through branches it was merged into.
    pub fn map(&self) -> Option<Mindmap> {
        let mut cursor = self.clone();
        loop {
            if let Some(map) = cursor.0.map.read().clone() {
                return Some(map);
            }
            let next = cursor.0.merged_into.read().clone();
            match next {
                Some(next) => cursor = next,
                None => return None,
            }
        }
    }

    /// The branch currently responsible for this branch's nodes while no document is involved.
    pub fn current(&self) -> Branch {
        let mut cursor = self.clone();
        loop {
            let next = cursor.0.merged_into.read().clone();
            match next {
                Some(next) => cursor = next,
                None => return cursor,
            }
        }
    }

    pub fn is_attached(&self) -> bool {
        self.map().is_some()
    }

    pub(crate) fn set_map(&self, map: &Mindmap) {
        *self.0.map.write() = Some(map.clone());
    }

    pub(crate) fn set_merged_into(&self, other: &Branch) {
        *self.0.merged_into.write() = Some(other.clone());
    }

    /// Copy of the current entries.
    pub fn snapshot(&self) -> ParentMap {
        self.0.parents.read().clone()
    }
}

/// Where subtrees removed from a map or branch went, keyed by the head of each removed subtree.
///
/// Records hold the new branch weakly: once no view holds that branch any more there is nobody
/// left to forward.
#[derive(Default)]
pub(crate) struct Removals(RwLock<HashMap<Element, Weak<BranchInner>>>);

impl Removals {
    pub(crate) fn record(&self, head: &Element, branch: &Branch) {
        self.0.write().insert(head.clone(), Arc::downgrade(&branch.0));
    }

    pub(crate) fn lookup(&self, head: &Element) -> Option<Branch> {
        self.0.read().get(head).and_then(Weak::upgrade).map(Branch)
    }

    pub(crate) fn forget(&self, head: &Element) {
        self.0.write().remove(head);
    }
}

impl PartialEq for Branch {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Branch {}

impl fmt::Debug for Branch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Branch")
            .field("entries", &self.0.parents.read().len())
            .field("attached", &self.0.map.read().is_some())
            .field("merged", &self.0.merged_into.read().is_some())
            .finish()
    }
}
