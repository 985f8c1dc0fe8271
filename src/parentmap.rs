use crate::element::Element;
use std::collections::HashMap;

/// Node element to node element parent lookup, keyed by element identity.
///
/// Only `node` elements are tracked. The map is maintained alongside the tree by the structural
/// operations on [`crate::Node`] so parent lookups never walk the tree.
#[derive(Debug, Clone, Default)]
pub struct ParentMap(HashMap<Element, Element>);

impl ParentMap {
    pub fn new() -> ParentMap {
        ParentMap::default()
    }

    /// Build the map for every `node` element below `head` (the head itself gets no entry).
    pub fn from_subtree(head: &Element) -> ParentMap {
        let mut map = ParentMap::new();
        map.insert_subtree(head);
        map
    }

    /// Record `parent -> node child` for every node below `head`.
    pub fn insert_subtree(&mut self, head: &Element) {
        let mut stack = vec![head.clone()];
        while let Some(parent) = stack.pop() {
            for child in parent.find_all("node") {
                self.0.insert(child.clone(), parent.clone());
                stack.push(child);
            }
        }
    }

    pub fn parent_of(&self, el: &Element) -> Option<Element> {
        self.0.get(el).cloned()
    }

    pub fn contains(&self, el: &Element) -> bool {
        self.0.contains_key(el)
    }

    pub fn insert(&mut self, child: Element, parent: Element) -> Option<Element> {
        self.0.insert(child, parent)
    }

    /// Copy every entry of `other` into this map.
    pub fn merge(&mut self, other: &ParentMap) {
        self.0
            .extend(other.0.iter().map(|(k, v)| (k.clone(), v.clone())));
    }

    /// Drop the entries of `head` and all nodes below it.
    pub fn remove_subtree(&mut self, head: &Element) {
        self.0.remove(head);
        for el in head.descendants_tagged("node") {
            self.0.remove(&el);
        }
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Element, &Element)> {
        self.0.iter()
    }

    /// Describe every way this map disagrees with the tree below `root`: missing or wrong entries
    /// for reachable nodes, an entry for `root` itself, and entries for unreachable elements.
    pub fn inconsistencies(&self, root: &Element) -> Vec<String> {
        let mut problems = Vec::new();
        if self.contains(root) {
            problems.push("root node has a parent entry".to_string());
        }
        let reachable = root.descendants_tagged("node");
        for el in reachable.iter() {
            match (self.parent_of(el), el.parent()) {
                (Some(mapped), Some(actual)) if mapped == actual => {}
                (Some(_), Some(_)) => {
                    problems.push(format!("{el:?} maps to a parent other than its tree parent"))
                }
                (None, _) => problems.push(format!("{el:?} is reachable but has no entry")),
                (Some(_), None) => problems.push(format!("{el:?} has an entry but no tree parent")),
            }
        }
        if self.len() > reachable.len() {
            for (el, _) in self.iter() {
                if !root.contains(el) {
                    problems.push(format!("{el:?} has an entry but is not reachable"));
                }
            }
        }
        problems
    }
}
