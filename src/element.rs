//! The attributed element tree that a mindmap document is made of.
//!
//! [`Element`] is a shared handle: cloning it clones the handle, not the subtree. Two handles
//! compare equal (and hash equally) only when they point at the same element, which is what the
//! parent maps in [`crate::parentmap`] rely on.
use parking_lot::RwLock;
use std::{
    fmt,
    hash::{Hash, Hasher},
    sync::{Arc, Weak},
};

#[derive(Debug, Default)]
struct ElementData {
    tag: String,
    attributes: Vec<(String, String)>,
    text: Option<String>,
    tail: Option<String>,
    children: Vec<Element>,
    parent: Weak<RwLock<ElementData>>,
}

/// A tree element: a tag, ordered unique attributes, ordered children, optional inline text and
/// optional tail text (the text between this element's end tag and the next sibling).
///
/// Every method takes at most one lock at a time, so handles may be freely passed around while
/// other handles into the same tree are in use.
#[derive(Clone)]
pub struct Element(Arc<RwLock<ElementData>>);

impl Element {
    pub fn new(tag: impl Into<String>) -> Element {
        Element(Arc::new(RwLock::new(ElementData {
            tag: tag.into(),
            ..Default::default()
        })))
    }

    /// Create an element carrying the given attributes in order.
    pub fn with_attributes<K, V>(tag: impl Into<String>, attributes: &[(K, V)]) -> Element
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let el = Element::new(tag);
        for (k, v) in attributes {
            el.set(k.as_ref(), v.as_ref());
        }
        el
    }

    pub fn tag(&self) -> String {
        self.0.read().tag.clone()
    }

    pub fn is(&self, tag: &str) -> bool {
        self.0.read().tag == tag
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.0
            .read()
            .attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
    }

    pub fn has(&self, key: &str) -> bool {
        self.0.read().attributes.iter().any(|(k, _)| k == key)
    }

    /// Set an attribute, keeping its position when it already exists.
    pub fn set(&self, key: &str, value: impl Into<String>) {
        let value = value.into();
        let mut data = self.0.write();
        match data.attributes.iter_mut().find(|(k, _)| k == key) {
            Some((_, v)) => *v = value,
            None => data.attributes.push((key.to_string(), value)),
        }
    }

    pub fn remove_attribute(&self, key: &str) -> Option<String> {
        let mut data = self.0.write();
        let idx = data.attributes.iter().position(|(k, _)| k == key)?;
        Some(data.attributes.remove(idx).1)
    }

    pub fn attributes(&self) -> Vec<(String, String)> {
        self.0.read().attributes.clone()
    }

    pub fn text(&self) -> Option<String> {
        self.0.read().text.clone()
    }

    pub fn set_text(&self, text: Option<String>) {
        self.0.write().text = text;
    }

    pub fn tail(&self) -> Option<String> {
        self.0.read().tail.clone()
    }

    pub fn set_tail(&self, tail: Option<String>) {
        self.0.write().tail = tail;
    }

    pub(crate) fn push_text(&self, fragment: &str) {
        self.0
            .write()
            .text
            .get_or_insert_with(String::new)
            .push_str(fragment);
    }

    pub(crate) fn push_tail(&self, fragment: &str) {
        self.0
            .write()
            .tail
            .get_or_insert_with(String::new)
            .push_str(fragment);
    }

    pub fn children(&self) -> Vec<Element> {
        self.0.read().children.clone()
    }

    pub fn child_count(&self) -> usize {
        self.0.read().children.len()
    }

    pub fn has_children(&self) -> bool {
        !self.0.read().children.is_empty()
    }

    pub fn child(&self, idx: usize) -> Option<Element> {
        self.0.read().children.get(idx).cloned()
    }

    pub fn last_child(&self) -> Option<Element> {
        self.0.read().children.last().cloned()
    }

    /// First immediate child with the given tag.
    pub fn find(&self, tag: &str) -> Option<Element> {
        self.children().into_iter().find(|c| c.is(tag))
    }

    /// First immediate child with the given tag and attribute value.
    pub fn find_with(&self, tag: &str, key: &str, value: &str) -> Option<Element> {
        self.children()
            .into_iter()
            .find(|c| c.is(tag) && c.get(key).as_deref() == Some(value))
    }

    /// All immediate children with the given tag.
    pub fn find_all(&self, tag: &str) -> Vec<Element> {
        self.children().into_iter().filter(|c| c.is(tag)).collect()
    }

    /// The element and all of its descendants in document order.
    pub fn iter(&self) -> Vec<Element> {
        let mut out = Vec::new();
        let mut stack = vec![self.clone()];
        while let Some(el) = stack.pop() {
            let children = el.children();
            out.push(el);
            stack.extend(children.into_iter().rev());
        }
        out
    }

    /// All descendants (not including the element itself) in document order.
    pub fn descendants(&self) -> Vec<Element> {
        let mut all = self.iter();
        all.remove(0);
        all
    }

    /// Descendants carrying the given tag, in document order.
    pub fn descendants_tagged(&self, tag: &str) -> Vec<Element> {
        self.descendants().into_iter().filter(|e| e.is(tag)).collect()
    }

    pub fn parent(&self) -> Option<Element> {
        self.0.read().parent.upgrade().map(Element)
    }

    pub fn index_of(&self, child: &Element) -> Option<usize> {
        self.0.read().children.iter().position(|c| c == child)
    }

    /// True when `self` is `other` or one of its tree ancestors.
    pub fn contains(&self, other: &Element) -> bool {
        let mut cursor = Some(other.clone());
        while let Some(el) = cursor {
            if &el == self {
                return true;
            }
            cursor = el.parent();
        }
        false
    }

    /// Append `child` as the last child, moving it out of its previous parent. Refuses (returning
    /// false) to create a cycle.
    pub fn append(&self, child: &Element) -> bool {
        let len = self.child_count();
        self.insert(len, child)
    }

    /// Insert `child` at `idx` (clamped to the child count), moving it out of its previous parent.
    pub fn insert(&self, idx: usize, child: &Element) -> bool {
        if child.contains(self) {
            tracing::warn!(
                "refusing to insert <{}> below itself or one of its descendants",
                child.tag()
            );
            return false;
        }
        child.detach();
        child.0.write().parent = Arc::downgrade(&self.0);
        let mut data = self.0.write();
        let idx = idx.min(data.children.len());
        data.children.insert(idx, child.clone());
        true
    }

    /// Create a new child with `tag` at the end of the child list and return it.
    pub fn subelement(&self, tag: &str) -> Element {
        let child = Element::new(tag);
        self.append(&child);
        child
    }

    /// Remove `child` from this element's children. Returns false when it was not a child.
    pub fn remove(&self, child: &Element) -> bool {
        let removed = {
            let mut data = self.0.write();
            match data.children.iter().position(|c| c == child) {
                Some(idx) => {
                    data.children.remove(idx);
                    true
                }
                None => false,
            }
        };
        if removed {
            child.0.write().parent = Weak::new();
        }
        removed
    }

    /// Take the element out of its tree parent, if it has one.
    pub fn detach(&self) -> bool {
        match self.parent() {
            Some(parent) => parent.remove(self),
            None => false,
        }
    }
}

impl PartialEq for Element {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Element {}

impl Hash for Element {
    fn hash<H: Hasher>(&self, state: &mut H) {
        Arc::as_ptr(&self.0).hash(state);
    }
}

impl fmt::Debug for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let data = self.0.read();
        write!(f, "<{}", data.tag)?;
        for (k, v) in data.attributes.iter() {
            write!(f, " {k}={v:?}")?;
        }
        write!(f, "> ({} children)", data.children.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn identity_not_value_equality() {
        let a = Element::new("node");
        let b = Element::new("node");
        assert_ne!(a, b);
        assert_eq!(a, a.clone());

        let mut set = std::collections::HashSet::new();
        set.insert(a.clone());
        set.insert(a.clone());
        set.insert(b);
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn attributes_keep_insertion_order() {
        let el = Element::with_attributes("node", &[("TEXT", "a"), ("ID", "ID_1")]);
        el.set("TEXT", "b");
        el.set("LINK", "#x");
        let keys: Vec<String> = el.attributes().into_iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["TEXT", "ID", "LINK"]);
        assert_eq!(el.get("TEXT").as_deref(), Some("b"));
        assert_eq!(el.remove_attribute("ID").as_deref(), Some("ID_1"));
        assert!(!el.has("ID"));
    }

    #[test]
    fn append_moves_between_parents() {
        let p1 = Element::new("node");
        let p2 = Element::new("node");
        let c = p1.subelement("node");
        assert_eq!(c.parent(), Some(p1.clone()));

        assert!(p2.append(&c));
        assert_eq!(p1.child_count(), 0);
        assert_eq!(c.parent(), Some(p2.clone()));

        // re-appending to the same parent keeps a single entry
        assert!(p2.append(&c));
        assert_eq!(p2.child_count(), 1);
    }

    #[test]
    fn insert_refuses_cycles() {
        let p = Element::new("node");
        let c = p.subelement("node");
        let g = c.subelement("node");
        assert!(!g.append(&p));
        assert!(!c.append(&c));
        assert_eq!(g.child_count(), 0);
        assert!(p.contains(&g));
        assert!(!g.contains(&p));
    }

    #[test]
    fn iter_is_preorder() {
        let root = Element::new("a");
        let b = root.subelement("b");
        b.subelement("c");
        root.subelement("d");
        let tags: Vec<String> = root.iter().iter().map(|e| e.tag()).collect();
        assert_eq!(tags, vec!["a", "b", "c", "d"]);
        assert_eq!(root.descendants().len(), 3);
        assert_eq!(root.descendants_tagged("c").len(), 1);
    }

    #[test]
    fn insert_index_is_clamped() {
        let p = Element::new("node");
        let a = p.subelement("a");
        let b = Element::new("b");
        assert!(p.insert(10, &b));
        assert_eq!(p.index_of(&b), Some(1));
        let c = Element::new("c");
        assert!(p.insert(0, &c));
        assert_eq!(p.index_of(&a), Some(1));
        assert!(p.remove(&a));
        assert!(a.parent().is_none());
        assert!(!p.remove(&a));
    }
}
