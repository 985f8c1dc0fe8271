//! Node views.
//!
//! A [`Node`] pairs a `node` element with its owner: the [`Mindmap`] it is attached to, or the
//! [`Branch`] tracking it while it is detached. Views are cheap to create and many may exist for
//! the same element at once. Content accessors read and write the element directly; structural
//! operations additionally keep the owner's parent map in step with the tree.
//!
//! Structural operations first [`Node::resolve`] the view: a view created while its subtree was
//! detached still names the old branch after that branch was attached or merged elsewhere, and
//! resolving replaces it with the current owner. Lookups (parent, state, searches) always go
//! through the current owner, whether or not the view has been resolved.
use crate::{
    branch::{Branch, Removals},
    element::Element,
    ident::{normalize_id, IdAllocator},
    mindmap::Mindmap,
    parentmap::ParentMap,
    properties::{
        millis_string, now_millis, parse_millis, ArrowLinkSettings, NodeState, RICH_DETAILS,
        RICH_NOTE,
    },
    query::NodeFilter,
    text,
};
use chrono::{DateTime, Local};
use once_cell::sync::Lazy;
use regex::Regex;
use std::{collections::BTreeMap, fmt, sync::Arc};

static CORELINK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"ID_(\d+)\.text").expect("corelink regex to compile"));

static DRIVE_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^/?[A-Za-z]:/").expect("drive prefix regex to compile"));

static SCHEME_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z]{2,}:/").expect("scheme prefix regex to compile"));

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Owner {
    Map(Mindmap),
    Branch(Branch),
}

impl Owner {
    /// Follow a branch to whatever now owns its nodes.
    fn current(&self) -> Owner {
        match self {
            Owner::Map(map) => Owner::Map(map.clone()),
            Owner::Branch(branch) => match branch.map() {
                Some(map) => Owner::Map(map),
                None => Owner::Branch(branch.current()),
            },
        }
    }

    /// The owner now responsible for `el`: follow the branch forward chain, then the removal
    /// records of `el` and its ancestors until an owner that tracks `el` is found. Detached heads
    /// and elements no record covers keep the forwarded owner.
    fn current_for(&self, el: &Element) -> Owner {
        let start = self.current();
        let mut pending = vec![start.clone()];
        let mut seen: Vec<Owner> = Vec::new();
        while let Some(owner) = pending.pop() {
            if owner.claims(el) {
                return owner;
            }
            if seen.contains(&owner) {
                continue;
            }
            let mut cursor = Some(el.clone());
            let mut forwards = Vec::new();
            while let Some(ancestor) = cursor {
                if let Some(branch) = owner.removals().lookup(&ancestor) {
                    forwards.push(Owner::Branch(branch).current());
                }
                cursor = ancestor.parent();
            }
            // closest ancestor first
            pending.extend(forwards.into_iter().rev());
            seen.push(owner);
        }
        start
    }

    fn claims(&self, el: &Element) -> bool {
        match self {
            Owner::Map(map) => el == map.rootnode_element() || map.parents().read().contains(el),
            Owner::Branch(branch) => el == branch.head() || branch.parents().read().contains(el),
        }
    }

    fn removals(&self) -> &Removals {
        match self {
            Owner::Map(map) => map.removals(),
            Owner::Branch(branch) => branch.removals(),
        }
    }

    fn map(&self) -> Option<Mindmap> {
        match self.current() {
            Owner::Map(map) => Some(map),
            Owner::Branch(_) => None,
        }
    }

    fn allocator(&self) -> Arc<IdAllocator> {
        match self {
            Owner::Map(map) => map.allocator(),
            Owner::Branch(branch) => branch.allocator(),
        }
    }

    fn parent_of(&self, el: &Element) -> Option<Element> {
        match self {
            Owner::Map(map) => map.parents().read().parent_of(el),
            Owner::Branch(branch) => branch.parents().read().parent_of(el),
        }
    }

    fn tracks(&self, el: &Element) -> bool {
        match self {
            Owner::Map(map) => map.parents().read().contains(el),
            Owner::Branch(branch) => branch.parents().read().contains(el),
        }
    }

    fn record(&self, child: Element, parent: Element) {
        match self {
            Owner::Map(map) => map.parents().write().insert(child, parent),
            Owner::Branch(branch) => branch.parents().write().insert(child, parent),
        };
    }

    fn absorb(&self, head: &Element, parent: &Element, entries: &ParentMap) {
        let mut parents = match self {
            Owner::Map(map) => map.parents().write(),
            Owner::Branch(branch) => branch.parents().write(),
        };
        parents.insert(head.clone(), parent.clone());
        parents.merge(entries);
    }

    fn forget_subtree(&self, head: &Element) {
        match self {
            Owner::Map(map) => map.parents().write().remove_subtree(head),
            Owner::Branch(branch) => branch.parents().write().remove_subtree(head),
        }
    }
}

/// Content and placement of a node to be created.
///
/// ```rust
/// use freeplane_dom::NewNode;
///
/// let new = NewNode::new("Label").link("https://freeplane.org").pos(0);
/// assert_eq!(new.core, "Label");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewNode {
    pub core: String,
    pub link: String,
    pub id: String,
    pub style: String,
    /// Position among the node children of the new parent; appended when unset or out of range.
    pub pos: Option<usize>,
}

impl NewNode {
    pub fn new(core: &str) -> NewNode {
        NewNode {
            core: core.to_string(),
            ..Default::default()
        }
    }

    pub fn link(mut self, link: &str) -> Self {
        self.link = link.to_string();
        self
    }

    pub fn id(mut self, id: &str) -> Self {
        self.id = id.to_string();
        self
    }

    pub fn style(mut self, style: &str) -> Self {
        self.style = style.to_string();
        self
    }

    pub fn pos(mut self, pos: usize) -> Self {
        self.pos = Some(pos);
        self
    }
}

impl From<&str> for NewNode {
    fn from(core: &str) -> NewNode {
        NewNode::new(core)
    }
}

impl From<String> for NewNode {
    fn from(core: String) -> NewNode {
        NewNode {
            core,
            ..Default::default()
        }
    }
}

/// Selects one outgoing arrow link.
#[derive(Debug, Clone, Copy)]
pub enum ArrowLinkRef<'a> {
    /// By destination id.
    Id(&'a str),
    /// By position in [`Node::arrowlinks`].
    Index(usize),
    /// By destination node.
    Node(&'a Node),
}

impl<'a> From<&'a str> for ArrowLinkRef<'a> {
    fn from(id: &'a str) -> Self {
        ArrowLinkRef::Id(id)
    }
}

impl From<usize> for ArrowLinkRef<'_> {
    fn from(idx: usize) -> Self {
        ArrowLinkRef::Index(idx)
    }
}

impl<'a> From<&'a Node> for ArrowLinkRef<'a> {
    fn from(node: &'a Node) -> Self {
        ArrowLinkRef::Node(node)
    }
}

/// A view over one `node` element.
#[derive(Debug, Clone)]
pub struct Node {
    element: Element,
    owner: Owner,
}

impl Node {
    /// Wrap an element. Missing `ID`, `CREATED` and `MODIFIED` attributes are filled in.
    pub(crate) fn from_element(element: Element, owner: Owner) -> Node {
        if element.get("ID").map_or(true, |id| id.is_empty()) {
            let tree = owner.map().map(|map| map.root_element().clone());
            element.set("ID", owner.allocator().next_id(tree.as_ref()));
        }
        for key in ["CREATED", "MODIFIED"] {
            if element.get(key).map_or(true, |v| v.is_empty()) {
                element.set(key, now_millis());
            }
        }
        Node { element, owner }
    }

    fn wrap(&self, element: Element) -> Node {
        Node::from_element(element, self.current_owner())
    }

    fn current_owner(&self) -> Owner {
        self.owner.current_for(&self.element)
    }

    pub(crate) fn apply(mut self, new: NewNode) -> Option<Node> {
        self.set_plaintext(&new.core);
        if !new.id.is_empty() && !self.set_id(&new.id) {
            return None;
        }
        if !new.link.is_empty() {
            self.set_hyperlink(&new.link);
        }
        if !new.style.is_empty() {
            self.set_style(&new.style);
        }
        Some(self)
    }

    pub fn element(&self) -> &Element {
        &self.element
    }

    /// The document this node belongs to, if any.
    pub fn mindmap(&self) -> Option<Mindmap> {
        self.current_owner().map()
    }

    /// The branch tracking this node while it is detached.
    pub fn branch(&self) -> Option<Branch> {
        match self.current_owner() {
            Owner::Branch(branch) => Some(branch),
            Owner::Map(_) => None,
        }
    }

    /// Replace a stale owner reference with the current owner.
    pub fn resolve(&mut self) -> &mut Self {
        let current = self.current_owner();
        if current != self.owner {
            tracing::debug!("node {} re-resolved to its current owner", self.id());
            self.owner = current;
        }
        self
    }

    pub fn state(&self) -> NodeState {
        match self.current_owner() {
            Owner::Map(map) => {
                if &self.element == map.rootnode_element() {
                    NodeState::Root
                } else if map.parents().read().contains(&self.element) {
                    NodeState::Attached
                } else if self.element.parent().is_some() {
                    // taken out of the map with no branch left to forward to
                    NodeState::DetachedInterior
                } else {
                    NodeState::DetachedHead
                }
            }
            Owner::Branch(branch) => {
                if branch.parents().read().contains(&self.element) {
                    NodeState::DetachedInterior
                } else {
                    NodeState::DetachedHead
                }
            }
        }
    }

    pub fn is_root_node(&self) -> bool {
        self.state() == NodeState::Root
    }

    /// Attached to a document (the root node included).
    pub fn is_map_node(&self) -> bool {
        matches!(self.state(), NodeState::Root | NodeState::Attached)
    }

    pub fn is_detached_head(&self) -> bool {
        self.state() == NodeState::DetachedHead
    }

    pub fn is_detached_node(&self) -> bool {
        self.state() == NodeState::DetachedInterior
    }

    // identity

    pub fn id(&self) -> String {
        self.element.get("ID").unwrap_or_default()
    }

    /// Set the identifier. A missing `ID_` prefix is added; anything but digits after it is
    /// refused.
    pub fn set_id(&self, id: &str) -> bool {
        match normalize_id(id) {
            Some(id) => {
                self.element.set("ID", id);
                true
            }
            None => false,
        }
    }

    pub fn creation_date(&self) -> Option<DateTime<Local>> {
        self.element.get("CREATED").and_then(|v| parse_millis(&v))
    }

    pub fn modification_date(&self) -> Option<DateTime<Local>> {
        self.element.get("MODIFIED").and_then(|v| parse_millis(&v))
    }

    pub fn set_modified(&self, when: DateTime<Local>) {
        self.element.set("MODIFIED", millis_string(when));
    }

    fn touch(&self) {
        self.element.set("MODIFIED", now_millis());
    }

    // navigation

    /// The parent node, looked up in the owner's parent map. The root node and detached heads
    /// have none.
    pub fn parent(&self) -> Option<Node> {
        let owner = self.current_owner();
        if let Owner::Map(map) = &owner {
            if &self.element == map.rootnode_element() {
                return None;
            }
        }
        match owner.parent_of(&self.element) {
            Some(parent) => Some(Node::from_element(parent, owner)),
            None => {
                match owner {
                    Owner::Map(_) => {
                        tracing::warn!("node {} has no parent entry in its map", self.id())
                    }
                    Owner::Branch(_) => {
                        tracing::warn!("detached head {} has no parent", self.id())
                    }
                }
                None
            }
        }
    }

    fn node_children(&self) -> Vec<Element> {
        self.element.find_all("node")
    }

    pub fn children(&self) -> Vec<Node> {
        self.node_children().into_iter().map(|el| self.wrap(el)).collect()
    }

    pub fn has_children(&self) -> bool {
        self.element.children().iter().any(|c| c.is("node"))
    }

    pub fn child_by_index(&self, idx: usize) -> Option<Node> {
        match self.node_children().into_iter().nth(idx) {
            Some(el) => Some(self.wrap(el)),
            None => {
                tracing::warn!("node {} has no child at index {idx}", self.id());
                None
            }
        }
    }

    /// Position among the parent's node children; 0 for the root node and parentless nodes.
    pub fn index(&self) -> usize {
        if self.is_root_node() {
            return 0;
        }
        self.element
            .parent()
            .and_then(|p| p.find_all("node").iter().position(|c| c == &self.element))
            .unwrap_or(0)
    }

    fn sibling(&self, offset: isize) -> Option<Node> {
        let siblings = self.element.parent()?.find_all("node");
        let idx = siblings.iter().position(|c| c == &self.element)?;
        let target = idx.checked_add_signed(offset)?;
        siblings.get(target).cloned().map(|el| self.wrap(el))
    }

    #[allow(clippy::should_implement_trait)]
    pub fn next(&self) -> Option<Node> {
        self.sibling(1)
    }

    pub fn previous(&self) -> Option<Node> {
        self.sibling(-1)
    }

    /// Child indices leading from this node down to `descendant`.
    ///
    /// Computed by walking up from `descendant`. If `descendant` is not below this node the walk
    /// runs to the top of its tree and the returned chain is meaningless.
    pub fn get_indexchain_until(&self, descendant: &Node) -> Vec<usize> {
        let mut chain = Vec::new();
        let mut cursor = descendant.clone();
        while cursor.element != self.element {
            let Some(parent) = cursor.parent() else {
                break;
            };
            if let Some(idx) = parent.node_children().iter().position(|c| c == &cursor.element) {
                chain.push(idx);
            }
            cursor = parent;
        }
        chain.reverse();
        chain
    }

    pub fn is_descendant_of(&self, ancestor: &Node) -> bool {
        let mut cursor = self.parent();
        while let Some(node) = cursor {
            if node.element == ancestor.element {
                return true;
            }
            cursor = node.parent();
        }
        false
    }

    /// The top of the element tree this node lives in: the `map` element for attached nodes, the
    /// topmost element of the branch otherwise.
    fn scope_root(&self) -> Element {
        if let Some(map) = self.current_owner().map() {
            return map.root_element().clone();
        }
        let mut top = self.element.clone();
        while let Some(parent) = top.parent() {
            top = parent;
        }
        top
    }

    fn find_by_id(&self, id: &str) -> Option<Node> {
        let id = id.to_lowercase();
        self.scope_root()
            .iter()
            .into_iter()
            .find(|e| e.is("node") && e.get("ID").is_some_and(|own| own.to_lowercase() == id))
            .map(|el| self.wrap(el))
    }

    /// Nodes below this one (and this one, with `find_in_self`) passing `filter`.
    pub fn find_nodes(&self, filter: &NodeFilter, find_in_self: bool) -> Vec<Node> {
        let mut candidates = if find_in_self {
            self.element.iter()
        } else {
            self.element.descendants()
        };
        candidates.retain(|e| e.is("node"));
        filter
            .reduce(candidates)
            .into_iter()
            .map(|el| self.wrap(el))
            .collect()
    }

    /// Immediate children passing `filter`.
    pub fn find_children(&self, filter: &NodeFilter) -> Vec<Node> {
        filter
            .reduce(self.node_children())
            .into_iter()
            .map(|el| self.wrap(el))
            .collect()
    }

    // text content

    pub fn plaintext(&self) -> String {
        text::normalize(&text::extract(&self.element, false))
    }

    /// Store `text` in the `TEXT` attribute, dropping rich core content, and stamp `MODIFIED`.
    pub fn set_plaintext(&self, text: &str) {
        self.element.set("TEXT", text);
        text::remove_core_rich(&self.element);
        self.touch();
    }

    /// As [`Node::set_plaintext`] with an explicit modification time.
    pub fn set_plaintext_at(&self, text: &str, modified: DateTime<Local>) {
        self.set_plaintext(text);
        self.set_modified(modified);
    }

    pub fn details(&self) -> String {
        text::details(&self.element)
    }

    pub fn set_details(&self, details: &str) {
        text::set_rich_text(&self.element, RICH_DETAILS, details);
    }

    pub fn notes(&self) -> String {
        text::notes(&self.element)
    }

    pub fn set_notes(&self, notes: &str) {
        text::set_rich_text(&self.element, RICH_NOTE, notes);
    }

    /// `TEXT` of the first child node.
    pub fn comment(&self) -> String {
        self.element
            .find("node")
            .and_then(|c| c.get("TEXT"))
            .unwrap_or_default()
    }

    /// Text of the first node below the child whose `TEXT` is `token`, or of the first child when
    /// `token` is empty.
    pub fn sub_text(&self, token: &str) -> String {
        let target = if token.is_empty() {
            self.element.find("node")
        } else {
            self.element
                .find_with("node", "TEXT", token)
                .and_then(|t| t.find("node"))
        };
        target
            .map(|el| text::extract(&el, false))
            .unwrap_or_default()
    }

    /// The id referenced by a `=...ID_<digits>.text...` formula on the first line of the node
    /// text, or empty.
    pub fn corelink(&self) -> String {
        let text = self.plaintext();
        if !text.starts_with('=') {
            return String::new();
        }
        let first_line = text.lines().next().unwrap_or_default();
        CORELINK
            .captures(first_line)
            .map(|caps| format!("ID_{}", &caps[1]))
            .unwrap_or_default()
    }

    pub fn follow_corelink(&self) -> Option<Node> {
        let target = self.corelink();
        if target.is_empty() {
            return None;
        }
        let found = self.find_by_id(&target);
        if found.is_none() {
            tracing::warn!("node {target} referenced by {} not found", self.id());
        }
        found
    }

    /// The corelink target's text when there is one, else the node's own text.
    pub fn visibletext(&self) -> String {
        match self.follow_corelink() {
            Some(target) => target.plaintext(),
            None => self.plaintext(),
        }
    }

    // links

    pub fn hyperlink(&self) -> String {
        self.element.get("LINK").unwrap_or_default()
    }

    pub fn set_hyperlink(&self, link: &str) {
        self.element.set("LINK", link);
        self.touch();
    }

    pub fn has_internal_hyperlink(&self) -> bool {
        self.hyperlink().starts_with('#')
    }

    pub fn follow_internal_hyperlink(&self) -> Option<Node> {
        if !self.has_internal_hyperlink() {
            return None;
        }
        let link = self.hyperlink();
        let target = &link[1..];
        let found = self.find_by_id(target);
        if found.is_none() {
            tracing::warn!("node {target} linked from {} not found", self.id());
        }
        found
    }

    // images

    fn image_hook(&self) -> Option<Element> {
        let hook = self.element.find_with("hook", "NAME", "ExternalObject");
        if hook.is_none() {
            tracing::warn!("node {} does not contain an inline image", self.id());
        }
        hook
    }

    /// Path of the inline image, without the `file://` scheme.
    pub fn image_path(&self) -> Option<String> {
        let uri = self.image_hook()?.get("URI").unwrap_or_default();
        let path = uri.replace("file://", "");
        if path.starts_with('/') && DRIVE_PREFIX.is_match(&path) {
            return Some(path[1..].to_string());
        }
        Some(path)
    }

    pub fn image_size(&self) -> Option<String> {
        Some(self.image_hook()?.get("SIZE").unwrap_or_default())
    }

    /// Set or replace the inline image. Local paths become `file://` URIs (absolute) or `./`
    /// relative paths; links with a scheme are kept.
    pub fn set_image(&self, link: &str, size: &str) -> bool {
        let link = link.replace('\\', "/");
        if link.is_empty() {
            tracing::warn!("empty image link for node {}", self.id());
            return false;
        }
        let uri = if link.starts_with('/') {
            format!("file://{link}")
        } else if DRIVE_PREFIX.is_match(&link) {
            format!("file:///{link}")
        } else if link.starts_with('.') || SCHEME_PREFIX.is_match(&link) {
            link
        } else {
            format!("./{link}")
        };
        let hook = match self.element.find_with("hook", "NAME", "ExternalObject") {
            Some(hook) => hook,
            None => {
                let hook = self.element.subelement("hook");
                hook.set("NAME", "ExternalObject");
                hook
            }
        };
        hook.set("URI", uri);
        hook.set("SIZE", size);
        self.touch();
        true
    }

    // attributes

    /// Attribute name to value. Later duplicates win.
    pub fn attributes(&self) -> BTreeMap<String, String> {
        self.attribute_list().into_iter().collect()
    }

    /// Attributes in document order, duplicates included.
    pub fn attribute_list(&self) -> Vec<(String, String)> {
        self.element
            .find_all("attribute")
            .into_iter()
            .filter_map(|a| {
                let name = a.get("NAME").filter(|n| !n.is_empty())?;
                Some((name, a.get("VALUE").unwrap_or_default()))
            })
            .collect()
    }

    fn attribute_elements(&self, key: &str) -> Vec<Element> {
        let key = key.to_lowercase();
        self.element
            .find_all("attribute")
            .into_iter()
            .filter(|a| a.get("NAME").is_some_and(|n| n.to_lowercase() == key))
            .collect()
    }

    /// Set the value of every attribute named `key` (ignoring case), or add one.
    pub fn set_attribute(&self, key: &str, value: &str) {
        let existing = self.attribute_elements(key);
        if existing.is_empty() {
            self.add_attribute(key, value);
        }
        for attr in existing {
            attr.set("VALUE", value);
        }
    }

    /// Add an attribute, even when one with the same name exists.
    pub fn add_attribute(&self, key: &str, value: &str) {
        if key.is_empty() {
            return;
        }
        self.element.append(&Element::with_attributes(
            "attribute",
            &[("NAME", key), ("VALUE", value)],
        ));
    }

    /// Remove the first attribute named `key` (ignoring case).
    pub fn remove_attribute(&self, key: &str) -> bool {
        match self.attribute_elements(key).first() {
            Some(attr) => self.element.remove(attr),
            None => false,
        }
    }

    // icons

    pub fn icons(&self) -> Vec<String> {
        self.element
            .find_all("icon")
            .into_iter()
            .filter_map(|i| i.get("BUILTIN").filter(|b| !b.is_empty()))
            .collect()
    }

    pub fn add_icon(&self, icon: &str) {
        if !icon.is_empty() {
            self.element.subelement("icon").set("BUILTIN", icon);
        }
    }

    /// Remove the first icon named `icon` (ignoring case).
    pub fn del_icon(&self, icon: &str) -> bool {
        let icon = icon.to_lowercase();
        let found = self
            .element
            .find_all("icon")
            .into_iter()
            .find(|i| i.get("BUILTIN").is_some_and(|b| b.to_lowercase() == icon));
        match found {
            Some(el) => self.element.remove(&el),
            None => false,
        }
    }

    // style

    pub fn style(&self) -> String {
        self.element.get("STYLE_REF").unwrap_or_default()
    }

    /// Reference a user-defined style; an empty name removes the reference. Unknown names are
    /// written anyway, with a warning.
    pub fn set_style(&mut self, style: &str) {
        self.resolve();
        if style.is_empty() {
            self.element.remove_attribute("STYLE_REF");
            return;
        }
        match self.owner.map() {
            Some(map) if !map.has_style(style) => {
                tracing::warn!("style {style:?} not found in map, make sure it exists")
            }
            Some(_) => {}
            None => tracing::warn!(
                "setting style {style:?} on detached node {}, it cannot be checked",
                self.id()
            ),
        }
        self.element.set("STYLE_REF", style);
    }

    // arrow links

    /// Draw an arrow link to `target`. Returns false when one already exists.
    pub fn add_arrowlink(&self, target: &Node, settings: &ArrowLinkSettings) -> bool {
        let destination = target.id();
        if self
            .element
            .find_with("arrowlink", "DESTINATION", &destination)
            .is_some()
        {
            tracing::warn!("node {} already links to {destination}", self.id());
            return false;
        }
        let link = self.element.subelement("arrowlink");
        settings.apply_to(&link);
        link.set("DESTINATION", destination);
        true
    }

    /// Draw an arrow link using a named preset of the map's arrow styles.
    pub fn add_arrowlink_styled(&self, target: &Node, style: &str) -> bool {
        let preset = self
            .mindmap()
            .and_then(|map| map.arrow_styles().get(style).cloned());
        let settings = preset.unwrap_or_else(|| {
            tracing::warn!("arrow style {style:?} not found, using defaults");
            ArrowLinkSettings::default()
        });
        self.add_arrowlink(target, &settings)
    }

    /// Targets of outgoing arrow links. Links to missing nodes are skipped.
    pub fn arrowlinks(&self) -> Vec<Node> {
        self.element
            .find_all("arrowlink")
            .into_iter()
            .filter_map(|link| {
                let destination = link.get("DESTINATION").unwrap_or_default();
                let found = self.find_by_id(&destination);
                if found.is_none() {
                    tracing::warn!("arrow link target {destination} not found");
                }
                found
            })
            .collect()
    }

    /// Nodes with an arrow link pointing at this node.
    pub fn arrowlinked(&self) -> Vec<Node> {
        let id = self.id();
        self.scope_root()
            .descendants_tagged("arrowlink")
            .into_iter()
            .filter(|link| link.get("DESTINATION").as_deref() == Some(id.as_str()))
            .filter_map(|link| link.parent())
            .map(|el| self.wrap(el))
            .collect()
    }

    pub fn del_arrowlink<'a>(&self, target: impl Into<ArrowLinkRef<'a>>) -> bool {
        let destination = match target.into() {
            ArrowLinkRef::Id(id) => id.to_string(),
            ArrowLinkRef::Node(node) => node.id(),
            ArrowLinkRef::Index(idx) => match self.arrowlinks().get(idx) {
                Some(node) => node.id(),
                None => return false,
            },
        };
        match self
            .element
            .find_with("arrowlink", "DESTINATION", &destination)
        {
            Some(link) => self.element.remove(&link),
            None => false,
        }
    }

    // structure

    fn element_index_for(&self, pos: Option<usize>) -> usize {
        let children = self.element.children();
        pos.and_then(|pos| {
            children
                .iter()
                .enumerate()
                .filter(|(_, c)| c.is("node"))
                .nth(pos)
                .map(|(i, _)| i)
        })
        .unwrap_or(children.len())
    }

    /// Create a child node and record it in this node's map or branch. Returns `None` when the
    /// requested id is malformed.
    pub fn add_child(&mut self, new: impl Into<NewNode>) -> Option<Node> {
        self.resolve();
        if matches!(self.owner, Owner::Map(_)) && !self.is_map_node() {
            tracing::warn!("node {} is no longer part of its map", self.id());
            return None;
        }
        let new = new.into();
        let pos = new.pos;
        let child = Node::from_element(Element::new("node"), self.owner.clone()).apply(new)?;
        self.element.insert(self.element_index_for(pos), &child.element);
        self.owner
            .record(child.element.clone(), self.element.clone());
        Some(child)
    }

    /// Create a sibling node below this node's parent. The root node and detached heads have no
    /// parent to add to.
    pub fn add_sibling(&mut self, new: impl Into<NewNode>) -> Option<Node> {
        self.resolve();
        match self.state() {
            NodeState::Root => {
                tracing::warn!("the root node cannot have siblings");
                return None;
            }
            NodeState::DetachedHead => {
                tracing::warn!("a detached head has no parent to add a sibling to, create a new node instead");
                return None;
            }
            NodeState::Attached | NodeState::DetachedInterior => {}
        }
        let mut parent = self.parent()?;
        parent.add_child(new)
    }

    /// The parent map entries of the subtree below `self`, as its owner tracks them.
    fn subtree_entries(&self) -> ParentMap {
        match &self.owner {
            Owner::Branch(branch) => branch.snapshot(),
            Owner::Map(_) => ParentMap::from_subtree(&self.element),
        }
    }

    /// Move the detached branch headed by `other` below this node.
    ///
    /// Allowed when this node is attached to a document (the branch joins the document) or is
    /// itself detached (the branch joins this node's branch). Refused, with a warning, when
    /// `other` is already part of the destination or any document, is not a branch head, or
    /// would end up below itself.
    pub fn attach(&mut self, other: &mut Node, pos: Option<usize>) -> bool {
        self.resolve();
        other.resolve();
        if self.element == other.element {
            tracing::warn!("cannot attach node {} to itself", self.id());
            return false;
        }
        if self.owner.tracks(&other.element) {
            tracing::warn!("node {} is already attached here", other.id());
            return false;
        }
        let other_state = other.state();
        match other_state {
            NodeState::DetachedInterior => {
                tracing::warn!(
                    "node {} is inside a detached branch, only branch heads can be attached",
                    other.id()
                );
                return false;
            }
            NodeState::Root | NodeState::Attached => {
                tracing::warn!("node {} is already attached to a map", other.id());
                return false;
            }
            NodeState::DetachedHead => {}
        }
        if other.element.contains(&self.element) {
            tracing::warn!("cannot attach node {} below its own branch", other.id());
            return false;
        }

        let source = match &other.owner {
            Owner::Branch(branch) => Some(branch.clone()),
            Owner::Map(_) => None,
        };
        let entries = other.subtree_entries();
        let idx = self.element_index_for(pos);
        match (self.state(), &self.owner) {
            (NodeState::Root | NodeState::Attached, Owner::Map(map)) => {
                if !self.element.insert(idx, &other.element) {
                    return false;
                }
                if let Owner::Map(previous) = &other.owner {
                    previous.parents().write().remove_subtree(&other.element);
                }
                self.owner.absorb(&other.element, &self.element, &entries);
                map.removals().forget(&other.element);
                if let Some(source) = source {
                    *source.parents().write() = ParentMap::new();
                    source.set_map(map);
                }
                other.owner = Owner::Map(map.clone());
                true
            }
            (NodeState::DetachedHead | NodeState::DetachedInterior, Owner::Branch(target)) => {
                if !self.element.insert(idx, &other.element) {
                    return false;
                }
                self.owner.absorb(&other.element, &self.element, &entries);
                if let Some(source) = source.filter(|source| source != target) {
                    *source.parents().write() = ParentMap::new();
                    source.set_merged_into(target);
                }
                other.owner = Owner::Branch(target.clone());
                true
            }
            (state, _) => {
                tracing::warn!("cannot attach to node {} in state {state}", self.id());
                false
            }
        }
    }

    /// Take this node (and its subtree) out of the tree. It becomes the head of a new detached
    /// branch. The root node and detached heads cannot be removed.
    pub fn remove(&mut self) -> bool {
        self.resolve();
        match self.state() {
            NodeState::Root => {
                tracing::warn!("the root node cannot be removed");
                return false;
            }
            NodeState::DetachedHead => {
                tracing::warn!("detached head {} has no parent to be removed from", self.id());
                return false;
            }
            NodeState::Attached | NodeState::DetachedInterior => {}
        }
        let Some(parent) = self.owner.parent_of(&self.element) else {
            return false;
        };
        parent.remove(&self.element);
        self.owner.forget_subtree(&self.element);
        let branch = Branch::new(&self.element, self.owner.allocator());
        branch.parents().write().insert_subtree(&self.element);
        self.owner.removals().record(&self.element, &branch);
        self.owner = Owner::Branch(branch);
        true
    }
}

impl PartialEq for Node {
    /// Views are equal when they wrap the same element.
    fn eq(&self, other: &Self) -> bool {
        self.element == other.element
    }
}

impl Eq for Node {}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.plaintext())
    }
}
