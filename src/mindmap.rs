use crate::{
    branch::{Branch, Removals},
    codec::{decode_document, encode_document, xml, FormatVersion},
    config::MindmapConfig,
    element::Element,
    error::MindmapError,
    ident::IdAllocator,
    node::{NewNode, Node, Owner},
    parentmap::ParentMap,
    properties::{ArrowStyles, StyleSettings, STYLES_PREDEFINED, STYLES_ROOT, STYLES_USER_DEFINED},
    query::NodeFilter,
    text,
};
use parking_lot::RwLock;
use std::{
    collections::BTreeMap,
    fmt, fs,
    path::Path,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

static NUM_OF_MAPS: AtomicUsize = AtomicUsize::new(0);

pub(crate) struct MindmapInner {
    root: Element,
    rootnode: Element,
    version: RwLock<FormatVersion>,
    parents: RwLock<ParentMap>,
    removals: Removals,
    allocator: Arc<IdAllocator>,
    arrow_styles: RwLock<ArrowStyles>,
}

/// A mindmap document: the `map` element tree, the parent map of every attached node, and the
/// format version it is written with.
///
/// `Mindmap` is a shared handle; clones refer to the same document.
///
/// ```rust
/// use freeplane_dom::{Mindmap, NewNode};
///
/// let map = Mindmap::new();
/// let mut root = map.rootnode();
/// root.set_plaintext("ROOT");
/// root.add_child(NewNode::new("Child").id("ID_9999999999")).unwrap();
///
/// let reloaded = Mindmap::from_bytes(&map.to_bytes()).unwrap();
/// let children = reloaded.rootnode().children();
/// assert_eq!(reloaded.rootnode().plaintext(), "ROOT");
/// assert_eq!(children[0].id(), "ID_9999999999");
/// ```
#[derive(Clone)]
pub struct Mindmap(Arc<MindmapInner>);

impl Default for Mindmap {
    fn default() -> Self {
        Mindmap::new()
    }
}

impl Mindmap {
    /// A fresh document with the default skeleton, using the process-wide identifier allocator.
    pub fn new() -> Mindmap {
        Mindmap::with_allocator(IdAllocator::global())
    }

    pub fn with_allocator(allocator: Arc<IdAllocator>) -> Mindmap {
        Mindmap::skeleton(FormatVersion::default(), allocator, ArrowStyles::default())
    }

    /// A fresh document honoring the configured version, identifier seed and arrow styles.
    pub fn with_config(config: &MindmapConfig) -> Mindmap {
        Mindmap::skeleton(
            FormatVersion::parse(&config.default_version),
            config.allocator(),
            config.arrow_styles.clone(),
        )
    }

    fn skeleton(version: FormatVersion, allocator: Arc<IdAllocator>, arrows: ArrowStyles) -> Mindmap {
        let root = Element::with_attributes("map", &[("version", version.map_attribute())]);
        root.subelement("attribute_registry")
            .set("SHOW_ATTRIBUTES", "hide");

        let rootnode = root.subelement("node");
        rootnode.set("TEXT", "new_mindmap");
        rootnode.set("FOLDED", "false");
        rootnode.set("ID", allocator.next_id(Some(&root)));
        let edge = rootnode.subelement("edge");
        edge.set("STYLE", "horizontal");
        edge.set("COLOR", "#cccccc");

        let hook = Element::with_attributes("hook", &[("NAME", "MapStyle"), ("zoom", "1.00")]);
        rootnode.append(&hook);
        hook.append(&Element::with_attributes(
            "properties",
            &[("show_icon_for_attributes", "false"), ("show_note_icons", "false")],
        ));
        let styles_root = hook
            .subelement("map_styles")
            .subelement("stylenode");
        styles_root.set("LOCALIZED_TEXT", STYLES_ROOT);

        let predefined = Element::with_attributes(
            "stylenode",
            &[("LOCALIZED_TEXT", STYLES_PREDEFINED), ("POSITION", "right")],
        );
        styles_root.append(&predefined);
        let default = Element::with_attributes(
            "stylenode",
            &[("LOCALIZED_TEXT", "default"), ("MAX_WIDTH", "600"), ("COLOR", "#000000"), ("STYLE", "as_parent")],
        );
        predefined.append(&default);
        default.append(&Element::with_attributes(
            "font",
            &[("NAME", "Segoe UI"), ("SIZE", "12"), ("BOLD", "false"), ("ITALIC", "false")],
        ));
        for name in ["defaultstyle.details", "defaultstyle.note"] {
            predefined.subelement("stylenode").set("LOCALIZED_TEXT", name);
        }
        let floating = predefined.subelement("stylenode");
        floating.set("LOCALIZED_TEXT", "defaultstyle.floating");
        floating.subelement("edge").set("STYLE", "hide edge");
        floating.append(&Element::with_attributes(
            "cloud",
            &[("COLOR", "#0f0f0f"), ("SHAPE", "ROUND_RECT")],
        ));

        let user = Element::with_attributes(
            "stylenode",
            &[("LOCALIZED_TEXT", STYLES_USER_DEFINED), ("POSITION", "right")],
        );
        styles_root.append(&user);
        for (name, color, fork) in [
            ("styles.topic", "#18898b", true),
            ("styles.subtopic", "#cc3300", true),
            ("styles.subsubtopic", "#669900", false),
        ] {
            let style = Element::with_attributes("stylenode", &[("LOCALIZED_TEXT", name), ("COLOR", color)]);
            if fork {
                style.set("STYLE", "fork");
            }
            style.append(&Element::with_attributes(
                "font",
                &[("NAME", "Liberation Sans"), ("SIZE", "12"), ("BOLD", "true")],
            ));
            user.append(&style);
        }
        let important = user.subelement("stylenode");
        important.set("LOCALIZED_TEXT", "styles.important");
        important.subelement("icon").set("BUILTIN", "yes");

        Mindmap::assemble(root, rootnode, version, allocator, arrows)
    }

    fn assemble(
        root: Element,
        rootnode: Element,
        version: FormatVersion,
        allocator: Arc<IdAllocator>,
        arrow_styles: ArrowStyles,
    ) -> Mindmap {
        NUM_OF_MAPS.fetch_add(1, Ordering::Relaxed);
        let parents = ParentMap::from_subtree(&rootnode);
        Mindmap(Arc::new(MindmapInner {
            root,
            rootnode,
            version: RwLock::new(version),
            parents: RwLock::new(parents),
            removals: Removals::default(),
            allocator,
            arrow_styles: RwLock::new(arrow_styles),
        }))
    }

    /// Read a map file.
    #[tracing::instrument]
    pub fn open(path: &Path) -> Result<Mindmap, MindmapError> {
        Mindmap::open_with(path, IdAllocator::global())
    }

    #[tracing::instrument(skip(allocator))]
    pub fn open_with(path: &Path, allocator: Arc<IdAllocator>) -> Result<Mindmap, MindmapError> {
        tracing::debug!("reading map file");
        let bytes = fs::read(path)?;
        Mindmap::from_bytes_with(&bytes, allocator)
    }

    /// Parse a map from file contents.
    pub fn from_bytes(bytes: &[u8]) -> Result<Mindmap, MindmapError> {
        Mindmap::from_bytes_with(bytes, IdAllocator::global())
    }

    pub fn from_bytes_with(bytes: &[u8], allocator: Arc<IdAllocator>) -> Result<Mindmap, MindmapError> {
        let (version, root) = decode_document(bytes)?;
        if !root.is("map") {
            return Err(MindmapError::Structure(format!(
                "root element is <{}>, expected <map>",
                root.tag()
            )));
        }
        let rootnode = root
            .find("node")
            .ok_or_else(|| MindmapError::Structure("map has no root node".to_string()))?;
        Ok(Mindmap::assemble(root, rootnode, version, allocator, ArrowStyles::default()))
    }

    /// Write the map file.
    #[tracing::instrument(skip(self))]
    pub fn save(&self, path: &Path) -> Result<(), MindmapError> {
        let bytes = self.to_bytes();
        tracing::debug!("writing {} bytes", bytes.len());
        fs::write(path, bytes)?;
        Ok(())
    }

    /// The file contents for this map, in the encoding its version calls for.
    pub fn to_bytes(&self) -> Vec<u8> {
        encode_document(&self.0.root, &self.version())
    }

    /// The serialized tree before any version-specific escaping or encoding.
    pub fn to_xml_string(&self) -> String {
        xml::write(&self.0.root)
    }

    pub fn version(&self) -> FormatVersion {
        self.0.version.read().clone()
    }

    /// Change the version the map declares and is written with.
    pub fn set_version(&self, version: &str) {
        let version = FormatVersion::parse(version);
        self.0.root.set("version", version.map_attribute());
        *self.0.version.write() = version;
    }

    /// Number of maps created or loaded in this process.
    pub fn num_of_maps() -> usize {
        NUM_OF_MAPS.load(Ordering::Relaxed)
    }

    pub fn root_element(&self) -> &Element {
        &self.0.root
    }

    pub fn rootnode(&self) -> Node {
        Node::from_element(self.0.rootnode.clone(), Owner::Map(self.clone()))
    }

    pub(crate) fn rootnode_element(&self) -> &Element {
        &self.0.rootnode
    }

    pub(crate) fn parents(&self) -> &RwLock<ParentMap> {
        &self.0.parents
    }

    pub(crate) fn removals(&self) -> &Removals {
        &self.0.removals
    }

    pub(crate) fn allocator(&self) -> Arc<IdAllocator> {
        self.0.allocator.clone()
    }

    pub fn arrow_styles(&self) -> ArrowStyles {
        self.0.arrow_styles.read().clone()
    }

    pub fn set_arrow_styles(&self, styles: ArrowStyles) {
        *self.0.arrow_styles.write() = styles;
    }

    /// Build a node outside of any document. It becomes the head of a new branch and can be
    /// attached later with [`Node::attach`]. Returns `None` when an explicit id is malformed.
    pub fn create_node(&self, new: impl Into<NewNode>) -> Option<Node> {
        let element = Element::new("node");
        let branch = Branch::new(&element, self.allocator());
        let head = Node::from_element(element, Owner::Branch(branch));
        head.apply(new.into())
    }

    /// All nodes of the map (root node included) passing `filter`, in document order.
    pub fn find_nodes(&self, filter: &NodeFilter) -> Vec<Node> {
        let candidates = self.0.rootnode.iter().into_iter().filter(|e| e.is("node")).collect();
        filter
            .reduce(candidates)
            .into_iter()
            .map(|el| Node::from_element(el, Owner::Map(self.clone())))
            .collect()
    }

    /// The node carrying `id` (compared exactly), if any.
    pub fn node_by_id(&self, id: &str) -> Option<Node> {
        self.0
            .rootnode
            .iter()
            .into_iter()
            .find(|e| e.is("node") && e.get("ID").as_deref() == Some(id))
            .map(|el| Node::from_element(el, Owner::Map(self.clone())))
    }

    /// Whether `node` is the root node or reachable from it.
    pub fn contains(&self, node: &Node) -> bool {
        node.element() == &self.0.rootnode || self.0.parents.read().contains(node.element())
    }

    fn user_styles_element(&self) -> Option<Element> {
        self.0
            .root
            .descendants_tagged("stylenode")
            .into_iter()
            .find(|e| e.get("LOCALIZED_TEXT").as_deref() == Some(STYLES_USER_DEFINED))
    }

    fn user_style_nodes(&self) -> Vec<(String, Element)> {
        self.user_styles_element()
            .map(|section| {
                section
                    .find_all("stylenode")
                    .into_iter()
                    .filter_map(|s| Some((s.get("TEXT")?, s)))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Names of all user-defined styles.
    pub fn style_names(&self) -> Vec<String> {
        self.user_style_nodes().into_iter().map(|(name, _)| name).collect()
    }

    pub fn has_style(&self, name: &str) -> bool {
        let name = name.to_lowercase();
        self.style_names().iter().any(|n| n.to_lowercase() == name)
    }

    /// User-defined styles declaring at least one facet.
    pub fn styles(&self) -> BTreeMap<String, StyleSettings> {
        self.user_style_nodes()
            .into_iter()
            .map(|(name, el)| (name, StyleSettings::from_style_node(&el)))
            .filter(|(_, settings)| !settings.is_empty())
            .collect()
    }

    /// Add a user-defined style. Returns false when the name is empty or already taken (ignoring
    /// case), or the map has no user style section.
    pub fn add_style(&self, name: &str, settings: &StyleSettings) -> bool {
        if name.is_empty() {
            return false;
        }
        if self.has_style(name) {
            tracing::warn!("style {name:?} already exists, ignoring request");
            return false;
        }
        let Some(section) = self.user_styles_element() else {
            tracing::warn!("map has no user-defined style section, cannot add style {name:?}");
            return false;
        };
        let style = section.subelement("stylenode");
        style.set("TEXT", name);
        settings.apply_to(&style);
        true
    }

    /// Text stored below a tagged section of the map.
    ///
    /// The section is the node carrying an attribute `type = <section>`; below it the node titled
    /// `title`, and below that the node titled `portion`. The result is the portion's rich content
    /// when it has any, else the text of its first child node. When a title matches several
    /// nodes the last one wins.
    pub fn text_portion(&self, section: &str, title: &str, portion: &str) -> Option<String> {
        fn last_titled(below: &Element, title: &str) -> Option<Element> {
            below
                .descendants_tagged("node")
                .into_iter()
                .filter(|n| n.get("TEXT").as_deref() == Some(title))
                .last()
        }
        let section_node = self
            .0
            .root
            .descendants_tagged("attribute")
            .into_iter()
            .filter(|a| {
                a.get("NAME").as_deref() == Some("type") && a.get("VALUE").as_deref() == Some(section)
            })
            .last()
            .and_then(|a| a.parent());
        let Some(section_node) = section_node else {
            tracing::warn!("no node tagged with type={section:?}");
            return None;
        };
        let Some(title_node) = last_titled(&section_node, title) else {
            tracing::warn!("no node titled {title:?} below section {section:?}");
            return None;
        };
        let Some(portion_node) = last_titled(&title_node, portion) else {
            tracing::warn!("no node titled {portion:?} below {title:?}");
            return None;
        };
        let text = match portion_node.descendants_tagged("richcontent").first() {
            Some(block) => text::block_text_verbatim(block),
            None => portion_node.find("node")?.get("TEXT").unwrap_or_default(),
        };
        Some(text.replace("&lt;", "<").replace("&gt;", ">"))
    }

    /// Every way the parent map disagrees with the tree. Empty when consistent.
    pub fn check_parent_map(&self) -> Vec<String> {
        self.0.parents.read().inconsistencies(&self.0.rootnode)
    }
}

impl PartialEq for Mindmap {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Mindmap {}

impl fmt::Debug for Mindmap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mindmap")
            .field("version", &self.0.version.read().as_str())
            .field("nodes", &(self.0.parents.read().len() + 1))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::helpers::{pinned_allocator, pinned_map};
    use test_log::test;

    #[test]
    fn skeleton_layout() {
        let map = pinned_map();
        let root = map.root_element();
        assert_eq!(root.get("version").as_deref(), Some("freeplane 1.3.0"));
        assert!(root.find("attribute_registry").is_some());
        let rootnode = map.rootnode();
        assert_eq!(rootnode.plaintext(), "new_mindmap");
        assert_eq!(rootnode.id(), "ID_0000010001");
        assert!(map.styles().is_empty());
        assert!(map.style_names().is_empty());
        assert!(map.check_parent_map().is_empty());
        let out = map.to_xml_string();
        assert!(out.starts_with("<map version=\"freeplane 1.3.0\">\n<attribute_registry"));
        assert!(out.contains("LOCALIZED_TEXT=\"styles.user-defined\""));
    }

    #[test]
    fn add_style_rejects_duplicates() {
        let map = pinned_map();
        let settings = StyleSettings {
            color: Some("#ff0000".into()),
            fontname: Some("Arial".into()),
            fontsize: Some("14".into()),
            ..Default::default()
        };
        assert!(map.add_style("Warning", &settings));
        assert!(!map.add_style("WARNING", &StyleSettings::default()));
        assert!(map.add_style("plain", &StyleSettings::default()));
        let styles = map.styles();
        assert_eq!(styles.len(), 1);
        assert_eq!(styles["Warning"], settings);
        assert!(map.has_style("PLAIN"));
    }

    #[test]
    fn structure_errors() {
        let res = Mindmap::from_bytes(b"<notamap/>");
        assert!(matches!(res, Err(MindmapError::Structure(_))));
        let res = Mindmap::from_bytes(b"<map version=\"freeplane 1.9.0\"></map>");
        assert!(matches!(res, Err(MindmapError::Structure(_))));
    }

    #[test]
    fn load_builds_parent_map() {
        let src = concat!(
            "<map version=\"freeplane 1.9.13\">\n",
            "<node TEXT=\"r\" ID=\"ID_1\" CREATED=\"1\" MODIFIED=\"1\">\n",
            "<node TEXT=\"a\" ID=\"ID_2\" CREATED=\"1\" MODIFIED=\"1\">\n",
            "<node TEXT=\"b\" ID=\"ID_3\" CREATED=\"1\" MODIFIED=\"1\"/>\n",
            "</node>\n</node>\n</map>\n"
        );
        let map = Mindmap::from_bytes_with(src.as_bytes(), pinned_allocator()).unwrap();
        assert_eq!(map.version().as_str(), "1.9.13");
        assert!(map.check_parent_map().is_empty());
        let b = map.node_by_id("ID_3").unwrap();
        assert_eq!(b.parent().unwrap().id(), "ID_2");
        assert_eq!(map.to_bytes(), src.as_bytes());
    }

    #[test]
    fn text_portion_lookup() {
        let src = concat!(
            "<map version=\"freeplane 1.9.13\">\n",
            "<node TEXT=\"r\" ID=\"ID_1\">\n",
            "<node TEXT=\"manual\" ID=\"ID_2\">\n",
            "<attribute NAME=\"type\" VALUE=\"docs\"/>\n",
            "<node TEXT=\"Intro\" ID=\"ID_3\">\n",
            "<node TEXT=\"summary\" ID=\"ID_4\">\n",
            "<node TEXT=\"a &amp;lt;b&amp;gt; c\" ID=\"ID_5\"/>\n",
            "</node>\n",
            "<node TEXT=\"body\" ID=\"ID_6\">\n",
            "<richcontent TYPE=\"DETAILS\"><html><body><p>rich</p><p>text</p></body></html></richcontent>\n",
            "</node>\n",
            "</node>\n</node>\n</node>\n</map>\n"
        );
        let map = Mindmap::from_bytes_with(src.as_bytes(), pinned_allocator()).unwrap();
        assert_eq!(map.text_portion("docs", "Intro", "summary").as_deref(), Some("a <b> c"));
        assert_eq!(map.text_portion("docs", "Intro", "body").as_deref(), Some("rich\ntext"));
        assert!(map.text_portion("other", "Intro", "body").is_none());
        assert!(map.text_portion("docs", "Intro", "missing").is_none());
    }

    #[test]
    fn counts_maps() {
        let before = Mindmap::num_of_maps();
        let _a = pinned_map();
        let _b = pinned_map();
        assert!(Mindmap::num_of_maps() >= before + 2);
    }

    #[test]
    fn set_version_updates_attribute() {
        let map = pinned_map();
        map.set_version("1.9.13");
        assert_eq!(map.version().as_str(), "1.9.13");
        assert_eq!(
            map.root_element().get("version").as_deref(),
            Some("freeplane 1.9.13")
        );
    }
}
