//! Node search: a text-match combinator plus independent predicates combined with AND semantics.
//!
//! ```rust
//! use freeplane_dom::{query::NodeFilter, Mindmap};
//!
//! let map = Mindmap::new();
//! let mut root = map.rootnode();
//! root.add_child("Apples").unwrap().add_icon("yes");
//! root.add_child("Apple pie").unwrap();
//!
//! let found = map.find_nodes(&NodeFilter::new().core("apple").icon("yes"));
//! assert_eq!(found.len(), 1);
//! assert_eq!(found[0].plaintext(), "Apples");
//! ```
use crate::{
    element::Element,
    properties::{RICH_DETAILS, RICH_NOTE},
    text,
};
use regex::{escape as re_escape, Regex};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::{
    collections::BTreeMap,
    fmt,
    hash::{Hash, Hasher},
    ops::Deref,
};

/// How search strings are compared against node text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MatchOptions {
    /// Whole-string comparison instead of substring search.
    pub exact: bool,
    /// Treat the search string as a regular expression. Takes precedence over `exact`.
    pub regex: bool,
    /// Ignore case in exact comparisons (substring search always ignores case).
    pub case_insensitive: bool,
    /// Treat `\` and `/` as the same separator when comparing attribute values. Stored values
    /// are compared with `/`; a search string is rewritten the same way unless it is a regex,
    /// where `\` starts an escape.
    pub general_path_sep: bool,
    /// Compare links without turning `%20` into spaces.
    pub keep_link_specials: bool,
}

/// A regex that compares and hashes by its source text.
#[derive(Debug, Clone)]
pub struct WrappedRegex(Regex);

struct ReVisitor;

impl<'de> de::Visitor<'de> for ReVisitor {
    type Value = WrappedRegex;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        write!(formatter, "a regex string")
    }

    fn visit_str<E>(self, s: &str) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        Regex::new(s)
            .map(WrappedRegex)
            .map_err(|_e| E::invalid_value(de::Unexpected::Str(s), &self))
    }
}

impl Serialize for WrappedRegex {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.0.as_str())
    }
}

impl<'de> Deserialize<'de> for WrappedRegex {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_str(ReVisitor)
    }
}

impl WrappedRegex {
    /// Compile `pattern`. An invalid pattern is searched for literally. Case folding is written
    /// into the pattern as an inline `(?i)` flag so it survives serialization.
    pub fn new(pattern: &str, case_insensitive: bool) -> WrappedRegex {
        let flags = if case_insensitive { "(?i)" } else { "" };
        match Regex::new(&format!("{flags}{pattern}")) {
            Ok(re) => WrappedRegex(re),
            Err(e) => {
                tracing::warn!("invalid regex {pattern:?} ({e}), matching it literally");
                WrappedRegex(
                    Regex::new(&format!("{flags}{}", re_escape(pattern)))
                        .expect("An escaped string to always succeed as a regex"),
                )
            }
        }
    }
}

impl Hash for WrappedRegex {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.as_str().hash(state);
    }
}

impl PartialEq for WrappedRegex {
    fn eq(&self, other: &Self) -> bool {
        self.0.as_str() == other.0.as_str()
    }
}

impl Eq for WrappedRegex {}

impl Deref for WrappedRegex {
    type Target = Regex;
    fn deref(&self) -> &Regex {
        &self.0
    }
}

/// A compiled search string. Exactly one mode applies, chosen from [`MatchOptions`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Matcher {
    Regex(WrappedRegex),
    Exact(String),
    ExactFold(String),
    Contains(String),
}

impl Matcher {
    pub fn new(search: &str, opts: &MatchOptions) -> Matcher {
        if opts.regex {
            Matcher::Regex(WrappedRegex::new(search, opts.case_insensitive))
        } else if opts.exact && !opts.case_insensitive {
            Matcher::Exact(search.to_string())
        } else if opts.exact {
            Matcher::ExactFold(search.to_lowercase())
        } else {
            Matcher::Contains(search.to_lowercase())
        }
    }

    pub fn is_match(&self, text: &str) -> bool {
        match self {
            Matcher::Regex(re) => re.is_match(text),
            Matcher::Exact(s) => s == text,
            Matcher::ExactFold(s) => *s == text.to_lowercase(),
            Matcher::Contains(s) => text.to_lowercase().contains(s.as_str()),
        }
    }
}

/// Match `search` against `text` under `opts`.
pub fn text_match(search: &str, text: &str, opts: &MatchOptions) -> bool {
    Matcher::new(search, opts).is_match(text)
}

fn link_form(link: &str, keep_specials: bool) -> String {
    let link = link.replace('\\', "/");
    if keep_specials {
        link
    } else {
        link.replace("%20", " ")
    }
}

/// One test against a node element.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodePred {
    // Return nodes whose ID equals the value, ignoring case
    Id(String),
    // Return nodes whose plain text matches
    Core(Matcher),
    // Return nodes having, for every pair, an attribute of that name whose value matches
    Attributes(Vec<(String, Matcher)>, bool),
    // Return nodes whose LINK matches; the flag keeps %20 sequences
    Link(Matcher, bool),
    // Return nodes carrying this builtin icon
    Icon(String),
    // Return nodes whose details text matches
    Details(Matcher),
    // Return nodes whose notes text matches
    Notes(Matcher),
    // Return nodes whose STYLE_REF is one of the (lowercased) names
    Style(Vec<String>),
}

impl NodePred {
    pub fn match_element(&self, el: &Element) -> bool {
        match self {
            NodePred::Id(id) => el
                .get("ID")
                .is_some_and(|own| own.to_lowercase() == id.to_lowercase()),
            NodePred::Core(m) => m.is_match(&text::normalize(&text::extract(el, false))),
            NodePred::Attributes(pairs, general_path_sep) => {
                let attrs: Vec<(String, String)> = el
                    .find_all("attribute")
                    .into_iter()
                    .filter_map(|a| Some((a.get("NAME")?, a.get("VALUE").unwrap_or_default())))
                    .collect();
                pairs.iter().all(|(key, m)| {
                    attrs.iter().any(|(name, value)| {
                        name == key
                            && if *general_path_sep {
                                m.is_match(&value.replace('\\', "/"))
                            } else {
                                m.is_match(value)
                            }
                    })
                })
            }
            NodePred::Link(m, keep_specials) => el
                .get("LINK")
                .is_some_and(|link| m.is_match(&link_form(&link, *keep_specials))),
            NodePred::Icon(icon) => el
                .find_all("icon")
                .iter()
                .any(|i| i.get("BUILTIN").as_deref() == Some(icon.as_str())),
            NodePred::Details(m) => {
                text::rich_block(el, RICH_DETAILS).is_some() && m.is_match(&text::details(el))
            }
            NodePred::Notes(m) => {
                text::rich_block(el, RICH_NOTE).is_some() && m.is_match(&text::notes(el))
            }
            NodePred::Style(names) => el
                .get("STYLE_REF")
                .is_some_and(|style| names.contains(&style.to_lowercase())),
        }
    }
}

/// A set of search criteria. Unset criteria match everything; set ones must all match.
///
/// Criteria are collected as plain values and compiled against the [`MatchOptions`] in effect
/// when the filter is applied, so option setters may be called in any order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeFilter {
    pub id: Option<String>,
    pub core: Option<String>,
    pub attributes: BTreeMap<String, String>,
    pub link: Option<String>,
    pub icon: Option<String>,
    pub details: Option<String>,
    pub notes: Option<String>,
    pub styles: Vec<String>,
    pub options: MatchOptions,
}

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}

impl NodeFilter {
    pub fn new() -> NodeFilter {
        NodeFilter::default()
    }

    pub fn id(mut self, id: &str) -> Self {
        self.id = non_empty(id);
        self
    }

    pub fn core(mut self, core: &str) -> Self {
        self.core = non_empty(core);
        self
    }

    pub fn attribute(mut self, name: &str, value: &str) -> Self {
        self.attributes.insert(name.to_string(), value.to_string());
        self
    }

    pub fn link(mut self, link: &str) -> Self {
        self.link = non_empty(link);
        self
    }

    pub fn icon(mut self, icon: &str) -> Self {
        self.icon = non_empty(icon);
        self
    }

    pub fn details(mut self, details: &str) -> Self {
        self.details = non_empty(details);
        self
    }

    pub fn notes(mut self, notes: &str) -> Self {
        self.notes = non_empty(notes);
        self
    }

    pub fn style(mut self, style: &str) -> Self {
        if !style.is_empty() {
            self.styles.push(style.to_string());
        }
        self
    }

    pub fn exact(mut self, exact: bool) -> Self {
        self.options.exact = exact;
        self
    }

    pub fn regex(mut self, regex: bool) -> Self {
        self.options.regex = regex;
        self
    }

    pub fn case_insensitive(mut self, case_insensitive: bool) -> Self {
        self.options.case_insensitive = case_insensitive;
        self
    }

    pub fn general_path_sep(mut self, general_path_sep: bool) -> Self {
        self.options.general_path_sep = general_path_sep;
        self
    }

    pub fn keep_link_specials(mut self, keep: bool) -> Self {
        self.options.keep_link_specials = keep;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.predicates().is_empty()
    }

    /// Compile the set criteria, in evaluation order.
    pub fn predicates(&self) -> Vec<NodePred> {
        let opts = &self.options;
        let mut preds = Vec::new();
        if let Some(id) = &self.id {
            preds.push(NodePred::Id(id.clone()));
        }
        if let Some(core) = &self.core {
            preds.push(NodePred::Core(Matcher::new(core, opts)));
        }
        if !self.attributes.is_empty() {
            let pairs = self
                .attributes
                .iter()
                .map(|(k, v)| {
                    let v = if opts.general_path_sep && !opts.regex {
                        v.replace('\\', "/")
                    } else {
                        v.clone()
                    };
                    (k.clone(), Matcher::new(&v, opts))
                })
                .collect();
            preds.push(NodePred::Attributes(pairs, opts.general_path_sep));
        }
        if let Some(link) = &self.link {
            // links are compared with `/` separators; regex searches are taken as written
            let search = if opts.regex {
                link.clone()
            } else {
                link_form(link, true)
            };
            preds.push(NodePred::Link(
                Matcher::new(&search, opts),
                opts.keep_link_specials,
            ));
        }
        if let Some(icon) = &self.icon {
            preds.push(NodePred::Icon(icon.clone()));
        }
        if let Some(details) = &self.details {
            preds.push(NodePred::Details(Matcher::new(details, opts)));
        }
        if let Some(notes) = &self.notes {
            preds.push(NodePred::Notes(Matcher::new(notes, opts)));
        }
        if !self.styles.is_empty() {
            preds.push(NodePred::Style(
                self.styles.iter().map(|s| s.to_lowercase()).collect(),
            ));
        }
        preds
    }

    pub fn matches(&self, el: &Element) -> bool {
        self.predicates().iter().all(|p| p.match_element(el))
    }

    /// Narrow `candidates` by each predicate in turn, preserving order.
    pub fn reduce(&self, candidates: Vec<Element>) -> Vec<Element> {
        self.predicates()
            .iter()
            .fold(candidates, |remaining, pred| {
                remaining
                    .into_iter()
                    .filter(|el| pred.match_element(el))
                    .collect()
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::xml::parse;
    use test_log::test;

    fn opts(exact: bool, regex: bool, case_insensitive: bool) -> MatchOptions {
        MatchOptions {
            exact,
            regex,
            case_insensitive,
            ..Default::default()
        }
    }

    #[test]
    fn combinator_modes() {
        assert!(text_match("Foo", "this has foo in it", &opts(false, false, false)));
        assert!(!text_match("foo", "FOO", &opts(true, false, false)));
        assert!(text_match("foo", "FOO", &opts(true, false, true)));
        assert!(text_match("f.o", "foo", &opts(false, true, false)));
        assert!(!text_match("^o", "foo", &opts(true, true, false)));
        assert!(text_match("FOO", "foo", &opts(false, true, true)));
    }

    #[test]
    fn invalid_regex_is_literal() {
        assert!(text_match("a(b", "xa(by", &opts(false, true, false)));
        assert!(!text_match("a(b", "ab", &opts(false, true, false)));
    }

    fn sample() -> Vec<Element> {
        let map = parse(
            r#"<map>
<node TEXT="Alpha" ID="ID_1" LINK="C:\docs\my%20file.txt" STYLE_REF="Topic">
<icon BUILTIN="yes"/>
<attribute NAME="owner" VALUE="ann"/>
<attribute NAME="path" VALUE="a\b"/>
</node>
<node TEXT="alphabet" ID="ID_2" STYLE_REF="important">
<attribute NAME="owner" VALUE="bob"/>
<richcontent TYPE="NOTE"><html><body><p>remember this</p></body></html></richcontent>
</node>
<node TEXT="Beta" ID="ID_3"/>
</map>"#,
        )
        .unwrap();
        map.find_all("node")
    }

    fn ids(els: &[Element]) -> Vec<String> {
        els.iter().filter_map(|e| e.get("ID")).collect()
    }

    #[test]
    fn empty_filter_keeps_everything() {
        assert!(NodeFilter::new().is_empty());
        assert_eq!(NodeFilter::new().reduce(sample()).len(), 3);
    }

    #[test]
    fn id_is_case_insensitive_equality() {
        assert_eq!(ids(&NodeFilter::new().id("id_2").reduce(sample())), vec!["ID_2"]);
        assert!(NodeFilter::new().id("ID_").reduce(sample()).is_empty());
    }

    #[test]
    fn core_modes() {
        assert_eq!(NodeFilter::new().core("ALPHA").reduce(sample()).len(), 2);
        assert_eq!(
            ids(&NodeFilter::new().core("Alpha").exact(true).reduce(sample())),
            vec!["ID_1"]
        );
        assert_eq!(
            ids(&NodeFilter::new().core("^alpha$").regex(true).case_insensitive(true).reduce(sample())),
            vec!["ID_1"]
        );
    }

    #[test]
    fn attributes_all_pairs_must_match() {
        let f = NodeFilter::new().attribute("owner", "ann");
        assert_eq!(ids(&f.reduce(sample())), vec!["ID_1"]);
        let f = NodeFilter::new().attribute("owner", "ann").attribute("path", "a/b");
        assert!(f.reduce(sample()).is_empty());
        let f = f.general_path_sep(true);
        assert_eq!(ids(&f.reduce(sample())), vec!["ID_1"]);
        let f = NodeFilter::new().attribute("Owner", "ann");
        assert!(f.reduce(sample()).is_empty());
    }

    #[test]
    fn link_separators_and_specials() {
        let f = NodeFilter::new().link("c:/docs/my file");
        assert_eq!(ids(&f.reduce(sample())), vec!["ID_1"]);
        let f = NodeFilter::new().link("my file").keep_link_specials(true);
        assert!(f.reduce(sample()).is_empty());
        let f = NodeFilter::new().link("my%20file").keep_link_specials(true);
        assert_eq!(ids(&f.reduce(sample())), vec!["ID_1"]);
    }

    #[test]
    fn icon_notes_and_style() {
        assert_eq!(ids(&NodeFilter::new().icon("yes").reduce(sample())), vec!["ID_1"]);
        assert!(NodeFilter::new().icon("YES").reduce(sample()).is_empty());
        assert_eq!(ids(&NodeFilter::new().notes("REMEMBER").reduce(sample())), vec!["ID_2"]);
        assert!(NodeFilter::new().details("remember").reduce(sample()).is_empty());
        let f = NodeFilter::new().style("topic").style("IMPORTANT");
        assert_eq!(ids(&f.reduce(sample())), vec!["ID_1", "ID_2"]);
    }

    #[test]
    fn regex_searches_keep_their_escapes() {
        let f = NodeFilter::new().link(r"docs/my%20\w+\.txt$").regex(true).keep_link_specials(true);
        assert_eq!(ids(&f.reduce(sample())), vec!["ID_1"]);
        let f = NodeFilter::new().attribute("path", r"^a/\w$").regex(true).general_path_sep(true);
        assert_eq!(ids(&f.reduce(sample())), vec!["ID_1"]);
    }

    #[test]
    fn case_folding_survives_serialization() {
        let pred = NodePred::Core(Matcher::new("^alpha$", &opts(false, true, true)));
        let json = serde_json::to_string(&pred).unwrap();
        let back: NodePred = serde_json::from_str(&json).unwrap();
        assert_eq!(back, pred);
        let el = &sample()[0];
        assert!(pred.match_element(el));
        assert!(back.match_element(el));
    }

    #[test]
    fn and_semantics_is_intersection() {
        let p1 = NodeFilter::new().core("alpha");
        let p2 = NodeFilter::new().attribute("owner", "bob");
        let both = NodeFilter::new().core("alpha").attribute("owner", "bob");
        let a = ids(&p1.reduce(sample()));
        let b = ids(&p2.reduce(sample()));
        let expected: Vec<String> = a.into_iter().filter(|id| b.contains(id)).collect();
        assert_eq!(ids(&both.reduce(sample())), expected);
        assert_eq!(expected, vec!["ID_2"]);
    }
}
