//! Plain text views of node content.
//!
//! A node label is stored either in the `TEXT` attribute or as a `richcontent` child holding an
//! HTML fragment. The functions here hide that difference and maintain the rich `DETAILS` and
//! `NOTE` blocks.
use crate::{
    element::Element,
    properties::{RICH_DETAILS, RICH_NODE, RICH_NOTE},
};

const NBSP: char = '\u{a0}';

const BLOCK_TAGS: &[&str] = &["p", "div", "li", "h1", "h2", "h3", "h4", "h5", "h6"];

/// Replace non-breaking spaces with ordinary ones and trim surrounding whitespace.
pub fn normalize(text: &str) -> String {
    text.replace(NBSP, " ").trim().to_string()
}

/// The label of a node element: its `TEXT` attribute verbatim, or else its flattened core rich
/// content, or else the empty string. With `first_line_only`, only the first line (trimmed) is
/// returned.
pub fn extract(el: &Element, first_line_only: bool) -> String {
    let text = match el.get("TEXT") {
        Some(text) => text,
        None => match core_rich_block(el) {
            Some(block) => block_text(&block),
            None => String::new(),
        },
    };
    if first_line_only {
        first_line(&text)
    } else {
        text
    }
}

pub fn first_line(text: &str) -> String {
    text.trim().lines().next().unwrap_or_default().trim().to_string()
}

/// Flatten a markup fragment depth first. Text and non-blank tails are entity decoded and
/// concatenated; a newline follows every paragraph-like block that is followed only by
/// whitespace. Leading and trailing newlines are stripped.
pub fn flatten(body: &Element) -> String {
    flatten_with(body, true)
}

/// Like [`flatten`], but text is taken as stored: entity-like sequences the XML layer already
/// unescaped once are left alone.
pub fn flatten_verbatim(body: &Element) -> String {
    flatten_with(body, false)
}

fn flatten_with(body: &Element, decode: bool) -> String {
    let mut parts = Vec::new();
    flatten_into(body, decode, &mut parts);
    parts.concat().trim_matches('\n').to_string()
}

fn flatten_into(el: &Element, decode: bool, parts: &mut Vec<String>) {
    if let Some(text) = el.text().filter(|t| !t.trim().is_empty()) {
        parts.push(join_fragment(&text, decode));
    }
    for child in el.children() {
        flatten_into(&child, decode, parts);
        let tail = child.tail();
        let tail_is_blank = tail.as_deref().map_or(true, |t| t.trim().is_empty());
        if child.is("br") {
            parts.push("\n".to_string());
        }
        if let Some(tail) = tail.filter(|t| !t.trim().is_empty()) {
            parts.push(join_fragment(&tail, decode));
        }
        if tail_is_blank && BLOCK_TAGS.contains(&child.tag().as_str()) {
            parts.push("\n".to_string());
        }
    }
}

/// Optionally decode HTML entities. Fragments spanning several source lines are pretty-printing
/// artifacts of the writer: their lines are trimmed and joined with single spaces.
fn join_fragment(fragment: &str, decode: bool) -> String {
    let text = if decode {
        html_escape::decode_html_entities(fragment)
    } else {
        fragment.into()
    };
    if text.contains('\n') {
        text.lines()
            .map(|l| l.trim_matches(|c: char| c.is_ascii_whitespace()))
            .filter(|l| !l.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    } else {
        text.into_owned()
    }
}

/// The element whose content holds the text of a `richcontent` block: its `html/body` when
/// present, else the nearest available container.
fn markup_body(block: &Element) -> Element {
    let html = match block.find("html") {
        Some(html) => html,
        None => return block.clone(),
    };
    html.find("body").unwrap_or(html)
}

fn is_core_block(el: &Element) -> bool {
    el.is("richcontent")
        && match el.get("TYPE") {
            None => true,
            Some(kind) => kind == RICH_NODE,
        }
}

/// The `richcontent` child holding the node label, if any.
pub fn core_rich_block(el: &Element) -> Option<Element> {
    el.children().into_iter().find(is_core_block)
}

/// Remove every core `richcontent` child. Returns how many were removed.
pub fn remove_core_rich(el: &Element) -> usize {
    el.children()
        .into_iter()
        .filter(is_core_block)
        .filter(|block| el.remove(block))
        .count()
}

/// The first `richcontent` child of the given `TYPE`.
pub fn rich_block(el: &Element, kind: &str) -> Option<Element> {
    el.find_with("richcontent", "TYPE", kind)
}

/// Flattened, entity decoded text of one core `richcontent` element.
pub fn block_text(block: &Element) -> String {
    flatten(&markup_body(block)).trim().to_string()
}

/// Flattened text of one `richcontent` element, as stored.
pub fn block_text_verbatim(block: &Element) -> String {
    flatten_verbatim(&markup_body(block)).trim().to_string()
}

/// Flattened text of the rich block of the given type, empty when absent. Details and notes are
/// read as stored so they come back exactly as [`set_rich_text`] wrote them.
pub fn rich_text(el: &Element, kind: &str) -> String {
    rich_block(el, kind)
        .map(|block| block_text_verbatim(&block))
        .unwrap_or_default()
}

/// Replace the rich block of the given type with one paragraph per line of `text`. An empty
/// `text` only removes the existing block.
pub fn set_rich_text(el: &Element, kind: &str, text: &str) {
    if let Some(block) = rich_block(el, kind) {
        el.remove(&block);
    }
    if text.is_empty() {
        return;
    }
    let block = Element::with_attributes("richcontent", &[("TYPE", kind)]);
    let html = block.subelement("html");
    html.subelement("head");
    let body = html.subelement("body");
    for line in text.split('\n') {
        let p = body.subelement("p");
        p.set_text(Some(line.trim_end_matches('\r').to_string()));
    }
    el.append(&block);
}

pub fn details(el: &Element) -> String {
    rich_text(el, RICH_DETAILS)
}

pub fn notes(el: &Element) -> String {
    rich_text(el, RICH_NOTE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::xml::{parse, write};
    use test_log::test;

    fn node(xml: &str) -> Element {
        parse(xml).unwrap()
    }

    #[test]
    fn normalize_replaces_nbsp() {
        assert_eq!(normalize("\u{a0}a\u{a0}b "), "a b");
    }

    #[test]
    fn text_attribute_wins() {
        let el = node(r#"<node TEXT="label"><richcontent TYPE="NODE"><html><body><p>rich</p></body></html></richcontent></node>"#);
        assert_eq!(extract(&el, false), "label");
    }

    #[test]
    fn rich_core_paragraphs() {
        let el = node(
            "<node><richcontent TYPE=\"NODE\"><html>\n<head></head>\n<body>\n<p>\n  first &amp;amp; line\n</p>\n<p>second</p>\n</body>\n</html></richcontent></node>",
        );
        assert_eq!(extract(&el, false), "first & line\nsecond");
        assert_eq!(extract(&el, true), "first & line");
    }

    #[test]
    fn untyped_richcontent_counts_as_core() {
        let el = node("<node><richcontent><html><body><p>plain</p></body></html></richcontent></node>");
        assert_eq!(extract(&el, false), "plain");
    }

    #[test]
    fn inline_markup_and_tails() {
        let el = node("<node><richcontent TYPE=\"NODE\"><html><body><p>a <b>bold</b> word</p></body></html></richcontent></node>");
        assert_eq!(extract(&el, false), "a bold word");
    }

    #[test]
    fn nbsp_survives_line_joining() {
        let el = node("<node><richcontent TYPE=\"NODE\"><html><body><p>\n      Rich&#160;<b>heading</b>\n    </p></body></html></richcontent></node>");
        assert_eq!(extract(&el, false), "Rich\u{a0}heading");
    }

    #[test]
    fn first_line_of_plain_attribute() {
        let el = node("<node TEXT=\"one&#xa;two\"/>");
        assert_eq!(extract(&el, true), "one");
    }

    #[test]
    fn missing_content_is_empty() {
        assert_eq!(extract(&Element::new("node"), false), "");
        assert_eq!(details(&Element::new("node")), "");
    }

    #[test]
    fn details_round_trip_by_lines() {
        let el = Element::new("node");
        set_rich_text(&el, RICH_DETAILS, "line one\n\nline three");
        assert_eq!(details(&el), "line one\n\nline three");
        assert_eq!(notes(&el), "");

        set_rich_text(&el, RICH_DETAILS, "replaced");
        assert_eq!(el.find_all("richcontent").len(), 1);
        assert_eq!(details(&el), "replaced");

        set_rich_text(&el, RICH_DETAILS, "");
        assert!(rich_block(&el, RICH_DETAILS).is_none());
    }

    #[test]
    fn details_keep_entity_like_text() {
        let el = Element::new("node");
        set_rich_text(&el, RICH_DETAILS, "a &lt; b\nAT&amp;T");
        assert_eq!(details(&el), "a &lt; b\nAT&amp;T");

        let reparsed = parse(&write(&el)).unwrap();
        assert_eq!(details(&reparsed), "a &lt; b\nAT&amp;T");
    }

    #[test]
    fn remove_core_keeps_details() {
        let el = Element::new("node");
        set_rich_text(&el, RICH_NOTE, "note");
        let core = el.subelement("richcontent");
        core.set("TYPE", RICH_NODE);
        assert_eq!(remove_core_rich(&el), 1);
        assert_eq!(notes(&el), "note");
    }
}
