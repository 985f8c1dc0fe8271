//! XML text to [`Element`] tree and back.
//!
//! Whitespace is kept as element text and tails on read. On write, elements whose content is only
//! other elements (no text and blank tails) are laid out one child per line, the way the editor
//! writes its files; mixed content is written verbatim.
use crate::{element::Element, error::MindmapError};
use quick_xml::{
    escape::{escape, partial_escape},
    events::{BytesStart, Event},
    Reader,
};
use std::str::from_utf8;

pub fn parse(source: &str) -> Result<Element, MindmapError> {
    let mut reader = Reader::from_str(source);
    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;
    loop {
        match reader.read_event()? {
            Event::Start(start) => {
                let el = element_from(&start)?;
                place(&stack, &mut root, &el)?;
                stack.push(el);
            }
            Event::Empty(start) => {
                let el = element_from(&start)?;
                place(&stack, &mut root, &el)?;
            }
            Event::End(_) => {
                stack.pop();
            }
            Event::Text(text) => {
                let text = text.unescape()?;
                push_text(&stack, &text);
            }
            Event::CData(data) => {
                push_text(&stack, from_utf8(&data)?);
            }
            Event::Eof => break,
            _ => {}
        }
    }
    if let Some(open) = stack.last() {
        return Err(MindmapError::Xml(format!(
            "unexpected end of input inside <{}>",
            open.tag()
        )));
    }
    root.ok_or_else(|| MindmapError::Xml("no root element".to_string()))
}

fn element_from(start: &BytesStart) -> Result<Element, MindmapError> {
    let el = Element::new(from_utf8(start.name().as_ref())?);
    for attr in start.attributes() {
        let attr = attr?;
        let key = from_utf8(attr.key.as_ref())?;
        let value = attr.unescape_value()?;
        el.set(key, value.into_owned());
    }
    Ok(el)
}

fn place(stack: &[Element], root: &mut Option<Element>, el: &Element) -> Result<(), MindmapError> {
    match (stack.last(), root.as_ref()) {
        (Some(parent), _) => {
            parent.append(el);
        }
        (None, None) => *root = Some(el.clone()),
        (None, Some(first)) => {
            return Err(MindmapError::Xml(format!(
                "second root element <{}> after <{}>",
                el.tag(),
                first.tag()
            )))
        }
    }
    Ok(())
}

fn push_text(stack: &[Element], text: &str) {
    let Some(parent) = stack.last() else {
        return;
    };
    match parent.last_child() {
        Some(prev) => prev.push_tail(text),
        None => parent.push_text(text),
    }
}

/// Serialize the tree below `root` (no XML declaration).
pub fn write(root: &Element) -> String {
    let mut out = String::new();
    write_element(root, &mut out);
    out.push('\n');
    out
}

fn is_blank(text: &Option<String>) -> bool {
    text.as_deref().map_or(true, |t| t.trim().is_empty())
}

fn escape_attribute(value: &str) -> String {
    escape(value)
        .replace('\n', "&#xa;")
        .replace('\r', "&#xd;")
        .replace('\t', "&#x9;")
}

fn write_element(el: &Element, out: &mut String) {
    let tag = el.tag();
    let text = el.text();
    let children = el.children();

    out.push('<');
    out.push_str(&tag);
    for (key, value) in el.attributes() {
        out.push(' ');
        out.push_str(&key);
        out.push_str("=\"");
        out.push_str(&escape_attribute(&value));
        out.push('"');
    }
    if children.is_empty() && text.as_deref().map_or(true, str::is_empty) {
        out.push_str("/>");
        return;
    }
    out.push('>');

    let layout = !children.is_empty() && is_blank(&text) && children.iter().all(|c| is_blank(&c.tail()));
    if layout {
        for child in children.iter() {
            out.push('\n');
            write_element(child, out);
        }
        out.push('\n');
    } else {
        if let Some(text) = text {
            out.push_str(&partial_escape(&text));
        }
        for child in children.iter() {
            write_element(child, out);
            if let Some(tail) = child.tail() {
                out.push_str(&partial_escape(&tail));
            }
        }
    }
    out.push_str("</");
    out.push_str(&tag);
    out.push('>');
}
