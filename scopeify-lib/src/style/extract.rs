use crate::dom::dom_tree::{self, Document, Handle};
use crate::parser::dom_indices::ElementIndex;
use html5ever::{namespace_url, ns, Attribute, LocalName, QualName};
use log::debug;
use std::rc::Rc;

/// Pulls every `<style>` element out of the document.
///
/// Returns the text of all style elements concatenated in document order, with no
/// separator. Each style element is detached from the tree. A document without
/// style elements yields an empty string and is left untouched.
pub fn extract_css(document: &Document) -> String {
    let index = ElementIndex::build(document);
    let styles = index.by_tag("style");

    let mut css = String::new();
    for style in styles {
        css.push_str(&dom_tree::text_content(style));
        dom_tree::remove_from_parent(style);
    }
    if !styles.is_empty() {
        debug!(
            "extracted {} style element(s), {} bytes of css",
            styles.len(),
            css.len()
        );
    }
    css
}

/// Appends a `<style type="text/css">` element holding `css`.
///
/// The element goes at the end of `container`, or of the first `<head>` when no
/// container is given. Returns the new element, or `None` when there is nowhere to
/// put it.
pub fn insert_css(document: &Document, css: &str, container: Option<&Handle>) -> Option<Handle> {
    let container = match container {
        Some(container) => Rc::clone(container),
        None => ElementIndex::build(document).by_tag("head").first().cloned()?,
    };

    let style = dom_tree::new_element(
        QualName::new(None, ns!(html), LocalName::from("style")),
        vec![Attribute {
            name: QualName::new(None, ns!(), LocalName::from("type")),
            value: "text/css".into(),
        }],
    );
    if !css.is_empty() {
        dom_tree::append_child(&style, dom_tree::new_text(css));
    }
    dom_tree::append_child(&container, Rc::clone(&style));
    Some(style)
}
