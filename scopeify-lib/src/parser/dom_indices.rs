use std::collections::HashMap;
use std::rc::Rc;

use crate::dom::dom_tree::{Document, Handle, Node};

/// Document-order snapshot of every element, for walks that mutate the tree.
#[derive(Debug, Default)]
pub struct ElementIndex {
    /// Every element, in pre-order document order.
    elements: Vec<Handle>,
    /// Maps a lowercase tag name (e.g., "div") to all nodes with that tag.
    tag_map: HashMap<String, Vec<Handle>>,
}

impl ElementIndex {
    /// Build the index for the entire document.
    pub fn build(document: &Document) -> Self {
        Self::build_from(&document.root)
    }

    /// Build the index for the subtree below (and including) `node`.
    pub fn build_from(node: &Handle) -> Self {
        let mut index = ElementIndex::default();
        Self::traverse(node, &mut index);
        index
    }

    /// Recursively traverse the DOM tree and populate the index.
    fn traverse(node: &Handle, index: &mut ElementIndex) {
        let Ok(node_ref) = node.try_borrow() else {
            // Somebody holds this node mutably; keep it so the walk reports it.
            index.elements.push(Rc::clone(node));
            return;
        };
        match &*node_ref {
            Node::DocumentRoot(root) => {
                for child in &root.children {
                    Self::traverse(child, index);
                }
            }
            Node::Element(elem) => {
                let tag = elem.tag_name();
                index.elements.push(Rc::clone(node));
                // Template content is inert: the template is listed, its content is not.
                let inert = tag == "template";
                index.tag_map.entry(tag).or_default().push(Rc::clone(node));
                if inert {
                    return;
                }
                for child in &elem.children {
                    Self::traverse(child, index);
                }
            }
            Node::Text(_) | Node::Comment(_) => {
                // Not elements.
            }
        }
    }

    pub fn elements(&self) -> &[Handle] {
        &self.elements
    }

    /// All elements with the given tag, in document order.
    pub fn by_tag(&self, tag: &str) -> &[Handle] {
        self.tag_map
            .get(&tag.to_ascii_lowercase())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::scope_html::create_dom_tree;
    use pretty_assertions::assert_eq;

    fn tags(index: &ElementIndex) -> Vec<String> {
        index
            .elements()
            .iter()
            .filter_map(|handle| handle.borrow().as_element().map(|elem| elem.tag.clone()))
            .collect()
    }

    #[test]
    fn test_document_order() {
        let document =
            create_dom_tree("<div><p><em>a</em></p><ul><li>1</li><li>2</li></ul></div><span></span>");
        let index = ElementIndex::build(&document);
        assert_eq!(
            tags(&index),
            vec!["html", "head", "body", "div", "p", "em", "ul", "li", "li", "span"]
        );
        assert_eq!(index.by_tag("LI").len(), 2);
        assert!(index.by_tag("table").is_empty());
    }

    #[test]
    fn test_template_content_is_not_indexed() {
        let document = create_dom_tree(
            "<template><p class=\"a\"></p><style>.a{}</style></template><p></p>",
        );
        let index = ElementIndex::build(&document);
        assert_eq!(index.by_tag("template").len(), 1);
        assert_eq!(index.by_tag("p").len(), 1);
        assert!(index.by_tag("style").is_empty());
    }

    #[test]
    fn test_deep_nesting() {
        let mut html = String::new();
        for _ in 0..200 {
            html.push_str("<div>");
        }
        let document = create_dom_tree(&html);
        let index = ElementIndex::build(&document);
        assert_eq!(index.by_tag("div").len(), 200);
        assert_eq!(index.len(), 203);
    }
}
