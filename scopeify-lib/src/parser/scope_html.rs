//! This module contains functions and types for parsing HTML into the scoping DOM tree.
//!
//! It uses html5ever as the HTML parser and builds a DOM tree defined in the
//! `crate::dom::dom_tree` module. Unlike a render tree, every comment and
//! attribute is kept so that untouched markup serializes back unchanged.

use crate::dom::dom_tree::{self, Handle, Node};
use html5ever::tendril::{StrTendril, TendrilSink};
use html5ever::{
    interface::{ElemName, NodeOrText, QuirksMode, TreeSink},
    LocalName, Namespace, QualName,
};
use log::debug;
use std::borrow::Cow;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// Creates a DOM tree from the provided HTML content.
///
/// # Arguments
///
/// * `html_content` - A string slice containing the HTML to parse.
///
/// # Returns
///
/// A `dom_tree::Document` representing the parsed HTML.
pub fn create_dom_tree(html_content: &str) -> dom_tree::Document {
    let tree_sink = ScopeTreeSink::new();
    html5ever::parse_document(tree_sink, Default::default()).one(html_content)
}

/// A TreeSink building the DOM tree consumed by the scoping passes.
///
/// It holds the Document being built, the current quirks mode and a count of
/// recoverable parse errors.
pub struct ScopeTreeSink {
    document: dom_tree::Document,
    quirks_mode: RefCell<QuirksMode>,
    parse_errors: Cell<usize>,
}

impl ScopeTreeSink {
    /// Creates a new `ScopeTreeSink` with an empty document.
    pub fn new() -> Self {
        Self {
            document: dom_tree::new_document(),
            quirks_mode: RefCell::new(QuirksMode::NoQuirks),
            parse_errors: Cell::new(0),
        }
    }
}

impl Default for ScopeTreeSink {
    fn default() -> Self {
        Self::new()
    }
}

/// Owned element name handed back to html5ever.
#[derive(Debug)]
pub struct ScopeElemName {
    ns: Namespace,
    local: LocalName,
}

impl ElemName for ScopeElemName {
    fn local_name(&self) -> &LocalName {
        &self.local
    }

    fn ns(&self) -> &Namespace {
        &self.ns
    }
}

impl TreeSink for ScopeTreeSink {
    type Handle = Handle;
    type Output = dom_tree::Document;
    type ElemName<'a>
        = ScopeElemName
    where
        Self: 'a;

    fn finish(self) -> Self::Output {
        let errors = self.parse_errors.get();
        if errors > 0 {
            debug!("html parsing recovered from {errors} error(s)");
        }
        self.document
    }

    fn parse_error(&self, msg: Cow<'static, str>) {
        self.parse_errors.set(self.parse_errors.get() + 1);
        debug!("html parse error: {msg}");
    }

    fn get_document(&self) -> Self::Handle {
        self.document.root.clone()
    }

    fn elem_name<'a>(&'a self, target: &'a Self::Handle) -> Self::ElemName<'a> {
        match &*target.borrow() {
            Node::Element(elem) => ScopeElemName {
                ns: elem.qual_name.ns.clone(),
                local: elem.qual_name.local.clone(),
            },
            // html5ever only asks for names of elements it created.
            _ => ScopeElemName {
                ns: Namespace::from(""),
                local: LocalName::from(""),
            },
        }
    }

    fn create_element(
        &self,
        name: QualName,
        attrs: Vec<html5ever::Attribute>,
        _flags: html5ever::interface::ElementFlags,
    ) -> Self::Handle {
        dom_tree::new_element(name, attrs)
    }

    fn create_comment(&self, text: StrTendril) -> Self::Handle {
        Rc::new(RefCell::new(Node::Comment(text.to_string())))
    }

    fn create_pi(&self, target: StrTendril, data: StrTendril) -> Self::Handle {
        let combined = format!("?{} {}", target, data);
        Rc::new(RefCell::new(Node::Comment(combined)))
    }

    fn append(&self, parent: &Self::Handle, child: NodeOrText<Self::Handle>) {
        let child_node = match child {
            NodeOrText::AppendNode(node) => node,
            NodeOrText::AppendText(text) => dom_tree::new_text(&text),
        };
        dom_tree::append_child(parent, child_node);
    }

    fn append_based_on_parent_node(
        &self,
        element: &Self::Handle,
        prev_element: &Self::Handle,
        child: NodeOrText<Self::Handle>,
    ) {
        let has_parent = element.borrow().parent().is_some();
        if has_parent {
            self.append_before_sibling(element, child);
        } else {
            self.append(prev_element, child);
        }
    }

    fn append_doctype_to_document(
        &self,
        name: StrTendril,
        public_id: StrTendril,
        system_id: StrTendril,
    ) {
        *self.document.doctype.borrow_mut() = Some(dom_tree::Doctype {
            name: name.to_string(),
            public_id: public_id.to_string(),
            system_id: system_id.to_string(),
        });
    }

    fn get_template_contents(&self, target: &Self::Handle) -> Self::Handle {
        target.clone()
    }

    fn same_node(&self, x: &Self::Handle, y: &Self::Handle) -> bool {
        Rc::ptr_eq(x, y)
    }

    fn set_quirks_mode(&self, mode: QuirksMode) {
        *self.quirks_mode.borrow_mut() = mode;
    }

    fn append_before_sibling(&self, sibling: &Self::Handle, child: NodeOrText<Self::Handle>) {
        let child_node = match child {
            NodeOrText::AppendNode(node) => node,
            NodeOrText::AppendText(text) => dom_tree::new_text(&text),
        };
        dom_tree::insert_before(sibling, child_node);
    }

    fn add_attrs_if_missing(&self, target: &Self::Handle, attrs: Vec<html5ever::Attribute>) {
        if let Node::Element(elem) = &mut *target.borrow_mut() {
            for attr in attrs {
                if !elem.attributes.iter().any(|existing| existing.name == attr.name) {
                    elem.attributes.push(attr);
                }
            }
        }
    }

    fn remove_from_parent(&self, target: &Self::Handle) {
        dom_tree::remove_from_parent(target);
    }

    fn reparent_children(&self, node: &Self::Handle, new_parent: &Self::Handle) {
        dom_tree::reparent_children(node, new_parent);
    }
}
