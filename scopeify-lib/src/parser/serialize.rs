//! Writes a DOM tree back out as HTML text through html5ever's serializer.

use crate::dom::dom_tree::{Document, Handle, Node};
use html5ever::serialize::{serialize, Serialize, SerializeOpts, Serializer, TraversalScope};
use std::io;

struct SerializableDocument<'a>(&'a Document);

struct SerializableNode<'a>(&'a Handle);

impl Serialize for SerializableDocument<'_> {
    fn serialize<S>(&self, serializer: &mut S, _traversal_scope: TraversalScope) -> io::Result<()>
    where
        S: Serializer,
    {
        if let Some(doctype) = &*self.0.doctype.borrow() {
            serializer.write_doctype(&doctype.name)?;
        }
        serialize_node(&self.0.root, serializer)
    }
}

impl Serialize for SerializableNode<'_> {
    fn serialize<S>(&self, serializer: &mut S, _traversal_scope: TraversalScope) -> io::Result<()>
    where
        S: Serializer,
    {
        serialize_node(self.0, serializer)
    }
}

fn serialize_node<S: Serializer>(node: &Handle, serializer: &mut S) -> io::Result<()> {
    match &*node.borrow() {
        Node::DocumentRoot(root) => {
            for child in &root.children {
                serialize_node(child, serializer)?;
            }
        }
        Node::Element(elem) => {
            let attrs = elem
                .attributes
                .iter()
                .map(|attr| (&attr.name, &*attr.value));
            serializer.start_elem(elem.qual_name.clone(), attrs)?;
            for child in &elem.children {
                serialize_node(child, serializer)?;
            }
            serializer.end_elem(elem.qual_name.clone())?;
        }
        Node::Text(text) => serializer.write_text(text)?,
        Node::Comment(text) => serializer.write_comment(text)?,
    }
    Ok(())
}

fn into_string(bytes: Vec<u8>) -> io::Result<String> {
    String::from_utf8(bytes).map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))
}

/// Serializes the whole document, doctype included.
pub fn to_html(document: &Document) -> io::Result<String> {
    let mut bytes = Vec::new();
    serialize(
        &mut bytes,
        &SerializableDocument(document),
        SerializeOpts::default(),
    )?;
    into_string(bytes)
}

/// Serializes a single node and its subtree.
pub fn node_to_html(node: &Handle) -> io::Result<String> {
    let mut bytes = Vec::new();
    let opts = SerializeOpts {
        traversal_scope: TraversalScope::IncludeNode,
        ..Default::default()
    };
    serialize(&mut bytes, &SerializableNode(node), opts)?;
    into_string(bytes)
}
