use html5ever::{Attribute, LocalName, Namespace, QualName};
use std::cell::RefCell;
use std::rc::{Rc, Weak};

pub mod dom_tree {
    use super::*;

    /// Shared handle to a node of the tree.
    pub type Handle = Rc<RefCell<Node>>;

    #[derive(Debug, Clone)]
    pub enum Node {
        DocumentRoot(DocumentRootNode),
        Element(ElementNode),
        Text(String),
        Comment(String),
    }

    #[derive(Debug, Clone, Default)]
    pub struct DocumentRootNode {
        pub children: Vec<Handle>,
    }

    #[derive(Debug, Clone)]
    pub struct ElementNode {
        pub tag: String,
        pub qual_name: QualName,
        pub attributes: Vec<Attribute>,
        pub children: Vec<Handle>,
        pub parent: Option<Weak<RefCell<Node>>>,
    }

    #[derive(Debug)]
    pub struct Document {
        pub root: Handle,
        pub doctype: RefCell<Option<Doctype>>,
    }

    #[derive(Debug)]
    pub struct Doctype {
        pub name: String,
        pub public_id: String,
        pub system_id: String,
    }

    impl DocumentRootNode {
        pub fn new() -> Self {
            DocumentRootNode {
                children: Vec::new(),
            }
        }
    }

    impl Node {
        pub fn children(&self) -> &[Handle] {
            match self {
                Node::DocumentRoot(root) => &root.children,
                Node::Element(elem) => &elem.children,
                Node::Text(_) | Node::Comment(_) => &[],
            }
        }

        pub fn children_mut(&mut self) -> Option<&mut Vec<Handle>> {
            match self {
                Node::DocumentRoot(root) => Some(&mut root.children),
                Node::Element(elem) => Some(&mut elem.children),
                Node::Text(_) | Node::Comment(_) => None,
            }
        }

        pub fn as_element(&self) -> Option<&ElementNode> {
            match self {
                Node::Element(elem) => Some(elem),
                _ => None,
            }
        }

        pub fn as_element_mut(&mut self) -> Option<&mut ElementNode> {
            match self {
                Node::Element(elem) => Some(elem),
                _ => None,
            }
        }

        /// Parent of an element node. Other node kinds do not track theirs.
        pub fn parent(&self) -> Option<Handle> {
            self.as_element()
                .and_then(|elem| elem.parent.as_ref())
                .and_then(Weak::upgrade)
        }
    }

    impl ElementNode {
        pub fn new(tag: String, qual_name: QualName) -> Self {
            ElementNode {
                tag,
                qual_name,
                attributes: Vec::new(),
                children: Vec::new(),
                parent: None,
            }
        }

        /// Tag name as used for selector matching.
        pub fn tag_name(&self) -> String {
            self.tag.to_ascii_lowercase()
        }

        /// Value of a non-namespaced attribute.
        pub fn attribute(&self, name: &str) -> Option<&str> {
            self.attributes
                .iter()
                .find(|attr| attr.name.ns.is_empty() && &*attr.name.local == name)
                .map(|attr| &*attr.value)
        }

        /// Overwrites an attribute in place, or appends it when missing.
        pub fn set_attribute(&mut self, name: &str, value: &str) {
            match self
                .attributes
                .iter_mut()
                .find(|attr| attr.name.ns.is_empty() && &*attr.name.local == name)
            {
                Some(attr) => attr.value = value.into(),
                None => self.attributes.push(Attribute {
                    name: QualName::new(None, Namespace::from(""), LocalName::from(name)),
                    value: value.into(),
                }),
            }
        }
    }

    pub fn new_document() -> Document {
        Document {
            root: Rc::new(RefCell::new(Node::DocumentRoot(DocumentRootNode::new()))),
            doctype: RefCell::new(None),
        }
    }

    pub fn new_element(name: QualName, attributes: Vec<Attribute>) -> Handle {
        let mut element = ElementNode::new(name.local.to_string(), name);
        element.attributes = attributes;
        Rc::new(RefCell::new(Node::Element(element)))
    }

    pub fn new_text(text: &str) -> Handle {
        Rc::new(RefCell::new(Node::Text(text.to_string())))
    }

    /// Concatenated text of every text node below `node`, in tree order.
    pub fn text_content(node: &Handle) -> String {
        let mut out = String::new();
        collect_text(node, &mut out);
        out
    }

    fn collect_text(node: &Handle, out: &mut String) {
        match &*node.borrow() {
            Node::Text(text) => out.push_str(text),
            other => {
                for child in other.children() {
                    collect_text(child, out);
                }
            }
        }
    }

    /// Appends `child` as the last child of `parent`, merging adjacent text.
    pub fn append_child(parent: &Handle, child: Handle) {
        if let Node::Text(text) = &*child.borrow() {
            let mut parent_node = parent.borrow_mut();
            if let Some(children) = parent_node.children_mut() {
                if let Some(last) = children.last() {
                    if let Node::Text(existing) = &mut *last.borrow_mut() {
                        existing.push_str(text);
                        return;
                    }
                }
            }
        }
        set_parent(&child, Some(parent));
        if let Some(children) = parent.borrow_mut().children_mut() {
            children.push(child);
        }
    }

    /// Inserts `child` right before `sibling`, which must have a parent.
    pub fn insert_before(sibling: &Handle, child: Handle) {
        let Some(parent) = sibling.borrow().parent() else {
            return;
        };
        set_parent(&child, Some(&parent));
        let mut parent_node = parent.borrow_mut();
        if let Some(children) = parent_node.children_mut() {
            let index = children
                .iter()
                .position(|existing| Rc::ptr_eq(existing, sibling))
                .unwrap_or(children.len());
            if index > 0 {
                if let (Node::Text(text), Node::Text(previous)) =
                    (&*child.borrow(), &mut *children[index - 1].borrow_mut())
                {
                    previous.push_str(text);
                    return;
                }
            }
            children.insert(index, child);
        }
    }

    /// Detaches `node` from its parent. Returns false when it had none.
    pub fn remove_from_parent(node: &Handle) -> bool {
        let Some(parent) = node.borrow().parent() else {
            return false;
        };
        if let Some(children) = parent.borrow_mut().children_mut() {
            children.retain(|child| !Rc::ptr_eq(child, node));
        }
        set_parent(node, None);
        true
    }

    /// Moves every child of `node` to the end of `new_parent`.
    pub fn reparent_children(node: &Handle, new_parent: &Handle) {
        let moved = match node.borrow_mut().children_mut() {
            Some(children) => std::mem::take(children),
            None => return,
        };
        for child in moved {
            set_parent(&child, Some(new_parent));
            if let Some(children) = new_parent.borrow_mut().children_mut() {
                children.push(child);
            }
        }
    }

    fn set_parent(child: &Handle, parent: Option<&Handle>) {
        if let Node::Element(elem) = &mut *child.borrow_mut() {
            elem.parent = parent.map(Rc::downgrade);
        }
    }
}
