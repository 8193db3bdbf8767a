//! Arena-based XML document tree.
//!
//! All nodes live in one contiguous vector; parent/child/sibling links are
//! indices into it. Detached nodes stay allocated but are unreachable from
//! the document root, so a `NodeId` never dangles.

/// Namespace bound to the reserved `xml` prefix.
pub const XML_NS: &str = "http://www.w3.org/XML/1998/namespace";

/// Unique identifier for a node in a [`Document`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

impl NodeId {
    /// The document root (always 0).
    pub const ROOT: NodeId = NodeId(0);
}

/// Node payload.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeData {
    /// Document root. Holds the document element plus any top-level
    /// comments and processing instructions.
    Document,
    /// Element with its qualified name as written (`prefix:local`).
    Element { name: String, attrs: Vec<Attribute> },
    /// Character data, escaped on output.
    Text(String),
    /// Markup emitted verbatim on output (disabled output escaping).
    RawText(String),
    /// CDATA section.
    CData(String),
    /// Comment.
    Comment(String),
    /// Processing instruction.
    ProcessingInstruction { target: String, data: String },
}

/// Attribute with its qualified name as written.
///
/// Namespace declarations (`xmlns`, `xmlns:p`) are stored as ordinary
/// attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    pub value: String,
}

impl Attribute {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    /// Prefix part of the qualified name, if any.
    pub fn prefix(&self) -> Option<&str> {
        split_qname(&self.name).0
    }

    /// Local part of the qualified name.
    pub fn local_name(&self) -> &str {
        split_qname(&self.name).1
    }

    /// Whether this attribute is a namespace declaration.
    pub fn is_namespace_decl(&self) -> bool {
        self.name == "xmlns" || self.name.starts_with("xmlns:")
    }
}

/// A node in the arena.
#[derive(Debug, Clone)]
pub struct Node {
    pub data: NodeData,
    pub parent: Option<NodeId>,
    pub first_child: Option<NodeId>,
    pub last_child: Option<NodeId>,
    pub prev_sibling: Option<NodeId>,
    pub next_sibling: Option<NodeId>,
}

impl Node {
    fn new(data: NodeData) -> Self {
        Self {
            data,
            parent: None,
            first_child: None,
            last_child: None,
            prev_sibling: None,
            next_sibling: None,
        }
    }
}

/// Split `prefix:local` into its parts.
pub fn split_qname(name: &str) -> (Option<&str>, &str) {
    match name.split_once(':') {
        Some((prefix, local)) => (Some(prefix), local),
        None => (None, name),
    }
}

/// Mutable in-memory XML document.
#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<Node>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// Create an empty document holding only the root node.
    pub fn new() -> Self {
        Self {
            nodes: vec![Node::new(NodeData::Document)],
        }
    }

    fn alloc(&mut self, data: NodeData) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node::new(data));
        id
    }

    /// The document root.
    pub fn root(&self) -> NodeId {
        NodeId::ROOT
    }

    /// The single top-level element, if present.
    pub fn document_element(&self) -> Option<NodeId> {
        self.children(NodeId::ROOT).find(|&id| self.is_element(id))
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0 as usize)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.0 as usize)
    }

    /// Number of allocated nodes, including detached ones.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn create_element(&mut self, name: impl Into<String>, attrs: Vec<Attribute>) -> NodeId {
        self.alloc(NodeData::Element {
            name: name.into(),
            attrs,
        })
    }

    pub fn create_text(&mut self, text: impl Into<String>) -> NodeId {
        self.alloc(NodeData::Text(text.into()))
    }

    pub fn create_raw_text(&mut self, markup: impl Into<String>) -> NodeId {
        self.alloc(NodeData::RawText(markup.into()))
    }

    pub fn create_cdata(&mut self, text: impl Into<String>) -> NodeId {
        self.alloc(NodeData::CData(text.into()))
    }

    pub fn create_comment(&mut self, text: impl Into<String>) -> NodeId {
        self.alloc(NodeData::Comment(text.into()))
    }

    pub fn create_pi(&mut self, target: impl Into<String>, data: impl Into<String>) -> NodeId {
        self.alloc(NodeData::ProcessingInstruction {
            target: target.into(),
            data: data.into(),
        })
    }

    /// Create a childless copy of an element (same name and attributes).
    pub fn clone_element(&mut self, id: NodeId) -> Option<NodeId> {
        match self.node(id).map(|n| &n.data) {
            Some(NodeData::Element { name, attrs }) => {
                let (name, attrs) = (name.clone(), attrs.clone());
                Some(self.create_element(name, attrs))
            }
            _ => None,
        }
    }

    /// Append `child` as the last child of `parent`, detaching it first.
    pub fn append(&mut self, parent: NodeId, child: NodeId) {
        self.detach(child);

        let last_child = self.node(parent).and_then(|n| n.last_child);

        if let Some(child_node) = self.node_mut(child) {
            child_node.parent = Some(parent);
            child_node.prev_sibling = last_child;
            child_node.next_sibling = None;
        }

        if let Some(last) = last_child
            && let Some(last_node) = self.node_mut(last)
        {
            last_node.next_sibling = Some(child);
        }

        if let Some(parent_node) = self.node_mut(parent) {
            if parent_node.first_child.is_none() {
                parent_node.first_child = Some(child);
            }
            parent_node.last_child = Some(child);
        }
    }

    /// Insert `new_node` immediately before `sibling`, detaching it first.
    pub fn insert_before(&mut self, sibling: NodeId, new_node: NodeId) {
        if sibling == new_node {
            return;
        }
        self.detach(new_node);

        let Some(parent) = self.node(sibling).and_then(|n| n.parent) else {
            return;
        };
        let prev = self.node(sibling).and_then(|n| n.prev_sibling);

        if let Some(new) = self.node_mut(new_node) {
            new.parent = Some(parent);
            new.prev_sibling = prev;
            new.next_sibling = Some(sibling);
        }

        if let Some(sib) = self.node_mut(sibling) {
            sib.prev_sibling = Some(new_node);
        }

        match prev {
            Some(p) => {
                if let Some(prev_node) = self.node_mut(p) {
                    prev_node.next_sibling = Some(new_node);
                }
            }
            None => {
                if let Some(parent_node) = self.node_mut(parent) {
                    parent_node.first_child = Some(new_node);
                }
            }
        }
    }

    /// Unlink a node (and its subtree) from its parent.
    pub fn detach(&mut self, id: NodeId) {
        let Some(node) = self.node(id) else {
            return;
        };
        let (parent, prev, next) = (node.parent, node.prev_sibling, node.next_sibling);
        let Some(parent) = parent else {
            return;
        };

        match prev {
            Some(p) => {
                if let Some(prev_node) = self.node_mut(p) {
                    prev_node.next_sibling = next;
                }
            }
            None => {
                if let Some(parent_node) = self.node_mut(parent) {
                    parent_node.first_child = next;
                }
            }
        }

        match next {
            Some(n) => {
                if let Some(next_node) = self.node_mut(n) {
                    next_node.prev_sibling = prev;
                }
            }
            None => {
                if let Some(parent_node) = self.node_mut(parent) {
                    parent_node.last_child = prev;
                }
            }
        }

        if let Some(node) = self.node_mut(id) {
            node.parent = None;
            node.prev_sibling = None;
            node.next_sibling = None;
        }
    }

    /// Append text, merging into the last child when it is already text.
    pub fn append_text(&mut self, parent: NodeId, text: &str) {
        let last_child = self.node(parent).and_then(|n| n.last_child);

        if let Some(last) = last_child
            && let Some(node) = self.node_mut(last)
            && let NodeData::Text(existing) = &mut node.data
        {
            existing.push_str(text);
            return;
        }

        let text_node = self.create_text(text);
        self.append(parent, text_node);
    }

    /// Iterate over children of a node.
    pub fn children(&self, parent: NodeId) -> ChildIter<'_> {
        ChildIter {
            doc: self,
            current: self.node(parent).and_then(|n| n.first_child),
        }
    }

    /// Iterate over `id` and all of its descendants in document order.
    pub fn descendants(&self, id: NodeId) -> DfsIter<'_> {
        DfsIter {
            doc: self,
            stack: vec![id],
        }
    }

    /// All attached elements in document order.
    pub fn elements(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.descendants(NodeId::ROOT)
            .filter(move |&id| self.is_element(id))
    }

    /// Parent of a node.
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).and_then(|n| n.parent)
    }

    /// Ancestors of a node, nearest first (excluding the node itself).
    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.parent(id), move |&p| self.parent(p))
    }
}

/// Iterator over children of a node.
pub struct ChildIter<'a> {
    doc: &'a Document,
    current: Option<NodeId>,
}

impl Iterator for ChildIter<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.current?;
        self.current = self.doc.node(current).and_then(|n| n.next_sibling);
        Some(current)
    }
}

/// Depth-first (document order) iterator.
pub struct DfsIter<'a> {
    doc: &'a Document,
    stack: Vec<NodeId>,
}

impl Iterator for DfsIter<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.stack.pop()?;

        // Push children in reverse order so they're visited left-to-right
        let mut children: Vec<NodeId> = self.doc.children(current).collect();
        children.reverse();
        self.stack.extend(children);

        Some(current)
    }
}

/// Element and attribute accessors.
impl Document {
    pub fn is_element(&self, id: NodeId) -> bool {
        self.node(id)
            .is_some_and(|n| matches!(n.data, NodeData::Element { .. }))
    }

    pub fn is_comment(&self, id: NodeId) -> bool {
        self.node(id)
            .is_some_and(|n| matches!(n.data, NodeData::Comment(_)))
    }

    /// Qualified element name as written.
    pub fn element_name(&self, id: NodeId) -> Option<&str> {
        self.node(id).and_then(|n| match &n.data {
            NodeData::Element { name, .. } => Some(name.as_str()),
            _ => None,
        })
    }

    /// Local part of the element name.
    pub fn local_name(&self, id: NodeId) -> Option<&str> {
        self.element_name(id).map(|name| split_qname(name).1)
    }

    pub fn attrs(&self, id: NodeId) -> &[Attribute] {
        self.node(id)
            .and_then(|n| match &n.data {
                NodeData::Element { attrs, .. } => Some(attrs.as_slice()),
                _ => None,
            })
            .unwrap_or(&[])
    }

    fn attrs_mut(&mut self, id: NodeId) -> Option<&mut Vec<Attribute>> {
        self.node_mut(id).and_then(|n| match &mut n.data {
            NodeData::Element { attrs, .. } => Some(attrs),
            _ => None,
        })
    }

    /// Attribute value by qualified name as written.
    pub fn attr(&self, id: NodeId, name: &str) -> Option<&str> {
        self.attrs(id)
            .iter()
            .find(|a| a.name == name)
            .map(|a| a.value.as_str())
    }

    pub fn has_attr(&self, id: NodeId, name: &str) -> bool {
        self.attr(id, name).is_some()
    }

    /// Set an attribute by qualified name, replacing any existing value.
    pub fn set_attr(&mut self, id: NodeId, name: &str, value: impl Into<String>) {
        let value = value.into();
        if let Some(attrs) = self.attrs_mut(id) {
            match attrs.iter_mut().find(|a| a.name == name) {
                Some(attr) => attr.value = value,
                None => attrs.push(Attribute::new(name, value)),
            }
        }
    }

    /// Text content of a text-like node, or the concatenated text of an
    /// element's descendants.
    pub fn text_content(&self, id: NodeId) -> String {
        let mut out = String::new();
        for node_id in self.descendants(id) {
            if let Some(node) = self.node(node_id) {
                match &node.data {
                    NodeData::Text(s) | NodeData::CData(s) | NodeData::RawText(s) => {
                        out.push_str(s)
                    }
                    _ => {}
                }
            }
        }
        out
    }

    /// Whether a node is text consisting only of whitespace.
    pub fn is_whitespace_text(&self, id: NodeId) -> bool {
        self.node(id).is_some_and(|n| match &n.data {
            NodeData::Text(s) => s.chars().all(char::is_whitespace),
            _ => false,
        })
    }
}

/// Namespace resolution.
impl Document {
    /// Resolve a prefix (or the default namespace for `None`) in the scope
    /// of `id`.
    pub fn lookup_namespace_uri(&self, id: NodeId, prefix: Option<&str>) -> Option<&str> {
        if prefix == Some("xml") {
            return Some(XML_NS);
        }
        let decl = match prefix {
            Some(p) => format!("xmlns:{p}"),
            None => "xmlns".to_string(),
        };
        std::iter::once(id)
            .chain(self.ancestors(id))
            .find_map(|scope| self.attr(scope, &decl))
            .filter(|uri| !uri.is_empty())
    }

    /// Find a prefix bound to `namespace` in the scope of `id`.
    pub fn lookup_prefix(&self, id: NodeId, namespace: &str) -> Option<String> {
        if namespace == XML_NS {
            return Some("xml".to_string());
        }
        for scope in std::iter::once(id).chain(self.ancestors(id)) {
            for attr in self.attrs(scope) {
                if attr.value == namespace
                    && let Some(prefix) = attr.name.strip_prefix("xmlns:")
                    && self.lookup_namespace_uri(id, Some(prefix)) == Some(namespace)
                {
                    return Some(prefix.to_string());
                }
            }
        }
        None
    }

    /// Namespace URI of an element.
    pub fn namespace_uri(&self, id: NodeId) -> Option<&str> {
        let name = self.element_name(id)?;
        self.lookup_namespace_uri(id, split_qname(name).0)
    }

    fn attr_index_ns(&self, id: NodeId, namespace: &str, local: &str) -> Option<usize> {
        self.attrs(id).iter().position(|a| {
            !a.is_namespace_decl()
                && a.local_name() == local
                && a.prefix()
                    .is_some_and(|p| self.lookup_namespace_uri(id, Some(p)) == Some(namespace))
        })
    }

    /// Attribute value by namespace URI and local name.
    ///
    /// Unprefixed attributes are in no namespace, so they never match.
    pub fn attr_ns(&self, id: NodeId, namespace: &str, local: &str) -> Option<&str> {
        self.attr_index_ns(id, namespace, local)
            .map(|idx| self.attrs(id)[idx].value.as_str())
    }

    /// Set a namespaced attribute.
    ///
    /// Reuses an in-scope prefix for `namespace`; otherwise declares
    /// `preferred_prefix` on the document element (or on the element itself
    /// when the prefix is already bound to another namespace there).
    pub fn set_attr_ns(
        &mut self,
        id: NodeId,
        namespace: &str,
        preferred_prefix: &str,
        local: &str,
        value: impl Into<String>,
    ) {
        let value = value.into();
        if let Some(idx) = self.attr_index_ns(id, namespace, local) {
            if let Some(attrs) = self.attrs_mut(id) {
                attrs[idx].value = value;
            }
            return;
        }

        let prefix = match self.lookup_prefix(id, namespace) {
            Some(prefix) => prefix,
            None => {
                self.declare_namespace(id, preferred_prefix, namespace);
                preferred_prefix.to_string()
            }
        };
        if let Some(attrs) = self.attrs_mut(id) {
            attrs.push(Attribute::new(format!("{prefix}:{local}"), value));
        }
    }

    /// Remove a namespaced attribute. Returns whether it existed.
    pub fn remove_attr_ns(&mut self, id: NodeId, namespace: &str, local: &str) -> bool {
        let Some(idx) = self.attr_index_ns(id, namespace, local) else {
            return false;
        };
        if let Some(attrs) = self.attrs_mut(id) {
            attrs.remove(idx);
        }
        true
    }

    fn declare_namespace(&mut self, id: NodeId, prefix: &str, namespace: &str) {
        let decl = format!("xmlns:{prefix}");
        let target = match self.document_element() {
            Some(root) if self.lookup_namespace_uri(id, Some(prefix)).is_none() => root,
            _ => id,
        };
        self.set_attr(target, &decl, namespace);
    }

    /// Value of the identity attribute (`xml:id`).
    pub fn xml_id(&self, id: NodeId) -> Option<&str> {
        self.attr_ns(id, XML_NS, "id")
    }

    pub fn set_xml_id(&mut self, id: NodeId, value: impl Into<String>) {
        self.set_attr_ns(id, XML_NS, "xml", "id", value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> (Document, NodeId, NodeId, NodeId) {
        let mut doc = Document::new();
        let section = doc.create_element(
            "section",
            vec![
                Attribute::new("xmlns", "http://docbook.org/ns/docbook"),
                Attribute::new("xmlns:ezxhtml", "http://ez.no/xmlns/ezpublish/docbook/xhtml"),
            ],
        );
        let para = doc.create_element("para", vec![Attribute::new("xml:id", "intro")]);
        let text = doc.create_text("Hello");
        doc.append(doc.root(), section);
        doc.append(section, para);
        doc.append(para, text);
        (doc, section, para, text)
    }

    #[test]
    fn test_append_children() {
        let (doc, section, para, text) = sample();

        assert_eq!(doc.document_element(), Some(section));
        assert_eq!(doc.children(section).collect::<Vec<_>>(), vec![para]);
        assert_eq!(doc.children(para).collect::<Vec<_>>(), vec![text]);
        assert_eq!(doc.parent(text), Some(para));
    }

    #[test]
    fn test_detach_and_insert_before() {
        let (mut doc, section, para, _) = sample();
        let first = doc.create_element("title", vec![]);
        doc.insert_before(para, first);
        assert_eq!(doc.children(section).collect::<Vec<_>>(), vec![first, para]);

        doc.detach(first);
        assert_eq!(doc.children(section).collect::<Vec<_>>(), vec![para]);
        assert_eq!(doc.parent(first), None);

        doc.append(section, first);
        assert_eq!(doc.children(section).collect::<Vec<_>>(), vec![para, first]);
    }

    #[test]
    fn test_descendants_in_document_order() {
        let (doc, section, para, text) = sample();
        let order: Vec<_> = doc.descendants(doc.root()).collect();
        assert_eq!(order, vec![NodeId::ROOT, section, para, text]);
    }

    #[test]
    fn test_namespace_resolution() {
        let (doc, section, para, _) = sample();
        assert_eq!(doc.namespace_uri(section), Some("http://docbook.org/ns/docbook"));
        assert_eq!(doc.namespace_uri(para), Some("http://docbook.org/ns/docbook"));
        assert_eq!(doc.xml_id(para), Some("intro"));
        assert_eq!(
            doc.lookup_prefix(para, "http://ez.no/xmlns/ezpublish/docbook/xhtml"),
            Some("ezxhtml".to_string())
        );
    }

    #[test]
    fn test_set_attr_ns_declares_missing_prefix() {
        let mut doc = Document::new();
        let root = doc.create_element("section", vec![]);
        let child = doc.create_element("para", vec![]);
        doc.append(doc.root(), root);
        doc.append(root, child);

        doc.set_attr_ns(child, "urn:example", "ex", "class", "a");
        assert_eq!(doc.attr(root, "xmlns:ex"), Some("urn:example"));
        assert_eq!(doc.attr(child, "ex:class"), Some("a"));
        assert_eq!(doc.attr_ns(child, "urn:example", "class"), Some("a"));

        assert!(doc.remove_attr_ns(child, "urn:example", "class"));
        assert!(!doc.remove_attr_ns(child, "urn:example", "class"));
    }

    #[test]
    fn test_text_merging() {
        let mut doc = Document::new();
        let p = doc.create_element("p", vec![]);
        doc.append(doc.root(), p);

        doc.append_text(p, "Hello, ");
        doc.append_text(p, "World!");

        let children: Vec<_> = doc.children(p).collect();
        assert_eq!(children.len(), 1);
        assert_eq!(doc.text_content(p), "Hello, World!");
    }
}
