//! Pre-conversion cleanup of the legacy input tree.

use crate::diagnostics::Reporter;
use crate::dom::{Document, NodeId};

/// Remove every comment node, at any depth.
pub fn strip_comments(doc: &mut Document) -> usize {
    let comments: Vec<NodeId> = doc
        .descendants(doc.root())
        .filter(|&id| doc.is_comment(id))
        .collect();
    for &id in &comments {
        doc.detach(id);
    }
    comments.len()
}

/// Legacy `embed` / `embed-inline` elements with neither `node_id` nor
/// `object_id`.
pub fn find_empty_embed_references(doc: &Document) -> Vec<NodeId> {
    doc.elements()
        .filter(|&id| matches!(doc.element_name(id), Some("embed" | "embed-inline")))
        .filter(|&id| !doc.has_attr(id, "node_id") && !doc.has_attr(id, "object_id"))
        .collect()
}

/// Report (once) when the input contains target-less embeds. The tree is
/// left untouched.
pub fn check_empty_embed_references(doc: &Document, reporter: &mut Reporter<'_>) -> usize {
    let found = find_empty_embed_references(doc).len();
    if found > 0 {
        reporter.warning(format!(
            "Warning: ezxmltext for contentobject_attribute.id={} contains embed or embed-inline tag(s) without node_id or object_id",
            reporter.field_label()
        ));
    }
    found
}
