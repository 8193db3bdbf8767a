//! Image classification of embedded content references.
//!
//! Embedded images need `ezxhtml:class="ez-embed-type-image"` to be
//! recognized by the editor. Every `ezembed` / `ezembedinline` element in
//! the document namespace is resolved through the [`ContentRepository`] and
//! the marker token is added or removed to match.

use std::collections::HashSet;

use crate::diagnostics::Reporter;
use crate::dom::{Document, NodeId};
use crate::repository::{ContentRepository, Lookup};

/// Namespace of presentational attributes in the converted document.
pub const XHTML_NS: &str = "http://ez.no/xmlns/ezpublish/docbook/xhtml";

/// Preferred prefix for [`XHTML_NS`].
pub const XHTML_PREFIX: &str = "ezxhtml";

/// Class token marking an embed as an image.
pub const IMAGE_CLASS: &str = "ez-embed-type-image";

/// Scheme of content-id references; anything else is a location id.
pub const CONTENT_SCHEME: &str = "ezcontent";

/// What an embed reference points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbedTarget {
    Content(i64),
    Location(i64),
}

/// Parse `ezcontent://123` or `ezlocation://123`.
///
/// The id is the leading digits after the last `/`; no digits yields 0,
/// which no repository resolves.
pub fn parse_reference(href: &str) -> EmbedTarget {
    let tail = href.rsplit('/').next().unwrap_or_default();
    let digits: String = tail.chars().take_while(char::is_ascii_digit).collect();
    let id = digits.parse().unwrap_or(0);
    if href.starts_with(CONTENT_SCHEME) {
        EmbedTarget::Content(id)
    } else {
        EmbedTarget::Location(id)
    }
}

/// Ensure `token` is in the element's `ezxhtml:class`. Returns whether the
/// element changed.
pub fn add_class_token(doc: &mut Document, node: NodeId, token: &str) -> bool {
    let Some(current) = doc.attr_ns(node, XHTML_NS, "class") else {
        doc.set_attr_ns(node, XHTML_NS, XHTML_PREFIX, "class", token);
        return true;
    };
    if current.split_whitespace().any(|t| t == token) {
        return false;
    }
    let updated = if current.trim().is_empty() {
        token.to_string()
    } else {
        format!("{current} {token}")
    };
    doc.set_attr_ns(node, XHTML_NS, XHTML_PREFIX, "class", updated);
    true
}

/// Ensure `token` is absent from the element's `ezxhtml:class`, dropping
/// the attribute once no tokens remain. Returns whether the element changed.
pub fn remove_class_token(doc: &mut Document, node: NodeId, token: &str) -> bool {
    let Some(current) = doc.attr_ns(node, XHTML_NS, "class") else {
        return false;
    };
    let tokens: Vec<&str> = current.split_whitespace().collect();
    if !tokens.contains(&token) {
        return false;
    }
    let remaining: Vec<&str> = tokens.into_iter().filter(|t| *t != token).collect();
    if remaining.is_empty() {
        doc.remove_attr_ns(node, XHTML_NS, "class");
    } else {
        let joined = remaining.join(" ");
        doc.set_attr_ns(node, XHTML_NS, XHTML_PREFIX, "class", joined);
    }
    true
}

/// Embed elements in the document element's namespace.
pub fn find_embeds(doc: &Document) -> Vec<NodeId> {
    let Some(root) = doc.document_element() else {
        return Vec::new();
    };
    let namespace = doc.namespace_uri(root).map(str::to_string);
    doc.elements()
        .filter(|&id| matches!(doc.local_name(id), Some("ezembed" | "ezembedinline")))
        .filter(|&id| doc.namespace_uri(id).map(str::to_string) == namespace)
        .collect()
}

fn href(doc: &Document, node: NodeId) -> Option<&str> {
    doc.attrs(node)
        .iter()
        .find(|a| a.local_name() == "href")
        .map(|a| a.value.as_str())
}

/// Resolves embed targets and toggles the image marker.
pub struct EmbedClassifier<'a> {
    repository: &'a dyn ContentRepository,
    image_content_types: &'a HashSet<i64>,
}

impl<'a> EmbedClassifier<'a> {
    pub fn new(repository: &'a dyn ContentRepository, image_content_types: &'a HashSet<i64>) -> Self {
        Self {
            repository,
            image_content_types,
        }
    }

    /// Whether the target is an image. Unresolvable targets are reported
    /// and count as non-images.
    pub fn is_image(&self, target: EmbedTarget, reporter: &mut Reporter<'_>) -> bool {
        let content_info = match target {
            EmbedTarget::Content(id) => match self.repository.load_content_info(id) {
                Lookup::Found(info) => info,
                Lookup::NotFound => {
                    reporter.warning(format!(
                        "Unable to find content_id={id}, referred to in embedded tag in contentobject_attribute.id={}.",
                        reporter.field_label()
                    ));
                    return false;
                }
            },
            EmbedTarget::Location(id) => match self.repository.load_location(id) {
                Lookup::Found(location) => location.content_info,
                Lookup::NotFound => {
                    reporter.warning(format!(
                        "Unable to find node_id={id}, referred to in embedded tag in contentobject_attribute.id={}.",
                        reporter.field_label()
                    ));
                    return false;
                }
            },
        };
        self.image_content_types
            .contains(&content_info.content_type_id)
    }

    /// Tag every embed; returns how many elements actually changed.
    pub fn tag_embedded_images(&self, doc: &mut Document, reporter: &mut Reporter<'_>) -> usize {
        let mut changed = 0;
        for node in find_embeds(doc) {
            let is_image = match href(doc, node) {
                Some(href) => self.is_image(parse_reference(href), reporter),
                None => false,
            };
            let mutated = if is_image {
                add_class_token(doc, node, IMAGE_CLASS)
            } else {
                remove_class_token(doc, node, IMAGE_CLASS)
            };
            if mutated {
                changed += 1;
            }
        }
        tracing::debug!(changed, "tagged embedded images");
        changed
    }
}
