//! In-place rewrites of the legacy tree that run before the stylesheets.

use crate::dom::{Document, NodeId};
use crate::error::TransformError;

use super::Transform;

/// One pre-normalization rewrite. Returns the number of rewritten nodes.
pub trait Pass: Send + Sync {
    fn name(&self) -> &'static str;

    fn apply(&self, doc: &mut Document) -> usize;
}

/// Runs its passes in registration order.
pub struct PreNormalize {
    passes: Vec<Box<dyn Pass>>,
}

impl PreNormalize {
    pub fn new(passes: Vec<Box<dyn Pass>>) -> Self {
        Self { passes }
    }

    /// Paragraph expansion, list expansion, then embed link unwrapping.
    pub fn legacy() -> Self {
        Self::new(vec![
            Box::new(Expanding::blocks()),
            Box::new(Expanding::lists()),
            Box::new(EmbedLinking),
        ])
    }
}

impl Transform for PreNormalize {
    fn name(&self) -> &str {
        "pre-normalize"
    }

    fn transform(&self, doc: Document) -> Result<Document, TransformError> {
        let mut doc = doc;
        for pass in &self.passes {
            let rewritten = pass.apply(&mut doc);
            tracing::trace!(pass = pass.name(), rewritten, "pre-normalization pass");
        }
        Ok(doc)
    }
}

// ============================================================================
// Expanding
// ============================================================================

/// Lifts block-level children out of a container element.
///
/// ```xml
/// <paragraph>before<table/>after</paragraph>
/// ```
/// becomes
/// ```xml
/// <paragraph>before</paragraph><table/><paragraph>after</paragraph>
/// ```
///
/// Inline runs are wrapped in copies of the container (same attributes);
/// runs holding only whitespace are dropped.
pub struct Expanding {
    name: &'static str,
    container: &'static str,
    blocks: &'static [&'static str],
    block_custom: bool,
}

/// Children that make a `custom` element a block.
const BLOCK_CONTENT: &[&str] = &[
    "paragraph", "section", "header", "table", "ul", "ol", "literal", "embed",
];

impl Expanding {
    /// Tables, literal blocks, block embeds and block `custom` elements
    /// inside paragraphs.
    pub fn blocks() -> Self {
        Self {
            name: "expanding-to-richtext",
            container: "paragraph",
            blocks: &["table", "literal", "embed"],
            block_custom: true,
        }
    }

    /// Lists inside paragraphs.
    pub fn lists() -> Self {
        Self {
            name: "expanding-list",
            container: "paragraph",
            blocks: &["ul", "ol"],
            block_custom: false,
        }
    }

    fn is_block(&self, doc: &Document, id: NodeId) -> bool {
        match doc.element_name(id) {
            Some("custom") if self.block_custom => is_block_custom(doc, id),
            Some(name) => self.blocks.contains(&name),
            None => false,
        }
    }

    fn expand(&self, doc: &mut Document, container: NodeId) -> bool {
        let children: Vec<NodeId> = doc.children(container).collect();
        if !children.iter().any(|&c| self.is_block(doc, c)) {
            return false;
        }

        let mut pieces: Vec<NodeId> = Vec::new();
        let mut run: Option<NodeId> = None;
        for child in children {
            if self.is_block(doc, child) {
                if let Some(open) = run.take() {
                    pieces.push(open);
                }
                pieces.push(child);
                continue;
            }
            let open = match run {
                Some(open) => open,
                None => match doc.clone_element(container) {
                    Some(copy) => {
                        run = Some(copy);
                        copy
                    }
                    None => return false,
                },
            };
            doc.append(open, child);
        }
        if let Some(open) = run.take() {
            pieces.push(open);
        }

        for piece in pieces {
            if !self.is_block(doc, piece) && is_blank(doc, piece) {
                continue;
            }
            doc.insert_before(container, piece);
        }
        doc.detach(container);
        true
    }
}

/// A `custom` element is inline unless it holds block content.
fn is_block_custom(doc: &Document, id: NodeId) -> bool {
    doc.children(id).any(|c| match doc.element_name(c) {
        Some("custom") => is_block_custom(doc, c),
        Some(name) => BLOCK_CONTENT.contains(&name),
        None => false,
    })
}

fn is_blank(doc: &Document, id: NodeId) -> bool {
    doc.children(id).all(|c| doc.is_whitespace_text(c))
}

impl Pass for Expanding {
    fn name(&self) -> &'static str {
        self.name
    }

    fn apply(&self, doc: &mut Document) -> usize {
        let containers: Vec<NodeId> = doc
            .elements()
            .filter(|&id| doc.element_name(id) == Some(self.container))
            .collect();

        containers
            .into_iter()
            .filter(|&id| self.expand(doc, id))
            .count()
    }
}

// ============================================================================
// EmbedLinking
// ============================================================================

/// Prefix for link attributes carried on an unwrapped embed.
pub const EMBED_LINK_ATTR_PREFIX: &str = "ezlegacytmp-embed-link-";

/// Unwraps `<link>` elements whose only content is a single embed.
///
/// The link's attributes are copied onto the embed with the
/// [`EMBED_LINK_ATTR_PREFIX`] prefix so the stylesheets can rebuild the
/// link inside the embed.
pub struct EmbedLinking;

impl EmbedLinking {
    fn sole_embed(doc: &Document, link: NodeId) -> Option<NodeId> {
        let mut content = doc
            .children(link)
            .filter(|&c| !doc.is_whitespace_text(c));
        let only = content.next()?;
        if content.next().is_some() {
            return None;
        }
        matches!(doc.element_name(only), Some("embed" | "embed-inline")).then_some(only)
    }
}

impl Pass for EmbedLinking {
    fn name(&self) -> &'static str {
        "embed-linking"
    }

    fn apply(&self, doc: &mut Document) -> usize {
        let links: Vec<NodeId> = doc
            .elements()
            .filter(|&id| doc.element_name(id) == Some("link"))
            .collect();

        let mut rewritten = 0;
        for link in links {
            let Some(embed) = Self::sole_embed(doc, link) else {
                continue;
            };
            let carried: Vec<(String, String)> = doc
                .attrs(link)
                .iter()
                .filter(|a| !a.is_namespace_decl())
                .map(|a| (format!("{EMBED_LINK_ATTR_PREFIX}{}", a.local_name()), a.value.clone()))
                .collect();
            for (name, value) in carried {
                doc.set_attr(embed, &name, value);
            }
            doc.insert_before(link, embed);
            doc.detach(link);
            rewritten += 1;
        }
        rewritten
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{parse_document, serialize_node};

    fn root_xml(doc: &Document) -> String {
        serialize_node(doc, doc.document_element().unwrap())
    }

    #[test]
    fn test_expanding_splits_paragraph_around_table() {
        let mut doc = parse_document(
            r#"<section><paragraph class="x">before<table><tr/></table>after</paragraph></section>"#,
        )
        .unwrap();

        assert_eq!(Expanding::blocks().apply(&mut doc), 1);
        assert_eq!(
            root_xml(&doc),
            r#"<section><paragraph class="x">before</paragraph><table><tr/></table><paragraph class="x">after</paragraph></section>"#
        );
    }

    #[test]
    fn test_expanding_lifts_block_custom_only() {
        let mut doc = parse_document(
            r#"<section><paragraph>before<custom name="factbox"><paragraph>box</paragraph></custom>after <custom name="underline">u</custom></paragraph></section>"#,
        )
        .unwrap();

        assert_eq!(Expanding::blocks().apply(&mut doc), 1);
        assert_eq!(
            root_xml(&doc),
            r#"<section><paragraph>before</paragraph><custom name="factbox"><paragraph>box</paragraph></custom><paragraph>after <custom name="underline">u</custom></paragraph></section>"#
        );
        assert_eq!(Expanding::lists().apply(&mut doc), 0);
    }

    #[test]
    fn test_expanding_drops_whitespace_runs() {
        let mut doc =
            parse_document("<section><paragraph>\n  <ul><li/></ul>\n</paragraph></section>").unwrap();

        assert_eq!(Expanding::lists().apply(&mut doc), 1);
        assert_eq!(root_xml(&doc), "<section><ul><li/></ul></section>");
    }

    #[test]
    fn test_expanding_leaves_inline_paragraphs() {
        let mut doc = parse_document("<section><paragraph>a <strong>b</strong></paragraph></section>").unwrap();
        let before = root_xml(&doc);
        assert_eq!(Expanding::blocks().apply(&mut doc), 0);
        assert_eq!(root_xml(&doc), before);
    }

    #[test]
    fn test_embed_linking_unwraps_link() {
        let mut doc = parse_document(
            r#"<section><paragraph><link url_id="3" target="_blank"> <embed object_id="9"/> </link></paragraph></section>"#,
        )
        .unwrap();

        assert_eq!(EmbedLinking.apply(&mut doc), 1);
        assert_eq!(
            root_xml(&doc),
            r#"<section><paragraph><embed object_id="9" ezlegacytmp-embed-link-url_id="3" ezlegacytmp-embed-link-target="_blank"/></paragraph></section>"#
        );
    }

    #[test]
    fn test_embed_linking_ignores_mixed_links() {
        let mut doc = parse_document(
            r#"<section><paragraph><link url_id="3">text<embed object_id="9"/></link></paragraph></section>"#,
        )
        .unwrap();
        assert_eq!(EmbedLinking.apply(&mut doc), 0);
    }

    #[test]
    fn test_legacy_prenormalize_runs_all_passes() {
        let doc = parse_document(
            r#"<section><paragraph>a<ul><li/></ul><link url_id="1"><embed node_id="2"/></link></paragraph></section>"#,
        )
        .unwrap();
        let doc = PreNormalize::legacy().transform(doc).unwrap();
        assert_eq!(
            root_xml(&doc),
            r#"<section><paragraph>a</paragraph><ul><li/></ul><paragraph><embed node_id="2" ezlegacytmp-embed-link-url_id="1"/></paragraph></section>"#
        );
    }
}
