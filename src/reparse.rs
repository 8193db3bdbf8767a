//! Serialize-and-parse round trip of the converted document.
//!
//! Stylesheets may emit unescaped markup (legacy `<line/>` breaks and
//! similar). Writing the tree out and reading it back turns that markup into
//! real nodes, or exposes it as malformed.

use crate::dom::{Document, parse_document, serialize_document};
use crate::error::ParseError;

/// Re-parse failure, keeping the text that failed to parse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReparseFailure {
    pub serialized: String,
    pub error: ParseError,
}

/// Produce a fresh document from the serialized form of `doc`.
pub fn reparse(doc: &Document) -> Result<Document, ReparseFailure> {
    let serialized = serialize_document(doc);
    match parse_document(&serialized) {
        Ok(fresh) => Ok(fresh),
        Err(error) => Err(ReparseFailure { serialized, error }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{NodeData, serialize_node};

    #[test]
    fn test_raw_markup_becomes_elements() {
        let mut doc = parse_document("<para>one</para>").unwrap();
        let para = doc.document_element().unwrap();
        let raw = doc.create_raw_text("<?linebreak?>two &amp; <emphasis>three</emphasis>");
        doc.append(para, raw);

        let fresh = reparse(&doc).unwrap();
        let para = fresh.document_element().unwrap();
        assert_eq!(
            serialize_node(&fresh, para),
            "<para>one<?linebreak?>two &amp; <emphasis>three</emphasis></para>"
        );
        assert!(
            fresh
                .descendants(fresh.root())
                .filter_map(|id| fresh.node(id))
                .all(|n| !matches!(n.data, NodeData::RawText(_)))
        );
    }

    #[test]
    fn test_malformed_raw_markup_is_a_failure() {
        let mut doc = parse_document("<para/>").unwrap();
        let para = doc.document_element().unwrap();
        let raw = doc.create_raw_text("<literallayout>");
        doc.append(para, raw);

        let failure = reparse(&doc).unwrap_err();
        assert!(failure.serialized.contains("<para><literallayout></para>"));
    }
}
