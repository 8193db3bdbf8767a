//! [`Document`] to XML text.

use quick_xml::escape::{escape, partial_escape};

use super::arena::{Document, NodeData, NodeId};

const XML_DECLARATION: &str = r#"<?xml version="1.0" encoding="UTF-8"?>"#;

/// Serialize the whole document, including the XML declaration.
///
/// Each top-level node is written on its own line. `RawText` nodes are
/// written verbatim, so the output is only well-formed if their markup is.
pub fn serialize_document(doc: &Document) -> String {
    let mut out = String::with_capacity(doc.node_count() * 16);
    out.push_str(XML_DECLARATION);
    out.push('\n');
    for child in doc.children(doc.root()) {
        write_node(doc, child, &mut out);
        out.push('\n');
    }
    out
}

/// Serialize a single node and its subtree, without a declaration.
pub fn serialize_node(doc: &Document, id: NodeId) -> String {
    if id == doc.root() {
        return serialize_document(doc);
    }
    let mut out = String::new();
    write_node(doc, id, &mut out);
    out
}

fn write_node(doc: &Document, id: NodeId, out: &mut String) {
    let Some(node) = doc.node(id) else {
        return;
    };

    match &node.data {
        NodeData::Document => {
            for child in doc.children(id) {
                write_node(doc, child, out);
            }
        }
        NodeData::Element { name, attrs } => {
            out.push('<');
            out.push_str(name);
            for attr in attrs {
                out.push(' ');
                out.push_str(&attr.name);
                out.push_str("=\"");
                out.push_str(&escape(attr.value.as_str()));
                out.push('"');
            }
            if node.first_child.is_none() {
                out.push_str("/>");
                return;
            }
            out.push('>');
            for child in doc.children(id) {
                write_node(doc, child, out);
            }
            out.push_str("</");
            out.push_str(name);
            out.push('>');
        }
        NodeData::Text(text) => out.push_str(&partial_escape(text.as_str())),
        NodeData::RawText(markup) => out.push_str(markup),
        NodeData::CData(text) => {
            out.push_str("<![CDATA[");
            out.push_str(text);
            out.push_str("]]>");
        }
        NodeData::Comment(text) => {
            out.push_str("<!--");
            out.push_str(text);
            out.push_str("-->");
        }
        NodeData::ProcessingInstruction { target, data } => {
            out.push_str("<?");
            out.push_str(target);
            if !data.is_empty() {
                out.push(' ');
                out.push_str(data);
            }
            out.push_str("?>");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::parse_document;

    #[test]
    fn test_serialize_escapes_text_and_attributes() {
        let mut doc = Document::new();
        let p = doc.create_element("p", vec![]);
        doc.append(doc.root(), p);
        doc.set_attr(p, "title", "\"a\" & <b>");
        doc.append_text(p, "1 < 2 & 3 > 2");

        assert_eq!(
            serialize_node(&doc, p),
            r#"<p title="&quot;a&quot; &amp; &lt;b&gt;">1 &lt; 2 &amp; 3 &gt; 2</p>"#
        );
    }

    #[test]
    fn test_serialize_document_has_declaration() {
        let doc = parse_document("<section><para/><!--c--></section>").unwrap();
        assert_eq!(
            serialize_document(&doc),
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<section><para/><!--c--></section>\n"
        );
    }

    #[test]
    fn test_raw_text_is_verbatim() {
        let mut doc = Document::new();
        let p = doc.create_element("para", vec![]);
        doc.append(doc.root(), p);
        let raw = doc.create_raw_text("<literallayout/>");
        doc.append(p, raw);
        assert_eq!(serialize_node(&doc, p), "<para><literallayout/></para>");
    }

    #[test]
    fn test_reparse_of_serialized_output_is_stable() {
        let source = r#"<section xmlns="http://docbook.org/ns/docbook" xmlns:xlink="http://www.w3.org/1999/xlink"><para>a &amp; b<link xlink:href="x?a=1&amp;b=2"/></para></section>"#;
        let once = serialize_document(&parse_document(source).unwrap());
        let twice = serialize_document(&parse_document(&once).unwrap());
        assert_eq!(once, twice);
    }
}
