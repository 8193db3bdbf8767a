//! XML text to [`Document`] using quick-xml.

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use crate::error::ParseError;

use super::arena::{Attribute, Document, NodeId};

/// Parse a complete XML document.
///
/// Entity references are limited to the five predefined entities and
/// character references; anything else is an error, as is a missing,
/// duplicated or unclosed document element.
pub fn parse_document(xml: &str) -> Result<Document, ParseError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(false);

    let mut doc = Document::new();
    let mut stack: Vec<NodeId> = vec![doc.root()];
    let mut seen_root = false;

    loop {
        let position = reader.buffer_position() as u64;
        let event = reader
            .read_event()
            .map_err(|e| ParseError::new(e.to_string(), position))?;

        let parent = stack.last().copied().unwrap_or(NodeId::ROOT);
        let at_top_level = stack.len() == 1;

        match event {
            Event::Start(e) => {
                check_single_root(&mut seen_root, at_top_level, position)?;
                let element = create_element(&mut doc, &e, position)?;
                doc.append(parent, element);
                stack.push(element);
            }
            Event::Empty(e) => {
                check_single_root(&mut seen_root, at_top_level, position)?;
                let element = create_element(&mut doc, &e, position)?;
                doc.append(parent, element);
            }
            Event::End(_) => {
                stack.pop();
            }
            Event::Text(e) => {
                let text = utf8(e.as_ref(), position)?;
                if at_top_level {
                    if !text.trim().is_empty() {
                        return Err(ParseError::new(
                            "text content outside the document element",
                            position,
                        ));
                    }
                } else {
                    doc.append_text(parent, text);
                }
            }
            Event::GeneralRef(e) => {
                let entity = utf8(e.as_ref(), position)?;
                let resolved = resolve_entity(entity).ok_or_else(|| {
                    ParseError::new(format!("undeclared entity '&{entity};'"), position)
                })?;
                if at_top_level {
                    return Err(ParseError::new(
                        "entity reference outside the document element",
                        position,
                    ));
                }
                doc.append_text(parent, &resolved);
            }
            Event::CData(e) => {
                let text = utf8(e.as_ref(), position)?.to_string();
                let cdata = doc.create_cdata(text);
                doc.append(parent, cdata);
            }
            Event::Comment(e) => {
                let text = utf8(e.as_ref(), position)?.to_string();
                let comment = doc.create_comment(text);
                doc.append(parent, comment);
            }
            Event::PI(e) => {
                let raw = utf8(e.as_ref(), position)?;
                let (target, data) = match raw.split_once(char::is_whitespace) {
                    Some((target, data)) => (target, data.trim_start()),
                    None => (raw, ""),
                };
                let pi = doc.create_pi(target, data);
                doc.append(parent, pi);
            }
            Event::Decl(_) | Event::DocType(_) => {}
            Event::Eof => break,
        }
    }

    if stack.len() > 1 {
        let open = stack
            .last()
            .and_then(|&id| doc.element_name(id))
            .unwrap_or_default();
        return Err(ParseError::new(
            format!("unclosed element '{open}' at end of input"),
            xml.len() as u64,
        ));
    }
    if !seen_root {
        return Err(ParseError::new("document has no root element", 0));
    }

    Ok(doc)
}

fn check_single_root(seen_root: &mut bool, at_top_level: bool, position: u64) -> Result<(), ParseError> {
    if !at_top_level {
        return Ok(());
    }
    if *seen_root {
        return Err(ParseError::new(
            "extra content after the document element",
            position,
        ));
    }
    *seen_root = true;
    Ok(())
}

fn create_element(doc: &mut Document, e: &BytesStart<'_>, position: u64) -> Result<NodeId, ParseError> {
    let name = utf8(e.name().as_ref(), position)?.to_string();

    let mut attrs = Vec::new();
    for attr in e.attributes() {
        let attr = attr.map_err(|err| ParseError::new(err.to_string(), position))?;
        let key = utf8(attr.key.as_ref(), position)?;
        let raw = utf8(attr.value.as_ref(), position)?;
        let value = quick_xml::escape::unescape(raw)
            .map_err(|err| ParseError::new(format!("attribute '{key}': {err}"), position))?;
        attrs.push(Attribute::new(key, value));
    }

    Ok(doc.create_element(name, attrs))
}

fn utf8(bytes: &[u8], position: u64) -> Result<&str, ParseError> {
    std::str::from_utf8(bytes).map_err(|e| ParseError::new(e.to_string(), position))
}

/// Resolve a predefined entity or character reference (name without `&`/`;`).
fn resolve_entity(entity: &str) -> Option<String> {
    match entity {
        "apos" => return Some("'".to_string()),
        "quot" => return Some("\"".to_string()),
        "lt" => return Some("<".to_string()),
        "gt" => return Some(">".to_string()),
        "amp" => return Some("&".to_string()),
        _ => {}
    }

    if let Some(hex) = entity.strip_prefix("#x") {
        if let Ok(code) = u32::from_str_radix(hex, 16)
            && let Some(c) = char::from_u32(code)
        {
            return Some(c.to_string());
        }
    } else if let Some(dec) = entity.strip_prefix('#')
        && let Ok(code) = dec.parse::<u32>()
        && let Some(c) = char::from_u32(code)
    {
        return Some(c.to_string());
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::NodeData;

    #[test]
    fn test_parse_nested_elements() {
        let doc = parse_document(
            r#"<?xml version="1.0"?><section xmlns="http://docbook.org/ns/docbook"><para xml:id="a">Hi <emphasis>there</emphasis></para></section>"#,
        )
        .unwrap();

        let root = doc.document_element().unwrap();
        assert_eq!(doc.element_name(root), Some("section"));
        let para = doc.children(root).next().unwrap();
        assert_eq!(doc.xml_id(para), Some("a"));
        assert_eq!(doc.text_content(para), "Hi there");
    }

    #[test]
    fn test_entities_are_resolved() {
        let doc = parse_document("<p title=\"a &amp; b\">Don&apos;t &#x41;&#66;</p>").unwrap();
        let p = doc.document_element().unwrap();
        assert_eq!(doc.attr(p, "title"), Some("a & b"));
        assert_eq!(doc.text_content(p), "Don't AB");
    }

    #[test]
    fn test_comments_and_pis_are_kept() {
        let doc = parse_document("<!-- top --><p><?php echo ?><!-- inner --></p>").unwrap();
        let kinds: Vec<_> = doc
            .descendants(doc.root())
            .filter_map(|id| doc.node(id))
            .map(|n| std::mem::discriminant(&n.data))
            .collect();
        assert_eq!(kinds.len(), 5);
        let p = doc.document_element().unwrap();
        let pi = doc.children(p).next().unwrap();
        assert_eq!(
            doc.node(pi).unwrap().data,
            NodeData::ProcessingInstruction {
                target: "php".to_string(),
                data: "echo ".to_string()
            }
        );
    }

    #[test]
    fn test_undeclared_entity_fails() {
        let err = parse_document("<p>a&nbsp;b</p>").unwrap_err();
        assert!(err.message.contains("nbsp"));
    }

    #[test]
    fn test_malformed_documents_fail() {
        assert!(parse_document("<p><b></p>").is_err());
        assert!(parse_document("<p>").is_err());
        assert!(parse_document("<p/><q/>").is_err());
        assert!(parse_document("text<p/>").is_err());
        assert!(parse_document("").is_err());
    }
}
