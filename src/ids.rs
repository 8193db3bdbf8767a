//! Identity attribute (`xml:id`) checks on the converted document.
//!
//! Two independent scans:
//! - duplicate reporting: the stylesheets rename colliding ids to
//!   `duplicated_id_<original>_<suffix>`; each one is surfaced as a warning
//! - sanitization: ids that are not `^[A-Za-z_][A-Za-z0-9_-]*$` are
//!   rewritten in place to `rewrite_<original>` with every disallowed
//!   character replaced by `_`

use crate::diagnostics::Reporter;
use crate::dom::{Document, NodeId};

/// Marker the stylesheets put in front of auto-disambiguated ids.
pub const DUPLICATED_ID_PREFIX: &str = "duplicated_id_";

/// Prefix added to rewritten ids.
pub const REWRITE_PREFIX: &str = "rewrite_";

/// Recover `<original>` from `duplicated_id_<original>_<suffix>`.
///
/// `<original>` may itself contain underscores; the suffix is whatever
/// follows the last one.
pub fn parse_duplicated_id(id: &str) -> Option<&str> {
    let rest = id.strip_prefix(DUPLICATED_ID_PREFIX)?;
    let (original, _suffix) = rest.rsplit_once('_')?;
    Some(original)
}

fn is_valid_first(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_valid_trailing(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-'
}

/// Whether an identity value needs rewriting. Empty values never do.
pub fn needs_rewrite(value: &str) -> bool {
    let mut chars = value.chars();
    match chars.next() {
        None => false,
        Some(first) => !is_valid_first(first) || !chars.all(is_valid_trailing),
    }
}

/// `rewrite_<value>` with every character outside `[A-Za-z0-9_-]` mapped
/// to `_`.
pub fn rewrite_id(value: &str) -> String {
    let mut out = String::with_capacity(REWRITE_PREFIX.len() + value.len());
    out.push_str(REWRITE_PREFIX);
    out.extend(value.chars().map(|c| if is_valid_trailing(c) { c } else { '_' }));
    out
}

fn elements_with_id(doc: &Document) -> Vec<(NodeId, String)> {
    doc.elements()
        .filter_map(|id| doc.xml_id(id).map(|value| (id, value.to_string())))
        .collect()
}

/// Warn about every id the stylesheets disambiguated. Never mutates.
pub fn report_duplicate_ids(doc: &Document, reporter: &mut Reporter<'_>) -> usize {
    let mut reported = 0;
    for (_, value) in elements_with_id(doc) {
        let Some(original) = parse_duplicated_id(&value) else {
            continue;
        };
        reporter.warning(format!(
            "Duplicated id in original ezxmltext for contentobject_attribute.id={}, automatically generated new id : {original} --> {value}",
            reporter.field_label()
        ));
        reported += 1;
    }
    reported
}

/// Rewrite every non-conforming id in place, warning once per rewrite.
pub fn sanitize_ids(doc: &mut Document, reporter: &mut Reporter<'_>) -> usize {
    let mut rewritten = 0;
    for (node, value) in elements_with_id(doc) {
        if !needs_rewrite(&value) {
            continue;
        }
        let new_value = rewrite_id(&value);
        doc.set_xml_id(node, new_value.clone());
        reporter.warning(format!(
            "Replaced non-validating id value in richtext for contentobject_attribute.id={}, changed from : {value} --> {new_value}",
            reporter.field_label()
        ));
        rewritten += 1;
    }
    rewritten
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::{CollectingSink, NullSink};
    use crate::dom::parse_document;
    use proptest::prelude::*;

    const DOCBOOK: &str = r#"xmlns="http://docbook.org/ns/docbook""#;

    #[test]
    fn test_parse_duplicated_id() {
        assert_eq!(
            parse_duplicated_id("duplicated_id_foo_bar_idm45226413447104"),
            Some("foo_bar")
        );
        assert_eq!(parse_duplicated_id("duplicated_id_foo_x"), Some("foo"));
        assert_eq!(parse_duplicated_id("duplicated_id_foo"), None);
        assert_eq!(parse_duplicated_id("foo_bar"), None);
    }

    #[test]
    fn test_needs_rewrite() {
        assert!(!needs_rewrite("abc"));
        assert!(!needs_rewrite("_a-1"));
        assert!(!needs_rewrite(""));
        assert!(needs_rewrite("1abc"));
        assert!(needs_rewrite("-abc"));
        assert!(needs_rewrite("a b"));
        assert!(needs_rewrite("a.b"));
        assert!(needs_rewrite("éa"));
        assert!(needs_rewrite("aé"));
    }

    #[test]
    fn test_rewrite_id() {
        assert_eq!(rewrite_id("1 a.b"), "rewrite_1_a_b");
        assert_eq!(rewrite_id("-x"), "rewrite_-x");
        assert_eq!(rewrite_id("aé"), "rewrite_a_");
    }

    #[test]
    fn test_report_duplicate_ids() {
        let doc = parse_document(&format!(
            r#"<section {DOCBOOK}><para xml:id="foo_bar"/><para xml:id="duplicated_id_foo_bar_idm45226413447104"/></section>"#
        ))
        .unwrap();
        let sink = CollectingSink::new();
        let mut reporter = Reporter::new(&sink, None);

        assert_eq!(report_duplicate_ids(&doc, &mut reporter), 1);
        let (_, message) = &sink.entries()[0];
        assert_eq!(
            message,
            "Duplicated id in original ezxmltext for contentobject_attribute.id=[unknown], automatically generated new id : foo_bar --> duplicated_id_foo_bar_idm45226413447104"
        );
    }

    #[test]
    fn test_sanitize_ids_rewrites_in_place_and_is_closed() {
        let mut doc = parse_document(&format!(
            r#"<section {DOCBOOK}><para xml:id="1st"/><para xml:id="ok_id"/><para xml:id="a:b c"/><para id="9"/></section>"#
        ))
        .unwrap();
        let sink = NullSink;
        let mut reporter = Reporter::new(&sink, Some(3));

        assert_eq!(sanitize_ids(&mut doc, &mut reporter), 2);
        let ids: Vec<_> = doc
            .elements()
            .filter_map(|id| doc.xml_id(id).map(str::to_string))
            .collect();
        assert_eq!(ids, vec!["rewrite_1st", "ok_id", "rewrite_a_b_c"]);
        assert!(reporter.diagnostics()[0].message.ends_with("1st --> rewrite_1st"));

        let mut again = Reporter::new(&sink, Some(3));
        assert_eq!(sanitize_ids(&mut doc, &mut again), 0);
        assert!(again.diagnostics().is_empty());
    }

    proptest! {
        #[test]
        fn prop_rewritten_ids_never_need_rewrite(value in "\\PC{1,24}") {
            let rewritten = rewrite_id(&value);
            prop_assert!(!needs_rewrite(&rewritten));
            prop_assert_eq!(rewritten.chars().count(), REWRITE_PREFIX.len() + value.chars().count());
        }

        #[test]
        fn prop_valid_ids_are_left_alone(value in "[A-Za-z_][A-Za-z0-9_-]{0,24}") {
            prop_assert!(!needs_rewrite(&value));
        }

        #[test]
        fn prop_duplicated_id_recovers_original(
            original in "[A-Za-z_][A-Za-z0-9_]{0,16}",
            suffix in "idm[0-9]{1,12}"
        ) {
            let generated = format!("{DUPLICATED_ID_PREFIX}{original}_{suffix}");
            prop_assert_eq!(parse_duplicated_id(&generated), Some(original.as_str()));
        }
    }
}
