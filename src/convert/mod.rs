//! Structural conversion from the legacy vocabulary to DocBook.
//!
//! The conversion is an ordered list of [`Transform`] values folded over
//! the input document:
//!
//! 1. **Pre-normalization** - in-place rewrites of the legacy tree
//!    (paragraph expansion, list expansion, embed link unwrapping)
//! 2. **Stylesheets** - the priority-ordered stylesheet set, imported into
//!    one transform run by an injected [`StylesheetEngine`]
//!
//! Any failure is fatal for the conversion.

mod prenormalize;
mod xslt;

pub use prenormalize::{EmbedLinking, Expanding, Pass, PreNormalize};
pub use xslt::{
    BASE_STYLESHEET, BASE_STYLESHEET_PRIORITY, StylesheetEngine, StylesheetSpec, Xslt,
    XsltprocEngine, application_order, importing_stylesheet, with_base_stylesheet,
};

use crate::dom::Document;
use crate::error::TransformError;

/// A whole-document conversion step.
pub trait Transform: Send + Sync {
    /// Short name used in logs and error messages.
    fn name(&self) -> &str;

    fn transform(&self, doc: Document) -> Result<Document, TransformError>;
}

/// Runs transforms in order, feeding each the previous output.
pub struct Aggregate {
    stages: Vec<Box<dyn Transform>>,
}

impl Aggregate {
    pub fn new(stages: Vec<Box<dyn Transform>>) -> Self {
        Self { stages }
    }

    /// Names of the registered stages, in application order.
    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.name()).collect()
    }
}

impl Transform for Aggregate {
    fn name(&self) -> &str {
        "aggregate"
    }

    fn transform(&self, doc: Document) -> Result<Document, TransformError> {
        self.stages.iter().try_fold(doc, |doc, stage| {
            tracing::debug!(stage = stage.name(), "applying transform");
            stage.transform(doc)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::parse_document;

    struct Rename(&'static str, &'static str);

    impl Transform for Rename {
        fn name(&self) -> &str {
            self.1
        }

        fn transform(&self, doc: Document) -> Result<Document, TransformError> {
            let mut doc = doc;
            let ids: Vec<_> = doc.elements().collect();
            for id in ids {
                if doc.element_name(id) == Some(self.0)
                    && let Some(node) = doc.node_mut(id)
                    && let crate::dom::NodeData::Element { name, .. } = &mut node.data
                {
                    *name = self.1.to_string();
                }
            }
            Ok(doc)
        }
    }

    struct Fail;

    impl Transform for Fail {
        fn name(&self) -> &str {
            "fail"
        }

        fn transform(&self, _doc: Document) -> Result<Document, TransformError> {
            Err(TransformError::Engine("boom".to_string()))
        }
    }

    #[test]
    fn test_aggregate_applies_in_order() {
        let aggregate = Aggregate::new(vec![Box::new(Rename("a", "b")), Box::new(Rename("b", "c"))]);
        assert_eq!(aggregate.stage_names(), vec!["b", "c"]);

        let doc = aggregate.transform(parse_document("<a/>").unwrap()).unwrap();
        let root = doc.document_element().unwrap();
        assert_eq!(doc.element_name(root), Some("c"));
    }

    #[test]
    fn test_aggregate_stops_at_first_failure() {
        let aggregate = Aggregate::new(vec![Box::new(Fail), Box::new(Rename("a", "b"))]);
        let err = aggregate
            .transform(parse_document("<a/>").unwrap())
            .unwrap_err();
        assert!(err.to_string().contains("boom"));
    }
}
