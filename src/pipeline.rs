//! Conversion orchestrator.
//!
//! ```text
//! Sanitizing -> Converting --(transform error)--> Err(ConvertError)
//!            -> ReconcilingIds (optional)
//!            -> Reparsing --(parse error)--> Ok(Conversion { output: None })
//!            -> TaggingEmbeds -> Validating -> Done
//! ```
//!
//! Only a structural conversion failure is returned as an error. A re-parse
//! failure yields an empty result and validation violations never block
//! the output; both are reported as diagnostics.

use std::collections::HashSet;
use std::sync::{Arc, OnceLock};

use crate::convert::{
    Aggregate, PreNormalize, StylesheetEngine, StylesheetSpec, Transform, Xslt,
    with_base_stylesheet,
};
use crate::diagnostics::{Diagnostic, DiagnosticContext, DiagnosticSink, NullSink, Reporter, Stage, field_label};
use crate::dom::{Document, parse_document, serialize_document};
use crate::embed::EmbedClassifier;
use crate::error::{ConvertError, Result};
use crate::ids::{report_duplicate_ids, sanitize_ids};
use crate::repository::ContentRepository;
use crate::reparse::reparse;
use crate::sanitize::{check_empty_embed_references, strip_comments};
use crate::validate::{StructuralValidatorFactory, Validator, ValidatorFactory, ValidatorSpec, Violation};

/// Per-call switches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConvertOptions {
    /// Report ids the stylesheets had to disambiguate.
    pub check_duplicate_ids: bool,
    /// Rewrite ids that are not valid NCNames.
    pub check_id_values: bool,
    /// Content field being converted; only used in messages.
    pub content_field_id: Option<i64>,
}

impl ConvertOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn check_duplicate_ids(mut self, enabled: bool) -> Self {
        self.check_duplicate_ids = enabled;
        self
    }

    pub fn check_id_values(mut self, enabled: bool) -> Self {
        self.check_id_values = enabled;
        self
    }

    pub fn content_field_id(mut self, id: impl Into<Option<i64>>) -> Self {
        self.content_field_id = id.into();
        self
    }
}

/// Outcome of a non-fatal conversion.
#[derive(Debug, Clone, Default)]
pub struct Conversion {
    /// Serialized document; `None` when the converted tree failed to re-parse.
    pub output: Option<String>,
    pub diagnostics: Vec<Diagnostic>,
    pub violations: Vec<Violation>,
    /// Embed elements whose image marker changed.
    pub embeds_tagged: usize,
}

impl Conversion {
    pub fn is_success(&self) -> bool {
        self.output.is_some()
    }

    pub fn is_valid(&self) -> bool {
        self.is_success() && self.violations.is_empty()
    }
}

/// Converts legacy rich text into DocBook.
///
/// Configuration is shared by every conversion. The aggregate converter and
/// the validator are built on first use (at most once, even with concurrent
/// callers) and dropped again by the matching `set_*` call.
pub struct RichTextConverter {
    engine: Arc<dyn StylesheetEngine>,
    sink: Arc<dyn DiagnosticSink>,
    repository: Option<Arc<dyn ContentRepository>>,
    validator_factory: Arc<dyn ValidatorFactory>,
    stylesheets: Vec<StylesheetSpec>,
    validator_spec: ValidatorSpec,
    image_content_types: HashSet<i64>,
    converter: OnceLock<Aggregate>,
    validator: OnceLock<Box<dyn Validator>>,
}

impl RichTextConverter {
    /// Converter with the base stylesheet, core validators, no repository
    /// and a silent sink.
    pub fn new(engine: Arc<dyn StylesheetEngine>) -> Self {
        Self {
            engine,
            sink: Arc::new(NullSink),
            repository: None,
            validator_factory: Arc::new(StructuralValidatorFactory),
            stylesheets: with_base_stylesheet([]),
            validator_spec: ValidatorSpec::default(),
            image_content_types: HashSet::new(),
            converter: OnceLock::new(),
            validator: OnceLock::new(),
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn DiagnosticSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn with_repository(mut self, repository: Arc<dyn ContentRepository>) -> Self {
        self.repository = Some(repository);
        self
    }

    pub fn with_validator_factory(mut self, factory: Arc<dyn ValidatorFactory>) -> Self {
        self.validator_factory = factory;
        self.validator = OnceLock::new();
        self
    }

    pub fn with_stylesheets(mut self, custom: impl IntoIterator<Item = StylesheetSpec>) -> Self {
        self.set_stylesheets(custom);
        self
    }

    pub fn with_validators(mut self, custom: impl IntoIterator<Item = impl Into<std::path::PathBuf>>) -> Self {
        self.set_validators(custom);
        self
    }

    pub fn with_image_content_types(mut self, types: impl IntoIterator<Item = i64>) -> Self {
        self.set_image_content_types(types);
        self
    }

    /// Replace the custom stylesheets; the base stylesheet stays first.
    pub fn set_stylesheets(&mut self, custom: impl IntoIterator<Item = StylesheetSpec>) {
        self.stylesheets = with_base_stylesheet(custom);
        self.converter = OnceLock::new();
    }

    /// Replace the custom schema resources; the core schema and schematron
    /// stay around them.
    pub fn set_validators(&mut self, custom: impl IntoIterator<Item = impl Into<std::path::PathBuf>>) {
        self.validator_spec = ValidatorSpec::bracketed(custom);
        self.validator = OnceLock::new();
    }

    /// Content type ids whose embeds are tagged as images.
    pub fn set_image_content_types(&mut self, types: impl IntoIterator<Item = i64>) {
        self.image_content_types = types.into_iter().collect();
    }

    /// Stylesheets including the base entry, in configuration order.
    pub fn stylesheets(&self) -> &[StylesheetSpec] {
        &self.stylesheets
    }

    pub fn validator_spec(&self) -> &ValidatorSpec {
        &self.validator_spec
    }

    pub fn image_content_types(&self) -> &HashSet<i64> {
        &self.image_content_types
    }

    /// The aggregate converter, built on first use.
    pub fn converter(&self) -> &Aggregate {
        self.converter.get_or_init(|| {
            tracing::debug!(stylesheets = self.stylesheets.len(), "building converter");
            Aggregate::new(vec![
                Box::new(PreNormalize::legacy()),
                Box::new(Xslt::new(&self.stylesheets, self.engine.clone())),
            ])
        })
    }

    /// The validator, built on first use.
    pub fn validator(&self) -> &dyn Validator {
        self.validator
            .get_or_init(|| self.validator_factory.build(&self.validator_spec))
            .as_ref()
    }

    /// Tag embedded images in an already converted document. Returns how
    /// many embed elements changed.
    ///
    /// Every embedded object must be readable through the repository.
    pub fn tag_embedded_images(&self, doc: &mut Document, content_field_id: Option<i64>) -> usize {
        let mut reporter = Reporter::new(self.sink.as_ref(), content_field_id);
        reporter.enter(Stage::TaggingEmbeds);
        self.tag_with(doc, &mut reporter)
    }

    fn tag_with(&self, doc: &mut Document, reporter: &mut Reporter<'_>) -> usize {
        match &self.repository {
            Some(repository) => EmbedClassifier::new(repository.as_ref(), &self.image_content_types)
                .tag_embedded_images(doc, reporter),
            None => {
                tracing::debug!("no content repository configured, skipping embed tagging");
                0
            }
        }
    }

    /// Parse `xml` and convert it.
    pub fn convert_str(&self, xml: &str, options: ConvertOptions) -> Result<Conversion> {
        let doc = parse_document(xml)?;
        Ok(self.convert(doc, options)?)
    }

    /// Run the full pipeline over `input`.
    pub fn convert(&self, input: Document, options: ConvertOptions) -> std::result::Result<Conversion, ConvertError> {
        let field = field_label(options.content_field_id);
        let span = tracing::debug_span!("convert", field = %field);
        let _guard = span.enter();

        let mut reporter = Reporter::new(self.sink.as_ref(), options.content_field_id);
        let mut input = input;

        reporter.enter(Stage::Sanitizing);
        strip_comments(&mut input);
        check_empty_embed_references(&input, &mut reporter);
        let original = serialize_document(&input);

        reporter.enter(Stage::Converting);
        let mut converted = match self.converter().transform(input) {
            Ok(doc) => doc,
            Err(source) => {
                reporter.error(
                    format!("Unable to convert ezmltext for contentobject_attribute.id={field}"),
                    DiagnosticContext::errors([source.to_string()]).with_input(original),
                );
                return Err(ConvertError {
                    source,
                    diagnostics: reporter.into_diagnostics(),
                });
            }
        };

        if options.check_duplicate_ids || options.check_id_values {
            reporter.enter(Stage::ReconcilingIds);
        }
        if options.check_duplicate_ids {
            report_duplicate_ids(&converted, &mut reporter);
        }
        if options.check_id_values {
            sanitize_ids(&mut converted, &mut reporter);
        }

        reporter.enter(Stage::Reparsing);
        let mut normalized = match reparse(&converted) {
            Ok(doc) => doc,
            Err(failure) => {
                reporter.error(
                    format!("Unable to convert ezmltext for contentobject_attribute.id={field}"),
                    DiagnosticContext::errors([format!(
                        "Unable to parse converted richtext output: {}",
                        failure.error
                    )])
                    .with_result(failure.serialized)
                    .with_input(original),
                );
                return Ok(Conversion {
                    output: None,
                    diagnostics: reporter.into_diagnostics(),
                    ..Conversion::default()
                });
            }
        };

        reporter.enter(Stage::TaggingEmbeds);
        let embeds_tagged = self.tag_with(&mut normalized, &mut reporter);

        reporter.enter(Stage::Validating);
        let violations = self.validator().validate(&normalized);
        let result = serialize_document(&normalized);
        if !violations.is_empty() {
            reporter.error(
                format!("Validation errors when converting ezxmltext for contentobject_attribute.id={field}"),
                DiagnosticContext::errors(violations.iter().map(ToString::to_string))
                    .with_result(result.clone())
                    .with_input(original),
            );
        }

        reporter.enter(Stage::Done);
        Ok(Conversion {
            output: Some(result),
            diagnostics: reporter.into_diagnostics(),
            violations,
            embeds_tagged,
        })
    }
}
