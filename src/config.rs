//! JSON converter configuration.
//!
//! ```json
//! {
//!   "resource_dir": "/usr/share/xmltext",
//!   "stylesheets": [{ "path": "custom/tags.xsl", "priority": 50 }],
//!   "validators": ["custom/tags.rng"],
//!   "image_content_types": [5, 27],
//!   "schema_validation": true,
//!   "content": { "57": 5 },
//!   "locations": { "59": 57 }
//! }
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Deserialize;

use crate::convert::{StylesheetSpec, XsltprocEngine};
use crate::diagnostics::DiagnosticSink;
use crate::error::{Error, Result};
use crate::pipeline::RichTextConverter;
use crate::repository::InMemoryRepository;
use crate::validate::CommandLineValidatorFactory;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConverterConfig {
    /// Directory relative stylesheet and schema paths are resolved against.
    pub resource_dir: Option<PathBuf>,
    pub stylesheets: Vec<StylesheetSpec>,
    pub validators: Vec<PathBuf>,
    pub image_content_types: Vec<i64>,
    /// Run the schema resources through xmllint/xsltproc instead of the
    /// built-in structural checks.
    pub schema_validation: bool,
    pub xsltproc: Option<PathBuf>,
    pub xmllint: Option<PathBuf>,
    /// Content id to content type id.
    pub content: HashMap<i64, i64>,
    /// Location id to content id.
    pub locations: HashMap<i64, i64>,
}

impl ConverterConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.check()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    fn check(&self) -> Result<()> {
        if let Some(spec) = self.stylesheets.iter().find(|s| s.path.as_os_str().is_empty()) {
            return Err(Error::Config(format!(
                "stylesheet with priority {} has an empty path",
                spec.priority
            )));
        }
        if self.validators.iter().any(|p| p.as_os_str().is_empty()) {
            return Err(Error::Config("validator with an empty path".to_string()));
        }
        Ok(())
    }

    fn resource_dir(&self) -> PathBuf {
        self.resource_dir.clone().unwrap_or_else(|| PathBuf::from("."))
    }

    /// Repository holding the configured content and locations.
    pub fn repository(&self) -> InMemoryRepository {
        let mut repository = InMemoryRepository::new();
        for (&content_id, &content_type_id) in &self.content {
            repository.insert_content(content_id, content_type_id);
        }
        for (&location_id, &content_id) in &self.locations {
            repository.insert_location(location_id, content_id);
        }
        repository
    }

    /// Build a converter from this configuration.
    pub fn build(&self, sink: Arc<dyn DiagnosticSink>) -> RichTextConverter {
        let mut engine = XsltprocEngine::new(self.resource_dir());
        if let Some(program) = &self.xsltproc {
            engine = engine.with_program(program);
        }

        let mut converter = RichTextConverter::new(Arc::new(engine))
            .with_sink(sink)
            .with_repository(Arc::new(self.repository()))
            .with_stylesheets(self.stylesheets.iter().cloned())
            .with_validators(self.validators.iter().cloned())
            .with_image_content_types(self.image_content_types.iter().copied());

        if self.schema_validation {
            let mut factory = CommandLineValidatorFactory::new(self.resource_dir());
            if let Some(program) = &self.xsltproc {
                factory = factory.with_xsltproc(program);
            }
            if let Some(program) = &self.xmllint {
                factory = factory.with_xmllint(program);
            }
            converter = converter.with_validator_factory(Arc::new(factory));
        }

        converter
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::NullSink;
    use crate::repository::{ContentRepository, Lookup};

    #[test]
    fn test_parse_config() {
        let config = ConverterConfig::from_json(
            r#"{
                "stylesheets": [{"path": "custom.xsl", "priority": 50}],
                "validators": ["custom.rng"],
                "image_content_types": [5],
                "content": {"57": 5},
                "locations": {"59": 57}
            }"#,
        )
        .unwrap();

        assert_eq!(config.stylesheets, vec![StylesheetSpec::new("custom.xsl", 50)]);
        let repository = config.repository();
        let Lookup::Found(location) = repository.load_location(59) else {
            panic!("location 59 should resolve");
        };
        assert_eq!(location.content_info.content_type_id, 5);

        let converter = config.build(Arc::new(NullSink));
        assert_eq!(converter.stylesheets().len(), 2);
        assert_eq!(converter.validator_spec().paths().len(), 3);
        assert!(converter.image_content_types().contains(&5));
    }

    #[test]
    fn test_rejects_unknown_fields_and_empty_paths() {
        assert!(matches!(
            ConverterConfig::from_json(r#"{"stylesheet": []}"#),
            Err(Error::Json(_))
        ));
        assert!(matches!(
            ConverterConfig::from_json(r#"{"validators": [""]}"#),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("xmltext.json");
        std::fs::write(&path, r#"{"image_content_types": [5, 27]}"#).unwrap();

        let config = ConverterConfig::load(&path).unwrap();
        assert_eq!(config.image_content_types, vec![5, 27]);
    }
}
