//! Priority-ordered stylesheets.
//!
//! The stylesheets are applied together, as one transform: a main
//! stylesheet imports them in ascending priority number, so the base entry
//! (99) overrides caller templates below 99 and is overridden by those
//! above it.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::Arc;

use quick_xml::escape::escape;
use tempfile::NamedTempFile;

use crate::dom::{Document, parse_document, serialize_document};
use crate::error::TransformError;

use super::Transform;

/// Core legacy-to-DocBook stylesheet, relative to the resource directory.
pub const BASE_STYLESHEET: &str = "stylesheets/eZXml2Docbook_core.xsl";

/// Priority of [`BASE_STYLESHEET`].
pub const BASE_STYLESHEET_PRIORITY: i32 = 99;

/// A stylesheet and its priority.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "cli", derive(serde::Deserialize))]
pub struct StylesheetSpec {
    pub path: PathBuf,
    pub priority: i32,
}

impl StylesheetSpec {
    pub fn new(path: impl Into<PathBuf>, priority: i32) -> Self {
        Self {
            path: path.into(),
            priority,
        }
    }

    /// The fixed base entry.
    pub fn base() -> Self {
        Self::new(BASE_STYLESHEET, BASE_STYLESHEET_PRIORITY)
    }
}

/// Prepend the base stylesheet to caller-supplied entries.
pub fn with_base_stylesheet(custom: impl IntoIterator<Item = StylesheetSpec>) -> Vec<StylesheetSpec> {
    std::iter::once(StylesheetSpec::base()).chain(custom).collect()
}

/// Order in which stylesheets are applied.
///
/// Ascending priority number; as imports, later entries take precedence.
/// Equal priorities keep their input order, so a caller entry at 99 is
/// imported after the base.
pub fn application_order(specs: &[StylesheetSpec]) -> Vec<StylesheetSpec> {
    let mut ordered = specs.to_vec();
    ordered.sort_by_key(|spec| spec.priority);
    ordered
}

/// Applies a set of stylesheets to a document as one transform.
///
/// `stylesheets` is in application order: later entries take precedence
/// over earlier ones, the way later `xsl:import`s do.
pub trait StylesheetEngine: Send + Sync {
    fn apply(&self, stylesheets: &[StylesheetSpec], doc: Document) -> Result<Document, TransformError>;
}

/// Stylesheet stage.
pub struct Xslt {
    stylesheets: Vec<StylesheetSpec>,
    engine: Arc<dyn StylesheetEngine>,
}

impl Xslt {
    /// Build the stage from unordered specs.
    pub fn new(specs: &[StylesheetSpec], engine: Arc<dyn StylesheetEngine>) -> Self {
        Self {
            stylesheets: application_order(specs),
            engine,
        }
    }
}

impl Transform for Xslt {
    fn name(&self) -> &str {
        "xslt"
    }

    fn transform(&self, doc: Document) -> Result<Document, TransformError> {
        tracing::debug!(stylesheets = self.stylesheets.len(), "applying stylesheets");
        self.engine.apply(&self.stylesheets, doc)
    }
}

// ============================================================================
// xsltproc
// ============================================================================

const XSL_NS: &str = "http://www.w3.org/1999/XSL/Transform";

/// Main stylesheet importing `imports` in order, so the last one has the
/// highest import precedence.
pub fn importing_stylesheet(imports: &[PathBuf]) -> String {
    let mut xsl = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    xsl.push_str(&format!("<xsl:stylesheet version=\"1.0\" xmlns:xsl=\"{XSL_NS}\">\n"));
    for path in imports {
        let href = path.to_string_lossy();
        xsl.push_str(&format!("  <xsl:import href=\"{}\"/>\n", escape(&*href)));
    }
    xsl.push_str("</xsl:stylesheet>\n");
    xsl
}

/// Runs stylesheets through the `xsltproc` executable.
///
/// Relative stylesheet paths are resolved against the resource directory.
/// Every call writes a temporary main stylesheet importing the whole set.
#[derive(Debug, Clone)]
pub struct XsltprocEngine {
    program: PathBuf,
    resource_dir: PathBuf,
}

impl Default for XsltprocEngine {
    fn default() -> Self {
        Self::new(".")
    }
}

impl XsltprocEngine {
    pub fn new(resource_dir: impl Into<PathBuf>) -> Self {
        Self {
            program: PathBuf::from("xsltproc"),
            resource_dir: resource_dir.into(),
        }
    }

    /// Use a specific `xsltproc` binary instead of the one on `PATH`.
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    /// Absolute path of a stylesheet; imports are resolved relative to the
    /// temporary main stylesheet, so relative hrefs would not work.
    fn resolve(&self, path: &Path) -> Result<PathBuf, TransformError> {
        let joined = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.resource_dir.join(path)
        };
        std::path::absolute(&joined).map_err(|e| TransformError::Stylesheet {
            path: joined.display().to_string(),
            message: e.to_string(),
        })
    }

    fn write_main_stylesheet(&self, stylesheets: &[StylesheetSpec]) -> Result<NamedTempFile, TransformError> {
        let imports = stylesheets
            .iter()
            .map(|spec| self.resolve(&spec.path))
            .collect::<Result<Vec<_>, _>>()?;

        let engine_error = |e: std::io::Error| TransformError::Engine(format!("main stylesheet: {e}"));
        let mut main = tempfile::Builder::new()
            .prefix("xmltext-")
            .suffix(".xsl")
            .tempfile()
            .map_err(engine_error)?;
        main.write_all(importing_stylesheet(&imports).as_bytes())
            .map_err(engine_error)?;
        main.flush().map_err(engine_error)?;
        Ok(main)
    }
}

impl StylesheetEngine for XsltprocEngine {
    fn apply(&self, stylesheets: &[StylesheetSpec], doc: Document) -> Result<Document, TransformError> {
        let main = self.write_main_stylesheet(stylesheets)?;
        let label = stylesheets
            .iter()
            .map(|spec| spec.path.display().to_string())
            .collect::<Vec<_>>()
            .join(", ");
        let input = serialize_document(&doc);

        let mut child = Command::new(&self.program)
            .arg(main.path())
            .arg("-")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| TransformError::Engine(format!("{}: {e}", self.program.display())))?;

        // Feed stdin from another thread so a full stdout pipe can't deadlock us
        let writer = child.stdin.take().map(|mut stdin| {
            std::thread::spawn(move || stdin.write_all(input.as_bytes()))
        });

        let output = child
            .wait_with_output()
            .map_err(|e| TransformError::Engine(e.to_string()))?;

        let written = match writer.map(|handle| handle.join()) {
            Some(Ok(result)) => result,
            Some(Err(_)) => return Err(TransformError::Engine("stdin writer panicked".to_string())),
            None => Ok(()),
        };

        if !output.status.success() {
            return Err(TransformError::Stylesheet {
                path: label,
                message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        if let Err(e) = written {
            return Err(TransformError::Stylesheet {
                path: label,
                message: format!("failed to write input: {e}"),
            });
        }

        let text = String::from_utf8(output.stdout).map_err(|e| TransformError::Stylesheet {
            path: label.clone(),
            message: e.to_string(),
        })?;
        parse_document(&text).map_err(|source| TransformError::Malformed {
            stage: label,
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    #[derive(Default)]
    struct Recorder {
        applied: Mutex<Vec<Vec<i32>>>,
    }

    impl StylesheetEngine for Recorder {
        fn apply(&self, stylesheets: &[StylesheetSpec], doc: Document) -> Result<Document, TransformError> {
            let priorities = stylesheets.iter().map(|s| s.priority).collect();
            self.applied.lock().unwrap().push(priorities);
            Ok(doc)
        }
    }

    #[test]
    fn test_base_is_prepended() {
        let specs = with_base_stylesheet([StylesheetSpec::new("custom.xsl", 10)]);
        assert_eq!(specs[0], StylesheetSpec::base());
        assert_eq!(specs[1].path, PathBuf::from("custom.xsl"));
    }

    #[test]
    fn test_application_order_is_ascending_and_stable() {
        let specs = with_base_stylesheet([
            StylesheetSpec::new("ten.xsl", 10),
            StylesheetSpec::new("late-99.xsl", 99),
            StylesheetSpec::new("fifty.xsl", 50),
        ]);
        let order: Vec<_> = application_order(&specs)
            .into_iter()
            .map(|s| s.path.display().to_string())
            .collect();
        assert_eq!(order, vec!["ten.xsl", "fifty.xsl", BASE_STYLESHEET, "late-99.xsl"]);
    }

    #[test]
    fn test_engine_receives_the_whole_set_in_order() {
        let engine = Arc::new(Recorder::default());
        let xslt = Xslt::new(
            &with_base_stylesheet([StylesheetSpec::new("a.xsl", 10), StylesheetSpec::new("b.xsl", 50)]),
            engine.clone(),
        );

        for _ in 0..2 {
            xslt.transform(parse_document("<section/>").unwrap()).unwrap();
        }
        assert_eq!(*engine.applied.lock().unwrap(), vec![vec![10, 50, 99], vec![10, 50, 99]]);
    }

    #[test]
    fn test_missing_xsltproc_is_an_engine_error() {
        let engine = XsltprocEngine::default().with_program("/nonexistent/xsltproc");
        let err = engine
            .apply(&[StylesheetSpec::base()], parse_document("<section/>").unwrap())
            .unwrap_err();
        assert!(matches!(err, TransformError::Engine(_)));
    }

    #[test]
    fn test_importing_stylesheet_lists_imports_in_order() {
        let xsl = importing_stylesheet(&[
            PathBuf::from("/res/custom/tags.xsl"),
            PathBuf::from("/res/stylesheets/eZXml2Docbook_core.xsl"),
            PathBuf::from("/res/a&b.xsl"),
        ]);

        let doc = parse_document(&xsl).unwrap();
        let root = doc.document_element().unwrap();
        assert_eq!(doc.namespace_uri(root), Some(XSL_NS));
        let hrefs: Vec<_> = doc
            .children(root)
            .filter(|&c| doc.local_name(c) == Some("import"))
            .filter_map(|c| doc.attr(c, "href"))
            .collect();
        assert_eq!(
            hrefs,
            vec!["/res/custom/tags.xsl", "/res/stylesheets/eZXml2Docbook_core.xsl", "/res/a&b.xsl"]
        );
    }

    #[test]
    fn test_main_stylesheet_imports_absolute_paths() {
        let dir = tempfile::tempdir().unwrap();
        let engine = XsltprocEngine::new(dir.path());
        let main = engine
            .write_main_stylesheet(&[StylesheetSpec::new("custom/tags.xsl", 10), StylesheetSpec::base()])
            .unwrap();

        let text = std::fs::read_to_string(main.path()).unwrap();
        let tags = dir.path().join("custom/tags.xsl");
        let base = dir.path().join(BASE_STYLESHEET);
        let tags_at = text.find(tags.to_str().unwrap()).unwrap();
        let base_at = text.find(base.to_str().unwrap()).unwrap();
        assert!(tags_at < base_at);
    }
}
