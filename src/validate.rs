//! Advisory validation of the converted document.
//!
//! Validation never blocks output: the pipeline reports violations and
//! still returns the serialized document.

use std::collections::HashMap;
use std::ffi::OsStr;
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::dom::{Document, NodeId, parse_document, serialize_document};
use crate::ids::needs_rewrite;

/// Core RELAX NG schema, always validated first.
pub const CORE_SCHEMA: &str = "schemas/docbook/ezpublish.rng";

/// Core schematron transform, always validated last.
pub const CORE_SCHEMATRON: &str = "schemas/docbook/docbook.iso.sch.xsl";

/// DocBook 5 namespace.
pub const DOCBOOK_NS: &str = "http://docbook.org/ns/docbook";

/// Ordered schema and schematron resources.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatorSpec {
    paths: Vec<PathBuf>,
}

impl Default for ValidatorSpec {
    fn default() -> Self {
        Self::bracketed(Vec::<PathBuf>::new())
    }
}

impl ValidatorSpec {
    /// Core schema, then `custom` in order, then core schematron.
    pub fn bracketed(custom: impl IntoIterator<Item = impl Into<PathBuf>>) -> Self {
        let mut paths = vec![PathBuf::from(CORE_SCHEMA)];
        paths.extend(custom.into_iter().map(Into::into));
        paths.push(PathBuf::from(CORE_SCHEMATRON));
        Self { paths }
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }
}

/// One schema or schematron failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub message: String,
    /// Where in the document, when the validator knows.
    pub location: Option<String>,
}

impl Violation {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            location: None,
        }
    }

    pub fn at(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.location {
            Some(location) => write!(f, "{location}: {}", self.message),
            None => f.write_str(&self.message),
        }
    }
}

/// Checks a document and lists what is wrong with it.
pub trait Validator: Send + Sync {
    fn validate(&self, doc: &Document) -> Vec<Violation>;
}

/// Builds a validator for a set of schema resources.
pub trait ValidatorFactory: Send + Sync {
    fn build(&self, spec: &ValidatorSpec) -> Box<dyn Validator>;
}

/// `/section/para[2]` style path of an element.
pub fn element_path(doc: &Document, id: NodeId) -> String {
    let mut segments = Vec::new();
    for node in std::iter::once(id).chain(doc.ancestors(id)) {
        let Some(name) = doc.element_name(node) else {
            continue;
        };
        let position = doc
            .parent(node)
            .map(|parent| {
                doc.children(parent)
                    .take_while(|&c| c != node)
                    .filter(|&c| doc.element_name(c) == Some(name))
                    .count()
            })
            .unwrap_or(0);
        if position == 0 {
            segments.push(name.to_string());
        } else {
            segments.push(format!("{name}[{}]", position + 1));
        }
    }
    segments.reverse();
    format!("/{}", segments.join("/"))
}

// ============================================================================
// Built-in structural checks
// ============================================================================

/// Schema-independent checks every converted document must pass: DocBook
/// document element, well-formed and unique identity attributes.
#[derive(Debug, Default, Clone, Copy)]
pub struct StructuralValidator;

impl Validator for StructuralValidator {
    fn validate(&self, doc: &Document) -> Vec<Violation> {
        let mut violations = Vec::new();

        let Some(root) = doc.document_element() else {
            violations.push(Violation::new("document has no root element"));
            return violations;
        };
        if doc.namespace_uri(root) != Some(DOCBOOK_NS) {
            violations.push(
                Violation::new(format!("document element is not in the {DOCBOOK_NS} namespace"))
                    .at(element_path(doc, root)),
            );
        }

        let mut seen: HashMap<&str, NodeId> = HashMap::new();
        for id in doc.elements() {
            let Some(value) = doc.xml_id(id) else {
                continue;
            };
            if value.is_empty() || needs_rewrite(value) {
                violations.push(
                    Violation::new(format!("xml:id '{value}' is not a valid NCName"))
                        .at(element_path(doc, id)),
                );
            }
            if let Some(&first) = seen.get(value) {
                violations.push(
                    Violation::new(format!(
                        "xml:id '{value}' is already used by {}",
                        element_path(doc, first)
                    ))
                    .at(element_path(doc, id)),
                );
            } else {
                seen.insert(value, id);
            }
        }

        violations
    }
}

/// Ignores the schema resources and returns [`StructuralValidator`].
#[derive(Debug, Default, Clone, Copy)]
pub struct StructuralValidatorFactory;

impl ValidatorFactory for StructuralValidatorFactory {
    fn build(&self, spec: &ValidatorSpec) -> Box<dyn Validator> {
        tracing::debug!(resources = spec.paths().len(), "using structural validator");
        Box::new(StructuralValidator)
    }
}

// ============================================================================
// External tools
// ============================================================================

/// Validates with `xmllint` (RELAX NG `.rng`) and `xsltproc` (compiled
/// schematron `.xsl`, SVRL output), after the structural checks.
#[derive(Debug, Clone)]
pub struct CommandLineValidator {
    resources: Vec<PathBuf>,
    xmllint: PathBuf,
    xsltproc: PathBuf,
}

impl CommandLineValidator {
    fn check_resource(&self, path: &Path, input: &str) -> Vec<Violation> {
        let is_schematron = path.extension().is_some_and(|ext| ext == "xsl");
        let result = if is_schematron {
            run_tool(&self.xsltproc, &[path.as_os_str(), OsStr::new("-")], input)
        } else {
            run_tool(
                &self.xmllint,
                &[OsStr::new("--noout"), OsStr::new("--relaxng"), path.as_os_str(), OsStr::new("-")],
                input,
            )
        };

        let label = path.display().to_string();
        match result {
            Err(message) => vec![Violation::new(message).at(label)],
            Ok((_, stdout, _)) if is_schematron => svrl_violations(&stdout),
            Ok((true, _, _)) => Vec::new(),
            Ok((false, _, stderr)) => {
                let mut violations: Vec<Violation> = stderr
                    .lines()
                    .filter(|line| !line.trim().is_empty() && !line.ends_with("fails to validate"))
                    .map(|line| Violation::new(line.trim()).at(label.clone()))
                    .collect();
                if violations.is_empty() {
                    violations.push(Violation::new("document fails to validate").at(label));
                }
                violations
            }
        }
    }
}

impl Validator for CommandLineValidator {
    fn validate(&self, doc: &Document) -> Vec<Violation> {
        let mut violations = StructuralValidator.validate(doc);
        let input = serialize_document(doc);
        for path in &self.resources {
            violations.extend(self.check_resource(path, &input));
        }
        violations
    }
}

/// Builds [`CommandLineValidator`]s, resolving relative resource paths
/// against a resource directory.
#[derive(Debug, Clone)]
pub struct CommandLineValidatorFactory {
    resource_dir: PathBuf,
    xmllint: PathBuf,
    xsltproc: PathBuf,
}

impl CommandLineValidatorFactory {
    pub fn new(resource_dir: impl Into<PathBuf>) -> Self {
        Self {
            resource_dir: resource_dir.into(),
            xmllint: PathBuf::from("xmllint"),
            xsltproc: PathBuf::from("xsltproc"),
        }
    }

    pub fn with_xsltproc(mut self, program: impl Into<PathBuf>) -> Self {
        self.xsltproc = program.into();
        self
    }

    pub fn with_xmllint(mut self, program: impl Into<PathBuf>) -> Self {
        self.xmllint = program.into();
        self
    }
}

impl ValidatorFactory for CommandLineValidatorFactory {
    fn build(&self, spec: &ValidatorSpec) -> Box<dyn Validator> {
        let resources = spec
            .paths()
            .iter()
            .map(|p| if p.is_absolute() { p.clone() } else { self.resource_dir.join(p) })
            .collect();
        Box::new(CommandLineValidator {
            resources,
            xmllint: self.xmllint.clone(),
            xsltproc: self.xsltproc.clone(),
        })
    }
}

/// Run a tool with `input` on stdin; returns (success, stdout, stderr).
///
/// A tool that exits without reading all of its input has not checked the
/// document, which is an error.
fn run_tool(
    program: &Path,
    args: &[&OsStr],
    input: &str,
) -> Result<(bool, String, String), String> {
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| format!("{} failed to run: {e}", program.display()))?;

    let input = input.to_string();
    let writer = child
        .stdin
        .take()
        .map(|mut stdin| std::thread::spawn(move || stdin.write_all(input.as_bytes())));

    let output = child
        .wait_with_output()
        .map_err(|e| format!("{} failed: {e}", program.display()))?;
    let written = match writer.map(|handle| handle.join()) {
        Some(Ok(result)) => result,
        Some(Err(_)) => return Err(format!("{}: stdin writer panicked", program.display())),
        None => Ok(()),
    };
    if let Err(e) = written {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let mut message = format!("{} did not read the document: {e}", program.display());
        if !stderr.trim().is_empty() {
            message.push_str(&format!(" ({})", stderr.trim()));
        }
        return Err(message);
    }

    Ok((
        output.status.success(),
        String::from_utf8_lossy(&output.stdout).into_owned(),
        String::from_utf8_lossy(&output.stderr).into_owned(),
    ))
}

/// Failed asserts and successful reports from a schematron SVRL report.
pub fn svrl_violations(report: &str) -> Vec<Violation> {
    let doc = match parse_document(report) {
        Ok(doc) => doc,
        Err(e) => return vec![Violation::new(format!("unreadable schematron report: {e}"))],
    };
    doc.elements()
        .filter(|&id| matches!(doc.local_name(id), Some("failed-assert" | "successful-report")))
        .map(|id| {
            let message = doc
                .children(id)
                .find(|&c| doc.local_name(c) == Some("text"))
                .map(|text| doc.text_content(text).trim().to_string())
                .unwrap_or_default();
            let violation = Violation::new(message);
            match doc.attr(id, "location") {
                Some(location) => violation.at(location),
                None => violation,
            }
        })
        .collect()
}
