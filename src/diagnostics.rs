//! Diagnostics emitted while converting a document.
//!
//! Every stage reports anomalies through a [`Reporter`], which forwards each
//! [`Diagnostic`] to the configured [`DiagnosticSink`] and also keeps it so
//! the caller gets the full list back with the conversion result.

use std::fmt;
use std::sync::Mutex;

/// How serious a diagnostic is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "cli", derive(serde::Serialize), serde(rename_all = "lowercase"))]
pub enum Severity {
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Warning => f.write_str("warning"),
            Severity::Error => f.write_str("error"),
        }
    }
}

/// Pipeline state a diagnostic was raised in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "cli", derive(serde::Serialize), serde(rename_all = "kebab-case"))]
pub enum Stage {
    Sanitizing,
    Converting,
    ReconcilingIds,
    Reparsing,
    TaggingEmbeds,
    Validating,
    Done,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Sanitizing => "sanitizing",
            Stage::Converting => "converting",
            Stage::ReconcilingIds => "reconciling-ids",
            Stage::Reparsing => "reparsing",
            Stage::TaggingEmbeds => "tagging-embeds",
            Stage::Validating => "validating",
            Stage::Done => "done",
        };
        f.write_str(name)
    }
}

/// Structured payload attached to error diagnostics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "cli", derive(serde::Serialize))]
pub struct DiagnosticContext {
    /// Serialized converted document, when one exists.
    #[cfg_attr(feature = "cli", serde(skip_serializing_if = "Option::is_none"))]
    pub result: Option<String>,
    /// Underlying error messages or validation violations.
    pub errors: Vec<String>,
    /// Serialized original input.
    #[cfg_attr(feature = "cli", serde(skip_serializing_if = "Option::is_none"))]
    pub xml_string: Option<String>,
}

impl DiagnosticContext {
    pub fn errors(errors: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            errors: errors.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn with_result(mut self, result: impl Into<String>) -> Self {
        self.result = Some(result.into());
        self
    }

    pub fn with_input(mut self, xml: impl Into<String>) -> Self {
        self.xml_string = Some(xml.into());
        self
    }
}

/// One reported anomaly.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "cli", derive(serde::Serialize))]
pub struct Diagnostic {
    pub severity: Severity,
    pub stage: Stage,
    pub content_field_id: Option<i64>,
    pub message: String,
    #[cfg_attr(feature = "cli", serde(skip_serializing_if = "Option::is_none"))]
    pub context: Option<DiagnosticContext>,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]: {}", self.severity, self.stage, self.message)
    }
}

/// Render a content field id for messages; absent ids read `[unknown]`.
pub fn field_label(content_field_id: Option<i64>) -> String {
    match content_field_id {
        Some(id) => id.to_string(),
        None => "[unknown]".to_string(),
    }
}

/// Destination for diagnostics, typically a logger.
pub trait DiagnosticSink: Send + Sync {
    fn warning(&self, message: &str);
    fn error(&self, message: &str, context: &DiagnosticContext);
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl DiagnosticSink for NullSink {
    fn warning(&self, _message: &str) {}
    fn error(&self, _message: &str, _context: &DiagnosticContext) {}
}

/// Forwards diagnostics to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn warning(&self, message: &str) {
        tracing::warn!("{message}");
    }

    fn error(&self, message: &str, context: &DiagnosticContext) {
        tracing::error!(errors = ?context.errors, "{message}");
        tracing::debug!(
            result = context.result.as_deref(),
            xml_string = context.xml_string.as_deref(),
            "{message}"
        );
    }
}

/// Keeps every diagnostic in memory.
#[derive(Debug, Default)]
pub struct CollectingSink {
    entries: Mutex<Vec<(Severity, String)>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything received so far.
    pub fn entries(&self) -> Vec<(Severity, String)> {
        self.entries
            .lock()
            .map(|entries| entries.clone())
            .unwrap_or_default()
    }

    fn push(&self, severity: Severity, message: &str) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.push((severity, message.to_string()));
        }
    }
}

impl DiagnosticSink for CollectingSink {
    fn warning(&self, message: &str) {
        self.push(Severity::Warning, message);
    }

    fn error(&self, message: &str, _context: &DiagnosticContext) {
        self.push(Severity::Error, message);
    }
}

/// Per-conversion diagnostic collector.
pub struct Reporter<'a> {
    sink: &'a dyn DiagnosticSink,
    content_field_id: Option<i64>,
    stage: Stage,
    diagnostics: Vec<Diagnostic>,
}

impl<'a> Reporter<'a> {
    pub fn new(sink: &'a dyn DiagnosticSink, content_field_id: Option<i64>) -> Self {
        Self {
            sink,
            content_field_id,
            stage: Stage::Sanitizing,
            diagnostics: Vec::new(),
        }
    }

    /// The field id as rendered in messages.
    pub fn field_label(&self) -> String {
        field_label(self.content_field_id)
    }

    pub fn enter(&mut self, stage: Stage) {
        tracing::debug!(%stage, field = %self.field_label(), "entering stage");
        self.stage = stage;
    }

    pub fn warning(&mut self, message: impl Into<String>) {
        let message = message.into();
        self.sink.warning(&message);
        self.diagnostics.push(Diagnostic {
            severity: Severity::Warning,
            stage: self.stage,
            content_field_id: self.content_field_id,
            message,
            context: None,
        });
    }

    pub fn error(&mut self, message: impl Into<String>, context: DiagnosticContext) {
        let message = message.into();
        self.sink.error(&message, &context);
        self.diagnostics.push(Diagnostic {
            severity: Severity::Error,
            stage: self.stage,
            content_field_id: self.content_field_id,
            message,
            context: Some(context),
        });
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn into_diagnostics(self) -> Vec<Diagnostic> {
        self.diagnostics
    }
}
