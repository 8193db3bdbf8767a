//! # xmltext
//!
//! Converts legacy eZ Publish rich text (`ezxmltext`) into DocBook-based
//! rich text.
//!
//! ## Pipeline
//!
//! 1. Comments are stripped and embeds without a target are reported.
//! 2. The document runs through the pre-normalization passes and the
//!    stylesheets, imported in priority order into one transform.
//! 3. Ids are optionally checked and rewritten.
//! 4. The result is serialized and parsed again.
//! 5. Embeds of image content are tagged with `ez-embed-type-image`.
//! 6. The document is validated; violations are reported but never block
//!    the output.
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use xmltext::{ConvertOptions, InMemoryRepository, RichTextConverter, TracingSink, XsltprocEngine};
//!
//! let converter = RichTextConverter::new(Arc::new(XsltprocEngine::new("/usr/share/xmltext")))
//!     .with_sink(Arc::new(TracingSink))
//!     .with_repository(Arc::new(InMemoryRepository::new().with_content(57, 5)))
//!     .with_image_content_types([5]);
//!
//! let options = ConvertOptions::new().check_id_values(true).content_field_id(42);
//! let conversion = converter.convert_str("<section><paragraph>Hi</paragraph></section>", options)?;
//! if let Some(docbook) = conversion.output {
//!     println!("{docbook}");
//! }
//! # Ok::<(), xmltext::Error>(())
//! ```

#[cfg(feature = "cli")]
pub mod config;
pub mod convert;
pub mod diagnostics;
pub mod dom;
pub mod embed;
pub mod error;
pub mod ids;
pub mod pipeline;
pub mod reparse;
pub mod repository;
pub mod sanitize;
pub mod util;
pub mod validate;

#[cfg(feature = "cli")]
pub use config::ConverterConfig;
pub use convert::{StylesheetEngine, StylesheetSpec, XsltprocEngine};
pub use diagnostics::{
    CollectingSink, Diagnostic, DiagnosticSink, NullSink, Severity, Stage, TracingSink,
};
pub use dom::{Document, parse_document, serialize_document};
pub use error::{ConvertError, Error, ParseError, Result, TransformError};
pub use pipeline::{Conversion, ConvertOptions, RichTextConverter};
pub use repository::{ContentInfo, ContentRepository, InMemoryRepository, Location, Lookup};
pub use validate::{Validator, ValidatorFactory, ValidatorSpec, Violation};
