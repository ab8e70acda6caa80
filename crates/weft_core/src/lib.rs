//! Formatting engine for composite template documents.
//!
//! A composite document interleaves a markup host language with an
//! embedded general-purpose language. The engine generates a line-aligned
//! shadow document in the embedded language, asks that language's own
//! formatter for indentation decisions on it, and reconciles the answers
//! with the markup structure into a minimal edit set on the original
//! document. Parsing and the embedded formatter itself are collaborators
//! behind the traits in [`adapter`].

pub mod adapter;
pub mod document;
pub mod locator;
pub mod mapping;
pub mod pipeline;
pub mod project;
pub mod reconcile;
pub mod shadow;
pub mod validate;

pub use adapter::{
    BraceIndenter, CancelToken, CompositeParser, EmbeddedFormatter, FormatterError, ParseError,
    RawEdit,
};
pub use document::{CompositeTree, LineIndex, Node, NodeKind, SourceSpan};
pub use locator::{format_locator, parse_locator};
pub use mapping::{SourceMapping, SpanMapper};
pub use pipeline::{
    format_document, BraceStyle, FormatError, FormatOptions, FormatPass, FormatRequest,
};
pub use project::{apply_edits, TextEdit};
pub use reconcile::LineEdit;
pub use shadow::{generate, LineDescriptor, ShadowDocument};
pub use validate::{Diagnostic, DiagnosticsProvider, Severity};
