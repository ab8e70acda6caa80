//! External collaborator contracts: the embedded-language formatter, the
//! composite parser, and cooperative cancellation.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::document::{CompositeTree, LineIndex, SourceSpan};
use crate::mapping::SourceMapping;

#[derive(Debug, thiserror::Error)]
pub enum FormatterError {
    #[error("embedded formatter failed: {0}")]
    Failed(String),
}

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("composite parse failed: {0}")]
    Failed(String),
}

/// Raw text edit reported by the embedded formatter, in generated-document
/// offsets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEdit {
    pub span: SourceSpan,
    pub new_text: String,
}

/// The embedded-language formatter, seen through the narrowest interface
/// the engine needs. Implementations may be remote and slow; the engine
/// calls each method at most once per formatting attempt.
pub trait EmbeddedFormatter {
    /// Desired indentation, in columns, for each requested generated
    /// offset. Offsets missing from the result are recovered locally via
    /// scope fallback, never treated as errors.
    fn indentation_levels(
        &self,
        shadow_text: &str,
        offsets: &BTreeSet<usize>,
    ) -> Result<BTreeMap<usize, usize>, FormatterError>;

    /// Raw text edits scoped to the requested generated spans.
    fn text_edits(
        &self,
        _shadow_text: &str,
        _spans: &[SourceSpan],
    ) -> Result<Vec<RawEdit>, FormatterError> {
        Ok(Vec::new())
    }
}

/// The external composite-document parser the editor layer is wired
/// against.
pub trait CompositeParser {
    fn parse(&self, text: &str) -> Result<(CompositeTree, Vec<SourceMapping>), ParseError>;
}

/// Cooperative cancellation flag, checked before and after the embedded
/// formatter call. Cancellation aborts the whole attempt with no edits.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_canceled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

/// Brace-depth indentation adapter: one indent level per unclosed brace
/// at the offset's line, with leading closers dedented. A reference
/// wiring for tests and standalone use, not a general-purpose formatter.
#[derive(Debug, Clone)]
pub struct BraceIndenter {
    pub indent_size: usize,
}

impl BraceIndenter {
    pub fn new(indent_size: usize) -> Self {
        Self { indent_size }
    }
}

impl EmbeddedFormatter for BraceIndenter {
    fn indentation_levels(
        &self,
        shadow_text: &str,
        offsets: &BTreeSet<usize>,
    ) -> Result<BTreeMap<usize, usize>, FormatterError> {
        let index = LineIndex::new(shadow_text);
        let mut depth_at_line = vec![0i32; index.line_count()];
        let mut depth = 0i32;
        for line in 0..index.line_count() {
            depth_at_line[line] = depth;
            let span = index.line_span(line);
            let content = &shadow_text[span.offset..span.end()];
            let code = content.split("//").next().unwrap_or(content);
            for ch in code.chars() {
                match ch {
                    '{' => depth += 1,
                    '}' => depth -= 1,
                    _ => {}
                }
            }
        }

        let mut result = BTreeMap::new();
        for &offset in offsets {
            if offset > shadow_text.len() {
                continue;
            }
            let line = index.line_of(offset);
            let span = index.line_span(line);
            let mut d = depth_at_line[line];
            for ch in shadow_text[span.offset..span.end()].trim_start().chars() {
                if ch == '}' {
                    d -= 1;
                } else {
                    break;
                }
            }
            result.insert(offset, d.max(0) as usize * self.indent_size);
        }
        Ok(result)
    }
}
