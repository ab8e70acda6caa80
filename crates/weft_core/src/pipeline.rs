//! Pipeline orchestration: shadow generation, the embedded-formatter
//! round trip, reconciliation, projection, and the safety gates.

use std::time::Instant;

use crate::adapter::{CancelToken, EmbeddedFormatter, FormatterError};
use crate::document::CompositeTree;
use crate::mapping::{SourceMapping, SpanMapper};
use crate::project::{self, TextEdit};
use crate::reconcile::{self, ReconcileContext};
use crate::shadow;
use crate::validate::{self, DiagnosticsProvider};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BraceStyle {
    /// K&R: opening brace stays on the construct's line (default).
    Kr,
    /// Allman: opening brace on its own line.
    Allman,
}

/// Formatting options, consumed verbatim; the engine never reinterprets
/// them on the embedded formatter's behalf.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatOptions {
    pub indent_size: usize,
    pub use_tabs: bool,
    pub brace_style: BraceStyle,
}

impl Default for FormatOptions {
    fn default() -> Self {
        Self {
            indent_size: 4,
            use_tabs: false,
            brace_style: BraceStyle::Kr,
        }
    }
}

/// Which pass is running. A full pass runs after the markup formatter and
/// trusts its output for markup lines; an on-type pass runs alone and
/// recomputes markup indentation structurally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatPass {
    FullDocument,
    OnType,
}

/// One formatting attempt over an immutable snapshot.
pub struct FormatRequest<'a> {
    pub text: &'a str,
    pub tree: &'a CompositeTree,
    pub mappings: &'a [SourceMapping],
    pub options: FormatOptions,
    pub pass: FormatPass,
    /// Line range to adjust (end-exclusive); `None` formats every line.
    pub line_range: Option<(usize, usize)>,
}

#[derive(Debug, thiserror::Error)]
pub enum FormatError {
    #[error("structural error on line {line}: {reason}")]
    Structural { line: usize, reason: String },
    #[error("formatting canceled")]
    Canceled,
    #[error(transparent)]
    Formatter(#[from] FormatterError),
}

fn trace_timing() -> bool {
    std::env::var("WEFT_TRACE_TIMING").is_ok_and(|v| v == "1")
}

macro_rules! timing_step {
    ($trace:expr, $label:expr, $block:expr) => {{
        let _t0 = if $trace { Some(Instant::now()) } else { None };
        let result = $block;
        if let Some(t0) = _t0 {
            eprintln!(
                "[WEFT_TIMING] {:32} {:>8.1}ms",
                $label,
                t0.elapsed().as_secs_f64() * 1000.0
            );
        }
        result
    }};
}

/// Runs one full formatting attempt and returns the edit set, or an empty
/// set when a safety gate rejects the result. Edits are materialized only
/// here at the very end; no abort path surfaces partial edits.
pub fn format_document(
    request: &FormatRequest,
    formatter: &dyn EmbeddedFormatter,
    diagnostics: Option<&dyn DiagnosticsProvider>,
    cancel: &CancelToken,
) -> Result<Vec<TextEdit>, FormatError> {
    let trace = trace_timing();
    if cancel.is_canceled() {
        return Err(FormatError::Canceled);
    }

    let shadow = timing_step!(trace, "shadow generation", {
        shadow::generate(request.text, request.tree)?
    });
    let mapper = SpanMapper::new(request.mappings.to_vec());
    let locations = timing_step!(trace, "significant locations", {
        reconcile::significant_locations(request.text, request.tree, &mapper)
    });

    if cancel.is_canceled() {
        return Err(FormatError::Canceled);
    }
    let results = timing_step!(trace, "embedded formatter", {
        formatter.indentation_levels(&shadow.text, &locations)?
    });
    let formatted_spans: Vec<_> = mapper.mappings().iter().map(|m| m.generated).collect();
    let raw_edits = formatter.text_edits(&shadow.text, &formatted_spans)?;
    if cancel.is_canceled() {
        return Err(FormatError::Canceled);
    }

    let ctx = ReconcileContext {
        text: request.text,
        tree: request.tree,
        mapper: &mapper,
        shadow: &shadow,
        options: &request.options,
        pass: request.pass,
    };
    let range = request
        .line_range
        .unwrap_or((0, shadow.line_count()));
    let line_edits = timing_step!(trace, "reconcile", {
        reconcile::reconcile(&ctx, &results, range)
    });

    let mut edits = project::indentation_edits(request.text, &line_edits);
    edits.extend(project::project_raw_edits(&shadow, &mapper, &raw_edits));
    let edits = project::normalize(edits);

    let formatted = project::apply_edits(request.text, &edits);
    if !validate::content_preserved(request.text, &formatted) {
        return Ok(Vec::new());
    }
    if let Some(provider) = diagnostics {
        if !validate::diagnostics_preserved(provider, request.text, &formatted) {
            return Ok(Vec::new());
        }
    }
    Ok(edits)
}
