//! Edit projection: turns per-line indentation decisions and shadow-side
//! formatter edits into a minimal edit set against the original document.

use crate::adapter::RawEdit;
use crate::document::{LineIndex, SourceSpan};
use crate::mapping::SpanMapper;
use crate::reconcile::LineEdit;
use crate::shadow::ShadowDocument;

/// Replacement of one original-document span.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextEdit {
    pub span: SourceSpan,
    pub new_text: String,
}

/// One edit per line whose leading whitespace differs from the decision.
pub fn indentation_edits(text: &str, line_edits: &[LineEdit]) -> Vec<TextEdit> {
    let index = LineIndex::new(text);
    let mut edits = Vec::new();
    for decision in line_edits {
        let span = index.line_span(decision.line);
        let content = &text[span.offset..span.end()];
        let existing_len = content.len() - content.trim_start().len();
        if content[..existing_len] == decision.indentation {
            continue;
        }
        edits.push(TextEdit {
            span: SourceSpan::new(span.offset, existing_len),
            new_text: decision.indentation.clone(),
        });
    }
    edits
}

/// Projects raw shadow-document edits back onto the original document.
///
/// Only edits that land entirely inside a line's formatted run are
/// accepted; the trailing marker region and lines the generator flagged
/// as untrustworthy are excluded. A brace relocation onto the line after
/// a stub line is an artifact of the stub, not a content edit.
pub fn project_raw_edits(
    shadow: &ShadowDocument,
    mapper: &SpanMapper,
    raw_edits: &[RawEdit],
) -> Vec<TextEdit> {
    let mut edits = Vec::new();
    for edit in raw_edits {
        let Some(line) = shadow.line_at_generated(edit.span.offset) else {
            continue;
        };
        let descriptor = &shadow.lines[line];
        if !descriptor.process_formatting {
            continue;
        }
        let formatted = descriptor.formatted_span();
        if edit.span.offset < formatted.offset || edit.span.end() > formatted.end() {
            continue;
        }
        if !descriptor.check_for_new_lines && edit.new_text.contains('\n') {
            continue;
        }
        if line > 0
            && shadow.lines[line - 1].skip_next_line_if_brace
            && edit.span.offset == formatted.offset
            && edit.new_text.trim_start().starts_with('{')
        {
            continue;
        }
        // The boundary after a truncated line is synthetic; edits landing
        // exactly on it have no trustworthy original position.
        if descriptor.skip_previous_line && edit.span.offset == formatted.offset {
            continue;
        }
        // The run maps linearly back onto the original line.
        let original = descriptor.origin_offset + (edit.span.offset - formatted.offset);
        if mapper.to_generated(original).is_none() && !mapper.is_empty() {
            // Outside every mapped region; the edit has no original home.
            continue;
        }
        edits.push(TextEdit {
            span: SourceSpan::new(original, edit.span.length),
            new_text: edit.new_text.clone(),
        });
    }
    edits
}

/// Sorts edits and drops any that overlap an earlier one, keeping the
/// first (indentation edits are pushed first and win ties).
pub fn normalize(mut edits: Vec<TextEdit>) -> Vec<TextEdit> {
    edits.sort_by_key(|e| (e.span.offset, e.span.end()));
    let mut out: Vec<TextEdit> = Vec::with_capacity(edits.len());
    for edit in edits {
        if let Some(last) = out.last() {
            if edit.span.offset < last.span.end()
                || (edit.span.offset == last.span.offset && last.span.length == 0)
            {
                continue;
            }
        }
        out.push(edit);
    }
    out
}

/// Applies a normalized (sorted, non-overlapping) edit set.
pub fn apply_edits(text: &str, edits: &[TextEdit]) -> String {
    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;
    for edit in edits {
        out.push_str(&text[cursor..edit.span.offset]);
        out.push_str(&edit.new_text);
        cursor = edit.span.end();
    }
    out.push_str(&text[cursor..]);
    out
}
