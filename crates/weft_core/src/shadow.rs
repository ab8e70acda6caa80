//! Shadow document generation.
//!
//! Walks the composite tree once per source line and emits exactly one
//! embedded-language-shaped line per original line, so the embedded
//! formatter can be asked for indentation decisions at positions that map
//! straight back onto the original document. Content that cannot be
//! represented in place is deferred to a trailing out-of-band block.

use crate::document::{CompositeTree, LineIndex, Node, NodeKind, SourceSpan};
use crate::locator::format_locator;
use crate::pipeline::FormatError;

/// Placeholder emitted for markup-only lines.
const LINE_PLACEHOLDER: &str = "//";

/// Marker appended where a shadow line drops original trailing content.
const TRUNCATION_MARKER: &str = "/**/";

/// Per-line record connecting a shadow line back to its original line.
/// Created once during generation, immutable afterwards.
#[derive(Debug, Clone, Default)]
pub struct LineDescriptor {
    /// Whether this line participates in indentation adjustment at all.
    pub process_indentation: bool,
    /// Whether the shadow line's content may be diffed against
    /// formatter-applied text edits.
    pub process_formatting: bool,
    /// Whether the shadow line retained the original newline structure.
    pub check_for_new_lines: bool,
    pub skip_previous_line: bool,
    /// Set when the shadow line intentionally dropped original trailing
    /// content that continues on the next line.
    pub skip_next_line: bool,
    /// Set on stub lines whose opening brace the embedded formatter may
    /// legally relocate to the following line.
    pub skip_next_line_if_brace: bool,
    /// Markup nesting depth contributed by enclosing elements.
    pub markup_indent_level: usize,
    /// Alignment string appended after the computed indentation.
    pub additional_indentation: Option<String>,
    /// Original offset of the first formatted character on this line.
    pub origin_offset: usize,
    /// Shadow offset of the first formatted character on this line.
    pub formatted_offset: usize,
    /// Length of the formatted run in the shadow line, markers included.
    pub formatted_length: usize,
    /// Width of the trailing marker excluded from edit projection.
    pub formatted_offset_from_end_of_line: usize,
}

impl LineDescriptor {
    /// Shadow span that may be diffed against formatter edits.
    pub fn formatted_span(&self) -> SourceSpan {
        SourceSpan::new(
            self.formatted_offset,
            self.formatted_length - self.formatted_offset_from_end_of_line,
        )
    }
}

/// Generated embedded-language document plus per-line descriptors.
#[derive(Debug, Clone)]
pub struct ShadowDocument {
    pub text: String,
    pub lines: Vec<LineDescriptor>,
    /// Offset where the trailing out-of-band block begins.
    pub trailing_offset: usize,
}

impl ShadowDocument {
    /// The line-aligned region, excluding the trailing block.
    pub fn aligned(&self) -> &str {
        &self.text[..self.trailing_offset]
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    /// Index of the line whose shadow region starts at or before `offset`.
    pub fn line_at_generated(&self, offset: usize) -> Option<usize> {
        if offset >= self.trailing_offset {
            return None;
        }
        let idx = self
            .lines
            .partition_point(|d| d.formatted_offset <= offset);
        idx.checked_sub(1)
    }
}

#[derive(Debug, Clone, Copy)]
struct LineCursor {
    line: usize,
    span: SourceSpan,
    first_offset: usize,
}

/// Builds the shadow document for `text`.
///
/// Invariant: one shadow line per original line. A line that dispatches to
/// no emission rule, or a node missing a grammar-guaranteed child, aborts
/// the whole attempt.
pub fn generate(text: &str, tree: &CompositeTree) -> Result<ShadowDocument, FormatError> {
    let index = LineIndex::new(text);
    let mut out = String::with_capacity(text.len() + 64);
    let mut lines = Vec::with_capacity(index.line_count());

    for line in 0..index.line_count() {
        if line > 0 {
            out.push('\n');
        }
        let shadow_line_start = out.len();
        let span = index.line_span(line);
        let content = &text[span.offset..span.end()];
        let trimmed = content.trim_start();
        if trimmed.is_empty() {
            lines.push(LineDescriptor {
                formatted_offset: shadow_line_start,
                ..Default::default()
            });
            continue;
        }

        let cursor = LineCursor {
            line,
            span,
            first_offset: span.offset + (content.len() - trimmed.len()),
        };
        let owner = tree
            .owner_at(cursor.first_offset)
            .ok_or_else(|| structural(cursor.line, "no syntax node owns the line's first token"))?;
        let (emitted, mut descriptor) = emit_line(text, tree, &index, cursor, owner)?;
        if emitted.is_empty() {
            return Err(structural(cursor.line, "emission rule produced no output"));
        }
        descriptor.formatted_offset += shadow_line_start;
        // A truncated line makes the boundary to the next line synthetic.
        descriptor.skip_previous_line = lines
            .last()
            .is_some_and(|previous: &LineDescriptor| previous.skip_next_line);
        out.push_str(&emitted);
        lines.push(descriptor);
    }

    debug_assert_eq!(lines.len(), index.line_count());
    let trailing_offset = out.len();
    emit_trailing_block(text, tree, &index, &mut out);

    Ok(ShadowDocument {
        text: out,
        lines,
        trailing_offset,
    })
}

fn structural(line: usize, reason: &str) -> FormatError {
    FormatError::Structural {
        line: line + 1,
        reason: reason.to_string(),
    }
}

fn emit_line(
    text: &str,
    tree: &CompositeTree,
    index: &LineIndex,
    cursor: LineCursor,
    owner: &Node,
) -> Result<(String, LineDescriptor), FormatError> {
    let ws = &text[cursor.span.offset..cursor.first_offset];
    let descriptor = LineDescriptor {
        process_indentation: true,
        markup_indent_level: markup_indent_level(tree, cursor),
        ..Default::default()
    };

    match owner.kind {
        NodeKind::MarkupElement
        | NodeKind::MarkupText
        | NodeKind::MarkupComment
        | NodeKind::MarkupAttribute
        | NodeKind::BoundAttribute
        | NodeKind::TemplateComment
        | NodeKind::LineDirective
        | NodeKind::MarkupTransition => Ok((format!("{ws}{LINE_PLACEHOLDER}"), descriptor)),
        NodeKind::BlockDirective | NodeKind::SectionDirective => {
            emit_block_boundary(text, cursor, owner, ws, descriptor)
        }
        NodeKind::StatementBlock
        | NodeKind::EmbeddedCode
        | NodeKind::ExplicitExpression
        | NodeKind::ImplicitExpression => {
            Ok(emit_code_line(text, tree, index, cursor, owner, ws, descriptor))
        }
        NodeKind::TemplateLiteral => {
            Ok(emit_literal_continuation(text, tree, cursor, owner, ws, descriptor))
        }
    }
}

/// Opening and closing lines of `BlockDirective` / `SectionDirective`.
///
/// A block directive body is formatted under member-access rules, so its
/// opening line becomes a type declaration named by the directive keyword.
/// A section body needs statement context, so its opening line becomes a
/// lambda stub.
fn emit_block_boundary(
    text: &str,
    cursor: LineCursor,
    owner: &Node,
    ws: &str,
    descriptor: LineDescriptor,
) -> Result<(String, LineDescriptor), FormatError> {
    let rest = &text[cursor.first_offset..cursor.span.end()];
    if rest.starts_with('}') {
        return Ok((format!("{ws}}}"), descriptor));
    }
    if owner.span.offset >= cursor.span.offset {
        let brace = if rest.contains('{') { " {" } else { "" };
        return match owner.kind {
            NodeKind::SectionDirective => {
                if owner.name.is_none() {
                    return Err(structural(cursor.line, "section directive without a name"));
                }
                let mut descriptor = descriptor;
                descriptor.skip_next_line_if_brace = true;
                Ok((format!("{ws}() =>{brace}"), descriptor))
            }
            NodeKind::BlockDirective => {
                let name = owner
                    .name
                    .as_ref()
                    .ok_or_else(|| structural(cursor.line, "block directive without a keyword"))?;
                Ok((format!("{ws}class {name}{brace}"), descriptor))
            }
            _ => unreachable!("emit_block_boundary called for non-directive node"),
        };
    }
    if rest.starts_with('{') {
        return Ok((format!("{ws}{{"), descriptor));
    }
    Err(structural(
        cursor.line,
        "no emission rule for line inside block directive",
    ))
}

/// Lines whose first token is embedded code: the line text minus the
/// transition sigil, truncated where the owning node ends mid-line.
fn emit_code_line(
    text: &str,
    tree: &CompositeTree,
    index: &LineIndex,
    cursor: LineCursor,
    owner: &Node,
    ws: &str,
    descriptor: LineDescriptor,
) -> (String, LineDescriptor) {
    let rest = &text[cursor.first_offset..cursor.span.end()];
    let sigil = transition_width(rest);
    let code_start = cursor.first_offset + sigil;
    let owner_end = owner.span.end().max(code_start);
    let truncated = owner_end < cursor.span.end();
    let kept_end = if truncated { owner_end } else { cursor.span.end() };
    let code = &text[code_start..kept_end];

    let mut descriptor = descriptor;
    descriptor.process_formatting = true;
    descriptor.check_for_new_lines = !truncated;
    descriptor.origin_offset = code_start;
    descriptor.formatted_offset = ws.len();
    descriptor.additional_indentation = continuation_alignment(text, tree, index, cursor, ws);
    if truncated {
        descriptor.skip_next_line = true;
        descriptor.formatted_length = code.len() + TRUNCATION_MARKER.len();
        descriptor.formatted_offset_from_end_of_line = TRUNCATION_MARKER.len();
        (format!("{ws}{code}{TRUNCATION_MARKER}"), descriptor)
    } else {
        descriptor.formatted_length = code.len();
        (format!("{ws}{code}"), descriptor)
    }
}

/// Interior or final line of a multi-line literal embedded inside markup.
/// Such literals may be cut mid-line by surrounding markup, so only the
/// content up to the node end (or the enclosing explicit-expression close
/// delimiter, whichever is tighter) is kept, followed by a marker wide
/// enough to keep the truncation from reading as trailing whitespace.
fn emit_literal_continuation(
    text: &str,
    tree: &CompositeTree,
    cursor: LineCursor,
    owner: &Node,
    ws: &str,
    descriptor: LineDescriptor,
) -> (String, LineDescriptor) {
    let mut cut = owner.span.end().min(cursor.span.end());
    if let Some(expr) = tree
        .path_at(cursor.first_offset)
        .iter()
        .rev()
        .find(|n| n.kind == NodeKind::ExplicitExpression)
    {
        // The close delimiter is the expression's final character.
        let close = expr.span.end().saturating_sub(1);
        if close >= cursor.span.offset && close < cursor.span.end() {
            cut = cut.min(close);
        }
    }
    let kept = &text[cursor.first_offset..cut.max(cursor.first_offset)];
    let truncated = cut < cursor.span.end();

    let mut descriptor = descriptor;
    // Literal interiors are content, not layout; never re-indent them.
    descriptor.process_indentation = false;
    descriptor.process_formatting = true;
    descriptor.check_for_new_lines = false;
    descriptor.skip_next_line = truncated;
    descriptor.origin_offset = cursor.first_offset;
    descriptor.formatted_offset = ws.len();
    descriptor.formatted_length = kept.len() + TRUNCATION_MARKER.len();
    descriptor.formatted_offset_from_end_of_line = TRUNCATION_MARKER.len();
    (format!("{ws}{kept}{TRUNCATION_MARKER}"), descriptor)
}

fn transition_width(rest: &str) -> usize {
    if rest.starts_with('@') && !rest.starts_with("@@") {
        1
    } else {
        0
    }
}

/// Continuation lines of a multi-line explicit expression keep their
/// alignment relative to the expression's opening line.
fn continuation_alignment(
    text: &str,
    tree: &CompositeTree,
    index: &LineIndex,
    cursor: LineCursor,
    ws: &str,
) -> Option<String> {
    let expr = tree
        .path_at(cursor.first_offset)
        .iter()
        .rev()
        .find(|n| n.kind == NodeKind::ExplicitExpression)?
        .span;
    if expr.offset >= cursor.span.offset {
        return None;
    }
    let opening = index.line_span(index.line_of(expr.offset));
    let opening_content = &text[opening.offset..opening.end()];
    let opening_ws = opening_content.len() - opening_content.trim_start().len();
    let extra = ws.len().saturating_sub(opening_ws);
    (extra > 0).then(|| " ".repeat(extra))
}

/// Number of markup-side constructs that enclose the whole line: elements
/// and section bodies. Braced code blocks are excluded; their nesting is
/// the embedded formatter's contribution, not the markup's.
fn markup_indent_level(tree: &CompositeTree, cursor: LineCursor) -> usize {
    tree.path_at(cursor.first_offset)
        .iter()
        .filter(|n| {
            matches!(
                n.kind,
                NodeKind::MarkupElement | NodeKind::SectionDirective
            ) && n.span.offset < cursor.span.offset
                && n.span.end() > cursor.span.end()
        })
        .count()
}

/// Out-of-line reconstructions for expression fragments that appear after
/// the first token of a line and are therefore never visited as line
/// owners. Each is prefixed with a locator so the markup-side pass can
/// re-attach resulting edits.
fn emit_trailing_block(text: &str, tree: &CompositeTree, index: &LineIndex, out: &mut String) {
    let mut fragments = Vec::new();
    collect_inline_fragments(text, index, &tree.roots, &mut fragments);
    for (i, span) in fragments.into_iter().enumerate() {
        let fragment = &text[span.offset..span.end()];
        let body = fragment.strip_prefix('@').unwrap_or(fragment);
        out.push('\n');
        out.push_str(&format_locator(span.offset, span.length));
        out.push('\n');
        out.push_str(&format!("var __f{i} = {body};"));
    }
}

fn collect_inline_fragments(
    text: &str,
    index: &LineIndex,
    nodes: &[Node],
    out: &mut Vec<SourceSpan>,
) {
    for node in nodes {
        if matches!(
            node.kind,
            NodeKind::ImplicitExpression | NodeKind::ExplicitExpression
        ) {
            let line = index.line_of(node.span.offset);
            if let Some(first) = index.first_non_ws(text, line) {
                if node.span.offset > first {
                    out.push(node.span);
                }
            }
        }
        collect_inline_fragments(text, index, &node.children, out);
    }
}
