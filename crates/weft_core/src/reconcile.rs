//! Indentation reconciliation.
//!
//! Collects the generated-document positions whose indentation the
//! embedded formatter must report, then merges its answers with the
//! markup structure to decide a final indentation per original line.

use std::collections::{BTreeMap, BTreeSet};

use crate::document::{CompositeTree, LineIndex, NodeKind, SourceSpan};
use crate::mapping::SpanMapper;
use crate::pipeline::{FormatOptions, FormatPass};
use crate::shadow::ShadowDocument;

/// Indentation floor used when no scope governs a position.
pub const MIN_INDENTATION: usize = 0;

/// Final indentation decision for one original line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineEdit {
    pub line: usize,
    pub indentation: String,
}

/// Everything the reconciler reads; all borrowed snapshots, nothing shared.
pub struct ReconcileContext<'a> {
    pub text: &'a str,
    pub tree: &'a CompositeTree,
    pub mapper: &'a SpanMapper,
    pub shadow: &'a ShadowDocument,
    pub options: &'a FormatOptions,
    pub pass: FormatPass,
}

/// Generated offsets the embedded formatter must answer for: both
/// boundaries of every formattable mapping, plus the generated position
/// of every formattable line start.
pub fn significant_locations(
    text: &str,
    tree: &CompositeTree,
    mapper: &SpanMapper,
) -> BTreeSet<usize> {
    let index = LineIndex::new(text);
    let mut locations = BTreeSet::new();
    for mapping in mapper.mappings() {
        if should_format(tree, mapping.original.offset, false) {
            locations.insert(mapping.generated.offset);
            locations.insert(mapping.generated.end());
        }
    }
    for line in 0..index.line_count() {
        let Some(first) = index.first_non_ws(text, line) else {
            continue;
        };
        if !should_format(tree, first, true) {
            continue;
        }
        if let Some(generated) = mapper.to_generated(first) {
            locations.insert(generated);
        }
    }
    locations
}

/// Decision table for whether a position participates in formatting,
/// keyed on the innermost enclosing node kind.
pub fn should_format(tree: &CompositeTree, offset: usize, allow_implicit: bool) -> bool {
    for node in tree.path_at(offset).iter().rev() {
        match node.kind {
            NodeKind::MarkupComment | NodeKind::TemplateComment => return false,
            NodeKind::MarkupAttribute | NodeKind::BoundAttribute => return false,
            NodeKind::LineDirective => return false,
            NodeKind::ImplicitExpression => return allow_implicit,
            // Literal interiors are content; only the opening position
            // participates.
            NodeKind::TemplateLiteral => return offset == node.span.offset,
            NodeKind::EmbeddedCode
            | NodeKind::StatementBlock
            | NodeKind::BlockDirective
            | NodeKind::SectionDirective
            | NodeKind::ExplicitExpression => return true,
            NodeKind::MarkupElement | NodeKind::MarkupText | NodeKind::MarkupTransition => {
                return false;
            }
        }
    }
    false
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScopeValue {
    Resolved(usize),
    /// Defers to the indentation in effect immediately before `before`.
    Pending { before: usize },
}

/// Scopes under construction, keyed by original-document offset. Built
/// completely, then resolved in a second pass; consumers only ever see
/// the resolved, immutable form.
#[derive(Debug, Default)]
pub struct ScopeMap {
    entries: BTreeMap<usize, ScopeValue>,
}

impl ScopeMap {
    fn insert_resolved(&mut self, offset: usize, columns: usize) {
        self.entries.insert(offset, ScopeValue::Resolved(columns));
    }

    fn insert_resolved_if_vacant(&mut self, offset: usize, columns: usize) {
        self.entries
            .entry(offset)
            .or_insert(ScopeValue::Resolved(columns));
    }

    fn insert_pending(&mut self, offset: usize, before: usize) {
        self.entries
            .entry(offset)
            .or_insert(ScopeValue::Pending { before });
    }

    /// Resolves every pending entry against the already-known entries,
    /// each exactly once. A pending entry with no left neighbor resolves
    /// to `baseline`.
    pub fn resolve(self, baseline: usize) -> ResolvedScopes {
        let known: Vec<(usize, usize)> = self
            .entries
            .iter()
            .filter_map(|(offset, value)| match value {
                ScopeValue::Resolved(columns) => Some((*offset, *columns)),
                ScopeValue::Pending { .. } => None,
            })
            .collect();
        let mut entries = BTreeMap::new();
        for (offset, value) in self.entries {
            let columns = match value {
                ScopeValue::Resolved(columns) => columns,
                ScopeValue::Pending { before } => {
                    let idx = known.partition_point(|&(key, _)| key < before);
                    match idx.checked_sub(1) {
                        Some(i) => known[i].1,
                        None => baseline,
                    }
                }
            };
            entries.insert(offset, columns);
        }
        ResolvedScopes { entries }
    }
}

/// Fully-resolved scopes: for any offset, the governing indentation is
/// the entry with the greatest key at or before it.
#[derive(Debug, Clone, Default)]
pub struct ResolvedScopes {
    entries: BTreeMap<usize, usize>,
}

impl ResolvedScopes {
    pub fn lookup(&self, offset: usize) -> Option<usize> {
        self.entries
            .range(..=offset)
            .next_back()
            .map(|(_, &columns)| columns)
    }
}

/// Builds scope entries from every mapping boundary that received a
/// formatter answer. A section-like block whose first mapping answered
/// also contributes a pending scope at the block's end, deferring to the
/// indentation in effect before the block started.
pub fn build_scopes(
    tree: &CompositeTree,
    mapper: &SpanMapper,
    results: &BTreeMap<usize, usize>,
) -> ScopeMap {
    let mut scopes = ScopeMap::default();
    for mapping in mapper.mappings() {
        if let Some(&columns) = results.get(&mapping.generated.end()) {
            scopes.insert_resolved_if_vacant(mapping.original.end(), columns);
        }
        if let Some(&columns) = results.get(&mapping.generated.offset) {
            scopes.insert_resolved(mapping.original.offset, columns);
            let section = tree
                .path_at(mapping.original.offset)
                .iter()
                .rev()
                .find(|n| n.kind == NodeKind::SectionDirective)
                .map(|n| n.span);
            if let Some(section) = section {
                if first_mapping_in(mapper, section) == Some(mapping.original.offset) {
                    scopes.insert_pending(section.end(), section.offset);
                }
            }
        }
    }
    scopes
}

fn first_mapping_in(mapper: &SpanMapper, span: SourceSpan) -> Option<usize> {
    mapper
        .mappings()
        .iter()
        .find(|m| m.original.offset >= span.offset && m.original.end() <= span.end())
        .map(|m| m.original.offset)
}

/// Computes one indentation decision per line in `range` (end-exclusive).
pub fn reconcile(
    ctx: &ReconcileContext,
    results: &BTreeMap<usize, usize>,
    range: (usize, usize),
) -> Vec<LineEdit> {
    let index = LineIndex::new(ctx.text);
    let scopes = build_scopes(ctx.tree, ctx.mapper, results).resolve(MIN_INDENTATION);
    let (lo, hi) = range;
    let mut edits = Vec::new();

    for line in lo..hi.min(index.line_count()) {
        let Some(descriptor) = ctx.shadow.lines.get(line) else {
            break;
        };
        if !descriptor.process_indentation {
            continue;
        }
        let Some(first) = index.first_non_ws(ctx.text, line) else {
            continue;
        };

        let begins_in_code = ctx
            .tree
            .owner_at(first)
            .is_some_and(|n| n.kind.is_embedded_code());
        if !begins_in_code {
            // Markup-owned lines: a full pass trusts the markup
            // formatter's output; an on-type pass recomputes from the
            // structural level because the markup formatter does not run.
            if matches!(ctx.pass, FormatPass::FullDocument) {
                continue;
            }
            let columns = descriptor.markup_indent_level * ctx.options.indent_size;
            edits.push(line_edit(line, columns, descriptor, ctx.options));
            continue;
        }

        // A direct answer for the line start wins over scope fallback.
        let direct = ctx
            .mapper
            .to_generated(first)
            .and_then(|generated| results.get(&generated).copied());
        let embedded = direct
            .or_else(|| scopes.lookup(first))
            .unwrap_or(MIN_INDENTATION);
        let baseline = block_baseline(ctx, results, &scopes, first);
        if embedded < baseline {
            // The embedded formatter declined to indent this construct;
            // leave the line untouched rather than inventing indentation.
            continue;
        }
        let columns =
            descriptor.markup_indent_level * ctx.options.indent_size + (embedded - baseline);
        edits.push(line_edit(line, columns, descriptor, ctx.options));
    }
    edits
}

/// Indentation the embedded formatter reported at the enclosing block's
/// first mapping; everything above it is the block's own contribution.
fn block_baseline(
    ctx: &ReconcileContext,
    results: &BTreeMap<usize, usize>,
    scopes: &ResolvedScopes,
    offset: usize,
) -> usize {
    let Some(block) = ctx
        .tree
        .path_at(offset)
        .iter()
        .rev()
        .find(|n| n.kind.is_block())
        .map(|n| n.span)
    else {
        return MIN_INDENTATION;
    };
    let Some(start) = first_mapping_in(ctx.mapper, block) else {
        return MIN_INDENTATION;
    };
    ctx.mapper
        .to_generated(start)
        .and_then(|generated| results.get(&generated).copied())
        .or_else(|| scopes.lookup(start))
        .unwrap_or(MIN_INDENTATION)
}

fn line_edit(
    line: usize,
    columns: usize,
    descriptor: &crate::shadow::LineDescriptor,
    options: &FormatOptions,
) -> LineEdit {
    let mut indentation = indent_string(columns, options);
    if let Some(extra) = &descriptor.additional_indentation {
        indentation.push_str(extra);
    }
    LineEdit { line, indentation }
}

/// Renders `columns` of indentation with the configured style.
pub fn indent_string(columns: usize, options: &FormatOptions) -> String {
    if options.use_tabs {
        let tabs = columns / options.indent_size;
        let spaces = columns % options.indent_size;
        let mut out = "\t".repeat(tabs);
        out.push_str(&" ".repeat(spaces));
        out
    } else {
        " ".repeat(columns)
    }
}
