mod common;

use std::collections::{BTreeMap, BTreeSet};

use common::parse_fixture;
use weft_core::{
    format_document, BraceIndenter, CancelToken, Diagnostic, DiagnosticsProvider,
    EmbeddedFormatter, FormatError, FormatOptions, FormatPass, FormatRequest, FormatterError,
    RawEdit, Severity, SourceSpan, SpanMapper,
};

fn request<'a>(
    text: &'a str,
    tree: &'a weft_core::CompositeTree,
    mappings: &'a [weft_core::SourceMapping],
    pass: FormatPass,
) -> FormatRequest<'a> {
    FormatRequest {
        text,
        tree,
        mappings,
        options: FormatOptions::default(),
        pass,
        line_range: None,
    }
}

#[test]
fn embedded_block_inside_element_gets_combined_indentation() {
    let text = "<div>\n  @{\n  var x=1;\n  }\n</div>";
    let (tree, mappings) = parse_fixture(text);
    let edits = format_document(
        &request(text, &tree, &mappings, FormatPass::FullDocument),
        &BraceIndenter::new(4),
        None,
        &CancelToken::new(),
    )
    .unwrap();
    let formatted = weft_core::apply_edits(text, &edits);
    assert_eq!(formatted, "<div>\n    @{\n        var x=1;\n    }\n</div>");
}

#[test]
fn block_directive_body_is_indented_as_a_member_scope() {
    let text = "@functions {\n int Count;\n}";
    let (tree, mappings) = parse_fixture(text);
    let edits = format_document(
        &request(text, &tree, &mappings, FormatPass::FullDocument),
        &BraceIndenter::new(4),
        None,
        &CancelToken::new(),
    )
    .unwrap();
    let formatted = weft_core::apply_edits(text, &edits);
    assert_eq!(formatted, "@functions {\n    int Count;\n}");
}

#[test]
fn full_document_pass_leaves_markup_lines_alone() {
    let text = "<div>\n<p>hi</p>\n</div>";
    let (tree, mappings) = parse_fixture(text);
    let edits = format_document(
        &request(text, &tree, &mappings, FormatPass::FullDocument),
        &BraceIndenter::new(4),
        None,
        &CancelToken::new(),
    )
    .unwrap();
    assert!(edits.is_empty());
}

#[test]
fn on_type_pass_recomputes_markup_indentation_structurally() {
    let text = "<div>\n<p>hi</p>\n</div>";
    let (tree, mappings) = parse_fixture(text);
    let edits = format_document(
        &request(text, &tree, &mappings, FormatPass::OnType),
        &BraceIndenter::new(4),
        None,
        &CancelToken::new(),
    )
    .unwrap();
    let formatted = weft_core::apply_edits(text, &edits);
    assert_eq!(formatted, "<div>\n    <p>hi</p>\n</div>");
}

#[test]
fn line_range_restricts_the_adjusted_lines() {
    let text = "<div>\n<p>a</p>\n<p>b</p>\n</div>";
    let (tree, mappings) = parse_fixture(text);
    let mut req = request(text, &tree, &mappings, FormatPass::OnType);
    req.line_range = Some((1, 2));
    let edits = format_document(&req, &BraceIndenter::new(4), None, &CancelToken::new()).unwrap();
    let formatted = weft_core::apply_edits(text, &edits);
    assert_eq!(formatted, "<div>\n    <p>a</p>\n<p>b</p>\n</div>");
}

#[test]
fn formatting_is_idempotent() {
    let text = "<div>\n  @{\n  var x=1;\n  }\n</div>";
    let (tree, mappings) = parse_fixture(text);
    let edits = format_document(
        &request(text, &tree, &mappings, FormatPass::FullDocument),
        &BraceIndenter::new(4),
        None,
        &CancelToken::new(),
    )
    .unwrap();
    let formatted = weft_core::apply_edits(text, &edits);

    let (tree2, mappings2) = parse_fixture(&formatted);
    let second = format_document(
        &request(&formatted, &tree2, &mappings2, FormatPass::FullDocument),
        &BraceIndenter::new(4),
        None,
        &CancelToken::new(),
    )
    .unwrap();
    assert!(second.is_empty(), "second pass produced {second:?}");
}

#[test]
fn cancellation_aborts_with_no_edits() {
    let text = "<div>\n  @{\n  var x=1;\n  }\n</div>";
    let (tree, mappings) = parse_fixture(text);
    let cancel = CancelToken::new();
    cancel.cancel();
    let err = format_document(
        &request(text, &tree, &mappings, FormatPass::FullDocument),
        &BraceIndenter::new(4),
        None,
        &cancel,
    )
    .unwrap_err();
    assert!(matches!(err, FormatError::Canceled));
}

/// Reports a positive indentation at the block's mapping start but less
/// than that everywhere else, signalling it declined the construct.
struct Declining;

impl EmbeddedFormatter for Declining {
    fn indentation_levels(
        &self,
        _shadow_text: &str,
        offsets: &BTreeSet<usize>,
    ) -> Result<BTreeMap<usize, usize>, FormatterError> {
        let first = offsets.iter().next().copied();
        Ok(offsets
            .iter()
            .map(|&o| (o, if Some(o) == first { 4 } else { 0 }))
            .collect())
    }
}

#[test]
fn indentation_below_the_baseline_leaves_lines_untouched() {
    let text = "<div>\n  @{\n  var x=1;\n  }\n</div>";
    let (tree, mappings) = parse_fixture(text);
    let edits = format_document(
        &request(text, &tree, &mappings, FormatPass::FullDocument),
        &Declining,
        None,
        &CancelToken::new(),
    )
    .unwrap();
    assert!(edits.is_empty(), "floor rule must suppress edits: {edits:?}");
}

/// Delegates indentation to the brace indenter and additionally reports
/// one raw text edit.
struct Editing {
    inner: BraceIndenter,
    edit: RawEdit,
}

impl EmbeddedFormatter for Editing {
    fn indentation_levels(
        &self,
        shadow_text: &str,
        offsets: &BTreeSet<usize>,
    ) -> Result<BTreeMap<usize, usize>, FormatterError> {
        self.inner.indentation_levels(shadow_text, offsets)
    }

    fn text_edits(
        &self,
        _shadow_text: &str,
        _spans: &[SourceSpan],
    ) -> Result<Vec<RawEdit>, FormatterError> {
        Ok(vec![self.edit.clone()])
    }
}

#[test]
fn whitespace_only_raw_edits_survive_the_content_gate() {
    let text = "<div>\n  @{\n  var x=1;\n  }\n</div>";
    let (tree, mappings) = parse_fixture(text);
    let mapper = SpanMapper::new(mappings.clone());
    // Rewrite `x=1` as `x = 1` in the shadow document.
    let eq_generated = mapper.to_generated(text.find('=').unwrap()).unwrap();
    let formatter = Editing {
        inner: BraceIndenter::new(4),
        edit: RawEdit {
            span: SourceSpan::new(eq_generated, 1),
            new_text: " = ".to_string(),
        },
    };
    let edits = format_document(
        &request(text, &tree, &mappings, FormatPass::FullDocument),
        &formatter,
        None,
        &CancelToken::new(),
    )
    .unwrap();
    let formatted = weft_core::apply_edits(text, &edits);
    assert_eq!(formatted, "<div>\n    @{\n        var x = 1;\n    }\n</div>");
}

#[test]
fn destructive_raw_edits_are_rejected_wholesale() {
    let text = "<div>\n  @{\n  var x=1;\n  }\n</div>";
    let (tree, mappings) = parse_fixture(text);
    let mapper = SpanMapper::new(mappings.clone());
    let x_generated = mapper.to_generated(text.find('x').unwrap()).unwrap();
    let formatter = Editing {
        inner: BraceIndenter::new(4),
        edit: RawEdit {
            span: SourceSpan::new(x_generated, 1),
            new_text: String::new(),
        },
    };
    let edits = format_document(
        &request(text, &tree, &mappings, FormatPass::FullDocument),
        &formatter,
        None,
        &CancelToken::new(),
    )
    .unwrap();
    assert!(edits.is_empty(), "content gate must reject: {edits:?}");
}

/// Flags every line indented eight columns or more.
struct DeepIndentLinter;

impl DiagnosticsProvider for DeepIndentLinter {
    fn diagnostics(&self, text: &str) -> Vec<Diagnostic> {
        text.split('\n')
            .filter(|line| line.starts_with("        "))
            .map(|_| Diagnostic {
                code: "L100".to_string(),
                severity: Severity::Warning,
                message: "deeply indented line".to_string(),
            })
            .collect()
    }
}

#[test]
fn changed_diagnostics_reject_the_whole_edit_set() {
    let text = "<div>\n  @{\n  var x=1;\n  }\n</div>";
    let (tree, mappings) = parse_fixture(text);
    let edits = format_document(
        &request(text, &tree, &mappings, FormatPass::FullDocument),
        &BraceIndenter::new(4),
        Some(&DeepIndentLinter),
        &CancelToken::new(),
    )
    .unwrap();
    assert!(edits.is_empty(), "diagnostics gate must reject: {edits:?}");
}
