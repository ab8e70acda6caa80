use serde::Serialize;

/// Absolute byte span in a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct SourceSpan {
    pub offset: usize,
    pub length: usize,
}

impl SourceSpan {
    pub fn new(offset: usize, length: usize) -> Self {
        Self { offset, length }
    }

    pub fn end(&self) -> usize {
        self.offset + self.length
    }

    pub fn contains(&self, offset: usize) -> bool {
        offset >= self.offset && offset < self.end()
    }
}

/// Grammatical category of a structurally-significant node in the composite
/// tree. The set is closed: every line of a composite document is owned by
/// exactly one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// Markup element, open tag through matching close tag.
    MarkupElement,
    MarkupText,
    MarkupComment,
    /// Plain markup attribute (name and value).
    MarkupAttribute,
    /// Attribute whose value is bound to embedded code.
    BoundAttribute,
    /// Host-language comment (`@* ... *@` style).
    TemplateComment,
    /// Single-line directive (`@page`, `@using` style).
    LineDirective,
    /// Directive with a braced body establishing a member scope
    /// (`@functions { ... }` style). `name` carries the keyword.
    BlockDirective,
    /// Named block rendered in statement context (`@section nav { ... }`
    /// style). `name` carries the section name.
    SectionDirective,
    /// Explicit statement block (`@{ ... }`).
    StatementBlock,
    /// Parenthesized embedded expression (`@( ... )`).
    ExplicitExpression,
    /// Bare embedded expression (`@user.name`).
    ImplicitExpression,
    /// Multi-line string/template literal inside embedded code.
    TemplateLiteral,
    /// Transition from embedded code back into markup.
    MarkupTransition,
    /// Plain embedded-code run inside a block.
    EmbeddedCode,
}

impl NodeKind {
    /// Kinds whose content is embedded-language code rather than markup.
    pub fn is_embedded_code(self) -> bool {
        matches!(
            self,
            NodeKind::BlockDirective
                | NodeKind::SectionDirective
                | NodeKind::StatementBlock
                | NodeKind::ExplicitExpression
                | NodeKind::ImplicitExpression
                | NodeKind::TemplateLiteral
                | NodeKind::EmbeddedCode
        )
    }

    /// Kinds that open a braced embedded scope.
    pub fn is_block(self) -> bool {
        matches!(
            self,
            NodeKind::BlockDirective | NodeKind::SectionDirective | NodeKind::StatementBlock
        )
    }
}

/// One node of the composite syntax tree. Produced by an external parser;
/// immutable input to the engine.
#[derive(Debug, Clone)]
pub struct Node {
    pub kind: NodeKind,
    pub span: SourceSpan,
    /// Directive keyword or section name, where the grammar defines one.
    pub name: Option<String>,
    pub children: Vec<Node>,
}

impl Node {
    pub fn new(kind: NodeKind, span: SourceSpan) -> Self {
        Self {
            kind,
            span,
            name: None,
            children: Vec::new(),
        }
    }

    pub fn named(kind: NodeKind, span: SourceSpan, name: impl Into<String>) -> Self {
        Self {
            kind,
            span,
            name: Some(name.into()),
            children: Vec::new(),
        }
    }

    pub fn with_children(mut self, children: Vec<Node>) -> Self {
        self.children = children;
        self
    }
}

/// Parsed composite document. Node spans nest: a child span is always
/// contained in its parent span, and sibling spans do not overlap.
#[derive(Debug, Clone, Default)]
pub struct CompositeTree {
    pub roots: Vec<Node>,
}

impl CompositeTree {
    pub fn new(roots: Vec<Node>) -> Self {
        Self { roots }
    }

    /// Root-to-leaf chain of nodes whose spans contain `offset`.
    pub fn path_at(&self, offset: usize) -> Vec<&Node> {
        let mut path = Vec::new();
        let mut nodes = &self.roots;
        loop {
            let Some(node) = nodes.iter().find(|n| n.span.contains(offset)) else {
                return path;
            };
            path.push(node);
            nodes = &node.children;
        }
    }

    /// Innermost node containing `offset`.
    pub fn owner_at(&self, offset: usize) -> Option<&Node> {
        let path = self.path_at(offset);
        path.last().copied()
    }
}

/// Line-start table over a document. Lines follow `split('\n')` semantics:
/// a trailing newline yields a final empty line.
#[derive(Debug, Clone)]
pub struct LineIndex {
    line_starts: Vec<usize>,
    text_len: usize,
}

impl LineIndex {
    pub fn new(text: &str) -> Self {
        let mut line_starts = vec![0];
        for (i, byte) in text.bytes().enumerate() {
            if byte == b'\n' {
                line_starts.push(i + 1);
            }
        }
        Self {
            line_starts,
            text_len: text.len(),
        }
    }

    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }

    pub fn start_of(&self, line: usize) -> usize {
        self.line_starts[line]
    }

    /// Span of one line, excluding its terminating newline.
    pub fn line_span(&self, line: usize) -> SourceSpan {
        let start = self.line_starts[line];
        let end = match self.line_starts.get(line + 1) {
            Some(next) => next - 1,
            None => self.text_len,
        };
        SourceSpan::new(start, end - start)
    }

    /// Line containing `offset` (offsets past the end map to the last line).
    pub fn line_of(&self, offset: usize) -> usize {
        self.line_starts.partition_point(|&start| start <= offset) - 1
    }

    /// Zero-based (line, column) of a byte offset.
    pub fn position_of(&self, offset: usize) -> (usize, usize) {
        let line = self.line_of(offset);
        (line, offset - self.line_starts[line])
    }

    /// Byte offset of a zero-based (line, column), clamped to the line end.
    pub fn offset_of(&self, line: usize, column: usize) -> usize {
        let line = line.min(self.line_count() - 1);
        let span = self.line_span(line);
        span.offset + column.min(span.length)
    }

    /// Offset of the first non-whitespace character on a line, if any.
    pub fn first_non_ws(&self, text: &str, line: usize) -> Option<usize> {
        let span = self.line_span(line);
        let content = &text[span.offset..span.end()];
        let trimmed = content.trim_start();
        if trimmed.is_empty() {
            return None;
        }
        Some(span.offset + (content.len() - trimmed.len()))
    }
}
