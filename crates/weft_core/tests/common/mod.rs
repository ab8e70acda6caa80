//! Fixture builders for integration tests: a miniature composite syntax
//! (elements, statement blocks, directives, inline expressions) parsed
//! into a tree, with mappings derived to match the generated layout the
//! way the real toolchain guarantees.

use weft_core::{
    generate, CompositeTree, LineIndex, Node, NodeKind, ShadowDocument, SourceMapping, SourceSpan,
};

struct Frame {
    kind: NodeKind,
    start: usize,
    name: Option<String>,
    children: Vec<Node>,
    code_start: Option<usize>,
    code_end: usize,
}

impl Frame {
    fn new(kind: NodeKind, start: usize) -> Self {
        Self {
            kind,
            start,
            name: None,
            children: Vec::new(),
            code_start: None,
            code_end: start,
        }
    }

    fn named(kind: NodeKind, start: usize, name: String) -> Self {
        Self {
            name: Some(name),
            ..Self::new(kind, start)
        }
    }
}

pub fn parse_fixture(text: &str) -> (CompositeTree, Vec<SourceMapping>) {
    let tree = parse_tree(text);
    let mappings = derive_mappings(text, &tree);
    (tree, mappings)
}

pub fn parse_tree(text: &str) -> CompositeTree {
    let index = LineIndex::new(text);
    let mut stack = vec![Frame::new(NodeKind::MarkupText, 0)];

    for line in 0..index.line_count() {
        let span = index.line_span(line);
        let content = &text[span.offset..span.end()];
        let trimmed = content.trim_start();
        if trimmed.is_empty() {
            continue;
        }
        let first = span.offset + (content.len() - trimmed.len());
        let top = stack.last().expect("fixture stack");
        let in_code = matches!(
            top.kind,
            NodeKind::StatementBlock | NodeKind::BlockDirective
        );

        if in_code {
            if trimmed == "}" {
                close_frame(&mut stack, first + 1);
            } else {
                let frame = stack.last_mut().expect("fixture stack");
                frame.code_start.get_or_insert(first);
                frame.code_end = span.end();
            }
            continue;
        }

        if trimmed.starts_with("</") {
            close_frame(&mut stack, span.end());
        } else if trimmed.starts_with('<') && trimmed.contains("</") {
            let mut node = Node::new(
                NodeKind::MarkupElement,
                SourceSpan::new(first, span.end() - first),
            );
            node.children = inline_expressions(text, first, span.end());
            stack.last_mut().expect("fixture stack").children.push(node);
        } else if trimmed.starts_with('<') {
            stack.push(Frame::new(NodeKind::MarkupElement, first));
        } else if trimmed.starts_with("@{") {
            stack.push(Frame::new(NodeKind::StatementBlock, first));
        } else if let Some(rest) = trimmed.strip_prefix("@section ") {
            let name = rest.split_whitespace().next().expect("section name");
            stack.push(Frame::named(
                NodeKind::SectionDirective,
                first,
                name.to_string(),
            ));
        } else if trimmed.starts_with('@') && trimmed.ends_with('{') && trimmed.len() > 2 {
            let name = trimmed[1..].split_whitespace().next().expect("keyword");
            stack.push(Frame::named(
                NodeKind::BlockDirective,
                first,
                name.to_string(),
            ));
        } else if trimmed == "}" {
            close_frame(&mut stack, first + 1);
        } else if trimmed.starts_with('@') {
            let fragments = inline_expressions(text, first, span.end());
            stack
                .last_mut()
                .expect("fixture stack")
                .children
                .extend(fragments);
        } else {
            let mut node = Node::new(
                NodeKind::MarkupText,
                SourceSpan::new(first, span.end() - first),
            );
            node.children = inline_expressions(text, first, span.end());
            stack.last_mut().expect("fixture stack").children.push(node);
        }
    }

    let root = stack.remove(0);
    CompositeTree::new(root.children)
}

fn close_frame(stack: &mut Vec<Frame>, end: usize) {
    let frame = stack.pop().expect("fixture stack");
    let mut node = Node {
        kind: frame.kind,
        span: SourceSpan::new(frame.start, end - frame.start),
        name: frame.name,
        children: frame.children,
    };
    if let Some(code_start) = frame.code_start {
        node.children.insert(
            0,
            Node::new(
                NodeKind::EmbeddedCode,
                SourceSpan::new(code_start, frame.code_end - code_start),
            ),
        );
    }
    stack.last_mut().expect("fixture stack").children.push(node);
}

fn inline_expressions(text: &str, start: usize, end: usize) -> Vec<Node> {
    let bytes = text.as_bytes();
    let mut out = Vec::new();
    let mut i = start;
    while i < end {
        if bytes[i] == b'@' && i + 1 < end && bytes[i + 1].is_ascii_alphabetic() {
            let mut j = i + 1;
            while j < end
                && (bytes[j].is_ascii_alphanumeric() || bytes[j] == b'.' || bytes[j] == b'_')
            {
                j += 1;
            }
            out.push(Node::new(
                NodeKind::ImplicitExpression,
                SourceSpan::new(i, j - i),
            ));
            i = j;
        } else {
            i += 1;
        }
    }
    out
}

/// Mappings consistent with the generated layout: embedded-code runs are
/// emitted verbatim after the opening sigil, so each block maps linearly.
pub fn derive_mappings(text: &str, tree: &CompositeTree) -> Vec<SourceMapping> {
    let shadow = generate(text, tree).expect("fixture shadow");
    let index = LineIndex::new(text);
    let mut mappings = Vec::new();
    collect_block_mappings(text, &index, &shadow, &tree.roots, &mut mappings);
    mappings
}

fn collect_block_mappings(
    text: &str,
    index: &LineIndex,
    shadow: &ShadowDocument,
    nodes: &[Node],
    out: &mut Vec<SourceMapping>,
) {
    for node in nodes {
        match node.kind {
            NodeKind::StatementBlock => {
                // The brace sits right after the transition sigil.
                out.push(mapping_for(index, shadow, node.span.offset + 1, node.span.end()));
            }
            NodeKind::BlockDirective => {
                // The mapped run starts at the directive's brace so the
                // block baseline is measured at the brace, not the body.
                let line = index.line_of(node.span.offset);
                let line_span = index.line_span(line);
                let brace = text[line_span.offset..line_span.end()]
                    .rfind('{')
                    .map(|p| line_span.offset + p);
                if let Some(brace) = brace {
                    let shadow_line_start = shadow.lines[line].formatted_offset;
                    let shadow_line = shadow.text[shadow_line_start..]
                        .split('\n')
                        .next()
                        .expect("shadow line");
                    let generated = shadow_line_start
                        + shadow_line.rfind('{').expect("stub brace");
                    out.push(SourceMapping::new(
                        SourceSpan::new(brace, node.span.end() - brace),
                        SourceSpan::new(generated, node.span.end() - brace),
                    ));
                }
            }
            _ => {}
        }
        collect_block_mappings(text, index, shadow, &node.children, out);
    }
}

fn mapping_for(
    index: &LineIndex,
    shadow: &ShadowDocument,
    start: usize,
    end: usize,
) -> SourceMapping {
    let descriptor = &shadow.lines[index.line_of(start)];
    let generated_start = (descriptor.formatted_offset as isize + start as isize
        - descriptor.origin_offset as isize) as usize;
    SourceMapping::new(
        SourceSpan::new(start, end - start),
        SourceSpan::new(generated_start, end - start),
    )
}
