use comrak::arena_tree::NodeEdge;
use comrak::nodes::{AstNode, NodeValue};

use crate::application::render::types::TocEntry;
use crate::domain::slug::HeadingAnchors;

/// Headings and plain text gathered from one document.
#[derive(Debug, Default)]
pub(crate) struct Outline {
    pub(crate) headings: Vec<TocEntry>,
    pub(crate) text: String,
}

pub(crate) fn collect_outline<'a>(root: &'a AstNode<'a>) -> Outline {
    let mut anchors = HeadingAnchors::new();
    let mut outline = Outline::default();

    // Iterative so document depth never bounds the call stack.
    for edge in root.traverse() {
        match edge {
            NodeEdge::Start(node) => {
                if let Some(level) = heading_level(node) {
                    let raw = collect_inline_text(node);
                    let text = raw.split_whitespace().collect::<Vec<_>>().join(" ");
                    let anchor = anchors.anchor_for(&text);
                    outline.headings.push(TocEntry {
                        level,
                        anchor,
                        text,
                    });
                }
                push_text(node, &mut outline.text, true);
            }
            NodeEdge::End(node) => {
                if node.data.borrow().value.block() {
                    outline.text.push(' ');
                }
            }
        }
    }

    outline
}

fn push_text(node: &AstNode<'_>, buffer: &mut String, include_code_blocks: bool) {
    let data = node.data.borrow();
    match &data.value {
        NodeValue::Text(text) => buffer.push_str(text),
        NodeValue::Code(code) => buffer.push_str(&code.literal),
        NodeValue::CodeBlock(block) if include_code_blocks => buffer.push_str(&block.literal),
        NodeValue::LineBreak | NodeValue::SoftBreak => buffer.push(' '),
        _ => {}
    }
}

fn heading_level(node: &AstNode<'_>) -> Option<u8> {
    let data = node.data.borrow();
    if let NodeValue::Heading(heading) = &data.value {
        Some(heading.level)
    } else {
        None
    }
}

fn collect_inline_text<'a>(node: &'a AstNode<'a>) -> String {
    let mut text = String::new();
    for descendant in node.descendants().skip(1) {
        push_text(descendant, &mut text, false);
    }
    text
}
