//! Export to rowan green trees.
//!
//! Hosts that already consume rowan trees can convert a parse result with
//! [`to_green`]. Node kinds are node type ids; leaf nodes become tokens, and
//! text not covered by any named node becomes a token of kind [`GAP_KIND`],
//! so the green tree's text always equals the source.

use std::sync::Arc;

use rowan::{GreenNode, GreenNodeBuilder, SyntaxKind};

use super::node::SyntaxNode;
use super::tree::Tree;

/// Kind of tokens covering text between named nodes.
pub const GAP_KIND: u16 = u16::MAX;

/// rowan language whose kinds are raw node type ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum StrandLanguage {}

impl rowan::Language for StrandLanguage {
    type Kind = u16;

    fn kind_from_raw(raw: SyntaxKind) -> Self::Kind {
        raw.0
    }

    fn kind_to_raw(kind: Self::Kind) -> SyntaxKind {
        SyntaxKind(kind)
    }
}

/// rowan red node over an exported tree.
pub type RowanNode = rowan::SyntaxNode<StrandLanguage>;

/// Convert `tree`, parsed from `text`, to a rowan green tree.
pub fn to_green(tree: &Arc<Tree>, text: &str) -> GreenNode {
    let mut builder = GreenNodeBuilder::new();
    let top = tree.top_node();
    builder.start_node(SyntaxKind(top.node_type().id()));
    add_children(&mut builder, &top, text);
    builder.finish_node();
    builder.finish()
}

fn add_children(builder: &mut GreenNodeBuilder<'static>, node: &SyntaxNode, text: &str) {
    let mut pos = node.from();
    let mut child = node.first_child();
    while let Some(current) = child {
        if current.from() > pos {
            builder.token(SyntaxKind(GAP_KIND), &slice(text, pos, current.from()));
        }
        let kind = SyntaxKind(current.node_type().id());
        if current.first_child().is_some() {
            builder.start_node(kind);
            add_children(builder, &current, text);
            builder.finish_node();
        } else {
            builder.token(kind, &slice(text, current.from(), current.to()));
        }
        pos = pos.max(current.to());
        child = current.next_sibling();
    }
    if node.to() > pos {
        builder.token(SyntaxKind(GAP_KIND), &slice(text, pos, node.to()));
    }
}

fn slice(text: &str, from: usize, to: usize) -> String {
    let bytes = text.as_bytes();
    let to = to.min(bytes.len());
    let from = from.min(to);
    String::from_utf8_lossy(&bytes[from..to]).into_owned()
}
