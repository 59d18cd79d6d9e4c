//
// syntax/tree.rs
//
// Immutable green tree plus a per-version index with parent links
//

use std::sync::Arc;

use tower_lsp::lsp_types::{Position, Range};

use super::kind::SyntaxKind;
use crate::utf16::LineIndex;

/// Half-open byte range `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct TextRange {
    pub start: u32,
    pub end: u32,
}

impl TextRange {
    pub fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> u32 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Inclusive on both ends so a cursor just past an identifier still hits it.
    pub fn contains_inclusive(&self, offset: u32) -> bool {
        self.start <= offset && offset <= self.end
    }

    pub fn contains_range(&self, other: TextRange) -> bool {
        self.start <= other.start && other.end <= self.end
    }
}

/// A leaf of the green tree. Owns its text so subtrees stay valid across
/// text versions.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct GreenToken {
    pub kind: SyntaxKind,
    pub text: Box<str>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum GreenElement {
    Node(Arc<GreenNode>),
    Token(Arc<GreenToken>),
}

impl GreenElement {
    pub fn kind(&self) -> SyntaxKind {
        match self {
            GreenElement::Node(node) => node.kind,
            GreenElement::Token(token) => token.kind,
        }
    }

    pub fn len(&self) -> u32 {
        match self {
            GreenElement::Node(node) => node.len,
            GreenElement::Token(token) => token.text.len() as u32,
        }
    }
}

/// An interior green node. Child offsets are relative to the node start so
/// the same `Arc` can be reused at a different absolute position.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct GreenNode {
    pub kind: SyntaxKind,
    pub len: u32,
    pub children: Vec<(u32, GreenElement)>,
}

/// Index of a node or token inside one [`SyntaxTree`] version.
///
/// Ids are assigned in preorder, so the descendants of a node occupy the
/// contiguous id range right after it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

#[derive(Debug)]
struct NodeData {
    kind: SyntaxKind,
    range: TextRange,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    /// One past the last descendant id
    subtree_end: u32,
    green: GreenElement,
}

/// One parsed version of a source file.
#[derive(Debug)]
pub struct SyntaxTree {
    text: Arc<str>,
    green: Arc<GreenNode>,
    nodes: Vec<NodeData>,
    line_index: LineIndex,
}

impl SyntaxTree {
    pub fn new(text: Arc<str>, green: Arc<GreenNode>) -> Self {
        let mut nodes = Vec::new();
        build_index(&mut nodes, GreenElement::Node(green.clone()), 0, None);
        let line_index = LineIndex::new(&text);
        Self {
            text,
            green,
            nodes,
            line_index,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn shared_text(&self) -> Arc<str> {
        self.text.clone()
    }

    pub fn green(&self) -> &Arc<GreenNode> {
        &self.green
    }

    pub fn line_index(&self) -> &LineIndex {
        &self.line_index
    }

    pub fn root(&self) -> SyntaxNode<'_> {
        self.node(NodeId(0))
    }

    pub fn node(&self, id: NodeId) -> SyntaxNode<'_> {
        SyntaxNode { tree: self, id }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// The green element backing a node; reused subtrees share it by `Arc`.
    pub fn green_of(&self, id: NodeId) -> &GreenElement {
        &self.nodes[id.0 as usize].green
    }

    /// Innermost token touching `offset`. A token starting at `offset` wins
    /// over one ending there.
    pub fn token_at(&self, offset: u32) -> Option<SyntaxNode<'_>> {
        let mut best: Option<NodeId> = None;
        let mut current = NodeId(0);
        loop {
            let data = &self.nodes[current.0 as usize];
            let mut next = None;
            for &child in &data.children {
                let range = self.nodes[child.0 as usize].range;
                if range.contains_inclusive(offset) {
                    next = Some(child);
                    if range.start == offset || offset < range.end {
                        break;
                    }
                }
            }
            let Some(child) = next else { break };
            if self.nodes[child.0 as usize].kind.is_token() {
                best = Some(child);
                break;
            }
            current = child;
        }
        best.map(|id| self.node(id))
    }

    /// Innermost node (token or interior) covering `range`.
    pub fn covering_element(&self, range: TextRange) -> SyntaxNode<'_> {
        let mut current = NodeId(0);
        'outer: loop {
            for &child in &self.nodes[current.0 as usize].children {
                if self.nodes[child.0 as usize].range.contains_range(range) {
                    current = child;
                    continue 'outer;
                }
            }
            return self.node(current);
        }
    }

    pub fn position(&self, offset: u32) -> Position {
        self.line_index.position(&self.text, offset)
    }

    pub fn offset(&self, position: Position) -> u32 {
        self.line_index.offset(&self.text, position)
    }

    pub fn lsp_range(&self, range: TextRange) -> Range {
        Range {
            start: self.position(range.start),
            end: self.position(range.end),
        }
    }
}

fn build_index(
    nodes: &mut Vec<NodeData>,
    green: GreenElement,
    offset: u32,
    parent: Option<NodeId>,
) -> NodeId {
    let id = NodeId(nodes.len() as u32);
    let range = TextRange::new(offset, offset + green.len());
    nodes.push(NodeData {
        kind: green.kind(),
        range,
        parent,
        children: Vec::new(),
        subtree_end: id.0 + 1,
        green: green.clone(),
    });
    if let GreenElement::Node(node) = &green {
        let mut children = Vec::with_capacity(node.children.len());
        for (rel, child) in &node.children {
            children.push(build_index(nodes, child.clone(), offset + rel, Some(id)));
        }
        let end = nodes.len() as u32;
        let data = &mut nodes[id.0 as usize];
        data.children = children;
        data.subtree_end = end;
    }
    id
}

/// Cheap copyable handle to a node of a [`SyntaxTree`].
#[derive(Clone, Copy)]
pub struct SyntaxNode<'a> {
    tree: &'a SyntaxTree,
    id: NodeId,
}

impl std::fmt::Debug for SyntaxNode<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}@{}..{}", self.kind(), self.range().start, self.range().end)
    }
}

impl PartialEq for SyntaxNode<'_> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.tree, other.tree) && self.id == other.id
    }
}

impl Eq for SyntaxNode<'_> {}

impl<'a> SyntaxNode<'a> {
    fn data(&self) -> &'a NodeData {
        &self.tree.nodes[self.id.0 as usize]
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn tree(&self) -> &'a SyntaxTree {
        self.tree
    }

    pub fn kind(&self) -> SyntaxKind {
        self.data().kind
    }

    pub fn range(&self) -> TextRange {
        self.data().range
    }

    pub fn text(&self) -> &'a str {
        let range = self.range();
        &self.tree.text[range.start as usize..range.end as usize]
    }

    pub fn lsp_range(&self) -> Range {
        self.tree.lsp_range(self.range())
    }

    pub fn parent(&self) -> Option<SyntaxNode<'a>> {
        self.data().parent.map(|id| self.tree.node(id))
    }

    pub fn ancestors(&self) -> impl Iterator<Item = SyntaxNode<'a>> {
        std::iter::successors(Some(*self), |node| node.parent())
    }

    pub fn children(&self) -> impl Iterator<Item = SyntaxNode<'a>> + 'a {
        let tree = self.tree;
        self.data().children.iter().map(move |&id| tree.node(id))
    }

    /// Interior (non-token) children.
    pub fn child_nodes(&self) -> impl Iterator<Item = SyntaxNode<'a>> + 'a {
        self.children().filter(|c| !c.kind().is_token())
    }

    /// All descendants in preorder, excluding `self`.
    pub fn descendants(&self) -> impl Iterator<Item = SyntaxNode<'a>> + 'a {
        let tree = self.tree;
        (self.id.0 + 1..self.data().subtree_end).map(move |id| tree.node(NodeId(id)))
    }

    pub fn is_ancestor_of(&self, other: NodeId) -> bool {
        self.id.0 < other.0 && other.0 < self.data().subtree_end
    }

    pub fn child(&self, kind: SyntaxKind) -> Option<SyntaxNode<'a>> {
        self.children().find(|c| c.kind() == kind)
    }

    pub fn children_of(&self, kind: SyntaxKind) -> impl Iterator<Item = SyntaxNode<'a>> + 'a {
        self.children().filter(move |c| c.kind() == kind)
    }

    pub fn prev_sibling(&self) -> Option<SyntaxNode<'a>> {
        let parent = self.parent()?;
        let siblings = &parent.data().children;
        let index = siblings.iter().position(|&id| id == self.id)?;
        index
            .checked_sub(1)
            .map(|i| self.tree.node(siblings[i]))
    }

    pub fn next_sibling(&self) -> Option<SyntaxNode<'a>> {
        let parent = self.parent()?;
        let siblings = &parent.data().children;
        let index = siblings.iter().position(|&id| id == self.id)?;
        siblings.get(index + 1).map(|&id| self.tree.node(id))
    }

    pub fn green(&self) -> &'a GreenElement {
        &self.data().green
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(kind: SyntaxKind, text: &str) -> GreenElement {
        GreenElement::Token(Arc::new(GreenToken {
            kind,
            text: text.into(),
        }))
    }

    fn sample() -> SyntaxTree {
        // "foo = bar"
        let left = Arc::new(GreenNode {
            kind: SyntaxKind::FunctionDeclarationLeft,
            len: 3,
            children: vec![(0, token(SyntaxKind::LowerIdent, "foo"))],
        });
        let body = Arc::new(GreenNode {
            kind: SyntaxKind::ValueRef,
            len: 3,
            children: vec![(0, token(SyntaxKind::LowerIdent, "bar"))],
        });
        let decl = Arc::new(GreenNode {
            kind: SyntaxKind::ValueDeclaration,
            len: 9,
            children: vec![
                (0, GreenElement::Node(left)),
                (4, token(SyntaxKind::Equals, "=")),
                (6, GreenElement::Node(body)),
            ],
        });
        let file = Arc::new(GreenNode {
            kind: SyntaxKind::File,
            len: 9,
            children: vec![(0, GreenElement::Node(decl))],
        });
        SyntaxTree::new(Arc::from("foo = bar"), file)
    }

    #[test]
    fn test_index_ranges_and_parents() {
        let tree = sample();
        let root = tree.root();
        assert_eq!(root.kind(), SyntaxKind::File);
        let decl = root.children().next().unwrap();
        assert_eq!(decl.kind(), SyntaxKind::ValueDeclaration);
        assert_eq!(decl.parent(), Some(root));
        let body = decl.child(SyntaxKind::ValueRef).unwrap();
        assert_eq!(body.range(), TextRange::new(6, 9));
        assert_eq!(body.text(), "bar");
    }

    #[test]
    fn test_descendants_are_contiguous() {
        let tree = sample();
        let decl = tree.root().children().next().unwrap();
        let kinds: Vec<_> = decl.descendants().map(|n| n.kind()).collect();
        assert_eq!(
            kinds,
            vec![
                SyntaxKind::FunctionDeclarationLeft,
                SyntaxKind::LowerIdent,
                SyntaxKind::Equals,
                SyntaxKind::ValueRef,
                SyntaxKind::LowerIdent,
            ]
        );
        let last = decl.descendants().last().unwrap();
        assert!(decl.is_ancestor_of(last.id()));
        assert!(!last.is_ancestor_of(decl.id()));
    }

    #[test]
    fn test_token_at_prefers_token_starting_at_offset() {
        let tree = sample();
        assert_eq!(tree.token_at(0).unwrap().text(), "foo");
        assert_eq!(tree.token_at(3).unwrap().text(), "foo");
        assert_eq!(tree.token_at(6).unwrap().text(), "bar");
        assert_eq!(tree.token_at(9).unwrap().text(), "bar");
    }

    #[test]
    fn test_siblings() {
        let tree = sample();
        let decl = tree.root().children().next().unwrap();
        let eq = decl.child(SyntaxKind::Equals).unwrap();
        assert_eq!(eq.prev_sibling().unwrap().kind(), SyntaxKind::FunctionDeclarationLeft);
        assert_eq!(eq.next_sibling().unwrap().kind(), SyntaxKind::ValueRef);
    }
}
