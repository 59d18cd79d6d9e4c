//
// resolve/symbol.rs
//
// Symbols and references produced by scope resolution
//

use tower_lsp::lsp_types::{Location, SymbolKind as LspSymbolKind, Url};

use crate::forest::SourceFile;
use crate::syntax::ast;
use crate::syntax::{NodeId, SyntaxKind, SyntaxNode, TextRange};

/// Category of a resolved name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SymbolKind {
    /// Top-level value, port, let binding or pattern variable
    Function,
    UnionType,
    TypeAlias,
    UnionConstructor,
    Operator,
    Module,
    TypeVariable,
    Field,
}

impl SymbolKind {
    /// Mapping used for document symbols and completion items.
    pub fn to_lsp(self) -> LspSymbolKind {
        match self {
            SymbolKind::Function => LspSymbolKind::FUNCTION,
            SymbolKind::UnionType => LspSymbolKind::ENUM,
            SymbolKind::TypeAlias => LspSymbolKind::STRUCT,
            SymbolKind::UnionConstructor => LspSymbolKind::ENUM_MEMBER,
            SymbolKind::Operator => LspSymbolKind::OPERATOR,
            SymbolKind::Module => LspSymbolKind::MODULE,
            SymbolKind::TypeVariable => LspSymbolKind::TYPE_PARAMETER,
            SymbolKind::Field => LspSymbolKind::FIELD,
        }
    }
}

/// A named declaration, identified by the node that declares it.
///
/// The node id is only meaningful for the tree version of `uri` the symbol
/// was resolved against; symbols are recomputed per query and never stored
/// across edits.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Symbol {
    pub kind: SymbolKind,
    pub name: String,
    pub uri: Url,
    /// Module the declaring file belongs to
    pub module: String,
    /// Declaring node (a whole declaration, variant, pattern or token)
    pub node: NodeId,
    pub range: TextRange,
    pub name_range: TextRange,
    /// Owning union type of a constructor, or owning alias of a field
    pub parent: Option<String>,
    /// Bound inside a declaration rather than at module level
    pub local: bool,
}

impl Symbol {
    /// Symbol for a declaring node of `file`.
    pub fn new(
        kind: SymbolKind,
        file: &SourceFile,
        node: SyntaxNode<'_>,
        name_token: SyntaxNode<'_>,
    ) -> Self {
        Self {
            kind,
            name: name_token.text().to_string(),
            uri: file.uri.clone(),
            module: file.module_name.clone(),
            node: node.id(),
            range: node.range(),
            name_range: name_token.range(),
            parent: None,
            local: false,
        }
    }

    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    pub fn local(mut self) -> Self {
        self.local = true;
        self
    }

    /// Same declaration, regardless of how it was reached.
    pub fn same_as(&self, other: &Symbol) -> bool {
        self.uri == other.uri && self.node == other.node && self.kind == other.kind
    }

    /// Symbol standing for the module declared by `file`.
    pub fn module(file: &SourceFile) -> Self {
        let tree = &file.tree;
        let declaration = ast::module_declaration(tree);
        let name = declaration.and_then(|d| d.child(SyntaxKind::ModuleName));
        let node = declaration.unwrap_or_else(|| tree.root());
        Self {
            kind: SymbolKind::Module,
            name: file.module_name.clone(),
            uri: file.uri.clone(),
            module: file.module_name.clone(),
            node: node.id(),
            range: declaration.map(|d| d.range()).unwrap_or_default(),
            name_range: name.map(|n| n.range()).unwrap_or_default(),
            parent: None,
            local: false,
        }
    }

    pub fn location(&self, file: &SourceFile) -> Location {
        Location::new(self.uri.clone(), file.tree.lsp_range(self.range))
    }
}

/// How a name occurrence relates to the symbol it resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReferenceKind {
    /// The declaring name itself
    Declaration,
    /// Name of a type annotation
    Annotation,
    /// Entry of a module or import exposing list
    Exposing,
    /// Any other occurrence
    Usage,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Reference {
    pub uri: Url,
    /// Range of the name token
    pub range: TextRange,
    pub kind: ReferenceKind,
}

impl Reference {
    pub fn is_usage(&self) -> bool {
        self.kind == ReferenceKind::Usage
    }
}
