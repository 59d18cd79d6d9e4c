//
// syntax/ast.rs
//
// Typed accessors over the untyped tree: module header, imports, exposing
// lists and declaration names.
//

use super::kind::SyntaxKind;
use super::tree::{NodeId, SyntaxNode, SyntaxTree, TextRange};

/// Module name used when a file has no `module` header.
pub const DEFAULT_MODULE: &str = "Main";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExposedKind {
    Value,
    /// A type, optionally with all of its constructors (`Type(..)`)
    Type { constructors: bool },
    Operator,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExposedItem {
    pub name: String,
    pub kind: ExposedKind,
    pub node: NodeId,
    pub range: TextRange,
}

/// An exposing clause, on a module header or on an import.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Exposing {
    /// `exposing (..)`
    All,
    Items(Vec<ExposedItem>),
}

impl Exposing {
    pub fn is_all(&self) -> bool {
        matches!(self, Exposing::All)
    }

    pub fn items(&self) -> &[ExposedItem] {
        match self {
            Exposing::All => &[],
            Exposing::Items(items) => items,
        }
    }

    pub fn exposes_value(&self, name: &str) -> bool {
        match self {
            Exposing::All => true,
            Exposing::Items(items) => items
                .iter()
                .any(|i| i.kind == ExposedKind::Value && i.name == name),
        }
    }

    pub fn exposes_operator(&self, name: &str) -> bool {
        match self {
            Exposing::All => true,
            Exposing::Items(items) => items
                .iter()
                .any(|i| i.kind == ExposedKind::Operator && i.name == name),
        }
    }

    pub fn exposes_type(&self, name: &str) -> bool {
        match self {
            Exposing::All => true,
            Exposing::Items(items) => items
                .iter()
                .any(|i| matches!(i.kind, ExposedKind::Type { .. }) && i.name == name),
        }
    }

    pub fn exposes_constructors_of(&self, type_name: &str) -> bool {
        match self {
            Exposing::All => true,
            Exposing::Items(items) => items.iter().any(|i| {
                i.kind == ExposedKind::Type { constructors: true } && i.name == type_name
            }),
        }
    }
}

/// One `import` line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Import {
    pub node: NodeId,
    pub range: TextRange,
    pub module: String,
    pub alias: Option<String>,
    pub exposing: Option<Exposing>,
}

impl Import {
    /// The prefix qualified references use for this import.
    pub fn qualifier(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.module)
    }
}

pub fn module_declaration(tree: &SyntaxTree) -> Option<SyntaxNode<'_>> {
    tree.root().child(SyntaxKind::ModuleDeclaration)
}

pub fn module_name(tree: &SyntaxTree) -> String {
    module_declaration(tree)
        .and_then(|decl| decl.child(SyntaxKind::ModuleName))
        .map(|name| name.text().to_string())
        .unwrap_or_else(|| DEFAULT_MODULE.to_string())
}

/// What the module header exposes. A file without a header exposes
/// everything.
pub fn module_exposing(tree: &SyntaxTree) -> Exposing {
    module_declaration(tree)
        .and_then(|decl| decl.child(SyntaxKind::ExposingList))
        .map(exposing_of)
        .unwrap_or(Exposing::All)
}

pub fn exposing_of(list: SyntaxNode<'_>) -> Exposing {
    if list.child(SyntaxKind::DoubleDot).is_some() {
        return Exposing::All;
    }
    let mut items = Vec::new();
    for child in list.child_nodes() {
        let (kind, name) = match child.kind() {
            SyntaxKind::ExposedValue => (ExposedKind::Value, child.text().to_string()),
            SyntaxKind::ExposedType => {
                let Some(name) = child.child(SyntaxKind::UpperIdent) else {
                    continue;
                };
                let constructors = child.child(SyntaxKind::ExposedConstructors).is_some();
                (ExposedKind::Type { constructors }, name.text().to_string())
            }
            SyntaxKind::ExposedOperator => {
                let Some(op) = child.child(SyntaxKind::Operator) else {
                    continue;
                };
                (ExposedKind::Operator, op.text().to_string())
            }
            _ => continue,
        };
        items.push(ExposedItem {
            name,
            kind,
            node: child.id(),
            range: child.range(),
        });
    }
    Exposing::Items(items)
}

pub fn imports(tree: &SyntaxTree) -> Vec<Import> {
    tree.root()
        .children_of(SyntaxKind::ImportClause)
        .filter_map(|clause| {
            let module = clause.child(SyntaxKind::ModuleName)?.text().to_string();
            let alias = clause
                .child(SyntaxKind::AsClause)
                .and_then(|a| a.child(SyntaxKind::UpperIdent))
                .map(|a| a.text().to_string());
            let exposing = clause.child(SyntaxKind::ExposingList).map(exposing_of);
            Some(Import {
                node: clause.id(),
                range: clause.range(),
                module,
                alias,
                exposing,
            })
        })
        .collect()
}

/// The token naming a declaration-like node, if it has one.
pub fn name_token<'a>(node: SyntaxNode<'a>) -> Option<SyntaxNode<'a>> {
    match node.kind() {
        SyntaxKind::ValueDeclaration => node
            .child(SyntaxKind::FunctionDeclarationLeft)
            .and_then(|left| left.child(SyntaxKind::LowerIdent)),
        SyntaxKind::FunctionDeclarationLeft
        | SyntaxKind::TypeAnnotation
        | SyntaxKind::PortAnnotation
        | SyntaxKind::VarPattern
        | SyntaxKind::TypeVariable
        | SyntaxKind::ExposedValue => node.child(SyntaxKind::LowerIdent),
        SyntaxKind::TypeDeclaration
        | SyntaxKind::TypeAliasDeclaration
        | SyntaxKind::UnionVariant
        | SyntaxKind::ExposedType => node.child(SyntaxKind::UpperIdent),
        SyntaxKind::InfixDeclaration | SyntaxKind::ExposedOperator => {
            node.child(SyntaxKind::Operator)
        }
        SyntaxKind::AsPattern => node.children_of(SyntaxKind::LowerIdent).last(),
        SyntaxKind::ModuleName => Some(node),
        _ => None,
    }
}

pub fn name_of(node: SyntaxNode<'_>) -> Option<&str> {
    name_token(node).map(|t| t.text())
}

/// Split a qualified reference (`A.B.name`, `A.B.Ctor`, `A.Type`) into its
/// qualifier segments and final name token.
pub fn qualified_parts<'a>(node: SyntaxNode<'a>) -> (Vec<SyntaxNode<'a>>, Option<SyntaxNode<'a>>) {
    let mut idents: Vec<SyntaxNode<'a>> = node
        .children()
        .filter(|c| matches!(c.kind(), SyntaxKind::UpperIdent | SyntaxKind::LowerIdent))
        .collect();
    let name = idents.pop();
    (idents, name)
}

/// Qualifier text of a qualified reference, `None` when unqualified.
pub fn qualifier_of(node: SyntaxNode<'_>) -> Option<String> {
    let (segments, _) = qualified_parts(node);
    if segments.is_empty() {
        None
    } else {
        Some(
            segments
                .iter()
                .map(|s| s.text())
                .collect::<Vec<_>>()
                .join("."),
        )
    }
}

/// The type annotation directly preceding a top-level or let declaration
/// with the same name.
pub fn annotation_for<'a>(decl: SyntaxNode<'a>) -> Option<SyntaxNode<'a>> {
    let name = name_of(decl)?;
    let prev = decl.prev_sibling()?;
    if prev.kind() == SyntaxKind::TypeAnnotation && name_of(prev) == Some(name) {
        Some(prev)
    } else {
        None
    }
}

/// The declaration an annotation belongs to.
pub fn declaration_for<'a>(annotation: SyntaxNode<'a>) -> Option<SyntaxNode<'a>> {
    let name = name_of(annotation)?;
    let next = annotation.next_sibling()?;
    if next.kind() == SyntaxKind::ValueDeclaration && name_of(next) == Some(name) {
        Some(next)
    } else {
        None
    }
}

/// The body expression of a value declaration (after `=`).
pub fn declaration_body<'a>(decl: SyntaxNode<'a>) -> Option<SyntaxNode<'a>> {
    let mut after_equals = false;
    for child in decl.children() {
        if child.kind() == SyntaxKind::Equals {
            after_equals = true;
        } else if after_equals && child.kind().is_expression() {
            return Some(child);
        }
    }
    None
}

/// The parameter patterns of a value declaration.
pub fn declaration_params<'a>(decl: SyntaxNode<'a>) -> Vec<SyntaxNode<'a>> {
    decl.child(SyntaxKind::FunctionDeclarationLeft)
        .map(|left| left.child_nodes().filter(|c| c.kind().is_pattern()).collect())
        .unwrap_or_default()
}

/// The enclosing top-level item of a node.
pub fn top_level_item<'a>(node: SyntaxNode<'a>) -> Option<SyntaxNode<'a>> {
    node.ancestors()
        .find(|n| n.parent().is_some_and(|p| p.kind() == SyntaxKind::File))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::parse;

    #[test]
    fn test_module_header() {
        let tree = parse("module Page.Home exposing (view, Msg(..), Model, (|=))\n");
        assert_eq!(module_name(&tree), "Page.Home");
        let exposing = module_exposing(&tree);
        assert!(exposing.exposes_value("view"));
        assert!(!exposing.exposes_value("update"));
        assert!(exposing.exposes_type("Model"));
        assert!(exposing.exposes_constructors_of("Msg"));
        assert!(!exposing.exposes_constructors_of("Model"));
        assert!(exposing.exposes_operator("|="));
    }

    #[test]
    fn test_headerless_file_is_main_exposing_all() {
        let tree = parse("main = 1\n");
        assert_eq!(module_name(&tree), DEFAULT_MODULE);
        assert!(module_exposing(&tree).is_all());
    }

    #[test]
    fn test_imports() {
        let tree = parse("module A exposing (..)\nimport Html\nimport Html.Attributes as Attr exposing (class)\n");
        let imports = imports(&tree);
        assert_eq!(imports.len(), 2);
        assert_eq!(imports[0].module, "Html");
        assert_eq!(imports[0].qualifier(), "Html");
        assert!(imports[0].exposing.is_none());
        assert_eq!(imports[1].qualifier(), "Attr");
        assert!(imports[1].exposing.as_ref().unwrap().exposes_value("class"));
    }

    #[test]
    fn test_annotation_pairing() {
        let tree = parse("foo : Int\nfoo = 1\n\nbar = 2\n");
        let decls: Vec<_> = tree
            .root()
            .children_of(SyntaxKind::ValueDeclaration)
            .collect();
        let annotation = annotation_for(decls[0]).unwrap();
        assert_eq!(annotation.kind(), SyntaxKind::TypeAnnotation);
        assert_eq!(declaration_for(annotation), Some(decls[0]));
        assert!(annotation_for(decls[1]).is_none());
    }

    #[test]
    fn test_qualified_parts() {
        let tree = parse("x = Html.Attributes.class\n");
        let value_ref = tree
            .root()
            .descendants()
            .find(|n| n.kind() == SyntaxKind::ValueRef)
            .unwrap();
        assert_eq!(qualifier_of(value_ref).as_deref(), Some("Html.Attributes"));
        assert_eq!(qualified_parts(value_ref).1.unwrap().text(), "class");
    }

    #[test]
    fn test_declaration_body_and_params() {
        let tree = parse("f a (b, c) = a\n");
        let decl = tree.root().child(SyntaxKind::ValueDeclaration).unwrap();
        assert_eq!(declaration_params(decl).len(), 2);
        assert_eq!(declaration_body(decl).unwrap().text(), "a");
        let body = declaration_body(decl).unwrap();
        assert_eq!(top_level_item(body), Some(decl));
    }
}
