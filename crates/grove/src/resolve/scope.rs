//
// resolve/scope.rs
//
// Local scopes: names bound by patterns, parameters and let blocks
//

use crate::syntax::ast;
use crate::syntax::{SyntaxKind, SyntaxNode, TextRange};

/// A name introduced inside a declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Binding<'a> {
    pub name: &'a str,
    /// Declaring node: a `VarPattern`, a let `ValueDeclaration`, or the
    /// identifier token of an `as` alias or record pattern field
    pub node: SyntaxNode<'a>,
    pub name_range: TextRange,
}

impl<'a> Binding<'a> {
    fn token(token: SyntaxNode<'a>) -> Self {
        Self {
            name: token.text(),
            node: token,
            name_range: token.range(),
        }
    }
}

/// Every name a pattern binds, in source order.
pub fn pattern_bindings<'a>(pattern: SyntaxNode<'a>) -> Vec<Binding<'a>> {
    let mut out = Vec::new();
    collect_pattern(pattern, &mut out);
    out
}

fn collect_pattern<'a>(pattern: SyntaxNode<'a>, out: &mut Vec<Binding<'a>>) {
    match pattern.kind() {
        SyntaxKind::VarPattern => {
            if let Some(name) = pattern.child(SyntaxKind::LowerIdent) {
                out.push(Binding {
                    name: name.text(),
                    node: pattern,
                    name_range: name.range(),
                });
            }
        }
        SyntaxKind::AsPattern => {
            for child in pattern.child_nodes() {
                collect_pattern(child, out);
            }
            if let Some(alias) = pattern.children_of(SyntaxKind::LowerIdent).last() {
                out.push(Binding::token(alias));
            }
        }
        SyntaxKind::RecordPattern => {
            out.extend(pattern.children_of(SyntaxKind::LowerIdent).map(Binding::token));
        }
        _ => {
            for child in pattern.child_nodes() {
                if child.kind().is_pattern() {
                    collect_pattern(child, out);
                }
            }
        }
    }
}

/// Names a let block binds, visible throughout the whole `let … in …`.
pub fn let_bindings<'a>(let_in: SyntaxNode<'a>) -> Vec<Binding<'a>> {
    let mut out = Vec::new();
    for decl in let_in.children_of(SyntaxKind::ValueDeclaration) {
        match ast::name_token(decl) {
            Some(name) => out.push(Binding {
                name: name.text(),
                node: decl,
                name_range: name.range(),
            }),
            None => {
                for pattern in decl.child_nodes().filter(|c| c.kind().is_pattern()) {
                    collect_pattern(pattern, &mut out);
                }
            }
        }
    }
    out
}

/// Names a scope-introducing node makes visible to the code inside it.
pub fn scope_bindings<'a>(scope: SyntaxNode<'a>) -> Vec<Binding<'a>> {
    match scope.kind() {
        SyntaxKind::Lambda | SyntaxKind::CaseBranch => {
            let mut out = Vec::new();
            for pattern in scope.child_nodes().filter(|c| c.kind().is_pattern()) {
                collect_pattern(pattern, &mut out);
            }
            out
        }
        SyntaxKind::LetIn => let_bindings(scope),
        SyntaxKind::ValueDeclaration => {
            let mut out = Vec::new();
            for param in ast::declaration_params(scope) {
                collect_pattern(param, &mut out);
            }
            out
        }
        _ => Vec::new(),
    }
}

/// Nearest enclosing local binding of `name` visible at `node`.
pub fn find_local<'a>(node: SyntaxNode<'a>, name: &str) -> Option<Binding<'a>> {
    node.ancestors()
        .skip(1)
        .find_map(|scope| scope_bindings(scope).into_iter().find(|b| b.name == name))
}

/// Every local binding visible at `node`, nearest first, without shadowed
/// duplicates.
pub fn visible_locals<'a>(node: SyntaxNode<'a>) -> Vec<Binding<'a>> {
    let mut out: Vec<Binding<'a>> = Vec::new();
    for scope in node.ancestors() {
        for binding in scope_bindings(scope) {
            if !out.iter().any(|b| b.name == binding.name) {
                out.push(binding);
            }
        }
    }
    out
}

/// Binding declared by `token` when it is the declaring occurrence of a
/// pattern variable, `as` alias or record pattern field.
pub fn binding_at<'a>(token: SyntaxNode<'a>) -> Option<Binding<'a>> {
    let parent = token.parent()?;
    match parent.kind() {
        SyntaxKind::VarPattern => Some(Binding {
            name: token.text(),
            node: parent,
            name_range: token.range(),
        }),
        SyntaxKind::AsPattern | SyntaxKind::RecordPattern
            if token.kind() == SyntaxKind::LowerIdent =>
        {
            Some(Binding::token(token))
        }
        _ => None,
    }
}
