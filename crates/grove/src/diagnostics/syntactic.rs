//
// diagnostics/syntactic.rs
//
// Syntax errors: one diagnostic per error or missing node
//

use tower_lsp::lsp_types::{Diagnostic, DiagnosticSeverity, NumberOrString};

use crate::forest::SourceFile;
use crate::syntax::{SyntaxKind, SyntaxNode};

use super::SOURCE;

pub const CODE: &str = "syntax_error";

/// Longest excerpt of unparsed text quoted in a message.
const EXCERPT_CHARS: usize = 24;

pub fn check(file: &SourceFile) -> Vec<Diagnostic> {
    let mut out = Vec::new();
    for node in file.tree.root().descendants() {
        let message = match node.kind() {
            SyntaxKind::Error if !inside_error(node) => unexpected(node),
            SyntaxKind::ErrorToken if !inside_error(node) => {
                format!("Syntax error: unexpected character `{}`", node.text())
            }
            SyntaxKind::Missing => missing(node),
            _ => continue,
        };
        out.push(Diagnostic {
            range: node.lsp_range(),
            severity: Some(DiagnosticSeverity::ERROR),
            code: Some(NumberOrString::String(CODE.to_string())),
            source: Some(SOURCE.to_string()),
            message,
            ..Default::default()
        });
    }
    out
}

fn inside_error(node: SyntaxNode<'_>) -> bool {
    node.ancestors().skip(1).any(|n| n.kind() == SyntaxKind::Error)
}

fn unexpected(node: SyntaxNode<'_>) -> String {
    let context = node
        .parent()
        .filter(|p| p.kind() != SyntaxKind::File)
        .map(|p| format!(" in {}", p.kind().describe()))
        .unwrap_or_default();
    let text = node.text().trim();
    if text.is_empty() {
        return format!("Syntax error{}", context);
    }
    let mut excerpt: String = text
        .lines()
        .next()
        .unwrap_or_default()
        .chars()
        .take(EXCERPT_CHARS)
        .collect();
    if excerpt.len() < text.len() {
        excerpt.push('…');
    }
    format!("Syntax error{}: unexpected `{}`", context, excerpt)
}

fn missing(node: SyntaxNode<'_>) -> String {
    let Some(parent) = node.parent() else {
        return "Missing expression".to_string();
    };
    let what = match parent.kind() {
        SyntaxKind::Lambda => "parameter",
        SyntaxKind::TypeAnnotation
        | SyntaxKind::PortAnnotation
        | SyntaxKind::TypeAliasDeclaration
        | SyntaxKind::FieldType => "type",
        SyntaxKind::CaseBranch if node.next_sibling().is_some() => "pattern",
        SyntaxKind::ImportClause | SyntaxKind::ModuleDeclaration => "module name",
        _ => "expression",
    };
    format!("Missing {} in {}", what, parent.kind().describe())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forest::Forest;
    use tower_lsp::lsp_types::Url;

    fn diagnostics(text: &str) -> Vec<Diagnostic> {
        let mut forest = Forest::new();
        let uri = Url::parse("file:///p/src/Main.elm").unwrap();
        forest.set_text(uri.clone(), true, true, text);
        check(forest.get_by_uri(&uri).unwrap())
    }

    #[test]
    fn test_clean_file_has_no_syntax_errors() {
        assert!(diagnostics("module Main exposing (..)\n\nx = 1\n").is_empty());
    }

    #[test]
    fn test_missing_body() {
        let diags = diagnostics("x =\ny = 2\n");
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].message, "Missing expression in declaration");
        assert_eq!(diags[0].range.start.line, 0);
        assert_eq!(diags[0].severity, Some(DiagnosticSeverity::ERROR));
    }

    #[test]
    fn test_trailing_tokens_reported_once() {
        let diags = diagnostics("x = 1 ) )\n");
        assert_eq!(diags.len(), 1);
        assert!(diags[0].message.starts_with("Syntax error in declaration: unexpected `)"));
    }

    #[test]
    fn test_errors_in_separate_chunks() {
        let diags = diagnostics("a = (\nb = 1\n)\nc = 2\n");
        assert!(diags.iter().any(|d| d.range.start.line == 0));
        assert!(diags.iter().any(|d| d.range.start.line == 2));
        assert!(!diags.iter().any(|d| d.range.start.line == 1 || d.range.start.line == 3));
        assert!(diags
            .iter()
            .all(|d| d.code == Some(NumberOrString::String(CODE.to_string()))));
    }
}
