//
// fixes.rs
//
// Quick fixes keyed by diagnostic code
//

use std::collections::HashMap;

use tower_lsp::lsp_types::{
    CodeAction, CodeActionKind, Diagnostic, TextEdit, Url, WorkspaceEdit,
};

use crate::diagnostics::{code_of, lint, SOURCE};
use crate::forest::{Forest, SourceFile};
use crate::syntax::ast;
use crate::syntax::{SyntaxKind, SyntaxNode, TextRange};
use crate::types::TypeChecker;

/// What a fix provider gets to look at.
pub struct FixContext<'a> {
    pub forest: &'a Forest,
    pub file: &'a SourceFile,
    pub diagnostic: &'a Diagnostic,
}

impl<'a> FixContext<'a> {
    fn range(&self) -> TextRange {
        let tree = &self.file.tree;
        TextRange::new(
            tree.offset(self.diagnostic.range.start),
            tree.offset(self.diagnostic.range.end),
        )
    }

    /// Innermost node of one of `kinds` covering the diagnostic.
    fn node(&self, kinds: &[SyntaxKind]) -> Option<SyntaxNode<'a>> {
        self.file
            .tree
            .covering_element(self.range())
            .ancestors()
            .find(|n| kinds.contains(&n.kind()))
    }

    fn edit(&self, range: TextRange, new_text: impl Into<String>) -> TextEdit {
        TextEdit::new(self.file.tree.lsp_range(range), new_text.into())
    }
}

/// A titled set of edits to the diagnosed file.
#[derive(Debug, Clone, PartialEq)]
pub struct Fix {
    pub title: String,
    pub edits: Vec<TextEdit>,
}

pub type FixProvider = fn(&FixContext<'_>) -> Option<Fix>;

/// Fix providers by diagnostic code. Built once at startup and shared.
#[derive(Default)]
pub struct FixRegistry {
    providers: HashMap<&'static str, FixProvider>,
}

impl FixRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in fix.
    pub fn with_builtin_fixes() -> Self {
        let mut registry = Self::new();
        registry.register(lint::UNUSED_IMPORT, remove_import);
        registry.register(lint::UNUSED_IMPORT_ALIAS, remove_alias);
        registry.register(lint::UNUSED_IMPORTED_VALUE, remove_exposed_item);
        registry.register(lint::MISSING_TYPE_ANNOTATION, add_annotation);
        registry.register(lint::BOOL_CASE, case_to_if);
        registry.register(lint::REDUNDANT_IF, simplify_if);
        registry
    }

    pub fn register(&mut self, code: &'static str, provider: FixProvider) {
        self.providers.insert(code, provider);
    }

    pub fn has_fix(&self, code: &str) -> bool {
        self.providers.contains_key(code)
    }

    pub fn fix(&self, context: &FixContext<'_>) -> Option<Fix> {
        if context.diagnostic.source.as_deref() != Some(SOURCE) {
            return None;
        }
        let provider = self.providers.get(code_of(context.diagnostic)?)?;
        provider(context)
    }

    /// Quick fixes for the given diagnostics of `uri`.
    pub fn code_actions(
        &self,
        forest: &Forest,
        uri: &Url,
        diagnostics: &[Diagnostic],
    ) -> Vec<CodeAction> {
        let Some(file) = forest.get_by_uri(uri) else {
            return Vec::new();
        };
        let mut out = Vec::new();
        for diagnostic in diagnostics {
            let context = FixContext {
                forest,
                file,
                diagnostic,
            };
            let Some(fix) = self.fix(&context) else {
                continue;
            };
            let mut changes = HashMap::new();
            changes.insert(uri.clone(), fix.edits);
            out.push(CodeAction {
                title: fix.title,
                kind: Some(CodeActionKind::QUICKFIX),
                diagnostics: Some(vec![diagnostic.clone()]),
                edit: Some(WorkspaceEdit {
                    changes: Some(changes),
                    ..Default::default()
                }),
                is_preferred: Some(true),
                ..Default::default()
            });
        }
        out
    }
}

// ============================================================================
// Providers
// ============================================================================

/// End of the line holding `offset`, past its newline.
fn line_end(text: &str, offset: u32) -> u32 {
    match text[offset as usize..].find('\n') {
        Some(i) => offset + i as u32 + 1,
        None => text.len() as u32,
    }
}

/// Column of `offset` in bytes.
fn column(text: &str, offset: u32) -> usize {
    let start = text[..offset as usize].rfind('\n').map(|i| i + 1).unwrap_or(0);
    offset as usize - start
}

fn remove_import(context: &FixContext<'_>) -> Option<Fix> {
    let clause = context.node(&[SyntaxKind::ImportClause])?;
    let module = clause.child(SyntaxKind::ModuleName)?;
    let range = clause.range();
    let end = line_end(context.file.text(), range.end);
    Some(Fix {
        title: format!("Remove unused import `{}`", module.text()),
        edits: vec![context.edit(TextRange::new(range.start, end), "")],
    })
}

fn remove_alias(context: &FixContext<'_>) -> Option<Fix> {
    let alias = context.node(&[SyntaxKind::AsClause])?;
    let before = alias.prev_sibling()?;
    Some(Fix {
        title: "Remove unused alias".to_string(),
        edits: vec![context.edit(TextRange::new(before.range().end, alias.range().end), "")],
    })
}

fn remove_exposed_item(context: &FixContext<'_>) -> Option<Fix> {
    let item = context.node(&[
        SyntaxKind::ExposedValue,
        SyntaxKind::ExposedType,
        SyntaxKind::ExposedOperator,
    ])?;
    let list = item.parent()?;
    let items = list.child_nodes().count();
    let range = if items <= 1 {
        // the only item: drop the whole exposing clause
        let before = list.prev_sibling()?;
        TextRange::new(before.range().end, list.range().end)
    } else {
        match item.next_sibling() {
            Some(comma) if comma.kind() == SyntaxKind::Comma => {
                let next = comma.next_sibling()?;
                TextRange::new(item.range().start, next.range().start)
            }
            _ => {
                let comma = item.prev_sibling().filter(|c| c.kind() == SyntaxKind::Comma)?;
                TextRange::new(comma.range().start, item.range().end)
            }
        }
    };
    Some(Fix {
        title: format!("Remove `{}` from the exposing list", item.text()),
        edits: vec![context.edit(range, "")],
    })
}

fn add_annotation(context: &FixContext<'_>) -> Option<Fix> {
    let decl = context.node(&[SyntaxKind::ValueDeclaration])?;
    let name = ast::name_of(decl)?;
    let checker = TypeChecker::new(context.forest);
    let inference = checker.infer_declaration(&context.file.uri, decl.id())?;
    let ty = checker.type_to_string(&inference.ty, &context.file.uri);
    let annotation = format!("{} : {}", name, ty);
    let start = decl.range().start;
    let indent = " ".repeat(column(context.file.text(), start));
    Some(Fix {
        title: format!("Add type annotation `{}`", annotation),
        edits: vec![context.edit(
            TextRange::new(start, start),
            format!("{}\n{}", annotation, indent),
        )],
    })
}

fn case_to_if(context: &FixContext<'_>) -> Option<Fix> {
    let case = context.node(&[SyntaxKind::CaseOf])?;
    let subject = case.child_nodes().find(|c| c.kind().is_expression())?;
    let mut when_true = None;
    let mut when_false = None;
    let mut wildcard = None;
    for branch in case.children_of(SyntaxKind::CaseBranch) {
        let pattern = branch.child_nodes().find(|c| c.kind().is_pattern())?;
        let body = branch
            .child_nodes()
            .filter(|c| c.kind().is_expression())
            .last()?;
        let pattern = match pattern.kind() {
            SyntaxKind::ParenPattern => pattern.child_nodes().next()?,
            _ => pattern,
        };
        match pattern.kind() {
            SyntaxKind::WildcardPattern => wildcard = Some(body),
            SyntaxKind::ConstructorPattern => {
                let (_, name) = ast::qualified_parts(pattern);
                match name?.text() {
                    "True" => when_true = Some(body),
                    "False" => when_false = Some(body),
                    _ => return None,
                }
            }
            _ => return None,
        }
    }
    let when_true = when_true.or(wildcard)?;
    let when_false = when_false.or(wildcard)?;
    let text = context.file.text();
    let indent = " ".repeat(column(text, case.range().start));
    let replacement = format!(
        "if {} then\n{indent}    {}\n\n{indent}else\n{indent}    {}",
        subject.text(),
        when_true.text(),
        when_false.text(),
        indent = indent
    );
    Some(Fix {
        title: "Replace case with if-expression".to_string(),
        edits: vec![context.edit(case.range(), replacement)],
    })
}

fn simplify_if(context: &FixContext<'_>) -> Option<Fix> {
    let node = context.node(&[SyntaxKind::IfElse])?;
    let parts: Vec<SyntaxNode<'_>> = node.child_nodes().collect();
    let [condition, then, _] = parts.as_slice() else {
        return None;
    };
    let (_, then_name) = ast::qualified_parts(*then);
    let replacement = if then_name?.text() == "True" {
        condition.text().to_string()
    } else if matches!(
        condition.kind(),
        SyntaxKind::ValueRef | SyntaxKind::Parenthesized | SyntaxKind::FieldAccess
    ) {
        format!("not {}", condition.text())
    } else {
        format!("not ({})", condition.text())
    };
    Some(Fix {
        title: "Simplify if-expression".to_string(),
        edits: vec![context.edit(node.range(), replacement)],
    })
}
