//
// diagnostics/lint.rs
//
// Suggestions: unused imports and declarations, and code that has a
// simpler spelling
//

use std::collections::HashSet;

use tower_lsp::lsp_types::{Diagnostic, DiagnosticTag, NumberOrString};

use crate::forest::SourceFile;
use crate::resolve::scope;
use crate::resolve::{ImportEntry, Resolver, Symbol, SymbolKind};
use crate::syntax::ast::{self, ExposedItem, ExposedKind, Exposing};
use crate::syntax::{NodeId, SyntaxKind, SyntaxNode, TextRange};
use crate::types::TypeChecker;

use super::{DiagnosticsOptions, SOURCE};

pub const UNUSED_IMPORT: &str = "unused_import";
pub const UNUSED_IMPORT_ALIAS: &str = "unused_import_alias";
pub const UNUSED_IMPORTED_VALUE: &str = "unused_imported_value";
pub const UNUSED_TOP_LEVEL: &str = "unused_top_level";
pub const UNUSED_VALUE: &str = "unused_value";
pub const BOOL_CASE: &str = "bool_case";
pub const REDUNDANT_IF: &str = "redundant_if";
pub const MISSING_TYPE_ANNOTATION: &str = "missing_type_annotation";

pub const ALL_RULES: [&str; 8] = [
    UNUSED_IMPORT,
    UNUSED_IMPORT_ALIAS,
    UNUSED_IMPORTED_VALUE,
    UNUSED_TOP_LEVEL,
    UNUSED_VALUE,
    BOOL_CASE,
    REDUNDANT_IF,
    MISSING_TYPE_ANNOTATION,
];

/// Run every enabled rule over `file`. Results are ordered by position.
pub fn check<'a>(
    checker: &TypeChecker<'a>,
    file: &'a SourceFile,
    options: &DiagnosticsOptions,
) -> Vec<Diagnostic> {
    let resolver = checker.resolver();
    let mut lint = Lint {
        resolver,
        file,
        options,
        out: Vec::new(),
    };
    let usage = Usage::collect(resolver, file);
    lint.unused_imports(&usage);
    lint.unused_top_level();
    lint.unused_values(&usage);
    for node in file.tree.root().descendants() {
        match node.kind() {
            SyntaxKind::CaseOf => lint.bool_case(node),
            SyntaxKind::IfElse => lint.redundant_if(node),
            _ => {}
        }
    }
    lint.missing_annotations();

    let mut out = lint.out;
    out.sort_by_key(|d| (d.range.start.line, d.range.start.character));
    out
}

/// What the references of one file resolve to.
#[derive(Default)]
struct Usage {
    /// Import clauses whose qualifier some reference uses
    qualified: HashSet<NodeId>,
    /// Imported declarations referenced without a qualifier
    unqualified: Vec<Symbol>,
    /// Declaring nodes of locals that are referenced
    locals: HashSet<NodeId>,
}

impl Usage {
    fn collect<'a>(resolver: &Resolver<'a>, file: &'a SourceFile) -> Self {
        let mut usage = Usage::default();
        for node in file.tree.root().descendants() {
            if !matches!(
                node.kind(),
                SyntaxKind::ValueRef
                    | SyntaxKind::ConstructorRef
                    | SyntaxKind::ConstructorPattern
                    | SyntaxKind::TypeRef
                    | SyntaxKind::OperatorRef
            ) {
                continue;
            }
            let qualifier = match node.kind() {
                SyntaxKind::OperatorRef => None,
                _ => ast::qualifier_of(node),
            };
            if let Some(qualifier) = qualifier {
                if let Some(clause) = resolver
                    .import_for_qualifier(file, &qualifier)
                    .and_then(|import| import.clause)
                {
                    usage.qualified.insert(clause);
                }
                continue;
            }
            let Some(symbol) = resolver.resolve_reference(file, node) else {
                continue;
            };
            if symbol.local {
                usage.locals.insert(symbol.node);
            } else if symbol.uri != file.uri {
                usage.unqualified.push(symbol);
            }
        }
        usage
    }

    /// Whether some unqualified reference reached `item` of `module`.
    fn uses_item(&self, module: &str, item: &ExposedItem) -> bool {
        self.unqualified
            .iter()
            .filter(|s| s.module == module)
            .any(|s| match &item.kind {
                ExposedKind::Value => s.kind == SymbolKind::Function && s.name == item.name,
                ExposedKind::Operator => s.kind == SymbolKind::Operator && s.name == item.name,
                ExposedKind::Type { constructors } => {
                    (matches!(s.kind, SymbolKind::UnionType | SymbolKind::TypeAlias)
                        && s.name == item.name)
                        || (*constructors
                            && s.kind == SymbolKind::UnionConstructor
                            && s.parent.as_deref() == Some(item.name.as_str()))
                }
            })
    }

    fn uses_module(&self, module: &str) -> bool {
        self.unqualified.iter().any(|s| s.module == module)
    }
}

struct Lint<'r, 'a> {
    resolver: &'r Resolver<'a>,
    file: &'a SourceFile,
    options: &'r DiagnosticsOptions,
    out: Vec<Diagnostic>,
}

impl<'r, 'a> Lint<'r, 'a> {
    fn enabled(&self, code: &str) -> bool {
        !self.options.disabled_rules.contains(code)
    }

    fn report(&mut self, code: &str, range: TextRange, message: String, unnecessary: bool) {
        if !self.enabled(code) {
            return;
        }
        self.out.push(Diagnostic {
            range: self.file.tree.lsp_range(range),
            severity: Some(self.options.suggestion_severity),
            code: Some(NumberOrString::String(code.to_string())),
            source: Some(SOURCE.to_string()),
            message,
            tags: unnecessary.then(|| vec![DiagnosticTag::UNNECESSARY]),
            ..Default::default()
        });
    }

    // ========================================================================
    // Imports
    // ========================================================================

    fn unused_imports(&mut self, usage: &Usage) {
        let Some(scope) = self.resolver.file_scope(&self.file.uri) else {
            return;
        };
        for import in scope.explicit_imports() {
            self.unused_import(import, usage);
        }
    }

    fn unused_import(&mut self, import: &ImportEntry, usage: &Usage) {
        let (Some(clause), Some(range)) = (import.clause, import.range) else {
            return;
        };
        let known = self.resolver.forest().get_by_module_name(&import.module).is_some();
        let qualified = usage.qualified.contains(&clause);
        let unused_items: Vec<&ExposedItem> = match &import.exposing {
            Some(Exposing::Items(items)) if known => items
                .iter()
                .filter(|item| !usage.uses_item(&import.module, item))
                .collect(),
            _ => Vec::new(),
        };
        let exposed_used = match &import.exposing {
            None => false,
            // nothing is known about what an unknown module exposes
            Some(_) if !known => true,
            Some(Exposing::All) => usage.uses_module(&import.module),
            Some(Exposing::Items(items)) => unused_items.len() < items.len(),
        };

        if !qualified && !exposed_used {
            self.report(
                UNUSED_IMPORT,
                range,
                format!("Unused import `{}`", import.module),
                true,
            );
            return;
        }
        if !qualified && import.qualifier != import.module {
            let alias = self
                .file
                .tree
                .node(clause)
                .child(SyntaxKind::AsClause)
                .map(|a| a.range());
            if let Some(alias) = alias {
                self.report(
                    UNUSED_IMPORT_ALIAS,
                    alias,
                    format!("Unused import alias `{}`", import.qualifier),
                    true,
                );
            }
        }
        for item in unused_items {
            let what = match item.kind {
                ExposedKind::Type { .. } => "type",
                ExposedKind::Operator => "operator",
                ExposedKind::Value => "value",
            };
            self.report(
                UNUSED_IMPORTED_VALUE,
                item.range,
                format!("Unused imported {} `{}`", what, item.name),
                true,
            );
        }
    }

    // ========================================================================
    // Declarations
    // ========================================================================

    fn unused_top_level(&mut self) {
        if !self.enabled(UNUSED_TOP_LEVEL) {
            return;
        }
        let file = self.file;
        for item in file.tree.root().child_nodes() {
            let Some(name) = ast::name_token(item) else {
                continue;
            };
            let exposed = match item.kind() {
                SyntaxKind::ValueDeclaration => {
                    name.text() == "main" || file.exposing.exposes_value(name.text())
                }
                SyntaxKind::TypeDeclaration | SyntaxKind::TypeAliasDeclaration => {
                    file.exposing.exposes_type(name.text())
                }
                _ => continue,
            };
            if exposed {
                continue;
            }
            let mut declared: Vec<Symbol> =
                self.resolver.declaration_symbol(file, item).into_iter().collect();
            if item.kind() == SyntaxKind::TypeDeclaration {
                declared.extend(
                    item.children_of(SyntaxKind::UnionVariant)
                        .filter_map(|v| self.resolver.declaration_symbol(file, v)),
                );
            }
            let used = declared.iter().any(|symbol| {
                self.resolver
                    .find_usages(symbol)
                    .iter()
                    .any(|r| r.uri != file.uri || !item.range().contains_range(r.range))
            });
            if !used {
                let what = match item.kind() {
                    SyntaxKind::ValueDeclaration => "value",
                    _ => "type",
                };
                self.report(
                    UNUSED_TOP_LEVEL,
                    name.range(),
                    format!(
                        "Top-level {} `{}` is not exposed and never used",
                        what,
                        name.text()
                    ),
                    true,
                );
            }
        }
    }

    fn unused_values(&mut self, usage: &Usage) {
        if !self.enabled(UNUSED_VALUE) {
            return;
        }
        for node in self.file.tree.root().descendants() {
            if !matches!(
                node.kind(),
                SyntaxKind::ValueDeclaration
                    | SyntaxKind::Lambda
                    | SyntaxKind::CaseBranch
                    | SyntaxKind::LetIn
            ) {
                continue;
            }
            for binding in scope::scope_bindings(node) {
                if binding.name.starts_with('_') || usage.locals.contains(&binding.node.id()) {
                    continue;
                }
                self.report(
                    UNUSED_VALUE,
                    binding.name_range,
                    format!("`{}` is never used", binding.name),
                    true,
                );
            }
        }
    }

    fn missing_annotations(&mut self) {
        for decl in self.file.tree.root().children_of(SyntaxKind::ValueDeclaration) {
            let Some(name) = ast::name_token(decl) else {
                continue;
            };
            if ast::annotation_for(decl).is_none() {
                self.report(
                    MISSING_TYPE_ANNOTATION,
                    name.range(),
                    format!("Top-level value `{}` has no type annotation", name.text()),
                    false,
                );
            }
        }
    }

    // ========================================================================
    // Simplifications
    // ========================================================================

    /// `case b of True -> x; False -> y`
    fn bool_case(&mut self, case: SyntaxNode<'a>) {
        let branches: Vec<SyntaxNode<'a>> = case.children_of(SyntaxKind::CaseBranch).collect();
        let [first, second] = branches.as_slice() else {
            return;
        };
        let pattern = |branch: &SyntaxNode<'a>| branch.child_nodes().find(|c| c.kind().is_pattern());
        let (Some(first), Some(second)) = (pattern(first), pattern(second)) else {
            return;
        };
        let Some(first) = self.bool_pattern(first) else {
            return;
        };
        let complete = second.kind() == SyntaxKind::WildcardPattern
            || self.bool_pattern(second) == Some(!first);
        if !complete {
            return;
        }
        let end = case
            .child(SyntaxKind::OfKw)
            .map(|of| of.range().end)
            .unwrap_or(case.range().end);
        self.report(
            BOOL_CASE,
            TextRange::new(case.range().start, end),
            "Use an if-expression instead of a case on a Bool".to_string(),
            false,
        );
    }

    fn bool_pattern(&self, pattern: SyntaxNode<'a>) -> Option<bool> {
        let pattern = match pattern.kind() {
            SyntaxKind::ParenPattern => pattern.child_nodes().next()?,
            _ => pattern,
        };
        if pattern.kind() != SyntaxKind::ConstructorPattern
            || pattern.child_nodes().next().is_some()
        {
            return None;
        }
        self.bool_constructor(pattern)
    }

    /// `True`/`False` of `Basics` referenced by `node`.
    fn bool_constructor(&self, node: SyntaxNode<'a>) -> Option<bool> {
        let symbol = self.resolver.resolve_reference(self.file, node)?;
        if symbol.module != "Basics" || symbol.kind != SymbolKind::UnionConstructor {
            return None;
        }
        match symbol.name.as_str() {
            "True" => Some(true),
            "False" => Some(false),
            _ => None,
        }
    }

    /// `if c then True else False` and its negation.
    fn redundant_if(&mut self, node: SyntaxNode<'a>) {
        let parts: Vec<SyntaxNode<'a>> = node.child_nodes().collect();
        let [_, then, otherwise] = parts.as_slice() else {
            return;
        };
        let branch = |n: &SyntaxNode<'a>| {
            if n.kind() == SyntaxKind::ConstructorRef {
                self.bool_constructor(*n)
            } else {
                None
            }
        };
        let message = match (branch(then), branch(otherwise)) {
            (Some(true), Some(false)) => "Redundant if-expression: use the condition itself",
            (Some(false), Some(true)) => "Redundant if-expression: use `not` on the condition",
            _ => return,
        };
        self.report(REDUNDANT_IF, node.range(), message.to_string(), false);
    }
}
