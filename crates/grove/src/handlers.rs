//
// handlers.rs
//
// LSP request handlers over a read-locked WorldState
//

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::OnceLock;

use regex::Regex;
use tower_lsp::lsp_types::{
    CodeActionOrCommand, CodeActionResponse, CompletionItem, CompletionItemKind,
    CompletionResponse, Diagnostic, DocumentSymbol, DocumentSymbolResponse,
    GotoDefinitionResponse, Hover, HoverContents, Location, MarkupContent, MarkupKind, Position,
    PrepareRenameResponse, TextEdit, Url, WorkspaceEdit,
};

use crate::fixes::FixRegistry;
use crate::forest::SourceFile;
use crate::resolve::symbol::{ReferenceKind, Symbol, SymbolKind};
use crate::resolve::Resolver;
use crate::state::WorldState;
use crate::syntax::{SyntaxKind, SyntaxNode};
use crate::types::TypeChecker;

/// Run a handler body, turning a panic into an empty result.
pub fn guarded<T>(name: &str, f: impl FnOnce() -> Option<T>) -> Option<T> {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            log::error!("{} handler panicked: {}", name, message);
            None
        }
    }
}

fn location_of(state: &WorldState, symbol: &Symbol) -> Option<Location> {
    let file = state.forest.get_by_uri(&symbol.uri)?;
    Some(Location::new(
        symbol.uri.clone(),
        file.tree.lsp_range(symbol.name_range),
    ))
}

// ============================================================================
// Navigation
// ============================================================================

pub fn goto_definition(
    state: &WorldState,
    uri: &Url,
    position: Position,
) -> Option<GotoDefinitionResponse> {
    let resolver = Resolver::new(&state.forest);
    let symbol = resolver.resolve_definition(uri, position)?;
    log::trace!("definition of {} -> {}", symbol.name, symbol.uri);
    location_of(state, &symbol).map(GotoDefinitionResponse::Scalar)
}

pub fn references(
    state: &WorldState,
    uri: &Url,
    position: Position,
    include_declaration: bool,
) -> Option<Vec<Location>> {
    let resolver = Resolver::new(&state.forest);
    let symbol = resolver.resolve_definition(uri, position)?;
    let locations = resolver
        .find_references(&symbol)
        .into_iter()
        .filter(|r| include_declaration || r.kind != ReferenceKind::Declaration)
        .filter_map(|r| {
            let file = state.forest.get_by_uri(&r.uri)?;
            Some(Location::new(r.uri, file.tree.lsp_range(r.range)))
        })
        .collect();
    Some(locations)
}

// ============================================================================
// Hover
// ============================================================================

/// Signature line shown for a symbol.
fn signature(checker: &TypeChecker<'_>, symbol: &Symbol, context: &Url) -> String {
    let ty = checker.symbol_type(symbol);
    let typed = |prefix: &str| match &ty {
        Some(ty) => format!("{}{} : {}", prefix, symbol.name, checker.type_to_string(ty, context)),
        None => format!("{}{}", prefix, symbol.name),
    };
    match symbol.kind {
        SymbolKind::Function | SymbolKind::UnionConstructor | SymbolKind::Field => typed(""),
        SymbolKind::Operator => match &ty {
            Some(ty) => format!("({}) : {}", symbol.name, checker.type_to_string(ty, context)),
            None => format!("({})", symbol.name),
        },
        SymbolKind::UnionType => format!("type {}", symbol.name),
        SymbolKind::TypeAlias => format!("type alias {}", symbol.name),
        SymbolKind::Module => format!("module {}", symbol.name),
        SymbolKind::TypeVariable => symbol.name.clone(),
    }
}

pub fn hover(state: &WorldState, uri: &Url, position: Position) -> Option<Hover> {
    let file = state.forest.get_by_uri(uri)?;
    let offset = file.tree.offset(position);
    let token = file.tree.token_at(offset)?;
    let checker = TypeChecker::new(&state.forest);
    let symbol = checker.resolver().resolve_token(file, token)?;

    let mut value = format!("```elm\n{}\n```", signature(&checker, &symbol, uri));
    if !symbol.local && symbol.kind != SymbolKind::Module {
        value.push_str(&format!("\n\n*Defined in* `{}`", symbol.module));
    }
    Some(Hover {
        contents: HoverContents::Markup(MarkupContent {
            kind: MarkupKind::Markdown,
            value,
        }),
        range: Some(token.lsp_range()),
    })
}

// ============================================================================
// Rename
// ============================================================================

fn is_valid_name(kind: SymbolKind, name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    let rest_ok = chars.all(|c| c.is_alphanumeric() || c == '_');
    let first_ok = match kind {
        SymbolKind::Function | SymbolKind::Field | SymbolKind::TypeVariable => {
            first.is_lowercase()
        }
        SymbolKind::UnionType | SymbolKind::TypeAlias | SymbolKind::UnionConstructor => {
            first.is_uppercase()
        }
        SymbolKind::Operator | SymbolKind::Module => false,
    };
    first_ok && rest_ok && crate::syntax::kind::keyword(name).is_none()
}

/// Symbol under the cursor when it may be renamed: declared in an editable
/// file and not an operator or module.
fn renameable<'a>(
    resolver: &Resolver<'a>,
    file: &'a SourceFile,
    position: Position,
) -> Option<(Symbol, SyntaxNode<'a>)> {
    let token = file.tree.token_at(file.tree.offset(position))?;
    let symbol = resolver.resolve_token(file, token)?;
    if matches!(symbol.kind, SymbolKind::Operator | SymbolKind::Module) {
        return None;
    }
    let declaring = resolver.forest().get_by_uri(&symbol.uri)?;
    if !declaring.writeable {
        return None;
    }
    Some((symbol, token))
}

pub fn prepare_rename(
    state: &WorldState,
    uri: &Url,
    position: Position,
) -> Option<PrepareRenameResponse> {
    let file = state.forest.get_by_uri(uri)?;
    let resolver = Resolver::new(&state.forest);
    let (_, token) = renameable(&resolver, file, position)?;
    Some(PrepareRenameResponse::Range(token.lsp_range()))
}

pub fn rename(
    state: &WorldState,
    uri: &Url,
    position: Position,
    new_name: &str,
) -> Option<WorkspaceEdit> {
    let file = state.forest.get_by_uri(uri)?;
    let resolver = Resolver::new(&state.forest);
    let (symbol, _) = renameable(&resolver, file, position)?;
    if !is_valid_name(symbol.kind, new_name) {
        log::debug!("Rejected rename of {} to {:?}", symbol.name, new_name);
        return None;
    }
    let mut changes: HashMap<Url, Vec<TextEdit>> = HashMap::new();
    for reference in resolver.find_references(&symbol) {
        let Some(target) = state.forest.get_by_uri(&reference.uri) else {
            continue;
        };
        if !target.writeable {
            continue;
        }
        changes
            .entry(reference.uri)
            .or_default()
            .push(TextEdit::new(target.tree.lsp_range(reference.range), new_name.to_string()));
    }
    Some(WorkspaceEdit {
        changes: Some(changes),
        ..Default::default()
    })
}

// ============================================================================
// Completion
// ============================================================================

/// `Html.Attributes.cl|` splits into the qualifier and the partial name.
fn qualified_prefix(line: &str) -> Option<(&str, &str)> {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    let pattern = PATTERN.get_or_init(|| {
        Regex::new(r"(?:^|[^\w.])((?:[A-Z]\w*\.)*[A-Z]\w*)\.(\w*)$")
            .expect("completion pattern is valid")
    });
    let caps = pattern.captures(line)?;
    Some((caps.get(1)?.as_str(), caps.get(2)?.as_str()))
}

fn completion_kind(kind: SymbolKind) -> CompletionItemKind {
    match kind {
        SymbolKind::Function => CompletionItemKind::FUNCTION,
        SymbolKind::UnionType => CompletionItemKind::ENUM,
        SymbolKind::TypeAlias => CompletionItemKind::STRUCT,
        SymbolKind::UnionConstructor => CompletionItemKind::ENUM_MEMBER,
        SymbolKind::Operator => CompletionItemKind::OPERATOR,
        SymbolKind::Module => CompletionItemKind::MODULE,
        SymbolKind::TypeVariable => CompletionItemKind::TYPE_PARAMETER,
        SymbolKind::Field => CompletionItemKind::FIELD,
    }
}

fn completion_item(checker: &TypeChecker<'_>, symbol: &Symbol, context: &Url) -> CompletionItem {
    let detail = match symbol.kind {
        SymbolKind::Function | SymbolKind::UnionConstructor => checker
            .symbol_type(symbol)
            .map(|ty| checker.type_to_string(&ty, context)),
        _ => None,
    };
    CompletionItem {
        label: symbol.name.clone(),
        kind: Some(completion_kind(symbol.kind)),
        detail,
        ..Default::default()
    }
}

pub fn completion(state: &WorldState, uri: &Url, position: Position) -> Option<CompletionResponse> {
    let file = state.forest.get_by_uri(uri)?;
    let offset = file.tree.offset(position);
    let text = file.text();
    let line_start = text[..offset as usize].rfind('\n').map(|i| i + 1).unwrap_or(0);
    let line = &text[line_start..offset as usize];
    let checker = TypeChecker::new(&state.forest);
    let resolver = checker.resolver();

    let items: Vec<CompletionItem> = match qualified_prefix(line) {
        Some((qualifier, _)) => resolver
            .qualified_members(file, qualifier)
            .iter()
            .map(|s| completion_item(&checker, s, uri))
            .collect(),
        None => {
            let mut items: Vec<CompletionItem> = resolver
                .visible_values(file, offset)
                .iter()
                .map(|s| completion_item(&checker, s, uri))
                .collect();
            for import in resolver.qualifiers(file) {
                items.push(CompletionItem {
                    label: import.qualifier.clone(),
                    kind: Some(CompletionItemKind::MODULE),
                    detail: Some(import.module.clone()),
                    ..Default::default()
                });
            }
            items
        }
    };
    log::trace!("completion at {}:{:?}: {} items", uri, position, items.len());
    Some(CompletionResponse::Array(items))
}

// ============================================================================
// Code actions
// ============================================================================

pub fn code_action(
    state: &WorldState,
    fixes: &FixRegistry,
    uri: &Url,
    diagnostics: &[Diagnostic],
) -> Option<CodeActionResponse> {
    let actions = fixes.code_actions(&state.forest, uri, diagnostics);
    if actions.is_empty() {
        return None;
    }
    Some(
        actions
            .into_iter()
            .map(CodeActionOrCommand::CodeAction)
            .collect(),
    )
}

// ============================================================================
// Document symbols
// ============================================================================

#[allow(deprecated)]
fn document_symbol_of(
    checker: &TypeChecker<'_>,
    symbol: &Symbol,
    file: &SourceFile,
    children: Option<Vec<DocumentSymbol>>,
) -> DocumentSymbol {
    let detail = match symbol.kind {
        SymbolKind::Function => checker
            .symbol_type(symbol)
            .map(|ty| checker.type_to_string(&ty, &file.uri)),
        _ => None,
    };
    DocumentSymbol {
        name: symbol.name.clone(),
        detail,
        kind: symbol.kind.to_lsp(),
        tags: None,
        deprecated: None,
        range: file.tree.lsp_range(symbol.range),
        selection_range: file.tree.lsp_range(symbol.name_range),
        children,
    }
}

pub fn document_symbol(state: &WorldState, uri: &Url) -> Option<DocumentSymbolResponse> {
    let file = state.forest.get_by_uri(uri)?;
    let checker = TypeChecker::new(&state.forest);
    let resolver = checker.resolver();
    let mut symbols = Vec::new();
    for item in file.tree.root().child_nodes() {
        if !matches!(
            item.kind(),
            SyntaxKind::ValueDeclaration
                | SyntaxKind::TypeDeclaration
                | SyntaxKind::TypeAliasDeclaration
                | SyntaxKind::PortAnnotation
                | SyntaxKind::InfixDeclaration
        ) {
            continue;
        }
        let Some(symbol) = resolver.declaration_symbol(file, item) else {
            continue;
        };
        let children = (item.kind() == SyntaxKind::TypeDeclaration).then(|| {
            item.children_of(SyntaxKind::UnionVariant)
                .filter_map(|v| resolver.declaration_symbol(file, v))
                .map(|v| document_symbol_of(&checker, &v, file, None))
                .collect()
        });
        symbols.push(document_symbol_of(&checker, &symbol, file, children));
    }
    Some(DocumentSymbolResponse::Nested(symbols))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_uri(name: &str) -> Url {
        Url::parse(&format!("file:///project/src/{}", name)).unwrap()
    }

    fn state_with(files: &[(&str, &str)]) -> WorldState {
        let mut state = WorldState::new();
        for (name, text) in files {
            state.open_document(test_uri(name), text, None);
        }
        state
    }

    const MAIN: &str = "module Main exposing (main)\n\nimport Util exposing (double)\n\nmain : Int\nmain =\n    double 21 + Util.triple 1\n";
    const UTIL: &str = "module Util exposing (double, triple)\n\ndouble : Int -> Int\ndouble n =\n    n * 2\n\ntriple n =\n    n * 3\n";

    #[test]
    fn test_goto_definition_across_modules() {
        let state = state_with(&[("Main.elm", MAIN), ("Util.elm", UTIL)]);
        let Some(GotoDefinitionResponse::Scalar(location)) =
            goto_definition(&state, &test_uri("Main.elm"), Position::new(6, 6))
        else {
            panic!("expected a definition");
        };
        assert_eq!(location.uri, test_uri("Util.elm"));
        assert_eq!(location.range.start, Position::new(3, 0));
    }

    #[test]
    fn test_references_include_declaration_flag() {
        let state = state_with(&[("Main.elm", MAIN), ("Util.elm", UTIL)]);
        let uri = test_uri("Util.elm");
        let with = references(&state, &uri, Position::new(3, 0), true).unwrap();
        let without = references(&state, &uri, Position::new(3, 0), false).unwrap();
        // declaration, annotation, module exposing, import exposing, call
        assert_eq!(with.len(), 5);
        assert_eq!(without.len(), 4);
        assert!(without.iter().all(|l| l.range.start != Position::new(3, 0) || l.uri != uri));
    }

    #[test]
    fn test_hover_shows_type_and_module() {
        let state = state_with(&[("Main.elm", MAIN), ("Util.elm", UTIL)]);
        let hover = hover(&state, &test_uri("Main.elm"), Position::new(6, 22)).unwrap();
        let HoverContents::Markup(markup) = hover.contents else {
            panic!("expected markup");
        };
        assert_eq!(markup.value, "```elm\ntriple : number -> number\n```\n\n*Defined in* `Util`");
    }

    #[test]
    fn test_rename_updates_every_file() {
        let state = state_with(&[("Main.elm", MAIN), ("Util.elm", UTIL)]);
        let edit = rename(&state, &test_uri("Main.elm"), Position::new(6, 6), "twice").unwrap();
        let changes = edit.changes.unwrap();
        assert_eq!(changes[&test_uri("Util.elm")].len(), 3);
        assert_eq!(changes[&test_uri("Main.elm")].len(), 2);
        assert!(changes.values().flatten().all(|e| e.new_text == "twice"));
    }

    #[test]
    fn test_rename_rejects_bad_names_and_core_symbols() {
        let state = state_with(&[("Main.elm", MAIN), ("Util.elm", UTIL)]);
        let uri = test_uri("Main.elm");
        assert!(rename(&state, &uri, Position::new(6, 6), "Twice").is_none());
        assert!(rename(&state, &uri, Position::new(6, 6), "let").is_none());
        // `Int` lives in a read-only core module
        assert!(prepare_rename(&state, &uri, Position::new(4, 7)).is_none());
        assert!(prepare_rename(&state, &uri, Position::new(6, 6)).is_some());
    }

    #[test]
    fn test_completion_unqualified() {
        let text = "module Main exposing (main)\n\nimport Util exposing (double)\n\nmain =\n    let\n        local = 1\n    in\n    loc\n";
        let state = state_with(&[("Main.elm", text), ("Util.elm", UTIL)]);
        let Some(CompletionResponse::Array(items)) =
            completion(&state, &test_uri("Main.elm"), Position::new(8, 7))
        else {
            panic!("expected items");
        };
        let labels: Vec<&str> = items.iter().map(|i| i.label.as_str()).collect();
        assert!(labels.contains(&"local"));
        assert!(labels.contains(&"double"));
        assert!(labels.contains(&"Util"));
        assert!(!labels.contains(&"triple"));
    }

    #[test]
    fn test_completion_after_qualifier() {
        let text = "module Main exposing (main)\n\nimport Util\n\nmain =\n    Util.\n";
        let state = state_with(&[("Main.elm", text), ("Util.elm", UTIL)]);
        let Some(CompletionResponse::Array(items)) =
            completion(&state, &test_uri("Main.elm"), Position::new(5, 9))
        else {
            panic!("expected items");
        };
        let labels: Vec<&str> = items.iter().map(|i| i.label.as_str()).collect();
        assert_eq!(labels, vec!["double", "triple"]);
        assert_eq!(items[0].detail.as_deref(), Some("Int -> Int"));
    }

    #[test]
    fn test_qualified_prefix() {
        assert_eq!(qualified_prefix("    Html.Attributes.cl"), Some(("Html.Attributes", "cl")));
        assert_eq!(qualified_prefix("x = List."), Some(("List", "")));
        assert_eq!(qualified_prefix("model.name"), None);
        assert_eq!(qualified_prefix("    foo"), None);
    }

    #[test]
    fn test_document_symbols_nest_constructors() {
        let text = "module Main exposing (..)\n\ntype Msg\n    = Inc\n    | Dec\n\ntype alias Model =\n    { count : Int }\n\nupdate : Msg -> Int -> Int\nupdate msg count =\n    count\n";
        let state = state_with(&[("Main.elm", text)]);
        let Some(DocumentSymbolResponse::Nested(symbols)) =
            document_symbol(&state, &test_uri("Main.elm"))
        else {
            panic!("expected nested symbols");
        };
        let names: Vec<&str> = symbols.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Msg", "Model", "update"]);
        let children = symbols[0].children.as_ref().unwrap();
        assert_eq!(children.len(), 2);
        assert_eq!(children[1].name, "Dec");
        assert_eq!(symbols[2].detail.as_deref(), Some("Msg -> Int -> Int"));
    }

    #[test]
    fn test_guard_turns_panic_into_none() {
        let result: Option<u32> = guarded("test", || panic!("boom"));
        assert_eq!(result, None);
        assert_eq!(guarded("test", || Some(1)), Some(1));
    }
}
