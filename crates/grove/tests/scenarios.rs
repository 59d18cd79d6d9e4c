// scenarios.rs - End-to-end behaviour of resolution, inference and
// diagnostics over small multi-file workspaces.
//
// Run with: cargo test --features test-support --test scenarios

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use grove::backend::forward_tree_changes;
use grove::diagnostics::lint;
use grove::diagnostics::scheduler::{DiagnosticsHost, DiagnosticsScheduler, SchedulerConfig};
use grove::diagnostics::{analyze, code_of, AnalyzedFile, DiagnosticKind, DiagnosticsOptions};
use grove::forest::ChangeSeq;
use grove::resolve::Resolver;
use grove::state::WorldState;
use grove::syntax::kind::SyntaxKind;
use grove::syntax::tree::GreenElement;
use grove::test_utils::fixture_workspace::{
    create_fixture_workspace, module_name, FixtureConfig,
};
use grove::types::Program;
use grove::workspace;
use proptest::prelude::*;
use tokio::sync::RwLock;
use tower_lsp::lsp_types::{
    Diagnostic, Position, Range, TextDocumentContentChangeEvent, Url,
};

fn test_uri(name: &str) -> Url {
    Url::parse(&format!("file:///project/src/{}", name)).unwrap()
}

fn world(files: &[(&str, &str)]) -> WorldState {
    let mut state = WorldState::new();
    for (name, text) in files {
        state.open_document(test_uri(name), text, None);
    }
    state
}

fn suggestions(state: &WorldState, name: &str, code: &str) -> Vec<Diagnostic> {
    analyze(&state.forest, &test_uri(name), &DiagnosticsOptions::default())
        .unwrap()
        .into_iter()
        .filter(|(kind, _)| *kind == DiagnosticKind::Suggestion)
        .flat_map(|(_, d)| d)
        .filter(|d| code_of(d) == Some(code))
        .collect()
}

// ============================================================================
// Resolution
// ============================================================================

#[test]
fn test_definition_of_imported_value() {
    let state = world(&[
        ("App.elm", "module App exposing (foo)\nfoo = \"\""),
        ("Main.elm", "import App exposing (foo)\nbar = foo"),
    ]);
    let resolver = Resolver::new(&state.forest);
    let symbol = resolver
        .resolve_definition(&test_uri("Main.elm"), Position::new(1, 7))
        .unwrap();
    assert_eq!(symbol.uri, test_uri("App.elm"));
    let app = state.forest.get_by_uri(&symbol.uri).unwrap();
    assert_eq!(
        app.tree.lsp_range(symbol.range),
        Range::new(Position::new(1, 0), Position::new(1, 8))
    );
}

#[test]
fn test_let_binding_shadows_parameter() {
    let state = world(&[(
        "Main.elm",
        "module Main exposing (f)\n\nf x =\n    let\n        x = 1\n    in\n    x\n",
    )]);
    let resolver = Resolver::new(&state.forest);
    let symbol = resolver
        .resolve_definition(&test_uri("Main.elm"), Position::new(6, 4))
        .unwrap();
    assert!(symbol.local);
    let file = state.forest.get_by_uri(&test_uri("Main.elm")).unwrap();
    assert_eq!(file.tree.lsp_range(symbol.name_range).start, Position::new(4, 8));
}

#[test]
fn test_later_alias_wins() {
    let state = world(&[
        ("Foo.elm", "module Foo exposing (bar)\n\nbar = 1\n"),
        ("FooExtra.elm", "module FooExtra exposing (bar)\n\nbar = 2\n"),
        (
            "Main.elm",
            "module Main exposing (x)\n\nimport Foo as F\nimport FooExtra as F\n\nx = F.bar\n",
        ),
    ]);
    let resolver = Resolver::new(&state.forest);
    let symbol = resolver
        .resolve_definition(&test_uri("Main.elm"), Position::new(5, 6))
        .unwrap();
    assert_eq!(symbol.uri, test_uri("FooExtra.elm"));
}

#[test]
fn test_exposing_lists_gate_visibility() {
    let state = world(&[
        (
            "M.elm",
            "module M exposing (shown, other)\n\nshown = 1\n\nother = 2\n\nhidden = other\n",
        ),
        (
            "Main.elm",
            "module Main exposing (a, b, c)\n\nimport M exposing (shown)\n\na = other\n\nb = M.other\n\nc = M.hidden\n",
        ),
    ]);
    let resolver = Resolver::new(&state.forest);
    let main = test_uri("Main.elm");
    // not in the import's exposing list
    assert!(resolver.resolve_definition(&main, Position::new(4, 4)).is_none());
    // qualified access sees everything the module exposes
    let qualified = resolver.resolve_definition(&main, Position::new(6, 6)).unwrap();
    assert_eq!(qualified.uri, test_uri("M.elm"));
    assert_eq!(qualified.name, "other");
    // but nothing it keeps private
    assert!(resolver.resolve_definition(&main, Position::new(8, 6)).is_none());
    // a module always sees its own declarations
    let own = resolver
        .resolve_definition(&test_uri("M.elm"), Position::new(6, 9))
        .unwrap();
    assert_eq!(own.name, "other");
}

#[test]
fn test_find_references_spans_files() {
    let state = world(&[
        ("App.elm", "module App exposing (foo)\nfoo = \"\""),
        ("Main.elm", "module Main exposing (bar)\nimport App exposing (foo)\nbar = foo ++ App.foo"),
    ]);
    let resolver = Resolver::new(&state.forest);
    let symbol = resolver
        .resolve_definition(&test_uri("App.elm"), Position::new(1, 0))
        .unwrap();
    let refs = resolver.find_references(&symbol);
    let app: Vec<_> = refs.iter().filter(|r| r.uri == test_uri("App.elm")).collect();
    let main: Vec<_> = refs.iter().filter(|r| r.uri == test_uri("Main.elm")).collect();
    assert_eq!(app.len(), 2);
    assert_eq!(main.len(), 3);
    assert_eq!(resolver.find_usages(&symbol).len(), 2);
}

// ============================================================================
// Inference
// ============================================================================

#[test]
fn test_program_type_checker() {
    let state = world(&[(
        "Main.elm",
        "module Main exposing (..)\n\ntwice f x =\n    f (f x)\n\nfour =\n    twice (\\n -> n + 1) 2\n",
    )]);
    let program = Program::new(&state.forest);
    let file = program.get_source_file(&test_uri("Main.elm")).unwrap();
    let checker = program.get_type_checker();
    let types: Vec<String> = file
        .tree
        .root()
        .child_nodes()
        .filter(|decl| decl.kind() == SyntaxKind::ValueDeclaration)
        .map(|decl| checker.type_to_string(&checker.find_type(&file.uri, decl.id()), &file.uri))
        .collect();
    assert_eq!(types, vec!["(a -> a) -> a -> a", "number"]);
}

// ============================================================================
// Diagnostics
// ============================================================================

#[test]
fn test_unused_import_spans_clause() {
    let state = world(&[(
        "Main.elm",
        "module Main exposing (x)\n\nimport Bar\n\nx : Int\nx =\n    1\n",
    )]);
    let found = suggestions(&state, "Main.elm", lint::UNUSED_IMPORT);
    assert_eq!(found.len(), 1);
    assert_eq!(
        found[0].range,
        Range::new(Position::new(2, 0), Position::new(2, 10))
    );
}

#[test]
fn test_case_on_bool_suggests_if() {
    let state = world(&[(
        "Main.elm",
        "module Main exposing (f)\n\nf : Bool -> Int\nf x =\n    case x of\n        True ->\n            1\n\n        False ->\n            2\n",
    )]);
    let found = suggestions(&state, "Main.elm", lint::BOOL_CASE);
    assert_eq!(found.len(), 1);
    assert!(found[0].message.contains("if-expression"));
    assert_eq!(found[0].range.start, Position::new(4, 4));
}

/// Host wiring the scheduler to a real world, recording publishes.
struct WorldHost {
    state: Arc<RwLock<WorldState>>,
    seq: ChangeSeq,
    published: Mutex<Vec<(Url, Vec<Diagnostic>)>>,
}

#[async_trait]
impl DiagnosticsHost for WorldHost {
    fn change_seq(&self) -> u64 {
        self.seq.current()
    }

    async fn open_files(&self) -> Vec<Url> {
        self.state.read().await.open_files()
    }

    async fn analyze(&self, uri: &Url) -> Option<AnalyzedFile> {
        let state = self.state.read().await;
        analyze(&state.forest, uri, &state.config.diagnostics)
    }

    async fn publish(&self, uri: Url, diagnostics: Vec<Diagnostic>) {
        self.published.lock().unwrap().push((uri, diagnostics));
    }
}

#[tokio::test(start_paused = true)]
async fn test_scheduler_over_real_analysis() {
    let uri = test_uri("Main.elm");
    let state = world(&[(
        "Main.elm",
        "module Main exposing (x)\n\nimport Bar\n\nx : Int\nx =\n    1\n",
    )]);
    let seq = state.change_seq();
    let state = Arc::new(RwLock::new(state));
    let host = Arc::new(WorldHost {
        state: state.clone(),
        seq,
        published: Mutex::new(Vec::new()),
    });
    let scheduler = DiagnosticsScheduler::new(host.clone(), SchedulerConfig::default());

    scheduler.request([uri.clone()]);
    tokio::time::sleep(Duration::from_millis(1000)).await;
    {
        let published = host.published.lock().unwrap();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].1.len(), 1);
        assert_eq!(code_of(&published[0].1[0]), Some(lint::UNUSED_IMPORT));
    }

    // delete the import line
    state.write().await.apply_changes(
        &uri,
        &[TextDocumentContentChangeEvent {
            range: Some(Range::new(Position::new(2, 0), Position::new(3, 0))),
            range_length: None,
            text: String::new(),
        }],
        Some(2),
    );
    scheduler.request([uri.clone()]);
    tokio::time::sleep(Duration::from_millis(1000)).await;
    {
        let published = host.published.lock().unwrap();
        assert_eq!(published.len(), 2);
        assert!(published[1].1.is_empty());
    }

    // nothing changed: nothing sent
    scheduler.request([uri.clone()]);
    tokio::time::sleep(Duration::from_millis(1000)).await;
    assert_eq!(host.published.lock().unwrap().len(), 2);
}

fn replace(start: (u32, u32), end: (u32, u32), text: &str) -> TextDocumentContentChangeEvent {
    TextDocumentContentChangeEvent {
        range: Some(Range::new(
            Position::new(start.0, start.1),
            Position::new(end.0, end.1),
        )),
        range_length: None,
        text: text.to_string(),
    }
}

#[tokio::test(start_paused = true)]
async fn test_signature_change_rechecks_importers() {
    let a = test_uri("A.elm");
    let b = test_uri("B.elm");
    let mut state = world(&[
        ("A.elm", "module A exposing (value)\n\nvalue : Int\nvalue =\n    1\n"),
        ("B.elm", "module B exposing (x)\n\nimport A\n\nx : Int\nx =\n    A.value\n"),
    ]);
    let events = state.forest.subscribe();
    let seq = state.change_seq();
    let state = Arc::new(RwLock::new(state));
    let host = Arc::new(WorldHost {
        state: state.clone(),
        seq,
        published: Mutex::new(Vec::new()),
    });
    let scheduler = DiagnosticsScheduler::new(host.clone(), SchedulerConfig::default());
    forward_tree_changes(state.clone(), scheduler.clone(), events);

    scheduler.request([a.clone(), b.clone()]);
    tokio::time::sleep(Duration::from_millis(1000)).await;
    assert!(scheduler.published(&b).is_empty());

    // only the edit itself; the forest's change events do the scheduling
    state.write().await.apply_changes(
        &a,
        &[replace((2, 8), (2, 11), "String"), replace((4, 4), (4, 5), "\"one\"")],
        Some(2),
    );
    tokio::time::sleep(Duration::from_millis(1000)).await;
    assert!(scheduler.published(&a).is_empty());
    assert!(scheduler
        .published(&b)
        .iter()
        .any(|d| code_of(d) == Some("type_mismatch")));
}

// ============================================================================
// Fixture workspace
// ============================================================================

fn fixture_world(config: &FixtureConfig) -> (tempfile::TempDir, WorldState) {
    let dir = create_fixture_workspace(config);
    let folder = Url::from_file_path(dir.path()).unwrap();
    let mut state = WorldState::new();
    state.apply_workspace_scan(workspace::scan(&[folder]));
    (dir, state)
}

fn module_uri(dir: &tempfile::TempDir, index: usize) -> Url {
    Url::from_file_path(dir.path().join("src").join(format!("{}.elm", module_name(index)))).unwrap()
}

#[test]
fn test_fixture_chain_resolves_across_modules() {
    let config = FixtureConfig::small();
    let (dir, state) = fixture_world(&config);
    let resolver = Resolver::new(&state.forest);
    // `    Mod1.fn_1_0 y * 2` in the first function of Mod0
    let symbol = resolver
        .resolve_definition(&module_uri(&dir, 0), Position::new(11, 10))
        .unwrap();
    assert_eq!(symbol.uri, module_uri(&dir, 1));
    assert_eq!(symbol.name, "fn_1_0");
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_resolution_is_deterministic(
        module in 0usize..4,
        line in 0u32..40,
        character in 0u32..30,
    ) {
        let config = FixtureConfig {
            module_count: 4,
            functions_per_module: 2,
            import_chain_depth: 3,
            constants_per_module: 2,
        };
        let (dir, state) = fixture_world(&config);
        let uri = module_uri(&dir, module);
        let position = Position::new(line, character);
        let first = Resolver::new(&state.forest).resolve_definition(&uri, position);
        let second = Resolver::new(&state.forest).resolve_definition(&uri, position);
        prop_assert_eq!(first, second);
    }

    #[test]
    fn prop_edit_keeps_untouched_chunks(
        at in 0usize..400,
        insert in "[a-z]",
    ) {
        let config = FixtureConfig {
            module_count: 1,
            functions_per_module: 3,
            import_chain_depth: 0,
            constants_per_module: 3,
        };
        let uri = test_uri("Mod0.elm");
        let text = grove::test_utils::fixture_workspace::generate_module(0, &config);
        let at = at.min(text.len());
        let mut state = WorldState::new();
        state.open_document(uri.clone(), &text, None);
        let old = state.forest.get_by_uri(&uri).unwrap().tree.clone();

        let position = old.position(at as u32);
        state.apply_changes(
            &uri,
            &[TextDocumentContentChangeEvent {
                range: Some(Range::new(position, position)),
                range_length: None,
                text: insert.clone(),
            }],
            None,
        );
        let new = state.forest.get_by_uri(&uri).unwrap().tree.clone();
        for (offset, element) in &old.green().children {
            let GreenElement::Node(node) = element else { continue };
            // chunks ending before the edit keep their identity
            if (*offset + node.len) < at as u32 {
                let shared = new.green().children.iter().any(|(o, e)| {
                    *o == *offset && matches!(e, GreenElement::Node(n) if Arc::ptr_eq(n, node))
                });
                prop_assert!(shared);
            }
        }
    }
}
