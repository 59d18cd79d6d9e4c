// analysis.rs - Performance benchmarks for workspace indexing and analysis
//
// Run with: cargo bench --features test-support --bench analysis
// Compare baselines: cargo bench --features test-support --bench analysis -- --baseline before

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use tower_lsp::lsp_types::{Position, Range, TextDocumentContentChangeEvent, Url};

use grove::diagnostics::{analyze, DiagnosticsOptions};
use grove::resolve::Resolver;
use grove::state::WorldState;
use grove::syntax;
use grove::test_utils::fixture_workspace::{
    create_fixture_workspace, generate_module, module_name, FixtureConfig,
};
use grove::workspace;

fn indexed_world(config: &FixtureConfig) -> (tempfile::TempDir, WorldState) {
    let dir = create_fixture_workspace(config);
    let folder = Url::from_file_path(dir.path()).unwrap();
    let mut state = WorldState::new();
    state.apply_workspace_scan(workspace::scan(&[folder]));
    (dir, state)
}

fn module_uri(dir: &tempfile::TempDir, index: usize) -> Url {
    Url::from_file_path(dir.path().join("src").join(format!("{}.elm", module_name(index)))).unwrap()
}

// ---------------------------------------------------------------------------
// Benchmark: workspace scan (walk + parallel parse)
// ---------------------------------------------------------------------------

fn bench_workspace_scan(c: &mut Criterion) {
    let mut group = c.benchmark_group("workspace_scan");
    group.sample_size(10);

    let configs: &[(&str, FixtureConfig)] = &[
        ("small_10", FixtureConfig::small()),
        ("medium_50", FixtureConfig::medium()),
    ];

    for (label, config) in configs {
        // Pre-create the workspace so fixture generation isn't measured.
        let workspace = create_fixture_workspace(config);

        group.bench_with_input(BenchmarkId::new("scan", *label), &workspace, |b, ws| {
            let folder_url = Url::from_file_path(ws.path()).unwrap();
            b.iter(|| black_box(workspace::scan(black_box(&[folder_url.clone()]))))
        });
    }

    group.finish();
}

// ---------------------------------------------------------------------------
// Benchmark: full parse against chunk-reusing reparse after a keystroke
// ---------------------------------------------------------------------------

fn bench_reparse(c: &mut Criterion) {
    let mut group = c.benchmark_group("reparse");

    let config = FixtureConfig {
        module_count: 1,
        functions_per_module: 40,
        import_chain_depth: 0,
        constants_per_module: 40,
    };
    let text = generate_module(0, &config);
    let uri = Url::parse("file:///bench/src/Mod0.elm").unwrap();

    group.bench_function("full_parse", |b| {
        b.iter(|| black_box(syntax::parse(black_box(&text))))
    });

    group.bench_function("incremental_keystroke", |b| {
        let mut state = WorldState::new();
        state.open_document(uri.clone(), &text, None);
        // the last constant's literal, far from most chunks
        let line = text.lines().count() as u32 - 2;
        let mut toggle = false;
        b.iter(|| {
            toggle = !toggle;
            let change = TextDocumentContentChangeEvent {
                range: Some(Range::new(Position::new(line, 4), Position::new(line, 5))),
                range_length: None,
                text: if toggle { "7" } else { "4" }.to_string(),
            };
            state.apply_changes(&uri, &[change], None);
        })
    });

    group.finish();
}

// ---------------------------------------------------------------------------
// Benchmark: diagnostics for one file (type inference + lints)
// ---------------------------------------------------------------------------

fn bench_analyze(c: &mut Criterion) {
    let mut group = c.benchmark_group("analyze");
    group.sample_size(20);

    let (dir, state) = indexed_world(&FixtureConfig::small());
    let options = DiagnosticsOptions::default();

    for index in [0usize, 5] {
        let uri = module_uri(&dir, index);
        group.bench_with_input(BenchmarkId::new("module", index), &uri, |b, uri| {
            b.iter(|| black_box(analyze(&state.forest, black_box(uri), &options)))
        });
    }

    group.finish();
}

// ---------------------------------------------------------------------------
// Benchmark: go-to-definition and find-references
// ---------------------------------------------------------------------------

fn bench_resolution(c: &mut Criterion) {
    let mut group = c.benchmark_group("resolution");

    let configs: &[(&str, FixtureConfig)] = &[
        ("small_10", FixtureConfig::small()),
        ("medium_50", FixtureConfig::medium()),
    ];

    for (label, config) in configs {
        let (dir, state) = indexed_world(config);
        let uri = module_uri(&dir, 0);
        // `Mod1.fn_1_0` in the body of the first function
        let position = Position::new(11, 10);

        group.bench_function(BenchmarkId::new("definition", *label), |b| {
            b.iter(|| {
                let resolver = Resolver::new(&state.forest);
                black_box(resolver.resolve_definition(black_box(&uri), position))
            })
        });

        let symbol = Resolver::new(&state.forest)
            .resolve_definition(&uri, position)
            .expect("fixture call resolves");
        group.bench_function(BenchmarkId::new("references", *label), |b| {
            b.iter(|| {
                let resolver = Resolver::new(&state.forest);
                black_box(resolver.find_references(black_box(&symbol)))
            })
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_workspace_scan,
    bench_reparse,
    bench_analyze,
    bench_resolution,
);
criterion_main!(benches);
