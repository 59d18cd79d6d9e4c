//! Deterministic fixture workspace generator for benchmarks and tests.
//!
//! Generates synthetic Elm projects with controlled characteristics:
//! module count, functions per module, import chain depth and extra
//! top-level constants.
//!
//! All output is deterministic, so benchmarks are reproducible.

use std::fmt::Write;
use std::path::Path;
use tempfile::TempDir;

/// Configuration for generating a fixture workspace.
#[derive(Debug, Clone)]
pub struct FixtureConfig {
    pub module_count: usize,
    pub functions_per_module: usize,
    /// Modules `0..depth` each import the next one
    pub import_chain_depth: usize,
    pub constants_per_module: usize,
}

impl FixtureConfig {
    /// Small workspace: 10 modules, 5 functions each, import chain depth 3.
    pub fn small() -> Self {
        Self {
            module_count: 10,
            functions_per_module: 5,
            import_chain_depth: 3,
            constants_per_module: 5,
        }
    }

    /// Medium workspace: 50 modules, 10 functions each, import chain depth 10.
    pub fn medium() -> Self {
        Self {
            module_count: 50,
            functions_per_module: 10,
            import_chain_depth: 10,
            constants_per_module: 10,
        }
    }

    /// Large workspace: 200 modules, 20 functions each, import chain depth 15.
    pub fn large() -> Self {
        Self {
            module_count: 200,
            functions_per_module: 20,
            import_chain_depth: 15,
            constants_per_module: 20,
        }
    }
}

pub fn module_name(index: usize) -> String {
    format!("Mod{}", index)
}

/// Generate the source of a single module deterministically.
pub fn generate_module(index: usize, config: &FixtureConfig) -> String {
    let mut content = String::new();
    writeln!(content, "module {} exposing (..)", module_name(index)).unwrap();
    content.push('\n');

    let imports_next = index < config.import_chain_depth && index + 1 < config.module_count;
    if imports_next {
        writeln!(content, "import {}", module_name(index + 1)).unwrap();
        content.push('\n');
    }

    for func_i in 0..config.functions_per_module {
        content.push('\n');
        writeln!(content, "fn_{}_{} : Int -> Int", index, func_i).unwrap();
        writeln!(content, "fn_{}_{} x =", index, func_i).unwrap();
        writeln!(content, "    let").unwrap();
        writeln!(content, "        y =").unwrap();
        writeln!(content, "            x + {}", func_i + 1).unwrap();
        writeln!(content, "    in").unwrap();
        if imports_next {
            writeln!(content, "    {}.fn_{}_0 y * 2", module_name(index + 1), index + 1).unwrap();
        } else {
            writeln!(content, "    y * 2").unwrap();
        }
        content.push('\n');
    }

    for const_i in 0..config.constants_per_module {
        content.push('\n');
        writeln!(content, "value_{}_{} : Int", index, const_i).unwrap();
        writeln!(content, "value_{}_{} =", index, const_i).unwrap();
        writeln!(content, "    {}", const_i + 1).unwrap();
        content.push('\n');
    }

    content
}

/// Create a temporary fixture project from the given configuration.
///
/// Returns a `TempDir` holding an `elm.json` and `src/Mod*.elm`. The
/// directory is cleaned up when the `TempDir` is dropped.
pub fn create_fixture_workspace(config: &FixtureConfig) -> TempDir {
    let temp_dir = TempDir::new().expect("Failed to create temp directory for fixture workspace");
    write_fixture_workspace(temp_dir.path(), config);
    temp_dir
}

/// Write fixture files into an existing directory.
pub fn write_fixture_workspace(dir: &Path, config: &FixtureConfig) {
    std::fs::write(
        dir.join("elm.json"),
        r#"{ "type": "application", "source-directories": ["src"] }"#,
    )
    .expect("Failed to write elm.json");
    let src = dir.join("src");
    std::fs::create_dir_all(&src).expect("Failed to create src directory");
    for i in 0..config.module_count {
        let filename = format!("{}.elm", module_name(i));
        std::fs::write(src.join(&filename), generate_module(i, config))
            .unwrap_or_else(|e| panic!("Failed to write fixture file {}: {}", filename, e));
    }
}
