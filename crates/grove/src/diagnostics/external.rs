//
// diagnostics/external.rs
//
// Compiler diagnostics from `elm make --report=json`
//

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::Context;
use serde::Deserialize;
use tower_lsp::lsp_types::{Diagnostic, DiagnosticSeverity, Position, Range, Url};

/// `source` of compiler diagnostics.
pub const SOURCE: &str = "elm make";

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
enum Report {
    CompileErrors {
        errors: Vec<ModuleErrors>,
    },
    /// A problem not tied to a module, e.g. a broken `elm.json`
    Error {
        path: Option<String>,
        title: String,
        message: Vec<Chunk>,
    },
}

#[derive(Debug, Deserialize)]
struct ModuleErrors {
    path: String,
    problems: Vec<Problem>,
}

#[derive(Debug, Deserialize)]
struct Problem {
    title: String,
    region: Region,
    message: Vec<Chunk>,
}

#[derive(Debug, Deserialize)]
struct Region {
    start: Location,
    end: Location,
}

/// One-based line and column.
#[derive(Debug, Deserialize)]
struct Location {
    line: u32,
    column: u32,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Chunk {
    Plain(String),
    Styled { string: String },
}

fn render(message: &[Chunk]) -> String {
    let mut out = String::new();
    for chunk in message {
        match chunk {
            Chunk::Plain(text) | Chunk::Styled { string: text } => out.push_str(text),
        }
    }
    out.trim().to_string()
}

fn position(location: &Location) -> Position {
    Position::new(
        location.line.saturating_sub(1),
        location.column.saturating_sub(1),
    )
}

/// Nearest directory at or above `file` that holds an `elm.json`.
pub fn find_project_root(file: &Path) -> Option<PathBuf> {
    file.ancestors()
        .skip(1)
        .find(|dir| dir.join("elm.json").is_file())
        .map(Path::to_path_buf)
}

/// Convert a JSON report into diagnostics keyed by file.
pub fn parse_report(json: &str, root: &Path) -> anyhow::Result<HashMap<Url, Vec<Diagnostic>>> {
    let report: Report = serde_json::from_str(json.trim()).context("unreadable elm make report")?;
    let mut out: HashMap<Url, Vec<Diagnostic>> = HashMap::new();
    let file_url = |path: &str| {
        let path = Path::new(path);
        let absolute = if path.is_absolute() {
            path.to_path_buf()
        } else {
            root.join(path)
        };
        Url::from_file_path(&absolute).ok()
    };
    match report {
        Report::CompileErrors { errors } => {
            for module in errors {
                let Some(uri) = file_url(&module.path) else {
                    log::warn!("elm make reported an unusable path: {}", module.path);
                    continue;
                };
                let diagnostics = out.entry(uri).or_default();
                for problem in module.problems {
                    diagnostics.push(Diagnostic {
                        range: Range::new(
                            position(&problem.region.start),
                            position(&problem.region.end),
                        ),
                        severity: Some(DiagnosticSeverity::ERROR),
                        source: Some(SOURCE.to_string()),
                        message: format!("{}\n\n{}", problem.title, render(&problem.message)),
                        ..Default::default()
                    });
                }
            }
        }
        Report::Error {
            path,
            title,
            message,
        } => {
            let uri = path
                .as_deref()
                .and_then(file_url)
                .or_else(|| file_url("elm.json"));
            if let Some(uri) = uri {
                out.entry(uri).or_default().push(Diagnostic {
                    range: Range::default(),
                    severity: Some(DiagnosticSeverity::ERROR),
                    source: Some(SOURCE.to_string()),
                    message: format!("{}\n\n{}", title, render(&message)),
                    ..Default::default()
                });
            }
        }
    }
    Ok(out)
}

/// Compile `file` with the compiler at `elm` and collect its problems.
///
/// A clean compile yields an empty map. Failing to start the compiler or
/// to read its report is an error.
pub async fn run(elm: &str, file: &Path) -> anyhow::Result<HashMap<Url, Vec<Diagnostic>>> {
    let root = find_project_root(file)
        .with_context(|| format!("no elm.json above {}", file.display()))?;
    log::trace!("Running {} make {} in {}", elm, file.display(), root.display());
    let output = tokio::process::Command::new(elm)
        .arg("make")
        .arg(file)
        .arg("--report=json")
        .arg("--output=/dev/null")
        .current_dir(&root)
        .kill_on_drop(true)
        .output()
        .await
        .with_context(|| format!("failed to run `{} make`", elm))?;
    if output.status.success() {
        return Ok(HashMap::new());
    }
    let stderr = String::from_utf8_lossy(&output.stderr);
    parse_report(&stderr, &root)
}

/// Remembers whether the user has already been told that the compiler
/// could not be run.
#[derive(Debug, Default)]
pub struct FailureNotice(AtomicBool);

impl FailureNotice {
    /// True exactly once per process.
    pub fn first(&self) -> bool {
        !self.0.swap(true, Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const COMPILE_ERRORS: &str = r#"{
        "type": "compile-errors",
        "errors": [{
            "path": "src/Main.elm",
            "name": "Main",
            "problems": [{
                "title": "NAMING ERROR",
                "region": { "start": { "line": 7, "column": 5 }, "end": { "line": 7, "column": 8 } },
                "message": ["I cannot find a `foo` variable:\n\n",
                    { "bold": false, "underline": false, "color": "RED", "string": "^^^" }]
            }]
        }]
    }"#;

    #[test]
    fn test_compile_errors_report() {
        let root = Path::new("/project");
        let map = parse_report(COMPILE_ERRORS, root).unwrap();
        let uri = Url::from_file_path("/project/src/Main.elm").unwrap();
        let diags = &map[&uri];
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].range.start, Position::new(6, 4));
        assert_eq!(diags[0].range.end, Position::new(6, 7));
        assert_eq!(
            diags[0].message,
            "NAMING ERROR\n\nI cannot find a `foo` variable:\n\n^^^"
        );
        assert_eq!(diags[0].source.as_deref(), Some(SOURCE));
    }

    #[test]
    fn test_general_error_lands_on_elm_json() {
        let json = r#"{"type":"error","path":null,"title":"BAD JSON","message":["oops"]}"#;
        let map = parse_report(json, Path::new("/project")).unwrap();
        let uri = Url::from_file_path("/project/elm.json").unwrap();
        assert_eq!(map[&uri][0].message, "BAD JSON\n\noops");
    }

    #[test]
    fn test_garbage_report_is_an_error() {
        assert!(parse_report("Segmentation fault", Path::new("/project")).is_err());
    }

    #[test]
    fn test_find_project_root() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("elm.json"), "{}").unwrap();
        std::fs::create_dir_all(dir.path().join("src/Page")).unwrap();
        let file = dir.path().join("src/Page/Home.elm");
        assert_eq!(find_project_root(&file).as_deref(), Some(dir.path()));
        assert_eq!(find_project_root(Path::new("/no/such/Main.elm")), None);
    }

    #[tokio::test]
    async fn test_missing_compiler_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("elm.json"), "{}").unwrap();
        let file = dir.path().join("Main.elm");
        let result = run("grove-test-no-such-elm-binary", &file).await;
        assert!(result.is_err());
    }

    #[test]
    fn test_failure_notice_fires_once() {
        let notice = FailureNotice::default();
        assert!(notice.first());
        assert!(!notice.first());
    }
}
