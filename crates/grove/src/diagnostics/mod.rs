//
// diagnostics/mod.rs
//
// Diagnostic sources and the per-file store the scheduler publishes from
//

pub mod external;
pub mod lint;
pub mod scheduler;
pub mod semantic;
pub mod syntactic;

use std::collections::{BTreeMap, HashSet};

use tower_lsp::lsp_types::{Diagnostic, DiagnosticSeverity, NumberOrString, Url};

use crate::forest::Forest;
use crate::types::TypeChecker;

/// `source` of every diagnostic computed in-process.
pub const SOURCE: &str = "grove";

/// Producing subsystem of a diagnostic. The declaration order is the order
/// in which kinds are merged for publishing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DiagnosticKind {
    Syntactic,
    Semantic,
    Suggestion,
    External,
}

impl DiagnosticKind {
    /// Kinds recomputed by a scheduler batch; `External` only changes on save.
    pub const ANALYZED: [DiagnosticKind; 3] = [
        DiagnosticKind::Syntactic,
        DiagnosticKind::Semantic,
        DiagnosticKind::Suggestion,
    ];
}

/// Output of analysing one file: every in-process kind, each complete.
pub type AnalyzedFile = Vec<(DiagnosticKind, Vec<Diagnostic>)>;

/// Latest diagnostics of one file, kept per kind so that each source can
/// be replaced independently.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FileDiagnostics {
    kinds: BTreeMap<DiagnosticKind, Vec<Diagnostic>>,
}

impl FileDiagnostics {
    pub fn set(&mut self, kind: DiagnosticKind, diagnostics: Vec<Diagnostic>) {
        if diagnostics.is_empty() {
            self.kinds.remove(&kind);
        } else {
            self.kinds.insert(kind, diagnostics);
        }
    }

    pub fn get(&self, kind: DiagnosticKind) -> &[Diagnostic] {
        self.kinds.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }

    /// All kinds concatenated in merge order.
    pub fn merged(&self) -> Vec<Diagnostic> {
        self.kinds.values().flatten().cloned().collect()
    }
}

/// Settings the in-process sources read.
#[derive(Debug, Clone, PartialEq)]
pub struct DiagnosticsOptions {
    /// Lint rule codes that are switched off
    pub disabled_rules: HashSet<String>,
    /// Severity of lint suggestions
    pub suggestion_severity: DiagnosticSeverity,
}

impl Default for DiagnosticsOptions {
    fn default() -> Self {
        Self {
            disabled_rules: HashSet::new(),
            suggestion_severity: DiagnosticSeverity::HINT,
        }
    }
}

/// Compute every in-process diagnostic kind for `uri`.
///
/// Returns `None` for files that are not in the forest or are read-only;
/// neither gets diagnostics.
pub fn analyze(forest: &Forest, uri: &Url, options: &DiagnosticsOptions) -> Option<AnalyzedFile> {
    let file = forest.get_by_uri(uri)?;
    if !file.writeable {
        return None;
    }
    let checker = TypeChecker::new(forest);
    let syntactic = syntactic::check(file);
    let semantic = semantic::check(&checker, file);
    let suggestions = lint::check(&checker, file, options);
    log::trace!(
        "analyze {}: {} syntactic, {} semantic, {} suggestions",
        uri,
        syntactic.len(),
        semantic.len(),
        suggestions.len()
    );
    Some(vec![
        (DiagnosticKind::Syntactic, syntactic),
        (DiagnosticKind::Semantic, semantic),
        (DiagnosticKind::Suggestion, suggestions),
    ])
}

/// String code of a diagnostic, if it has one.
pub fn code_of(diagnostic: &Diagnostic) -> Option<&str> {
    match &diagnostic.code {
        Some(NumberOrString::String(code)) => Some(code.as_str()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tower_lsp::lsp_types::{Position, Range};

    fn diag(message: &str) -> Diagnostic {
        Diagnostic {
            range: Range::new(Position::new(0, 0), Position::new(0, 1)),
            message: message.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_merged_follows_kind_order() {
        let mut file = FileDiagnostics::default();
        file.set(DiagnosticKind::External, vec![diag("external")]);
        file.set(DiagnosticKind::Suggestion, vec![diag("lint")]);
        file.set(DiagnosticKind::Syntactic, vec![diag("syntax")]);
        let messages: Vec<String> = file.merged().into_iter().map(|d| d.message).collect();
        assert_eq!(messages, vec!["syntax", "lint", "external"]);
    }

    #[test]
    fn test_empty_kind_is_dropped() {
        let mut file = FileDiagnostics::default();
        file.set(DiagnosticKind::Semantic, vec![diag("a")]);
        file.set(DiagnosticKind::Semantic, Vec::new());
        assert!(file.is_empty());
        assert_eq!(file, FileDiagnostics::default());
    }

    #[test]
    fn test_read_only_files_are_not_analyzed() {
        let mut forest = Forest::new();
        crate::core_modules::load_into(&mut forest);
        let core = crate::core_modules::core_uri("Basics").unwrap();
        assert!(analyze(&forest, &core, &DiagnosticsOptions::default()).is_none());
        let missing = Url::parse("file:///nowhere/Main.elm").unwrap();
        assert!(analyze(&forest, &missing, &DiagnosticsOptions::default()).is_none());
    }
}
