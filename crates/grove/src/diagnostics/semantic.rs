//
// diagnostics/semantic.rs
//
// Type errors from inference, as diagnostics
//

use tower_lsp::lsp_types::{Diagnostic, DiagnosticSeverity, NumberOrString};

use crate::forest::SourceFile;
use crate::types::{TypeChecker, TypeErrorKind};

use super::SOURCE;

pub fn code(kind: TypeErrorKind) -> &'static str {
    match kind {
        TypeErrorKind::Mismatch => "type_mismatch",
        TypeErrorKind::InfiniteType => "infinite_type",
        TypeErrorKind::Arity => "constructor_arity",
        TypeErrorKind::NotAFunction => "not_a_function",
    }
}

pub fn check(checker: &TypeChecker<'_>, file: &SourceFile) -> Vec<Diagnostic> {
    checker
        .declaration_errors(&file.uri)
        .into_iter()
        .map(|error| Diagnostic {
            range: file.tree.lsp_range(error.range),
            severity: Some(DiagnosticSeverity::ERROR),
            code: Some(NumberOrString::String(code(error.kind).to_string())),
            source: Some(SOURCE.to_string()),
            message: error.message,
            ..Default::default()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules;
    use crate::forest::Forest;
    use tower_lsp::lsp_types::Url;

    fn diagnostics(text: &str) -> Vec<Diagnostic> {
        let mut forest = Forest::new();
        core_modules::load_into(&mut forest);
        let uri = Url::parse("file:///p/src/Main.elm").unwrap();
        forest.set_text(uri.clone(), true, true, text);
        let checker = TypeChecker::new(&forest);
        check(&checker, forest.get_by_uri(&uri).unwrap())
    }

    #[test]
    fn test_annotation_mismatch_is_reported_at_the_body() {
        let diags = diagnostics("name : String\nname = 42\n");
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].range.start.line, 1);
        assert_eq!(diags[0].range.start.character, 7);
        assert_eq!(
            diags[0].code,
            Some(NumberOrString::String("type_mismatch".to_string()))
        );
    }

    #[test]
    fn test_error_in_one_declaration_leaves_siblings_alone() {
        let diags = diagnostics("bad : Int\nbad = \"no\"\n\ngood : Int\ngood = 1 + 2\n");
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].range.start.line, 1);
    }

    #[test]
    fn test_well_typed_file_is_clean() {
        assert!(diagnostics("f x = x + 1\n\ng = f 2\n").is_empty());
    }
}
