//
// resolve/references.rs
//
// Inverse resolution: every occurrence of a symbol across the forest
//

use crate::core_modules;
use crate::forest::SourceFile;
use crate::syntax::{SyntaxKind, SyntaxNode};

use super::symbol::{Reference, ReferenceKind, Symbol, SymbolKind};
use super::Resolver;

impl<'a> Resolver<'a> {
    /// All occurrences of `symbol`, its declaring name included, ordered by
    /// file then offset.
    ///
    /// Candidate tokens are found by name and kept only when they resolve
    /// back to the same declaration.
    pub fn find_references(&self, symbol: &Symbol) -> Vec<Reference> {
        let mut files: Vec<&'a SourceFile> = self
            .forest()
            .iter()
            .filter(|file| self.may_reference(file, symbol))
            .collect();
        files.sort_by(|a, b| a.uri.as_str().cmp(b.uri.as_str()));

        let mut out = Vec::new();
        for file in files {
            for token in name_tokens(file, &symbol.name) {
                let Some(resolved) = self.resolve_token(file, token) else {
                    continue;
                };
                if !resolved.same_as(symbol) {
                    continue;
                }
                out.push(Reference {
                    uri: file.uri.clone(),
                    range: token.range(),
                    kind: reference_kind(file, symbol, token),
                });
            }
        }
        log::trace!(
            "find_references {} ({:?}): {} hits",
            symbol.name,
            symbol.kind,
            out.len()
        );
        out
    }

    /// Usages only, skipping the declaration, annotations and exposing
    /// entries.
    pub fn find_usages(&self, symbol: &Symbol) -> Vec<Reference> {
        self.find_references(symbol)
            .into_iter()
            .filter(Reference::is_usage)
            .collect()
    }

    /// Files that can mention `symbol` at all.
    fn may_reference(&self, file: &SourceFile, symbol: &Symbol) -> bool {
        if file.uri == symbol.uri {
            return true;
        }
        if symbol.local || symbol.kind == SymbolKind::TypeVariable {
            return false;
        }
        if !file.text().contains(symbol.name.as_str()) {
            return false;
        }
        if core_modules::is_core_uri(&symbol.uri) {
            // implicit imports reach every file
            return true;
        }
        match self.file_scope(&file.uri) {
            Some(scope) => scope.imports.iter().any(|i| i.module == symbol.module),
            None => false,
        }
    }
}

/// Identifier and operator tokens of `file` spelled `name`.
fn name_tokens<'f>(file: &'f SourceFile, name: &'f str) -> impl Iterator<Item = SyntaxNode<'f>> + 'f {
    file.tree.root().descendants().filter(move |n| {
        matches!(
            n.kind(),
            SyntaxKind::LowerIdent | SyntaxKind::UpperIdent | SyntaxKind::Operator
        ) && n.text() == name
    })
}

fn reference_kind(file: &SourceFile, symbol: &Symbol, token: SyntaxNode<'_>) -> ReferenceKind {
    if file.uri == symbol.uri && token.range() == symbol.name_range {
        return ReferenceKind::Declaration;
    }
    match token.parent().map(|p| p.kind()) {
        Some(SyntaxKind::TypeAnnotation) => ReferenceKind::Annotation,
        Some(SyntaxKind::ExposedValue | SyntaxKind::ExposedType | SyntaxKind::ExposedOperator) => {
            ReferenceKind::Exposing
        }
        _ => ReferenceKind::Usage,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules;
    use crate::forest::Forest;
    use tower_lsp::lsp_types::Url;

    fn uri(name: &str) -> Url {
        Url::parse(&format!("file:///project/src/{}", name)).unwrap()
    }

    fn setup(files: &[(&str, &str)]) -> Forest {
        let mut forest = Forest::new();
        core_modules::load_into(&mut forest);
        for (name, text) in files {
            forest.set_text(uri(name), true, true, text);
        }
        forest
    }

    fn symbol_at(forest: &Forest, name: &str, needle: &str) -> Symbol {
        let file = forest.get_by_uri(&uri(name)).unwrap();
        let offset = file.text().find(needle).unwrap() as u32;
        Resolver::new(forest).resolve_at_offset(file, offset).unwrap()
    }

    #[test]
    fn test_references_across_files() {
        let forest = setup(&[
            ("App.elm", "module App exposing (foo)\n\nfoo : String\nfoo = \"\"\n\nlocal = foo\n"),
            ("Main.elm", "import App exposing (foo)\nbar = foo\nbaz = App.foo\n"),
            ("Other.elm", "module Other exposing (..)\nfoo = 1\nx = foo\n"),
        ]);
        let symbol = symbol_at(&forest, "App.elm", "foo =");
        let refs = Resolver::new(&forest).find_references(&symbol);
        let kinds: Vec<(String, ReferenceKind)> = refs
            .iter()
            .map(|r| (r.uri.path().rsplit('/').next().unwrap().to_string(), r.kind))
            .collect();
        assert_eq!(
            kinds,
            vec![
                ("App.elm".to_string(), ReferenceKind::Exposing),
                ("App.elm".to_string(), ReferenceKind::Annotation),
                ("App.elm".to_string(), ReferenceKind::Declaration),
                ("App.elm".to_string(), ReferenceKind::Usage),
                ("Main.elm".to_string(), ReferenceKind::Exposing),
                ("Main.elm".to_string(), ReferenceKind::Usage),
                ("Main.elm".to_string(), ReferenceKind::Usage),
            ]
        );
    }

    #[test]
    fn test_local_references_stay_in_scope() {
        let forest = setup(&[("Main.elm", "f x = x\n\ng x = x\n")]);
        let symbol = symbol_at(&forest, "Main.elm", "x");
        let refs = Resolver::new(&forest).find_references(&symbol);
        assert_eq!(refs.len(), 2);
        assert!(refs.iter().all(|r| r.range.end <= 7));
        assert_eq!(Resolver::new(&forest).find_usages(&symbol).len(), 1);
    }

    #[test]
    fn test_unreferenced_symbol_has_no_usages() {
        let forest = setup(&[("Main.elm", "module Main exposing (main)\n\nmain = 1\n\nunused = 2\n")]);
        let symbol = symbol_at(&forest, "Main.elm", "unused");
        assert!(Resolver::new(&forest).find_usages(&symbol).is_empty());
    }
}
