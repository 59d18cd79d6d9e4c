//
// module_index.rs
//
// Module name -> file URI, derived from forest contents
//

use std::collections::HashMap;

use tower_lsp::lsp_types::Url;

use crate::forest::SourceFile;

/// `A.B.C` -> `A/B/C.elm`
pub fn module_path_suffix(module: &str) -> String {
    format!("{}.elm", module.replace('.', "/"))
}

/// Module name implied by a path relative to a source directory:
/// `Page/Home.elm` -> `Page.Home`.
pub fn module_name_from_relative_path(relative: &str) -> Option<String> {
    let stem = relative.strip_suffix(".elm")?;
    let segments: Vec<&str> = stem.split(['/', '\\']).collect();
    let valid = segments.iter().all(|s| {
        s.chars().next().is_some_and(|c| c.is_uppercase())
            && s.chars().all(|c| c.is_alphanumeric() || c == '_')
    });
    valid.then(|| segments.join("."))
}

#[derive(Debug, Clone)]
struct Candidate {
    uri: Url,
    matches_path: bool,
    writeable: bool,
}

impl Candidate {
    /// Path-convention match first, then project files over dependencies,
    /// then uri order for determinism.
    fn rank(&self) -> (bool, bool, std::cmp::Reverse<&str>) {
        (
            self.matches_path,
            self.writeable,
            std::cmp::Reverse(self.uri.as_str()),
        )
    }
}

#[derive(Debug, Default)]
pub struct ModuleIndex {
    modules: HashMap<String, Vec<Candidate>>,
}

impl ModuleIndex {
    pub fn build<'a>(files: impl Iterator<Item = &'a SourceFile>) -> Self {
        let mut modules: HashMap<String, Vec<Candidate>> = HashMap::new();
        for file in files {
            let suffix = module_path_suffix(&file.module_name);
            let matches_path = file.uri.path().ends_with(&format!("/{}", suffix));
            modules
                .entry(file.module_name.clone())
                .or_default()
                .push(Candidate {
                    uri: file.uri.clone(),
                    matches_path,
                    writeable: file.writeable,
                });
        }
        for candidates in modules.values_mut() {
            candidates.sort_by(|a, b| b.rank().cmp(&a.rank()));
        }
        log::trace!("Built module index with {} modules", modules.len());
        Self { modules }
    }

    /// Best file declaring `module`.
    pub fn lookup(&self, module: &str) -> Option<&Url> {
        self.modules.get(module)?.first().map(|c| &c.uri)
    }

    /// Every file declaring `module`, best first.
    pub fn all(&self, module: &str) -> Vec<&Url> {
        self.modules
            .get(module)
            .map(|c| c.iter().map(|c| &c.uri).collect())
            .unwrap_or_default()
    }

    pub fn module_names(&self) -> impl Iterator<Item = &str> {
        self.modules.keys().map(|k| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forest::Forest;

    #[test]
    fn test_path_convention() {
        assert_eq!(module_path_suffix("Page.Home"), "Page/Home.elm");
        assert_eq!(
            module_name_from_relative_path("Page/Home.elm").as_deref(),
            Some("Page.Home")
        );
        assert_eq!(module_name_from_relative_path("page/home.elm"), None);
        assert_eq!(module_name_from_relative_path("Main.js"), None);
    }

    #[test]
    fn test_prefers_path_match_then_writeable() {
        let mut forest = Forest::new();
        let misplaced = Url::parse("file:///p/src/Other.elm").unwrap();
        let placed = Url::parse("file:///p/src/Page/Home.elm").unwrap();
        let dependency = Url::parse("file:///deps/Page/Home.elm").unwrap();
        forest.set_text(misplaced.clone(), true, true, "module Page.Home exposing (..)\n");
        forest.set_text(dependency.clone(), false, true, "module Page.Home exposing (..)\n");
        forest.set_text(placed.clone(), true, true, "module Page.Home exposing (..)\n");
        let index = forest.module_index();
        assert_eq!(index.lookup("Page.Home"), Some(&placed));
        assert_eq!(index.all("Page.Home").len(), 3);
        assert_eq!(index.all("Page.Home")[1], &dependency);
    }

    #[test]
    fn test_missing_module() {
        let forest = Forest::new();
        assert!(forest.module_index().lookup("Nope").is_none());
        assert!(forest.module_index().is_empty());
    }
}
