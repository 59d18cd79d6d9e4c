//
// forest.rs
//
// One syntax tree per file URI, with incremental reparse and a lazily
// rebuilt module index
//

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use tokio::sync::mpsc;
use tower_lsp::lsp_types::Url;

use crate::module_index::ModuleIndex;
use crate::syntax::ast::{self, Exposing};
use crate::syntax::{self, ReuseStats, SyntaxTree, TextEdit};

/// A parsed file owned by the forest.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub uri: Url,
    pub tree: Arc<SyntaxTree>,
    /// Editable project file, as opposed to a read-only dependency
    pub writeable: bool,
    /// Reachable from the project's source directories
    pub referenced: bool,
    pub module_name: String,
    pub exposing: Exposing,
    /// Change sequence number at which this tree was installed
    pub seq: u64,
}

impl SourceFile {
    fn new(uri: Url, writeable: bool, referenced: bool, tree: SyntaxTree, seq: u64) -> Self {
        let module_name = ast::module_name(&tree);
        let exposing = ast::module_exposing(&tree);
        Self {
            uri,
            tree: Arc::new(tree),
            writeable,
            referenced,
            module_name,
            exposing,
            seq,
        }
    }

    pub fn text(&self) -> &str {
        self.tree.text()
    }
}

/// Emitted after every tree install or removal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeChanged {
    pub uri: Url,
    pub seq: u64,
    pub removed: bool,
    /// Module names the file declared before and after the change
    pub modules: Vec<String>,
}

/// Shared, monotonically increasing edit counter.
#[derive(Debug, Clone, Default)]
pub struct ChangeSeq(Arc<AtomicU64>);

impl ChangeSeq {
    pub fn current(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }

    pub fn bump(&self) -> u64 {
        self.0.fetch_add(1, Ordering::SeqCst) + 1
    }
}

#[derive(Debug, Default)]
pub struct Forest {
    files: HashMap<Url, SourceFile>,
    seq: ChangeSeq,
    module_index: OnceLock<ModuleIndex>,
    events: Option<mpsc::UnboundedSender<TreeChanged>>,
}

impl Forest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Receive a [`TreeChanged`] for every subsequent mutation. Replaces any
    /// earlier subscriber.
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<TreeChanged> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.events = Some(tx);
        rx
    }

    pub fn change_seq(&self) -> ChangeSeq {
        self.seq.clone()
    }

    fn changed(&mut self, uri: &Url, removed: bool, modules: Vec<String>) -> u64 {
        let seq = self.seq.bump();
        self.module_index = OnceLock::new();
        if let Some(events) = &self.events {
            let _ = events.send(TreeChanged {
                uri: uri.clone(),
                seq,
                removed,
                modules,
            });
        }
        seq
    }

    pub fn set_tree(&mut self, uri: Url, writeable: bool, referenced: bool, tree: SyntaxTree) {
        let mut modules: Vec<String> = self
            .files
            .get(&uri)
            .map(|f| f.module_name.clone())
            .into_iter()
            .collect();
        let module = ast::module_name(&tree);
        if !modules.contains(&module) {
            modules.push(module);
        }
        let seq = self.changed(&uri, false, modules);
        log::trace!("Forest set_tree {} (seq {})", uri, seq);
        let file = SourceFile::new(uri.clone(), writeable, referenced, tree, seq);
        self.files.insert(uri, file);
    }

    /// Parse `text` from scratch and install it.
    pub fn set_text(&mut self, uri: Url, writeable: bool, referenced: bool, text: &str) {
        self.set_tree(uri, writeable, referenced, syntax::parse(text));
    }

    /// Install `new_text` for an existing file. With a precise edit the old
    /// tree is reused chunk by chunk; without one the file is reparsed.
    pub fn apply_edit(
        &mut self,
        uri: &Url,
        edit: Option<TextEdit>,
        new_text: &str,
    ) -> Option<ReuseStats> {
        let file = self.files.get(uri)?;
        let (writeable, referenced) = (file.writeable, file.referenced);
        let (tree, stats) = match edit {
            Some(edit) => syntax::reparse(&file.tree, edit, new_text),
            None => {
                let tree = syntax::parse(new_text);
                let chunks = tree.root().children().count();
                (
                    tree,
                    ReuseStats {
                        reused: 0,
                        reparsed: chunks,
                        relexed: new_text.len(),
                    },
                )
            }
        };
        self.set_tree(uri.clone(), writeable, referenced, tree);
        Some(stats)
    }

    pub fn get_tree(&self, uri: &Url) -> Option<&Arc<SyntaxTree>> {
        self.files.get(uri).map(|f| &f.tree)
    }

    pub fn get_by_uri(&self, uri: &Url) -> Option<&SourceFile> {
        self.files.get(uri)
    }

    pub fn remove_tree(&mut self, uri: &Url) -> Option<SourceFile> {
        let removed = self.files.remove(uri)?;
        self.changed(uri, true, vec![removed.module_name.clone()]);
        log::trace!("Forest remove_tree {}", uri);
        Some(removed)
    }

    pub fn iter(&self) -> impl Iterator<Item = &SourceFile> {
        self.files.values()
    }

    pub fn uris(&self) -> impl Iterator<Item = &Url> {
        self.files.keys()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Module name -> uri index, rebuilt on first use after any mutation.
    pub fn module_index(&self) -> &ModuleIndex {
        self.module_index
            .get_or_init(|| ModuleIndex::build(self.files.values()))
    }

    pub fn get_by_module_name(&self, name: &str) -> Option<&SourceFile> {
        self.module_index()
            .lookup(name)
            .and_then(|uri| self.files.get(uri))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uri(name: &str) -> Url {
        Url::parse(&format!("file:///project/src/{}", name)).unwrap()
    }

    #[test]
    fn test_set_get_remove() {
        let mut forest = Forest::new();
        forest.set_text(uri("App.elm"), true, true, "module App exposing (foo)\nfoo = \"\"\n");
        let file = forest.get_by_uri(&uri("App.elm")).unwrap();
        assert_eq!(file.module_name, "App");
        assert!(file.exposing.exposes_value("foo"));
        assert!(forest.get_tree(&uri("App.elm")).is_some());
        assert!(forest.remove_tree(&uri("App.elm")).is_some());
        assert!(forest.get_by_uri(&uri("App.elm")).is_none());
        assert!(forest.remove_tree(&uri("App.elm")).is_none());
    }

    #[test]
    fn test_one_file_per_uri() {
        let mut forest = Forest::new();
        forest.set_text(uri("A.elm"), true, true, "module A exposing (..)\n");
        forest.set_text(uri("A.elm"), true, true, "module B exposing (..)\n");
        assert_eq!(forest.len(), 1);
        assert_eq!(forest.get_by_uri(&uri("A.elm")).unwrap().module_name, "B");
    }

    #[test]
    fn test_module_index_invalidates_on_change() {
        let mut forest = Forest::new();
        forest.set_text(uri("A.elm"), true, true, "module A exposing (..)\n");
        assert!(forest.get_by_module_name("A").is_some());
        forest.set_text(uri("A.elm"), true, true, "module Renamed exposing (..)\n");
        assert!(forest.get_by_module_name("A").is_none());
        assert!(forest.get_by_module_name("Renamed").is_some());
    }

    #[test]
    fn test_seq_is_monotonic_and_recorded() {
        let mut forest = Forest::new();
        let seq = forest.change_seq();
        forest.set_text(uri("A.elm"), true, true, "a = 1\n");
        let first = forest.get_by_uri(&uri("A.elm")).unwrap().seq;
        forest.set_text(uri("B.elm"), true, true, "b = 1\n");
        let second = forest.get_by_uri(&uri("B.elm")).unwrap().seq;
        assert!(second > first);
        assert_eq!(seq.current(), second);
    }

    #[test]
    fn test_apply_edit_reuses_chunks() {
        let mut forest = Forest::new();
        let text = "module A exposing (..)\n\na = 1\n\nb = 2\n";
        forest.set_text(uri("A.elm"), true, true, text);
        let at = text.find("2").unwrap() as u32;
        let new_text = text.replace("b = 2", "b = 3");
        let stats = forest
            .apply_edit(
                &uri("A.elm"),
                Some(TextEdit {
                    start: at,
                    old_end: at + 1,
                    new_end: at + 1,
                }),
                &new_text,
            )
            .unwrap();
        assert_eq!(stats.reused, 2);
        assert_eq!(stats.reparsed, 1);
        assert_eq!(forest.get_by_uri(&uri("A.elm")).unwrap().text(), new_text);
    }

    #[tokio::test]
    async fn test_tree_changed_events() {
        let mut forest = Forest::new();
        let mut rx = forest.subscribe();
        forest.set_text(uri("A.elm"), true, true, "module A exposing (..)\na = 1\n");
        forest.set_text(uri("A.elm"), true, true, "module B exposing (..)\na = 1\n");
        forest.remove_tree(&uri("A.elm"));
        let first = rx.recv().await.unwrap();
        assert_eq!(first.uri, uri("A.elm"));
        assert!(!first.removed);
        assert_eq!(first.modules, vec!["A".to_string()]);
        let renamed = rx.recv().await.unwrap();
        assert_eq!(renamed.modules, vec!["A".to_string(), "B".to_string()]);
        let removed = rx.recv().await.unwrap();
        assert!(removed.removed);
        assert_eq!(removed.modules, vec!["B".to_string()]);
        assert!(removed.seq > renamed.seq && renamed.seq > first.seq);
    }
}
