//
// state.rs
//
// Shared server state: open documents, the source forest and settings
//

use indexmap::IndexMap;
use ropey::Rope;
use tower_lsp::lsp_types::{Position, TextDocumentContentChangeEvent, Url};

use crate::config::ServerConfig;
use crate::core_modules;
use crate::forest::{ChangeSeq, Forest, TreeChanged};
use crate::syntax::ast;
use crate::syntax::incremental::edit_for_replacement;
use crate::syntax::TextEdit;
use crate::utf16::utf16_column_to_byte_offset;
use crate::workspace::ScannedFile;

/// An editor buffer.
pub struct Document {
    pub contents: Rope,
    pub version: Option<i32>,
}

impl Document {
    pub fn new(text: &str, version: Option<i32>) -> Self {
        Self {
            contents: Rope::from_str(text),
            version,
        }
    }

    /// Byte offset of an LSP position, clamped to the document.
    fn byte_offset(&self, position: Position) -> usize {
        let line = position.line as usize;
        if line >= self.contents.len_lines() {
            return self.contents.len_bytes();
        }
        let line_text = self.contents.line(line).to_string();
        // columns past the end clamp before the terminator
        let line_text = line_text.trim_end_matches(['\n', '\r']);
        self.contents.line_to_byte(line) + utf16_column_to_byte_offset(line_text, position.character)
    }

    /// Apply one change. Returns the byte edit for ranged changes, `None`
    /// for a full replacement.
    pub fn apply_change(&mut self, change: &TextDocumentContentChangeEvent) -> Option<TextEdit> {
        let Some(range) = change.range else {
            self.contents = Rope::from_str(&change.text);
            return None;
        };
        let start = self.byte_offset(range.start);
        let end = self.byte_offset(range.end).max(start);
        let start_char = self.contents.byte_to_char(start);
        let end_char = self.contents.byte_to_char(end);
        self.contents.remove(start_char..end_char);
        self.contents.insert(start_char, &change.text);
        Some(edit_for_replacement(start as u32, end as u32, &change.text))
    }

    pub fn text(&self) -> String {
        self.contents.to_string()
    }
}

pub struct WorldState {
    pub forest: Forest,
    /// Open documents in the order they were opened
    pub documents: IndexMap<Url, Document>,
    pub workspace_folders: Vec<Url>,
    pub config: ServerConfig,
}

impl Default for WorldState {
    fn default() -> Self {
        Self::new()
    }
}

impl WorldState {
    pub fn new() -> Self {
        let mut forest = Forest::new();
        core_modules::load_into(&mut forest);
        Self {
            forest,
            documents: IndexMap::new(),
            workspace_folders: Vec::new(),
            config: ServerConfig::default(),
        }
    }

    pub fn change_seq(&self) -> ChangeSeq {
        self.forest.change_seq()
    }

    pub fn open_files(&self) -> Vec<Url> {
        self.documents.keys().cloned().collect()
    }

    pub fn is_open(&self, uri: &Url) -> bool {
        self.documents.contains_key(uri)
    }

    /// Open files whose diagnostics a batch of tree changes can alter: the
    /// changed files themselves and every open file importing one of the
    /// modules involved.
    pub fn affected_by(&self, events: &[TreeChanged]) -> Vec<Url> {
        let mut out: Vec<Url> = Vec::new();
        for event in events {
            if !event.removed && self.is_open(&event.uri) && !out.contains(&event.uri) {
                out.push(event.uri.clone());
            }
        }
        for uri in self.documents.keys() {
            if out.contains(uri) {
                continue;
            }
            let Some(file) = self.forest.get_by_uri(uri) else {
                continue;
            };
            let imports_changed = ast::imports(&file.tree).iter().any(|import| {
                events
                    .iter()
                    .any(|e| e.uri != *uri && e.modules.contains(&import.module))
            });
            if imports_changed {
                out.push(uri.clone());
            }
        }
        out
    }

    /// Install the results of a workspace scan. Files already open keep
    /// their buffer contents.
    pub fn apply_workspace_scan(&mut self, files: Vec<ScannedFile>) {
        let count = files.len();
        for file in files {
            if self.is_open(&file.uri) {
                continue;
            }
            self.forest.set_tree(file.uri, true, file.referenced, file.tree);
        }
        log::info!("Forest holds {} files after indexing {}", self.forest.len(), count);
    }

    pub fn open_document(&mut self, uri: Url, text: &str, version: Option<i32>) {
        if core_modules::is_core_uri(&uri) {
            // read-only, already in the forest
            self.documents.insert(uri, Document::new(text, version));
            return;
        }
        let unchanged = self
            .forest
            .get_by_uri(&uri)
            .is_some_and(|f| f.text() == text);
        if !unchanged {
            let referenced = self.forest.get_by_uri(&uri).map_or(true, |f| f.referenced);
            self.forest.set_text(uri.clone(), true, referenced, text);
        }
        self.documents.shift_remove(&uri);
        self.documents.insert(uri, Document::new(text, version));
    }

    /// Apply a `didChange` batch, reparsing incrementally after each edit.
    pub fn apply_changes(
        &mut self,
        uri: &Url,
        changes: &[TextDocumentContentChangeEvent],
        version: Option<i32>,
    ) {
        if core_modules::is_core_uri(uri) {
            return;
        }
        let Some(doc) = self.documents.get_mut(uri) else {
            log::warn!("didChange for unopened document {}", uri);
            return;
        };
        doc.version = version;
        for change in changes {
            let edit = doc.apply_change(change);
            let text = doc.text();
            if let Some(stats) = self.forest.apply_edit(uri, edit, &text) {
                log::trace!(
                    "Reparsed {}: {} chunks reused, {} reparsed",
                    uri,
                    stats.reused,
                    stats.reparsed
                );
            }
        }
    }

    /// Drop the buffer. The forest falls back to the file on disk, or
    /// forgets the file if there is none.
    pub fn close_document(&mut self, uri: &Url) {
        self.documents.shift_remove(uri);
        if core_modules::is_core_uri(uri) {
            return;
        }
        self.reload_from_disk(uri);
    }

    /// Re-read a file that changed on disk. Open buffers win over disk.
    pub fn reload_from_disk(&mut self, uri: &Url) {
        if self.is_open(uri) {
            return;
        }
        let text = uri
            .to_file_path()
            .ok()
            .and_then(|path| std::fs::read_to_string(path).ok());
        match text {
            Some(text) => {
                if self.forest.get_by_uri(uri).is_some_and(|f| f.text() == text) {
                    return;
                }
                let referenced = self.forest.get_by_uri(uri).map_or(true, |f| f.referenced);
                self.forest.set_text(uri.clone(), true, referenced, &text);
            }
            None => {
                if self.forest.remove_tree(uri).is_some() {
                    log::trace!("Removed {} from the forest", uri);
                }
            }
        }
    }

    /// Forget a file deleted on disk unless it is open.
    pub fn remove_file(&mut self, uri: &Url) {
        if !self.is_open(uri) {
            self.forest.remove_tree(uri);
        }
    }
}
