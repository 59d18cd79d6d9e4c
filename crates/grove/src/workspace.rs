//
// workspace.rs
//
// Initial scan of workspace folders for Elm sources
//

use std::path::{Path, PathBuf};

use anyhow::Context;
use rayon::prelude::*;
use tower_lsp::lsp_types::Url;
use walkdir::{DirEntry, WalkDir};

use crate::syntax::{self, SyntaxTree};

/// A parsed file found by the scan.
pub struct ScannedFile {
    pub uri: Url,
    pub tree: SyntaxTree,
    /// Lives under one of the project's `source-directories`
    pub referenced: bool,
}

/// Directories never descended into.
fn is_skipped_dir(entry: &DirEntry) -> bool {
    if entry.depth() == 0 || !entry.file_type().is_dir() {
        return false;
    }
    let name = entry.file_name().to_string_lossy();
    name.starts_with('.') || name == "elm-stuff" || name == "node_modules"
}

pub fn is_elm_file(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some("elm")
}

/// `source-directories` of the `elm.json` at `root`, resolved against it.
/// Without an `elm.json` the whole folder counts as source.
pub fn source_directories(root: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let manifest = root.join("elm.json");
    if !manifest.is_file() {
        return Ok(vec![root.to_path_buf()]);
    }
    let text = std::fs::read_to_string(&manifest)
        .with_context(|| format!("failed to read {}", manifest.display()))?;
    let json: serde_json::Value = serde_json::from_str(&text)
        .with_context(|| format!("failed to parse {}", manifest.display()))?;
    let dirs = match json.get("source-directories").and_then(|v| v.as_array()) {
        Some(dirs) => dirs
            .iter()
            .filter_map(|d| d.as_str())
            .map(|d| root.join(d))
            .collect(),
        // packages keep their modules in src/
        None => vec![root.join("src")],
    };
    Ok(dirs)
}

fn collect_paths(root: &Path) -> Vec<PathBuf> {
    WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|e| !is_skipped_dir(e))
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file() && is_elm_file(e.path()))
        .map(|e| e.into_path())
        .collect()
}

/// Read and parse every `.elm` file below `folder`, in parallel.
///
/// Unreadable files are logged and skipped; only an unusable `elm.json`
/// fails the scan.
pub fn scan_folder(folder: &Path) -> anyhow::Result<Vec<ScannedFile>> {
    let sources = source_directories(folder)?;
    let paths = collect_paths(folder);
    log::info!(
        "Scanning {}: {} Elm files, source directories {:?}",
        folder.display(),
        paths.len(),
        sources
    );
    let files = paths
        .par_iter()
        .filter_map(|path| {
            let text = match std::fs::read_to_string(path) {
                Ok(text) => text,
                Err(e) => {
                    log::warn!("Skipping {}: {}", path.display(), e);
                    return None;
                }
            };
            let uri = Url::from_file_path(path).ok()?;
            log::trace!("Scanning file: {}", uri);
            Some(ScannedFile {
                uri,
                tree: syntax::parse(&text),
                referenced: sources.iter().any(|dir| path.starts_with(dir)),
            })
        })
        .collect();
    Ok(files)
}

/// Scan all workspace folders. A folder that fails to scan is logged and
/// contributes nothing.
pub fn scan(folders: &[Url]) -> Vec<ScannedFile> {
    let mut out = Vec::new();
    for folder in folders {
        let Ok(path) = folder.to_file_path() else {
            log::warn!("Ignoring non-file workspace folder {}", folder);
            continue;
        };
        match scan_folder(&path) {
            Ok(files) => out.extend(files),
            Err(e) => log::warn!("Workspace scan of {} failed: {:#}", path.display(), e),
        }
    }
    log::info!("Scanned {} workspace files", out.len());
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write(root: &Path, rel: &str, text: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, text).unwrap();
    }

    #[test]
    fn test_scan_skips_elm_stuff_and_hidden_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(root, "elm.json", r#"{"source-directories": ["src"]}"#);
        write(root, "src/Main.elm", "module Main exposing (..)\n\nx = 1\n");
        write(root, "src/Page/Home.elm", "module Page.Home exposing (..)\n");
        write(root, "tests/MainTest.elm", "module MainTest exposing (..)\n");
        write(root, "elm-stuff/0.19.1/Cached.elm", "module Cached exposing (..)\n");
        write(root, ".git/Hidden.elm", "module Hidden exposing (..)\n");
        write(root, "src/notes.txt", "not elm");

        let mut files = scan_folder(root).unwrap();
        files.sort_by(|a, b| a.uri.as_str().cmp(b.uri.as_str()));
        let names: Vec<(String, bool)> = files
            .iter()
            .map(|f| {
                let path = f.uri.to_file_path().unwrap();
                let rel = path.strip_prefix(root).unwrap().to_string_lossy().into_owned();
                (rel, f.referenced)
            })
            .collect();
        assert_eq!(
            names,
            vec![
                ("src/Main.elm".to_string(), true),
                ("src/Page/Home.elm".to_string(), true),
                ("tests/MainTest.elm".to_string(), false),
            ]
        );
    }

    #[test]
    fn test_source_directories_default_without_manifest() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(
            source_directories(dir.path()).unwrap(),
            vec![dir.path().to_path_buf()]
        );
        write(dir.path(), "elm.json", r#"{"type": "package"}"#);
        assert_eq!(
            source_directories(dir.path()).unwrap(),
            vec![dir.path().join("src")]
        );
    }

    #[test]
    fn test_broken_manifest_fails_folder_only() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "elm.json", "{ not json");
        assert!(scan_folder(dir.path()).is_err());
        let folder = Url::from_file_path(dir.path()).unwrap();
        assert!(scan(&[folder]).is_empty());
    }
}
