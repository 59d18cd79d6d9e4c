//
// backend.rs
//
// tower-lsp server: document sync, request routing and the diagnostics host
//

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use tower_lsp::jsonrpc::Result;
use tower_lsp::lsp_types::*;
use tower_lsp::Client;
use tower_lsp::LanguageServer;
use tower_lsp::LspService;
use tower_lsp::Server;

use crate::config::ServerConfig;
use crate::core_modules;
use crate::diagnostics::external::{self, FailureNotice};
use crate::diagnostics::scheduler::{DiagnosticsHost, DiagnosticsScheduler};
use crate::diagnostics::{self, AnalyzedFile, DiagnosticKind};
use crate::fixes::FixRegistry;
use crate::forest::{ChangeSeq, TreeChanged};
use crate::handlers;
use crate::state::WorldState;
use crate::workspace;

/// Connects the diagnostics scheduler to the shared state and the client.
pub struct ServerHost {
    client: Client,
    state: Arc<RwLock<WorldState>>,
    seq: ChangeSeq,
}

#[async_trait]
impl DiagnosticsHost for ServerHost {
    fn change_seq(&self) -> u64 {
        self.seq.current()
    }

    async fn open_files(&self) -> Vec<Url> {
        self.state.read().await.open_files()
    }

    async fn analyze(&self, uri: &Url) -> Option<AnalyzedFile> {
        let state = self.state.read().await;
        handlers::guarded("diagnostics", || {
            diagnostics::analyze(&state.forest, uri, &state.config.diagnostics)
        })
    }

    async fn publish(&self, uri: Url, diagnostics: Vec<Diagnostic>) {
        log::trace!("Publishing {} diagnostics for {}", diagnostics.len(), uri);
        self.client.publish_diagnostics(uri, diagnostics, None).await;
    }
}

/// Feed forest changes into the scheduler: every change queues the file
/// itself and the open files importing its module.
pub fn forward_tree_changes<H: DiagnosticsHost>(
    state: Arc<RwLock<WorldState>>,
    scheduler: Arc<DiagnosticsScheduler<H>>,
    mut events: mpsc::UnboundedReceiver<TreeChanged>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(first) = events.recv().await {
            let mut batch = vec![first];
            while let Ok(event) = events.try_recv() {
                batch.push(event);
            }
            let affected = state.read().await.affected_by(&batch);
            log::trace!(
                "{} tree change(s) affect {} open file(s)",
                batch.len(),
                affected.len()
            );
            if !affected.is_empty() {
                scheduler.request(affected);
            }
        }
    })
}

#[derive(Debug, Deserialize)]
pub struct CoreSourceParams {
    pub uri: Url,
}

pub struct Backend {
    client: Client,
    state: Arc<RwLock<WorldState>>,
    scheduler: Arc<DiagnosticsScheduler<ServerHost>>,
    fixes: FixRegistry,
    compiler_failure: Arc<FailureNotice>,
}

impl Backend {
    pub fn new(client: Client) -> Self {
        let mut state = WorldState::new();
        let events = state.forest.subscribe();
        let seq = state.change_seq();
        let config = state.config.scheduler;
        let state = Arc::new(RwLock::new(state));
        let host = Arc::new(ServerHost {
            client: client.clone(),
            state: state.clone(),
            seq,
        });
        let scheduler = DiagnosticsScheduler::new(host, config);
        forward_tree_changes(state.clone(), scheduler.clone(), events);
        Self {
            client,
            state,
            scheduler,
            fixes: FixRegistry::with_builtin_fixes(),
            compiler_failure: Arc::new(FailureNotice::default()),
        }
    }

    /// Install a new configuration and reschedule what it affects.
    async fn apply_config(&self, config: ServerConfig) {
        let (analysis_changed, compiler_disabled, open) = {
            let mut state = self.state.write().await;
            let analysis_changed = state.config.diagnostics != config.diagnostics;
            let compiler_disabled = state.config.elm_make.enabled && !config.elm_make.enabled;
            self.scheduler.set_config(config.scheduler);
            state.config = config;
            (analysis_changed, compiler_disabled, state.open_files())
        };
        if compiler_disabled {
            self.scheduler
                .replace_kind(DiagnosticKind::External, HashMap::new())
                .await;
        }
        if analysis_changed {
            self.scheduler.request(open);
        }
    }

    /// Compile the project owning `uri` in the background.
    async fn run_compiler(&self, uri: &Url) {
        let (enabled, elm) = {
            let state = self.state.read().await;
            let writeable = state
                .forest
                .get_by_uri(uri)
                .is_some_and(|f| f.writeable);
            (
                state.config.elm_make.enabled && writeable,
                state.config.elm_make.path.clone(),
            )
        };
        if !enabled {
            return;
        }
        let Ok(path) = uri.to_file_path() else {
            return;
        };
        let client = self.client.clone();
        let scheduler = self.scheduler.clone();
        let notice = self.compiler_failure.clone();
        tokio::spawn(async move {
            match external::run(&elm, &path).await {
                Ok(by_uri) => {
                    log::trace!("elm make reported problems in {} file(s)", by_uri.len());
                    scheduler.replace_kind(DiagnosticKind::External, by_uri).await;
                }
                Err(e) => {
                    log::warn!("elm make failed for {}: {:#}", path.display(), e);
                    if notice.first() {
                        client
                            .show_message(
                                MessageType::WARNING,
                                format!("Could not run `{} make`: {:#}", elm, e),
                            )
                            .await;
                    }
                }
            }
        });
    }

    async fn register_file_watcher(&self) {
        let options = DidChangeWatchedFilesRegistrationOptions {
            watchers: vec![FileSystemWatcher {
                glob_pattern: GlobPattern::String("**/*.elm".to_string()),
                kind: None,
            }],
        };
        let registration = Registration {
            id: "grove-watch-elm".to_string(),
            method: "workspace/didChangeWatchedFiles".to_string(),
            register_options: serde_json::to_value(options).ok(),
        };
        if let Err(e) = self.client.register_capability(vec![registration]).await {
            log::warn!("Failed to register file watcher: {}", e);
        }
    }

    /// Text of an embedded core module, for clients following a
    /// definition into `elm-core:` documents.
    async fn core_source(&self, params: CoreSourceParams) -> Result<Option<String>> {
        Ok(core_modules::core_source(&params.uri).map(str::to_string))
    }
}

#[tower_lsp::async_trait]
impl LanguageServer for Backend {
    async fn initialize(&self, params: InitializeParams) -> Result<InitializeResult> {
        log::info!("Initializing grove");

        let config = params
            .initialization_options
            .as_ref()
            .map(ServerConfig::from_settings)
            .unwrap_or_default();
        {
            let mut state = self.state.write().await;
            if let Some(folders) = params.workspace_folders {
                for folder in folders {
                    log::info!("Adding workspace folder: {}", folder.uri);
                    state.workspace_folders.push(folder.uri);
                }
            } else if let Some(root_uri) = params.root_uri {
                log::info!("Adding root URI as workspace folder: {}", root_uri);
                state.workspace_folders.push(root_uri);
            }
            self.scheduler.set_config(config.scheduler);
            state.config = config;
        }

        Ok(InitializeResult {
            capabilities: ServerCapabilities {
                text_document_sync: Some(TextDocumentSyncCapability::Options(
                    TextDocumentSyncOptions {
                        open_close: Some(true),
                        change: Some(TextDocumentSyncKind::INCREMENTAL),
                        save: Some(TextDocumentSyncSaveOptions::Supported(true)),
                        ..Default::default()
                    },
                )),
                document_symbol_provider: Some(OneOf::Left(true)),
                completion_provider: Some(CompletionOptions {
                    trigger_characters: Some(vec![String::from(".")]),
                    ..Default::default()
                }),
                hover_provider: Some(HoverProviderCapability::Simple(true)),
                definition_provider: Some(OneOf::Left(true)),
                references_provider: Some(OneOf::Left(true)),
                rename_provider: Some(OneOf::Right(RenameOptions {
                    prepare_provider: Some(true),
                    work_done_progress_options: Default::default(),
                })),
                code_action_provider: Some(CodeActionProviderCapability::Options(
                    CodeActionOptions {
                        code_action_kinds: Some(vec![CodeActionKind::QUICKFIX]),
                        ..Default::default()
                    },
                )),
                ..Default::default()
            },
            server_info: Some(ServerInfo {
                name: String::from("grove"),
                version: Some(String::from(env!("CARGO_PKG_VERSION"))),
            }),
        })
    }

    async fn initialized(&self, _: InitializedParams) {
        log::info!("grove initialized");
        self.register_file_watcher().await;

        let folders = self.state.read().await.workspace_folders.clone();

        // Scan without holding the lock
        let files = tokio::task::spawn_blocking(move || workspace::scan(&folders))
            .await
            .unwrap_or_else(|e| {
                log::warn!("Workspace scan task failed: {}", e);
                Vec::new()
            });

        let open = {
            let mut state = self.state.write().await;
            state.apply_workspace_scan(files);
            state.open_files()
        };
        self.scheduler.request(open);
        log::info!("Workspace initialization complete");
    }

    async fn shutdown(&self) -> Result<()> {
        log::info!("grove shutting down");
        self.scheduler.cancel();
        Ok(())
    }

    async fn did_open(&self, params: DidOpenTextDocumentParams) {
        let doc = params.text_document;
        log::trace!("didOpen {}", doc.uri);
        {
            let mut state = self.state.write().await;
            state.open_document(doc.uri.clone(), &doc.text, Some(doc.version));
        }
        self.scheduler.request([doc.uri]);
    }

    async fn did_change(&self, params: DidChangeTextDocumentParams) {
        let uri = params.text_document.uri;
        {
            let mut state = self.state.write().await;
            state.apply_changes(
                &uri,
                &params.content_changes,
                Some(params.text_document.version),
            );
        }
        log::trace!("didChange {}", uri);
    }

    async fn did_save(&self, params: DidSaveTextDocumentParams) {
        self.run_compiler(&params.text_document.uri).await;
    }

    async fn did_close(&self, params: DidCloseTextDocumentParams) {
        let uri = params.text_document.uri;
        let in_workspace = {
            let mut state = self.state.write().await;
            state.close_document(&uri);
            state.forest.get_by_uri(&uri).is_some_and(|f| f.writeable)
        };
        if in_workspace {
            self.scheduler.clear_analysis(&uri).await;
        } else {
            self.scheduler.forget(&uri).await;
        }
    }

    async fn did_change_configuration(&self, params: DidChangeConfigurationParams) {
        log::trace!("Configuration changed");
        self.apply_config(ServerConfig::from_settings(&params.settings))
            .await;
    }

    async fn did_change_watched_files(&self, params: DidChangeWatchedFilesParams) {
        log::trace!(
            "Received watched files change: {} changes",
            params.changes.len()
        );
        let mut changed = Vec::new();
        let mut deleted = Vec::new();
        {
            let mut state = self.state.write().await;
            for change in params.changes {
                let is_elm = change
                    .uri
                    .to_file_path()
                    .is_ok_and(|p| workspace::is_elm_file(&p));
                if !is_elm {
                    continue;
                }
                // open documents are authoritative
                if state.is_open(&change.uri) {
                    log::trace!("Skipping watched file change for open document: {}", change.uri);
                    continue;
                }
                match change.typ {
                    FileChangeType::DELETED => {
                        state.remove_file(&change.uri);
                        deleted.push(change.uri);
                    }
                    _ => {
                        state.reload_from_disk(&change.uri);
                        changed.push(change.uri);
                    }
                }
            }
        }
        for uri in &deleted {
            self.scheduler.forget(uri).await;
        }
        if !changed.is_empty() || !deleted.is_empty() {
            self.scheduler.request(changed);
        }
    }

    async fn document_symbol(
        &self,
        params: DocumentSymbolParams,
    ) -> Result<Option<DocumentSymbolResponse>> {
        let state = self.state.read().await;
        Ok(handlers::guarded("documentSymbol", || {
            handlers::document_symbol(&state, &params.text_document.uri)
        }))
    }

    async fn completion(&self, params: CompletionParams) -> Result<Option<CompletionResponse>> {
        self.scheduler.interrupt();
        let state = self.state.read().await;
        let position = params.text_document_position;
        Ok(handlers::guarded("completion", || {
            handlers::completion(&state, &position.text_document.uri, position.position)
        }))
    }

    async fn hover(&self, params: HoverParams) -> Result<Option<Hover>> {
        let state = self.state.read().await;
        let position = params.text_document_position_params;
        Ok(handlers::guarded("hover", || {
            handlers::hover(&state, &position.text_document.uri, position.position)
        }))
    }

    async fn goto_definition(
        &self,
        params: GotoDefinitionParams,
    ) -> Result<Option<GotoDefinitionResponse>> {
        let state = self.state.read().await;
        let position = params.text_document_position_params;
        Ok(handlers::guarded("definition", || {
            handlers::goto_definition(&state, &position.text_document.uri, position.position)
        }))
    }

    async fn references(&self, params: ReferenceParams) -> Result<Option<Vec<Location>>> {
        let state = self.state.read().await;
        let position = params.text_document_position;
        Ok(handlers::guarded("references", || {
            handlers::references(
                &state,
                &position.text_document.uri,
                position.position,
                params.context.include_declaration,
            )
        }))
    }

    async fn prepare_rename(
        &self,
        params: TextDocumentPositionParams,
    ) -> Result<Option<PrepareRenameResponse>> {
        let state = self.state.read().await;
        Ok(handlers::guarded("prepareRename", || {
            handlers::prepare_rename(&state, &params.text_document.uri, params.position)
        }))
    }

    async fn rename(&self, params: RenameParams) -> Result<Option<WorkspaceEdit>> {
        let state = self.state.read().await;
        let position = params.text_document_position;
        Ok(handlers::guarded("rename", || {
            handlers::rename(
                &state,
                &position.text_document.uri,
                position.position,
                &params.new_name,
            )
        }))
    }

    async fn code_action(&self, params: CodeActionParams) -> Result<Option<CodeActionResponse>> {
        self.scheduler.interrupt();
        let state = self.state.read().await;
        Ok(handlers::guarded("codeAction", || {
            handlers::code_action(
                &state,
                &self.fixes,
                &params.text_document.uri,
                &params.context.diagnostics,
            )
        }))
    }
}

pub async fn start_lsp() -> anyhow::Result<()> {
    let stdin = tokio::io::stdin();
    let stdout = tokio::io::stdout();

    let (service, socket) = LspService::build(Backend::new)
        .custom_method("grove/coreSource", Backend::core_source)
        .finish();
    Server::new(stdin, stdout, socket).serve(service).await;

    Ok(())
}
