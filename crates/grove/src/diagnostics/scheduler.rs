//
// diagnostics/scheduler.rs
//
// Debounced, cancellable diagnostics batches
//
// The scheduler is a small state machine driven by two inputs: `advance`
// (new work or a finished step) and `cancel` (an interactive request wants
// the analysis lock). Work happens in batches: after a quiet period the
// queued files, then every open file, are analysed one at a time with a
// short pause in between. A batch publishes only after its last file, and
// only if no edit happened while it ran.
//

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tower_lsp::lsp_types::{Diagnostic, Url};

use super::{AnalyzedFile, DiagnosticKind, FileDiagnostics};

/// Upper bound on the pause between two files of a batch.
pub const MAX_INTER_FILE_DELAY_MS: u64 = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Quiet period after the last request before a batch starts
    pub debounce_ms: u64,
    /// Pause between two files of a batch
    pub inter_file_delay_ms: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 200,
            inter_file_delay_ms: 50,
        }
    }
}

impl SchedulerConfig {
    fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    fn inter_file_delay(&self) -> Duration {
        Duration::from_millis(self.inter_file_delay_ms.min(MAX_INTER_FILE_DELAY_MS))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    /// Nothing queued
    Idle,
    /// Files queued, no timer armed
    Pending,
    /// Debounce timer armed
    Delayed,
    /// A batch is being analysed
    Running,
}

/// What the scheduler needs from the server around it.
#[async_trait]
pub trait DiagnosticsHost: Send + Sync + 'static {
    /// Current value of the edit counter.
    fn change_seq(&self) -> u64;

    /// Open documents, in the order they were opened.
    async fn open_files(&self) -> Vec<Url>;

    /// Analyse one file against the current forest. `None` when the file
    /// is gone or read-only.
    async fn analyze(&self, uri: &Url) -> Option<AnalyzedFile>;

    async fn publish(&self, uri: Url, diagnostics: Vec<Diagnostic>);
}

struct Inner {
    state: SchedulerState,
    config: SchedulerConfig,
    /// Files waiting for the next batch, with their first request time
    queue: Vec<(Url, Instant)>,
    /// Cancels the armed timer or the batch in flight
    token: Option<CancellationToken>,
    /// Identifies the current timer or batch; a step whose generation is
    /// out of date must not touch the state
    generation: u64,
    /// Files of the batch in flight
    batch: Vec<(Url, Instant)>,
    store: HashMap<Url, FileDiagnostics>,
    /// Last list sent to the client per file
    published: HashMap<Url, Vec<Diagnostic>>,
}

impl Inner {
    fn enqueue(&mut self, uri: Url, at: Instant) {
        if !self.queue.iter().any(|(u, _)| *u == uri) {
            self.queue.push((uri, at));
        }
    }

    /// Put the files of an aborted batch back, ahead of newer requests.
    fn requeue_batch(&mut self) {
        let mut batch = std::mem::take(&mut self.batch);
        batch.retain(|(uri, _)| !self.queue.iter().any(|(u, _)| u == uri));
        batch.append(&mut self.queue);
        self.queue = batch;
    }

    fn settle(&mut self) {
        self.token = None;
        self.state = if self.queue.is_empty() {
            SchedulerState::Idle
        } else {
            SchedulerState::Pending
        };
    }

    /// Merged diagnostics of `uri` if they differ from what was last sent.
    fn changed(&mut self, uri: &Url) -> Option<Vec<Diagnostic>> {
        let merged = self
            .store
            .get(uri)
            .map(FileDiagnostics::merged)
            .unwrap_or_default();
        let previous = self.published.get(uri).map(Vec::as_slice).unwrap_or(&[]);
        if previous == merged.as_slice() {
            return None;
        }
        if merged.is_empty() {
            self.published.remove(uri);
        } else {
            self.published.insert(uri.clone(), merged.clone());
        }
        Some(merged)
    }
}

pub struct DiagnosticsScheduler<H: DiagnosticsHost> {
    host: Arc<H>,
    inner: Mutex<Inner>,
}

impl<H: DiagnosticsHost> DiagnosticsScheduler<H> {
    pub fn new(host: Arc<H>, config: SchedulerConfig) -> Arc<Self> {
        Arc::new(Self {
            host,
            inner: Mutex::new(Inner {
                state: SchedulerState::Idle,
                config,
                queue: Vec::new(),
                token: None,
                generation: 0,
                batch: Vec::new(),
                store: HashMap::new(),
                published: HashMap::new(),
            }),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn state(&self) -> SchedulerState {
        self.lock().state
    }

    pub fn set_config(&self, config: SchedulerConfig) {
        self.lock().config = config;
    }

    /// Files waiting for the next batch, oldest request first.
    pub fn queued(&self) -> Vec<Url> {
        self.lock().queue.iter().map(|(uri, _)| uri.clone()).collect()
    }

    /// Queue files for analysis and restart the quiet period.
    pub fn request(self: &Arc<Self>, uris: impl IntoIterator<Item = Url>) {
        {
            let mut inner = self.lock();
            let now = Instant::now();
            for uri in uris {
                inner.enqueue(uri, now);
            }
            if inner.state == SchedulerState::Idle && !inner.queue.is_empty() {
                inner.state = SchedulerState::Pending;
            }
        }
        self.advance();
    }

    /// The `advance` input: arm (or re-arm) the debounce timer when there
    /// is queued work. A running batch is left alone; it notices edits by
    /// itself and advances again when it ends.
    pub fn advance(self: &Arc<Self>) {
        let mut inner = self.lock();
        match inner.state {
            SchedulerState::Idle | SchedulerState::Running => return,
            SchedulerState::Pending | SchedulerState::Delayed => {}
        }
        if inner.queue.is_empty() {
            inner.settle();
            return;
        }
        if let Some(token) = inner.token.take() {
            token.cancel();
        }
        inner.generation += 1;
        let generation = inner.generation;
        let token = CancellationToken::new();
        inner.token = Some(token.clone());
        inner.state = SchedulerState::Delayed;
        let debounce = inner.config.debounce();
        drop(inner);

        log::trace!("diagnostics: delayed {:?} (generation {})", debounce, generation);
        let this = Arc::clone(self);
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(debounce) => this.run(generation, token.clone()).await,
            }
        });
    }

    /// The `cancel` input: abort the armed timer or the batch in flight.
    /// Whatever the batch computed so far is dropped and its files go back
    /// to the front of the queue.
    pub fn cancel(&self) {
        let mut inner = self.lock();
        if !matches!(
            inner.state,
            SchedulerState::Delayed | SchedulerState::Running
        ) {
            return;
        }
        if let Some(token) = inner.token.take() {
            token.cancel();
        }
        inner.generation += 1;
        inner.requeue_batch();
        log::trace!(
            "diagnostics: cancelled in {:?}, {} file(s) requeued",
            inner.state,
            inner.queue.len()
        );
        inner.settle();
    }

    /// Cancel, then schedule the cancelled work again.
    pub fn interrupt(self: &Arc<Self>) {
        self.cancel();
        self.advance();
    }

    async fn run(self: Arc<Self>, generation: u64, token: CancellationToken) {
        let open = self.host.open_files().await;
        let (files, seq, delay) = {
            let mut inner = self.lock();
            if inner.generation != generation || token.is_cancelled() {
                return;
            }
            let mut batch = std::mem::take(&mut inner.queue);
            batch.sort_by_key(|(_, at)| *at);
            let now = Instant::now();
            for uri in open {
                if !batch.iter().any(|(u, _)| *u == uri) {
                    batch.push((uri, now));
                }
            }
            inner.batch = batch;
            inner.state = SchedulerState::Running;
            let files: Vec<Url> = inner.batch.iter().map(|(uri, _)| uri.clone()).collect();
            (files, self.host.change_seq(), inner.config.inter_file_delay())
        };
        log::trace!(
            "diagnostics: running {} file(s) at seq {} (generation {})",
            files.len(),
            seq,
            generation
        );

        let mut results: Vec<(Url, Option<AnalyzedFile>)> = Vec::with_capacity(files.len());
        for (i, uri) in files.iter().enumerate() {
            if i > 0 {
                tokio::select! {
                    _ = token.cancelled() => {}
                    _ = tokio::time::sleep(delay) => {}
                }
            }
            if token.is_cancelled() {
                log::trace!("diagnostics: batch {} cancelled", generation);
                return;
            }
            if self.host.change_seq() != seq {
                self.abandon(generation, seq);
                return;
            }
            results.push((uri.clone(), self.host.analyze(uri).await));
        }
        if self.host.change_seq() != seq {
            self.abandon(generation, seq);
            return;
        }

        let outgoing = {
            let mut inner = self.lock();
            if inner.generation != generation || token.is_cancelled() {
                return;
            }
            let mut outgoing = Vec::new();
            for (uri, analyzed) in results {
                let entry = inner.store.entry(uri.clone()).or_default();
                match analyzed {
                    Some(kinds) => {
                        for (kind, diagnostics) in kinds {
                            entry.set(kind, diagnostics);
                        }
                    }
                    None => {
                        for kind in DiagnosticKind::ANALYZED {
                            entry.set(kind, Vec::new());
                        }
                    }
                }
                if let Some(diagnostics) = inner.changed(&uri) {
                    outgoing.push((uri, diagnostics));
                }
            }
            inner.batch.clear();
            inner.settle();
            outgoing
        };
        log::trace!(
            "diagnostics: batch {} done, publishing {} file(s)",
            generation,
            outgoing.len()
        );
        for (uri, diagnostics) in outgoing {
            self.host.publish(uri, diagnostics).await;
        }
        self.advance();
    }

    /// An edit happened while the batch ran: drop its results and queue
    /// its files again.
    fn abandon(self: &Arc<Self>, generation: u64, seq: u64) {
        {
            let mut inner = self.lock();
            if inner.generation != generation {
                return;
            }
            log::trace!(
                "diagnostics: batch {} stale (started at seq {}, now {})",
                generation,
                seq,
                self.host.change_seq()
            );
            inner.generation += 1;
            inner.requeue_batch();
            inner.settle();
        }
        self.advance();
    }

    /// Replace one kind for many files at once; files that had diagnostics
    /// of that kind and are missing from `by_uri` are cleared.
    pub async fn replace_kind(
        &self,
        kind: DiagnosticKind,
        mut by_uri: HashMap<Url, Vec<Diagnostic>>,
    ) {
        let outgoing = {
            let mut inner = self.lock();
            let stale: Vec<Url> = inner
                .store
                .iter()
                .filter(|(uri, file)| !file.get(kind).is_empty() && !by_uri.contains_key(*uri))
                .map(|(uri, _)| uri.clone())
                .collect();
            for uri in stale {
                by_uri.insert(uri, Vec::new());
            }
            let mut outgoing = Vec::new();
            for (uri, diagnostics) in by_uri {
                inner.store.entry(uri.clone()).or_default().set(kind, diagnostics);
                if let Some(diagnostics) = inner.changed(&uri) {
                    outgoing.push((uri, diagnostics));
                }
            }
            outgoing
        };
        for (uri, diagnostics) in outgoing {
            self.host.publish(uri, diagnostics).await;
        }
    }

    /// Drop everything known about `uri`, clearing it on the client if
    /// anything was shown.
    pub async fn forget(&self, uri: &Url) {
        let cleared = {
            let mut inner = self.lock();
            inner.store.remove(uri);
            inner.queue.retain(|(u, _)| u != uri);
            inner.changed(uri).is_some()
        };
        if cleared {
            self.host.publish(uri.clone(), Vec::new()).await;
        }
    }

    /// Drop the in-process analysis of `uri` but keep its `External`
    /// diagnostics, which stay valid until the next compile.
    pub async fn clear_analysis(&self, uri: &Url) {
        let outgoing = {
            let mut inner = self.lock();
            inner.queue.retain(|(u, _)| u != uri);
            if let Some(file) = inner.store.get_mut(uri) {
                for kind in DiagnosticKind::ANALYZED {
                    file.set(kind, Vec::new());
                }
                if file.is_empty() {
                    inner.store.remove(uri);
                }
            }
            inner.changed(uri)
        };
        if let Some(diagnostics) = outgoing {
            self.host.publish(uri.clone(), diagnostics).await;
        }
    }

    /// Diagnostics last published for `uri`.
    pub fn published(&self, uri: &Url) -> Vec<Diagnostic> {
        self.lock().published.get(uri).cloned().unwrap_or_default()
    }
}
