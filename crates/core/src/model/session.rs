use std::sync::Arc;
use std::time::Duration;

use callwheel_protocol::{
    FunctionId, HierarchyNode, HierarchyRequest, RenderCommand, SharedStr, Viewport,
};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::call_stack::{CallStack, NavigationError};
use super::flat_tree::FlatTree;
use super::stats::{FunctionInfo, StatsError, StatsTable};
use crate::hierarchy::{
    HierarchyBackend, HierarchyCache, HierarchyWorker, InlineBackend, RequestKey, WorkerError,
    WorkerOutput, find_root,
};
use crate::settings::{Settings, SettingsError};
use crate::views::{RenderStrategy, RenderStyle, StyleError};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Stats(#[from] StatsError),
    #[error(transparent)]
    Worker(#[from] WorkerError),
    #[error(transparent)]
    Navigation(#[from] NavigationError),
    #[error(transparent)]
    Settings(#[from] SettingsError),
    #[error(transparent)]
    Style(#[from] StyleError),
    #[error("no hierarchy is displayed yet")]
    NoView,
}

/// What applying a worker output did to the session.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// A new hierarchy is displayed and the call stack moved with it.
    Displayed { cached: bool },
    /// The request failed; the previous view and stack are kept.
    Failed(String),
    /// The output answered a request that has since been replaced.
    Discarded,
}

/// Hover/info panel contents for one displayed node.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeInfo {
    pub name: FunctionId,
    pub display_name: SharedStr,
    /// `None` when the identifier is not of the `file:line(function)` form.
    pub location: Option<FunctionInfo>,
    pub cumulative: f64,
    pub cumulative_percent: f64,
}

struct Displayed {
    key: RequestKey,
    tree: Arc<HierarchyNode>,
    flat: FlatTree,
}

/// A request in flight and the stack to adopt if it succeeds.
struct Pending {
    key: RequestKey,
    stack: CallStack,
}

/// Navigation state for one loaded profile.
///
/// The call stack only ever changes together with the displayed hierarchy:
/// a click computes a proposed stack, and that stack is committed when the
/// matching tree is displayed (immediately on a cache hit, otherwise when
/// the backend answers). A failed request leaves both untouched.
pub struct Session<B: HierarchyBackend = HierarchyWorker> {
    stats: Arc<StatsTable>,
    total_time: f64,
    stack: CallStack,
    cache: HierarchyCache,
    backend: B,
    settings: Settings,
    strategy: Box<dyn RenderStrategy + Send + Sync>,
    displayed: Option<Displayed>,
    pending: Option<Pending>,
    error: Option<String>,
    hovered: Option<usize>,
    url: Option<String>,
}

impl Session {
    /// A session computing hierarchies on background threads.
    pub fn new(stats: StatsTable, settings: Settings) -> Result<Self, SessionError> {
        let stats = Arc::new(stats);
        let backend = HierarchyWorker::new(Arc::clone(&stats));
        Self::with_backend(stats, settings, backend)
    }
}

impl Session<InlineBackend> {
    /// A session that builds hierarchies on the calling thread.
    pub fn inline(stats: StatsTable, settings: Settings) -> Result<Self, SessionError> {
        let stats = Arc::new(stats);
        let backend = InlineBackend::new(Arc::clone(&stats));
        Self::with_backend(stats, settings, backend)
    }
}

impl<B: HierarchyBackend> Session<B> {
    pub fn with_backend(
        stats: Arc<StatsTable>,
        settings: Settings,
        backend: B,
    ) -> Result<Self, SessionError> {
        settings.validate()?;
        let root = find_root(&stats)?;
        let total_time = stats.cumulative(&root).unwrap_or(0.0);
        info!(
            root = %root,
            functions = stats.len(),
            total_time,
            style = %settings.style,
            "session created"
        );
        Ok(Self {
            stats,
            total_time,
            stack: CallStack::new(root),
            cache: HierarchyCache::new(),
            backend,
            strategy: settings.style.strategy(),
            settings,
            displayed: None,
            pending: None,
            error: None,
            hovered: None,
            url: None,
        })
    }

    /// Locator forwarded with every request; not interpreted here.
    pub fn set_url(&mut self, url: Option<String>) {
        self.url = url;
    }

    /// Request the view for the current call stack.
    pub fn load(&mut self) -> Result<Option<SessionEvent>, SessionError> {
        self.request(self.stack.clone())
    }

    /// Zoom on node `index` of the displayed hierarchy.
    ///
    /// Returns the event when the view changed synchronously (cache hit),
    /// `None` when a request was handed to the backend.
    pub fn click(&mut self, index: usize) -> Result<Option<SessionEvent>, SessionError> {
        let flat = &self.displayed.as_ref().ok_or(SessionError::NoView)?.flat;
        let mut proposed = self.stack.clone();
        proposed.update(flat, index)?;
        debug!(index, stack = proposed.len(), "node clicked");
        self.request(proposed)
    }

    /// Return to the profile's root.
    pub fn reset(&mut self) -> Result<Option<SessionEvent>, SessionError> {
        self.request(CallStack::new(self.stack.root().clone()))
    }

    /// Apply new settings and re-request the current view with them.
    pub fn set_settings(
        &mut self,
        settings: Settings,
    ) -> Result<Option<SessionEvent>, SessionError> {
        settings.validate()?;
        self.backend.cycle();
        self.pending = None;
        self.error = None;
        if settings.style != self.settings.style {
            self.strategy = settings.style.strategy();
        }
        self.settings = settings;
        self.request(self.stack.clone())
    }

    pub fn set_style(&mut self, style: &str) -> Result<Option<SessionEvent>, SessionError> {
        let style: RenderStyle = style.parse()?;
        self.set_settings(Settings {
            style,
            ..self.settings
        })
    }

    pub fn set_depth(&mut self, depth: u32) -> Result<Option<SessionEvent>, SessionError> {
        self.set_settings(Settings {
            depth,
            ..self.settings
        })
    }

    pub fn set_cutoff(&mut self, cutoff: f64) -> Result<Option<SessionEvent>, SessionError> {
        self.set_settings(Settings {
            cutoff,
            ..self.settings
        })
    }

    /// Apply the backend's answer if it is ready.
    pub fn poll(&mut self) -> Option<SessionEvent> {
        let output = self.backend.try_recv()?;
        Some(self.apply(output))
    }

    /// Like [`Session::poll`], blocking up to `timeout`.
    pub fn wait(&mut self, timeout: Duration) -> Option<SessionEvent> {
        let output = self.backend.recv_timeout(timeout)?;
        Some(self.apply(output))
    }

    fn request(&mut self, stack: CallStack) -> Result<Option<SessionEvent>, SessionError> {
        let key = RequestKey::new(
            stack.top().clone(),
            stack.parent().cloned(),
            self.settings.depth,
            self.settings.cutoff,
        );

        if let Some(tree) = self.cache.get(&key) {
            // Whatever is in flight would now be stale.
            self.backend.cycle();
            self.pending = None;
            self.commit(key, tree, stack);
            return Ok(Some(SessionEvent::Displayed { cached: true }));
        }

        let request = HierarchyRequest {
            depth: key.depth,
            cutoff: key.cutoff(),
            name: key.root.clone(),
            parent_name: key.parent.clone(),
            url: self.url.clone(),
        };
        self.backend.submit(request)?;
        self.pending = Some(Pending { key, stack });
        Ok(None)
    }

    fn apply(&mut self, output: WorkerOutput) -> SessionEvent {
        let Some(pending) = self.pending.take_if(|p| p.key == output.key) else {
            warn!(key = %output.key, generation = output.generation, "discarding stale hierarchy");
            return SessionEvent::Discarded;
        };

        match output.result {
            Ok(tree) => {
                let tree = Arc::new(tree);
                self.cache.put(pending.key.clone(), Arc::clone(&tree));
                self.commit(pending.key, tree, pending.stack);
                SessionEvent::Displayed { cached: false }
            }
            Err(err) => {
                let message = err.to_string();
                self.backend.cycle();
                self.error = Some(message.clone());
                SessionEvent::Failed(message)
            }
        }
    }

    fn commit(&mut self, key: RequestKey, tree: Arc<HierarchyNode>, stack: CallStack) {
        debug!(%key, nodes = tree.node_count(), "hierarchy displayed");
        let flat = FlatTree::from_hierarchy(&tree);
        self.displayed = Some(Displayed { key, tree, flat });
        self.stack = stack;
        self.hovered = None;
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn dismiss_error(&mut self) {
        self.error = None;
    }

    pub fn displayed(&self) -> Option<&Arc<HierarchyNode>> {
        self.displayed.as_ref().map(|d| &d.tree)
    }

    pub fn displayed_key(&self) -> Option<&RequestKey> {
        self.displayed.as_ref().map(|d| &d.key)
    }

    pub fn flat(&self) -> Option<&FlatTree> {
        self.displayed.as_ref().map(|d| &d.flat)
    }

    pub fn stack(&self) -> &CallStack {
        &self.stack
    }

    /// Whether there is anywhere to reset to.
    pub fn can_reset(&self) -> bool {
        self.stack.len() > 1
    }

    pub fn is_loading(&self) -> bool {
        self.pending.is_some()
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn stats(&self) -> &StatsTable {
        &self.stats
    }

    /// Cumulative time of the profile's root.
    pub fn total_time(&self) -> f64 {
        self.total_time
    }

    pub fn cache(&self) -> &HierarchyCache {
        &self.cache
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn info(&self, index: usize) -> Option<NodeInfo> {
        let node = self.flat()?.get(index)?;
        let cumulative_percent = if self.total_time > 0.0 {
            node.cumulative / self.total_time * 100.0
        } else {
            0.0
        };
        Some(NodeInfo {
            name: node.name.clone(),
            display_name: node.display_name.clone(),
            location: FunctionInfo::parse(&node.name),
            cumulative: node.cumulative,
            cumulative_percent,
        })
    }

    pub fn hover(&mut self, index: Option<usize>) {
        self.hovered = index.filter(|&i| self.flat().is_some_and(|f| i < f.len()));
    }

    pub fn hovered(&self) -> Option<usize> {
        self.hovered
    }

    /// Draw the displayed hierarchy with the configured style.
    pub fn render(&self, viewport: &Viewport) -> Vec<RenderCommand> {
        match self.flat() {
            Some(flat) => self
                .strategy
                .draw(flat, viewport, self.settings.cutoff, self.hovered),
            None => Vec::new(),
        }
    }
}
