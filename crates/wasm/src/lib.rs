use std::sync::{Arc, Mutex, MutexGuard};

use callwheel_core::hierarchy::{HierarchyBuilder, InlineBackend};
use callwheel_core::model::{Session, SessionEvent, StatsTable};
use callwheel_core::settings::Settings;
use callwheel_core::views::hit_test;
use callwheel_protocol::{HierarchyRequest, HierarchyResponse, Point, Viewport};
use wasm_bindgen::prelude::*;

/// Loaded tables by handle. Unloaded slots stay `None` so handles are never
/// reused.
static TABLES: Mutex<Vec<Option<Arc<StatsTable>>>> = Mutex::new(Vec::new());

fn tables() -> Result<MutexGuard<'static, Vec<Option<Arc<StatsTable>>>>, JsError> {
    TABLES
        .lock()
        .map_err(|_| JsError::new("stats store is poisoned"))
}

fn table(handle: usize) -> Option<Arc<StatsTable>> {
    TABLES.lock().ok()?.get(handle)?.clone()
}

fn js_error(e: impl std::fmt::Display) -> JsError {
    JsError::new(&e.to_string())
}

/// Parse a stats payload (JSON). Returns a handle for later calls.
#[wasm_bindgen]
pub fn load_stats(data: &[u8]) -> Result<usize, JsError> {
    let mut stats = StatsTable::from_json(data).map_err(js_error)?;
    stats.prune_cruft();
    let mut tables = tables()?;
    let handle = tables.len();
    tables.push(Some(Arc::new(stats)));
    Ok(handle)
}

/// Release the table behind `handle`. Sessions already created from it keep
/// working; new calls with the handle fail. Returns whether it was loaded.
#[wasm_bindgen]
pub fn unload_stats(handle: usize) -> Result<bool, JsError> {
    let mut tables = tables()?;
    Ok(tables
        .get_mut(handle)
        .and_then(Option::take)
        .is_some())
}

/// Identifier of the function a profile's hierarchy starts from.
#[wasm_bindgen]
pub fn find_root(handle: usize) -> Result<String, JsError> {
    let stats = table(handle).ok_or_else(|| JsError::new("invalid stats handle"))?;
    let root = callwheel_core::find_root(&stats).map_err(js_error)?;
    Ok(root.to_string())
}

/// Worker entry point: answer one `HierarchyRequest` (JSON) with a
/// `HierarchyResponse` (JSON). Failures are reported in the response
/// rather than thrown, so the page can show them and recycle the worker.
#[wasm_bindgen]
pub fn build_hierarchy(handle: usize, request: &str) -> String {
    let response = match respond(handle, request) {
        Ok(tree) => HierarchyResponse::Tree(tree),
        Err(message) => HierarchyResponse::Error(message),
    };
    serde_json::to_string(&response)
        .unwrap_or_else(|e| format!(r#"{{"error":"cannot encode hierarchy: {e}"}}"#))
}

fn respond(handle: usize, request: &str) -> Result<callwheel_protocol::HierarchyNode, String> {
    let request: HierarchyRequest = serde_json::from_str(request).map_err(|e| e.to_string())?;
    let stats = table(handle).ok_or_else(|| format!("invalid stats handle {handle}"))?;
    HierarchyBuilder::new(&stats)
        .build_request(&request)
        .map_err(|e| e.to_string())
}

/// Navigation state for the page: call stack, cache and the current view.
///
/// Hierarchies are built synchronously; pages that want them off the main
/// thread call [`build_hierarchy`] from a Web Worker instead.
#[wasm_bindgen]
pub struct WasmSession {
    inner: Session<InlineBackend>,
}

#[wasm_bindgen]
impl WasmSession {
    /// `settings` is optional JSON, e.g. `{"style": "icicle", "depth": 5}`.
    #[wasm_bindgen(constructor)]
    pub fn new(handle: usize, settings: Option<String>) -> Result<WasmSession, JsError> {
        let stats = table(handle).ok_or_else(|| JsError::new("invalid stats handle"))?;
        let settings = match settings {
            Some(json) => serde_json::from_str::<Settings>(&json).map_err(js_error)?,
            None => Settings::default(),
        };
        let backend = InlineBackend::new(Arc::clone(&stats));
        let inner = Session::with_backend(stats, settings, backend).map_err(js_error)?;
        Ok(Self { inner })
    }

    /// Each navigation call returns whether the displayed view changed.
    /// A failed build leaves the view alone and sets `error()`.
    pub fn load(&mut self) -> Result<bool, JsError> {
        let event = self.inner.load().map_err(js_error)?;
        Ok(self.settle(event))
    }

    pub fn click(&mut self, node: usize) -> Result<bool, JsError> {
        let event = self.inner.click(node).map_err(js_error)?;
        Ok(self.settle(event))
    }

    pub fn reset(&mut self) -> Result<bool, JsError> {
        let event = self.inner.reset().map_err(js_error)?;
        Ok(self.settle(event))
    }

    /// Throws on an unknown style name.
    pub fn set_style(&mut self, style: &str) -> Result<bool, JsError> {
        let event = self.inner.set_style(style).map_err(js_error)?;
        Ok(self.settle(event))
    }

    pub fn set_depth(&mut self, depth: u32) -> Result<bool, JsError> {
        let event = self.inner.set_depth(depth).map_err(js_error)?;
        Ok(self.settle(event))
    }

    pub fn set_cutoff(&mut self, cutoff: f64) -> Result<bool, JsError> {
        let event = self.inner.set_cutoff(cutoff).map_err(js_error)?;
        Ok(self.settle(event))
    }

    fn settle(&mut self, event: Option<SessionEvent>) -> bool {
        let event = event.or_else(|| self.inner.poll());
        matches!(event, Some(SessionEvent::Displayed { .. }))
    }

    /// Render commands for the current view as JSON.
    pub fn render(&self, width: f64, height: f64) -> Result<String, JsError> {
        let commands = self.inner.render(&Viewport::new(width, height));
        serde_json::to_string(&commands).map_err(js_error)
    }

    /// Node under `(x, y)` in a view of the given size.
    pub fn hit_test(&self, x: f64, y: f64, width: f64, height: f64) -> Option<usize> {
        let commands = self.inner.render(&Viewport::new(width, height));
        hit_test(&commands, Point::new(x, y))
    }

    pub fn hover(&mut self, node: Option<usize>) {
        self.inner.hover(node);
    }

    /// Call stack as `[[position, short name], ...]`, top first.
    pub fn stack(&self) -> Result<String, JsError> {
        serde_json::to_string(&self.inner.stack().listing()).map_err(js_error)
    }

    /// Info panel contents for a node as JSON, `null` if there is none.
    pub fn info(&self, node: usize) -> Result<String, JsError> {
        serde_json::to_string(&self.inner.info(node)).map_err(js_error)
    }

    pub fn can_reset(&self) -> bool {
        self.inner.can_reset()
    }

    pub fn error(&self) -> Option<String> {
        self.inner.error().map(str::to_string)
    }

    pub fn dismiss_error(&mut self) {
        self.inner.dismiss_error();
    }
}
