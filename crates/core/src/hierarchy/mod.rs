//! Stats table → weighted tree, and the machinery around building one.

pub mod builder;
pub mod cache;
pub mod root;
pub mod worker;

pub use builder::{BuildError, HierarchyBuilder, MAX_LEVELS, ROOT_SIZE};
pub use cache::{HierarchyCache, RequestKey};
pub use root::find_root;
pub use worker::{HierarchyBackend, HierarchyWorker, InlineBackend, WorkerError, WorkerOutput};
