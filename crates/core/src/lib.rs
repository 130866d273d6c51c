pub mod hierarchy;
pub mod model;
pub mod settings;
pub mod svg;
pub mod views;

#[cfg(test)]
mod testing;

pub use hierarchy::{HierarchyBuilder, find_root};
pub use model::{CallStack, Session, SessionError, SessionEvent, StatsTable};
pub use settings::Settings;
pub use views::{RenderStyle, hit_test};
