pub mod commands;
pub mod hierarchy;
pub mod messages;
pub mod shared_str;
pub mod theme;
pub mod types;

pub use commands::{RenderCommand, TextAlign};
pub use hierarchy::HierarchyNode;
pub use messages::{HierarchyRequest, HierarchyResponse, UNBOUNDED_DEPTH};
pub use shared_str::{FunctionId, SharedStr};
pub use theme::ThemeToken;
pub use types::{Point, Rect, Viewport};
