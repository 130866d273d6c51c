pub mod call_stack;
pub mod flat_tree;
pub mod session;
pub mod stats;

pub use call_stack::{CallStack, NavigationError};
pub use flat_tree::{FlatNode, FlatTree};
pub use session::{NodeInfo, Session, SessionError, SessionEvent};
pub use stats::{CallStats, FunctionInfo, FunctionStats, StatsError, StatsTable, short_name};
