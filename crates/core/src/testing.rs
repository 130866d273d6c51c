//! Small hand-built stats tables shared by unit tests.

use crate::model::{CallStats, FunctionStats, StatsTable};

/// Build a table from `(id, cumulative)` functions and
/// `(caller, callee, edge cumulative)` edges.
pub(crate) fn table(functions: &[(&str, f64)], edges: &[(&str, &str, f64)]) -> StatsTable {
    let mut stats = StatsTable::new();
    for &(id, cumulative) in functions {
        stats.insert(
            id,
            FunctionStats {
                stats: CallStats::with_cumulative(cumulative),
                ..FunctionStats::default()
            },
        );
    }
    for &(caller, callee, time) in edges {
        stats.link(caller, callee, CallStats::with_cumulative(time));
    }
    stats
}

/// `A → B → C` with cumulative times 10 / 8 / 5.
pub(crate) fn chain() -> StatsTable {
    table(
        &[("A", 10.0), ("B", 8.0), ("C", 5.0)],
        &[("A", "B", 8.0), ("B", "C", 5.0)],
    )
}

/// `f0 → f1 → … → f{len-1}`, each function spending one second less than
/// its caller.
pub(crate) fn deep_chain(len: usize) -> StatsTable {
    let mut stats = StatsTable::new();
    let name = |i: usize| format!("f{i}");
    for i in 0..len {
        stats.insert(
            name(i),
            FunctionStats {
                stats: CallStats::with_cumulative((len - i) as f64),
                ..FunctionStats::default()
            },
        );
    }
    for i in 1..len {
        let time = (len - i) as f64;
        stats.link(&name(i - 1), &name(i), CallStats::with_cumulative(time));
    }
    stats
}
