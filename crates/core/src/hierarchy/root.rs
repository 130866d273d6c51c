use std::collections::BTreeSet;

use callwheel_protocol::FunctionId;

use crate::model::{StatsError, StatsTable};

/// Pick the function a profile's hierarchy starts from.
///
/// Candidates are functions that call something but are never called.
/// Among several, the one with the greatest cumulative time wins (ties go
/// to the first in identifier order). When mutual recursion hides every
/// entry point, functions without any recorded caller are preferred, and
/// failing that the whole table is searched by cumulative time.
pub fn find_root(stats: &StatsTable) -> Result<FunctionId, StatsError> {
    if stats.is_empty() {
        return Err(StatsError::EmptyProfile);
    }

    let mut callers: BTreeSet<&FunctionId> = BTreeSet::new();
    let mut callees: BTreeSet<&FunctionId> = BTreeSet::new();
    for (id, function) in stats.iter() {
        if !function.children.is_empty() {
            callers.insert(id);
        }
        if !function.callers.is_empty() {
            callees.insert(id);
        }
        callers.extend(function.callers.keys());
        callees.extend(function.children.iter());
    }

    let entry_points = callers
        .difference(&callees)
        .copied()
        .filter(|id| stats.contains(id));
    if let Some(root) = heaviest(stats, entry_points) {
        return Ok(root);
    }

    let uncalled = stats.iter().map(|(id, _)| id).filter(|id| !callees.contains(id));
    if let Some(root) = heaviest(stats, uncalled) {
        return Ok(root);
    }

    heaviest(stats, stats.iter().map(|(id, _)| id)).ok_or(StatsError::EmptyProfile)
}

fn heaviest<'a>(
    stats: &StatsTable,
    candidates: impl Iterator<Item = &'a FunctionId>,
) -> Option<FunctionId> {
    let mut best: Option<(&FunctionId, f64)> = None;
    for id in candidates {
        let time = stats.cumulative(id).unwrap_or(0.0);
        match best {
            Some((_, best_time)) if time <= best_time => {}
            _ => best = Some((id, time)),
        }
    }
    best.map(|(id, _)| id.clone())
}
