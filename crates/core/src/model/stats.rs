use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use callwheel_protocol::{FunctionId, SharedStr};
use serde::{Deserialize, Deserializer, Serialize, de};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StatsError {
    #[error("invalid stats JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("profile contains no functions")]
    EmptyProfile,
}

/// One profiler timing tuple: `[calls, primitive_calls, total_time, cumulative_time]`.
///
/// Used both for a function's own totals and for a single caller → callee
/// edge, where the times are the share attributable to that caller.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "(u64, u64, f64, f64)", into = "(u64, u64, f64, f64)")]
pub struct CallStats {
    pub calls: u64,
    /// Calls that were not recursive re-entries.
    pub primitive_calls: u64,
    /// Time spent in the function body only.
    pub total_time: f64,
    /// Time including everything the function called.
    pub cumulative_time: f64,
}

impl CallStats {
    pub fn with_cumulative(cumulative_time: f64) -> Self {
        Self {
            calls: 1,
            primitive_calls: 1,
            total_time: 0.0,
            cumulative_time,
        }
    }
}

impl From<(u64, u64, f64, f64)> for CallStats {
    fn from((calls, primitive_calls, total_time, cumulative_time): (u64, u64, f64, f64)) -> Self {
        Self {
            calls,
            primitive_calls,
            total_time,
            cumulative_time,
        }
    }
}

impl From<CallStats> for (u64, u64, f64, f64) {
    fn from(s: CallStats) -> Self {
        (s.calls, s.primitive_calls, s.total_time, s.cumulative_time)
    }
}

/// Everything the profiler recorded about one function.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FunctionStats {
    pub stats: CallStats,
    /// Caller id → the part of this function's time attributable to that caller.
    #[serde(default)]
    pub callers: BTreeMap<FunctionId, CallStats>,
    /// Callees, in traversal order. Accepted as a list of ids or as a map
    /// keyed by id (values ignored, key order kept).
    #[serde(default, deserialize_with = "deserialize_children")]
    pub children: Vec<FunctionId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<SharedStr>,
}

fn deserialize_children<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<FunctionId>, D::Error> {
    struct Visitor;

    impl<'de> de::Visitor<'de> for Visitor {
        type Value = Vec<FunctionId>;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a list of function ids or a map keyed by function id")
        }

        fn visit_seq<A: de::SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
            let mut ids = Vec::with_capacity(seq.size_hint().unwrap_or(0));
            while let Some(id) = seq.next_element()? {
                ids.push(id);
            }
            Ok(ids)
        }

        // Keys are kept in document order; a repeated key keeps its first position.
        fn visit_map<A: de::MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
            let mut ids: Vec<FunctionId> = Vec::with_capacity(map.size_hint().unwrap_or(0));
            while let Some((id, _)) = map.next_entry::<FunctionId, de::IgnoredAny>()? {
                if !ids.contains(&id) {
                    ids.push(id);
                }
            }
            Ok(ids)
        }
    }

    d.deserialize_any(Visitor)
}

/// The flat caller/callee statistics table of one loaded profile.
///
/// Keys are ordered, so every traversal (and therefore every built
/// hierarchy) is deterministic. Read-only once loaded; hierarchy builds
/// share it behind an `Arc`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StatsTable {
    functions: BTreeMap<FunctionId, FunctionStats>,
}

impl StatsTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse the stats payload served for a profile.
    pub fn from_json(data: &[u8]) -> Result<Self, StatsError> {
        Ok(serde_json::from_slice(data)?)
    }

    pub fn insert(&mut self, id: impl Into<FunctionId>, stats: FunctionStats) {
        self.functions.insert(id.into(), stats);
    }

    /// Record that `caller` called `callee`, keeping both directions of the
    /// edge consistent. Both functions must already be present.
    pub fn link(&mut self, caller: &str, callee: &str, edge: CallStats) -> bool {
        let (Some(caller_id), Some(callee_id)) = (self.key(caller), self.key(callee)) else {
            return false;
        };
        if let Some(entry) = self.functions.get_mut(callee) {
            entry.callers.insert(caller_id, edge);
        }
        if let Some(entry) = self.functions.get_mut(caller)
            && !entry.children.contains(&callee_id)
        {
            entry.children.push(callee_id);
        }
        true
    }

    fn key(&self, id: &str) -> Option<FunctionId> {
        self.functions.get_key_value(id).map(|(k, _)| k.clone())
    }

    pub fn get(&self, id: &str) -> Option<&FunctionStats> {
        self.functions.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.functions.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&FunctionId, &FunctionStats)> {
        self.functions.iter()
    }

    pub fn cumulative(&self, id: &str) -> Option<f64> {
        self.get(id).map(|f| f.stats.cumulative_time)
    }

    /// The part of `callee`'s time attributable to calls from `caller`.
    pub fn caller_edge(&self, callee: &str, caller: &str) -> Option<&CallStats> {
        self.get(callee).and_then(|f| f.callers.get(caller))
    }

    /// Label for display: the recorded display name, else the identifier
    /// with its directory stripped.
    pub fn display_name(&self, id: &FunctionId) -> SharedStr {
        match self.get(id).and_then(|f| f.display_name.clone()) {
            Some(name) => name,
            None => SharedStr::from(short_name(id)),
        }
    }

    /// Remove functions that neither call anything nor are called by
    /// anything. Returns how many entries were dropped.
    pub fn prune_cruft(&mut self) -> usize {
        let called: BTreeSet<FunctionId> = self
            .functions
            .values()
            .flat_map(|f| f.children.iter().cloned())
            .collect();
        let before = self.functions.len();
        self.functions
            .retain(|id, f| !f.children.is_empty() || called.contains(id));
        before - self.functions.len()
    }
}

/// A function identifier split into its parts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FunctionInfo {
    /// Directory including the trailing separator, empty if none.
    pub directory: String,
    pub file: String,
    pub line: u32,
    pub name: String,
}

impl FunctionInfo {
    /// Split `path/to/file.py:42(func)`. Returns `None` for identifiers
    /// without the `:line(name)` suffix.
    pub fn parse(id: &str) -> Option<Self> {
        let body = id.strip_suffix(')')?;
        // Rightmost `:<digits>(` wins; paths may contain colons.
        let (path, line, name) = body.match_indices('(').rev().find_map(|(open, _)| {
            let location = &body[..open];
            let colon = location.rfind(':')?;
            let digits = &location[colon + 1..];
            if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
                return None;
            }
            let line: u32 = digits.parse().ok()?;
            Some((&location[..colon], line, &body[open + 1..]))
        })?;

        let (directory, file) = match path.rfind(['/', '\\']) {
            Some(slash) => (&path[..=slash], &path[slash + 1..]),
            None => ("", path),
        };
        Some(Self {
            directory: directory.to_string(),
            file: file.to_string(),
            line,
            name: name.to_string(),
        })
    }
}

/// The identifier with any leading directories removed.
pub fn short_name(id: &str) -> &str {
    match id.rfind('/') {
        Some(slash) => &id[slash + 1..],
        None => id,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAYLOAD: &str = r#"{
        "app.py:1(main)": {
            "stats": [1, 1, 0.5, 10.0],
            "callers": {},
            "children": {"app.py:9(work)": [2, 2, 1.0, 8.0]},
            "display_name": "main"
        },
        "app.py:9(work)": {
            "stats": [2, 2, 8.0, 8.0],
            "callers": {"app.py:1(main)": [2, 2, 8.0, 8.0]},
            "children": []
        },
        "~:0(<method 'disable'>)": {
            "stats": [1, 1, 0.0, 0.0],
            "callers": {},
            "children": []
        }
    }"#;

    #[test]
    fn parses_server_payload() {
        let stats = StatsTable::from_json(PAYLOAD.as_bytes()).unwrap();
        assert_eq!(stats.len(), 3);
        assert_eq!(stats.cumulative("app.py:1(main)"), Some(10.0));
        let main = stats.get("app.py:1(main)").unwrap();
        assert_eq!(main.children, vec![FunctionId::from("app.py:9(work)")]);
        let edge = stats.caller_edge("app.py:9(work)", "app.py:1(main)").unwrap();
        assert_eq!(edge.calls, 2);
        assert_eq!(edge.cumulative_time, 8.0);
    }

    #[test]
    fn map_children_keep_payload_order() {
        let stats = StatsTable::from_json(
            br#"{
                "m.py:1(main)": {
                    "stats": [1, 1, 0.0, 3.0],
                    "children": {"m.py:9(zeta)": [1, 1, 1.0, 1.0], "m.py:5(alpha)": {}, "m.py:9(zeta)": null}
                },
                "m.py:2(list)": {"stats": [1, 1, 0.0, 0.0], "children": ["m.py:9(zeta)", "m.py:5(alpha)"]}
            }"#,
        )
        .unwrap();
        let expected = [FunctionId::from("m.py:9(zeta)"), FunctionId::from("m.py:5(alpha)")];
        assert_eq!(stats.get("m.py:1(main)").unwrap().children, expected);
        assert_eq!(stats.get("m.py:2(list)").unwrap().children, expected);
        assert!(StatsTable::from_json(br#"{"f": {"stats": [1, 1, 0, 0], "children": 3}}"#).is_err());
    }

    #[test]
    fn display_name_falls_back_to_short_identifier() {
        let mut stats = StatsTable::new();
        stats.insert("/usr/lib/x.py:3(f)", FunctionStats::default());
        assert_eq!(stats.display_name(&"/usr/lib/x.py:3(f)".into()), "x.py:3(f)");
        let stats = StatsTable::from_json(PAYLOAD.as_bytes()).unwrap();
        assert_eq!(stats.display_name(&"app.py:1(main)".into()), "main");
    }

    #[test]
    fn prune_drops_isolated_functions() {
        let mut stats = StatsTable::from_json(PAYLOAD.as_bytes()).unwrap();
        assert_eq!(stats.prune_cruft(), 1);
        assert!(!stats.contains("~:0(<method 'disable'>)"));
        assert!(stats.contains("app.py:9(work)"));
    }

    #[test]
    fn malformed_payload_is_an_error() {
        let err = StatsTable::from_json(b"{\"f\": {\"stats\": [1, 2]}}").unwrap_err();
        assert!(matches!(err, StatsError::Json(_)));
    }

    #[test]
    fn link_keeps_both_directions() {
        let mut stats = StatsTable::new();
        stats.insert("a", FunctionStats::default());
        stats.insert("b", FunctionStats::default());
        assert!(stats.link("a", "b", CallStats::with_cumulative(3.0)));
        assert!(stats.link("a", "b", CallStats::with_cumulative(3.0)));
        assert!(!stats.link("a", "missing", CallStats::default()));
        assert_eq!(stats.get("a").unwrap().children.len(), 1);
        assert_eq!(stats.caller_edge("b", "a").map(|e| e.cumulative_time), Some(3.0));
    }

    #[test]
    fn function_info_parsing() {
        let info = FunctionInfo::parse("/home/me/proj/app.py:42(run)").unwrap();
        assert_eq!(info.directory, "/home/me/proj/");
        assert_eq!(info.file, "app.py");
        assert_eq!(info.line, 42);
        assert_eq!(info.name, "run");

        let windows = FunctionInfo::parse(r"C:\proj\app.py:7(go)").unwrap();
        assert_eq!(windows.directory, r"C:\proj\");
        assert_eq!(windows.file, "app.py");

        let builtin = FunctionInfo::parse("~:0(<built-in method time.sleep>)").unwrap();
        assert_eq!(builtin.file, "~");
        assert_eq!(builtin.name, "<built-in method time.sleep>");

        assert!(FunctionInfo::parse("<string>").is_none());
        assert!(FunctionInfo::parse("x.py:abc(f)").is_none());
    }

    #[test]
    fn short_name_strips_directories() {
        assert_eq!(short_name("a/b/c.py:1(f)"), "c.py:1(f)");
        assert_eq!(short_name("c.py:1(f)"), "c.py:1(f)");
    }
}
