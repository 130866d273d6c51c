use serde::{Deserialize, Serialize};

use crate::hierarchy::HierarchyNode;
use crate::shared_str::FunctionId;

/// Depth sentinel for an initial, effectively unbounded, full-tree load.
pub const UNBOUNDED_DEPTH: u32 = u32::MAX;

/// Request sent to the hierarchy worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HierarchyRequest {
    pub depth: u32,
    /// Fraction of the root below which the render strategy may drop a
    /// branch. Carried through, never applied by the builder.
    pub cutoff: f64,
    pub name: FunctionId,
    pub parent_name: Option<FunctionId>,
    /// Opaque locator of the stats source.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Worker reply: either a finished tree or an error message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HierarchyResponse {
    Tree(HierarchyNode),
    Error(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_from_browser_json() {
        let raw = r#"{"depth": 3, "cutoff": 0.001, "name": "a.py:1(main)", "parent_name": null}"#;
        let req: Option<HierarchyRequest> = serde_json::from_str(raw).ok();
        let req = req.unwrap_or_else(|| HierarchyRequest {
            depth: 0,
            cutoff: 0.0,
            name: "".into(),
            parent_name: None,
            url: None,
        });
        assert_eq!(req.depth, 3);
        assert_eq!(req.name, "a.py:1(main)");
        assert!(req.parent_name.is_none());
        assert!(req.url.is_none());
    }

    #[test]
    fn response_variants_are_tagged() {
        let err = HierarchyResponse::Error("boom".into());
        assert_eq!(
            serde_json::to_string(&err).unwrap_or_default(),
            r#"{"error":"boom"}"#
        );
        let tree = HierarchyResponse::Tree(HierarchyNode::leaf(
            "f".into(),
            "f".into(),
            None,
            1.0,
            2.0,
        ));
        let json = serde_json::to_value(&tree).unwrap_or_default();
        assert_eq!(json["tree"]["name"], "f");
    }
}
