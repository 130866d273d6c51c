use serde::{Deserialize, Serialize};

/// Semantic color tokens resolved by the renderer's active theme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ThemeToken {
    // Categorical slice palette; a function always maps to the same slot.
    Slice0,
    Slice1,
    Slice2,
    Slice3,
    Slice4,
    Slice5,
    Slice6,
    Slice7,

    /// Every node of the hovered function.
    HoverHighlight,

    Background,
    Border,
    /// Caller → callee connector in the call graph.
    Link,

    TextPrimary,
    TextSecondary,

    ErrorBanner,
}

impl ThemeToken {
    pub const SLICES: [ThemeToken; 8] = [
        ThemeToken::Slice0,
        ThemeToken::Slice1,
        ThemeToken::Slice2,
        ThemeToken::Slice3,
        ThemeToken::Slice4,
        ThemeToken::Slice5,
        ThemeToken::Slice6,
        ThemeToken::Slice7,
    ];

    /// Pick a slice color from a stable hash of `key` (FNV-1a), so the same
    /// function gets the same color across views and sessions.
    pub fn slice_for(key: &str) -> ThemeToken {
        let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
        for byte in key.bytes() {
            hash ^= u64::from(byte);
            hash = hash.wrapping_mul(0x0100_0000_01b3);
        }
        Self::SLICES[(hash % Self::SLICES.len() as u64) as usize]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slice_for_is_stable() {
        let a = ThemeToken::slice_for("a.py:1(main)");
        let b = ThemeToken::slice_for("a.py:1(main)");
        assert_eq!(a, b);
        assert!(ThemeToken::SLICES.contains(&a));
    }
}
