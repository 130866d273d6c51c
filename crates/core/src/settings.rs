//! User-adjustable display settings.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::views::RenderStyle;

pub const DEFAULT_DEPTH: u32 = 10;
pub const DEFAULT_CUTOFF: f64 = 0.001;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SettingsError {
    #[error("cutoff must be within [0, 1], got {0}")]
    Cutoff(f64),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub style: RenderStyle,
    /// Levels expanded below the focused function.
    pub depth: u32,
    /// Fraction of the focused function's size below which branches are
    /// not drawn.
    pub cutoff: f64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            style: RenderStyle::default(),
            depth: DEFAULT_DEPTH,
            cutoff: DEFAULT_CUTOFF,
        }
    }
}

impl Settings {
    pub fn validate(&self) -> Result<(), SettingsError> {
        if (0.0..=1.0).contains(&self.cutoff) {
            Ok(())
        } else {
            Err(SettingsError::Cutoff(self.cutoff))
        }
    }
}
