//! Settings file plus command-line overrides.

use std::path::Path;

use anyhow::{Context, Result};
use callwheel_core::settings::Settings;
use callwheel_core::views::RenderStyle;
use serde::Deserialize;

/// Contents of a `--config` TOML file. Every key is optional:
///
/// ```toml
/// style = "icicle"
/// depth = 6
/// cutoff = 0.01
/// dark = true
/// ```
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub style: Option<RenderStyle>,
    pub depth: Option<u32>,
    pub cutoff: Option<f64>,
    pub dark: Option<bool>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("parsing config {}", path.display()))
    }
}

/// Values given on the command line; these win over the file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub style: Option<RenderStyle>,
    pub depth: Option<u32>,
    pub cutoff: Option<f64>,
    pub dark: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Resolved {
    pub settings: Settings,
    pub dark: bool,
}

pub fn resolve(file: &FileConfig, overrides: &Overrides) -> Result<Resolved> {
    let defaults = Settings::default();
    let settings = Settings {
        style: overrides.style.or(file.style).unwrap_or(defaults.style),
        depth: overrides.depth.or(file.depth).unwrap_or(defaults.depth),
        cutoff: overrides.cutoff.or(file.cutoff).unwrap_or(defaults.cutoff),
    };
    settings.validate()?;
    Ok(Resolved {
        settings,
        dark: overrides.dark || file.dark.unwrap_or(false),
    })
}
