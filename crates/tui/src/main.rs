mod config;
mod renderer;

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use callwheel_core::model::{Session, SessionEvent, StatsTable};
use callwheel_core::settings::Settings;
use callwheel_core::views::RenderStyle;
use callwheel_protocol::Viewport;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::{FileConfig, Overrides};

/// How long `--svg` waits for the hierarchy to be built.
const EXPORT_TIMEOUT: Duration = Duration::from_secs(120);

/// Explore a profile's call hierarchy as a sunburst, icicle or call graph.
#[derive(Debug, Parser)]
#[command(name = "callwheel", version, about)]
struct Args {
    /// Stats JSON: function id → stats, callers and children.
    stats: PathBuf,

    /// TOML file with `style`, `depth`, `cutoff` and `dark` keys.
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// sunburst, icicle or callgraph.
    #[arg(long)]
    style: Option<RenderStyle>,

    /// Levels expanded below the focused function.
    #[arg(long)]
    depth: Option<u32>,

    /// Hide branches lighter than this fraction of the focused function.
    #[arg(long)]
    cutoff: Option<f64>,

    /// Write the initial view as SVG to FILE instead of opening the explorer.
    #[arg(long, value_name = "FILE")]
    svg: Option<PathBuf>,

    #[arg(long, default_value_t = 800.0)]
    width: f64,

    #[arg(long, default_value_t = 600.0)]
    height: f64,

    /// Dark SVG palette.
    #[arg(long)]
    dark: bool,

    /// Where the explorer writes logs (it never logs to the terminal it draws on).
    #[arg(long, value_name = "FILE")]
    log_file: Option<PathBuf>,
}

fn init_tracing(interactive: bool, log_file: Option<&Path>) -> Result<()> {
    let filter = EnvFilter::try_from_env("CALLWHEEL_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    match (interactive, log_file) {
        (_, Some(path)) => {
            let file = File::create(path)
                .with_context(|| format!("creating log file {}", path.display()))?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(Mutex::new(file))
                .with_ansi(false)
                .init();
        }
        (false, None) => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
        }
        (true, None) => {}
    }
    Ok(())
}

fn load_stats(path: &Path) -> Result<StatsTable> {
    let data = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let mut stats =
        StatsTable::from_json(&data).with_context(|| format!("parsing {}", path.display()))?;
    let pruned = stats.prune_cruft();
    info!(path = %path.display(), functions = stats.len(), pruned, "stats loaded");
    Ok(stats)
}

fn export_svg(
    stats: StatsTable,
    settings: Settings,
    out: &Path,
    viewport: Viewport,
    dark: bool,
) -> Result<()> {
    let mut session = Session::new(stats, settings)?;
    let event = match session.load()? {
        Some(event) => Some(event),
        None => session.wait(EXPORT_TIMEOUT),
    };
    match event {
        Some(SessionEvent::Displayed { .. }) => {}
        Some(SessionEvent::Failed(message)) => bail!("building hierarchy: {message}"),
        Some(SessionEvent::Discarded) | None => bail!("hierarchy was not built in time"),
    }

    let commands = session.render(&viewport);
    let svg = callwheel_core::svg::render_svg(&commands, viewport.width, viewport.height, dark);
    std::fs::write(out, svg).with_context(|| format!("writing {}", out.display()))?;
    info!(out = %out.display(), shapes = commands.len(), "svg written");
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.svg.is_none(), args.log_file.as_deref())?;

    let file = match &args.config {
        Some(path) => FileConfig::load(path)?,
        None => FileConfig::default(),
    };
    let overrides = Overrides {
        style: args.style,
        depth: args.depth,
        cutoff: args.cutoff,
        dark: args.dark,
    };
    let resolved = config::resolve(&file, &overrides)?;
    let stats = load_stats(&args.stats)?;

    match &args.svg {
        Some(out) => export_svg(
            stats,
            resolved.settings,
            out,
            Viewport::new(args.width, args.height),
            resolved.dark,
        ),
        None => {
            let session = Session::new(stats, resolved.settings)?;
            renderer::run(session)
        }
    }
}
