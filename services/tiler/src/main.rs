//! Boundary tile generator.
//!
//! Converts boundary Shapefiles (US states, ZIP code tabulation areas, ...)
//! into polyfiles of Web-Mercator meters, then renders them into transparent
//! 256x256 PNG map overlay tiles.

mod commands;
mod config;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use projection::{MercatorProjector, MAX_ZOOM};
use tile_common::BoundingBox;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use commands::RenderOptions;
use config::TilerConfig;

#[derive(Parser, Debug)]
#[command(name = "tiler")]
#[command(about = "Render boundary Shapefiles into PNG map tiles")]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "config/themes.yaml", env = "TILER_CONFIG")]
    config: PathBuf,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Emit logs as JSON lines
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Convert themes' Shapefiles into polyfiles
    Convert {
        /// Theme to convert (repeatable; default: all configured)
        #[arg(short, long)]
        theme: Vec<String>,
    },

    /// Render zoom levels from themes' polyfiles
    Render {
        /// Theme to render (repeatable; default: all configured)
        #[arg(short, long)]
        theme: Vec<String>,

        /// First zoom level (default: from config)
        #[arg(long, value_parser = zoom_parser())]
        min_zoom: Option<u32>,

        /// Last zoom level (default: from config)
        #[arg(long, value_parser = zoom_parser())]
        max_zoom: Option<u32>,

        /// Output directory (default: from config)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Keep tiles that already exist in the output directory
        #[arg(long)]
        skip_existing: bool,
    },

    /// Render tiles covering a lon/lat box straight from a Shapefile
    Tile {
        #[arg(short, long)]
        theme: String,

        #[arg(short, long, value_parser = zoom_parser())]
        zoom: u32,

        /// "min_lon,min_lat,max_lon,max_lat"
        #[arg(long, value_parser = BoundingBox::parse, allow_hyphen_values = true)]
        bbox: BoundingBox,

        /// Output directory (default: from config)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn zoom_parser() -> clap::builder::RangedI64ValueParser<u32> {
    clap::value_parser!(u32).range(0..=MAX_ZOOM as i64)
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize tracing
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let builder = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_thread_ids(true);
    if args.json {
        tracing::subscriber::set_global_default(builder.json().finish())?;
    } else {
        tracing::subscriber::set_global_default(builder.finish())?;
    }

    let config = TilerConfig::load(&args.config)?;
    info!(
        config = %args.config.display(),
        themes = ?config.themes.iter().map(|t| t.name.as_str()).collect::<Vec<_>>(),
        "Loaded configuration"
    );

    let projector = MercatorProjector::default();

    match args.command {
        Command::Convert { theme } => {
            for theme in config.select_themes(&theme)? {
                commands::convert(theme, &projector)?;
            }
        }
        Command::Render {
            theme,
            min_zoom,
            max_zoom,
            output,
            skip_existing,
        } => {
            let output_dir = output.unwrap_or_else(|| config.output_dir.clone());
            let options = RenderOptions {
                min_zoom,
                max_zoom,
                output_dir: &output_dir,
                writers: config.writers,
                skip_existing: skip_existing || config.skip_existing,
            };
            for theme in config.select_themes(&theme)? {
                commands::render(&config, theme, &projector, &options)?;
            }
        }
        Command::Tile {
            theme,
            zoom,
            bbox,
            output,
        } => {
            let output_dir = output.unwrap_or_else(|| config.output_dir.clone());
            let theme = config.theme(&theme)?;
            commands::tile(theme, &projector, &config, zoom, &bbox, &output_dir)?;
        }
    }

    Ok(())
}
