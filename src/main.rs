//! Command-line front end: reads two feature tables, runs interface
//! detection and writes the interface table and segment lines.
//!
//! ```text
//! wildfire-interface --urban urban.tsv --flammable fuel.tsv --config run.toml --output out/
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info};

use wildfire_interface::config::{InterfaceParams, StudyAreaParams};
use wildfire_interface::error::Stage;
use wildfire_interface::io::{read_layers, write_run, TableSchema};
use wildfire_interface::pipeline::InterfacePipeline;
use wildfire_interface::{InterfaceError, Result};

#[derive(Parser)]
#[command(name = "wildfire-interface")]
#[command(about = "Detect wildland-urban interface vertices between urban and flammable polygons")]
struct Args {
    /// Urban polygons (tab-separated, with a `wkt` column)
    #[arg(long)]
    urban: PathBuf,

    /// Flammable polygons (tab-separated, with a `wkt` column)
    #[arg(long)]
    flammable: PathBuf,

    /// TOML parameter file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Output directory
    #[arg(short, long, default_value = ".")]
    output: PathBuf,

    /// Label appended to output file names
    #[arg(long, default_value = "run")]
    label: String,

    /// Write the extended table schema
    #[arg(long)]
    extended: bool,

    /// Study area centre x
    #[arg(long, requires_all = ["y0", "half_width"])]
    x0: Option<f64>,

    /// Study area centre y
    #[arg(long, requires_all = ["x0", "half_width"])]
    y0: Option<f64>,

    /// Study area half-width
    #[arg(long, requires_all = ["x0", "y0"])]
    half_width: Option<f64>,
}

fn main() -> ExitCode {
    // Default: WARN for everything, INFO for this crate. Override with RUST_LOG.
    let env_filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(tracing_subscriber::filter::LevelFilter::WARN.into())
        .add_directive("wildfire_interface=info".parse().unwrap_or_default());
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let args = Args::parse();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            match e.stage() {
                Some(stage) => error!(%stage, "{e}"),
                None => error!("{e}"),
            }
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> Result<()> {
    let mut params = match &args.config {
        Some(path) => {
            info!(path = %path.display(), "loading parameters");
            InterfaceParams::load(path).map_err(|e| e.in_stage(Stage::Input))?
        }
        None => InterfaceParams::default(),
    };
    if let (Some(x0), Some(y0), Some(half_width)) = (args.x0, args.y0, args.half_width) {
        params.study_area = Some(StudyAreaParams { x0, y0, half_width });
    }

    let (urban, flammable) = read_layers(&args.urban, &args.flammable)?;
    let run = InterfacePipeline::new(&params).run(&urban, &flammable)?;

    std::fs::create_dir_all(&args.output)
        .map_err(|e| InterfaceError::Io {
            path: args.output.clone(),
            source: e,
        })
        .map_err(|e| e.in_stage(Stage::Export))?;
    let schema = if args.extended {
        TableSchema::Extended
    } else {
        TableSchema::Compatible
    };
    let stem = params.file_stem(&args.label, run.study_area.as_ref());
    let outputs = write_run(&args.output, &stem, &run, &params, schema)
        .map_err(|e| e.in_stage(Stage::Export))?;

    info!(
        table = %outputs.table.display(),
        lines = %outputs.lines.display(),
        interface = run.classification.interface_count(),
        "done"
    );
    Ok(())
}
