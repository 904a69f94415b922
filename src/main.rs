use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use env_logger::{Builder, Env};
use plotstats::core::export::prepare_output_dir;
use plotstats::core::variables::VARIABLES;
use plotstats::io::image_list::{ImageCatalog, LandsatTile, TileStatus};
use plotstats::{CrsZone, ExistingDirPolicy, ImageErrorPolicy, PipelineConfig, ZonalPipeline};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[clap(author, version, about)]
struct Cli {
    /// print debug logging (RUST_LOG takes precedence)
    #[clap(short, long, global = true)]
    verbose: bool,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// computes the zonal statistics time series of one image collection
    Run(RunCommand),

    /// builds the image list of a Landsat tile and records its tile status
    ListImages(ListImagesCommand),

    /// prints the known variable codes
    Variables,
}

#[derive(Debug, Args)]
struct RunCommand {
    /// newline separated list of raster paths
    #[clap(short, long)]
    images: PathBuf,

    /// site polygon layer with a site_name attribute
    #[clap(short, long)]
    polygons: PathBuf,

    /// variable code selecting the output schema (see `variables`)
    #[clap(long)]
    variable: Option<String>,

    /// pixel value treated as no measurement
    #[clap(short, long)]
    no_data: Option<f64>,

    /// directory receiving the per-site CSV files
    #[clap(short, long)]
    output: Option<PathBuf>,

    /// JSON run configuration, overridden by the flags given here
    #[clap(short, long)]
    config: Option<PathBuf>,

    /// tile or collection id used in output file names
    #[clap(long)]
    collection: Option<String>,

    /// reproject the polygons to a zone before the overlay (2, 3 or 4)
    #[clap(short, long)]
    zone: Option<String>,

    /// remove the unit offset declared by the variable (an error if it has none)
    #[clap(long)]
    apply_offset: bool,

    /// stop at the first image that cannot be processed
    #[clap(long)]
    abort_on_error: bool,

    /// delete and recreate an existing output directory
    #[clap(long, conflicts_with = "reuse")]
    overwrite: bool,

    /// write into an existing output directory
    #[clap(long)]
    reuse: bool,

    /// also write every per-image table to this directory
    #[clap(long)]
    image_tables: Option<PathBuf>,

    /// process images in parallel
    #[clap(long)]
    parallel: bool,

    /// report what would be written without touching the filesystem
    #[clap(long)]
    dry_run: bool,
}

#[derive(Debug, Args)]
struct ListImagesCommand {
    /// root directory holding the `{path}_{row}` tile directories
    #[clap(short, long)]
    root: PathBuf,

    /// WRS-2 path of the tile
    #[clap(long)]
    path: String,

    /// WRS-2 row of the tile
    #[clap(long)]
    row: String,

    /// product directory inside the tile directory
    #[clap(long, default_value = "")]
    product_dir: String,

    /// variable code of the mosaics to list
    #[clap(long)]
    variable: String,

    /// zone code of the mosaics (2, 3 or 4)
    #[clap(short, long)]
    zone: String,

    /// minimum number of images for the tile to be processed
    #[clap(short, long, default_value_t = 1)]
    min_count: usize,

    /// directory receiving the image and status lists
    #[clap(short, long)]
    output: PathBuf,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    let mut builder = Builder::from_env(Env::default().default_filter_or(default_filter));
    builder.format_timestamp_secs();
    builder.init();

    match cli.command {
        Command::Run(cmd) => run(cmd),
        Command::ListImages(cmd) => list_images(cmd),
        Command::Variables => {
            print_variables();
            Ok(())
        }
    }
}

fn run(cmd: RunCommand) -> Result<()> {
    let mut config = match &cmd.config {
        Some(path) => PipelineConfig::from_json_file(path)
            .with_context(|| format!("Failed to load configuration {}", path.display()))?,
        None => PipelineConfig::default(),
    };

    if let Some(variable) = cmd.variable {
        config.variable = variable;
    }
    if let Some(no_data) = cmd.no_data {
        config.no_data = no_data;
    }
    if let Some(output) = cmd.output {
        config.output_dir = output;
    }
    if cmd.collection.is_some() {
        config.collection_id = cmd.collection;
    }
    if cmd.apply_offset {
        config.offset_enabled.insert(config.variable.trim().to_ascii_lowercase());
    }
    if cmd.abort_on_error {
        config.on_image_error = ImageErrorPolicy::Abort;
    }
    if cmd.overwrite {
        config.existing_output_dir = ExistingDirPolicy::Replace;
    } else if cmd.reuse {
        config.existing_output_dir = ExistingDirPolicy::Reuse;
    }
    if cmd.image_tables.is_some() {
        config.image_table_dir = cmd.image_tables;
    }
    config.parallel |= cmd.parallel;
    config.dry_run |= cmd.dry_run;

    let zone = cmd.zone.as_deref().map(str::parse::<CrsZone>).transpose()?;
    let pipeline = ZonalPipeline::new(config)?;
    let config = pipeline.config();

    prepare_output_dir(&config.output_dir, config.existing_output_dir, config.dry_run)
        .with_context(|| format!("Cannot use output directory {}", config.output_dir.display()))?;

    let report = pipeline.run_from_files(&cmd.images, &cmd.polygons, zone)?;

    println!(
        "{} images processed, {} skipped, {} rows, {} files",
        report.processed.len(),
        report.failed.len(),
        report.rows,
        report.files_written.len()
    );
    for (path, reason) in &report.failed {
        println!("  skipped {}: {}", path.display(), reason);
    }
    Ok(())
}

fn list_images(cmd: ListImagesCommand) -> Result<()> {
    let zone: CrsZone = cmd.zone.parse()?;
    let tile = LandsatTile::new(&cmd.path, &cmd.row);

    let catalog = ImageCatalog::scan(&cmd.root, &tile, &cmd.product_dir, &cmd.variable, zone)?;
    match catalog.write_status(&cmd.output, cmd.min_count)? {
        TileStatus::ForProcessing(list) => {
            println!("{} images listed in {}", catalog.len(), list.display());
            Ok(())
        }
        TileStatus::Insufficient { found, required } => bail!(
            "Tile {} has {} {} images, {} required",
            tile.dir_name(),
            found,
            cmd.variable,
            required
        ),
    }
}

fn print_variables() {
    println!("{:<6}{:<7}{:<8}{:<8}description", "code", "bands", "layout", "offset");
    for schema in VARIABLES {
        let bands: Vec<String> = schema.bands.iter().map(|b| b.to_string()).collect();
        let offset = schema
            .unit_offset
            .map(|o| o.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<6}{:<7}{:<8}{:<8}{}",
            schema.code,
            bands.join(","),
            format!("{:?}", schema.layout).to_lowercase(),
            offset,
            schema.description
        );
    }
}
