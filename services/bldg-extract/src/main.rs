//! PLATEAU building extraction CLI.
//!
//! Loads the static reference data, reads an area of interest drawn as
//! GeoJSON, runs one extraction against the catalog and writes the result
//! in the requested encoding.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use bldg_common::{AreaOfInterest, LodTemplate};
use clap::Parser;
use export::{Encoding, Exporter, DEFAULT_FILE_STEM};
use extraction::{
    AttributeFilter, Extraction, Extractor, ExtractorConfig, HeightRange, ReferenceData,
    MAX_HEIGHT, MIN_HEIGHT,
};
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

/// Exit status of a run that completed without any matching building.
const EXIT_EMPTY: u8 = 2;

#[derive(Parser, Debug)]
#[command(name = "bldg-extract")]
#[command(about = "Extract PLATEAU building footprints inside an area of interest")]
struct Args {
    /// Area of interest (GeoJSON Polygon, Feature or FeatureCollection)
    aoi: PathBuf,

    /// Grid cell layer (GeoJSON with a `code` property)
    #[arg(long, env = "BLDG_GRID_PATH")]
    grid: PathBuf,

    /// Dataset registry JSON
    #[arg(long, env = "BLDG_REGISTRY_PATH")]
    registry: PathBuf,

    /// Mesh code to municipality code table (CSV)
    #[arg(long, env = "BLDG_CODES_PATH")]
    codes: PathBuf,

    /// Configuration file (YAML); environment variables are used otherwise
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Catalog API base URL
    #[arg(long, env = "CATALOG_BASE_URL")]
    catalog_url: Option<String>,

    /// LOD template (LOD1 or LOD2)
    #[arg(long)]
    lod: Option<LodTemplate>,

    /// Cells fetched concurrently
    #[arg(long)]
    concurrency: Option<usize>,

    /// Keep only the building with this identifier
    #[arg(long)]
    building_id: Option<String>,

    /// Minimum measured height in metres
    #[arg(long, default_value_t = MIN_HEIGHT)]
    min_height: f64,

    /// Maximum measured height in metres
    #[arg(long, default_value_t = MAX_HEIGHT)]
    max_height: f64,

    /// Output encoding (geojson, gpkg, parquet); guessed from --output
    #[arg(short, long)]
    format: Option<Encoding>,

    /// Output file
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_writer(std::io::stderr)
        .json()
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    let config = load_config(&args)?;
    let (encoding, output) = output_target(args.format, args.output.as_deref());

    let reference = ReferenceData::load(&args.grid, &args.registry, &args.codes)
        .context("failed to load reference data")?;
    let aoi_text = std::fs::read_to_string(&args.aoi)
        .with_context(|| format!("failed to read {}", args.aoi.display()))?;
    let aoi = AreaOfInterest::from_geojson_str(&aoi_text).context("invalid area of interest")?;

    let mut filter = AttributeFilter::new()
        .with_height(HeightRange::new(args.min_height, args.max_height)?);
    if let Some(id) = &args.building_id {
        filter = filter.with_building_id(id.as_str());
    }

    info!(
        aoi = %args.aoi.display(),
        lod = %config.lod,
        encoding = %encoding,
        output = %output.display(),
        "Starting extraction"
    );

    let extractor = Extractor::new(Arc::new(reference), &config)?;
    let extraction = extractor.extract(&aoi, &filter).await?;

    if let Extraction::Empty(reason) = &extraction {
        warn!(reason = %reason, "Nothing extracted; widen the area or relax the filters");
        return Ok(ExitCode::from(EXIT_EMPTY));
    }

    let payload = extraction.export(&Exporter::new(), encoding).await?;
    tokio::fs::write(&output, &payload.bytes)
        .await
        .with_context(|| format!("failed to write {}", output.display()))?;

    info!(
        features = extraction.len(),
        bytes = payload.len(),
        mime = payload.mime_type(),
        output = %output.display(),
        "Extraction written"
    );

    Ok(ExitCode::SUCCESS)
}

/// Configuration file or environment, then command-line overrides.
fn load_config(args: &Args) -> Result<ExtractorConfig> {
    let mut config = match &args.config {
        Some(path) => ExtractorConfig::from_yaml_file(path)?,
        None => ExtractorConfig::from_env(),
    };

    if let Some(url) = &args.catalog_url {
        config.catalog_base_url = url.clone();
    }
    if let Some(lod) = args.lod {
        config.lod = lod;
    }
    if let Some(n) = args.concurrency {
        config.fetch_concurrency = n;
    }

    config.validate()?;
    Ok(config)
}

/// Encoding and output path. An explicit format wins; otherwise the
/// output extension decides, falling back to GeoJSON.
fn output_target(format: Option<Encoding>, output: Option<&Path>) -> (Encoding, PathBuf) {
    let from_extension = output
        .and_then(|p| p.extension())
        .and_then(|ext| ext.to_str())
        .and_then(|ext| {
            Encoding::ALL
                .into_iter()
                .find(|e| e.extension().eq_ignore_ascii_case(ext))
        });

    let encoding = format.or(from_extension).unwrap_or(Encoding::GeoJson);
    let output = match output {
        Some(path) => path.to_path_buf(),
        None => PathBuf::from(format!("{}.{}", DEFAULT_FILE_STEM, encoding.extension())),
    };
    (encoding, output)
}
