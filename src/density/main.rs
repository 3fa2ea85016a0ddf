//! Feature density job.
//!
//! Counts the points of a CSV data set that fall inside each polygon of a
//! GeoJSON or feature-class JSON file and writes one `label,count` line per
//! polygon label.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use feature_density::job;
use feature_density::JobConfig;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

#[derive(Parser, Debug)]
#[command(name = "feature-density")]
#[command(about = "Count CSV points per polygon feature")]
#[command(
    after_help = "Polygon data must be GeoJSON (FeatureCollection) or Esri feature-class JSON in WGS84.\n\
                  Points rows are comma separated; double quotes are stripped before splitting."
)]
struct Args {
    /// Polygon data (GeoJSON or Esri JSON, optionally .gz)
    polygons: PathBuf,

    /// Polygon attribute the counts are grouped by
    key_attribute: String,

    /// CSV file, or directory of CSV files, containing the points
    points: PathBuf,

    /// Column of longitude values (1-based)
    longitude_index: usize,

    /// Column of latitude values (1-based)
    latitude_index: usize,

    /// Column whose value must contain the filter text (1-based, 0 or less disables)
    #[arg(allow_negative_numbers = true)]
    filter_index: i64,

    /// Text the filter column must contain (case-insensitive)
    filter_text: String,

    /// Output file
    output: PathBuf,

    /// Base configuration file (TOML); positional arguments override it
    #[arg(long)]
    conf: Option<PathBuf>,

    /// Keep going when no polygon can be parsed (every point is counted outside)
    #[arg(long)]
    allow_empty_polygons: bool,

    /// Records per work unit
    #[arg(long)]
    batch_size: Option<usize>,

    /// Worker threads (defaults to the number of CPUs)
    #[arg(long)]
    threads: Option<usize>,
}

fn main() -> Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse();
    let config = build_config(args)?;

    info!("Feature Density");
    info!("Polygons: {}", config.polygons_path.display());
    info!("Points: {}", config.points_path.display());

    let summary = job::run(&config)?;

    info!(
        "Done: {} features, {} input file(s), {} labels",
        summary.features, summary.input_files, summary.labels
    );

    Ok(())
}

/// Layer the command line over the optional config file
fn build_config(args: Args) -> Result<JobConfig> {
    let mut config = match &args.conf {
        Some(path) => JobConfig::load_from_file(path)
            .with_context(|| format!("Failed to load {}", path.display()))?,
        None => JobConfig::default(),
    };

    config.polygons_path = args.polygons;
    config.points_path = args.points;
    config.output_path = args.output;
    config.record.key_attribute = args.key_attribute;
    config.record.longitude_column = zero_based(args.longitude_index, "longitude")?;
    config.record.latitude_column = zero_based(args.latitude_index, "latitude")?;
    config.record.filter_column = args
        .filter_index
        .checked_sub(1)
        .and_then(|c| usize::try_from(c).ok());
    config.record.filter_text = args.filter_text;

    if args.allow_empty_polygons {
        config.allow_empty_polygons = true;
    }
    if let Some(batch_size) = args.batch_size {
        config.batch_size = batch_size;
    }
    if let Some(threads) = args.threads {
        config.threads = Some(threads);
    }

    config.validate()?;
    Ok(config)
}

fn zero_based(column: usize, name: &str) -> Result<usize> {
    column
        .checked_sub(1)
        .with_context(|| format!("{} index is 1-based, got 0", name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn parse(extra: &[&str]) -> std::result::Result<Args, clap::Error> {
        let mut argv = vec![
            "feature-density",
            "polygons.json",
            "NAME",
            "points.csv",
            "2",
            "3",
            "5",
            "urban",
            "out/counts.csv",
        ];
        argv.extend_from_slice(extra);
        Args::try_parse_from(argv)
    }

    #[test]
    fn test_columns_converted_to_zero_based() {
        let config = build_config(parse(&[]).unwrap()).unwrap();
        assert_eq!(config.record.longitude_column, 1);
        assert_eq!(config.record.latitude_column, 2);
        assert_eq!(config.record.filter_column, Some(4));
        assert_eq!(config.record.filter_text, "urban");
        assert_eq!(config.record.key_attribute, "NAME");
        assert_eq!(config.output_path, PathBuf::from("out/counts.csv"));
    }

    #[test]
    fn test_filter_disabled() {
        for filter in ["0", "-1"] {
            let args = Args::try_parse_from([
                "feature-density",
                "p.json",
                "NAME",
                "pts.csv",
                "1",
                "2",
                filter,
                "x",
                "out.csv",
            ])
            .unwrap();
            assert_eq!(build_config(args).unwrap().record.filter_column, None);
        }
    }

    #[test]
    fn test_wrong_arity_is_rejected() {
        assert!(Args::try_parse_from(["feature-density", "p.json", "NAME"]).is_err());
        assert!(parse(&["extra"]).is_err());
    }

    #[test]
    fn test_zero_coordinate_column_rejected() {
        let args = Args::try_parse_from([
            "feature-density",
            "p.json",
            "NAME",
            "pts.csv",
            "0",
            "2",
            "-1",
            "x",
            "out.csv",
        ])
        .unwrap();
        assert!(build_config(args).is_err());
    }

    #[test]
    fn test_conf_file_is_base_layer() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "separator = \"\\t\"\nbatch_size = 250\nthreads = 2").unwrap();
        let path = file.path().to_str().unwrap().to_string();

        let config = build_config(parse(&["--conf", &path, "--batch-size", "50"]).unwrap()).unwrap();
        assert_eq!(config.separator, "\t");
        assert_eq!(config.batch_size, 50);
        assert_eq!(config.threads, Some(2));
        assert_eq!(config.record.longitude_column, 1);
    }
}
