// Copyright: Kyler Chin <kyler@catenarymaps.org>
// Catenary Transit Initiatives
// Attribution cannot be removed

mod input;

use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use serde::Serialize;
use std::path::PathBuf;
use trellis::config::EngineConfig;
use trellis::coord_conversion::parse_coord_key;
use trellis::export::{paths_to_geojson, to_geojson, to_geojson_string};
use trellis::metadata::MetadataFilter;
use trellis::models::PathResult;
use trellis::network::{NetworkGraphBuilder, NormalizeReport};

use crate::input::NetworkInput;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// JSON network description with `points` and `lines`
    input: PathBuf,

    /// JSON engine config. Missing fields use defaults.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Merge distance, overrides the config file
    #[arg(long, env = "TRELLIS_MARGIN")]
    margin: Option<f64>,

    /// Split distance, overrides the config file
    #[arg(long, env = "TRELLIS_TOLERANCE")]
    tolerance: Option<f64>,

    /// Path search start, as "x,y"
    #[arg(long, requires = "to")]
    from: Option<String>,

    /// Path search end, as "x,y"
    #[arg(long, requires = "from")]
    to: Option<String>,

    /// key=value condition on path endpoints (repeatable)
    #[arg(long = "endpoint-filter")]
    endpoint_filter: Vec<String>,

    /// key=value condition on start points when searching towards --end-filter
    #[arg(long = "start-filter")]
    start_filter: Vec<String>,

    /// key=value condition selecting end points; matching points are never passed through
    #[arg(long = "end-filter")]
    end_filter: Vec<String>,

    /// key=value condition on intermediate points to avoid with --from/--to
    #[arg(long)]
    avoid: Vec<String>,

    /// Write the normalized network as GeoJSON
    #[arg(long)]
    export_geojson: Option<PathBuf>,

    /// Write found paths as GeoJSON
    #[arg(long)]
    export_paths: Option<PathBuf>,
}

#[derive(Serialize)]
struct RunSummary<'a> {
    passes: usize,
    converged: bool,
    merges: usize,
    lines_created: usize,
    vertices: usize,
    edges: usize,
    paths: &'a [PathResult],
}

fn load_config(args: &Args) -> Result<EngineConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            EngineConfig::from_json_str(&raw)?
        }
        None => EngineConfig::default(),
    };
    if let Some(margin) = args.margin {
        config = config.with_margin(margin);
    }
    if let Some(tolerance) = args.tolerance {
        config = config.with_tolerance(tolerance);
    }
    config.validate()?;
    Ok(config)
}

fn find_paths(args: &Args, builder: &NetworkGraphBuilder) -> Result<Vec<PathResult>> {
    if let (Some(from), Some(to)) = (&args.from, &args.to) {
        let avoid = MetadataFilter::parse_all(&args.avoid)?;
        let paths = builder.get_paths_between_endpoints(
            parse_coord_key(from)?,
            parse_coord_key(to)?,
            Some(&avoid),
        )?;
        return Ok(paths);
    }

    if !args.end_filter.is_empty() {
        let start_filter = MetadataFilter::parse_all(&args.start_filter)?;
        let end_filter = MetadataFilter::parse_all(&args.end_filter)?;
        return Ok(builder.get_all_endpoint_paths_filtered(&start_filter, &end_filter));
    }

    let endpoint_filter = MetadataFilter::parse_all(&args.endpoint_filter)?;
    Ok(builder.get_all_endpoint_paths(Some(&endpoint_filter)))
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    env_logger::init();

    let args = Args::parse();
    let config = load_config(&args)?;

    let mut builder = NetworkGraphBuilder::with_config(config)?;
    NetworkInput::read(&args.input)?.load_into(&mut builder)?;
    info!(
        "Loaded {} points and {} lines from {}",
        builder.store().points().len(),
        builder.store().lines().len(),
        args.input.display()
    );

    let report: NormalizeReport = builder.normalize()?;
    let graph = builder.build_graph();
    let paths = find_paths(&args, &builder)?;

    if let Some(path) = &args.export_geojson {
        std::fs::write(path, to_geojson_string(to_geojson(builder.store())))
            .with_context(|| format!("writing {}", path.display()))?;
        info!("Wrote network GeoJSON to {}", path.display());
    }
    if let Some(path) = &args.export_paths {
        std::fs::write(path, to_geojson_string(paths_to_geojson(&paths)))
            .with_context(|| format!("writing {}", path.display()))?;
        info!("Wrote {} paths to {}", paths.len(), path.display());
    }

    let summary = RunSummary {
        passes: report.passes,
        converged: report.converged,
        merges: report.merges.len(),
        lines_created: report.created_lines.len(),
        vertices: graph.vertex_count(),
        edges: graph.edge_count(),
        paths: &paths,
    };
    println!("{}", serde_json::to_string_pretty(&summary)?);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn config_file(json: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(json.as_bytes()).unwrap();
        file
    }

    fn args_with(file: &NamedTempFile, extra: &[&str]) -> Args {
        let config = file.path().to_str().unwrap();
        let argv = ["fern", "network.json", "--config", config]
            .into_iter()
            .chain(extra.iter().copied());
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_cli_margin_overrides_config_file() {
        let file = config_file(r#"{"margin": 0.25, "tolerance": 0.3}"#);
        let config = load_config(&args_with(&file, &["--margin", "0.75"])).unwrap();
        assert_eq!(config.margin, 0.75);
        assert_eq!(config.tolerance, 0.3);
    }

    #[test]
    fn test_config_file_overrides_defaults() {
        let file = config_file(r#"{"tolerance": 0.4}"#);
        let config = load_config(&args_with(&file, &[])).unwrap();
        assert_eq!(config.tolerance, 0.4);
        assert_eq!(config.margin, EngineConfig::default().margin);
        assert_eq!(config.max_passes, EngineConfig::default().max_passes);
    }

    #[test]
    fn test_invalid_cli_override_rejected() {
        let file = config_file(r#"{"margin": 0.25}"#);
        assert!(load_config(&args_with(&file, &["--margin", "0"])).is_err());
        assert!(load_config(&args_with(&file, &["--tolerance", "0.0"])).is_err());
    }
}
