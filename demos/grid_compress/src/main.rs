use anyhow::{Context, Result};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use clap::Parser;
use isobar::grid::{Grid, Shape};
use isobar::{CompressedContainer, CompressionConfig, LogFormat, LoggingConfig, Pipeline};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// TOML config file (graph, model, codec, logging sections)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Raw little-endian f32 field (optional). If omitted, generates synthetic data.
    #[arg(long)]
    input: Option<PathBuf>,

    /// Grid dimensions, row-major
    #[arg(long, value_delimiter = ',', default_value = "256,256")]
    dims: Vec<usize>,

    /// Output compressed file
    #[arg(long, default_value = "field.isbr")]
    output: PathBuf,

    /// Decompress `--output` and write the raw f32 field here
    #[arg(long)]
    decompress: Option<PathBuf>,

    /// Point-wise error bound (overrides the config file)
    #[arg(long)]
    epsilon: Option<f64>,
}

fn init_logging(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));
    match config.format {
        LogFormat::Json => tracing_subscriber::fmt().json().with_env_filter(filter).init(),
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = CompressionConfig::load(args.config.as_deref()).context("load config")?;
    if let Some(eps) = args.epsilon {
        config.codec.error_bound = eps;
        config.codec.quantum = None;
        config.validate().context("validate config")?;
    }
    init_logging(&config.logging);

    let pipeline = Pipeline::from_config(config).context("build pipeline")?;
    info!(model = %pipeline.model().id(), "Pipeline ready");

    if let Some(raw_out) = args.decompress.as_ref() {
        let container = CompressedContainer::load(&args.output)
            .with_context(|| format!("read {}", args.output.display()))?;
        let grid = pipeline.decompress(&container).context("decompress")?;
        write_raw_f32(raw_out, &grid.to_f32())?;
        println!("Decompressed {:?} grid to {}", grid.dims(), raw_out.display());
        return Ok(());
    }

    let grid = match args.input.as_ref() {
        Some(path) => {
            let shape = Shape::new(&args.dims).context("invalid --dims")?;
            let data = read_raw_f32(path, shape.len())?;
            Grid::from_f32(&args.dims, &data)?
        }
        None => {
            println!("Generating synthetic field {:?}", args.dims);
            generate_synthetic(&args.dims)?
        }
    };

    let (container, report) = pipeline.compress_with_report(&grid).context("compress")?;
    container
        .save(&args.output)
        .with_context(|| format!("write {}", args.output.display()))?;

    println!("{}", report);
    println!("✓ Wrote {}", args.output.display());
    Ok(())
}

/// Smooth multi-scale field with a sharp front, in f32.
fn generate_synthetic(dims: &[usize]) -> Result<Grid> {
    let shape = Shape::new(dims)?;
    let mut coord = vec![0usize; shape.ndim()];
    let data: Vec<f32> = (0..shape.len())
        .map(|i| {
            shape.coord_into(i, &mut coord);
            let x: Vec<f32> = coord
                .iter()
                .zip(dims)
                .map(|(&c, &d)| c as f32 / d.max(1) as f32)
                .collect();
            let large: f32 = x.iter().map(|v| (v * std::f32::consts::TAU).sin()).sum();
            let small: f32 = x.iter().map(|v| (v * 40.0).cos() * 0.1).sum();
            let front = if x[0] > 0.6 { 2.0 } else { 0.0 };
            280.0 + 10.0 * large + small + front
        })
        .collect();
    Ok(Grid::from_f32(dims, &data)?)
}

fn read_raw_f32(path: &Path, len: usize) -> Result<Vec<f32>> {
    let mut r = BufReader::new(File::open(path).with_context(|| format!("open {}", path.display()))?);
    let mut data = vec![0f32; len];
    r.read_f32_into::<LittleEndian>(&mut data)
        .with_context(|| format!("read {} f32 values from {}", len, path.display()))?;
    Ok(data)
}

fn write_raw_f32(path: &Path, data: &[f32]) -> Result<()> {
    let mut w = BufWriter::new(File::create(path).with_context(|| format!("create {}", path.display()))?);
    for &v in data {
        w.write_f32::<LittleEndian>(v).context("write value")?;
    }
    w.flush().context("flush")?;
    Ok(())
}
