use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;
use video_quality::{
    ClipDescriptor, DEFAULT_METRICS, EncoderPair, LayerConfig, ResultSet, RunConfig, ToolLocator,
    build_graph_data, default_workers,
};

#[derive(Debug, Parser)]
#[command(about = "Benchmark video encoders across bitrates and temporal layers")]
struct Cli {
    #[command(subcommand)]
    command: Cmd,
}

#[derive(Debug, Subcommand)]
enum Cmd {
    /// Encode, decode and measure every clip x bitrate x encoder combination.
    Run(RunArgs),
    /// Group a result document into plottable curves.
    GraphData(GraphDataArgs),
}

#[derive(Debug, Args)]
struct RunArgs {
    /// `<file>_<W>_<H>.yuv:<fps>` or `<file>.y4m`
    #[arg(required = true)]
    clips: Vec<String>,

    /// Comma separated `encoder:codec` pairs, e.g. `libvpx-rt:vp8,openh264:h264`.
    #[arg(long, required = true)]
    encoders: String,

    #[arg(long, default_value_t = 1)]
    num_spatial_layers: u32,

    #[arg(long, default_value_t = 1)]
    num_temporal_layers: u32,

    #[arg(long, default_value_t = default_workers())]
    workers: usize,

    #[arg(long, default_value_t = 0)]
    frame_offset: u64,

    #[arg(long)]
    num_frames: Option<u64>,

    /// Result document; stdout when omitted.
    #[arg(long)]
    out: Option<PathBuf>,

    /// Keep encoded files here instead of deleting them.
    #[arg(long)]
    encoded_file_dir: Option<PathBuf>,

    #[arg(long)]
    enable_vmaf: bool,

    /// Print the encoder command lines and exit.
    #[arg(long)]
    dump_commands: bool,

    /// Look tools up on PATH before the tool root.
    #[arg(long)]
    use_system_path: bool,

    /// Defaults to the directory holding this executable.
    #[arg(long)]
    tool_root: Option<PathBuf>,

    #[arg(long)]
    scratch_dir: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct GraphDataArgs {
    results: PathBuf,

    /// Metrics to graph; ssim, avg-psnr and glb-psnr when omitted.
    #[arg(long, value_delimiter = ',')]
    metrics: Vec<String>,

    /// Output file; stdout when omitted.
    #[arg(long)]
    out: Option<PathBuf>,
}

fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "video_quality=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    match Cli::parse().command {
        Cmd::Run(args) => run(args),
        Cmd::GraphData(args) => graph_data(args),
    }
}

fn run(args: RunArgs) -> Result<ExitCode> {
    let clips = args
        .clips
        .iter()
        .map(|clip| ClipDescriptor::parse(clip))
        .collect::<Result<Vec<_>, _>>()?;
    let encoders = EncoderPair::parse_list(&args.encoders)?;
    let tool_root = args.tool_root.unwrap_or_else(ToolLocator::default_root);

    let mut config = RunConfig::new(
        clips,
        encoders,
        ToolLocator::new(tool_root, args.use_system_path),
    );
    config.layers = LayerConfig::new(args.num_spatial_layers, args.num_temporal_layers)?;
    config.workers = args.workers;
    config.frame_offset = args.frame_offset;
    config.num_frames = args.num_frames;
    config.output = args.out;
    config.encoded_file_dir = args.encoded_file_dir;
    config.enable_vmaf = args.enable_vmaf;
    config.dump_commands = args.dump_commands;
    config.scratch_root = args.scratch_dir;

    let report = video_quality::run(&config).context("benchmark run failed")?;
    if !report.dry_run {
        info!(
            "{} of {} jobs failed, {} records",
            report.failed_jobs,
            report.total_jobs,
            report.records
        );
    }
    Ok(ExitCode::from(report.exit_code()))
}

fn graph_data(args: GraphDataArgs) -> Result<ExitCode> {
    let results = ResultSet::read(&args.results)?;
    if results.is_empty() {
        bail!("no records in {}", args.results.display());
    }
    let metrics = if args.metrics.is_empty() {
        DEFAULT_METRICS.iter().map(|m| m.to_string()).collect()
    } else {
        args.metrics
    };
    let data = build_graph_data(results.records(), metrics.iter().map(String::as_str))
        .with_context(|| format!("group {}", args.results.display()))?;
    let json = serde_json::to_string_pretty(&data)?;
    match &args.out {
        Some(path) => fs::write(path, json + "\n")
            .with_context(|| format!("write graph data: {}", path.display()))?,
        None => println!("{json}"),
    }
    Ok(ExitCode::SUCCESS)
}
