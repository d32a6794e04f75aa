#!/usr/bin/env -S cargo +nightly -Zscript
---cargo
[package]
edition = "2024"

[dependencies]
anyhow = "1"
clap = { version = "4.5", features = ["derive"] }
---

use std::path::PathBuf;
use std::process::Command;

use anyhow::{Context, Result, bail};
use clap::Parser;

#[derive(Debug, Parser)]
#[command(about = "Run the quality benchmark serially for 1, 2 and 3 temporal layers, then export graph data")]
struct Args {
    /// Clip descriptors passed through to `video-quality run`.
    #[arg(required = true)]
    clips: Vec<String>,

    #[arg(long, default_value = "libvpx-rt:vp8,libvpx-rt:vp9")]
    encoders: String,

    #[arg(long, default_value = "results")]
    out_dir: PathBuf,

    #[arg(long)]
    workers: Option<usize>,

    #[arg(long)]
    num_frames: Option<u64>,

    #[arg(long)]
    enable_vmaf: bool,

    #[arg(long, default_value_t = true)]
    release: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    std::fs::create_dir_all(&args.out_dir)
        .with_context(|| format!("create output dir: {}", args.out_dir.display()))?;

    for temporal in 1..=3 {
        let results = args.out_dir.join(format!("results-1sl{temporal}tl.json"));
        run_one(temporal, &results, &args)?;
        export_graph_data(&results, &args)?;
    }

    println!("[quality-suite] done");
    Ok(())
}

fn cargo_run(args: &Args) -> Command {
    let mut cmd = Command::new("cargo");
    cmd.args(["run", "--quiet"]);
    if args.release {
        cmd.arg("--release");
    }
    cmd.args(["--bin", "video-quality", "--"]);
    cmd
}

fn run_one(temporal: u32, results: &PathBuf, args: &Args) -> Result<()> {
    let mut cmd = cargo_run(args);
    cmd.arg("run")
        .args(["--encoders", &args.encoders])
        .args(["--num-temporal-layers", &temporal.to_string()])
        .arg("--out")
        .arg(results);
    if let Some(workers) = args.workers {
        cmd.args(["--workers", &workers.to_string()]);
    }
    if let Some(frames) = args.num_frames {
        cmd.args(["--num-frames", &frames.to_string()]);
    }
    if args.enable_vmaf {
        cmd.arg("--enable-vmaf");
    }
    cmd.args(&args.clips);

    println!("[quality-suite] start temporal_layers={temporal}");
    let status = cmd
        .status()
        .with_context(|| format!("spawn quality run ({temporal} temporal layers)"))?;
    if !status.success() {
        bail!("quality run failed for temporal_layers={temporal} (status={status})");
    }
    println!("[quality-suite] done  temporal_layers={temporal}");
    Ok(())
}

fn export_graph_data(results: &PathBuf, args: &Args) -> Result<()> {
    let graphs = results.with_extension("graphs.json");
    let status = cargo_run(args)
        .arg("graph-data")
        .arg(results)
        .arg("--out")
        .arg(&graphs)
        .status()
        .with_context(|| format!("spawn graph-data for {}", results.display()))?;
    if !status.success() {
        bail!("graph-data failed for {} (status={status})", results.display());
    }
    Ok(())
}
