//! Command-line front end: loads the four input files, expands the layer
//! list, runs the two-level search, and reports the result.

mod input;

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};

use dse_core::TopologyDescriptor;
use dse_rules::LayerExpander;

/// Design-space explorer for the depthwise/pointwise CNN accelerator.
#[derive(Parser)]
#[command(name = "dse")]
#[command(about = "Search hardware parameters and per-layer tile sizes for minimum inference latency", long_about = None)]
struct Cli {
    /// Plain-text layer list
    #[arg(short = 'm', long = "model")]
    model: PathBuf,

    /// JSON topology descriptor (VGG/Stage1/Stage2 layer and repeat counts)
    #[arg(long = "model-config", visible_alias = "mc")]
    model_config: PathBuf,

    /// JSON input shape descriptor
    #[arg(short = 'i', long = "input-config")]
    input_config: PathBuf,

    /// JSON board resource budget
    #[arg(short = 'b', long = "board")]
    board: PathBuf,

    /// Spread the hardware-parameter sweep across ⌊0.75 · num_cpus⌋ workers
    #[arg(long)]
    parallel: bool,

    /// Per-layer tile-size search aggressiveness (0 = fixed, 1 = channel
    /// tiles only, 2 = channel and spatial tiles)
    #[arg(short = 'd', long = "dynamic-tiling", visible_alias = "dt", default_value_t = 1)]
    dynamic_tiling: u8,
}

fn main() {
    env_logger::init();
    if let Err(err) = run() {
        log::error!("{err:#}");
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    println!("╔══════════════════════════════════════════════════════════════════╗");
    println!("║  FPGA CNN Accelerator Design-Space Explorer                        ║");
    println!("╚══════════════════════════════════════════════════════════════════╝");
    println!();

    let num_workers = if cli.parallel {
        let cpus = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        ((cpus as f64) * 0.75).floor().max(1.0) as usize
    } else {
        1
    };
    println!("Workers: {num_workers} (--parallel={})", cli.parallel);
    println!("Dynamic tiling level: {}", cli.dynamic_tiling);
    println!();

    println!("📂 Loading input files...");
    let lines = input::read_model_file(&cli.model)
        .with_context(|| format!("failed to read model file {}", cli.model.display()))?;
    let model_config = input::read_model_config(&cli.model_config)
        .with_context(|| format!("failed to read model config {}", cli.model_config.display()))?;
    let input_config = input::read_input_config(&cli.input_config)
        .with_context(|| format!("failed to read input config {}", cli.input_config.display()))?;
    let board = input::read_board_config(&cli.board)
        .with_context(|| format!("failed to read board config {}", cli.board.display()))?;
    let topo: TopologyDescriptor = model_config.into();
    println!(
        "   ✓ {} layer lines, {} VGG + {}×{} Stage1 + {}×{} Stage2",
        lines.len(),
        topo.vgg_layers,
        topo.stage1_layers,
        topo.stage1_iter,
        topo.stage2_layers,
        topo.stage2_iter
    );
    println!();

    println!("🔧 Expanding layer topology...");
    let (layers, network_channel_max) = LayerExpander::expand(&lines, &topo, &input_config)
        .context("layer expansion failed")?;
    println!("   ✓ {} expanded layer instances", layers.len());
    println!();

    println!("🔍 Searching hardware-parameter space...");
    let start = Instant::now();

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {pos} chunks completed")
            .expect("static progress template is valid"),
    );

    let result = dse_search::search(
        &layers,
        &topo,
        input_config.in_h,
        input_config.in_w,
        network_channel_max,
        &board,
        cli.dynamic_tiling,
        num_workers,
        &|| pb.inc(1),
    );
    pb.finish_and_clear();
    let elapsed = start.elapsed();

    let result = result.context("design-space search failed")?;

    let seconds_per_inference = result.opt_latency / (result.opt_params.fre as f64 * 1.0e6);
    let fps = 1.0 / seconds_per_inference;
    let dsp_pct = result.opt_dsp / board.dsp * 100.0;
    let bram_pct = result.opt_bram18k / board.bram18k * 100.0;

    println!("   ✓ search complete in {:.2}s", elapsed.as_secs_f64());
    println!();
    println!("╔══════════════════════════════════════════════════════════════════╗");
    println!("║  Optimum                                                            ║");
    println!("╚══════════════════════════════════════════════════════════════════╝");
    println!("   Clock frequency:     {} MHz", result.opt_params.fre);
    println!("   Inference latency:   {:.6} s", seconds_per_inference);
    println!("   Throughput:          {:.2} fps", fps);
    println!(
        "   DSP usage:           {:.0} / {:.0} ({:.1}%)",
        result.opt_dsp, board.dsp, dsp_pct
    );
    println!(
        "   BRAM18K usage:       {:.0} / {:.0} ({:.1}%)",
        result.opt_bram18k, board.bram18k, bram_pct
    );
    println!();

    let out_path = PathBuf::from("opt_params.json");
    let file = std::fs::File::create(&out_path)
        .with_context(|| format!("failed to create {}", out_path.display()))?;
    serde_json::to_writer_pretty(file, &result.opt_params)
        .with_context(|| format!("failed to write {}", out_path.display()))?;
    println!("📝 Wrote {}", out_path.display());

    Ok(())
}
