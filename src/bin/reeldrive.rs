use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use clap::{Args, Parser, Subcommand};
use reeldrive::{
    Bundle, BundleFactory, Driver, DriverOpts, FfmpegSink, FfmpegSinkOpts, FrameIndex, FrameRange,
    FrameSink, PageFactory, PngSequenceSink, RenderJob,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "reeldrive", version)]
struct Cli {
    /// Raise log verbosity (-v info, -vv debug, -vvv trace). `RUST_LOG` takes precedence.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the compositions a bundle registers, as JSON.
    Compositions(BundleArgs),
    /// Render a single frame as a PNG.
    Frame(FrameArgs),
    /// Render a frame range to an MP4 (requires `ffmpeg` on PATH) or a PNG sequence.
    Render(RenderArgs),
}

#[derive(Args, Debug)]
struct BundleArgs {
    /// Bundle directory containing `bundle.json`.
    #[arg(long)]
    bundle: PathBuf,

    /// Input props: inline JSON object or `@path/to/props.json`.
    #[arg(long)]
    props: Option<String>,

    /// Per-command timeout in milliseconds (0 disables it).
    #[arg(long, default_value_t = 30_000)]
    timeout_ms: u64,
}

#[derive(Args, Debug)]
struct FrameArgs {
    #[command(flatten)]
    bundle: BundleArgs,

    /// Composition id.
    #[arg(long)]
    composition: String,

    /// Frame index (0-based).
    #[arg(long)]
    frame: u64,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,
}

#[derive(Args, Debug)]
struct RenderArgs {
    #[command(flatten)]
    bundle: BundleArgs,

    /// Composition id.
    #[arg(long)]
    composition: String,

    /// Output MP4 path, or output directory with `--png-dir`.
    #[arg(long)]
    out: PathBuf,

    /// Inclusive frame range `START-END` or a single frame `N`. Defaults to all frames.
    #[arg(long)]
    frames: Option<String>,

    /// Page instances rendering in parallel. Defaults to the available CPU parallelism.
    #[arg(long)]
    workers: Option<usize>,

    /// Write `frame-<n>.png` files into `--out` instead of encoding an MP4.
    #[arg(long, default_value_t = false)]
    png_dir: bool,

    /// Overwrite existing output.
    #[arg(long, default_value_t = false)]
    overwrite: bool,

    /// Background colour alpha is flattened over for MP4 output.
    #[arg(long, default_value = "#000000")]
    background: String,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    match cli.cmd {
        Command::Compositions(args) => cmd_compositions(args),
        Command::Frame(args) => cmd_frame(args),
        Command::Render(args) => cmd_render(args),
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("reeldrive={level}")));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

impl BundleArgs {
    fn factory(&self) -> anyhow::Result<BundleFactory> {
        let bundle = Bundle::from_dir(&self.bundle)
            .with_context(|| format!("load bundle '{}'", self.bundle.display()))?;
        let props = match &self.props {
            Some(raw) => read_props(raw)?,
            None => serde_json::json!({}),
        };
        Ok(BundleFactory::new(Arc::new(bundle), props))
    }

    fn driver_opts(&self) -> DriverOpts {
        DriverOpts {
            command_timeout: (self.timeout_ms > 0).then(|| Duration::from_millis(self.timeout_ms)),
        }
    }
}

fn read_props(raw: &str) -> anyhow::Result<serde_json::Value> {
    let json = match raw.strip_prefix('@') {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("read props file '{path}'"))?,
        None => raw.to_owned(),
    };
    let v: serde_json::Value = serde_json::from_str(&json).context("parse --props as JSON")?;
    anyhow::ensure!(v.is_object(), "--props must be a JSON object");
    Ok(v)
}

fn cmd_compositions(args: BundleArgs) -> anyhow::Result<()> {
    let factory = args.factory()?;
    let mut driver = Driver::new(factory.open()?, args.driver_opts());
    driver.enter_evaluation()?;
    let comps = driver.list_compositions()?;
    println!("{}", serde_json::to_string_pretty(&comps)?);
    Ok(())
}

fn cmd_frame(args: FrameArgs) -> anyhow::Result<()> {
    let factory = args.bundle.factory()?;
    let mut job = RenderJob::new(args.composition);
    job.driver = args.bundle.driver_opts();
    let frame = reeldrive::render_frame(&factory, &job, FrameIndex(args.frame))?;

    ensure_parent(&args.out)?;
    std::fs::write(&args.out, frame.to_png()?)
        .with_context(|| format!("write png '{}'", args.out.display()))?;

    eprintln!("wrote {}", args.out.display());
    Ok(())
}

fn cmd_render(args: RenderArgs) -> anyhow::Result<()> {
    let factory = args.bundle.factory()?;
    let mut job = RenderJob::new(args.composition);
    job.driver = args.bundle.driver_opts();
    job.workers = args.workers.unwrap_or_else(default_workers);
    job.range = args.frames.as_deref().map(FrameRange::parse).transpose()?;

    let mut sink: Box<dyn FrameSink> = if args.png_dir {
        let sink = PngSequenceSink::new(&args.out);
        Box::new(if args.overwrite { sink } else { sink.no_overwrite() })
    } else {
        let bg = reeldrive::parse_hex_color(&args.background)
            .map_err(|e| anyhow::anyhow!("--background: {e}"))?;
        Box::new(FfmpegSink::new(FfmpegSinkOpts {
            out_path: args.out.clone(),
            overwrite: args.overwrite,
            bg_rgba: [bg.r, bg.g, bg.b, 255],
        }))
    };
    let stats = reeldrive::render_range(&factory, &job, sink.as_mut())?;

    eprintln!(
        "wrote {} ({} frames, {} workers)",
        args.out.display(),
        stats.frames_rendered,
        stats.workers
    );
    Ok(())
}

fn ensure_parent(path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }
    Ok(())
}

fn default_workers() -> usize {
    std::thread::available_parallelism().map_or(1, |n| n.get())
}
