use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::{Duration, Instant},
};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use sublay::{
    BackendKind, DecoderFactory, DisplaySettings, Manifest, ManifestDecoder, ManualClock,
    OverlaySession, SessionOpts, SubtitleDecoder, SubtitleSource, TickOutcome,
};

#[derive(Parser, Debug)]
#[command(name = "sublay", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render the overlay at a list of playback times into PNG files.
    Frames(FramesArgs),
    /// Report which render tier the cascade selects on this machine.
    Probe(ProbeArgs),
}

#[derive(Parser, Debug)]
struct FramesArgs {
    /// Cue manifest JSON. Image paths resolve relative to its directory.
    #[arg(long)]
    manifest: PathBuf,

    /// Playback times in seconds, comma separated.
    #[arg(long, value_delimiter = ',', required = true)]
    times: Vec<f64>,

    /// Output directory for `frame_NNNN.png` files.
    #[arg(long)]
    out: PathBuf,

    /// Session options JSON.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Surface width. Defaults to the manifest width.
    #[arg(long)]
    width: Option<u32>,

    /// Surface height. Defaults to the manifest height.
    #[arg(long)]
    height: Option<u32>,

    /// Overlay scale factor.
    #[arg(long)]
    scale: Option<f64>,

    /// Vertical offset in percent of surface height (positive moves up).
    #[arg(long)]
    offset: Option<f64>,
}

#[derive(Parser, Debug)]
struct ProbeArgs {
    /// Tiers to try, best first (e.g. `explicit-gpu,immediate-gpu,software`).
    #[arg(long, value_delimiter = ',')]
    backends: Vec<BackendKind>,

    #[arg(long, default_value_t = 640)]
    width: u32,

    #[arg(long, default_value_t = 360)]
    height: u32,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Frames(args) => cmd_frames(args),
        Command::Probe(args) => cmd_probe(args),
    }
}

fn manifest_decoders() -> DecoderFactory {
    Arc::new(|| Ok(Box::new(ManifestDecoder::new()) as Box<dyn SubtitleDecoder>))
}

fn read_opts(path: Option<&Path>) -> anyhow::Result<SessionOpts> {
    let opts = match path {
        Some(p) => {
            let text = std::fs::read_to_string(p)
                .with_context(|| format!("read config '{}'", p.display()))?;
            serde_json::from_str(&text).with_context(|| "parse config JSON")?
        }
        None => SessionOpts::default(),
    };
    Ok(opts.with_env_overrides())
}

fn cmd_frames(args: FramesArgs) -> anyhow::Result<()> {
    let json = std::fs::read_to_string(&args.manifest)
        .with_context(|| format!("read manifest '{}'", args.manifest.display()))?;
    let manifest: Manifest = serde_json::from_str(&json).with_context(|| "parse manifest JSON")?;
    let base_dir = args
        .manifest
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));

    let mut opts = read_opts(args.config.as_deref())?;
    if args.scale.is_some() || args.offset.is_some() {
        opts.display = DisplaySettings::new(
            args.scale.unwrap_or(opts.display.scale),
            args.offset.unwrap_or(opts.display.vertical_offset_pct),
        );
    }
    let timeout = opts.dispatch_timeout();

    let width = args.width.unwrap_or(manifest.width);
    let height = args.height.unwrap_or(manifest.height);
    let mut session = OverlaySession::builder(width, height)
        .decoders(manifest_decoders())
        .opts(opts)
        .on_fallback(|n| eprintln!("note: {n}"))
        .build()?;
    let count = session.load(SubtitleSource::Manifest { json, base_dir })?;
    eprintln!(
        "loaded {count} cues; rendering on {}",
        session
            .active_backend()
            .map_or("nothing", BackendKind::name)
    );

    std::fs::create_dir_all(&args.out)
        .with_context(|| format!("create output dir '{}'", args.out.display()))?;

    let mut clock = ManualClock::default();
    for (i, &t) in args.times.iter().enumerate() {
        clock.set(t);
        session.on_seek();
        let outcome = tick_until_drawn(&mut session, &clock, timeout)?;
        let frame = session.read_pixels()?;
        let path = args.out.join(format!("frame_{i:04}.png"));
        image::save_buffer_with_format(
            &path,
            &frame.to_straight_rgba8(),
            frame.width,
            frame.height,
            image::ColorType::Rgba8,
            image::ImageFormat::Png,
        )
        .with_context(|| format!("write png '{}'", path.display()))?;
        let cue = match outcome {
            TickOutcome::Rendered(Some(index)) => format!("cue {index}"),
            _ => "no cue".to_string(),
        };
        eprintln!("t={t:.3}s {cue} -> {}", path.display());
    }

    let stats = session.stats();
    eprintln!(
        "rendered {} frames, avg {:.2} ms, max {:.2} ms, {} over budget",
        stats.frames_rendered, stats.average_ms, stats.max_ms, stats.frames_dropped
    );
    session.dispose();
    Ok(())
}

fn tick_until_drawn(
    session: &mut OverlaySession,
    clock: &ManualClock,
    timeout: Duration,
) -> anyhow::Result<TickOutcome> {
    let deadline = Instant::now() + timeout;
    loop {
        match session.tick(clock)? {
            TickOutcome::Pending(index) => {
                if Instant::now() >= deadline {
                    anyhow::bail!("cue {index} did not decode within {timeout:?}");
                }
                std::thread::sleep(Duration::from_millis(2));
            }
            other => return Ok(other),
        }
    }
}

fn cmd_probe(args: ProbeArgs) -> anyhow::Result<()> {
    let mut opts = SessionOpts::default().with_env_overrides();
    if !args.backends.is_empty() {
        opts.backends = args.backends;
    }
    opts.use_background = false;
    let session = OverlaySession::builder(args.width, args.height)
        .decoders(manifest_decoders())
        .opts(opts)
        .build()?;

    for notice in session.notices() {
        println!("fallback: {notice}");
    }
    let kind = session
        .active_backend()
        .context("no render backend initialized")?;
    println!("{kind}");
    Ok(())
}
