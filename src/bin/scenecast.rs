use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use clap::{Parser, Subcommand, ValueEnum};
use scenecast::encode::ffmpeg::ffmpeg_available;
use scenecast::host::simulated::{SimulatedHostFactory, SimulatedScene};
use scenecast::{
    AnimationSynchronizer, EngineConfig, HostFactory, JobRunner, OutputFormat, QualityTier,
    RenderOutcome, RenderRequest, SceneDocument, Stage,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "scenecast", version)]
struct Cli {
    /// Engine config JSON. Environment overrides apply on top.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render a scene to MP4 or GIF.
    Render(RenderArgs),
    /// Write the assembled scene document without rendering it.
    Document(DocumentArgs),
    /// Check that ffmpeg and the browser can be started.
    Check,
}

#[derive(Parser, Debug)]
struct SceneArgs {
    /// Request JSON (`html`, `css`, `js`, `fps`, `duration`, ...). Flags below override it.
    #[arg(long)]
    request: Option<PathBuf>,

    /// Scene markup file.
    #[arg(long)]
    html: Option<PathBuf>,

    /// Scene stylesheet file.
    #[arg(long)]
    css: Option<PathBuf>,

    /// Scene script file.
    #[arg(long)]
    js: Option<PathBuf>,

    /// Frames per second.
    #[arg(long)]
    fps: Option<u32>,

    /// Duration in seconds.
    #[arg(long)]
    duration: Option<f64>,

    /// Output container.
    #[arg(long, value_enum)]
    format: Option<FormatChoice>,

    /// Encoder quality tier.
    #[arg(long, value_enum)]
    quality: Option<QualityChoice>,
}

#[derive(Parser, Debug)]
struct RenderArgs {
    #[command(flatten)]
    scene: SceneArgs,

    /// Output directory (overrides the config).
    #[arg(long)]
    out_dir: Option<PathBuf>,

    /// Scene host to capture with.
    #[arg(long, value_enum, default_value_t = HostChoice::Chrome)]
    host: HostChoice,
}

#[derive(Parser, Debug)]
struct DocumentArgs {
    #[command(flatten)]
    scene: SceneArgs,

    /// Directory to write `index.html` into.
    #[arg(long)]
    out_dir: PathBuf,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum FormatChoice {
    Mp4,
    Gif,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum QualityChoice {
    Low,
    Medium,
    High,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum HostChoice {
    /// Headless Chrome.
    Chrome,
    /// In-process synthetic scene; exercises the pipeline without a browser.
    Simulated,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;
    match cli.cmd {
        Command::Render(args) => cmd_render(config, args),
        Command::Document(args) => cmd_document(args),
        Command::Check => cmd_check(&config),
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<EngineConfig> {
    let mut config = match path {
        Some(p) => EngineConfig::from_path(p)?,
        None => EngineConfig::default(),
    };
    config.apply_env()?;
    config.validate()?;
    Ok(config)
}

fn read_text(path: &Path) -> anyhow::Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("read '{}'", path.display()))
}

fn build_request(args: &SceneArgs) -> anyhow::Result<RenderRequest> {
    let mut req = match &args.request {
        Some(p) => RenderRequest::from_json_str(&read_text(p)?)?,
        None => RenderRequest::default(),
    };
    if let Some(p) = &args.html {
        req.scene_markup = read_text(p)?;
    }
    if let Some(p) = &args.css {
        req.style_sheet = read_text(p)?;
    }
    if let Some(p) = &args.js {
        req.script_body = read_text(p)?;
    }
    if let Some(fps) = args.fps {
        req.frame_rate = fps;
    }
    if let Some(d) = args.duration {
        req.duration_secs = d;
    }
    if let Some(f) = args.format {
        req.output_format = match f {
            FormatChoice::Mp4 => OutputFormat::Mp4,
            FormatChoice::Gif => OutputFormat::Gif,
        };
    }
    if let Some(q) = args.quality {
        req.quality_tier = match q {
            QualityChoice::Low => QualityTier::Low,
            QualityChoice::Medium => QualityTier::Medium,
            QualityChoice::High => QualityTier::High,
        };
    }
    Ok(req)
}

fn make_hosts(choice: HostChoice, config: &EngineConfig) -> anyhow::Result<Arc<dyn HostFactory>> {
    match choice {
        #[cfg(feature = "chrome")]
        HostChoice::Chrome => Ok(Arc::new(scenecast::host::chrome::ChromeHostFactory::new(
            config.chrome.clone(),
        ))),
        #[cfg(not(feature = "chrome"))]
        HostChoice::Chrome => {
            let _ = config;
            anyhow::bail!("built without the `chrome` feature; use --host simulated")
        }
        HostChoice::Simulated => Ok(Arc::new(SimulatedHostFactory::new(SimulatedScene {
            tick_every_ms: Some(100),
            ..Default::default()
        }))),
    }
}

fn cmd_render(mut config: EngineConfig, args: RenderArgs) -> anyhow::Result<()> {
    if let Some(dir) = args.out_dir {
        config.output_dir = dir;
    }
    let req = build_request(&args.scene)?;
    let hosts = make_hosts(args.host, &config)?;
    let runner = JobRunner::new(config, hosts);

    let handle = runner.start_render(req)?;
    eprintln!("job {}", handle.id());
    if let Some(sub) = handle.subscribe() {
        let mut last = (Stage::Waiting, -1i32);
        while let Some(snap) = sub.recv_timeout(Duration::from_secs(600)) {
            let key = (snap.stage, snap.percent as i32);
            if key != last {
                eprintln!("[{:>10}] {:>3}% {}", snap.stage, key.1, snap.message);
                last = key;
            }
            if snap.stage.is_terminal() {
                break;
            }
        }
    }

    match handle.join() {
        Ok(RenderOutcome::Completed(out)) => {
            eprintln!(
                "wrote {} ({} bytes, {} frames, {} placeholders)",
                out.path.display(),
                out.byte_size,
                out.frames,
                out.placeholders
            );
            Ok(())
        }
        Ok(RenderOutcome::Cancelled) => anyhow::bail!("render cancelled"),
        Err(e) => Err(anyhow::anyhow!(e.user_message())).context("render failed"),
    }
}

fn cmd_document(args: DocumentArgs) -> anyhow::Result<()> {
    let req = build_request(&args.scene)?;
    let payload = scenecast::runtime::payload(&AnimationSynchronizer::standard());
    std::fs::create_dir_all(&args.out_dir)
        .with_context(|| format!("create output dir '{}'", args.out_dir.display()))?;
    let path = SceneDocument::build(&req, &payload).write_to(&args.out_dir)?;
    eprintln!("wrote {}", path.display());
    Ok(())
}

fn cmd_check(config: &EngineConfig) -> anyhow::Result<()> {
    let ffmpeg = &config.encoder.ffmpeg;
    anyhow::ensure!(
        ffmpeg_available(ffmpeg),
        "ffmpeg not runnable at '{}'",
        ffmpeg.display()
    );
    eprintln!("ffmpeg: ok ({})", ffmpeg.display());

    #[cfg(feature = "chrome")]
    {
        scenecast::host::chrome::ChromeHostFactory::new(config.chrome.clone()).probe()?;
        eprintln!("chrome: ok");
    }
    #[cfg(not(feature = "chrome"))]
    eprintln!("chrome: not built in");
    Ok(())
}
