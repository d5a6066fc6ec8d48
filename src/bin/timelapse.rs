use std::{
    fs::File,
    io::{BufReader, IsTerminal as _},
    path::{Path, PathBuf},
};

use anyhow::Context as _;
use clap::{ArgAction, Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug)]
#[command(name = "timelapse", version)]
struct Cli {
    /// Raise log verbosity (-v debug, -vv trace).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Catalogue a photo directory and print what a render would use.
    Inspect(InspectArgs),
    /// Encode a photo directory into a video (requires `ffmpeg`).
    Render(RenderArgs),
}

#[derive(Parser, Debug)]
struct InspectArgs {
    /// Directory of .jpg/.jpeg/.png frames.
    dir: PathBuf,

    #[arg(long, value_enum, default_value_t = OrderChoice::Timestamp)]
    order: OrderChoice,

    /// Print the catalog as JSON instead of a table.
    #[arg(long)]
    json: bool,
}

#[derive(Parser, Debug)]
struct RenderArgs {
    /// Directory of .jpg/.jpeg/.png frames.
    dir: PathBuf,

    /// Run options JSON; flags below override it.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Output video path. An existing file is never overwritten.
    #[arg(long)]
    out: Option<PathBuf>,

    #[arg(long)]
    fps: Option<f64>,

    #[arg(long)]
    crf: Option<u32>,

    #[arg(long)]
    preset: Option<String>,

    /// `W:H`, or `auto` for the most common frame size.
    #[arg(long)]
    scale: Option<String>,

    #[arg(long)]
    codec: Option<String>,

    #[arg(long = "pix-fmt")]
    pix_fmt: Option<String>,

    #[arg(long, value_enum)]
    order: Option<OrderChoice>,

    /// Burn each frame's capture time into its bottom-left corner.
    #[arg(long)]
    caption: bool,

    /// Caption font file (implies --caption).
    #[arg(long)]
    font: Option<PathBuf>,

    /// Draw a running clock with ffmpeg's drawtext filter using this font.
    #[arg(long = "overlay-font")]
    overlay_font: Option<PathBuf>,

    /// Keep captioned frames after encoding.
    #[arg(long = "keep-temp")]
    keep_temp: bool,

    /// Directory for the manifest and captioned frames.
    #[arg(long = "work-dir")]
    work_dir: Option<PathBuf>,

    /// Encoder executable.
    #[arg(long)]
    ffmpeg: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum OrderChoice {
    Timestamp,
    Filename,
}

impl From<OrderChoice> for timelapse::OrderKey {
    fn from(c: OrderChoice) -> Self {
        match c {
            OrderChoice::Timestamp => Self::Timestamp,
            OrderChoice::Filename => Self::Filename,
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    match cli.cmd {
        Command::Inspect(args) => cmd_inspect(args),
        Command::Render(args) => cmd_render(args),
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => tracing::Level::INFO,
        1 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_ansi(std::io::stderr().is_terminal())
        .with_writer(std::io::stderr)
        .init();
}

fn cmd_inspect(args: InspectArgs) -> anyhow::Result<()> {
    let catalog = timelapse::build_catalog(&args.dir, args.order.into())?;

    if args.json {
        let json = serde_json::to_string_pretty(&catalog).context("serialize catalog")?;
        println!("{json}");
        return Ok(());
    }

    println!(
        "{:<32} {:<19} {:<14} {:>11} {:>7}",
        "filename", "timestamp", "source", "size", "aspect"
    );
    for f in catalog.frames() {
        let ts = f
            .timestamp
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "-".to_string());
        let size = f
            .dimensions()
            .map(|(w, h)| format!("{w}x{h}"))
            .unwrap_or_else(|| "-".to_string());
        let aspect = f
            .aspect_ratio
            .map(|a| format!("{a:.4}"))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<32} {:<19} {:<14} {:>11} {:>7}",
            f.filename,
            ts,
            format!("{:?}", f.timestamp_source),
            size,
            aspect
        );
    }
    println!();
    println!("{}", catalog.summary());

    for issue in catalog.issues() {
        println!("issue: {}: {}", issue.filename, issue.error);
    }
    match timelapse::suggest_scale(&catalog) {
        Some(s) => println!("suggested scale: {s}"),
        None => println!("suggested scale: none"),
    }
    Ok(())
}

fn cmd_render(args: RenderArgs) -> anyhow::Result<()> {
    let opts = run_options(&args)?;

    match timelapse::run(&opts)? {
        timelapse::RunReport::Empty => {
            eprintln!("no frames to encode in '{}'", opts.source_dir.display());
        }
        timelapse::RunReport::Encoded {
            out_path,
            frames_encoded,
            frames_skipped,
            scale,
            caption_dir,
            font,
        } => {
            if font == Some(timelapse::FontOrigin::Unavailable) {
                eprintln!("warning: no usable font; frames were encoded without captions");
            }
            if let Some(s) = scale {
                eprintln!("scale {s}");
            }
            if frames_skipped > 0 {
                eprintln!("skipped {frames_skipped} frame(s)");
            }
            if let Some(dir) = caption_dir {
                eprintln!("captioned frames kept in {}", dir.display());
            }
            eprintln!("wrote {} ({frames_encoded} frames)", out_path.display());
        }
    }
    Ok(())
}

fn read_options_json(path: &Path) -> anyhow::Result<timelapse::RunOptions> {
    let f = File::open(path).with_context(|| format!("open config '{}'", path.display()))?;
    let opts = serde_json::from_reader(BufReader::new(f))
        .with_context(|| format!("parse config '{}'", path.display()))?;
    Ok(opts)
}

fn run_options(args: &RenderArgs) -> anyhow::Result<timelapse::RunOptions> {
    let mut opts = match &args.config {
        Some(path) => read_options_json(path)?,
        None => timelapse::RunOptions::default(),
    };
    opts.source_dir = args.dir.clone();

    if let Some(order) = args.order {
        opts.order = order.into();
    }
    if let Some(dir) = &args.work_dir {
        opts.work_dir = dir.clone();
    }
    if let Some(scale) = &args.scale {
        opts.scale = if scale.eq_ignore_ascii_case("auto") {
            timelapse::ScaleChoice::Auto
        } else {
            scale.parse::<timelapse::ScaleSuggestion>()?.into()
        };
    }
    if args.caption || args.font.is_some() {
        let style = opts.caption.get_or_insert_with(timelapse::CaptionStyle::default);
        if let Some(font) = &args.font {
            style.font_path = Some(font.clone());
        }
    }
    if let Some(font) = &args.overlay_font {
        let font_size = opts.overlay_timestamp.as_ref().map_or(24, |o| o.font_size);
        opts.overlay_timestamp = Some(timelapse::OverlayTimestamp {
            font_file: font.clone(),
            font_size,
        });
    }

    let enc = &mut opts.encode;
    if let Some(out) = &args.out {
        enc.out_path = out.clone();
    }
    if let Some(fps) = args.fps {
        enc.fps = fps;
    }
    if let Some(crf) = args.crf {
        enc.crf = crf;
    }
    if let Some(preset) = &args.preset {
        enc.preset = preset.clone();
    }
    if let Some(codec) = &args.codec {
        enc.codec = codec.clone();
    }
    if let Some(pix_fmt) = &args.pix_fmt {
        enc.pix_fmt = pix_fmt.clone();
    }
    if let Some(ffmpeg) = &args.ffmpeg {
        enc.ffmpeg_bin = ffmpeg.clone();
    }
    if args.keep_temp {
        enc.delete_temp_files = false;
    }
    enc.validate()?;

    Ok(opts)
}
