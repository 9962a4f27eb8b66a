use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::Context;
use clap::{ArgAction, Parser, Subcommand};
use serde::Serialize;
use sgatlas_core::container::ContainerWarning;
use sgatlas_core::loader::LoadedContainer;
use sgatlas_core::prelude::*;
use sgatlas_core::{to_json_array, to_json_hash};
use tracing::{error, info, warn};
use walkdir::WalkDir;

#[derive(Parser, Debug)]
#[command(
    name = "sgatlas",
    about = "Inspect, unpack and pack SG2/SG3 sprite containers",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
    /// Show progress bars (disable with --progress false or --quiet)
    #[arg(long, default_value_t = true, action=ArgAction::Set, global=true, help_heading = "Logging/UX")]
    progress: bool,
    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action=ArgAction::Count, global=true, help_heading = "Logging/UX")]
    verbose: u8,
    /// Quiet mode (overrides verbose)
    #[arg(
        short,
        long,
        default_value_t = false,
        global = true,
        help_heading = "Logging/UX"
    )]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print header, bitmaps, images and warnings of a container as JSON
    Info(InfoArgs),
    /// Decode every image of a container into PNG files
    Unpack(UnpackArgs),
    /// Decode containers and pack all their images into one strip atlas
    Pack(PackArgs),
}

#[derive(Parser, Debug, Clone)]
struct DecoderArgs {
    /// Where the image table starts: packed | reserved
    #[arg(long, default_value = "packed", help_heading = "Decoder")]
    table_layout: String,
    /// JSON decoder config file (overrides --table-layout)
    #[arg(long, help_heading = "Decoder")]
    decoder_config: Option<PathBuf>,
}

impl DecoderArgs {
    fn decoder_config(&self) -> anyhow::Result<DecoderConfig> {
        let cfg = if let Some(path) = &self.decoder_config {
            let text = fs::read_to_string(path)
                .with_context(|| format!("read {}", path.display()))?;
            serde_json::from_str(&text).with_context(|| format!("parse {}", path.display()))?
        } else {
            let layout = self
                .table_layout
                .parse::<TableLayout>()
                .map_err(|_| anyhow::anyhow!("unknown table layout: {}", self.table_layout))?;
            DecoderConfig::builder().table_layout(layout).build()
        };
        cfg.validate()?;
        Ok(cfg)
    }
}

#[derive(Parser, Debug, Clone)]
struct InfoArgs {
    /// Container file (.sg2 / .sg3)
    input: PathBuf,
    #[command(flatten)]
    decoder: DecoderArgs,
}

#[derive(Parser, Debug, Clone)]
struct UnpackArgs {
    /// Container file (.sg2 / .sg3)
    input: PathBuf,
    /// Output directory
    #[arg(short, long, default_value = "out")]
    out_dir: PathBuf,
    #[command(flatten)]
    decoder: DecoderArgs,
}

#[derive(Parser, Debug, Clone)]
struct PackArgs {
    /// Input file or directory
    #[arg(help_heading = "Input/Output")]
    input: PathBuf,
    /// Output directory
    #[arg(short, long, default_value = "out", help_heading = "Input/Output")]
    out_dir: PathBuf,
    /// Atlas base name (files will be name.png/.json)
    #[arg(short, long, default_value = "atlas", help_heading = "Input/Output")]
    name: String,
    /// Metadata format: json-hash | json-array
    #[arg(long, default_value = "json-hash", help_heading = "Input/Output")]
    metadata: String,
    /// Compute everything but write nothing
    #[arg(long, default_value_t = false, help_heading = "Input/Output")]
    dry_run: bool,
    /// Write packing statistics to this JSON file
    #[arg(long, help_heading = "Input/Output")]
    export_stats: Option<PathBuf>,
    /// Fail when the atlas would be wider than this
    #[arg(long, help_heading = "Atlas")]
    max_width: Option<u32>,
    /// Draw red outlines around frames (debug)
    #[arg(long, default_value_t = false, help_heading = "Atlas")]
    outlines: bool,
    /// Prefix prepended to every frame name
    #[arg(long, default_value = "", help_heading = "Atlas")]
    prefix: String,
    #[command(flatten)]
    decoder: DecoderArgs,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing_with_level(cli.quiet, cli.verbose);
    match &cli.command {
        Commands::Info(args) => run_info(args),
        Commands::Unpack(args) => run_unpack(args, cli.progress && !cli.quiet),
        Commands::Pack(args) => run_pack(args, cli.progress && !cli.quiet),
    }
}

#[derive(Serialize)]
struct InfoReport<'a> {
    path: String,
    external: bool,
    header: &'a FileHeader,
    bitmaps: &'a [sgatlas_core::container::Bitmap],
    images: &'a [sgatlas_core::container::Image],
    warnings: Vec<String>,
}

fn run_info(args: &InfoArgs) -> anyhow::Result<()> {
    let cfg = args.decoder.decoder_config()?;
    let bytes = fs::read(&args.input).with_context(|| format!("read {}", args.input.display()))?;
    let file = SgFile::parse(&bytes, &cfg)
        .with_context(|| format!("parse {}", args.input.display()))?;
    let report = InfoReport {
        path: args.input.to_string_lossy().replace('\\', "/"),
        external: file.needs_external(),
        header: &file.header,
        bitmaps: &file.bitmaps,
        images: &file.images,
        warnings: file.warnings.iter().map(ContainerWarning::to_string).collect(),
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn run_unpack(args: &UnpackArgs, show_progress: bool) -> anyhow::Result<()> {
    let cfg = args.decoder.decoder_config()?;
    fs::create_dir_all(&args.out_dir)
        .with_context(|| format!("create out_dir {}", args.out_dir.display()))?;
    let loaded = LoadedContainer::open(&args.input, &cfg)
        .with_context(|| format!("open {}", args.input.display()))?;

    let t0 = Instant::now();
    let report = loaded.decode_all(&cfg);
    let bar = progress_bar(report.graphics.len(), "writing", show_progress)?;
    for g in &report.graphics {
        let out_path = args.out_dir.join(format!("{}.png", g.key));
        g.graphic
            .pixels
            .save(&out_path)
            .with_context(|| format!("write {}", out_path.display()))?;
        if let Some(b) = &bar {
            b.inc(1);
        }
    }
    if let Some(b) = &bar {
        b.finish_and_clear();
    }
    for (index, e) in &report.failures {
        warn!(index, error = %e, "image not decoded");
    }
    info!(
        written = report.graphics.len(),
        failed = report.failures.len(),
        took = %fmt_dur(t0.elapsed()),
        "unpacked"
    );
    Ok(())
}

fn run_pack(args: &PackArgs, show_progress: bool) -> anyhow::Result<()> {
    let cfg = args.decoder.decoder_config()?;
    let registry = LoaderRegistry::with_decoder_config(cfg);
    let paths = gather_paths(&args.input, &registry)?;
    if paths.is_empty() {
        anyhow::bail!("no loadable files under {}", args.input.display());
    }

    let t0 = Instant::now();
    let graphics = load_with_progress(&registry, &paths, show_progress)?;
    let t_load = t0.elapsed();

    let opts = ComposeOptions {
        max_width: args.max_width,
        outlines: args.outlines,
    };
    let mut inputs = graphics;
    if !args.prefix.is_empty() {
        for g in &mut inputs {
            g.key = format!("{}{}", args.prefix, g.key);
        }
    }
    for key in duplicate_keys(&inputs) {
        warn!(%key, "several graphics share this name; use --prefix or pack the files separately");
    }
    let t1 = Instant::now();
    let out = pack_graphics_with(inputs, opts).context("pack atlas")?;
    let t_pack = t1.elapsed();
    let stats = out.stats();
    info!(
        files = paths.len(),
        frames = stats.num_frames,
        width = out.layout.width,
        height = out.layout.height,
        load = %fmt_dur(t_load),
        pack = %fmt_dur(t_pack),
        "packed"
    );

    let image_name = format!("{}.png", args.name);
    let meta = match args.metadata.as_str() {
        "json-hash" | "hash" => to_json_hash(&out.layout, &image_name),
        "json-array" | "array" => to_json_array(&out.layout, &image_name),
        other => anyhow::bail!("unknown metadata format: {}", other),
    };

    if args.dry_run {
        println!("{}", stats.summary());
    } else {
        fs::create_dir_all(&args.out_dir)
            .with_context(|| format!("create out_dir {}", args.out_dir.display()))?;
        let png_path = args.out_dir.join(&image_name);
        out.rgba
            .save(&png_path)
            .with_context(|| format!("write {}", png_path.display()))?;
        let json_path = args.out_dir.join(format!("{}.json", args.name));
        fs::write(&json_path, serde_json::to_string_pretty(&meta)?)
            .with_context(|| format!("write {}", json_path.display()))?;
        info!(?png_path, ?json_path, "atlas written");
    }

    if let Some(stats_path) = &args.export_stats {
        let value = serde_json::to_value(stats)?;
        if !args.dry_run {
            fs::write(stats_path, serde_json::to_string_pretty(&value)?)
                .with_context(|| format!("write {}", stats_path.display()))?;
            info!(?stats_path, "stats exported");
        }
    }
    Ok(())
}

fn fmt_dur(d: Duration) -> String {
    let ms = d.as_secs_f64() * 1000.0;
    if ms >= 1.0 {
        format!("{:.1}ms", ms)
    } else {
        format!("{}µs", d.as_micros())
    }
}

fn gather_paths(path: &Path, registry: &LoaderRegistry) -> anyhow::Result<Vec<PathBuf>> {
    if path.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }
    if !path.is_dir() {
        anyhow::bail!("input not found: {}", path.display());
    }
    let mut list: Vec<PathBuf> = WalkDir::new(path)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .map(|e| e.into_path())
        .filter(|p| p.is_file() && registry.supports(p))
        .collect();
    list.dedup();
    Ok(list)
}

fn progress_bar(
    len: usize,
    verb: &str,
    enabled: bool,
) -> anyhow::Result<Option<indicatif::ProgressBar>> {
    use indicatif::{ProgressBar, ProgressStyle};
    if !enabled {
        return Ok(None);
    }
    let b = ProgressBar::new(len as u64);
    b.set_style(ProgressStyle::with_template(&format!(
        "{{spinner:.green}} {verb} {{pos}}/{{len}} [{{elapsed_precise}}] {{wide_msg}}"
    ))?);
    Ok(Some(b))
}

fn load_with_progress(
    registry: &LoaderRegistry,
    paths: &[PathBuf],
    progress: bool,
) -> anyhow::Result<Vec<InputGraphic>> {
    #[cfg(feature = "parallel")]
    let list = load_parallel(registry, paths, progress)?;
    #[cfg(not(feature = "parallel"))]
    let list = load_sequential(registry, paths, progress)?;
    Ok(list)
}

#[cfg(feature = "parallel")]
fn load_parallel(
    registry: &LoaderRegistry,
    paths: &[PathBuf],
    progress: bool,
) -> anyhow::Result<Vec<InputGraphic>> {
    let bar = progress_bar(paths.len(), "loading", progress)?;
    let results = load_files_with(registry, paths, |_| {
        if let Some(b) = &bar {
            b.inc(1);
        }
    });
    if let Some(b) = &bar {
        b.finish_and_clear();
    }
    let mut list = Vec::new();
    for (path, result) in results {
        match result {
            Ok(graphics) => list.extend(graphics),
            Err(e) => error!(path = %path.display(), error = %e, "skip file"),
        }
    }
    Ok(list)
}

#[cfg(not(feature = "parallel"))]
fn load_sequential(
    registry: &LoaderRegistry,
    paths: &[PathBuf],
    progress: bool,
) -> anyhow::Result<Vec<InputGraphic>> {
    let bar = progress_bar(paths.len(), "loading", progress)?;
    let mut list = Vec::new();
    for p in paths {
        if let Some(b) = &bar {
            let msg = p.file_name().and_then(|s| s.to_str()).unwrap_or("");
            b.set_message(msg.to_string());
        }
        match registry.load(p) {
            Ok(graphics) => list.extend(graphics),
            Err(e) => error!(error = %e, "skip file"),
        }
        if let Some(b) = &bar {
            b.inc(1);
        }
    }
    if let Some(b) = &bar {
        b.finish_and_clear();
    }
    Ok(list)
}

fn init_tracing_with_level(quiet: bool, verbose: u8) {
    let level = if quiet {
        "error".to_string()
    } else {
        match verbose {
            0 => "info".into(),
            1 => "debug".into(),
            _ => "trace".into(),
        }
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(level)
        .with_target(false)
        .try_init();
}
