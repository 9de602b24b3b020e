use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use thumbforge::{Color, ThumbnailError};
use thumbforge::config::{self, Anchor, ResizeMode, ThumbnailConfig};
use thumbforge::imaging::{self, CancellationToken, Dimensions, FontRegistry, RustBackend};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "thumbforge")]
#[command(about = "Make thumbnails: resize, crop, pad and watermark images")]
#[command(long_about = "\
Make thumbnails: resize, crop, pad and watermark images

Settings are layered, later layers win:

  1. built-in defaults          (see 'thumbforge gen-config')
  2. --config thumbnail.toml
  3. command-line flags         (--width, --mode, --watermark, ...)

Resize modes:
  fit      scale to fit inside the box (may enlarge)
  cover    scale to cover the box, crop the overflow at --anchor
  contain  like fit, but never enlarge
  pad      fit inside, then letterbox to exactly width x height
  crop     like fit, cropped at --anchor if it overflows

Set RUST_LOG (e.g. RUST_LOG=thumbforge=trace) for finer log control.")]
#[command(version)]
struct Cli {
    /// Log every pipeline step
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

/// Config file plus per-key overrides.
#[derive(clap::Args, Clone)]
struct ConfigArgs {
    /// TOML config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Target width in pixels
    #[arg(long)]
    width: Option<u32>,

    /// Target height in pixels
    #[arg(long)]
    height: Option<u32>,

    /// Resize mode: fit, cover, contain, pad, crop
    #[arg(long)]
    mode: Option<ResizeMode>,

    /// Crop/pad anchor, e.g. center, top-left, bottom-right
    #[arg(long)]
    anchor: Option<Anchor>,

    /// Canvas color as RRGGBB or AARRGGBB
    #[arg(long)]
    background: Option<String>,

    /// Watermark text
    #[arg(long)]
    watermark: Option<String>,

    /// Output format: jpeg or png
    #[arg(long)]
    format: Option<String>,

    /// JPEG quality, 1-100
    #[arg(long)]
    quality: Option<u32>,

    /// Never enlarge the source
    #[arg(long)]
    no_upscale: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Make thumbnails from one or more images
    Make {
        /// Source images
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Output file (one input) or directory (several inputs).
        /// Defaults to NAME-thumb.EXT next to each input.
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Extra font directories for watermarks (system fonts if none)
        #[arg(long = "font-dir")]
        font_dirs: Vec<PathBuf>,

        #[command(flatten)]
        config: ConfigArgs,
    },
    /// Print the resize plan for a source size as JSON
    Plan {
        /// Source width in pixels
        src_width: u32,
        /// Source height in pixels
        src_height: u32,

        #[command(flatten)]
        config: ConfigArgs,
    },
    /// Print a stock thumbnail.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::Make {
            inputs,
            output,
            font_dirs,
            config,
        } => {
            let config = resolve_cli_config(&config)?;
            let backend = if config.watermark.is_inert() {
                RustBackend::new()
            } else {
                RustBackend::with_fonts(load_fonts(&font_dirs)?)
            };
            let outputs = output_paths(&inputs, output.as_deref(), config.output.encoding().extension())?;

            let sources = inputs
                .iter()
                .map(std::fs::read)
                .collect::<Result<Vec<_>, _>>()?;
            let results = imaging::make_thumbnails(&backend, &sources, &config, &CancellationToken::new());

            let mut failed = 0;
            for ((input, output), result) in inputs.iter().zip(&outputs).zip(results) {
                match result {
                    Ok(bytes) => {
                        std::fs::write(output, &bytes)?;
                        println!("{} → {}", input.display(), output.display());
                    }
                    Err(e) => {
                        eprintln!("{}: {e}", input.display());
                        failed += 1;
                    }
                }
            }
            if failed > 0 {
                return Err(format!("{failed} of {} thumbnails failed", inputs.len()).into());
            }
        }
        Command::Plan {
            src_width,
            src_height,
            config,
        } => {
            let config = resolve_cli_config(&config)?;
            let plan = imaging::plan_thumbnail(Dimensions::new(src_width, src_height), &config)?;
            println!("{}", serde_json::to_string_pretty(&plan)?);
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}

/// Stock defaults, then the config file, then command-line flags.
fn resolve_cli_config(args: &ConfigArgs) -> Result<ThumbnailConfig, config::ConfigError> {
    let mut base: toml::Value = toml::from_str(config::stock_config_toml())?;
    if let Some(path) = &args.config {
        base = config::merge_toml(base, config::load_raw_config(path)?);
    }
    config::resolve_config(base, Some(cli_overrides(args)?))
}

fn cli_overrides(args: &ConfigArgs) -> Result<toml::Value, ThumbnailError> {
    let mut root = toml::Table::new();
    let mut output = toml::Table::new();
    let mut watermark = toml::Table::new();

    if let Some(width) = args.width {
        root.insert("width".into(), i64::from(width).into());
    }
    if let Some(height) = args.height {
        root.insert("height".into(), i64::from(height).into());
    }
    if let Some(mode) = args.mode {
        root.insert("mode".into(), mode.as_str().into());
    }
    if let Some(anchor) = args.anchor {
        root.insert("anchor".into(), anchor.as_str().into());
    }
    if let Some(background) = &args.background {
        root.insert("background".into(), Color::from_hex(background)?.to_hex().into());
    }
    if args.no_upscale {
        root.insert("prevent_upscale".into(), true.into());
    }
    if let Some(format) = &args.format {
        output.insert("kind".into(), format.as_str().into());
    }
    if let Some(quality) = args.quality {
        output.insert("quality".into(), i64::from(quality).into());
    }
    if let Some(text) = &args.watermark {
        watermark.insert("text".into(), text.as_str().into());
    }

    if !output.is_empty() {
        root.insert("output".into(), toml::Value::Table(output));
    }
    if !watermark.is_empty() {
        root.insert("watermark".into(), toml::Value::Table(watermark));
    }
    Ok(toml::Value::Table(root))
}

fn load_fonts(dirs: &[PathBuf]) -> Result<FontRegistry, Box<dyn std::error::Error>> {
    if dirs.is_empty() {
        return Ok(FontRegistry::system());
    }
    let mut fonts = FontRegistry::new();
    for dir in dirs {
        fonts.add_dir(dir)?;
    }
    info!(count = fonts.len(), "loaded fonts");
    Ok(fonts)
}

/// `NAME-thumb.EXT` next to `input`, or inside `dir` when given.
fn default_output(input: &Path, dir: Option<&Path>, ext: &str) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy())
        .unwrap_or_default();
    let name = format!("{stem}-thumb.{ext}");
    match dir {
        Some(dir) => dir.join(name),
        None => input.with_file_name(name),
    }
}

fn output_paths(
    inputs: &[PathBuf],
    output: Option<&Path>,
    ext: &str,
) -> std::io::Result<Vec<PathBuf>> {
    match (inputs, output) {
        ([_], Some(file)) => Ok(vec![file.to_path_buf()]),
        (_, Some(dir)) => {
            std::fs::create_dir_all(dir)?;
            Ok(inputs.iter().map(|i| default_output(i, Some(dir), ext)).collect())
        }
        (_, None) => Ok(inputs.iter().map(|i| default_output(i, None, ext)).collect()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_args(args: &[&str]) -> ConfigArgs {
        let argv = ["thumbforge", "plan", "400", "300"].iter().chain(args).copied();
        match Cli::try_parse_from(argv).unwrap().command {
            Command::Plan { config, .. } => config,
            _ => unreachable!(),
        }
    }

    #[test]
    fn background_flag_is_normalized() {
        let overrides = cli_overrides(&config_args(&["--background", "#ff8000"])).unwrap();
        assert_eq!(overrides["background"].as_str(), Some("FF8000"));
    }

    #[test]
    fn bad_background_flag_is_a_color_error() {
        for bad in ["GG0000", "FFF", " FF0000"] {
            let err = cli_overrides(&config_args(&["--background", bad])).unwrap_err();
            assert!(matches!(err, ThumbnailError::ColorParse(_)), "{bad}");
        }

        let err = resolve_cli_config(&config_args(&["--background", "12345"])).unwrap_err();
        assert!(matches!(
            err,
            config::ConfigError::Invalid(ThumbnailError::ColorParse(_))
        ));
    }

    #[test]
    fn flags_override_stock_config() {
        let config = resolve_cli_config(&config_args(&["--width", "64", "--mode", "pad"])).unwrap();
        assert_eq!(config.target_width, 64);
        assert_eq!(config.mode, ResizeMode::Pad);
    }
}
