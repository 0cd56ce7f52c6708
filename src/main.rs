use clap::{Parser, Subcommand};
use normpic::config::{self, CliOverrides, RunConfig};
use normpic::{fsops, organize, output, store};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "normpic")]
#[command(about = "Organize photos into chronologically named symlinks with a JSON manifest")]
#[command(long_about = "\
Organize photos into chronologically named symlinks with a JSON manifest

Source files are never modified. Each supported image in the source directory
gets a symlink in the destination directory named after its capture time and
camera, and every run rewrites manifest.json describing the collection.

Destination names:

  {collection-}YYYYMMDDTHHMMSS{-camera}{-counter}.ext
  wedding-20240315T143022-r5a-0.jpg

Capture time resolution (first available wins):
  EXIF DateTimeOriginal + SubSecTimeOriginal → filename → file mtime

Configuration (lowest to highest precedence):
  defaults < normpic.toml (or --config / NORMPIC_CONFIG_PATH)
           < NORMPIC_* environment < command-line flags

Run 'normpic gen-config' to generate a documented normpic.toml.")]
#[command(version)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug). RUST_LOG overrides.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Organize a source directory into the destination directory
    Organize {
        /// Config file (default: $NORMPIC_CONFIG_PATH, then ./normpic.toml)
        #[arg(long)]
        config: Option<PathBuf>,
        /// Source directory of original photos
        #[arg(long)]
        source: Option<PathBuf>,
        /// Destination directory for symlinks and manifest
        #[arg(long)]
        dest: Option<PathBuf>,
        /// Collection name, prefixed to every destination filename
        #[arg(long)]
        collection: Option<String>,
        /// Free-text collection description stored in the manifest
        #[arg(long)]
        description: Option<String>,
        /// Compute everything and write manifest.dryrun.json, create no links
        #[arg(long)]
        dry_run: bool,
        /// Rehash every file and recreate every link
        #[arg(long)]
        force: bool,
        /// Print every photo in manifest order after the summary
        #[arg(long)]
        list: bool,
    },
    /// Show the changes between two manifests
    Diff {
        /// Previous manifest
        old: PathBuf,
        /// Newer manifest
        new: PathBuf,
    },
    /// List broken symlinks in an organized directory
    Verify {
        /// Directory to check
        dir: PathBuf,
    },
    /// Print a stock normpic.toml with all options documented
    GenConfig,
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Command::Organize {
            config,
            source,
            dest,
            collection,
            description,
            dry_run,
            force,
            list,
        } => {
            let overrides = CliOverrides {
                source_dir: source,
                dest_dir: dest,
                collection_name: collection,
                collection_description: description,
                force,
            };
            let config_path =
                config.or_else(|| std::env::var_os(config::CONFIG_PATH_ENV).map(PathBuf::from));
            let settings = config::load_layered(
                config_path.as_deref(),
                |k| std::env::var(k).ok(),
                &overrides,
            )?;
            let run = RunConfig::from_config(&settings, dry_run);
            let dest_dir = PathBuf::from(&settings.dest_dir);

            let outcome = organize::organize(
                &PathBuf::from(&settings.source_dir),
                &dest_dir,
                &run,
            )?;
            output::print_organize_summary(&outcome, &dest_dir);
            if list {
                output::print_photo_listing(&outcome.manifest);
            }
            if !outcome.succeeded() {
                std::process::exit(1);
            }
        }
        Command::Diff { old, new } => {
            let old = store::load_required(&old)?;
            let new = store::load_required(&new)?;
            output::print_diff(&store::diff(&old, &new));
        }
        Command::Verify { dir } => {
            if !dir.is_dir() {
                return Err(format!("not a directory: {}", dir.display()).into());
            }
            let broken = fsops::detect_broken_symlinks(&dir);
            output::print_broken_links(&dir, &broken);
            if !broken.is_empty() {
                std::process::exit(1);
            }
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}
