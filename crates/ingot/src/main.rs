use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use log::LevelFilter;

use ingot::{
    config::Config,
    link::{self, LinkOptions},
    orchestrator::{self, BuildOptions},
    preprocess,
    translator::TranslateOptions,
};

#[derive(Parser, Debug)]
#[command(
    name = "ingot",
    about = "Compile a Python package tree into a single native extension module",
    version
)]
struct Cli {
    /// Final installed name of the bundled package
    package_name: String,

    /// Package root directory; repeat for namespace packages
    #[arg(long = "root", value_name = "DIR")]
    roots: Vec<PathBuf>,

    /// Directory for generated sources and compilation units
    #[arg(long, value_name = "DIR")]
    working_dir: Option<PathBuf>,

    /// Path of the linked artifact
    #[arg(long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Major Python version the translator should assume (2 or 3)
    #[arg(long, value_name = "LEVEL")]
    language_level: Option<u8>,

    /// Emit html annotations alongside each compilation unit
    #[arg(long)]
    annotate: bool,

    /// Include coverage information in annotations (implies --annotate)
    #[arg(long)]
    annotate_coverage: bool,

    /// Ignore timestamps and rebuild everything
    #[arg(long)]
    force: bool,

    /// Translator worker count (default: number of cpus)
    #[arg(short, long, value_name = "N")]
    jobs: Option<usize>,

    /// Generate and patch units but skip the final link
    #[arg(long)]
    skip_link: bool,

    /// Explicit config file instead of the discovered ingot.toml
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Include debug logs
    #[arg(short, long, conflicts_with = "quiet")]
    verbose: bool,

    /// Only log errors
    #[arg(short, long)]
    quiet: bool,
}

fn init_logging(verbose: bool, quiet: bool) {
    let level = if verbose {
        LevelFilter::Debug
    } else if quiet {
        LevelFilter::Error
    } else {
        LevelFilter::Info
    };
    env_logger::Builder::from_default_env()
        .filter_level(level)
        .format_timestamp(None)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    let config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::load(&std::env::current_dir()?)?,
    };

    let package_paths = if cli.roots.is_empty() {
        config.package_paths.clone()
    } else {
        cli.roots.clone()
    };
    let working_path = cli
        .working_dir
        .clone()
        .unwrap_or_else(|| config.working_path.clone());

    let translate = TranslateOptions {
        language_level: cli.language_level.unwrap_or(config.language_level),
        annotate_html: cli.annotate || config.annotate_html,
        annotate_coverage: cli.annotate_coverage || config.annotate_coverage,
        verbose: cli.verbose,
        quiet: cli.quiet,
    };

    let link = if cli.skip_link {
        None
    } else {
        let mut include_dirs = config.include_dirs.clone();
        let mut library_dirs = config.library_dirs.clone();
        if include_dirs.is_empty() {
            let (probed_includes, probed_libraries) = link::probe_python_paths()?;
            include_dirs = probed_includes;
            if library_dirs.is_empty() {
                library_dirs = probed_libraries;
            }
        }
        Some(LinkOptions {
            output: cli.output.clone().unwrap_or_else(|| {
                link::default_artifact_path(&working_path, &cli.package_name)
            }),
            include_dirs,
            library_dirs,
            libraries: config.libraries.clone(),
            extra_args: Vec::new(),
        })
    };

    let options = BuildOptions {
        package_name: cli.package_name.clone(),
        package_paths,
        working_path,
        translate,
        check_timestamps: config.check_timestamps && !cli.force,
        jobs: cli.jobs.unwrap_or(config.jobs),
        link,
    };

    let outcome = orchestrator::build_package(&options, &preprocess::default_preprocessors())?;
    if let Some(artifact) = &outcome.artifact {
        log::info!(
            "{} module(s) bundled into {}",
            outcome.modules.len(),
            artifact.display()
        );
    } else {
        log::info!(
            "{} module(s) prepared under {}",
            outcome.modules.len(),
            options.working_path.display()
        );
    }
    Ok(())
}
