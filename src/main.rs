mod config;
mod fetch;
mod prompt;
mod runtime;
mod setup;

use std::path::PathBuf;

use anyhow::{anyhow, Result};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::fetch::HttpFetcher;
use crate::prompt::{InquirePrompt, ModulePrompt, Preselected};
use crate::runtime::{NodeRuntime, ScriptRuntime};
use crate::setup::{Bootstrapper, ModuleKind};

fn print_help() {
    println!(
        "\
tina-setup v{}

Fetches and runs the Tina CMS schema generator for the current project.

USAGE:
    tina-setup [OPTIONS]

OPTIONS:
    -c, --config <PATH>     TOML configuration file
                            [default: ./tina-setup.toml if present]
    -C, --dir <PATH>        Project root to check for the tina/ folder
                            [default: current directory]
    -m, --module <KIND>     Skip the prompt: cjs (CommonJS) or esm (ES Modules)
    -h, --help              Print this help message and exit
    -V, --version           Print version and exit

ENVIRONMENT VARIABLES:
    Variables can be referenced in the config file via ${{VAR_NAME}} syntax.

    RUST_LOG                  Log level filter for tracing
                              (e.g. debug, tina_setup=debug,warn)
    TINA_SETUP_COMMONJS_URL   Overrides sources.commonjs_url
    TINA_SETUP_ESM_URL        Overrides sources.esm_url
    TINA_SETUP_NODE           Overrides runtime.program

EXAMPLES:
    tina-setup                          # prompts for the module kind
    tina-setup --module esm             # non-interactive
    RUST_LOG=debug tina-setup           # with debug logging",
        env!("CARGO_PKG_VERSION"),
    );
}

/// Parsed command line.
#[derive(Debug, Default, PartialEq)]
struct CliArgs {
    config: Option<PathBuf>,
    dir: Option<PathBuf>,
    module: Option<ModuleKind>,
    help: bool,
    version: bool,
}

fn parse_args(args: impl IntoIterator<Item = String>) -> Result<CliArgs> {
    let mut parsed = CliArgs::default();
    let mut args = args.into_iter();

    while let Some(arg) = args.next() {
        let mut value = |flag: &str| {
            args.next()
                .ok_or_else(|| anyhow!("{flag} requires a value"))
        };
        match arg.as_str() {
            "--help" | "-h" => parsed.help = true,
            "--version" | "-V" => parsed.version = true,
            "--config" | "-c" => parsed.config = Some(PathBuf::from(value(arg.as_str())?)),
            "--dir" | "-C" => parsed.dir = Some(PathBuf::from(value(arg.as_str())?)),
            "--module" | "-m" => parsed.module = Some(value(arg.as_str())?.parse()?),
            other => return Err(anyhow!("Unexpected argument '{other}' (see --help)")),
        }
    }

    Ok(parsed)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = parse_args(std::env::args().skip(1))?;

    // Handle --help / --version before anything else
    if args.help {
        print_help();
        return Ok(());
    }
    if args.version {
        println!("tina-setup v{}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    // Logs go to stderr; stdout is for the operator and the script
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("tina_setup=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let project_root = match args.dir {
        Some(dir) => dir,
        None => std::env::current_dir()?,
    };
    let config = Config::resolve_for_project(&project_root, args.config.as_deref())?;

    info!("Project root: {}", project_root.display());
    info!("CommonJS source: {}", config.sources.commonjs_url);
    info!("ES module source: {}", config.sources.esm_url);

    let prompt: Box<dyn ModulePrompt> = match args.module {
        Some(kind) => Box::new(Preselected(kind)),
        None => Box::new(InquirePrompt),
    };
    let fetcher = HttpFetcher::new(config.http_timeout());
    let runtime = NodeRuntime::new(config.runtime.program.clone());
    info!("Script runtime: {}", runtime.description());

    let bootstrapper = Bootstrapper::new(
        config,
        project_root,
        std::env::temp_dir(),
        prompt,
        Box::new(fetcher),
        Box::new(runtime),
    );

    let outcome = bootstrapper.run().await;
    info!("Setup finished: {outcome:?}");
    std::process::exit(outcome.exit_code());
}
