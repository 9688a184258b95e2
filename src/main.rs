use anyhow::Result;
use clap::Parser;
use corpusprint::cli::{AppContext, Cli, Commands};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()>
{
    let cli = Cli::parse();

    init_tracing(
        cli.verbose,
        cli.no_color,
    );

    // Build a context once, pass everywhere
    let ctx = AppContext {
        quiet: cli.quiet,
        no_color: cli.no_color,
        dry_run: cli.dry_run,
    };

    match cli.command
    {
        Commands::Run(args) => corpusprint::pipeline_run(args, &ctx),
        Commands::Extract(args) => corpusprint::extract_run(args, &ctx),
        Commands::Classify(args) => corpusprint::classify_run(args, &ctx),
        Commands::Clusters(args) => corpusprint::clusters_run(args, &ctx),
        Commands::Init(args) => corpusprint::infra::config::init(args, &ctx),
        Commands::Completions(args) => corpusprint::completion::run(args, &ctx),
    }
}

/// Logs go to stderr so stdout stays clean for --json
fn init_tracing(
    verbose: u8,
    no_color: bool,
)
{
    let default = match verbose
    {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(!no_color)
        .with_target(false)
        .init();
}
