use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Shared application context for global flags
#[derive(Clone, Debug)]
pub struct AppContext
{
    pub quiet: bool,    // global --quiet
    pub no_color: bool, // global --no-color
    pub dry_run: bool,  // global --dry-run
}

#[derive(Parser)]
#[command(name = "cprint")]
#[command(
    about = "Fingerprint crawled pages, classify their topics and link shared identity artifacts across sources"
)]
#[command(version, long_about = None)]
pub struct Cli
{
    #[command(subcommand)]
    pub command: Commands,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Suppress progress bars and non-essential output
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Show what would be done without writing anything
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Log verbosity (-v info, -vv debug); RUST_LOG overrides
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Subcommand)]
pub enum Commands
{
    /// Run the full pipeline over a collector payload
    Run(RunArgs),

    /// Extract artifacts, handles and hashes from one HTML page
    Extract(ExtractArgs),

    /// Classify a single text with the run's strategy selection
    Classify(ClassifyArgs),

    /// Group titles served from several URLs in a fingerprint file
    Clusters(ClustersArgs),

    /// Initialize a corpusprint.toml config file
    Init(InitArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Args)]
pub struct RunArgs
{
    /// Collector payload (JSON object: label → records)
    pub input: PathBuf,

    /// Output root (overrides pipeline.output_dir)
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Classification workers (0 = one per core)
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Zero-shot classifier endpoint (overrides classifier.endpoint)
    #[arg(long)]
    pub endpoint: Option<String>,

    /// Skip the model strategy and classify with keywords only
    #[arg(long)]
    pub no_model: bool,

    /// Print the run report as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args)]
pub struct ExtractArgs
{
    /// Saved HTML page
    pub input: PathBuf,

    /// Write the report here instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Number of frequent words to report
    #[arg(short, long, default_value = "12")]
    pub keywords: usize,
}

#[derive(Args)]
pub struct ClassifyArgs
{
    /// Text to classify
    pub text: String,

    /// Zero-shot classifier endpoint (overrides classifier.endpoint)
    #[arg(long)]
    pub endpoint: Option<String>,

    /// Keyword strategy only
    #[arg(long)]
    pub no_model: bool,

    /// Print JSON instead of a table
    #[arg(long)]
    pub json: bool,
}

#[derive(Args)]
pub struct ClustersArgs
{
    /// A fingerprints_<date>.json file written by `run`
    pub input: PathBuf,

    /// Write the grouped titles here
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Print JSON instead of a table
    #[arg(long)]
    pub json: bool,
}

#[derive(Parser)]
pub struct InitArgs
{
    /// Directory to initialize config in
    #[arg(default_value = ".")]
    pub path: PathBuf,

    /// Overwrite existing config file
    #[arg(long)]
    pub force: bool,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum Shell
{
    Bash,
    Zsh,
    Fish,
    PowerShell,
    Elvish,
}

#[derive(Parser)]
pub struct CompletionsArgs
{
    /// Target shell
    #[arg(value_enum)]
    pub shell: Shell,

    /// Output directory; if omitted and --stdout not set, prints error
    #[arg(long)]
    pub out_dir: Option<PathBuf>,

    /// Print completion script to stdout instead of a file
    #[arg(long)]
    pub stdout: bool,
}
