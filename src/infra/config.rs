use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::cli::{AppContext, InitArgs};

/// Candidate labels offered to the zero-shot model
pub const DEFAULT_LABELS: [&str; 18] = [
    "Illicit marketplace",
    "Drugs",
    "Weapons",
    "Fraud",
    "Hacking",
    "Exploit",
    "Leak",
    "Stolen data",
    "Counterfeit",
    "Scam",
    "Services",
    "Financial services",
    "Guides",
    "Forum discussion",
    "Carding",
    "Malware",
    "Security",
    "Vendor advertisement",
];

pub const CONFIG_FILE: &str = "corpusprint.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config
{
    /// Indexing and output settings
    pub pipeline: PipelineConfig,

    /// Topic classifier settings
    pub classifier: ClassifierConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig
{
    /// Root for dated output files; `~` and `$VARS` are expanded
    pub output_dir: String,

    /// Classification workers, 0 for one per core
    pub workers: usize,

    /// Keep raw_text on indexed records
    pub retain_raw_text: bool,

    /// Keywords used in a representative text
    pub keywords_cap: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig
{
    /// Zero-shot inference endpoint; unset means keyword-only
    pub endpoint: Option<String>,

    /// Environment variable holding a bearer token
    pub api_token_env: Option<String>,

    pub timeout_secs: u64,

    pub labels: Vec<String>,
}

impl Default for PipelineConfig
{
    fn default() -> Self
    {
        Self {
            output_dir: "data".to_string(),
            workers: 0,
            retain_raw_text: true,
            keywords_cap: 12,
        }
    }
}

impl PipelineConfig
{
    /// `output_dir` with `~` and environment variables expanded.
    /// Unresolvable variables leave the path as written.
    pub fn resolved_output_dir(&self) -> PathBuf
    {
        match shellexpand::full(&self.output_dir)
        {
            Ok(expanded) => PathBuf::from(expanded.as_ref()),
            Err(e) =>
            {
                tracing::warn!(error = %e, "could not expand output_dir");
                PathBuf::from(&self.output_dir)
            }
        }
    }
}

impl Default for ClassifierConfig
{
    fn default() -> Self
    {
        Self {
            endpoint: None,
            api_token_env: Some("HF_API_TOKEN".to_string()),
            timeout_secs: 30,
            labels: DEFAULT_LABELS
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

pub fn load_config() -> Result<Config>
{
    load_config_from(Path::new("."))
}

/// Layered load: first config file found in `dir`, then `CORPUSPRINT__*` env vars
pub fn load_config_from(dir: &Path) -> Result<Config>
{
    let mut builder = config::Config::builder();

    // Load from config files in priority order
    let config_paths = [CONFIG_FILE, "corpusprint.yaml", "corpusprint.json", ".corpusprint.toml"];

    for name in &config_paths
    {
        let path = dir.join(name);
        if path.exists()
        {
            builder = builder.add_source(config::File::from(path));
            break;
        }
    }

    // e.g. CORPUSPRINT__CLASSIFIER__ENDPOINT
    builder = builder.add_source(
        config::Environment::with_prefix("CORPUSPRINT")
            .prefix_separator("__")
            .separator("__"),
    );

    let cfg = builder
        .build()
        .context("Failed to load configuration")?;
    let parsed: Config = cfg
        .try_deserialize()
        .context("Failed to parse configuration")?;

    Ok(parsed)
}

pub fn init(
    args: InitArgs,
    ctx: &AppContext,
) -> Result<()>
{
    let config_path = args
        .path
        .join(CONFIG_FILE);

    if config_path.exists() && !args.force
    {
        anyhow::bail!(
            "Config file already exists at {}. Use --force to overwrite.",
            config_path.display()
        );
    }

    let config = Config::default();
    let toml_string =
        toml::to_string_pretty(&config).context("Failed to serialize default config")?;

    if ctx.dry_run
    {
        if !ctx.quiet
        {
            println!("DRY RUN: Would create config file at {}", config_path.display());
        }
        return Ok(());
    }

    std::fs::write(&config_path, toml_string).context("Failed to write config file")?;

    if !ctx.quiet
    {
        println!("Created config file at {}", config_path.display());
    }
    Ok(())
}
