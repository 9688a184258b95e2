//! `completions` command: shell completion scripts for `cprint`.

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::CommandFactory;
use clap_complete::{Generator, Shell as Target};
use owo_colors::OwoColorize;

use crate::cli::{AppContext, Cli, CompletionsArgs, Shell};

const BIN_NAME: &str = "cprint";

fn target(shell: &Shell) -> Target
{
    match shell
    {
        Shell::Bash => Target::Bash,
        Shell::Zsh => Target::Zsh,
        Shell::Fish => Target::Fish,
        Shell::PowerShell => Target::PowerShell,
        Shell::Elvish => Target::Elvish,
    }
}

/// Write the completion script for `shell` into `out`
pub fn render(
    shell: &Shell,
    out: &mut dyn Write,
)
{
    let mut cmd = Cli::command();
    clap_complete::generate(target(shell), &mut cmd, BIN_NAME, out);
}

/// Conventional script name for `shell`, e.g. `_cprint` for zsh
pub fn file_name(shell: &Shell) -> String
{
    target(shell).file_name(BIN_NAME)
}

fn write_script(
    shell: &Shell,
    dir: &Path,
) -> Result<PathBuf>
{
    let mut script = Vec::new();
    render(shell, &mut script);

    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create {}", dir.display()))?;
    let path = dir.join(file_name(shell));
    std::fs::write(&path, script).with_context(|| format!("Failed to write {}", path.display()))?;

    Ok(path)
}

pub fn run(
    args: CompletionsArgs,
    ctx: &AppContext,
) -> Result<()>
{
    if args.stdout
    {
        render(&args.shell, &mut std::io::stdout().lock());
        return Ok(());
    }

    let Some(dir) = args.out_dir
    else
    {
        anyhow::bail!("--out-dir is required unless --stdout is set");
    };

    if ctx.dry_run
    {
        if !ctx.quiet
        {
            println!(
                "{}",
                format!("DRY RUN: Would write {}", dir.join(file_name(&args.shell)).display()).yellow()
            );
        }
        return Ok(());
    }

    let path = write_script(&args.shell, &dir)?;

    if !ctx.quiet
    {
        println!("{} Wrote completion to {}", "✓".green(), path.display());
    }
    Ok(())
}
