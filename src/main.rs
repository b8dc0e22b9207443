use anyhow::{Context, Result, bail};
use std::io::Read;
use std::path::{Path, PathBuf};

use inline_review::cli::{self, Cli, Commands};
use inline_review::config::Config;
use inline_review::git::{GitRevisions, find_repo_root};
use inline_review::workspace::FsWorkspace;
use inline_review::{FileFailure, PullRequest, deserialize, serialize, suggest};

fn main() -> Result<()> {
    let args = cli::parse_args();
    init_logging(args.verbose);

    let root = resolve_root(&args)?;
    let mut config = Config::load(&root)
        .with_context(|| format!("Failed to load config from {}", root.display()))?;
    if let Some(width) = args.width {
        if width == 0 {
            bail!("--width must be positive");
        }
        config.line_width = width;
    }
    log::debug!("workspace root {}", root.display());
    let mut ws = FsWorkspace::new(&root);

    let failures = match args.command {
        Commands::Apply { pr_json } => handle_apply(&mut ws, &config, &pr_json)?,
        Commands::Collect { out } => handle_collect(&ws, &config, out.as_deref())?,
        Commands::Suggest { base } => handle_suggest(&mut ws, &config, &base)?,
        Commands::Strip => handle_strip(&mut ws, &config)?,
    };

    if !failures.is_empty() {
        for failure in &failures {
            eprintln!("✗ {}: {}", failure.path.display(), failure.message);
        }
        std::process::exit(1);
    }
    Ok(())
}

/// Default level `warn`; `-v` raises to `info`, `-vv` to `debug`. `RUST_LOG`
/// wins when set.
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

fn resolve_root(args: &Cli) -> Result<PathBuf> {
    if let Some(root) = &args.root {
        if !root.is_dir() {
            bail!("{} is not a directory", root.display());
        }
        return Ok(root.clone());
    }
    match find_repo_root() {
        Ok(root) => Ok(root),
        Err(e) => {
            log::debug!("no enclosing repository ({e}), using current directory");
            std::env::current_dir().context("Failed to read current directory")
        }
    }
}

/// Handle apply - write the threads of a pull request into the workspace.
fn handle_apply(ws: &mut FsWorkspace, config: &Config, pr_json: &Path) -> Result<Vec<FileFailure>> {
    let json = if pr_json == Path::new("-") {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read pull request from stdin")?;
        buf
    } else {
        std::fs::read_to_string(pr_json)
            .with_context(|| format!("Failed to read {}", pr_json.display()))?
    };
    let pr: PullRequest = serde_json::from_str(&json).context("Invalid pull request JSON")?;

    let report = serialize::serialize(&pr, ws, config).context("Failed to write review state")?;
    println!(
        "✓ Applied #{} ({} threads): {} files written, {} removed",
        pr.number,
        pr.threads.len(),
        report.written.len(),
        report.removed.len()
    );
    Ok(report.failures)
}

/// Handle collect - print the embedded review state as JSON.
fn handle_collect(ws: &FsWorkspace, config: &Config, out: Option<&Path>) -> Result<Vec<FileFailure>> {
    let collected = deserialize::deserialize(ws, config).context("Failed to read review state")?;
    let json = serde_json::to_string_pretty(&collected.pull_request)
        .context("Failed to encode pull request")?;

    match out {
        Some(path) => {
            std::fs::write(path, format!("{json}\n"))
                .with_context(|| format!("Failed to write {}", path.display()))?;
            let new = collected
                .pull_request
                .threads
                .iter()
                .flat_map(|t| &t.comments)
                .filter(|c| c.is_new)
                .count();
            println!(
                "✓ Collected {} threads ({} new comments) into {}",
                collected.pull_request.threads.len(),
                new,
                path.display()
            );
        }
        None => println!("{json}"),
    }
    Ok(collected.failures)
}

/// Handle suggest - convert freehand edits since `base` into comments.
fn handle_suggest(ws: &mut FsWorkspace, config: &Config, base: &str) -> Result<Vec<FileFailure>> {
    let revisions = GitRevisions::new(ws.root(), base)
        .with_context(|| format!("Cannot compare against {base}"))?;
    let report = suggest::suggest_workspace(ws, &revisions, config)
        .context("Failed to build suggestions")?;

    for file in &report.files {
        for warning in &file.warnings {
            eprintln!("⚠ {}: {warning}", file.path.display());
        }
    }
    println!(
        "✓ {} suggestions, {} notes, {} warnings",
        report.suggestions(),
        report.notes(),
        report.warnings()
    );
    Ok(report.failures)
}

/// Handle strip - remove every embedded comment and the state file.
fn handle_strip(ws: &mut FsWorkspace, config: &Config) -> Result<Vec<FileFailure>> {
    let report = serialize::strip(ws, config).context("Failed to strip review state")?;
    println!(
        "✓ Stripped {} files, removed {}",
        report.written.len(),
        report.removed.len()
    );
    Ok(report.failures)
}
