use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "inline-review",
    about = "Keep pull-request review threads as marked comments in the source"
)]
pub struct Cli {
    /// Workspace root. Defaults to the enclosing git repository, or the
    /// current directory outside one.
    #[arg(long, global = true)]
    pub root: Option<PathBuf>,

    /// Column limit for rendered comments (overrides the config file).
    #[arg(long, global = true)]
    pub width: Option<usize>,

    /// Increase log output (-v info, -vv debug).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Write the threads of a pull request into the workspace.
    Apply {
        /// Pull request JSON file, or "-" for stdin.
        pr_json: PathBuf,
    },
    /// Read the embedded review state back out as JSON.
    Collect {
        /// Write to this file instead of stdout.
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Turn freehand edits into suggestion and note comments.
    Suggest {
        /// Revision the working tree was last synced from.
        #[arg(short, long, default_value = "HEAD")]
        base: String,
    },
    /// Remove every embedded comment and the state file.
    Strip,
}

/// Parse CLI arguments.
pub fn parse_args() -> Cli {
    Cli::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["inline-review", "collect", "--width", "100", "-vv"])
            .unwrap();
        assert_eq!(cli.width, Some(100));
        assert_eq!(cli.verbose, 2);
        assert!(matches!(cli.command, Commands::Collect { out: None }));
    }

    #[test]
    fn suggest_defaults_to_head() {
        let cli = Cli::try_parse_from(["inline-review", "suggest"]).unwrap();
        match cli.command {
            Commands::Suggest { base } => assert_eq!(base, "HEAD"),
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn apply_requires_input() {
        assert!(Cli::try_parse_from(["inline-review", "apply"]).is_err());
    }
}
