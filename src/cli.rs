//! Command-line interface definition.
use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::platform::LineEndingPolicy;

/// Top-level CLI entry point for the dotfiles deployer.
#[derive(Parser, Debug)]
#[command(
    name = "punktf",
    about = "Cross-platform multi-target dotfiles deployer",
    version
)]
pub struct Cli {
    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Options accepted by every subcommand.
    #[command(flatten)]
    pub global: GlobalOpts,
}

/// Options shared across all subcommands.
#[derive(Parser, Debug, Clone)]
pub struct GlobalOpts {
    /// Source directory containing `profiles/` and `items/`
    #[arg(short, long, global = true, env = "PUNKTF_SOURCE")]
    pub source: Option<PathBuf>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Deploy a profile
    Deploy(DeployOpts),
    /// Print version information
    Version,
}

/// Options for the `deploy` subcommand.
#[derive(Parser, Debug, Clone)]
pub struct DeployOpts {
    /// Profile to deploy
    #[arg(env = "PUNKTF_PROFILE")]
    pub profile: Option<String>,

    /// Deploy directory, overriding the profile target
    #[arg(short, long)]
    pub target: Option<PathBuf>,

    /// Preview changes without applying
    #[arg(short = 'd', long)]
    pub dry_run: bool,

    /// Manifest file tracking deployed files
    #[arg(long, env = "PUNKTF_MANIFEST")]
    pub manifest: Option<PathBuf>,

    /// Line endings of written text files
    #[arg(long = "line-endings", value_enum, default_value_t = LineEndingPolicy::Native)]
    pub line_endings: LineEndingPolicy,

    /// Render and inspect items sequentially (parallel is enabled by default)
    #[arg(long = "no-parallel", action = clap::ArgAction::SetFalse)]
    pub parallel: bool,
}

#[cfg(test)]
#[allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::indexing_slicing,
    clippy::panic
)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn deploy_opts(args: &[&str]) -> DeployOpts {
        let cli = Cli::try_parse_from(args).unwrap();
        let Command::Deploy(opts) = cli.command else {
            panic!("expected deploy command");
        };
        opts
    }

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parse_deploy_with_profile() {
        let opts = deploy_opts(&["punktf", "deploy", "arch"]);
        assert_eq!(opts.profile, Some("arch".to_string()));
        assert!(!opts.dry_run);
    }

    #[test]
    fn parse_deploy_dry_run_short() {
        let opts = deploy_opts(&["punktf", "deploy", "arch", "-d"]);
        assert!(opts.dry_run);
    }

    #[test]
    fn parse_deploy_target() {
        let opts = deploy_opts(&["punktf", "deploy", "arch", "-t", "/home/u"]);
        assert_eq!(opts.target, Some(PathBuf::from("/home/u")));
    }

    #[test]
    fn parse_source_before_subcommand() {
        let cli = Cli::parse_from(["punktf", "-s", "/src/dotfiles", "deploy", "arch"]);
        assert_eq!(cli.global.source, Some(PathBuf::from("/src/dotfiles")));
    }

    #[test]
    fn parse_source_after_subcommand() {
        let cli = Cli::parse_from(["punktf", "deploy", "arch", "--source", "/src/dotfiles"]);
        assert_eq!(cli.global.source, Some(PathBuf::from("/src/dotfiles")));
    }

    #[test]
    fn parse_line_endings() {
        let opts = deploy_opts(&["punktf", "deploy", "arch", "--line-endings", "crlf"]);
        assert_eq!(opts.line_endings, LineEndingPolicy::Crlf);
        let default = deploy_opts(&["punktf", "deploy", "arch"]);
        assert_eq!(default.line_endings, LineEndingPolicy::Native);
    }

    #[test]
    fn invalid_line_endings_are_rejected() {
        assert!(Cli::try_parse_from(["punktf", "deploy", "arch", "--line-endings", "cr"]).is_err());
    }

    #[test]
    fn parse_version() {
        let cli = Cli::parse_from(["punktf", "version"]);
        assert!(matches!(cli.command, Command::Version));
    }

    #[test]
    fn parse_verbose() {
        let cli = Cli::parse_from(["punktf", "-v", "deploy", "arch"]);
        assert!(cli.verbose);
    }

    #[test]
    fn parallel_is_enabled_by_default() {
        let opts = deploy_opts(&["punktf", "deploy", "arch"]);
        assert!(opts.parallel, "parallel should be true by default");
    }

    #[test]
    fn no_parallel_disables_parallel() {
        let opts = deploy_opts(&["punktf", "deploy", "arch", "--no-parallel"]);
        assert!(
            !opts.parallel,
            "--no-parallel should set parallel to false"
        );
    }
}
