//! CLI argument parsing using clap derive

use std::path::PathBuf;

use clap::Parser;
use mirror_core::DEFAULT_CONFIG_FILE;

/// Mirror local files and directories into a git repository
///
/// Runs one cycle: reset the checkout to the remote, mirror every configured
/// path into its slot, then commit and push whatever changed.
#[derive(Parser, Debug)]
#[command(name = "mirror-sync")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file (YAML, TOML or JSON)
    #[arg(short, long, env = "MIRROR_SYNC_CONFIG", default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    /// Log every step and every transferred path
    #[arg(short, long)]
    pub verbose: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn config_defaults_to_config_yml() {
        let cli = Cli::try_parse_from(["mirror-sync"]).unwrap();
        assert_eq!(cli.config, PathBuf::from("config.yml"));
        assert!(!cli.verbose);
    }

    #[test]
    fn short_flags() {
        let cli = Cli::try_parse_from(["mirror-sync", "-c", "/etc/mirror.yml", "-v"]).unwrap();
        assert_eq!(cli.config, PathBuf::from("/etc/mirror.yml"));
        assert!(cli.verbose);
    }

    #[test]
    fn unknown_argument_is_rejected() {
        assert!(Cli::try_parse_from(["mirror-sync", "--dry-run"]).is_err());
    }
}
