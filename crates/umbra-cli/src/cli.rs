//! Argument definitions.

use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand};

/// Inspect and change the persisted theme preference.
///
/// The preference lives in a small JSON file shared by every program that
/// uses umbra's native platform. "system" follows the OS light/dark setting.
#[derive(Debug, Parser)]
#[command(name = "umbra", version)]
pub struct Cli {
    /// Theme configuration file (.yaml, .yml or .json)
    #[arg(long, global = true, env = "UMBRA_CONFIG", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Preference file [default: <config dir>/umbra/preferences.json]
    #[arg(long, global = true, env = "UMBRA_STORE", value_name = "FILE")]
    pub store: Option<PathBuf>,

    /// More log output on stderr (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Print JSON instead of styled text
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

impl Cli {
    /// Log filter used when `RUST_LOG` is not set.
    pub fn log_filter(&self) -> &'static str {
        match self.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Show the current theme and what it renders to (default)
    Show,

    /// Choose a theme and persist it
    Set(SetArgs),

    /// Forget the persisted choice and fall back to the default
    Reset,

    /// List the available themes
    Themes,

    /// Print a line whenever the OS or another program changes the theme
    Watch(WatchArgs),
}

#[derive(Debug, Args)]
pub struct SetArgs {
    /// Theme name, or "system" to follow the OS
    pub theme: String,
}

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// How often to check the OS setting and the preference file
    #[arg(long, default_value_t = 500, value_name = "MS")]
    pub interval_ms: u64,

    /// Exit after this many changes
    #[arg(long, value_name = "N")]
    pub count: Option<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn no_subcommand_means_show() {
        let cli = Cli::try_parse_from(["umbra"]).unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.log_filter(), "warn");
    }

    #[test]
    fn global_options_follow_subcommand() {
        let cli = Cli::try_parse_from(["umbra", "set", "dark", "--json", "-vv"]).unwrap();
        assert!(cli.json);
        assert_eq!(cli.log_filter(), "debug");
        match cli.command {
            Some(Command::Set(args)) => assert_eq!(args.theme, "dark"),
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn watch_defaults() {
        let cli = Cli::try_parse_from(["umbra", "watch"]).unwrap();
        match cli.command {
            Some(Command::Watch(args)) => {
                assert_eq!(args.interval_ms, 500);
                assert_eq!(args.count, None);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
