//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::{Args as ClapArgs, Parser, Subcommand};

/// Mirror the content of LMS courses into a local directory.
///
/// Files are downloaded into `{output}/{term}/{course}/{section}/...`;
/// external links become `.url` shortcuts next to them.
#[derive(Parser, Debug)]
#[command(name = "course-mirror")]
#[command(author, version, about)]
pub struct Cli {
    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// LMS login name (remembered in the config file)
    #[arg(short, long, global = true)]
    pub username: Option<String>,

    /// LMS password (remembered in the config file, unencrypted)
    #[arg(short, long, global = true)]
    pub password: Option<String>,

    /// Download root directory
    #[arg(short, long = "output", value_name = "DIR", global = true)]
    pub output: Option<PathBuf>,

    /// Browser to drive: auto, chrome, chromium or edge
    #[arg(long, global = true)]
    pub browser: Option<String>,

    /// Explicit browser executable
    #[arg(long, value_name = "PATH", global = true)]
    pub browser_path: Option<PathBuf>,

    /// Run the browser without a window
    #[arg(long, value_name = "BOOL", global = true)]
    pub headless: Option<bool>,

    /// LMS root URL
    #[arg(long, value_name = "URL", global = true)]
    pub base_url: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Log in and list every term and its courses
    Scan,
    /// Download the selected courses
    Download(DownloadArgs),
    /// Inspect the persisted configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[derive(ClapArgs, Debug, Clone)]
#[command(group(
    clap::ArgGroup::new("selection")
        .required(true)
        .args(["courses", "all"])
))]
pub struct DownloadArgs {
    /// Course name as listed by `scan` (case-insensitive, repeatable)
    #[arg(short = 'c', long = "course", value_name = "NAME")]
    pub courses: Vec<String>,

    /// Download every listed course
    #[arg(long, conflicts_with = "courses")]
    pub all: bool,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigCommand {
    /// Print the effective configuration with the password masked
    Show,
    /// Print the config file location
    Path,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_scan_parses_with_defaults() {
        let cli = Cli::try_parse_from(["course-mirror", "scan"]).unwrap();
        assert!(matches!(cli.command, Command::Scan));
        assert_eq!(cli.verbose, 0);
        assert!(!cli.quiet);
        assert!(cli.headless.is_none());
        assert!(cli.username.is_none());
    }

    #[test]
    fn test_cli_verbose_flag_increments_count() {
        let cli = Cli::try_parse_from(["course-mirror", "-vv", "scan"]).unwrap();
        assert_eq!(cli.verbose, 2);

        let cli = Cli::try_parse_from(["course-mirror", "scan", "--verbose"]).unwrap();
        assert_eq!(cli.verbose, 1);
    }

    #[test]
    fn test_cli_download_requires_a_selection() {
        let err = Cli::try_parse_from(["course-mirror", "download"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn test_cli_download_accepts_repeated_courses() {
        let cli = Cli::try_parse_from([
            "course-mirror",
            "download",
            "--course",
            "MATH101",
            "-c",
            "ICS 104",
        ])
        .unwrap();
        let Command::Download(args) = cli.command else {
            panic!("expected download command");
        };
        assert_eq!(args.courses, vec!["MATH101".to_string(), "ICS 104".to_string()]);
        assert!(!args.all);
    }

    #[test]
    fn test_cli_download_all_conflicts_with_course() {
        let err = Cli::try_parse_from(["course-mirror", "download", "--all", "--course", "X"])
            .unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }

    #[test]
    fn test_cli_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "course-mirror",
            "download",
            "--all",
            "-u",
            "student",
            "-o",
            "/tmp/courses",
            "--headless",
            "false",
            "--browser",
            "edge",
        ])
        .unwrap();
        assert_eq!(cli.username.as_deref(), Some("student"));
        assert_eq!(cli.output, Some(PathBuf::from("/tmp/courses")));
        assert_eq!(cli.headless, Some(false));
        assert_eq!(cli.browser.as_deref(), Some("edge"));
    }

    #[test]
    fn test_cli_headless_rejects_non_boolean() {
        assert!(Cli::try_parse_from(["course-mirror", "--headless", "maybe", "scan"]).is_err());
    }

    #[test]
    fn test_cli_config_subcommands() {
        let cli = Cli::try_parse_from(["course-mirror", "config", "path"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Config {
                command: ConfigCommand::Path
            }
        ));
    }

    #[test]
    fn test_cli_missing_subcommand_is_an_error() {
        assert!(Cli::try_parse_from(["course-mirror"]).is_err());
    }

    #[test]
    fn test_cli_version_flag_shows_version() {
        let err = Cli::try_parse_from(["course-mirror", "--version"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayVersion);
    }
}
