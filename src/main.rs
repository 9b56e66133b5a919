//! CLI entry point for course-mirror.

use std::io::IsTerminal;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use course_mirror_core::download::constants::{CONNECT_TIMEOUT_SECS, READ_TIMEOUT_SECS};
use course_mirror_core::layout::DEFAULT_BASE_URL;
use course_mirror_core::{
    BrowserChoice, ChromiumSession, Course, CourseSelection, Credentials, LaunchOptions,
    MimeTable, RunError, RunRequest, SiteLayout, TracingObserver, WaitSettings, group_by_term,
    run_download, run_scan,
};
use tracing::{debug, error, info, warn};

mod cli;
mod config;
mod console;

use cli::{Cli, Command, ConfigCommand, DownloadArgs};
use config::{FileConfig, LoadedConfig, load_default_file_config};
use console::ConsoleObserver;

#[tokio::main]
async fn main() -> ExitCode {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let cli = Cli::parse();

    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    console::init_tracing(console::resolve_default_log_level(cli.verbose, cli.quiet));
    debug!(command = ?cli.command, "CLI arguments parsed");

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut loaded = load_default_file_config()?;

    let selection = match &cli.command {
        Command::Config { command } => {
            run_config_command(*command, &loaded);
            return Ok(());
        }
        Command::Scan => None,
        Command::Download(args) => Some(selection_from_args(args)),
    };

    let merged = merge_cli_into_config(&cli, loaded.config.clone())?;
    if loaded.save_if_changed(merged.clone())? {
        info!("Settings saved.");
    }
    let settings = RunSettings::from_config(&merged);

    let observer = ConsoleObserver::new(console::should_show_progress_bar(
        std::io::stderr().is_terminal(),
        cli.quiet,
        console::is_dumb_terminal(),
    ));

    info!(browser = %settings.launch.choice, headless = settings.launch.headless, "Starting browser");
    let mut session = ChromiumSession::launch(&settings.launch)
        .await
        .map_err(RunError::Launch)?;

    let outcome = match selection {
        None => run_scan(
            &mut session,
            &settings.credentials,
            &settings.layout,
            &settings.waits,
            &TracingObserver,
        )
        .await
        .map(|courses| print_courses(&courses)),
        Some(selection) => {
            let request = settings.into_request(selection);
            run_download(&mut session, &request, &observer)
                .await
                .map(|report| {
                    debug!(
                        completed = report.completed.len(),
                        failed = report.failed.len(),
                        "download run finished"
                    );
                })
        }
    };

    observer.finish();
    if let Err(err) = session.shutdown().await {
        warn!(error = %err, "browser did not shut down cleanly");
    }
    outcome.map_err(anyhow::Error::from)
}

fn selection_from_args(args: &DownloadArgs) -> CourseSelection {
    if args.all {
        CourseSelection::All
    } else {
        CourseSelection::Named(args.courses.clone())
    }
}

fn run_config_command(command: ConfigCommand, loaded: &LoadedConfig) {
    let resolved_path = loaded.path.as_ref().map_or_else(
        || "<unresolved>".to_string(),
        |path| path.display().to_string(),
    );
    match command {
        ConfigCommand::Path => println!("{resolved_path}"),
        ConfigCommand::Show => {
            println!("# config_path = {resolved_path}");
            if !loaded.loaded_from_file {
                println!("# config_file = not found (using defaults)");
            }
            print!("{}", loaded.config.render(true));
        }
    }
}

/// Overlays command-line values on the file config.
fn merge_cli_into_config(cli: &Cli, mut cfg: FileConfig) -> Result<FileConfig> {
    if let Some(username) = &cli.username {
        cfg.username = Some(username.clone());
    }
    if let Some(password) = &cli.password {
        cfg.password = Some(password.clone());
    }
    if let Some(output) = &cli.output {
        cfg.download_root = Some(output.clone());
    }
    if let Some(browser) = &cli.browser {
        let choice = browser
            .parse::<BrowserChoice>()
            .with_context(|| format!("Invalid --browser value '{browser}'"))?;
        cfg.browser = Some(choice);
    }
    if let Some(path) = &cli.browser_path {
        cfg.browser_path = Some(path.clone());
    }
    if let Some(headless) = cli.headless {
        cfg.headless = Some(headless);
    }
    if let Some(base_url) = &cli.base_url {
        cfg.base_url = Some(base_url.clone());
    }
    cfg.validate()?;
    Ok(cfg)
}

/// Effective values for one run.
#[derive(Debug)]
struct RunSettings {
    credentials: Credentials,
    download_root: PathBuf,
    launch: LaunchOptions,
    layout: SiteLayout,
    waits: WaitSettings,
    connect_timeout: Duration,
    read_timeout: Duration,
}

impl RunSettings {
    fn from_config(cfg: &FileConfig) -> Self {
        let credentials = Credentials::new(
            cfg.username.clone().unwrap_or_default(),
            cfg.password.clone().unwrap_or_default(),
        );
        let waits = cfg
            .page_timeout_secs
            .map_or_else(WaitSettings::default, |secs| {
                WaitSettings::default().with_page_timeout(Duration::from_secs(secs))
            });
        Self {
            credentials,
            download_root: cfg
                .download_root
                .clone()
                .unwrap_or_else(|| PathBuf::from(".")),
            launch: LaunchOptions {
                choice: cfg.browser.unwrap_or_default(),
                executable: cfg.browser_path.clone(),
                headless: cfg.headless.unwrap_or(true),
                ..LaunchOptions::default()
            },
            layout: SiteLayout::for_base_url(cfg.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL)),
            waits,
            connect_timeout: Duration::from_secs(
                cfg.download_connect_timeout_secs
                    .unwrap_or(CONNECT_TIMEOUT_SECS),
            ),
            read_timeout: Duration::from_secs(
                cfg.download_read_timeout_secs.unwrap_or(READ_TIMEOUT_SECS),
            ),
        }
    }

    fn into_request(self, selection: CourseSelection) -> RunRequest {
        RunRequest {
            credentials: self.credentials,
            selection,
            download_root: self.download_root,
            layout: self.layout,
            waits: self.waits,
            mime: MimeTable::default(),
            connect_timeout: self.connect_timeout,
            read_timeout: self.read_timeout,
        }
    }
}

fn print_courses(courses: &[Course]) {
    if courses.is_empty() {
        println!("No courses found.");
        return;
    }
    for (term, listed) in group_by_term(courses) {
        println!("{term}");
        for course in listed {
            println!("  {}", course.name);
        }
    }
}
