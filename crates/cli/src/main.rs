mod config;
mod report;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use harness::{CheckKind, Suite};
use lsp_client::LspCompletionService;
use miette::{Diagnostic, IntoDiagnostic};
use thiserror::Error;

use crate::config::{find_config, load_config, HarnessConfig};
use crate::report::{failure_report, ConsoleReporter};

#[derive(Parser, Debug)]
#[command(author, version, about = "Run completion fixtures against a language server")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run every discovered check against the language server
    Run {
        #[command(flatten)]
        common: CommonArgs,

        /// Server command line, overriding `[server]` in harness.toml
        #[arg(long, value_name = "CMD")]
        server: Option<String>,

        /// Only run checks whose name contains this string
        #[arg(long, value_name = "SUBSTR")]
        filter: Option<String>,
    },
    /// Print the discovered checks without starting a server
    List {
        #[command(flatten)]
        common: CommonArgs,
    },
}

#[derive(Args, Debug)]
struct CommonArgs {
    /// Fixture directory, overriding `cases` in harness.toml
    cases_dir: Option<PathBuf>,

    /// Path to harness.toml (default: searched upward from the working directory)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

#[derive(Debug, Error, Diagnostic)]
enum CliError {
    #[error("no cases directory given")]
    #[diagnostic(
        code(cli::no_cases),
        help("pass CASES_DIR or set `cases` in harness.toml")
    )]
    NoCases,

    #[error("no language server command given")]
    #[diagnostic(
        code(cli::no_server),
        help("pass --server or set `[server] command` in harness.toml")
    )]
    NoServer,
}

/// The loaded config plus the directory its relative paths resolve against.
struct Loaded {
    config: HarnessConfig,
    dir: PathBuf,
}

fn load(explicit: Option<&Path>) -> miette::Result<Loaded> {
    let cwd = std::env::current_dir().into_diagnostic()?;
    let path = match explicit {
        Some(path) => Some(path.to_path_buf()),
        None => find_config(&cwd),
    };

    match path {
        Some(path) => {
            log::info!("using {}", path.display());
            let config = load_config(&path)?;
            let dir = path
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| cwd.clone());
            Ok(Loaded { config, dir })
        }
        None => Ok(Loaded {
            config: HarnessConfig::default(),
            dir: cwd,
        }),
    }
}

fn discover(common: &CommonArgs, loaded: &Loaded) -> miette::Result<Suite> {
    let cases_dir = common
        .cases_dir
        .clone()
        .or_else(|| loaded.config.cases_dir(&loaded.dir))
        .ok_or(CliError::NoCases)?;
    Ok(Suite::discover(&cases_dir)?)
}

async fn run(
    common: CommonArgs,
    server: Option<String>,
    filter: Option<String>,
) -> miette::Result<ExitCode> {
    let loaded = load(common.config.as_deref())?;
    let mut suite = discover(&common, &loaded)?;
    if let Some(pattern) = &filter {
        suite.filter(pattern);
    }

    let (command, args) = match &server {
        Some(line) => {
            let mut words = line.split_whitespace().map(str::to_owned);
            let command = words.next().ok_or(CliError::NoServer)?;
            (command, words.collect::<Vec<_>>())
        }
        None => {
            let command = loaded.config.server.command.clone().ok_or(CliError::NoServer)?;
            (command, loaded.config.server.args.clone())
        }
    };

    let settings = &loaded.config.settings;
    let mut service = LspCompletionService::spawn(
        &command,
        &args,
        loaded.config.lsp_options(&loaded.dir),
        settings,
    )
    .await?;

    let mut reporter = ConsoleReporter::new(std::io::stdout().lock());
    let summary = suite.run(&mut service, settings, &mut reporter).await;

    if let Err(err) = service.shutdown().await {
        log::warn!("language server shutdown failed: {err}");
    }

    Ok(if summary.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn list(common: CommonArgs) -> miette::Result<ExitCode> {
    let loaded = load(common.config.as_deref())?;
    let suite = discover(&common, &loaded)?;

    for check in &suite.checks {
        match &check.kind {
            CheckKind::Case(case) => {
                let unwanted: Vec<&str> = case.unwanted.iter().map(|s| s.as_str()).collect();
                println!(
                    "{}\n    line {}, cursor {}: expect [{}], reject [{}]",
                    check.name,
                    case.line_number,
                    case.cursor,
                    case.expected.join(", "),
                    unwanted.join(", ")
                );
            }
            CheckKind::BrokenFixture(_) => {
                println!("{}", check.name);
            }
        }
    }
    for skipped in &suite.scan.skipped {
        println!("skipped {} ({:?})", skipped.path.display(), skipped.reason);
    }

    let broken: Vec<_> = suite
        .checks
        .iter()
        .filter_map(|check| match &check.kind {
            CheckKind::BrokenFixture(_) => failure_report(check, &harness::Outcome::Broken),
            CheckKind::Case(_) => None,
        })
        .collect();
    for report in &broken {
        eprintln!("{report:?}");
    }

    Ok(if broken.is_empty() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

#[tokio::main]
async fn main() -> miette::Result<ExitCode> {
    env_logger::init();

    let cli = Cli::parse();

    match cli.command {
        Command::Run {
            common,
            server,
            filter,
        } => run(common, server, filter).await,
        Command::List { common } => list(common),
    }
}
