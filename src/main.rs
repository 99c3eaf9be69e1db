use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use crossterm::style::Stylize;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use berth::cli::{Cli, Commands, Environment};
use berth::config::{self, Config};
use berth::interrupt::InterruptController;
use berth::lifecycle::{Lifecycle, Options};
use berth::process::{CommandRunner, ScriptedRunner, SystemRunner};
use berth::project::{Plugin, Project};
use berth::prompt::TerminalPrompter;

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(&cli);

    let interrupts = InterruptController::new();
    let result = run(cli, &interrupts);
    interrupts.close();

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            report(&e);
            ExitCode::FAILURE
        }
    }
}

fn init_logging(cli: &Cli) {
    let level = if cli.debug {
        "trace"
    } else if cli.verbose {
        "debug"
    } else if cli.quiet {
        "warn"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("berth={level}")));

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(false)
                .without_time()
                .with_writer(std::io::stderr),
        )
        .with(filter)
        .init();
}

fn report(err: &anyhow::Error) {
    eprintln!("{} {err:#}", "Failed:".red());
    let failed = err
        .downcast_ref::<berth::Error>()
        .and_then(berth::Error::execution);
    if let Some(failed) = failed
        && !failed.echoed
        && !failed.stderr.trim().is_empty()
    {
        eprintln!("{}", failed.stderr.trim_end().dark_grey());
    }
}

fn run(cli: Cli, interrupts: &InterruptController) -> Result<()> {
    let project_dir = match cli.project {
        Some(dir) => dir,
        None => std::env::current_dir().context("failed to read the working directory")?,
    };
    let config = config::load(&project_dir)?;
    let project = Project::load(&project_dir)?;
    let plugin = if cli.command.needs_plugin() {
        Some(Plugin::resolve(&project, &config)?)
    } else {
        None
    };

    let force = matches!(
        &cli.command,
        Commands::Build(args) | Commands::Up { build: args, .. } if args.force
    );
    let options = Options {
        interactive: !cli.non_interactive,
        debug: cli.debug,
        quiet: cli.quiet,
        force,
        dry_run: cli.dry_run,
    };
    let lifecycle = Lifecycle::new(
        runner(cli.dry_run, &config),
        interrupts.clone(),
        Arc::new(TerminalPrompter),
        config,
        options,
    );
    let plugin = || plugin.as_ref().context("this command needs the project's plugin");

    match cli.command {
        Commands::Build(args) => lifecycle.build(&project, plugin()?, args.mode, &args.tags)?,
        Commands::Up { build, detached } => {
            let id = lifecycle.up(&project, plugin()?, build.mode, &build.tags, detached)?;
            if detached {
                println!("{id}");
            }
        }
        Commands::Down => {
            lifecycle.down(&project, false)?;
        }
        Commands::Logs { follow, env } => match env {
            Environment::Local => {
                lifecycle.logs(&project, follow)?;
            }
            Environment::Prod => {
                lifecycle.remote_logs(&project, follow)?;
            }
        },
        Commands::Ps { env } => {
            let table = match env {
                Environment::Local => lifecycle.ps(&project)?,
                Environment::Prod => lifecycle.remote_ps(&project)?,
            };
            print!("{table}");
        }
        Commands::Ls { mode } => print!("{}", lifecycle.ls(&project, mode)?),
        Commands::Clean { mode } => {
            lifecycle.clean(&project, mode)?;
        }
        Commands::Publish => println!("{}", lifecycle.publish(&project, plugin()?)?),
        Commands::Deploy => {
            lifecycle.deploy(&project, plugin()?)?;
        }
        Commands::Eject { force } => {
            let written: Vec<PathBuf> = lifecycle.eject(&project, plugin()?, force)?;
            tracing::debug!(files = written.len(), "ejected");
        }
    }
    Ok(())
}

/// The real runner, or one that only prints what would run. Dry runs answer
/// the few queries whose output later steps depend on with placeholders.
fn runner(dry_run: bool, config: &Config) -> Arc<dyn CommandRunner> {
    if !dry_run {
        return Arc::new(SystemRunner);
    }
    Arc::new(
        ScriptedRunner::dry_run()
            .respond(&config.engine, &["run"], "<container-id>\n")
            .respond(&config.vcs, &["rev-parse"], "<commit>\n"),
    )
}
