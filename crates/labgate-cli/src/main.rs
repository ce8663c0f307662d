//! Binary entrypoint for labgate.
use anyhow::Result;
use clap::{Parser, Subcommand};
use labgate_cli::{
    cmd_check, cmd_purge, cmd_run, init_tracing, on_interrupt, render_report, GateConfig, InterruptAction,
    RunOptions, INTERRUPTED_EXIT_CODE,
};
use labgate_core::{CancelToken, TargetScore};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "labgate")]
#[command(version)]
#[command(about = "Staged gate runner for lab coursework CI", long_about = None)]
struct Cli {
    /// Config file (defaults to $LABGATE_CONFIG, then ./labgate.yaml)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Debug logging unless RUST_LOG is set
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run every stage of a pipeline and report verdicts
    Run {
        /// Pipeline file
        #[arg(value_name = "PIPELINE")]
        pipeline: PathBuf,

        /// Target score: 0, 4, 6, 8 or 10
        #[arg(long, short = 's', value_name = "SCORE")]
        target_score: TargetScore,

        /// Login of whoever triggered the run
        #[arg(long)]
        actor: String,

        #[arg(long, value_name = "TITLE")]
        pr_title: Option<String>,

        /// Run admin-only stages
        #[arg(long)]
        admin: bool,

        /// Write the JSON report here
        #[arg(long, value_name = "FILE")]
        report: Option<PathBuf>,
    },

    /// Validate a pipeline file and print its execution order
    Check {
        #[arg(value_name = "PIPELINE")]
        pipeline: PathBuf,
    },

    /// Delete artifact versions past their retention
    Purge,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Run {
            pipeline,
            target_score,
            actor,
            pr_title,
            admin,
            report,
        } => {
            let config = GateConfig::resolve(cli.config.as_deref())?;
            let options = RunOptions {
                pipeline,
                target_score,
                actor,
                pr_title,
                admin,
                report,
            };

            let cancel = CancelToken::new();
            let on_signal = cancel.clone();
            tokio::spawn(async move {
                let mut count = 0;
                while tokio::signal::ctrl_c().await.is_ok() {
                    count += 1;
                    match on_interrupt(count, &on_signal) {
                        InterruptAction::Cancel => {
                            tracing::warn!("interrupted; remaining stages will be skipped (Ctrl-C again to abort)");
                        }
                        InterruptAction::Abort => {
                            tracing::error!("interrupted again; aborting");
                            std::process::exit(INTERRUPTED_EXIT_CODE);
                        }
                    }
                }
            });

            let report = cmd_run(&options, &config, cancel).await?;
            print!("{}", render_report(&report));
            Ok(if report.success { ExitCode::SUCCESS } else { ExitCode::FAILURE })
        }
        Commands::Check { pipeline } => {
            for (i, stage) in cmd_check(&pipeline)?.iter().enumerate() {
                println!("{:>3}. {}", i + 1, stage);
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Purge => {
            let config = GateConfig::resolve(cli.config.as_deref())?;
            let removed = cmd_purge(&config)?;
            println!("removed {} expired artifact version(s)", removed);
            Ok(ExitCode::SUCCESS)
        }
    }
}
