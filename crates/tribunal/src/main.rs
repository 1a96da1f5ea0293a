//! Tribunal command-line launcher
//!
//! - `tribunal simulate`: run a scripted judging job and print its SSE frames
//! - `tribunal config`: print the effective configuration

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tribunal_jobs::StageId;
use tribunal_logging::{init_logging, LogConfig};

mod cli;

#[derive(Parser, Debug)]
#[command(name = "tribunal", about = "Hackathon judging job runner")]
struct Cli {
    /// Mirror all log output on stderr
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    /// Config file (default: ~/.tribunal/config.toml)
    #[arg(long, global = true, env = "TRIBUNAL_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a scripted judging job and stream its events as SSE frames
    Simulate {
        /// Team name
        #[arg(short, long)]
        team: String,

        /// Repository URL to report in progress excerpts
        #[arg(long, default_value = "https://github.com/example/project")]
        github_url: String,

        /// Pitch transcript text
        #[arg(long, default_value = "")]
        transcript: String,

        /// Pitch deck path
        #[arg(long)]
        pptx: Option<PathBuf>,

        /// Demo video path
        #[arg(long)]
        video: Option<PathBuf>,

        /// Fail when this stage starts
        #[arg(long)]
        fail_at: Option<StageId>,

        /// Panic when this stage starts
        #[arg(long)]
        panic_at: Option<StageId>,

        /// Wait before attaching to the stream
        #[arg(long, default_value = "0")]
        attach_delay_ms: u64,

        /// Delay between scripted progress reports
        #[arg(long, default_value = "100")]
        step_delay_ms: u64,

        /// Progress excerpts per stage
        #[arg(long, default_value = "2")]
        steps: usize,

        /// Finish with output that is not a verdict document
        #[arg(long)]
        malformed: bool,
    },

    /// Print the effective configuration
    Config,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let _log_guard = match init_logging(LogConfig {
        app_name: "tribunal",
        verbose: cli.verbose,
    }) {
        Ok(guard) => Some(guard),
        Err(err) => {
            eprintln!("Warning: failed to initialize logging: {:#}", err);
            None
        }
    };

    match run_command(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {:#}", err);
            ExitCode::from(1)
        }
    }
}

fn run_command(cli: Cli) -> Result<()> {
    let config_path = cli.config.unwrap_or_else(cli::config::default_config_path);

    match cli.command {
        Commands::Simulate {
            team,
            github_url,
            transcript,
            pptx,
            video,
            fail_at,
            panic_at,
            attach_delay_ms,
            step_delay_ms,
            steps,
            malformed,
        } => {
            let config = cli::config::load(&config_path)?;
            let args = cli::simulate::SimulateArgs {
                team,
                github_url,
                transcript,
                pptx,
                video,
                fail_at,
                panic_at,
                attach_delay_ms,
                step_delay_ms,
                steps,
                malformed,
            };

            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .thread_name("tribunal-stream")
                .build()
                .context("Failed to build tokio runtime")?;
            runtime.block_on(cli::simulate::run(args, &config))
        }
        Commands::Config => cli::config::print(&config_path),
    }
}
