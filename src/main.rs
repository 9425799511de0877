use std::process::ExitCode;

use anyhow::{Result, anyhow};
use clap::Parser;
use ipmi_fand::{application::Application, cli::Cli, config, error::FanControlError};
use log::{LevelFilter, error, info};
use syslog::{BasicLogger, Facility, Formatter3164};

fn init_log(cli: &Cli) -> Result<()> {
    let level = if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    if !cli.syslog {
        env_logger::Builder::new()
            .filter_level(level)
            .parse_default_env()
            .try_init()
            .map_err(|e| anyhow!("{e}"))?;
        return Ok(());
    }

    syslog::unix(Formatter3164 {
        facility: Facility::LOG_DAEMON,
        hostname: None,
        process: "ipmi-fand".into(),
        pid: std::process::id(),
    })
    .map_err(|e| anyhow!("{e}"))
    .and_then(|logger| {
        log::set_boxed_logger(Box::new(BasicLogger::new(logger)))
            .map(|_| log::set_max_level(level))
            .map_err(|e| anyhow!("{e}"))
    })
}

async fn run(cli: Cli) -> Result<()> {
    let config = config::load(cli.config)?;

    Application::builder()
        .with_config(config)
        .dry_run(cli.dry_run)
        .build()?
        .run()
        .await
}

/// Error class of the first taxonomy error in the chain.
fn error_kind(err: &anyhow::Error) -> &'static str {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<FanControlError>())
        .map(FanControlError::kind)
        .unwrap_or("startup")
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let use_syslog = cli.syslog;

    if let Err(e) = init_log(&cli) {
        eprintln!("Failed to initialise logging: {e}");
        return ExitCode::FAILURE;
    }

    info!("Starting ipmi-fand {}", env!("CARGO_PKG_VERSION"));

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let kind = error_kind(&e);
            error!("fatal {kind}: {e:#}");
            if use_syslog {
                eprintln!("fatal {kind}: {e:#}");
            }
            ExitCode::FAILURE
        }
    }
}
