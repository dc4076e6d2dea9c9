use clap::Parser;
use mkv_episode_tagger::{Config, END_SENTINEL};
use std::process::ExitCode;
use tracing::error;
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    // stdout is reserved for the report
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();

    let config = match Config::try_parse() {
        Ok(config) => config,
        Err(error) => {
            // help and version go to stdout and are not failures
            let failed = error.use_stderr();
            _ = error.print();
            return if failed {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    let code = match mkv_episode_tagger::run(config).await {
        Ok(report) => {
            print!("{report}");
            let failures = report.failures();
            if failures > 0 {
                error!(failures, "Some episodes could not be processed");
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            }
        }
        Err(error) => {
            error!("{error:#}");
            ExitCode::FAILURE
        }
    };

    println!("{END_SENTINEL}");
    code
}
