use anyhow::{Context, Result};
use clap::Parser;
use sqs_git_resource::cli::{Cli, run_check};
use sqs_git_resource::types::{CheckRequest, write_versions};
use tracing::Level;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut request = CheckRequest::from_reader(std::io::stdin().lock())
        .context("Failed to read check request from stdin")?;
    request.source.apply_overrides(&cli.overrides());

    // stdout carries the response, everything else goes to stderr
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(if request.source.debug {
            Level::DEBUG
        } else {
            Level::INFO
        })
        .init();

    tracing::debug!(
        "Checking {} (queue {}, branch {})",
        request.source.uri,
        request.source.queue,
        request.source.branch_name()
    );

    let versions = match run_check(&request, cli.replay.as_deref()).await {
        Ok(versions) => versions,
        Err(e) => {
            if e.is_user_error() {
                tracing::error!("Invalid source configuration: {}", e);
            }
            return Err(anyhow::Error::new(e).context("Check failed"));
        }
    };

    write_versions(std::io::stdout().lock(), &versions)?;
    Ok(())
}
