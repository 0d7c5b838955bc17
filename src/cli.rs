//! Command-line surface of the `check` executable

use crate::config::Overrides;
use crate::driver::ResolutionDriver;
use crate::error::Result;
use crate::intake::{Intake, MemoryQueue, MessageQueue, QueueSettings, SqsQueue};
use crate::legacy::CommandCheck;
use crate::types::{CheckRequest, Version};
use clap::Parser;
use std::path::{Path, PathBuf};

/// Reads a check request on stdin and prints new versions on stdout
#[derive(Parser, Debug, Default)]
#[command(name = "check", version = env!("RESOURCE_LONG_VERSION"))]
pub struct Cli {
    /// Mirror directory, overriding `source.mirror_dir`
    #[arg(long, env = "SQS_RESOURCE_MIRROR_DIR")]
    pub mirror_dir: Option<PathBuf>,

    /// Verbose logging, same as `source.debug: true`
    #[arg(long, env = "SQS_RESOURCE_DEBUG")]
    pub debug: bool,

    /// Read notifications from a JSON file of message bodies instead of SQS;
    /// `source.queue` and `source.aws_region` are then optional
    #[arg(long, value_name = "FILE")]
    pub replay: Option<PathBuf>,
}

impl Cli {
    pub fn overrides(&self) -> Overrides {
        Overrides {
            mirror_dir: self.mirror_dir.clone(),
            debug: self.debug,
        }
    }
}

/// Run a check for `request`, polling SQS or a replay file
pub async fn run_check(request: &CheckRequest, replay: Option<&Path>) -> Result<Vec<Version>> {
    match replay {
        Some(path) => {
            tracing::info!("Replaying notifications from {}", path.display());
            drive(MemoryQueue::load(path)?, request).await
        }
        None => {
            request.source.validate_queue()?;
            let queue = SqsQueue::connect(&QueueSettings::from_source(&request.source)).await?;
            drive(queue, request).await
        }
    }
}

async fn drive<Q: MessageQueue>(queue: Q, request: &CheckRequest) -> Result<Vec<Version>> {
    let source = &request.source;
    let mut driver = ResolutionDriver::new(Intake::from_source(queue, source));
    if !source.legacy_check.is_empty() {
        driver = driver.with_legacy_check(Box::new(CommandCheck::from_argv(&source.legacy_check)?));
    }
    driver.run(request).await
}
