//! Delegation to an external version checker
//!
//! When the queue has nothing for us and the pipeline has never recorded a
//! version, the check is handed to another `check` executable (typically the
//! stock git resource) speaking the same stdin/stdout protocol.

use crate::error::{LegacyError, Result};
use crate::types::{CheckRequest, Version};
use std::io::Write;
use std::process::{Command, Stdio};

/// An external checker answering a full check request
pub trait LegacyCheck {
    fn check(&self, request: &CheckRequest) -> Result<Vec<Version>>;
}

/// Runs a command, feeding it the request on stdin
///
/// The command's stderr is inherited so its diagnostics end up next to ours.
#[derive(Debug, Clone)]
pub struct CommandCheck {
    program: String,
    args: Vec<String>,
}

impl CommandCheck {
    /// Build from an argv list: program followed by its arguments
    pub fn from_argv(argv: &[String]) -> Result<Self> {
        let (program, args) = argv.split_first().ok_or(LegacyError::EmptyCommand)?;
        if program.trim().is_empty() {
            return Err(LegacyError::EmptyCommand.into());
        }
        Ok(Self {
            program: program.clone(),
            args: args.to_vec(),
        })
    }

    pub fn program(&self) -> &str {
        &self.program
    }
}

impl LegacyCheck for CommandCheck {
    fn check(&self, request: &CheckRequest) -> Result<Vec<Version>> {
        tracing::info!("Delegating check to {}", self.program);

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| LegacyError::SpawnFailed {
                program: self.program.clone(),
                reason: e.to_string(),
            })?;

        let payload = serde_json::to_vec(&request.document()?)?;
        if let Some(mut stdin) = child.stdin.take() {
            // The checker may exit without reading its input
            if let Err(e) = stdin.write_all(&payload) {
                tracing::debug!("{} did not read the request: {}", self.program, e);
            }
        }

        let output = child.wait_with_output()?;
        if !output.status.success() {
            return Err(LegacyError::CommandFailed {
                program: self.program.clone(),
                status: output.status.to_string(),
            }
            .into());
        }

        let versions: Vec<Version> =
            serde_json::from_slice(&output.stdout).map_err(|e| LegacyError::InvalidOutput {
                program: self.program.clone(),
                reason: e.to_string(),
            })?;

        tracing::info!("{} reported {} version(s)", self.program, versions.len());
        Ok(versions)
    }
}
