//! # sqs-git-resource - SQS-notified git `check` for Concourse
//!
//! A Concourse resource `check` that learns about repository changes from
//! CodeCommit notifications delivered to an SQS queue, and reports the git
//! commits the pipeline has not seen yet, oldest first.
//!
//! ## Overview
//!
//! Each invocation reads `{source, version?}` from stdin, where `version` is
//! the last commit reported by the previous check (the watermark). It then
//!
//! 1. polls the queue once for change notifications,
//! 2. fetches a local mirror of the repository,
//! 3. walks first-parent history from every changed reference (or from the
//!    configured branch when nothing was notified) back to the watermark,
//!    keeping commits that pass the path filter,
//! 4. prints the resulting `[{"ref": ...}]` list on stdout and acknowledges
//!    the consumed notifications.
//!
//! ## Architecture
//!
//! ```text
//!  stdin ──► CheckRequest ──► ResolutionDriver ──► stdout
//!                                 │     │
//!                 ┌───────────────┘     └──────────────┐
//!                 ▼                                    ▼
//!        Intake<MessageQueue>              ReferenceStore (git2 mirror)
//!        (SQS / replay file)                  │
//!                                             ▼
//!                                  CommitRangeResolver + PathFilter
//! ```
//!
//! ## Modules
//!
//! - [`cli`]: command-line flags and wiring of the concrete queue
//! - [`config`]: the `source` configuration block
//! - [`driver`]: orchestration of one check
//! - [`error`]: error types
//! - [`git`]: mirror, path filter and commit-range resolver
//! - [`intake`]: notification parsing and the queue abstraction
//! - [`legacy`]: delegation to an external checker
//! - [`paths`]: default on-disk locations
//! - [`types`]: wire types of the check protocol

/// Command-line flags and top-level wiring
pub mod cli;

/// `source` configuration with command-line overrides
pub mod config;

/// Orchestration of one check invocation
pub mod driver;

/// Error types and utilities
pub mod error;

/// Git mirror, path filter and commit-range resolver
pub mod git;

/// Notification intake and queue implementations
pub mod intake;

/// External checker used as a fallback
pub mod legacy;

/// Default on-disk locations
pub mod paths;

/// Check protocol request/response types
pub mod types;
