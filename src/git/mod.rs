//! Git side of the check: the local mirror and the commit-range resolver
//!
//! Provides the reference store (a fetched mirror of the remote), the path
//! filter applied to every candidate commit, and the resolver computing the
//! ordered list of commits a pipeline has not seen yet.

/// Path inclusion/exclusion predicate
pub mod filter;
/// First-parent walk from a head back to the watermark
pub mod resolver;
/// Local mirror of the remote repository
pub mod store;

pub use filter::PathFilter;
pub use resolver::CommitRangeResolver;
pub use store::{GitCredentials, REMOTE_NAME, ReferenceStore};
