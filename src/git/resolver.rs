use crate::error::{GitError, Result};
use crate::git::{PathFilter, ReferenceStore};
use git2::{Commit, Oid};

/// Computes which commits between a watermark and a head are new
///
/// Only the first-parent lineage is walked: commits that arrived through a
/// merge are represented by the merge commit itself.
pub struct CommitRangeResolver<'a> {
    store: &'a ReferenceStore,
    filter: &'a PathFilter,
}

impl<'a> CommitRangeResolver<'a> {
    pub fn new(store: &'a ReferenceStore, filter: &'a PathFilter) -> Self {
        Self { store, filter }
    }

    /// New commits reachable from `head`, oldest first
    ///
    /// The walk stops at the watermark, which is never part of the result. An
    /// absent or unresolvable watermark means the whole first-parent history
    /// down to the root is new.
    pub fn resolve(&self, head: &Commit<'_>, watermark: Option<&str>) -> Result<Vec<Oid>> {
        let last_seen = self.last_seen(watermark);

        let mut range = Vec::new();
        let mut visited = 0usize;
        let mut cursor = head.clone();
        loop {
            if Some(cursor.id()) == last_seen {
                tracing::debug!("Reached watermark {}", cursor.id());
                break;
            }
            visited += 1;

            if self.is_retained(&cursor)? {
                range.push(cursor.id());
            } else {
                tracing::debug!("Skipping {}: no matching paths", cursor.id());
            }

            if cursor.parent_count() == 0 {
                if let Some(last_seen) = last_seen {
                    tracing::warn!(
                        "Watermark {} is not a first-parent ancestor of {}, reporting full history",
                        last_seen,
                        head.id()
                    );
                }
                break;
            }

            cursor = cursor.parent(0).map_err(|e| GitError::WalkFailed {
                commit: cursor.id().to_string(),
                reason: e.message().to_string(),
            })?;
        }

        range.reverse();
        tracing::info!(
            "Resolved {} new commit(s) from {} ({} visited)",
            range.len(),
            head.id(),
            visited
        );
        Ok(range)
    }

    fn last_seen(&self, watermark: Option<&str>) -> Option<Oid> {
        let watermark = watermark?;
        match self.store.resolve(watermark) {
            Ok(commit) => Some(commit.id()),
            Err(err) => {
                tracing::warn!("Ignoring watermark {}: {}", watermark, err);
                None
            }
        }
    }

    fn is_retained(&self, commit: &Commit<'_>) -> Result<bool> {
        if self.filter.is_unrestricted() {
            return Ok(true);
        }
        let changed = self.store.changed_paths(commit)?;
        Ok(self.filter.matches(&changed))
    }
}
