//! Orchestration of a single check
//!
//! Polls the notification intake once, fetches the mirror, resolves every
//! changed reference (or the configured branch when nothing changed) against
//! the watermark, and only then acknowledges the consumed notifications.

use crate::config::Source;
use crate::error::Result;
use crate::git::{CommitRangeResolver, PathFilter, ReferenceStore};
use crate::intake::{ChangeEvent, Intake, MessageQueue};
use crate::legacy::LegacyCheck;
use crate::types::{CheckRequest, Version};

/// Runs one check against a queue and a mirror
pub struct ResolutionDriver<Q> {
    intake: Intake<Q>,
    legacy: Option<Box<dyn LegacyCheck>>,
}

impl<Q: MessageQueue> ResolutionDriver<Q> {
    pub fn new(intake: Intake<Q>) -> Self {
        Self {
            intake,
            legacy: None,
        }
    }

    /// Checker to defer to when there is neither a notification nor a watermark
    pub fn with_legacy_check(mut self, legacy: Box<dyn LegacyCheck>) -> Self {
        self.legacy = Some(legacy);
        self
    }

    pub fn intake(&self) -> &Intake<Q> {
        &self.intake
    }

    /// New versions for `request`, oldest first within each changed reference
    pub async fn run(&self, request: &CheckRequest) -> Result<Vec<Version>> {
        let batch = self.intake.poll().await?;
        let watermark = request.watermark();

        if batch.is_empty()
            && watermark.is_none()
            && let Some(legacy) = &self.legacy
        {
            tracing::info!("No notification and no previous version, using legacy check");
            let versions = legacy.check(request)?;
            self.intake.acknowledge(&batch).await;
            return Ok(versions);
        }

        let source = &request.source;
        let store = open_mirror(source)?;
        let filter = PathFilter::new(store.root(), &source.paths, &source.ignored_paths);

        let versions = resolve_versions(
            &store,
            &filter,
            &batch.events,
            source.branch_name(),
            watermark,
        )?;

        self.intake.acknowledge(&batch).await;
        Ok(versions)
    }
}

/// Ensure the mirror for `source` exists and is up to date
pub fn open_mirror(source: &Source) -> Result<ReferenceStore> {
    let store = ReferenceStore::ensure_mirror(
        &source.uri,
        source.mirror_path(),
        source.git_credentials(),
    )?;
    store.fetch_latest()?;
    Ok(store)
}

/// Resolve change events (or `branch` when there are none) against `watermark`
///
/// Each distinct reference is resolved independently and the ranges are
/// concatenated in event order. An event whose commit is missing from the
/// freshly fetched mirror is fatal.
pub fn resolve_versions(
    store: &ReferenceStore,
    filter: &PathFilter,
    events: &[ChangeEvent],
    branch: &str,
    watermark: Option<&str>,
) -> Result<Vec<Version>> {
    let resolver = CommitRangeResolver::new(store, filter);
    let mut versions = Vec::new();

    let heads = if events.is_empty() {
        tracing::info!("No change notification, checking branch {}", branch);
        vec![store.branch_head(branch)?]
    } else {
        distinct_events(events)
            .iter()
            .map(|event| {
                tracing::info!("{} changed to {}", event.reference, event.commit);
                store.resolve(&event.commit)
            })
            .collect::<Result<Vec<_>>>()?
    };

    for head in &heads {
        let range = resolver.resolve(head, watermark)?;
        versions.extend(range.iter().map(|oid| Version::new(oid.to_string())));
    }

    if let Some(last) = heads.last() {
        store.set_checked_out_head(last)?;
    }

    Ok(versions)
}

/// One event per reference: first occurrence keeps its position, the latest commit wins
pub fn distinct_events(events: &[ChangeEvent]) -> Vec<ChangeEvent> {
    let mut distinct: Vec<ChangeEvent> = Vec::with_capacity(events.len());
    for event in events {
        match distinct.iter_mut().find(|e| e.reference == event.reference) {
            Some(existing) => existing.commit = event.commit.clone(),
            None => distinct.push(event.clone()),
        }
    }
    distinct
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distinct_events_keeps_order() {
        let events = vec![
            ChangeEvent::new("refs/heads/master", "a1"),
            ChangeEvent::new("refs/heads/develop", "b1"),
            ChangeEvent::new("refs/heads/master", "a2"),
        ];
        assert_eq!(
            distinct_events(&events),
            vec![
                ChangeEvent::new("refs/heads/master", "a2"),
                ChangeEvent::new("refs/heads/develop", "b1"),
            ]
        );
    }

    #[test]
    fn test_distinct_events_empty() {
        assert!(distinct_events(&[]).is_empty());
    }

    #[test]
    fn test_distinct_events_tag_and_branch_are_distinct() {
        let events = vec![
            ChangeEvent::new("refs/heads/v1", "a1"),
            ChangeEvent::new("refs/tags/v1", "a1"),
        ];
        assert_eq!(distinct_events(&events).len(), 2);
    }
}
