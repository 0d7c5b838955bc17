//! Notification intake: turning queue messages into change events
//!
//! The queue itself is an external system reached through [`MessageQueue`].
//! This module only decides which messages are repository notifications,
//! which of their references the check cares about, and when a consumed
//! message is acknowledged.

/// In-process queue used for replaying recorded notifications
pub mod memory;
/// Message body shapes
pub mod message;
/// Amazon SQS implementation of the queue
pub mod sqs;

pub use memory::MemoryQueue;
pub use message::{CODECOMMIT_EVENT_SOURCE, CodeCommitRecord, Envelope, Notification, Record};
pub use sqs::{QueueCredentials, QueueSettings, SqsQueue};

use crate::config::Source;
use crate::error::Result;

/// A message as delivered by the queue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueMessage {
    pub id: Option<String>,
    pub body: String,
    /// Handle needed to delete the message; absent for messages that cannot be acknowledged
    pub receipt_handle: Option<String>,
}

/// Trait for the notification queue
#[async_trait::async_trait]
pub trait MessageQueue: Send + Sync {
    /// Queue name, for logging
    fn name(&self) -> &str;

    /// Receive pending messages without hiding them from later receivers
    async fn receive(&self) -> Result<Vec<QueueMessage>>;

    /// Remove a message from the queue
    async fn delete(&self, receipt_handle: &str) -> Result<()>;
}

/// A reference that moved to a new commit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    /// Full reference name, e.g. `refs/heads/main` or `refs/tags/v1.0`
    pub reference: String,
    /// Commit the reference now points at
    pub commit: String,
}

impl ChangeEvent {
    pub fn new(reference: impl Into<String>, commit: impl Into<String>) -> Self {
        Self {
            reference: reference.into(),
            commit: commit.into(),
        }
    }
}

/// Which records and references of a notification are accepted
#[derive(Debug, Clone, Default)]
pub struct RecordFilter {
    pub branch: Option<String>,
    pub custom_data: Option<String>,
    pub repository_arn: Option<String>,
}

impl RecordFilter {
    pub fn from_source(source: &Source) -> Self {
        Self {
            branch: source.branch.clone(),
            custom_data: source.custom_data.clone(),
            repository_arn: source.repository_arn.clone(),
        }
    }

    /// Change events of a notification that pass every filter
    pub fn events(&self, notification: &Notification) -> Vec<ChangeEvent> {
        let mut events = Vec::new();

        for record in &notification.records {
            let record = match record {
                Record::CodeCommit(record) => record,
                Record::Foreign { event_source } => {
                    tracing::info!(
                        "Not a CodeCommit record (event source {}), skipping",
                        event_source.as_deref().unwrap_or("unknown")
                    );
                    continue;
                }
                Record::Malformed(reason) => {
                    tracing::warn!("Malformed CodeCommit record, skipping: {}", reason);
                    continue;
                }
            };

            if let Some(reason) = self.rejects(record) {
                tracing::info!("Skipping record: {}", reason);
                continue;
            }

            for update in &record.codecommit.references {
                if update.deleted {
                    tracing::info!("{} was deleted, skipping", update.reference);
                    continue;
                }
                if !self.accepts_reference(&update.reference) {
                    tracing::debug!("{} does not match the configured branch", update.reference);
                    continue;
                }
                events.push(ChangeEvent::new(&update.reference, &update.commit));
            }
        }

        events
    }

    fn rejects(&self, record: &CodeCommitRecord) -> Option<String> {
        if let Some(source) = &record.event_source
            && source != CODECOMMIT_EVENT_SOURCE
        {
            return Some(format!("unexpected event source {}", source));
        }

        if let Some(expected) = &self.custom_data
            && record.custom_data.as_deref() != Some(expected.as_str())
        {
            return Some(format!(
                "customData {:?} does not match {:?}",
                record.custom_data, expected
            ));
        }

        if let Some(expected) = &self.repository_arn
            && record.event_source_arn.as_deref() != Some(expected.as_str())
        {
            return Some(format!(
                "repository {:?} does not match {:?}",
                record.event_source_arn, expected
            ));
        }

        None
    }

    /// Without a configured branch every reference is accepted
    fn accepts_reference(&self, reference: &str) -> bool {
        match &self.branch {
            None => true,
            Some(branch) => {
                reference == format!("refs/heads/{}", branch)
                    || reference == format!("refs/tags/{}", branch)
            }
        }
    }
}

/// Result of one poll: the change events plus what is needed to acknowledge them
#[derive(Debug, Clone, Default)]
pub struct NotificationBatch {
    pub events: Vec<ChangeEvent>,
    receipts: Vec<String>,
}

impl NotificationBatch {
    /// No change event arrived
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Number of consumed messages that would be acknowledged
    pub fn consumed(&self) -> usize {
        self.receipts.len()
    }
}

/// Polls the queue and acknowledges consumed notifications
pub struct Intake<Q> {
    queue: Q,
    filter: RecordFilter,
    delete_message: bool,
    debug: bool,
}

impl<Q: MessageQueue> Intake<Q> {
    pub fn new(queue: Q, filter: RecordFilter, delete_message: bool) -> Self {
        Self {
            queue,
            filter,
            delete_message,
            debug: false,
        }
    }

    /// Intake configured from a check `source`
    pub fn from_source(queue: Q, source: &Source) -> Self {
        Self::new(queue, RecordFilter::from_source(source), source.delete_message)
            .with_debug(source.debug)
    }

    /// Log raw message payloads
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn queue(&self) -> &Q {
        &self.queue
    }

    /// Receive pending messages and extract change events
    ///
    /// Messages that are not notifications are skipped and left on the
    /// queue. Receive failures are returned.
    pub async fn poll(&self) -> Result<NotificationBatch> {
        let messages = self.queue.receive().await?;
        tracing::info!(
            "Received {} message(s) from {}",
            messages.len(),
            self.queue.name()
        );

        let mut batch = NotificationBatch::default();
        for message in messages {
            let id = message.id.as_deref().unwrap_or("<no id>");
            if self.debug {
                tracing::debug!("Payload of {}: {}", id, message.body);
            }

            let envelope = Envelope::parse(&message.body);
            let Some(notification) = envelope.notification() else {
                if let Envelope::Unrecognized(reason) = &envelope {
                    tracing::warn!("Skipping message {}: {}", id, reason);
                }
                continue;
            };

            let events = self.filter.events(notification);
            tracing::info!("Message {} carries {} matching change(s)", id, events.len());
            batch.events.extend(events);

            if let Some(receipt) = message.receipt_handle {
                batch.receipts.push(receipt);
            }
        }

        Ok(batch)
    }

    /// Remove the messages of `batch` from the queue when `delete_message` is on
    ///
    /// A failed delete is only logged: the notification will be seen again
    /// and resolve to the same commits.
    pub async fn acknowledge(&self, batch: &NotificationBatch) {
        if batch.receipts.is_empty() {
            return;
        }
        if !self.delete_message {
            tracing::info!(
                "delete_message is disabled, leaving {} message(s) on {}",
                batch.receipts.len(),
                self.queue.name()
            );
            return;
        }

        for receipt in &batch.receipts {
            match self.queue.delete(receipt).await {
                Ok(()) => tracing::debug!("Deleted message from {}", self.queue.name()),
                Err(e) => tracing::warn!("Could not delete message: {}", e),
            }
        }
    }
}
