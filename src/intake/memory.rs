use super::{MessageQueue, QueueMessage};
use crate::error::{QueueError, Result};
use serde_json::Value;
use std::collections::VecDeque;
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Queue kept in memory
///
/// Behaves like an SQS queue polled with a zero visibility timeout: a
/// received message stays visible until it is deleted. Used to replay
/// recorded notifications against a real repository without touching SQS.
pub struct MemoryQueue {
    name: String,
    messages: Mutex<VecDeque<QueueMessage>>,
    pushed: AtomicUsize,
}

impl MemoryQueue {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            messages: Mutex::new(VecDeque::new()),
            pushed: AtomicUsize::new(0),
        }
    }

    /// Queue holding one message per body, in order
    pub fn from_bodies(name: impl Into<String>, bodies: Vec<String>) -> Self {
        let queue = Self::new(name);
        for body in bodies {
            queue.push(body);
        }
        queue
    }

    /// Load recorded message bodies from a JSON file
    ///
    /// The file holds an array; string items are taken as raw bodies, any
    /// other item is serialised back to JSON and used as the body.
    pub fn load(path: &Path) -> Result<Self> {
        let load_err = |reason: String| QueueError::ReplayLoadFailed {
            path: path.display().to_string(),
            reason,
        };

        let content = std::fs::read_to_string(path).map_err(|e| load_err(e.to_string()))?;
        let items: Vec<Value> =
            serde_json::from_str(&content).map_err(|e| load_err(e.to_string()))?;

        let bodies = items
            .into_iter()
            .map(|item| match item {
                Value::String(body) => body,
                other => other.to_string(),
            })
            .collect();

        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("replay")
            .to_string();
        Ok(Self::from_bodies(name, bodies))
    }

    /// Append a message
    pub fn push(&self, body: impl Into<String>) {
        let n = self.pushed.fetch_add(1, Ordering::Relaxed) + 1;
        self.lock().push_back(QueueMessage {
            id: Some(format!("{}-{}", self.name, n)),
            body: body.into(),
            receipt_handle: Some(format!("{}-receipt-{}", self.name, n)),
        });
    }

    /// Number of messages still on the queue
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<QueueMessage>> {
        // A poisoned queue still holds valid messages
        self.messages
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait::async_trait]
impl MessageQueue for MemoryQueue {
    fn name(&self) -> &str {
        &self.name
    }

    /// At most one message per receive, like the SQS poll
    async fn receive(&self) -> Result<Vec<QueueMessage>> {
        Ok(self.lock().front().cloned().into_iter().collect())
    }

    async fn delete(&self, receipt_handle: &str) -> Result<()> {
        self.lock()
            .retain(|m| m.receipt_handle.as_deref() != Some(receipt_handle));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_receive_does_not_remove() {
        let queue = MemoryQueue::from_bodies("q", vec!["one".to_string(), "two".to_string()]);

        let first = queue.receive().await.unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].body, "one");

        let again = queue.receive().await.unwrap();
        assert_eq!(again, first);
        assert_eq!(queue.len(), 2);
    }

    #[tokio::test]
    async fn test_delete_by_receipt() {
        let queue = MemoryQueue::from_bodies("q", vec!["one".to_string(), "two".to_string()]);
        let first = queue.receive().await.unwrap();
        let receipt = first[0].receipt_handle.clone().unwrap();

        queue.delete(&receipt).await.unwrap();
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.receive().await.unwrap()[0].body, "two");

        // Deleting twice is harmless
        queue.delete(&receipt).await.unwrap();
        assert_eq!(queue.len(), 1);
    }

    #[tokio::test]
    async fn test_receipts_stay_unique_after_delete() {
        let queue = MemoryQueue::from_bodies("q", vec!["one".to_string(), "two".to_string()]);
        let first = queue.receive().await.unwrap();
        queue
            .delete(first[0].receipt_handle.as_deref().unwrap())
            .await
            .unwrap();

        queue.push("three");
        let second = queue.receive().await.unwrap();
        queue
            .delete(second[0].receipt_handle.as_deref().unwrap())
            .await
            .unwrap();
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.receive().await.unwrap()[0].body, "three");
    }

    #[test]
    fn test_load_from_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("notifications.json");
        std::fs::write(
            &path,
            r#"["{\"Records\": []}", {"Message": "{\"Records\": []}"}]"#,
        )
        .unwrap();

        let queue = MemoryQueue::load(&path).unwrap();
        assert_eq!(queue.name(), "notifications");
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn test_load_invalid_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{not json").unwrap();

        assert!(MemoryQueue::load(&path).is_err());
        assert!(MemoryQueue::load(&dir.path().join("missing.json")).is_err());
    }
}
