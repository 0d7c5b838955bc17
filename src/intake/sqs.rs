use super::{MessageQueue, QueueMessage};
use crate::config::Source;
use crate::error::{QueueError, Result};
use aws_config::{BehaviorVersion, Region};
use aws_sdk_sqs::Client;
use aws_sdk_sqs::config::Credentials;
use aws_sdk_sqs::error::DisplayErrorContext;
use std::fmt;

/// Static credentials for the queue client
#[derive(Clone)]
pub struct QueueCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
}

impl fmt::Debug for QueueCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueueCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("session_token", &self.session_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Where the queue lives and how to reach it
#[derive(Debug, Clone)]
pub struct QueueSettings {
    pub name: String,
    pub region: String,
    /// `None` falls back to the default AWS credential chain
    pub credentials: Option<QueueCredentials>,
}

impl QueueSettings {
    pub fn from_source(source: &Source) -> Self {
        let credentials = match (&source.aws_access_key_id, &source.aws_secret_access_key) {
            (Some(id), Some(secret)) => Some(QueueCredentials {
                access_key_id: id.clone(),
                secret_access_key: secret.clone(),
                session_token: source.aws_session_token.clone(),
            }),
            _ => None,
        };

        Self {
            name: source.queue.clone(),
            region: source.aws_region.clone(),
            credentials,
        }
    }
}

/// SQS queue polled without long polling and with a zero visibility timeout
pub struct SqsQueue {
    client: Client,
    name: String,
    url: String,
}

impl SqsQueue {
    /// Build a client and look up the queue URL
    ///
    /// The queue must already exist; provisioning is not this resource's job.
    pub async fn connect(settings: &QueueSettings) -> Result<Self> {
        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(settings.region.clone()));

        if let Some(creds) = &settings.credentials {
            loader = loader.credentials_provider(Credentials::new(
                creds.access_key_id.clone(),
                creds.secret_access_key.clone(),
                creds.session_token.clone(),
                None,
                "check-source",
            ));
        }

        let config = loader.load().await;
        let client = Client::new(&config);

        let lookup_err = |reason: String| QueueError::LookupFailed {
            queue: settings.name.clone(),
            reason,
        };
        let output = client
            .get_queue_url()
            .queue_name(&settings.name)
            .send()
            .await
            .map_err(|e| lookup_err(DisplayErrorContext(&e).to_string()))?;
        let url = output
            .queue_url()
            .map(str::to_string)
            .ok_or_else(|| lookup_err("no queue URL returned".to_string()))?;

        tracing::info!("Polling {} ({})", settings.name, url);

        Ok(Self {
            client,
            name: settings.name.clone(),
            url,
        })
    }
}

#[async_trait::async_trait]
impl MessageQueue for SqsQueue {
    fn name(&self) -> &str {
        &self.name
    }

    async fn receive(&self) -> Result<Vec<QueueMessage>> {
        let output = self
            .client
            .receive_message()
            .queue_url(&self.url)
            .max_number_of_messages(1)
            .visibility_timeout(0)
            .wait_time_seconds(0)
            .message_attribute_names("All")
            .send()
            .await
            .map_err(|e| QueueError::ReceiveFailed {
                queue: self.name.clone(),
                reason: DisplayErrorContext(&e).to_string(),
            })?;

        Ok(output
            .messages()
            .iter()
            .map(|m| QueueMessage {
                id: m.message_id().map(str::to_string),
                body: m.body().unwrap_or_default().to_string(),
                receipt_handle: m.receipt_handle().map(str::to_string),
            })
            .collect())
    }

    async fn delete(&self, receipt_handle: &str) -> Result<()> {
        self.client
            .delete_message()
            .queue_url(&self.url)
            .receipt_handle(receipt_handle)
            .send()
            .await
            .map_err(|e| QueueError::DeleteFailed {
                queue: self.name.clone(),
                reason: DisplayErrorContext(&e).to_string(),
            })?;
        Ok(())
    }
}
