//! Shapes of queue message bodies
//!
//! A CodeCommit trigger delivered through SNS arrives wrapped: the body is an
//! SNS envelope whose `Message` field holds the real notification as a JSON
//! string. A trigger sent straight to the queue (or a hand-crafted message)
//! carries the notification as the body itself. Anything else is skipped.

use serde::Deserialize;
use serde_json::Value;

/// Event source of CodeCommit trigger records
pub const CODECOMMIT_EVENT_SOURCE: &str = "aws:codecommit";

/// A parsed message body
#[derive(Debug, Clone)]
pub enum Envelope {
    /// Notification carried as a JSON string in an SNS `Message` field
    Wrapped(Notification),
    /// Notification carried directly as the body
    Flat(Notification),
    /// Not a repository notification; the reason is logged
    Unrecognized(String),
}

impl Envelope {
    pub fn parse(body: &str) -> Self {
        let value: Value = match serde_json::from_str(body) {
            Ok(value) => value,
            Err(e) => return Envelope::Unrecognized(format!("body is not JSON: {}", e)),
        };

        if let Some(message) = value.get("Message") {
            let inner = match message {
                Value::String(text) => match serde_json::from_str::<Value>(text) {
                    Ok(inner) => inner,
                    Err(e) => {
                        return Envelope::Unrecognized(format!("Message is not JSON: {}", e));
                    }
                },
                other => other.clone(),
            };
            return match Notification::from_value(inner) {
                Some(notification) => Envelope::Wrapped(notification),
                None => Envelope::Unrecognized("Records not in wrapped message".to_string()),
            };
        }

        match Notification::from_value(value) {
            Some(notification) => Envelope::Flat(notification),
            None => Envelope::Unrecognized("Records not in message".to_string()),
        }
    }

    /// The notification, whichever way it was wrapped
    pub fn notification(&self) -> Option<&Notification> {
        match self {
            Envelope::Wrapped(notification) | Envelope::Flat(notification) => Some(notification),
            Envelope::Unrecognized(_) => None,
        }
    }
}

/// The `Records` list of a notification
#[derive(Debug, Clone, Default)]
pub struct Notification {
    pub records: Vec<Record>,
}

impl Notification {
    fn from_value(value: Value) -> Option<Self> {
        let Value::Array(records) = value.get("Records")? else {
            return None;
        };
        Some(Self {
            records: records.iter().map(Record::from_value).collect(),
        })
    }
}

/// One entry of `Records`
#[derive(Debug, Clone)]
pub enum Record {
    CodeCommit(CodeCommitRecord),
    /// A record from some other event source
    Foreign { event_source: Option<String> },
    /// Has a `codecommit` key but not the expected shape
    Malformed(String),
}

impl Record {
    fn from_value(value: &Value) -> Self {
        if value.get("codecommit").is_none() {
            return Record::Foreign {
                event_source: value
                    .get("eventSource")
                    .and_then(Value::as_str)
                    .map(str::to_string),
            };
        }

        match CodeCommitRecord::deserialize(value) {
            Ok(record) => Record::CodeCommit(record),
            Err(e) => Record::Malformed(e.to_string()),
        }
    }
}

/// A CodeCommit trigger record
#[derive(Debug, Clone, Deserialize)]
pub struct CodeCommitRecord {
    #[serde(rename = "eventSource", default)]
    pub event_source: Option<String>,

    #[serde(rename = "eventSourceARN", default)]
    pub event_source_arn: Option<String>,

    /// Free-form data attached to the trigger
    #[serde(rename = "customData", default)]
    pub custom_data: Option<String>,

    pub codecommit: CodeCommitDetail,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CodeCommitDetail {
    #[serde(default)]
    pub references: Vec<ReferenceUpdate>,
}

/// A reference that moved, e.g. `refs/heads/main` -> commit
#[derive(Debug, Clone, Deserialize)]
pub struct ReferenceUpdate {
    #[serde(rename = "ref")]
    pub reference: String,

    pub commit: String,

    /// Branch or tag removal; there is nothing to check out
    #[serde(default)]
    pub deleted: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOTIFICATION: &str = r#"{
        "Records": [{
            "eventSource": "aws:codecommit",
            "eventSourceARN": "arn:aws:codecommit:eu-west-1:123456789012:app",
            "customData": "pipeline-a",
            "codecommit": {
                "references": [
                    {"ref": "refs/heads/master", "commit": "5c4ef1049f1d27deadbeef"}
                ]
            }
        }]
    }"#;

    fn refs(envelope: &Envelope) -> Vec<(String, String)> {
        envelope
            .notification()
            .unwrap()
            .records
            .iter()
            .filter_map(|r| match r {
                Record::CodeCommit(rec) => Some(rec),
                _ => None,
            })
            .flat_map(|rec| rec.codecommit.references.iter())
            .map(|r| (r.reference.clone(), r.commit.clone()))
            .collect()
    }

    #[test]
    fn test_flat_notification() {
        let envelope = Envelope::parse(NOTIFICATION);
        assert!(matches!(envelope, Envelope::Flat(_)));
        assert_eq!(
            refs(&envelope),
            vec![(
                "refs/heads/master".to_string(),
                "5c4ef1049f1d27deadbeef".to_string()
            )]
        );
    }

    #[test]
    fn test_wrapped_notification_matches_flat() {
        let wrapped = serde_json::json!({
            "Type": "Notification",
            "Message": NOTIFICATION,
        })
        .to_string();

        let envelope = Envelope::parse(&wrapped);
        assert!(matches!(envelope, Envelope::Wrapped(_)));
        assert_eq!(refs(&envelope), refs(&Envelope::parse(NOTIFICATION)));
    }

    #[test]
    fn test_wrapped_object_message() {
        let inner: Value = serde_json::from_str(NOTIFICATION).unwrap();
        let wrapped = serde_json::json!({ "Message": inner }).to_string();
        assert!(matches!(Envelope::parse(&wrapped), Envelope::Wrapped(_)));
    }

    #[test]
    fn test_record_fields() {
        let envelope = Envelope::parse(NOTIFICATION);
        let Record::CodeCommit(record) = &envelope.notification().unwrap().records[0] else {
            panic!("expected a CodeCommit record");
        };
        assert_eq!(record.event_source.as_deref(), Some(CODECOMMIT_EVENT_SOURCE));
        assert_eq!(record.custom_data.as_deref(), Some("pipeline-a"));
        assert_eq!(
            record.event_source_arn.as_deref(),
            Some("arn:aws:codecommit:eu-west-1:123456789012:app")
        );
        assert!(!record.codecommit.references[0].deleted);
    }

    #[test]
    fn test_missing_records_is_unrecognized() {
        let envelope = Envelope::parse(r#"{"hello": "world"}"#);
        assert!(matches!(envelope, Envelope::Unrecognized(_)));
        assert!(envelope.notification().is_none());
    }

    #[test]
    fn test_wrapped_without_records_is_unrecognized() {
        let body = serde_json::json!({ "Message": "{\"Subject\": \"hi\"}" }).to_string();
        assert!(matches!(Envelope::parse(&body), Envelope::Unrecognized(_)));
    }

    #[test]
    fn test_non_json_bodies() {
        assert!(matches!(Envelope::parse("not json"), Envelope::Unrecognized(_)));
        let body = serde_json::json!({ "Message": "still not json" }).to_string();
        assert!(matches!(Envelope::parse(&body), Envelope::Unrecognized(_)));
    }

    #[test]
    fn test_records_not_a_list() {
        assert!(matches!(
            Envelope::parse(r#"{"Records": {"codecommit": {}}}"#),
            Envelope::Unrecognized(_)
        ));
    }

    #[test]
    fn test_foreign_and_malformed_records() {
        let body = r#"{"Records": [
            {"eventSource": "aws:s3", "s3": {}},
            {"eventSource": "aws:codecommit", "codecommit": {"references": [{"ref": "refs/heads/x"}]}}
        ]}"#;
        let envelope = Envelope::parse(body);
        let records = &envelope.notification().unwrap().records;
        assert!(matches!(
            &records[0],
            Record::Foreign { event_source: Some(s) } if s == "aws:s3"
        ));
        assert!(matches!(&records[1], Record::Malformed(_)));
    }

    #[test]
    fn test_deleted_reference_flag() {
        let body = r#"{"Records": [{"codecommit": {"references": [
            {"ref": "refs/heads/old", "commit": "abc", "deleted": true}
        ]}}]}"#;
        let envelope = Envelope::parse(body);
        let Record::CodeCommit(record) = &envelope.notification().unwrap().records[0] else {
            panic!("expected a CodeCommit record");
        };
        assert!(record.codecommit.references[0].deleted);
        assert!(record.event_source.is_none());
    }

    #[test]
    fn test_created_reference_is_an_ordinary_update() {
        let body = r#"{"Records": [{"eventSource": "aws:codecommit", "codecommit": {"references": [
            {"ref": "refs/heads/new", "commit": "abc", "created": true}
        ]}}]}"#;
        let envelope = Envelope::parse(body);
        let Record::CodeCommit(record) = &envelope.notification().unwrap().records[0] else {
            panic!("expected a CodeCommit record");
        };
        let update = &record.codecommit.references[0];
        assert_eq!(update.reference, "refs/heads/new");
        assert_eq!(update.commit, "abc");
        assert!(!update.deleted);
    }
}
