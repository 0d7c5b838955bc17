//! Wire types of the check protocol
//!
//! The request arrives on stdin as `{"source": {...}, "version": {"ref": "..."}}`
//! and the response is written to stdout as `[{"ref": "..."}, ...]`.

use crate::config::Source;
use crate::error::{ConfigError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::io::{Read, Write};

/// A pipeline version: one commit the pipeline knows about
///
/// When passed in a request this is the watermark, the last commit already
/// reported by a previous check.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Version {
    #[serde(rename = "ref")]
    pub reference: String,
}

impl Version {
    pub fn new(reference: impl Into<String>) -> Self {
        Self {
            reference: reference.into(),
        }
    }
}

/// The document a check receives on stdin
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckRequest {
    pub source: Source,

    /// Watermark from the previous check, absent on the first run
    #[serde(default)]
    pub version: Option<Version>,

    /// The document as it was read, keys this resource does not know included
    #[serde(skip)]
    raw: Option<Value>,
}

impl CheckRequest {
    pub fn new(source: Source, version: Option<Version>) -> Self {
        Self {
            source,
            version,
            raw: None,
        }
    }

    /// Parse and validate a request
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let parse_err = |e: serde_json::Error| ConfigError::ParseFailed(e.to_string());
        let raw: Value = serde_json::from_reader(reader).map_err(parse_err)?;
        let mut request: CheckRequest = serde_json::from_value(raw.clone()).map_err(parse_err)?;
        request.source.validate()?;
        request.raw = Some(raw);
        Ok(request)
    }

    /// The request to hand to another checker
    ///
    /// This is the document as received when there is one, so `source` keys
    /// meant for that checker survive untouched.
    pub fn document(&self) -> Result<Value> {
        match &self.raw {
            Some(raw) => Ok(raw.clone()),
            None => Ok(serde_json::to_value(self)?),
        }
    }

    /// Watermark commit id, treating an empty `ref` as absent
    pub fn watermark(&self) -> Option<&str> {
        self.version
            .as_ref()
            .map(|v| v.reference.trim())
            .filter(|r| !r.is_empty())
    }
}

/// Write the check response
pub fn write_versions<W: Write>(mut writer: W, versions: &[Version]) -> Result<()> {
    serde_json::to_writer(&mut writer, versions)?;
    writeln!(writer)?;
    Ok(())
}
