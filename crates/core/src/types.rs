use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Server-assigned identifier of a generation job.
///
/// Opaque to this crate; used both as the store key and as the routing
/// key on the push and pull channels.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    /// Wrap a server-assigned identifier, rejecting blank values.
    pub fn parse(raw: impl Into<String>) -> Result<Self, CoreError> {
        let raw = raw.into();
        if raw.trim().is_empty() {
            return Err(CoreError::Validation("job id must not be empty".into()));
        }
        Ok(Self(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for JobId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_accepts_opaque_ids() {
        let id = JobId::parse("abc123").unwrap();
        assert_eq!(id.as_str(), "abc123");
        assert_eq!(id.to_string(), "abc123");
    }

    #[test]
    fn parse_rejects_blank_ids() {
        assert!(JobId::parse("").is_err());
        assert!(JobId::parse("   ").is_err());
    }

    #[test]
    fn serializes_as_plain_string() {
        let id = JobId::parse("def456").unwrap();
        assert_eq!(serde_json::to_string(&id).unwrap(), r#""def456""#);
    }
}
