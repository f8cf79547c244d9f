//! Artifacts collected alongside a trace.
//!
//! Links and files referenced while handling a task are kept in their own
//! collections, each entry pointing back at the event that was current when
//! it was added.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An artifact with its bookkeeping fields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact<P> {
    /// Position among all artifacts of the session, starting at 1
    pub id: u64,

    pub kind: ArtifactKind,

    pub timestamp: DateTime<Utc>,

    /// Id of the latest trace event when this artifact was added
    pub event_id: Option<u64>,

    #[serde(flatten)]
    pub payload: P,
}

/// Types of artifacts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    Link,
    File,
}

/// A web reference
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub url: String,

    /// Falls back to the url when no title is known
    pub title: String,

    #[serde(default)]
    pub description: String,
}

impl Link {
    pub fn new(url: impl Into<String>, title: Option<String>, description: Option<String>) -> Self {
        let url = url.into();
        Self {
            title: title.unwrap_or_else(|| url.clone()),
            url,
            description: description.unwrap_or_default(),
        }
    }
}

/// A file written, read or referenced during the task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRef {
    pub path: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,

    #[serde(default)]
    pub description: String,
}

impl FileRef {
    pub fn new(path: impl Into<String>, content: Option<String>, description: Option<String>) -> Self {
        Self {
            path: path.into(),
            content,
            description: description.unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_link_title_defaults_to_url() {
        let link = Link::new("https://example.com", None, None);
        assert_eq!(link.title, "https://example.com");
        assert_eq!(link.description, "");
    }

    #[test]
    fn test_artifact_serialization_is_flat() {
        let artifact = Artifact {
            id: 1,
            kind: ArtifactKind::File,
            timestamp: Utc::now(),
            event_id: Some(4),
            payload: FileRef::new("solution.py", Some("print(1)".to_string()), None),
        };

        let value = serde_json::to_value(&artifact).unwrap();
        assert_eq!(value["kind"], "file");
        assert_eq!(value["path"], "solution.py");
        assert_eq!(value["event_id"], 4);

        let parsed: Artifact<FileRef> = serde_json::from_value(value).unwrap();
        assert_eq!(parsed.payload.content.as_deref(), Some("print(1)"));
    }
}
