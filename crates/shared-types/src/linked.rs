//! References that arrive either as a bare id or as the populated record

use serde::{Deserialize, Serialize};

/// Records that carry their own identifier
pub trait Identified {
    fn id(&self) -> &str;
}

/// A linked record as the service may send it: a bare identifier, or the
/// expanded record itself. Decoded once at the ingestion boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Linked<T> {
    Unresolved(String),
    Resolved(T),
}

impl<T: Identified> Linked<T> {
    pub fn id(&self) -> &str {
        match self {
            Linked::Unresolved(id) => id,
            Linked::Resolved(record) => record.id(),
        }
    }
}

impl<T> Linked<T> {
    pub fn resolved(&self) -> Option<&T> {
        match self {
            Linked::Unresolved(_) => None,
            Linked::Resolved(record) => Some(record),
        }
    }
}

/// Project record written by the service when a scan is stored
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedProject {
    #[serde(alias = "_id")]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

impl Identified for SavedProject {
    fn id(&self) -> &str {
        &self.id
    }
}
