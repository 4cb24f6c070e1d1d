//! Wire events of the analysis progress stream (one JSON object per line)

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamEvent {
    pub step: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<EventData>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EventData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl StreamEvent {
    pub fn new(step: impl Into<String>) -> Self {
        Self {
            step: step.into(),
            data: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.data.get_or_insert_with(EventData::default).message = Some(message.into());
        self
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.data.get_or_insert_with(EventData::default).data = Some(payload);
        self
    }

    /// Human-readable progress message (`data.message`)
    pub fn message(&self) -> Option<&str> {
        self.data.as_ref()?.message.as_deref()
    }

    /// Step-specific payload (`data.data`)
    pub fn payload(&self) -> Option<&serde_json::Value> {
        self.data.as_ref()?.data.as_ref()
    }
}
