//! Display-only records and the projection filter shared by rehydration
//! and live custom events.
//!
//! Display items are derived, never authoritative: a plan item has no
//! canonical message behind it, and tool bookkeeping never surfaces here.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The one custom-event name this client renders
pub const PLAN_EVENT: &str = "secret_plan";

/// Roles a text display item can carry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayRole {
    User,
    Assistant,
}

/// A rendering-oriented record, distinct from the canonical message log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DisplayItem {
    /// Plain conversational text
    Text { role: DisplayRole, content: String },
    /// An ordered multi-step plan revealed on demand
    Plan { steps: Vec<String> },
    /// Marker shown when a run failed mid-stream
    Error { message: String },
}

impl DisplayItem {
    /// Create a user text item
    pub fn user(content: impl Into<String>) -> Self {
        Self::Text {
            role: DisplayRole::User,
            content: content.into(),
        }
    }

    /// Create an assistant text item
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::Text {
            role: DisplayRole::Assistant,
            content: content.into(),
        }
    }
}

/// One row of the persisted display log, as served by the history store.
///
/// Text rows carry a string `content`; event rows carry the embedded event
/// object. Anything else in `content` fails the projection filter below.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplayRecord {
    #[serde(default)]
    pub id: Option<String>,
    pub role: String,
    #[serde(default)]
    pub content: Value,
}

/// Project one stored display record into a display item.
///
/// `user`/`assistant` rows become text items; `event` rows holding a
/// recognized custom event become plan items. Tool rows and unrecognized
/// events return `None` — a deliberate filter, not an error.
pub fn project_record(record: &DisplayRecord) -> Option<DisplayItem> {
    match record.role.as_str() {
        "user" => Some(DisplayItem::user(record.content.as_str()?)),
        "assistant" => Some(DisplayItem::assistant(record.content.as_str()?)),
        "event" => {
            let event = record.content.as_object()?;
            if event.get("type")?.as_str()? != "CUSTOM" {
                return None;
            }
            let name = event.get("name")?.as_str()?;
            project_custom(name, event.get("value").unwrap_or(&Value::Null))
        }
        _ => None,
    }
}

/// Project a live custom event into a display item, if recognized.
pub fn project_custom(name: &str, value: &Value) -> Option<DisplayItem> {
    if name != PLAN_EVENT {
        return None;
    }
    plan_steps(value).map(|steps| DisplayItem::Plan { steps })
}

/// Extract the ordered step strings from a plan payload.
///
/// Accepts both the bare array form and the `{"steps": [...]}` object the
/// server serializes.
fn plan_steps(value: &Value) -> Option<Vec<String>> {
    let array = match value {
        Value::Array(items) => items,
        Value::Object(map) => map.get("steps")?.as_array()?,
        _ => return None,
    };
    array
        .iter()
        .map(|step| step.as_str().map(str::to_string))
        .collect()
}
