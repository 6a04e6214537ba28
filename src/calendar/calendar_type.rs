use serde::{Deserialize, Serialize};

/// A calendar visible to the authenticated identity, reduced to the
/// two fields room resolution needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarEntry {
    pub id: String,
    #[serde(rename = "summary", default)]
    pub name: String,
}

impl CalendarEntry {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// What to do when several calendars share the room's display name.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    /// Take the first match in provider list order.
    #[default]
    FirstMatch,
    Reject,
}
