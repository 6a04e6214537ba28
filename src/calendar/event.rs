use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

/// Wire format for `dateTime` values exchanged with the provider:
/// RFC 3339 with an explicit numeric offset and no fractional seconds.
pub const WIRE_DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%:z";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub title: String,
    pub start: DateTime<FixedOffset>,
    pub end: DateTime<FixedOffset>,
}

impl Event {
    pub fn new(
        title: impl Into<String>,
        start: DateTime<FixedOffset>,
        end: DateTime<FixedOffset>,
    ) -> Self {
        Self {
            title: title.into(),
            start,
            end,
        }
    }

    pub fn duration_minutes(&self) -> i64 {
        (self.end - self.start).num_minutes()
    }
}

pub fn format_wire_datetime(value: &DateTime<FixedOffset>) -> String {
    value.format(WIRE_DATETIME_FORMAT).to_string()
}
