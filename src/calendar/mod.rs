pub mod event;
pub mod calendar_type;

pub use event::{Event, WIRE_DATETIME_FORMAT, format_wire_datetime};
pub use calendar_type::{CalendarEntry, DuplicatePolicy};

use async_trait::async_trait;

use crate::error::Result;
use crate::sync::context::RequestContext;

/// Provider-neutral view of one room's calendar.
#[async_trait]
pub trait RoomCalendar: Send + Sync {
    /// Events on the room's calendar for the current local day.
    async fn get_events(&self, ctx: &RequestContext) -> Result<Vec<Event>>;

    async fn create_event(&self, ctx: &RequestContext, event: &Event) -> Result<()>;
}
