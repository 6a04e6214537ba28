pub mod calendar;
pub mod error;
pub mod logging;
pub mod storage;
pub mod sync;

pub use calendar::{CalendarEntry, DuplicatePolicy, Event, RoomCalendar};
pub use error::{CalendarError, Result};
pub use storage::config::{Config, ConfigError};
pub use sync::{Clock, DayWindow, FixedClock, RequestContext, RoomCalendarClient, SystemClock};
pub use sync::google_api::ApiError;
pub use sync::google_auth::AuthError;
