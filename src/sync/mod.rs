pub mod clock;
pub mod context;
pub mod google_api;
pub mod google_auth;
pub mod room_client;

pub use clock::{Clock, DayWindow, FixedClock, SystemClock};
pub use context::RequestContext;
pub use room_client::{CalendarSession, RoomCalendarClient};
