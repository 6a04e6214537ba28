use thiserror::Error;

use crate::sync::google_api::ApiError;
use crate::sync::google_auth::AuthError;

pub type Result<T> = std::result::Result<T, CalendarError>;

#[derive(Debug, Error)]
pub enum CalendarError {
    #[error("cannot authenticate client: {0}")]
    Auth(#[from] AuthError),
    #[error("unable to retrieve calendar list: {0}")]
    CalendarList(#[source] ApiError),
    #[error("room: {room_id} does not have an assigned calendar")]
    RoomNotFound { room_id: String },
    #[error("room: {room_id} matches {matches} calendars")]
    AmbiguousRoom { room_id: String, matches: usize },
    #[error("unable to retrieve events: {0}")]
    Fetch(#[source] ApiError),
    #[error("unable to create event: {0}")]
    Create(#[source] ApiError),
    #[error("invalid event {field} time: {value:?}")]
    EventTime { field: &'static str, value: String },
    #[error("operation canceled")]
    Canceled,
    #[error("operation deadline exceeded")]
    DeadlineExceeded,
}

impl CalendarError {
    pub fn is_auth_error(&self) -> bool {
        matches!(self, CalendarError::Auth(_))
    }

    pub fn is_room_not_found(&self) -> bool {
        matches!(self, CalendarError::RoomNotFound { .. })
    }

    pub fn is_canceled(&self) -> bool {
        matches!(self, CalendarError::Canceled | CalendarError::DeadlineExceeded)
    }

    /// The provider refused the bearer token of an otherwise valid session.
    pub fn is_token_rejected(&self) -> bool {
        matches!(
            self,
            CalendarError::CalendarList(ApiError::AuthenticationFailed)
                | CalendarError::Fetch(ApiError::AuthenticationFailed)
                | CalendarError::Create(ApiError::AuthenticationFailed)
        )
    }
}
