use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, TimeZone};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::calendar::{CalendarEntry, Event, format_wire_datetime};
use crate::error::CalendarError;
use crate::sync::clock::DayWindow;

pub const DEFAULT_BASE_URL: &str = "https://www.googleapis.com/calendar/v3";

const CALENDAR_LIST_FIELDS: &str = "items(id,summary)";
const EVENT_LIST_FIELDS: &str = "items(summary,start,end),nextPageToken";

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),
    #[error("Request error: {0}")]
    RequestError(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Rate limit exceeded")]
    RateLimited,
    #[error("Authentication failed")]
    AuthenticationFailed,
    #[error("Parse error: {0}")]
    ParseError(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GoogleEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default)]
    pub start: GoogleDateTime,
    #[serde(default)]
    pub end: GoogleDateTime,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GoogleDateTime {
    #[serde(rename = "dateTime", default, skip_serializing_if = "Option::is_none")]
    pub date_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EventListResponse {
    items: Option<Vec<GoogleEvent>>,
    #[serde(rename = "nextPageToken")]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CalendarListResponse {
    items: Option<Vec<CalendarEntry>>,
}

impl GoogleEvent {
    pub fn from_event(event: &Event) -> Self {
        Self {
            id: None,
            summary: Some(event.title.clone()),
            start: GoogleDateTime {
                date_time: Some(format_wire_datetime(&event.start)),
                date: None,
            },
            end: GoogleDateTime {
                date_time: Some(format_wire_datetime(&event.end)),
                date: None,
            },
        }
    }

    /// Converts a provider event. All-day boundaries (date only) become
    /// local midnight at `all_day_offset`.
    pub fn into_event(self, all_day_offset: FixedOffset) -> Result<Event, CalendarError> {
        let start = parse_boundary("start", &self.start, all_day_offset)?;
        let end = parse_boundary("end", &self.end, all_day_offset)?;

        Ok(Event {
            title: self.summary.unwrap_or_default(),
            start,
            end,
        })
    }
}

fn parse_boundary(
    field: &'static str,
    value: &GoogleDateTime,
    all_day_offset: FixedOffset,
) -> Result<DateTime<FixedOffset>, CalendarError> {
    let invalid = |raw: &str| CalendarError::EventTime {
        field,
        value: raw.to_string(),
    };

    if let Some(raw) = value.date_time.as_deref() {
        return DateTime::parse_from_rfc3339(raw).map_err(|_| invalid(raw));
    }

    if let Some(raw) = value.date.as_deref() {
        let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| invalid(raw))?;
        return all_day_offset
            .from_local_datetime(&date.and_time(NaiveTime::MIN))
            .single()
            .ok_or_else(|| invalid(raw));
    }

    Err(invalid(""))
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CalendarApi: Send + Sync {
    async fn list_calendars(&self) -> Result<Vec<CalendarEntry>, ApiError>;

    async fn fetch_events(
        &self,
        calendar_id: &str,
        window: &DayWindow,
    ) -> Result<Vec<GoogleEvent>, ApiError>;

    async fn insert_event(
        &self,
        calendar_id: &str,
        event: &GoogleEvent,
    ) -> Result<GoogleEvent, ApiError>;
}

#[derive(Debug, Clone)]
pub struct GoogleCalendarClient {
    base_url: String,
    access_token: String,
    client: reqwest::Client,
}

impl GoogleCalendarClient {
    pub fn new(access_token: String) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            access_token,
            client: reqwest::Client::new(),
        }
    }

    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    fn events_url(&self, calendar_id: &str) -> String {
        format!(
            "{}/calendars/{}/events",
            self.base_url,
            urlencoding::encode(calendar_id)
        )
    }
}

async fn check_status(
    response: reqwest::Response,
    action: &str,
    resource: &str,
) -> Result<reqwest::Response, ApiError> {
    let status = response.status();
    tracing::info!("{} response status: {}", action, status);

    if status.is_success() {
        return Ok(response);
    }

    if status == 401 {
        tracing::error!("Authentication failed when trying to {}", action.to_lowercase());
        return Err(ApiError::AuthenticationFailed);
    }

    if status == 404 {
        tracing::error!("Not found: {}", resource);
        return Err(ApiError::NotFound(resource.to_string()));
    }

    if status == 429 {
        tracing::warn!("Rate limit exceeded");
        return Err(ApiError::RateLimited);
    }

    let body = response.text().await?;
    tracing::error!("Failed to {}. Status: {}, Body: {}", action.to_lowercase(), status, body);
    Err(ApiError::RequestError(format!("Status {}: {}", status, body)))
}

#[async_trait]
impl CalendarApi for GoogleCalendarClient {
    async fn list_calendars(&self) -> Result<Vec<CalendarEntry>, ApiError> {
        let url = format!("{}/users/me/calendarList", self.base_url);

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.access_token)
            .query(&[("fields", CALENDAR_LIST_FIELDS)])
            .send()
            .await?;

        let response = check_status(response, "List calendars", "calendarList").await?;
        let list: CalendarListResponse = response
            .json()
            .await
            .map_err(|e| ApiError::ParseError(format!("Invalid calendar list: {}", e)))?;

        let calendars = list.items.unwrap_or_default();
        tracing::info!("Listed {} calendars", calendars.len());
        Ok(calendars)
    }

    async fn fetch_events(
        &self,
        calendar_id: &str,
        window: &DayWindow,
    ) -> Result<Vec<GoogleEvent>, ApiError> {
        let time_min = window.time_min();
        let time_max = window.time_max();

        tracing::info!("Fetching events from {} to {}", time_min, time_max);

        let response = self
            .client
            .get(self.events_url(calendar_id))
            .bearer_auth(&self.access_token)
            .query(&[
                ("timeMin", time_min.as_str()),
                ("timeMax", time_max.as_str()),
                ("fields", EVENT_LIST_FIELDS),
            ])
            .send()
            .await?;

        let response = check_status(response, "Fetch events", calendar_id).await?;
        let event_list: EventListResponse = response
            .json()
            .await
            .map_err(|e| ApiError::ParseError(format!("Invalid event list: {}", e)))?;

        if event_list.next_page_token.is_some() {
            tracing::warn!("Event list for {} has more pages; only the first is returned", calendar_id);
        }

        let events = event_list.items.unwrap_or_default();
        tracing::info!("Fetched {} events successfully", events.len());
        Ok(events)
    }

    async fn insert_event(
        &self,
        calendar_id: &str,
        event: &GoogleEvent,
    ) -> Result<GoogleEvent, ApiError> {
        let url = self.events_url(calendar_id);

        tracing::info!("Creating event: {:?}", event.summary);
        tracing::debug!("POST {} with payload: {:?}", url, event);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.access_token)
            .json(event)
            .send()
            .await?;

        let response = check_status(response, "Create event", calendar_id).await?;
        let created: GoogleEvent = response
            .json()
            .await
            .map_err(|e| ApiError::ParseError(format!("Invalid created event: {}", e)))?;

        tracing::info!("Event created successfully with ID: {:?}", created.id);
        Ok(created)
    }
}
