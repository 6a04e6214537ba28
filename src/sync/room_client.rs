use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::calendar::{CalendarEntry, DuplicatePolicy, Event, RoomCalendar};
use crate::error::{CalendarError, Result};
use crate::storage::config::{Config, ConfigError};
use crate::sync::clock::{Clock, DayWindow, SystemClock};
use crate::sync::context::RequestContext;
use crate::sync::google_api::{CalendarApi, DEFAULT_BASE_URL, GoogleCalendarClient, GoogleEvent};
use crate::sync::google_auth::{
    CALENDAR_SCOPE, GoogleAuthenticator, ServiceAccountKey, ServiceAccountSigner, TokenCache, TokenInfo, TokenOwner,
};

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// An authenticated handle to the provider API, bound to one access token.
pub type CalendarSession = GoogleCalendarClient;

fn http_client(timeout: Duration) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder().timeout(timeout).build()
}

/// Calendar of a single room, addressed by its display name.
///
/// Every operation authenticates from the credential file, resolves the
/// room name to a calendar ID and then talks to the events endpoint. No
/// state is kept between calls unless a token cache is configured, so one
/// client can serve concurrent operations.
#[derive(Debug, Clone)]
pub struct RoomCalendarClient {
    room_id: String,
    credentials_path: PathBuf,
    user_email: Option<String>,
    base_url: String,
    duplicate_policy: DuplicatePolicy,
    http: reqwest::Client,
    clock: Arc<dyn Clock>,
    token_cache: Option<Arc<TokenCache>>,
}

impl RoomCalendarClient {
    pub fn new(room_id: impl Into<String>, credentials_path: impl Into<PathBuf>) -> Self {
        // Building only fails if the TLS backend can't initialise. The
        // fallback client then has no request timeout.
        let http = http_client(DEFAULT_REQUEST_TIMEOUT).unwrap_or_else(|e| {
            tracing::warn!("Falling back to HTTP client without timeout: {}", e);
            reqwest::Client::default()
        });

        Self {
            room_id: room_id.into(),
            credentials_path: credentials_path.into(),
            user_email: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            duplicate_policy: DuplicatePolicy::default(),
            http,
            clock: Arc::new(SystemClock),
            token_cache: None,
        }
    }

    pub fn from_config(config: &Config) -> std::result::Result<Self, ConfigError> {
        config.validate()?;

        let http = http_client(Duration::from_secs(config.google.request_timeout_seconds))
            .map_err(|e| ConfigError::Invalid(format!("cannot build HTTP client: {}", e)))?;

        let mut client = Self::new(&config.room.room_id, &config.google.credentials_path)
            .with_user_email(config.google.user_email.clone())
            .with_base_url(&config.google.api_base_url)
            .with_duplicate_policy(config.room.duplicate_policy)
            .with_http_client(http);

        if config.google.token_cache_seconds > 0 {
            client = client.with_token_cache(config.google.token_cache_seconds);
        }

        Ok(client)
    }

    /// Impersonation subject for domain-wide delegation. Empty is treated
    /// as unset.
    pub fn with_user_email(mut self, user_email: Option<String>) -> Self {
        self.user_email = user_email.filter(|email| !email.is_empty());
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_duplicate_policy(mut self, policy: DuplicatePolicy) -> Self {
        self.duplicate_policy = policy;
        self
    }

    pub fn with_http_client(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_token_cache(mut self, max_age_seconds: u64) -> Self {
        self.token_cache = Some(Arc::new(TokenCache::new(max_age_seconds)));
        self
    }

    pub fn room_id(&self) -> &str {
        &self.room_id
    }

    pub fn credentials_path(&self) -> &Path {
        &self.credentials_path
    }

    pub fn user_email(&self) -> Option<&str> {
        self.user_email.as_deref()
    }

    pub async fn authenticate(&self, ctx: &RequestContext) -> Result<CalendarSession> {
        ctx.check()?;

        let owner = TokenOwner::new(&self.credentials_path, self.user_email.clone());
        if let Some(token) = self.token_cache.as_ref().and_then(|cache| cache.get(&owner)) {
            tracing::debug!("Reusing cached access token for room {}", self.room_id);
            return Ok(self.session(token));
        }

        let key = ServiceAccountKey::read(&self.credentials_path).await?;
        let signer = ServiceAccountSigner::new(key, CALENDAR_SCOPE)?.with_subject(self.user_email.clone());
        let authenticator = GoogleAuthenticator::new(self.http.clone());

        let token = ctx
            .run(async { authenticator.exchange(&signer).await.map_err(CalendarError::from) })
            .await?;

        if let Some(cache) = &self.token_cache {
            cache.store(owner, token.clone());
        }

        Ok(self.session(token))
    }

    fn session(&self, token: TokenInfo) -> CalendarSession {
        GoogleCalendarClient::new(token.access_token)
            .with_base_url(self.base_url.clone())
            .with_http_client(self.http.clone())
    }

    /// Drops the session's token from the cache once the provider has
    /// refused it, so the next call mints a new one.
    fn forget_rejected_token<T>(&self, session: &CalendarSession, result: &Result<T>) {
        let Some(cache) = &self.token_cache else {
            return;
        };
        let rejected = result.as_ref().err().is_some_and(CalendarError::is_token_rejected);
        if rejected && cache.discard(session.access_token()) {
            tracing::debug!("Discarded rejected access token for room {}", self.room_id);
        }
    }

    pub async fn resolve_calendar_id<A>(&self, ctx: &RequestContext, api: &A) -> Result<String>
    where
        A: CalendarApi + ?Sized,
    {
        let calendars = ctx
            .run(async { api.list_calendars().await.map_err(CalendarError::CalendarList) })
            .await?;

        select_calendar(&calendars, &self.room_id, self.duplicate_policy)
    }

    /// Events on the room's calendar between local 00:00:00 and 23:59:59
    /// of the current day, in provider order.
    pub async fn get_events(&self, ctx: &RequestContext) -> Result<Vec<Event>> {
        ctx.check()?;

        let session = self.authenticate(ctx).await?;
        let result: Result<Vec<Event>> = async {
            let calendar_id = self.resolve_calendar_id(ctx, &session).await?;
            let window = self.clock.today();
            self.list_events_in(ctx, &session, &calendar_id, &window).await
        }
        .await;

        self.forget_rejected_token(&session, &result);
        result
    }

    async fn list_events_in<A>(
        &self,
        ctx: &RequestContext,
        api: &A,
        calendar_id: &str,
        window: &DayWindow,
    ) -> Result<Vec<Event>>
    where
        A: CalendarApi + ?Sized,
    {
        let items = ctx
            .run(async { api.fetch_events(calendar_id, window).await.map_err(CalendarError::Fetch) })
            .await?;

        items
            .into_iter()
            .map(|item| item.into_event(window.offset()))
            .collect()
    }

    /// Inserts `event` as given. Times are not validated and overlapping
    /// bookings are not detected.
    pub async fn create_event(&self, ctx: &RequestContext, event: &Event) -> Result<()> {
        ctx.check()?;

        let session = self.authenticate(ctx).await?;
        let result: Result<GoogleEvent> = async {
            let calendar_id = self.resolve_calendar_id(ctx, &session).await?;
            let wire = GoogleEvent::from_event(event);

            ctx.run(async {
                session
                    .insert_event(&calendar_id, &wire)
                    .await
                    .map_err(CalendarError::Create)
            })
            .await
        }
        .await;

        self.forget_rejected_token(&session, &result);
        result?;

        tracing::info!("Created event {:?} for room {}", event.title, self.room_id);
        Ok(())
    }
}

fn select_calendar(calendars: &[CalendarEntry], room_id: &str, policy: DuplicatePolicy) -> Result<String> {
    let mut matches = calendars.iter().filter(|calendar| calendar.name == room_id);

    let first = matches.next().ok_or_else(|| {
        tracing::warn!("Room {} does not have an assigned calendar", room_id);
        CalendarError::RoomNotFound {
            room_id: room_id.to_string(),
        }
    })?;

    let others = matches.count();
    if others > 0 {
        match policy {
            DuplicatePolicy::FirstMatch => {
                tracing::warn!(
                    "Room {} matches {} calendars; using {}",
                    room_id,
                    others + 1,
                    first.id
                );
            }
            DuplicatePolicy::Reject => {
                return Err(CalendarError::AmbiguousRoom {
                    room_id: room_id.to_string(),
                    matches: others + 1,
                });
            }
        }
    }

    Ok(first.id.clone())
}

#[async_trait]
impl RoomCalendar for RoomCalendarClient {
    async fn get_events(&self, ctx: &RequestContext) -> Result<Vec<Event>> {
        RoomCalendarClient::get_events(self, ctx).await
    }

    async fn create_event(&self, ctx: &RequestContext, event: &Event) -> Result<()> {
        RoomCalendarClient::create_event(self, ctx, event).await
    }
}
