//! Events Lambda - Offline calendar events with optional email notification.
//!
//! Endpoints (also served under the `/api` stage prefix):
//! - GET /events/ - List events
//! - POST /events/ - Create an event
//! - POST /events/{id}/send_email - Send the notification email again
//! - DELETE /events/{id} - Delete an event

use chrono::{DateTime, NaiveDateTime, Utc};
use lambda_http::{run, service_fn, Body, Error, Request, RequestExt, Response};
use serde::{Deserialize, Deserializer};
use shared::events::DEFAULT_PAGE_SIZE;
use shared::http::{empty_response, error_response, json_response, parse_json_body, strip_stage};
use shared::{
    BackgroundTasks, Config, Event, EventFilter, EventStore, HeaderIdentity, IdentityResolver,
    NewEvent, Notifier, PgEventStore, SmtpNotifier,
};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use validator::Validate;

/// Create event request
#[derive(Debug, Deserialize, Validate)]
struct CreateEventRequest {
    #[validate(length(min = 1, message = "title must not be empty"))]
    title: String,
    description: Option<String>,
    #[serde(deserialize_with = "deserialize_timestamp")]
    start_time: DateTime<Utc>,
    #[serde(default, deserialize_with = "deserialize_optional_timestamp")]
    end_time: Option<DateTime<Utc>>,
    location: Option<String>,
    #[validate(email(message = "notify_email must be an email address"))]
    notify_email: Option<String>,
}

impl CreateEventRequest {
    /// Trim text fields and turn blank optionals into `None`.
    fn normalize(&mut self) {
        fn blank_to_none(value: &mut Option<String>) {
            *value = value
                .take()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty());
        }

        self.title = self.title.trim().to_string();
        blank_to_none(&mut self.description);
        blank_to_none(&mut self.location);
        blank_to_none(&mut self.notify_email);
    }

    fn into_new_event(self, user_id: Option<i64>) -> NewEvent {
        NewEvent {
            user_id,
            title: self.title,
            description: self.description,
            start_time: self.start_time,
            end_time: self.end_time,
            location: self.location,
            notify_email: self.notify_email,
        }
    }
}

/// List query parameters
#[derive(Debug, Validate)]
struct ListEventsQuery {
    #[validate(range(min = 1, max = 100, message = "limit must be between 1 and 100"))]
    limit: i64,
    from_time: Option<DateTime<Utc>>,
    to_time: Option<DateTime<Utc>>,
}

impl ListEventsQuery {
    fn from_request(event: &Request) -> shared::Result<Self> {
        let params = event.query_string_parameters();

        let limit = match params.first("limit") {
            Some(raw) => raw
                .trim()
                .parse()
                .map_err(|_| shared::Error::Validation("limit must be an integer".to_string()))?,
            None => DEFAULT_PAGE_SIZE,
        };

        let query = Self {
            limit,
            from_time: query_timestamp(params.first("from_time"), "from_time")?,
            to_time: query_timestamp(params.first("to_time"), "to_time")?,
        };
        query.validate().map_err(validation_error)?;
        Ok(query)
    }
}

/// Accepts RFC 3339, or a naive ISO 8601 timestamp taken as UTC.
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
                .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M"))
                .ok()
                .map(|naive| naive.and_utc())
        })
}

fn query_timestamp(raw: Option<&str>, name: &str) -> shared::Result<Option<DateTime<Utc>>> {
    match raw.map(str::trim).filter(|v| !v.is_empty()) {
        Some(value) => parse_timestamp(value).map(Some).ok_or_else(|| {
            shared::Error::Validation(format!("{} is not a valid datetime: {}", name, value))
        }),
        None => Ok(None),
    }
}

fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_timestamp(&raw)
        .ok_or_else(|| serde::de::Error::custom(format!("invalid datetime: {}", raw)))
}

fn deserialize_optional_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<String>::deserialize(deserializer)? {
        Some(raw) if !raw.trim().is_empty() => parse_timestamp(&raw)
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid datetime: {}", raw))),
        _ => Ok(None),
    }
}

fn validation_error(errors: validator::ValidationErrors) -> shared::Error {
    shared::Error::Validation(errors.to_string())
}

fn parse_event_id(raw: &str) -> shared::Result<i64> {
    raw.parse()
        .map_err(|_| shared::Error::Validation(format!("Invalid event ID: {}", raw)))
}

/// Application state
struct AppState {
    store: Arc<dyn EventStore>,
    identity: Arc<dyn IdentityResolver>,
    notifier: Arc<dyn Notifier>,
}

impl AppState {
    async fn new() -> Result<Self, Error> {
        let config = Config::from_env();
        let db_pool = shared::db::create_pool(&config).await?;

        Ok(Self {
            store: Arc::new(PgEventStore::new(db_pool)),
            identity: Arc::new(HeaderIdentity::header()),
            notifier: Arc::new(SmtpNotifier::from_env()),
        })
    }
}

async fn list_events(
    state: &AppState,
    event: &Request,
    caller: Option<i64>,
) -> shared::Result<Response<Body>> {
    let query = ListEventsQuery::from_request(event)?;

    let filter = EventFilter {
        user_id: caller,
        from_time: query.from_time,
        to_time: query.to_time,
        limit: query.limit,
    };

    if filter.is_empty_window() {
        return json_response(200, &Vec::<Event>::new());
    }

    let events = state.store.list(&filter).await?;
    json_response(200, &events)
}

async fn create_event(
    state: &AppState,
    event: &Request,
    caller: Option<i64>,
    tasks: &mut BackgroundTasks,
) -> shared::Result<Response<Body>> {
    let mut request: CreateEventRequest = parse_json_body(event.body())?;
    request.normalize();
    request.validate().map_err(validation_error)?;

    let created = state.store.insert(request.into_new_event(caller)).await?;
    info!(event_id = created.id, user_id = ?created.user_id, "Event created");

    if created.notify_address().is_some() {
        tasks.notify(created.clone());
    }

    json_response(200, &created)
}

async fn send_event_email(
    state: &AppState,
    event_id: i64,
    caller: Option<i64>,
    tasks: &mut BackgroundTasks,
) -> shared::Result<Response<Body>> {
    let event = state
        .store
        .get(event_id)
        .await?
        .ok_or_else(|| shared::Error::NotFound("Event not found".to_string()))?;

    if !event.accessible_by(caller) {
        return Err(shared::Error::Forbidden("Not allowed".to_string()));
    }

    if event.notify_address().is_none() {
        return Err(shared::Error::BadRequest(
            "Event has no notify_email set".to_string(),
        ));
    }

    tasks.notify(event.clone());
    json_response(200, &event)
}

async fn delete_event(
    state: &AppState,
    event_id: i64,
    caller: Option<i64>,
) -> shared::Result<Response<Body>> {
    let event = state
        .store
        .get(event_id)
        .await?
        .ok_or_else(|| shared::Error::NotFound("Event not found".to_string()))?;

    if !event.accessible_by(caller) {
        return Err(shared::Error::Forbidden("Not allowed".to_string()));
    }

    if !state.store.delete(event_id).await? {
        return Err(shared::Error::NotFound("Event not found".to_string()));
    }

    info!(event_id, "Event deleted");
    empty_response(204)
}

async fn route(
    state: &AppState,
    event: &Request,
    tasks: &mut BackgroundTasks,
) -> shared::Result<Response<Body>> {
    let method = event.method().as_str();
    let path = strip_stage(event.uri().path());

    info!("Events request: {} {}", method, path);

    let caller = state.identity.caller_id(event.headers());
    let segments: Vec<&str> = path.trim_matches('/').split('/').collect();

    match (method, segments.as_slice()) {
        ("GET", ["events"]) => list_events(state, event, caller).await,
        ("POST", ["events"]) => create_event(state, event, caller, tasks).await,
        ("POST", ["events", id, "send_email"]) => {
            send_event_email(state, parse_event_id(id)?, caller, tasks).await
        }
        ("DELETE", ["events", id]) => delete_event(state, parse_event_id(id)?, caller).await,
        _ => Err(shared::Error::NotFound("Not found".to_string())),
    }
}

async fn handler(state: Arc<AppState>, event: Request) -> Result<Response<Body>, Error> {
    let mut tasks = BackgroundTasks::new();

    let response = match route(&state, &event, &mut tasks).await {
        Ok(response) => response,
        Err(e) => {
            if e.is_client_error() {
                warn!(status = e.status_code(), error = %e, "Events request rejected");
            } else {
                error!(status = e.status_code(), error = %e, "Events request failed");
            }
            error_response(&e)
        }
    };

    // Emails go out only once the response exists.
    tasks.spawn(Arc::clone(&state.notifier));

    Ok(response)
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .init();

    let state = Arc::new(AppState::new().await?);

    run(service_fn(move |event| {
        let state = Arc::clone(&state);
        async move { handler(state, event).await }
    }))
    .await
}
