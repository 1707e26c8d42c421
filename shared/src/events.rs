//! Calendar event persistence.
//!
//! Handlers talk to an [`EventStore`]; production uses [`PgEventStore`], tests
//! and local runs can use [`MemoryEventStore`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

use crate::Result;

pub const DEFAULT_PAGE_SIZE: i64 = 10;

/// A persisted calendar entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Event {
    pub id: i64,
    pub user_id: Option<i64>,
    pub title: String,
    pub description: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub location: Option<String>,
    pub notify_email: Option<String>,
}

impl Event {
    /// The notification address, if one is set and not blank.
    pub fn notify_address(&self) -> Option<&str> {
        self.notify_email
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty())
    }

    /// Ownership is advisory: ownerless events and anonymous callers pass.
    pub fn accessible_by(&self, caller: Option<i64>) -> bool {
        match (caller, self.user_id) {
            (Some(caller), Some(owner)) => caller == owner,
            _ => true,
        }
    }
}

/// Fields for a new event; the id is assigned by the store.
#[derive(Debug, Clone)]
pub struct NewEvent {
    pub user_id: Option<i64>,
    pub title: String,
    pub description: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub location: Option<String>,
    pub notify_email: Option<String>,
}

impl NewEvent {
    fn into_event(self, id: i64) -> Event {
        Event {
            id,
            user_id: self.user_id,
            title: self.title,
            description: self.description,
            start_time: self.start_time,
            end_time: self.end_time,
            location: self.location,
            notify_email: self.notify_email,
        }
    }
}

/// Listing filter. Bounds are inclusive on `start_time`.
#[derive(Debug, Clone)]
pub struct EventFilter {
    pub user_id: Option<i64>,
    pub from_time: Option<DateTime<Utc>>,
    pub to_time: Option<DateTime<Utc>>,
    pub limit: i64,
}

impl Default for EventFilter {
    fn default() -> Self {
        Self {
            user_id: None,
            from_time: None,
            to_time: None,
            limit: DEFAULT_PAGE_SIZE,
        }
    }
}

impl EventFilter {
    /// True when the time window cannot contain any event.
    pub fn is_empty_window(&self) -> bool {
        matches!((self.from_time, self.to_time), (Some(from), Some(to)) if from > to)
    }

    fn matches(&self, event: &Event) -> bool {
        self.user_id.map_or(true, |id| event.user_id == Some(id))
            && self.from_time.map_or(true, |from| event.start_time >= from)
            && self.to_time.map_or(true, |to| event.start_time <= to)
    }
}

#[async_trait]
pub trait EventStore: Send + Sync {
    /// Events matching the filter, ordered by ascending start time.
    async fn list(&self, filter: &EventFilter) -> Result<Vec<Event>>;

    async fn insert(&self, event: NewEvent) -> Result<Event>;

    async fn get(&self, id: i64) -> Result<Option<Event>>;

    /// Returns false when nothing was deleted.
    async fn delete(&self, id: i64) -> Result<bool>;
}

const EVENT_COLUMNS: &str =
    "id, user_id, title, description, start_time, end_time, location, notify_email";

/// Postgres-backed store over the `events` table.
#[derive(Clone)]
pub struct PgEventStore {
    pool: PgPool,
}

impl PgEventStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EventStore for PgEventStore {
    async fn list(&self, filter: &EventFilter) -> Result<Vec<Event>> {
        let mut query = format!("SELECT {} FROM events WHERE TRUE", EVENT_COLUMNS);
        let mut param_num = 1;

        if filter.user_id.is_some() {
            query.push_str(&format!(" AND user_id = ${}", param_num));
            param_num += 1;
        }
        if filter.from_time.is_some() {
            query.push_str(&format!(" AND start_time >= ${}", param_num));
            param_num += 1;
        }
        if filter.to_time.is_some() {
            query.push_str(&format!(" AND start_time <= ${}", param_num));
            param_num += 1;
        }
        query.push_str(&format!(" ORDER BY start_time ASC LIMIT ${}", param_num));

        let mut query_builder = sqlx::query_as::<_, Event>(&query);
        if let Some(user_id) = filter.user_id {
            query_builder = query_builder.bind(user_id);
        }
        if let Some(from_time) = filter.from_time {
            query_builder = query_builder.bind(from_time);
        }
        if let Some(to_time) = filter.to_time {
            query_builder = query_builder.bind(to_time);
        }

        let events = query_builder
            .bind(filter.limit)
            .fetch_all(&self.pool)
            .await?;

        Ok(events)
    }

    async fn insert(&self, event: NewEvent) -> Result<Event> {
        let query = format!(
            r#"
            INSERT INTO events (
                user_id, title, description, start_time,
                end_time, location, notify_email
            ) VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {}
            "#,
            EVENT_COLUMNS
        );

        let created = sqlx::query_as::<_, Event>(&query)
            .bind(event.user_id)
            .bind(&event.title)
            .bind(&event.description)
            .bind(event.start_time)
            .bind(event.end_time)
            .bind(&event.location)
            .bind(&event.notify_email)
            .fetch_one(&self.pool)
            .await?;

        Ok(created)
    }

    async fn get(&self, id: i64) -> Result<Option<Event>> {
        let query = format!("SELECT {} FROM events WHERE id = $1", EVENT_COLUMNS);

        let event = sqlx::query_as::<_, Event>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(event)
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM events WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

/// In-process store with sequential ids.
#[derive(Default)]
pub struct MemoryEventStore {
    inner: RwLock<MemoryState>,
}

#[derive(Default)]
struct MemoryState {
    next_id: i64,
    events: BTreeMap<i64, Event>,
}

impl MemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EventStore for MemoryEventStore {
    async fn list(&self, filter: &EventFilter) -> Result<Vec<Event>> {
        let state = self.inner.read().await;
        let mut events: Vec<Event> = state
            .events
            .values()
            .filter(|e| filter.matches(e))
            .cloned()
            .collect();

        // stable sort keeps insertion order for equal start times
        events.sort_by_key(|e| e.start_time);
        events.truncate(filter.limit.max(0) as usize);
        Ok(events)
    }

    async fn insert(&self, event: NewEvent) -> Result<Event> {
        let mut state = self.inner.write().await;
        state.next_id += 1;
        let event = event.into_event(state.next_id);
        state.events.insert(event.id, event.clone());
        Ok(event)
    }

    async fn get(&self, id: i64) -> Result<Option<Event>> {
        Ok(self.inner.read().await.events.get(&id).cloned())
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        Ok(self.inner.write().await.events.remove(&id).is_some())
    }
}
