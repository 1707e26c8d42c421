//! Shared library for Summariser Lambda functions.
//!
//! This crate provides the stores, clients and HTTP helpers used by the
//! `events` and `google_drive` Lambda functions.

pub mod config;
pub mod db;
pub mod drive;
pub mod error;
pub mod events;
pub mod http;
pub mod identity;
pub mod mail;
pub mod meetings;
pub mod secrets;
pub mod tasks;

pub use config::Config;
pub use drive::{DownloadMethod, DriveClient, DriveFile};
pub use error::{Error, Result};
pub use events::{Event, EventFilter, EventStore, MemoryEventStore, NewEvent, PgEventStore};
pub use identity::{HeaderIdentity, IdentityResolver, PgUserStore, User, UserStore};
pub use mail::{Notifier, SmtpConfig, SmtpNotifier};
pub use meetings::MeetingsClient;
pub use tasks::BackgroundTasks;
