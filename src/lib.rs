//! Memoir
//!
//! Personal photo-journal web service. Uploaded images land in an
//! S3-compatible bucket (R2/MinIO/S3) and are referenced from PostgreSQL,
//! organized into two collections: a chronological "memory film" stream and
//! a year-tagged birthday album with derived age/label display. The home
//! endpoint aggregates both into navigable bookmark tiles.
//!
//! ## Architecture
//!
//! ```text
//! HTTP (axum)                Object storage             PostgreSQL
//! ┌──────────────┐           ┌──────────────┐          ┌─────────────────┐
//! │ /upload/     │           │ {uuid}.{ext} │          │ photos          │
//! │ /memory/     │──────────▶│  (≤1024 px   │          │ birthday_photos │
//! │ /birthday/…  │           │   thumbnail) │          └─────────────────┘
//! └──────────────┘           └──────────────┘                 ▲
//!        │                          ▲                         │
//!        ▼                          │                         │
//! ┌──────────────┐           ┌──────────────┐          ┌──────────────┐
//! │ Photo /      │──────────▶│ Object       │          │ Record       │
//! │ Birthday     │           │ Storage      │          │ Store        │
//! │ Services     │───────────┴──────────────┴─────────▶│ (sqlx)       │
//! └──────────────┘                                     └──────────────┘
//! ```
//!
//! Uploads get a best-effort thumbnail and a presigned 7-day retrieval URL.
//! Record deletion always proceeds even when the backing object delete
//! fails; that policy keeps the record store authoritative.

pub mod birthday_service;
pub mod bookmarks;
pub mod config;
pub mod error;
pub mod object_storage;
pub mod photo_service;
pub mod record_store;
pub mod web;

pub use birthday_service::{BirthdayService, BirthdayStats};
pub use bookmarks::{enabled_only, list_bookmarks, Bookmark};
pub use config::Config;
pub use error::ServiceError;
pub use object_storage::{is_allowed_extension, ObjectStorage, ObjectStore, StoredObject};
pub use photo_service::PhotoService;
pub use record_store::{BirthdayRecord, PhotoRecord, RecordStore};
pub use web::AppState;
