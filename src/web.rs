use crate::birthday_service::{BirthdayService, BirthdayStats};
use crate::bookmarks::{self, Bookmark};
use crate::config::HttpConfig;
use crate::error::ServiceError;
use crate::photo_service::PhotoService;
use crate::record_store::{BirthdayRecord, PhotoRecord, RecordStore};
use anyhow::{Context, Result};
use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, instrument};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub photos: PhotoService,
    pub birthdays: BirthdayService,
    pub store: RecordStore,
}

/// Generic error body for 404/500 responses
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Handler-level failure: logged with detail, surfaced as a generic 500.
/// No internal detail leaks to the client.
pub struct AppError(ServiceError);

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        AppError(err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        error!(error = %self.0, "Unhandled error in request handler");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                error: "Internal Server Error".to_string(),
            }),
        )
            .into_response()
    }
}

/// User-visible message attached to a mutating request's outcome
#[derive(Debug, Clone, Serialize)]
pub struct FlashMessage {
    /// success, warning or error
    pub level: String,
    pub text: String,
}

impl FlashMessage {
    fn success(text: impl Into<String>) -> Self {
        Self {
            level: "success".to_string(),
            text: text.into(),
        }
    }

    fn warning(text: impl Into<String>) -> Self {
        Self {
            level: "warning".to_string(),
            text: text.into(),
        }
    }

    fn error(text: impl Into<String>) -> Self {
        Self {
            level: "error".to_string(),
            text: text.into(),
        }
    }
}

/// Outcome of a batch upload or a delete, returned alongside the redirect.
/// Per-item errors never abort the rest of the batch.
#[derive(Debug, Serialize)]
pub struct MutationOutcome {
    pub uploaded: usize,
    pub messages: Vec<FlashMessage>,
}

/// 303 See Other with an outcome body: browsers follow the redirect, API
/// clients can read the per-item messages
fn see_other(location: &str, outcome: MutationOutcome) -> Response {
    (
        StatusCode::SEE_OTHER,
        [(header::LOCATION, location.to_string())],
        Json(outcome),
    )
        .into_response()
}

/// Home page view: navigable bookmark tiles
#[derive(Debug, Serialize)]
pub struct HomeView {
    pub bookmarks: Vec<Bookmark>,
}

/// Memory film view: all photos oldest first
#[derive(Debug, Serialize)]
pub struct MemoryView {
    pub photos: Vec<PhotoRecord>,
}

/// Birthday photo with its derived display attributes
#[derive(Debug, Serialize)]
pub struct BirthdayPhotoView {
    pub id: i64,
    pub url: String,
    pub birthday_year: i32,
    pub birthday_date: String,
    pub description: Option<String>,
    pub uploaded_at: DateTime<Utc>,
    pub age: Option<i32>,
    pub age_label: Option<String>,
    pub display_label: String,
}

impl BirthdayPhotoView {
    fn from_record(record: BirthdayRecord, birthdays: &BirthdayService) -> Self {
        let age = birthdays.age_for(&record);
        let age_label = birthdays.age_label(&record);
        let display_label = birthdays.display_label(&record);
        Self {
            id: record.id,
            url: record.url,
            birthday_year: record.birthday_year,
            birthday_date: record.birthday_date,
            description: record.description,
            uploaded_at: record.uploaded_at,
            age,
            age_label,
            display_label,
        }
    }
}

/// Birthday album view: photos, year filter state and stats
#[derive(Debug, Serialize)]
pub struct BirthdayAlbumView {
    pub photos: Vec<BirthdayPhotoView>,
    pub years: Vec<i32>,
    pub selected_year: Option<i32>,
    pub stats: BirthdayStats,
}

/// One file pulled out of a multipart request
struct UploadedFile {
    filename: String,
    data: Vec<u8>,
}

/// Text fields accepted alongside birthday uploads
#[derive(Default)]
struct UploadForm {
    files: Vec<UploadedFile>,
    birthday_year: Option<i32>,
    birthday_date: Option<String>,
    description: Option<String>,
}

/// Drain a multipart body into files and known text fields
async fn read_upload_form(mut multipart: Multipart) -> UploadForm {
    let mut form = UploadForm::default();

    while let Ok(Some(field)) = multipart.next_field().await {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "photos" => {
                let filename = match field.file_name() {
                    Some(filename) if !filename.is_empty() => filename.to_string(),
                    _ => continue,
                };
                match field.bytes().await {
                    Ok(bytes) => form.files.push(UploadedFile {
                        filename,
                        data: bytes.to_vec(),
                    }),
                    Err(e) => {
                        error!(error = %e, filename = %filename, "Failed to read multipart field");
                    }
                }
            }
            "birthday_year" => {
                if let Ok(text) = field.text().await {
                    form.birthday_year = text.trim().parse().ok();
                }
            }
            "birthday_date" => {
                if let Ok(text) = field.text().await {
                    let text = text.trim().to_string();
                    if !text.is_empty() {
                        form.birthday_date = Some(text);
                    }
                }
            }
            "description" => {
                if let Ok(text) = field.text().await {
                    let text = text.trim().to_string();
                    if !text.is_empty() {
                        form.description = Some(text);
                    }
                }
            }
            _ => {}
        }
    }

    form
}

/// Create the application router
pub fn create_router(state: AppState, config: &HttpConfig) -> Router {
    let cors = if config.cors_enabled {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        CorsLayer::new()
    };

    Router::new()
        .route("/", get(home))
        .route("/memory/", get(memory_index))
        .route("/birthday/", get(birthday_index))
        .route("/birthday/year/:year", get(birthday_year_view))
        .route("/birthday/api/stats", get(birthday_stats_api))
        .route("/upload/", post(upload_photos))
        .route("/birthday/upload", post(upload_birthday_photos))
        .route("/delete/:id", post(delete_photo))
        .route("/birthday/delete/:id", post(delete_birthday_photo))
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .fallback(not_found)
        .layer(DefaultBodyLimit::max(config.body_limit_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn not_found() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse {
            error: "Not Found".to_string(),
        }),
    )
}

/// Health check endpoint
async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "memoir"
    }))
}

/// Readiness check endpoint
async fn readiness_check(State(state): State<AppState>) -> impl IntoResponse {
    match sqlx::query("SELECT 1").fetch_one(state.store.pool()).await {
        Ok(_) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "status": "ready",
                "database": "connected"
            })),
        ),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({
                "status": "not_ready",
                "database": "disconnected",
                "error": e.to_string()
            })),
        ),
    }
}

/// Home page: bookmark tiles for navigation
#[instrument(skip(state))]
async fn home(State(state): State<AppState>) -> Result<Json<HomeView>, AppError> {
    let bookmarks = bookmarks::list_bookmarks(&state.photos, &state.birthdays).await?;
    Ok(Json(HomeView {
        bookmarks: bookmarks::enabled_only(bookmarks),
    }))
}

/// Memory film: chronological photo list
#[instrument(skip(state))]
async fn memory_index(State(state): State<AppState>) -> Result<Json<MemoryView>, AppError> {
    let photos = state.photos.list().await?;
    Ok(Json(MemoryView { photos }))
}

#[derive(Debug, Deserialize)]
struct BirthdayQuery {
    year: Option<String>,
}

/// Lenient year filter: a non-integer value is ignored and the full album
/// is shown, rather than rejecting the request
fn parse_year_filter(raw: Option<&str>) -> Option<i32> {
    raw.and_then(|s| s.trim().parse().ok())
}

async fn birthday_album(state: &AppState, year: Option<i32>) -> Result<BirthdayAlbumView, AppError> {
    let records = match year {
        Some(year) => state.birthdays.list_by_year(year).await?,
        None => state.birthdays.list_all().await?,
    };
    let years = state.birthdays.distinct_years().await?;
    let stats = state.birthdays.stats().await?;

    let photos = records
        .into_iter()
        .map(|r| BirthdayPhotoView::from_record(r, &state.birthdays))
        .collect();

    Ok(BirthdayAlbumView {
        photos,
        years,
        selected_year: year,
        stats,
    })
}

/// Birthday album, optionally filtered by a `year` query parameter
#[instrument(skip(state))]
async fn birthday_index(
    State(state): State<AppState>,
    Query(params): Query<BirthdayQuery>,
) -> Result<Json<BirthdayAlbumView>, AppError> {
    let year = parse_year_filter(params.year.as_deref());
    Ok(Json(birthday_album(&state, year).await?))
}

/// Birthday album with the year fixed by the path segment
#[instrument(skip(state))]
async fn birthday_year_view(
    State(state): State<AppState>,
    Path(year): Path<i32>,
) -> Result<Json<BirthdayAlbumView>, AppError> {
    Ok(Json(birthday_album(&state, Some(year)).await?))
}

/// Birthday album statistics as JSON
#[instrument(skip(state))]
async fn birthday_stats_api(
    State(state): State<AppState>,
) -> Result<Json<BirthdayStats>, AppError> {
    Ok(Json(state.birthdays.stats().await?))
}

/// Run a memory-film batch: per-file failures become messages, the batch
/// continues for remaining files
async fn save_photo_batch(photos: &PhotoService, files: Vec<UploadedFile>) -> MutationOutcome {
    let mut outcome = MutationOutcome {
        uploaded: 0,
        messages: Vec::new(),
    };

    if files.is_empty() {
        outcome
            .messages
            .push(FlashMessage::error("No upload field found"));
        return outcome;
    }

    for file in files {
        match photos.save(&file.filename, file.data).await {
            Ok(_) => outcome.uploaded += 1,
            Err(e) if e.is_validation() => {
                outcome.messages.push(FlashMessage::warning(e.to_string()));
            }
            Err(e) => {
                error!(error = %e, filename = %file.filename, "Upload failed");
                outcome
                    .messages
                    .push(FlashMessage::error(format!("Upload failed: {}", file.filename)));
            }
        }
    }

    if outcome.uploaded > 0 {
        outcome.messages.push(FlashMessage::success(format!(
            "Uploaded {} photos",
            outcome.uploaded
        )));
    }

    outcome
}

/// Run a birthday-album batch. The MM-DD date tag is required; a missing or
/// unknown tag is a validation failure, not a silent default.
async fn save_birthday_batch(birthdays: &BirthdayService, form: UploadForm) -> MutationOutcome {
    let mut outcome = MutationOutcome {
        uploaded: 0,
        messages: Vec::new(),
    };

    if form.files.is_empty() {
        outcome
            .messages
            .push(FlashMessage::error("No upload field found"));
        return outcome;
    }

    let birthday_date = match form.birthday_date {
        Some(date) => date,
        None => {
            outcome
                .messages
                .push(FlashMessage::error("birthday_date is required"));
            return outcome;
        }
    };

    for file in form.files {
        let result = birthdays
            .save(
                &file.filename,
                file.data,
                form.birthday_year,
                &birthday_date,
                form.description.clone(),
            )
            .await;

        match result {
            Ok(_) => outcome.uploaded += 1,
            Err(e) if e.is_validation() => {
                outcome.messages.push(FlashMessage::warning(e.to_string()));
            }
            Err(e) => {
                error!(error = %e, filename = %file.filename, "Birthday upload failed");
                outcome
                    .messages
                    .push(FlashMessage::error(format!("Upload failed: {}", file.filename)));
            }
        }
    }

    if outcome.uploaded > 0 {
        outcome.messages.push(FlashMessage::success(format!(
            "Uploaded {} birthday photos",
            outcome.uploaded
        )));
    }

    outcome
}

/// Batch upload to the memory film
#[instrument(skip(state, multipart))]
async fn upload_photos(State(state): State<AppState>, multipart: Multipart) -> Response {
    let form = read_upload_form(multipart).await;
    let outcome = save_photo_batch(&state.photos, form.files).await;

    info!(uploaded = outcome.uploaded, "Memory film upload complete");
    see_other("/memory/", outcome)
}

/// Batch upload to the birthday album
#[instrument(skip(state, multipart))]
async fn upload_birthday_photos(State(state): State<AppState>, multipart: Multipart) -> Response {
    let form = read_upload_form(multipart).await;
    let outcome = save_birthday_batch(&state.birthdays, form).await;

    info!(uploaded = outcome.uploaded, "Birthday upload complete");
    see_other("/birthday/", outcome)
}

/// Delete a memory-film photo
#[instrument(skip(state))]
async fn delete_photo(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Response, AppError> {
    let deleted = state.photos.delete(id).await?;
    let message = if deleted {
        FlashMessage::success("Photo deleted")
    } else {
        FlashMessage::error("Photo not found")
    };

    Ok(see_other(
        "/memory/",
        MutationOutcome {
            uploaded: 0,
            messages: vec![message],
        },
    ))
}

/// Delete a birthday photo
#[instrument(skip(state))]
async fn delete_birthday_photo(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Response, AppError> {
    let deleted = state.birthdays.delete(id).await?;
    let message = if deleted {
        FlashMessage::success("Birthday photo deleted")
    } else {
        FlashMessage::error("Photo not found")
    };

    Ok(see_other(
        "/birthday/",
        MutationOutcome {
            uploaded: 0,
            messages: vec![message],
        },
    ))
}

/// Start the HTTP server
pub async fn start_server(state: AppState, config: &HttpConfig) -> Result<()> {
    let router = create_router(state, config);
    let addr = format!("{}:{}", config.host, config.port);

    info!(address = %addr, "Starting photo-journal web server");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, router)
        .await
        .context("Web server error")?;

    Ok(())
}
