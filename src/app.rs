use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;

use crate::allocation::Allocation;
use crate::config::AppConfig;
use crate::downloader;
use crate::earnings;
use crate::error::{LedgerError, Result};
use crate::ledger::{EventDraft, EventKey, EventPatch, Ledger, Settlement, read_events, resolve};
use crate::members::{Member, MemberDirectory};
use crate::performance::PerformanceEvent;
use crate::saving;
use crate::session::{self, PerformanceCursor};
use crate::sheet::{
    LYRICS_SHEET, MEMBERS_SHEET, PERFORMANCES_SHEET, VIDEOS_SHEET, Workbook, Worksheet,
};
use crate::songs::{self, Song, SongCatalog};
use crate::videos::{self, Video};

pub struct AppState {
    workbook: Mutex<Workbook>,
    config: AppConfig,
}

#[derive(Serialize)]
struct StatusResponse {
    status: String,
    message: Option<String>,
}

#[derive(Serialize)]
struct SettledResponse {
    event: PerformanceEvent,
    allocation: Allocation,
}

#[derive(Deserialize)]
struct SongQuery {
    q: Option<String>,
}

#[derive(Deserialize)]
struct NewSong {
    title: String,
    artist: String,
    lyrics: String,
}

#[derive(Serialize)]
struct VideoEntry {
    #[serde(flatten)]
    video: Video,
    embed_url: Option<String>,
    error: Option<String>,
}

#[derive(Deserialize)]
struct StartRequest {
    selection: Vec<String>,
}

#[derive(Deserialize)]
struct CursorRequest {
    cursor: PerformanceCursor,
}

#[derive(Serialize)]
struct CursorResponse {
    cursor: PerformanceCursor,
    song: Option<Song>,
    finished: bool,
}

#[derive(Serialize)]
struct EndResponse {
    performed: usize,
}

impl IntoResponse for LedgerError {
    fn into_response(self) -> Response {
        let status = match &self {
            LedgerError::Validation(_) => StatusCode::BAD_REQUEST,
            LedgerError::Lookup(_) => StatusCode::NOT_FOUND,
            LedgerError::ExternalService(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            log::error!("request failed: {}", self);
        }
        (
            status,
            Json(StatusResponse {
                status: "error".to_string(),
                message: Some(self.to_string()),
            }),
        )
            .into_response()
    }
}

pub async fn run(config: AppConfig) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let workbook = saving::load_or_init(&config.workbook_path)?;
    let bind_addr = config.bind_addr.clone();

    let app_state = Arc::new(AppState::new(workbook, config));

    let app = router(app_state);

    let listener = TcpListener::bind(&bind_addr).await?;
    log::info!("Listening on http://{}", bind_addr);
    axum::serve(listener, app).await?;

    Ok(())
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/events", get(list_events).post(create_event))
        .route("/api/events/upcoming", get(get_upcoming))
        .route(
            "/api/events/:key",
            get(get_event).put(edit_event).delete(delete_event),
        )
        .route("/api/events/:key/done", post(mark_done))
        .route("/api/earnings", get(get_earnings))
        .route("/api/summary", get(get_summary))
        .route("/api/members", get(list_members))
        .route("/api/songs", get(list_songs).post(add_song))
        .route("/api/videos", get(list_videos))
        .route("/api/performance/start", post(start_performance))
        .route("/api/performance/next", post(next_song))
        .route("/api/performance/end", post(end_performance))
        .route("/api/export/:sheet", get(export_csv))
        .route("/api/export.xlsx", get(export_xlsx))
        .route("/api/backup", get(export_backup))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

impl AppState {
    pub fn new(workbook: Workbook, config: AppConfig) -> Self {
        AppState {
            workbook: Mutex::new(workbook),
            config,
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Workbook>> {
        self.workbook
            .lock()
            .map_err(|_| LedgerError::ExternalService("workbook lock poisoned".to_string()))
    }

    fn read<T>(&self, f: impl FnOnce(&Workbook) -> Result<T>) -> Result<T> {
        let workbook = self.lock()?;
        f(&workbook)
    }

    // Runs `f` against a copy of the workbook and only swaps it in once the
    // copy is on disk. `save_workbook` renames into place, so a failed save
    // leaves both memory and file untouched.
    fn write<T>(&self, f: impl FnOnce(&mut Workbook) -> Result<T>) -> Result<T> {
        let mut workbook = self.lock()?;
        let mut next = workbook.clone();
        let value = f(&mut next)?;
        saving::save_workbook(&next, &self.config.workbook_path)?;
        *workbook = next;
        Ok(value)
    }

    fn with_ledger<T>(
        &self,
        f: impl FnOnce(&mut Ledger<&mut Worksheet>) -> Result<T>,
    ) -> Result<T> {
        let policy = self.config.ledger;
        self.write(|workbook| {
            let directory = MemberDirectory::load(workbook.worksheet(MEMBERS_SHEET)?)?;
            let sheet = workbook.worksheet_mut(PERFORMANCES_SHEET)?;
            let mut ledger = Ledger::new(sheet, policy).with_directory(directory);
            f(&mut ledger)
        })
    }

    fn events(&self) -> Result<Vec<PerformanceEvent>> {
        self.read(|workbook| read_events(workbook.worksheet(PERFORMANCES_SHEET)?))
    }
}

async fn list_events(State(state): State<Arc<AppState>>) -> Result<Json<Vec<PerformanceEvent>>> {
    state.events().map(Json)
}

async fn get_upcoming(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Option<PerformanceEvent>>> {
    Ok(Json(state.events()?.into_iter().find(|e| !e.is_done())))
}

async fn get_event(
    Path(key): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<PerformanceEvent>> {
    let key = EventKey::parse(&key)?;
    let events = state.events()?;
    let index = resolve(&events, &key)?;
    Ok(Json(events[index].clone()))
}

async fn create_event(
    State(state): State<Arc<AppState>>,
    Json(draft): Json<EventDraft>,
) -> Result<(StatusCode, Json<PerformanceEvent>)> {
    let event = state.with_ledger(|ledger| ledger.create(draft))?;
    Ok((StatusCode::CREATED, Json(event)))
}

async fn edit_event(
    Path(key): Path<String>,
    State(state): State<Arc<AppState>>,
    Json(patch): Json<EventPatch>,
) -> Result<Json<PerformanceEvent>> {
    let key = EventKey::parse(&key)?;
    state.with_ledger(|ledger| ledger.edit(&key, patch)).map(Json)
}

async fn mark_done(
    Path(key): Path<String>,
    State(state): State<Arc<AppState>>,
    Json(settlement): Json<Settlement>,
) -> Result<Json<SettledResponse>> {
    let key = EventKey::parse(&key)?;
    let (event, allocation) = state.with_ledger(|ledger| ledger.mark_done(&key, settlement))?;
    Ok(Json(SettledResponse { event, allocation }))
}

async fn delete_event(
    Path(key): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<PerformanceEvent>> {
    let key = EventKey::parse(&key)?;
    state.with_ledger(|ledger| ledger.delete(&key)).map(Json)
}

async fn get_earnings(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<earnings::MemberEarning>>> {
    Ok(Json(earnings::member_earnings(&state.events()?)))
}

async fn get_summary(State(state): State<Arc<AppState>>) -> Result<Json<earnings::LedgerSummary>> {
    Ok(Json(earnings::summarize(&state.events()?)))
}

async fn list_members(State(state): State<Arc<AppState>>) -> Result<Json<Vec<Member>>> {
    state.read(|workbook| {
        let directory = MemberDirectory::load(workbook.worksheet(MEMBERS_SHEET)?)?;
        Ok(Json(directory.members().to_vec()))
    })
}

async fn list_songs(
    Query(params): Query<SongQuery>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Song>>> {
    state.read(|workbook| {
        let catalog = SongCatalog::load(workbook.worksheet(LYRICS_SHEET)?)?;
        let term = params.q.unwrap_or_default();
        Ok(Json(catalog.search(&term).into_iter().cloned().collect()))
    })
}

async fn add_song(
    State(state): State<Arc<AppState>>,
    Json(song): Json<NewSong>,
) -> Result<(StatusCode, Json<Song>)> {
    let song = state.write(|workbook| {
        songs::add_song(
            workbook.worksheet_mut(LYRICS_SHEET)?,
            &song.title,
            &song.artist,
            &song.lyrics,
        )
    })?;
    Ok((StatusCode::CREATED, Json(song)))
}

async fn list_videos(State(state): State<Arc<AppState>>) -> Result<Json<Vec<VideoEntry>>> {
    let videos = state.read(|workbook| videos::load_videos(workbook.worksheet(VIDEOS_SHEET)?))?;
    let entries = videos
        .into_iter()
        .map(|video| match video.embed_url() {
            Ok(url) => VideoEntry {
                video,
                embed_url: Some(url),
                error: None,
            },
            Err(e) => VideoEntry {
                video,
                embed_url: None,
                error: Some(e.to_string()),
            },
        })
        .collect();
    Ok(Json(entries))
}

fn cursor_response(state: &AppState, cursor: PerformanceCursor) -> Result<CursorResponse> {
    let song = match cursor.current() {
        Some(label) => state.read(|workbook| {
            let catalog = SongCatalog::load(workbook.worksheet(LYRICS_SHEET)?)?;
            Ok(catalog.find(label).cloned())
        })?,
        None => None,
    };
    let finished = cursor.is_finished();
    Ok(CursorResponse {
        cursor,
        song,
        finished,
    })
}

async fn start_performance(
    State(state): State<Arc<AppState>>,
    Json(req): Json<StartRequest>,
) -> Result<Json<CursorResponse>> {
    let cursor = session::start_performance(&req.selection, state.config.performance.max_selection)?;
    cursor_response(&state, cursor).map(Json)
}

async fn next_song(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CursorRequest>,
) -> Result<Json<CursorResponse>> {
    cursor_response(&state, req.cursor.advance()).map(Json)
}

async fn end_performance(Json(req): Json<CursorRequest>) -> Json<EndResponse> {
    Json(EndResponse {
        performed: session::end_performance(req.cursor),
    })
}

async fn export_csv(
    Path(sheet): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Result<Response> {
    let name = sheet.trim_end_matches(".csv").to_string();
    let csv = state.read(|workbook| downloader::to_csv(workbook.worksheet(&name)?))?;
    Ok(([(header::CONTENT_TYPE, "text/csv; charset=utf-8")], csv).into_response())
}

async fn export_xlsx(State(state): State<Arc<AppState>>) -> Result<Response> {
    let bytes = state.read(downloader::to_xlsx)?;
    Ok((
        [(
            header::CONTENT_TYPE,
            "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        )],
        bytes,
    )
        .into_response())
}

async fn export_backup(State(state): State<Arc<AppState>>) -> Result<Response> {
    let bytes = state.read(saving::serialize_to_memory)?;
    Ok(([(header::CONTENT_TYPE, "application/gzip")], bytes).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use chrono::NaiveDate;
    use rust_decimal::Decimal;
    use serde_json::Value;

    fn state_at(path: &std::path::Path) -> Arc<AppState> {
        let config = AppConfig {
            workbook_path: path.to_string_lossy().into_owned(),
            ..AppConfig::default()
        };
        Arc::new(AppState::new(Workbook::with_default_sheets(), config))
    }

    fn draft(venue: &str) -> EventDraft {
        EventDraft {
            date: NaiveDate::from_ymd_opt(2024, 6, 3).expect("date"),
            venue: venue.to_string(),
            status: crate::performance::EventStatus::Upcoming,
            total_token: None,
            notes: String::new(),
            performers: vec!["Ali".to_string()],
        }
    }

    async fn body_json(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        serde_json::from_slice(&bytes).expect("json")
    }

    #[tokio::test]
    async fn errors_map_to_status_codes_with_json_body() {
        let cases = [
            (LedgerError::validation("bad"), StatusCode::BAD_REQUEST),
            (LedgerError::lookup("gone"), StatusCode::NOT_FOUND),
            (
                LedgerError::ExternalService("down".to_string()),
                StatusCode::BAD_GATEWAY,
            ),
            (
                LedgerError::Parse("garbled".to_string()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, expected) in cases {
            let message = err.to_string();
            let response = err.into_response();
            assert_eq!(response.status(), expected);
            let body = body_json(response).await;
            assert_eq!(body["status"], "error");
            assert_eq!(body["message"], Value::String(message));
        }
    }

    #[tokio::test]
    async fn settling_through_handlers_persists_the_workbook() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("book.bin.gz");
        let state = state_at(&path);

        let (status, Json(event)) = create_event(State(state.clone()), Json(draft("Old Town")))
            .await
            .expect("create");
        assert_eq!(status, StatusCode::CREATED);

        let settlement = Settlement {
            total_token: Decimal::from(30),
            performers: vec!["Ali".to_string(), "Bee".to_string()],
            notes: None,
        };
        let Json(settled) = mark_done(
            Path(event.id.clone()),
            State(state.clone()),
            Json(settlement),
        )
        .await
        .expect("mark done");
        assert_eq!(settled.allocation.share_per_person, Decimal::from(10));

        let on_disk = saving::load_workbook(&path).expect("load");
        let sheet = on_disk.worksheet(PERFORMANCES_SHEET).expect("sheet");
        let events = read_events(sheet).expect("events");
        assert_eq!(events.len(), 1);
        assert!(events[0].is_done());

        let err = delete_event(Path(event.id), State(state)).await.unwrap_err();
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn failed_writes_leave_memory_untouched() {
        let dir = tempfile::tempdir().expect("tempdir");

        let state = state_at(&dir.path().join("book.bin.gz"));
        let err = create_event(State(state.clone()), Json(draft("  ")))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)));
        assert!(state.events().expect("events").is_empty());

        // the save itself fails: the target directory does not exist
        let state = state_at(&dir.path().join("missing").join("book.bin.gz"));
        let err = create_event(State(state.clone()), Json(draft("Old Town")))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Io(_)));
        assert!(state.events().expect("events").is_empty());
    }

    #[tokio::test]
    async fn unknown_event_is_not_found() {
        let dir = tempfile::tempdir().expect("tempdir");
        let state = state_at(&dir.path().join("book.bin.gz"));
        let err = get_event(Path("no-such-id".to_string()), State(state))
            .await
            .unwrap_err();
        assert_eq!(err.into_response().status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn xlsx_download_has_spreadsheet_content_type() {
        let dir = tempfile::tempdir().expect("tempdir");
        let state = state_at(&dir.path().join("book.bin.gz"));
        let response = export_xlsx(State(state)).await.expect("xlsx");
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
        );
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        assert!(bytes.starts_with(b"PK"));
    }
}
