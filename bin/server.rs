// Academic Records - Web Server
// Thin JSON API over RecordsEngine (axum)

use academic_records::{
    EngineConfig, Entity, ErrorKind, GradeRecordFilter, GradeUpdate, NewGradeRecord,
    PeriodFilter, RecordError, RecordsEngine, TranscriptType,
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::task::JoinError;
use tower_http::cors::CorsLayer;
use tracing_subscriber::EnvFilter;

/// Shared application state
#[derive(Clone)]
struct AppState {
    engine: Arc<RecordsEngine>,
    default_actor: Arc<str>,
}

impl AppState {
    fn actor(&self, body: Option<&ActorBody>) -> String {
        body.and_then(|b| b.actor_id.clone())
            .unwrap_or_else(|| self.default_actor.to_string())
    }
}

/// API Response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<ApiError>,
}

#[derive(Serialize)]
struct ApiError {
    kind: ErrorKind,
    message: String,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }
}

impl ApiResponse<()> {
    fn err(kind: ErrorKind, message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(ApiError { kind, message }),
        }
    }
}

/// RecordError (or a failed blocking task) → HTTP status + error envelope
enum AppError {
    Record(RecordError),
    Task(JoinError),
}

impl From<RecordError> for AppError {
    fn from(err: RecordError) -> Self {
        AppError::Record(err)
    }
}

fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::InvalidInput => StatusCode::BAD_REQUEST,
        ErrorKind::BusinessRuleViolation => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorKind::InvariantViolation | ErrorKind::Storage => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (kind, message) = match self {
            AppError::Record(err) => (err.kind(), err.to_string()),
            AppError::Task(err) => (ErrorKind::Storage, format!("storage task failed: {}", err)),
        };
        let status = status_for(kind);
        if status.is_server_error() {
            tracing::error!(error = %message, "request failed");
        }
        (status, Json(ApiResponse::err(kind, message))).into_response()
    }
}

type ApiResult<T> = Result<Json<ApiResponse<T>>, AppError>;

fn ok<T>(data: T) -> ApiResult<T> {
    Ok(Json(ApiResponse::ok(data)))
}

/// Run a synchronous engine call on the blocking pool.
///
/// Every engine operation takes the SQLite connection lock and may wait on
/// `busy_timeout`, so handlers never call it on a runtime worker.
async fn blocking<T, F>(state: &AppState, f: F) -> Result<T, AppError>
where
    F: FnOnce(&RecordsEngine) -> academic_records::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let engine = state.engine.clone();
    tokio::task::spawn_blocking(move || f(&engine))
        .await
        .map_err(AppError::Task)?
        .map_err(AppError::from)
}

// ============================================================================
// Request bodies / queries
// ============================================================================

#[derive(Deserialize, Default)]
struct ActorBody {
    actor_id: Option<String>,
}

/// Period filter as raw query strings, parsed case-insensitively
#[derive(Deserialize, Default)]
struct PeriodQuery {
    semester: Option<String>,
    academic_year: Option<String>,
}

impl PeriodQuery {
    fn to_filter(&self) -> Result<PeriodFilter, RecordError> {
        PeriodFilter::parse(self.semester.as_deref(), self.academic_year.as_deref())
    }
}

#[derive(Deserialize, Default)]
struct GradeQuery {
    course_id: Option<String>,
    student_id: Option<String>,
    finalized: Option<String>,
    semester: Option<String>,
    academic_year: Option<String>,
}

impl GradeQuery {
    fn into_filter(self) -> Result<GradeRecordFilter, RecordError> {
        let period = PeriodFilter::parse(self.semester.as_deref(), self.academic_year.as_deref())?;
        let finalized = self
            .finalized
            .map(|raw| {
                raw.trim()
                    .to_ascii_lowercase()
                    .parse::<bool>()
                    .map_err(|_| RecordError::InvalidInput {
                        field: "finalized",
                        reason: format!("expected true or false, got '{}'", raw),
                    })
            })
            .transpose()?;

        Ok(GradeRecordFilter {
            course_id: self.course_id,
            student_id: self.student_id,
            finalized,
            semester: period.semester,
            academic_year: period.academic_year,
        })
    }
}

fn parse_transcript_type(raw: Option<&str>) -> Result<Option<TranscriptType>, RecordError> {
    raw.map(str::parse::<TranscriptType>).transpose()
}

#[derive(Deserialize, Default)]
struct GenerateTranscriptBody {
    transcript_type: Option<String>,
    #[serde(default)]
    period: PeriodQuery,
    actor_id: Option<String>,
}

#[derive(Deserialize, Default)]
struct LatestQuery {
    #[serde(rename = "type")]
    transcript_type: Option<String>,
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::ok(academic_records::VERSION))
}

/// POST /api/grades - Create a draft grade record
async fn create_grade(
    State(state): State<AppState>,
    Json(input): Json<NewGradeRecord>,
) -> Result<impl IntoResponse, AppError> {
    let record = blocking(&state, move |engine| engine.create_grade_record(input)).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(record))))
}

/// GET /api/grades?student_id=&course_id=&finalized=&semester=&academic_year=
async fn list_grades(
    State(state): State<AppState>,
    Query(query): Query<GradeQuery>,
) -> ApiResult<Vec<academic_records::GradeRecord>> {
    let filter = query.into_filter()?;
    ok(blocking(&state, move |engine| engine.list_grade_records(&filter)).await?)
}

/// GET /api/grades/:id
async fn get_grade(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<academic_records::GradeRecord> {
    ok(blocking(&state, move |engine| engine.get_grade_record(&id)).await?)
}

/// PATCH /api/grades/:id - Update a draft record
async fn update_grade(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(update): Json<GradeUpdate>,
) -> ApiResult<academic_records::GradeRecord> {
    ok(blocking(&state, move |engine| engine.update_grade_record(&id, update)).await?)
}

/// POST /api/grades/:id/finalize
async fn finalize_grade(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Option<Json<ActorBody>>,
) -> ApiResult<academic_records::GradeRecord> {
    let actor = state.actor(body.as_ref().map(|Json(b)| b));
    ok(blocking(&state, move |engine| engine.finalize_grade_record(&id, &actor)).await?)
}

/// GET /api/grades/:id/events - Audit trail, newest first
async fn grade_events(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Vec<academic_records::Event>> {
    ok(blocking(&state, move |engine| engine.events_for(Entity::GradeRecord, &id)).await?)
}

#[derive(Serialize)]
struct GpaResponse {
    student_id: String,
    gpa: Option<academic_records::GradePoints>,
}

/// GET /api/students/:id/gpa?semester=&academic_year=
async fn student_gpa(
    State(state): State<AppState>,
    Path(student_id): Path<String>,
    Query(query): Query<PeriodQuery>,
) -> ApiResult<GpaResponse> {
    let period = query.to_filter()?;
    let gpa = {
        let student_id = student_id.clone();
        blocking(&state, move |engine| engine.calculate_gpa(&student_id, period)).await?
    };
    ok(GpaResponse { student_id, gpa })
}

/// GET /api/students/:id/prerequisites/:course_id
async fn student_prerequisites(
    State(state): State<AppState>,
    Path((student_id, course_id)): Path<(String, String)>,
) -> ApiResult<academic_records::PrerequisiteCheck> {
    ok(blocking(&state, move |engine| {
        engine.validate_prerequisites(&student_id, &course_id)
    })
    .await?)
}

/// POST /api/students/:id/transcripts - Generate a new snapshot
async fn generate_transcript(
    State(state): State<AppState>,
    Path(student_id): Path<String>,
    Json(body): Json<GenerateTranscriptBody>,
) -> Result<impl IntoResponse, AppError> {
    let transcript_type = parse_transcript_type(body.transcript_type.as_deref())?
        .unwrap_or_default();
    let period = body.period.to_filter()?;
    let actor = body
        .actor_id
        .unwrap_or_else(|| state.default_actor.to_string());
    let transcript = blocking(&state, move |engine| {
        engine.generate_transcript(&student_id, transcript_type, period, &actor)
    })
    .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(transcript))))
}

/// GET /api/students/:id/transcripts - All snapshots, newest first
async fn list_transcripts(
    State(state): State<AppState>,
    Path(student_id): Path<String>,
) -> ApiResult<Vec<academic_records::Transcript>> {
    ok(blocking(&state, move |engine| engine.list_transcripts(&student_id)).await?)
}

/// GET /api/students/:id/transcripts/latest?type=
async fn latest_transcript(
    State(state): State<AppState>,
    Path(student_id): Path<String>,
    Query(query): Query<LatestQuery>,
) -> Result<Response, AppError> {
    let transcript_type = parse_transcript_type(query.transcript_type.as_deref())?;
    let latest = {
        let student_id = student_id.clone();
        blocking(&state, move |engine| {
            engine.get_latest_transcript(&student_id, transcript_type)
        })
        .await?
    };
    match latest {
        Some(transcript) => Ok(Json(ApiResponse::ok(transcript)).into_response()),
        None => Ok((
            StatusCode::NOT_FOUND,
            Json(ApiResponse::err(
                ErrorKind::NotFound,
                format!("no transcript for student {}", student_id),
            )),
        )
            .into_response()),
    }
}

/// GET /api/students/:id/summary
async fn student_summary(
    State(state): State<AppState>,
    Path(student_id): Path<String>,
) -> ApiResult<academic_records::TranscriptSummary> {
    ok(blocking(&state, move |engine| engine.get_transcript_summary(&student_id)).await?)
}

/// GET /api/transcripts/:id
async fn get_transcript(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<academic_records::Transcript> {
    ok(blocking(&state, move |engine| engine.get_transcript(&id)).await?)
}

/// POST /api/transcripts/:id/certify
async fn certify_transcript(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Option<Json<ActorBody>>,
) -> ApiResult<academic_records::Transcript> {
    let actor = state.actor(body.as_ref().map(|Json(b)| b));
    ok(blocking(&state, move |engine| engine.certify_transcript(&id, &actor)).await?)
}

// ============================================================================
// Main Server
// ============================================================================

fn router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/grades", post(create_grade).get(list_grades))
        .route("/grades/:id", get(get_grade).patch(update_grade))
        .route("/grades/:id/finalize", post(finalize_grade))
        .route("/grades/:id/events", get(grade_events))
        .route("/students/:id/gpa", get(student_gpa))
        .route("/students/:id/prerequisites/:course_id", get(student_prerequisites))
        .route(
            "/students/:id/transcripts",
            post(generate_transcript).get(list_transcripts),
        )
        .route("/students/:id/transcripts/latest", get(latest_transcript))
        .route("/students/:id/summary", get(student_summary))
        .route("/transcripts/:id", get(get_transcript))
        .route("/transcripts/:id/certify", post(certify_transcript))
        .with_state(state);

    Router::new()
        .nest("/api", api_routes)
        .layer(CorsLayer::permissive())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = EngineConfig::from_env()?;
    let engine = config.build_engine()?;

    let state = AppState {
        engine: Arc::new(engine),
        default_actor: Arc::from(config.default_actor.as_str()),
    };

    let listener = tokio::net::TcpListener::bind(&config.server_addr).await?;
    tracing::info!(addr = %config.server_addr, "🚀 records server listening");

    axum::serve(listener, router(state)).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use academic_records::{
        Course, CourseRegistry, Database, FixedClock, GradePoints, Semester, StudentRegistry,
    };
    use chrono::{TimeZone, Utc};

    const STUDENT: &str = "S1001";

    fn state() -> AppState {
        let engine = RecordsEngine::new(
            Database::open_in_memory().unwrap(),
            Arc::new(CourseRegistry::from_courses([
                Course::new("CS101", "CS101", "Introduction to Programming", 3),
                Course::new("MATH100", "MATH100", "Calculus I", 4),
            ])),
            Arc::new(StudentRegistry::from_ids([STUDENT])),
            Arc::new(FixedClock::new(
                Utc.with_ymd_and_hms(2025, 1, 15, 9, 0, 0).unwrap(),
            )),
        );
        AppState {
            engine: Arc::new(engine),
            default_actor: Arc::from("registrar"),
        }
    }

    fn finalized(state: &AppState, course: &str, score: f64, semester: Semester) {
        let record = state
            .engine
            .create_grade_record(NewGradeRecord {
                course_id: course.to_string(),
                student_id: STUDENT.to_string(),
                score,
                semester,
                academic_year: "2024-2025".parse().unwrap(),
                comment: None,
            })
            .unwrap();
        state
            .engine
            .finalize_grade_record(&record.meta.id, "registrar")
            .unwrap();
    }

    fn period(semester: &str, academic_year: &str) -> PeriodQuery {
        PeriodQuery {
            semester: Some(semester.to_string()),
            academic_year: Some(academic_year.to_string()),
        }
    }

    fn student() -> Path<String> {
        Path(STUDENT.to_string())
    }

    fn status_of(err: AppError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(status_for(ErrorKind::NotFound), StatusCode::NOT_FOUND);
        assert_eq!(status_for(ErrorKind::Conflict), StatusCode::CONFLICT);
        assert_eq!(status_for(ErrorKind::InvalidInput), StatusCode::BAD_REQUEST);
        assert_eq!(
            status_for(ErrorKind::BusinessRuleViolation),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            status_for(ErrorKind::InvariantViolation),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(status_for(ErrorKind::Storage), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_blocking_propagates_engine_errors() {
        let state = state();
        let err = blocking(&state, |engine| engine.get_grade_record("missing"))
            .await
            .err()
            .unwrap();
        assert!(matches!(&err, AppError::Record(e) if e.kind() == ErrorKind::NotFound));
        assert_eq!(status_of(err), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_gpa_query_is_case_insensitive() {
        let state = state();
        finalized(&state, "CS101", 95.0, Semester::Fall);
        finalized(&state, "MATH100", 75.0, Semester::Spring);

        let Json(response) = student_gpa(
            State(state.clone()),
            Path(STUDENT.to_string()),
            Query(period("fall", "2024-2025")),
        )
        .await
        .ok()
        .unwrap();
        let expected = GradePoints::from_hundredths(400).unwrap();
        assert_eq!(response.data.unwrap().gpa, Some(expected));

        let Json(response) = student_gpa(
            State(state),
            Path(STUDENT.to_string()),
            Query(period(" SPRING ", "2024-2025")),
        )
        .await
        .ok()
        .unwrap();
        let expected = GradePoints::from_hundredths(200).unwrap();
        assert_eq!(response.data.unwrap().gpa, Some(expected));
    }

    #[tokio::test]
    async fn test_bad_period_query_is_bad_request() {
        let state = state();
        let err = student_gpa(
            State(state.clone()),
            Path(STUDENT.to_string()),
            Query(period("autumn", "2024-2025")),
        )
        .await
        .err()
        .unwrap();
        assert_eq!(status_of(err), StatusCode::BAD_REQUEST);

        let err = student_gpa(
            State(state),
            Path(STUDENT.to_string()),
            Query(period("Fall", "2024/2025")),
        )
        .await
        .err()
        .unwrap();
        assert_eq!(status_of(err), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_list_grades_parses_filters() {
        let state = state();
        finalized(&state, "CS101", 95.0, Semester::Fall);
        state
            .engine
            .create_grade_record(NewGradeRecord {
                course_id: "MATH100".to_string(),
                student_id: STUDENT.to_string(),
                score: 70.0,
                semester: Semester::Fall,
                academic_year: "2024-2025".parse().unwrap(),
                comment: None,
            })
            .unwrap();

        let query = GradeQuery {
            finalized: Some("TRUE".to_string()),
            semester: Some("FALL".to_string()),
            ..Default::default()
        };
        let Json(response) = list_grades(State(state.clone()), Query(query))
            .await
            .ok()
            .unwrap();
        let records = response.data.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].course_id, "CS101");

        let query = GradeQuery {
            finalized: Some("yes".to_string()),
            ..Default::default()
        };
        let err = list_grades(State(state), Query(query)).await.err().unwrap();
        assert_eq!(status_of(err), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_transcript_type_parsing() {
        let state = state();
        finalized(&state, "CS101", 95.0, Semester::Fall);

        let body = GenerateTranscriptBody {
            transcript_type: Some("Interim".to_string()),
            ..Default::default()
        };
        let response = generate_transcript(State(state.clone()), student(), Json(body))
            .await
            .ok()
            .unwrap()
            .into_response();
        assert_eq!(response.status(), StatusCode::CREATED);

        let body = GenerateTranscriptBody {
            transcript_type: Some("official".to_string()),
            ..Default::default()
        };
        let err = generate_transcript(State(state.clone()), student(), Json(body))
            .await
            .err()
            .unwrap();
        assert_eq!(status_of(err), StatusCode::BAD_REQUEST);

        let query = LatestQuery {
            transcript_type: Some("INTERIM".to_string()),
        };
        let response = latest_transcript(State(state.clone()), student(), Query(query))
            .await
            .ok()
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let query = LatestQuery {
            transcript_type: Some("unofficial".to_string()),
        };
        let response = latest_transcript(State(state), student(), Query(query))
            .await
            .ok()
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
