//! HTTP API for a form UI: browse templates, walk a session through its
//! steps, download the filled PDF.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::{Duration, Instant};

use autoly_core::{
    Advance, Blueprint, Cursor, FormError, Sequencer, SessionState, Step, ValidationError, Values,
};
use axum::{
    extract::{Path, State},
    http::{header, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};

use crate::config::Context;
use crate::prelude::{eprintln, *};

const MSG_RENDER_FAILED: &str = "Could not generate the document, please try again later";
const MSG_INTERNAL: &str = "Internal server error";

const SESSION_TTL: Duration = Duration::from_secs(30 * 60);
const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, clap::Args)]
pub struct ServeOptions {
    /// Port to listen on
    #[arg(short, long, default_value = "3000")]
    pub port: u16,

    /// Host to bind to
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,

    /// Minutes a session may sit idle before it is discarded
    #[arg(long, default_value = "30")]
    pub session_ttl: u64,
}

pub async fn run(options: ServeOptions, global: crate::Global) -> Result<()> {
    let context = Context::load(&global)?;
    let addr = format!("{}:{}", options.host, options.port);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| eyre!("Failed to bind to {}: {}", addr, e))?;

    if global.verbose {
        eprintln!("autoly listening on http://{}", addr);
    }
    log::info!("listening on {addr}");

    let ttl = Duration::from_secs(options.session_ttl.saturating_mul(60));
    let state = AppState::new(context, ttl);
    tokio::spawn(sweep_sessions(Arc::downgrade(&state), SWEEP_INTERVAL));

    axum::serve(listener, routes(state))
        .await
        .map_err(|e| eyre!("Server error: {e}"))?;

    Ok(())
}

/// Routes over a fresh session store with the default idle timeout.
pub fn router(context: Context) -> Router {
    routes(AppState::new(context, SESSION_TTL))
}

fn routes(state: Shared) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/templates", get(list_templates))
        .route("/templates/{name}/steps", get(template_steps))
        .route("/sessions", post(create_session))
        .route("/sessions/{id}", get(get_session).delete(delete_session))
        .route("/sessions/{id}/values", put(put_values))
        .route("/sessions/{id}/advance", post(advance))
        .route("/sessions/{id}/retreat", post(retreat))
        .route("/sessions/{id}/document", get(document))
        .layer(cors)
        .with_state(state)
}

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

type Shared = Arc<AppState>;

type Sessions = HashMap<String, StoredSession>;

struct StoredSession {
    state: SessionState,
    last_touched: Instant,
}

impl StoredSession {
    fn new(state: SessionState) -> Self {
        StoredSession {
            state,
            last_touched: Instant::now(),
        }
    }
}

struct AppState {
    context: Context,
    sessions: Mutex<Sessions>,
    /// Idle time after which a session is dropped.
    ttl: Duration,
}

impl AppState {
    fn new(context: Context, ttl: Duration) -> Shared {
        Arc::new(AppState {
            context,
            sessions: Mutex::new(HashMap::new()),
            ttl,
        })
    }

    /// Lock the store. Idle sessions are evicted first, so an expired id
    /// reads as unknown.
    fn sessions(&self) -> Result<MutexGuard<'_, Sessions>, ApiError> {
        let mut sessions = self.sessions.lock().map_err(|_| {
            log::error!("session store lock is poisoned");
            ApiError::Internal(MSG_INTERNAL)
        })?;
        let before = sessions.len();
        sessions.retain(|_, stored| stored.last_touched.elapsed() <= self.ttl);
        let evicted = before - sessions.len();
        if evicted > 0 {
            log::debug!("evicted {evicted} idle session(s)");
        }
        Ok(sessions)
    }

    /// Run `f` on a stored session. Only synchronous work happens under the
    /// lock.
    fn with_session<T>(
        &self,
        id: &str,
        f: impl FnOnce(&Sequencer<'_>, &mut SessionState) -> Result<T, ApiError>,
    ) -> Result<T, ApiError> {
        let mut sessions = self.sessions()?;
        let stored = sessions
            .get_mut(id)
            .ok_or_else(|| ApiError::NotFound(format!("Unknown session: {id}")))?;
        stored.last_touched = Instant::now();
        let sequencer = Sequencer::for_session(&self.context.catalog, &stored.state, today())?;
        f(&sequencer, &mut stored.state)
    }
}

/// Evict idle sessions every `every` until the server state is gone.
async fn sweep_sessions(app: Weak<AppState>, every: Duration) {
    let mut interval = tokio::time::interval(every);
    loop {
        interval.tick().await;
        let Some(app) = app.upgrade() else {
            return;
        };
        if app.sessions().is_err() {
            return;
        }
    }
}

fn today() -> chrono::NaiveDate {
    chrono::Local::now().date_naive()
}

fn new_session_id() -> String {
    format!("{:016x}", rand::thread_rng().gen::<u64>())
}

// ---------------------------------------------------------------------------
// Responses
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionView {
    pub id: String,
    pub template: String,
    pub cursor: Cursor,
    /// The step to show, absent once the session is complete.
    pub step: Option<Step>,
    pub step_count: usize,
    pub values: Values,
}

impl SessionView {
    fn new(id: &str, sequencer: &Sequencer<'_>, state: &SessionState) -> Self {
        SessionView {
            id: id.to_string(),
            template: state.template.clone(),
            cursor: state.cursor,
            step: sequencer.current_step(state).ok().cloned(),
            step_count: sequencer.blueprint().steps.len(),
            values: state.values.clone(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AdvanceView {
    pub moved: bool,
    pub violations: Vec<ValidationError>,
    pub session: SessionView,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    violations: Vec<ValidationError>,
}

#[derive(Debug)]
enum ApiError {
    NotFound(String),
    BadRequest(String),
    Conflict(String),
    Invalid(Vec<ValidationError>),
    /// Details are logged, never sent.
    Internal(&'static str),
}

impl From<FormError> for ApiError {
    fn from(e: FormError) -> Self {
        match e {
            FormError::UnknownTemplate(_) => ApiError::NotFound(e.to_string()),
            FormError::UnknownField(_)
            | FormError::FieldNotInStep { .. }
            | FormError::WrongValueShape { .. } => ApiError::BadRequest(e.to_string()),
            FormError::SessionComplete | FormError::NotComplete => {
                ApiError::Conflict(e.to_string())
            }
            FormError::Invalid(violations) => ApiError::Invalid(violations),
            other => {
                log::error!("catalog error: {other}");
                ApiError::Internal(MSG_INTERNAL)
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error, violations) = match self {
            ApiError::NotFound(message) => (StatusCode::NOT_FOUND, message, Vec::new()),
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, message, Vec::new()),
            ApiError::Conflict(message) => (StatusCode::CONFLICT, message, Vec::new()),
            ApiError::Invalid(violations) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "Session data is invalid".to_string(),
                violations,
            ),
            ApiError::Internal(message) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                message.to_string(),
                Vec::new(),
            ),
        };
        (status, Json(ErrorBody { error, violations })).into_response()
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn list_templates(State(app): State<Shared>) -> Json<Vec<Blueprint>> {
    Json(app.context.catalog.registry.iter().cloned().collect())
}

async fn template_steps(
    State(app): State<Shared>,
    Path(name): Path<String>,
) -> Result<Json<Vec<Step>>, ApiError> {
    Ok(Json(app.context.catalog.steps_for(&name)?.to_vec()))
}

#[derive(Debug, Deserialize)]
struct CreateSession {
    template: String,
}

async fn create_session(
    State(app): State<Shared>,
    Json(body): Json<CreateSession>,
) -> Result<(StatusCode, Json<SessionView>), ApiError> {
    let sequencer = Sequencer::new(&app.context.catalog, &body.template, today())?;
    let state = sequencer.start();

    let mut sessions = app.sessions()?;
    let mut id = new_session_id();
    while sessions.contains_key(&id) {
        id = new_session_id();
    }
    let view = SessionView::new(&id, &sequencer, &state);
    sessions.insert(id.clone(), StoredSession::new(state));
    log::debug!("session {id} started for {}", body.template);

    Ok((StatusCode::CREATED, Json(view)))
}

async fn get_session(
    State(app): State<Shared>,
    Path(id): Path<String>,
) -> Result<Json<SessionView>, ApiError> {
    app.with_session(&id, |sequencer, state| {
        Ok(Json(SessionView::new(&id, sequencer, state)))
    })
}

/// Set values of the current step. Either all of them are stored or none.
async fn put_values(
    State(app): State<Shared>,
    Path(id): Path<String>,
    Json(values): Json<Values>,
) -> Result<Json<SessionView>, ApiError> {
    app.with_session(&id, |sequencer, state| {
        let mut next = state.clone();
        for (field, value) in values {
            sequencer.set_value(&mut next, field.as_str(), value)?;
        }
        *state = next;
        Ok(Json(SessionView::new(&id, sequencer, state)))
    })
}

async fn advance(
    State(app): State<Shared>,
    Path(id): Path<String>,
) -> Result<Json<AdvanceView>, ApiError> {
    app.with_session(&id, |sequencer, state| {
        let violations = match sequencer.advance(state)? {
            Advance::Moved(_) => Vec::new(),
            Advance::Blocked(violations) => violations,
        };
        Ok(Json(AdvanceView {
            moved: violations.is_empty(),
            violations,
            session: SessionView::new(&id, sequencer, state),
        }))
    })
}

async fn retreat(
    State(app): State<Shared>,
    Path(id): Path<String>,
) -> Result<Json<SessionView>, ApiError> {
    app.with_session(&id, |sequencer, state| {
        sequencer.retreat(state)?;
        Ok(Json(SessionView::new(&id, sequencer, state)))
    })
}

async fn document(
    State(app): State<Shared>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let request = app.with_session(&id, |sequencer, state| {
        Ok(sequencer.build_render_request(state)?)
    })?;
    let filename = format!("{}.pdf", request.template);

    let renderer = Arc::clone(&app.context.renderer);
    let rendered = tokio::task::spawn_blocking(move || renderer.render(&request))
        .await
        .map_err(|e| {
            log::error!("render task for session {id} did not finish: {e}");
            ApiError::Internal(MSG_RENDER_FAILED)
        })?
        .map_err(|e| {
            log::error!("render for session {id} failed: {e}");
            ApiError::Internal(MSG_RENDER_FAILED)
        })?;

    // Delivered documents end the session.
    app.sessions()?.remove(&id);
    log::debug!("session {id} finished");

    let warning_count = rendered.warnings.len();
    let mut response = (
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        rendered.bytes,
    )
        .into_response();
    if warning_count > 0 {
        response.headers_mut().insert(
            HeaderName::from_static("x-autoly-warnings"),
            HeaderValue::from(warning_count),
        );
    }

    Ok(response)
}

async fn delete_session(
    State(app): State<Shared>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    match app.sessions()?.remove(&id) {
        Some(_) => Ok(StatusCode::NO_CONTENT),
        None => Err(ApiError::NotFound(format!("Unknown session: {id}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use autoly_core::Catalog;
    use axum::body::Body;
    use axum::http::Request;
    use lopdf::{dictionary, Document, Object, Stream};
    use pdf::{FontAsset, Renderer};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    const DEMO: &str = include_str!("../../../demos/so-yeu-ly-lich.json");
    const FONT: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/../../fonts/DejaVuSans.ttf");

    /// Two blank A4 pages, like the real personal-history template.
    fn write_template(dir: &std::path::Path) {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let mut kids = Vec::new();
        for _ in 0..2 {
            let content_id = doc.add_object(Stream::new(dictionary! {}, Vec::new()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            });
            kids.push(Object::Reference(page_id));
        }
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => 2,
                "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        doc.save(dir.join(autoly_core::builtin::TEMPLATE_FILE)).unwrap();
    }

    fn context(template_dir: &std::path::Path) -> Context {
        let font = FontAsset::load(std::path::Path::new(FONT)).unwrap();
        Context {
            catalog: Arc::new(Catalog::builtin().unwrap()),
            renderer: Arc::new(Renderer::new(template_dir, font)),
        }
    }

    fn app(template_dir: &std::path::Path) -> Router {
        router(context(template_dir))
    }

    async fn call(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Vec<u8>) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, bytes.to_vec())
    }

    async fn call_json(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let (status, bytes) = call(app, method, uri, body).await;
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    async fn start(app: &Router) -> String {
        let (status, session) =
            call_json(app, "POST", "/sessions", Some(json!({ "template": "so-yeu-ly-lich" }))).await;
        assert_eq!(status, StatusCode::CREATED);
        session["id"].as_str().unwrap().to_string()
    }

    /// Enter the demo answers step by step until the session is complete.
    async fn complete(app: &Router, id: &str) {
        let demo: serde_json::Map<String, Value> = serde_json::from_str(DEMO).unwrap();
        loop {
            let (_, session) = call_json(app, "GET", &format!("/sessions/{id}"), None).await;
            if session["cursor"]["state"] == "complete" {
                return;
            }
            let step = &session["step"];
            let mut ids: Vec<&str> = step["fields"]
                .as_array()
                .unwrap()
                .iter()
                .filter_map(Value::as_str)
                .collect();
            ids.extend(step["repeat_group"].as_str());
            let values: serde_json::Map<String, Value> = ids
                .into_iter()
                .filter_map(|field| demo.get(field).map(|v| (field.to_string(), v.clone())))
                .collect();

            let (status, _) =
                call_json(app, "PUT", &format!("/sessions/{id}/values"), Some(Value::Object(values)))
                    .await;
            assert_eq!(status, StatusCode::OK);
            let (_, outcome) = call_json(app, "POST", &format!("/sessions/{id}/advance"), None).await;
            assert_eq!(outcome["moved"], true, "{outcome}");
        }
    }

    #[tokio::test]
    async fn test_list_templates_and_steps() {
        let dir = tempfile::tempdir().unwrap();
        let app = app(dir.path());

        let (status, templates) = call_json(&app, "GET", "/templates", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(templates.as_array().unwrap().len(), 3);

        let (status, steps) = call_json(&app, "GET", "/templates/vien-chuc/steps", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(steps[0]["name"], "core_identity");

        let (status, _) = call_json(&app, "GET", "/templates/unregistered-template/steps", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_unknown_template_session() {
        let dir = tempfile::tempdir().unwrap();
        let app = app(dir.path());
        let (status, body) =
            call_json(&app, "POST", "/sessions", Some(json!({ "template": "nope" }))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["error"].as_str().unwrap().contains("nope"));
    }

    #[tokio::test]
    async fn test_blocked_advance_keeps_cursor() {
        let dir = tempfile::tempdir().unwrap();
        let app = app(dir.path());
        let id = start(&app).await;

        let (status, _) = call_json(
            &app,
            "PUT",
            &format!("/sessions/{id}/values"),
            Some(json!({ "dob": "not-a-date" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (_, outcome) = call_json(&app, "POST", &format!("/sessions/{id}/advance"), None).await;
        assert_eq!(outcome["moved"], false);
        assert_eq!(outcome["session"]["cursor"], json!({ "state": "step", "index": 0 }));
        let violations = outcome["violations"].as_array().unwrap();
        assert!(violations.iter().any(|v| v["field"] == "dob"));
    }

    #[tokio::test]
    async fn test_values_outside_step_rejected_atomically() {
        let dir = tempfile::tempdir().unwrap();
        let app = app(dir.path());
        let id = start(&app).await;

        let (status, _) = call_json(
            &app,
            "PUT",
            &format!("/sessions/{id}/values"),
            Some(json!({ "full_name": "NGUYỄN VĂN A", "phone": "0987654321" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (_, session) = call_json(&app, "GET", &format!("/sessions/{id}"), None).await;
        assert_eq!(session["values"], json!({}));
    }

    #[tokio::test]
    async fn test_document_before_complete_conflicts() {
        let dir = tempfile::tempdir().unwrap();
        let app = app(dir.path());
        let id = start(&app).await;
        let (status, _) = call(&app, "GET", &format!("/sessions/{id}/document"), None).await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_full_session_downloads_pdf() {
        let dir = tempfile::tempdir().unwrap();
        write_template(dir.path());
        let app = app(dir.path());
        let id = start(&app).await;
        complete(&app, &id).await;

        let (status, bytes) = call(&app, "GET", &format!("/sessions/{id}/document"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(bytes.starts_with(b"%PDF"));

        let spans = pdf::extract_spans(&bytes, 0).unwrap();
        let texts: Vec<&str> = spans.iter().map(|s| s.text.as_str()).collect();
        assert!(texts.contains(&"NGUYỄN VĂN A"), "{texts:?}");
        assert!(texts.contains(&"Hà Nội"), "{texts:?}");
        assert!(spans.iter().all(|s| s.font_name == "DejaVuSans"));
    }

    #[tokio::test]
    async fn test_download_ends_session() {
        let dir = tempfile::tempdir().unwrap();
        write_template(dir.path());
        let app = app(dir.path());
        let id = start(&app).await;
        complete(&app, &id).await;

        let (status, _) = call(&app, "GET", &format!("/sessions/{id}/document"), None).await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = call(&app, "GET", &format!("/sessions/{id}"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = call(&app, "GET", &format!("/sessions/{id}/document"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_idle_session_expires_on_access() {
        let dir = tempfile::tempdir().unwrap();
        let app = routes(AppState::new(context(dir.path()), Duration::from_millis(300)));
        let id = start(&app).await;

        tokio::time::sleep(Duration::from_millis(200)).await;
        let (status, _) = call(&app, "GET", &format!("/sessions/{id}"), None).await;
        assert_eq!(status, StatusCode::OK);

        // Still alive: the read above reset the idle clock.
        tokio::time::sleep(Duration::from_millis(200)).await;
        let (status, _) = call(&app, "GET", &format!("/sessions/{id}"), None).await;
        assert_eq!(status, StatusCode::OK);

        tokio::time::sleep(Duration::from_millis(500)).await;
        let (status, _) = call(&app, "GET", &format!("/sessions/{id}"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_sweeper_evicts_idle_sessions() {
        let dir = tempfile::tempdir().unwrap();
        let state = AppState::new(context(dir.path()), Duration::from_millis(50));
        let app = routes(Arc::clone(&state));
        start(&app).await;
        assert_eq!(state.sessions.lock().unwrap().len(), 1);

        tokio::time::sleep(Duration::from_millis(100)).await;
        let sweeper = tokio::spawn(sweep_sessions(
            Arc::downgrade(&state),
            Duration::from_millis(10),
        ));
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(state.sessions.lock().unwrap().is_empty());

        drop(app);
        drop(state);
        tokio::time::timeout(Duration::from_secs(1), sweeper)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_render_failure_is_generic_and_keeps_session() {
        let dir = tempfile::tempdir().unwrap();
        let app = app(dir.path());
        let id = start(&app).await;
        complete(&app, &id).await;

        let (status, body) = call_json(&app, "GET", &format!("/sessions/{id}/document"), None).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], MSG_RENDER_FAILED);

        let (status, session) = call_json(&app, "GET", &format!("/sessions/{id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(session["cursor"]["state"], "complete");
    }

    #[tokio::test]
    async fn test_retreat_and_delete() {
        let dir = tempfile::tempdir().unwrap();
        let app = app(dir.path());
        let id = start(&app).await;

        let (status, session) = call_json(&app, "POST", &format!("/sessions/{id}/retreat"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(session["cursor"]["index"], 0);

        let (status, _) = call(&app, "DELETE", &format!("/sessions/{id}"), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _) = call(&app, "GET", &format!("/sessions/{id}"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
