use axum::{
    Form, Json, Router,
    body::Body,
    extract::{Multipart, Path, RawQuery, State},
    http::{StatusCode, header},
    response::{Html, IntoResponse, Redirect, Response},
    routing::{delete, get, post},
};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use chrono::Utc;
use log::{debug, error, info};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::chart::{ChartDimension, ChartType};
use crate::config::Config;
use crate::deeplink::DeepLink;
use crate::downloader::ExportFormat;
use crate::error::DatavisError;
use crate::graph::PlottersExporter;
use crate::loader::parser_for;
use crate::login::{Identity, SessionTable};
use crate::reconciler::{Navigation, Workspace};
use crate::saving::FileStore;
use crate::storage::SharedStore;

const SESSION_COOKIE: &str = "session";

type Store = SharedStore<FileStore>;

pub struct AppState {
    store: Store,
    sessions: Mutex<SessionTable>,
    workspaces: Mutex<HashMap<String, Workspace<Store>>>,
    exporter: PlottersExporter,
    preview_rows: usize,
}

impl AppState {
    /// Open the durable store named by `config`
    pub fn new(config: &Config) -> crate::error::Result<Self> {
        let store = FileStore::open(config.store_path())?;
        Ok(Self::with_store(store, config.preview_rows))
    }

    pub fn with_store(store: FileStore, preview_rows: usize) -> Self {
        Self {
            store: SharedStore::new(store),
            sessions: Mutex::new(SessionTable::new()),
            workspaces: Mutex::new(HashMap::new()),
            exporter: PlottersExporter::default(),
            preview_rows,
        }
    }

    pub fn with_exporter(mut self, exporter: PlottersExporter) -> Self {
        self.exporter = exporter;
        self
    }

    fn open_workspace(&self, identity: Identity) -> crate::error::Result<Workspace<Store>> {
        let mut ws = Workspace::new(self.store.clone()).with_preview_rows(self.preview_rows);
        ws.on_identity_change(Some(identity))?;
        Ok(ws)
    }

    /// Forget expired sessions together with their workspaces
    fn sweep_expired(&self) -> Result<(), ApiError> {
        let expired = lock(&self.sessions)?.sweep();
        if !expired.is_empty() {
            let mut workspaces = lock(&self.workspaces)?;
            for token in &expired {
                workspaces.remove(token);
            }
        }
        Ok(())
    }

    /// Run `f` on the workspace behind the request's session cookie
    fn with_workspace<R>(
        &self,
        jar: &CookieJar,
        f: impl FnOnce(&mut Workspace<Store>) -> crate::error::Result<R>,
    ) -> Result<R, ApiError> {
        let token = jar
            .get(SESSION_COOKIE)
            .map(|c| c.value().to_string())
            .ok_or(DatavisError::NotAuthenticated)?;

        self.sweep_expired()?;
        let identity = lock(&self.sessions)?.validate(&token);
        let mut workspaces = lock(&self.workspaces)?;
        let Some(identity) = identity else {
            workspaces.remove(&token);
            return Err(DatavisError::NotAuthenticated.into());
        };

        if !workspaces.contains_key(&token) {
            let ws = self.open_workspace(identity)?;
            workspaces.insert(token.clone(), ws);
        }
        let ws = workspaces
            .get_mut(&token)
            .ok_or(DatavisError::NotAuthenticated)?;
        Ok(f(ws)?)
    }
}

/// Error responses as JSON `{status, message}`
#[derive(Debug)]
pub struct ApiError(DatavisError);

impl From<DatavisError> for ApiError {
    fn from(e: DatavisError) -> Self {
        ApiError(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            DatavisError::NotAuthenticated => StatusCode::UNAUTHORIZED,
            DatavisError::Parse(_)
            | DatavisError::InvalidChartType(_)
            | DatavisError::InvalidDimension(_)
            | DatavisError::InvalidIdentity(_) => StatusCode::BAD_REQUEST,
            _ => {
                error!("request failed: {}", self.0);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        let body = serde_json::json!({
            "status": "error",
            "message": self.0.to_string(),
        });
        (status, Json(body)).into_response()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, ApiError> {
    mutex
        .lock()
        .map_err(|_| ApiError(DatavisError::Storage("server state lock poisoned".to_string())))
}

#[derive(Deserialize)]
struct Credentials {
    email: String,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct ChartUpdate {
    chart_type: Option<String>,
    chart_dimension: Option<String>,
    x_axis: Option<String>,
    y_axis: Option<String>,
}

/// Build the router over `state`
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(dashboard))
        .route("/login", get(serve_login_page).post(handle_login))
        .route("/signup", post(handle_login))
        .route("/logout", post(handle_logout))
        .route("/upload", post(upload))
        .route("/clear", post(clear))
        .route("/chart", post(update_chart))
        .route("/chart/:format", get(download_chart))
        .route("/history", get(list_history).post(save_history))
        .route("/history/:id", delete(delete_history))
        .route("/history/:id/link", get(open_history))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn run(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let state = Arc::new(AppState::new(&config)?);
    let app = router(state);

    let listener = TcpListener::bind(&config.addr).await?;
    info!("Listening on http://{}", config.addr);
    axum::serve(listener, app).await?;

    Ok(())
}

async fn serve_login_page() -> Html<&'static str> {
    Html(
        "<!doctype html><title>DataVis Canvas</title>\
         <form method=\"post\" action=\"/login\">\
         <input type=\"email\" name=\"email\" placeholder=\"you@example.com\" required>\
         <button type=\"submit\">Sign in</button></form>",
    )
}

// Sign-up and sign-in are the same operation: the email is the identity
async fn handle_login(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Form(credentials): Form<Credentials>,
) -> Result<Response, ApiError> {
    let identity = Identity::new(&credentials.email)?;
    state.sweep_expired()?;
    let ws = state.open_workspace(identity.clone())?;

    let token = lock(&state.sessions)?.create(identity.clone());
    lock(&state.workspaces)?.insert(token.clone(), ws);
    info!("{} signed in", identity);

    let cookie = Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true);
    Ok((jar.add(cookie), Redirect::to("/")).into_response())
}

async fn handle_logout(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> Result<(CookieJar, Redirect), ApiError> {
    if let Some(token) = jar.get(SESSION_COOKIE).map(|c| c.value().to_string()) {
        if let Some(mut ws) = lock(&state.workspaces)?.remove(&token) {
            ws.on_identity_change(None)?;
        }
        if let Some(identity) = lock(&state.sessions)?.end(&token) {
            info!("{} signed out", identity);
        }
    }
    Ok((
        jar.remove(Cookie::build(SESSION_COOKIE).path("/")),
        Redirect::to("/login"),
    ))
}

/// Dashboard state, or a redirect when the URL carried a deep link
async fn dashboard(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    RawQuery(query): RawQuery,
) -> Response {
    let link = DeepLink::from_query(query.as_deref().unwrap_or(""));
    let result = state.with_workspace(&jar, |ws| {
        if ws.on_url_change(&link)? == Navigation::StripParams {
            return Ok(None);
        }
        Ok(Some(dashboard_json(ws)))
    });

    match result {
        Ok(Some(body)) => Json(body).into_response(),
        Ok(None) => Redirect::to("/").into_response(),
        Err(ApiError(DatavisError::NotAuthenticated)) => Redirect::to("/login").into_response(),
        Err(e) => e.into_response(),
    }
}

async fn upload(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    mut multipart: Multipart,
) -> Result<Json<serde_json::Value>, ApiError> {
    let mut file = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| DatavisError::Parse(e.to_string()))?
    {
        if field.name() == Some("file") {
            let name = field.file_name().unwrap_or("upload.csv").to_string();
            let bytes = field
                .bytes()
                .await
                .map_err(|e| DatavisError::Parse(e.to_string()))?;
            file = Some((name, bytes));
        }
    }
    let (name, bytes) = file.ok_or_else(|| DatavisError::Parse("No file data received".to_string()))?;
    debug!("upload of {} ({} bytes)", name, bytes.len());

    state.with_workspace(&jar, |ws| {
        ws.upload(parser_for(&name), &name, &bytes)?;
        Ok(Json(dashboard_json(ws)))
    })
}

async fn clear(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.with_workspace(&jar, |ws| {
        ws.clear_data()?;
        Ok(Json(dashboard_json(ws)))
    })
}

async fn update_chart(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Json(update): Json<ChartUpdate>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let chart_type = update
        .chart_type
        .as_deref()
        .map(str::parse::<ChartType>)
        .transpose()?;
    let dimension = update
        .chart_dimension
        .as_deref()
        .map(str::parse::<ChartDimension>)
        .transpose()?;

    state.with_workspace(&jar, |ws| {
        if let Some(t) = chart_type {
            ws.set_chart_type(t);
        }
        if let Some(d) = dimension {
            ws.set_chart_dimension(d);
        }
        if let Some(x) = update.x_axis {
            ws.set_x_axis(Some(x).filter(|x| !x.is_empty()));
        }
        if let Some(y) = update.y_axis {
            ws.set_y_axis(Some(y).filter(|y| !y.is_empty()));
        }
        Ok(Json(dashboard_json(ws)))
    })
}

async fn download_chart(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Path(format): Path<String>,
) -> Result<Response, ApiError> {
    let format = match format.as_str() {
        "png" => ExportFormat::Png,
        "pdf" => ExportFormat::Pdf,
        _ => return Ok(StatusCode::NOT_FOUND.into_response()),
    };

    state.with_workspace(&jar, |ws| {
        let Some(file) = ws.export(format, &state.exporter) else {
            let body = serde_json::json!({
                "status": "error",
                "notifications": ws.drain_notifications(),
            });
            return Ok((StatusCode::UNPROCESSABLE_ENTITY, Json(body)).into_response());
        };

        Ok(Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, file.format.mime_type())
            .header(
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", file.file_name),
            )
            .body(Body::from(file.bytes))
            .map_err(|e| DatavisError::Export(e.to_string()))?)
    })
}

async fn list_history(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.with_workspace(&jar, |ws| Ok(Json(history_json(ws))))
}

async fn save_history(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.with_workspace(&jar, |ws| {
        let saved = ws.save_analysis()?;
        Ok(Json(serde_json::json!({
            "saved": saved.map(|entry| entry.id),
            "notifications": ws.drain_notifications(),
        })))
    })
}

async fn delete_history(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    state.with_workspace(&jar, |ws| {
        if !ws.delete_analysis(&id)? {
            return Ok(StatusCode::NOT_FOUND.into_response());
        }
        Ok(Json(serde_json::json!({ "notifications": ws.drain_notifications() })).into_response())
    })
}

// Replays a saved analysis through the same deep-link path as a shared URL
async fn open_history(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    state.with_workspace(&jar, |ws| {
        Ok(match ws.history_link(&id) {
            Some(link) => Redirect::to(&format!("/?{}", link.to_query())).into_response(),
            None => StatusCode::NOT_FOUND.into_response(),
        })
    })
}

fn history_json(ws: &Workspace<Store>) -> serde_json::Value {
    let now = Utc::now();
    let entries: Vec<_> = ws
        .history()
        .entries()
        .iter()
        .map(|entry| {
            serde_json::json!({
                "id": entry.id,
                "title": entry.title(),
                "fileName": entry.file_name,
                "xAxis": entry.x_axis,
                "yAxis": entry.y_axis,
                "savedAgo": entry.saved_ago(now),
                "link": format!("/history/{}/link", urlencoding::encode(&entry.id)),
            })
        })
        .collect();
    serde_json::Value::Array(entries)
}

fn dashboard_json(ws: &mut Workspace<Store>) -> serde_json::Value {
    let config = ws.config().clone();
    serde_json::json!({
        "email": ws.identity().map(Identity::email),
        "fileName": ws.file_name(),
        "columns": ws.columns(),
        "chartType": config.chart_type,
        "chartDimension": config.chart_dimension,
        "xAxis": config.x_axis,
        "yAxis": config.y_axis,
        "share": ws.share_link().map(|link| format!("/?{}", link.to_query())),
        "rows": ws.table_preview(),
        "totalRows": ws.dataset().len(),
        "suggestions": ws.suggestions(),
        "history": history_json(ws),
        "notifications": ws.drain_notifications(),
    })
}
