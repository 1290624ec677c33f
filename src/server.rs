//! HTTP surface: router, handlers and server startup.

use crate::config::Config;
use crate::csrf::{CsrfError, CsrfGuard};
use crate::flash::Flash;
use crate::model::{TaskFilter, TaskStats};
use crate::pages::{self, CreatePage, FormValues, ListPage};
use crate::session::{session_layer, MemorySessionStore, Session, SessionStore};
use crate::storage::{StoreError, TaskStore};
use crate::validation::{
    sanitize, sanitize_search_query, validate_priority_filter, Field, FieldErrors, TaskForm,
};
use anyhow::{Context, Result};
use axum::extract::{Query, State};
use axum::http::header::CONTENT_TYPE;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::routing::get;
use axum::{middleware, Extension, Form, Router};
use serde::Deserialize;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tokio::task::JoinError;
use tower_http::trace::TraceLayer;

pub struct AppState {
    pub store: TaskStore,
    pub sessions: Arc<dyn SessionStore>,
}

impl AppState {
    pub fn new(store: TaskStore) -> Self {
        Self::with_sessions(store, Arc::new(MemorySessionStore::new()))
    }

    pub fn with_sessions(store: TaskStore, sessions: Arc<dyn SessionStore>) -> Self {
        AppState { store, sessions }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum HandlerError {
    #[error(transparent)]
    Csrf(#[from] CsrfError),
    #[error("store task did not complete: {0}")]
    Blocking(#[from] JoinError),
}

impl IntoResponse for HandlerError {
    fn into_response(self) -> Response {
        match self {
            HandlerError::Csrf(err) => err.into_response(),
            HandlerError::Blocking(err) => {
                tracing::error!(error = %err, "store task did not complete");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response()
            }
        }
    }
}

/// Runs a store call on the blocking pool.
async fn with_store<T, F>(state: &Arc<AppState>, f: F) -> Result<T, HandlerError>
where
    F: FnOnce(&TaskStore) -> T + Send + 'static,
    T: Send + 'static,
{
    let state = Arc::clone(state);
    Ok(tokio::task::spawn_blocking(move || f(&state.store)).await?)
}

pub fn router(state: Arc<AppState>) -> Router {
    let sessions = state.sessions.clone();
    Router::new()
        .route("/", get(index))
        .route("/create", get(create_form).post(create))
        .route("/actions", axum::routing::post(actions))
        .route("/assets/style.css", get(stylesheet))
        .layer(middleware::from_fn_with_state(sessions, session_layer))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn serve(config: &Config) -> Result<()> {
    let state = Arc::new(AppState::new(TaskStore::new(&config.data_file)));
    let app = router(state);

    let listener = TcpListener::bind(config.addr)
        .await
        .with_context(|| format!("binding {}", config.addr))?;
    tracing::info!(addr = %config.addr, data = ?config.data_file, "taskpad listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving http")?;
    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(error) = signal::ctrl_c().await {
        tracing::warn!(%error, "failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
    tracing::info!("received Ctrl+C, shutting down");
}

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub q: Option<String>,
    pub priority: Option<String>,
}

async fn index(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
    Query(query): Query<ListQuery>,
) -> Result<Html<String>, HandlerError> {
    let filter = TaskFilter {
        query: query.q.as_deref().map(sanitize_search_query).unwrap_or_default(),
        priority: query.priority.as_deref().and_then(validate_priority_filter),
    };
    let all = with_store(&state, TaskStore::load_all).await?;
    let page = ListPage {
        flash: Flash::new(&session).render_all(),
        csrf_field: CsrfGuard::new(&session).hidden_field(),
        filter: &filter,
        stats: TaskStats::of(&all),
        tasks: filter.apply(&all),
    };
    Ok(Html(pages::list_page(&page)))
}

async fn create_form(Extension(session): Extension<Session>) -> Html<String> {
    render_form(&session, &FormValues::default(), &FieldErrors::default())
}

#[derive(Debug, Default, Deserialize)]
pub struct CreateRequest {
    pub csrf_token: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub priority: Option<String>,
    pub due: Option<String>,
}

async fn create(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
    Form(request): Form<CreateRequest>,
) -> Result<Response, HandlerError> {
    CsrfGuard::new(&session).require(request.csrf_token.as_deref())?;

    let form = TaskForm {
        title: request.title,
        description: request.description,
        priority: request.priority,
        due: request.due,
    };
    let values = FormValues {
        title: form.title.clone().unwrap_or_default(),
        description: form.description.clone().unwrap_or_default(),
        priority: form.priority.clone().unwrap_or_else(|| FormValues::default().priority),
        due: form.due.clone().unwrap_or_default(),
    };

    let mut errors = match sanitize(&form).into_new_task() {
        Ok(input) => match with_store(&state, move |store| store.add(input)).await? {
            Ok(_) => {
                Flash::new(&session).set("success", "Task created successfully!");
                return Ok(Redirect::to("/").into_response());
            }
            Err(err) => {
                tracing::error!(error = %err, "saving new task");
                FieldErrors::default()
            }
        },
        Err(errors) => errors,
    };
    if errors.is_empty() {
        errors.insert(Field::General, "Failed to save task. Please try again.");
    }
    Ok(render_form(&session, &values, &errors).into_response())
}

fn render_form(session: &Session, values: &FormValues, errors: &FieldErrors) -> Html<String> {
    Html(pages::create_page(&CreatePage {
        csrf_field: CsrfGuard::new(session).hidden_field(),
        values,
        errors,
    }))
}

#[derive(Debug, Default, Deserialize)]
pub struct ActionRequest {
    pub csrf_token: Option<String>,
    pub action: Option<String>,
    pub id: Option<String>,
}

async fn actions(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
    Form(request): Form<ActionRequest>,
) -> Result<Redirect, HandlerError> {
    CsrfGuard::new(&session).require(request.csrf_token.as_deref())?;
    let flash = Flash::new(&session);

    let action = request.action.unwrap_or_default();
    let id = request.id.unwrap_or_default();
    if action.is_empty() || id.is_empty() {
        flash.set("error", "Invalid request");
        return Ok(Redirect::to("/"));
    }

    match action.as_str() {
        "complete" => match with_store(&state, move |store| store.complete(&id)).await? {
            Ok(_) => flash.set("success", "Task marked as complete!"),
            Err(err) => {
                log_store_failure(&err, "completing task");
                flash.set("error", "Failed to complete task");
            }
        },
        "delete" => match with_store(&state, move |store| store.delete(&id)).await? {
            Ok(_) => flash.set("success", "Task deleted successfully!"),
            Err(err) => {
                log_store_failure(&err, "deleting task");
                flash.set("error", "Failed to delete task");
            }
        },
        _ => flash.set("error", "Invalid action"),
    }
    Ok(Redirect::to("/"))
}

fn log_store_failure(err: &StoreError, what: &str) {
    match err {
        StoreError::NotFound(id) => tracing::info!(%id, "{what}: no such task"),
        other => tracing::error!(error = %other, "{what}"),
    }
}

async fn stylesheet() -> impl IntoResponse {
    (
        [(CONTENT_TYPE, "text/css; charset=utf-8")],
        include_str!("../assets/style.css"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn store_calls_run_off_the_async_worker() {
        let dir = tempfile::tempdir().unwrap();
        let state = Arc::new(AppState::new(TaskStore::new(dir.path().join("tasks.json"))));
        let on_pool = with_store(&state, |_| std::thread::current().name().map(str::to_string))
            .await
            .unwrap();
        assert_ne!(on_pool, std::thread::current().name().map(str::to_string));
        assert!(with_store(&state, TaskStore::load_all).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn panicked_store_call_is_a_server_error() {
        let dir = tempfile::tempdir().unwrap();
        let state = Arc::new(AppState::new(TaskStore::new(dir.path().join("tasks.json"))));
        let err = with_store(&state, |_| -> usize { panic!("disk on fire") })
            .await
            .unwrap_err();
        assert!(matches!(err, HandlerError::Blocking(_)));
        assert_eq!(err.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
