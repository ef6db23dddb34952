//! axum router and server lifecycle.

use axum::{
    Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
};
use serde::Deserialize;
use std::net::SocketAddr;
use tokio::sync::oneshot;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::error::{ErrorCode, TaskError};
use crate::lifecycle::TaskManager;
use crate::types::{NewTask, Notification, Task, TaskUpdate};

/// Server state shared across handlers.
#[derive(Clone)]
pub struct ApiServer {
    manager: TaskManager,
}

impl ApiServer {
    pub fn new(manager: TaskManager) -> Self {
        Self { manager }
    }

    pub fn manager(&self) -> &TaskManager {
        &self.manager
    }
}

impl IntoResponse for TaskError {
    fn into_response(self) -> Response {
        let status = match self.code {
            ErrorCode::ValidationError | ErrorCode::InvalidPriority => StatusCode::BAD_REQUEST,
            ErrorCode::NotFound => StatusCode::NOT_FOUND,
            ErrorCode::TransientStoreError => StatusCode::SERVICE_UNAVAILABLE,
            ErrorCode::NotifySendError | ErrorCode::InternalError => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        if status.is_server_error() {
            error!(code = self.code.as_str(), error = %self, "Request failed");
        }
        (status, Json(self)).into_response()
    }
}

type ApiResult<T> = Result<T, TaskError>;

#[derive(serde::Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn list_tasks(
    State(state): State<ApiServer>,
    Path(owner): Path<String>,
) -> ApiResult<Json<Vec<Task>>> {
    Ok(Json(state.manager().list(&owner)?))
}

async fn create_task(
    State(state): State<ApiServer>,
    Path(owner): Path<String>,
    Json(input): Json<NewTask>,
) -> ApiResult<(StatusCode, Json<Task>)> {
    let task = state.manager().create(&owner, input)?;
    Ok((StatusCode::CREATED, Json(task)))
}

async fn get_task(
    State(state): State<ApiServer>,
    Path((owner, task_id)): Path<(String, String)>,
) -> ApiResult<Json<Task>> {
    Ok(Json(state.manager().get(&owner, &task_id)?))
}

async fn update_task(
    State(state): State<ApiServer>,
    Path((owner, task_id)): Path<(String, String)>,
    Json(changes): Json<TaskUpdate>,
) -> ApiResult<Json<Task>> {
    Ok(Json(state.manager().update(&owner, &task_id, changes)?))
}

async fn complete_task(
    State(state): State<ApiServer>,
    Path((owner, task_id)): Path<(String, String)>,
) -> ApiResult<Json<Task>> {
    Ok(Json(state.manager().complete(&owner, &task_id)?))
}

async fn delete_task(
    State(state): State<ApiServer>,
    Path((owner, task_id)): Path<(String, String)>,
) -> ApiResult<StatusCode> {
    state.manager().delete(&owner, &task_id)?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Default, Deserialize)]
struct NotificationQuery {
    #[serde(default)]
    unread: bool,
}

async fn list_notifications(
    State(state): State<ApiServer>,
    Path(owner): Path<String>,
    Query(query): Query<NotificationQuery>,
) -> ApiResult<Json<Vec<Notification>>> {
    let notifications = state
        .manager()
        .db()
        .list_notifications(&owner, query.unread)?;
    Ok(Json(notifications))
}

/// Build the router with all routes.
pub fn build_router(state: ApiServer) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/health", get(health))
        .route(
            "/api/users/{owner}/tasks",
            get(list_tasks).post(create_task),
        )
        .route(
            "/api/users/{owner}/tasks/{task_id}",
            get(get_task).patch(update_task).delete(delete_task),
        )
        .route(
            "/api/users/{owner}/tasks/{task_id}/complete",
            post(complete_task),
        )
        .route(
            "/api/users/{owner}/notifications",
            get(list_notifications),
        )
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Handle for a running API server.
pub struct ApiHandle {
    shutdown_tx: Option<oneshot::Sender<()>>,
    addr: SocketAddr,
}

impl ApiHandle {
    /// The address actually bound, useful with port 0.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Trigger graceful shutdown.
    pub fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

/// Bind `bind:port` and serve in the background.
pub async fn start_server(manager: TaskManager, bind: &str, port: u16) -> anyhow::Result<ApiHandle> {
    let app = build_router(ApiServer::new(manager));

    let listener = tokio::net::TcpListener::bind((bind, port)).await?;
    let addr = listener.local_addr()?;

    info!("API server listening on http://{}", addr);

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
                info!("API server shutting down");
            })
            .await
        {
            // The sweeper keeps running without the API
            error!("API server error: {}", e);
        }
    });

    Ok(ApiHandle {
        shutdown_tx: Some(shutdown_tx),
        addr,
    })
}
