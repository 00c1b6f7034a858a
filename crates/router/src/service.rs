use std::future::IntoFuture;

use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::cluster::setup_cluster;
use crate::config::RouterConfig;
use crate::error::{Error, Result};
use crate::proxy::forward;
use crate::router::Router;

/// Client routes: writes to the leader, reads to any reachable node.
pub fn app(router: Router) -> axum::Router {
    axum::Router::new()
        .route("/api/pay", post(leader_proxy))
        .route("/api/recurring", post(leader_proxy))
        .route("/api/status/{order_id}", get(available_proxy))
        .layer(TraceLayer::new_for_http())
        .with_state(router)
}

async fn leader_proxy(State(router): State<Router>, request: Request) -> Response {
    match router.leader().await {
        Some(target) => forward(router.client(), &target, request).await,
        None => {
            warn!(path = %request.uri().path(), "no leader available");
            StatusCode::BAD_GATEWAY.into_response()
        }
    }
}

async fn available_proxy(State(router): State<Router>, request: Request) -> Response {
    match router.available().await {
        Some(target) => forward(router.client(), &target, request).await,
        None => {
            warn!(path = %request.uri().path(), "no backend available");
            StatusCode::BAD_GATEWAY.into_response()
        }
    }
}

/// Joins the configured followers and serves until `shutdown_token` is
/// cancelled.
///
/// # Errors
///
/// Fails if the listener cannot bind.
pub async fn run_router(config: RouterConfig, shutdown_token: CancellationToken) -> Result<()> {
    let router = Router::new(config.backends.clone(), config.probe_timeout);

    let listener = TcpListener::bind(config.listen_addr)
        .await
        .map_err(|e| Error::Io("failed to bind router listener", e))?;
    info!("router listening on http://{}", config.listen_addr);

    let task_tracker = TaskTracker::new();

    if !config.followers.is_empty() {
        let client = router.client().clone();
        let token = shutdown_token.clone();
        task_tracker.spawn(async move {
            tokio::select! {
                joined = setup_cluster(
                    &client,
                    &config.leader,
                    &config.followers,
                    config.join_delay,
                    config.join_timeout,
                ) => {
                    info!(joined, total = config.followers.len(), "cluster setup finished");
                }
                () = token.cancelled() => {}
            }
        });
    }

    let app = app(router);
    let token = shutdown_token.clone();
    task_tracker.spawn(async move {
        tokio::select! {
            e = axum::serve(listener, app.into_make_service()).into_future() => {
                info!("router listener exited {:?}", e);
            }
            () = token.cancelled() => {}
        }
    });
    task_tracker.close();

    shutdown_token.cancelled().await;
    task_tracker.wait().await;
    info!("router shutdown");

    Ok(())
}
