//! HTTP front door
//!
//! An axum application with a single fallback handler: paths are
//! normalized and matched by [`Route::parse`] rather than by axum's router,
//! so trailing slashes and percent-encoding behave the same on every path.
//! Middleware (outermost first): request logging, CORS, access control.

use crate::config::Config;
use crate::control::api::Route;
use crate::control::handler::ActionRouter;
use crate::control::response::{self, ActionResult};
use crate::delegate::ProcessDelegate;
use crate::error::{DashboardError, Result};
use crate::security::{authorize, AuthDecision, CorsPolicy, Credentials};
use axum::body::Bytes;
use axum::extract::{Request, State};
use axum::http::{Method, Uri};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::Router;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{debug, info, warn};

/// Shared, immutable per-process state handed to every request
#[derive(Clone)]
pub struct AppState {
    router: ActionRouter,
    cors: Arc<CorsPolicy>,
    credentials: Option<Arc<Credentials>>,
}

impl AppState {
    /// Build state from configuration and a delegate
    pub fn new(config: Arc<Config>, delegate: ProcessDelegate) -> Self {
        let cors = Arc::new(CorsPolicy::new(config.allowed_origins.iter().cloned()));
        let credentials = config.credentials.clone().map(Arc::new);
        Self {
            router: ActionRouter::new(config, delegate),
            cors,
            credentials,
        }
    }

    /// Action router used by the fallback handler
    pub fn router(&self) -> &ActionRouter {
        &self.router
    }
}

/// Build the axum application
pub fn app(state: AppState) -> Router {
    Router::new()
        .fallback(dispatch)
        .layer(middleware::from_fn_with_state(state.clone(), access_control))
        .layer(middleware::from_fn_with_state(state.clone(), cors))
        .layer(middleware::from_fn(log_request))
        .with_state(state)
}

async fn dispatch(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    body: Bytes,
) -> ActionResult {
    let route = Route::parse(&method, uri.path(), &body);
    debug!(?route, "Parsed route");
    state.router.dispatch(route).await
}

/// Adds CORS headers to every response, including 401 and 404
async fn cors(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let headers = state.cors.headers_for_request(request.headers());
    let mut response = next.run(request).await;
    response.headers_mut().extend(headers);
    response
}

/// Rejects requests without valid credentials; pre-flight is exempt
async fn access_control(State(state): State<AppState>, request: Request, next: Next) -> Response {
    if *request.method() == Method::OPTIONS {
        return next.run(request).await;
    }

    match authorize(request.headers(), state.credentials.as_deref()) {
        AuthDecision::Allowed => next.run(request).await,
        AuthDecision::Unauthorized => {
            warn!(
                method = %request.method(),
                path = %request.uri().path(),
                "Unauthorized request"
            );
            response::unauthorized()
        }
    }
}

async fn log_request(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let started = Instant::now();

    let response = next.run(request).await;

    info!(
        %method,
        %path,
        status = response.status().as_u16(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Request handled"
    );
    response
}

/// Dashboard HTTP server
pub struct DashboardServer {
    config: Arc<Config>,
    state: AppState,
}

impl DashboardServer {
    /// Create a server for `config`, delegating to `delegate`
    pub fn new(config: Arc<Config>, delegate: ProcessDelegate) -> Self {
        let state = AppState::new(Arc::clone(&config), delegate);
        Self { config, state }
    }

    /// Bind the configured address
    pub async fn bind(&self) -> Result<TcpListener> {
        let addr = self.config.server.bind_addr();
        TcpListener::bind(&addr).await.map_err(|e| {
            DashboardError::Config(format!("Failed to bind {}: {}", addr, e))
        })
    }

    /// Bind and serve until `shutdown` resolves
    pub async fn run<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = self.bind().await?;
        self.serve(listener, shutdown).await
    }

    /// Serve on an already-bound listener until `shutdown` resolves
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if let Ok(addr) = listener.local_addr() {
            info!(
                %addr,
                engines = self.config.engines.len(),
                auth = self.config.credentials.is_some(),
                "Dashboard listening"
            );
        }

        axum::serve(listener, app(self.state).into_make_service())
            .with_graceful_shutdown(shutdown)
            .await?;

        info!("Dashboard stopped");
        Ok(())
    }
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            info!("Received SIGTERM signal");
        },
    }
}
