//! HTTP Front End
//!
//! Remote-mode function server. The database engine posts encoded batches to
//! `/invoke`; the reflection routes describe the registered endpoints as
//! `CREATE EXTERNAL FUNCTION` statements or JSON.
//!
//! | Route | Method | Response |
//! |-------|--------|----------|
//! | `/invoke` | POST | encoded result batch |
//! | `/show/create_function` | GET | newline-joined SQL |
//! | `/show/function_info`, `/` | GET | JSON endpoint description |
//! | `/status` | GET | `{"status": "ok"}` |
//!
//! Everything else is a 404 with an empty body.

pub mod error;
pub mod handlers;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    routing::{get, post},
    Extension, Router,
};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::codec::{Codecs, DATA_VERSION};
use crate::config::{Config, HttpConfig, SqlConfig};
use crate::error::{ExtFuncError, ExtFuncResult};
use crate::registry::Registry;
use crate::sql::{AppMode, SqlOptions};

/// Shared state behind every route.
pub struct AppState {
    pub registry: Arc<Registry>,
    pub codecs: Arc<Codecs>,
    /// Data version assumed when `s2-ef-version` is absent
    pub data_version: String,
    pub sql: SqlConfig,
    /// Advertised service URL; reflected from the Host header when unset
    pub url: Option<String>,
    pub metrics: bool,
    pool: Option<Arc<rayon::ThreadPool>>,
}

impl AppState {
    /// Built-in codecs, inline invocation, metrics on.
    pub fn new(registry: Arc<Registry>) -> Self {
        AppState {
            registry,
            codecs: Arc::new(Codecs::new(true)),
            data_version: DATA_VERSION.to_string(),
            sql: SqlConfig::default(),
            url: None,
            metrics: true,
            pool: None,
        }
    }

    pub fn from_config(registry: Arc<Registry>, config: &Config) -> ExtFuncResult<Self> {
        AppState {
            registry,
            codecs: Arc::new(Codecs::new(config.codec.accelerated)),
            data_version: config.codec.data_version.clone(),
            sql: config.sql.clone(),
            url: config.http.url.clone(),
            metrics: !config.logging.disable_metrics,
            pool: None,
        }
        .with_workers(config.http.worker_threads)
    }

    /// Run invocations on a fixed pool of `threads` workers. Zero keeps them
    /// on the request task.
    pub fn with_workers(mut self, threads: usize) -> ExtFuncResult<Self> {
        self.pool = if threads == 0 {
            None
        } else {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .thread_name(|i| format!("extfunc-worker-{i}"))
                .build()
                .map_err(|e| ExtFuncError::Other(format!("failed to build worker pool: {e}")))?;
            Some(Arc::new(pool))
        };
        Ok(self)
    }

    pub fn worker_threads(&self) -> usize {
        self.pool.as_ref().map_or(0, |p| p.current_num_threads())
    }

    /// Statement options for a service reachable at `url`.
    pub fn sql_options(&self, url: String) -> SqlOptions {
        self.sql.options(url, AppMode::Remote)
    }

    /// Run `f` inline, or on the worker pool with the result handed back
    /// over a oneshot channel.
    pub async fn run<T, F>(&self, f: F) -> ExtFuncResult<T>
    where
        F: FnOnce() -> ExtFuncResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let Some(pool) = &self.pool else {
            return f();
        };
        let (tx, rx) = tokio::sync::oneshot::channel();
        pool.spawn(move || {
            let _ = tx.send(f());
        });
        rx.await
            .map_err(|_| ExtFuncError::Other("invocation worker dropped its result".to_string()))?
    }
}

/// Creates the Axum router
pub fn create_router(state: Arc<AppState>, config: &HttpConfig) -> Router {
    Router::new()
        .route(
            "/invoke",
            post(handlers::invoke).fallback(handlers::not_found),
        )
        .route(
            "/show/create_function",
            get(handlers::show_create_function).fallback(handlers::not_found),
        )
        .route(
            "/show/function_info",
            get(handlers::show_function_info).fallback(handlers::not_found),
        )
        .route(
            "/",
            get(handlers::show_function_info).fallback(handlers::not_found),
        )
        .route(
            "/status",
            get(handlers::status).fallback(handlers::not_found),
        )
        .fallback(handlers::not_found)
        .layer(Extension(state))
        .layer(RequestBodyLimitLayer::new(config.max_body_bytes))
        .layer(TraceLayer::new_for_http())
}

/// Starts the HTTP server with graceful shutdown support.
///
/// Listens for SIGINT (ctrl-c) and SIGTERM to trigger graceful shutdown.
pub async fn start_http_server(
    state: Arc<AppState>,
    config: &HttpConfig,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let app = create_router(Arc::clone(&state), config);
    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;

    tracing::info!(
        %addr,
        functions = state.registry.len(),
        worker_threads = state.worker_threads(),
        "http_listening"
    );

    let socket = if addr.is_ipv4() {
        tokio::net::TcpSocket::new_v4()?
    } else {
        tokio::net::TcpSocket::new_v6()?
    };
    socket.set_reuseaddr(true)?;
    socket.bind(addr)?;
    let listener = socket.listen(1024)?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!(%addr, "http_stopped");
    Ok(())
}

/// Wait for a shutdown signal (SIGINT or SIGTERM).
pub async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
        Ok(mut sigterm) => {
            tokio::select! {
                _ = ctrl_c => tracing::info!("sigint_received"),
                _ = sigterm.recv() => tracing::info!("sigterm_received"),
            }
        }
        Err(e) => {
            tracing::warn!(error = %e, "sigterm_handler_unavailable");
            if let Err(e) = ctrl_c.await {
                tracing::error!(error = %e, "sigint_handler_unavailable");
            }
        }
    }
}
