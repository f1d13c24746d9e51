//! extfunc Server Binary
//!
//! Serves a demo function set in either deployment mode.
//!
//! ## Usage
//!
//! ```bash
//! # HTTP on the configured address
//! cargo run --bin extfunc-server -- remote --port 8000
//!
//! # Unix socket with shared-memory batches
//! cargo run --bin extfunc-server -- collocated --socket-path /tmp/extfunc.sock
//! ```
//!
//! ## Demo functions
//!
//! | Name | Signature | Shape |
//! |------|-----------|-------|
//! | `double` | `(x INT) RETURNS INT` | scalar |
//! | `upper` | `(s TEXT) RETURNS TEXT` | scalar |
//! | `add_nullable` | `(a BIGINT, b BIGINT) RETURNS BIGINT` | masked vector |
//! | `vec_scale` | `(x DOUBLE, factor DOUBLE) RETURNS DOUBLE` | vector |

use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::{Arc, OnceLock};
use std::thread;

use anyhow::{anyhow, bail, Context};
use clap::{Parser, Subcommand};

use extfunc::batch::{Column, ColumnData};
use extfunc::config::LoggingConfig;
use extfunc::http::{self, AppState};
use extfunc::sql::create_functions_sql;
use extfunc::{
    codes, AppMode, Codecs, CollocatedServer, ColumnSpec, Config, ConnectionContext, Endpoint,
    InvokeError, Registry, Value,
};

static TRACE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(name = "extfunc-server", version, about = "External function server")]
struct Cli {
    /// Configuration file (default: extfunc.toml + extfunc.local.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log level override (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    mode: Mode,
}

#[derive(Subcommand, Debug)]
enum Mode {
    /// Serve over HTTP
    Remote {
        #[arg(long)]
        host: Option<String>,
        #[arg(long)]
        port: Option<u16>,
        /// Invocation worker threads (0 = inline)
        #[arg(long)]
        workers: Option<usize>,
    },
    /// Serve over a Unix domain socket
    Collocated {
        #[arg(long)]
        socket_path: Option<PathBuf>,
        /// Serve one connection at a time
        #[arg(long)]
        single_thread: bool,
        /// Listen backlog
        #[arg(long)]
        max_connections: Option<usize>,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("failed to load configuration from {}", path.display()))?,
        None => Config::load().context("failed to load configuration")?,
    };
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }
    init_tracing(&config.logging);

    let registry = Arc::new(demo_registry());

    match cli.mode {
        Mode::Remote {
            host,
            port,
            workers,
        } => {
            if let Some(host) = host {
                config.http.host = host;
            }
            if let Some(port) = port {
                config.http.port = port;
            }
            if let Some(workers) = workers {
                config.http.worker_threads = workers;
            }
            run_remote(registry, &config)
        }
        Mode::Collocated {
            socket_path,
            single_thread,
            max_connections,
        } => {
            if let Some(path) = socket_path {
                config.collocated.socket_path = path;
            }
            if let Some(max) = max_connections {
                config.collocated.max_connections = max;
            }
            config.collocated.single_thread |= single_thread;
            run_collocated(registry, &config)
        }
    }
}

fn run_remote(registry: Arc<Registry>, config: &Config) -> anyhow::Result<()> {
    let state = Arc::new(AppState::from_config(registry, config)?);

    println!("extfunc server (remote)");
    println!("Address:   http://{}:{}/invoke", config.http.host, config.http.port);
    println!("Functions: {}", state.registry.names().collect::<Vec<_>>().join(", "));

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;
    runtime
        .block_on(http::start_http_server(state, &config.http))
        .map_err(|e| anyhow!(e))
}

/// `CREATE FUNCTION` statements pointing at the collocated socket.
fn collocated_statements(registry: &Registry, config: &Config) -> anyhow::Result<Vec<String>> {
    if registry.is_empty() {
        bail!("no functions registered; nothing to serve");
    }
    let socket = config.collocated.socket_path.display().to_string();
    let options = config.sql.options(socket, AppMode::Collocated);
    Ok(create_functions_sql(registry, &options, None)?)
}

fn run_collocated(registry: Arc<Registry>, config: &Config) -> anyhow::Result<()> {
    let statements = collocated_statements(&registry, config)?;
    let codec = Codecs::new(config.codec.accelerated)
        .for_format(config.sql.data_format, &config.codec.data_version)?;
    let mut ctx = ConnectionContext::new(Arc::clone(&registry), codec);
    ctx.metrics = !config.logging.disable_metrics;

    let server = CollocatedServer::bind(
        &config.collocated.socket_path,
        config.collocated.max_connections,
        ctx,
    )
    .with_context(|| {
        format!(
            "failed to bind {}",
            config.collocated.socket_path.display()
        )
    })?
    .single_thread(config.collocated.single_thread);

    println!("extfunc server (collocated)");
    println!("Socket:    {}", server.path().display());
    println!("Functions: {}", registry.names().collect::<Vec<_>>().join(", "));
    for statement in &statements {
        tracing::info!(%statement, "create_function");
        println!("{statement}");
    }

    let handle = server.handle();
    let signal_runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start signal runtime")?;
    thread::Builder::new()
        .name("extfunc-signal".to_string())
        .spawn(move || {
            signal_runtime.block_on(http::shutdown_signal());
            handle.shutdown();
        })
        .context("failed to spawn signal thread")?;

    server.run().context("accept loop failed")?;
    Ok(())
}

fn demo_registry() -> Registry {
    let mut registry = Registry::new();

    registry.register(Endpoint::scalar(
        "double",
        vec![ColumnSpec::new("x", codes::LONG)],
        ColumnSpec::new("", codes::LONG),
        |row| match row.first() {
            Some(Value::Int(x)) => x
                .checked_mul(2)
                .map(Value::Int)
                .ok_or_else(|| InvokeError::value(format!("{x} * 2 overflows"))),
            _ => Ok(Value::Null),
        },
    ));

    registry.register(Endpoint::scalar(
        "upper",
        vec![ColumnSpec::new("s", codes::BLOB)],
        ColumnSpec::new("", codes::BLOB),
        |row| match row.first() {
            Some(Value::Text(s)) => Ok(Value::Text(s.to_uppercase())),
            _ => Ok(Value::Null),
        },
    ));

    registry.register(Endpoint::masked_vectors(
        "add_nullable",
        vec![
            ColumnSpec::new("a", codes::LONGLONG),
            ColumnSpec::new("b", codes::LONGLONG),
        ],
        ColumnSpec::new("", codes::LONGLONG),
        add_nullable,
    ));

    registry.register(Endpoint::vectors(
        "vec_scale",
        vec![
            ColumnSpec::new("x", codes::DOUBLE),
            ColumnSpec::new("factor", codes::DOUBLE),
        ],
        ColumnSpec::new("", codes::DOUBLE),
        |cols| {
            let (Some(x), Some(factor)) = (
                cols.first().and_then(ColumnData::as_f64),
                cols.get(1).and_then(ColumnData::as_f64),
            ) else {
                return Err(InvokeError::failed("vec_scale expects two DOUBLE columns"));
            };
            Ok(ColumnData::Float64(
                x.iter().zip(factor).map(|(x, f)| x * f).collect(),
            ))
        },
    ));

    registry
}

/// Null when either side is null.
fn add_nullable(cols: &[Column]) -> Result<Column, InvokeError> {
    let (Some(a), Some(b)) = (cols.first(), cols.get(1)) else {
        return Err(InvokeError::failed("add_nullable expects two columns"));
    };
    let (Some(av), Some(bv)) = (a.data.as_i64(), b.data.as_i64()) else {
        return Err(InvokeError::failed("add_nullable expects BIGINT columns"));
    };
    let is_null = |c: &Column, i: usize| c.mask.as_ref().is_some_and(|m| m.get(i) == Some(&true));

    let mut data = Vec::with_capacity(av.len());
    let mut mask = Vec::with_capacity(av.len());
    for (i, (x, y)) in av.iter().zip(bv).enumerate() {
        if is_null(a, i) || is_null(b, i) {
            data.push(0);
            mask.push(true);
        } else {
            let sum = x
                .checked_add(*y)
                .ok_or_else(|| InvokeError::value(format!("{x} + {y} overflows BIGINT")))?;
            data.push(sum);
            mask.push(false);
        }
    }
    Ok(Column::with_mask(ColumnData::Int64(data), mask))
}

fn init_tracing(logging: &LoggingConfig) {
    let (writer, guard) = match &logging.file {
        Some(path) => match OpenOptions::new().create(true).append(true).open(path) {
            Ok(file) => tracing_appender::non_blocking(file),
            Err(e) => {
                eprintln!("ERROR: Unable to open log file '{}': {e}", path.display());
                tracing_appender::non_blocking(std::io::stderr())
            }
        },
        None => tracing_appender::non_blocking(std::io::stderr()),
    };
    let _ = TRACE_GUARD.set(guard);

    // RUST_LOG takes precedence over the configured level
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(&logging.level))
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let base = || {
        tracing_subscriber::fmt()
            .with_env_filter(filter.clone())
            .with_ansi(false)
            .with_thread_names(true)
            .with_writer(writer.clone())
            .with_timer(tracing_subscriber::fmt::time::SystemTime)
    };

    let subscriber: Box<dyn tracing::Subscriber + Send + Sync> = if logging.format == "json" {
        Box::new(base().json().finish())
    } else {
        Box::new(base().compact().finish())
    };

    let _ = tracing::subscriber::set_global_default(subscriber);
}
