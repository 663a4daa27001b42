//! drop-gate binary.
//!
//! One executable, two faces: `serve` runs the gateway that issues and
//! consumes presigned object-storage URLs, while `upload` and `rm` drive a
//! running gateway from the command line through the client engine.

mod accept;
mod config;
mod delete;
mod engine;
mod error;
mod events;
mod frontend;
mod http;
mod logging;
mod store;
mod tracker;
mod upload;

use anyhow::Context;
use axum::extract::{Extension, connect_info::ConnectInfo};
use axum::http::Request;
use axum::routing::{delete, post};
use axum::{Router, middleware};
use axum_server::Handle;
use clap::Parser;
use indicatif::{HumanBytes, MultiProgress, ProgressBar, ProgressStyle};
use shadow_rs::shadow;
use std::collections::{HashMap, HashSet};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::sync::broadcast::error::RecvError;
use tower_http::trace::{DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::{Level, info, info_span};

use crate::accept::AcceptPolicy;
use crate::config::{Cli, Command, RmArgs, ServeArgs, UploadArgs};
use crate::delete::DeleteRequest;
use crate::engine::Engine;
use crate::events::DropEvent;
use crate::http::{add_security_headers, build_cors_layer, client_ip};
use crate::store::{ObjectStore, S3Store};
use crate::tracker::FileId;
use crate::upload::TicketConfig;

shadow!(build);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init_logging();

    match Cli::parse().command {
        Command::Serve(args) => serve(args).await,
        Command::Upload(args) => run_upload(args).await,
        Command::Rm(args) => run_rm(args).await,
    }
}

/// Build the router and block until shutdown.
async fn serve(args: ServeArgs) -> anyhow::Result<()> {
    let store: Arc<dyn ObjectStore> = Arc::new(
        S3Store::connect(&args)
            .await
            .context("storage setup failed")?,
    );
    let ticket = Arc::new(TicketConfig {
        presign_ttl: Duration::from_secs(args.presign_ttl_secs),
    });

    let mut app = Router::new()
        .route("/api/s3/upload", post(upload::create_upload_url))
        .route("/api/s3/delete", delete(delete::delete_object))
        .fallback(frontend::serve_shell)
        .layer(middleware::from_fn(add_security_headers))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &Request<_>| {
                    let connect_ip = request
                        .extensions()
                        .get::<ConnectInfo<SocketAddr>>()
                        .map(|ConnectInfo(addr)| addr.ip());
                    let client_ip = client_ip(request.headers(), connect_ip)
                        .map(|ip| ip.to_string())
                        .unwrap_or_else(|| "unknown".to_string());
                    info_span!(
                        "request",
                        client_ip,
                        method = ?request.method(),
                        path = ?request.uri().path(),
                    )
                })
                .on_request(DefaultOnRequest::new().level(Level::DEBUG))
                .on_response(DefaultOnResponse::new().level(Level::DEBUG)),
        )
        .layer(Extension(store))
        .layer(Extension(ticket));

    if let Some(cors_layer) = build_cors_layer(args.cors_origins.as_deref()) {
        app = app.layer(cors_layer);
    }

    let host = args.host.parse::<IpAddr>().context("invalid bind address")?;
    let addr = SocketAddr::new(host, args.port);
    let handle = Handle::new();
    info!(bucket = args.bucket, "starting http server at {}", addr);

    let server = axum_server::bind(addr)
        .handle(handle.clone())
        .serve(app.into_make_service_with_connect_info::<SocketAddr>());
    tokio::select! {
        result = server => result?,
        _ = shutdown_signal(handle) => {}
    }

    Ok(())
}

/// Upload the given files through a running gateway, rendering per-file
/// progress bars off the engine's event stream.
async fn run_upload(args: UploadArgs) -> anyhow::Result<()> {
    let engine = Engine::new(args.api, AcceptPolicy::default());
    let mut rx = engine.subscribe();
    let ids = engine.drop_files(&args.files).await;
    let mut pending: HashSet<FileId> = ids.iter().copied().collect();

    let mp = MultiProgress::new();
    let style = ProgressStyle::with_template("{prefix:>4} [{bar:32.cyan/blue}] {pos:>3}% {wide_msg}")?
        .progress_chars("=> ");
    let mut bars: HashMap<FileId, ProgressBar> = HashMap::new();
    let mut failures = 0usize;

    loop {
        // Once nothing is pending, only buffered notices are left to drain.
        let event = if pending.is_empty() {
            match rx.try_recv() {
                Ok(event) => event,
                Err(_) => break,
            }
        } else {
            match rx.recv().await {
                Ok(event) => event,
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            }
        };

        match event {
            DropEvent::Added { id, name, size, kind } => {
                let bar = mp.add(ProgressBar::new(100));
                bar.set_style(style.clone());
                bar.set_prefix(kind.glyph());
                bar.set_message(format!("{name} ({})", HumanBytes(size)));
                bars.insert(id, bar);
            }
            DropEvent::Progress { id, percent } => {
                if let Some(bar) = bars.get(&id) {
                    bar.set_position(percent as u64);
                }
            }
            DropEvent::Uploaded { id } => {
                if let Some(bar) = bars.get(&id) {
                    bar.set_position(100);
                    bar.finish();
                }
                pending.remove(&id);
            }
            DropEvent::UploadFailed { id } => {
                if let Some(bar) = bars.get(&id) {
                    bar.abandon_with_message("failed");
                }
                pending.remove(&id);
                failures += 1;
            }
            DropEvent::Notice(notice) => {
                let line = format!("{}: {}", notice.title, notice.detail);
                if notice.kind.is_error() {
                    mp.println(format!("error: {line}"))?;
                } else {
                    mp.println(line)?;
                }
            }
            DropEvent::Removed { .. } | DropEvent::RemoveFailed { .. } => {}
        }
    }

    let uploaded: Vec<_> = engine
        .snapshot()
        .into_iter()
        .filter(|entry| entry.key.is_some() && !entry.error)
        .collect();
    if !uploaded.is_empty() {
        println!("\nuploaded:");
        for entry in &uploaded {
            println!("  {}  {}", entry.name, entry.key.as_deref().unwrap_or(""));
        }
    }

    if ids.is_empty() {
        anyhow::bail!("no files were accepted");
    }
    if failures > 0 {
        anyhow::bail!("{failures} upload(s) failed");
    }
    Ok(())
}

/// Delete one object by storage key through a running gateway.
async fn run_rm(args: RmArgs) -> anyhow::Result<()> {
    let client = reqwest::Client::new();
    let api = args.api.trim_end_matches('/');
    let response = client
        .delete(format!("{api}/api/s3/delete"))
        .json(&DeleteRequest {
            key: Some(args.key.clone()),
        })
        .send()
        .await
        .context("delete request failed")?;

    if response.status().is_success() {
        println!("deleted {}", args.key);
        return Ok(());
    }
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    anyhow::bail!("delete failed with status {status}: {body}")
}

async fn shutdown_signal(handle: Handle) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("received termination signal, shutting down");
    handle.graceful_shutdown(Some(Duration::from_secs(10)));
}
