// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! aetherd — boots the kernel and exposes the event stream boundary.
//!
//! The HTTP handling here is deliberately minimal: request line plus
//! headers, three routes (`/events`, `/metrics`, `/status`), no framework.
//! Everything interesting lives in the kernel.

use aether_core::{KernelConfig, SystemClock};
use aether_kernel::kernel::Kernel;
use aether_kernel::HeuristicOracle;
use aether_wire::{parse_audit_query, EventFilter, KernelStatus};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() {
    let config = KernelConfig::from_env();
    let _log_guard = init_tracing(&config);

    let kernel = match Kernel::boot(config, SystemClock, Arc::new(HeuristicOracle)).await {
        Ok(kernel) => kernel,
        Err(e) => {
            tracing::error!(error = %e, code = %e.code(), "kernel boot failed");
            std::process::exit(1);
        }
    };

    let listen = std::env::var("AETHER_LISTEN").unwrap_or_else(|_| "127.0.0.1:7177".to_string());
    let listener = match TcpListener::bind(&listen).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(%listen, error = %e, "failed to bind event stream listener");
            std::process::exit(1);
        }
    };
    tracing::info!(%listen, "event stream listening");

    let shutdown = CancellationToken::new();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            accepted = listener.accept() => {
                let Ok((socket, peer)) = accepted else { continue };
                tracing::debug!(%peer, "client connected");
                let kernel = Arc::clone(&kernel);
                let client_cancel = shutdown.child_token();
                tokio::spawn(async move {
                    if let Err(e) = serve_client(kernel, socket, client_cancel).await {
                        tracing::debug!(error = %e, "client connection ended with error");
                    }
                });
            }
        }
    }

    shutdown.cancel();
    kernel.shutdown().await;
}

fn init_tracing(config: &KernelConfig) -> tracing_appender::non_blocking::WorkerGuard {
    use tracing_subscriber::EnvFilter;

    let log_dir = config.fs_root.join("logs");
    let _ = std::fs::create_dir_all(&log_dir);
    let appender = tracing_appender::rolling::daily(log_dir, "aetherd.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.clone()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .init();
    guard
}

/// Parse the request line and headers, route, respond. Connection per
/// request; the `/events` route holds the socket for its lifetime.
async fn serve_client(
    kernel: Arc<Kernel<SystemClock>>,
    socket: TcpStream,
    cancel: CancellationToken,
) -> std::io::Result<()> {
    let mut reader = BufReader::new(socket);

    let mut request_line = String::new();
    reader.read_line(&mut request_line).await?;
    let mut parts = request_line.split_whitespace();
    let method = parts.next().unwrap_or("");
    let target = parts.next().unwrap_or("");

    // Drain headers; the routes here take no bodies.
    loop {
        let mut line = String::new();
        reader.read_line(&mut line).await?;
        if line == "\r\n" || line == "\n" || line.is_empty() {
            break;
        }
    }

    let (path, query) = match target.split_once('?') {
        Some((path, query)) => (path, query),
        None => (target, ""),
    };

    let mut socket = reader.into_inner();
    if method != "GET" {
        return respond(&mut socket, 405, "text/plain", "method not allowed").await;
    }

    match path {
        "/events" => {
            let filter = query
                .split('&')
                .find_map(|pair| pair.strip_prefix("filter="))
                .map(EventFilter::parse)
                .unwrap_or_default();

            socket
                .write_all(
                    b"HTTP/1.1 200 OK\r\ncontent-type: text/event-stream\r\ncache-control: no-cache\r\nconnection: keep-alive\r\n\r\n",
                )
                .await?;
            kernel
                .stream
                .serve(socket, filter, cancel)
                .await
                .map_err(|e| std::io::Error::other(e.to_string()))?;
            Ok(())
        }
        "/metrics" => {
            let body = kernel.metrics.render();
            respond(&mut socket, 200, "text/plain; version=0.0.4", &body).await
        }
        "/status" => {
            let status = KernelStatus {
                version: aether_kernel::kernel::KERNEL_VERSION.to_string(),
                uptime_ms: kernel.uptime_ms(),
                counts: kernel.processes.counts(),
                containers: kernel.containers.get_all(),
                sandbox_available: kernel.containers.is_available(),
            };
            let body = serde_json::to_string(&status).unwrap_or_else(|_| "{}".to_string());
            respond(&mut socket, 200, "application/json", &body).await
        }
        "/audit" => {
            let pairs: Vec<(&str, &str)> = query
                .split('&')
                .filter(|pair| !pair.is_empty())
                .filter_map(|pair| pair.split_once('='))
                .collect();
            match parse_audit_query(pairs) {
                Ok(audit_query) => match kernel.audit.query(&audit_query) {
                    Ok(page) => {
                        let body =
                            serde_json::to_string(&page).unwrap_or_else(|_| "{}".to_string());
                        respond(&mut socket, 200, "application/json", &body).await
                    }
                    Err(e) => respond(&mut socket, 500, "text/plain", &e.to_string()).await,
                },
                Err(e) => respond(&mut socket, 400, "text/plain", &e.to_string()).await,
            }
        }
        _ => respond(&mut socket, 404, "text/plain", "not found").await,
    }
}

async fn respond(
    socket: &mut TcpStream,
    status: u16,
    content_type: &str,
    body: &str,
) -> std::io::Result<()> {
    let reason = match status {
        200 => "OK",
        400 => "Bad Request",
        404 => "Not Found",
        405 => "Method Not Allowed",
        _ => "Internal Server Error",
    };
    let response = format!(
        "HTTP/1.1 {status} {reason}\r\ncontent-type: {content_type}\r\ncontent-length: {}\r\n\r\n{body}",
        body.len(),
    );
    socket.write_all(response.as_bytes()).await?;
    socket.flush().await
}
