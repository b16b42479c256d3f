//! Reconnecting client against a local echo server.
//!
//! Demonstrates:
//! - Building a socket with a closure handler
//! - Sending envelopes once the connection opens
//! - Automatic reconnection after the server drops the connection
//! - Forced close
//!
//! Usage:
//!   cargo run --example echo
//!   cargo run --example echo -- --debug

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use anyhow::Context;
use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use tokio::net::TcpListener;
use tokio_tungstenite::accept_async;
use tracing_subscriber::EnvFilter;

use reconnecting_socket::{Callbacks, ConnectionStatus, Envelope, ReconnectingSocket};

// ============================================================================
// Constants
// ============================================================================

/// The server drops every connection after this many echoes.
const ECHOES_PER_CONNECTION: usize = 3;

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() {
    let debug = std::env::args().any(|a| a == "--debug");
    init_logging(debug);

    if let Err(e) = run(debug).await {
        eprintln!("\n[ERROR] {e:#}");
        std::process::exit(1);
    }
}

async fn run(debug: bool) -> anyhow::Result<()> {
    println!("=== Echo ===\n");

    // ========================================================================
    // Start Server
    // ========================================================================

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .context("binding echo server")?;
    let addr = listener.local_addr()?;
    tokio::spawn(serve(listener));
    println!("[1] Echo server listening on {addr}\n");

    // ========================================================================
    // Connect
    // ========================================================================

    let handler = Callbacks::new()
        .with_connecting(|event| match event.retry_in {
            Some(delay) => println!("    ~ retry {} in {delay:?}", event.attempt),
            None => println!("    ~ connecting (attempt {})", event.attempt),
        })
        .with_open(|event| println!("    ✓ open (reconnect: {})", event.is_reconnect))
        .with_close(|event| println!("    ✗ closed ({:?})", event.cause))
        .with_message_logic(|message| {
            println!("    ← {message}");
            Ok(())
        });

    let socket = ReconnectingSocket::builder(format!("ws://{addr}/echo"))
        .debug(debug)
        .reconnect_interval(Duration::from_millis(250))
        .max_reconnect_interval(Duration::from_secs(2))
        .handler(handler)
        .build()?;

    println!("[2] Sending through two server-side drops...");
    let mut status = socket.subscribe_status();

    for n in 0..ECHOES_PER_CONNECTION * 3 {
        status
            .wait_for(|s| *s == ConnectionStatus::Open)
            .await
            .context("socket stopped")?;

        // The server may drop us between the wait and the send.
        if let Err(e) = socket.send(Envelope::new("ping").with_data(json!({"n": n}))) {
            println!("    ! {e}");
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    // ========================================================================
    // Close
    // ========================================================================

    println!("\n[3] Closing...");
    socket.close();
    status
        .wait_for(|s| *s == ConnectionStatus::Closed)
        .await
        .context("socket stopped")?;
    println!("    ✓ Closed\n");

    println!("=== Done ===");
    Ok(())
}

// ============================================================================
// Helpers
// ============================================================================

/// Initialize tracing/logging.
fn init_logging(debug: bool) {
    let filter = if debug {
        "reconnecting_socket=debug"
    } else {
        "reconnecting_socket=info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_target(false)
        .init();
}

/// Echoes frames and drops each connection after a few of them.
async fn serve(listener: TcpListener) {
    let connections = Arc::new(AtomicUsize::new(0));

    while let Ok((stream, _)) = listener.accept().await {
        let id = connections.fetch_add(1, Ordering::SeqCst);
        tokio::spawn(async move {
            let Ok(mut ws) = accept_async(stream).await else {
                return;
            };

            let mut echoed = 0;
            while let Some(Ok(message)) = ws.next().await {
                if !message.is_text() {
                    continue;
                }
                if ws.send(message).await.is_err() {
                    return;
                }
                echoed += 1;
                if echoed == ECHOES_PER_CONNECTION {
                    println!("    [server] dropping connection {id}");
                    return;
                }
            }
        });
    }
}
