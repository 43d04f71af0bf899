//! MindHit recorder host
//!
//! Launched by the browser as a native-messaging host. The browser passes the
//! calling extension's origin as the first argument.

use std::time::Duration;

use anyhow::Context;
use mindhit_host::{read_loop, spawn_writer, HostContext, ReadEnd};
use mindhit_infra::{config, init_tracing};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

const CHANNEL_BUFFER: usize = 256;
const WRITER_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

fn main() -> anyhow::Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to build tokio runtime")?;

    let result = runtime.block_on(run());

    // A blocked stdin read must not hold the process open
    runtime.shutdown_timeout(Duration::from_secs(1));
    result
}

async fn run() -> anyhow::Result<()> {
    let dotenv = dotenvy::dotenv();

    let mut config = config::load().context("failed to load configuration")?;
    if let Some(origin) = caller_origin(std::env::args().nth(1)) {
        if !config.extension.allowed_origins.contains(&origin) {
            config.extension.allowed_origins.push(origin);
        }
    }

    init_tracing(&config.logging).context("failed to initialise logging")?;
    match dotenv {
        Ok(path) => info!(path = %path.display(), "Loaded .env"),
        Err(err) if err.not_found() => {}
        Err(err) => warn!(error = %err, "Could not load .env file"),
    }
    info!(version = env!("CARGO_PKG_VERSION"), "MindHit host starting");

    let (notify_tx, notify_rx) = mpsc::channel(CHANNEL_BUFFER);
    let (reply_tx, reply_rx) = mpsc::channel(CHANNEL_BUFFER);

    let ctx = HostContext::new(config, notify_tx).context("failed to initialise host")?;
    let writer = spawn_writer(tokio::io::stdout(), reply_rx, notify_rx);

    tokio::select! {
        ended = read_loop(tokio::io::stdin(), ctx.pipeline.clone(), reply_tx) => match ended {
            Ok(ReadEnd::Eof) => info!("Input closed"),
            Ok(end) => warn!(?end, "Reader stopped"),
            Err(err) => error!(error = %err, "Message channel broken"),
        },
        signal = shutdown_signal() => info!(signal, "Received shutdown signal"),
    }

    ctx.shutdown().await.context("shutdown did not complete")?;

    if tokio::time::timeout(WRITER_DRAIN_TIMEOUT, writer).await.is_err() {
        warn!("Writer did not drain before exit");
    }

    info!("MindHit host stopped");
    Ok(())
}

/// Origin argument passed by the browser, normalised to `scheme://id`.
fn caller_origin(arg: Option<String>) -> Option<String> {
    let arg = arg?;
    let origin = arg.trim().trim_end_matches('/');
    origin.starts_with("chrome-extension://").then(|| origin.to_string())
}

#[cfg(unix)]
async fn shutdown_signal() -> &'static str {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = match signal(SignalKind::terminate()) {
        Ok(stream) => stream,
        Err(err) => {
            warn!(error = %err, "SIGTERM handler unavailable");
            return ctrl_c().await;
        }
    };

    tokio::select! {
        name = ctrl_c() => name,
        _ = terminate.recv() => "SIGTERM",
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() -> &'static str {
    ctrl_c().await
}

async fn ctrl_c() -> &'static str {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "Ctrl-C handler unavailable");
        std::future::pending::<()>().await;
    }
    "SIGINT"
}
