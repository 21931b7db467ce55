//! # Ledger-Core Node
//!
//! Runs one node over a line protocol: newline-delimited JSON requests on
//! stdin, one JSON response per line on stdout. Logs go to stderr.
//!
//! ## Startup Sequence
//!
//! 1. Load configuration from `LC_*` environment variables
//! 2. Install the log subscriber
//! 3. Create the store, registry, sequencer and signer
//! 4. Serve stdin until EOF or Ctrl+C
//!
//! Each request runs on a blocking worker whose stack is
//! `WORKER_STACK_SIZE`, enough for the deepest script `LC_MAX_EVAL_DEPTH`
//! allows. See [`node_runtime::commands`] for the accepted line formats.

use std::sync::Arc;

use anyhow::{Context, Result};
use node_runtime::container::WORKER_STACK_SIZE;
use node_runtime::{handle_line, init_logging, LedgerNode, NodeConfig};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{info, warn};

async fn serve(node: Arc<LedgerNode>) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    while let Some(line) = lines.next_line().await.context("Failed to read stdin")? {
        if line.trim().is_empty() {
            continue;
        }
        let worker = Arc::clone(&node);
        let reply = tokio::task::spawn_blocking(move || handle_line(&worker, &line))
            .await
            .context("Request worker panicked")?;

        let mut out = serde_json::to_vec(&reply).context("Failed to encode response")?;
        out.push(b'\n');
        stdout.write_all(&out).await.context("Failed to write stdout")?;
        stdout.flush().await.context("Failed to flush stdout")?;
    }
    Ok(())
}

fn main() -> Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_stack_size(WORKER_STACK_SIZE)
        .build()
        .context("Failed to build async runtime")?;
    runtime.block_on(run())
}

async fn run() -> Result<()> {
    let config = NodeConfig::from_env().context("Invalid configuration")?;
    init_logging(&config.logging).context("Failed to initialize logging")?;

    let node = Arc::new(LedgerNode::new(config).context("Failed to start ledger node")?);
    info!(node = %node.node_id(), "Ledger node ready, reading requests from stdin");

    tokio::select! {
        served = serve(Arc::clone(&node)) => served?,
        signal = tokio::signal::ctrl_c() => {
            signal.context("Failed to listen for Ctrl+C")?;
            warn!("Interrupted, shutting down");
        }
    }

    let stats = node.stats();
    info!(
        ledger_len = stats.ledger_len,
        signatures = stats.signatures_emitted,
        requests = stats.dispatch.requests,
        state = %stats.signing_state,
        "Ledger node stopped"
    );
    Ok(())
}
