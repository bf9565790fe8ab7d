//! JSON-lines method channel over stdin/stdout.
//!
//! Each line on stdin is one `ChannelRequest`. Calls run concurrently, so
//! replies can come back out of order; the `id` ties them together.

use midipro_core::{
    ChannelRequest, ChannelResponse, Dispatcher, Lifecycle, MethodCall, MethodError, Outcome,
    DISPOSE,
};
use serde_json::Value;
use std::io;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

pub async fn serve(dispatcher: Dispatcher) -> io::Result<()> {
    let (tx, mut rx) = mpsc::unbounded_channel::<ChannelResponse>();

    let writer = tokio::spawn(async move {
        let mut stdout = tokio::io::stdout();
        while let Some(response) = rx.recv().await {
            let mut line = match serde_json::to_vec(&response) {
                Ok(line) => line,
                Err(err) => {
                    error!(%err, "failed to encode reply");
                    continue;
                }
            };
            line.push(b'\n');
            stdout.write_all(&line).await?;
            stdout.flush().await?;
        }
        Ok::<_, io::Error>(())
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<ChannelRequest>(line) {
            Ok(ChannelRequest { id, call }) => {
                let pending = dispatcher.submit(call);
                let tx = tx.clone();
                tokio::spawn(async move {
                    let outcome = Outcome::from(pending.await);
                    let _ = tx.send(ChannelResponse { id, outcome });
                });
            }
            Err(err) => {
                warn!(%err, "malformed request line");
                let _ = tx.send(ChannelResponse {
                    id: salvage_id(line),
                    outcome: Outcome::Error(MethodError::invalid_argument(format!(
                        "malformed request: {err}"
                    ))),
                });
            }
        }
    }

    // Wait for every in-flight call to reply before shutting the player down.
    drop(tx);
    writer
        .await
        .map_err(|err| io::Error::new(io::ErrorKind::Other, err))??;

    info!("stdin closed");
    if dispatcher.lifecycle() != Lifecycle::Disposed {
        if let Err(err) = dispatcher.call(MethodCall::new(DISPOSE)).await {
            warn!(%err, "dispose on shutdown failed");
        }
    }
    Ok(())
}

/// Best-effort `id` from a line that did not parse as a request.
fn salvage_id(line: &str) -> Option<u64> {
    serde_json::from_str::<Value>(line)
        .ok()?
        .get("id")?
        .as_u64()
}
