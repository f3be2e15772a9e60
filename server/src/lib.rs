mod context;
pub mod error;
mod predict;
pub mod service;

use std::sync::Arc;

use log::{debug, error, warn};
use tokio::{
    io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader},
    task,
};

pub use context::InferenceContext;
pub use error::{InferenceErr, Result};
pub use predict::{ClassScore, Prediction};
pub use service::{Body, Request, Response, Service};

/// Serves newline-delimited JSON requests read from `rx`, writing one JSON response line per
/// request to `tx` until `rx` reaches end of stream.
///
/// # Arguments
/// * `rx` - The request stream.
/// * `tx` - The response stream.
/// * `handler` - The shared request handler.
///
/// # Returns
/// An I/O error if the connection broke.
pub async fn serve_connection<R, W>(rx: R, mut tx: W, handler: Arc<Service>) -> std::io::Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = BufReader::new(rx).lines();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }

        let response = match serde_json::from_str::<Request>(&line) {
            Ok(request) => {
                let handler = Arc::clone(&handler);
                task::spawn_blocking(move || handler.handle(request))
                    .await
                    .unwrap_or_else(|e| {
                        error!("request task failed: {e}");
                        Response::error(service::INTERNAL_ERROR, e.to_string())
                    })
            }
            Err(e) => {
                warn!("malformed request: {e}");
                Response::error(service::BAD_REQUEST, format!("malformed request: {e}"))
            }
        };

        debug!(status = response.status; "responding");

        let mut out = serde_json::to_vec(&response)?;
        out.push(b'\n');
        tx.write_all(&out).await?;
        tx.flush().await?;
    }

    Ok(())
}
