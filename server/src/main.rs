use std::{env, io, path::PathBuf, sync::Arc};

use log::{error, info, warn};
use server::{InferenceContext, Service, serve_connection};
use tokio::{net::TcpListener, signal, task};

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: &str = "3000";
const DEFAULT_MODEL_DIR: &str = "model";

#[tokio::main]
async fn main() -> io::Result<()> {
    env_logger::init();

    let addr = format!(
        "{}:{}",
        env::var("HOST").unwrap_or_else(|_| DEFAULT_HOST.to_string()),
        env::var("PORT").unwrap_or_else(|_| DEFAULT_PORT.to_string()),
    );
    let model_dir =
        PathBuf::from(env::var("MODEL_DIR").unwrap_or_else(|_| DEFAULT_MODEL_DIR.to_string()));

    let list = TcpListener::bind(&addr).await?;
    info!("listening at {addr}");

    let service = Arc::new(Service::new());

    let loader = Arc::clone(&service);
    task::spawn_blocking(move || match InferenceContext::load(&model_dir) {
        Ok(context) => {
            loader.init(context);
        }
        Err(e) => error!("failed to load model from {}: {e}", model_dir.display()),
    });

    loop {
        tokio::select! {
            accepted = list.accept() => {
                let (stream, peer) = accepted?;
                let service = Arc::clone(&service);

                tokio::spawn(async move {
                    let (rx, tx) = stream.into_split();
                    if let Err(e) = serve_connection(rx, tx, service).await {
                        warn!("connection with {peer} dropped: {e}");
                    }
                });
            }
            _ = signal::ctrl_c() => {
                info!("received ctrl-c, shutting down");
                break;
            }
        }
    }

    Ok(())
}
