use std::{
    any::Any,
    fs,
    panic::{self, AssertUnwindSafe},
    path::PathBuf,
    sync::OnceLock,
};

use log::{error, info, warn};
use serde::{Deserialize, Serialize};

use crate::{ClassScore, InferenceContext, Prediction};

pub const OK: u16 = 200;
pub const BAD_REQUEST: u16 = 400;
pub const INTERNAL_ERROR: u16 = 500;
pub const UNAVAILABLE: u16 = 503;

/// A classification request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    /// The image to classify.
    #[serde(default)]
    pub image: Option<PathBuf>,
    /// Whether `image` is a temporary upload owned by the request. Uploads are removed once
    /// the request is handled.
    #[serde(default)]
    pub upload: bool,
}

/// The body of a successful response.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Body {
    pub label: String,
    /// The top score as a percentage with two decimals, e.g. `"97.31%"`.
    pub confidence: String,
    pub scores: Vec<ClassScore>,
}

impl From<Prediction> for Body {
    fn from(prediction: Prediction) -> Self {
        Self {
            label: prediction.label,
            confidence: format!("{:.2}%", prediction.confidence * 100.),
            scores: prediction.scores,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Response {
    pub status: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<Body>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Response {
    fn ok(body: Body) -> Self {
        Self {
            status: OK,
            body: Some(body),
            error: None,
        }
    }

    pub(crate) fn error(status: u16, msg: impl Into<String>) -> Self {
        Self {
            status,
            body: None,
            error: Some(msg.into()),
        }
    }
}

/// The request handler. It answers `503` until `init` hands it a context and never mutates
/// the context afterwards.
#[derive(Default)]
pub struct Service {
    context: OnceLock<InferenceContext>,
}

impl Service {
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs the inference context.
    ///
    /// # Returns
    /// `false` if a context was already installed, the new one is then dropped.
    pub fn init(&self, context: InferenceContext) -> bool {
        let installed = self.context.set(context).is_ok();
        if installed {
            info!("inference context ready");
        }
        installed
    }

    pub fn is_ready(&self) -> bool {
        self.context.get().is_some()
    }

    pub fn context(&self) -> Option<&InferenceContext> {
        self.context.get()
    }

    /// Handles a single request. Never panics, every failure becomes an error status.
    pub fn handle(&self, request: Request) -> Response {
        let response = panic::catch_unwind(AssertUnwindSafe(|| self.respond(&request)))
            .unwrap_or_else(|panic| {
                let detail = panic_detail(panic);
                error!("request handler panicked: {detail}");
                Response::error(INTERNAL_ERROR, detail)
            });

        if let (true, Some(path)) = (request.upload, &request.image) {
            if let Err(e) = fs::remove_file(path) {
                warn!("cannot remove upload {}: {e}", path.display());
            }
        }

        response
    }

    fn respond(&self, request: &Request) -> Response {
        let Some(context) = self.context.get() else {
            return Response::error(UNAVAILABLE, "models are still loading");
        };

        let Some(path) = &request.image else {
            return Response::error(BAD_REQUEST, "an image is required");
        };

        match context.classify(path) {
            Ok(prediction) => {
                info!(
                    label = prediction.label.as_str(),
                    confidence = prediction.confidence;
                    "classified {}",
                    path.display()
                );
                Response::ok(prediction.into())
            }
            Err(e) => {
                error!("cannot classify {}: {e}", path.display());
                Response::error(INTERNAL_ERROR, e.to_string())
            }
        }
    }
}

fn panic_detail(panic: Box<dyn Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        return s.to_string();
    }

    if let Some(s) = panic.downcast_ref::<String>() {
        return s.clone();
    }

    "unknown panic".to_string()
}
