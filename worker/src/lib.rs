mod config;
mod decoder;
pub mod error;
mod partition;
mod pool;
mod task;

pub use config::PoolConfig;
pub use decoder::{CoverDecoder, ImageDecoder, RawImage};
pub use error::{DecodeErr, PoolErr, Result};
pub use partition::chunk_ranges;
pub use pool::{Outcome, PoolSummary, TaskReport, WorkerPool, WorkerState, WorkerSummary};
pub use task::{DecodedImage, Task};
