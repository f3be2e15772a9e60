pub mod arch;
pub mod dataset;
pub mod error;
pub mod features;
pub mod initialization;
pub mod memory;
pub mod optimization;
pub mod training;

pub use error::{MlErr, Result};
