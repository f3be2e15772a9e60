mod training;

pub use training::{BackboneConfig, TrainingConfig};
