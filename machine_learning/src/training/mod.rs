mod model_trainer;
mod stats;

pub use model_trainer::ModelTrainer;
pub use stats::{EpochStats, argmax, correct_predictions};
