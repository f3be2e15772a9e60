use std::{env, io};

use log::info;
use orchestrator::{TrainingConfig, train};

const CONFIG_VAR: &str = "TRAIN_CONFIG";

#[tokio::main]
async fn main() -> io::Result<()> {
    env_logger::init();

    let config = match env::var(CONFIG_VAR) {
        Ok(path) => TrainingConfig::from_json_file(path)?,
        Err(_) => {
            info!("{CONFIG_VAR} not set, using the default config");
            TrainingConfig::default()
        }
    };

    let report = train(config).await?;

    if let Some(last) = report.history.last() {
        info!(
            "final loss {:.4}, accuracy {:.2}%",
            last.loss,
            last.accuracy * 100.
        );
    }

    info!(
        "trained on {}/{} image(s), model written to {}",
        report.training_rows,
        report.tasks,
        report.model_path.display()
    );

    Ok(())
}
