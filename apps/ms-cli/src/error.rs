use thiserror::Error;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Simulation error: {0}")]
    Sim(#[from] ms_sim::SimError),

    #[error("Invalid scenario: {what}")]
    Scenario { what: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<ms_core::CoreError> for AppError {
    fn from(e: ms_core::CoreError) -> Self {
        AppError::Scenario {
            what: e.to_string(),
        }
    }
}
