use crate::job::JobId;

#[derive(Debug, thiserror::Error)]
pub enum CostEngineerError {
    #[error("Please describe the job before generating an estimate")]
    EmptyPrompt,

    #[error("{0}")]
    Backend(String),

    #[error("Job {0} not found")]
    JobNotFound(JobId),

    #[error("Storage failed: {0}")]
    Storage(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),
}

pub type Result<T> = std::result::Result<T, CostEngineerError>;
