mod http;
mod mock;

use std::sync::Arc;

pub use http::HttpJobBackend;
pub use mock::MockJobBackend;

use crate::config::AppConfig;
use crate::error::Result;
use crate::job::{Job, JobId, JobRequest};

/// The external job service that prices a job description.
pub trait JobBackend: Send + Sync {
    fn create_job(&self, request: &JobRequest) -> Result<JobId>;
    fn fetch_job(&self, job_id: &JobId) -> Result<Job>;
    fn cancel_job(&self, job_id: &JobId) -> Result<()>;
}

pub fn backend_from_config(config: &AppConfig) -> Result<Arc<dyn JobBackend>> {
    match config.backend_url.as_deref() {
        Some(url) => {
            tracing::info!(%url, "using hosted job backend");
            Ok(Arc::new(HttpJobBackend::new(url, config.api_key.clone())?))
        }
        None => {
            tracing::info!("no backend url configured, using in-memory job backend");
            Ok(Arc::new(MockJobBackend::new()))
        }
    }
}
