use reqwest::blocking::{Client, RequestBuilder, Response};
use std::time::Duration;

use super::JobBackend;
use crate::error::{CostEngineerError, Result};
use crate::job::{CreateJobResponse, Job, JobId, JobRequest};

const CREATE_JOB_PATH: &str = "functions/v1/create-cost-engineer-job";
const JOBS_TABLE_PATH: &str = "rest/v1/cost_engineer_jobs";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Hosted job service: an edge function creates jobs and the job table is
/// read back over the REST interface.
pub struct HttpJobBackend {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpJobBackend {
    pub fn new(base_url: &str, api_key: Option<String>) -> Result<Self> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.base_url)
    }

    fn job_row_url(&self, job_id: &JobId) -> String {
        format!("{}?id=eq.{}", self.url(JOBS_TABLE_PATH), job_id)
    }

    fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => builder.header("apikey", key).bearer_auth(key),
            None => builder,
        }
    }

    fn check(response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().unwrap_or_default();
        Err(CostEngineerError::Backend(backend_message(status.as_u16(), &body)))
    }
}

/// Prefers the service's own `error`/`message` field over the raw body.
fn backend_message(status: u16, body: &str) -> String {
    let detail = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|value| {
            ["error", "message"]
                .iter()
                .find_map(|key| value.get(*key).and_then(|v| v.as_str()).map(str::to_string))
        })
        .unwrap_or_else(|| body.trim().to_string());
    if detail.is_empty() {
        format!("Job service returned HTTP {status}")
    } else {
        format!("Job service returned HTTP {status}: {detail}")
    }
}

impl JobBackend for HttpJobBackend {
    fn create_job(&self, request: &JobRequest) -> Result<JobId> {
        let response = self
            .authorize(self.client.post(self.url(CREATE_JOB_PATH)))
            .json(request)
            .send()?;
        let created: CreateJobResponse = Self::check(response)?.json()?;
        tracing::info!(job_id = %created.job_id, "job created");
        Ok(created.job_id)
    }

    fn fetch_job(&self, job_id: &JobId) -> Result<Job> {
        let url = format!("{}&select=*", self.job_row_url(job_id));
        let response = self.authorize(self.client.get(url)).send()?;
        let rows: Vec<Job> = Self::check(response)?.json()?;
        rows.into_iter()
            .next()
            .ok_or_else(|| CostEngineerError::JobNotFound(job_id.clone()))
    }

    fn cancel_job(&self, job_id: &JobId) -> Result<()> {
        let response = self
            .authorize(self.client.patch(self.job_row_url(job_id)))
            .json(&serde_json::json!({ "status": "cancelled" }))
            .send()?;
        Self::check(response)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urls_are_built_from_trimmed_base() {
        let backend = HttpJobBackend::new("https://example.supabase.co/", None).expect("client");
        assert_eq!(
            backend.url(CREATE_JOB_PATH),
            "https://example.supabase.co/functions/v1/create-cost-engineer-job"
        );
        assert_eq!(
            backend.job_row_url(&JobId::new("42")),
            "https://example.supabase.co/rest/v1/cost_engineer_jobs?id=eq.42"
        );
    }

    #[test]
    fn error_bodies_surface_service_message() {
        assert_eq!(
            backend_message(429, r#"{"error":"Rate limit reached"}"#),
            "Job service returned HTTP 429: Rate limit reached"
        );
        assert_eq!(
            backend_message(502, "bad gateway\n"),
            "Job service returned HTTP 502: bad gateway"
        );
        assert_eq!(backend_message(500, ""), "Job service returned HTTP 500");
    }
}
