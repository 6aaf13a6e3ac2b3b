use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;

use crate::settings::BusinessSettings;
use crate::structured::StructuredData;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Processing,
    Complete,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::Complete | JobStatus::Failed | JobStatus::Cancelled
        )
    }
}

impl<'de> Deserialize<'de> for JobStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(match raw.to_ascii_lowercase().as_str() {
            "pending" | "queued" => JobStatus::Pending,
            "complete" | "completed" => JobStatus::Complete,
            "failed" | "error" => JobStatus::Failed,
            "cancelled" | "canceled" => JobStatus::Cancelled,
            _ => JobStatus::Processing,
        })
    }
}

/// Snapshot of a `cost_engineer_jobs` row as last seen by a poll.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Job {
    pub id: JobId,
    pub status: JobStatus,
    #[serde(default, deserialize_with = "lenient_progress")]
    pub progress: u8,
    #[serde(default)]
    pub current_step: Option<String>,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub output_data: Option<Value>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Job {
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Parses `output_data` into a completion payload. `None` when the job
    /// carries no output yet.
    ///
    /// `response` and `structuredData` are read independently: a malformed
    /// structured section is dropped and the text response is still used.
    pub fn completion_payload(&self) -> Option<CompletionPayload> {
        let output = self.output_data.as_ref()?;
        let Value::Object(fields) = output else {
            let response = match output {
                Value::String(text) => text.clone(),
                other => other.to_string(),
            };
            return Some(CompletionPayload {
                response,
                structured_data: None,
            });
        };

        let structured_data = match fields.get("structuredData") {
            None | Some(Value::Null) => None,
            Some(raw) => match serde_json::from_value::<StructuredData>(raw.clone()) {
                Ok(data) => Some(data),
                Err(e) => {
                    tracing::warn!(job_id = %self.id, "ignoring malformed structured data: {e}");
                    None
                }
            },
        };
        let response = match fields.get("response").and_then(Value::as_str) {
            Some(text) => text.to_string(),
            None if structured_data.is_some() => String::new(),
            None => {
                tracing::warn!(job_id = %self.id, "job output has no text response, using raw output");
                output.to_string()
            }
        };
        Some(CompletionPayload {
            response,
            structured_data,
        })
    }
}

fn lenient_progress<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u8, D::Error> {
    let raw = Option::<f64>::deserialize(deserializer)?;
    Ok(raw
        .filter(|value| value.is_finite())
        .map(|value| value.clamp(0.0, 100.0).round() as u8)
        .unwrap_or_default())
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct ProjectContext {
    pub project_type: String,
    pub property_type: Option<String>,
    pub client_name: Option<String>,
    pub additional_notes: Option<String>,
}

/// Body of the job-creation call. Kept verbatim for retries.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct JobRequest {
    pub query: String,
    pub region: String,
    pub project_context: ProjectContext,
    pub business_settings: BusinessSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CreateJobResponse {
    pub job_id: JobId,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct CompletionPayload {
    pub response: String,
    pub structured_data: Option<StructuredData>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_uses_wire_field_names() {
        let request = JobRequest {
            query: "Rewire kitchen".to_string(),
            region: "UK".to_string(),
            project_context: ProjectContext {
                project_type: "domestic".to_string(),
                ..Default::default()
            },
            business_settings: BusinessSettings::default(),
        };
        let value = serde_json::to_value(&request).expect("json");
        assert_eq!(value["query"], "Rewire kitchen");
        assert_eq!(value["projectContext"]["projectType"], "domestic");
        assert!(value["businessSettings"]["labourRates"].is_object());
    }

    #[test]
    fn job_row_deserializes_with_lenient_status() {
        let job: Job = serde_json::from_value(json!({
            "id": "abc",
            "status": "COMPLETED",
            "progress": 100,
            "current_step": "Done",
            "output_data": { "response": "Total: £10", "structuredData": null },
            "created_at": "2026-10-01T09:00:00Z"
        }))
        .expect("row");
        assert_eq!(job.status, JobStatus::Complete);
        assert!(job.is_terminal());
        let payload = job.completion_payload().expect("payload");
        assert_eq!(payload.response, "Total: £10");
        assert!(payload.structured_data.is_none());

        let unknown: JobStatus = serde_json::from_value(json!("calculating")).expect("status");
        assert_eq!(unknown, JobStatus::Processing);
    }

    #[test]
    fn non_object_output_becomes_text() {
        let job = Job {
            id: JobId::new("x"),
            status: JobStatus::Complete,
            progress: 100,
            current_step: None,
            error_message: None,
            output_data: Some(json!("Materials: £40")),
            created_at: None,
            completed_at: None,
        };
        let payload = job.completion_payload().expect("payload");
        assert_eq!(payload.response, "Materials: £40");
    }

    #[test]
    fn fractional_or_missing_progress_still_decodes() {
        let job: Job = serde_json::from_value(json!({
            "id": "j",
            "status": "processing",
            "progress": 42.5
        }))
        .expect("fractional progress");
        assert_eq!(job.progress, 43);

        let job: Job = serde_json::from_value(json!({
            "id": "j",
            "status": "processing",
            "progress": 140
        }))
        .expect("overshooting progress");
        assert_eq!(job.progress, 100);

        let job: Job = serde_json::from_value(json!({
            "id": "j",
            "status": "pending",
            "progress": null
        }))
        .expect("null progress");
        assert_eq!(job.progress, 0);
    }

    #[test]
    fn malformed_structured_data_keeps_text_response() {
        let response = "Subtotal: £500.00\nVAT (20%): £100.00\nTotal: £600.00";
        let job = Job {
            id: JobId::new("x"),
            status: JobStatus::Complete,
            progress: 100,
            current_step: None,
            error_message: None,
            output_data: Some(json!({
                "response": response,
                "structuredData": { "materials": { "items": [{ "quantity": "6" }] } }
            })),
            created_at: None,
            completed_at: None,
        };
        let payload = job.completion_payload().expect("payload");
        assert_eq!(payload.response, response);
        assert!(payload.structured_data.is_none());

        let analysis = crate::analysis::ParsedCostAnalysis::from_payload(&payload);
        assert_eq!(analysis.total_cost, 600.0);
    }

    #[test]
    fn create_response_reads_job_id() {
        let response: CreateJobResponse =
            serde_json::from_value(json!({ "jobId": "job-1" })).expect("response");
        assert_eq!(response.job_id.as_str(), "job-1");
    }
}
