use chrono::Utc;
use itertools::Itertools;
use parking_lot::RwLock;
use std::collections::HashMap;

use super::JobBackend;
use crate::error::{CostEngineerError, Result};
use crate::job::{CompletionPayload, Job, JobId, JobRequest, JobStatus};
use crate::money::format_gbp;
use crate::structured::{
    Alternatives, CostSummary, LabourSection, LabourTask, MaterialItem, MaterialsSection,
    OrderItem, OrderList, Phase, QuoteTier, StructuredData, SupplierOrder, Timescales,
};

const DEFAULT_PROGRESS_STEP: u8 = 20;
const VAT_RATE: f64 = 20.0;

const STEP_NAMES: [&str; 5] = [
    "Parsing job requirements",
    "Searching supplier pricing",
    "Calculating labour hours",
    "Building project timeline",
    "Preparing quote options",
];

struct MockJob {
    job: Job,
    request: JobRequest,
}

#[derive(Default)]
struct MockState {
    jobs: HashMap<JobId, MockJob>,
    requests: Vec<JobRequest>,
    cancelled: Vec<JobId>,
    fail_creation: Option<String>,
    fail_at_progress: Option<(u8, String)>,
    failing_fetches: u32,
    text_only: bool,
}

/// In-memory stand-in for the hosted job service. Each `fetch_job` advances a
/// running job by a fixed step, so progress is driven by polling alone.
pub struct MockJobBackend {
    state: RwLock<MockState>,
    progress_step: u8,
}

impl Default for MockJobBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MockJobBackend {
    pub fn new() -> Self {
        Self::with_progress_step(DEFAULT_PROGRESS_STEP)
    }

    pub fn with_progress_step(step: u8) -> Self {
        Self {
            state: RwLock::new(MockState::default()),
            progress_step: step.clamp(1, 100),
        }
    }

    /// Job creation fails with `message` until cleared with `None`.
    pub fn set_creation_failure(&self, message: Option<&str>) {
        self.state.write().fail_creation = message.map(str::to_string);
    }

    /// Jobs fail once they reach `progress`.
    pub fn set_failure_at_progress(&self, failure: Option<(u8, &str)>) {
        self.state.write().fail_at_progress = failure.map(|(p, msg)| (p, msg.to_string()));
    }

    /// The next `count` fetches return a transient error.
    pub fn fail_next_fetches(&self, count: u32) {
        self.state.write().failing_fetches = count;
    }

    /// Completed jobs carry only the free text response.
    pub fn set_text_only(&self, text_only: bool) {
        self.state.write().text_only = text_only;
    }

    pub fn requests(&self) -> Vec<JobRequest> {
        self.state.read().requests.clone()
    }

    pub fn cancelled(&self) -> Vec<JobId> {
        self.state.read().cancelled.clone()
    }

    pub fn job_status(&self, job_id: &JobId) -> Option<JobStatus> {
        self.state.read().jobs.get(job_id).map(|j| j.job.status)
    }
}

impl JobBackend for MockJobBackend {
    fn create_job(&self, request: &JobRequest) -> Result<JobId> {
        let mut state = self.state.write();
        if let Some(message) = &state.fail_creation {
            return Err(CostEngineerError::Backend(message.clone()));
        }
        let id = JobId::generate();
        let job = Job {
            id: id.clone(),
            status: JobStatus::Pending,
            progress: 0,
            current_step: Some("Queued".to_string()),
            error_message: None,
            output_data: None,
            created_at: Some(Utc::now()),
            completed_at: None,
        };
        state.requests.push(request.clone());
        state.jobs.insert(
            id.clone(),
            MockJob {
                job,
                request: request.clone(),
            },
        );
        Ok(id)
    }

    fn fetch_job(&self, job_id: &JobId) -> Result<Job> {
        let mut guard = self.state.write();
        let state = &mut *guard;
        if state.failing_fetches > 0 {
            state.failing_fetches -= 1;
            return Err(CostEngineerError::Backend(
                "Temporary network error".to_string(),
            ));
        }
        let fail_at = state.fail_at_progress.clone();
        let text_only = state.text_only;
        let Some(entry) = state.jobs.get_mut(job_id) else {
            return Err(CostEngineerError::JobNotFound(job_id.clone()));
        };
        if entry.job.is_terminal() {
            return Ok(entry.job.clone());
        }

        let progress = entry.job.progress.saturating_add(self.progress_step).min(100);
        entry.job.progress = progress;
        entry.job.status = JobStatus::Processing;
        let step_idx = (progress as usize * STEP_NAMES.len() / 101).min(STEP_NAMES.len() - 1);
        entry.job.current_step = Some(STEP_NAMES[step_idx].to_string());

        if let Some((threshold, message)) = fail_at {
            if progress >= threshold {
                entry.job.status = JobStatus::Failed;
                entry.job.error_message = Some(message);
                return Ok(entry.job.clone());
            }
        }

        if progress >= 100 {
            let payload = synthesize_payload(&entry.request, text_only);
            entry.job.status = JobStatus::Complete;
            entry.job.current_step = Some("Complete".to_string());
            entry.job.output_data = Some(serde_json::to_value(payload)?);
            entry.job.completed_at = Some(Utc::now());
        }
        Ok(entry.job.clone())
    }

    fn cancel_job(&self, job_id: &JobId) -> Result<()> {
        let mut state = self.state.write();
        state.cancelled.push(job_id.clone());
        let Some(entry) = state.jobs.get_mut(job_id) else {
            return Err(CostEngineerError::JobNotFound(job_id.clone()));
        };
        if !entry.job.is_terminal() {
            entry.job.status = JobStatus::Cancelled;
        }
        Ok(())
    }
}

struct CatalogueItem {
    description: &'static str,
    product_code: &'static str,
    quantity: f64,
    unit: &'static str,
    unit_price: f64,
    supplier: &'static str,
}

fn catalogue_for(query: &str) -> Vec<CatalogueItem> {
    let query = query.to_ascii_lowercase();
    let mut items = Vec::new();
    if query.contains("consumer unit") || query.contains("fuse board") {
        items.push(CatalogueItem {
            description: "18th Edition consumer unit, 10 way",
            product_code: "CU-10W-AMD3",
            quantity: 1.0,
            unit: "each",
            unit_price: 145.0,
            supplier: "CEF",
        });
        items.push(CatalogueItem {
            description: "32A Type A RCBO",
            product_code: "RCBO-32A",
            quantity: 6.0,
            unit: "each",
            unit_price: 24.0,
            supplier: "CEF",
        });
        items.push(CatalogueItem {
            description: "25mm² meter tails (pair, 2m)",
            product_code: "TAILS-25-2M",
            quantity: 1.0,
            unit: "pair",
            unit_price: 18.5,
            supplier: "Screwfix",
        });
    }
    if query.contains("socket") || query.contains("rewire") || query.contains("kitchen") {
        items.push(CatalogueItem {
            description: "Double switched socket, white",
            product_code: "DSS-WHT",
            quantity: 6.0,
            unit: "each",
            unit_price: 4.8,
            supplier: "Screwfix",
        });
    }
    if query.contains("light") || query.contains("downlight") {
        items.push(CatalogueItem {
            description: "Fire rated LED downlight",
            product_code: "FRDL-6W",
            quantity: 8.0,
            unit: "each",
            unit_price: 9.5,
            supplier: "City Electrical Factors",
        });
    }
    items.push(CatalogueItem {
        description: "2.5mm² twin & earth cable",
        product_code: "TE-25-100",
        quantity: 1.0,
        unit: "100m drum",
        unit_price: 68.0,
        supplier: "Screwfix",
    });
    items.push(CatalogueItem {
        description: "Sundries (clips, grommets, labels)",
        product_code: "SUNDRY",
        quantity: 1.0,
        unit: "lot",
        unit_price: 25.0,
        supplier: "Screwfix",
    });
    items
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn synthesize_payload(request: &JobRequest, text_only: bool) -> CompletionPayload {
    let settings = &request.business_settings;
    let markup = 1.0 + settings.profit_targets.markup_percent.max(0.0) / 100.0;

    let materials: Vec<MaterialItem> = catalogue_for(&request.query)
        .into_iter()
        .map(|item| {
            let unit_price = round2(item.unit_price * markup);
            MaterialItem {
                description: item.description.to_string(),
                quantity: item.quantity,
                unit: item.unit.to_string(),
                unit_price,
                total: round2(unit_price * item.quantity),
                supplier: Some(item.supplier.to_string()),
            }
        })
        .collect();
    let materials_total = round2(materials.iter().map(|m| m.total).sum());

    let words = request.query.split_whitespace().count() as f64;
    let total_hours = (4.0 + (words / 10.0).floor()).min(40.0);
    let hourly_rate = settings.labour_rates.electrician;
    let labour_total = round2(total_hours * hourly_rate);
    let tasks = vec![
        LabourTask {
            description: "Isolation, strip out and preparation".to_string(),
            hours: round2(total_hours * 0.25),
            workers: 1,
        },
        LabourTask {
            description: "Installation".to_string(),
            hours: round2(total_hours * 0.5),
            workers: 1,
        },
        LabourTask {
            description: "Testing, inspection and certification".to_string(),
            hours: round2(total_hours * 0.25),
            workers: 1,
        },
    ];

    let subtotal = round2(materials_total + labour_total);
    let vat_amount = round2(subtotal * VAT_RATE / 100.0);
    let grand_total = round2(subtotal + vat_amount);

    let days = (total_hours / 8.0).ceil().max(1.0);
    let timescales = Timescales {
        phases: vec![
            Phase {
                name: "Preparation".to_string(),
                days: 0.5,
                description: "Survey, isolation and strip out".to_string(),
            },
            Phase {
                name: "Installation".to_string(),
                days: (days - 0.5).max(0.5),
                description: "First and second fix".to_string(),
            },
            Phase {
                name: "Testing & certification".to_string(),
                days: 0.5,
                description: "Dead and live testing, certificate issue".to_string(),
            },
        ],
        total_days: days + 0.5,
        earliest_start: None,
    };

    let tier = |factor: f64, description: &str, inclusions: &[&str]| QuoteTier {
        description: description.to_string(),
        total: round2(grand_total * factor),
        inclusions: inclusions.iter().map(|s| s.to_string()).collect(),
        exclusions: vec!["Making good and decoration".to_string()],
    };
    let alternatives = Alternatives {
        budget: Some(tier(0.85, "Essential compliant install", &["Standard accessories"])),
        standard: Some(tier(1.0, "Recommended specification", &["Mid-range accessories", "12 month warranty"])),
        premium: Some(tier(
            1.3,
            "Premium finish and surge protection",
            &["Brushed steel accessories", "SPD", "24 month warranty"],
        )),
    };

    let suppliers = materials
        .iter()
        .into_group_map_by(|m| m.supplier.clone().unwrap_or_else(|| "Unassigned".to_string()))
        .into_iter()
        .sorted_by(|a, b| a.0.cmp(&b.0))
        .map(|(supplier, items)| {
            let items: Vec<OrderItem> = items
                .into_iter()
                .map(|m| OrderItem {
                    description: m.description.clone(),
                    product_code: None,
                    quantity: m.quantity,
                    unit: m.unit.clone(),
                    unit_price: m.unit_price,
                    total: m.total,
                })
                .collect();
            let subtotal = round2(items.iter().map(|i| i.total).sum());
            SupplierOrder {
                supplier,
                items,
                subtotal,
            }
        })
        .collect();

    let mut response = String::from("Materials:\n");
    for m in &materials {
        response.push_str(&format!(
            "- {} x {} @ {} = {}\n",
            m.quantity,
            m.description,
            format_gbp(m.unit_price),
            format_gbp(m.total)
        ));
    }
    response.push_str(&format!(
        "Labour: {total_hours} hours @ {}/hr = {}\n",
        format_gbp(hourly_rate),
        format_gbp(labour_total)
    ));
    response.push_str(&format!("Subtotal: {}\n", format_gbp(subtotal)));
    response.push_str(&format!("VAT ({VAT_RATE}%): {}\n", format_gbp(vat_amount)));
    response.push_str(&format!("Total: {}\n", format_gbp(grand_total)));

    if text_only {
        return CompletionPayload {
            response,
            structured_data: None,
        };
    }

    CompletionPayload {
        response,
        structured_data: Some(StructuredData {
            summary: Some(CostSummary {
                materials_total,
                labour_total,
                subtotal,
                vat_rate: VAT_RATE,
                vat_amount,
                grand_total,
            }),
            materials: Some(MaterialsSection {
                items: materials,
                subtotal: materials_total,
            }),
            labour: Some(LabourSection {
                tasks,
                total_hours,
                hourly_rate,
                total: labour_total,
            }),
            timescales: Some(timescales),
            alternatives: Some(alternatives),
            order_list: Some(OrderList { suppliers }),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::ParsedCostAnalysis;
    use crate::job::ProjectContext;
    use crate::settings::BusinessSettings;

    fn request(query: &str) -> JobRequest {
        JobRequest {
            query: query.to_string(),
            region: "UK".to_string(),
            project_context: ProjectContext::default(),
            business_settings: BusinessSettings::default(),
        }
    }

    fn run_to_end(backend: &MockJobBackend, id: &JobId) -> Job {
        for _ in 0..200 {
            let job = backend.fetch_job(id).expect("fetch");
            if job.is_terminal() {
                return job;
            }
        }
        panic!("job never finished");
    }

    #[test]
    fn progress_advances_per_fetch_until_complete() {
        let backend = MockJobBackend::new();
        let id = backend
            .create_job(&request("Replace consumer unit in a three bed semi"))
            .expect("create");
        let first = backend.fetch_job(&id).expect("fetch");
        assert_eq!(first.progress, 20);
        assert_eq!(first.status, JobStatus::Processing);
        assert!(first.current_step.is_some());

        let done = run_to_end(&backend, &id);
        assert_eq!(done.status, JobStatus::Complete);
        assert_eq!(done.progress, 100);
        let payload = done.completion_payload().expect("payload");
        let structured = payload.structured_data.expect("structured");
        let summary = structured.summary.expect("summary");
        assert_eq!(summary.grand_total, round2(summary.subtotal + summary.vat_amount));
        assert!(structured.order_list.expect("orders").item_count() >= 3);
    }

    #[test]
    fn text_only_payload_parses_to_same_total() {
        let backend = MockJobBackend::new();
        let id = backend
            .create_job(&request("Install kitchen sockets and downlights"))
            .expect("create");
        let structured_total = {
            let done = run_to_end(&backend, &id);
            ParsedCostAnalysis::from_payload(&done.completion_payload().expect("payload"))
                .total_cost
        };

        backend.set_text_only(true);
        let id = backend
            .create_job(&request("Install kitchen sockets and downlights"))
            .expect("create");
        let done = run_to_end(&backend, &id);
        let payload = done.completion_payload().expect("payload");
        assert!(payload.structured_data.is_none());
        assert_eq!(ParsedCostAnalysis::from_payload(&payload).total_cost, structured_total);
    }

    #[test]
    fn scripted_failures() {
        let backend = MockJobBackend::new();
        backend.set_creation_failure(Some("Service unavailable"));
        let err = backend.create_job(&request("x")).expect_err("should fail");
        assert_eq!(err.to_string(), "Service unavailable");

        backend.set_creation_failure(None);
        backend.set_failure_at_progress(Some((40, "AI pricing timed out")));
        let id = backend.create_job(&request("x")).expect("create");
        let done = run_to_end(&backend, &id);
        assert_eq!(done.status, JobStatus::Failed);
        assert_eq!(done.error_message.as_deref(), Some("AI pricing timed out"));
    }

    #[test]
    fn cancel_marks_running_job() {
        let backend = MockJobBackend::new();
        let id = backend.create_job(&request("x")).expect("create");
        backend.cancel_job(&id).expect("cancel");
        assert_eq!(backend.job_status(&id), Some(JobStatus::Cancelled));
        assert_eq!(backend.cancelled(), vec![id]);
    }
}
