//! The Cost Engineer workflow: describe the job, wait for the backend to
//! price it, then review the results.
//!
//! `Processing` also covers a failed job. In that case `job_error` is set and
//! the view offers retry or cancel instead of the progress display.

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use crate::analysis::ParsedCostAnalysis;
use crate::backend::JobBackend;
use crate::config::AppConfig;
use crate::error::{CostEngineerError, Result};
use crate::job::{Job, JobId, JobRequest, ProjectContext};
use crate::money::format_gbp;
use crate::processing::{DecorativeEstimate, ProcessingSimulation, ProcessingStage};
use crate::settings::{BusinessSettings, SettingsService};
use crate::structured::StructuredData;
use crate::watcher::{JobEvent, JobEventKind, JobPoller, JobWatcher};

/// Descriptions shorter than this keep the generate button disabled.
pub const MIN_PROMPT_CHARS: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum ViewState {
    Input,
    Processing,
    Results,
}

#[derive(Debug, Clone, PartialEq)]
pub struct JobForm {
    pub prompt: String,
    pub region: String,
    pub project_context: ProjectContext,
}

impl JobForm {
    pub fn new(region: impl Into<String>) -> Self {
        Self {
            prompt: String::new(),
            region: region.into(),
            project_context: ProjectContext {
                project_type: "domestic".to_string(),
                ..Default::default()
            },
        }
    }

    pub fn prompt_chars(&self) -> usize {
        self.prompt.trim().chars().count()
    }

    pub fn can_generate(&self) -> bool {
        self.prompt_chars() >= MIN_PROMPT_CHARS
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastLevel {
    Info,
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Toast {
    pub level: ToastLevel,
    pub title: String,
    pub message: String,
}

impl Toast {
    fn new(level: ToastLevel, title: &str, message: impl Into<String>) -> Self {
        Self {
            level,
            title: title.to_string(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollMode {
    /// A [`JobWatcher`] thread polls; call [`CostEngineerController::pump`].
    Background,
    /// Nothing polls until [`CostEngineerController::poll_now`] is called.
    Manual,
}

pub struct CostEngineerController {
    backend: Arc<dyn JobBackend>,
    settings_service: SettingsService,
    config: AppConfig,
    poll_mode: PollMode,
    user_id: Option<String>,
    business_settings: BusinessSettings,
    pub form: JobForm,
    view_state: ViewState,
    job_id: Option<JobId>,
    job: Option<Job>,
    job_error: Option<String>,
    last_job_inputs: Option<JobRequest>,
    analysis: Option<ParsedCostAnalysis>,
    structured_data: Option<StructuredData>,
    completion_pending: bool,
    processing_started_at: Option<Instant>,
    simulation: Option<ProcessingSimulation>,
    watcher: Option<JobWatcher>,
    poller: Option<JobPoller>,
    toasts: Vec<Toast>,
}

impl CostEngineerController {
    pub fn new(
        backend: Arc<dyn JobBackend>,
        settings_service: SettingsService,
        config: AppConfig,
    ) -> Self {
        let user_id = config.user_id.clone();
        let business_settings = settings_service.load(user_id.as_deref());
        Self {
            backend,
            settings_service,
            form: JobForm::new(config.region.clone()),
            config,
            poll_mode: PollMode::Background,
            user_id,
            business_settings,
            view_state: ViewState::Input,
            job_id: None,
            job: None,
            job_error: None,
            last_job_inputs: None,
            analysis: None,
            structured_data: None,
            completion_pending: false,
            processing_started_at: None,
            simulation: None,
            watcher: None,
            poller: None,
            toasts: Vec::new(),
        }
    }

    pub fn with_poll_mode(mut self, mode: PollMode) -> Self {
        self.poll_mode = mode;
        self
    }

    pub fn view_state(&self) -> ViewState {
        self.view_state
    }

    pub fn job_id(&self) -> Option<&JobId> {
        self.job_id.as_ref()
    }

    /// Latest poll snapshot of the running job.
    pub fn job(&self) -> Option<&Job> {
        self.job.as_ref()
    }

    pub fn job_error(&self) -> Option<&str> {
        self.job_error.as_deref()
    }

    pub fn last_job_inputs(&self) -> Option<&JobRequest> {
        self.last_job_inputs.as_ref()
    }

    pub fn analysis(&self) -> Option<&ParsedCostAnalysis> {
        self.analysis.as_ref()
    }

    pub fn structured_data(&self) -> Option<&StructuredData> {
        self.structured_data.as_ref()
    }

    /// True while the success dialog is showing, before results are opened.
    pub fn completion_pending(&self) -> bool {
        self.completion_pending
    }

    pub fn business_settings(&self) -> &BusinessSettings {
        &self.business_settings
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    pub fn can_generate(&self) -> bool {
        self.form.can_generate()
    }

    pub fn take_toasts(&mut self) -> Vec<Toast> {
        std::mem::take(&mut self.toasts)
    }

    pub fn current_stage(&self) -> Option<ProcessingStage> {
        if self.view_state != ViewState::Processing {
            return None;
        }
        let progress = self.job.as_ref().map(|j| j.progress).unwrap_or_default();
        Some(ProcessingStage::from_progress(progress))
    }

    pub fn processing_elapsed(&self) -> Duration {
        self.processing_started_at
            .map(|started| started.elapsed())
            .unwrap_or_default()
    }

    pub fn cosmetic_percent(&self) -> f32 {
        self.simulation
            .map(|sim| sim.cosmetic_percent(self.processing_elapsed()))
            .unwrap_or_default()
    }

    pub fn decorative_estimate(&self) -> Option<DecorativeEstimate> {
        self.simulation
            .map(|sim| sim.decorative_estimate(self.processing_elapsed()))
    }

    pub fn handle_generate(&mut self) {
        let query = self.form.prompt.trim();
        if query.is_empty() {
            self.toasts.push(Toast::new(
                ToastLevel::Error,
                "Description required",
                CostEngineerError::EmptyPrompt.to_string(),
            ));
            return;
        }
        let request = JobRequest {
            query: query.to_string(),
            region: self.form.region.clone(),
            project_context: self.form.project_context.clone(),
            business_settings: self.business_settings.clone(),
        };
        self.last_job_inputs = Some(request.clone());
        self.submit(request);
    }

    /// Re-submits the inputs captured by the last generate, ignoring any form
    /// edits made since.
    pub fn handle_retry(&mut self) {
        let Some(request) = self.last_job_inputs.clone() else {
            self.toasts.push(Toast::new(
                ToastLevel::Error,
                "Nothing to retry",
                "Start a new analysis instead",
            ));
            return;
        };
        tracing::info!("retrying cost analysis");
        self.submit(request);
    }

    pub fn handle_cancel(&mut self) {
        if let Some(watcher) = self.watcher.take() {
            watcher.cancel();
        } else if let Some(poller) = self.poller.take() {
            if !poller.is_finished() {
                if let Err(e) = self.backend.cancel_job(poller.job_id()) {
                    tracing::warn!(job_id = %poller.job_id(), "backend cancellation failed: {e}");
                }
            }
        }
        if let Some(job_id) = &self.job_id {
            tracing::info!(%job_id, "cost analysis cancelled");
        }
        self.clear_job();
        self.view_state = ViewState::Input;
        self.toasts.push(Toast::new(
            ToastLevel::Info,
            "Analysis cancelled",
            "You can edit the description and try again",
        ));
    }

    pub fn handle_new_analysis(&mut self) {
        self.stop_watching();
        self.clear_job();
        self.last_job_inputs = None;
        self.form = JobForm::new(self.config.region.clone());
        self.view_state = ViewState::Input;
    }

    /// Closes the success dialog and opens the results.
    pub fn acknowledge_completion(&mut self) {
        if self.completion_pending {
            self.completion_pending = false;
            self.view_state = ViewState::Results;
        }
    }

    pub fn set_user(&mut self, user_id: Option<String>) {
        if self.user_id == user_id {
            return;
        }
        self.user_id = user_id;
        self.business_settings = self.settings_service.load(self.user_id.as_deref());
    }

    pub fn save_settings(&mut self, settings: BusinessSettings) -> Result<()> {
        match self.settings_service.save(self.user_id.as_deref(), &settings) {
            Ok(()) => {
                self.business_settings = settings;
                self.toasts.push(Toast::new(
                    ToastLevel::Success,
                    "Settings saved",
                    "Your business settings will be used for new estimates",
                ));
                Ok(())
            }
            Err(e) => {
                self.toasts.push(Toast::new(
                    ToastLevel::Error,
                    "Settings not saved",
                    e.to_string(),
                ));
                Err(e)
            }
        }
    }

    /// Applies every event the background watcher has delivered so far.
    pub fn pump(&mut self) -> usize {
        let mut drained = Vec::new();
        if let Some(watcher) = &self.watcher {
            while let Some(event) = watcher.try_next() {
                drained.push(event);
            }
        }
        let count = drained.len();
        for event in drained {
            self.handle_job_event(event);
        }
        count
    }

    /// Waits up to `timeout` for one watcher event and applies it.
    pub fn pump_blocking(&mut self, timeout: Duration) -> bool {
        let event = match &self.watcher {
            Some(watcher) => watcher.next_timeout(timeout),
            None => None,
        };
        match event {
            Some(event) => {
                self.handle_job_event(event);
                true
            }
            None => false,
        }
    }

    /// Runs one synchronous poll in [`PollMode::Manual`].
    pub fn poll_now(&mut self) -> bool {
        let event = self.poller.as_mut().and_then(JobPoller::poll);
        match event {
            Some(event) => {
                self.handle_job_event(event);
                true
            }
            None => false,
        }
    }

    pub fn handle_job_event(&mut self, event: JobEvent) {
        if self.job_id.as_ref() != Some(&event.job_id) {
            tracing::debug!(job_id = %event.job_id, "ignoring event for a superseded job");
            return;
        }
        match event.kind {
            JobEventKind::Progress(job) => self.job = Some(job),
            JobEventKind::Completed(job) => self.on_complete(job),
            JobEventKind::Failed(message) => self.on_error(message),
            JobEventKind::Cancelled => self.on_error("The analysis was cancelled".to_string()),
        }
    }

    fn submit(&mut self, request: JobRequest) {
        self.stop_watching();
        self.clear_job();
        self.view_state = ViewState::Processing;
        self.processing_started_at = Some(Instant::now());

        match self.backend.create_job(&request) {
            Ok(job_id) => {
                tracing::info!(%job_id, "cost analysis started");
                let seed = job_id.as_str().bytes().map(u64::from).sum();
                self.simulation = Some(ProcessingSimulation::new(seed));
                self.job_id = Some(job_id.clone());
                self.start_watching(job_id);
            }
            Err(e) => {
                tracing::error!("failed to create cost analysis job: {e}");
                self.processing_started_at = None;
                self.view_state = ViewState::Input;
                self.toasts.push(Toast::new(
                    ToastLevel::Error,
                    "Could not start analysis",
                    e.to_string(),
                ));
            }
        }
    }

    fn start_watching(&mut self, job_id: JobId) {
        let max_errors = self.config.max_poll_errors;
        match self.poll_mode {
            PollMode::Manual => {
                self.poller = Some(JobPoller::new(self.backend.clone(), job_id, max_errors));
            }
            PollMode::Background => {
                match JobWatcher::spawn(
                    self.backend.clone(),
                    job_id,
                    self.config.poll_interval(),
                    max_errors,
                ) {
                    Ok(watcher) => self.watcher = Some(watcher),
                    Err(e) => self.on_error(format!("Could not watch job progress: {e}")),
                }
            }
        }
    }

    /// Drops the watcher without asking the backend to cancel.
    fn stop_watching(&mut self) {
        self.watcher = None;
        self.poller = None;
    }

    fn clear_job(&mut self) {
        self.job_id = None;
        self.job = None;
        self.job_error = None;
        self.analysis = None;
        self.structured_data = None;
        self.completion_pending = false;
        self.processing_started_at = None;
        self.simulation = None;
    }

    fn on_complete(&mut self, job: Job) {
        let payload = job.completion_payload().unwrap_or_default();
        let analysis = ParsedCostAnalysis::from_payload(&payload);
        tracing::info!(
            job_id = %job.id,
            total = analysis.total_cost,
            source = ?analysis.source,
            "cost analysis complete"
        );
        self.toasts.push(Toast::new(
            ToastLevel::Success,
            "Analysis complete",
            format!("Estimated total {}", format_gbp(analysis.total_cost)),
        ));
        self.structured_data = payload.structured_data;
        self.analysis = Some(analysis);
        self.job = Some(job);
        self.completion_pending = true;
        self.stop_watching();
    }

    fn on_error(&mut self, message: String) {
        tracing::error!(job_id = ?self.job_id, "cost analysis failed: {message}");
        self.toasts.push(Toast::new(
            ToastLevel::Error,
            "Analysis failed",
            message.clone(),
        ));
        self.job_error = Some(message);
        self.view_state = ViewState::Processing;
        self.stop_watching();
    }
}
