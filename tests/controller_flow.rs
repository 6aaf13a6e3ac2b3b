use cost_engineer::{
    AnalysisSource, AppConfig, CostEngineerController, CostEngineerError, JobStatus,
    MockJobBackend, PollMode, SettingsService, ToastLevel, ViewState,
};
use pretty_assertions::assert_eq;
use std::{sync::Arc, time::Duration};

const DESCRIPTION: &str = "Replace the consumer unit in a three bed semi detached house. \
    Ten circuits, split load board, add two RCBOs for the kitchen ring and a new cooker circuit.";

fn manual_controller(backend: &Arc<MockJobBackend>) -> CostEngineerController {
    CostEngineerController::new(backend.clone(), SettingsService::in_memory(), AppConfig::default())
        .with_poll_mode(PollMode::Manual)
}

fn poll_until_settled(controller: &mut CostEngineerController) {
    for _ in 0..50 {
        controller.poll_now();
        if controller.completion_pending() || controller.job_error().is_some() {
            return;
        }
    }
    panic!("job never settled");
}

#[test]
fn generate_button_needs_a_detailed_description() {
    let backend = Arc::new(MockJobBackend::new());
    let mut controller = manual_controller(&backend);
    controller.form.prompt = "a".repeat(50);
    assert!(!controller.can_generate());
    controller.form.prompt = "a".repeat(110);
    assert!(controller.can_generate());
}

#[test]
fn blank_description_never_reaches_backend() {
    let backend = Arc::new(MockJobBackend::new());
    let mut controller = manual_controller(&backend);
    controller.form.prompt = "   \n\t ".to_string();
    controller.handle_generate();

    assert!(backend.requests().is_empty());
    assert_eq!(controller.view_state(), ViewState::Input);
    let toasts = controller.take_toasts();
    assert_eq!(toasts.len(), 1);
    assert_eq!(toasts[0].level, ToastLevel::Error);
    assert_eq!(toasts[0].message, CostEngineerError::EmptyPrompt.to_string());
}

#[test]
fn generate_creates_job_and_enters_processing() {
    let backend = Arc::new(MockJobBackend::new());
    let mut controller = manual_controller(&backend);
    controller.form.prompt = DESCRIPTION.to_string();
    controller.handle_generate();

    assert_eq!(controller.view_state(), ViewState::Processing);
    let job_id = controller.job_id().cloned().expect("job id");
    assert_eq!(backend.job_status(&job_id), Some(JobStatus::Pending));

    let request = controller.last_job_inputs().expect("inputs").clone();
    assert_eq!(request.query, DESCRIPTION);
    assert_eq!(request.region, "UK");
    assert_eq!(backend.requests(), vec![request]);
}

#[test]
fn structured_summary_sets_the_total() {
    let backend = Arc::new(MockJobBackend::new());
    let mut controller = manual_controller(&backend);
    controller.form.prompt = DESCRIPTION.to_string();
    controller.handle_generate();
    poll_until_settled(&mut controller);

    assert!(controller.completion_pending());
    assert_eq!(controller.view_state(), ViewState::Processing);
    controller.acknowledge_completion();
    assert_eq!(controller.view_state(), ViewState::Results);

    let grand_total = controller
        .structured_data()
        .and_then(|data| data.summary.as_ref())
        .map(|summary| summary.grand_total)
        .expect("summary");
    let analysis = controller.analysis().expect("analysis");
    assert_eq!(analysis.source, AnalysisSource::Structured);
    assert_eq!(analysis.total_cost, grand_total);
    assert!(analysis.totals_consistent());
}

#[test]
fn text_only_result_falls_back_to_parser() {
    let backend = Arc::new(MockJobBackend::new());
    backend.set_text_only(true);
    let mut controller = manual_controller(&backend);
    controller.form.prompt = DESCRIPTION.to_string();
    controller.handle_generate();
    poll_until_settled(&mut controller);

    assert!(controller.structured_data().is_none());
    let analysis = controller.analysis().expect("analysis");
    assert_eq!(analysis.source, AnalysisSource::TextFallback);
    assert!(analysis.total_cost > 0.0);
    assert!(!analysis.materials.is_empty());
}

#[test]
fn failure_keeps_processing_and_retry_reuses_inputs() {
    let backend = Arc::new(MockJobBackend::new());
    backend.set_failure_at_progress(Some((40, "AI pricing timed out")));
    let mut controller = manual_controller(&backend);
    controller.form.prompt = DESCRIPTION.to_string();
    controller.handle_generate();
    poll_until_settled(&mut controller);

    assert_eq!(controller.view_state(), ViewState::Processing);
    assert_eq!(controller.job_error(), Some("AI pricing timed out"));
    assert!(controller
        .take_toasts()
        .iter()
        .any(|toast| toast.level == ToastLevel::Error));

    controller.form.prompt = "Something else entirely".to_string();
    controller.form.region = "Scotland".to_string();
    backend.set_failure_at_progress(None);
    controller.handle_retry();

    let requests = backend.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0], requests[1]);
    assert!(controller.job_error().is_none());

    poll_until_settled(&mut controller);
    assert!(controller.completion_pending());
}

#[test]
fn repeated_poll_errors_surface_as_failure() {
    let backend = Arc::new(MockJobBackend::new());
    let mut controller = manual_controller(&backend);
    controller.form.prompt = DESCRIPTION.to_string();
    controller.handle_generate();
    backend.fail_next_fetches(AppConfig::default().max_poll_errors);
    poll_until_settled(&mut controller);

    assert_eq!(controller.job_error(), Some("Temporary network error"));
}

#[test]
fn creation_failure_returns_to_input() {
    let backend = Arc::new(MockJobBackend::new());
    backend.set_creation_failure(Some("Service unavailable"));
    let mut controller = manual_controller(&backend);
    controller.form.prompt = DESCRIPTION.to_string();
    controller.handle_generate();

    assert_eq!(controller.view_state(), ViewState::Input);
    assert!(controller.job_id().is_none());
    let toasts = controller.take_toasts();
    assert_eq!(toasts.len(), 1);
    assert_eq!(toasts[0].message, "Service unavailable");
}

#[test]
fn cancel_returns_to_input_and_cancels_job() {
    let backend = Arc::new(MockJobBackend::new());
    let mut controller = manual_controller(&backend);
    controller.form.prompt = DESCRIPTION.to_string();
    controller.handle_generate();
    controller.poll_now();
    let job_id = controller.job_id().cloned().expect("job id");

    controller.handle_cancel();

    assert_eq!(controller.view_state(), ViewState::Input);
    assert!(controller.job_id().is_none());
    assert_eq!(backend.cancelled(), vec![job_id.clone()]);
    assert_eq!(backend.job_status(&job_id), Some(JobStatus::Cancelled));
    assert_eq!(controller.form.prompt, DESCRIPTION);
}

#[test]
fn new_analysis_resets_everything() {
    let backend = Arc::new(MockJobBackend::new());
    let mut controller = manual_controller(&backend);
    controller.form.prompt = DESCRIPTION.to_string();
    controller.handle_generate();
    poll_until_settled(&mut controller);
    controller.acknowledge_completion();

    controller.handle_new_analysis();

    assert_eq!(controller.view_state(), ViewState::Input);
    assert!(controller.form.prompt.is_empty());
    assert!(controller.analysis().is_none());
    assert!(controller.structured_data().is_none());
    assert!(controller.last_job_inputs().is_none());
}

#[test]
fn background_watcher_drives_job_to_results() {
    let backend = Arc::new(MockJobBackend::with_progress_step(25));
    let config = AppConfig {
        poll_interval_ms: 5,
        ..AppConfig::default()
    };
    let mut controller =
        CostEngineerController::new(backend, SettingsService::in_memory(), config);
    controller.form.prompt = DESCRIPTION.to_string();
    controller.handle_generate();

    for _ in 0..100 {
        controller.pump_blocking(Duration::from_millis(100));
        if controller.completion_pending() {
            break;
        }
    }
    assert!(controller.completion_pending());
    controller.acknowledge_completion();
    assert_eq!(controller.view_state(), ViewState::Results);
    assert_eq!(controller.job().map(|job| job.progress), Some(100));
}
