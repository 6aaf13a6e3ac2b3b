use cost_engineer::{
    settings::{SettingsForm, SettingsService},
    AppConfig, BusinessSettings, CostEngineerController, FileKeyValueStore, MockJobBackend,
    PollMode,
};
use pretty_assertions::assert_eq;
use std::sync::Arc;

fn file_service(dir: &tempfile::TempDir) -> SettingsService {
    SettingsService::new(Arc::new(FileKeyValueStore::new(dir.path())))
}

#[test]
fn saved_settings_survive_a_restart() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = AppConfig {
        user_id: Some("user-42".to_string()),
        ..AppConfig::default()
    };

    let mut controller = CostEngineerController::new(
        Arc::new(MockJobBackend::new()),
        file_service(&dir),
        config.clone(),
    )
    .with_poll_mode(PollMode::Manual);
    let mut form = SettingsForm::from_settings(controller.business_settings());
    assert!(form.set("labourRates.electrician", "£52.50"));
    assert!(form.set("monthlyOverheads.rent", "1,200"));
    controller.save_settings(form.to_settings()).expect("save");

    let restarted = CostEngineerController::new(
        Arc::new(MockJobBackend::new()),
        file_service(&dir),
        config,
    );
    let settings = restarted.business_settings();
    assert_eq!(settings.labour_rates.electrician, 52.5);
    assert_eq!(settings.monthly_overheads.rent, 1200.0);
}

#[test]
fn settings_are_kept_per_user() {
    let dir = tempfile::tempdir().expect("tempdir");
    let service = file_service(&dir);
    let mut controller = CostEngineerController::new(
        Arc::new(MockJobBackend::new()),
        service.clone(),
        AppConfig::default(),
    );

    let mut custom = BusinessSettings::default();
    custom.labour_rates.apprentice = 21.0;
    service.save(Some("alice"), &custom).expect("save");

    assert_eq!(controller.business_settings(), &BusinessSettings::default());
    controller.set_user(Some("alice".to_string()));
    assert_eq!(controller.business_settings().labour_rates.apprentice, 21.0);
    controller.set_user(None);
    assert_eq!(controller.business_settings(), &BusinessSettings::default());
}

#[test]
fn generated_request_carries_current_settings() {
    let backend = Arc::new(MockJobBackend::new());
    let mut controller = CostEngineerController::new(
        backend.clone(),
        SettingsService::in_memory(),
        AppConfig::default(),
    )
    .with_poll_mode(PollMode::Manual);

    let mut settings = BusinessSettings::default();
    settings.profit_targets.markup_percent = 35.0;
    controller.save_settings(settings.clone()).expect("save");
    controller.form.prompt = "Fit an EV charger on the front wall with a new radial from the board".to_string();
    controller.handle_generate();

    assert_eq!(backend.requests()[0].business_settings, settings);
}
