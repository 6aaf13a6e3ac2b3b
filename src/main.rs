use anyhow::{bail, Context, Result};
use clap::Parser;
use cost_engineer::{
    backend_from_config,
    export::write_order_list,
    settings::{FileKeyValueStore, SettingsService},
    structured::structured_data_schema,
    AppConfig, CostEngineerApp, CostEngineerController, PollMode, ToastLevel, ViewState,
    MIN_PROMPT_CHARS,
};
use eframe::{egui, NativeOptions};
use std::{
    path::PathBuf,
    sync::Arc,
    time::{Duration, Instant},
};

const HEADLESS_TIMEOUT: Duration = Duration::from_secs(600);

#[derive(Parser, Debug)]
#[command(name = "cost-engineer", version, about = "AI cost estimates for electrical jobs")]
struct Cli {
    /// Run one analysis for this job description and print the result as JSON
    #[arg(long, value_name = "PROMPT")]
    headless: Option<String>,

    /// With --headless, also write the supplier order list to this CSV file
    #[arg(long, value_name = "PATH", requires = "headless")]
    csv: Option<PathBuf>,

    /// Print the JSON schema of the structured analysis and exit
    #[arg(long)]
    print_schema: bool,
}

fn main() -> Result<()> {
    setup_tracing();
    let cli = Cli::parse();

    if cli.print_schema {
        println!("{}", serde_json::to_string_pretty(&structured_data_schema())?);
        return Ok(());
    }

    let config = AppConfig::load().context("loading configuration")?;
    let controller = build_controller(config)?;

    match cli.headless {
        Some(prompt) => run_headless(controller, prompt, cli.csv),
        None => run_gui(controller),
    }
}

fn setup_tracing() {
    if tracing::dispatcher::has_been_set() {
        return;
    }
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .try_init();
}

fn build_controller(config: AppConfig) -> Result<CostEngineerController> {
    let backend = backend_from_config(&config).context("configuring job backend")?;
    let settings = match FileKeyValueStore::platform_default() {
        Ok(store) => SettingsService::new(Arc::new(store)),
        Err(e) => {
            tracing::warn!("settings will not persist: {e}");
            SettingsService::in_memory()
        }
    };
    Ok(CostEngineerController::new(backend, settings, config))
}

fn run_gui(controller: CostEngineerController) -> Result<()> {
    let options = NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_resizable(true)
            .with_inner_size([1280.0, 860.0])
            .with_min_inner_size([900.0, 600.0]),
        ..Default::default()
    };

    eframe::run_native(
        "AI Cost Engineer",
        options,
        Box::new(|cc| Ok(Box::new(CostEngineerApp::new(cc, controller)))),
    )
    .map_err(|e| anyhow::anyhow!("failed to start the desktop app: {e}"))
}

fn run_headless(
    controller: CostEngineerController,
    prompt: String,
    csv: Option<PathBuf>,
) -> Result<()> {
    let mut controller = controller.with_poll_mode(PollMode::Background);
    controller.form.prompt = prompt;
    if !controller.can_generate() {
        tracing::warn!(
            chars = controller.form.prompt_chars(),
            "description is shorter than {MIN_PROMPT_CHARS} characters; results may be vague"
        );
    }

    controller.handle_generate();
    let deadline = Instant::now() + HEADLESS_TIMEOUT;
    while controller.view_state() == ViewState::Processing
        && !controller.completion_pending()
        && controller.job_error().is_none()
    {
        if Instant::now() >= deadline {
            controller.handle_cancel();
            bail!("timed out waiting for the cost analysis");
        }
        controller.pump_blocking(Duration::from_millis(500));
    }

    if let Some(error) = controller.job_error() {
        bail!("cost analysis failed: {error}");
    }
    if !controller.completion_pending() {
        let reason = controller
            .take_toasts()
            .into_iter()
            .find(|toast| toast.level == ToastLevel::Error)
            .map(|toast| toast.message)
            .unwrap_or_else(|| "the job did not start".to_string());
        bail!("cost analysis failed: {reason}");
    }
    controller.acknowledge_completion();

    let output = serde_json::json!({
        "jobId": controller.job_id(),
        "analysis": controller.analysis(),
        "structuredData": controller.structured_data(),
    });
    println!("{}", serde_json::to_string_pretty(&output)?);

    if let Some(path) = csv {
        let order_list = controller
            .structured_data()
            .and_then(|data| data.order_list.as_ref())
            .context("the analysis has no order list to export")?;
        write_order_list(&path, order_list)
            .with_context(|| format!("writing {}", path.display()))?;
    }
    Ok(())
}
