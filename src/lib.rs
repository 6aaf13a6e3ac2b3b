pub mod analysis;
pub mod backend;
pub mod config;
pub mod controller;
pub mod error;
pub mod export;
pub mod job;
pub mod money;
pub mod processing;
pub mod settings;
pub mod structured;
pub mod ui;
pub mod watcher;

pub use analysis::{parse_cost_text, AnalysisSource, ParsedCostAnalysis};
pub use backend::{backend_from_config, HttpJobBackend, JobBackend, MockJobBackend};
pub use config::AppConfig;
pub use controller::{
    CostEngineerController, JobForm, PollMode, Toast, ToastLevel, ViewState, MIN_PROMPT_CHARS,
};
pub use error::{CostEngineerError, Result};
pub use job::{CompletionPayload, Job, JobId, JobRequest, JobStatus, ProjectContext};
pub use processing::{DecorativeEstimate, ProcessingSimulation, ProcessingStage};
pub use settings::{BusinessSettings, FileKeyValueStore, KeyValueStore, SettingsService};
pub use structured::{StructuredData, Tier};
pub use ui::CostEngineerApp;
pub use watcher::{CancellationToken, JobEvent, JobEventKind, JobPoller, JobWatcher};
