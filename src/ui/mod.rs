mod results;

use eframe::{
    egui::{self, Align2, Color32, RichText, Ui},
    App, CreationContext, Frame,
};
use itertools::Itertools;
use std::time::{Duration, Instant};
use strum::IntoEnumIterator;

use crate::controller::{CostEngineerController, Toast, ToastLevel, ViewState, MIN_PROMPT_CHARS};
use crate::money::format_gbp;
use crate::processing::ProcessingStage;
use crate::settings::{SettingsForm, SETTINGS_FIELDS};
use crate::structured::Tier;

const ACCENT: Color32 = Color32::from_rgb(168, 196, 84);
const TOAST_LIFETIME: Duration = Duration::from_secs(4);
const PROCESSING_REPAINT: Duration = Duration::from_millis(100);

const PROJECT_TYPES: [(&str, &str); 3] = [
    ("domestic", "Domestic"),
    ("commercial", "Commercial"),
    ("industrial", "Industrial"),
];

pub struct CostEngineerApp {
    controller: CostEngineerController,
    settings_form: Option<SettingsForm>,
    selected_tier: Tier,
    toasts: Vec<(Toast, Instant)>,
    status: String,
}

impl CostEngineerApp {
    pub fn new(cc: &CreationContext<'_>, controller: CostEngineerController) -> Self {
        cc.egui_ctx.set_visuals(egui::Visuals::dark());
        Self {
            controller,
            settings_form: None,
            selected_tier: Tier::Standard,
            toasts: Vec::new(),
            status: "Ready".to_string(),
        }
    }

    fn surface_panel() -> egui::Frame {
        egui::Frame::none()
            .fill(Color32::from_rgb(18, 23, 34))
            .inner_margin(egui::Margin::same(10.0))
    }

    fn card_frame() -> egui::Frame {
        egui::Frame::none()
            .fill(Color32::from_rgba_unmultiplied(255, 255, 255, 10))
            .stroke(egui::Stroke::new(1.0, Color32::from_rgba_unmultiplied(255, 255, 255, 24)))
            .rounding(egui::Rounding::same(10.0))
            .inner_margin(egui::Margin::same(12.0))
    }

    fn collect_toasts(&mut self) {
        let now = Instant::now();
        for toast in self.controller.take_toasts() {
            self.status = format!("{}: {}", toast.title, toast.message);
            self.toasts.push((toast, now));
        }
        self.toasts
            .retain(|(_, shown_at)| now.duration_since(*shown_at) < TOAST_LIFETIME);
    }

    fn titlebar(&mut self, ctx: &egui::Context) {
        egui::TopBottomPanel::top("titlebar")
            .frame(Self::surface_panel())
            .show(ctx, |ui| {
                ui.horizontal(|ui| {
                    ui.label(RichText::new("⚡ AI Cost Engineer").color(ACCENT).strong().size(18.0));
                    ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                        if ui.button("Business Settings").clicked() {
                            self.settings_form =
                                Some(SettingsForm::from_settings(self.controller.business_settings()));
                        }
                        let user = self.controller.user_id().unwrap_or("guest").to_string();
                        ui.weak(format!("Signed in as {user}"));
                    });
                });
            });
    }

    fn status_bar(&mut self, ctx: &egui::Context) {
        egui::TopBottomPanel::bottom("status")
            .frame(Self::surface_panel())
            .show(ctx, |ui| {
                ui.horizontal_wrapped(|ui| {
                    ui.label(self.status.as_str());
                    if let Some(job_id) = self.controller.job_id() {
                        ui.weak(format!("Job {job_id}"));
                    }
                });
            });
    }

    fn input_view(&mut self, ui: &mut Ui) {
        ui.heading("Describe the job");
        ui.label("Give as much detail as you can: property, scope, access, existing installation.");
        ui.add_space(8.0);

        Self::card_frame().show(ui, |ui| {
            let form = &mut self.controller.form;
            ui.add(
                egui::TextEdit::multiline(&mut form.prompt)
                    .desired_rows(8)
                    .desired_width(f32::INFINITY)
                    .hint_text("e.g. Replace the consumer unit in a three bed semi, 10 circuits, split load board..."),
            );
            let chars = form.prompt_chars();
            let counter = format!("{chars} / {MIN_PROMPT_CHARS} characters minimum");
            if form.can_generate() {
                ui.small(counter);
            } else {
                ui.colored_label(Color32::YELLOW, counter);
            }

            ui.add_space(6.0);
            egui::Grid::new("job_context").num_columns(2).show(ui, |ui| {
                ui.label("Project type");
                let selected = PROJECT_TYPES
                    .iter()
                    .find(|(value, _)| *value == form.project_context.project_type)
                    .map(|(_, label)| *label)
                    .unwrap_or("Other");
                egui::ComboBox::from_id_source("project_type")
                    .selected_text(selected)
                    .show_ui(ui, |ui| {
                        for (value, label) in PROJECT_TYPES {
                            ui.selectable_value(
                                &mut form.project_context.project_type,
                                value.to_string(),
                                label,
                            );
                        }
                    });
                ui.end_row();

                ui.label("Region");
                ui.text_edit_singleline(&mut form.region);
                ui.end_row();

                ui.label("Property type");
                optional_text(ui, &mut form.project_context.property_type);
                ui.end_row();

                ui.label("Client");
                optional_text(ui, &mut form.project_context.client_name);
                ui.end_row();

                ui.label("Additional notes");
                optional_text(ui, &mut form.project_context.additional_notes);
                ui.end_row();
            });
        });

        ui.add_space(10.0);
        let generate = ui.add_enabled(
            self.controller.can_generate(),
            egui::Button::new(RichText::new("Generate cost analysis").strong()).fill(ACCENT.gamma_multiply(0.6)),
        );
        if generate.clicked() {
            self.controller.handle_generate();
        }
    }

    fn processing_view(&mut self, ui: &mut Ui) {
        if let Some(error) = self.controller.job_error().map(str::to_string) {
            ui.heading("Analysis failed");
            Self::card_frame().show(ui, |ui| {
                ui.colored_label(Color32::LIGHT_RED, error);
                ui.add_space(8.0);
                ui.horizontal(|ui| {
                    if ui.button("Retry").clicked() {
                        self.controller.handle_retry();
                    }
                    if ui.button("Cancel").clicked() {
                        self.controller.handle_cancel();
                    }
                });
            });
            return;
        }

        ui.heading("Working on your estimate");
        let current = self
            .controller
            .current_stage()
            .unwrap_or(ProcessingStage::Analysing);
        let (progress, step) = self
            .controller
            .job()
            .map(|job| (job.progress, job.current_step.clone()))
            .unwrap_or((0, None));

        Self::card_frame().show(ui, |ui| {
            for stage in ProcessingStage::iter() {
                let (marker, colour) = if stage < current {
                    ("✔", ACCENT)
                } else if stage == current {
                    ("▶", Color32::WHITE)
                } else {
                    ("○", Color32::GRAY)
                };
                ui.colored_label(colour, format!("{marker} {}", stage.label()));
            }
            ui.add_space(8.0);
            ui.add(
                egui::ProgressBar::new(f32::from(progress) / 100.0)
                    .text(step.unwrap_or_else(|| current.label().to_string())),
            );
        });

        ui.add_space(8.0);
        Self::card_frame().show(ui, |ui| {
            let elapsed = self.controller.processing_elapsed().as_secs();
            ui.label(format!("Elapsed {}:{:02}", elapsed / 60, elapsed % 60));
            ui.add(
                egui::ProgressBar::new(self.controller.cosmetic_percent() / 100.0)
                    .animate(true)
                    .desired_width(240.0),
            );
            if let Some(estimate) = self.controller.decorative_estimate() {
                ui.weak(format!("Running figure {estimate}"));
            }
        });

        ui.add_space(10.0);
        if ui.button("Cancel").clicked() {
            self.controller.handle_cancel();
        }
    }

    fn success_dialog(&mut self, ctx: &egui::Context) {
        if !self.controller.completion_pending() {
            return;
        }
        let total = self
            .controller
            .analysis()
            .map(|analysis| format_gbp(analysis.total_cost))
            .unwrap_or_default();
        let mut open_results = false;
        egui::Window::new("Estimate ready")
            .collapsible(false)
            .resizable(false)
            .anchor(Align2::CENTER_CENTER, [0.0, 0.0])
            .show(ctx, |ui| {
                ui.label("Your cost analysis is complete.");
                ui.label(RichText::new(format!("Total {total}")).strong().size(20.0));
                if ui.button("View results").clicked() {
                    open_results = true;
                }
            });
        if open_results {
            self.controller.acknowledge_completion();
        }
    }

    fn settings_dialog(&mut self, ctx: &egui::Context) {
        let Some(form) = self.settings_form.as_mut() else {
            return;
        };
        let mut open = true;
        let mut save = false;
        let mut reset = false;
        egui::Window::new("Business Settings")
            .open(&mut open)
            .resizable(true)
            .show(ctx, |ui| {
                egui::ScrollArea::vertical().max_height(480.0).show(ui, |ui| {
                    for (group, fields) in &SETTINGS_FIELDS
                        .iter()
                        .chunk_by(|field| field.key.split('.').next().unwrap_or_default())
                    {
                        ui.label(RichText::new(group_label(group)).strong());
                        egui::Grid::new(group).num_columns(2).show(ui, |ui| {
                            for field in fields {
                                ui.label(field.label);
                                if let Some(text) = form.get_mut(field.key) {
                                    ui.add(egui::TextEdit::singleline(text).desired_width(100.0));
                                }
                                ui.end_row();
                            }
                        });
                        ui.separator();
                    }
                });
                let preview = form.to_settings();
                ui.small(format!(
                    "Monthly overheads {} · {} per billable hour",
                    format_gbp(preview.total_monthly_overheads()),
                    format_gbp(preview.overhead_per_billable_hour())
                ));
                ui.horizontal(|ui| {
                    if ui.button("Save").clicked() {
                        save = true;
                    }
                    if ui.button("Reset to defaults").clicked() {
                        reset = true;
                    }
                });
            });

        if reset {
            *form = SettingsForm::from_settings(&Default::default());
        }
        if save {
            let settings = form.to_settings();
            if self.controller.save_settings(settings).is_ok() {
                self.settings_form = None;
                return;
            }
        }
        if !open {
            self.settings_form = None;
        }
    }

    fn toast_area(&self, ctx: &egui::Context) {
        if self.toasts.is_empty() {
            return;
        }
        egui::Area::new(egui::Id::new("toasts"))
            .anchor(Align2::RIGHT_BOTTOM, [-16.0, -48.0])
            .show(ctx, |ui| {
                for (toast, _) in &self.toasts {
                    let colour = match toast.level {
                        ToastLevel::Info => Color32::LIGHT_BLUE,
                        ToastLevel::Success => ACCENT,
                        ToastLevel::Error => Color32::LIGHT_RED,
                    };
                    Self::card_frame().show(ui, |ui| {
                        ui.colored_label(colour, RichText::new(&toast.title).strong());
                        ui.label(&toast.message);
                    });
                }
            });
    }
}

fn optional_text(ui: &mut Ui, value: &mut Option<String>) {
    let mut text = value.clone().unwrap_or_default();
    if ui.text_edit_singleline(&mut text).changed() {
        *value = if text.trim().is_empty() { None } else { Some(text) };
    }
}

fn group_label(group: &str) -> &'static str {
    match group {
        "monthlyOverheads" => "Monthly overheads",
        "labourRates" => "Labour rates",
        "profitTargets" => "Profit targets",
        "jobCosts" => "Job costs",
        _ => "Other",
    }
}

impl App for CostEngineerApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut Frame) {
        self.controller.pump();
        self.collect_toasts();

        self.titlebar(ctx);
        self.status_bar(ctx);
        egui::CentralPanel::default()
            .frame(Self::surface_panel().inner_margin(egui::Margin::same(18.0)))
            .show(ctx, |ui| {
                egui::ScrollArea::vertical()
                    .auto_shrink([false, false])
                    .show(ui, |ui| match self.controller.view_state() {
                        ViewState::Input => self.input_view(ui),
                        ViewState::Processing => self.processing_view(ui),
                        ViewState::Results => self.results_view(ui),
                    });
            });

        self.success_dialog(ctx);
        self.settings_dialog(ctx);
        self.toast_area(ctx);

        if self.controller.view_state() == ViewState::Processing || !self.toasts.is_empty() {
            ctx.request_repaint_after(PROCESSING_REPAINT);
        }
    }
}
