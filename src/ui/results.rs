use eframe::egui::{self, Color32, RichText, Ui};
use strum::IntoEnumIterator;

use super::{CostEngineerApp, ACCENT};
use crate::analysis::{AnalysisSource, ParsedCostAnalysis};
use crate::export::{default_export_file_name, write_order_list};
use crate::money::format_gbp;
use crate::structured::{Alternatives, OrderList, StructuredData, Tier, Timescales};

impl CostEngineerApp {
    pub(super) fn results_view(&mut self, ui: &mut Ui) {
        let Some(analysis) = self.controller.analysis().cloned() else {
            ui.label("No results yet.");
            return;
        };
        let structured = self.controller.structured_data().cloned().unwrap_or_default();

        ui.horizontal(|ui| {
            ui.heading("Cost analysis");
            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                if ui.button("New analysis").clicked() {
                    self.selected_tier = Tier::Standard;
                    self.controller.handle_new_analysis();
                }
            });
        });
        ui.add_space(6.0);

        stat_cards(ui, &analysis, structured.timescales.as_ref());
        if !analysis.totals_consistent() {
            ui.colored_label(
                Color32::YELLOW,
                "⚠ The figures returned do not add up to the quoted total. Check before sending.",
            );
        }
        if analysis.source == AnalysisSource::TextFallback {
            ui.weak("Figures read from the written analysis; some breakdowns may be missing.");
        }
        ui.add_space(8.0);

        materials_section(ui, &analysis, &structured);
        labour_section(ui, &analysis, &structured);
        if let Some(timescales) = &structured.timescales {
            timescales_section(ui, timescales);
        }
        if let Some(alternatives) = &structured.alternatives {
            self.alternatives_section(ui, alternatives);
        }
        if let Some(order_list) = &structured.order_list {
            self.order_list_section(ui, order_list);
        }

        egui::CollapsingHeader::new("Full written analysis")
            .default_open(false)
            .show(ui, |ui| {
                ui.label(analysis.raw_text.as_str());
            });
    }

    fn alternatives_section(&mut self, ui: &mut Ui, alternatives: &Alternatives) {
        egui::CollapsingHeader::new("Quote options")
            .default_open(true)
            .show(ui, |ui| {
                ui.horizontal(|ui| {
                    for tier in Tier::iter() {
                        let label = match alternatives.tier(tier) {
                            Some(quote) => format!("{tier} {}", format_gbp(quote.total)),
                            None => tier.to_string(),
                        };
                        ui.selectable_value(&mut self.selected_tier, tier, label);
                    }
                });
                let Some(quote) = alternatives.tier(self.selected_tier) else {
                    ui.weak("No quote for this option.");
                    return;
                };
                Self::card_frame().show(ui, |ui| {
                    ui.label(RichText::new(format_gbp(quote.total)).strong().size(18.0));
                    ui.label(quote.description.as_str());
                    for inclusion in &quote.inclusions {
                        ui.colored_label(ACCENT, format!("✔ {inclusion}"));
                    }
                    for exclusion in &quote.exclusions {
                        ui.colored_label(Color32::GRAY, format!("✘ {exclusion}"));
                    }
                });
            });
    }

    fn order_list_section(&mut self, ui: &mut Ui, order_list: &OrderList) {
        egui::CollapsingHeader::new(format!("Order list ({} items)", order_list.item_count()))
            .default_open(false)
            .show(ui, |ui| {
                for supplier in &order_list.suppliers {
                    ui.label(RichText::new(&supplier.supplier).strong());
                    egui::Grid::new(("order", supplier.supplier.as_str()))
                        .striped(true)
                        .num_columns(4)
                        .show(ui, |ui| {
                            for item in &supplier.items {
                                ui.label(item.description.as_str());
                                ui.weak(item.product_code.as_deref().unwrap_or("-"));
                                ui.label(format!("{} {}", item.quantity, item.unit));
                                ui.label(format_gbp(item.total));
                                ui.end_row();
                            }
                        });
                    ui.small(format!("Subtotal {}", format_gbp(supplier.subtotal)));
                    ui.separator();
                }
                ui.horizontal(|ui| {
                    ui.label(RichText::new(format!("Order total {}", format_gbp(order_list.total()))).strong());
                    if ui.button("Export CSV").clicked() {
                        self.export_order_list(order_list);
                    }
                });
            });
    }

    fn export_order_list(&mut self, order_list: &OrderList) {
        let file_name = default_export_file_name(chrono::Local::now().date_naive());
        let Some(path) = rfd::FileDialog::new()
            .add_filter("CSV", &["csv"])
            .set_file_name(file_name.as_str())
            .save_file()
        else {
            return;
        };
        self.status = match write_order_list(&path, order_list) {
            Ok(()) => format!("Order list exported to {}", path.display()),
            Err(e) => {
                tracing::error!(path = %path.display(), "order list export failed: {e}");
                format!("Export failed: {e}")
            }
        };
    }
}

fn stat_cards(ui: &mut Ui, analysis: &ParsedCostAnalysis, timescales: Option<&Timescales>) {
    let days = timescales
        .map(|t| format!("{} days", t.total_days))
        .unwrap_or_else(|| "-".to_string());
    let cards = [
        ("Total (inc VAT)", format_gbp(analysis.total_cost)),
        ("Materials", format_gbp(analysis.materials_total)),
        ("Labour", format_gbp(analysis.labour.total)),
        ("Duration", days),
    ];
    ui.columns(cards.len(), |columns| {
        for (column, (label, value)) in columns.iter_mut().zip(cards) {
            CostEngineerApp::card_frame().show(column, |ui| {
                ui.weak(label);
                ui.label(RichText::new(value).strong().size(20.0).color(ACCENT));
            });
        }
    });
}

fn materials_section(ui: &mut Ui, analysis: &ParsedCostAnalysis, structured: &StructuredData) {
    egui::CollapsingHeader::new("Materials")
        .default_open(true)
        .show(ui, |ui| {
            egui::Grid::new("materials").striped(true).num_columns(4).show(ui, |ui| {
                ui.strong("Item");
                ui.strong("Qty");
                ui.strong("Unit price");
                ui.strong("Total");
                ui.end_row();
                match &structured.materials {
                    Some(section) => {
                        for item in &section.items {
                            ui.label(item.description.as_str());
                            ui.label(format!("{} {}", item.quantity, item.unit));
                            ui.label(format_gbp(item.unit_price));
                            ui.label(format_gbp(item.total));
                            ui.end_row();
                        }
                    }
                    None => {
                        for line in &analysis.materials {
                            ui.label(line.description.as_str());
                            ui.label(line.quantity.map(|q| q.to_string()).unwrap_or_default());
                            ui.label(line.unit_price.map(format_gbp).unwrap_or_default());
                            ui.label(format_gbp(line.total));
                            ui.end_row();
                        }
                    }
                }
            });
            ui.label(format!("Materials total {}", format_gbp(analysis.materials_total)));
        });
}

fn labour_section(ui: &mut Ui, analysis: &ParsedCostAnalysis, structured: &StructuredData) {
    egui::CollapsingHeader::new("Labour")
        .default_open(true)
        .show(ui, |ui| {
            if let Some(section) = &structured.labour {
                for task in &section.tasks {
                    ui.label(format!(
                        "{}: {}h × {} worker(s)",
                        task.description, task.hours, task.workers
                    ));
                }
            } else if !analysis.labour.description.is_empty() {
                ui.label(analysis.labour.description.as_str());
            }
            ui.label(format!(
                "{} hours at {}/h = {}",
                analysis.labour.hours,
                format_gbp(analysis.labour.rate),
                format_gbp(analysis.labour.total)
            ));
        });
}

fn timescales_section(ui: &mut Ui, timescales: &Timescales) {
    egui::CollapsingHeader::new("Timescales")
        .default_open(false)
        .show(ui, |ui| {
            for phase in &timescales.phases {
                ui.label(format!("{} ({} days): {}", phase.name, phase.days, phase.description));
            }
            if let Some(start) = &timescales.earliest_start {
                ui.weak(format!("Earliest start {start}"));
            }
        });
}
