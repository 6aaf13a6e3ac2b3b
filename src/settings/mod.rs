//! Business settings: overheads, labour rates, profit targets and per-job
//! costs that are sent with every generation request.

mod store;

pub use store::{FileKeyValueStore, KeyValueStore, MemoryKeyValueStore, SettingsService};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct MonthlyOverheads {
    pub rent: f64,
    pub vehicle: f64,
    pub insurance: f64,
    pub tools: f64,
    pub phone: f64,
    pub software: f64,
    pub marketing: f64,
    pub accountancy: f64,
    pub other: f64,
}

impl Default for MonthlyOverheads {
    fn default() -> Self {
        Self {
            rent: 250.0,
            vehicle: 450.0,
            insurance: 120.0,
            tools: 80.0,
            phone: 40.0,
            software: 50.0,
            marketing: 100.0,
            accountancy: 75.0,
            other: 50.0,
        }
    }
}

impl MonthlyOverheads {
    pub fn total(&self) -> f64 {
        self.rent
            + self.vehicle
            + self.insurance
            + self.tools
            + self.phone
            + self.software
            + self.marketing
            + self.accountancy
            + self.other
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct LabourRates {
    pub electrician: f64,
    pub apprentice: f64,
    pub labourer: f64,
    pub supervisor: f64,
    pub billable_hours_per_month: f64,
}

impl Default for LabourRates {
    fn default() -> Self {
        Self {
            electrician: 45.0,
            apprentice: 18.0,
            labourer: 20.0,
            supervisor: 55.0,
            billable_hours_per_month: 140.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct ProfitTargets {
    pub margin_percent: f64,
    pub markup_percent: f64,
    pub minimum_job_value: f64,
}

impl Default for ProfitTargets {
    fn default() -> Self {
        Self {
            margin_percent: 20.0,
            markup_percent: 25.0,
            minimum_job_value: 150.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct JobCosts {
    pub travel_per_mile: f64,
    pub wastage_percent: f64,
    pub consumables_per_day: f64,
    pub certification_fee: f64,
}

impl Default for JobCosts {
    fn default() -> Self {
        Self {
            travel_per_mile: 0.45,
            wastage_percent: 10.0,
            consumables_per_day: 15.0,
            certification_fee: 85.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct BusinessSettings {
    pub monthly_overheads: MonthlyOverheads,
    pub labour_rates: LabourRates,
    pub profit_targets: ProfitTargets,
    pub job_costs: JobCosts,
}

/// One editable numeric field, addressed as `group.field` using the stored
/// (camelCase) names.
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub key: &'static str,
    pub label: &'static str,
}

pub const SETTINGS_FIELDS: &[FieldSpec] = &[
    FieldSpec { key: "monthlyOverheads.rent", label: "Rent / unit" },
    FieldSpec { key: "monthlyOverheads.vehicle", label: "Vehicle" },
    FieldSpec { key: "monthlyOverheads.insurance", label: "Insurance" },
    FieldSpec { key: "monthlyOverheads.tools", label: "Tools & equipment" },
    FieldSpec { key: "monthlyOverheads.phone", label: "Phone" },
    FieldSpec { key: "monthlyOverheads.software", label: "Software" },
    FieldSpec { key: "monthlyOverheads.marketing", label: "Marketing" },
    FieldSpec { key: "monthlyOverheads.accountancy", label: "Accountancy" },
    FieldSpec { key: "monthlyOverheads.other", label: "Other" },
    FieldSpec { key: "labourRates.electrician", label: "Electrician (£/hr)" },
    FieldSpec { key: "labourRates.apprentice", label: "Apprentice (£/hr)" },
    FieldSpec { key: "labourRates.labourer", label: "Labourer (£/hr)" },
    FieldSpec { key: "labourRates.supervisor", label: "Supervisor (£/hr)" },
    FieldSpec { key: "labourRates.billableHoursPerMonth", label: "Billable hours / month" },
    FieldSpec { key: "profitTargets.marginPercent", label: "Target margin %" },
    FieldSpec { key: "profitTargets.markupPercent", label: "Materials markup %" },
    FieldSpec { key: "profitTargets.minimumJobValue", label: "Minimum job value" },
    FieldSpec { key: "jobCosts.travelPerMile", label: "Travel (£/mile)" },
    FieldSpec { key: "jobCosts.wastagePercent", label: "Wastage %" },
    FieldSpec { key: "jobCosts.consumablesPerDay", label: "Consumables (£/day)" },
    FieldSpec { key: "jobCosts.certificationFee", label: "Certification fee" },
];

impl BusinessSettings {
    pub fn total_monthly_overheads(&self) -> f64 {
        self.monthly_overheads.total()
    }

    pub fn overhead_per_billable_hour(&self) -> f64 {
        let hours = self.labour_rates.billable_hours_per_month;
        if hours <= 0.0 {
            0.0
        } else {
            self.total_monthly_overheads() / hours
        }
    }

    fn slot_mut(&mut self, key: &str) -> Option<&mut f64> {
        let o = &mut self.monthly_overheads;
        let l = &mut self.labour_rates;
        let p = &mut self.profit_targets;
        let j = &mut self.job_costs;
        Some(match key {
            "monthlyOverheads.rent" => &mut o.rent,
            "monthlyOverheads.vehicle" => &mut o.vehicle,
            "monthlyOverheads.insurance" => &mut o.insurance,
            "monthlyOverheads.tools" => &mut o.tools,
            "monthlyOverheads.phone" => &mut o.phone,
            "monthlyOverheads.software" => &mut o.software,
            "monthlyOverheads.marketing" => &mut o.marketing,
            "monthlyOverheads.accountancy" => &mut o.accountancy,
            "monthlyOverheads.other" => &mut o.other,
            "labourRates.electrician" => &mut l.electrician,
            "labourRates.apprentice" => &mut l.apprentice,
            "labourRates.labourer" => &mut l.labourer,
            "labourRates.supervisor" => &mut l.supervisor,
            "labourRates.billableHoursPerMonth" => &mut l.billable_hours_per_month,
            "profitTargets.marginPercent" => &mut p.margin_percent,
            "profitTargets.markupPercent" => &mut p.markup_percent,
            "profitTargets.minimumJobValue" => &mut p.minimum_job_value,
            "jobCosts.travelPerMile" => &mut j.travel_per_mile,
            "jobCosts.wastagePercent" => &mut j.wastage_percent,
            "jobCosts.consumablesPerDay" => &mut j.consumables_per_day,
            "jobCosts.certificationFee" => &mut j.certification_fee,
            _ => return None,
        })
    }

    pub fn get(&self, key: &str) -> Option<f64> {
        let mut copy = self.clone();
        copy.slot_mut(key).map(|v| *v)
    }

    /// Returns `false` when `key` does not name a settings field.
    pub fn set(&mut self, key: &str, value: f64) -> bool {
        match self.slot_mut(key) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }
}

/// Form text to number. Unparsable input becomes 0; nothing else is validated.
pub fn coerce_number(raw: &str) -> f64 {
    let cleaned = raw
        .trim()
        .trim_start_matches('£')
        .trim_end_matches('%')
        .replace(',', "");
    match cleaned.trim().parse::<f64>() {
        Ok(value) if value.is_finite() => value,
        _ => 0.0,
    }
}

/// Text draft of every settings field, as edited in the settings dialog.
#[derive(Debug, Clone, PartialEq)]
pub struct SettingsForm {
    values: BTreeMap<&'static str, String>,
}

impl SettingsForm {
    pub fn from_settings(settings: &BusinessSettings) -> Self {
        let values = SETTINGS_FIELDS
            .iter()
            .map(|field| {
                let value = settings.get(field.key).unwrap_or_default();
                (field.key, format_field(value))
            })
            .collect();
        Self { values }
    }

    pub fn field_keys() -> impl Iterator<Item = &'static str> {
        SETTINGS_FIELDS.iter().map(|f| f.key)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut String> {
        self.values.get_mut(key)
    }

    pub fn set(&mut self, key: &str, text: impl Into<String>) -> bool {
        match self.values.get_mut(key) {
            Some(slot) => {
                *slot = text.into();
                true
            }
            None => false,
        }
    }

    pub fn to_settings(&self) -> BusinessSettings {
        let mut settings = BusinessSettings::default();
        for (key, text) in &self.values {
            settings.set(key, coerce_number(text));
        }
        settings
    }
}

fn format_field(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{value:.0}")
    } else {
        value.to_string()
    }
}
