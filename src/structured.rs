//! Structured (V3) generation output. Every section is optional and is only
//! rendered when the backend supplied it.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default, JsonSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct StructuredData {
    pub summary: Option<CostSummary>,
    pub materials: Option<MaterialsSection>,
    pub labour: Option<LabourSection>,
    pub timescales: Option<Timescales>,
    pub alternatives: Option<Alternatives>,
    pub order_list: Option<OrderList>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default, JsonSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct CostSummary {
    pub materials_total: f64,
    pub labour_total: f64,
    pub subtotal: f64,
    pub vat_rate: f64,
    pub vat_amount: f64,
    pub grand_total: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default, JsonSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct MaterialItem {
    pub description: String,
    pub quantity: f64,
    pub unit: String,
    pub unit_price: f64,
    pub total: f64,
    pub supplier: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default, JsonSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct MaterialsSection {
    pub items: Vec<MaterialItem>,
    pub subtotal: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default, JsonSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct LabourTask {
    pub description: String,
    pub hours: f64,
    pub workers: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default, JsonSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct LabourSection {
    pub tasks: Vec<LabourTask>,
    pub total_hours: f64,
    pub hourly_rate: f64,
    pub total: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default, JsonSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct Phase {
    pub name: String,
    pub days: f64,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default, JsonSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct Timescales {
    pub phases: Vec<Phase>,
    pub total_days: f64,
    pub earliest_start: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default, JsonSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct QuoteTier {
    pub description: String,
    pub total: f64,
    pub inclusions: Vec<String>,
    pub exclusions: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
pub enum Tier {
    Budget,
    Standard,
    Premium,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default, JsonSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct Alternatives {
    pub budget: Option<QuoteTier>,
    pub standard: Option<QuoteTier>,
    pub premium: Option<QuoteTier>,
}

impl Alternatives {
    pub fn tier(&self, tier: Tier) -> Option<&QuoteTier> {
        match tier {
            Tier::Budget => self.budget.as_ref(),
            Tier::Standard => self.standard.as_ref(),
            Tier::Premium => self.premium.as_ref(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default, JsonSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct OrderItem {
    pub description: String,
    pub product_code: Option<String>,
    pub quantity: f64,
    pub unit: String,
    pub unit_price: f64,
    pub total: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default, JsonSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct SupplierOrder {
    pub supplier: String,
    pub items: Vec<OrderItem>,
    pub subtotal: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default, JsonSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct OrderList {
    pub suppliers: Vec<SupplierOrder>,
}

impl OrderList {
    pub fn item_count(&self) -> usize {
        self.suppliers.iter().map(|s| s.items.len()).sum()
    }

    pub fn total(&self) -> f64 {
        self.suppliers
            .iter()
            .flat_map(|s| s.items.iter())
            .map(|item| item.total)
            .sum()
    }
}

pub fn structured_data_schema() -> schemars::schema::RootSchema {
    schemars::schema_for!(StructuredData)
}
